use crate::error::LlmError;

const DEFAULT_MODEL: &str = "gemini-2.5-flash-lite";
const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";

#[derive(Debug, Clone)]
pub struct LlmConfig {
    pub api_key: String,
    pub model: String,
    pub base_url: String,
    /// Low temperature keeps code generation close to deterministic.
    pub temperature: f32,
}

impl LlmConfig {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            model: DEFAULT_MODEL.to_string(),
            base_url: DEFAULT_BASE_URL.to_string(),
            temperature: 0.1,
        }
    }

    /// Read `GOOGLE_API_KEY` (required) and `TESTPILOT_MODEL` (optional)
    /// from the environment.
    pub fn from_env() -> Result<Self, LlmError> {
        let api_key = std::env::var("GOOGLE_API_KEY")
            .ok()
            .filter(|key| !key.is_empty())
            .ok_or(LlmError::MissingApiKey)?;

        let mut config = Self::new(api_key);
        if let Ok(model) = std::env::var("TESTPILOT_MODEL") {
            if !model.is_empty() {
                config.model = model;
            }
        }
        Ok(config)
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = LlmConfig::new("key");
        assert_eq!(config.model, DEFAULT_MODEL);
        assert!(config.temperature < 0.5);
    }

    #[test]
    fn test_builder() {
        let config = LlmConfig::new("key")
            .with_model("gemini-2.5-pro")
            .with_base_url("http://localhost:9999");

        assert_eq!(config.model, "gemini-2.5-pro");
        assert_eq!(config.base_url, "http://localhost:9999");
    }
}
