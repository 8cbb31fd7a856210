use thiserror::Error;

#[derive(Error, Debug)]
pub enum LlmError {
    #[error("GOOGLE_API_KEY is missing. Check your environment or .env file")]
    MissingApiKey,

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("API error (status {status}): {message}")]
    Api { status: u16, message: String },

    #[error("Model returned no candidates")]
    EmptyResponse,
}
