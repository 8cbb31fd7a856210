//! Seams between the workflow engine and the outside world.
//!
//! Each phase talks to collaborators through these traits, so the engine
//! can be driven end to end in tests with scripted fakes while production
//! wires in the real browser, model client and sandbox.

use async_trait::async_trait;
use browser::{BrowserDriver, ScriptSandbox};
use llm::GeminiClient;

use crate::error::{OrchestratorError, Result};

/// Text produced by the generation collaborator, with its token cost.
#[derive(Debug, Clone)]
pub struct Generated {
    pub text: String,
    pub tokens: u64,
}

/// Drives a live page: navigation, markup extraction, screenshots.
///
/// Navigation failures are reported as a diagnostic string rather than
/// an error so exploration can degrade instead of aborting the run.
#[async_trait]
pub trait Navigator: Send + Sync {
    async fn navigate(&self, url: &str) -> std::result::Result<(), String>;

    async fn content(&self) -> Result<String>;

    /// Best effort. Returns the saved path, or `None` if capture failed.
    async fn screenshot(&self, file_name: &str) -> Option<String>;
}

/// Reduces raw markup to something that fits a prompt token budget.
pub trait Summarizer: Send + Sync {
    fn clean(&self, markup: &str, token_budget: usize) -> String;
}

/// Produces text from a prompt.
#[async_trait]
pub trait Generator: Send + Sync {
    async fn generate(&self, prompt: &str) -> Result<Generated>;
}

/// Executes a generated test script and returns its combined output.
///
/// Execution problems that the retry loop should see (non-zero exit,
/// timeouts) come back as output text, not errors. Only environment
/// failures such as a missing interpreter surface as `Err`.
#[async_trait]
pub trait Sandbox: Send + Sync {
    async fn run(&self, code: &str) -> Result<String>;
}

#[async_trait]
impl Navigator for BrowserDriver {
    async fn navigate(&self, url: &str) -> std::result::Result<(), String> {
        BrowserDriver::navigate(self, url)
            .await
            .map_err(|e| e.to_string())
    }

    async fn content(&self) -> Result<String> {
        BrowserDriver::content(self)
            .await
            .map_err(|e| OrchestratorError::Collaborator(e.to_string()))
    }

    async fn screenshot(&self, file_name: &str) -> Option<String> {
        BrowserDriver::screenshot(self, file_name)
            .await
            .map(|path| path.display().to_string())
    }
}

/// Regex-based DOM cleaner.
#[derive(Debug, Default, Clone, Copy)]
pub struct DomCleaner;

impl Summarizer for DomCleaner {
    fn clean(&self, markup: &str, token_budget: usize) -> String {
        browser::clean_dom(markup, token_budget)
    }
}

#[async_trait]
impl Generator for GeminiClient {
    async fn generate(&self, prompt: &str) -> Result<Generated> {
        let generation = GeminiClient::generate(self, prompt)
            .await
            .map_err(|e| OrchestratorError::Generation(e.to_string()))?;
        Ok(Generated {
            text: generation.text,
            tokens: generation.total_tokens,
        })
    }
}

#[async_trait]
impl Sandbox for ScriptSandbox {
    async fn run(&self, code: &str) -> Result<String> {
        match ScriptSandbox::run(self, code).await {
            Ok(output) => Ok(output),
            // A timed-out script is a failed verification, not an
            // engine fault. Feed it to the retry loop as output.
            Err(browser::BrowserError::SandboxTimeout(secs)) => Ok(format!(
                "\nERROR:\nExecution timed out after {secs} seconds"
            )),
            Err(e) => Err(OrchestratorError::Collaborator(e.to_string())),
        }
    }
}
