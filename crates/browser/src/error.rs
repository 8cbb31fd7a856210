use thiserror::Error;

#[derive(Error, Debug)]
pub enum BrowserError {
    #[error("Failed to launch browser: {0}")]
    Launch(String),

    #[error("Navigation failed: {0}")]
    Navigation(String),

    #[error("No active page")]
    NoPage,

    #[error("Screenshot failed: {0}")]
    Screenshot(String),

    #[error("Sandbox execution timed out after {0}s")]
    SandboxTimeout(u64),

    #[error("CDP error: {0}")]
    Cdp(#[from] chromiumoxide::error::CdpError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}
