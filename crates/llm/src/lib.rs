//! Generation collaborator: a thin typed client for the Gemini
//! `generateContent` REST API.

mod client;
mod config;
mod error;

pub use client::{GeminiClient, Generation};
pub use config::LlmConfig;
pub use error::LlmError;
