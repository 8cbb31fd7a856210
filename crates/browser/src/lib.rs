//! Browser-side plumbing for TestPilot: the CDP driver used during
//! exploration, the DOM simplifier that keeps prompts inside a token
//! budget, and the sandbox that executes generated test scripts.

mod dom;
mod driver;
mod error;
mod sandbox;

pub use dom::clean_dom;
pub use driver::{BrowserDriver, DriverConfig};
pub use error::BrowserError;
pub use sandbox::{SandboxConfig, ScriptSandbox};
