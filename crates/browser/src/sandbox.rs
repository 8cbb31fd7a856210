use std::path::PathBuf;
use std::process::Stdio;
use std::time::Duration;

use tokio::process::Command;
use tokio::time::timeout;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::error::BrowserError;

#[derive(Debug, Clone)]
pub struct SandboxConfig {
    /// Interpreter used to run generated scripts.
    pub interpreter: String,
    /// Hard cap on a single execution.
    pub exec_timeout: Duration,
    /// Scratch directory for script files.
    pub work_dir: PathBuf,
}

impl Default for SandboxConfig {
    fn default() -> Self {
        Self {
            interpreter: "python3".to_string(),
            exec_timeout: Duration::from_secs(120),
            work_dir: std::env::temp_dir(),
        }
    }
}

/// Runs generated test scripts in an isolated child process.
///
/// Stdout and stderr are captured, never inherited, so a crashing or
/// chatty script cannot touch the orchestrator's own streams. A
/// non-zero exit is data for the verifier, not an error; only spawn
/// failures and timeouts surface as errors.
pub struct ScriptSandbox {
    config: SandboxConfig,
}

impl ScriptSandbox {
    pub fn new(config: SandboxConfig) -> Self {
        Self { config }
    }

    /// Execute `code` and return the combined stdout/stderr text.
    pub async fn run(&self, code: &str) -> Result<String, BrowserError> {
        let script_path = self
            .config
            .work_dir
            .join(format!("testpilot-{}.py", Uuid::new_v4()));
        tokio::fs::create_dir_all(&self.config.work_dir).await?;
        tokio::fs::write(&script_path, code).await?;
        debug!(path = %script_path.display(), bytes = code.len(), "sandbox script written");

        let child = Command::new(&self.config.interpreter)
            .arg(&script_path)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()?;

        let result = timeout(self.config.exec_timeout, child.wait_with_output()).await;

        if let Err(e) = tokio::fs::remove_file(&script_path).await {
            warn!(error = %e, "failed to remove sandbox script");
        }

        let output = match result {
            Ok(output) => output?,
            // kill_on_drop reaps the child when the future is dropped.
            Err(_) => {
                let secs = self.config.exec_timeout.as_secs();
                warn!(timeout_s = secs, "sandbox execution timed out");
                return Err(BrowserError::SandboxTimeout(secs));
            }
        };

        let mut combined = String::from_utf8_lossy(&output.stdout).into_owned();
        if !output.stderr.is_empty() {
            combined.push_str("\nERROR:\n");
            combined.push_str(&String::from_utf8_lossy(&output.stderr));
        }

        info!(
            exit_code = output.status.code().unwrap_or(-1),
            output_bytes = combined.len(),
            "sandbox execution finished"
        );
        Ok(combined)
    }
}
