use async_trait::async_trait;
use events::Event;
use testpilot_core::{Run, StateUpdate, VerificationResult, WorkflowPhase, WorkflowState};
use tracing::info;

use crate::code_parser::{contains_success_marker, log_tail};
use crate::context::RunContext;
use crate::error::Result;
use crate::phases::Phase;

/// Executes the generated script in the sandbox and judges the output.
///
/// Success is the literal marker in the log and nothing else. On failure
/// the log tail becomes system feedback for the next Implement attempt.
pub struct VerifyPhase;

#[async_trait]
impl Phase for VerifyPhase {
    fn phase(&self) -> WorkflowPhase {
        WorkflowPhase::Verify
    }

    async fn run(
        &self,
        ctx: &RunContext,
        run: &Run,
        state: &WorkflowState,
    ) -> Result<StateUpdate> {
        let attempt = state.attempt_count + 1;
        info!(run_id = %run.id, attempt, "verifying generated script");

        let log = ctx.sandbox.run(&state.generated_code).await?;
        let passed = contains_success_marker(&log);

        ctx.emit(Event::VerificationCompleted {
            run_id: run.id,
            passed,
            attempt,
        });
        ctx.metrics.log_step("Verification");
        info!(run_id = %run.id, attempt, passed, log_bytes = log.len(), "verification finished");

        let system_feedback = if passed {
            String::new()
        } else {
            log_tail(&log, ctx.config.log_tail_chars).to_string()
        };

        Ok(StateUpdate {
            execution_log: Some(log),
            verification: Some(if passed {
                VerificationResult::Passed
            } else {
                VerificationResult::Failed
            }),
            attempt_count: Some(attempt),
            system_feedback: Some(system_feedback),
            ..Default::default()
        })
    }
}
