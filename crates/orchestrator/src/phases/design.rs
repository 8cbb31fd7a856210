use async_trait::async_trait;
use testpilot_core::{Run, StateUpdate, WorkflowPhase, WorkflowState};
use tracing::info;

use crate::context::RunContext;
use crate::error::Result;
use crate::phases::Phase;
use crate::prompts::PhasePrompts;

/// Produces the test plan, or revises it when human feedback is pending.
///
/// Feedback is consumed exactly once: it is embedded in the redesign
/// prompt and cleared in the same update, so a later pass through Design
/// starts clean.
pub struct DesignPhase;

#[async_trait]
impl Phase for DesignPhase {
    fn phase(&self) -> WorkflowPhase {
        WorkflowPhase::Design
    }

    async fn run(
        &self,
        ctx: &RunContext,
        run: &Run,
        state: &WorkflowState,
    ) -> Result<StateUpdate> {
        let revising = !state.user_feedback.trim().is_empty();
        info!(run_id = %run.id, revising, "designing test plan");

        let prompt = if revising {
            PhasePrompts::redesign(&state.page_summary, &state.test_plan, &state.user_feedback)
        } else {
            PhasePrompts::design(&state.page_summary)
        };

        let generated = ctx.generator.generate(&prompt).await?;
        ctx.metrics.add_tokens(generated.tokens);
        ctx.metrics.log_step("Design");

        Ok(StateUpdate {
            test_plan: Some(generated.text),
            clear_user_feedback: true,
            // a new or revised plan invalidates any earlier sign-off
            approved: Some(false),
            ..Default::default()
        })
    }
}
