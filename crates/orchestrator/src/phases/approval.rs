use async_trait::async_trait;
use testpilot_core::{Run, StateUpdate, WorkflowPhase, WorkflowState};
use tracing::debug;

use crate::context::RunContext;
use crate::error::Result;
use crate::phases::Phase;

/// Placeholder executed after the final-review checkpoint.
///
/// The human's verdict arrives through the resume patch, so by the time
/// this phase runs the state already carries it. The phase itself has
/// nothing to compute; routing after it decides the outcome.
pub struct ApprovalPhase;

#[async_trait]
impl Phase for ApprovalPhase {
    fn phase(&self) -> WorkflowPhase {
        WorkflowPhase::HumanApproval
    }

    async fn run(
        &self,
        _ctx: &RunContext,
        run: &Run,
        state: &WorkflowState,
    ) -> Result<StateUpdate> {
        debug!(
            run_id = %run.id,
            approved = state.approved,
            has_feedback = !state.user_feedback.is_empty(),
            "human approval phase"
        );
        Ok(StateUpdate::default())
    }
}
