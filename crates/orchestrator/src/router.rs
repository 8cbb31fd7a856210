//! Routing decisions between phases.
//!
//! All conditional edges of the workflow live in [`route`], evaluated on
//! nothing but the shared state. The engine owns the unconditional edges
//! (Explore -> Design -> Implement -> Verify) and the suspend gates.

use testpilot_core::{RunStatus, VerificationResult, WorkflowPhase, WorkflowState};

use crate::error::{OrchestratorError, Result};

/// Upper bound on Verify executions within one design cycle.
pub const MAX_ATTEMPTS: u32 = 3;

/// Case-insensitive keyword that turns plan-review feedback into consent.
pub const APPROVAL_KEYWORD: &str = "approve";

/// Where the router is being consulted from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RouterEntry {
    /// Resuming from the plan-review checkpoint.
    PlanReview,
    /// A Verify phase just completed.
    Verify,
    /// Resuming from the final-review checkpoint.
    HumanApproval,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    Continue(WorkflowPhase),
    /// The run is over; terminal status comes from [`terminal_status`].
    Terminate,
}

/// The single routing function for all conditional edges.
///
/// Rules, in priority order:
/// 1. explicit approval terminates the run;
/// 2. pending human feedback (that is not just the approval keyword)
///    always routes to Design;
/// 3. a failed verification retries Implement while attempts remain;
/// 4. otherwise the run terminates, except at plan review where the
///    default is to proceed to Implement.
pub fn route(entry: RouterEntry, state: &WorkflowState, max_attempts: u32) -> Decision {
    if state.approved {
        return Decision::Terminate;
    }

    let feedback = state.user_feedback.trim();
    if !feedback.is_empty() && !is_approval(feedback) {
        return Decision::Continue(WorkflowPhase::Design);
    }

    match entry {
        RouterEntry::PlanReview => Decision::Continue(WorkflowPhase::Implement),
        RouterEntry::Verify | RouterEntry::HumanApproval => {
            if state.verification == VerificationResult::Failed
                && state.attempt_count < max_attempts
            {
                Decision::Continue(WorkflowPhase::Implement)
            } else {
                Decision::Terminate
            }
        }
    }
}

fn is_approval(feedback: &str) -> bool {
    feedback.to_lowercase().contains(APPROVAL_KEYWORD)
}

/// Terminal status for a run whose router said [`Decision::Terminate`].
pub fn terminal_status(state: &WorkflowState) -> RunStatus {
    if state.approved || state.verification == VerificationResult::Passed {
        RunStatus::Passed
    } else {
        RunStatus::Failed
    }
}

/// Validates run status transitions.
pub struct RunStateMachine;

impl RunStateMachine {
    pub fn can_transition(from: RunStatus, to: RunStatus) -> bool {
        Self::allowed_transitions(from).contains(&to)
    }

    pub fn validate(from: RunStatus, to: RunStatus) -> Result<()> {
        if Self::can_transition(from, to) {
            Ok(())
        } else {
            Err(OrchestratorError::InvalidTransition { from, to })
        }
    }

    fn allowed_transitions(from: RunStatus) -> &'static [RunStatus] {
        match from {
            RunStatus::Pending => &[RunStatus::Exploring, RunStatus::Abandoned],
            RunStatus::Exploring => &[
                RunStatus::Designing,
                RunStatus::Failed,
                RunStatus::Abandoned,
            ],
            RunStatus::Designing => &[
                RunStatus::PlanReview,
                RunStatus::Implementing,
                RunStatus::Abandoned,
            ],
            RunStatus::PlanReview => &[
                RunStatus::Implementing,
                RunStatus::Designing,
                RunStatus::Abandoned,
            ],
            RunStatus::Implementing => &[RunStatus::Verifying, RunStatus::Abandoned],
            RunStatus::Verifying => &[
                RunStatus::Implementing,
                RunStatus::Designing,
                RunStatus::FinalReview,
                RunStatus::Passed,
                RunStatus::Failed,
                RunStatus::Abandoned,
            ],
            RunStatus::FinalReview => &[
                RunStatus::Passed,
                RunStatus::Designing,
                RunStatus::Abandoned,
            ],
            RunStatus::Passed | RunStatus::Failed | RunStatus::Abandoned => &[],
        }
    }
}
