//! Phase implementations.
//!
//! A phase reads the shared state, talks to its collaborators, and
//! returns a sparse [`StateUpdate`]. It never mutates state directly;
//! the engine applies updates atomically at the phase boundary.

mod approval;
mod design;
mod explore;
mod implement;
mod verify;

use async_trait::async_trait;
use testpilot_core::{Run, StateUpdate, WorkflowPhase, WorkflowState};

use crate::context::RunContext;
use crate::error::Result;

pub use approval::ApprovalPhase;
pub use design::DesignPhase;
pub use explore::ExplorePhase;
pub use implement::ImplementPhase;
pub use verify::VerifyPhase;

#[async_trait]
pub trait Phase: Send + Sync {
    fn phase(&self) -> WorkflowPhase;

    async fn run(
        &self,
        ctx: &RunContext,
        run: &Run,
        state: &WorkflowState,
    ) -> Result<StateUpdate>;
}

/// Executor for a given workflow phase.
pub fn phase_impl(phase: WorkflowPhase) -> Box<dyn Phase> {
    match phase {
        WorkflowPhase::Explore => Box::new(ExplorePhase),
        WorkflowPhase::Design => Box::new(DesignPhase),
        WorkflowPhase::Implement => Box::new(ImplementPhase),
        WorkflowPhase::Verify => Box::new(VerifyPhase),
        WorkflowPhase::HumanApproval => Box::new(ApprovalPhase),
    }
}
