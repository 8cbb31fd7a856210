mod run;
mod state;

pub use run::{Run, RunStatus};
pub use state::{
    StateUpdate, SuspendPoint, VerificationResult, WorkflowPhase, WorkflowState,
};
