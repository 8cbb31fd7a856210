use testpilot_core::{CoreError, RunStatus};
use thiserror::Error;
use uuid::Uuid;

#[derive(Error, Debug)]
pub enum OrchestratorError {
    #[error("Invalid run status transition: {from:?} -> {to:?}")]
    InvalidTransition { from: RunStatus, to: RunStatus },

    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    #[error("Run {0} is not suspended")]
    RunNotSuspended(Uuid),

    #[error("No checkpoint found for run {0}")]
    CheckpointNotFound(Uuid),

    #[error("Generation failed: {0}")]
    Generation(String),

    #[error("Collaborator failure: {0}")]
    Collaborator(String),

    #[error("Core error: {0}")]
    Core(#[from] CoreError),

    #[error("Database error: {0}")]
    Db(#[from] db::DbError),
}

pub type Result<T> = std::result::Result<T, OrchestratorError>;
