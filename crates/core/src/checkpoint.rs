use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use uuid::Uuid;

use crate::domain::{SuspendPoint, WorkflowPhase, WorkflowState};
use crate::error::CoreError;

/// Persisted snapshot of a run taken after a phase boundary.
///
/// `phase` records the phase that just ran, which is what the router
/// re-enters on resume. Saving with an overridden phase lets a caller
/// patch state and pretend a particular phase completed.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Checkpoint {
    pub run_id: Uuid,
    pub phase: WorkflowPhase,
    pub state: WorkflowState,
    /// Set when the engine yielded to a human at this boundary.
    pub suspended: Option<SuspendPoint>,
    pub created_at: DateTime<Utc>,
}

impl Checkpoint {
    pub fn new(run_id: Uuid, phase: WorkflowPhase, state: WorkflowState) -> Self {
        Self {
            run_id,
            phase,
            state,
            suspended: None,
            created_at: Utc::now(),
        }
    }

    pub fn suspended_at(mut self, point: SuspendPoint) -> Self {
        self.suspended = Some(point);
        self
    }
}

/// Storage contract for checkpoints. Latest-wins on load.
#[async_trait]
pub trait CheckpointStore: Send + Sync {
    async fn save(&self, checkpoint: &Checkpoint) -> Result<(), CoreError>;

    /// Load the most recent checkpoint for a run.
    async fn load(&self, run_id: Uuid) -> Result<Option<Checkpoint>, CoreError>;

    /// The suspend point recorded on the latest checkpoint, if any.
    async fn pending_suspend(&self, run_id: Uuid) -> Result<Option<SuspendPoint>, CoreError>;

    /// Drop all checkpoints for a run (cleanup after a terminal state).
    async fn clear(&self, run_id: Uuid) -> Result<(), CoreError>;
}

/// In-memory store used by tests and runs that opt out of persistence.
#[derive(Debug, Default)]
pub struct MemoryCheckpointStore {
    checkpoints: Mutex<HashMap<Uuid, Vec<Checkpoint>>>,
}

impl MemoryCheckpointStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of checkpoints recorded for a run.
    pub async fn count(&self, run_id: Uuid) -> usize {
        self.checkpoints
            .lock()
            .await
            .get(&run_id)
            .map(Vec::len)
            .unwrap_or(0)
    }
}

#[async_trait]
impl CheckpointStore for MemoryCheckpointStore {
    async fn save(&self, checkpoint: &Checkpoint) -> Result<(), CoreError> {
        self.checkpoints
            .lock()
            .await
            .entry(checkpoint.run_id)
            .or_default()
            .push(checkpoint.clone());
        Ok(())
    }

    async fn load(&self, run_id: Uuid) -> Result<Option<Checkpoint>, CoreError> {
        Ok(self
            .checkpoints
            .lock()
            .await
            .get(&run_id)
            .and_then(|list| list.last().cloned()))
    }

    async fn pending_suspend(&self, run_id: Uuid) -> Result<Option<SuspendPoint>, CoreError> {
        Ok(self
            .load(run_id)
            .await?
            .and_then(|checkpoint| checkpoint.suspended))
    }

    async fn clear(&self, run_id: Uuid) -> Result<(), CoreError> {
        self.checkpoints.lock().await.remove(&run_id);
        Ok(())
    }
}
