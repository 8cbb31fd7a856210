use testpilot_core::{Checkpoint, SuspendPoint, WorkflowPhase, WorkflowState};
use uuid::Uuid;

use crate::error::DbError;
use crate::models::run::{datetime_to_timestamp, timestamp_to_datetime};

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct CheckpointRow {
    pub id: i64,
    pub run_id: String,
    pub phase: String,
    /// Serialized WorkflowState (JSON).
    pub state: String,
    pub suspended: Option<String>,
    pub created_at: i64,
}

impl CheckpointRow {
    pub fn into_domain(self) -> Result<Checkpoint, DbError> {
        let run_id = Uuid::parse_str(&self.run_id).unwrap_or_default();
        let state: WorkflowState =
            serde_json::from_str(&self.state).map_err(|e| DbError::CorruptCheckpoint {
                run_id,
                reason: e.to_string(),
            })?;
        let phase =
            WorkflowPhase::parse(&self.phase).ok_or_else(|| DbError::CorruptCheckpoint {
                run_id,
                reason: format!("unknown phase: {}", self.phase),
            })?;

        Ok(Checkpoint {
            run_id,
            phase,
            state,
            suspended: self.suspended.as_deref().and_then(SuspendPoint::parse),
            created_at: timestamp_to_datetime(self.created_at),
        })
    }
}

impl TryFrom<&Checkpoint> for CheckpointRow {
    type Error = DbError;

    fn try_from(checkpoint: &Checkpoint) -> Result<Self, DbError> {
        let state =
            serde_json::to_string(&checkpoint.state).map_err(|e| DbError::CorruptCheckpoint {
                run_id: checkpoint.run_id,
                reason: e.to_string(),
            })?;

        Ok(Self {
            id: 0,
            run_id: checkpoint.run_id.to_string(),
            phase: checkpoint.phase.as_str().to_string(),
            state,
            suspended: checkpoint.suspended.map(|p| p.as_str().to_string()),
            created_at: datetime_to_timestamp(checkpoint.created_at),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_row_roundtrip() {
        let mut state = WorkflowState::new("https://example.test");
        state.test_plan = "1. open page".to_string();
        state.attempt_count = 2;
        let checkpoint = Checkpoint::new(Uuid::new_v4(), WorkflowPhase::Verify, state)
            .suspended_at(SuspendPoint::FinalReview);

        let row = CheckpointRow::try_from(&checkpoint).unwrap();
        let back = row.into_domain().unwrap();

        assert_eq!(back.run_id, checkpoint.run_id);
        assert_eq!(back.phase, checkpoint.phase);
        assert_eq!(back.state, checkpoint.state);
        assert_eq!(back.suspended, Some(SuspendPoint::FinalReview));
    }

    #[test]
    fn test_corrupt_state_is_an_error() {
        let row = CheckpointRow {
            id: 1,
            run_id: Uuid::new_v4().to_string(),
            phase: "verify".to_string(),
            state: "{not json".to_string(),
            suspended: None,
            created_at: 0,
        };

        assert!(matches!(
            row.into_domain(),
            Err(DbError::CorruptCheckpoint { .. })
        ));
    }
}
