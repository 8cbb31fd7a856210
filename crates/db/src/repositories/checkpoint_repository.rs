use async_trait::async_trait;
use sqlx::SqlitePool;
use testpilot_core::{Checkpoint, CheckpointStore, CoreError, SuspendPoint};
use uuid::Uuid;

use crate::error::DbError;
use crate::models::CheckpointRow;

/// Durable checkpoint store backed by sqlite.
///
/// Snapshots are append-only; `load` returns the newest row. Saving a
/// checkpoint with an overridden phase is how callers patch state and
/// resume as if that phase had just run.
#[derive(Clone)]
pub struct SqliteCheckpointStore {
    pool: SqlitePool,
}

impl SqliteCheckpointStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    async fn insert(&self, checkpoint: &Checkpoint) -> Result<(), DbError> {
        let row = CheckpointRow::try_from(checkpoint)?;

        sqlx::query(
            r#"
            INSERT INTO checkpoints (run_id, phase, state, suspended, created_at)
            VALUES (?, ?, ?, ?, ?)
            "#,
        )
        .bind(&row.run_id)
        .bind(&row.phase)
        .bind(&row.state)
        .bind(&row.suspended)
        .bind(row.created_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn latest(&self, run_id: Uuid) -> Result<Option<Checkpoint>, DbError> {
        let row: Option<CheckpointRow> = sqlx::query_as(
            r#"
            SELECT id, run_id, phase, state, suspended, created_at
            FROM checkpoints
            WHERE run_id = ?
            ORDER BY id DESC
            LIMIT 1
            "#,
        )
        .bind(run_id.to_string())
        .fetch_optional(&self.pool)
        .await?;

        row.map(CheckpointRow::into_domain).transpose()
    }

    async fn delete_all(&self, run_id: Uuid) -> Result<(), DbError> {
        sqlx::query("DELETE FROM checkpoints WHERE run_id = ?")
            .bind(run_id.to_string())
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}

#[async_trait]
impl CheckpointStore for SqliteCheckpointStore {
    async fn save(&self, checkpoint: &Checkpoint) -> Result<(), CoreError> {
        self.insert(checkpoint)
            .await
            .map_err(|e| CoreError::Checkpoint(e.to_string()))
    }

    async fn load(&self, run_id: Uuid) -> Result<Option<Checkpoint>, CoreError> {
        self.latest(run_id)
            .await
            .map_err(|e| CoreError::Checkpoint(e.to_string()))
    }

    async fn pending_suspend(&self, run_id: Uuid) -> Result<Option<SuspendPoint>, CoreError> {
        Ok(self.load(run_id).await?.and_then(|c| c.suspended))
    }

    async fn clear(&self, run_id: Uuid) -> Result<(), CoreError> {
        self.delete_all(run_id)
            .await
            .map_err(|e| CoreError::Checkpoint(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pool::{create_pool, run_migrations};
    use crate::repositories::RunRepository;
    use testpilot_core::{Run, WorkflowPhase, WorkflowState};

    async fn store_with_run() -> (SqliteCheckpointStore, Run) {
        let pool = create_pool("sqlite::memory:").await.unwrap();
        run_migrations(&pool).await.unwrap();
        let run = Run::new("https://example.test");
        RunRepository::new(pool.clone()).create(&run).await.unwrap();
        (SqliteCheckpointStore::new(pool), run)
    }

    #[tokio::test]
    async fn test_save_load_roundtrip() {
        let (store, run) = store_with_run().await;

        let mut state = WorkflowState::new(&run.url);
        state.generated_code = "print('TEST PASSED')".to_string();
        state.attempt_count = 1;
        let checkpoint = Checkpoint::new(run.id, WorkflowPhase::Verify, state);

        store.save(&checkpoint).await.unwrap();
        let loaded = store.load(run.id).await.unwrap().unwrap();

        // Field-for-field equality of the checkpointed state.
        assert_eq!(loaded.state, checkpoint.state);
        assert_eq!(loaded.phase, WorkflowPhase::Verify);
    }

    #[tokio::test]
    async fn test_latest_wins() {
        let (store, run) = store_with_run().await;

        let first = Checkpoint::new(run.id, WorkflowPhase::Explore, WorkflowState::new(&run.url));
        let mut later_state = WorkflowState::new(&run.url);
        later_state.test_plan = "plan v2".to_string();
        let second = Checkpoint::new(run.id, WorkflowPhase::Design, later_state)
            .suspended_at(SuspendPoint::PlanReview);

        store.save(&first).await.unwrap();
        store.save(&second).await.unwrap();

        let loaded = store.load(run.id).await.unwrap().unwrap();
        assert_eq!(loaded.state.test_plan, "plan v2");
        assert_eq!(
            store.pending_suspend(run.id).await.unwrap(),
            Some(SuspendPoint::PlanReview)
        );
    }

    #[tokio::test]
    async fn test_clear() {
        let (store, run) = store_with_run().await;
        let checkpoint =
            Checkpoint::new(run.id, WorkflowPhase::Explore, WorkflowState::new(&run.url));
        store.save(&checkpoint).await.unwrap();

        store.clear(run.id).await.unwrap();
        assert!(store.load(run.id).await.unwrap().is_none());
    }
}
