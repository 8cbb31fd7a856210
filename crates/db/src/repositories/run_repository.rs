use sqlx::SqlitePool;
use testpilot_core::{Run, RunStatus};
use uuid::Uuid;

use crate::error::DbError;
use crate::models::RunRow;

#[derive(Clone)]
pub struct RunRepository {
    pool: SqlitePool,
}

impl RunRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub async fn create(&self, run: &Run) -> Result<Run, DbError> {
        let row = RunRow::from(run);

        sqlx::query(
            r#"
            INSERT INTO runs (id, url, status, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?)
            "#,
        )
        .bind(&row.id)
        .bind(&row.url)
        .bind(&row.status)
        .bind(row.created_at)
        .bind(row.updated_at)
        .execute(&self.pool)
        .await?;

        Ok(run.clone())
    }

    pub async fn find_by_id(&self, id: Uuid) -> Result<Option<Run>, DbError> {
        let row: Option<RunRow> = sqlx::query_as(
            r#"
            SELECT id, url, status, created_at, updated_at
            FROM runs
            WHERE id = ?
            "#,
        )
        .bind(id.to_string())
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(|r| r.into_domain()))
    }

    pub async fn find_all(&self) -> Result<Vec<Run>, DbError> {
        let rows: Vec<RunRow> = sqlx::query_as(
            r#"
            SELECT id, url, status, created_at, updated_at
            FROM runs
            ORDER BY created_at DESC
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(|r| r.into_domain()).collect())
    }

    /// Runs parked at a human checkpoint.
    pub async fn find_suspended(&self) -> Result<Vec<Run>, DbError> {
        let rows: Vec<RunRow> = sqlx::query_as(
            r#"
            SELECT id, url, status, created_at, updated_at
            FROM runs
            WHERE status IN ('plan_review', 'final_review')
            ORDER BY created_at DESC
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(|r| r.into_domain()).collect())
    }

    pub async fn update_status(&self, id: Uuid, status: RunStatus) -> Result<(), DbError> {
        let result = sqlx::query(
            r#"
            UPDATE runs
            SET status = ?, updated_at = ?
            WHERE id = ?
            "#,
        )
        .bind(status.as_str())
        .bind(chrono::Utc::now().timestamp())
        .bind(id.to_string())
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::RunNotFound(id));
        }
        Ok(())
    }

    pub async fn delete(&self, id: Uuid) -> Result<(), DbError> {
        sqlx::query("DELETE FROM runs WHERE id = ?")
            .bind(id.to_string())
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}
