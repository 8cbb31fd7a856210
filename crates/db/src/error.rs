use thiserror::Error;
use uuid::Uuid;

#[derive(Error, Debug)]
pub enum DbError {
    #[error("Database error: {0}")]
    Sqlx(#[from] sqlx::Error),

    #[error("Migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    #[error("Run not found: {0}")]
    RunNotFound(Uuid),

    #[error("Corrupt checkpoint for run {run_id}: {reason}")]
    CorruptCheckpoint { run_id: Uuid, reason: String },
}
