mod checkpoint_repository;
mod run_repository;

pub use checkpoint_repository::SqliteCheckpointStore;
pub use run_repository::RunRepository;
