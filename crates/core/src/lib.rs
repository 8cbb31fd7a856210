mod checkpoint;
pub mod domain;
mod error;
mod metrics;

pub use checkpoint::{Checkpoint, CheckpointStore, MemoryCheckpointStore};
pub use domain::*;
pub use error::CoreError;
pub use metrics::{Metrics, MetricsSnapshot, StepSample};
