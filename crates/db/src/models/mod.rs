mod checkpoint;
mod run;

pub use checkpoint::CheckpointRow;
pub use run::RunRow;
