//! Workflow engine for autonomous browser testing.
//!
//! A run moves through explore, design, implement and verify phases over
//! a shared [`testpilot_core::WorkflowState`]. Phases return sparse
//! updates that the engine applies atomically, checkpointing at every
//! boundary. The engine suspends at human checkpoints (plan review,
//! final review) and resumes from the persisted state with an optional
//! patch.

pub mod code_parser;
pub mod collaborators;
mod context;
mod engine;
pub mod phases;
pub mod prompts;
pub mod router;

mod error;

pub use collaborators::{DomCleaner, Generated, Generator, Navigator, Sandbox, Summarizer};
pub use context::{EngineConfig, RunContext};
pub use engine::{EngineStatus, HumanPatch, RunReport, WorkflowEngine};
pub use error::{OrchestratorError, Result};
