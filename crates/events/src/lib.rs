//! Fire-and-forget event side channel for TestPilot.
//!
//! Observers (CLI progress output, future front-ends) subscribe to run
//! and phase lifecycle events. Publishing never fails and never blocks
//! the workflow: a dropped or lagged event is an observer's problem.

mod bus;
mod types;

pub use bus::EventBus;
pub use types::*;
