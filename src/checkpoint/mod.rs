//! Checkpoint module for resumable pipeline execution.
//!
//! Provides:
//! - `ProgressCheckpoint`: index of the last record fully processed
//! - `CheckpointManager`: persistence and loading of the checkpoint

mod state;

pub use state::*;
