//! Core data models for hero-trivia.
//!
//! Epistemic mapping:
//! - K_i (Knowledge): Records, questions and the output document as concrete types
//! - B_i (Beliefs): Parsing and validation wrapped in Result
//! - I^R (Resolvable): Config parameters with defaults
//! - I^B (Bounded): Error variants that decide retry or stop

mod config;
mod error;
mod record;
mod trivia;

pub use config::*;
pub use error::*;
pub use record::*;
pub use trivia::*;
