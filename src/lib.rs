//! hero-trivia - Checkpointed trivia generation for hero profiles.
//!
//! ## Architecture
//!
//! One sequential pipeline:
//! - **Source**: hero profiles loaded from the crawler's JSON array
//! - **Processor**: builds a prompt per hero and calls the generation service
//!   with bounded retries
//! - **Store**: merges each result into the output document, then advances
//!   the checkpoint
//!
//! ## Epistemic Design
//!
//! - K_i (Knowledge): The checkpoint names the last hero whose questions are on disk
//! - B_i (Beliefs): A reply holds the requested questions (parsed, validated, retried)
//! - I^R (Resolvable): Service, retry and path settings from config
//! - I^B (Bounded): Service availability (bounded attempts, then fail-stop)

pub mod checkpoint;
pub mod client;
pub mod models;
pub mod pipeline;
pub mod store;

#[cfg(test)]
mod test_support;

// Re-exports for convenience
pub use checkpoint::{CheckpointManager, ProgressCheckpoint};
pub use client::{AnthropicClient, ChatCompletionsClient, GenerationService};
pub use models::{Config, HeroProfile, OutputDocument, Result, RunStats, TriviaError};
pub use pipeline::{Processor, PromptBuilder, RetryPolicy, Sleeper};
pub use store::{AppendLogStore, DocumentStore, OutputStore};
