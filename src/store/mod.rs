//! Output store for generated trivia.
//!
//! Provides:
//! - `DocumentStore`: rewrites the whole JSON document on every merge
//! - `AppendLogStore`: appends one JSON line per merge, folded on load
//! - `OutputStore`: the seam the processor writes through

mod append_log;
mod document;

pub use append_log::*;
pub use document::*;

use crate::models::{OutputDocument, PersistenceMode, Result, TriviaQuestion, Upsert};
use std::path::Path;

/// Durable sink for per-hero results.
///
/// Every successful `merge` must be on disk before it returns, so the
/// checkpoint written after it never points past unsaved work.
pub trait OutputStore: Send {
    /// Insert or replace the questions for `hero_name` and persist.
    fn merge(&mut self, hero_name: &str, questions: Vec<TriviaQuestion>) -> Result<Upsert>;

    /// Current contents as a document.
    fn load(&self) -> Result<OutputDocument>;

    /// Backing file.
    fn path(&self) -> &Path;
}

/// Open the store matching the configured persistence mode.
pub fn open_store(mode: PersistenceMode, path: &Path) -> Result<Box<dyn OutputStore>> {
    Ok(match mode {
        PersistenceMode::Rewrite => Box::new(DocumentStore::new(path)),
        PersistenceMode::AppendLog => Box::new(AppendLogStore::open(path)?),
    })
}
