//! Whole-document JSON store.

use super::OutputStore;
use crate::models::{OutputDocument, Result, TriviaError, TriviaQuestion, Upsert};
use std::fs::{self, File};
use std::io::{BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use tracing::debug;

/// Store that re-reads, merges and rewrites the full document per merge.
///
/// Trades I/O volume for simplicity: each success is immediately durable
/// and the file on disk is always a complete, valid document.
pub struct DocumentStore {
    path: PathBuf,
}

impl DocumentStore {
    pub fn new(path: &Path) -> Self {
        Self {
            path: path.to_path_buf(),
        }
    }

    /// Read the document at `path`, or an empty one if the file is absent.
    pub fn read_document(path: &Path) -> Result<OutputDocument> {
        if !path.exists() {
            return Ok(OutputDocument::default());
        }
        let file = File::open(path).map_err(|e| TriviaError::io("opening output document", e))?;
        serde_json::from_reader(BufReader::new(file)).map_err(|e| {
            TriviaError::Format(format!("invalid output document {}: {e}", path.display()))
        })
    }

    /// Write `doc` as pretty-printed JSON (atomic write).
    ///
    /// Non-ASCII text is written verbatim, not escaped.
    pub fn write_document(path: &Path, doc: &OutputDocument) -> Result<()> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|e| TriviaError::io("creating output dir", e))?;
        }

        let temp_path = path.with_extension("json.tmp");
        {
            let file = File::create(&temp_path)
                .map_err(|e| TriviaError::io("creating temp output", e))?;
            let mut writer = BufWriter::new(file);
            serde_json::to_writer_pretty(&mut writer, doc)
                .map_err(|e| TriviaError::Internal(format!("Serializing output: {e}")))?;
            writer
                .flush()
                .map_err(|e| TriviaError::io("flushing output", e))?;
            writer
                .get_ref()
                .sync_all()
                .map_err(|e| TriviaError::io("syncing output", e))?;
        }

        fs::rename(&temp_path, path).map_err(|e| TriviaError::io("renaming output", e))?;
        Ok(())
    }
}

impl OutputStore for DocumentStore {
    fn merge(&mut self, hero_name: &str, questions: Vec<TriviaQuestion>) -> Result<Upsert> {
        let mut doc = Self::read_document(&self.path)?;
        let outcome = doc.upsert(hero_name, questions);
        Self::write_document(&self.path, &doc)?;

        debug!(hero = hero_name, ?outcome, entries = doc.len(), "Output document written");
        Ok(outcome)
    }

    fn load(&self) -> Result<OutputDocument> {
        Self::read_document(&self.path)
    }

    fn path(&self) -> &Path {
        &self.path
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{question, questions};
    use tempfile::TempDir;

    #[test]
    fn test_merge_creates_document() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("out").join("questions.json");
        let mut store = DocumentStore::new(&path);

        assert_eq!(store.merge("A", questions(15)).unwrap(), Upsert::Inserted);

        let doc = store.load().unwrap();
        assert_eq!(doc.len(), 1);
        assert_eq!(doc.trivia_questions[0].hero_name, "A");
        assert_eq!(doc.trivia_questions[0].questions.len(), 15);
    }

    #[test]
    fn test_merge_is_idempotent_per_hero() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("questions.json");
        let mut store = DocumentStore::new(&path);

        store.merge("Jane Doe", questions(15)).unwrap();
        store.merge("John Roe", questions(15)).unwrap();
        let mut replacement = questions(15);
        replacement[0] = question(99);
        assert_eq!(
            store.merge("Jane Doe", replacement).unwrap(),
            Upsert::Replaced
        );

        let doc = store.load().unwrap();
        assert_eq!(doc.len(), 2);
        assert_eq!(doc.trivia_questions[0].hero_name, "Jane Doe");
        assert_eq!(doc.trivia_questions[0].questions[0], question(99));
        assert_eq!(doc.trivia_questions[1].hero_name, "John Roe");
    }

    #[test]
    fn test_merge_preserves_foreign_entries() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("questions.json");
        let mut existing = OutputDocument::default();
        existing.upsert("Written Earlier", questions(2));
        DocumentStore::write_document(&path, &existing).unwrap();

        DocumentStore::new(&path).merge("New", questions(15)).unwrap();

        let doc = DocumentStore::read_document(&path).unwrap();
        assert_eq!(doc.len(), 2);
        assert_eq!(doc.get("Written Earlier").unwrap().questions.len(), 2);
    }

    #[test]
    fn test_pretty_utf8_output() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("questions.json");
        let mut q = question(0);
        q.question = "Où habite José?".to_string();

        DocumentStore::new(&path).merge("José Núñez", vec![q]).unwrap();

        let text = fs::read_to_string(&path).unwrap();
        assert!(text.contains("\"hero_name\": \"José Núñez\""));
        assert!(text.contains("Où habite José?"));
        assert!(text.starts_with("{\n  \"trivia_questions\": ["));
    }

    #[test]
    fn test_corrupt_document_is_fatal() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("questions.json");
        fs::write(&path, "{\"trivia_questions\": [").unwrap();

        let err = DocumentStore::new(&path).merge("A", questions(1)).unwrap_err();
        assert!(matches!(err, TriviaError::Format(_)));
        assert!(!err.is_retryable());
    }
}
