//! Append-only JSON-lines store.
//!
//! Each merge appends one `{"hero_name", "questions"}` line and syncs the file.
//! Loading folds the log: the last line for a hero wins, and the hero keeps
//! the position of its first line.

use super::{DocumentStore, OutputStore};
use crate::models::{HeroTrivia, OutputDocument, Result, TriviaError, TriviaQuestion, Upsert};
use std::collections::HashSet;
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Store that appends a line per merge instead of rewriting the document.
pub struct AppendLogStore {
    path: PathBuf,
    seen: HashSet<String>,
}

impl AppendLogStore {
    /// Open the log at `path`, indexing heroes already written to it.
    ///
    /// A torn tail left by a crash mid-append is truncated away so the next
    /// append starts on a clean line.
    pub fn open(path: &Path) -> Result<Self> {
        Self::truncate_torn_tail(path)?;
        let doc = Self::fold(path)?;
        let seen = doc
            .trivia_questions
            .into_iter()
            .map(|entry| entry.hero_name)
            .collect();

        Ok(Self {
            path: path.to_path_buf(),
            seen,
        })
    }

    fn truncate_torn_tail(path: &Path) -> Result<()> {
        if !path.exists() {
            return Ok(());
        }
        let bytes = fs::read(path).map_err(|e| TriviaError::io("reading output log", e))?;
        if bytes.is_empty() || bytes.ends_with(b"\n") {
            return Ok(());
        }

        let keep = bytes
            .iter()
            .rposition(|&b| b == b'\n')
            .map_or(0, |pos| pos + 1);
        warn!(
            path = %path.display(),
            dropped_bytes = bytes.len() - keep,
            "Truncating torn tail of output log"
        );
        let file = OpenOptions::new()
            .write(true)
            .open(path)
            .map_err(|e| TriviaError::io("opening output log", e))?;
        file.set_len(keep as u64)
            .map_err(|e| TriviaError::io("truncating output log", e))?;
        Ok(())
    }

    /// Fold the log at `path` into a document.
    ///
    /// Only an unterminated final line (crash mid-append) is skipped. Every
    /// append ends in a newline, so a complete line that fails to parse is a
    /// format error wherever it sits.
    pub fn fold(path: &Path) -> Result<OutputDocument> {
        let mut doc = OutputDocument::default();
        if !path.exists() {
            return Ok(doc);
        }

        let content =
            fs::read_to_string(path).map_err(|e| TriviaError::io("reading output log", e))?;
        let torn_tail = !content.is_empty() && !content.ends_with('\n');
        let last = content.lines().count().saturating_sub(1);

        for (line_num, line) in content.lines().enumerate() {
            if line.trim().is_empty() {
                continue;
            }
            match serde_json::from_str::<HeroTrivia>(line) {
                Ok(entry) => {
                    doc.upsert(&entry.hero_name, entry.questions);
                }
                Err(e) if torn_tail && line_num == last => {
                    warn!(line = line_num + 1, error = %e, "Ignoring torn final log line");
                }
                Err(e) => {
                    return Err(TriviaError::Format(format!(
                        "invalid output log {} line {}: {e}",
                        path.display(),
                        line_num + 1
                    )));
                }
            }
        }

        Ok(doc)
    }

    /// Fold the log and write it out as a regular output document.
    pub fn compact(&self, destination: &Path) -> Result<OutputDocument> {
        let doc = Self::fold(&self.path)?;
        DocumentStore::write_document(destination, &doc)?;
        info!(
            entries = doc.len(),
            from = %self.path.display(),
            to = %destination.display(),
            "Compacted output log"
        );
        Ok(doc)
    }
}

impl OutputStore for AppendLogStore {
    fn merge(&mut self, hero_name: &str, questions: Vec<TriviaQuestion>) -> Result<Upsert> {
        let entry = HeroTrivia {
            hero_name: hero_name.to_string(),
            questions,
        };
        let mut line = serde_json::to_string(&entry)
            .map_err(|e| TriviaError::Internal(format!("Serializing log entry: {e}")))?;
        line.push('\n');

        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|e| TriviaError::io("creating output dir", e))?;
        }

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .map_err(|e| TriviaError::io("opening output log", e))?;
        file.write_all(line.as_bytes())
            .map_err(|e| TriviaError::io("appending to output log", e))?;
        file.sync_all()
            .map_err(|e| TriviaError::io("syncing output log", e))?;

        let outcome = if self.seen.insert(entry.hero_name) {
            Upsert::Inserted
        } else {
            Upsert::Replaced
        };
        debug!(hero = hero_name, ?outcome, "Output log appended");
        Ok(outcome)
    }

    fn load(&self) -> Result<OutputDocument> {
        Self::fold(&self.path)
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
    fn test_fold_last_write_wins_first_position() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("questions.jsonl");
        let mut store = AppendLogStore::open(&path).unwrap();

        assert_eq!(store.merge("A", questions(15)).unwrap(), Upsert::Inserted);
        assert_eq!(store.merge("B", questions(15)).unwrap(), Upsert::Inserted);
        assert_eq!(store.merge("A", vec![question(7)]).unwrap(), Upsert::Replaced);

        let doc = store.load().unwrap();
        assert_eq!(doc.len(), 2);
        assert_eq!(doc.trivia_questions[0].hero_name, "A");
        assert_eq!(doc.trivia_questions[0].questions, vec![question(7)]);
        assert_eq!(fs::read_to_string(&path).unwrap().lines().count(), 3);
    }

    #[test]
    fn test_reopen_remembers_heroes() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("questions.jsonl");
        AppendLogStore::open(&path)
            .unwrap()
            .merge("A", questions(1))
            .unwrap();

        let mut reopened = AppendLogStore::open(&path).unwrap();
        assert_eq!(reopened.merge("A", questions(2)).unwrap(), Upsert::Replaced);
    }

    #[test]
    fn test_torn_final_line_is_ignored() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("questions.jsonl");
        AppendLogStore::open(&path)
            .unwrap()
            .merge("A", questions(1))
            .unwrap();
        let mut file = OpenOptions::new().append(true).open(&path).unwrap();
        file.write_all(b"{\"hero_name\": \"B\", \"quest").unwrap();

        let doc = AppendLogStore::fold(&path).unwrap();
        assert_eq!(doc.len(), 1);
        assert!(doc.get("B").is_none());

        let mut reopened = AppendLogStore::open(&path).unwrap();
        assert_eq!(reopened.merge("B", questions(3)).unwrap(), Upsert::Inserted);
        let doc = reopened.load().unwrap();
        assert_eq!(doc.len(), 2);
        assert_eq!(doc.get("B").unwrap().questions.len(), 3);
    }

    #[test]
    fn test_corrupt_middle_line_is_fatal() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("questions.jsonl");
        fs::write(&path, "garbage\n{\"hero_name\":\"A\",\"questions\":[]}\n").unwrap();
        assert!(matches!(
            AppendLogStore::open(&path),
            Err(TriviaError::Format(_))
        ));
    }

    #[test]
    fn test_corrupt_complete_last_line_is_fatal() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("questions.jsonl");
        AppendLogStore::open(&path)
            .unwrap()
            .merge("A", questions(1))
            .unwrap();
        let mut file = OpenOptions::new().append(true).open(&path).unwrap();
        file.write_all(b"{\"hero_name\": \"B\"}\n").unwrap();

        assert!(matches!(
            AppendLogStore::fold(&path),
            Err(TriviaError::Format(_))
        ));
        assert!(matches!(
            AppendLogStore::open(&path),
            Err(TriviaError::Format(_))
        ));
    }

    #[test]
    fn test_compact_writes_document() {
        let dir = TempDir::new().unwrap();
        let log = dir.path().join("questions.jsonl");
        let out = dir.path().join("questions.json");
        let mut store = AppendLogStore::open(&log).unwrap();
        store.merge("A", questions(15)).unwrap();
        store.merge("A", questions(15)).unwrap();
        store.merge("B", questions(15)).unwrap();

        let doc = store.compact(&out).unwrap();
        assert_eq!(doc.len(), 2);
        assert_eq!(DocumentStore::read_document(&out).unwrap(), doc);
    }
}
