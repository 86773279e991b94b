//! Progress checkpoint for resumable runs.
//!
//! - The checkpoint records the index of the last record fully processed
//! - State is persisted to disk atomically (write-then-rename)
//! - A missing file means nothing has been processed yet (-1)

use crate::models::{Result, TriviaError};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs::{self, File};
use std::io::{BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Sentinel stored when no record has been processed.
pub const NOTHING_PROCESSED: i64 = -1;

/// Persisted progress marker.
///
/// K_i: Every index up to `last_processed_index` has its questions on disk.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProgressCheckpoint {
    /// Index of the last successfully processed record, or -1
    pub last_processed_index: i64,

    /// Time of the last advance
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
}

impl Default for ProgressCheckpoint {
    fn default() -> Self {
        Self {
            last_processed_index: NOTHING_PROCESSED,
            updated_at: None,
        }
    }
}

impl ProgressCheckpoint {
    /// Index the next run should start from.
    pub fn resume_index(&self) -> usize {
        let next = self.last_processed_index.saturating_add(1).max(0);
        usize::try_from(next).unwrap_or(usize::MAX)
    }

    /// Move the marker forward to `index`.
    ///
    /// The marker never moves backwards; doing so would make a resumed run
    /// redo completed records.
    pub fn advance(&mut self, index: usize) -> Result<()> {
        let index = i64::try_from(index)
            .map_err(|_| TriviaError::Internal(format!("record index {index} out of range")))?;
        if index < self.last_processed_index {
            return Err(TriviaError::Internal(format!(
                "checkpoint cannot move backwards from {} to {index}",
                self.last_processed_index
            )));
        }
        self.last_processed_index = index;
        self.updated_at = Some(Utc::now());
        Ok(())
    }
}

/// Checkpoint manager for loading and persisting the progress marker.
pub struct CheckpointManager {
    /// Path to the checkpoint file
    path: PathBuf,
    /// Current state
    state: ProgressCheckpoint,
}

impl CheckpointManager {
    /// Open the checkpoint at `path`, loading it if the file exists.
    pub fn open(path: &Path) -> Result<Self> {
        let state = if path.exists() {
            let state = Self::read(path)?;
            info!(
                last_processed_index = state.last_processed_index,
                path = %path.display(),
                "Resuming from checkpoint"
            );
            state
        } else {
            debug!(path = %path.display(), "No checkpoint found, starting from the beginning");
            ProgressCheckpoint::default()
        };

        Ok(Self {
            path: path.to_path_buf(),
            state,
        })
    }

    fn read(path: &Path) -> Result<ProgressCheckpoint> {
        let file = File::open(path).map_err(|e| TriviaError::io("opening checkpoint", e))?;
        let reader = BufReader::new(file);
        serde_json::from_reader(reader)
            .map_err(|e| TriviaError::Format(format!("invalid checkpoint {}: {e}", path.display())))
    }

    /// Current state.
    pub fn state(&self) -> &ProgressCheckpoint {
        &self.state
    }

    /// Index the next run should start from.
    pub fn resume_index(&self) -> usize {
        self.state.resume_index()
    }

    /// Record `index` as completed and persist immediately.
    pub fn mark_processed(&mut self, index: usize) -> Result<()> {
        let mut next = self.state.clone();
        next.advance(index)?;
        Self::write(&self.path, &next)?;
        self.state = next;
        Ok(())
    }

    /// Save checkpoint to disk (atomic write).
    fn write(path: &Path, state: &ProgressCheckpoint) -> Result<()> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)
                .map_err(|e| TriviaError::io("creating checkpoint dir", e))?;
        }

        let temp_path = path.with_extension("tmp");
        {
            let file = File::create(&temp_path)
                .map_err(|e| TriviaError::io("creating temp checkpoint", e))?;
            let mut writer = BufWriter::new(file);
            serde_json::to_writer(&mut writer, state)
                .map_err(|e| TriviaError::Internal(format!("Serializing checkpoint: {e}")))?;
            writer
                .flush()
                .map_err(|e| TriviaError::io("flushing checkpoint", e))?;
        }

        fs::rename(&temp_path, path).map_err(|e| TriviaError::io("renaming checkpoint", e))?;

        debug!(
            last_processed_index = state.last_processed_index,
            "Checkpoint saved"
        );
        Ok(())
    }

    /// Delete the checkpoint file so the next run starts from index 0.
    pub fn reset(path: &Path) -> Result<bool> {
        if !path.exists() {
            return Ok(false);
        }
        fs::remove_file(path).map_err(|e| TriviaError::io("removing checkpoint", e))?;
        info!(path = %path.display(), "Checkpoint removed");
        Ok(true)
    }

    /// Path to the checkpoint file.
    pub fn path(&self) -> &Path {
        &self.path
    }
}
