//! Checkpoint store
//!
//! Persists the single durable scalar of a harvest run: the observed date
//! of the last record safely handed to the sink. Presence of the file
//! indicates an interrupted prior run; absence means either "never started"
//! or "cleanly completed". Single process, single writer.

use crate::error::{Error, Result};
use chrono::NaiveDate;
use std::path::{Path, PathBuf};
use tracing::debug;

/// File-backed store for the resume checkpoint
#[derive(Debug, Clone)]
pub struct CheckpointStore {
    path: PathBuf,
}

impl CheckpointStore {
    /// Create a store backed by the given file path
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    /// Persist a date, replacing any previous value.
    ///
    /// Written to a temp file and renamed into place so a crash mid-write
    /// never leaves a truncated checkpoint behind.
    pub async fn write(&self, date: NaiveDate) -> Result<()> {
        let temp_path = self.path.with_extension("tmp");
        tokio::fs::write(&temp_path, date.format("%Y-%m-%d").to_string())
            .await
            .map_err(|e| Error::checkpoint(format!("Failed to write checkpoint file: {e}")))?;
        tokio::fs::rename(&temp_path, &self.path)
            .await
            .map_err(|e| Error::checkpoint(format!("Failed to rename checkpoint file: {e}")))?;
        debug!(date = %date, path = %self.path.display(), "checkpoint written");
        Ok(())
    }

    /// Read the persisted date, if any.
    ///
    /// An absent file is `None`; a present but unparseable file is an
    /// error, since silently discarding it would restart the harvest from
    /// the beginning.
    pub async fn read(&self) -> Result<Option<NaiveDate>> {
        let contents = match tokio::fs::read_to_string(&self.path).await {
            Ok(c) => c,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => {
                return Err(Error::checkpoint(format!(
                    "Failed to read checkpoint file: {e}"
                )))
            }
        };

        let trimmed = contents.trim();
        let date = NaiveDate::parse_from_str(trimmed, "%Y-%m-%d").map_err(|e| {
            Error::checkpoint(format!(
                "Checkpoint file '{}' does not contain an ISO date ('{trimmed}'): {e}",
                self.path.display()
            ))
        })?;
        Ok(Some(date))
    }

    /// Remove the checkpoint. A missing file is not an error.
    pub async fn clear(&self) -> Result<()> {
        match tokio::fs::remove_file(&self.path).await {
            Ok(()) => {
                debug!(path = %self.path.display(), "checkpoint cleared");
                Ok(())
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(Error::checkpoint(format!(
                "Failed to remove checkpoint file: {e}"
            ))),
        }
    }

    /// Whether a checkpoint file currently exists
    pub fn exists(&self) -> bool {
        self.path.exists()
    }

    /// The backing file path
    pub fn path(&self) -> &Path {
        &self.path
    }
}
