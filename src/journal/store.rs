//! Durable, append-only event journal.
//!
//! The journal is a single JSON document holding every event in append order.
//! Each append rewrites the whole document into a temp file next to the
//! journal and renames it over the old one, so a crash mid-write leaves the
//! previous version intact.

use crate::journal::event::Event;
use chrono::Utc;
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};
use tempfile::NamedTempFile;
use thiserror::Error;

const TEMP_PREFIX: &str = ".curfew-journal-";
const TEMP_SUFFIX: &str = ".tmp";

/// Temp files older than this are leftovers from a write that never finished.
pub const STALE_TEMP_AGE: Duration = Duration::from_secs(10 * 60);

/// Errors surfaced by journal operations.
#[derive(Debug, Error)]
pub enum JournalError {
    /// The new document could not be written or swapped into place.
    #[error("failed to write journal {}: {source}", path.display())]
    WriteFailed {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// The journal exists but is not a valid event list.
    #[error("journal {} is corrupt: {reason}", path.display())]
    CorruptData { path: PathBuf, reason: String },

    /// The journal exists but could not be read at all.
    #[error("failed to read journal {}: {source}", path.display())]
    ReadFailed {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

/// Details about a damaged journal that an append started over from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Recovery {
    /// Why the previous content was discarded
    pub reason: String,
    /// Where the damaged bytes were copied, if the copy succeeded
    pub backup: Option<PathBuf>,
}

/// Result of a successful append.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppendOutcome {
    /// Number of events in the journal after the append
    pub total_events: usize,
    /// Set when the prior journal was unreadable and treated as empty
    pub recovered: Option<Recovery>,
}

/// A fully written journal document waiting to replace the canonical file.
///
/// Dropping it without calling [`StagedWrite::commit`] removes the temp file
/// and leaves the journal as it was.
#[derive(Debug)]
pub struct StagedWrite {
    temp: NamedTempFile,
    target: PathBuf,
}

impl StagedWrite {
    /// Path of the temp file holding the staged document.
    pub fn temp_path(&self) -> &Path {
        self.temp.path()
    }

    /// Atomically replace the journal with the staged document.
    pub fn commit(self) -> Result<(), JournalError> {
        let target = self.target;
        self.temp
            .persist(&target)
            .map_err(|e| JournalError::WriteFailed {
                path: target.clone(),
                source: e.error,
            })?;
        Ok(())
    }
}

/// Journal backed by a single JSON file.
#[derive(Debug, Clone)]
pub struct EventJournal {
    path: PathBuf,
}

impl EventJournal {
    /// Create a journal stored at `path`. Nothing touches the disk until the first append.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Location of the journal file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read every persisted event in append order.
    ///
    /// A journal that does not exist yet is an empty journal, not an error.
    pub fn read_all(&self) -> Result<Vec<Event>, JournalError> {
        let bytes = match fs::read(&self.path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => {
                return Err(JournalError::ReadFailed {
                    path: self.path.clone(),
                    source: e,
                })
            }
        };

        serde_json::from_slice(&bytes).map_err(|e| JournalError::CorruptData {
            path: self.path.clone(),
            reason: e.to_string(),
        })
    }

    /// Append one event.
    ///
    /// An unreadable or malformed journal is treated as empty so the event is
    /// still recorded; the outcome reports it and the damaged file is copied
    /// aside first.
    pub fn append(&self, event: Event) -> Result<AppendOutcome, JournalError> {
        let (mut events, recovered) = match self.read_all() {
            Ok(events) => (events, None),
            Err(e) => {
                let recovery = Recovery {
                    reason: e.to_string(),
                    backup: self.backup_damaged(),
                };
                (Vec::new(), Some(recovery))
            }
        };

        events.push(event);
        self.stage(&events)?.commit()?;

        Ok(AppendOutcome {
            total_events: events.len(),
            recovered,
        })
    }

    /// Serialize `events` into a synced temp file beside the journal.
    pub fn stage(&self, events: &[Event]) -> Result<StagedWrite, JournalError> {
        let write_failed = |source: io::Error| JournalError::WriteFailed {
            path: self.path.clone(),
            source,
        };

        let dir = self.directory();
        fs::create_dir_all(&dir).map_err(write_failed)?;

        if let Err(e) = self.remove_stale_temp_files(STALE_TEMP_AGE) {
            tracing::debug!(error = %e, "Could not sweep stale journal temp files");
        }

        let json = serde_json::to_vec_pretty(events)
            .map_err(|e| write_failed(io::Error::new(io::ErrorKind::Other, e)))?;

        let mut temp = tempfile::Builder::new()
            .prefix(TEMP_PREFIX)
            .suffix(TEMP_SUFFIX)
            .tempfile_in(&dir)
            .map_err(write_failed)?;
        temp.write_all(&json).map_err(write_failed)?;
        temp.as_file().sync_all().map_err(write_failed)?;

        Ok(StagedWrite {
            temp,
            target: self.path.clone(),
        })
    }

    /// Delete temp files left beside the journal by writes that were killed
    /// before committing. Only files at least `older_than` old are touched, so
    /// a write in flight from another process is left alone.
    pub fn remove_stale_temp_files(&self, older_than: Duration) -> io::Result<usize> {
        let entries = match fs::read_dir(self.directory()) {
            Ok(entries) => entries,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(0),
            Err(e) => return Err(e),
        };

        let now = SystemTime::now();
        let mut removed = 0;
        for entry in entries {
            let entry = entry?;
            let name = entry.file_name();
            let name = name.to_string_lossy();
            if !name.starts_with(TEMP_PREFIX) || !name.ends_with(TEMP_SUFFIX) {
                continue;
            }

            let metadata = entry.metadata()?;
            if !metadata.is_file() {
                continue;
            }
            let age = metadata
                .modified()
                .ok()
                .and_then(|modified| now.duration_since(modified).ok())
                .unwrap_or(Duration::ZERO);
            if age < older_than {
                continue;
            }

            match fs::remove_file(entry.path()) {
                Ok(()) => {
                    tracing::info!(path = %entry.path().display(), "Removed stale journal temp file");
                    removed += 1;
                }
                Err(e) if e.kind() == io::ErrorKind::NotFound => {}
                Err(e) => return Err(e),
            }
        }
        Ok(removed)
    }

    fn directory(&self) -> PathBuf {
        match self.path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => PathBuf::from("."),
        }
    }

    /// Copy a damaged journal aside before it gets replaced.
    fn backup_damaged(&self) -> Option<PathBuf> {
        let file_name = self.path.file_name()?.to_string_lossy().into_owned();
        let backup = self.path.with_file_name(format!(
            "{file_name}.corrupt-{}",
            Utc::now().format("%Y%m%dT%H%M%S")
        ));
        fs::copy(&self.path, &backup).ok().map(|_| backup)
    }
}
