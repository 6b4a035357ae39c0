//! Human-readable system event log.
//!
//! A plain text companion to the journal, one line per transition. It is for
//! people reading the file, never for the agent's own decisions.

use crate::journal::event::Event;
use chrono::Local;
use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};

/// Append-only text log of transitions.
#[derive(Debug, Clone)]
pub struct SystemEventLog {
    path: PathBuf,
}

impl SystemEventLog {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Format the line written for `event`.
    pub fn format_line(event: &Event) -> String {
        format!(
            "{} : {}\n",
            event
                .timestamp
                .with_timezone(&Local)
                .format("%Y-%m-%d %H:%M:%S %z"),
            event.kind.description()
        )
    }

    /// Append a line for `event`, creating the file if needed.
    pub fn append(&self, event: &Event) -> std::io::Result<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;
        file.write_all(Self::format_line(event).as_bytes())
    }
}
