//! Event journal for the curfew agent.
//!
//! This module holds the durable record of power and lifecycle transitions,
//! plus the auxiliary text log kept for people reading along.

pub mod event;
pub mod store;
pub mod text_log;

// Re-export commonly used types
pub use event::{Event, EventKind};
pub use store::{AppendOutcome, EventJournal, JournalError, Recovery, StagedWrite, STALE_TEMP_AGE};
pub use text_log::SystemEventLog;
