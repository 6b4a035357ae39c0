//! Curfew Agent - power-state journal and red zone evaluator.
//!
//! The agent records when the machine sleeps, wakes, and powers off (plus
//! its own start and stop) in a durable journal, and decides whether the
//! current time falls inside a configured "red zone" such as late night.
//!
//! # Architecture
//!
//! ```text
//! ┌───────────────────────────────────────────────────────────┐
//! │                       Curfew Agent                        │
//! ├───────────────────────────────────────────────────────────┤
//! │  ┌─────────────┐   ┌─────────────┐   ┌─────────────┐      │
//! │  │  Collector  │──▶│  Recorder   │──▶│   Journal   │      │
//! │  │ (OS power)  │   │ (one owner) │   │ (atomic IO) │      │
//! │  └─────────────┘   └─────────────┘   └─────────────┘      │
//! │                           │                               │
//! │                           ▼                               │
//! │                    ┌─────────────┐                        │
//! │                    │ Time window │                        │
//! │                    │  (red zone) │                        │
//! │                    └─────────────┘                        │
//! └───────────────────────────────────────────────────────────┘
//! ```
//!
//! # Example
//!
//! ```no_run
//! use curfew_agent::{EventJournal, Event, EventKind, TimeWindow, ClockTime};
//!
//! let journal = EventJournal::new("/tmp/events_journal.json");
//! journal.append(Event::now(EventKind::Sleep)).expect("append failed");
//!
//! let window = TimeWindow::late_night();
//! let inside = window.contains(ClockTime::new(23, 30).unwrap());
//! assert!(inside);
//! ```

pub mod collector;
pub mod config;
pub mod core;
pub mod journal;
pub mod recorder;

// Re-export key types at crate root for convenience
pub use collector::{ChannelObserver, Collector, CollectorError, PowerObserver};
pub use config::{Config, ConfigError};
pub use self::core::{clock_time_at, is_within, ClockTime, TimeWindow, WindowError};
pub use journal::{
    AppendOutcome, Event, EventJournal, EventKind, JournalError, Recovery, StagedWrite,
    SystemEventLog,
};
pub use recorder::{Recorder, RecorderStats, RedZoneStatus};

/// Library version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
