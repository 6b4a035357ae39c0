//! Records transitions and evaluates the red zone.
//!
//! The [`Recorder`] owns the journal for the lifetime of the agent. Every
//! producer reaches the journal through it, one event at a time.

use crate::collector::PowerObserver;
use crate::core::{clock_time_at, ClockTime, TimeWindow};
use crate::journal::{AppendOutcome, Event, EventJournal, JournalError, SystemEventLog};
use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use serde::Serialize;

/// Outcome of evaluating one instant against the red zone.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct RedZoneStatus {
    pub at: DateTime<Utc>,
    /// Wall-clock time the instant was evaluated as
    pub clock: ClockTime,
    pub window: TimeWindow,
    pub inside: bool,
}

/// Counters for the current agent session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct RecorderStats {
    pub recorded: u64,
    pub failed: u64,
    pub recovered: u64,
    pub session_start: DateTime<Utc>,
}

pub struct Recorder {
    journal: EventJournal,
    text_log: Option<SystemEventLog>,
    red_zone: TimeWindow,
    tz: Option<Tz>,
    stats: RecorderStats,
}

impl Recorder {
    pub fn new(
        journal: EventJournal,
        text_log: Option<SystemEventLog>,
        red_zone: TimeWindow,
        tz: Option<Tz>,
    ) -> Self {
        Self {
            journal,
            text_log,
            red_zone,
            tz,
            stats: RecorderStats {
                recorded: 0,
                failed: 0,
                recovered: 0,
                session_start: Utc::now(),
            },
        }
    }

    pub fn journal(&self) -> &EventJournal {
        &self.journal
    }

    pub fn red_zone(&self) -> TimeWindow {
        self.red_zone
    }

    pub fn stats(&self) -> RecorderStats {
        self.stats
    }

    /// Append `event` to the journal, then mirror it to the text log.
    ///
    /// Text log failures are logged and otherwise ignored.
    pub fn record(&mut self, event: Event) -> Result<AppendOutcome, JournalError> {
        let outcome = match self.journal.append(event.clone()) {
            Ok(outcome) => outcome,
            Err(e) => {
                self.stats.failed += 1;
                return Err(e);
            }
        };
        self.stats.recorded += 1;

        if let Some(ref recovery) = outcome.recovered {
            self.stats.recovered += 1;
            match recovery.backup {
                Some(ref backup) => tracing::warn!(
                    "Journal was unreadable ({}); damaged copy kept at {}",
                    recovery.reason,
                    backup.display()
                ),
                None => tracing::warn!(
                    "Journal was unreadable ({}); started a new one",
                    recovery.reason
                ),
            }
        }

        tracing::info!(
            kind = %event.kind,
            total = outcome.total_events,
            "Recorded event"
        );

        if let Some(ref log) = self.text_log {
            if let Err(e) = log.append(&event) {
                tracing::warn!("Could not write to {}: {e}", log.path().display());
            }
        }

        Ok(outcome)
    }

    /// Decide whether `at` falls inside the red zone. Takes no action.
    pub fn evaluate(&self, at: DateTime<Utc>) -> RedZoneStatus {
        let clock = clock_time_at(at, self.tz);
        RedZoneStatus {
            at,
            clock,
            window: self.red_zone,
            inside: self.red_zone.contains(clock),
        }
    }

    pub fn evaluate_now(&self) -> RedZoneStatus {
        self.evaluate(Utc::now())
    }

    /// Get a summary string for display.
    pub fn summary(&self) -> String {
        let stats = self.stats;
        format!(
            "Session Statistics:\n\
             - Events recorded: {}\n\
             - Events failed: {}\n\
             - Journal recoveries: {}\n\
             - Session duration: {} seconds\n\
             - Journal: {}",
            stats.recorded,
            stats.failed,
            stats.recovered,
            (Utc::now() - stats.session_start).num_seconds(),
            self.journal.path().display()
        )
    }
}

impl PowerObserver for Recorder {
    fn observe(&mut self, event: Event) {
        let kind = event.kind;
        if let Err(e) = self.record(event) {
            tracing::error!("Failed to record {kind} event: {e}");
        }
    }
}
