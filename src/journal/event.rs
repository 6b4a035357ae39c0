//! Journal event types.
//!
//! An [`Event`] is an immutable record of one power or lifecycle transition.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// The closed set of transitions the journal records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    /// The system is about to sleep
    Sleep,
    /// The system woke up
    Wake,
    /// The system is about to power off
    PowerOff,
    /// The agent started
    AppStart,
    /// The agent is shutting down
    AppClose,
}

impl EventKind {
    /// All kinds, in declaration order.
    pub const ALL: [EventKind; 5] = [
        EventKind::Sleep,
        EventKind::Wake,
        EventKind::PowerOff,
        EventKind::AppStart,
        EventKind::AppClose,
    ];

    /// The tag used in the persisted journal.
    pub fn as_str(&self) -> &'static str {
        match self {
            EventKind::Sleep => "sleep",
            EventKind::Wake => "wake",
            EventKind::PowerOff => "power_off",
            EventKind::AppStart => "app_start",
            EventKind::AppClose => "app_close",
        }
    }

    /// Human-readable sentence for the text log.
    pub fn description(&self) -> &'static str {
        match self {
            EventKind::Sleep => "System will go to sleep",
            EventKind::Wake => "System did wake up",
            EventKind::PowerOff => "System will power off",
            EventKind::AppStart => "App started",
            EventKind::AppClose => "App closed",
        }
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EventKind {
    type Err = String;

    /// Accepts both `power_off` and `power-off` spellings.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_lowercase().replace('-', "_");
        EventKind::ALL
            .into_iter()
            .find(|kind| kind.as_str() == normalized)
            .ok_or_else(|| format!("unknown event kind: {s}"))
    }
}

/// A single recorded transition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Event {
    /// Wall-clock instant the transition was observed
    pub timestamp: DateTime<Utc>,
    /// What happened
    pub kind: EventKind,
}

impl Event {
    pub fn new(kind: EventKind, timestamp: DateTime<Utc>) -> Self {
        Self { timestamp, kind }
    }

    /// Create an event stamped with the current time.
    pub fn now(kind: EventKind) -> Self {
        Self::new(kind, Utc::now())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_kind_tags() {
        assert_eq!(EventKind::PowerOff.as_str(), "power_off");
        assert_eq!(EventKind::AppStart.to_string(), "app_start");
    }

    #[test]
    fn test_kind_parsing() {
        assert_eq!("sleep".parse::<EventKind>(), Ok(EventKind::Sleep));
        assert_eq!("power-off".parse::<EventKind>(), Ok(EventKind::PowerOff));
        assert_eq!("APP_CLOSE".parse::<EventKind>(), Ok(EventKind::AppClose));
        assert!("reboot".parse::<EventKind>().is_err());
    }

    #[test]
    fn test_event_serialization_shape() {
        let at = Utc.with_ymd_and_hms(2024, 2, 1, 22, 15, 0).unwrap();
        let event = Event::new(EventKind::Wake, at);
        let json = serde_json::to_value(&event).unwrap();

        assert_eq!(json["kind"], "wake");
        assert_eq!(json["timestamp"], "2024-02-01T22:15:00Z");
    }
}
