//! Clock-time windows that may wrap past midnight.
//!
//! A [`TimeWindow`] is half-open: the start minute is inside, the end minute
//! is not. When start is later than end the window wraps past midnight.

use chrono::{DateTime, Local, Timelike, Utc};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

const MINUTES_PER_HOUR: u16 = 60;

/// Errors building clock times.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum WindowError {
    #[error("clock time {hour}:{minute:02} is out of range (hour 0-23, minute 0-59)")]
    OutOfRange { hour: u32, minute: u32 },

    #[error("malformed clock time '{0}', expected HH:MM")]
    Malformed(String),
}

/// An hour:minute wall-clock time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ClockTime {
    hour: u8,
    minute: u8,
}

impl ClockTime {
    pub const MIDNIGHT: ClockTime = ClockTime { hour: 0, minute: 0 };

    pub fn new(hour: u32, minute: u32) -> Result<Self, WindowError> {
        if hour > 23 || minute > 59 {
            return Err(WindowError::OutOfRange { hour, minute });
        }
        Ok(Self {
            hour: hour as u8,
            minute: minute as u8,
        })
    }

    /// Take the hour and minute of any chrono time, ignoring seconds.
    pub fn from_timelike<T: Timelike>(time: &T) -> Self {
        Self {
            hour: time.hour() as u8,
            minute: time.minute() as u8,
        }
    }

    pub fn hour(&self) -> u8 {
        self.hour
    }

    pub fn minute(&self) -> u8 {
        self.minute
    }

    /// Minutes since midnight, 0 through 1439.
    pub fn minutes_since_midnight(&self) -> u16 {
        u16::from(self.hour) * MINUTES_PER_HOUR + u16::from(self.minute)
    }
}

impl fmt::Display for ClockTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:02}:{:02}", self.hour, self.minute)
    }
}

impl FromStr for ClockTime {
    type Err = WindowError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let malformed = || WindowError::Malformed(s.to_string());
        let (hour, minute) = s.trim().split_once(':').ok_or_else(malformed)?;
        let hour: u32 = hour.parse().map_err(|_| malformed())?;
        let minute: u32 = minute.parse().map_err(|_| malformed())?;
        Self::new(hour, minute)
    }
}

impl TryFrom<String> for ClockTime {
    type Error = WindowError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<ClockTime> for String {
    fn from(value: ClockTime) -> Self {
        value.to_string()
    }
}

/// A configured hour:minute interval, start inclusive and end exclusive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeWindow {
    pub start: ClockTime,
    pub end: ClockTime,
}

impl TimeWindow {
    pub fn new(start: ClockTime, end: ClockTime) -> Self {
        Self { start, end }
    }

    /// The default red zone, 22:00 until 03:00.
    pub fn late_night() -> Self {
        Self {
            start: ClockTime { hour: 22, minute: 0 },
            end: ClockTime { hour: 3, minute: 0 },
        }
    }

    /// Whether the window wraps past midnight.
    pub fn crosses_midnight(&self) -> bool {
        self.start > self.end
    }

    /// A window whose start equals its end contains no time at all.
    pub fn is_empty(&self) -> bool {
        self.start == self.end
    }

    pub fn contains(&self, current: ClockTime) -> bool {
        is_within(current, *self)
    }
}

impl Default for TimeWindow {
    fn default() -> Self {
        Self::late_night()
    }
}

impl fmt::Display for TimeWindow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.start, self.end)
    }
}

/// Decide whether `current` falls inside `window`.
pub fn is_within(current: ClockTime, window: TimeWindow) -> bool {
    let current = current.minutes_since_midnight();
    let start = window.start.minutes_since_midnight();
    let end = window.end.minutes_since_midnight();

    if start <= end {
        start <= current && current < end
    } else {
        current >= start || current < end
    }
}

/// Wall-clock time of `instant` in `tz`, or in the system zone when `tz` is `None`.
pub fn clock_time_at(instant: DateTime<Utc>, tz: Option<Tz>) -> ClockTime {
    match tz {
        Some(tz) => ClockTime::from_timelike(&instant.with_timezone(&tz)),
        None => ClockTime::from_timelike(&instant.with_timezone(&Local)),
    }
}
