//! Core decision logic for the curfew agent.

pub mod window;

pub use window::{clock_time_at, is_within, ClockTime, TimeWindow, WindowError};
