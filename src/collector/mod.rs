//! Power notification collection for the curfew agent.
//!
//! Each platform binding turns OS power notifications into journal events
//! delivered on a channel. The rest of the agent only sees [`Notification`]s,
//! which wrap an [`Event`](crate::journal::Event).

pub mod types;

#[cfg(target_os = "macos")]
pub mod macos;

#[cfg(target_os = "windows")]
pub mod windows;

#[cfg(not(any(target_os = "macos", target_os = "windows")))]
pub mod noop;

// Re-export commonly used types
pub use types::{
    wait_for_registration, ChannelObserver, CollectorError, Notification, PowerObserver,
    RegistrationReport, CHANNEL_CAPACITY, REGISTRATION_TIMEOUT,
};

#[cfg(target_os = "macos")]
pub use macos::{backend_name, MacOSCollector};

/// Platform-agnostic collector type alias
#[cfg(target_os = "macos")]
pub type Collector = MacOSCollector;

#[cfg(target_os = "windows")]
pub use self::windows::{backend_name, WindowsCollector};

/// Platform-agnostic collector type alias
#[cfg(target_os = "windows")]
pub type Collector = WindowsCollector;

#[cfg(not(any(target_os = "macos", target_os = "windows")))]
pub use noop::{backend_name, NoopCollector};

/// Platform-agnostic collector type alias
#[cfg(not(any(target_os = "macos", target_os = "windows")))]
pub type Collector = NoopCollector;
