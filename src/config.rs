//! Configuration for the curfew agent.

use crate::core::TimeWindow;
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Main configuration for the agent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Where the event journal is stored
    pub journal_path: PathBuf,

    /// Optional human-readable log of the same transitions
    pub text_log_path: Option<PathBuf>,

    /// The red zone window
    pub red_zone: TimeWindow,

    /// IANA time zone used to read the clock; the system zone when unset
    pub timezone: Option<String>,

    /// How often a running agent re-evaluates the red zone (in seconds)
    pub check_interval_secs: u64,
}

impl Default for Config {
    fn default() -> Self {
        let data_dir = Self::data_dir();

        Self {
            journal_path: data_dir.join("events_journal.json"),
            text_log_path: Some(data_dir.join("SystemEvents.log")),
            red_zone: TimeWindow::late_night(),
            timezone: None,
            check_interval_secs: 60,
        }
    }
}

impl Config {
    /// Load configuration from the default location.
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from(&Self::config_path())
    }

    /// Load configuration from `path`, falling back to defaults when it does not exist.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path)?;
        let config: Config = serde_json::from_str(&content).map_err(ConfigError::Parse)?;
        config.time_zone()?;
        Ok(config)
    }

    /// Save configuration to the default location.
    pub fn save(&self) -> Result<(), ConfigError> {
        self.save_to(&Self::config_path())
    }

    pub fn save_to(&self, path: &Path) -> Result<(), ConfigError> {
        // Ensure parent directory exists
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let content = serde_json::to_string_pretty(self).map_err(ConfigError::Serialize)?;
        std::fs::write(path, content)?;

        Ok(())
    }

    /// Get the path to the configuration file.
    pub fn config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("curfew-agent")
            .join("config.json")
    }

    /// Directory holding the journal and text log by default.
    pub fn data_dir() -> PathBuf {
        dirs::data_local_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("curfew-agent")
    }

    /// The configured time zone, if any.
    pub fn time_zone(&self) -> Result<Option<Tz>, ConfigError> {
        match self.timezone.as_deref() {
            None => Ok(None),
            Some(name) => name
                .parse::<Tz>()
                .map(Some)
                .map_err(|_| ConfigError::UnknownTimezone(name.to_string())),
        }
    }
}

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Parse error: {0}")]
    Parse(#[source] serde_json::Error),

    #[error("Serialize error: {0}")]
    Serialize(#[source] serde_json::Error),

    #[error("Unknown time zone: {0}")]
    UnknownTimezone(String),
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::ClockTime;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.red_zone, TimeWindow::late_night());
        assert_eq!(config.check_interval_secs, 60);
        assert!(config.journal_path.ends_with("events_journal.json"));
        assert!(config.time_zone().unwrap().is_none());
    }

    #[test]
    fn test_round_trip_through_file() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("config.json");

        let config = Config {
            red_zone: TimeWindow::new(
                ClockTime::new(23, 30).unwrap(),
                ClockTime::new(6, 0).unwrap(),
            ),
            timezone: Some("Europe/Kyiv".to_string()),
            ..Config::default()
        };
        config.save_to(&path).unwrap();

        let loaded = Config::load_from(&path).unwrap();
        assert_eq!(loaded, config);
        assert_eq!(loaded.time_zone().unwrap(), Some(chrono_tz::Europe::Kyiv));
    }

    #[test]
    fn test_missing_file_gives_defaults() {
        let dir = tempfile::TempDir::new().unwrap();
        let loaded = Config::load_from(&dir.path().join("absent.json")).unwrap();
        assert_eq!(loaded, Config::default());
    }

    #[test]
    fn test_partial_file_fills_defaults() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(&path, r#"{"red_zone":{"start":"21:00","end":"05:30"}}"#).unwrap();

        let loaded = Config::load_from(&path).unwrap();
        assert_eq!(loaded.red_zone.start, ClockTime::new(21, 0).unwrap());
        assert_eq!(loaded.check_interval_secs, 60);
    }

    #[test]
    fn test_unknown_timezone_rejected() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(&path, r#"{"timezone":"Mars/Olympus"}"#).unwrap();

        assert!(matches!(
            Config::load_from(&path),
            Err(ConfigError::UnknownTimezone(_))
        ));
    }
}
