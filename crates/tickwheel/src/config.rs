//! Scheduler configuration.
//!
//! Provides configuration for the scheduler including the default
//! timezone for due checks and the time-to-live of per-job locks.

use serde::{Deserialize, Serialize};

use crate::SchedulerError;

/// Configuration for the scheduler.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchedulerConfig {
    /// Default timezone for due checks (IANA timezone string, e.g.
    /// "America/New_York"). Jobs may override it per schedule.
    /// Defaults to "UTC".
    #[serde(default = "default_timezone")]
    pub default_timezone: String,

    /// Time-to-live in seconds for per-job locks. Long-running jobs may
    /// extend their own lock via `JobLock::refresh`.
    /// Defaults to 300 seconds.
    #[serde(default = "default_lock_ttl")]
    pub lock_ttl_secs: u64,
}

fn default_timezone() -> String {
    "UTC".to_string()
}

fn default_lock_ttl() -> u64 {
    300
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            default_timezone: default_timezone(),
            lock_ttl_secs: default_lock_ttl(),
        }
    }
}

impl SchedulerConfig {
    /// Parse the configured timezone string into a chrono_tz::Tz.
    ///
    /// # Errors
    ///
    /// Returns `SchedulerError::InvalidTimezone` if the timezone string
    /// is not a valid IANA timezone identifier.
    pub fn parse_timezone(&self) -> Result<chrono_tz::Tz, SchedulerError> {
        self.default_timezone
            .parse::<chrono_tz::Tz>()
            .map_err(|_| SchedulerError::InvalidTimezone(self.default_timezone.clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = SchedulerConfig::default();
        assert_eq!(config.default_timezone, "UTC");
        assert_eq!(config.lock_ttl_secs, 300);
    }

    #[test]
    fn test_parse_timezone() {
        let config = SchedulerConfig {
            default_timezone: "Europe/Prague".to_string(),
            ..Default::default()
        };
        let tz = config.parse_timezone().unwrap();
        assert_eq!(tz.name(), "Europe/Prague");
    }

    #[test]
    fn test_parse_invalid_timezone() {
        let config = SchedulerConfig {
            default_timezone: "Invalid/Zone".to_string(),
            ..Default::default()
        };
        match config.parse_timezone() {
            Err(SchedulerError::InvalidTimezone(tz)) => assert_eq!(tz, "Invalid/Zone"),
            other => panic!("expected InvalidTimezone error, got {other:?}"),
        }
    }

    #[test]
    fn test_serde_defaults() {
        let config: SchedulerConfig = serde_json::from_str("{}").unwrap();
        assert_eq!(config.default_timezone, "UTC");
        assert_eq!(config.lock_ttl_secs, 300);

        let config: SchedulerConfig =
            serde_json::from_str(r#"{"default_timezone":"Asia/Tokyo","lock_ttl_secs":60}"#)
                .unwrap();
        assert_eq!(config.default_timezone, "Asia/Tokyo");
        assert_eq!(config.lock_ttl_secs, 60);
    }
}
