//! Cron pattern seam.
//!
//! Pattern parsing and occurrence computation are owned by the `croner`
//! crate; this module only adapts it to the scheduler's minute-level
//! due checks. Patterns use the five-field cron syntax with macros
//! (`@hourly`, ...), lists, ranges, steps and the `L`/`W`/`#`
//! day extensions.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, TimeZone, Timelike};
use croner::Cron;

use crate::SchedulerError;

/// A parsed cron pattern.
///
/// Matching is minute-level: a pattern matches a point in time when it
/// matches the minute containing it, regardless of the second.
///
/// # Example
///
/// ```
/// use tickwheel::CronPattern;
///
/// let pattern: CronPattern = "*/5 * * * *".parse().unwrap();
/// assert_eq!(pattern.as_str(), "*/5 * * * *");
/// ```
#[derive(Clone)]
pub struct CronPattern {
    cron: Cron,
    raw: String,
}

impl CronPattern {
    /// Parse a five-field cron pattern.
    ///
    /// # Errors
    ///
    /// Returns `SchedulerError::InvalidPattern` if the pattern is not
    /// valid cron syntax.
    pub fn parse(pattern: &str) -> Result<Self, SchedulerError> {
        let cron = Cron::new(pattern)
            .parse()
            .map_err(|e| SchedulerError::InvalidPattern {
                pattern: pattern.to_string(),
                message: e.to_string(),
            })?;

        Ok(Self {
            cron,
            raw: pattern.to_string(),
        })
    }

    /// The original pattern string.
    pub fn as_str(&self) -> &str {
        &self.raw
    }

    /// Whether the pattern matches the minute containing `time`.
    pub fn matches_minute<Tz: TimeZone>(&self, time: &DateTime<Tz>) -> Result<bool, SchedulerError> {
        let minute = time
            .with_second(0)
            .and_then(|t| t.with_nanosecond(0))
            .unwrap_or_else(|| time.clone());

        self.cron
            .is_time_matching(&minute)
            .map_err(|e| SchedulerError::InvalidPattern {
                pattern: self.raw.clone(),
                message: e.to_string(),
            })
    }

    /// The next matching time strictly after `after`.
    ///
    /// # Errors
    ///
    /// Returns `SchedulerError::InvalidPattern` if no occurrence can be
    /// computed (e.g. the pattern never matches within the supported
    /// time range).
    pub fn next_match<Tz: TimeZone>(&self, after: &DateTime<Tz>) -> Result<DateTime<Tz>, SchedulerError> {
        self.cron
            .find_next_occurrence(after, false)
            .map_err(|e| SchedulerError::InvalidPattern {
                pattern: self.raw.clone(),
                message: e.to_string(),
            })
    }
}

impl fmt::Display for CronPattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}

impl fmt::Debug for CronPattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("CronPattern").field(&self.raw).finish()
    }
}

impl FromStr for CronPattern {
    type Err = SchedulerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}
