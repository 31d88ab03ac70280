//! Time source abstraction.
//!
//! The scheduler's notion of "now" only moves forward by waiting or by
//! a job's own execution time elapsing, so both reads and waits go
//! through the [`Clock`] trait. [`SystemClock`] is the production
//! implementation; [`ManualClock`] is exported for tests, where sleeps
//! must complete instantly and jobs need to move time themselves.

use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};

/// Source of the current time and of waits until a future time.
#[async_trait]
pub trait Clock: Send + Sync {
    /// Current time.
    fn now(&self) -> DateTime<Utc>;

    /// Wait for the given duration.
    async fn sleep(&self, duration: Duration);
}

/// Wall-clock time with real waits.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

#[async_trait]
impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }

    async fn sleep(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }
}

/// Frozen clock whose time only moves when told to.
///
/// `sleep` advances the frozen time by the requested duration and
/// returns immediately, so scheduler runs that span a minute of
/// simulated time finish in microseconds. Jobs under test can hold a
/// clone and call [`ManualClock::advance`] to simulate their own
/// execution time.
#[derive(Debug)]
pub struct ManualClock {
    now: Mutex<DateTime<Utc>>,
}

impl ManualClock {
    /// Create a clock frozen at the given time.
    pub fn new(now: DateTime<Utc>) -> Self {
        Self {
            now: Mutex::new(now),
        }
    }

    /// Create a clock frozen at the given Unix timestamp.
    pub fn at_timestamp(secs: i64) -> Self {
        Self::new(Utc.timestamp_opt(secs, 0).single().unwrap_or_default())
    }

    /// Move the frozen time forward.
    pub fn advance(&self, duration: Duration) {
        let mut now = self.now.lock().unwrap();
        *now += chrono::Duration::from_std(duration).unwrap_or_default();
    }

    /// Move the frozen time forward by whole seconds.
    pub fn advance_secs(&self, secs: u64) {
        self.advance(Duration::from_secs(secs));
    }
}

#[async_trait]
impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.lock().unwrap()
    }

    async fn sleep(&self, duration: Duration) {
        self.advance(duration);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_manual_clock_starts_frozen() {
        let clock = ManualClock::at_timestamp(1);
        assert_eq!(clock.now().timestamp(), 1);
        assert_eq!(clock.now(), clock.now());
    }

    #[test]
    fn test_manual_clock_advance() {
        let clock = ManualClock::at_timestamp(0);
        clock.advance_secs(90);
        assert_eq!(clock.now().timestamp(), 90);
    }

    #[tokio::test]
    async fn test_manual_clock_sleep_advances_instantly() {
        let clock = ManualClock::at_timestamp(10);
        clock.sleep(Duration::from_secs(3600)).await;
        assert_eq!(clock.now().timestamp(), 3610);
    }

    #[tokio::test(start_paused = true)]
    async fn test_system_clock_sleep() {
        // Paused tokio time auto-advances, so this returns immediately.
        SystemClock.sleep(Duration::from_secs(5)).await;
    }
}
