//! Job schedule registry.
//!
//! Ordered collection of registered jobs keyed by id. Iteration order
//! is insertion order, independent of id type. Registering under an id
//! already in use replaces the schedule while keeping its original
//! position.

use std::fmt;
use std::sync::Arc;

use chrono_tz::Tz;
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::jobs::Job;
use crate::pattern::CronPattern;

/// Identifier of a registered job schedule.
///
/// Either explicitly supplied (integer or name) or assigned by the
/// registry as an auto-incrementing integer distinct from any explicit
/// integer id already used.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum JobId {
    /// Integer id, explicit or auto-assigned.
    Integer(i64),
    /// Explicit name id.
    Name(String),
}

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            JobId::Integer(n) => write!(f, "{n}"),
            JobId::Name(name) => f.write_str(name),
        }
    }
}

impl From<i64> for JobId {
    fn from(id: i64) -> Self {
        JobId::Integer(id)
    }
}

impl From<i32> for JobId {
    fn from(id: i32) -> Self {
        JobId::Integer(id.into())
    }
}

impl From<&str> for JobId {
    fn from(id: &str) -> Self {
        JobId::Name(id.to_string())
    }
}

impl From<String> for JobId {
    fn from(id: String) -> Self {
        JobId::Name(id)
    }
}

/// A registered job with its schedule. Immutable once registered.
#[derive(Clone)]
pub struct JobSchedule {
    job: Arc<dyn Job>,
    pattern: CronPattern,
    repeat_seconds: u8,
    timezone: Option<Tz>,
}

impl JobSchedule {
    pub(crate) fn new(
        job: Arc<dyn Job>,
        pattern: CronPattern,
        repeat_seconds: u8,
        timezone: Option<Tz>,
    ) -> Self {
        Self {
            job,
            pattern,
            repeat_seconds,
            timezone,
        }
    }

    /// The job itself.
    pub fn job(&self) -> &Arc<dyn Job> {
        &self.job
    }

    /// The job's cron pattern.
    pub fn pattern(&self) -> &CronPattern {
        &self.pattern
    }

    /// Seconds between sub-minute re-executions; 0 disables repeating.
    pub fn repeat_seconds(&self) -> u8 {
        self.repeat_seconds
    }

    /// Timezone override for due checks.
    pub fn timezone(&self) -> Option<Tz> {
        self.timezone
    }
}

impl fmt::Debug for JobSchedule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("JobSchedule")
            .field("job", &self.job.name())
            .field("pattern", &self.pattern)
            .field("repeat_seconds", &self.repeat_seconds)
            .field("timezone", &self.timezone)
            .finish()
    }
}

/// Optional settings for registering a job.
#[derive(Debug, Clone, Default)]
pub struct JobOptions {
    pub(crate) id: Option<JobId>,
    pub(crate) repeat_seconds: u8,
    pub(crate) timezone: Option<Tz>,
}

impl JobOptions {
    /// Create empty options: auto-assigned id, no repeats, default
    /// timezone.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register under an explicit id instead of an auto-assigned one.
    #[must_use]
    pub fn with_id(mut self, id: impl Into<JobId>) -> Self {
        self.id = Some(id.into());
        self
    }

    /// Re-execute the job within each matched minute, every
    /// `repeat_seconds` seconds (1..=59; 0 disables repeating).
    #[must_use]
    pub fn repeat_every(mut self, repeat_seconds: u8) -> Self {
        self.repeat_seconds = repeat_seconds;
        self
    }

    /// Evaluate the job's pattern in this timezone instead of the
    /// scheduler's default.
    #[must_use]
    pub fn in_timezone(mut self, timezone: Tz) -> Self {
        self.timezone = Some(timezone);
        self
    }
}

/// Insertion-ordered mapping of id to job schedule.
#[derive(Debug, Default)]
pub(crate) struct ScheduleRegistry {
    entries: Vec<(JobId, JobSchedule)>,
    next_auto_id: i64,
}

impl ScheduleRegistry {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Insert a schedule, assigning an id when none is given.
    ///
    /// An explicit id already in use silently replaces the previous
    /// schedule, keeping its position. Auto-assigned integer ids never
    /// collide with explicit integer ids registered before them.
    pub(crate) fn insert(&mut self, id: Option<JobId>, schedule: JobSchedule) -> JobId {
        let id = id.unwrap_or(JobId::Integer(self.next_auto_id));
        if let JobId::Integer(n) = &id {
            self.next_auto_id = self.next_auto_id.max(*n + 1);
        }

        if let Some((_, existing)) = self.entries.iter_mut().find(|(eid, _)| *eid == id) {
            warn!(job_id = %id, "replacing schedule registered under the same id");
            *existing = schedule;
        } else {
            self.entries.push((id.clone(), schedule));
        }

        id
    }

    pub(crate) fn get(&self, id: &JobId) -> Option<&JobSchedule> {
        self.entries
            .iter()
            .find(|(eid, _)| eid == id)
            .map(|(_, schedule)| schedule)
    }

    /// Schedules in insertion order.
    pub(crate) fn iter(&self) -> impl Iterator<Item = (&JobId, &JobSchedule)> {
        self.entries.iter().map(|(id, schedule)| (id, schedule))
    }

    pub(crate) fn len(&self) -> usize {
        self.entries.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;

    use crate::error::BoxError;
    use crate::lock::JobLock;

    struct NoopJob;

    #[async_trait]
    impl Job for NoopJob {
        fn name(&self) -> String {
            "noop".to_string()
        }

        async fn run(&self, _lock: JobLock) -> Result<(), BoxError> {
            Ok(())
        }
    }

    fn schedule(pattern: &str) -> JobSchedule {
        JobSchedule::new(
            Arc::new(NoopJob),
            CronPattern::parse(pattern).unwrap(),
            0,
            None,
        )
    }

    #[test]
    fn test_auto_ids_increment() {
        let mut registry = ScheduleRegistry::new();
        assert_eq!(registry.insert(None, schedule("* * * * *")), JobId::from(0));
        assert_eq!(registry.insert(None, schedule("* * * * *")), JobId::from(1));
        assert_eq!(registry.len(), 2);
    }

    #[test]
    fn test_auto_ids_skip_explicit_integers() {
        let mut registry = ScheduleRegistry::new();
        registry.insert(Some(JobId::from(5)), schedule("* * * * *"));
        assert_eq!(registry.insert(None, schedule("* * * * *")), JobId::from(6));
    }

    #[test]
    fn test_name_ids_do_not_affect_auto_ids() {
        let mut registry = ScheduleRegistry::new();
        registry.insert(Some(JobId::from("nightly")), schedule("* * * * *"));
        assert_eq!(registry.insert(None, schedule("* * * * *")), JobId::from(0));
    }

    #[test]
    fn test_duplicate_id_replaces_in_place() {
        let mut registry = ScheduleRegistry::new();
        registry.insert(Some(JobId::from("a")), schedule("* * * * *"));
        registry.insert(Some(JobId::from("b")), schedule("* * * * *"));
        registry.insert(Some(JobId::from("a")), schedule("0 * * * *"));

        assert_eq!(registry.len(), 2);
        let order: Vec<_> = registry.iter().map(|(id, _)| id.clone()).collect();
        assert_eq!(order, vec![JobId::from("a"), JobId::from("b")]);
        assert_eq!(
            registry.get(&JobId::from("a")).unwrap().pattern().as_str(),
            "0 * * * *"
        );
    }

    #[test]
    fn test_iteration_is_insertion_ordered() {
        let mut registry = ScheduleRegistry::new();
        registry.insert(Some(JobId::from("z")), schedule("* * * * *"));
        registry.insert(Some(JobId::from(1)), schedule("* * * * *"));
        registry.insert(Some(JobId::from("a")), schedule("* * * * *"));

        let order: Vec<_> = registry.iter().map(|(id, _)| id.clone()).collect();
        assert_eq!(
            order,
            vec![JobId::from("z"), JobId::from(1), JobId::from("a")]
        );
    }

    #[test]
    fn test_get_unknown_id() {
        let registry = ScheduleRegistry::new();
        assert!(registry.get(&JobId::from(0)).is_none());
    }
}
