//! The scheduling and execution engine.
//!
//! One `run` invocation executes every registered job that is due "now"
//! with at-most-once-concurrent execution per job, multiplexing
//! sub-minute repeats cooperatively on a single logical thread of
//! control. Waiting for the next due-second is the only suspension
//! point of the in-process path; out-of-process executions are detached
//! and their completions awaited before the run returns.

use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::clock::{Clock, SystemClock};
use crate::config::SchedulerConfig;
use crate::error::{BoxError, JobFailure, SchedulerError};
use crate::executor::{Execution, InProcessExecutor, Invocation, JobExecutor};
use crate::jobs::Job;
use crate::lock::{job_lock_name, LocalLockStore, LockStore};
use crate::pattern::CronPattern;
use crate::registry::{JobId, JobOptions, JobSchedule, ScheduleRegistry};
use crate::status::{JobInfo, JobResult, JobResultState, JobSummary, RunParameters, RunSummary};

/// Callback invoked synchronously before each job execution.
///
/// A callback failure propagates to the caller of `run`/`run_job` and
/// aborts the remainder of the current run.
pub type BeforeJobCallback = Box<dyn Fn(&JobInfo) -> Result<(), BoxError> + Send + Sync>;

/// Callback invoked synchronously after each job execution, once the
/// job's lock has been released.
pub type AfterJobCallback = Box<dyn Fn(&JobInfo, &JobResult) -> Result<(), BoxError> + Send + Sync>;

/// Handler receiving job failures instead of them being raised.
///
/// With a handler configured, `run` and `run_job` never fail for job
/// failures; the run continues with the next due job.
pub type FailureHandler = Box<dyn Fn(&JobFailure) + Send + Sync>;

/// Cron-style job scheduler.
///
/// Holds a registry of jobs paired with cron patterns and, on each
/// invocation of [`run`](Scheduler::run), executes every job that is
/// due in the minute containing the current clock value.
///
/// # Example
///
/// ```no_run
/// use std::sync::Arc;
/// use tickwheel::{CallbackJob, CronPattern, Scheduler, SchedulerConfig};
///
/// # async fn example() -> Result<(), tickwheel::SchedulerError> {
/// let mut scheduler = Scheduler::new(SchedulerConfig::default())?;
/// scheduler.add_job(
///     Arc::new(CallbackJob::new(|_lock| async { Ok(()) }).with_name("heartbeat")),
///     CronPattern::parse("* * * * *")?,
/// );
///
/// // Typically invoked once per minute, e.g. from the host's cron.
/// let summary = scheduler.run().await?;
/// assert_eq!(summary.job_summaries.len(), 1);
/// # Ok(())
/// # }
/// ```
pub struct Scheduler {
    config: SchedulerConfig,
    default_timezone: Tz,
    registry: ScheduleRegistry,
    before_job: Vec<BeforeJobCallback>,
    after_job: Vec<AfterJobCallback>,
    failure_handler: Option<FailureHandler>,
    lock_store: Arc<dyn LockStore>,
    executor: Arc<dyn JobExecutor>,
    clock: Arc<dyn Clock>,
}

/// A due job's remaining candidate due-seconds within one run.
struct Plan<'a> {
    id: &'a JobId,
    schedule: &'a JobSchedule,
    pending: VecDeque<u8>,
    attempted: bool,
}

/// Result of starting one per-job execution.
enum Executed {
    Finished(JobSummary, Option<JobFailure>),
    Detached(JobInfo, JoinHandle<Result<(), BoxError>>),
}

/// Summary slot preserving execution order across detached executions.
enum Slot {
    Ready(JobSummary),
    Pending(JobInfo, JoinHandle<Result<(), BoxError>>),
}

impl Scheduler {
    /// Create a scheduler with an in-memory lock store, the in-process
    /// executor and the system clock.
    ///
    /// # Errors
    ///
    /// Returns `SchedulerError::InvalidTimezone` if the configured
    /// default timezone is not a valid IANA identifier.
    pub fn new(config: SchedulerConfig) -> Result<Self, SchedulerError> {
        let default_timezone = config.parse_timezone()?;

        Ok(Self {
            config,
            default_timezone,
            registry: ScheduleRegistry::new(),
            before_job: Vec::new(),
            after_job: Vec::new(),
            failure_handler: None,
            lock_store: Arc::new(LocalLockStore::new()),
            executor: Arc::new(InProcessExecutor),
            clock: Arc::new(SystemClock),
        })
    }

    /// Replace the lock store.
    ///
    /// Multiple scheduler instances sharing one lock store is the
    /// intended way to coordinate job execution across processes.
    #[must_use]
    pub fn with_lock_store(mut self, lock_store: Arc<dyn LockStore>) -> Self {
        self.lock_store = lock_store;
        self
    }

    /// Replace the job executor.
    #[must_use]
    pub fn with_executor(mut self, executor: Arc<dyn JobExecutor>) -> Self {
        self.executor = executor;
        self
    }

    /// Replace the clock.
    #[must_use]
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Route job failures to a handler instead of raising them.
    #[must_use]
    pub fn with_failure_handler(mut self, handler: FailureHandler) -> Self {
        self.failure_handler = Some(handler);
        self
    }

    /// The scheduler configuration.
    pub fn config(&self) -> &SchedulerConfig {
        &self.config
    }

    /// Register a job under an auto-assigned id, without repeats, in
    /// the default timezone.
    ///
    /// Returns the assigned id.
    pub fn add_job(&mut self, job: Arc<dyn Job>, pattern: CronPattern) -> JobId {
        self.registry
            .insert(None, JobSchedule::new(job, pattern, 0, None))
    }

    /// Register a job with explicit options.
    ///
    /// Registering under an id already in use replaces the previous
    /// schedule.
    ///
    /// # Errors
    ///
    /// Returns `SchedulerError::InvalidRepeatInterval` when the repeat
    /// interval is not 0 or 1..=59 seconds.
    pub fn add_job_with(
        &mut self,
        job: Arc<dyn Job>,
        pattern: CronPattern,
        options: JobOptions,
    ) -> Result<JobId, SchedulerError> {
        if options.repeat_seconds > 59 {
            return Err(SchedulerError::InvalidRepeatInterval(options.repeat_seconds));
        }

        Ok(self.registry.insert(
            options.id,
            JobSchedule::new(job, pattern, options.repeat_seconds, options.timezone),
        ))
    }

    /// Registered schedules, in registration order.
    pub fn job_schedules(&self) -> impl Iterator<Item = (&JobId, &JobSchedule)> {
        self.registry.iter()
    }

    /// Register a callback invoked before each job execution.
    pub fn add_before_job_callback(&mut self, callback: BeforeJobCallback) {
        self.before_job.push(callback);
    }

    /// Register a callback invoked after each job execution.
    pub fn add_after_job_callback(&mut self, callback: AfterJobCallback) {
        self.after_job.push(callback);
    }

    /// Execute every job due in the minute containing the current clock
    /// value.
    ///
    /// Jobs with a repeat interval `r` are due at seconds
    /// `0, r, 2r, ... < 60`, counted as offsets from the run start; the
    /// scheduler waits out the gap to each upcoming due-second. Every
    /// job due at run start executes at least once; remaining repeats
    /// are dropped once the clock advances into a minute the job's
    /// pattern no longer matches.
    ///
    /// Returns one [`JobSummary`] per execution, in execution order
    /// (chronological by due-second, then registration order).
    ///
    /// # Errors
    ///
    /// - `SchedulerError::RunFailed` when jobs failed and no failure
    ///   handler is configured; raised only after every due job was
    ///   attempted.
    /// - `SchedulerError::CallbackFailed` when a before/after callback
    ///   failed; raised immediately, the remaining due jobs of this run
    ///   are not executed.
    pub async fn run(&self) -> Result<RunSummary, SchedulerError> {
        let start = self.clock.now();

        let mut plans = Vec::new();
        for (id, schedule) in self.registry.iter() {
            if self.is_due(schedule, start)? {
                plans.push(Plan {
                    id,
                    schedule,
                    pending: due_seconds(schedule.repeat_seconds()),
                    attempted: false,
                });
            }
        }

        debug!(due_jobs = plans.len(), total_jobs = self.registry.len(), "starting run");

        let mut slots: Vec<Slot> = Vec::new();
        let mut failures: Vec<JobFailure> = Vec::new();

        // Globally smallest pending due-second first; ties execute in
        // registration order.
        while let Some(second) = plans
            .iter()
            .filter_map(|plan| plan.pending.front().copied())
            .min()
        {
            let target = start + chrono::Duration::seconds(i64::from(second));
            let now = self.clock.now();
            if now < target {
                let gap = (target - now).to_std().unwrap_or_default();
                self.clock.sleep(gap).await;
            }

            for plan in &mut plans {
                if plan.pending.front() != Some(&second) {
                    continue;
                }
                plan.pending.pop_front();

                // Re-validate repeats: the clock may have advanced (by
                // waiting or by execution time) into a minute the
                // pattern no longer matches, so remaining repeats are
                // neither executed late nor deferred to the following
                // minute. A job that has not been attempted yet was due
                // at run start and still executes once.
                if plan.attempted && !self.is_due(plan.schedule, self.clock.now())? {
                    plan.pending.clear();
                    continue;
                }
                plan.attempted = true;

                let params = RunParameters {
                    second,
                    forced_run: false,
                };
                match self.execute_scheduled(plan.id, plan.schedule, params).await? {
                    Executed::Finished(summary, failure) => {
                        if let Some(failure) = failure {
                            self.route_failure(failure, &mut failures);
                        }
                        slots.push(Slot::Ready(summary));
                    }
                    Executed::Detached(info, handle) => {
                        slots.push(Slot::Pending(info, handle));
                    }
                }
            }
        }

        let mut summaries = Vec::with_capacity(slots.len());
        for slot in slots {
            match slot {
                Slot::Ready(summary) => summaries.push(summary),
                Slot::Pending(info, handle) => {
                    let outcome = await_detached(handle).await;
                    let (summary, failure) = self.finish_execution(info, outcome)?;
                    if let Some(failure) = failure {
                        self.route_failure(failure, &mut failures);
                    }
                    summaries.push(summary);
                }
            }
        }

        let end = self.clock.now();
        info!(
            executions = summaries.len(),
            failures = failures.len(),
            "run finished"
        );

        if !failures.is_empty() {
            return Err(SchedulerError::RunFailed {
                suppressed: failures,
            });
        }

        Ok(RunSummary {
            start,
            end,
            job_summaries: summaries,
        })
    }

    /// Execute a single registered job.
    ///
    /// With `force` set (the usual case) the job executes
    /// unconditionally, and the produced [`JobInfo`] records the forced
    /// run. Without it, the job executes only when its pattern matches
    /// the current minute; `Ok(None)` is returned otherwise. This never
    /// repeats: exactly zero or one execution.
    ///
    /// `params` supplies the pretend due-second used for bookkeeping
    /// (default 0).
    ///
    /// # Errors
    ///
    /// - `SchedulerError::UnregisteredJob` when `id` is not registered.
    /// - `SchedulerError::Job` when the job failed and no failure
    ///   handler is configured.
    /// - `SchedulerError::CallbackFailed` when a before/after callback
    ///   failed.
    pub async fn run_job(
        &self,
        id: impl Into<JobId>,
        force: bool,
        params: Option<RunParameters>,
    ) -> Result<Option<JobSummary>, SchedulerError> {
        let id = id.into();
        let schedule = self
            .registry
            .get(&id)
            .ok_or_else(|| SchedulerError::UnregisteredJob(id.clone()))?;

        if !force && !self.is_due(schedule, self.clock.now())? {
            return Ok(None);
        }

        let params = RunParameters {
            second: params.unwrap_or_default().second,
            forced_run: force,
        };

        let (summary, failure) = match self.execute_scheduled(&id, schedule, params).await? {
            Executed::Finished(summary, failure) => (summary, failure),
            Executed::Detached(info, handle) => {
                let outcome = await_detached(handle).await;
                self.finish_execution(info, outcome)?
            }
        };

        if let Some(failure) = failure {
            match &self.failure_handler {
                Some(handler) => handler(&failure),
                None => return Err(failure.into()),
            }
        }

        Ok(Some(summary))
    }

    /// Whether the schedule's pattern matches the minute containing
    /// `at`, in the schedule's timezone override or the configured
    /// default.
    fn is_due(&self, schedule: &JobSchedule, at: DateTime<Utc>) -> Result<bool, SchedulerError> {
        let tz = schedule.timezone().unwrap_or(self.default_timezone);
        schedule.pattern().matches_minute(&at.with_timezone(&tz))
    }

    /// Per-job execution: snapshot, before-callbacks, lock, executor,
    /// result, after-callbacks.
    async fn execute_scheduled(
        &self,
        id: &JobId,
        schedule: &JobSchedule,
        params: RunParameters,
    ) -> Result<Executed, SchedulerError> {
        let info = JobInfo {
            id: id.clone(),
            name: schedule.job().name(),
            pattern: schedule.pattern().as_str().to_string(),
            second: params.second(),
            forced_run: params.is_forced_run(),
            start: self.clock.now(),
        };

        for callback in &self.before_job {
            callback(&info).map_err(SchedulerError::CallbackFailed)?;
        }

        let ttl = Duration::from_secs(self.config.lock_ttl_secs);
        let lock = self.lock_store.create_lock(&job_lock_name(id), ttl);
        if !lock.try_acquire() {
            warn!(job = %info.name, job_id = %id, "job lock is busy, skipping execution");
            let result = JobResult {
                pattern: info.pattern.clone(),
                end: info.start,
                state: JobResultState::Skip,
            };
            self.run_after_callbacks(&info, &result)?;
            return Ok(Executed::Finished(JobSummary { info, result }, None));
        }

        debug!(job = %info.name, job_id = %id, second = info.second, "executing job");

        let invocation = Invocation::new(id.clone(), schedule.job().clone(), lock, params);
        match self.executor.execute(invocation).await {
            Execution::Finished(outcome) => {
                let (summary, failure) = self.finish_execution(info, outcome)?;
                Ok(Executed::Finished(summary, failure))
            }
            Execution::Detached(handle) => Ok(Executed::Detached(info, handle)),
        }
    }

    /// Build the result for a completed execution and invoke the
    /// after-callbacks. The job's lock is already released here.
    fn finish_execution(
        &self,
        info: JobInfo,
        outcome: Result<(), BoxError>,
    ) -> Result<(JobSummary, Option<JobFailure>), SchedulerError> {
        let end = self.clock.now();
        let (state, failure) = match outcome {
            Ok(()) => (JobResultState::Done, None),
            Err(source) => (
                JobResultState::Fail,
                Some(JobFailure {
                    id: info.id.clone(),
                    name: info.name.clone(),
                    second: info.second,
                    source,
                }),
            ),
        };

        info!(
            job = %info.name,
            job_id = %info.id,
            state = ?state,
            duration_ms = (end - info.start).num_milliseconds(),
            "job finished"
        );

        let result = JobResult {
            pattern: info.pattern.clone(),
            end,
            state,
        };
        self.run_after_callbacks(&info, &result)?;

        Ok((JobSummary { info, result }, failure))
    }

    fn run_after_callbacks(
        &self,
        info: &JobInfo,
        result: &JobResult,
    ) -> Result<(), SchedulerError> {
        for callback in &self.after_job {
            callback(info, result).map_err(SchedulerError::CallbackFailed)?;
        }
        Ok(())
    }

    fn route_failure(&self, failure: JobFailure, collected: &mut Vec<JobFailure>) {
        match &self.failure_handler {
            Some(handler) => handler(&failure),
            None => collected.push(failure),
        }
    }
}

/// Candidate due-seconds for one job within a matched minute.
fn due_seconds(repeat_seconds: u8) -> VecDeque<u8> {
    if repeat_seconds == 0 {
        return VecDeque::from([0]);
    }

    (0..60).step_by(usize::from(repeat_seconds)).collect()
}

async fn await_detached(handle: JoinHandle<Result<(), BoxError>>) -> Result<(), BoxError> {
    match handle.await {
        Ok(outcome) => outcome,
        Err(join_error) => Err(Box::new(join_error)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    use crate::clock::ManualClock;
    use crate::jobs::CallbackJob;

    fn counting_job(counter: &Arc<AtomicU32>) -> Arc<CallbackJob> {
        let counter = counter.clone();
        Arc::new(CallbackJob::new(move |_lock| {
            let counter = counter.clone();
            async move {
                counter.fetch_add(1, Ordering::SeqCst);
                Ok(())
            }
        }))
    }

    fn pattern(s: &str) -> CronPattern {
        CronPattern::parse(s).unwrap()
    }

    fn scheduler_at(timestamp: i64) -> (Scheduler, Arc<ManualClock>) {
        let clock = Arc::new(ManualClock::at_timestamp(timestamp));
        let scheduler = Scheduler::new(SchedulerConfig::default())
            .unwrap()
            .with_clock(clock.clone());
        (scheduler, clock)
    }

    #[test]
    fn test_due_seconds() {
        assert_eq!(due_seconds(0), VecDeque::from([0]));
        assert_eq!(due_seconds(30), VecDeque::from([0, 30]));
        assert_eq!(due_seconds(20), VecDeque::from([0, 20, 40]));
        assert_eq!(due_seconds(59), VecDeque::from([0, 59]));
        assert_eq!(due_seconds(1).len(), 60);
    }

    #[test]
    fn test_invalid_repeat_interval_rejected() {
        let (mut scheduler, _clock) = scheduler_at(0);
        let counter = Arc::new(AtomicU32::new(0));
        let result = scheduler.add_job_with(
            counting_job(&counter),
            pattern("* * * * *"),
            JobOptions::new().repeat_every(60),
        );
        assert!(matches!(
            result,
            Err(SchedulerError::InvalidRepeatInterval(60))
        ));
    }

    #[test]
    fn test_invalid_timezone_config() {
        let config = SchedulerConfig {
            default_timezone: "Invalid/Zone".to_string(),
            ..Default::default()
        };
        assert!(matches!(
            Scheduler::new(config),
            Err(SchedulerError::InvalidTimezone(_))
        ));
    }

    #[tokio::test]
    async fn test_run_with_no_jobs() {
        let (scheduler, clock) = scheduler_at(1);
        let summary = scheduler.run().await.unwrap();
        assert!(summary.job_summaries.is_empty());
        assert_eq!(summary.start, summary.end);
        assert_eq!(clock.now().timestamp(), 1);
    }

    #[tokio::test]
    async fn test_run_job_unregistered() {
        let (scheduler, _clock) = scheduler_at(1);
        match scheduler.run_job(0, true, None).await {
            Err(SchedulerError::UnregisteredJob(id)) => assert_eq!(id, JobId::from(0)),
            other => panic!("expected UnregisteredJob, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_run_job_due_check() {
        let (mut scheduler, _clock) = scheduler_at(1);
        let counter = Arc::new(AtomicU32::new(0));
        // Minute 1 of every hour; the clock sits in minute 0.
        scheduler.add_job(counting_job(&counter), pattern("1 * * * *"));

        let skipped = scheduler.run_job(0, false, None).await.unwrap();
        assert!(skipped.is_none());
        assert_eq!(counter.load(Ordering::SeqCst), 0);

        let forced = scheduler.run_job(0, true, None).await.unwrap().unwrap();
        assert_eq!(counter.load(Ordering::SeqCst), 1);
        assert!(forced.info.forced_run);
        assert_eq!(forced.result.state, JobResultState::Done);
    }

    #[tokio::test]
    async fn test_run_job_pretend_second() {
        let (mut scheduler, _clock) = scheduler_at(1);
        let counter = Arc::new(AtomicU32::new(0));
        scheduler.add_job(counting_job(&counter), pattern("* * * * *"));

        let params = RunParameters::new(30, false).unwrap();
        let summary = scheduler.run_job(0, true, Some(params)).await.unwrap().unwrap();
        assert_eq!(summary.info.second, 30);
        assert!(summary.info.forced_run);
    }

    #[tokio::test]
    async fn test_job_schedules_accessor() {
        let (mut scheduler, _clock) = scheduler_at(0);
        let counter = Arc::new(AtomicU32::new(0));
        scheduler.add_job(counting_job(&counter), pattern("* * * * *"));
        scheduler
            .add_job_with(
                counting_job(&counter),
                pattern("0 * * * *"),
                JobOptions::new().with_id("named").repeat_every(15),
            )
            .unwrap();

        let schedules: Vec<_> = scheduler.job_schedules().collect();
        assert_eq!(schedules.len(), 2);
        assert_eq!(schedules[0].0, &JobId::from(0));
        assert_eq!(schedules[1].0, &JobId::from("named"));
        assert_eq!(schedules[1].1.repeat_seconds(), 15);
    }
}
