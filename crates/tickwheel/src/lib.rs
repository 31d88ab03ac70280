//! Cron-style job scheduler with sub-minute repeats.
//!
//! This crate provides a scheduler that executes registered jobs
//! whenever their cron pattern matches the current minute, with
//! timezone support, per-job overlap locking and pluggable execution
//! strategies.
//!
//! # Features
//!
//! - Standard five-field cron expressions via `croner`
//! - Timezone-aware due checks via `chrono-tz`, per job or scheduler-wide
//! - Sub-minute repeats: re-run a job every N seconds within a matched
//!   minute
//! - At-most-once-concurrent execution per job through a pluggable
//!   [`LockStore`]
//! - In-process or one-process-per-job execution via [`JobExecutor`]
//! - Before/after callbacks and optional failure handler
//! - Deterministic time in tests via the [`Clock`] trait
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use tickwheel::{CallbackJob, CronPattern, JobOptions, Scheduler, SchedulerConfig};
//!
//! # async fn example() -> Result<(), tickwheel::SchedulerError> {
//! let mut scheduler = Scheduler::new(SchedulerConfig::default())?;
//!
//! scheduler.add_job(
//!     Arc::new(CallbackJob::new(|_lock| async { Ok(()) }).with_name("heartbeat")),
//!     CronPattern::parse("* * * * *")?,
//! );
//! scheduler.add_job_with(
//!     Arc::new(CallbackJob::new(|_lock| async { Ok(()) })),
//!     CronPattern::parse("0 0 * * *")?,
//!     JobOptions::new().with_id("nightly").repeat_every(30),
//! )?;
//!
//! // Invoke once per minute, e.g. from the host's cron.
//! let summary = scheduler.run().await?;
//! for job in &summary.job_summaries {
//!     println!("{}: {:?}", job.info.name, job.result.state);
//! }
//! # Ok(())
//! # }
//! ```

mod clock;
mod config;
mod error;
mod executor;
mod jobs;
mod launch;
mod lock;
mod pattern;
mod registry;
mod scheduler;
mod status;

pub use clock::{Clock, ManualClock, SystemClock};
pub use config::SchedulerConfig;
pub use error::{BoxError, JobFailure, SchedulerError};
pub use executor::{
    Execution, InProcessExecutor, Invocation, JobExecutor, ProcessJobExecutor, DEFAULT_EXECUTABLE,
};
pub use jobs::{CallbackJob, CommandFailure, CommandJob, Job};
pub use launch::{LaunchOutput, ProcessLauncher, TokioProcessLauncher};
pub use lock::{job_lock_name, JobLock, LocalLockStore, Lock, LockStore};
pub use pattern::CronPattern;
pub use registry::{JobId, JobOptions, JobSchedule};
pub use scheduler::{AfterJobCallback, BeforeJobCallback, FailureHandler, Scheduler};
pub use status::{JobInfo, JobResult, JobResultState, JobSummary, RunParameters, RunSummary};
