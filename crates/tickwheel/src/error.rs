//! Error types for the scheduler crate.
//!
//! Job failures are recoverable by design: the scheduler keeps running
//! other due jobs and reports failures either through the configured
//! failure handler or as an aggregate error once the run finishes.
//! Callback (hook) failures and invalid-id usage are programmer errors
//! and abort the current run invocation immediately.

use std::fmt;

use thiserror::Error;

use crate::registry::JobId;

/// Boxed error type used at the job and callback seams.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// A single job's captured failure.
///
/// Produced whenever a job execution fails (in-process error,
/// non-zero exit status or launch failure of a job process). Carried
/// inside [`SchedulerError::RunFailed`] when failures are aggregated.
#[derive(Debug, Error)]
#[error("job '{name}' (id '{id}', second {second}) failed: {source}")]
pub struct JobFailure {
    /// Registry id of the failed job.
    pub id: JobId,
    /// Display name of the failed job.
    pub name: String,
    /// Due-second of the failed execution.
    pub second: u8,
    /// The job's underlying error.
    #[source]
    pub source: BoxError,
}

/// Errors that can occur during scheduler operations.
#[derive(Debug, Error)]
pub enum SchedulerError {
    /// `run_job` referenced an id absent from the registry.
    #[error("job is not registered: '{0}'")]
    UnregisteredJob(JobId),

    /// Repeat interval outside of 0 or 1..=59 seconds.
    #[error("repeat interval must be 0 or 1..=59 seconds, got {0}")]
    InvalidRepeatInterval(u8),

    /// Run parameter second outside of 0..=59.
    #[error("second must be within 0..=59, got {0}")]
    InvalidSecond(u8),

    /// Invalid cron pattern.
    #[error("invalid cron pattern '{pattern}': {message}")]
    InvalidPattern {
        /// The rejected pattern string.
        pattern: String,
        /// Parser diagnostic.
        message: String,
    },

    /// Invalid timezone string.
    #[error("invalid timezone: {0}")]
    InvalidTimezone(String),

    /// A single job failed and no failure handler is configured.
    /// Raised by `run_job` only.
    #[error(transparent)]
    Job(#[from] JobFailure),

    /// One or more jobs failed during a `run` invocation and no failure
    /// handler is configured. Raised only after every due job was
    /// attempted; carries every failure of the run.
    #[error("{}", format_run_failed(.suppressed))]
    RunFailed {
        /// All job failures of the run, in execution order.
        suppressed: Vec<JobFailure>,
    },

    /// A before/after job callback failed. Never routed to the failure
    /// handler; aborts the remainder of the current run.
    #[error("job callback failed: {0}")]
    CallbackFailed(#[source] BoxError),
}

fn format_run_failed(suppressed: &[JobFailure]) -> String {
    let mut msg = format!("run failed with {} suppressed error(s)", suppressed.len());
    for failure in suppressed {
        msg.push('\n');
        fmt::write(&mut msg, format_args!("- {failure}")).ok();
    }
    msg
}
