//! Execution status snapshots.
//!
//! Everything here is an immutable record created around a single job
//! execution or run invocation: captured once, handed to callbacks and
//! callers read-only, never retained by the scheduler.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::registry::JobId;
use crate::SchedulerError;

/// Input to a single-job execution request.
///
/// `second` supplies the "pretend second" used for naming and repeat
/// bookkeeping; `forced_run` marks whether the due check was bypassed.
/// Serialized (camelCase) as the `--parameters` payload of the process
/// executor protocol.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct RunParameters {
    pub(crate) second: u8,
    pub(crate) forced_run: bool,
}

impl RunParameters {
    /// Create run parameters for the given due-second.
    ///
    /// # Errors
    ///
    /// Returns `SchedulerError::InvalidSecond` when `second` is not
    /// within `0..=59`.
    pub fn new(second: u8, forced_run: bool) -> Result<Self, SchedulerError> {
        if second > 59 {
            return Err(SchedulerError::InvalidSecond(second));
        }

        Ok(Self { second, forced_run })
    }

    /// The due-second within the matched minute.
    pub fn second(&self) -> u8 {
        self.second
    }

    /// Whether the due check was bypassed.
    pub fn is_forced_run(&self) -> bool {
        self.forced_run
    }
}

/// Snapshot of a job captured immediately before it executes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobInfo {
    /// Registry id of the job.
    pub id: JobId,
    /// Display name of the job.
    pub name: String,
    /// The job's cron pattern.
    pub pattern: String,
    /// Due-second of this execution within the matched minute.
    pub second: u8,
    /// Whether the due check was bypassed for this execution.
    pub forced_run: bool,
    /// When the execution started.
    pub start: DateTime<Utc>,
}

/// Final state of one job execution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobResultState {
    /// Job ran and succeeded.
    Done,
    /// Job ran and failed.
    Fail,
    /// Job's lock could not be acquired; it did not run.
    Skip,
}

/// Outcome of one job execution.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobResult {
    /// The job's cron pattern.
    pub pattern: String,
    /// When the execution ended. Equals the start time for `Skip`.
    pub end: DateTime<Utc>,
    /// Final state.
    pub state: JobResultState,
}

/// One job execution: its pre-run snapshot and its outcome.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobSummary {
    /// Snapshot captured before the execution.
    pub info: JobInfo,
    /// Outcome of the execution.
    pub result: JobResult,
}

impl JobSummary {
    /// Wall-clock duration of the execution.
    pub fn duration(&self) -> chrono::Duration {
        self.result.end - self.info.start
    }
}

/// Summary of one full `run` invocation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunSummary {
    /// When the run started.
    pub start: DateTime<Utc>,
    /// When the run ended.
    pub end: DateTime<Utc>,
    /// One summary per execution, in execution order.
    pub job_summaries: Vec<JobSummary>,
}

impl RunSummary {
    /// Wall-clock duration of the run.
    pub fn duration(&self) -> chrono::Duration {
        self.end - self.start
    }
}
