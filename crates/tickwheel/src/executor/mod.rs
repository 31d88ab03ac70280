//! Pluggable job execution strategies.
//!
//! An executor runs one job under its acquired lock and produces an
//! outcome; a job's failure never escapes uncaught, it is converted to
//! a reported outcome. Two strategies are provided:
//!
//! - [`InProcessExecutor`]: direct invocation on the caller's task
//! - [`ProcessJobExecutor`]: one spawned OS process per due job,
//!   allowing due jobs to run concurrently
//!
//! Dropping the [`Invocation`] releases the job's lock, so release is
//! guaranteed on every exit path of an execution.

use std::sync::Arc;

use async_trait::async_trait;
use tokio::task::JoinHandle;

use crate::error::BoxError;
use crate::jobs::Job;
use crate::lock::{JobLock, Lock, LockGuard};
use crate::registry::JobId;
use crate::status::RunParameters;

mod in_process;
mod process;

pub use in_process::InProcessExecutor;
pub use process::{ProcessJobExecutor, DEFAULT_EXECUTABLE};

/// One job execution request: the job, its acquired lock and the run
/// parameters, bundled so its lifetime bounds the lock's.
pub struct Invocation {
    id: JobId,
    job: Arc<dyn Job>,
    lock: JobLock,
    params: RunParameters,
    _guard: LockGuard,
}

impl Invocation {
    pub(crate) fn new(
        id: JobId,
        job: Arc<dyn Job>,
        lock: Arc<dyn Lock>,
        params: RunParameters,
    ) -> Self {
        Self {
            id,
            job,
            lock: JobLock::new(lock.clone()),
            params,
            _guard: LockGuard::new(lock),
        }
    }

    /// Registry id of the job.
    pub fn id(&self) -> &JobId {
        &self.id
    }

    /// The job to run.
    pub fn job(&self) -> &Arc<dyn Job> {
        &self.job
    }

    /// Handle of the lock this execution runs under.
    pub fn lock(&self) -> JobLock {
        self.lock.clone()
    }

    /// Parameters of this execution.
    pub fn params(&self) -> RunParameters {
        self.params
    }
}

/// Outcome of starting a job execution.
pub enum Execution {
    /// The job ran to completion on the caller's task.
    Finished(Result<(), BoxError>),
    /// The job was handed off to a spawned task; the handle resolves
    /// once the job finishes and its lock has been released.
    Detached(JoinHandle<Result<(), BoxError>>),
}

/// Strategy for running a job under its acquired lock.
#[async_trait]
pub trait JobExecutor: Send + Sync {
    /// Run the job, converting its failure into a reported outcome.
    async fn execute(&self, invocation: Invocation) -> Execution;
}
