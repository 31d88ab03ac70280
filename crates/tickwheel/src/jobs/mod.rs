//! Job implementations.
//!
//! A job is a named unit of work that executes under a lock handle and
//! may fail. Two implementations are provided:
//!
//! - [`CallbackJob`]: wraps an async closure, named after its
//!   definition site unless overridden
//! - [`CommandJob`]: runs an externally-defined command with fixed
//!   arguments, mapping a non-zero exit status to failure

use async_trait::async_trait;

use crate::error::BoxError;
use crate::lock::JobLock;

mod callback;
mod command;

pub use callback::CallbackJob;
pub use command::{CommandFailure, CommandJob};

/// A named unit of work.
///
/// The scheduler assumes exactly two capabilities of a job: a stable,
/// human-meaningful name and a fallible `run`. The lock handle lets a
/// long-running job extend its own lock's time-to-live; no other use of
/// it is expected.
#[async_trait]
pub trait Job: Send + Sync {
    /// Stable display name of the job.
    fn name(&self) -> String;

    /// Execute the job.
    async fn run(&self, lock: JobLock) -> Result<(), BoxError>;
}
