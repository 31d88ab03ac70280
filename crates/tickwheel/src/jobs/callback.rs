//! Job backed by an async closure.

use std::panic::Location;

use async_trait::async_trait;
use futures::future::BoxFuture;
use std::future::Future;

use crate::error::BoxError;
use crate::lock::JobLock;

use super::Job;

type Callback = Box<dyn Fn(JobLock) -> BoxFuture<'static, Result<(), BoxError>> + Send + Sync>;

/// Job that runs an async closure.
///
/// The default name is the closure's definition site in
/// `<file>:<line>` form; use [`CallbackJob::with_name`] for a
/// human-chosen name.
///
/// # Example
///
/// ```
/// use tickwheel::CallbackJob;
///
/// let job = CallbackJob::new(|_lock| async { Ok(()) }).with_name("cache-warmup");
/// ```
pub struct CallbackJob {
    name: String,
    callback: Callback,
}

impl CallbackJob {
    /// Create a job from an async closure.
    ///
    /// The closure receives the handle of the lock the execution runs
    /// under and may `refresh` it for long-running work.
    #[track_caller]
    pub fn new<F, Fut>(callback: F) -> Self
    where
        F: Fn(JobLock) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<(), BoxError>> + Send + 'static,
    {
        let location = Location::caller();

        Self {
            name: format!("{}:{}", location.file(), location.line()),
            callback: Box::new(move |lock| Box::pin(callback(lock))),
        }
    }

    /// Replace the definition-site name with an explicit one.
    #[must_use]
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }
}

#[async_trait]
impl Job for CallbackJob {
    fn name(&self) -> String {
        self.name.clone()
    }

    async fn run(&self, lock: JobLock) -> Result<(), BoxError> {
        (self.callback)(lock).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;
    use std::time::Duration;

    use crate::lock::{LocalLockStore, LockStore};

    fn test_lock() -> JobLock {
        let store = LocalLockStore::new();
        JobLock::new(store.create_lock("scheduler/job/test", Duration::from_secs(300)))
    }

    #[tokio::test]
    async fn test_runs_callback() {
        let counter = Arc::new(AtomicU32::new(0));
        let cloned = counter.clone();
        let job = CallbackJob::new(move |_lock| {
            let counter = cloned.clone();
            async move {
                counter.fetch_add(1, Ordering::SeqCst);
                Ok(())
            }
        });

        job.run(test_lock()).await.unwrap();
        job.run(test_lock()).await.unwrap();
        assert_eq!(counter.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_propagates_failure() {
        let job = CallbackJob::new(|_lock| async { Err("broken".into()) });
        let err = job.run(test_lock()).await.unwrap_err();
        assert_eq!(err.to_string(), "broken");
    }

    #[test]
    fn test_default_name_is_definition_site() {
        let line = line!() + 1;
        let job = CallbackJob::new(|_lock| async { Ok(()) });
        assert_eq!(job.name(), format!("{}:{line}", file!()));
    }

    #[test]
    fn test_explicit_name_wins() {
        let job = CallbackJob::new(|_lock| async { Ok(()) }).with_name("named");
        assert_eq!(job.name(), "named");
    }
}
