//! Job that runs an external command.

use std::io;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;

use crate::error::BoxError;
use crate::launch::{ProcessLauncher, TokioProcessLauncher};
use crate::lock::JobLock;

use super::Job;

/// Failure of a [`CommandJob`] execution.
#[derive(Debug, Error)]
pub enum CommandFailure {
    /// The command could not be started at all.
    #[error("could not launch command '{program}': {source}")]
    Launch {
        /// The configured program.
        program: String,
        /// Underlying launch error.
        #[source]
        source: io::Error,
    },

    /// The command ran and exited with a non-zero status.
    #[error("{}", format_exit(.program, .exit_code, .output))]
    Exit {
        /// The configured program.
        program: String,
        /// Exit code; `None` when terminated by a signal.
        exit_code: Option<i32>,
        /// Combined captured output.
        output: String,
    },
}

fn format_exit(program: &str, exit_code: &Option<i32>, output: &str) -> String {
    let mut msg = match exit_code {
        Some(code) => format!("command '{program}' failed with code {code}"),
        None => format!("command '{program}' was terminated by a signal"),
    };
    if !output.is_empty() {
        msg.push_str("\noutput: ");
        msg.push_str(output);
    }
    msg
}

/// Job that invokes an externally-defined command with fixed arguments.
///
/// Output is captured and attached to the failure message when the
/// command exits non-zero. A job known to run long can declare a lock
/// time-to-live, refreshed right before the command starts.
pub struct CommandJob {
    program: PathBuf,
    args: Vec<String>,
    launcher: Arc<dyn ProcessLauncher>,
    lock_ttl: Option<Duration>,
}

impl CommandJob {
    /// Create a job running `program` with the given arguments.
    pub fn new(program: impl Into<PathBuf>, args: Vec<String>) -> Self {
        Self {
            program: program.into(),
            args,
            launcher: Arc::new(TokioProcessLauncher),
            lock_ttl: None,
        }
    }

    /// Extend the job's lock to this time-to-live before each run.
    #[must_use]
    pub fn with_lock_ttl(mut self, ttl: Duration) -> Self {
        self.lock_ttl = Some(ttl);
        self
    }

    /// Replace the process launcher.
    #[must_use]
    pub fn with_launcher(mut self, launcher: Arc<dyn ProcessLauncher>) -> Self {
        self.launcher = launcher;
        self
    }

    fn program_display(&self) -> String {
        self.program.display().to_string()
    }
}

#[async_trait]
impl Job for CommandJob {
    fn name(&self) -> String {
        let mut name = format!("command: {}", self.program_display());
        for arg in &self.args {
            name.push(' ');
            name.push_str(arg);
        }
        name
    }

    async fn run(&self, lock: JobLock) -> Result<(), BoxError> {
        if let Some(ttl) = self.lock_ttl {
            lock.refresh(ttl);
        }

        let output = self
            .launcher
            .launch(&self.program, &self.args)
            .await
            .map_err(|source| CommandFailure::Launch {
                program: self.program_display(),
                source,
            })?;

        if !output.success() {
            return Err(CommandFailure::Exit {
                program: self.program_display(),
                exit_code: output.exit_code,
                output: output.output,
            }
            .into());
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;
    use std::sync::Mutex;

    use crate::launch::LaunchOutput;
    use crate::lock::{LocalLockStore, LockStore};

    struct FakeLauncher {
        exit_code: Option<i32>,
        output: String,
        calls: Mutex<Vec<(String, Vec<String>)>>,
    }

    impl FakeLauncher {
        fn new(exit_code: Option<i32>, output: &str) -> Arc<Self> {
            Arc::new(Self {
                exit_code,
                output: output.to_string(),
                calls: Mutex::new(Vec::new()),
            })
        }
    }

    #[async_trait]
    impl ProcessLauncher for FakeLauncher {
        async fn launch(&self, program: &Path, args: &[String]) -> io::Result<LaunchOutput> {
            self.calls
                .lock()
                .unwrap()
                .push((program.display().to_string(), args.to_vec()));

            Ok(LaunchOutput {
                exit_code: self.exit_code,
                output: self.output.clone(),
            })
        }
    }

    fn test_lock() -> JobLock {
        let store = LocalLockStore::new();
        JobLock::new(store.create_lock("scheduler/job/test", Duration::from_secs(300)))
    }

    #[test]
    fn test_name_includes_program_and_args() {
        let job = CommandJob::new("bin/backup", vec!["--all".to_string(), "-q".to_string()]);
        assert_eq!(job.name(), "command: bin/backup --all -q");
    }

    #[tokio::test]
    async fn test_zero_exit_is_success() {
        let launcher = FakeLauncher::new(Some(0), "done\n");
        let job = CommandJob::new("bin/backup", vec!["--all".to_string()])
            .with_launcher(launcher.clone());

        job.run(test_lock()).await.unwrap();

        let calls = launcher.calls.lock().unwrap();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].0, "bin/backup");
        assert_eq!(calls[0].1, vec!["--all".to_string()]);
    }

    #[tokio::test]
    async fn test_nonzero_exit_fails_with_output() {
        let launcher = FakeLauncher::new(Some(2), "disk full\n");
        let job = CommandJob::new("bin/backup", vec![]).with_launcher(launcher);

        let err = job.run(test_lock()).await.unwrap_err();
        let msg = err.to_string();
        assert!(msg.contains("failed with code 2"));
        assert!(msg.contains("disk full"));
    }

    #[tokio::test]
    async fn test_nonzero_exit_without_output() {
        let launcher = FakeLauncher::new(Some(1), "");
        let job = CommandJob::new("bin/backup", vec![]).with_launcher(launcher);

        let err = job.run(test_lock()).await.unwrap_err();
        let msg = err.to_string();
        assert!(msg.contains("failed with code 1"));
        assert!(!msg.contains("output:"));
    }

    #[tokio::test]
    async fn test_launch_failure_is_reported() {
        let job = CommandJob::new("./definitely-not-a-real-binary", vec![]);
        let err = job.run(test_lock()).await.unwrap_err();
        assert!(err.to_string().contains("could not launch"));
    }

    #[tokio::test]
    async fn test_lock_ttl_refresh() {
        let store = LocalLockStore::new();
        let lock = store.create_lock("scheduler/job/test", Duration::ZERO);
        assert!(lock.try_acquire());
        assert!(lock.is_expired());

        let launcher = FakeLauncher::new(Some(0), "");
        let job = CommandJob::new("bin/backup", vec![])
            .with_launcher(launcher)
            .with_lock_ttl(Duration::from_secs(600));

        job.run(JobLock::new(lock.clone())).await.unwrap();
        assert!(!lock.is_expired());
    }
}
