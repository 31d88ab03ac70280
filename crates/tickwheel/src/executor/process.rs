//! Out-of-process job execution.

use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use tracing::debug;

use crate::jobs::CommandFailure;
use crate::launch::{ProcessLauncher, TokioProcessLauncher};

use super::{Execution, Invocation, JobExecutor};

/// Default launcher executable, relative to the working directory.
pub const DEFAULT_EXECUTABLE: &str = "bin/scheduler";

/// Sub-command the launcher executable is invoked with.
const RUN_JOB_COMMAND: &str = "run-job";

/// Runs each due job in a separate OS process.
///
/// For every execution the launcher executable is invoked as
/// `<executable> run-job <id> --parameters <json>`, where the JSON
/// payload is the serialized [`RunParameters`](crate::RunParameters).
/// The launcher is expected to be an entry point of the host
/// application that performs the requested job execution and exits
/// non-zero on failure.
///
/// Executions are detached onto their own tasks, so one job's runtime
/// does not block another job's schedule; the scheduler awaits all
/// completions before a run returns. A launcher that cannot be started
/// at all (e.g. the executable does not exist) is reported as a job
/// failure, not a crash.
pub struct ProcessJobExecutor {
    executable: PathBuf,
    launcher: Arc<dyn ProcessLauncher>,
}

impl ProcessJobExecutor {
    /// Create an executor using the default executable path.
    pub fn new() -> Self {
        Self {
            executable: PathBuf::from(DEFAULT_EXECUTABLE),
            launcher: Arc::new(TokioProcessLauncher),
        }
    }

    /// Replace the launcher executable path.
    #[must_use]
    pub fn with_executable(mut self, executable: impl Into<PathBuf>) -> Self {
        self.executable = executable.into();
        self
    }

    /// Replace the process launcher.
    #[must_use]
    pub fn with_launcher(mut self, launcher: Arc<dyn ProcessLauncher>) -> Self {
        self.launcher = launcher;
        self
    }

    fn build_args(invocation: &Invocation) -> Vec<String> {
        let params = serde_json::to_string(&invocation.params())
            .expect("run parameters serialize to JSON");

        vec![
            RUN_JOB_COMMAND.to_string(),
            invocation.id().to_string(),
            "--parameters".to_string(),
            params,
        ]
    }
}

impl Default for ProcessJobExecutor {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl JobExecutor for ProcessJobExecutor {
    async fn execute(&self, invocation: Invocation) -> Execution {
        let launcher = self.launcher.clone();
        let executable = self.executable.clone();
        let args = Self::build_args(&invocation);

        let handle = tokio::spawn(async move {
            debug!(executable = %executable.display(), job_id = %invocation.id(), "launching job process");

            let result = match launcher.launch(&executable, &args).await {
                Ok(output) if output.success() => Ok(()),
                Ok(output) => Err(CommandFailure::Exit {
                    program: executable.display().to_string(),
                    exit_code: output.exit_code,
                    output: output.output,
                }
                .into()),
                Err(source) => Err(CommandFailure::Launch {
                    program: executable.display().to_string(),
                    source,
                }
                .into()),
            };

            // Dropping the invocation releases the job's lock as soon
            // as the process has finished, even though the outcome is
            // only collected at the end of the run.
            drop(invocation);

            result
        });

        Execution::Detached(handle)
    }
}
