//! In-process job execution.

use async_trait::async_trait;

use super::{Execution, Invocation, JobExecutor};

/// Runs jobs directly on the caller's task.
///
/// Executions are strictly sequential: repeats and multiple due jobs
/// are interleaved cooperatively by the scheduler's tick algorithm, not
/// run simultaneously.
#[derive(Debug, Default, Clone, Copy)]
pub struct InProcessExecutor;

#[async_trait]
impl JobExecutor for InProcessExecutor {
    async fn execute(&self, invocation: Invocation) -> Execution {
        let result = invocation.job().run(invocation.lock()).await;
        // Dropping the invocation here releases the job's lock before
        // the outcome is reported.
        drop(invocation);

        Execution::Finished(result)
    }
}
