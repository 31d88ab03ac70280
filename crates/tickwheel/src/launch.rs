//! Process launching seam.
//!
//! Everything that shells out (the process job executor and
//! [`CommandJob`](crate::CommandJob)) goes through [`ProcessLauncher`],
//! so tests can substitute a fake and never fork. A missing executable
//! surfaces as an `io::Error` from `launch`; callers map it to a failure
//! outcome instead of letting it escape.

use std::io;
use std::path::Path;
use std::process::Stdio;

use async_trait::async_trait;
use tokio::process::Command;

/// Exit status and combined output of a finished process.
#[derive(Debug, Clone)]
pub struct LaunchOutput {
    /// Process exit code; `None` when terminated by a signal.
    pub exit_code: Option<i32>,
    /// Combined stdout and stderr.
    pub output: String,
}

impl LaunchOutput {
    /// Whether the process exited with status zero.
    pub fn success(&self) -> bool {
        self.exit_code == Some(0)
    }
}

/// Launches an external process and waits for its completion.
#[async_trait]
pub trait ProcessLauncher: Send + Sync {
    /// Run `program` with `args`, capturing exit status and combined
    /// output.
    ///
    /// # Errors
    ///
    /// Returns an `io::Error` when the process cannot be started at
    /// all, e.g. when the executable does not exist.
    async fn launch(&self, program: &Path, args: &[String]) -> io::Result<LaunchOutput>;
}

/// Launcher backed by `tokio::process`.
#[derive(Debug, Default, Clone, Copy)]
pub struct TokioProcessLauncher;

#[async_trait]
impl ProcessLauncher for TokioProcessLauncher {
    async fn launch(&self, program: &Path, args: &[String]) -> io::Result<LaunchOutput> {
        let output = Command::new(program)
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .output()
            .await?;

        let mut combined = String::from_utf8_lossy(&output.stdout).into_owned();
        combined.push_str(&String::from_utf8_lossy(&output.stderr));

        Ok(LaunchOutput {
            exit_code: output.status.code(),
            output: combined,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_launch_missing_executable_is_io_error() {
        let launcher = TokioProcessLauncher;
        let result = launcher
            .launch(Path::new("./definitely-not-a-real-binary"), &[])
            .await;
        assert!(result.is_err());
    }

    #[tokio::test]
    #[cfg(unix)]
    async fn test_launch_captures_output_and_exit_code() {
        let launcher = TokioProcessLauncher;
        let output = launcher
            .launch(
                Path::new("/bin/sh"),
                &["-c".to_string(), "echo out; echo err >&2; exit 3".to_string()],
            )
            .await
            .unwrap();

        assert_eq!(output.exit_code, Some(3));
        assert!(!output.success());
        assert!(output.output.contains("out"));
        assert!(output.output.contains("err"));
    }

    #[test]
    fn test_success_requires_zero_exit() {
        let ok = LaunchOutput {
            exit_code: Some(0),
            output: String::new(),
        };
        assert!(ok.success());

        let signal = LaunchOutput {
            exit_code: None,
            output: String::new(),
        };
        assert!(!signal.success());
    }
}
