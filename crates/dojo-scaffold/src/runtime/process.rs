//! External process execution
//!
//! Builds and installs go through the [`ProcessRunner`] trait so the pipeline
//! can be exercised with a fake runner in tests.

use std::future::Future;
use std::io;
use std::path::Path;
use std::process::Stdio;
use tokio::process::Command as TokioCommand;

/// Exit status and captured output of a finished process
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProcessOutput {
    /// Exit code; `None` when the process was killed by a signal
    pub status: Option<i32>,
    pub stdout: String,
    pub stderr: String,
}

impl ProcessOutput {
    pub fn success(&self) -> bool {
        self.status == Some(0)
    }
}

/// Runs a program to completion in a working directory
pub trait ProcessRunner: Send + Sync {
    fn run(
        &self,
        program: &str,
        args: &[String],
        cwd: &Path,
    ) -> impl Future<Output = io::Result<ProcessOutput>> + Send;
}

/// Runs real processes with tokio
#[derive(Debug, Clone, Copy, Default)]
pub struct TokioProcessRunner;

impl ProcessRunner for TokioProcessRunner {
    async fn run(&self, program: &str, args: &[String], cwd: &Path) -> io::Result<ProcessOutput> {
        tracing::debug!("Running `{} {}` in {}", program, args.join(" "), cwd.display());

        let output = TokioCommand::new(program)
            .args(args)
            .current_dir(cwd)
            .stdin(Stdio::null())
            .kill_on_drop(true)
            .output()
            .await?;

        let result = ProcessOutput {
            status: output.status.code(),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        };

        for line in result.stdout.lines().chain(result.stderr.lines()) {
            tracing::debug!(target: "dojo_scaffold::process", "{}: {}", program, line);
        }

        Ok(result)
    }
}
