//! External process execution behind the [`Executor`] seam.
use anyhow::{Context as _, Result, bail};
use std::fmt;
use std::path::Path;
use std::process::{Command, Output};

/// Result of a command execution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecResult {
    /// Captured standard output, lossily decoded.
    pub stdout: String,
    /// Captured standard error, lossily decoded.
    pub stderr: String,
    /// Whether the process exited with status zero.
    pub success: bool,
    /// Exit code, if the process was not killed by a signal.
    pub code: Option<i32>,
}

impl From<Output> for ExecResult {
    fn from(output: Output) -> Self {
        Self {
            stdout: String::from_utf8_lossy(&output.stdout).to_string(),
            stderr: String::from_utf8_lossy(&output.stderr).to_string(),
            success: output.status.success(),
            code: output.status.code(),
        }
    }
}

impl ExecResult {
    /// Bail on a non-zero exit.
    ///
    /// # Errors
    ///
    /// Returns an error naming `label`, the exit code and trimmed stderr.
    pub fn checked(self, label: &str) -> Result<Self> {
        if !self.success {
            bail!(
                "{label} failed (exit {}): {}",
                self.code.unwrap_or(-1),
                self.stderr.trim()
            );
        }
        Ok(self)
    }
}

/// Runs external programs for the `exec` task.
pub trait Executor: Send + Sync + fmt::Debug {
    /// Run `program` with `args` in `dir` and capture its output.
    ///
    /// A non-zero exit is not an error here; see [`ExecResult::checked`].
    ///
    /// # Errors
    ///
    /// Returns an error if the process cannot be spawned.
    fn run_in(&self, dir: &Path, program: &Path, args: &[String]) -> Result<ExecResult>;
}

/// Spawns real processes with [`std::process::Command`].
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemExecutor;

impl Executor for SystemExecutor {
    fn run_in(&self, dir: &Path, program: &Path, args: &[String]) -> Result<ExecResult> {
        let output = Command::new(program)
            .args(args)
            .current_dir(dir)
            .output()
            .with_context(|| {
                format!("failed to execute: {} in {}", program.display(), dir.display())
            })?;
        Ok(ExecResult::from(output))
    }
}
