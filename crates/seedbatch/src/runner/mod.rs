//! Simulator process runner
//!
//! Launches the external simulator as `<executable> <control_file>` and blocks
//! until it exits. The exit status is reported but never interpreted: success
//! is decided from the output artifact by [`crate::outcome::OutcomeDetector`].
//!
//! No timeout is imposed; a hung simulator blocks the orchestrator.

use crate::error::RunnerError;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};

/// Exit information of one simulator process
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ProcessResult {
    /// `None` when the process was terminated by a signal
    pub exit_code: Option<i32>,
}

/// Anything that can run the simulator against a control file
#[cfg_attr(test, mockall::automock)]
pub trait SimulationRunner {
    /// Run to completion, blocking the calling thread.
    ///
    /// # Errors
    /// [`RunnerError`] if the process cannot be started or waited on.
    fn run(&self, control_file: &Path) -> Result<ProcessResult, RunnerError>;
}

/// Runs the real simulator binary as a child process
#[derive(Debug, Clone)]
pub struct ProcessRunner {
    executable: PathBuf,
    work_dir: PathBuf,
}

impl ProcessRunner {
    /// The child runs with `work_dir` as its current directory, which is
    /// where it leaves its output artifacts.
    pub fn new(executable: impl Into<PathBuf>, work_dir: impl Into<PathBuf>) -> Self {
        Self {
            executable: executable.into(),
            work_dir: work_dir.into(),
        }
    }

    #[inline]
    #[must_use]
    pub fn executable(&self) -> &Path {
        &self.executable
    }

    /// Relative paths with a directory component are pinned to the
    /// orchestrator's directory; bare names are left to `PATH` lookup.
    fn program(&self) -> PathBuf {
        if self.executable.components().count() > 1 {
            if let Ok(abs) = self.executable.canonicalize() {
                return abs;
            }
        }
        self.executable.clone()
    }
}

impl SimulationRunner for ProcessRunner {
    fn run(&self, control_file: &Path) -> Result<ProcessResult, RunnerError> {
        let control_arg = control_file
            .canonicalize()
            .unwrap_or_else(|_| control_file.to_path_buf());

        let mut cmd = Command::new(self.program());
        cmd.arg(&control_arg);
        cmd.current_dir(&self.work_dir);
        cmd.stdin(Stdio::null());

        tracing::debug!(
            "Launching {} {} in {}",
            self.executable.display(),
            control_arg.display(),
            self.work_dir.display()
        );

        let mut child = cmd.spawn().map_err(|source| RunnerError::Launch {
            executable: self.executable.clone(),
            source,
        })?;

        let status = child.wait().map_err(|source| RunnerError::Wait {
            executable: self.executable.clone(),
            source,
        })?;

        let result = ProcessResult {
            exit_code: status.code(),
        };
        tracing::debug!("Simulator exited with {:?}", result.exit_code);
        Ok(result)
    }
}
