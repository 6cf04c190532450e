//! Local-executable function execution.
//!
//! The executable form runs a binary directly on the host. It deliberately
//! carries no isolation knobs; callers reject `network`, `mount`, `env` and
//! `as-current-user` before constructing one.

use std::path::PathBuf;
use tokio::process::Command;

/// One function backed by a local executable.
#[derive(Debug, Clone)]
pub struct ExecFn {
    pub path: PathBuf,
    /// Working directory for the child, normally the package directory.
    pub work_dir: Option<PathBuf>,
}

impl ExecFn {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            work_dir: None,
        }
    }

    #[must_use]
    pub fn with_work_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.work_dir = Some(dir.into());
        self
    }

    pub(crate) fn command(&self) -> Command {
        let mut cmd = Command::new(&self.path);
        if let Some(dir) = &self.work_dir {
            cmd.current_dir(dir);
        }
        cmd
    }

    /// Display name of this function.
    pub fn name(&self) -> &str {
        self.path.to_str().unwrap_or("<non-utf8 path>")
    }
}
