//! Function runner.
//!
//! The runner is the only place where the engine touches a non-deterministic
//! outside world. A function is an opaque program addressed either by a
//! container image ([`ContainerFn`]) or a local executable path
//! ([`ExecFn`]); both consume a [`ResourceList`] on stdin and produce one on
//! stdout.
//!
//! Failure semantics:
//!
//! - non-zero exit becomes [`ConfpmError::FunctionExecutionError`] carrying
//!   the function name, exit code and captured (truncated) stderr
//! - unparseable output becomes [`ConfpmError::FunctionProtocolError`]
//!
//! The runner captures per-resource diagnostic `results` but does not
//! interpret them.

pub mod config;
pub mod container;
pub mod exec;
pub mod protocol;

pub use config::function_config;
pub use container::ContainerFn;
pub use exec::ExecFn;
pub use protocol::{FunctionResult, FunctionResultList, FunctionRunResults, ResourceList};

use anyhow::{Context, Result, bail};
use std::path::Path;
use std::process::Stdio;
use std::str::FromStr;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;

use crate::core::ConfpmError;
use crate::manifest::Function;

/// Captured function stderr is cut off past this many lines.
pub const MAX_STDERR_LINES: usize = 80;

/// Per-invocation isolation settings for container functions.
///
/// Everything defaults to off; the constrained defaults (no network,
/// unprivileged user, no mounts) apply whenever a knob is not enabled.
#[derive(Debug, Clone, Default)]
pub struct IsolationOptions {
    /// Allow network access inside the container.
    pub network: bool,
    /// Read-only bind mounts from the host.
    pub mounts: Vec<StorageMount>,
    /// Environment exports, either `KEY=VALUE` or `KEY` (pass-through).
    pub env: Vec<String>,
    /// Run the container with the invoking user's uid:gid instead of nobody.
    pub as_current_user: bool,
}

impl IsolationOptions {
    /// Whether any knob deviates from the constrained defaults.
    pub fn any_enabled(&self) -> bool {
        self.network || self.as_current_user || !self.mounts.is_empty() || !self.env.is_empty()
    }
}

/// A read-only bind mount specification, parsed from
/// `type=bind,src=<host>,dst=<container>`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StorageMount {
    pub mount_type: String,
    pub src: String,
    pub dst: String,
}

impl StorageMount {
    /// Render as a docker `--mount` flag value. Mounts are always read-only.
    pub fn to_docker_flag(&self) -> String {
        format!(
            "type={},src={},dst={},readonly",
            self.mount_type, self.src, self.dst
        )
    }
}

impl FromStr for StorageMount {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        let mut mount_type = None;
        let mut src = None;
        let mut dst = None;
        for part in s.split(',') {
            match part.split_once('=') {
                Some(("type", v)) => mount_type = Some(v.to_string()),
                Some(("src" | "source", v)) => src = Some(v.to_string()),
                Some(("dst" | "target", v)) => dst = Some(v.to_string()),
                _ => bail!("invalid mount element {part:?} in {s:?}"),
            }
        }
        Ok(Self {
            mount_type: mount_type.with_context(|| format!("mount {s:?} is missing 'type'"))?,
            src: src.with_context(|| format!("mount {s:?} is missing 'src'"))?,
            dst: dst.with_context(|| format!("mount {s:?} is missing 'dst'"))?,
        })
    }
}

/// One runnable function, container or local executable.
#[derive(Debug, Clone)]
pub enum FunctionRuntime {
    Container(ContainerFn),
    Exec(ExecFn),
}

impl FunctionRuntime {
    /// Build the runtime for a validated pipeline entry.
    ///
    /// Pipeline functions always run with the constrained isolation
    /// defaults; the knobs are only reachable through direct evaluation.
    /// Relative executable paths resolve against the package directory.
    pub fn from_function(f: &Function, pkg_dir: &Path) -> Result<Self> {
        if let Some(image) = &f.image {
            return Ok(Self::Container(ContainerFn::new(image.as_str())));
        }
        if let Some(exec) = &f.exec {
            let path = Path::new(exec);
            let resolved = if path.is_absolute() {
                path.to_path_buf()
            } else {
                pkg_dir.join(path)
            };
            return Ok(Self::Exec(ExecFn::new(resolved).with_work_dir(pkg_dir)));
        }
        bail!("function entry names neither an image nor an executable")
    }

    /// Display name: the image reference or executable path.
    pub fn name(&self) -> &str {
        match self {
            Self::Container(c) => &c.image,
            Self::Exec(e) => e.name(),
        }
    }

    /// Run the function once over `input`, returning its output list.
    pub async fn run(&self, input: &ResourceList) -> Result<ResourceList> {
        let payload = input
            .to_yaml()
            .context("failed to serialize function input")?;
        let fn_config = input.function_config.as_ref().map(|r| r.identity());
        let cmd = match self {
            Self::Container(c) => c.command(),
            Self::Exec(e) => e.command(),
        };
        let stdout = run_child(cmd, self.name(), fn_config, &payload).await?;
        ResourceList::parse(&stdout).map_err(|reason| {
            ConfpmError::FunctionProtocolError {
                name: self.name().to_string(),
                reason,
            }
            .into()
        })
    }
}

/// Spawn the child, stream `input` to its stdin, and collect stdout.
async fn run_child(
    mut cmd: Command,
    name: &str,
    fn_config: Option<String>,
    input: &str,
) -> Result<String> {
    cmd.stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);

    tracing::debug!(target: "fn", function = name, "spawning function process");
    let mut child = cmd
        .spawn()
        .with_context(|| format!("failed to start function {name}"))?;
    let mut stdin = child
        .stdin
        .take()
        .with_context(|| format!("no stdin handle for function {name}"))?;

    // The write races the child's exit: a function may fail before draining
    // its input, and the exit status is the error we want to report.
    let write = async {
        if let Err(err) = stdin.write_all(input.as_bytes()).await {
            tracing::debug!(target: "fn", function = name, "input stream closed early: {err}");
        }
        drop(stdin);
    };
    let (_, output) = tokio::join!(write, child.wait_with_output());
    let output = output.with_context(|| format!("failed to run function {name}"))?;

    let stderr = String::from_utf8_lossy(&output.stderr);
    if !output.status.success() {
        return Err(ConfpmError::FunctionExecutionError {
            name: name.to_string(),
            exit_code: output.status.code().unwrap_or(-1),
            stderr: truncate_lines(&stderr, MAX_STDERR_LINES),
            fn_config,
        }
        .into());
    }
    if !stderr.trim().is_empty() {
        tracing::debug!(target: "fn", function = name, "{}", stderr.trim());
    }
    Ok(String::from_utf8_lossy(&output.stdout).into_owned())
}

/// Keep at most `max` lines, appending a marker for anything dropped.
fn truncate_lines(text: &str, max: usize) -> String {
    let lines: Vec<&str> = text.trim_end().lines().collect();
    if lines.len() <= max {
        return lines.join("\n");
    }
    let dropped = lines.len() - max;
    let mut kept = lines[..max].join("\n");
    kept.push_str(&format!("\n... ({dropped} lines truncated)"));
    kept
}
