//! Shared helpers for integration tests.
//!
//! `TestPackage` builds a temporary package tree, writes manifests and
//! resources into it, and runs the confpm binary against it. Function
//! scripts (the exec stand-ins for container functions) live in a sibling
//! directory outside the package so they never show up as resources.
#![allow(dead_code)]

use anyhow::{Context, Result};
use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;
use tempfile::TempDir;

pub const EMPTY_PKGFILE: &str = "apiVersion: confpm.dev/v1alpha1\nkind: Pkgfile\n";

/// Captured output of one binary invocation.
pub struct CommandOutput {
    pub stdout: String,
    pub stderr: String,
    pub success: bool,
    pub code: Option<i32>,
}

/// A temporary package tree plus the machinery to run confpm against it.
pub struct TestPackage {
    _temp_dir: TempDir,
    root_dir: PathBuf,
    scripts_dir: PathBuf,
    results_dir: PathBuf,
}

impl TestPackage {
    pub fn new() -> Result<Self> {
        let temp_dir = TempDir::new()?;
        let root_dir = temp_dir.path().join("pkg");
        let scripts_dir = temp_dir.path().join("scripts");
        let results_dir = temp_dir.path().join("results");
        fs::create_dir_all(&root_dir)?;
        fs::create_dir_all(&scripts_dir)?;
        fs::create_dir_all(&results_dir)?;
        Ok(Self {
            _temp_dir: temp_dir,
            root_dir,
            scripts_dir,
            results_dir,
        })
    }

    /// The root package directory.
    pub fn root(&self) -> &Path {
        &self.root_dir
    }

    /// A pre-created directory for `--results-dir`.
    pub fn results_dir(&self) -> &Path {
        &self.results_dir
    }

    /// Write a manifest into `rel_dir` (empty string for the root package).
    pub fn write_manifest(&self, rel_dir: &str, content: &str) -> Result<()> {
        let dir = self.root_dir.join(rel_dir);
        fs::create_dir_all(&dir)?;
        fs::write(dir.join("Pkgfile"), content)
            .with_context(|| format!("failed to write manifest in {rel_dir:?}"))?;
        Ok(())
    }

    /// Write a resource file at a root-relative path.
    pub fn write_resource(&self, rel: &str, content: &str) -> Result<()> {
        let path = self.root_dir.join(rel);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&path, content).with_context(|| format!("failed to write resource {rel:?}"))?;
        Ok(())
    }

    pub fn read_file(&self, rel: &str) -> Result<String> {
        fs::read_to_string(self.root_dir.join(rel))
            .with_context(|| format!("failed to read {rel:?}"))
    }

    pub fn exists(&self, rel: &str) -> bool {
        self.root_dir.join(rel).exists()
    }

    /// Write an executable function script and return its absolute path.
    #[cfg(unix)]
    pub fn write_script(&self, name: &str, body: &str) -> Result<PathBuf> {
        use std::os::unix::fs::PermissionsExt;
        let path = self.scripts_dir.join(name);
        fs::write(&path, body)?;
        fs::set_permissions(&path, fs::Permissions::from_mode(0o755))?;
        Ok(path)
    }

    /// Run the confpm binary with the package root as working directory.
    pub fn run(&self, args: &[&str]) -> Result<CommandOutput> {
        self.run_with_stdin(args, None)
    }

    /// Run the confpm binary, optionally feeding text on stdin.
    pub fn run_with_stdin(&self, args: &[&str], stdin: Option<&str>) -> Result<CommandOutput> {
        let binary = env!("CARGO_BIN_EXE_confpm");
        let mut cmd = Command::new(binary);
        cmd.args(args)
            .current_dir(&self.root_dir)
            .env("NO_COLOR", "1");

        let output = if let Some(text) = stdin {
            use std::io::Write;
            use std::process::Stdio;
            cmd.stdin(Stdio::piped())
                .stdout(Stdio::piped())
                .stderr(Stdio::piped());
            let mut child = cmd.spawn().context("failed to spawn confpm")?;
            child
                .stdin
                .as_mut()
                .context("no stdin handle")?
                .write_all(text.as_bytes())?;
            child.wait_with_output()?
        } else {
            cmd.output().context("failed to run confpm")?
        };

        Ok(CommandOutput {
            stdout: String::from_utf8_lossy(&output.stdout).to_string(),
            stderr: String::from_utf8_lossy(&output.stderr).to_string(),
            success: output.status.success(),
            code: output.status.code(),
        })
    }
}
