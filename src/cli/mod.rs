//! Command-line interface for confpm.
//!
//! The CLI is a thin layer over the engine: it parses arguments, applies the
//! logging configuration, and delegates to the subcommand `execute()`
//! methods. Heavy lifting lives in [`crate::render`] and [`crate::runner`].
//!
//! ```bash
//! confpm render deploy/            # hydrate a package tree
//! confpm render --results-dir out  # record function results
//! confpm eval pkg/ --image gcr.io/fn/set-namespace:v0.1 -- namespace=prod
//! ```

pub mod eval;
pub mod render;

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::Path;

use crate::core::ConfpmError;

/// Top-level CLI for the confpm binary.
#[derive(Parser)]
#[command(
    name = "confpm",
    about = "Configuration package manager - hydrate packages of structured resources",
    version,
    long_about = "confpm composes nested configuration packages by running each package's \
                  pipeline of transformation and validation functions, then reconciling the \
                  result against the package directory."
)]
pub struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose output (equivalent to RUST_LOG=debug).
    #[arg(short, long, global = true, conflicts_with = "quiet")]
    verbose: bool,

    /// Suppress all output except errors.
    #[arg(short, long, global = true)]
    quiet: bool,
}

/// Available subcommands.
#[derive(Subcommand)]
enum Commands {
    /// Render a package tree: run every package's pipeline and write the
    /// hydrated resources back to the root package.
    Render(render::RenderCommand),

    /// Evaluate a single function against a directory of resources (or a
    /// resource stream on stdin).
    Eval(eval::EvalCommand),
}

impl Cli {
    /// Default log directive derived from the verbosity flags.
    pub fn log_directive(&self) -> &'static str {
        if self.verbose {
            "debug"
        } else if self.quiet {
            "error"
        } else {
            "info"
        }
    }

    /// Dispatch to the selected subcommand.
    pub async fn execute(self) -> Result<()> {
        match self.command {
            Commands::Render(cmd) => cmd.execute(self.quiet).await,
            Commands::Eval(cmd) => cmd.execute(self.quiet).await,
        }
    }
}

/// A results directory must pre-exist; the engine never creates it.
pub(crate) fn ensure_results_dir(dir: &Path) -> Result<()> {
    match std::fs::metadata(dir) {
        Ok(meta) if meta.is_dir() => Ok(()),
        Ok(_) => Err(anyhow::anyhow!(
            "results-dir {:?} is not a directory",
            dir.display().to_string()
        )),
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => Err(anyhow::anyhow!(
            "results-dir {:?} must exist",
            dir.display().to_string()
        )),
        Err(err) => Err(anyhow::Error::from(ConfpmError::IoError(err))),
    }
}
