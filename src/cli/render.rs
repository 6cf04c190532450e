//! The `render` command.
//!
//! Renders a package tree: hydrates every package depth-first, writes the
//! resulting resources back at the root package, and prunes files that no
//! longer correspond to any output resource. Exits non-zero on the first
//! hydration error; on any error nothing under the root package is written
//! or deleted.

use anyhow::{Context, Result};
use clap::Args;
use std::path::PathBuf;

use crate::render::Renderer;

/// Render a package tree.
#[derive(Args, Debug)]
pub struct RenderCommand {
    /// Package directory to render. Defaults to the current directory.
    pkg: Option<PathBuf>,

    /// Directory in which per-function structured results are recorded.
    /// Must already exist.
    #[arg(long)]
    results_dir: Option<PathBuf>,
}

impl RenderCommand {
    pub async fn execute(self, quiet: bool) -> Result<()> {
        let pkg_path = match self.pkg {
            Some(pkg) => pkg,
            None => std::env::current_dir().context("failed to resolve working directory")?,
        };
        if let Some(dir) = &self.results_dir {
            super::ensure_results_dir(dir)?;
        }

        let renderer = Renderer {
            pkg_path,
            results_dir: self.results_dir,
            quiet,
        };
        renderer.execute().await
    }
}
