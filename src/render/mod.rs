//! The render subsystem: package hydration.
//!
//! Hydration walks the package tree depth-first, runs each package's
//! pipeline over its combined inputs (subpackage outputs first, then local
//! resources), rewrites path annotations so every resource is rooted at the
//! root package, and reconciles the result against the on-disk layout:
//! output files are written, and input files no output references anymore
//! are pruned.
//!
//! The whole operation is transactional in effect: hydration happens
//! entirely in memory, files are only written after every pipeline in the
//! tree has succeeded, and pruning only runs after a fully successful write
//! phase.

mod hydrate;
mod reconcile;

pub(crate) use reconcile::{check_package_scope, detect_path_conflicts, write_resources};

use anyhow::{Context, Result};
use std::path::PathBuf;

use hydrate::HydrationContext;

use crate::pkg::Package;
use crate::runner::{FunctionResultList, FunctionRunResults};

/// Name of the recorded function results file.
pub const RESULTS_FILE: &str = "results.yaml";

/// Hydrates one package tree.
#[derive(Debug)]
pub struct Renderer {
    /// Root package directory.
    pub pkg_path: PathBuf,
    /// Directory to record per-function structured results in, if any.
    pub results_dir: Option<PathBuf>,
    /// Suppress per-function progress output.
    pub quiet: bool,
}

impl Renderer {
    /// Run the full hydration: walk, pipelines, write, prune.
    pub async fn execute(&self) -> Result<()> {
        let root = Package::open(&self.pkg_path)?;
        let root_path = root.unique_path().to_path_buf();
        let mut ctx = HydrationContext::new(root.clone(), self.quiet);

        let hydrated = ctx
            .hydrate(root)
            .await
            .with_context(|| format!("failed to run pipeline in package {}", root_path.display()));

        // Results are recorded even when hydration fails; validator
        // diagnostics matter most on the failing run.
        self.save_results(ctx.take_results());
        let resources = hydrated?;

        ctx.track_output_files(&resources)?;
        write_resources(&root_path, &resources)?;
        ctx.prune()?;
        Ok(())
    }

    fn save_results(&self, results: Vec<FunctionRunResults>) {
        let Some(dir) = &self.results_dir else {
            return;
        };
        let list = FunctionResultList::new(results);
        let path = dir.join(RESULTS_FILE);
        let write = serde_yaml::to_string(&list)
            .map_err(anyhow::Error::from)
            .and_then(|text| std::fs::write(&path, text).map_err(anyhow::Error::from));
        match write {
            Ok(()) => {
                tracing::debug!(target: "render", file = %path.display(), "recorded function results");
            }
            Err(err) => {
                tracing::warn!(target: "render", file = %path.display(), "failed to record function results: {err:#}");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::manifest::MANIFEST_FILE;
    use std::fs;
    use tempfile::tempdir;

    const EMPTY_PKGFILE: &str = "apiVersion: confpm.dev/v1alpha1\nkind: Pkgfile\n";

    #[tokio::test]
    async fn render_with_empty_pipelines_is_identity() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join(MANIFEST_FILE), EMPTY_PKGFILE).unwrap();
        let original = "apiVersion: apps/v1\nkind: Deployment\nmetadata:\n  name: app\n";
        fs::write(dir.path().join("deploy.yaml"), original).unwrap();

        let renderer = Renderer {
            pkg_path: dir.path().to_path_buf(),
            results_dir: None,
            quiet: true,
        };
        renderer.execute().await.unwrap();

        assert_eq!(
            fs::read_to_string(dir.path().join("deploy.yaml")).unwrap(),
            original
        );
        // second run stays byte-identical
        renderer.execute().await.unwrap();
        assert_eq!(
            fs::read_to_string(dir.path().join("deploy.yaml")).unwrap(),
            original
        );
    }

    #[tokio::test]
    async fn nested_packages_keep_their_layout() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join(MANIFEST_FILE), EMPTY_PKGFILE).unwrap();
        fs::write(dir.path().join("root.yaml"), "kind: Root\n").unwrap();
        let sub = dir.path().join("sub");
        fs::create_dir_all(&sub).unwrap();
        fs::write(sub.join(MANIFEST_FILE), EMPTY_PKGFILE).unwrap();
        fs::write(sub.join("child.yaml"), "kind: Child\n").unwrap();

        let renderer = Renderer {
            pkg_path: dir.path().to_path_buf(),
            results_dir: None,
            quiet: true,
        };
        renderer.execute().await.unwrap();

        assert_eq!(
            fs::read_to_string(sub.join("child.yaml")).unwrap(),
            "kind: Child\n"
        );
        assert_eq!(
            fs::read_to_string(dir.path().join("root.yaml")).unwrap(),
            "kind: Root\n"
        );
    }

    #[tokio::test]
    async fn missing_manifest_fails_before_touching_anything() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("orphan.yaml"), "kind: Orphan\n").unwrap();

        let renderer = Renderer {
            pkg_path: dir.path().to_path_buf(),
            results_dir: None,
            quiet: true,
        };
        assert!(renderer.execute().await.is_err());
        assert!(dir.path().join("orphan.yaml").exists());
    }
}
