//! Path reconciliation and package writing.
//!
//! Resources carry their own destination as a path annotation, so moving a
//! resource between files is just an annotation change. This module keeps
//! those annotations coherent: it rewrites them when resources cross package
//! boundaries, rejects conflicts and escapes, materializes the final
//! resource set, and prunes files that no longer correspond to any output.

use anyhow::{Context, Result};
use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};
use std::path::Path;

use crate::core::ConfpmError;
use crate::resource::{INDEX_ANNOTATION, PATH_ANNOTATION, Resource};
use crate::utils::{clean_path, escapes_package, path_to_slash};

/// Rewrite path annotations for resources crossing a package boundary
/// upward, prepending the child-to-parent relative path.
///
/// An annotation that already begins with the prefix is left unchanged, so
/// re-adjusting memoized output is a no-op.
pub(crate) fn adjust_rel_path(resources: &mut [Resource], rel: &Path) -> Result<()> {
    if rel.as_os_str().is_empty() {
        return Ok(());
    }
    let prefix = path_to_slash(rel);
    for resource in resources {
        let (current, _) = resource.file_location()?;
        if !current.starts_with(&format!("{prefix}/")) {
            resource.set_annotation(PATH_ANNOTATION, &format!("{prefix}/{current}"))?;
        }
    }
    Ok(())
}

/// Reject resource sets where two resources share `(clean(path), index)`.
pub(crate) fn detect_path_conflicts(resources: &[Resource]) -> Result<()> {
    let mut seen: HashMap<String, HashSet<String>> = HashMap::new();
    for resource in resources {
        let (path, index) = resource.file_location()?;
        let cleaned = clean_path(&path);
        if !seen.entry(cleaned.clone()).or_default().insert(index.clone()) {
            return Err(ConfpmError::DuplicatePathIndex {
                path: cleaned,
                index,
            }
            .into());
        }
    }
    Ok(())
}

/// Reject resources whose normalized path resolves outside the root package.
pub(crate) fn check_package_scope(resources: &[Resource]) -> Result<()> {
    for resource in resources {
        let (path, _) = resource.file_location()?;
        if escapes_package(&clean_path(&path)) {
            return Err(ConfpmError::PathEscapesPackage { path }.into());
        }
    }
    Ok(())
}

/// The set of cleaned file paths referenced by a resource set.
pub(crate) fn collect_file_set(resources: &[Resource]) -> Result<BTreeSet<String>> {
    resources
        .iter()
        .map(|r| Ok(clean_path(&r.file_location()?.0)))
        .collect()
}

/// Materialize the resource set under `root`.
///
/// Resources are grouped by cleaned path and ordered within each file by
/// index; the transport annotations are stripped before serialization so
/// files on disk stay free of engine metadata. Only files named by the
/// resource set are touched.
pub(crate) fn write_resources(root: &Path, resources: &[Resource]) -> Result<()> {
    let mut files: BTreeMap<String, Vec<(usize, Resource)>> = BTreeMap::new();
    for resource in resources {
        let (path, index) = resource.file_location()?;
        let index: usize = index.parse().with_context(|| {
            format!("invalid index annotation {index:?} on resource at {path:?}")
        })?;
        let mut stripped = resource.clone();
        stripped.remove_annotation(PATH_ANNOTATION);
        stripped.remove_annotation(INDEX_ANNOTATION);
        files
            .entry(clean_path(&path))
            .or_default()
            .push((index, stripped));
    }

    for (path, mut docs) in files {
        docs.sort_by_key(|(index, _)| *index);
        let ordered: Vec<Resource> = docs.into_iter().map(|(_, r)| r).collect();
        let text = Resource::serialize_all(&ordered)?;
        let full = root.join(&path);
        if let Some(parent) = full.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("failed to create {}", parent.display()))?;
        }
        std::fs::write(&full, text)
            .with_context(|| format!("failed to write {}", full.display()))?;
        tracing::debug!(target: "render", file = %path, "wrote resource file");
    }
    Ok(())
}

/// Delete input files that no output resource references anymore.
pub(crate) fn prune_files(
    root: &Path,
    input_files: &BTreeSet<String>,
    output_files: &BTreeSet<String>,
) -> Result<()> {
    for file in input_files.difference(output_files) {
        let path = root.join(file);
        std::fs::remove_file(&path)
            .with_context(|| format!("failed to delete pruned file {}", path.display()))?;
        tracing::debug!(target: "render", file = %file, "pruned stale file");
    }
    Ok(())
}
