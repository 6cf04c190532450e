//! Package reader.
//!
//! A package is a directory containing a `Pkgfile` manifest and zero or more
//! resource files. Packages nest: any immediate child directory that itself
//! contains a manifest is a direct subpackage. A package is identified by
//! its unique path, the canonical absolute path of its directory; two
//! handles with the same unique path refer to the same package.

use anyhow::{Context, Result};
use std::fmt;
use std::path::{Path, PathBuf};

use crate::core::ConfpmError;
use crate::manifest::{MANIFEST_FILE, Manifest, Pipeline};
use crate::resource::{INDEX_ANNOTATION, PATH_ANNOTATION, Resource};
use crate::utils::clean_path;

/// File extensions recognized as resource-bearing.
const RESOURCE_EXTENSIONS: [&str; 2] = ["yaml", "yml"];

/// A handle to one package directory with its parsed manifest.
#[derive(Debug, Clone)]
pub struct Package {
    unique_path: PathBuf,
    manifest: Manifest,
}

impl Package {
    /// Open the package at `dir`.
    ///
    /// Fails with [`ConfpmError::MissingManifest`] when the directory has no
    /// manifest; reading a package without a manifest is never attempted.
    pub fn open(dir: &Path) -> Result<Self> {
        let manifest = Manifest::load(dir)?;
        let unique_path = dir
            .canonicalize()
            .with_context(|| format!("failed to resolve package path {}", dir.display()))?;
        Ok(Self {
            unique_path,
            manifest,
        })
    }

    /// The canonical absolute path identifying this package.
    pub fn unique_path(&self) -> &Path {
        &self.unique_path
    }

    /// The pipeline declared by this package's manifest (possibly empty).
    pub fn pipeline(&self) -> Pipeline {
        self.manifest.pipeline()
    }

    /// Path of this package relative to `root`.
    ///
    /// Fails with [`ConfpmError::NotDescendant`] when this package does not
    /// live inside the root package.
    pub fn relative_path_to(&self, root: &Package) -> Result<PathBuf> {
        self.unique_path
            .strip_prefix(&root.unique_path)
            .map(Path::to_path_buf)
            .map_err(|_| {
                ConfpmError::NotDescendant {
                    package: self.unique_path.display().to_string(),
                    root: root.unique_path.display().to_string(),
                }
                .into()
            })
    }

    /// Read the resources stored directly inside this package directory.
    ///
    /// Multi-document files are split, and every resource is annotated with
    /// its file path (relative to this package) and its ordinal within the
    /// file. Files belonging to direct subpackages are never read here; the
    /// manifest and any function-config files are only surfaced when
    /// `include_meta` is set, with the manifest ordered first.
    pub fn local_resources(&self, include_meta: bool) -> Result<Vec<Resource>> {
        let fn_config_files = self.function_config_files();

        let mut user_files = Vec::new();
        let mut meta_files = Vec::new();
        for entry in std::fs::read_dir(&self.unique_path)
            .with_context(|| format!("failed to read package {}", self.unique_path.display()))?
        {
            let entry = entry?;
            if !entry.path().is_file() {
                continue;
            }
            let name = entry.file_name().to_string_lossy().into_owned();
            let is_resource_file = Path::new(&name)
                .extension()
                .and_then(|e| e.to_str())
                .is_some_and(|e| RESOURCE_EXTENSIONS.contains(&e));
            if !is_resource_file {
                continue;
            }
            if fn_config_files.iter().any(|f| f == &name) {
                meta_files.push(name);
            } else {
                user_files.push(name);
            }
        }
        user_files.sort();
        meta_files.sort();

        let mut files = Vec::new();
        if include_meta {
            files.push(MANIFEST_FILE.to_string());
            files.extend(meta_files);
        }
        files.extend(user_files);

        let mut resources = Vec::new();
        for file in &files {
            let path = self.unique_path.join(file);
            let text = std::fs::read_to_string(&path)
                .with_context(|| format!("failed to read {}", path.display()))?;
            let docs = Resource::parse_all(&text)
                .with_context(|| format!("failed to parse {}", path.display()))?;
            for (index, mut resource) in docs.into_iter().enumerate() {
                resource.set_annotation(PATH_ANNOTATION, file)?;
                resource.set_annotation(INDEX_ANNOTATION, &index.to_string())?;
                resources.push(resource);
            }
        }
        Ok(resources)
    }

    /// Enumerate the immediate child directories that are themselves
    /// packages, in lexicographic order. Does not recurse.
    pub fn direct_subpackages(&self) -> Result<Vec<Package>> {
        let mut dirs = Vec::new();
        for entry in std::fs::read_dir(&self.unique_path)
            .with_context(|| format!("failed to read package {}", self.unique_path.display()))?
        {
            let entry = entry?;
            let path = entry.path();
            if path.is_dir() && path.join(MANIFEST_FILE).is_file() {
                dirs.push((entry.file_name(), path));
            }
        }
        dirs.sort_by(|a, b| a.0.cmp(&b.0));

        let mut subpackages = Vec::new();
        for (_, path) in dirs {
            subpackages.push(Package::open(&path)?);
        }
        Ok(subpackages)
    }

    /// File names directly inside this package that hold function configs.
    fn function_config_files(&self) -> Vec<String> {
        let pipeline = self.manifest.pipeline();
        pipeline
            .mutators
            .iter()
            .chain(pipeline.validators.iter())
            .filter_map(|f| f.config_path.as_deref())
            .map(clean_path)
            .filter(|p| !p.contains('/'))
            .collect()
    }
}

impl fmt::Display for Package {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.unique_path.display())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    const EMPTY_PKGFILE: &str = "apiVersion: confpm.dev/v1alpha1\nkind: Pkgfile\n";

    fn make_pkg(dir: &Path, manifest: &str) {
        fs::create_dir_all(dir).unwrap();
        fs::write(dir.join(MANIFEST_FILE), manifest).unwrap();
    }

    #[test]
    fn open_requires_manifest() {
        let dir = tempdir().unwrap();
        let err = Package::open(dir.path()).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<ConfpmError>(),
            Some(ConfpmError::MissingManifest { .. })
        ));
    }

    #[test]
    fn local_resources_splits_and_annotates() {
        let dir = tempdir().unwrap();
        make_pkg(dir.path(), EMPTY_PKGFILE);
        fs::write(dir.path().join("b.yaml"), "kind: B0\n---\nkind: B1\n").unwrap();
        fs::write(dir.path().join("a.yaml"), "kind: A\n").unwrap();
        fs::write(dir.path().join("notes.md"), "not a resource").unwrap();

        let pkg = Package::open(dir.path()).unwrap();
        let resources = pkg.local_resources(false).unwrap();
        let locations: Vec<(String, String)> = resources
            .iter()
            .map(|r| r.file_location().unwrap())
            .collect();
        assert_eq!(
            locations,
            vec![
                ("a.yaml".to_string(), "0".to_string()),
                ("b.yaml".to_string(), "0".to_string()),
                ("b.yaml".to_string(), "1".to_string()),
            ]
        );
        assert_eq!(resources[1].kind(), Some("B0"));
        assert_eq!(resources[2].kind(), Some("B1"));
    }

    #[test]
    fn local_resources_excludes_subpackage_files() {
        let dir = tempdir().unwrap();
        make_pkg(dir.path(), EMPTY_PKGFILE);
        fs::write(dir.path().join("root.yaml"), "kind: Root\n").unwrap();
        make_pkg(&dir.path().join("sub"), EMPTY_PKGFILE);
        fs::write(dir.path().join("sub").join("sub.yaml"), "kind: Sub\n").unwrap();

        let pkg = Package::open(dir.path()).unwrap();
        let resources = pkg.local_resources(false).unwrap();
        assert_eq!(resources.len(), 1);
        assert_eq!(resources[0].kind(), Some("Root"));
    }

    #[test]
    fn local_resources_excludes_function_configs_by_default() {
        let dir = tempdir().unwrap();
        make_pkg(
            dir.path(),
            "\
apiVersion: confpm.dev/v1alpha1
kind: Pkgfile
pipeline:
  mutators:
    - image: fn/set-namespace
      configPath: fn-config.yaml
",
        );
        fs::write(dir.path().join("fn-config.yaml"), "kind: SetNamespace\n").unwrap();
        fs::write(dir.path().join("app.yaml"), "kind: App\n").unwrap();

        let pkg = Package::open(dir.path()).unwrap();
        let resources = pkg.local_resources(false).unwrap();
        assert_eq!(resources.len(), 1);
        assert_eq!(resources[0].kind(), Some("App"));

        // with include_meta the manifest comes first, then the fn config
        let with_meta = pkg.local_resources(true).unwrap();
        let kinds: Vec<_> = with_meta.iter().map(|r| r.kind().unwrap().to_string()).collect();
        assert_eq!(kinds, vec!["Pkgfile", "SetNamespace", "App"]);
        assert_eq!(
            with_meta[0].file_location().unwrap().0,
            MANIFEST_FILE.to_string()
        );
    }

    #[test]
    fn direct_subpackages_are_sorted_and_non_recursive() {
        let dir = tempdir().unwrap();
        make_pkg(dir.path(), EMPTY_PKGFILE);
        make_pkg(&dir.path().join("zeta"), EMPTY_PKGFILE);
        make_pkg(&dir.path().join("alpha"), EMPTY_PKGFILE);
        make_pkg(&dir.path().join("alpha").join("nested"), EMPTY_PKGFILE);
        fs::create_dir_all(dir.path().join("plain-dir")).unwrap();

        let pkg = Package::open(dir.path()).unwrap();
        let subs = pkg.direct_subpackages().unwrap();
        let names: Vec<_> = subs
            .iter()
            .map(|s| {
                s.unique_path()
                    .file_name()
                    .unwrap()
                    .to_string_lossy()
                    .into_owned()
            })
            .collect();
        assert_eq!(names, vec!["alpha", "zeta"]);
    }

    #[test]
    fn relative_path_to_root() {
        let dir = tempdir().unwrap();
        make_pkg(dir.path(), EMPTY_PKGFILE);
        make_pkg(&dir.path().join("sub"), EMPTY_PKGFILE);

        let root = Package::open(dir.path()).unwrap();
        let sub = Package::open(&dir.path().join("sub")).unwrap();
        assert_eq!(sub.relative_path_to(&root).unwrap(), PathBuf::from("sub"));
        assert_eq!(root.relative_path_to(&root).unwrap(), PathBuf::new());

        let err = root.relative_path_to(&sub).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<ConfpmError>(),
            Some(ConfpmError::NotDescendant { .. })
        ));
    }
}
