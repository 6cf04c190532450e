//! Package manifest (`Pkgfile`) parsing and types.
//!
//! Every package directory carries a manifest with a reserved name declaring
//! the package's pipeline: an ordered list of mutator functions followed by
//! an ordered list of validator functions. The manifest may also carry
//! upstream provenance fields, which the hydration engine ignores.
//!
//! # Manifest format
//!
//! ```yaml
//! apiVersion: confpm.dev/v1alpha1
//! kind: Pkgfile
//! metadata:
//!   name: my-package
//! pipeline:
//!   mutators:
//!     - image: gcr.io/fn/set-namespace:v0.1
//!       configMap:
//!         namespace: prod
//!   validators:
//!     - image: gcr.io/fn/validate-quotas:v0.2
//! ```
//!
//! Each pipeline entry names its function with exactly one of `image` (a
//! container image reference) or `exec` (a local executable path), plus at
//! most one of the three configuration forms `config`, `configMap`,
//! `configPath`.

pub mod validation;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::core::ConfpmError;

/// Reserved file name of the package manifest.
pub const MANIFEST_FILE: &str = "Pkgfile";

/// Expected `apiVersion` of the manifest document.
pub const MANIFEST_API_VERSION: &str = "confpm.dev/v1alpha1";

/// Expected `kind` of the manifest document.
pub const MANIFEST_KIND: &str = "Pkgfile";

/// The parsed package manifest.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Manifest {
    pub api_version: String,
    pub kind: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<Metadata>,
    /// Upstream provenance; carried through untouched, irrelevant to
    /// hydration.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub upstream: Option<serde_yaml::Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub info: Option<serde_yaml::Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pipeline: Option<Pipeline>,
}

/// Manifest object metadata.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Metadata {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

/// The transformation pipeline of one package.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Pipeline {
    /// Functions that may modify resources, in execution order.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub mutators: Vec<Function>,
    /// Functions that check resources, run after all mutators.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub validators: Vec<Function>,
}

impl Pipeline {
    /// An empty pipeline is the identity transformation.
    pub fn is_empty(&self) -> bool {
        self.mutators.is_empty() && self.validators.is_empty()
    }
}

/// One function invocation in a pipeline.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Function {
    /// Container image reference running this function.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
    /// Local executable path running this function (alternative to `image`).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exec: Option<String>,
    /// Inline function configuration document.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub config: Option<serde_yaml::Value>,
    /// Flat key/value configuration, wrapped into a ConfigMap for the
    /// function.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub config_map: Option<serde_yaml::Mapping>,
    /// Package-relative path to a file holding the configuration document.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub config_path: Option<String>,
}

impl Function {
    /// Display name: the image reference or executable path.
    pub fn name(&self) -> &str {
        self.image
            .as_deref()
            .or(self.exec.as_deref())
            .unwrap_or("<unnamed function>")
    }
}

impl Manifest {
    /// Load and parse the manifest of the package at `dir`.
    ///
    /// Fails with [`ConfpmError::MissingManifest`] when no `Pkgfile` exists
    /// and [`ConfpmError::InvalidManifest`] when it cannot be parsed or its
    /// document identity is wrong.
    pub fn load(dir: &Path) -> Result<Self> {
        let path = dir.join(MANIFEST_FILE);
        let text = match std::fs::read_to_string(&path) {
            Ok(text) => text,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                return Err(ConfpmError::MissingManifest {
                    path: dir.display().to_string(),
                }
                .into());
            }
            Err(err) => {
                return Err(anyhow::Error::from(ConfpmError::IoError(err)))
                    .with_context(|| format!("failed to read {}", path.display()));
            }
        };

        let manifest: Manifest =
            serde_yaml::from_str(&text).map_err(|err| ConfpmError::InvalidManifest {
                path: dir.display().to_string(),
                reason: err.to_string(),
            })?;

        if manifest.kind != MANIFEST_KIND {
            return Err(ConfpmError::InvalidManifest {
                path: dir.display().to_string(),
                reason: format!("kind must be {MANIFEST_KIND:?}, got {:?}", manifest.kind),
            }
            .into());
        }
        if manifest.api_version != MANIFEST_API_VERSION {
            return Err(ConfpmError::InvalidManifest {
                path: dir.display().to_string(),
                reason: format!(
                    "apiVersion must be {MANIFEST_API_VERSION:?}, got {:?}",
                    manifest.api_version
                ),
            }
            .into());
        }
        Ok(manifest)
    }

    /// The pipeline declared by this manifest, or the empty pipeline.
    pub fn pipeline(&self) -> Pipeline {
        self.pipeline.clone().unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    const PKGFILE: &str = "\
apiVersion: confpm.dev/v1alpha1
kind: Pkgfile
metadata:
  name: base
pipeline:
  mutators:
    - image: gcr.io/fn/set-namespace:v0.1
      configMap:
        namespace: prod
  validators:
    - image: gcr.io/fn/validate-quotas:v0.2
";

    #[test]
    fn load_parses_pipeline() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join(MANIFEST_FILE), PKGFILE).unwrap();

        let manifest = Manifest::load(dir.path()).unwrap();
        let pipeline = manifest.pipeline();
        assert_eq!(pipeline.mutators.len(), 1);
        assert_eq!(pipeline.validators.len(), 1);
        assert_eq!(pipeline.mutators[0].name(), "gcr.io/fn/set-namespace:v0.1");
        assert!(pipeline.mutators[0].config_map.is_some());
    }

    #[test]
    fn load_fails_without_manifest() {
        let dir = tempdir().unwrap();
        let err = Manifest::load(dir.path()).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<ConfpmError>(),
            Some(ConfpmError::MissingManifest { .. })
        ));
    }

    #[test]
    fn load_rejects_wrong_kind() {
        let dir = tempdir().unwrap();
        fs::write(
            dir.path().join(MANIFEST_FILE),
            "apiVersion: confpm.dev/v1alpha1\nkind: NotAPkgfile\n",
        )
        .unwrap();
        let err = Manifest::load(dir.path()).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<ConfpmError>(),
            Some(ConfpmError::InvalidManifest { .. })
        ));
    }

    #[test]
    fn load_rejects_unparseable_yaml() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join(MANIFEST_FILE), "pipeline: [unclosed\n").unwrap();
        assert!(Manifest::load(dir.path()).is_err());
    }

    #[test]
    fn missing_pipeline_is_empty() {
        let dir = tempdir().unwrap();
        fs::write(
            dir.path().join(MANIFEST_FILE),
            "apiVersion: confpm.dev/v1alpha1\nkind: Pkgfile\n",
        )
        .unwrap();
        let manifest = Manifest::load(dir.path()).unwrap();
        assert!(manifest.pipeline().is_empty());
    }

    #[test]
    fn upstream_fields_round_trip_opaquely() {
        let dir = tempdir().unwrap();
        fs::write(
            dir.path().join(MANIFEST_FILE),
            "apiVersion: confpm.dev/v1alpha1\nkind: Pkgfile\nupstream:\n  type: git\n  git:\n    repo: https://example.com/pkg.git\n",
        )
        .unwrap();
        let manifest = Manifest::load(dir.path()).unwrap();
        assert!(manifest.upstream.is_some());
        assert!(manifest.pipeline().is_empty());
    }
}
