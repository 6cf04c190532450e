//! Function configuration builder.
//!
//! Resolves the three mutually exclusive configuration forms of a pipeline
//! entry into the single optional [`Resource`] handed to the function:
//!
//! - `configPath`: a package-relative file read and parsed as one document
//! - `config`: an inline document embedded in the manifest
//! - `configMap`: flat key/values wrapped into a synthetic `ConfigMap`
//!
//! Mutual exclusion is checked during pipeline validation; by the time this
//! builder runs, at most one form is present.

use anyhow::Result;
use serde_yaml::{Mapping, Value};
use std::path::Path;

use crate::core::ConfpmError;
use crate::manifest::Function;
use crate::resource::Resource;

/// Build the configuration resource for one function invocation.
pub fn function_config(f: &Function, pkg_dir: &Path) -> Result<Option<Resource>> {
    if let Some(config_path) = &f.config_path {
        let path = pkg_dir.join(config_path);
        let text =
            std::fs::read_to_string(&path).map_err(|_| ConfpmError::InvalidFunctionConfig {
                function: f.name().to_string(),
                reason: format!("missing function config {config_path:?}"),
            })?;
        let resource = Resource::parse(&text).map_err(|err| ConfpmError::InvalidFunctionConfig {
            function: f.name().to_string(),
            reason: format!("invalid function config {config_path:?}: {err:#}"),
        })?;
        return Ok(Some(resource));
    }

    if let Some(config) = &f.config {
        return Ok(Some(Resource::from_value(config.clone())));
    }

    if let Some(config_map) = &f.config_map {
        if !config_map.is_empty() {
            return Ok(Some(synthesize_config_map(config_map)));
        }
    }

    Ok(None)
}

/// Wrap a flat mapping into the synthetic `ConfigMap` handed to functions.
pub(crate) fn synthesize_config_map(data: &Mapping) -> Resource {
    let mut metadata = Mapping::new();
    metadata.insert(Value::from("name"), Value::from("function-input"));

    let mut doc = Mapping::new();
    doc.insert(Value::from("apiVersion"), Value::from("v1"));
    doc.insert(Value::from("kind"), Value::from("ConfigMap"));
    doc.insert(Value::from("metadata"), Value::Mapping(metadata));
    doc.insert(Value::from("data"), Value::Mapping(data.clone()));
    Resource::from_value(Value::Mapping(doc))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    #[test]
    fn no_config_forms_yields_none() {
        let dir = tempdir().unwrap();
        let f = Function {
            image: Some("fn/a".to_string()),
            ..Default::default()
        };
        assert!(function_config(&f, dir.path()).unwrap().is_none());
    }

    #[test]
    fn file_form_reads_the_document() {
        let dir = tempdir().unwrap();
        fs::write(
            dir.path().join("ns.yaml"),
            "kind: SetNamespace\nspec:\n  namespace: prod\n",
        )
        .unwrap();
        let f = Function {
            image: Some("fn/set-namespace".to_string()),
            config_path: Some("ns.yaml".to_string()),
            ..Default::default()
        };
        let config = function_config(&f, dir.path()).unwrap().unwrap();
        assert_eq!(config.kind(), Some("SetNamespace"));
    }

    #[test]
    fn file_form_requires_the_file() {
        let dir = tempdir().unwrap();
        let f = Function {
            image: Some("fn/a".to_string()),
            config_path: Some("missing.yaml".to_string()),
            ..Default::default()
        };
        let err = function_config(&f, dir.path()).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<ConfpmError>(),
            Some(ConfpmError::InvalidFunctionConfig { .. })
        ));
    }

    #[test]
    fn file_form_rejects_multi_document_files() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("cfg.yaml"), "kind: A\n---\nkind: B\n").unwrap();
        let f = Function {
            image: Some("fn/a".to_string()),
            config_path: Some("cfg.yaml".to_string()),
            ..Default::default()
        };
        assert!(function_config(&f, dir.path()).is_err());
    }

    #[test]
    fn inline_form_wraps_the_document() {
        let dir = tempdir().unwrap();
        let inline: Value = serde_yaml::from_str("kind: Custom\nvalue: 42\n").unwrap();
        let f = Function {
            image: Some("fn/a".to_string()),
            config: Some(inline),
            ..Default::default()
        };
        let config = function_config(&f, dir.path()).unwrap().unwrap();
        assert_eq!(config.kind(), Some("Custom"));
    }

    #[test]
    fn mapping_form_synthesizes_a_config_map() {
        let dir = tempdir().unwrap();
        let mut data = Mapping::new();
        data.insert("namespace".into(), "prod".into());
        let f = Function {
            image: Some("fn/set-namespace".to_string()),
            config_map: Some(data),
            ..Default::default()
        };
        let config = function_config(&f, dir.path()).unwrap().unwrap();
        assert_eq!(config.kind(), Some("ConfigMap"));
        assert_eq!(config.api_version(), Some("v1"));
        assert_eq!(config.name(), Some("function-input"));
        let yaml = config.to_yaml().unwrap();
        assert!(yaml.contains("namespace: prod"));
    }

    #[test]
    fn empty_mapping_form_yields_none() {
        let dir = tempdir().unwrap();
        let f = Function {
            image: Some("fn/a".to_string()),
            config_map: Some(Mapping::new()),
            ..Default::default()
        };
        assert!(function_config(&f, dir.path()).unwrap().is_none());
    }
}
