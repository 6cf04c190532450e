//! In-memory resource store.
//!
//! A [`Resource`] is one structured YAML document: an opaque payload plus two
//! reserved metadata annotations that the engine maintains on its behalf:
//!
//! - [`PATH_ANNOTATION`] - destination file path relative to the root package
//! - [`INDEX_ANNOTATION`] - ordinal within that file for multi-document files
//!
//! Resources round-trip through parse/serialize preserving document order and
//! unknown fields. Annotation mutation is the only in-place mutation the
//! engine performs; everything else is full document replacement by a
//! function.

use anyhow::{Context, Result, bail};
use serde::{Deserialize, Serialize};
use serde_yaml::{Mapping, Value};

/// Annotation key holding a resource's destination file path.
pub const PATH_ANNOTATION: &str = "config.kubernetes.io/path";

/// Annotation key holding a resource's ordinal within its destination file.
pub const INDEX_ANNOTATION: &str = "config.kubernetes.io/index";

/// One structured configuration document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Resource {
    doc: Value,
}

impl Resource {
    /// Wrap an already-parsed YAML document.
    pub fn from_value(doc: Value) -> Self {
        Self { doc }
    }

    /// Borrow the underlying document.
    pub fn value(&self) -> &Value {
        &self.doc
    }

    /// Parse exactly one document from text.
    pub fn parse(text: &str) -> Result<Self> {
        let mut docs = Self::parse_all(text)?;
        match docs.len() {
            1 => Ok(docs.remove(0)),
            0 => bail!("expected a YAML document, found none"),
            n => bail!("expected a single YAML document, found {n}"),
        }
    }

    /// Parse every document in a (possibly multi-document) YAML stream.
    ///
    /// Empty documents are skipped; each remaining document must be a
    /// mapping.
    pub fn parse_all(text: &str) -> Result<Vec<Self>> {
        let mut resources = Vec::new();
        for (i, de) in serde_yaml::Deserializer::from_str(text).enumerate() {
            let value =
                Value::deserialize(de).with_context(|| format!("document {i} is not valid YAML"))?;
            match value {
                Value::Null => {}
                Value::Mapping(_) => resources.push(Self { doc: value }),
                other => bail!(
                    "document {i} is not a mapping (found {})",
                    value_kind(&other)
                ),
            }
        }
        Ok(resources)
    }

    /// Serialize this resource to YAML text.
    pub fn to_yaml(&self) -> Result<String> {
        serde_yaml::to_string(&self.doc).context("failed to serialize resource")
    }

    /// Serialize a list of resources as one multi-document stream.
    pub fn serialize_all(resources: &[Self]) -> Result<String> {
        let docs: Vec<String> = resources
            .iter()
            .map(Self::to_yaml)
            .collect::<Result<_>>()?;
        Ok(docs.join("---\n"))
    }

    /// `apiVersion` field, when present.
    pub fn api_version(&self) -> Option<&str> {
        self.get_str(&["apiVersion"])
    }

    /// API group portion of `apiVersion` (empty for the core group).
    pub fn api_group(&self) -> Option<&str> {
        let api_version = self.api_version()?;
        Some(match api_version.split_once('/') {
            Some((group, _)) => group,
            None => "",
        })
    }

    /// `kind` field, when present.
    pub fn kind(&self) -> Option<&str> {
        self.get_str(&["kind"])
    }

    /// `metadata.name` field, when present.
    pub fn name(&self) -> Option<&str> {
        self.get_str(&["metadata", "name"])
    }

    /// `metadata.namespace` field, when present.
    pub fn namespace(&self) -> Option<&str> {
        self.get_str(&["metadata", "namespace"])
    }

    /// A `kind/name` identity string for messages.
    pub fn identity(&self) -> String {
        format!(
            "{}/{}",
            self.kind().unwrap_or("<unknown>"),
            self.name().unwrap_or("<unnamed>")
        )
    }

    /// Read a metadata annotation, stringifying scalar values.
    ///
    /// Functions echoing resources back over the wire sometimes emit numeric
    /// annotation values unquoted, so numbers and booleans are accepted and
    /// rendered as strings.
    pub fn annotation(&self, key: &str) -> Option<String> {
        let annotations = self.doc.get("metadata")?.get("annotations")?;
        match annotations.get(key)? {
            Value::String(s) => Some(s.clone()),
            Value::Number(n) => Some(n.to_string()),
            Value::Bool(b) => Some(b.to_string()),
            _ => None,
        }
    }

    /// Set a metadata annotation, creating `metadata.annotations` as needed.
    pub fn set_annotation(&mut self, key: &str, value: &str) -> Result<()> {
        let Value::Mapping(root) = &mut self.doc else {
            bail!("resource document is not a mapping");
        };
        let metadata = root
            .entry(Value::from("metadata"))
            .or_insert_with(|| Value::Mapping(Mapping::new()));
        let Value::Mapping(metadata) = metadata else {
            bail!("resource 'metadata' field is not a mapping");
        };
        let annotations = metadata
            .entry(Value::from("annotations"))
            .or_insert_with(|| Value::Mapping(Mapping::new()));
        let Value::Mapping(annotations) = annotations else {
            bail!("resource 'metadata.annotations' field is not a mapping");
        };
        annotations.insert(Value::from(key), Value::from(value));
        Ok(())
    }

    /// Remove a metadata annotation, dropping `annotations` (and `metadata`)
    /// when they become empty so untouched files round-trip unchanged.
    pub fn remove_annotation(&mut self, key: &str) {
        let Value::Mapping(root) = &mut self.doc else {
            return;
        };
        let Some(Value::Mapping(metadata)) = root.get_mut("metadata") else {
            return;
        };
        if let Some(Value::Mapping(annotations)) = metadata.get_mut("annotations") {
            annotations.remove(key);
            if annotations.is_empty() {
                metadata.remove("annotations");
            }
        }
        if metadata.is_empty() {
            root.remove("metadata");
        }
    }

    /// The `(path, index)` file location of this resource.
    ///
    /// The path annotation is required once a resource has crossed a package
    /// boundary; a missing index defaults to `0`.
    pub fn file_location(&self) -> Result<(String, String)> {
        let path = self.annotation(PATH_ANNOTATION).with_context(|| {
            format!("resource {} is missing the path annotation", self.identity())
        })?;
        let index = self
            .annotation(INDEX_ANNOTATION)
            .unwrap_or_else(|| "0".to_string());
        Ok((path, index))
    }

    fn get_str(&self, keys: &[&str]) -> Option<&str> {
        let mut value = &self.doc;
        for key in keys {
            value = value.get(*key)?;
        }
        value.as_str()
    }
}

fn value_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Sequence(_) => "a sequence",
        Value::Mapping(_) => "a mapping",
        Value::Tagged(_) => "a tagged value",
    }
}
