//! The function wire protocol.
//!
//! Functions consume and produce a single `ResourceList` document over their
//! standard streams:
//!
//! ```yaml
//! apiVersion: config.kubernetes.io/v1alpha1
//! kind: ResourceList
//! items:
//!   - <resource>
//! functionConfig: <resource>   # optional
//! results: []                  # optional, output only
//! ```
//!
//! The engine does not interpret `results`; they are accumulated per
//! invocation and recorded when a results directory is configured.

use serde::{Deserialize, Serialize};

use crate::resource::Resource;

/// `apiVersion` of the wire document.
pub const RESOURCE_LIST_API_VERSION: &str = "config.kubernetes.io/v1alpha1";

/// `kind` of the wire document.
pub const RESOURCE_LIST_KIND: &str = "ResourceList";

/// The document exchanged with a function over stdin/stdout.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResourceList {
    pub api_version: String,
    pub kind: String,
    #[serde(default)]
    pub items: Vec<Resource>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub function_config: Option<Resource>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub results: Vec<FunctionResult>,
}

impl ResourceList {
    /// Assemble the input document for one function invocation.
    pub fn new(items: Vec<Resource>, function_config: Option<Resource>) -> Self {
        Self {
            api_version: RESOURCE_LIST_API_VERSION.to_string(),
            kind: RESOURCE_LIST_KIND.to_string(),
            items,
            function_config,
            results: Vec::new(),
        }
    }

    /// Parse a function's output stream.
    ///
    /// Returns the reason for rejection as a plain string; callers wrap it
    /// into a protocol error carrying the function identity.
    pub fn parse(text: &str) -> Result<Self, String> {
        let list: ResourceList = serde_yaml::from_str(text).map_err(|e| e.to_string())?;
        if list.kind != RESOURCE_LIST_KIND {
            return Err(format!(
                "kind must be {RESOURCE_LIST_KIND:?}, got {:?}",
                list.kind
            ));
        }
        for (i, item) in list.items.iter().enumerate() {
            if !item.value().is_mapping() {
                return Err(format!("items[{i}] is not a mapping"));
            }
        }
        Ok(list)
    }

    /// Serialize for transmission to a function.
    pub fn to_yaml(&self) -> Result<String, serde_yaml::Error> {
        serde_yaml::to_string(self)
    }
}

/// One diagnostic result emitted by a function.
///
/// Opaque to the engine beyond the fields named here; unknown shapes are
/// tolerated by keeping the structured fields optional.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FunctionResult {
    #[serde(default)]
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub severity: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resource_ref: Option<serde_yaml::Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub field: Option<serde_yaml::Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file: Option<serde_yaml::Value>,
}

/// `kind` of the recorded results document.
pub const RESULT_LIST_KIND: &str = "FunctionResultList";

/// Results of every function run during one invocation, as written to
/// `results.yaml` in the results directory.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FunctionResultList {
    pub api_version: String,
    pub kind: String,
    #[serde(default)]
    pub items: Vec<FunctionRunResults>,
}

/// The results of a single function invocation.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FunctionRunResults {
    /// Image reference or executable path of the function.
    pub name: String,
    pub exit_code: i32,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub results: Vec<FunctionResult>,
}

impl FunctionResultList {
    pub fn new(items: Vec<FunctionRunResults>) -> Self {
        Self {
            api_version: crate::manifest::MANIFEST_API_VERSION.to_string(),
            kind: RESULT_LIST_KIND.to_string(),
            items,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trip() {
        let items = vec![Resource::parse("kind: Deployment\n").unwrap()];
        let config = Resource::parse("kind: ConfigMap\nmetadata:\n  name: function-input\n").ok();
        let list = ResourceList::new(items, config);

        let text = list.to_yaml().unwrap();
        assert!(text.starts_with("apiVersion: config.kubernetes.io/v1alpha1\n"));
        let parsed = ResourceList::parse(&text).unwrap();
        assert_eq!(parsed.items.len(), 1);
        assert!(parsed.function_config.is_some());
        assert!(parsed.results.is_empty());
    }

    #[test]
    fn parse_rejects_wrong_kind() {
        let err = ResourceList::parse("apiVersion: v1\nkind: List\nitems: []\n").unwrap_err();
        assert!(err.contains("ResourceList"));
    }

    #[test]
    fn parse_rejects_garbage() {
        assert!(ResourceList::parse("not a resource list").is_err());
        assert!(ResourceList::parse(": [").is_err());
    }

    #[test]
    fn parse_rejects_scalar_items() {
        let err =
            ResourceList::parse("kind: ResourceList\nitems:\n  - just-a-string\n").unwrap_err();
        assert!(err.contains("items[0]"));
    }

    #[test]
    fn results_are_optional_and_tolerant() {
        let text = "\
kind: ResourceList
items: []
results:
  - message: spec.replicas must be positive
    severity: error
    resourceRef:
      kind: Deployment
      name: app
";
        let parsed = ResourceList::parse(text).unwrap();
        assert_eq!(parsed.results.len(), 1);
        assert_eq!(parsed.results[0].message, "spec.replicas must be positive");
        assert_eq!(parsed.results[0].severity.as_deref(), Some("error"));
    }
}
