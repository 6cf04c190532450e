//! Pre-execution validation of pipeline function entries.
//!
//! Validation runs before any function executes: the function identity
//! (`image` or `exec`), the image reference grammar, the mutual exclusion of
//! the three configuration forms, and the syntactic shape of `configPath`.

use regex::Regex;

use crate::manifest::Function;

/// Why a pipeline function entry was rejected.
#[derive(Debug)]
pub enum FunctionError {
    /// Malformed entry; the reason is rendered at the pipeline position.
    Invalid(String),
    /// More than one of `config`, `configMap`, `configPath` is present.
    AmbiguousConfig {
        /// The config fields that were present, comma separated.
        fields: String,
    },
}

/// Validate one function entry.
pub fn validate_function(f: &Function) -> Result<(), FunctionError> {
    match (&f.image, &f.exec) {
        (Some(_), Some(_)) => {
            return Err(FunctionError::Invalid(
                "'image' and 'exec' are mutually exclusive".to_string(),
            ));
        }
        (None, None) => {
            return Err(FunctionError::Invalid(
                "must specify either 'image' or 'exec'".to_string(),
            ));
        }
        (Some(image), None) => {
            validate_image_name(image).map_err(FunctionError::Invalid)?;
        }
        (None, Some(exec)) => {
            if exec.trim().is_empty() {
                return Err(FunctionError::Invalid(
                    "'exec' must not be empty".to_string(),
                ));
            }
        }
    }

    let mut config_fields = Vec::new();
    if f.config.is_some() {
        config_fields.push("config");
    }
    if f.config_map.as_ref().is_some_and(|m| !m.is_empty()) {
        config_fields.push("configMap");
    }
    if let Some(path) = &f.config_path {
        validate_config_path(path)
            .map_err(|reason| FunctionError::Invalid(format!("'configPath' {path:?}: {reason}")))?;
        config_fields.push("configPath");
    }
    if config_fields.len() > 1 {
        return Err(FunctionError::AmbiguousConfig {
            fields: config_fields.join(", "),
        });
    }
    Ok(())
}

/// Validate a function image reference against the Docker naming grammar:
///
/// ```text
/// name             := [domain '/'] path-component ['/' path-component]*
/// domain           := domain-component ['.' domain-component]* [':' port-number]
/// domain-component := /([a-zA-Z0-9]|[a-zA-Z0-9][a-zA-Z0-9-]*[a-zA-Z0-9])/
/// port-number      := /[0-9]+/
/// path-component   := alpha-numeric [separator alpha-numeric]*
/// alpha-numeric    := /[a-z0-9]+/
/// separator        := /[_.]|__|[-]*/
/// tag              := /[\w][\w.-]{0,127}/
/// ```
pub fn validate_image_name(name: &str) -> Result<(), String> {
    let path_component = r"(?:[a-z0-9](?:(?:[_.]|__|[-]*)[a-z0-9]+)*)";
    let domain_component = r"(?:[a-zA-Z0-9]|[a-zA-Z0-9][a-zA-Z0-9-]*[a-zA-Z0-9])";
    let domain = format!(r"{domain_component}(?:\.{domain_component})*(?:\:[0-9]+)?");
    let image_name = format!(r"(?:{domain}/)?{path_component}(?:/{path_component})*");
    let tag = r"(?:[\w][\w.-]{0,127})";
    let pattern = format!(r"^(?:{image_name}(?:\:{tag})?)$");

    let re = Regex::new(&pattern).map_err(|e| e.to_string())?;
    if re.is_match(name) {
        Ok(())
    } else {
        Err(format!("function name {name:?} is invalid"))
    }
}

/// Validate the syntactic shape of a `configPath` value.
///
/// The config file must live inside the package directory, so absolute paths
/// and parent traversals are rejected at parse time.
pub fn validate_config_path(path: &str) -> Result<(), String> {
    if path.trim().is_empty() {
        return Err("path must not be empty".to_string());
    }
    if path.starts_with('/') {
        return Err("path must be relative".to_string());
    }
    if path.split('/').any(|c| c == "..") {
        return Err("path must not be outside the package".to_string());
    }
    if path.contains('*') {
        return Err("path must not contain an asterisk".to_string());
    }
    // backslash, alert bell, backspace, form feed and vertical tab are
    // never part of a valid package-relative path
    for c in ['\\', '\u{7}', '\u{8}', '\u{c}', '\u{b}'] {
        if path.contains(c) {
            return Err(format!("path must not contain character {c:?}"));
        }
    }
    Ok(())
}
