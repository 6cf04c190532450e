//! Error handling for confpm
//!
//! This module provides the error types and user-facing error reporting for
//! the hydration engine. The error system is built around two types:
//!
//! - [`ConfpmError`] - strongly-typed errors for every failure mode the
//!   engine can surface to a user
//! - [`ErrorContext`] - a wrapper that adds actionable suggestions and
//!   details for CLI display
//!
//! Errors are values: every fallible operation returns a [`Result`] carrying
//! either a [`ConfpmError`] or an [`anyhow::Error`] that wraps one with
//! additional call-site context. The engine aborts at the first error; there
//! is no best-effort continuation, and nothing is written or pruned unless
//! hydration of the whole package tree succeeds.
//!
//! # Examples
//!
//! ```rust
//! use confpm::core::{ConfpmError, user_friendly_error};
//!
//! let err = ConfpmError::MissingManifest { path: "deploy/base".to_string() };
//! let ctx = user_friendly_error(anyhow::Error::from(err));
//! ctx.display(); // colored message plus a suggestion
//! ```

use colored::Colorize;
use std::fmt;
use thiserror::Error;

/// The main error type for confpm operations.
///
/// Each variant corresponds to one user-visible failure kind and carries
/// enough context (package path, function position, offending annotation) to
/// locate the cause.
#[derive(Error, Debug)]
pub enum ConfpmError {
    /// A package directory does not contain a `Pkgfile` manifest.
    #[error("package at {path} has no Pkgfile")]
    MissingManifest {
        /// Directory that was expected to be a package
        path: String,
    },

    /// The manifest exists but fails parsing or field validation.
    #[error("invalid Pkgfile in {path}: {reason}")]
    InvalidManifest {
        /// Directory containing the offending manifest
        path: String,
        /// Why the manifest was rejected
        reason: String,
    },

    /// A pipeline entry failed pre-execution validation.
    ///
    /// `position` locates the entry, e.g. `mutators[1]` or `validators[0]`.
    #[error("invalid pipeline in package {package} at {position}: {reason}")]
    InvalidPipeline {
        /// Package whose pipeline is invalid
        package: String,
        /// Positional context within the pipeline
        position: String,
        /// Why the entry was rejected
        reason: String,
    },

    /// A function configuration is missing or cannot be read.
    #[error("invalid configuration for function {function}: {reason}")]
    InvalidFunctionConfig {
        /// Image reference or executable path of the function
        function: String,
        /// Why the configuration was rejected
        reason: String,
    },

    /// More than one of the mutually exclusive configuration forms was given.
    #[error(
        "function {function} specifies mutually exclusive config fields: {fields} \
         (use exactly one of 'config', 'configMap', 'configPath')"
    )]
    AmbiguousFunctionConfig {
        /// Image reference or executable path of the function
        function: String,
        /// The config fields that were present, comma separated
        fields: String,
    },

    /// A package currently being hydrated was reached again.
    #[error("found cycle in dependencies for package {package}")]
    CyclicDependency {
        /// Package at which the cycle was detected
        package: String,
    },

    /// A discovered subpackage is not located under the root package.
    #[error("package {package} is not a descendant of root package {root}")]
    NotDescendant {
        /// The offending package path
        package: String,
        /// The root package path
        root: String,
    },

    /// A function process exited with a non-zero status.
    #[error("function {name} failed with exit code {exit_code}")]
    FunctionExecutionError {
        /// Image reference or executable path of the function
        name: String,
        /// Exit code of the child process (-1 when killed by a signal)
        exit_code: i32,
        /// Captured standard error, truncated past the line limit
        stderr: String,
        /// Identity of the function config, when one was supplied
        fn_config: Option<String>,
    },

    /// A function produced output that is not a well-formed `ResourceList`.
    #[error("function {name} produced malformed output: {reason}")]
    FunctionProtocolError {
        /// Image reference or executable path of the function
        name: String,
        /// Best-effort description of the protocol violation
        reason: String,
    },

    /// Two resources share the same `(path, index)` pair.
    #[error("resource at path {path:?} and index {index:?} already exists")]
    DuplicatePathIndex {
        /// The cleaned path annotation value
        path: String,
        /// The index annotation value
        index: String,
    },

    /// A path annotation resolves outside the root package.
    #[error("resource path {path:?} escapes the package directory")]
    PathEscapesPackage {
        /// The offending path annotation value
        path: String,
    },

    /// Filesystem operation failed (read, write, prune).
    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),

    /// YAML parsing or serialization failed outside a manifest context.
    #[error("YAML error: {0}")]
    YamlError(#[from] serde_yaml::Error),
}

/// A user-facing error wrapper carrying optional details and a suggestion.
///
/// Built by [`user_friendly_error`] just before the process exits, so the
/// final message shows what failed, why, and what to try next.
pub struct ErrorContext {
    /// The underlying error chain
    pub error: anyhow::Error,
    /// Optional multi-line details (e.g. captured function stderr)
    pub details: Option<String>,
    /// Optional one-line suggestion for resolving the failure
    pub suggestion: Option<String>,
}

impl ErrorContext {
    /// Wrap an error with no details or suggestion.
    pub fn new(error: anyhow::Error) -> Self {
        Self {
            error,
            details: None,
            suggestion: None,
        }
    }

    /// Attach a suggestion line.
    #[must_use]
    pub fn with_suggestion(mut self, suggestion: impl Into<String>) -> Self {
        self.suggestion = Some(suggestion.into());
        self
    }

    /// Attach a details block.
    #[must_use]
    pub fn with_details(mut self, details: impl Into<String>) -> Self {
        self.details = Some(details.into());
        self
    }

    /// Print the error to stderr with colors.
    pub fn display(&self) {
        eprintln!("{} {}", "error:".red().bold(), self.error);
        for cause in self.error.chain().skip(1) {
            eprintln!("  {} {}", "caused by:".yellow(), cause);
        }
        if let Some(details) = &self.details {
            eprintln!();
            for line in details.lines() {
                eprintln!("  {line}");
            }
        }
        if let Some(suggestion) = &self.suggestion {
            eprintln!();
            eprintln!("{} {}", "hint:".cyan().bold(), suggestion);
        }
    }
}

impl fmt::Display for ErrorContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.error)?;
        if let Some(details) = &self.details {
            write!(f, "\n{details}")?;
        }
        if let Some(suggestion) = &self.suggestion {
            write!(f, "\nhint: {suggestion}")?;
        }
        Ok(())
    }
}

/// Convert any error into an [`ErrorContext`] with contextual suggestions.
///
/// Downcasts to [`ConfpmError`] where possible and attaches a suggestion
/// tailored to the failure kind; other errors pass through unchanged.
pub fn user_friendly_error(error: anyhow::Error) -> ErrorContext {
    let Some(err) = error.chain().find_map(|e| e.downcast_ref::<ConfpmError>()) else {
        return ErrorContext::new(error);
    };

    match err {
        ConfpmError::MissingManifest { .. } => ErrorContext::new(error).with_suggestion(
            "every package directory needs a Pkgfile; create one with \
             apiVersion confpm.dev/v1alpha1 and kind Pkgfile",
        ),
        ConfpmError::InvalidManifest { .. } => ErrorContext::new(error)
            .with_suggestion("check the Pkgfile fields against the manifest schema"),
        ConfpmError::InvalidPipeline { .. } | ConfpmError::AmbiguousFunctionConfig { .. } => {
            ErrorContext::new(error).with_suggestion(
                "each pipeline entry needs exactly one of 'image' or 'exec' and at most \
                 one of 'config', 'configMap', 'configPath'",
            )
        }
        ConfpmError::CyclicDependency { .. } => ErrorContext::new(error).with_suggestion(
            "a package reaches itself through its subpackages; look for symlinks that \
             point back into an ancestor directory",
        ),
        ConfpmError::FunctionExecutionError { stderr, .. } => {
            let details = if stderr.is_empty() {
                None
            } else {
                Some(stderr.clone())
            };
            ErrorContext {
                error,
                details,
                suggestion: None,
            }
        }
        ConfpmError::FunctionProtocolError { .. } => ErrorContext::new(error)
            .with_suggestion("functions must write a single ResourceList document to stdout"),
        ConfpmError::DuplicatePathIndex { .. } => ErrorContext::new(error).with_suggestion(
            "two resources target the same file position; give one of them a distinct \
             path or index annotation",
        ),
        ConfpmError::PathEscapesPackage { .. } => ErrorContext::new(error)
            .with_suggestion("path annotations must stay inside the package being rendered"),
        _ => ErrorContext::new(error),
    }
}
