//! confpm - Configuration Package Manager
//!
//! A package manager for structured configuration artifacts. Packages are
//! directories holding YAML resources plus a `Pkgfile` manifest that
//! declares a pipeline of transformation and validation functions; packages
//! nest, and the hydration engine composes a whole tree into the resource
//! set materialized at the root package.
//!
//! # Architecture overview
//!
//! Hydration is a depth-first traversal of the package tree. At each
//! package the walker gathers the outputs of its subpackages (in discovery
//! order), appends the package's own resources, and runs the package
//! pipeline over the combined list. Resources carry their destination as a
//! reserved path annotation, so functions can reorganize files freely; after
//! the root package returns, the engine writes the final set and prunes any
//! input file that no output references anymore.
//!
//! Functions are opaque child processes - container images or local
//! executables - speaking the `ResourceList` wire protocol over their
//! standard streams. The engine runs them strictly sequentially; ordering
//! is a user-visible contract.
//!
//! # Core modules
//!
//! - [`cli`] - command-line interface (`render`, `eval`)
//! - [`core`] - error taxonomy and user-facing error reporting
//! - [`manifest`] - `Pkgfile` parsing and pipeline validation
//! - [`pkg`] - package reader: manifests, local resources, subpackages
//! - [`render`] - hydration walker, path reconciliation, writer and prune
//! - [`resource`] - in-memory resource store with reserved annotations
//! - [`runner`] - function execution and the wire protocol
//! - [`utils`] - lexical path helpers shared across modules
//!
//! # Example
//!
//! ```bash
//! # hydrate the package in the current directory
//! confpm render
//!
//! # hydrate a tree and record function results
//! confpm render deploy/ --results-dir /tmp/results
//! ```

pub mod cli;
pub mod core;
pub mod manifest;
pub mod pkg;
pub mod render;
pub mod resource;
pub mod runner;
pub mod utils;
