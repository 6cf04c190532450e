//! Core types for confpm
//!
//! The core module holds what every other module depends on: the error
//! taxonomy and its user-facing presentation.
//!
//! - [`ConfpmError`] - enumerated error types covering every failure mode of
//!   the hydration engine
//! - [`ErrorContext`] - user-friendly error wrapper with suggestions and
//!   details
//! - [`user_friendly_error`] - convert any error to the user-facing form
//!
//! Every operation that can fail returns a `Result` with meaningful error
//! information; partial success is not a valid state anywhere in the engine.

pub mod error;

pub use error::{ConfpmError, ErrorContext, user_friendly_error};
