//! Unified error type for the experimentation engine.
//!
//! Every fallible operation in `crates/engine` and `crates/api` returns
//! [`Result<T>`], a thin wrapper around a single [`Error`] struct carrying a
//! narrow [`ErrorCode`] (no-retry validation failures, lifecycle state
//! conflicts, collaborator failures, genuine data-integrity bugs, and
//! transient storage errors a caller may retry), plus an [`ErrorContext`]
//! for request correlation and a severity used to decide log level.
//! Production API responses are sanitized through [`Error::to_api_response_with_environment`]
//! so internals never leak past a 5xx boundary.

mod codes;
mod context;
mod framework;

pub use codes::ErrorCode;
pub use context::{ErrorContext, RequestContext};
pub use framework::{Error, ErrorCategory, ErrorSeverity, Result};
