//! Unified error handling for gcectl-core
//!
//! Every failure the orchestrator can surface maps onto one variant here,
//! with helper predicates so callers can decide what to do without matching
//! on transport details.
//!
//! # Example
//!
//! ```rust
//! use gcectl_core::{CoreError, ResourceKind, ResourceRef, Scope};
//!
//! let err = CoreError::Lookup {
//!     resource: ResourceRef::new("my-project", Scope::Global, ResourceKind::Snapshot, "snap-1"),
//! };
//! assert!(err.is_not_found());
//! assert!(!err.is_retryable());
//! ```

use std::time::Duration;
use thiserror::Error;

use crate::operation::OperationError;
use crate::resource::ResourceRef;

/// Core error type for orchestration
#[derive(Error, Debug)]
pub enum CoreError {
    /// The remote API rejected a mutating call synchronously
    #[error("Request rejected by the API{}: {message}", status_suffix(.status))]
    Submission {
        message: String,
        status: Option<u16>,
    },

    /// The remote operation finished with an error payload
    #[error("Operation {operation} failed: {error}")]
    OperationFailed {
        operation: String,
        error: OperationError,
    },

    /// Polling budget exhausted before a terminal state was observed
    #[error("Timed out waiting for {what} after {polls} polls ({elapsed:?})")]
    Timeout {
        what: String,
        polls: u32,
        elapsed: Duration,
    },

    /// A referenced resource does not exist
    #[error("Resource not found: {resource}")]
    Lookup { resource: ResourceRef },

    /// Network failure, rate limiting, or server-side error
    #[error("Transport error: {0}")]
    Transport(String),

    /// Credentials were missing or refused
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    /// Input or remote document did not have the expected shape
    #[error("Validation error: {0}")]
    Validation(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// A workflow step failed; earlier steps completed and were not rolled back
    #[error("Workflow step '{step}' failed after {} completed step(s): {source}", .completed.len())]
    Workflow {
        step: String,
        completed: Vec<String>,
        #[source]
        source: Box<CoreError>,
    },
}

fn status_suffix(status: &Option<u16>) -> String {
    status.map(|s| format!(" (HTTP {s})")).unwrap_or_default()
}

/// Result type alias for core operations
pub type Result<T> = std::result::Result<T, CoreError>;

impl CoreError {
    /// Strip any workflow wrapping and return the underlying cause
    #[must_use]
    pub fn root(&self) -> &CoreError {
        match self {
            CoreError::Workflow { source, .. } => source.root(),
            other => other,
        }
    }

    /// Returns true if this is a "not found" error
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        matches!(self.root(), CoreError::Lookup { .. })
    }

    /// Returns true if credentials were missing or rejected
    #[must_use]
    pub fn is_unauthorized(&self) -> bool {
        matches!(self.root(), CoreError::Unauthorized(_))
    }

    /// Returns true if a polling budget ran out
    #[must_use]
    pub fn is_timeout(&self) -> bool {
        matches!(self.root(), CoreError::Timeout { .. })
    }

    /// Returns true if this error is worth retrying at the call level.
    ///
    /// Only transport failures qualify. A finished operation that reported an
    /// error is never retried, and neither is a synchronous rejection.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(self, CoreError::Transport(_))
    }

    /// The remote error payload, if this failure came from a finished operation
    #[must_use]
    pub fn operation_error(&self) -> Option<&OperationError> {
        match self.root() {
            CoreError::OperationFailed { error, .. } => Some(error),
            _ => None,
        }
    }
}

impl From<reqwest::Error> for CoreError {
    fn from(err: reqwest::Error) -> Self {
        CoreError::Transport(err.to_string())
    }
}

impl From<serde_json::Error> for CoreError {
    fn from(err: serde_json::Error) -> Self {
        CoreError::Validation(format!("unexpected response body: {err}"))
    }
}

impl From<crate::config::ConfigError> for CoreError {
    fn from(err: crate::config::ConfigError) -> Self {
        CoreError::Config(err.to_string())
    }
}
