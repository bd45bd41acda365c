//! Progress events for long-running operations
//!
//! The orchestrator reports what it is doing through an optional callback so
//! the CLI can drive a spinner while library users stay silent.

use std::time::Duration;

use crate::operation::OperationStatus;

/// Progress events emitted while submitting, polling and sequencing
#[derive(Debug, Clone, PartialEq)]
pub enum ProgressEvent {
    /// A workflow step is about to build and submit its request
    StepStarted {
        step: String,
        index: usize,
        total: usize,
    },
    /// A mutation was accepted and returned an operation
    Submitted { operation: String, request: String },
    /// One status query completed
    Polling {
        operation: String,
        status: OperationStatus,
        progress: Option<u8>,
        poll: u32,
        elapsed: Duration,
    },
    /// Operation finished without error
    Completed { operation: String, polls: u32 },
    /// Operation finished with an error payload
    Failed { operation: String, error: String },
    /// Polling budget ran out
    TimedOut { operation: String, polls: u32 },
    /// A workflow step finished successfully
    StepCompleted { step: String },
}

/// Callback type for progress updates
///
/// The CLI uses this to update spinners. Library callers typically pass `None`.
pub type ProgressCallback = Box<dyn Fn(ProgressEvent) + Send + Sync>;

/// Helper to emit progress events
pub(crate) fn emit(callback: &Option<ProgressCallback>, event: ProgressEvent) {
    if let Some(cb) = callback {
        cb(event);
    }
}
