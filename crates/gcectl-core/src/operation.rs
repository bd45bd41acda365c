//! Operation model
//!
//! Every mutating compute call returns an operation document immediately.
//! The types here track that operation from its handle through status
//! snapshots to a single terminal [`OperationOutcome`].

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;
use std::time::Duration;

use crate::error::{CoreError, Result};
use crate::resource::{ResourceRef, Scope};

/// Remote status of an operation. Only `Done` is terminal.
///
/// Variants are ordered by lifecycle so observed status can only move forward.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default, Serialize, Deserialize,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OperationStatus {
    #[default]
    Pending,
    Running,
    Done,
}

impl OperationStatus {
    pub fn is_done(&self) -> bool {
        matches!(self, OperationStatus::Done)
    }
}

impl fmt::Display for OperationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            OperationStatus::Pending => "PENDING",
            OperationStatus::Running => "RUNNING",
            OperationStatus::Done => "DONE",
        };
        f.write_str(s)
    }
}

/// One entry of an operation's `error.errors` list
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OperationErrorItem {
    pub code: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
    /// Fields the API sent that are not modelled above, kept verbatim
    #[serde(flatten)]
    pub details: Map<String, Value>,
}

impl OperationErrorItem {
    pub fn new(code: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            message: None,
            location: None,
            details: Map::new(),
        }
    }

    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }
}

/// Structured error carried by a finished operation
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct OperationError {
    #[serde(default)]
    pub errors: Vec<OperationErrorItem>,
}

impl OperationError {
    pub fn first_code(&self) -> Option<&str> {
        self.errors.first().map(|e| e.code.as_str())
    }

    pub fn codes(&self) -> impl Iterator<Item = &str> {
        self.errors.iter().map(|e| e.code.as_str())
    }
}

impl fmt::Display for OperationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.errors.is_empty() {
            return f.write_str("unknown error");
        }
        let rendered: Vec<String> = self
            .errors
            .iter()
            .map(|e| match &e.message {
                Some(msg) => format!("{}: {}", e.code, msg),
                None => e.code.clone(),
            })
            .collect();
        f.write_str(&rendered.join("; "))
    }
}

/// Operation document as returned by the compute API
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OperationDocument {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub zone: Option<String>,
    #[serde(default)]
    pub status: OperationStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_link: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub progress: Option<u8>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<OperationError>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub http_error_status_code: Option<u16>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub http_error_message: Option<String>,
}

impl OperationDocument {
    /// Scope of the operation: zonal if the document names a zone, global otherwise
    pub fn scope(&self) -> Result<Scope> {
        match &self.zone {
            Some(zone) => zone.parse(),
            None => Ok(Scope::Global),
        }
    }
}

/// Handle returned by a submitted mutation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OperationHandle {
    pub name: String,
    pub id: Option<String>,
    pub project: String,
    pub scope: Scope,
    pub status: OperationStatus,
    pub target_link: Option<String>,
}

impl OperationHandle {
    pub fn new(project: impl Into<String>, scope: Scope, name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            id: None,
            project: project.into(),
            scope,
            status: OperationStatus::Pending,
            target_link: None,
        }
    }

    pub fn from_document(project: &str, doc: OperationDocument) -> Result<Self> {
        if doc.name.is_empty() {
            return Err(CoreError::Validation(
                "operation document has no name".to_string(),
            ));
        }
        Ok(Self {
            scope: doc.scope()?,
            name: doc.name,
            id: doc.id,
            project: project.to_string(),
            status: doc.status,
            target_link: doc.target_link,
        })
    }
}

impl fmt::Display for OperationHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.name, self.scope)
    }
}

/// Result of a single status query
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct OperationSnapshot {
    pub status: OperationStatus,
    pub error: Option<OperationError>,
    pub progress: Option<u8>,
    pub target_link: Option<String>,
}

impl OperationSnapshot {
    pub fn pending() -> Self {
        Self::default()
    }

    pub fn running(progress: u8) -> Self {
        Self {
            status: OperationStatus::Running,
            progress: Some(progress),
            ..Self::default()
        }
    }

    pub fn done() -> Self {
        Self {
            status: OperationStatus::Done,
            progress: Some(100),
            ..Self::default()
        }
    }

    pub fn failed(error: OperationError) -> Self {
        Self {
            status: OperationStatus::Done,
            error: Some(error),
            progress: Some(100),
            target_link: None,
        }
    }

    pub fn with_target(mut self, link: impl Into<String>) -> Self {
        self.target_link = Some(link.into());
        self
    }
}

impl From<OperationDocument> for OperationSnapshot {
    fn from(doc: OperationDocument) -> Self {
        // An empty `error.errors` list is not a failure
        let error = doc.error.filter(|e| !e.errors.is_empty());
        Self {
            status: doc.status,
            error,
            progress: doc.progress,
            target_link: doc.target_link,
        }
    }
}

/// A successfully finished operation
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CompletedOperation {
    pub handle: OperationHandle,
    pub snapshot: OperationSnapshot,
    pub polls: u32,
}

impl CompletedOperation {
    /// The resource the operation acted on, when the target link parses
    pub fn target(&self) -> Option<ResourceRef> {
        self.snapshot
            .target_link
            .as_deref()
            .or(self.handle.target_link.as_deref())
            .and_then(|link| ResourceRef::from_link(link).ok())
    }
}

/// Exactly one terminal outcome per awaited operation
#[derive(Debug, Clone, PartialEq)]
pub enum OperationOutcome {
    Succeeded(CompletedOperation),
    Failed {
        handle: OperationHandle,
        error: OperationError,
        polls: u32,
    },
    TimedOut {
        handle: OperationHandle,
        polls: u32,
        elapsed: Duration,
    },
}

impl OperationOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, OperationOutcome::Succeeded(_))
    }

    pub fn polls(&self) -> u32 {
        match self {
            OperationOutcome::Succeeded(c) => c.polls,
            OperationOutcome::Failed { polls, .. } | OperationOutcome::TimedOut { polls, .. } => {
                *polls
            }
        }
    }

    /// Label used in logs and CLI output
    pub fn label(&self) -> &'static str {
        match self {
            OperationOutcome::Succeeded(_) => "SUCCEEDED",
            OperationOutcome::Failed { .. } => "FAILED",
            OperationOutcome::TimedOut { .. } => "TIMED_OUT",
        }
    }

    /// Convert into the error-propagating view used by workflows
    pub fn into_result(self) -> Result<CompletedOperation> {
        match self {
            OperationOutcome::Succeeded(completed) => Ok(completed),
            OperationOutcome::Failed { handle, error, .. } => Err(CoreError::OperationFailed {
                operation: handle.name,
                error,
            }),
            OperationOutcome::TimedOut {
                handle,
                polls,
                elapsed,
            } => Err(CoreError::Timeout {
                what: format!("operation {}", handle.name),
                polls,
                elapsed,
            }),
        }
    }
}
