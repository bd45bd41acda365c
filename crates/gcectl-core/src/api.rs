//! The compute API capability the orchestrator is written against
//!
//! One trait covers every resource kind; calls are parameterized by
//! [`ResourceRef`] / [`Scope`] instead of having a bespoke function per type.
//! [`crate::client::ComputeClient`] is the HTTP implementation; tests use
//! in-memory doubles.

use async_trait::async_trait;
use serde::Serialize;
use serde_json::Value;
use std::fmt;

use crate::error::Result;
use crate::operation::{OperationHandle, OperationSnapshot};
use crate::resource::{ResourceKind, ResourceRef, Scope};

/// What a mutating request does to its target
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase", tag = "verb")]
pub enum MutationVerb {
    /// Create the target (POST to its collection)
    Insert,
    /// Delete the target
    Delete,
    /// Snapshot a disk; the body names the snapshot
    CreateSnapshot,
    /// Point an instance group manager at another template
    SetInstanceTemplate,
    /// Change the target size of an instance group manager
    Resize { size: u32 },
}

impl MutationVerb {
    /// Custom method suffix appended to the resource path, if any
    pub fn custom_method(&self) -> Option<&'static str> {
        match self {
            MutationVerb::Insert | MutationVerb::Delete => None,
            MutationVerb::CreateSnapshot => Some("createSnapshot"),
            MutationVerb::SetInstanceTemplate => Some("setInstanceTemplate"),
            MutationVerb::Resize { .. } => Some("resize"),
        }
    }
}

impl fmt::Display for MutationVerb {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MutationVerb::Insert => f.write_str("insert"),
            MutationVerb::Delete => f.write_str("delete"),
            MutationVerb::CreateSnapshot => f.write_str("createSnapshot"),
            MutationVerb::SetInstanceTemplate => f.write_str("setInstanceTemplate"),
            MutationVerb::Resize { size } => write!(f, "resize({size})"),
        }
    }
}

/// A create/update/delete action against a resource
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MutationRequest {
    pub target: ResourceRef,
    pub verb: MutationVerb,
    /// Opaque request body; `Value::Null` sends no body
    pub body: Value,
}

impl MutationRequest {
    pub fn new(target: ResourceRef, verb: MutationVerb, body: Value) -> Self {
        Self { target, verb, body }
    }

    pub fn insert(target: ResourceRef, body: Value) -> Self {
        Self::new(target, MutationVerb::Insert, body)
    }

    pub fn delete(target: ResourceRef) -> Self {
        Self::new(target, MutationVerb::Delete, Value::Null)
    }

    pub fn scope(&self) -> &Scope {
        self.target.scope()
    }
}

impl fmt::Display for MutationRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.verb, self.target)
    }
}

/// Remote resource-management capability
#[async_trait]
pub trait ComputeApi: Send + Sync {
    /// Issue one mutating call and return the operation it started
    async fn submit_mutation(&self, request: &MutationRequest) -> Result<OperationHandle>;

    /// Query an operation through the endpoint for its scope
    async fn get_operation(
        &self,
        project: &str,
        scope: &Scope,
        operation: &str,
    ) -> Result<OperationSnapshot>;

    /// Fetch a resource document
    async fn get_resource(&self, resource: &ResourceRef) -> Result<Value>;

    /// List all resources of a kind in a scope
    async fn list_resources(
        &self,
        project: &str,
        scope: &Scope,
        kind: ResourceKind,
    ) -> Result<Vec<Value>>;
}
