//! # gcectl-core
//!
//! Orchestration engine behind the `gcectl` CLI.
//!
//! Compute Engine mutations are asynchronous: every insert, delete or custom
//! method returns an operation that has to be polled until it is `DONE`.
//! This crate turns that into three primitives and builds the CLI's
//! workflows on top of them:
//!
//! - [`Orchestrator::submit`] issues one mutating call
//! - [`Orchestrator::await_completion`] polls the operation through the
//!   endpoint matching its scope until it succeeds, fails or times out
//! - [`Orchestrator::run_workflow`] chains dependent steps strictly in order
//!
//! The remote API is reached through the [`ComputeApi`] trait.
//! [`ComputeClient`] implements it over HTTPS; tests plug in doubles.
//!
//! ## Modules
//!
//! - [`resource`] / [`operation`] - resource references and operation model
//! - [`api`] / [`client`] - the capability trait and its reqwest implementation
//! - [`orchestrator`] / [`workflow`] - polling and sequencing
//! - [`workflows`] - roll-image, resize and create-instance
//! - [`config`] - profiles and orchestration settings
//! - [`retry`] / [`progress`] - transient-failure retry and progress events

pub mod api;
pub mod client;
pub mod config;
pub mod error;
pub mod operation;
pub mod orchestrator;
pub mod progress;
pub mod resource;
pub mod retry;
pub mod workflow;
pub mod workflows;

pub use api::{ComputeApi, MutationRequest, MutationVerb};
pub use client::{ComputeClient, ComputeClientBuilder, DEFAULT_ENDPOINT};
pub use config::{Config, ConfigError, OrchestrationConfig, Profile};
pub use error::{CoreError, Result};
pub use operation::{
    CompletedOperation, OperationError, OperationErrorItem, OperationHandle, OperationOutcome,
    OperationSnapshot, OperationStatus,
};
pub use orchestrator::{Orchestrator, PollConfig};
pub use progress::{ProgressCallback, ProgressEvent};
pub use resource::{ResourceKind, ResourceRef, Scope};
pub use retry::RetryPolicy;
pub use workflow::{
    FailurePolicy, MutationStep, StepFlow, StepRecord, Workflow, WorkflowContext, WorkflowReport,
    WorkflowStep,
};
