//! Submit-then-poll orchestration
//!
//! [`Orchestrator`] wraps a [`ComputeApi`] and turns each asynchronous
//! mutation into a primitive that either completes, fails with the remote
//! error, or times out. Polling uses a fixed interval with no backoff; the
//! operations these workflows start finish in seconds to low tens of
//! seconds.
//!
//! # Example
//!
//! ```rust,ignore
//! use gcectl_core::{ComputeClient, MutationRequest, Orchestrator, PollConfig};
//! use std::sync::Arc;
//!
//! let client = ComputeClient::builder().access_token(token).build()?;
//! let orchestrator = Orchestrator::new(Arc::new(client));
//!
//! let handle = orchestrator.submit(&MutationRequest::delete(snapshot)).await?;
//! let completed = orchestrator
//!     .await_completion(&handle, &PollConfig::default())
//!     .await?;
//! println!("done after {} polls", completed.polls);
//! ```

use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::api::{ComputeApi, MutationRequest};
use crate::error::{CoreError, Result};
use crate::operation::{CompletedOperation, OperationHandle, OperationOutcome, OperationSnapshot};
use crate::progress::{ProgressCallback, ProgressEvent, emit};
use crate::resource::{ResourceKind, ResourceRef, Scope};
use crate::retry::RetryPolicy;

/// Default time between status queries
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(1);

/// Shortest gap ever left between two status queries
pub const MIN_POLL_INTERVAL: Duration = Duration::from_millis(1);

/// Fixed-interval polling with an optional budget
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollConfig {
    pub interval: Duration,
    /// `None` polls until a terminal state is reached
    pub timeout: Option<Duration>,
}

impl Default for PollConfig {
    fn default() -> Self {
        Self {
            interval: DEFAULT_POLL_INTERVAL,
            timeout: None,
        }
    }
}

impl PollConfig {
    pub fn new(interval: Duration, timeout: Option<Duration>) -> Self {
        Self { interval, timeout }
    }

    /// Interval actually slept, never below [`MIN_POLL_INTERVAL`]
    pub fn effective_interval(&self) -> Duration {
        self.interval.max(MIN_POLL_INTERVAL)
    }

    /// Number of status queries the timeout budget allows
    ///
    /// The budget is `ceil(timeout / interval)` queries, never fewer than one.
    /// With a 5s timeout and a 1s interval that is exactly five queries.
    pub fn max_polls(&self) -> Option<u32> {
        self.timeout.map(|timeout| {
            let interval = self.effective_interval().as_nanos();
            let polls = timeout.as_nanos().div_ceil(interval);
            polls.clamp(1, u128::from(u32::MAX)) as u32
        })
    }
}

/// Drives mutations against a [`ComputeApi`] to completion
///
/// Holds no state beyond its configuration, so independent workflows can run
/// on separate orchestrators concurrently.
pub struct Orchestrator {
    api: Arc<dyn ComputeApi>,
    poll: PollConfig,
    retry: RetryPolicy,
    on_progress: Option<ProgressCallback>,
}

impl Orchestrator {
    pub fn new(api: Arc<dyn ComputeApi>) -> Self {
        Self {
            api,
            poll: PollConfig::default(),
            retry: RetryPolicy::default(),
            on_progress: None,
        }
    }

    pub fn with_poll(mut self, poll: PollConfig) -> Self {
        self.poll = poll;
        self
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn with_progress(mut self, on_progress: ProgressCallback) -> Self {
        self.on_progress = Some(on_progress);
        self
    }

    /// Default poll settings used by workflows
    pub fn poll_config(&self) -> &PollConfig {
        &self.poll
    }

    pub(crate) fn emit(&self, event: ProgressEvent) {
        emit(&self.on_progress, event);
    }

    /// Issue one mutating call and return its operation handle
    ///
    /// Sent exactly once. A transport failure is returned as is; the
    /// mutation may or may not have been applied.
    pub async fn submit(&self, request: &MutationRequest) -> Result<OperationHandle> {
        debug!("Submitting {}", request);
        let handle = self.api.submit_mutation(request).await.inspect_err(|e| {
            if e.is_retryable() {
                warn!("{} may or may not have been applied: {}", request, e);
            }
        })?;

        info!("Submitted {} -> operation {}", request, handle);
        self.emit(ProgressEvent::Submitted {
            operation: handle.name.clone(),
            request: request.to_string(),
        });
        Ok(handle)
    }

    /// Poll an operation until it reaches a terminal outcome
    ///
    /// Transport failures of individual queries are retried; any error that
    /// survives retry is returned as `Err`. Every other path yields exactly
    /// one [`OperationOutcome`].
    pub async fn poll_until_terminal(
        &self,
        handle: &OperationHandle,
        poll: &PollConfig,
    ) -> Result<OperationOutcome> {
        let start = Instant::now();
        let max_polls = poll.max_polls();
        let mut observed = handle.status;
        let mut polls: u32 = 0;

        loop {
            let snapshot = self
                .get_operation(&handle.project, &handle.scope, &handle.name)
                .await?;
            polls += 1;

            if snapshot.status < observed {
                warn!(
                    "Operation {} reported {} after {}; keeping {}",
                    handle.name, snapshot.status, observed, observed
                );
            }
            observed = observed.max(snapshot.status);
            let elapsed = start.elapsed();

            debug!(
                "Operation {} poll {}: {} ({:?}%)",
                handle.name, polls, observed, snapshot.progress
            );
            self.emit(ProgressEvent::Polling {
                operation: handle.name.clone(),
                status: observed,
                progress: snapshot.progress,
                poll: polls,
                elapsed,
            });

            if observed.is_done() {
                return Ok(match snapshot.error.clone() {
                    Some(error) => {
                        warn!("Operation {} failed: {}", handle.name, error);
                        self.emit(ProgressEvent::Failed {
                            operation: handle.name.clone(),
                            error: error.to_string(),
                        });
                        OperationOutcome::Failed {
                            handle: handle.clone(),
                            error,
                            polls,
                        }
                    }
                    None => {
                        info!("Operation {} done after {} polls", handle.name, polls);
                        self.emit(ProgressEvent::Completed {
                            operation: handle.name.clone(),
                            polls,
                        });
                        OperationOutcome::Succeeded(CompletedOperation {
                            handle: handle.clone(),
                            snapshot,
                            polls,
                        })
                    }
                });
            }

            if let Some(max) = max_polls
                && polls >= max
            {
                warn!(
                    "Operation {} still {} after {} polls, giving up",
                    handle.name, observed, polls
                );
                self.emit(ProgressEvent::TimedOut {
                    operation: handle.name.clone(),
                    polls,
                });
                return Ok(OperationOutcome::TimedOut {
                    handle: handle.clone(),
                    polls,
                    elapsed,
                });
            }

            tokio::time::sleep(poll.effective_interval()).await;
        }
    }

    /// Wait for an operation and convert failure/timeout into errors
    pub async fn await_completion(
        &self,
        handle: &OperationHandle,
        poll: &PollConfig,
    ) -> Result<CompletedOperation> {
        self.poll_until_terminal(handle, poll).await?.into_result()
    }

    /// Submit a mutation and wait for it with the default poll settings
    pub async fn submit_and_wait(&self, request: &MutationRequest) -> Result<CompletedOperation> {
        let handle = self.submit(request).await?;
        self.await_completion(&handle, &self.poll).await
    }

    /// Query an operation once
    pub async fn get_operation(
        &self,
        project: &str,
        scope: &Scope,
        operation: &str,
    ) -> Result<OperationSnapshot> {
        let what = format!("query operation {operation}");
        self.retry
            .run(&what, || self.api.get_operation(project, scope, operation))
            .await
    }

    /// Fetch a resource document
    pub async fn get_resource(&self, resource: &ResourceRef) -> Result<Value> {
        let what = format!("get {resource}");
        self.retry
            .run(&what, || self.api.get_resource(resource))
            .await
    }

    /// List resources of a kind in a scope
    pub async fn list_resources(
        &self,
        project: &str,
        scope: &Scope,
        kind: ResourceKind,
    ) -> Result<Vec<Value>> {
        let what = format!("list {kind} in {scope}");
        self.retry
            .run(&what, || self.api.list_resources(project, scope, kind))
            .await
    }

    /// Poll a resource document until `ready` holds
    pub async fn await_resource<F>(
        &self,
        resource: &ResourceRef,
        poll: &PollConfig,
        ready: F,
    ) -> Result<Value>
    where
        F: Fn(&Value) -> bool + Send + Sync,
    {
        let start = Instant::now();
        let max_polls = poll.max_polls();
        let mut polls: u32 = 0;

        loop {
            let doc = self.get_resource(resource).await?;
            polls += 1;

            if ready(&doc) {
                debug!("{} ready after {} polls", resource, polls);
                return Ok(doc);
            }

            if let Some(max) = max_polls
                && polls >= max
            {
                return Err(CoreError::Timeout {
                    what: format!("{} to settle", resource),
                    polls,
                    elapsed: start.elapsed(),
                });
            }

            tokio::time::sleep(poll.effective_interval()).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_max_polls() {
        let secs = Duration::from_secs;
        assert_eq!(PollConfig::new(secs(1), None).max_polls(), None);
        assert_eq!(PollConfig::new(secs(1), Some(secs(5))).max_polls(), Some(5));
        assert_eq!(PollConfig::new(secs(2), Some(secs(5))).max_polls(), Some(3));
        assert_eq!(
            PollConfig::new(secs(10), Some(Duration::from_millis(1))).max_polls(),
            Some(1)
        );
        assert_eq!(PollConfig::new(secs(1), Some(Duration::ZERO)).max_polls(), Some(1));
    }

    #[test]
    fn test_zero_interval_is_clamped() {
        let poll = PollConfig::new(Duration::ZERO, Some(Duration::from_secs(5)));
        assert_eq!(poll.effective_interval(), MIN_POLL_INTERVAL);
        assert_eq!(poll.max_polls(), Some(5_000));
    }
}
