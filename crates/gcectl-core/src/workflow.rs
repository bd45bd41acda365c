//! Ordered chains of dependent mutations
//!
//! A [`Workflow`] is a list of [`WorkflowStep`]s run strictly in order: step
//! N is not even prepared until step N-1's operation finished successfully
//! and its `complete` hook returned. Steps pass data forward through the
//! [`WorkflowContext`].
//!
//! On failure the workflow stops at the failing step. Temporary resources
//! registered by earlier steps are left in place unless the workflow's
//! [`FailurePolicy`] asks for them to be deleted.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use tracing::{info, warn};

use crate::api::MutationRequest;
use crate::error::{CoreError, Result};
use crate::operation::CompletedOperation;
use crate::orchestrator::Orchestrator;
use crate::progress::ProgressEvent;
use crate::resource::{ResourceRef, Scope};

/// What happens to registered temporaries when a step fails
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum,
)]
#[serde(rename_all = "kebab-case")]
pub enum FailurePolicy {
    /// Stop and leave everything that was created
    #[default]
    Halt,
    /// Stop, then delete remaining temporaries newest-first (best effort)
    DeleteTemporaries,
}

/// Whether the workflow continues after a step
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepFlow {
    Continue,
    Halt,
}

/// State shared between the steps of one workflow run
#[derive(Debug, Clone)]
pub struct WorkflowContext {
    project: String,
    zone: String,
    outputs: BTreeMap<String, Value>,
    temporaries: Vec<ResourceRef>,
}

impl WorkflowContext {
    pub fn new(project: impl Into<String>, zone: impl Into<String>) -> Self {
        Self {
            project: project.into(),
            zone: zone.into(),
            outputs: BTreeMap::new(),
            temporaries: Vec::new(),
        }
    }

    pub fn project(&self) -> &str {
        &self.project
    }

    pub fn zone(&self) -> &str {
        &self.zone
    }

    pub fn zone_scope(&self) -> Scope {
        Scope::zone(&self.zone)
    }

    pub fn insert_output(&mut self, key: impl Into<String>, value: Value) {
        self.outputs.insert(key.into(), value);
    }

    pub fn output(&self, key: &str) -> Option<&Value> {
        self.outputs.get(key)
    }

    /// An output a previous step must have produced
    pub fn require(&self, key: &str) -> Result<&Value> {
        self.outputs.get(key).ok_or_else(|| {
            CoreError::Validation(format!("workflow output '{key}' was not produced"))
        })
    }

    /// A string field of a previously produced document
    pub fn require_str(&self, key: &str, field: &str) -> Result<&str> {
        self.require(key)?
            .get(field)
            .and_then(Value::as_str)
            .ok_or_else(|| CoreError::Validation(format!("'{key}' has no string field '{field}'")))
    }

    pub fn outputs(&self) -> &BTreeMap<String, Value> {
        &self.outputs
    }

    /// Record a resource that should not outlive the workflow
    pub fn register_temporary(&mut self, resource: ResourceRef) {
        self.temporaries.push(resource);
    }

    /// Forget a temporary once it has been deleted
    pub fn release_temporary(&mut self, resource: &ResourceRef) {
        self.temporaries.retain(|r| r != resource);
    }

    pub fn temporaries(&self) -> &[ResourceRef] {
        &self.temporaries
    }
}

/// One mutation in a workflow plus its continuation
#[async_trait]
pub trait WorkflowStep: Send + Sync {
    /// Short kebab-case name used in logs and errors
    fn name(&self) -> &str;

    /// Build the request, reading whatever earlier steps produced
    async fn request(
        &self,
        orchestrator: &Orchestrator,
        ctx: &WorkflowContext,
    ) -> Result<MutationRequest>;

    /// Consume the successful result; decide whether to go on
    async fn complete(
        &self,
        _orchestrator: &Orchestrator,
        _ctx: &mut WorkflowContext,
        _request: &MutationRequest,
        _result: &CompletedOperation,
    ) -> Result<StepFlow> {
        Ok(StepFlow::Continue)
    }
}

/// A step with a fixed request, optionally fetching the target afterwards
pub struct MutationStep {
    name: String,
    request: MutationRequest,
    output_key: Option<String>,
}

impl MutationStep {
    pub fn new(name: impl Into<String>, request: MutationRequest) -> Self {
        Self {
            name: name.into(),
            request,
            output_key: None,
        }
    }

    /// Store the target's document under `key` once the operation is done
    pub fn fetch_into(mut self, key: impl Into<String>) -> Self {
        self.output_key = Some(key.into());
        self
    }
}

#[async_trait]
impl WorkflowStep for MutationStep {
    fn name(&self) -> &str {
        &self.name
    }

    async fn request(
        &self,
        _orchestrator: &Orchestrator,
        _ctx: &WorkflowContext,
    ) -> Result<MutationRequest> {
        Ok(self.request.clone())
    }

    async fn complete(
        &self,
        orchestrator: &Orchestrator,
        ctx: &mut WorkflowContext,
        request: &MutationRequest,
        _result: &CompletedOperation,
    ) -> Result<StepFlow> {
        if let Some(key) = &self.output_key {
            let doc = orchestrator.get_resource(&request.target).await?;
            ctx.insert_output(key.clone(), doc);
        }
        Ok(StepFlow::Continue)
    }
}

/// Record of one finished step
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StepRecord {
    pub step: String,
    pub operation: String,
    pub target: String,
    pub polls: u32,
}

/// Result of a successful workflow run
#[derive(Debug, Clone, Serialize)]
pub struct WorkflowReport {
    pub workflow: String,
    pub steps: Vec<StepRecord>,
    pub outputs: BTreeMap<String, Value>,
    /// Temporaries still alive when the workflow ended
    pub temporaries: Vec<String>,
    /// True if a step ended the workflow before the last step
    pub halted_early: bool,
}

/// An ordered list of steps plus the failure policy
pub struct Workflow {
    name: String,
    steps: Vec<Box<dyn WorkflowStep>>,
    failure_policy: FailurePolicy,
}

impl Workflow {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            steps: Vec::new(),
            failure_policy: FailurePolicy::default(),
        }
    }

    pub fn step(mut self, step: impl WorkflowStep + 'static) -> Self {
        self.steps.push(Box::new(step));
        self
    }

    pub fn push_step(&mut self, step: Box<dyn WorkflowStep>) {
        self.steps.push(step);
    }

    pub fn with_failure_policy(mut self, policy: FailurePolicy) -> Self {
        self.failure_policy = policy;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn failure_policy(&self) -> FailurePolicy {
        self.failure_policy
    }

    pub fn step_names(&self) -> Vec<&str> {
        self.steps.iter().map(|s| s.name()).collect()
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }
}

impl Orchestrator {
    /// Run a workflow's steps in order, stopping at the first failure
    pub async fn run_workflow(
        &self,
        workflow: &Workflow,
        mut ctx: WorkflowContext,
    ) -> Result<WorkflowReport> {
        let total = workflow.steps.len();
        let mut records: Vec<StepRecord> = Vec::with_capacity(total);
        let mut halted_early = false;

        info!("Starting workflow '{}' ({} steps)", workflow.name, total);

        for (index, step) in workflow.steps.iter().enumerate() {
            self.emit(ProgressEvent::StepStarted {
                step: step.name().to_string(),
                index,
                total,
            });

            match self.run_step(step.as_ref(), &mut ctx).await {
                Ok((record, flow)) => {
                    self.emit(ProgressEvent::StepCompleted {
                        step: record.step.clone(),
                    });
                    records.push(record);
                    if flow == StepFlow::Halt {
                        if index + 1 < total {
                            info!(
                                "Step '{}' ended workflow '{}' early",
                                step.name(),
                                workflow.name
                            );
                            halted_early = true;
                        }
                        break;
                    }
                }
                Err(err) => {
                    warn!(
                        "Workflow '{}' failed at step '{}': {}",
                        workflow.name,
                        step.name(),
                        err
                    );
                    if workflow.failure_policy == FailurePolicy::DeleteTemporaries {
                        self.delete_temporaries(&mut ctx).await;
                    } else if !ctx.temporaries().is_empty() {
                        warn!(
                            "Leaving {} temporary resource(s) in place: {}",
                            ctx.temporaries().len(),
                            join_refs(ctx.temporaries())
                        );
                    }
                    return Err(CoreError::Workflow {
                        step: step.name().to_string(),
                        completed: records.into_iter().map(|r| r.step).collect(),
                        source: Box::new(err),
                    });
                }
            }
        }

        info!("Workflow '{}' finished", workflow.name);
        Ok(WorkflowReport {
            workflow: workflow.name.clone(),
            steps: records,
            temporaries: ctx.temporaries().iter().map(|r| r.to_string()).collect(),
            outputs: ctx.outputs,
            halted_early,
        })
    }

    async fn run_step(
        &self,
        step: &dyn WorkflowStep,
        ctx: &mut WorkflowContext,
    ) -> Result<(StepRecord, StepFlow)> {
        let request = step.request(self, ctx).await?;
        let handle = self.submit(&request).await?;
        let completed = self.await_completion(&handle, self.poll_config()).await?;
        let flow = step.complete(self, ctx, &request, &completed).await?;

        Ok((
            StepRecord {
                step: step.name().to_string(),
                operation: completed.handle.name.clone(),
                target: request.target.to_string(),
                polls: completed.polls,
            },
            flow,
        ))
    }

    /// Best-effort deletion of remaining temporaries, newest first
    async fn delete_temporaries(&self, ctx: &mut WorkflowContext) {
        let pending: Vec<ResourceRef> = ctx.temporaries().iter().rev().cloned().collect();
        for resource in pending {
            info!("Deleting temporary {}", resource);
            match self
                .submit_and_wait(&MutationRequest::delete(resource.clone()))
                .await
            {
                Ok(_) => ctx.release_temporary(&resource),
                Err(err) => warn!("Could not delete temporary {}: {}", resource, err),
            }
        }
    }
}

fn join_refs(refs: &[ResourceRef]) -> String {
    refs.iter()
        .map(|r| r.to_string())
        .collect::<Vec<_>>()
        .join(", ")
}
