//! Resize a managed instance group and wait for it to settle
//!
//! The resize operation itself finishes almost immediately; the group is
//! only settled once its manager reports no pending `currentActions`.

use async_trait::async_trait;
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

use crate::api::{MutationRequest, MutationVerb};
use crate::error::{CoreError, Result};
use crate::operation::CompletedOperation;
use crate::orchestrator::{DEFAULT_POLL_INTERVAL, Orchestrator, PollConfig};
use crate::resource::{ResourceKind, ResourceRef};
use crate::workflow::{StepFlow, Workflow, WorkflowContext, WorkflowStep};

pub const MANAGER_OUTPUT: &str = "manager";

/// Polls allowed for the group to settle when nothing else is configured
pub const DEFAULT_SETTLE_POLLS: u64 = 100;

/// Inputs for [`resize_workflow`]
#[derive(Debug, Clone, PartialEq)]
pub struct ResizeParams {
    pub project: String,
    pub zone: String,
    pub instance_group: String,
    pub size: u32,
    /// How long to wait for pending actions to drain
    pub settle: PollConfig,
}

impl ResizeParams {
    pub fn new(
        project: impl Into<String>,
        zone: impl Into<String>,
        instance_group: impl Into<String>,
        size: u32,
    ) -> Self {
        Self {
            project: project.into(),
            zone: zone.into(),
            instance_group: instance_group.into(),
            size,
            settle: PollConfig::new(
                DEFAULT_POLL_INTERVAL,
                Some(DEFAULT_POLL_INTERVAL * DEFAULT_SETTLE_POLLS as u32),
            ),
        }
    }

    pub fn with_settle(mut self, settle: PollConfig) -> Self {
        self.settle = settle;
        self
    }

    pub fn with_settle_timeout(mut self, timeout: Duration) -> Self {
        self.settle.timeout = Some(timeout);
        self
    }

    pub fn group(&self) -> ResourceRef {
        ResourceRef::zonal(
            &self.project,
            &self.zone,
            ResourceKind::InstanceGroup,
            &self.instance_group,
        )
    }

    pub fn manager(&self) -> ResourceRef {
        ResourceRef::zonal(
            &self.project,
            &self.zone,
            ResourceKind::InstanceGroupManager,
            &self.instance_group,
        )
    }
}

/// Build the single-step resize workflow
pub fn resize_workflow(params: ResizeParams) -> Result<Workflow> {
    if params.instance_group.trim().is_empty() {
        return Err(CoreError::Validation(
            "instance group must not be empty".to_string(),
        ));
    }
    Ok(Workflow::new("resize-group").step(Resize(Arc::new(params))))
}

/// Number of instances with an action in flight
///
/// Sums every counter in `currentActions` except `none`. A manager without
/// `currentActions` has nothing pending.
pub fn pending_actions(manager: &Value) -> u64 {
    manager
        .get("currentActions")
        .and_then(Value::as_object)
        .map(|actions| {
            actions
                .iter()
                .filter(|(action, _)| action.as_str() != "none")
                .filter_map(|(_, count)| count.as_u64())
                .sum()
        })
        .unwrap_or(0)
}

struct Resize(Arc<ResizeParams>);

#[async_trait]
impl WorkflowStep for Resize {
    fn name(&self) -> &str {
        "resize"
    }

    async fn request(
        &self,
        orchestrator: &Orchestrator,
        _ctx: &WorkflowContext,
    ) -> Result<MutationRequest> {
        // Fails with Lookup before anything is submitted
        orchestrator.get_resource(&self.0.group()).await?;

        Ok(MutationRequest::new(
            self.0.manager(),
            MutationVerb::Resize { size: self.0.size },
            Value::Null,
        ))
    }

    async fn complete(
        &self,
        orchestrator: &Orchestrator,
        ctx: &mut WorkflowContext,
        request: &MutationRequest,
        _result: &CompletedOperation,
    ) -> Result<StepFlow> {
        info!(
            "Waiting for instance group {} to settle at {} instances",
            self.0.instance_group, self.0.size
        );
        let manager = orchestrator
            .await_resource(&request.target, &self.0.settle, |doc| {
                pending_actions(doc) == 0
            })
            .await?;
        ctx.insert_output(MANAGER_OUTPUT, manager);
        Ok(StepFlow::Continue)
    }
}
