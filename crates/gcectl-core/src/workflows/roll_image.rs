//! Roll a disk's contents into a managed instance group
//!
//! snapshot disk -> temporary disk -> image -> copy of the group's instance
//! template pointing at the image -> group retargeted at the copy.
//!
//! Existing instances keep running the old template until they are
//! recreated; that step is left to the operator.

use async_trait::async_trait;
use serde::Serialize;
use serde_json::json;
use std::sync::Arc;
use tracing::info;

use crate::api::{MutationRequest, MutationVerb};
use crate::error::{CoreError, Result};
use crate::operation::CompletedOperation;
use crate::orchestrator::Orchestrator;
use crate::resource::{ResourceKind, ResourceRef, link_name, relative_link};
use crate::workflow::{FailurePolicy, StepFlow, Workflow, WorkflowContext, WorkflowStep};

use super::strip_output_only;

pub const SNAPSHOT_OUTPUT: &str = "snapshot";
pub const DISK_OUTPUT: &str = "disk";
pub const IMAGE_OUTPUT: &str = "image";
pub const TEMPLATE_OUTPUT: &str = "template";

/// Longest resource name the API accepts
const MAX_NAME_LEN: usize = 63;

/// Inputs for [`roll_image_workflow`]
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RollImageParams {
    pub project: String,
    pub zone: String,
    /// Disk whose contents become the new image
    pub disk: String,
    /// Managed instance group to retarget
    pub instance_group: String,
    /// Distinguishes the names created by this run
    pub run_id: String,
    pub temporary_suffix: String,
    /// Delete the temporary snapshot and disk once they have been consumed
    pub cleanup_temporary_resources: bool,
    pub failure_policy: FailurePolicy,
}

impl RollImageParams {
    /// Params with a timestamp run id and default cleanup behaviour
    pub fn new(
        project: impl Into<String>,
        zone: impl Into<String>,
        disk: impl Into<String>,
        instance_group: impl Into<String>,
    ) -> Self {
        Self {
            project: project.into(),
            zone: zone.into(),
            disk: disk.into(),
            instance_group: instance_group.into(),
            run_id: chrono::Utc::now().timestamp().to_string(),
            temporary_suffix: "tmp".to_string(),
            cleanup_temporary_resources: true,
            failure_policy: FailurePolicy::default(),
        }
    }

    pub fn with_run_id(mut self, run_id: impl Into<String>) -> Self {
        self.run_id = run_id.into();
        self
    }

    pub fn with_temporary_suffix(mut self, suffix: impl Into<String>) -> Self {
        self.temporary_suffix = suffix.into();
        self
    }

    pub fn with_cleanup(mut self, cleanup: bool) -> Self {
        self.cleanup_temporary_resources = cleanup;
        self
    }

    pub fn with_failure_policy(mut self, policy: FailurePolicy) -> Self {
        self.failure_policy = policy;
        self
    }

    /// Name shared by the temporary snapshot and disk
    pub fn temporary_name(&self) -> String {
        format!("{}-{}-{}", self.disk, self.run_id, self.temporary_suffix)
    }

    pub fn image_name(&self) -> String {
        format!("{}-{}", self.disk, self.run_id)
    }

    /// Name for the copy of `template`
    pub fn template_copy_name(&self, template: &str) -> String {
        format!("{}-{}-{}", template, self.run_id, self.temporary_suffix)
    }

    pub fn source_disk(&self) -> ResourceRef {
        ResourceRef::zonal(&self.project, &self.zone, ResourceKind::Disk, &self.disk)
    }

    pub fn snapshot(&self) -> ResourceRef {
        ResourceRef::global(&self.project, ResourceKind::Snapshot, self.temporary_name())
    }

    pub fn temporary_disk(&self) -> ResourceRef {
        ResourceRef::zonal(
            &self.project,
            &self.zone,
            ResourceKind::Disk,
            self.temporary_name(),
        )
    }

    pub fn image(&self) -> ResourceRef {
        ResourceRef::global(&self.project, ResourceKind::Image, self.image_name())
    }

    pub fn manager(&self) -> ResourceRef {
        ResourceRef::zonal(
            &self.project,
            &self.zone,
            ResourceKind::InstanceGroupManager,
            &self.instance_group,
        )
    }

    /// Reject inputs that would produce names the API refuses
    pub fn validate(&self) -> Result<()> {
        for (field, value) in [
            ("project", &self.project),
            ("zone", &self.zone),
            ("disk", &self.disk),
            ("instance group", &self.instance_group),
            ("run id", &self.run_id),
            ("temporary suffix", &self.temporary_suffix),
        ] {
            if value.trim().is_empty() {
                return Err(CoreError::Validation(format!("{field} must not be empty")));
            }
        }

        check_generated_name(&self.temporary_name())
    }
}

/// A name this workflow generated must be one the API accepts
fn check_generated_name(name: &str) -> Result<()> {
    if name.len() > MAX_NAME_LEN {
        return Err(CoreError::Validation(format!(
            "generated name '{name}' is longer than {MAX_NAME_LEN} characters"
        )));
    }
    if !name
        .chars()
        .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-')
    {
        return Err(CoreError::Validation(format!(
            "generated name '{name}' may only contain lowercase letters, digits and hyphens"
        )));
    }
    Ok(())
}

/// Build the roll-image workflow
///
/// The delete steps are only included when
/// `cleanup_temporary_resources` is set.
pub fn roll_image_workflow(params: RollImageParams) -> Result<Workflow> {
    params.validate()?;
    let params = Arc::new(params);

    let mut workflow = Workflow::new("roll-image").with_failure_policy(params.failure_policy);
    workflow.push_step(Box::new(CreateSnapshot(params.clone())));
    workflow.push_step(Box::new(CreateDisk(params.clone())));
    if params.cleanup_temporary_resources {
        workflow.push_step(Box::new(DeleteTemporary {
            name: "delete-snapshot",
            resource: params.snapshot(),
        }));
    }
    workflow.push_step(Box::new(CreateImage(params.clone())));
    if params.cleanup_temporary_resources {
        workflow.push_step(Box::new(DeleteTemporary {
            name: "delete-disk",
            resource: params.temporary_disk(),
        }));
    }
    workflow.push_step(Box::new(CopyTemplate(params.clone())));
    workflow.push_step(Box::new(SetTemplate(params)));
    Ok(workflow)
}

struct CreateSnapshot(Arc<RollImageParams>);

#[async_trait]
impl WorkflowStep for CreateSnapshot {
    fn name(&self) -> &str {
        "create-snapshot"
    }

    async fn request(&self, _: &Orchestrator, _: &WorkflowContext) -> Result<MutationRequest> {
        Ok(MutationRequest::new(
            self.0.source_disk(),
            MutationVerb::CreateSnapshot,
            json!({ "name": self.0.temporary_name() }),
        ))
    }

    async fn complete(
        &self,
        orchestrator: &Orchestrator,
        ctx: &mut WorkflowContext,
        _request: &MutationRequest,
        _result: &CompletedOperation,
    ) -> Result<StepFlow> {
        let snapshot = self.0.snapshot();
        ctx.register_temporary(snapshot.clone());
        let doc = orchestrator.get_resource(&snapshot).await?;
        ctx.insert_output(SNAPSHOT_OUTPUT, doc);
        Ok(StepFlow::Continue)
    }
}

struct CreateDisk(Arc<RollImageParams>);

#[async_trait]
impl WorkflowStep for CreateDisk {
    fn name(&self) -> &str {
        "create-disk"
    }

    async fn request(&self, _: &Orchestrator, ctx: &WorkflowContext) -> Result<MutationRequest> {
        let source = ctx.require_str(SNAPSHOT_OUTPUT, "selfLink")?;
        let size = ctx
            .require(SNAPSHOT_OUTPUT)?
            .get("diskSizeGb")
            .cloned()
            .ok_or_else(|| CoreError::Validation("snapshot has no diskSizeGb".to_string()))?;

        Ok(MutationRequest::insert(
            self.0.temporary_disk(),
            json!({
                "name": self.0.temporary_name(),
                "sourceSnapshot": relative_link(source),
                "sizeGb": size,
            }),
        ))
    }

    async fn complete(
        &self,
        orchestrator: &Orchestrator,
        ctx: &mut WorkflowContext,
        request: &MutationRequest,
        _result: &CompletedOperation,
    ) -> Result<StepFlow> {
        ctx.register_temporary(request.target.clone());
        let doc = orchestrator.get_resource(&request.target).await?;
        ctx.insert_output(DISK_OUTPUT, doc);
        Ok(StepFlow::Continue)
    }
}

struct DeleteTemporary {
    name: &'static str,
    resource: ResourceRef,
}

#[async_trait]
impl WorkflowStep for DeleteTemporary {
    fn name(&self) -> &str {
        self.name
    }

    async fn request(&self, _: &Orchestrator, _: &WorkflowContext) -> Result<MutationRequest> {
        Ok(MutationRequest::delete(self.resource.clone()))
    }

    async fn complete(
        &self,
        _orchestrator: &Orchestrator,
        ctx: &mut WorkflowContext,
        _request: &MutationRequest,
        _result: &CompletedOperation,
    ) -> Result<StepFlow> {
        ctx.release_temporary(&self.resource);
        Ok(StepFlow::Continue)
    }
}

struct CreateImage(Arc<RollImageParams>);

#[async_trait]
impl WorkflowStep for CreateImage {
    fn name(&self) -> &str {
        "create-image"
    }

    async fn request(&self, _: &Orchestrator, ctx: &WorkflowContext) -> Result<MutationRequest> {
        let source = ctx.require_str(DISK_OUTPUT, "selfLink")?;
        Ok(MutationRequest::insert(
            self.0.image(),
            json!({
                "name": self.0.image_name(),
                "sourceDisk": source,
            }),
        ))
    }

    async fn complete(
        &self,
        orchestrator: &Orchestrator,
        ctx: &mut WorkflowContext,
        request: &MutationRequest,
        _result: &CompletedOperation,
    ) -> Result<StepFlow> {
        let doc = orchestrator.get_resource(&request.target).await?;
        ctx.insert_output(IMAGE_OUTPUT, doc);
        Ok(StepFlow::Continue)
    }
}

struct CopyTemplate(Arc<RollImageParams>);

#[async_trait]
impl WorkflowStep for CopyTemplate {
    fn name(&self) -> &str {
        "copy-template"
    }

    async fn request(
        &self,
        orchestrator: &Orchestrator,
        ctx: &WorkflowContext,
    ) -> Result<MutationRequest> {
        let image = ctx.require_str(IMAGE_OUTPUT, "selfLink")?;

        let manager = orchestrator.get_resource(&self.0.manager()).await?;
        let current = manager
            .get("instanceTemplate")
            .and_then(|v| v.as_str())
            .ok_or_else(|| {
                CoreError::Validation(format!(
                    "instance group manager {} has no instanceTemplate",
                    self.0.instance_group
                ))
            })?;
        let current_name = link_name(current);
        let copy_name = self.0.template_copy_name(current_name);
        check_generated_name(&copy_name)?;
        let source =
            ResourceRef::global(&self.0.project, ResourceKind::InstanceTemplate, current_name);

        let mut template = orchestrator.get_resource(&source).await?;
        template
            .pointer_mut("/properties/disks/0/initializeParams")
            .and_then(|v| v.as_object_mut())
            .ok_or_else(|| {
                CoreError::Validation(format!(
                    "instance template {current_name} has no boot disk initializeParams"
                ))
            })?
            .insert("sourceImage".to_string(), json!(image));

        strip_output_only(&mut template);
        if let Some(obj) = template.as_object_mut() {
            obj.insert("name".to_string(), json!(copy_name));
        }

        info!("Copying instance template {} to {}", current_name, copy_name);
        Ok(MutationRequest::insert(
            ResourceRef::global(&self.0.project, ResourceKind::InstanceTemplate, copy_name),
            template,
        ))
    }

    async fn complete(
        &self,
        orchestrator: &Orchestrator,
        ctx: &mut WorkflowContext,
        request: &MutationRequest,
        _result: &CompletedOperation,
    ) -> Result<StepFlow> {
        let doc = orchestrator.get_resource(&request.target).await?;
        ctx.insert_output(TEMPLATE_OUTPUT, doc);
        Ok(StepFlow::Continue)
    }
}

struct SetTemplate(Arc<RollImageParams>);

#[async_trait]
impl WorkflowStep for SetTemplate {
    fn name(&self) -> &str {
        "set-template"
    }

    async fn request(&self, _: &Orchestrator, ctx: &WorkflowContext) -> Result<MutationRequest> {
        let template = ctx.require_str(TEMPLATE_OUTPUT, "selfLink")?;
        Ok(MutationRequest::new(
            self.0.manager(),
            MutationVerb::SetInstanceTemplate,
            json!({ "instanceTemplate": template }),
        ))
    }

    async fn complete(
        &self,
        _orchestrator: &Orchestrator,
        _ctx: &mut WorkflowContext,
        _request: &MutationRequest,
        _result: &CompletedOperation,
    ) -> Result<StepFlow> {
        info!(
            "Instance group {} now uses the new template; recreate its instances to pick it up",
            self.0.instance_group
        );
        Ok(StepFlow::Continue)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params() -> RollImageParams {
        RollImageParams::new("proj", "z1", "disk-a", "web").with_run_id("1700000000")
    }

    #[test]
    fn test_generated_names() {
        let p = params();
        assert_eq!(p.temporary_name(), "disk-a-1700000000-tmp");
        assert_eq!(p.image_name(), "disk-a-1700000000");
        assert_eq!(p.template_copy_name("web-tpl"), "web-tpl-1700000000-tmp");
        assert_eq!(
            p.snapshot().path(),
            "projects/proj/global/snapshots/disk-a-1700000000-tmp"
        );
        assert_eq!(
            p.temporary_disk().path(),
            "projects/proj/zones/z1/disks/disk-a-1700000000-tmp"
        );
        assert_eq!(
            p.manager().path(),
            "projects/proj/zones/z1/instanceGroupManagers/web"
        );
    }

    #[test]
    fn test_step_order_with_cleanup() {
        let workflow = roll_image_workflow(params()).unwrap();
        assert_eq!(
            workflow.step_names(),
            vec![
                "create-snapshot",
                "create-disk",
                "delete-snapshot",
                "create-image",
                "delete-disk",
                "copy-template",
                "set-template",
            ]
        );
    }

    #[test]
    fn test_step_order_keeping_temporaries() {
        let workflow = roll_image_workflow(params().with_cleanup(false)).unwrap();
        assert_eq!(
            workflow.step_names(),
            vec![
                "create-snapshot",
                "create-disk",
                "create-image",
                "copy-template",
                "set-template",
            ]
        );
    }

    #[test]
    fn test_validation() {
        assert!(params().validate().is_ok());
        assert!(params().with_run_id("").validate().is_err());
        assert!(params().with_temporary_suffix("TMP").validate().is_err());
        assert!(
            params()
                .with_run_id("x".repeat(60))
                .validate()
                .is_err()
        );
    }
}
