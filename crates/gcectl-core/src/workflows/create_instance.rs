//! Create one instance from the newest image of an image family

use async_trait::async_trait;
use serde::Serialize;
use serde_json::{Value, json};
use std::sync::Arc;

use crate::api::MutationRequest;
use crate::error::{CoreError, Result};
use crate::operation::CompletedOperation;
use crate::orchestrator::Orchestrator;
use crate::resource::{ResourceKind, ResourceRef};
use crate::workflow::{StepFlow, Workflow, WorkflowContext, WorkflowStep};

pub const INSTANCE_OUTPUT: &str = "instance";

pub const DEFAULT_MACHINE_TYPE: &str = "n1-standard-1";
pub const DEFAULT_IMAGE_PROJECT: &str = "debian-cloud";
pub const DEFAULT_IMAGE_FAMILY: &str = "debian-12";
pub const DEFAULT_NETWORK: &str = "global/networks/default";

/// Scopes granted to the default service account
pub const DEFAULT_SCOPES: [&str; 2] = [
    "https://www.googleapis.com/auth/devstorage.read_write",
    "https://www.googleapis.com/auth/logging.write",
];

/// Inputs for [`create_instance_workflow`]
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CreateInstanceParams {
    pub project: String,
    pub zone: String,
    pub name: String,
    /// Short machine type name or a full `zones/.../machineTypes/...` path
    pub machine_type: String,
    pub image_project: String,
    pub image_family: String,
    pub network: String,
    /// Metadata items, in order
    pub metadata: Vec<(String, String)>,
}

impl CreateInstanceParams {
    pub fn new(
        project: impl Into<String>,
        zone: impl Into<String>,
        name: impl Into<String>,
    ) -> Self {
        Self {
            project: project.into(),
            zone: zone.into(),
            name: name.into(),
            machine_type: DEFAULT_MACHINE_TYPE.to_string(),
            image_project: DEFAULT_IMAGE_PROJECT.to_string(),
            image_family: DEFAULT_IMAGE_FAMILY.to_string(),
            network: DEFAULT_NETWORK.to_string(),
            metadata: Vec::new(),
        }
    }

    pub fn instance(&self) -> ResourceRef {
        ResourceRef::zonal(&self.project, &self.zone, ResourceKind::Instance, &self.name)
    }

    pub fn image(&self) -> ResourceRef {
        ResourceRef::image_family(&self.image_project, &self.image_family)
    }

    fn machine_type_path(&self) -> String {
        if self.machine_type.contains('/') {
            self.machine_type.clone()
        } else {
            format!("zones/{}/machineTypes/{}", self.zone, self.machine_type)
        }
    }

    /// Insert body for an instance booting from `source_image`
    pub fn body(&self, source_image: &str) -> Value {
        let items: Vec<Value> = self
            .metadata
            .iter()
            .map(|(key, value)| json!({ "key": key, "value": value }))
            .collect();

        json!({
            "name": self.name,
            "machineType": self.machine_type_path(),
            "disks": [{
                "boot": true,
                "autoDelete": true,
                "initializeParams": { "sourceImage": source_image },
            }],
            "networkInterfaces": [{
                "network": self.network,
                "accessConfigs": [{ "type": "ONE_TO_ONE_NAT", "name": "External NAT" }],
            }],
            "serviceAccounts": [{
                "email": "default",
                "scopes": DEFAULT_SCOPES,
            }],
            "metadata": { "items": items },
        })
    }
}

pub fn create_instance_workflow(params: CreateInstanceParams) -> Result<Workflow> {
    if params.name.trim().is_empty() {
        return Err(CoreError::Validation(
            "instance name must not be empty".to_string(),
        ));
    }
    Ok(Workflow::new("create-instance").step(CreateInstance(Arc::new(params))))
}

struct CreateInstance(Arc<CreateInstanceParams>);

#[async_trait]
impl WorkflowStep for CreateInstance {
    fn name(&self) -> &str {
        "create-instance"
    }

    async fn request(
        &self,
        orchestrator: &Orchestrator,
        _ctx: &WorkflowContext,
    ) -> Result<MutationRequest> {
        let image = orchestrator.get_resource(&self.0.image()).await?;
        let source_image = image
            .get("selfLink")
            .and_then(Value::as_str)
            .ok_or_else(|| {
                CoreError::Validation(format!(
                    "image family {} returned no selfLink",
                    self.0.image_family
                ))
            })?;

        Ok(MutationRequest::insert(
            self.0.instance(),
            self.0.body(source_image),
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
        ctx.insert_output(INSTANCE_OUTPUT, doc);
        Ok(StepFlow::Continue)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_body() {
        let mut params = CreateInstanceParams::new("p", "z1", "demo-instance");
        params.metadata = vec![("var1".to_string(), "valor".to_string())];

        let body = params.body("https://x/projects/debian-cloud/global/images/debian-12-v1");
        assert_eq!(body["machineType"], "zones/z1/machineTypes/n1-standard-1");
        assert_eq!(
            body["disks"][0]["initializeParams"]["sourceImage"],
            "https://x/projects/debian-cloud/global/images/debian-12-v1"
        );
        assert_eq!(
            body["networkInterfaces"][0]["accessConfigs"][0]["type"],
            "ONE_TO_ONE_NAT"
        );
        assert_eq!(
            body["metadata"]["items"],
            json!([{"key": "var1", "value": "valor"}])
        );
        assert_eq!(body["serviceAccounts"][0]["scopes"][1], DEFAULT_SCOPES[1]);
    }

    #[test]
    fn test_full_machine_type_path_is_kept() {
        let mut params = CreateInstanceParams::new("p", "z1", "vm");
        params.machine_type = "zones/z2/machineTypes/e2-small".to_string();
        assert_eq!(params.body("img")["machineType"], "zones/z2/machineTypes/e2-small");
    }

    #[test]
    fn test_empty_name_rejected() {
        assert!(create_instance_workflow(CreateInstanceParams::new("p", "z1", "")).is_err());
    }
}
