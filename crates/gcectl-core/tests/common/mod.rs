//! In-memory Compute API double shared by the integration tests
//!
//! Every operation follows a script of snapshots, one per status query; the
//! last entry repeats once the script runs out. A mutation's effect (new
//! document, deletion, template switch) becomes visible when its operation
//! is first observed DONE without error.

#![allow(dead_code)]

use async_trait::async_trait;
use gcectl_core::{
    ComputeApi, CoreError, MutationRequest, MutationVerb, OperationError, OperationErrorItem,
    OperationHandle, OperationSnapshot, Orchestrator, PollConfig, ProgressEvent, ResourceKind,
    ResourceRef, Result, RetryPolicy, Scope,
};
use serde_json::{Value, json};
use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};
use std::time::Duration;

pub const PROJECT: &str = "test-project";
pub const ZONE: &str = "europe-west1-d";
pub const API_ROOT: &str = "https://compute.googleapis.com/compute/v1";

pub fn self_link(resource: &ResourceRef) -> String {
    format!("{}/{}", API_ROOT, resource.path())
}

struct FakeOperation {
    request: MutationRequest,
    scope: Scope,
    script: VecDeque<OperationSnapshot>,
    applied: bool,
}

#[derive(Default)]
struct State {
    next_op: u32,
    operations: HashMap<String, FakeOperation>,
    /// Scripts keyed by target path, consumed by the next submission to it
    scripts: HashMap<String, Vec<OperationSnapshot>>,
    resources: HashMap<String, Value>,
    /// Successive documents returned for a path before settling on the last
    sequences: HashMap<String, VecDeque<Value>>,
    submissions: Vec<MutationRequest>,
    operation_queries: Vec<(Scope, String)>,
    resource_reads: Vec<String>,
    transient_poll_failures: u32,
    rejections: HashMap<String, String>,
}

#[derive(Clone, Default)]
pub struct FakeCompute {
    state: Arc<Mutex<State>>,
}

impl FakeCompute {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a resource document; `selfLink` and `name` are filled in
    pub fn put(&self, resource: &ResourceRef, doc: Value) {
        let mut doc = doc;
        if let Some(obj) = doc.as_object_mut() {
            obj.insert("selfLink".to_string(), json!(self_link(resource)));
            obj.entry("name").or_insert(json!(resource.name()));
        }
        self.state
            .lock()
            .unwrap()
            .resources
            .insert(resource.path(), doc);
    }

    /// Return these documents in turn for `resource`, then keep the last
    pub fn put_sequence(&self, resource: &ResourceRef, docs: Vec<Value>) {
        self.state
            .lock()
            .unwrap()
            .sequences
            .insert(resource.path(), docs.into());
    }

    /// Script the operation started by the next mutation of `target`
    pub fn script(&self, target: &ResourceRef, snapshots: Vec<OperationSnapshot>) {
        self.state
            .lock()
            .unwrap()
            .scripts
            .insert(target.path(), snapshots);
    }

    /// Make the next mutation of `target` finish with an error code
    pub fn fail(&self, target: &ResourceRef, code: &str, message: &str) {
        self.script(
            target,
            vec![
                OperationSnapshot::running(50),
                OperationSnapshot::failed(OperationError {
                    errors: vec![OperationErrorItem::new(code).with_message(message)],
                }),
            ],
        );
    }

    /// Reject mutations of `target` synchronously
    pub fn reject(&self, target: &ResourceRef, message: &str) {
        self.state
            .lock()
            .unwrap()
            .rejections
            .insert(target.path(), message.to_string());
    }

    /// Fail the next `count` status queries with a transport error
    pub fn fail_next_polls(&self, count: u32) {
        self.state.lock().unwrap().transient_poll_failures = count;
    }

    pub fn submissions(&self) -> Vec<MutationRequest> {
        self.state.lock().unwrap().submissions.clone()
    }

    /// `verb target` for every submission, in order
    pub fn submitted(&self) -> Vec<String> {
        self.submissions().iter().map(|r| r.to_string()).collect()
    }

    pub fn operation_queries(&self) -> Vec<(Scope, String)> {
        self.state.lock().unwrap().operation_queries.clone()
    }

    pub fn resource(&self, resource: &ResourceRef) -> Option<Value> {
        self.state
            .lock()
            .unwrap()
            .resources
            .get(&resource.path())
            .cloned()
    }

    pub fn orchestrator(&self) -> Orchestrator {
        Orchestrator::new(Arc::new(self.clone()))
            .with_poll(PollConfig::new(Duration::from_secs(1), Some(Duration::from_secs(60))))
            .with_retry(RetryPolicy::none())
    }
}

fn apply(state: &mut State, request: &MutationRequest) {
    let target = &request.target;
    match request.verb {
        MutationVerb::Insert => {
            let mut doc = request.body.clone();
            if let Some(obj) = doc.as_object_mut() {
                obj.insert("selfLink".to_string(), json!(self_link(target)));
                obj.insert("id".to_string(), json!("1234567890"));
            }
            state.resources.insert(target.path(), doc);
        }
        MutationVerb::Delete => {
            state.resources.remove(&target.path());
        }
        MutationVerb::CreateSnapshot => {
            let name = request.body["name"].as_str().unwrap_or_default().to_string();
            let snapshot = ResourceRef::global(target.project(), ResourceKind::Snapshot, name);
            let size = state
                .resources
                .get(&target.path())
                .and_then(|d| d.get("sizeGb").cloned())
                .unwrap_or(json!("10"));
            state.resources.insert(
                snapshot.path(),
                json!({
                    "name": snapshot.name(),
                    "selfLink": self_link(&snapshot),
                    "sourceDisk": self_link(target),
                    "diskSizeGb": size,
                    "status": "READY",
                }),
            );
        }
        MutationVerb::SetInstanceTemplate => {
            if let Some(doc) = state.resources.get_mut(&target.path()) {
                doc["instanceTemplate"] = request.body["instanceTemplate"].clone();
            }
        }
        MutationVerb::Resize { size } => {
            if let Some(doc) = state.resources.get_mut(&target.path()) {
                doc["targetSize"] = json!(size);
            }
        }
    }
}

#[async_trait]
impl ComputeApi for FakeCompute {
    async fn submit_mutation(&self, request: &MutationRequest) -> Result<OperationHandle> {
        let mut state = self.state.lock().unwrap();
        state.submissions.push(request.clone());

        let path = request.target.path();
        if let Some(message) = state.rejections.get(&path) {
            return Err(CoreError::Submission {
                message: message.clone(),
                status: Some(400),
            });
        }

        state.next_op += 1;
        let name = format!("operation-{}", state.next_op);
        let script = state
            .scripts
            .remove(&path)
            .unwrap_or_else(|| vec![OperationSnapshot::done()]);
        let scope = request.target.scope().clone();
        state.operations.insert(
            name.clone(),
            FakeOperation {
                request: request.clone(),
                scope: scope.clone(),
                script: script.into(),
                applied: false,
            },
        );

        let mut handle = OperationHandle::new(request.target.project(), scope, name);
        handle.target_link = Some(self_link(&request.target));
        Ok(handle)
    }

    async fn get_operation(
        &self,
        _project: &str,
        scope: &Scope,
        operation: &str,
    ) -> Result<OperationSnapshot> {
        let mut state = self.state.lock().unwrap();
        state
            .operation_queries
            .push((scope.clone(), operation.to_string()));

        if state.transient_poll_failures > 0 {
            state.transient_poll_failures -= 1;
            return Err(CoreError::Transport("HTTP 503: backend unavailable".to_string()));
        }

        let op = state
            .operations
            .get_mut(operation)
            .filter(|op| &op.scope == scope)
            .ok_or_else(|| {
                CoreError::Validation(format!("operation '{operation}' does not exist"))
            })?;

        let snapshot = if op.script.len() > 1 {
            op.script.pop_front().unwrap_or_default()
        } else {
            op.script.front().cloned().unwrap_or_else(OperationSnapshot::done)
        };

        let finished = snapshot.status.is_done() && snapshot.error.is_none() && !op.applied;
        if finished {
            op.applied = true;
            let request = op.request.clone();
            apply(&mut state, &request);
        }
        Ok(snapshot)
    }

    async fn get_resource(&self, resource: &ResourceRef) -> Result<Value> {
        let mut state = self.state.lock().unwrap();
        let path = resource.path();
        state.resource_reads.push(path.clone());

        if let Some(seq) = state.sequences.get_mut(&path) {
            let doc = if seq.len() > 1 {
                seq.pop_front()
            } else {
                seq.front().cloned()
            };
            if let Some(doc) = doc {
                return Ok(doc);
            }
        }

        state
            .resources
            .get(&path)
            .cloned()
            .ok_or_else(|| CoreError::Lookup {
                resource: resource.clone(),
            })
    }

    async fn list_resources(
        &self,
        project: &str,
        scope: &Scope,
        kind: ResourceKind,
    ) -> Result<Vec<Value>> {
        let prefix = format!(
            "{}/",
            ResourceRef::new(project, scope.clone(), kind, "").collection_path()
        );
        let state = self.state.lock().unwrap();
        let mut items: Vec<(String, Value)> = state
            .resources
            .iter()
            .filter(|(path, _)| path.starts_with(&prefix))
            .map(|(path, doc)| (path.clone(), doc.clone()))
            .collect();
        items.sort_by(|a, b| a.0.cmp(&b.0));
        Ok(items.into_iter().map(|(_, doc)| doc).collect())
    }
}

/// Collects progress events for later inspection
pub fn event_log() -> (
    Arc<Mutex<Vec<ProgressEvent>>>,
    Box<dyn Fn(ProgressEvent) + Send + Sync>,
) {
    let log = Arc::new(Mutex::new(Vec::new()));
    let sink = log.clone();
    (log, Box::new(move |event| sink.lock().unwrap().push(event)))
}
