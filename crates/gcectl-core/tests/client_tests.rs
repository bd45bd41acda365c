//! HTTP client behaviour against a mock Compute API

use gcectl_core::{
    ComputeApi, ComputeClient, CoreError, MutationRequest, MutationVerb, OperationStatus,
    Orchestrator, ResourceKind, ResourceRef, RetryPolicy, Scope,
};
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use wiremock::matchers::{body_json, header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

const PROJECT: &str = "p";
const ZONE: &str = "europe-west1-d";

fn client(server: &MockServer) -> ComputeClient {
    ComputeClient::builder()
        .endpoint(server.uri())
        .access_token("test-token")
        .build()
        .unwrap()
}

fn zonal_operation(name: &str, status: &str) -> serde_json::Value {
    json!({
        "kind": "compute#operation",
        "name": name,
        "id": "123",
        "zone": format!("https://www.googleapis.com/compute/v1/projects/{PROJECT}/zones/{ZONE}"),
        "status": status,
        "targetLink": format!("https://www.googleapis.com/compute/v1/projects/{PROJECT}/zones/{ZONE}/disks/d1"),
    })
}

#[tokio::test]
async fn test_insert_posts_to_collection_with_bearer_token() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(format!("/projects/{PROJECT}/zones/{ZONE}/disks")))
        .and(header("authorization", "Bearer test-token"))
        .and(body_json(json!({"name": "d1", "sizeGb": "10"})))
        .respond_with(ResponseTemplate::new(200).set_body_json(zonal_operation("op-1", "PENDING")))
        .expect(1)
        .mount(&server)
        .await;

    let target = ResourceRef::zonal(PROJECT, ZONE, ResourceKind::Disk, "d1");
    let handle = client(&server)
        .submit_mutation(&MutationRequest::insert(
            target,
            json!({"name": "d1", "sizeGb": "10"}),
        ))
        .await
        .unwrap();

    assert_eq!(handle.name, "op-1");
    assert_eq!(handle.scope, Scope::zone(ZONE));
    assert_eq!(handle.status, OperationStatus::Pending);
}

#[tokio::test]
async fn test_resize_passes_size_as_query() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(format!(
            "/projects/{PROJECT}/zones/{ZONE}/instanceGroupManagers/web/resize"
        )))
        .and(query_param("size", "4"))
        .respond_with(ResponseTemplate::new(200).set_body_json(zonal_operation("op-2", "RUNNING")))
        .expect(1)
        .mount(&server)
        .await;

    let target = ResourceRef::zonal(PROJECT, ZONE, ResourceKind::InstanceGroupManager, "web");
    let request = MutationRequest::new(target, MutationVerb::Resize { size: 4 }, json!(null));
    let handle = client(&server).submit_mutation(&request).await.unwrap();
    assert_eq!(handle.status, OperationStatus::Running);
}

#[tokio::test]
async fn test_global_operation_is_polled_at_global_endpoint() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(format!("/projects/{PROJECT}/global/operations/op-3")))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "name": "op-3",
            "status": "DONE",
            "progress": 100,
            "targetLink": format!("https://www.googleapis.com/compute/v1/projects/{PROJECT}/global/images/img"),
        })))
        .expect(1)
        .mount(&server)
        .await;

    let snapshot = client(&server)
        .get_operation(PROJECT, &Scope::Global, "op-3")
        .await
        .unwrap();
    assert_eq!(snapshot.status, OperationStatus::Done);
    assert!(snapshot.error.is_none());
}

#[tokio::test]
async fn test_operation_error_payload_is_parsed() {
    let server = MockServer::start().await;
    let mut doc = zonal_operation("op-4", "DONE");
    doc["error"] = json!({
        "errors": [{
            "code": "RESOURCE_ALREADY_EXISTS",
            "message": "The resource 'projects/p/zones/europe-west1-d/disks/d1' already exists"
        }]
    });
    Mock::given(method("GET"))
        .and(path(format!("/projects/{PROJECT}/zones/{ZONE}/operations/op-4")))
        .respond_with(ResponseTemplate::new(200).set_body_json(doc))
        .mount(&server)
        .await;

    let snapshot = client(&server)
        .get_operation(PROJECT, &Scope::zone(ZONE), "op-4")
        .await
        .unwrap();
    let error = snapshot.error.unwrap();
    assert_eq!(error.first_code(), Some("RESOURCE_ALREADY_EXISTS"));
}

#[tokio::test]
async fn test_missing_resource_maps_to_lookup() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(format!("/projects/{PROJECT}/global/snapshots/gone")))
        .respond_with(ResponseTemplate::new(404).set_body_json(json!({
            "error": {"code": 404, "message": "The resource 'gone' was not found"}
        })))
        .mount(&server)
        .await;

    let resource = ResourceRef::global(PROJECT, ResourceKind::Snapshot, "gone");
    let err = client(&server).get_resource(&resource).await.unwrap_err();
    assert!(err.is_not_found());
}

#[tokio::test]
async fn test_rejected_mutation_keeps_message() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(format!("/projects/{PROJECT}/global/images")))
        .respond_with(ResponseTemplate::new(400).set_body_json(json!({
            "error": {"code": 400, "message": "Invalid value for field 'resource.name'"}
        })))
        .mount(&server)
        .await;

    let target = ResourceRef::global(PROJECT, ResourceKind::Image, "BAD");
    let err = client(&server)
        .submit_mutation(&MutationRequest::insert(target, json!({"name": "BAD"})))
        .await
        .unwrap_err();

    match err {
        CoreError::Submission { message, status } => {
            assert_eq!(status, Some(400));
            assert!(message.contains("resource.name"));
        }
        other => panic!("unexpected error: {other:?}"),
    }
}

#[tokio::test]
async fn test_unauthorized_and_server_errors() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(format!("/projects/{PROJECT}/zones/{ZONE}/disks/locked")))
        .respond_with(ResponseTemplate::new(401))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path(format!("/projects/{PROJECT}/zones/{ZONE}/disks/flaky")))
        .respond_with(ResponseTemplate::new(503))
        .mount(&server)
        .await;

    let api = client(&server);
    let locked = ResourceRef::zonal(PROJECT, ZONE, ResourceKind::Disk, "locked");
    assert!(api.get_resource(&locked).await.unwrap_err().is_unauthorized());

    let flaky = ResourceRef::zonal(PROJECT, ZONE, ResourceKind::Disk, "flaky");
    assert!(api.get_resource(&flaky).await.unwrap_err().is_retryable());
}

#[tokio::test]
async fn test_orchestrator_retries_server_errors() {
    let server = MockServer::start().await;
    let disk_path = format!("/projects/{PROJECT}/zones/{ZONE}/disks/d1");
    Mock::given(method("GET"))
        .and(path(disk_path.clone()))
        .respond_with(ResponseTemplate::new(503))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path(disk_path))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"name": "d1"})))
        .mount(&server)
        .await;

    let orchestrator = Orchestrator::new(Arc::new(client(&server))).with_retry(RetryPolicy {
        initial_backoff: Duration::from_millis(1),
        ..RetryPolicy::default()
    });
    let doc = orchestrator
        .get_resource(&ResourceRef::zonal(PROJECT, ZONE, ResourceKind::Disk, "d1"))
        .await
        .unwrap();
    assert_eq!(doc["name"], "d1");
}

#[tokio::test]
async fn test_submit_is_not_replayed_after_a_lost_response() {
    let server = MockServer::start().await;
    let collection = format!("/projects/{PROJECT}/zones/{ZONE}/disks");
    Mock::given(method("POST"))
        .and(path(collection.clone()))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(zonal_operation("op-1", "PENDING"))
                .set_delay(Duration::from_millis(400)),
        )
        .up_to_n_times(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path(collection))
        .respond_with(ResponseTemplate::new(409).set_body_json(json!({
            "error": {"code": 409, "message": "The resource 'd1' already exists"}
        })))
        .mount(&server)
        .await;

    let impatient = ComputeClient::builder()
        .endpoint(server.uri())
        .access_token("test-token")
        .request_timeout(Duration::from_millis(100))
        .build()
        .unwrap();
    let orchestrator = Orchestrator::new(Arc::new(impatient)).with_retry(RetryPolicy {
        initial_backoff: Duration::from_millis(1),
        ..RetryPolicy::default()
    });

    let target = ResourceRef::zonal(PROJECT, ZONE, ResourceKind::Disk, "d1");
    let err = orchestrator
        .submit(&MutationRequest::insert(target, json!({"name": "d1"})))
        .await
        .unwrap_err();

    assert!(matches!(err, CoreError::Transport(_)), "got: {err:?}");
    let posts = server
        .received_requests()
        .await
        .unwrap()
        .iter()
        .filter(|r| r.method.as_str() == "POST")
        .count();
    assert_eq!(posts, 1);
}

#[tokio::test]
async fn test_list_follows_page_tokens() {
    let server = MockServer::start().await;
    let collection = format!("/projects/{PROJECT}/zones/{ZONE}/instances");
    Mock::given(method("GET"))
        .and(path(collection.clone()))
        .and(query_param("pageToken", "next"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "items": [{"name": "vm-3"}]
        })))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path(collection))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "items": [{"name": "vm-1"}, {"name": "vm-2"}],
            "nextPageToken": "next"
        })))
        .mount(&server)
        .await;

    let items = client(&server)
        .list_resources(PROJECT, &Scope::zone(ZONE), ResourceKind::Instance)
        .await
        .unwrap();
    let names: Vec<&str> = items.iter().filter_map(|i| i["name"].as_str()).collect();
    assert_eq!(names, vec!["vm-1", "vm-2", "vm-3"]);
}
