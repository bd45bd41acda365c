//! HTTP implementation of [`ComputeApi`] over the Compute Engine v1 REST surface
//!
//! Requests are authenticated with a caller-supplied bearer token; obtaining
//! that token is left to the caller.

use async_trait::async_trait;
use reqwest::{Method, StatusCode};
use serde::Deserialize;
use serde_json::Value;
use std::fmt;
use std::time::Duration;
use tracing::{debug, trace};
use url::Url;

use crate::api::{ComputeApi, MutationRequest, MutationVerb};
use crate::error::{CoreError, Result};
use crate::operation::{OperationDocument, OperationHandle, OperationSnapshot};
use crate::resource::{ResourceKind, ResourceRef, Scope};

/// Public Compute Engine v1 endpoint
pub const DEFAULT_ENDPOINT: &str = "https://compute.googleapis.com/compute/v1";

/// User agent string for gcectl HTTP requests
const USER_AGENT: &str = concat!("gcectl/", env!("CARGO_PKG_VERSION"));

/// Per-request timeout unless overridden
const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// What a request was for, so failures map to the right error
enum Call<'a> {
    Read(&'a ResourceRef),
    List,
    Mutation,
    Operation(&'a str),
}

/// Error envelope used by Google APIs
#[derive(Debug, Deserialize)]
struct ErrorEnvelope {
    error: ErrorBody,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    #[serde(default)]
    message: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ListPage {
    #[serde(default)]
    items: Vec<Value>,
    #[serde(default)]
    next_page_token: Option<String>,
}

/// Compute API client
#[derive(Clone)]
pub struct ComputeClient {
    http: reqwest::Client,
    endpoint: String,
    access_token: Option<String>,
}

impl fmt::Debug for ComputeClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ComputeClient")
            .field("endpoint", &self.endpoint)
            .field(
                "access_token",
                &self.access_token.as_ref().map(|_| "<redacted>"),
            )
            .finish()
    }
}

/// Builder for [`ComputeClient`]
#[derive(Debug, Default)]
pub struct ComputeClientBuilder {
    endpoint: Option<String>,
    access_token: Option<String>,
    request_timeout: Option<Duration>,
}

impl ComputeClientBuilder {
    pub fn endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = Some(endpoint.into());
        self
    }

    pub fn access_token(mut self, token: impl Into<String>) -> Self {
        self.access_token = Some(token.into());
        self
    }

    pub fn request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = Some(timeout);
        self
    }

    pub fn build(self) -> Result<ComputeClient> {
        let endpoint = self
            .endpoint
            .unwrap_or_else(|| DEFAULT_ENDPOINT.to_string())
            .trim_end_matches('/')
            .to_string();
        Url::parse(&endpoint)
            .map_err(|e| CoreError::Config(format!("invalid API endpoint '{endpoint}': {e}")))?;

        let http = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(self.request_timeout.unwrap_or(DEFAULT_REQUEST_TIMEOUT))
            .build()?;

        Ok(ComputeClient {
            http,
            endpoint,
            access_token: self.access_token,
        })
    }
}

impl ComputeClient {
    pub fn builder() -> ComputeClientBuilder {
        ComputeClientBuilder::default()
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    fn url(&self, path: &str) -> Result<Url> {
        let raw = format!("{}/{}", self.endpoint, path);
        Url::parse(&raw).map_err(|e| CoreError::Validation(format!("invalid URL '{raw}': {e}")))
    }

    fn mutation_target(&self, request: &MutationRequest) -> Result<(Method, Url)> {
        let target = &request.target;
        let (method, mut url) = match request.verb {
            MutationVerb::Insert => (Method::POST, self.url(&target.collection_path())?),
            MutationVerb::Delete => (Method::DELETE, self.url(&target.path())?),
            verb => {
                let method_name = verb.custom_method().unwrap_or_default();
                let path = format!("{}/{}", target.path(), method_name);
                (Method::POST, self.url(&path)?)
            }
        };
        if let MutationVerb::Resize { size } = request.verb {
            url.query_pairs_mut().append_pair("size", &size.to_string());
        }
        Ok((method, url))
    }

    async fn execute(
        &self,
        method: Method,
        url: Url,
        body: Option<&Value>,
        call: Call<'_>,
    ) -> Result<Value> {
        trace!("{} {}", method, url);
        let mut builder = self.http.request(method.clone(), url.clone());
        if let Some(token) = &self.access_token {
            builder = builder.bearer_auth(token);
        }
        if let Some(body) = body {
            builder = builder.json(body);
        }

        let response = builder.send().await?;
        let status = response.status();
        let text = response.text().await?;
        debug!("{} {} -> {}", method, url.path(), status);

        if status.is_success() {
            if text.trim().is_empty() {
                return Ok(Value::Null);
            }
            return Ok(serde_json::from_str(&text)?);
        }

        Err(map_error_status(status, &text, call))
    }
}

/// Translate a non-2xx response into the orchestration error taxonomy
fn map_error_status(status: StatusCode, body: &str, call: Call<'_>) -> CoreError {
    let message = serde_json::from_str::<ErrorEnvelope>(body)
        .map(|e| e.error.message)
        .ok()
        .filter(|m| !m.is_empty())
        .unwrap_or_else(|| {
            status
                .canonical_reason()
                .unwrap_or("unexpected status")
                .to_string()
        });

    if status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error() {
        return CoreError::Transport(format!("HTTP {}: {}", status.as_u16(), message));
    }
    if status == StatusCode::UNAUTHORIZED {
        return CoreError::Unauthorized(message);
    }

    match call {
        Call::Mutation => CoreError::Submission {
            message,
            status: Some(status.as_u16()),
        },
        Call::Read(resource) if status == StatusCode::NOT_FOUND => CoreError::Lookup {
            resource: resource.clone(),
        },
        Call::Operation(name) if status == StatusCode::NOT_FOUND => {
            CoreError::Validation(format!("operation '{name}' does not exist"))
        }
        _ if status == StatusCode::FORBIDDEN => CoreError::Unauthorized(message),
        _ => CoreError::Validation(format!("HTTP {}: {}", status.as_u16(), message)),
    }
}

#[async_trait]
impl ComputeApi for ComputeClient {
    async fn submit_mutation(&self, request: &MutationRequest) -> Result<OperationHandle> {
        let (method, url) = self.mutation_target(request)?;
        let body = (!request.body.is_null()).then_some(&request.body);
        let value = self.execute(method, url, body, Call::Mutation).await?;
        let doc: OperationDocument = serde_json::from_value(value)?;
        OperationHandle::from_document(request.target.project(), doc)
    }

    async fn get_operation(
        &self,
        project: &str,
        scope: &Scope,
        operation: &str,
    ) -> Result<OperationSnapshot> {
        let path = format!(
            "projects/{}/{}/operations/{}",
            project,
            scope.path_segment(),
            operation
        );
        let url = self.url(&path)?;
        let value = self
            .execute(Method::GET, url, None, Call::Operation(operation))
            .await?;
        let doc: OperationDocument = serde_json::from_value(value)?;
        Ok(doc.into())
    }

    async fn get_resource(&self, resource: &ResourceRef) -> Result<Value> {
        let url = self.url(&resource.path())?;
        self.execute(Method::GET, url, None, Call::Read(resource))
            .await
    }

    async fn list_resources(
        &self,
        project: &str,
        scope: &Scope,
        kind: ResourceKind,
    ) -> Result<Vec<Value>> {
        let collection = ResourceRef::new(project, scope.clone(), kind, "").collection_path();
        let mut items = Vec::new();
        let mut page_token: Option<String> = None;

        loop {
            let mut url = self.url(&collection)?;
            if let Some(token) = &page_token {
                url.query_pairs_mut().append_pair("pageToken", token);
            }
            let value = self.execute(Method::GET, url, None, Call::List).await?;
            let page: ListPage = serde_json::from_value(value)?;
            items.extend(page.items);

            match page.next_page_token {
                Some(token) if !token.is_empty() => page_token = Some(token),
                _ => break,
            }
        }

        Ok(items)
    }
}
