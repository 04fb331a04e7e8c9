// ABOUTME: Deployment directory backed by the Vertex AI reasoning engine REST API.
// ABOUTME: Lists lazily by page, polls long-running operations, streams queries line by line.

use crate::definition::{AgentDefinition, AgentIdentity, DeployMetadata, RemoteInstance};
use crate::error::{DeployError, Result};
use crate::event::QueryEvent;
use crate::stream::{QuerySink, QueryStream};
use crate::traits::DeploymentDirectory;
use async_trait::async_trait;
use futures::stream::{self, BoxStream, StreamExt};
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, AUTHORIZATION, CONTENT_TYPE};
use reqwest::StatusCode;
use serde::Deserialize;
use serde_json::{json, Value};
use std::collections::HashSet;
use std::time::Duration;

const API_VERSION: &str = "v1";
const UPDATE_MASK: &str = "displayName,description,spec";
const AGENT_FRAMEWORK: &str = "google-adk";
const STREAM_CLASS_METHOD: &str = "async_stream_query";
const IDENTITY_TYPE: &str = "AGENT_IDENTITY";

/// Connection settings for the Vertex AI backend
#[derive(Clone)]
pub struct VertexConfig {
    pub project_id: String,
    pub location: String,
    /// Overrides `https://<location>-aiplatform.googleapis.com`
    pub endpoint: Option<String>,
    pub access_token: Option<String>,
    pub poll_interval: Duration,
    pub page_size: u32,
    pub python_version: String,
}

impl VertexConfig {
    pub fn new(project_id: &str, location: &str) -> Self {
        Self {
            project_id: project_id.to_string(),
            location: location.to_string(),
            endpoint: None,
            access_token: None,
            poll_interval: Duration::from_secs(5),
            page_size: 50,
            python_version: "3.12".to_string(),
        }
    }
}

// Custom Debug impl to redact the token
impl std::fmt::Debug for VertexConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VertexConfig")
            .field("project_id", &self.project_id)
            .field("location", &self.location)
            .field("endpoint", &self.endpoint)
            .field(
                "access_token",
                &self.access_token.as_ref().map(|_| "[REDACTED]"),
            )
            .field("poll_interval", &self.poll_interval)
            .field("page_size", &self.page_size)
            .field("python_version", &self.python_version)
            .finish()
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ReasoningEngine {
    #[serde(default)]
    name: String,
    #[serde(default)]
    display_name: String,
    #[serde(default)]
    spec: Option<EngineSpec>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct EngineSpec {
    #[serde(default)]
    effective_identity: Option<String>,
    #[serde(default)]
    service_account: Option<String>,
}

impl ReasoningEngine {
    /// Principal the engine runs as, preferring the identity the service resolved
    fn service_account(&self) -> Option<&str> {
        let spec = self.spec.as_ref()?;
        spec.effective_identity
            .as_deref()
            .or(spec.service_account.as_deref())
            .filter(|s| !s.is_empty())
    }

    fn into_instance(self) -> RemoteInstance {
        RemoteInstance {
            resource_name: self.name,
            display_name: self.display_name,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ListPage {
    #[serde(default)]
    reasoning_engines: Vec<ReasoningEngine>,
    #[serde(default)]
    next_page_token: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Operation {
    name: String,
    #[serde(default)]
    done: bool,
    #[serde(default)]
    error: Option<OperationStatus>,
    #[serde(default)]
    response: Option<Value>,
}

#[derive(Debug, Deserialize)]
struct OperationStatus {
    #[serde(default)]
    code: i32,
    #[serde(default)]
    message: String,
}

/// google.rpc.Code ALREADY_EXISTS
const ALREADY_EXISTS: i32 = 6;

/// Pagination state for `list`; tokens already followed end the stream if
/// the service hands them out again
#[derive(Default)]
struct ListCursor {
    next: Option<String>,
    seen: HashSet<String>,
}

/// Vertex AI directory backend
pub struct VertexDirectory {
    config: VertexConfig,
    http: reqwest::Client,
}

impl VertexDirectory {
    pub fn new(config: VertexConfig) -> Result<Self> {
        if config.project_id.trim().is_empty() {
            return Err(DeployError::Config("project id is required".to_string()));
        }
        if config.location.trim().is_empty() {
            return Err(DeployError::Config("location is required".to_string()));
        }
        Ok(Self {
            config,
            http: reqwest::Client::new(),
        })
    }

    fn api_root(&self) -> String {
        match &self.config.endpoint {
            Some(endpoint) => endpoint.trim_end_matches('/').to_string(),
            None => format!("https://{}-aiplatform.googleapis.com", self.config.location),
        }
    }

    fn collection_url(&self) -> String {
        format!(
            "{}/{}/projects/{}/locations/{}/reasoningEngines",
            self.api_root(),
            API_VERSION,
            self.config.project_id,
            self.config.location
        )
    }

    fn resource_url(&self, resource_name: &str) -> String {
        format!("{}/{}/{}", self.api_root(), API_VERSION, resource_name)
    }

    fn headers(&self) -> Result<HeaderMap> {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        if let Some(token) = &self.config.access_token {
            let value = HeaderValue::from_str(&format!("Bearer {}", token)).map_err(|e| {
                DeployError::Config(format!("invalid access token header: {}", e))
            })?;
            headers.insert(AUTHORIZATION, value);
        }
        Ok(headers)
    }

    async fn fetch_page(&self, page_token: Option<&str>) -> Result<ListPage> {
        let mut query = vec![("pageSize", self.config.page_size.to_string())];
        if let Some(token) = page_token {
            query.push(("pageToken", token.to_string()));
        }

        tracing::debug!(url = %self.collection_url(), page_token = ?page_token, "Listing reasoning engines");

        let resp = self
            .http
            .get(self.collection_url())
            .headers(self.headers()?)
            .query(&query)
            .send()
            .await
            .map_err(|e| DeployError::ServiceUnavailable(e.to_string()))?;

        if !resp.status().is_success() {
            return Err(DeployError::ServiceUnavailable(error_text(resp).await));
        }

        resp.json::<ListPage>()
            .await
            .map_err(|e| DeployError::ServiceUnavailable(format!("invalid list response: {}", e)))
    }

    async fn fetch_engine(&self, resource_name: &str) -> Result<ReasoningEngine> {
        let resp = self
            .http
            .get(self.resource_url(resource_name))
            .headers(self.headers()?)
            .send()
            .await
            .map_err(|e| DeployError::ServiceUnavailable(e.to_string()))?;

        if resp.status() == StatusCode::NOT_FOUND {
            return Err(DeployError::instance_not_found(resource_name));
        }
        if !resp.status().is_success() {
            return Err(DeployError::ServiceUnavailable(error_text(resp).await));
        }

        resp.json()
            .await
            .map_err(|e| DeployError::ServiceUnavailable(format!("invalid engine response: {}", e)))
    }

    /// Poll a long-running operation until it reports done
    async fn wait_operation(
        &self,
        operation_kind: &str,
        display_name: &str,
        mut op: Operation,
    ) -> Result<Option<Value>> {
        let mut polls = 0u32;
        while !op.done {
            polls += 1;
            tracing::debug!(operation = %op.name, polls, "Waiting for operation");
            tokio::time::sleep(self.config.poll_interval).await;

            let resp = self
                .http
                .get(self.resource_url(&op.name))
                .headers(self.headers()?)
                .send()
                .await
                .map_err(|e| DeployError::deployment(operation_kind, e))?;
            if !resp.status().is_success() {
                return Err(DeployError::deployment(operation_kind, error_text(resp).await));
            }
            op = resp
                .json::<Operation>()
                .await
                .map_err(|e| DeployError::deployment(operation_kind, e))?;
        }

        if let Some(status) = op.error {
            if status.code == ALREADY_EXISTS {
                return Err(DeployError::Conflict {
                    display_name: display_name.to_string(),
                });
            }
            return Err(DeployError::deployment(
                operation_kind,
                format!("{} (code {})", status.message, status.code),
            ));
        }

        Ok(op.response)
    }
}

/// Request body shared by create and update
fn engine_body(
    definition: &AgentDefinition,
    metadata: &DeployMetadata,
    python_version: &str,
) -> Value {
    let staging = format!(
        "{}/{}",
        metadata.staging_location.trim_end_matches('/'),
        metadata.display_name
    );
    json!({
        "displayName": metadata.display_name,
        "description": metadata.description,
        "spec": {
            "agentFramework": AGENT_FRAMEWORK,
            "packageSpec": {
                "pythonVersion": python_version,
                "pickleObjectGcsUri": format!("{}/agent_engine.pkl", staging),
                "requirementsGcsUri": format!("{}/requirements.txt", staging),
                "dependencyFilesGcsUri": format!("{}/dependencies.tar.gz", staging),
            },
            "deploymentSpec": {
                "env": [
                    {"name": "AGENT_NAME", "value": definition.name()},
                    {"name": "AGENT_MODEL", "value": definition.model_id()},
                    {"name": "AGENT_INSTRUCTION", "value": definition.instruction()},
                    {"name": "AGENT_REQUIREMENTS", "value": metadata.requirements.join(",")},
                ]
            }
        }
    })
}

/// Resource name of the engine an operation belongs to
fn engine_from_operation(operation_name: &str) -> Option<&str> {
    operation_name
        .split_once("/operations/")
        .map(|(engine, _)| engine)
}

async fn error_text(resp: reqwest::Response) -> String {
    let status = resp.status();
    let body = resp.text().await.unwrap_or_default();
    format!("HTTP {}: {}", status, body.trim())
}

fn is_conflict(status: StatusCode, body: &str) -> bool {
    status == StatusCode::CONFLICT || body.contains("ALREADY_EXISTS")
}

/// Parse one line of a streamQuery response into an event.
///
/// Lines may be bare JSON or SSE `data:` lines. Blank lines, SSE comments and
/// other SSE fields carry no event.
pub(crate) fn parse_stream_line(line: &str) -> Option<QueryEvent> {
    let line = line.trim();
    if line.is_empty() || line.starts_with(':') {
        return None;
    }
    let data = match line.strip_prefix("data:") {
        Some(rest) => rest.trim(),
        None if line.starts_with("event:") || line.starts_with("id:") => return None,
        None => line,
    };
    if data.is_empty() {
        return None;
    }
    match serde_json::from_str::<Value>(data) {
        Ok(value) => Some(QueryEvent::new(value)),
        Err(e) => {
            tracing::debug!(error = %e, line = %data, "Skipping unparseable stream line");
            None
        }
    }
}

/// Read the response body line by line, forwarding events until the body ends,
/// the transport fails, or the consumer closes the stream.
async fn pump_stream(resp: reqwest::Response, sink: QuerySink) {
    let mut body = resp.bytes_stream();
    let mut buffer: Vec<u8> = Vec::new();
    let mut forwarded = 0usize;

    while let Some(chunk) = body.next().await {
        let chunk = match chunk {
            Ok(chunk) => chunk,
            Err(e) => {
                tracing::warn!(error = %e, forwarded, "Query stream broke");
                sink.fail(DeployError::Stream(format!("stream read error: {}", e)))
                    .await;
                return;
            }
        };
        buffer.extend_from_slice(&chunk);

        while let Some(pos) = buffer.iter().position(|b| *b == b'\n') {
            let line: Vec<u8> = buffer.drain(..=pos).collect();
            let line = String::from_utf8_lossy(&line);
            if let Some(event) = parse_stream_line(&line) {
                if !sink.send(event).await {
                    tracing::debug!(forwarded, "Consumer closed query stream");
                    return;
                }
                forwarded += 1;
            }
        }
    }

    if !buffer.is_empty() {
        let line = String::from_utf8_lossy(&buffer);
        if let Some(event) = parse_stream_line(&line) {
            if sink.send(event).await {
                forwarded += 1;
            }
        }
    }
    tracing::debug!(forwarded, "Query stream closed by remote");
}

#[async_trait]
impl DeploymentDirectory for VertexDirectory {
    fn name(&self) -> &'static str {
        "vertex"
    }

    fn list(&self) -> BoxStream<'_, Result<RemoteInstance>> {
        // None = done
        stream::unfold(Some(ListCursor::default()), move |cursor| async move {
            let mut cursor = cursor?;
            let page_token = cursor.next.take();
            match self.fetch_page(page_token.as_deref()).await {
                Ok(page) => {
                    let mut items: Vec<Result<RemoteInstance>> = page
                        .reasoning_engines
                        .into_iter()
                        .map(|e| Ok(e.into_instance()))
                        .collect();
                    let next = match page.next_page_token.filter(|t| !t.is_empty()) {
                        Some(token) if cursor.seen.contains(&token) => {
                            tracing::warn!(page_token = %token, "List pagination revisited a page token");
                            items.push(Err(DeployError::ServiceUnavailable(format!(
                                "list pagination repeated page token {}",
                                token
                            ))));
                            None
                        }
                        Some(token) => {
                            cursor.seen.insert(token.clone());
                            cursor.next = Some(token);
                            Some(cursor)
                        }
                        None => None,
                    };
                    Some((stream::iter(items), next))
                }
                Err(e) => Some((stream::iter(vec![Err(e)]), None)),
            }
        })
        .flatten()
        .boxed()
    }

    async fn create(
        &self,
        definition: &AgentDefinition,
        metadata: &DeployMetadata,
    ) -> Result<RemoteInstance> {
        let body = engine_body(definition, metadata, &self.config.python_version);
        tracing::info!(display_name = %metadata.display_name, "Creating reasoning engine");

        let resp = self
            .http
            .post(self.collection_url())
            .headers(self.headers()?)
            .json(&body)
            .send()
            .await
            .map_err(|e| DeployError::deployment("create", e))?;

        let status = resp.status();
        if !status.is_success() {
            let text = error_text(resp).await;
            if is_conflict(status, &text) {
                return Err(DeployError::Conflict {
                    display_name: metadata.display_name.clone(),
                });
            }
            return Err(DeployError::deployment("create", text));
        }

        let op: Operation = resp
            .json()
            .await
            .map_err(|e| DeployError::deployment("create", e))?;
        let operation_name = op.name.clone();
        let response = self
            .wait_operation("create", &metadata.display_name, op)
            .await?;

        let engine = response
            .and_then(|v| serde_json::from_value::<ReasoningEngine>(v).ok())
            .filter(|e| !e.name.is_empty());
        match engine {
            Some(engine) => Ok(engine.into_instance()),
            None => {
                let resource_name = engine_from_operation(&operation_name).ok_or_else(|| {
                    DeployError::deployment(
                        "create",
                        format!("operation {} returned no engine", operation_name),
                    )
                })?;
                Ok(RemoteInstance {
                    resource_name: resource_name.to_string(),
                    display_name: metadata.display_name.clone(),
                })
            }
        }
    }

    async fn update(
        &self,
        resource_name: &str,
        definition: &AgentDefinition,
        metadata: &DeployMetadata,
    ) -> Result<RemoteInstance> {
        let body = engine_body(definition, metadata, &self.config.python_version);
        tracing::info!(
            resource_name = %resource_name,
            display_name = %metadata.display_name,
            "Updating reasoning engine"
        );

        let resp = self
            .http
            .patch(self.resource_url(resource_name))
            .headers(self.headers()?)
            .query(&[("updateMask", UPDATE_MASK)])
            .json(&body)
            .send()
            .await
            .map_err(|e| DeployError::deployment("update", e))?;

        let status = resp.status();
        if status == StatusCode::NOT_FOUND {
            return Err(DeployError::instance_not_found(resource_name));
        }
        if !status.is_success() {
            return Err(DeployError::deployment("update", error_text(resp).await));
        }

        let op: Operation = resp
            .json()
            .await
            .map_err(|e| DeployError::deployment("update", e))?;
        let response = self
            .wait_operation("update", &metadata.display_name, op)
            .await?;

        let display_name = response
            .and_then(|v| serde_json::from_value::<ReasoningEngine>(v).ok())
            .map(|e| e.display_name)
            .filter(|d| !d.is_empty())
            .unwrap_or_else(|| metadata.display_name.clone());

        Ok(RemoteInstance {
            resource_name: resource_name.to_string(),
            display_name,
        })
    }

    async fn create_identity(&self) -> Result<AgentIdentity> {
        let body = json!({"spec": {"identityType": IDENTITY_TYPE}});
        tracing::info!(
            project_id = %self.config.project_id,
            location = %self.config.location,
            "Creating reasoning engine with agent identity"
        );

        let resp = self
            .http
            .post(self.collection_url())
            .headers(self.headers()?)
            .json(&body)
            .send()
            .await
            .map_err(|e| DeployError::deployment("create_identity", e))?;
        if !resp.status().is_success() {
            return Err(DeployError::deployment(
                "create_identity",
                error_text(resp).await,
            ));
        }

        let op: Operation = resp
            .json()
            .await
            .map_err(|e| DeployError::deployment("create_identity", e))?;
        let operation_name = op.name.clone();
        let response = self.wait_operation("create_identity", "", op).await?;

        let engine = response
            .and_then(|v| serde_json::from_value::<ReasoningEngine>(v).ok())
            .filter(|e| !e.name.is_empty());
        // The operation response may omit the resolved identity; the engine has it
        let engine = match engine {
            Some(engine) if engine.service_account().is_some() => engine,
            Some(engine) => self.fetch_engine(&engine.name).await?,
            None => {
                let resource_name = engine_from_operation(&operation_name).ok_or_else(|| {
                    DeployError::deployment(
                        "create_identity",
                        format!("operation {} returned no engine", operation_name),
                    )
                })?;
                self.fetch_engine(resource_name).await?
            }
        };

        let service_account = engine
            .service_account()
            .ok_or_else(|| {
                DeployError::deployment(
                    "create_identity",
                    format!("engine {} reported no identity", engine.name),
                )
            })?
            .to_string();
        tracing::info!(resource_name = %engine.name, service_account = %service_account, "Agent identity created");
        Ok(AgentIdentity {
            resource_name: engine.name,
            service_account,
        })
    }

    async fn get(&self, resource_name: &str) -> Result<RemoteInstance> {
        Ok(self.fetch_engine(resource_name).await?.into_instance())
    }

    async fn stream_query(
        &self,
        instance: &RemoteInstance,
        user_id: &str,
        message: &str,
    ) -> Result<QueryStream> {
        let url = format!("{}:streamQuery", self.resource_url(&instance.resource_name));
        let body = json!({
            "classMethod": STREAM_CLASS_METHOD,
            "input": {
                "user_id": user_id,
                "message": message,
            }
        });

        let mut headers = self.headers()?;
        headers.insert(ACCEPT, HeaderValue::from_static("text/event-stream"));

        tracing::debug!(url = %url, user_id = %user_id, "Opening query stream");

        let resp = self
            .http
            .post(&url)
            .headers(headers)
            .query(&[("alt", "sse")])
            .json(&body)
            .send()
            .await
            .map_err(|e| DeployError::Stream(e.to_string()))?;

        if resp.status() == StatusCode::NOT_FOUND {
            return Err(DeployError::instance_not_found(&instance.resource_name));
        }
        if !resp.status().is_success() {
            return Err(DeployError::Stream(error_text(resp).await));
        }

        let (sink, stream) = QueryStream::channel();
        tokio::spawn(pump_stream(resp, sink));
        Ok(stream)
    }
}
