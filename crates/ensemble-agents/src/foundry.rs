//! HTTP implementation of the agent session contract.
//!
//! Talks to a threads / messages / runs REST API:
//!
//! ```text
//! open_session   POST /threads
//! send_message   POST /threads/{id}/messages          {role, content}
//! start_run      POST /threads/{id}/runs              {assistant_id}
//! poll_run       GET  /threads/{id}/runs/{run_id}
//! list_messages  GET  /threads/{id}/messages?order=asc
//! cancel_run     POST /threads/{id}/runs/{run_id}/cancel
//! ```
//!
//! Every request carries `api-version` and, when configured, a bearer token.
//! There are no retries here; every failure surfaces as a `TransportError`.

use std::time::Duration;

use async_trait::async_trait;
use coordination::errors::TransportError;
use coordination::session::{
    AgentSessionClient, Role, RunHandle, RunState, RunStatus, SessionId, ThreadMessage,
};
use reqwest::{Method, RequestBuilder};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::debug;

use crate::config::AgentConfig;

/// Per-request timeout; run timeouts are enforced by the waiter.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Longest error body kept in a `TransportError`.
const MAX_ERROR_BODY: usize = 512;

// ── Wire types ──────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
struct Created {
    id: String,
}

#[derive(Debug, Deserialize)]
struct RemoteRun {
    status: String,
    #[serde(default)]
    last_error: Option<Value>,
}

#[derive(Debug, Deserialize)]
struct MessagePage {
    #[serde(default)]
    data: Vec<RemoteMessage>,
}

#[derive(Debug, Deserialize)]
struct RemoteMessage {
    role: String,
    #[serde(default)]
    content: Vec<RemoteContent>,
}

#[derive(Debug, Deserialize)]
struct RemoteContent {
    #[serde(default)]
    text: Option<RemoteText>,
}

#[derive(Debug, Deserialize)]
struct RemoteText {
    value: String,
}

// ── Mapping ─────────────────────────────────────────────────────────────────

/// Map a remote run status onto the local lifecycle.
///
/// Unknown statuses count as still running, so the waiter's timeout bounds
/// them.
pub fn map_status(remote: &str) -> RunStatus {
    match remote {
        "queued" | "pending" => RunStatus::Pending,
        "completed" | "succeeded" => RunStatus::Succeeded,
        "failed" | "cancelled" | "expired" => RunStatus::Failed,
        _ => RunStatus::Running,
    }
}

/// Render `last_error`, which is either a string or a `{code, message}` object.
pub fn describe_error(value: &Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(s) => Some(s.clone()),
        Value::Object(map) => {
            let code = map.get("code").and_then(Value::as_str);
            let message = map.get("message").and_then(Value::as_str);
            match (code, message) {
                (Some(code), Some(message)) => Some(format!("{code}: {message}")),
                (None, Some(message)) => Some(message.to_string()),
                (Some(code), None) => Some(code.to_string()),
                (None, None) => Some(value.to_string()),
            }
        }
        other => Some(other.to_string()),
    }
}

fn map_role(role: &str) -> Role {
    match role {
        "assistant" => Role::Assistant,
        "system" => Role::System,
        _ => Role::User,
    }
}

fn into_thread_message(message: RemoteMessage) -> ThreadMessage {
    ThreadMessage {
        role: map_role(&message.role),
        text_segments: message
            .content
            .into_iter()
            .filter_map(|c| c.text.map(|t| t.value))
            .collect(),
    }
}

fn run_state(run: RemoteRun) -> RunState {
    RunState {
        status: map_status(&run.status),
        error: run.last_error.as_ref().and_then(describe_error),
    }
}

fn truncate(body: &str) -> String {
    if body.chars().count() <= MAX_ERROR_BODY {
        body.to_string()
    } else {
        let cut: String = body.chars().take(MAX_ERROR_BODY).collect();
        format!("{cut}...")
    }
}

// ── Client ──────────────────────────────────────────────────────────────────

/// REST client for the remote agent service.
#[derive(Debug, Clone)]
pub struct FoundryClient {
    http: reqwest::Client,
    endpoint: String,
    api_version: String,
    api_key: Option<String>,
}

impl FoundryClient {
    pub fn new(endpoint: impl Into<String>, api_version: impl Into<String>) -> Self {
        let http = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());
        Self {
            http,
            endpoint: endpoint.into().trim_end_matches('/').to_string(),
            api_version: api_version.into(),
            api_key: None,
        }
    }

    pub fn with_api_key(mut self, api_key: Option<String>) -> Self {
        self.api_key = api_key;
        self
    }

    /// Client for the configured endpoint.
    pub fn from_config(config: &AgentConfig) -> Result<Self, coordination::OrchestrationError> {
        let (endpoint, _) = config.remote()?;
        Ok(Self::new(endpoint, config.api_version.clone()).with_api_key(config.api_key.clone()))
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        let builder = self
            .http
            .request(method, format!("{}{}", self.endpoint, path))
            .query(&[("api-version", self.api_version.as_str())]);
        match &self.api_key {
            Some(key) => builder.bearer_auth(key),
            None => builder,
        }
    }

    async fn send<T: DeserializeOwned>(
        &self,
        operation: &'static str,
        builder: RequestBuilder,
    ) -> Result<T, TransportError> {
        let response = builder
            .send()
            .await
            .map_err(|e| TransportError::request(operation, e.to_string()))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| TransportError::request(operation, e.to_string()))?;

        if !status.is_success() {
            return Err(TransportError::Status {
                operation: operation.to_string(),
                status: status.as_u16(),
                body: truncate(&body),
            });
        }

        debug!(operation, status = status.as_u16(), "remote call succeeded");
        serde_json::from_str(&body).map_err(|e| TransportError::decode(operation, e.to_string()))
    }
}

#[async_trait]
impl AgentSessionClient for FoundryClient {
    async fn open_session(&self) -> Result<SessionId, TransportError> {
        let created: Created = self
            .send(
                "open_session",
                self.request(Method::POST, "/threads").json(&json!({})),
            )
            .await?;
        Ok(SessionId::new(created.id))
    }

    async fn send_message(
        &self,
        session: &SessionId,
        role: Role,
        text: &str,
    ) -> Result<(), TransportError> {
        let path = format!("/threads/{session}/messages");
        let _: Value = self
            .send(
                "send_message",
                self.request(Method::POST, &path)
                    .json(&json!({ "role": role.as_str(), "content": text })),
            )
            .await?;
        Ok(())
    }

    async fn start_run(
        &self,
        session: &SessionId,
        agent_id: &str,
    ) -> Result<RunHandle, TransportError> {
        let path = format!("/threads/{session}/runs");
        let created: Created = self
            .send(
                "start_run",
                self.request(Method::POST, &path)
                    .json(&json!({ "assistant_id": agent_id })),
            )
            .await?;
        Ok(RunHandle::new(session.clone(), created.id))
    }

    async fn poll_run(&self, run: &RunHandle) -> Result<RunState, TransportError> {
        let path = format!("/threads/{}/runs/{}", run.session_id, run.run_id);
        let remote: RemoteRun = self
            .send("poll_run", self.request(Method::GET, &path))
            .await?;
        Ok(run_state(remote))
    }

    async fn list_messages(
        &self,
        session: &SessionId,
    ) -> Result<Vec<ThreadMessage>, TransportError> {
        let path = format!("/threads/{session}/messages");
        let page: MessagePage = self
            .send(
                "list_messages",
                self.request(Method::GET, &path).query(&[("order", "asc")]),
            )
            .await?;
        Ok(page.data.into_iter().map(into_thread_message).collect())
    }

    async fn cancel_run(&self, run: &RunHandle) -> Result<(), TransportError> {
        let path = format!("/threads/{}/runs/{}/cancel", run.session_id, run.run_id);
        let _: Value = self
            .send("cancel_run", self.request(Method::POST, &path))
            .await?;
        Ok(())
    }
}
