//! Remote agent session contract.
//!
//! The core never talks to the agent service directly. Everything it needs is
//! expressed by [`AgentSessionClient`]: open a session, append role-tagged
//! messages, start a run, poll it, and list the session's messages in order.
//!
//! ```text
//! open_session ──► send_message(system) ──► send_message(user)
//!                                              │
//!                        start_run ◄───────────┘
//!                            │
//!                  poll_run (RunWaiter loop) ──► list_messages
//! ```
//!
//! Implementations perform no retries; every failure surfaces as a
//! [`TransportError`].

pub mod scripted;
pub mod waiter;

use std::fmt;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::errors::TransportError;

pub use scripted::{ScriptedClient, ScriptedRun};
pub use waiter::{transition, RunWaiter, TimeoutPolicy};

// ── Identifiers ──────────────────────────────────────────────────────────────

/// Opaque identifier of a remote conversation context.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionId(String);

impl SessionId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Handle to one run started on a session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunHandle {
    pub session_id: SessionId,
    pub run_id: String,
}

impl RunHandle {
    pub fn new(session_id: SessionId, run_id: impl Into<String>) -> Self {
        Self {
            session_id,
            run_id: run_id.into(),
        }
    }
}

// ── Messages ─────────────────────────────────────────────────────────────────

/// Author of a message in a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    System,
    User,
    Assistant,
}

impl Role {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::System => "system",
            Self::User => "user",
            Self::Assistant => "assistant",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A collected message: one role and its final text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    pub text: String,
}

impl Message {
    pub fn new(role: Role, text: impl Into<String>) -> Self {
        Self {
            role,
            text: text.into(),
        }
    }
}

/// A message as the service lists it. A message may carry several text
/// segments (streamed or edited output); only the last one is meaningful.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ThreadMessage {
    pub role: Role,
    pub text_segments: Vec<String>,
}

impl ThreadMessage {
    pub fn new(role: Role, text: impl Into<String>) -> Self {
        Self {
            role,
            text_segments: vec![text.into()],
        }
    }

    /// Collapse to the final text segment, or `None` if there is no text.
    pub fn into_message(self) -> Option<Message> {
        let role = self.role;
        self.text_segments
            .into_iter()
            .last()
            .map(|text| Message { role, text })
    }
}

// ── Run state ────────────────────────────────────────────────────────────────

/// Lifecycle of a run. `TimedOut` is only ever imposed locally.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    Pending,
    Running,
    Succeeded,
    Failed,
    TimedOut,
}

impl RunStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Succeeded | Self::Failed | Self::TimedOut)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Running => "running",
            Self::Succeeded => "succeeded",
            Self::Failed => "failed",
            Self::TimedOut => "timed_out",
        }
    }
}

impl fmt::Display for RunStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Observed state of a run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunState {
    pub status: RunStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl RunState {
    pub fn new(status: RunStatus) -> Self {
        Self {
            status,
            error: None,
        }
    }

    pub fn failed(error: impl Into<String>) -> Self {
        Self {
            status: RunStatus::Failed,
            error: Some(error.into()),
        }
    }
}

// ── Contract ─────────────────────────────────────────────────────────────────

/// Abstract interface to the remote conversational agent service.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait AgentSessionClient: Send + Sync {
    /// Create a new conversation context.
    async fn open_session(&self) -> Result<SessionId, TransportError>;

    /// Append a role-tagged message to a session.
    async fn send_message(
        &self,
        session: &SessionId,
        role: Role,
        text: &str,
    ) -> Result<(), TransportError>;

    /// Start the agent on the session's message history.
    async fn start_run(
        &self,
        session: &SessionId,
        agent_id: &str,
    ) -> Result<RunHandle, TransportError>;

    /// Fetch the current state of a run.
    async fn poll_run(&self, run: &RunHandle) -> Result<RunState, TransportError>;

    /// List the session's messages in ascending service order.
    async fn list_messages(
        &self,
        session: &SessionId,
    ) -> Result<Vec<ThreadMessage>, TransportError>;

    /// Ask the service to stop a run. Services without cancellation keep the
    /// default, which does nothing.
    async fn cancel_run(&self, _run: &RunHandle) -> Result<(), TransportError> {
        Ok(())
    }
}
