//! In-process scripted agent service.
//!
//! `ScriptedClient` implements [`AgentSessionClient`] without any network
//! access. Each session gets a [`ScriptedRun`] describing how its run behaves:
//! the statuses reported before it finishes, whether it replies, fails, or
//! never finishes, and which remote call (if any) should fail with a
//! transport error.
//!
//! Scripts are matched to sessions in two ways:
//! - by the system instruction the session receives (`with_run_for`), which
//!   is stable under concurrent fan-out;
//! - otherwise in the order scripts were queued (`with_run`), falling back to
//!   the optional default script.
//!
//! Used by the `--dry-run` entry points and by tests.

use std::collections::{HashMap, VecDeque};
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;

use super::{
    AgentSessionClient, Message, Role, RunHandle, RunState, RunStatus, SessionId, ThreadMessage,
};
use crate::errors::TransportError;

/// Reply used by dry runs.
pub const SIMULATED_REPLY: &str = "<simulated reply>";

/// Remote operation a script can make fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScriptedOperation {
    OpenSession,
    SendMessage,
    StartRun,
    PollRun,
    ListMessages,
}

impl ScriptedOperation {
    fn name(self) -> &'static str {
        match self {
            Self::OpenSession => "open_session",
            Self::SendMessage => "send_message",
            Self::StartRun => "start_run",
            Self::PollRun => "poll_run",
            Self::ListMessages => "list_messages",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Outcome {
    Reply(Vec<String>),
    Fail(String),
    Stuck,
}

/// How one scripted run behaves.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScriptedRun {
    progress: Vec<RunStatus>,
    outcome: Outcome,
    transport_failure: Option<ScriptedOperation>,
}

impl ScriptedRun {
    /// Succeeds immediately with a single assistant reply.
    pub fn reply(text: impl Into<String>) -> Self {
        Self::reply_segments(vec![text.into()])
    }

    /// Succeeds with one assistant message carrying several text segments.
    pub fn reply_segments(segments: Vec<String>) -> Self {
        Self {
            progress: Vec::new(),
            outcome: Outcome::Reply(segments),
            transport_failure: None,
        }
    }

    /// Finishes with `failed` and the given error detail.
    pub fn failure(error: impl Into<String>) -> Self {
        Self {
            progress: Vec::new(),
            outcome: Outcome::Fail(error.into()),
            transport_failure: None,
        }
    }

    /// Reports `running` forever.
    pub fn stuck() -> Self {
        Self {
            progress: Vec::new(),
            outcome: Outcome::Stuck,
            transport_failure: None,
        }
    }

    /// Non-terminal statuses reported by successive polls before the outcome.
    pub fn with_progress(mut self, progress: Vec<RunStatus>) -> Self {
        self.progress = progress;
        self
    }

    /// Make the given remote call fail for this session.
    pub fn with_transport_failure(mut self, operation: ScriptedOperation) -> Self {
        self.transport_failure = Some(operation);
        self
    }

    fn fails_on(&self, operation: ScriptedOperation) -> bool {
        self.transport_failure == Some(operation)
    }
}

#[derive(Debug, Default)]
struct SessionState {
    messages: Vec<ThreadMessage>,
    script: Option<ScriptedRun>,
}

#[derive(Debug)]
struct RunProgress {
    remaining: VecDeque<RunStatus>,
    polls: usize,
    finished: bool,
}

#[derive(Debug, Default)]
struct Inner {
    session_prefix: String,
    next_session: usize,
    next_run: usize,
    queued: VecDeque<ScriptedRun>,
    keyed: HashMap<String, ScriptedRun>,
    fallback: Option<ScriptedRun>,
    sessions: HashMap<SessionId, SessionState>,
    runs: HashMap<String, RunProgress>,
    cancelled: Vec<RunHandle>,
    active: usize,
    peak_active: usize,
}

impl Inner {
    /// Resolve (and pin) the script for a session.
    fn script_for(&mut self, session: &SessionId) -> Result<ScriptedRun, TransportError> {
        let state = self
            .sessions
            .get(session)
            .ok_or_else(|| {
                TransportError::request("scripted", format!("unknown session {session}"))
            })?;
        if let Some(script) = &state.script {
            return Ok(script.clone());
        }

        let script = self
            .queued
            .pop_front()
            .or_else(|| self.fallback.clone())
            .ok_or_else(|| {
                TransportError::request("scripted", format!("no scripted run for {session}"))
            })?;
        if let Some(state) = self.sessions.get_mut(session) {
            state.script = Some(script.clone());
        }
        Ok(script)
    }

    fn finish(&mut self, run_id: &str) {
        if let Some(progress) = self.runs.get_mut(run_id) {
            if !progress.finished {
                progress.finished = true;
                self.active = self.active.saturating_sub(1);
            }
        }
    }

    fn fail(&mut self, operation: ScriptedOperation, session: &SessionId) -> TransportError {
        self.active = self.active.saturating_sub(1);
        TransportError::request(operation.name(), format!("scripted failure for {session}"))
    }
}

/// Deterministic, network-free agent service.
#[derive(Debug)]
pub struct ScriptedClient {
    inner: Mutex<Inner>,
}

impl Default for ScriptedClient {
    fn default() -> Self {
        Self::new()
    }
}

impl ScriptedClient {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(Inner {
                session_prefix: "thread".to_string(),
                ..Inner::default()
            }),
        }
    }

    /// Client used by `--dry-run`: every run answers with [`SIMULATED_REPLY`]
    /// and sessions are named `dry-thread-1`, `dry-thread-2`, ...
    pub fn dry_run() -> Self {
        Self::new()
            .with_session_prefix("dry-thread")
            .with_fallback(ScriptedRun::reply(SIMULATED_REPLY))
    }

    pub fn with_session_prefix(self, prefix: impl Into<String>) -> Self {
        self.lock().session_prefix = prefix.into();
        self
    }

    /// Queue a script for the next session that has no keyed script.
    pub fn with_run(self, run: ScriptedRun) -> Self {
        self.lock().queued.push_back(run);
        self
    }

    /// Script every session whose system instruction equals `instruction`.
    pub fn with_run_for(self, instruction: impl Into<String>, run: ScriptedRun) -> Self {
        self.lock().keyed.insert(instruction.into(), run);
        self
    }

    /// Script used once the queue is empty.
    pub fn with_fallback(self, run: ScriptedRun) -> Self {
        self.lock().fallback = Some(run);
        self
    }

    /// Messages currently stored on a session, last segment only.
    pub fn transcript(&self, session: &SessionId) -> Vec<Message> {
        self.lock()
            .sessions
            .get(session)
            .map(|s| {
                s.messages
                    .iter()
                    .cloned()
                    .filter_map(ThreadMessage::into_message)
                    .collect()
            })
            .unwrap_or_default()
    }

    pub fn sessions_opened(&self) -> usize {
        self.lock().next_session
    }

    pub fn poll_count(&self, run: &RunHandle) -> usize {
        self.lock()
            .runs
            .get(&run.run_id)
            .map(|p| p.polls)
            .unwrap_or(0)
    }

    pub fn cancelled_runs(&self) -> Vec<RunHandle> {
        self.lock().cancelled.clone()
    }

    /// Highest number of sessions that were open and not yet finished at the
    /// same time. A session counts from `open_session` until its run is
    /// observed terminal or one of its calls fails.
    pub fn peak_concurrency(&self) -> usize {
        self.lock().peak_active
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        // A panic while holding the lock leaves plain data behind; keep going.
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

#[async_trait]
impl AgentSessionClient for ScriptedClient {
    async fn open_session(&self) -> Result<SessionId, TransportError> {
        let mut inner = self.lock();

        if inner
            .queued
            .front()
            .is_some_and(|run| run.fails_on(ScriptedOperation::OpenSession))
        {
            inner.queued.pop_front();
            return Err(TransportError::request(
                ScriptedOperation::OpenSession.name(),
                "scripted failure",
            ));
        }

        inner.next_session += 1;
        let id = SessionId::new(format!("{}-{}", inner.session_prefix, inner.next_session));
        inner.sessions.insert(id.clone(), SessionState::default());
        inner.active += 1;
        inner.peak_active = inner.peak_active.max(inner.active);
        Ok(id)
    }

    async fn send_message(
        &self,
        session: &SessionId,
        role: Role,
        text: &str,
    ) -> Result<(), TransportError> {
        let mut inner = self.lock();

        if role == Role::System {
            let keyed = inner.keyed.get(text).cloned();
            if let (Some(script), Some(state)) = (keyed, inner.sessions.get_mut(session)) {
                if state.script.is_none() {
                    state.script = Some(script);
                }
            }
        }

        let script = inner.script_for(session)?;
        if script.fails_on(ScriptedOperation::SendMessage) {
            return Err(inner.fail(ScriptedOperation::SendMessage, session));
        }

        if let Some(state) = inner.sessions.get_mut(session) {
            state.messages.push(ThreadMessage::new(role, text));
        }
        Ok(())
    }

    async fn start_run(
        &self,
        session: &SessionId,
        _agent_id: &str,
    ) -> Result<RunHandle, TransportError> {
        let mut inner = self.lock();
        let script = inner.script_for(session)?;
        if script.fails_on(ScriptedOperation::StartRun) {
            return Err(inner.fail(ScriptedOperation::StartRun, session));
        }

        inner.next_run += 1;
        let run_id = format!("run-{}", inner.next_run);
        inner.runs.insert(
            run_id.clone(),
            RunProgress {
                remaining: script.progress.iter().copied().collect(),
                polls: 0,
                finished: false,
            },
        );
        Ok(RunHandle::new(session.clone(), run_id))
    }

    async fn poll_run(&self, run: &RunHandle) -> Result<RunState, TransportError> {
        let mut inner = self.lock();
        let script = inner.script_for(&run.session_id)?;
        if script.fails_on(ScriptedOperation::PollRun) {
            return Err(inner.fail(ScriptedOperation::PollRun, &run.session_id));
        }

        let progress = inner
            .runs
            .get_mut(&run.run_id)
            .ok_or_else(|| {
                TransportError::request("poll_run", format!("unknown run {}", run.run_id))
            })?;
        progress.polls += 1;
        if let Some(status) = progress.remaining.pop_front() {
            return Ok(RunState::new(status));
        }
        let first_terminal_poll = !progress.finished;

        match script.outcome {
            Outcome::Stuck => Ok(RunState::new(RunStatus::Running)),
            Outcome::Fail(error) => {
                inner.finish(&run.run_id);
                Ok(RunState::failed(error))
            }
            Outcome::Reply(segments) => {
                if first_terminal_poll {
                    if let Some(state) = inner.sessions.get_mut(&run.session_id) {
                        state.messages.push(ThreadMessage {
                            role: Role::Assistant,
                            text_segments: segments,
                        });
                    }
                }
                inner.finish(&run.run_id);
                Ok(RunState::new(RunStatus::Succeeded))
            }
        }
    }

    async fn list_messages(
        &self,
        session: &SessionId,
    ) -> Result<Vec<ThreadMessage>, TransportError> {
        let mut inner = self.lock();
        let script = inner.script_for(session)?;
        if script.fails_on(ScriptedOperation::ListMessages) {
            return Err(inner.fail(ScriptedOperation::ListMessages, session));
        }

        Ok(inner
            .sessions
            .get(session)
            .map(|s| s.messages.clone())
            .unwrap_or_default())
    }

    async fn cancel_run(&self, run: &RunHandle) -> Result<(), TransportError> {
        let mut inner = self.lock();
        inner.cancelled.push(run.clone());
        inner.finish(&run.run_id);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn dry_run_answers_with_simulated_reply() {
        let client = ScriptedClient::dry_run();
        let session = client.open_session().await.unwrap();
        assert_eq!(session.as_str(), "dry-thread-1");

        client
            .send_message(&session, Role::User, "hello")
            .await
            .unwrap();
        let run = client.start_run(&session, "agent").await.unwrap();
        let state = client.poll_run(&run).await.unwrap();
        assert_eq!(state.status, RunStatus::Succeeded);

        let transcript = client.transcript(&session);
        assert_eq!(
            transcript,
            vec![
                Message::new(Role::User, "hello"),
                Message::new(Role::Assistant, SIMULATED_REPLY),
            ]
        );
    }

    #[tokio::test]
    async fn keyed_script_follows_system_instruction() {
        let client = ScriptedClient::new()
            .with_run_for("be terse", ScriptedRun::reply("ok"))
            .with_run(ScriptedRun::failure("queue"));

        let session = client.open_session().await.unwrap();
        client
            .send_message(&session, Role::System, "be terse")
            .await
            .unwrap();
        let run = client.start_run(&session, "agent").await.unwrap();
        assert_eq!(
            client.poll_run(&run).await.unwrap().status,
            RunStatus::Succeeded
        );
    }

    #[tokio::test]
    async fn repeated_terminal_polls_reply_once() {
        let client = ScriptedClient::new().with_run(ScriptedRun::reply("once"));
        let session = client.open_session().await.unwrap();
        let run = client.start_run(&session, "agent").await.unwrap();
        client.poll_run(&run).await.unwrap();
        client.poll_run(&run).await.unwrap();

        let messages = client.list_messages(&session).await.unwrap();
        assert_eq!(messages.len(), 1);
    }

    #[tokio::test]
    async fn open_session_failure_consumes_script() {
        let client = ScriptedClient::new()
            .with_run(
                ScriptedRun::reply("x").with_transport_failure(ScriptedOperation::OpenSession),
            )
            .with_run(ScriptedRun::reply("y"));

        let err = client.open_session().await.unwrap_err();
        assert_eq!(err.operation(), "open_session");
        assert!(client.open_session().await.is_ok());
    }

    #[tokio::test]
    async fn missing_script_is_a_transport_error() {
        let client = ScriptedClient::new();
        let session = client.open_session().await.unwrap();
        assert!(client.start_run(&session, "agent").await.is_err());
    }
}
