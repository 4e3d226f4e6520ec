//! RunWaiter - bounded polling state machine for a single run.
//!
//! ```text
//!            poll                 poll
//! Pending ────────► Running ────────────► Succeeded | Failed
//!    │                 │
//!    └──── elapsed >= timeout ──────────► TimedOut (local only)
//! ```
//!
//! [`transition`] is the whole state machine and is pure; [`RunWaiter::wait`]
//! only feeds it observations and elapsed time. Elapsed time and sleeps come
//! from `tokio::time`, so a paused runtime drives the waiter without a real
//! clock.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::time::{sleep, timeout, Instant};
use tracing::{debug, warn};

use super::{AgentSessionClient, RunHandle, RunState, RunStatus};
use crate::errors::{OrchestrationError, TransportError};

/// Default delay between two polls.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(500);

/// Default wall-clock budget for one run.
pub const DEFAULT_RUN_TIMEOUT: Duration = Duration::from_secs(30);

/// What to do with the remote run once the local budget is exhausted.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TimeoutPolicy {
    /// Leave the remote run alone; only the local attempt is dropped.
    #[default]
    Abandon,
    /// Send one best-effort cancellation to the service.
    Cancel,
}

/// Next local status given what the service reported and how long we waited.
///
/// Terminal remote states win over the budget: a run that finished on the
/// last poll is not reported as timed out.
pub fn transition(observed: RunStatus, elapsed: Duration, timeout: Duration) -> RunStatus {
    if observed.is_terminal() {
        observed
    } else if elapsed >= timeout {
        RunStatus::TimedOut
    } else {
        observed
    }
}

/// Drives one run to a terminal state or to the local timeout.
#[derive(Debug, Clone)]
pub struct RunWaiter {
    timeout: Duration,
    poll_interval: Duration,
    policy: TimeoutPolicy,
}

impl Default for RunWaiter {
    fn default() -> Self {
        Self::new(DEFAULT_RUN_TIMEOUT)
    }
}

impl RunWaiter {
    pub fn new(timeout: Duration) -> Self {
        Self {
            timeout,
            poll_interval: DEFAULT_POLL_INTERVAL,
            policy: TimeoutPolicy::Abandon,
        }
    }

    pub fn with_poll_interval(mut self, poll_interval: Duration) -> Self {
        self.poll_interval = poll_interval;
        self
    }

    pub fn with_policy(mut self, policy: TimeoutPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Poll until the run is terminal or the budget is spent.
    ///
    /// Each poll and each sleep is bounded by what is left of the budget, so a
    /// hung poll counts as a timeout. A transport failure while polling is
    /// returned immediately.
    pub async fn wait<C>(&self, client: &C, run: &RunHandle) -> Result<RunState, TransportError>
    where
        C: AgentSessionClient + ?Sized,
    {
        let started = Instant::now();
        let mut status = RunStatus::Pending;

        loop {
            let remaining = self.timeout.saturating_sub(started.elapsed());
            let observed = match timeout(remaining, client.poll_run(run)).await {
                Ok(polled) => polled?,
                Err(_) => {
                    debug!(run_id = %run.run_id, "poll outlived the remaining budget");
                    return Ok(self.time_out(client, run).await);
                }
            };
            let next = transition(observed.status, started.elapsed(), self.timeout);

            if next != status {
                debug!(
                    run_id = %run.run_id,
                    from = %status,
                    to = %next,
                    elapsed_ms = started.elapsed().as_millis() as u64,
                    "run state changed"
                );
                status = next;
            }

            match next {
                RunStatus::TimedOut => return Ok(self.time_out(client, run).await),
                RunStatus::Succeeded | RunStatus::Failed => {
                    return Ok(RunState {
                        status: next,
                        error: observed.error,
                    })
                }
                RunStatus::Pending | RunStatus::Running => {
                    let remaining = self.timeout.saturating_sub(started.elapsed());
                    sleep(self.poll_interval.min(remaining)).await
                }
            }
        }
    }

    async fn time_out<C>(&self, client: &C, run: &RunHandle) -> RunState
    where
        C: AgentSessionClient + ?Sized,
    {
        warn!(
            run_id = %run.run_id,
            session_id = %run.session_id,
            timeout_secs = self.timeout.as_secs_f64(),
            policy = ?self.policy,
            "run exceeded its budget"
        );

        if self.policy == TimeoutPolicy::Cancel {
            if let Err(e) = client.cancel_run(run).await {
                warn!(run_id = %run.run_id, error = %e, "cancel after timeout failed");
            }
        }

        RunState {
            status: RunStatus::TimedOut,
            error: Some(
                OrchestrationError::Timeout {
                    waited: self.timeout,
                }
                .to_string(),
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use async_trait::async_trait;

    use super::*;
    use crate::session::{
        MockAgentSessionClient, Role, ScriptedClient, ScriptedRun, SessionId, ThreadMessage,
    };

    /// Service whose run status requests never answer.
    struct HangingPolls;

    #[async_trait]
    impl AgentSessionClient for HangingPolls {
        async fn open_session(&self) -> Result<SessionId, TransportError> {
            Ok(SessionId::new("thread-1"))
        }

        async fn send_message(
            &self,
            _session: &SessionId,
            _role: Role,
            _text: &str,
        ) -> Result<(), TransportError> {
            Ok(())
        }

        async fn start_run(
            &self,
            session: &SessionId,
            _agent_id: &str,
        ) -> Result<RunHandle, TransportError> {
            Ok(RunHandle::new(session.clone(), "run-1"))
        }

        async fn poll_run(&self, _run: &RunHandle) -> Result<RunState, TransportError> {
            std::future::pending().await
        }

        async fn list_messages(
            &self,
            _session: &SessionId,
        ) -> Result<Vec<ThreadMessage>, TransportError> {
            Ok(Vec::new())
        }
    }

    fn handle() -> RunHandle {
        RunHandle::new(SessionId::new("thread-1"), "run-1")
    }

    #[test]
    fn terminal_observation_beats_budget() {
        let late = Duration::from_secs(99);
        let budget = Duration::from_secs(30);
        assert_eq!(
            transition(RunStatus::Succeeded, late, budget),
            RunStatus::Succeeded
        );
        assert_eq!(transition(RunStatus::Failed, late, budget), RunStatus::Failed);
    }

    #[test]
    fn running_past_budget_times_out() {
        let budget = Duration::from_secs(30);
        assert_eq!(
            transition(RunStatus::Running, Duration::from_secs(30), budget),
            RunStatus::TimedOut
        );
        assert_eq!(
            transition(RunStatus::Pending, Duration::from_secs(31), budget),
            RunStatus::TimedOut
        );
        assert_eq!(
            transition(RunStatus::Running, Duration::from_secs(29), budget),
            RunStatus::Running
        );
    }

    #[tokio::test(start_paused = true)]
    async fn waits_through_pending_and_running() {
        let client = ScriptedClient::new().with_run(
            ScriptedRun::reply("done").with_progress(vec![RunStatus::Pending, RunStatus::Running]),
        );
        let session = client.open_session().await.unwrap();
        let run = client.start_run(&session, "agent").await.unwrap();

        let state = RunWaiter::new(Duration::from_secs(30))
            .wait(&client, &run)
            .await
            .unwrap();
        assert_eq!(state.status, RunStatus::Succeeded);
        assert_eq!(client.poll_count(&run), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn stuck_run_times_out_without_cancel() {
        let client = ScriptedClient::new().with_run(ScriptedRun::stuck());
        let session = client.open_session().await.unwrap();
        let run = client.start_run(&session, "agent").await.unwrap();

        let started = Instant::now();
        let state = RunWaiter::new(Duration::from_secs(5))
            .with_poll_interval(Duration::from_secs(1))
            .wait(&client, &run)
            .await
            .unwrap();

        assert_eq!(state.status, RunStatus::TimedOut);
        assert_eq!(state.error.as_deref(), Some("run did not finish within 5s"));
        assert!(started.elapsed() >= Duration::from_secs(5));
        assert!(started.elapsed() < Duration::from_millis(5_050));
        assert!(client.cancelled_runs().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn sleep_never_overshoots_budget() {
        let client = ScriptedClient::new().with_run(ScriptedRun::stuck());
        let session = client.open_session().await.unwrap();
        let run = client.start_run(&session, "agent").await.unwrap();

        let started = Instant::now();
        let state = RunWaiter::new(Duration::from_millis(2_500))
            .with_poll_interval(Duration::from_secs(2))
            .wait(&client, &run)
            .await
            .unwrap();

        assert_eq!(state.status, RunStatus::TimedOut);
        assert!(started.elapsed() < Duration::from_millis(2_550));
        // t=0, t=2s, then once more when the budget runs out at 2.5s.
        assert_eq!(client.poll_count(&run), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn hung_poll_is_bounded_by_budget() {
        let started = Instant::now();
        let state = RunWaiter::new(Duration::from_secs(3))
            .wait(&HangingPolls, &handle())
            .await
            .unwrap();

        assert_eq!(state.status, RunStatus::TimedOut);
        assert_eq!(state.error.as_deref(), Some("run did not finish within 3s"));
        assert!(started.elapsed() >= Duration::from_secs(3));
        assert!(started.elapsed() < Duration::from_millis(3_050));
    }

    #[tokio::test(start_paused = true)]
    async fn cancel_policy_cancels_once() {
        let client = ScriptedClient::new().with_run(ScriptedRun::stuck());
        let session = client.open_session().await.unwrap();
        let run = client.start_run(&session, "agent").await.unwrap();

        let state = RunWaiter::new(Duration::from_secs(2))
            .with_policy(TimeoutPolicy::Cancel)
            .wait(&client, &run)
            .await
            .unwrap();

        assert_eq!(state.status, RunStatus::TimedOut);
        assert_eq!(client.cancelled_runs(), vec![run]);
    }

    #[tokio::test(start_paused = true)]
    async fn failed_run_carries_remote_error() {
        let client = ScriptedClient::new().with_run(ScriptedRun::failure("rate limited"));
        let session = client.open_session().await.unwrap();
        let run = client.start_run(&session, "agent").await.unwrap();

        let state = RunWaiter::default().wait(&client, &run).await.unwrap();
        assert_eq!(state, RunState::failed("rate limited"));
    }

    #[tokio::test]
    async fn poll_transport_error_propagates() {
        let mut client = MockAgentSessionClient::new();
        client
            .expect_poll_run()
            .times(1)
            .returning(|_| Err(TransportError::request("poll_run", "connection reset")));

        let err = RunWaiter::default()
            .wait(&client, &handle())
            .await
            .unwrap_err();
        assert_eq!(err.operation(), "poll_run");
    }
}
