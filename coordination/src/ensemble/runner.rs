//! VariantRunner - one complete candidate attempt.
//!
//! ```text
//! open_session → [system message] → [user message] → start_run
//!     → RunWaiter → (succeeded) list_messages → Candidate
//! ```
//!
//! Expected remote failures (a `failed` or timed-out run) still produce a
//! Candidate. Only transport errors come back as `Err`; the coordinator turns
//! those into `error` candidates.

use tracing::{debug, info};

use super::types::{Candidate, Variant};
use crate::errors::OrchestrationError;
use crate::session::{AgentSessionClient, Role, RunStatus, RunWaiter, ThreadMessage};
use crate::templates::TemplateRegistry;

/// Executes variants against one agent with one waiting policy.
#[derive(Debug, Clone)]
pub struct VariantRunner {
    agent_id: String,
    waiter: RunWaiter,
}

impl VariantRunner {
    pub fn new(agent_id: impl Into<String>, waiter: RunWaiter) -> Self {
        Self {
            agent_id: agent_id.into(),
            waiter,
        }
    }

    pub fn agent_id(&self) -> &str {
        &self.agent_id
    }

    /// Run one variant to a finalized Candidate.
    ///
    /// An empty system instruction or prompt is not sent.
    pub async fn run<C>(
        &self,
        client: &C,
        variant: &Variant,
        user_prompt: Option<&str>,
    ) -> Result<Candidate, OrchestrationError>
    where
        C: AgentSessionClient + ?Sized,
    {
        let session = client.open_session().await?;
        debug!(variant = %variant.name, session_id = %session, "session opened");

        if !variant.system_instruction.is_empty() {
            client
                .send_message(&session, Role::System, &variant.system_instruction)
                .await?;
        }
        if let Some(prompt) = user_prompt.filter(|p| !p.is_empty()) {
            client.send_message(&session, Role::User, prompt).await?;
        }

        let run = client.start_run(&session, &self.agent_id).await?;
        let state = self.waiter.wait(client, &run).await?;

        let messages = if state.status == RunStatus::Succeeded {
            client
                .list_messages(&session)
                .await?
                .into_iter()
                .filter_map(ThreadMessage::into_message)
                .collect()
        } else {
            Vec::new()
        };

        info!(
            variant = %variant.name,
            session_id = %session,
            run_id = %run.run_id,
            status = %state.status,
            messages = messages.len(),
            "variant finished"
        );

        let error = match state.status {
            RunStatus::Succeeded => None,
            _ => state.error,
        };

        Ok(Candidate {
            status: state.status.into(),
            variant_name: variant.name.clone(),
            session_id: Some(session),
            messages,
            error,
            patch: None,
        })
    }
}

/// Run a single named template once, the way the `run` command does.
///
/// Unknown template names fail before any remote call.
pub async fn run_template<C>(
    client: &C,
    registry: &TemplateRegistry,
    runner: &VariantRunner,
    template: &str,
    user_prompt: Option<&str>,
) -> Result<Candidate, OrchestrationError>
where
    C: AgentSessionClient + ?Sized,
{
    let variant = Variant::from_template(registry, template)?;
    runner.run(client, &variant, user_prompt).await
}
