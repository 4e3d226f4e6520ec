//! Ensemble coordinator - fans a prompt out over N variants and picks one.
//!
//! Each variant runs in its own task on a `JoinSet`, gated by a semaphore so
//! at most `max_concurrency` attempts are in flight. Every spawned task is
//! joined before reranking, and every variant yields exactly one Candidate:
//! transport errors and panicked tasks become `error` candidates instead of
//! aborting the batch.

use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{debug, info, warn};

use super::rerank::{LongestResponse, SharedReranker};
use super::runner::VariantRunner;
use super::types::{Candidate, SelectionResult, Variant};
use crate::errors::OrchestrationError;
use crate::session::waiter::{DEFAULT_POLL_INTERVAL, DEFAULT_RUN_TIMEOUT};
use crate::session::{AgentSessionClient, RunWaiter, TimeoutPolicy};

/// Shared handle to the remote session client.
pub type SharedSessionClient = Arc<dyn AgentSessionClient>;

/// Shared reference to EnsembleCoordinator
pub type SharedEnsembleCoordinator = Arc<EnsembleCoordinator>;

/// Default bound on simultaneously running variants.
pub const DEFAULT_MAX_CONCURRENCY: usize = 4;

/// Configuration for the ensemble coordinator
#[derive(Debug, Clone)]
pub struct EnsembleConfig {
    /// Agent every variant runs against
    pub agent_id: String,
    /// Maximum variants in flight at once (values below 1 act as 1)
    pub max_concurrency: usize,
    /// Wall-clock budget per run
    pub run_timeout: Duration,
    /// Delay between polls of one run
    pub poll_interval: Duration,
    /// What happens to remote runs that exceed `run_timeout`
    pub timeout_policy: TimeoutPolicy,
}

impl Default for EnsembleConfig {
    fn default() -> Self {
        Self {
            agent_id: String::new(),
            max_concurrency: DEFAULT_MAX_CONCURRENCY,
            run_timeout: DEFAULT_RUN_TIMEOUT,
            poll_interval: DEFAULT_POLL_INTERVAL,
            timeout_policy: TimeoutPolicy::default(),
        }
    }
}

impl EnsembleConfig {
    pub fn new(agent_id: impl Into<String>) -> Self {
        Self {
            agent_id: agent_id.into(),
            ..Self::default()
        }
    }

    pub fn with_max_concurrency(mut self, max_concurrency: usize) -> Self {
        self.max_concurrency = max_concurrency;
        self
    }

    pub fn with_run_timeout(mut self, run_timeout: Duration) -> Self {
        self.run_timeout = run_timeout;
        self
    }

    pub fn with_poll_interval(mut self, poll_interval: Duration) -> Self {
        self.poll_interval = poll_interval;
        self
    }

    pub fn with_timeout_policy(mut self, policy: TimeoutPolicy) -> Self {
        self.timeout_policy = policy;
        self
    }

    /// Runner configured with this config's agent and waiting policy.
    pub fn runner(&self) -> VariantRunner {
        let waiter = RunWaiter::new(self.run_timeout)
            .with_poll_interval(self.poll_interval)
            .with_policy(self.timeout_policy);
        VariantRunner::new(self.agent_id.clone(), waiter)
    }
}

/// Fan-out/fan-in orchestrator for one prompt across many variants
pub struct EnsembleCoordinator {
    client: SharedSessionClient,
    config: EnsembleConfig,
    reranker: SharedReranker,
}

impl EnsembleCoordinator {
    /// Create a coordinator using the default longest-response reranker
    pub fn new(client: SharedSessionClient, config: EnsembleConfig) -> Self {
        Self {
            client,
            config,
            reranker: Arc::new(LongestResponse),
        }
    }

    /// Swap the scoring policy
    pub fn with_reranker(mut self, reranker: SharedReranker) -> Self {
        self.reranker = reranker;
        self
    }

    /// Create a shared reference to this coordinator
    pub fn shared(self) -> SharedEnsembleCoordinator {
        Arc::new(self)
    }

    pub fn config(&self) -> &EnsembleConfig {
        &self.config
    }

    /// Run every variant against `prompt`, wait for all of them, then rerank.
    ///
    /// `candidates` is in completion order and always has one entry per
    /// variant. `chosen` is `None` when no candidate is eligible.
    pub async fn generate(&self, prompt: &str, variants: &[Variant]) -> SelectionResult {
        let runner = Arc::new(self.config.runner());
        let permits = Arc::new(Semaphore::new(self.config.max_concurrency.max(1)));
        let prompt: Arc<str> = Arc::from(prompt);
        let mut join_set: JoinSet<(usize, Result<Candidate, OrchestrationError>)> =
            JoinSet::new();

        info!(
            variants = variants.len(),
            max_concurrency = self.config.max_concurrency.max(1),
            reranker = self.reranker.name(),
            "Ensemble started"
        );

        for (index, variant) in variants.iter().cloned().enumerate() {
            let client = Arc::clone(&self.client);
            let runner = Arc::clone(&runner);
            let permits = Arc::clone(&permits);
            let prompt = Arc::clone(&prompt);

            join_set.spawn(async move {
                let Ok(_permit) = permits.acquire_owned().await else {
                    return (
                        index,
                        Err(OrchestrationError::Cancelled("worker pool closed".into())),
                    );
                };
                let result = runner.run(client.as_ref(), &variant, Some(&*prompt)).await;
                (index, result)
            });
        }

        let mut unfinished: BTreeSet<usize> = (0..variants.len()).collect();
        let mut candidates = Vec::with_capacity(variants.len());

        while let Some(joined) = join_set.join_next().await {
            match joined {
                Ok((index, result)) => {
                    unfinished.remove(&index);
                    let name = &variants[index].name;
                    let candidate = match result {
                        Ok(candidate) => candidate,
                        Err(e) => {
                            warn!(variant = %name, error = %e, "Variant attempt failed");
                            Candidate::errored(name.clone(), &e)
                        }
                    };
                    debug!(variant = %name, status = %candidate.status, "Candidate collected");
                    candidates.push(candidate);
                }
                Err(e) => {
                    // The owning index is unknown here; it is reconciled below.
                    warn!(error = %e, "Variant task panicked");
                }
            }
        }

        for index in unfinished {
            let name = &variants[index].name;
            let error = OrchestrationError::Internal(anyhow::anyhow!(
                "variant task for '{name}' ended without a result"
            ));
            candidates.push(Candidate::errored(name.clone(), &error));
        }

        let chosen = self.reranker.select(&candidates).cloned();

        match &chosen {
            Some(winner) => info!(
                winner = %winner.variant_name,
                candidates = candidates.len(),
                "Ensemble selected a candidate"
            ),
            None => warn!(
                candidates = candidates.len(),
                "Ensemble produced no eligible candidate"
            ),
        }

        SelectionResult { chosen, candidates }
    }
}
