//! Agent-assisted routing.
//!
//! Asks the remote agent (via the `selector` template) for a route, and falls
//! back to the heuristic [`Selector`] whenever the agent's answer is missing
//! or unusable. A routing call therefore never fails the caller.

use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, warn};

use super::selector::{
    compress_context, should_generate, Route, RouteDecision, MAX_CONTEXT_LINES,
};
use crate::ensemble::runner::run_template;
use crate::ensemble::VariantRunner;
use crate::session::{AgentSessionClient, Role};
use crate::templates::{SharedTemplateRegistry, SELECTOR};

/// Where a routing decision came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecisionSource {
    Agent,
    Heuristic,
}

#[derive(Debug, Deserialize)]
struct RawDecision {
    route: String,
    confidence: f64,
}

/// First JSON object in `reply` that reads as a route decision.
///
/// Route labels are case-insensitive; confidence is clamped to `[0, 1]`.
pub fn parse_route_reply(reply: &str) -> Option<RouteDecision> {
    reply.match_indices('{').find_map(|(start, _)| {
        let value = serde_json::Deserializer::from_str(&reply[start..])
            .into_iter::<Value>()
            .next()?
            .ok()?;
        let raw: RawDecision = serde_json::from_value(value).ok()?;
        if !raw.confidence.is_finite() {
            return None;
        }
        let route = Route::parse(&raw.route)?;
        Some(RouteDecision::new(route, raw.confidence))
    })
}

/// Prompt sent alongside the `selector` template.
pub fn routing_prompt(compressed_context: &str, action: &str) -> String {
    format!("Action: {action}\nContext:\n{compressed_context}")
}

/// Router that consults the remote agent first.
#[derive(Debug, Clone)]
pub struct AgentRouter {
    runner: VariantRunner,
    registry: SharedTemplateRegistry,
}

impl AgentRouter {
    pub fn new(runner: VariantRunner, registry: SharedTemplateRegistry) -> Self {
        Self { runner, registry }
    }

    /// Route `context`/`action`, reporting whether the agent's answer was used.
    pub async fn route<C>(
        &self,
        client: &C,
        context: &str,
        action: &str,
    ) -> (RouteDecision, DecisionSource)
    where
        C: AgentSessionClient + ?Sized,
    {
        let compressed = compress_context(context, MAX_CONTEXT_LINES);
        let fallback = should_generate(&compressed, action);
        let prompt = routing_prompt(&compressed, action);

        let candidate =
            match run_template(client, &self.registry, &self.runner, SELECTOR, Some(&prompt)).await
            {
                Ok(candidate) => candidate,
                Err(e) => {
                    warn!(error = %e, "selector run failed, using heuristic route");
                    return (fallback, DecisionSource::Heuristic);
                }
            };

        if !candidate.is_eligible() {
            warn!(
                status = %candidate.status,
                "selector run produced no reply, using heuristic route"
            );
            return (fallback, DecisionSource::Heuristic);
        }

        let reply = candidate
            .messages
            .iter()
            .rev()
            .find(|m| m.role == Role::Assistant)
            .map(|m| m.text.as_str())
            .unwrap_or_default();

        match parse_route_reply(reply) {
            Some(decision) => {
                debug!(route = %decision.route, confidence = decision.confidence, "agent route");
                (decision, DecisionSource::Agent)
            }
            None => {
                warn!("selector reply had no route decision, using heuristic route");
                (fallback, DecisionSource::Heuristic)
            }
        }
    }
}
