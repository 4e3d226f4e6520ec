//! Reranking policies for picking one winner among succeeded candidates.
//!
//! A policy only supplies a score; eligibility (succeeded, non-empty
//! messages) and tie-breaking (first seen wins) are shared so every policy
//! has the same contract with the coordinator.

use std::sync::Arc;

use tracing::debug;

use super::types::Candidate;
use crate::verifier::Verifier;

/// Shared handle to a reranking policy.
pub type SharedReranker = Arc<dyn Reranker>;

/// Pluggable scoring strategy.
pub trait Reranker: Send + Sync {
    /// Policy name for logging.
    fn name(&self) -> &'static str;

    /// Scalar score; higher is better.
    fn score(&self, candidate: &Candidate) -> f64;

    /// Highest-scoring eligible candidate. Equal scores keep the earlier
    /// candidate, so the result is deterministic for a fixed input order.
    fn select<'a>(&self, candidates: &'a [Candidate]) -> Option<&'a Candidate> {
        let mut best: Option<(&Candidate, f64)> = None;

        for candidate in candidates.iter().filter(|c| c.is_eligible()) {
            let score = self.score(candidate);
            debug!(
                policy = self.name(),
                variant = %candidate.variant_name,
                score,
                "scored candidate"
            );
            match best {
                Some((_, top)) if score <= top => {}
                _ => best = Some((candidate, score)),
            }
        }

        best.map(|(candidate, _)| candidate)
    }
}

/// Character count of the joined message text.
pub fn response_length(candidate: &Candidate) -> usize {
    candidate.response_text().chars().count()
}

/// Default policy: the longest textual reply wins.
#[derive(Debug, Clone, Copy, Default)]
pub struct LongestResponse;

impl Reranker for LongestResponse {
    fn name(&self) -> &'static str {
        "longest_response"
    }

    fn score(&self, candidate: &Candidate) -> f64 {
        response_length(candidate) as f64
    }
}

/// Reply length weighted by the verifier's confidence, so candidates that
/// fail verification need a much longer reply to win.
#[derive(Debug, Clone, Default)]
pub struct VerifierWeighted {
    verifier: Verifier,
}

impl VerifierWeighted {
    pub fn new(verifier: Verifier) -> Self {
        Self { verifier }
    }
}

impl Reranker for VerifierWeighted {
    fn name(&self) -> &'static str {
        "verifier_weighted"
    }

    fn score(&self, candidate: &Candidate) -> f64 {
        let verification = self.verifier.verify(candidate);
        response_length(candidate) as f64 * verification.confidence
    }
}
