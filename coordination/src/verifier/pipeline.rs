//! Verifier pipeline - deterministic post-generation gate.
//!
//! ```text
//! message text ──► secret scan ─┐
//! patch? ───────► diff shape ───┼──► issues ──► PASS 1.0 / FAIL 0.6
//! patch? ───────► linter ───────┘
//! ```
//!
//! No check raises: every finding is an issue string.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use super::lint::{NoLint, PatchLinter};
use super::report::VerificationResult;
use super::secret_scan;
use crate::ensemble::types::Candidate;
use crate::session::Message;

/// Prefixes a unified diff may start with.
pub const DIFF_MARKERS: [&str; 2] = ["diff --git", "--- a/"];

/// Verify input detached from a run: messages plus an optional patch.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CandidateDocument {
    #[serde(default)]
    pub messages: Vec<Message>,
    #[serde(default)]
    pub patch: Option<String>,
}

impl From<&Candidate> for CandidateDocument {
    fn from(candidate: &Candidate) -> Self {
        Self {
            messages: candidate.messages.clone(),
            patch: candidate.patch.clone(),
        }
    }
}

/// Issue for a patch that does not look like a unified diff, or `None`.
pub fn check_diff_shape(patch: &str) -> Option<String> {
    let trimmed = patch.trim_start();
    if DIFF_MARKERS.iter().any(|m| trimmed.starts_with(m)) {
        None
    } else {
        Some(format!(
            "Patch is not a unified diff: expected it to start with '{}' or '{}'",
            DIFF_MARKERS[0], DIFF_MARKERS[1]
        ))
    }
}

/// Stateless verifier with a pluggable lint pass.
#[derive(Debug, Clone)]
pub struct Verifier {
    linter: Arc<dyn PatchLinter>,
}

impl Default for Verifier {
    fn default() -> Self {
        Self::new()
    }
}

impl Verifier {
    pub fn new() -> Self {
        Self {
            linter: Arc::new(NoLint),
        }
    }

    pub fn with_linter(mut self, linter: Arc<dyn PatchLinter>) -> Self {
        self.linter = linter;
        self
    }

    pub fn verify(&self, candidate: &Candidate) -> VerificationResult {
        self.verify_parts(&candidate.messages, candidate.patch.as_deref())
    }

    pub fn verify_document(&self, document: &CandidateDocument) -> VerificationResult {
        self.verify_parts(&document.messages, document.patch.as_deref())
    }

    fn verify_parts(&self, messages: &[Message], patch: Option<&str>) -> VerificationResult {
        let text = messages
            .iter()
            .map(|m| m.text.as_str())
            .collect::<Vec<_>>()
            .join("\n");

        let mut issues = secret_scan::scan(&text);

        if let Some(patch) = patch {
            issues.extend(check_diff_shape(patch));
            let lint_issues = self.linter.lint(patch);
            debug!(lint_issues = lint_issues.len(), "lint pass finished");
            issues.extend(lint_issues);
        }

        let result = VerificationResult::from_issues(issues);
        info!(
            verdict = %result.verdict,
            issues = result.issues.len(),
            confidence = result.confidence,
            "verification finished"
        );
        result
    }
}
