//! Domain types handed between the ensemble stages.
//!
//! | Type              | Produced by         | Consumed by               |
//! |-------------------|---------------------|---------------------------|
//! | `Variant`         | caller / templates  | `VariantRunner`           |
//! | `Candidate`       | `VariantRunner`     | `Reranker`, `Verifier`    |
//! | `SelectionResult` | `EnsembleCoordinator` | caller                  |
//! | `RunRecord`       | `Candidate`         | CLI / API boundary        |

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::errors::{OrchestrationError, TemplateNotFoundError};
use crate::session::{Message, RunStatus, SessionId};
use crate::templates::TemplateRegistry;

// ── Variant ─────────────────────────────────────────────────────────────────

/// One diversified attempt: a name and the system instruction it runs with.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Variant {
    pub name: String,
    #[serde(alias = "system")]
    pub system_instruction: String,
}

impl Variant {
    pub fn new(name: impl Into<String>, system_instruction: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            system_instruction: system_instruction.into(),
        }
    }

    /// Variant whose instruction is a registered template.
    pub fn from_template(
        registry: &TemplateRegistry,
        name: &str,
    ) -> Result<Self, TemplateNotFoundError> {
        Ok(Self::new(name, registry.get(name)?))
    }
}

// ── Candidate ───────────────────────────────────────────────────────────────

/// Final status of a candidate: a run status, or `error` when the attempt
/// died before the run could report one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CandidateStatus {
    Pending,
    Running,
    Succeeded,
    Failed,
    TimedOut,
    Error,
}

impl From<RunStatus> for CandidateStatus {
    fn from(status: RunStatus) -> Self {
        match status {
            RunStatus::Pending => Self::Pending,
            RunStatus::Running => Self::Running,
            RunStatus::Succeeded => Self::Succeeded,
            RunStatus::Failed => Self::Failed,
            RunStatus::TimedOut => Self::TimedOut,
        }
    }
}

impl fmt::Display for CandidateStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Pending => "pending",
            Self::Running => "running",
            Self::Succeeded => "succeeded",
            Self::Failed => "failed",
            Self::TimedOut => "timed_out",
            Self::Error => "error",
        };
        f.write_str(s)
    }
}

/// The finalized result of one variant's attempt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Candidate {
    pub status: CandidateStatus,
    pub variant_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session_id: Option<SessionId>,
    #[serde(default)]
    pub messages: Vec<Message>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Unified diff proposed by the candidate, when the caller extracted one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub patch: Option<String>,
}

impl Candidate {
    /// Candidate standing in for an attempt that failed with an error.
    pub fn errored(variant_name: impl Into<String>, error: &OrchestrationError) -> Self {
        Self {
            status: CandidateStatus::Error,
            variant_name: variant_name.into(),
            session_id: None,
            messages: Vec::new(),
            error: Some(error.to_string()),
            patch: None,
        }
    }

    pub fn with_patch(mut self, patch: impl Into<String>) -> Self {
        self.patch = Some(patch.into());
        self
    }

    /// Succeeded with at least one message; the only candidates a reranker
    /// may choose.
    pub fn is_eligible(&self) -> bool {
        self.status == CandidateStatus::Succeeded && !self.messages.is_empty()
    }

    /// All message texts joined by newlines.
    pub fn response_text(&self) -> String {
        self.messages
            .iter()
            .map(|m| m.text.as_str())
            .collect::<Vec<_>>()
            .join("\n")
    }

    pub fn to_record(&self) -> RunRecord {
        RunRecord {
            status: self.status,
            messages: self.messages.clone(),
        }
    }
}

/// Output shape at the orchestration boundary.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunRecord {
    pub status: CandidateStatus,
    pub messages: Vec<Message>,
}

// ── Selection ───────────────────────────────────────────────────────────────

/// Winner (if any) plus every attempt, in completion order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SelectionResult {
    pub chosen: Option<Candidate>,
    pub candidates: Vec<Candidate>,
}

impl SelectionResult {
    pub fn has_winner(&self) -> bool {
        self.chosen.is_some()
    }

    /// Candidates re-sorted by variant name, for callers that need a stable
    /// order.
    pub fn candidates_by_variant(&self) -> Vec<&Candidate> {
        let mut sorted: Vec<&Candidate> = self.candidates.iter().collect();
        sorted.sort_by(|a, b| a.variant_name.cmp(&b.variant_name));
        sorted
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::Role;

    fn succeeded(name: &str, texts: &[&str]) -> Candidate {
        Candidate {
            status: CandidateStatus::Succeeded,
            variant_name: name.into(),
            session_id: Some(SessionId::new("t")),
            messages: texts
                .iter()
                .map(|t| Message::new(Role::Assistant, *t))
                .collect(),
            error: None,
            patch: None,
        }
    }

    #[test]
    fn eligibility_requires_success_and_messages() {
        assert!(succeeded("a", &["hi"]).is_eligible());
        assert!(!succeeded("a", &[]).is_eligible());

        let mut failed = succeeded("a", &["hi"]);
        failed.status = CandidateStatus::Failed;
        assert!(!failed.is_eligible());
    }

    #[test]
    fn response_text_joins_with_newlines() {
        assert_eq!(succeeded("a", &["one", "two"]).response_text(), "one\ntwo");
    }

    #[test]
    fn errored_candidate_serializes_error_status() {
        let err = OrchestrationError::Configuration("boom".into());
        let record = Candidate::errored("creative", &err).to_record();
        let json = serde_json::to_value(&record).unwrap();
        assert_eq!(json["status"], "error");
        assert_eq!(json["messages"], serde_json::json!([]));
    }

    #[test]
    fn variant_accepts_short_system_key() {
        let variant: Variant =
            serde_json::from_str(r#"{"name":"low_temp","system":"be precise"}"#).unwrap();
        assert_eq!(variant.system_instruction, "be precise");
    }

    #[test]
    fn variant_from_unknown_template_fails_fast() {
        let registry = TemplateRegistry::default();
        assert!(Variant::from_template(&registry, "generator").is_ok());
        assert!(Variant::from_template(&registry, "nope").is_err());
    }
}
