//! Verification result handed back to callers.

use serde::{Deserialize, Serialize};

/// Confidence attached to a clean candidate.
pub const PASS_CONFIDENCE: f64 = 1.0;
/// Confidence attached to any candidate with at least one issue.
pub const FAIL_CONFIDENCE: f64 = 0.6;

/// Overall verdict
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Verdict {
    Pass,
    Fail,
}

impl Verdict {
    pub fn is_pass(&self) -> bool {
        matches!(self, Self::Pass)
    }
}

impl std::fmt::Display for Verdict {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Pass => write!(f, "PASS"),
            Self::Fail => write!(f, "FAIL"),
        }
    }
}

/// Verdict, the issues behind it, and a fixed confidence.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VerificationResult {
    pub verdict: Verdict,
    pub issues: Vec<String>,
    pub confidence: f64,
}

impl VerificationResult {
    /// PASS with full confidence when `issues` is empty, otherwise FAIL.
    ///
    /// Confidence does not depend on how many issues there are.
    pub fn from_issues(issues: Vec<String>) -> Self {
        if issues.is_empty() {
            Self {
                verdict: Verdict::Pass,
                issues,
                confidence: PASS_CONFIDENCE,
            }
        } else {
            Self {
                verdict: Verdict::Fail,
                issues,
                confidence: FAIL_CONFIDENCE,
            }
        }
    }

    pub fn passed(&self) -> bool {
        self.verdict.is_pass()
    }

    /// One-line summary for logs.
    pub fn summary(&self) -> String {
        if self.issues.is_empty() {
            self.verdict.to_string()
        } else {
            format!("{} ({} issue(s))", self.verdict, self.issues.len())
        }
    }
}
