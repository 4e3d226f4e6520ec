//! Named system-instruction templates.
//!
//! The registry is built once at startup and shared read-only
//! (`Arc<TemplateRegistry>`). Lookups of unknown names fail with
//! [`TemplateNotFoundError`] before any remote call is made.

use std::collections::BTreeMap;
use std::sync::Arc;

use crate::errors::TemplateNotFoundError;

/// Template used for code generation attempts.
pub const GENERATOR: &str = "generator";
/// Template used for agent-assisted routing.
pub const SELECTOR: &str = "selector";
/// Template used for agent-side verification.
pub const VERIFIER: &str = "verifier";

const GENERATOR_INSTRUCTION: &str = "You are a focused code generator. When appropriate, return a \
unified-diff patch under a `patch` field. Prioritize correctness and minimal, well-tested changes. \
Temperature=0.1";

const SELECTOR_INSTRUCTION: &str = "You are a conservative selector. Inspect the provided compressed \
context and action. Return JSON with `route`: one of GENERATE, NO_OP, REFINE and `confidence` \
0.0-1.0.";

const VERIFIER_INSTRUCTION: &str = "You are a deterministic verifier. Look for secrets, ensure \
patches are unified diffs, and run lightweight static checks. Return JSON with `verdict` \
(PASS|FAIL), `issues` and `confidence`.";

/// Shared handle to the template registry.
pub type SharedTemplateRegistry = Arc<TemplateRegistry>;

/// Immutable mapping from template name to system instruction.
#[derive(Debug, Clone)]
pub struct TemplateRegistry {
    templates: BTreeMap<String, String>,
}

impl Default for TemplateRegistry {
    fn default() -> Self {
        Self::from_entries([
            (GENERATOR, GENERATOR_INSTRUCTION),
            (SELECTOR, SELECTOR_INSTRUCTION),
            (VERIFIER, VERIFIER_INSTRUCTION),
        ])
    }
}

impl TemplateRegistry {
    /// Build a registry from explicit entries. Later duplicates win.
    pub fn from_entries<I, K, V>(entries: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        Self {
            templates: entries
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }

    pub fn shared(self) -> SharedTemplateRegistry {
        Arc::new(self)
    }

    pub fn get(&self, name: &str) -> Result<&str, TemplateNotFoundError> {
        self.templates
            .get(name)
            .map(String::as_str)
            .ok_or_else(|| TemplateNotFoundError {
                name: name.to_string(),
                known: self.names().collect::<Vec<_>>().join(", "),
            })
    }

    /// Template names in sorted order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.templates.keys().map(String::as_str)
    }
}
