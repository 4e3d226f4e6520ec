//! Heuristic pre-generation gate.
//!
//! Runs BEFORE any candidate is generated and answers one question: is a
//! generation attempt worth making for this context and action?
//!
//! # Rule table
//!
//! ```text
//! Condition                                   | Route    | Confidence
//! --------------------------------------------|----------|-----------
//! action ∈ {generate, fix, implement, patch,  | GENERATE | 0.9
//!           refactor} (case-insensitive)      |          |
//! compressed context mentions "fail"          | GENERATE | 0.75
//! otherwise                                   | NO_OP    | 0.2
//! ```
//!
//! The table stands in for a learned or agent-based router (see
//! [`super::agent::AgentRouter`]); its thresholds are part of the contract.

use std::fmt;
use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

/// Default line bound for [`compress_context`].
pub const MAX_CONTEXT_LINES: usize = 80;

/// Marker line inserted where the middle of a long input was dropped.
pub const TRUNCATION_MARKER: &str = "...CONTENTS_TRUNCATED...";

/// Replacement for collapsed triple-quoted literals.
pub const STRING_PLACEHOLDER: &str = r#""""<truncated>""""#;

const GENERATE_ACTIONS: &[&str] = &["generate", "fix", "implement", "patch", "refactor"];

static TRIPLE_QUOTED: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?s)""".*?""""#).expect("TRIPLE_QUOTED regex should compile")
});

/// Where the selector sends a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Route {
    Generate,
    NoOp,
    Refine,
}

impl Route {
    /// Parse a route label such as `GENERATE`, `no_op` or `NO-OP`.
    pub fn parse(label: &str) -> Option<Self> {
        match label.trim().to_ascii_uppercase().replace('-', "_").as_str() {
            "GENERATE" => Some(Self::Generate),
            "NO_OP" | "NOOP" => Some(Self::NoOp),
            "REFINE" => Some(Self::Refine),
            _ => None,
        }
    }
}

impl fmt::Display for Route {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Generate => write!(f, "GENERATE"),
            Self::NoOp => write!(f, "NO_OP"),
            Self::Refine => write!(f, "REFINE"),
        }
    }
}

/// Routing decision with a confidence in `[0, 1]`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RouteDecision {
    pub route: Route,
    pub confidence: f64,
}

impl RouteDecision {
    pub fn new(route: Route, confidence: f64) -> Self {
        Self {
            route,
            confidence: confidence.clamp(0.0, 1.0),
        }
    }

    pub fn should_generate(&self) -> bool {
        self.route == Route::Generate
    }
}

/// Bound the size of a context snippet while keeping its head and tail.
///
/// Inputs of at most `max_lines` lines are returned verbatim. Longer inputs
/// keep the first and last `max_lines / 2` lines around a
/// [`TRUNCATION_MARKER`] line, and triple-quoted literals in what remains are
/// collapsed to [`STRING_PLACEHOLDER`]. Callers normally pass
/// [`MAX_CONTEXT_LINES`].
pub fn compress_context(text: &str, max_lines: usize) -> String {
    let lines: Vec<&str> = text.lines().collect();
    if lines.len() <= max_lines {
        return text.to_string();
    }

    let keep = max_lines / 2;
    let mut kept: Vec<&str> = Vec::with_capacity(2 * keep + 1);
    kept.extend_from_slice(&lines[..keep]);
    kept.push(TRUNCATION_MARKER);
    kept.extend_from_slice(&lines[lines.len() - keep..]);

    let joined = kept.join("\n");
    TRIPLE_QUOTED
        .replace_all(&joined, STRING_PLACEHOLDER)
        .into_owned()
}

/// Rule-based routing over an already compressed context.
///
/// `action` is matched case-insensitively but otherwise exactly.
pub fn should_generate(compressed_context: &str, action: &str) -> RouteDecision {
    let action = action.to_lowercase();
    if GENERATE_ACTIONS.contains(&action.as_str()) {
        return RouteDecision::new(Route::Generate, 0.9);
    }

    if compressed_context.to_lowercase().contains("fail") {
        return RouteDecision::new(Route::Generate, 0.75);
    }

    RouteDecision::new(Route::NoOp, 0.2)
}

/// Stateless front door combining compression and routing.
#[derive(Debug, Clone, Copy, Default)]
pub struct Selector;

impl Selector {
    pub fn new() -> Self {
        Self
    }

    /// Compress `context`, then route it.
    pub fn decide(&self, context: &str, action: &str) -> RouteDecision {
        should_generate(&compress_context(context, MAX_CONTEXT_LINES), action)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn numbered(n: usize) -> String {
        (1..=n)
            .map(|i| format!("line {i}"))
            .collect::<Vec<_>>()
            .join("\n")
    }

    #[test]
    fn short_input_is_returned_verbatim() {
        let text = "def f():\n    \"\"\"docstring\"\"\"\n    return 1\n";
        assert_eq!(compress_context(text, MAX_CONTEXT_LINES), text);
        assert_eq!(
            compress_context(&compress_context(text, MAX_CONTEXT_LINES), MAX_CONTEXT_LINES),
            text
        );

        let eighty = numbered(80);
        assert_eq!(compress_context(&eighty, MAX_CONTEXT_LINES), eighty);
    }

    #[test]
    fn long_input_keeps_head_and_tail() {
        let compressed = compress_context(&numbered(200), MAX_CONTEXT_LINES);
        let lines: Vec<&str> = compressed.lines().collect();

        assert_eq!(lines.len(), 81);
        assert_eq!(lines[0], "line 1");
        assert_eq!(lines[39], "line 40");
        assert_eq!(lines[40], TRUNCATION_MARKER);
        assert_eq!(lines[41], "line 161");
        assert_eq!(lines[80], "line 200");
    }

    #[test]
    fn custom_bound_splits_head_and_tail_evenly() {
        let compressed = compress_context(&numbered(30), 10);
        let lines: Vec<&str> = compressed.lines().collect();

        assert_eq!(
            lines,
            vec![
                "line 1",
                "line 2",
                "line 3",
                "line 4",
                "line 5",
                TRUNCATION_MARKER,
                "line 26",
                "line 27",
                "line 28",
                "line 29",
                "line 30",
            ]
        );

        let ten = numbered(10);
        assert_eq!(compress_context(&ten, 10), ten);
        assert_eq!(compress_context(&numbered(3), 0), TRUNCATION_MARKER);
    }

    #[test]
    fn long_input_collapses_triple_quoted_literals() {
        let mut text = String::from("x = \"\"\"\nvery\nlong\nliteral\n\"\"\"\n");
        text.push_str(&numbered(100));
        let compressed = compress_context(&text, MAX_CONTEXT_LINES);

        assert!(compressed.starts_with(r#"x = """<truncated>""""#));
        assert!(!compressed.contains("very"));
        assert!(compressed.contains(TRUNCATION_MARKER));
    }

    #[test]
    fn generation_actions_route_with_high_confidence() {
        for action in ["fix", "FIX", "Generate", "implement", "patch", "refactor"] {
            assert_eq!(
                should_generate("anything", action),
                RouteDecision::new(Route::Generate, 0.9),
                "action {action}"
            );
        }
    }

    #[test]
    fn padded_action_is_not_a_generation_action() {
        assert_eq!(
            should_generate("ok", " fix "),
            RouteDecision::new(Route::NoOp, 0.2)
        );
    }

    #[test]
    fn failing_context_routes_to_generate() {
        assert_eq!(
            should_generate("failing tests: foo", "inspect"),
            RouteDecision::new(Route::Generate, 0.75)
        );
        assert_eq!(
            should_generate("Test FAILED", "inspect"),
            RouteDecision::new(Route::Generate, 0.75)
        );
    }

    #[test]
    fn quiet_context_is_a_no_op() {
        assert_eq!(
            should_generate("ok", "inspect"),
            RouteDecision::new(Route::NoOp, 0.2)
        );
        assert!(!should_generate("", "").should_generate());
    }

    #[test]
    fn selector_decides_on_compressed_context() {
        // "fail" only appears in the dropped middle section.
        let mut lines: Vec<String> = (0..100).map(|i| format!("ok {i}")).collect();
        lines[50] = "assertion fail here".into();
        let decision = Selector::new().decide(&lines.join("\n"), "inspect");
        assert_eq!(decision.route, Route::NoOp);
    }

    #[test]
    fn route_labels_parse_and_serialize() {
        assert_eq!(Route::parse("generate"), Some(Route::Generate));
        assert_eq!(Route::parse("NO-OP"), Some(Route::NoOp));
        assert_eq!(Route::parse(" refine "), Some(Route::Refine));
        assert_eq!(Route::parse("maybe"), None);
        assert_eq!(serde_json::to_string(&Route::NoOp).unwrap(), "\"NO_OP\"");
    }
}
