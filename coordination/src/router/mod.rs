//! Router Module
//!
//! Decides whether a generation attempt is worth making before any variant
//! runs.
//!
//! # Strategies
//!
//! ```text
//! Strategy        | Remote call | Source of truth
//! ----------------|-------------|--------------------------------
//! Selector        | none        | fixed rule table
//! AgentRouter     | one run     | agent JSON reply, rule table on failure
//! ```

pub mod agent;
pub mod selector;

pub use agent::{parse_route_reply, AgentRouter, DecisionSource};
pub use selector::{
    compress_context, should_generate, Route, RouteDecision, Selector, MAX_CONTEXT_LINES,
};
