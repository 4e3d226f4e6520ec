//! Ensemble Coordination Library
//!
//! This library provides:
//! - A transport-agnostic contract for remote agent sessions
//! - A polling state machine that waits for remote runs with a timeout
//! - Multi-variant ensemble generation with pluggable reranking
//! - A heuristic (and optionally agent-assisted) pre-generation router
//! - A deterministic post-generation verifier
//!
//! # Pipeline
//!
//! ```text
//! Selector ──► EnsembleCoordinator ──► N × VariantRunner ──► Reranker ──► Verifier
//!                                          │
//!                                          └─► RunWaiter ──► AgentSessionClient
//! ```
//!
//! # Usage
//!
//! ```rust,ignore
//! use coordination::{EnsembleConfig, EnsembleCoordinator, ScriptedClient, Variant};
//!
//! let client = std::sync::Arc::new(ScriptedClient::dry_run());
//! let coordinator = EnsembleCoordinator::new(client, EnsembleConfig::new("asst-1"));
//! let result = coordinator
//!     .generate("fix test foo", &[Variant::new("low_temp", "Be precise.")])
//!     .await;
//! ```

pub mod ensemble;
pub mod errors;
pub mod router;
pub mod session;
pub mod templates;
pub mod verifier;

// Re-export error taxonomy
pub use errors::{OrchestrationError, RetryCategory, TemplateNotFoundError, TransportError};

// Re-export session contract types
pub use session::{
    AgentSessionClient, Message, Role, RunHandle, RunState, RunStatus, RunWaiter, ScriptedClient,
    ScriptedRun, SessionId, ThreadMessage, TimeoutPolicy,
};

// Re-export key ensemble types
pub use ensemble::{
    run_template, Candidate, CandidateStatus, EnsembleConfig, EnsembleCoordinator,
    LongestResponse, Reranker, RunRecord, SelectionResult, SharedEnsembleCoordinator,
    SharedReranker, SharedSessionClient, Variant, VariantRunner, VerifierWeighted,
};

// Re-export routing types
pub use router::{AgentRouter, DecisionSource, Route, RouteDecision, Selector};

// Re-export template registry
pub use templates::{SharedTemplateRegistry, TemplateRegistry};

// Re-export verifier types
pub use verifier::{
    CandidateDocument, CommandLinter, PatchLinter, Verdict, VerificationResult, Verifier,
};
