//! Ensemble generation
//!
//! Runs one prompt through several differently-instructed variants of the
//! same remote agent and picks a winner.
//!
//! # Architecture
//!
//! ```text
//! ┌───────────────────────────────────────────────────────────┐
//! │                  EnsembleCoordinator                       │
//! │  • Spawns one task per Variant (bounded by a semaphore)    │
//! │  • Joins every task, one Candidate each                    │
//! └─────────────────────────┬─────────────────────────────────┘
//!                           │
//!           ┌───────────────┼───────────────┐
//!           ▼               ▼               ▼
//!     ┌───────────┐   ┌───────────┐   ┌───────────┐
//!     │  Variant  │   │  Variant  │   │  Variant  │
//!     │  Runner   │   │  Runner   │   │  Runner   │
//!     └─────┬─────┘   └─────┬─────┘   └─────┬─────┘
//!           └───────────────┼───────────────┘
//!                           ▼
//!                    ┌─────────────┐
//!                    │  Reranker   │ ──► SelectionResult
//!                    └─────────────┘
//! ```
//!
//! # Components
//!
//! - **EnsembleCoordinator**: fan-out/fan-in over variants
//! - **VariantRunner**: one session, one run, one Candidate
//! - **Reranker**: pluggable scoring; longest reply wins by default

pub mod coordinator;
pub mod rerank;
pub mod runner;
pub mod types;

pub use coordinator::{
    EnsembleConfig, EnsembleCoordinator, SharedEnsembleCoordinator, SharedSessionClient,
    DEFAULT_MAX_CONCURRENCY,
};
pub use rerank::{LongestResponse, Reranker, SharedReranker, VerifierWeighted};
pub use runner::{run_template, VariantRunner};
pub use types::{Candidate, CandidateStatus, RunRecord, SelectionResult, Variant};
