//! Verifier Module — deterministic post-generation gate
//!
//! Applied to a chosen candidate before it is accepted. Every check is pure
//! and produces issue strings rather than errors.
//!
//! # Checks
//!
//! | Check        | Input          | When                  |
//! |--------------|----------------|-----------------------|
//! | secret scan  | message text   | always                |
//! | diff shape   | `patch`        | patch present         |
//! | lint         | `patch`        | patch present         |
//!
//! # Usage
//!
//! ```rust,ignore
//! use coordination::verifier::Verifier;
//!
//! let result = Verifier::new().verify(&candidate);
//! println!("{} ({})", result.verdict, result.confidence);
//! ```

pub mod lint;
pub mod pipeline;
pub mod report;
pub mod secret_scan;

pub use lint::{CommandLinter, NoLint, PatchLinter};
pub use pipeline::{check_diff_shape, CandidateDocument, Verifier};
pub use report::{Verdict, VerificationResult};
