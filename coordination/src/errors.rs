//! Orchestration error taxonomy with retry classification.
//!
//! Every error that can end a single variant attempt is represented here, so
//! the coordinator has one aggregation path regardless of which layer noticed
//! the failure. Callers query `is_retriable()` / `retry_category()` instead of
//! matching on strings.
//!
//! ## Retry categories
//!
//! | Category         | Retriable | Produced by                          |
//! |------------------|-----------|--------------------------------------|
//! | Transient        | yes       | transport failures, internal errors  |
//! | Timeout          | yes       | RunWaiter wall-clock budget          |
//! | PolicyViolation  | no        | unknown templates, bad configuration |
//! | Cancelled        | no        | explicit cancellation                |
//!
//! Nothing in the core retries on its own; the classification is exposed for
//! callers that want to.

use std::fmt;
use std::time::Duration;

use thiserror::Error;

/// Classification used by callers to decide whether to retry an attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryCategory {
    /// Network / auth / backend error.
    Transient,
    /// The local wall-clock budget ran out before the run finished.
    Timeout,
    /// Misconfiguration that will fail the same way every time.
    PolicyViolation,
    /// Explicitly cancelled by the caller.
    Cancelled,
}

impl RetryCategory {
    pub fn is_retriable(self) -> bool {
        matches!(self, Self::Transient | Self::Timeout)
    }
}

impl fmt::Display for RetryCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Transient => write!(f, "transient"),
            Self::Timeout => write!(f, "timeout"),
            Self::PolicyViolation => write!(f, "policy_violation"),
            Self::Cancelled => write!(f, "cancelled"),
        }
    }
}

/// A call to the remote agent service failed (network, auth, bad payload).
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum TransportError {
    /// The request never produced a response.
    #[error("request to {operation} failed: {message}")]
    Request { operation: String, message: String },

    /// The service answered with a non-success status code.
    #[error("{operation} returned HTTP {status}: {body}")]
    Status {
        operation: String,
        status: u16,
        body: String,
    },

    /// The response body did not match the expected shape.
    #[error("malformed {operation} response: {message}")]
    Decode { operation: String, message: String },
}

impl TransportError {
    pub fn request(operation: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Request {
            operation: operation.into(),
            message: message.into(),
        }
    }

    pub fn decode(operation: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Decode {
            operation: operation.into(),
            message: message.into(),
        }
    }

    /// Name of the remote operation that failed.
    pub fn operation(&self) -> &str {
        match self {
            Self::Request { operation, .. }
            | Self::Status { operation, .. }
            | Self::Decode { operation, .. } => operation,
        }
    }
}

/// A named system-instruction template is not in the registry.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("unknown template '{name}' (known: {known})")]
pub struct TemplateNotFoundError {
    pub name: String,
    pub known: String,
}

/// Unified error type for a single variant attempt.
#[derive(Debug, Error)]
pub enum OrchestrationError {
    /// A remote call failed; propagated without retry.
    #[error("transport error: {0}")]
    Transport(#[from] TransportError),

    /// The run did not reach a terminal state within the budget.
    #[error("run did not finish within {}s", .waited.as_secs_f64())]
    Timeout { waited: Duration },

    /// Template lookup failed before any remote call was made.
    #[error(transparent)]
    TemplateNotFound(#[from] TemplateNotFoundError),

    /// Configuration is invalid or missing required fields.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// The attempt was cancelled before it produced a candidate.
    #[error("cancelled: {0}")]
    Cancelled(String),

    /// Anything else, including a panicked variant task.
    #[error("internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl OrchestrationError {
    pub fn retry_category(&self) -> RetryCategory {
        match self {
            Self::Transport(_) | Self::Internal(_) => RetryCategory::Transient,
            Self::Timeout { .. } => RetryCategory::Timeout,
            Self::TemplateNotFound(_) | Self::Configuration(_) => RetryCategory::PolicyViolation,
            Self::Cancelled(_) => RetryCategory::Cancelled,
        }
    }

    /// Returns `true` if a caller may reasonably retry after this error.
    pub fn is_retriable(&self) -> bool {
        self.retry_category().is_retriable()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transport_error_is_retriable() {
        let err: OrchestrationError = TransportError::request("open_session", "refused").into();
        assert!(err.is_retriable());
        assert_eq!(err.retry_category(), RetryCategory::Transient);
        assert!(err.to_string().contains("open_session"));
    }

    #[test]
    fn template_not_found_is_terminal() {
        let err: OrchestrationError = TemplateNotFoundError {
            name: "planner".into(),
            known: "generator, selector, verifier".into(),
        }
        .into();
        assert!(!err.is_retriable());
        assert_eq!(
            err.to_string(),
            "unknown template 'planner' (known: generator, selector, verifier)"
        );
    }

    #[test]
    fn timeout_reports_budget() {
        let err = OrchestrationError::Timeout {
            waited: Duration::from_secs(30),
        };
        assert_eq!(err.retry_category(), RetryCategory::Timeout);
        assert_eq!(err.to_string(), "run did not finish within 30s");
    }

    #[test]
    fn status_error_names_operation() {
        let err = TransportError::Status {
            operation: "poll_run".into(),
            status: 401,
            body: "unauthorized".into(),
        };
        assert_eq!(err.operation(), "poll_run");
        assert_eq!(err.to_string(), "poll_run returned HTTP 401: unauthorized");
    }
}
