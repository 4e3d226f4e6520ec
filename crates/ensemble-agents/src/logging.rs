//! Diagnostics via `tracing`.
//!
//! Reads `RUST_LOG`, defaulting to `warn`. Output goes to stderr so stdout
//! carries only the JSON result.
//!
//! ```bash
//! RUST_LOG=coordination=debug,ensemble_agents=info ensemble-agents ensemble "fix test foo"
//! ```

use tracing_subscriber::EnvFilter;

/// Filter used when `RUST_LOG` is unset or invalid.
pub const DEFAULT_FILTER: &str = "warn";

pub fn init() {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));

    // A second init (e.g. from tests) keeps the first subscriber.
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}
