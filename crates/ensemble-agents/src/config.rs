use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use coordination::errors::OrchestrationError;
use coordination::session::waiter::{DEFAULT_POLL_INTERVAL, DEFAULT_RUN_TIMEOUT};
use coordination::{EnsembleConfig, Variant};
use serde::Deserialize;
use tracing::warn;

/// Default REST API version sent as the `api-version` query parameter.
pub const DEFAULT_API_VERSION: &str = "v1";

/// Remote agent service configuration.
#[derive(Debug, Clone)]
pub struct AgentConfig {
    /// Project endpoint URL (`AGENT_ENDPOINT`)
    pub endpoint: Option<String>,
    /// Agent / assistant id every run targets (`AGENT_ID`)
    pub agent_id: Option<String>,
    /// Bearer token attached to requests (`AGENT_API_KEY`)
    pub api_key: Option<String>,
    /// `AGENT_API_VERSION`
    pub api_version: String,
    /// Wall-clock budget per run (`AGENT_RUN_TIMEOUT_SECS`)
    pub run_timeout: Duration,
    /// Delay between run polls (`AGENT_POLL_INTERVAL_MS`)
    pub poll_interval: Duration,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            endpoint: non_empty_env("AGENT_ENDPOINT"),
            agent_id: non_empty_env("AGENT_ID"),
            api_key: non_empty_env("AGENT_API_KEY"),
            api_version: non_empty_env("AGENT_API_VERSION")
                .unwrap_or_else(|| DEFAULT_API_VERSION.into()),
            run_timeout: parse_env("AGENT_RUN_TIMEOUT_SECS")
                .map(Duration::from_secs)
                .unwrap_or(DEFAULT_RUN_TIMEOUT),
            poll_interval: parse_env("AGENT_POLL_INTERVAL_MS")
                .map(Duration::from_millis)
                .unwrap_or(DEFAULT_POLL_INTERVAL),
        }
    }
}

impl AgentConfig {
    pub fn with_endpoint(mut self, endpoint: Option<String>) -> Self {
        if endpoint.is_some() {
            self.endpoint = endpoint;
        }
        self
    }

    pub fn with_run_timeout(mut self, secs: Option<u64>) -> Self {
        if let Some(secs) = secs {
            self.run_timeout = Duration::from_secs(secs);
        }
        self
    }

    /// Endpoint and agent id, both required for talking to the real service.
    pub fn remote(&self) -> Result<(&str, &str), OrchestrationError> {
        let endpoint = self.endpoint.as_deref().ok_or_else(|| {
            OrchestrationError::Configuration(
                "AGENT_ENDPOINT is not set (or pass --endpoint)".into(),
            )
        })?;
        let agent_id = self
            .agent_id
            .as_deref()
            .ok_or_else(|| OrchestrationError::Configuration("AGENT_ID is not set".into()))?;
        Ok((endpoint, agent_id))
    }

    /// Ensemble settings derived from this config.
    pub fn ensemble(&self, max_concurrency: usize) -> EnsembleConfig {
        EnsembleConfig::new(self.agent_id.clone().unwrap_or_default())
            .with_max_concurrency(max_concurrency)
            .with_run_timeout(self.run_timeout)
            .with_poll_interval(self.poll_interval)
    }
}

fn non_empty_env(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}

fn parse_env<T: FromStr>(key: &str) -> Option<T> {
    let raw = non_empty_env(key)?;
    match raw.trim().parse() {
        Ok(value) => Some(value),
        Err(_) => {
            warn!(key, value = %raw, "ignoring unparseable environment value");
            None
        }
    }
}

// ── Variants ────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
struct VariantFile {
    #[serde(default, rename = "variant")]
    variants: Vec<Variant>,
}

/// Built-in variants used when no variants file is given.
pub fn default_variants() -> Vec<Variant> {
    vec![
        Variant::new(
            "low_temp",
            "You are a precise code generator. Respond concisely. Temperature=0.1",
        ),
        Variant::new(
            "medium",
            "You are a helpful coder. Provide a patch if needed. Temperature=0.3",
        ),
        Variant::new(
            "creative",
            "You are an experimental assistant. Suggest alternative fixes. Temperature=0.7",
        ),
    ]
}

/// Parse `[[variant]]` tables from TOML text.
pub fn parse_variants(text: &str) -> Result<Vec<Variant>> {
    let file: VariantFile = toml::from_str(text).context("Failed to parse variants file")?;
    if file.variants.is_empty() {
        bail!("variants file defines no [[variant]] entries");
    }
    Ok(file.variants)
}

/// Load variants from a TOML file.
pub fn load_variants(path: &Path) -> Result<Vec<Variant>> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read variants file {}", path.display()))?;
    parse_variants(&text).with_context(|| format!("Invalid variants file {}", path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(endpoint: Option<&str>, agent_id: Option<&str>) -> AgentConfig {
        AgentConfig {
            endpoint: endpoint.map(String::from),
            agent_id: agent_id.map(String::from),
            api_key: None,
            api_version: DEFAULT_API_VERSION.into(),
            run_timeout: DEFAULT_RUN_TIMEOUT,
            poll_interval: DEFAULT_POLL_INTERVAL,
        }
    }

    #[test]
    fn remote_requires_endpoint_and_agent() {
        assert!(config(None, Some("asst")).remote().is_err());
        assert!(config(Some("https://x"), None).remote().is_err());
        assert_eq!(
            config(Some("https://x"), Some("asst")).remote().unwrap(),
            ("https://x", "asst")
        );
    }

    #[test]
    fn flag_overrides_only_when_given() {
        let base = config(Some("https://env"), Some("asst"));
        assert_eq!(
            base.clone().with_endpoint(None).endpoint.as_deref(),
            Some("https://env")
        );
        assert_eq!(
            base.with_endpoint(Some("https://flag".into()))
                .with_run_timeout(Some(7))
                .run_timeout,
            Duration::from_secs(7)
        );
    }

    #[test]
    fn ensemble_config_carries_timing() {
        let mut cfg = config(Some("https://x"), Some("asst"));
        cfg.poll_interval = Duration::from_millis(50);
        let ensemble = cfg.ensemble(3);
        assert_eq!(ensemble.agent_id, "asst");
        assert_eq!(ensemble.max_concurrency, 3);
        assert_eq!(ensemble.poll_interval, Duration::from_millis(50));
    }

    #[test]
    fn default_variants_match_builtin_names() {
        let names: Vec<_> = default_variants().into_iter().map(|v| v.name).collect();
        assert_eq!(names, vec!["low_temp", "medium", "creative"]);
    }

    #[test]
    fn variants_file_round_trips_from_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("variants.toml");
        std::fs::write(
            &path,
            r#"
[[variant]]
name = "terse"
system = "Answer in one line."

[[variant]]
name = "careful"
system_instruction = "Explain every step."
"#,
        )
        .unwrap();

        let variants = load_variants(&path).unwrap();
        assert_eq!(variants.len(), 2);
        assert_eq!(variants[0], Variant::new("terse", "Answer in one line."));
        assert_eq!(variants[1].system_instruction, "Explain every step.");
    }

    #[test]
    fn empty_or_missing_variants_file_is_an_error() {
        assert!(parse_variants("").is_err());
        assert!(load_variants(Path::new("/definitely/not/here.toml")).is_err());
    }
}
