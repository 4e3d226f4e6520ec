//! Command-line entry points.
//!
//! | Command    | Does                                              | Exit            |
//! |------------|---------------------------------------------------|-----------------|
//! | `run`      | one named template, one run                       | 0, 2 bad name   |
//! | `ask`      | plain user prompt, no system instruction          | 0 ok, 1 not ok  |
//! | `ensemble` | N variants in parallel, reranked                  | 0 winner, 1 not |
//! | `select`   | routing decision for a context snippet            | 0               |
//! | `verify`   | deterministic gate over a candidate JSON document | 0 PASS, 1 FAIL  |
//!
//! Every command prints one pretty JSON document to stdout. `--dry-run`
//! swaps the HTTP client for an in-process scripted one.

use std::io::{Read, Write};
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use coordination::errors::OrchestrationError;
use coordination::router::{
    compress_context, AgentRouter, DecisionSource, Selector, MAX_CONTEXT_LINES,
};
use coordination::{
    run_template, AgentSessionClient, Candidate, CandidateDocument, CandidateStatus,
    CommandLinter, EnsembleCoordinator, ScriptedClient, SharedSessionClient, TemplateRegistry,
    Variant, Verifier,
};
use serde::Serialize;
use serde_json::{json, Value};
use tracing::info;

use crate::config::{default_variants, load_variants, AgentConfig};
use crate::foundry::FoundryClient;

pub const EXIT_OK: i32 = 0;
pub const EXIT_FAILURE: i32 = 1;
pub const EXIT_USAGE: i32 = 2;

/// Characters of compressed context echoed by `select`.
const MAX_ECHOED_CONTEXT: usize = 2000;

/// External linter `verify` looks for on PATH.
const DEFAULT_LINTER: &str = "flake8";

#[derive(Debug, Parser)]
#[command(
    name = "ensemble-agents",
    version,
    about = "Run prompts against a remote agent, alone or as a reranked ensemble"
)]
pub struct Cli {
    /// Simulate the remote service locally; no network calls are made
    #[arg(long, global = true)]
    pub dry_run: bool,

    /// Endpoint override (defaults to AGENT_ENDPOINT)
    #[arg(long, global = true)]
    pub endpoint: Option<String>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Run a named thread template (generator, selector, verifier)
    Run {
        template: String,
        prompt: Option<String>,
    },
    /// Send one prompt to the agent and print the conversation
    Ask {
        #[arg(default_value = "Hello Agent")]
        prompt: String,
        /// Do not echo messages to stderr
        #[arg(long)]
        quiet: bool,
    },
    /// Run several variants in parallel and pick the best reply
    Ensemble {
        prompt: String,
        /// Variants in flight at once
        #[arg(long, default_value_t = 3)]
        workers: usize,
        /// TOML file with [[variant]] tables
        #[arg(long)]
        variants: Option<PathBuf>,
        /// Per-run timeout in seconds (defaults to AGENT_RUN_TIMEOUT_SECS)
        #[arg(long)]
        timeout: Option<u64>,
        /// Verify the chosen candidate; exit 1 if it fails
        #[arg(long)]
        verify: bool,
    },
    /// Decide whether a generation attempt is worthwhile
    Select {
        action: String,
        /// Context snippet (test output, source excerpt, ...)
        #[arg(long, default_value = "")]
        snippet: String,
        /// Ask the agent first, falling back to the rule table
        #[arg(long)]
        agent: bool,
    },
    /// Verify a candidate JSON document ({messages, patch})
    Verify {
        /// File to read, or - for stdin
        #[arg(default_value = "-")]
        file: String,
    },
}

/// Standard streams, injectable for tests.
pub struct Console<'a> {
    pub input: &'a mut dyn Read,
    pub out: &'a mut dyn Write,
    pub err: &'a mut dyn Write,
}

impl Cli {
    /// Run the parsed command and return the process exit code.
    pub async fn execute(self, config: AgentConfig, console: &mut Console<'_>) -> Result<i32> {
        let config = config.with_endpoint(self.endpoint);
        let dry_run = self.dry_run;

        match self.command {
            Command::Run { template, prompt } => {
                run_command(&config, dry_run, &template, prompt.as_deref(), console).await
            }
            Command::Ask { prompt, quiet } => {
                ask_command(&config, dry_run, &prompt, quiet, console).await
            }
            Command::Ensemble {
                prompt,
                workers,
                variants,
                timeout,
                verify,
            } => {
                let config = config.with_run_timeout(timeout);
                ensemble_command(&config, dry_run, &prompt, workers, variants, verify, console)
                    .await
            }
            Command::Select {
                action,
                snippet,
                agent,
            } => select_command(&config, dry_run, &action, &snippet, agent, console).await,
            Command::Verify { file } => verify_command(&file, console),
        }
    }
}

fn session_client(config: &AgentConfig, dry_run: bool) -> Result<SharedSessionClient> {
    if dry_run {
        info!("dry run: using the scripted in-process client");
        return Ok(Arc::new(ScriptedClient::dry_run()));
    }
    let client = FoundryClient::from_config(config)?;
    info!(endpoint = %client.endpoint(), "using remote agent service");
    Ok(Arc::new(client))
}

fn write_json<T: Serialize>(out: &mut dyn Write, value: &T) -> Result<()> {
    let text = serde_json::to_string_pretty(value).context("Failed to serialize output")?;
    writeln!(out, "{text}").context("Failed to write output")?;
    Ok(())
}

// ── run ─────────────────────────────────────────────────────────────────────

async fn run_command(
    config: &AgentConfig,
    dry_run: bool,
    template: &str,
    prompt: Option<&str>,
    console: &mut Console<'_>,
) -> Result<i32> {
    let registry = TemplateRegistry::default();
    if let Err(e) = registry.get(template) {
        writeln!(console.err, "error: {e}")?;
        return Ok(EXIT_USAGE);
    }

    let client = session_client(config, dry_run)?;
    let runner = config.ensemble(1).runner();

    let candidate = match run_template(client.as_ref(), &registry, &runner, template, prompt).await
    {
        Ok(candidate) => candidate,
        Err(e) => Candidate::errored(template, &e),
    };
    if let Some(session) = &candidate.session_id {
        writeln!(console.err, "Created thread, ID: {session}")?;
    }

    write_json(console.out, &candidate.to_record())?;
    Ok(EXIT_OK)
}

// ── ask ─────────────────────────────────────────────────────────────────────

/// One run with no system instruction, so the agent sees only `prompt`.
async fn ask_once(
    client: &dyn AgentSessionClient,
    config: &AgentConfig,
    prompt: &str,
) -> Result<Candidate, OrchestrationError> {
    let ask = Variant::new("ask", "");
    config.ensemble(1).runner().run(client, &ask, Some(prompt)).await
}

async fn ask_command(
    config: &AgentConfig,
    dry_run: bool,
    prompt: &str,
    quiet: bool,
    console: &mut Console<'_>,
) -> Result<i32> {
    let client = session_client(config, dry_run)?;

    let candidate = match ask_once(client.as_ref(), config, prompt).await {
        Ok(outcome) => outcome,
        Err(e) => {
            if !quiet {
                writeln!(console.err, "Run failed: {e}")?;
            }
            write_json(
                console.out,
                &json!({ "status": "error", "error": e.to_string() }),
            )?;
            return Ok(EXIT_FAILURE);
        }
    };

    let status = candidate.status;
    if status != CandidateStatus::Succeeded {
        let error = candidate
            .error
            .unwrap_or_else(|| format!("run ended as {status}"));
        if !quiet {
            writeln!(console.err, "Run failed: {error}")?;
        }
        write_json(console.out, &json!({ "status": status, "error": error }))?;
        return Ok(EXIT_FAILURE);
    }

    if !quiet {
        for message in &candidate.messages {
            writeln!(console.err, "{}: {}", message.role, message.text)?;
        }
    }
    write_json(
        console.out,
        &json!({ "status": status, "messages": candidate.messages }),
    )?;
    Ok(EXIT_OK)
}

// ── ensemble ────────────────────────────────────────────────────────────────

async fn ensemble_command(
    config: &AgentConfig,
    dry_run: bool,
    prompt: &str,
    workers: usize,
    variants: Option<PathBuf>,
    verify: bool,
    console: &mut Console<'_>,
) -> Result<i32> {
    let variants = match variants {
        Some(path) => load_variants(&path)?,
        None => default_variants(),
    };

    let client = session_client(config, dry_run)?;
    let coordinator = EnsembleCoordinator::new(client, config.ensemble(workers));
    let result = coordinator.generate(prompt, &variants).await;

    let mut output = json!({
        "chosen": &result.chosen,
        "candidates": &result.candidates,
    });

    let mut accepted = result.has_winner();
    if verify {
        let verification = result.chosen.as_ref().map(|c| Verifier::new().verify(c));
        accepted = verification.as_ref().is_some_and(|v| v.passed());
        output["verification"] = serde_json::to_value(&verification)?;
    }

    write_json(console.out, &output)?;
    Ok(if accepted { EXIT_OK } else { EXIT_FAILURE })
}

// ── select ──────────────────────────────────────────────────────────────────

async fn select_command(
    config: &AgentConfig,
    dry_run: bool,
    action: &str,
    snippet: &str,
    agent: bool,
    console: &mut Console<'_>,
) -> Result<i32> {
    let (decision, source) = if agent {
        let client = session_client(config, dry_run)?;
        let router = AgentRouter::new(
            config.ensemble(1).runner(),
            TemplateRegistry::default().shared(),
        );
        router.route(client.as_ref(), snippet, action).await
    } else {
        (Selector::new().decide(snippet, action), DecisionSource::Heuristic)
    };

    let compressed: String = compress_context(snippet, MAX_CONTEXT_LINES)
        .chars()
        .take(MAX_ECHOED_CONTEXT)
        .collect();
    let source = match source {
        DecisionSource::Agent => "agent",
        DecisionSource::Heuristic => "heuristic",
    };

    write_json(
        console.out,
        &json!({ "compressed": compressed, "decision": decision, "source": source }),
    )?;
    Ok(EXIT_OK)
}

// ── verify ──────────────────────────────────────────────────────────────────

fn verify_command(file: &str, console: &mut Console<'_>) -> Result<i32> {
    let mut text = String::new();
    if file == "-" {
        console
            .input
            .read_to_string(&mut text)
            .context("Failed to read candidate from stdin")?;
    } else {
        text = std::fs::read_to_string(file)
            .with_context(|| format!("Failed to read candidate file {file}"))?;
    }

    let value: Value = serde_json::from_str(&text).context("Candidate is not valid JSON")?;
    let document: CandidateDocument =
        serde_json::from_value(value).context("Candidate does not match {messages, patch}")?;

    let verifier = Verifier::new().with_linter(Arc::new(CommandLinter::new(DEFAULT_LINTER)));
    let result = verifier.verify_document(&document);

    write_json(console.out, &result)?;
    Ok(if result.passed() { EXIT_OK } else { EXIT_FAILURE })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cli_definition_is_consistent() {
        use clap::CommandFactory;
        Cli::command().debug_assert();
    }

    #[test]
    fn ask_defaults_to_hello_agent() {
        let cli = Cli::try_parse_from(["ensemble-agents", "ask", "--dry-run"]).unwrap();
        assert!(cli.dry_run);
        match cli.command {
            Command::Ask { prompt, quiet } => {
                assert_eq!(prompt, "Hello Agent");
                assert!(!quiet);
            }
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn ensemble_defaults_to_three_workers() {
        let cli = Cli::try_parse_from(["ensemble-agents", "ensemble", "fix test foo"]).unwrap();
        match cli.command {
            Command::Ensemble {
                workers, verify, ..
            } => {
                assert_eq!(workers, 3);
                assert!(!verify);
            }
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn verify_reads_stdin_by_default() {
        let cli = Cli::try_parse_from(["ensemble-agents", "verify"]).unwrap();
        assert!(matches!(cli.command, Command::Verify { file } if file == "-"));
    }
}
