//! Agent-facing half of the ensemble pipeline.
//!
//! - `foundry`: HTTP implementation of the session contract
//! - `config`: environment-driven settings and variant files
//! - `logging`: tracing subscriber setup
//! - `cli`: command-line entry points

pub mod cli;
pub mod config;
pub mod foundry;
pub mod logging;

pub use cli::{Cli, Command, Console};
pub use config::AgentConfig;
pub use foundry::FoundryClient;
