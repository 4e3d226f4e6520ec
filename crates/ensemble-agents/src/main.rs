use std::process::ExitCode;

use clap::Parser;
use ensemble_agents::{logging, AgentConfig, Cli, Console};

#[tokio::main]
async fn main() -> ExitCode {
    logging::init();
    let cli = Cli::parse();

    let mut stdin = std::io::stdin().lock();
    let mut stdout = std::io::stdout().lock();
    let mut stderr = std::io::stderr();
    let mut console = Console {
        input: &mut stdin,
        out: &mut stdout,
        err: &mut stderr,
    };

    match cli.execute(AgentConfig::default(), &mut console).await {
        Ok(code) => ExitCode::from(code.clamp(0, 255) as u8),
        Err(e) => {
            tracing::error!("{e:#}");
            eprintln!("error: {e:#}");
            ExitCode::FAILURE
        }
    }
}
