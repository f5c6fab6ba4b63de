mod config;
mod research;
mod tavily;
#[cfg(test)]
mod testing;
mod tools;

use agent::{Error, Result};
use clap::Parser;
use config::{Cli, Config};
use std::io::Write;
use std::process::ExitCode;
use std::sync::Arc;
use tracing::{error, warn};
use tracing_subscriber::EnvFilter;
use tracing_subscriber::filter::LevelFilter;

fn init_logging(log_level: &str) -> Result<()> {
    let level = config::parse_log_level(log_level)?;

    // RUST_LOG, when set, overrides --log-level
    let filter = EnvFilter::builder()
        .with_default_directive(LevelFilter::from_level(level).into())
        .from_env_lossy();

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init()
        .map_err(|e| Error::ConfigError(format!("failed to initialise logging: {}", e)))
}

async fn run(config: &Config) -> Result<String> {
    let llm = agent::llm::OpenAI::new(
        config.model.clone(),
        &config.openai_api_key,
        config.base_url.as_deref(),
    );
    let client = Arc::new(tavily::TavilyClient::from_config(config)?);

    let orchestrator = research::Orchestrator::new(config, llm, client)?;

    run_until(orchestrator, &config.research_prompt, tokio::signal::ctrl_c()).await
}

/// Runs the research request until it finishes or `interrupt` resolves.
/// Dropping the run future cancels in-flight requests and closes the client.
async fn run_until<F>(
    orchestrator: research::Orchestrator,
    research_prompt: &str,
    interrupt: F,
) -> Result<String>
where
    F: Future<Output = std::io::Result<()>>,
{
    tokio::select! {
        brief = orchestrator.run(research_prompt) => brief,
        signal = interrupt => {
            signal?;
            warn!("Interrupted by user.");
            Err(Error::Interrupted)
        }
    }
}

/// Writes the brief on success. Returns the process exit status.
fn finish<W: Write>(result: Result<String>, out: &mut W) -> u8 {
    let written = result.and_then(|brief| {
        out.write_all(brief.as_bytes())?;
        out.flush()?;
        Ok(())
    });

    match written {
        Ok(()) => 0,
        Err(err) => {
            error!("{}", err);
            1
        }
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    // a missing .env file is fine, the variables may already be set
    let _ = dotenvy::dotenv();

    if let Err(err) = init_logging(&cli.log_level) {
        eprintln!("{}", err);
        return ExitCode::FAILURE;
    }

    let result = match Config::from_cli(cli, |key| std::env::var(key).ok()) {
        Ok(config) => run(&config).await,
        Err(err) => Err(err),
    };

    ExitCode::from(finish(result, &mut std::io::stdout().lock()))
}
