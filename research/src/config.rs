use agent::{Error, Result};
use clap::Parser;
use std::time::Duration;
use tracing::Level;

pub const DEFAULT_MODEL: &str = "gpt-5";
pub const TAVILY_BASE_URL: &str = "https://api.tavily.com";

const TAVILY_API_KEY: &str = "TAVILY_API_KEY";
const OPENAI_API_KEY: &str = "OPENAI_API_KEY";

#[derive(Parser, Debug)]
#[command(name = "research", about = "Run the research agent.")]
pub struct Cli {
    /// Research topic or question the agent should investigate.
    pub research_prompt: String,

    /// Optional custom OpenAI-compatible base URL.
    #[arg(long, default_value = "")]
    pub base_url: String,

    /// Model name to use.
    #[arg(long, default_value = DEFAULT_MODEL)]
    pub model: String,

    /// Maximum interaction rounds before forcing completion.
    #[arg(long, default_value_t = agent::DEFAULT_MAX_ROUNDS)]
    pub max_rounds: usize,

    /// Logging level (TRACE, DEBUG, INFO, WARN, ERROR).
    #[arg(long, default_value = "INFO")]
    pub log_level: String,

    /// Connect and read timeout for each search/extract request, in seconds.
    #[arg(long, default_value_t = 30)]
    pub request_timeout: u64,
}

/// Everything a run needs, resolved once at startup.
#[derive(Clone)]
pub struct Config {
    pub research_prompt: String,
    pub model: String,
    pub base_url: Option<String>,
    pub max_rounds: usize,
    pub request_timeout: Duration,
    pub tavily_api_key: String,
    pub tavily_base_url: String,
    pub openai_api_key: String,
}

impl Config {
    /// `lookup` resolves environment variables; a missing or blank
    /// credential is a configuration error.
    pub fn from_cli<F>(cli: Cli, lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let required = |key: &str| {
            lookup(key)
                .map(|value| value.trim().to_string())
                .filter(|value| !value.is_empty())
                .ok_or(Error::ConfigError(format!(
                    "{} is required in the environment or .env file.",
                    key
                )))
        };

        let tavily_api_key = required(TAVILY_API_KEY)?;
        let openai_api_key = required(OPENAI_API_KEY)?;

        if cli.max_rounds == 0 {
            return Err(Error::ConfigError(
                "--max-rounds must be at least 1".to_string(),
            ));
        }

        if cli.request_timeout == 0 {
            return Err(Error::ConfigError(
                "--request-timeout must be at least 1 second".to_string(),
            ));
        }

        let base_url = Some(cli.base_url.trim().to_string()).filter(|url| !url.is_empty());

        Ok(Self {
            research_prompt: cli.research_prompt,
            model: cli.model,
            base_url,
            max_rounds: cli.max_rounds,
            request_timeout: Duration::from_secs(cli.request_timeout),
            tavily_api_key,
            tavily_base_url: lookup("TAVILY_BASE_URL")
                .filter(|url| !url.trim().is_empty())
                .unwrap_or_else(|| TAVILY_BASE_URL.to_string()),
            openai_api_key,
        })
    }
}

impl std::fmt::Debug for Config {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Config")
            .field("model", &self.model)
            .field("base_url", &self.base_url)
            .field("max_rounds", &self.max_rounds)
            .field("request_timeout", &self.request_timeout)
            .field("tavily_base_url", &self.tavily_base_url)
            .finish_non_exhaustive()
    }
}

/// Accepts tracing level names in any case, plus the `WARNING`/`CRITICAL`
/// spellings.
pub fn parse_log_level(level: &str) -> Result<Level> {
    match level.trim().to_ascii_lowercase().as_str() {
        "warning" => Ok(Level::WARN),
        "critical" | "fatal" => Ok(Level::ERROR),
        other => other
            .parse::<Level>()
            .map_err(|_| Error::ConfigError(format!("invalid log level: {}", level))),
    }
}
