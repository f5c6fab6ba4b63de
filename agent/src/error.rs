use async_openai::error::OpenAIError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("Json error: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("Openai error: {0}")]
    OpenaiError(#[from] OpenAIError),

    #[error("No response from llm: {0}")]
    LLMResponseError(String),

    #[error("Tool {0} does not exist")]
    ToolDoesNotExist(String),

    #[error("Invalid arguments for tool {name}: {args} ({source})")]
    ArgumentParseError {
        name: String,
        args: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("Invalid tool input: {0}")]
    ToolInputError(String),

    #[error("Tool backend request failed{}: {detail}", status_suffix(.status))]
    ToolBackendError { status: Option<u16>, detail: String },

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Max rounds ({0}) reached without final markdown output")]
    RoundsExhausted(usize),

    #[error("Tool calls requested on final round {0} after tools were disabled")]
    FinalRoundToolRequest(usize),

    #[error("Transcript error: {0}")]
    TranscriptError(String),

    #[error("Missing arg: {0}")]
    MissingArg(String),

    #[error("Interrupted by user")]
    Interrupted,

    #[error("IO Error: {0}")]
    IOError(#[from] std::io::Error),
}

fn status_suffix(status: &Option<u16>) -> String {
    status.map(|s| format!(" ({s})")).unwrap_or_default()
}
