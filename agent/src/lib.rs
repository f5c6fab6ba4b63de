mod agent;
pub mod callbacks;
mod error;
pub mod llm;
pub mod tools;
pub mod transcript;

pub use error::Error;
pub type Result<T> = std::result::Result<T, Error>;

pub use agent::{Agent, AgentBuilder, Completion, DEFAULT_MAX_ROUNDS};
pub use transcript::Transcript;
