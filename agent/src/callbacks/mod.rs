use crate::Result;
use crate::llm::Message;

mod logger;
pub use logger::{RESULT_LOG_LIMIT, TranscriptLogger, truncate};

/// Observes the transcript after every append. Callbacks see the history
/// but cannot change what is sent to the model.
pub trait Callback {
    fn call(&mut self, round: usize, messages: &[Message]) -> Result<()>;
}
