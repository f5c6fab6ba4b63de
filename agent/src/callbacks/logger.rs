use crate::Result;
use crate::callbacks::Callback;
use crate::llm::Message;
use tracing::info;

pub const RESULT_LOG_LIMIT: usize = 500;

/// Caps `text` at `limit` characters, replacing the excess with `...`.
pub fn truncate(text: &str, limit: usize) -> String {
    if text.chars().count() <= limit {
        return text.to_string();
    }

    let mut s: String = text.chars().take(limit.saturating_sub(3)).collect();
    s.push_str("...");
    s
}

/// Logs each message once, the first time it shows up in the transcript.
pub struct TranscriptLogger {
    seen: usize,
    limit: usize,
}

impl TranscriptLogger {
    pub fn new() -> Box<Self> {
        Self::with_limit(RESULT_LOG_LIMIT)
    }

    pub fn with_limit(limit: usize) -> Box<Self> {
        Box::new(Self { seen: 0, limit })
    }

    fn log_message(&self, round: usize, message: &Message) {
        match message {
            Message::Assistant(content, calls) => {
                let reply = if content.is_empty() {
                    "<tool call>".to_string()
                } else {
                    truncate(content, self.limit)
                };
                info!("Round {} - assistant reply: {}", round, reply);

                for call in calls {
                    info!(
                        "Tool call requested: {} with args {}",
                        call.name,
                        truncate(&call.args, self.limit)
                    );
                }
            }
            Message::Tool { name, result, .. } => {
                info!("Tool result ({}): {}", name, truncate(result, self.limit));
            }
            other => {
                info!(
                    "Round {} - {} message: {}",
                    round,
                    other.role(),
                    truncate(other.content(), self.limit)
                );
            }
        }
    }
}

impl Callback for TranscriptLogger {
    fn call(&mut self, round: usize, messages: &[Message]) -> Result<()> {
        // the transcript is append-only, so everything past `seen` is new
        for message in messages.iter().skip(self.seen) {
            self.log_message(round, message);
        }
        self.seen = messages.len();

        Ok(())
    }
}
