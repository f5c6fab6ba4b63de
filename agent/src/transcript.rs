//! Append-only conversation history.
//!
//! The first message is always the system directive. Tool results may only
//! be appended directly after the assistant message that requested them,
//! each answering one of its calls exactly once and in request order.

use crate::llm::Message;
use crate::{Error, Result};

#[derive(Clone, Debug)]
pub struct Transcript {
    messages: Vec<Message>,
    // index of the assistant message whose tool calls are still unanswered
    pending: Option<usize>,
}

impl Transcript {
    pub fn new(system_prompt: String, user_prompt: String) -> Self {
        Self {
            messages: vec![Message::System(system_prompt), Message::User(user_prompt)],
            pending: None,
        }
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn push_system(&mut self, content: String) -> Result<()> {
        self.ensure_settled()?;
        self.messages.push(Message::System(content));
        Ok(())
    }

    pub fn push_assistant(&mut self, message: Message) -> Result<()> {
        self.ensure_settled()?;
        let Message::Assistant(_, calls) = &message else {
            return Err(Error::TranscriptError(format!(
                "expected an assistant message, got {}",
                message.role()
            )));
        };

        if !calls.is_empty() {
            self.pending = Some(self.messages.len());
        }
        self.messages.push(message);
        Ok(())
    }

    /// Appends the results for the pending assistant message. The batch must
    /// answer every call, in the order the calls were made.
    pub fn push_tool_results(&mut self, results: Vec<Message>) -> Result<()> {
        let idx = self.pending.ok_or(Error::TranscriptError(
            "tool results without a pending tool call".to_string(),
        ))?;

        let Message::Assistant(_, calls) = &self.messages[idx] else {
            return Err(Error::TranscriptError(
                "pending message is not an assistant message".to_string(),
            ));
        };

        if calls.len() != results.len() {
            return Err(Error::TranscriptError(format!(
                "{} tool calls answered by {} results",
                calls.len(),
                results.len()
            )));
        }

        for (call, result) in calls.iter().zip(&results) {
            match result {
                Message::Tool { id, .. } if *id == call.id => {}
                Message::Tool { id, .. } => {
                    return Err(Error::TranscriptError(format!(
                        "tool result {} does not answer call {}",
                        id, call.id
                    )));
                }
                other => {
                    return Err(Error::TranscriptError(format!(
                        "expected a tool message, got {}",
                        other.role()
                    )));
                }
            }
        }

        self.messages.extend(results);
        self.pending = None;
        Ok(())
    }

    fn ensure_settled(&self) -> Result<()> {
        if self.pending.is_some() {
            return Err(Error::TranscriptError(
                "previous tool calls have not been answered".to_string(),
            ));
        }
        Ok(())
    }
}
