use crate::callbacks;
use crate::llm::{self, Message, ToolChoice};
use crate::tools;
use crate::transcript::Transcript;
use crate::{Error, Result};
use futures::future::try_join_all;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, info};

pub const DEFAULT_MAX_ROUNDS: usize = 15;

const FINAL_ROUND_PROMPT: &str = "You have reached the maximum number of rounds. \
Do not request additional tool calls. Return your final answer now.";

type Tool = Box<dyn tools::Tool + Send + Sync>;
type Callback = Box<dyn callbacks::Callback + Send>;

/// The final answer of a run along with the history that produced it.
#[derive(Debug)]
pub struct Completion {
    pub answer: String,
    pub rounds: usize,
    pub transcript: Transcript,
}

pub struct Agent {
    llm: Arc<dyn llm::LLM + Send + Sync>,
    tools: HashMap<String, Tool>,
    callbacks: Vec<Callback>,
    tool_defs: Vec<tools::ToolDefinition>,
    max_rounds: usize,
    final_round_prompt: String,
}

impl Agent {
    pub fn max_rounds(&self) -> usize {
        self.max_rounds
    }

    /// Runs every call of one assistant message concurrently. Results come
    /// back in request order; the first failure cancels the rest.
    async fn execute_tool_calls(&self, calls: &[tools::ToolCall]) -> Result<Vec<Message>> {
        let dispatch = calls
            .iter()
            .map(|call| {
                self.tools
                    .get(&call.name)
                    .map(|tool| (tool, call))
                    .ok_or(Error::ToolDoesNotExist(call.name.clone()))
            })
            .collect::<Result<Vec<_>>>()?;

        try_join_all(dispatch.into_iter().map(|(tool, call)| tool.invoke(call))).await
    }

    fn notify(&mut self, round: usize, transcript: &Transcript) -> Result<()> {
        for callback in &mut self.callbacks {
            callback.call(round, transcript.messages())?;
        }
        Ok(())
    }

    pub async fn run(&mut self, mut transcript: Transcript) -> Result<Completion> {
        for round in 1..=self.max_rounds {
            let final_round = round == self.max_rounds;

            // last round: tools withheld, model told to answer
            if final_round {
                transcript.push_system(self.final_round_prompt.clone())?;
            }
            self.notify(round, &transcript)?;

            info!("Round {} of {}", round, self.max_rounds);

            let (tool_defs, tool_choice): (&[tools::ToolDefinition], _) = if final_round {
                (&[], ToolChoice::None)
            } else {
                (&self.tool_defs, ToolChoice::Auto)
            };

            let next = self
                .llm
                .completion(llm::CompletionRequest {
                    messages: transcript.messages(),
                    tools: tool_defs,
                    tool_choice,
                })
                .await?;

            transcript.push_assistant(Message::Assistant(
                next.content.clone(),
                next.tool_calls.clone(),
            ))?;
            self.notify(round, &transcript)?;

            if !next.tool_calls.is_empty() {
                if final_round {
                    return Err(Error::FinalRoundToolRequest(round));
                }

                debug!(round, calls = next.tool_calls.len(), "executing tool calls");
                let results = self.execute_tool_calls(&next.tool_calls).await?;
                transcript.push_tool_results(results)?;
                self.notify(round, &transcript)?;
                continue;
            }

            let answer = next.content.trim();
            if !answer.is_empty() {
                return Ok(Completion {
                    answer: answer.to_string(),
                    rounds: round,
                    transcript,
                });
            }

            debug!(round, "empty reply without tool calls");
        }

        Err(Error::RoundsExhausted(self.max_rounds))
    }
}

pub struct AgentBuilder {
    llm: Option<Arc<dyn llm::LLM + Send + Sync>>,
    tools: Vec<Tool>,
    callbacks: Vec<Callback>,
    max_rounds: usize,
    final_round_prompt: String,
}

impl AgentBuilder {
    pub fn new() -> Self {
        Self {
            llm: None,
            tools: Vec::new(),
            callbacks: Vec::new(),
            max_rounds: DEFAULT_MAX_ROUNDS,
            final_round_prompt: FINAL_ROUND_PROMPT.to_string(),
        }
    }

    pub fn llm(mut self, llm: Arc<dyn llm::LLM + Send + Sync>) -> Self {
        self.llm = Some(llm);
        self
    }

    pub fn tool(mut self, tool: Tool) -> Self {
        self.tools.push(tool);
        self
    }

    pub fn tools(mut self, tools: Vec<Tool>) -> Self {
        self.tools.extend(tools);
        self
    }

    pub fn callback(mut self, callback: Callback) -> Self {
        self.callbacks.push(callback);
        self
    }

    pub fn max_rounds(mut self, max_rounds: usize) -> Self {
        self.max_rounds = max_rounds;
        self
    }

    pub fn final_round_prompt(mut self, prompt: String) -> Self {
        self.final_round_prompt = prompt;
        self
    }

    pub fn build(self) -> Result<Agent> {
        if self.max_rounds == 0 {
            return Err(Error::ConfigError(
                "max rounds must be at least 1".to_string(),
            ));
        }

        let mut tool_defs = Vec::new();
        let mut tools = HashMap::new();

        for tool in self.tools {
            let def = tool.definition()?;
            if tools.contains_key(&def.name) {
                return Err(Error::ConfigError(format!(
                    "tool {} registered twice",
                    def.name
                )));
            }
            tools.insert(def.name.clone(), tool);
            tool_defs.push(def);
        }

        Ok(Agent {
            llm: self
                .llm
                .ok_or(Error::MissingArg("llm is required for agent".to_string()))?,
            tools,
            tool_defs,
            callbacks: self.callbacks,
            max_rounds: self.max_rounds,
            final_round_prompt: self.final_round_prompt,
        })
    }
}

impl Default for AgentBuilder {
    fn default() -> Self {
        Self::new()
    }
}
