use crate::config::Config;
use crate::tavily::TavilyClient;
use crate::tools;
use agent::callbacks::TranscriptLogger;
use agent::llm;
use agent::{Agent, AgentBuilder, Result, Transcript};
use std::sync::Arc;
use tracing::info;

const SYSTEM_PROMPT: &str = include_str!("prompts/system.md");
const USER_PROMPT: &str = include_str!("prompts/user.md");
const FINAL_ROUND_PROMPT: &str = include_str!("prompts/final_round.md");

pub fn user_prompt(research_prompt: &str) -> String {
    USER_PROMPT
        .trim()
        .replace("{research_prompt}", research_prompt)
}

pub struct Orchestrator {
    agent: Agent,
}

impl Orchestrator {
    pub fn new(
        config: &Config,
        llm: Arc<dyn llm::LLM + Send + Sync>,
        client: Arc<TavilyClient>,
    ) -> Result<Self> {
        Self::with_max_rounds(config.max_rounds, llm, client)
    }

    pub fn with_max_rounds(
        max_rounds: usize,
        llm: Arc<dyn llm::LLM + Send + Sync>,
        client: Arc<TavilyClient>,
    ) -> Result<Self> {
        Ok(Self {
            agent: AgentBuilder::new()
                .llm(llm)
                .tools(tools::registry(client))
                .callback(TranscriptLogger::new())
                .max_rounds(max_rounds)
                .final_round_prompt(FINAL_ROUND_PROMPT.trim().to_string())
                .build()?,
        })
    }

    /// Researches `research_prompt` and returns the markdown brief.
    pub async fn run(mut self, research_prompt: &str) -> Result<String> {
        let transcript = Transcript::new(
            SYSTEM_PROMPT.trim().to_string(),
            user_prompt(research_prompt),
        );

        let completion = self.agent.run(transcript).await?;
        info!(
            "Research brief ready after {} of {} rounds",
            completion.rounds,
            self.agent.max_rounds()
        );

        Ok(completion.answer)
    }
}
