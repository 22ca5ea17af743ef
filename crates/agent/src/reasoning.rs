//! Bounded tool-calling reasoning loop.
//!
//! One caller utterance becomes at most `max_steps` LLM calls. Tool calls
//! are resolved sequentially and their observations appended to the request
//! before the next step; the loop ends on the first plain-text response.

use std::sync::Arc;

use leasing_agent_core::{
    AgentError, ConversationHistory, LanguageModel, Message, ToolCallRequest, ToolCallResult,
};
use leasing_agent_llm::build_request;
use leasing_agent_tools::ToolRegistry;
use tracing::{debug, warn};

use leasing_agent_config::constants::reasoning;

#[derive(Debug, Clone)]
pub struct ReasoningConfig {
    pub max_steps: usize,
    pub temperature: f32,
    pub max_tokens: usize,
}

impl Default for ReasoningConfig {
    fn default() -> Self {
        Self {
            max_steps: reasoning::MAX_STEPS,
            temperature: 0.7,
            max_tokens: 256,
        }
    }
}

/// What one utterance produced.
#[derive(Debug, Clone)]
pub struct ReasoningOutcome {
    /// Text to speak to the caller
    pub final_text: String,
    /// Every tool call made along the way, paired with its result
    pub tool_log: Vec<(ToolCallRequest, ToolCallResult)>,
    /// LLM calls consumed
    pub steps: usize,
}

pub struct ReasoningLoop {
    llm: Arc<dyn LanguageModel>,
    tools: Arc<ToolRegistry>,
    config: ReasoningConfig,
}

impl ReasoningLoop {
    pub fn new(llm: Arc<dyn LanguageModel>, tools: Arc<ToolRegistry>, config: ReasoningConfig) -> Self {
        Self { llm, tools, config }
    }

    /// Resolve one caller utterance into spoken text.
    pub async fn run(
        &self,
        history: &ConversationHistory,
        utterance: &str,
    ) -> Result<ReasoningOutcome, AgentError> {
        let mut request = build_request(
            history,
            utterance,
            self.config.temperature,
            self.config.max_tokens,
        );
        let definitions = self.tools.definitions();
        let mut tool_log: Vec<(ToolCallRequest, ToolCallResult)> = Vec::new();

        for step in 1..=self.config.max_steps {
            let response = self
                .llm
                .generate_with_tools(request.clone(), &definitions)
                .await?;

            if response.has_tool_calls() {
                debug!(step, calls = response.tool_calls.len(), "resolving tool calls");
                request.push(Message::assistant_tool_calls(
                    response.text.clone(),
                    response.tool_calls.clone(),
                ));
                for call in response.tool_calls {
                    let result = self.tools.execute_call(&call).await;
                    request.push(Message::tool(result.observation_text(), &call.call_id));
                    tool_log.push((call, result));
                }
                continue;
            }

            let text = response.text.trim().to_string();
            if text.is_empty() {
                warn!(step, "model returned neither text nor tool calls");
                return Err(AgentError::ReasoningExhausted { steps: step });
            }

            return Ok(ReasoningOutcome {
                final_text: text,
                tool_log,
                steps: step,
            });
        }

        warn!(
            max_steps = self.config.max_steps,
            "reasoning loop hit its step cap without a spoken response"
        );
        Err(AgentError::ReasoningExhausted {
            steps: self.config.max_steps,
        })
    }
}
