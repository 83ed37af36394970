//! Tool-calling agent loop and in-memory chat session

use anyhow::{Result, bail};
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::providers::{ChatBlock, ChatMessage, ChatMessageContent, ChatRole, LlmProvider};
use crate::tools::{ToolExecutor, ToolRegistry};

/// Runs the model, executes the tools it asks for and feeds results back
/// until it produces a plain answer.
pub struct AgentLoop {
    provider: Arc<dyn LlmProvider>,
    tools: Arc<ToolRegistry>,
    system_prompt: String,
    max_iterations: usize,
}

impl AgentLoop {
    pub fn new(
        provider: Arc<dyn LlmProvider>,
        tools: Arc<ToolRegistry>,
        system_prompt: impl Into<String>,
    ) -> Self {
        Self {
            provider,
            tools,
            system_prompt: system_prompt.into(),
            max_iterations: 8,
        }
    }

    pub fn with_max_iterations(mut self, max_iterations: usize) -> Self {
        self.max_iterations = max_iterations.max(1);
        self
    }

    /// Answer `input` given the prior conversation.
    pub async fn run(&self, history: &[ChatMessage], input: &str) -> Result<String> {
        let mut messages = history.to_vec();
        messages.push(ChatMessage::user(input));
        let definitions = self.tools.list_tools();

        for iteration in 0..self.max_iterations {
            let response = self
                .provider
                .chat(&messages, &definitions, &self.system_prompt)
                .await?;
            debug!(
                iteration,
                stop_reason = ?response.stop_reason,
                input_tokens = response.usage.input_tokens,
                output_tokens = response.usage.output_tokens,
                "Model responded"
            );

            let calls = response.tool_calls();
            if calls.is_empty() {
                if !response.stop_reason.is_end_turn() {
                    warn!("Model stopped early ({:?}), answer may be cut off", response.stop_reason);
                }
                return Ok(response.text());
            }

            let mut request_blocks = Vec::new();
            let text = response.text();
            if !text.is_empty() {
                request_blocks.push(ChatBlock::Text { text });
            }
            let mut result_blocks = Vec::with_capacity(calls.len());

            for (id, name, tool_input) in calls {
                info!("Model requested tool {} ({})", name, id);
                request_blocks.push(ChatBlock::ToolCall {
                    id: id.to_string(),
                    name: name.to_string(),
                    input: tool_input.clone(),
                });

                let content = match self.tools.execute(name, tool_input.clone()).await {
                    Ok(output) => output,
                    Err(e) => {
                        warn!("Tool {} failed: {:#}", name, e);
                        format!("Error: {:#}", e)
                    }
                };
                result_blocks.push(ChatBlock::ToolResult {
                    tool_call_id: id.to_string(),
                    content,
                });
            }

            messages.push(ChatMessage {
                role: ChatRole::Assistant,
                content: ChatMessageContent::Blocks(request_blocks),
            });
            messages.push(ChatMessage {
                role: ChatRole::User,
                content: ChatMessageContent::Blocks(result_blocks),
            });
        }

        bail!(
            "Agent stopped after {} iterations without a final answer",
            self.max_iterations
        )
    }
}

/// Conversation history kept in memory for the lifetime of a chat.
pub struct ChatSession {
    agent: AgentLoop,
    history: Vec<ChatMessage>,
}

impl ChatSession {
    pub fn new(agent: AgentLoop) -> Self {
        Self {
            agent,
            history: Vec::new(),
        }
    }

    /// Send one user message and return the reply to show.
    ///
    /// Agent failures are folded into the reply and recorded in history, so
    /// the chat keeps going.
    pub async fn send(&mut self, input: &str) -> String {
        let reply = match self.agent.run(&self.history, input).await {
            Ok(answer) => answer,
            Err(e) => {
                warn!("Error during agent execution: {:#}", e);
                format!("Sorry, I encountered an error: {:#}", e)
            }
        };
        self.history.push(ChatMessage::user(input));
        self.history.push(ChatMessage::assistant(reply.clone()));
        reply
    }

    pub fn history(&self) -> &[ChatMessage] {
        &self.history
    }
}
