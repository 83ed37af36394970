//! OpenAI chat completions provider (and any compatible endpoint)

use anyhow::{Context, Result, anyhow};
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde_json::{Value, json};
use std::time::Duration;
use tracing::{debug, warn};

use super::types::{
    ChatBlock, ChatMessage, ChatMessageContent, ChatResponse, ChatResponseBlock, ChatRole,
    ChatUsage, LlmProvider, StopReason,
};
use crate::tools::ToolDefinition;

pub const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";

/// Settings for an OpenAI-compatible provider
#[derive(Clone)]
pub struct OpenAiConfig {
    pub api_key: String,
    pub base_url: String,
    pub model: String,
    pub temperature: Option<f32>,
    pub max_tokens: Option<u32>,
    pub timeout: Duration,
}

impl std::fmt::Debug for OpenAiConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OpenAiConfig")
            .field("api_key", &"[REDACTED]")
            .field("base_url", &self.base_url)
            .field("model", &self.model)
            .field("temperature", &self.temperature)
            .field("max_tokens", &self.max_tokens)
            .field("timeout", &self.timeout)
            .finish()
    }
}

impl OpenAiConfig {
    pub fn new(api_key: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            base_url: DEFAULT_BASE_URL.to_string(),
            model: model.into(),
            temperature: None,
            max_tokens: None,
            timeout: Duration::from_secs(60),
        }
    }
}

/// Chat completions client
pub struct OpenAiProvider {
    config: OpenAiConfig,
    http: Client,
}

impl OpenAiProvider {
    pub fn new(config: OpenAiConfig) -> Result<Self> {
        if config.api_key.trim().is_empty() {
            return Err(anyhow!("OpenAI API key is empty; set OPENAI_API_KEY"));
        }
        let http = Client::builder()
            .timeout(config.timeout)
            .build()
            .context("Failed to build HTTP client")?;
        Ok(Self { config, http })
    }

    fn endpoint(&self) -> String {
        format!(
            "{}/chat/completions",
            self.config.base_url.trim_end_matches('/')
        )
    }

    /// Build the request body for the chat completions API
    fn build_request_body(
        &self,
        messages: &[ChatMessage],
        tools: &[ToolDefinition],
        system: &str,
    ) -> Value {
        let mut wire = Vec::with_capacity(messages.len() + 1);
        if !system.is_empty() {
            wire.extend(message_to_openai(&ChatMessage::system(system)));
        }
        for msg in messages {
            wire.extend(message_to_openai(msg));
        }

        let mut body = json!({
            "model": self.config.model,
            "messages": wire,
        });
        if let Some(t) = self.config.temperature {
            body["temperature"] = json!(t);
        }
        if let Some(max) = self.config.max_tokens {
            body["max_tokens"] = json!(max);
        }
        if !tools.is_empty() {
            body["tools"] = tools.iter().map(tool_to_openai).collect::<Vec<_>>().into();
        }
        body
    }
}

#[async_trait]
impl LlmProvider for OpenAiProvider {
    fn provider_name(&self) -> &str {
        "openai"
    }

    fn model(&self) -> &str {
        &self.config.model
    }

    async fn chat(
        &self,
        messages: &[ChatMessage],
        tools: &[ToolDefinition],
        system: &str,
    ) -> Result<ChatResponse> {
        let body = self.build_request_body(messages, tools, system);
        let url = self.endpoint();
        debug!(
            model = %self.config.model,
            messages = messages.len(),
            tools = tools.len(),
            "OpenAI chat request"
        );

        let resp = self
            .http
            .post(&url)
            .bearer_auth(&self.config.api_key)
            .json(&body)
            .send()
            .await
            .with_context(|| format!("Failed to reach {}", url))?;

        if !resp.status().is_success() {
            let status = resp.status();
            let text = resp.text().await.unwrap_or_default();
            return Err(anyhow!("OpenAI request failed: HTTP {}: {}", status, text));
        }

        let completion: Completion = resp
            .json()
            .await
            .context("Failed to parse OpenAI response")?;
        parse_completion(completion)
    }
}

/// Convert one chat message into one or more OpenAI wire messages.
///
/// Tool results become separate `tool` role messages; assistant tool calls
/// ride on the assistant message's `tool_calls` array.
fn message_to_openai(msg: &ChatMessage) -> Vec<Value> {
    let role = msg.role.to_string();
    let blocks = match &msg.content {
        ChatMessageContent::Text(text) => return vec![json!({"role": role, "content": text})],
        ChatMessageContent::Blocks(blocks) => blocks,
    };

    let mut out = Vec::new();
    let mut text_parts = Vec::new();
    let mut tool_calls = Vec::new();

    for block in blocks {
        match block {
            ChatBlock::Text { text } => text_parts.push(text.as_str()),
            ChatBlock::ToolCall { id, name, input } => tool_calls.push(json!({
                "id": id,
                "type": "function",
                "function": {"name": name, "arguments": input.to_string()},
            })),
            ChatBlock::ToolResult {
                tool_call_id,
                content,
            } => out.push(json!({
                "role": "tool",
                "tool_call_id": tool_call_id,
                "content": content,
            })),
        }
    }

    if !text_parts.is_empty() || !tool_calls.is_empty() {
        let content = if text_parts.is_empty() {
            Value::Null
        } else {
            Value::String(text_parts.join("\n"))
        };
        let mut head = json!({"role": role, "content": content});
        if !tool_calls.is_empty() && msg.role == ChatRole::Assistant {
            head["tool_calls"] = Value::Array(tool_calls);
        }
        out.insert(0, head);
    }
    out
}

fn tool_to_openai(tool: &ToolDefinition) -> Value {
    json!({
        "type": "function",
        "function": {
            "name": tool.name,
            "description": tool.description,
            "parameters": tool.input_schema,
        }
    })
}

#[derive(Debug, Deserialize)]
struct Completion {
    #[serde(default)]
    choices: Vec<Choice>,
    #[serde(default)]
    usage: Option<Usage>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: AssistantMessage,
    #[serde(default)]
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct AssistantMessage {
    #[serde(default)]
    content: Option<String>,
    #[serde(default)]
    tool_calls: Vec<WireToolCall>,
}

#[derive(Debug, Deserialize)]
struct WireToolCall {
    id: String,
    function: WireFunction,
}

#[derive(Debug, Deserialize)]
struct WireFunction {
    name: String,
    #[serde(default)]
    arguments: String,
}

#[derive(Debug, Deserialize)]
struct Usage {
    #[serde(default)]
    prompt_tokens: u32,
    #[serde(default)]
    completion_tokens: u32,
}

fn parse_completion(completion: Completion) -> Result<ChatResponse> {
    let choice = completion
        .choices
        .into_iter()
        .next()
        .ok_or_else(|| anyhow!("OpenAI response contained no choices"))?;

    let mut blocks = Vec::new();
    if let Some(text) = choice.message.content.filter(|t| !t.is_empty()) {
        blocks.push(ChatResponseBlock::Text { text });
    }
    for call in choice.message.tool_calls {
        let input = if call.function.arguments.trim().is_empty() {
            json!({})
        } else {
            serde_json::from_str(&call.function.arguments).unwrap_or_else(|e| {
                warn!(
                    "Tool call {} has non-JSON arguments ({}); passing them as a string",
                    call.id, e
                );
                Value::String(call.function.arguments.clone())
            })
        };
        blocks.push(ChatResponseBlock::ToolCall {
            id: call.id,
            name: call.function.name,
            input,
        });
    }

    let stop_reason = match choice.finish_reason.as_deref() {
        Some("stop") => StopReason::EndTurn,
        Some("tool_calls") | Some("function_call") => StopReason::ToolUse,
        Some("length") => StopReason::MaxTokens,
        _ => StopReason::Unknown,
    };

    let usage = completion
        .usage
        .map(|u| ChatUsage {
            input_tokens: u.prompt_tokens,
            output_tokens: u.completion_tokens,
        })
        .unwrap_or_default();

    Ok(ChatResponse {
        blocks,
        stop_reason,
        usage,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn provider() -> OpenAiProvider {
        let mut config = OpenAiConfig::new("sk-test", "gpt-4-turbo-preview");
        config.temperature = Some(0.0);
        OpenAiProvider::new(config).unwrap()
    }

    #[test]
    fn test_empty_api_key_rejected() {
        let result = OpenAiProvider::new(OpenAiConfig::new("  ", "gpt-4"));
        assert!(result.is_err());
    }

    #[test]
    fn test_config_debug_redacts_key() {
        let config = OpenAiConfig::new("sk-secret", "gpt-4");
        let debug = format!("{:?}", config);
        assert!(!debug.contains("sk-secret"));
        assert!(debug.contains("REDACTED"));
    }

    #[test]
    fn test_endpoint_trims_slash() {
        let mut config = OpenAiConfig::new("sk-test", "m");
        config.base_url = "http://localhost:11434/v1/".to_string();
        let provider = OpenAiProvider::new(config).unwrap();
        assert_eq!(provider.endpoint(), "http://localhost:11434/v1/chat/completions");
    }

    #[test]
    fn test_request_body_with_system_and_tools() {
        let tools = vec![ToolDefinition {
            name: "query_knowledge_agent".to_string(),
            description: "Ask the knowledge agent".to_string(),
            input_schema: json!({"type": "object"}),
        }];
        let body = provider().build_request_body(&[ChatMessage::user("hi")], &tools, "be nice");

        assert_eq!(body["model"], "gpt-4-turbo-preview");
        assert_eq!(body["temperature"], 0.0);
        assert_eq!(body["messages"][0]["role"], "system");
        assert_eq!(body["messages"][0]["content"], "be nice");
        assert_eq!(body["messages"][1]["content"], "hi");
        assert_eq!(body["tools"][0]["function"]["name"], "query_knowledge_agent");
        assert!(body.get("max_tokens").is_none());
    }

    #[test]
    fn test_tool_blocks_translate_to_openai_messages() {
        let assistant = ChatMessage {
            role: ChatRole::Assistant,
            content: ChatMessageContent::Blocks(vec![ChatBlock::ToolCall {
                id: "call_1".to_string(),
                name: "query_knowledge_agent".to_string(),
                input: json!({"query": "Paris"}),
            }]),
        };
        let results = ChatMessage {
            role: ChatRole::User,
            content: ChatMessageContent::Blocks(vec![ChatBlock::ToolResult {
                tool_call_id: "call_1".to_string(),
                content: "Paris is the capital".to_string(),
            }]),
        };

        let wire = message_to_openai(&assistant);
        assert_eq!(wire.len(), 1);
        assert!(wire[0]["content"].is_null());
        assert_eq!(wire[0]["tool_calls"][0]["id"], "call_1");
        assert_eq!(
            wire[0]["tool_calls"][0]["function"]["arguments"],
            r#"{"query":"Paris"}"#
        );

        let wire = message_to_openai(&results);
        assert_eq!(wire.len(), 1);
        assert_eq!(wire[0]["role"], "tool");
        assert_eq!(wire[0]["tool_call_id"], "call_1");
    }

    #[test]
    fn test_parse_completion_with_tool_call() {
        let completion: Completion = serde_json::from_value(json!({
            "choices": [{
                "message": {
                    "content": null,
                    "tool_calls": [{
                        "id": "call_abc",
                        "type": "function",
                        "function": {"name": "query_knowledge_agent", "arguments": "{\"query\":\"weather\"}"}
                    }]
                },
                "finish_reason": "tool_calls"
            }],
            "usage": {"prompt_tokens": 12, "completion_tokens": 3}
        }))
        .unwrap();

        let response = parse_completion(completion).unwrap();
        assert_eq!(response.stop_reason, StopReason::ToolUse);
        assert_eq!(response.usage.input_tokens, 12);
        let calls = response.tool_calls();
        assert_eq!(calls[0].0, "call_abc");
        assert_eq!(calls[0].2["query"], "weather");
    }

    #[test]
    fn test_parse_completion_text() {
        let completion: Completion = serde_json::from_value(json!({
            "choices": [{"message": {"content": "Paris."}, "finish_reason": "stop"}]
        }))
        .unwrap();
        let response = parse_completion(completion).unwrap();
        assert!(response.stop_reason.is_end_turn());
        assert_eq!(response.text(), "Paris.");
    }

    #[test]
    fn test_parse_completion_without_choices() {
        let completion: Completion = serde_json::from_value(json!({"choices": []})).unwrap();
        assert!(parse_completion(completion).is_err());
    }

    #[tokio::test]
    async fn test_chat_connection_refused() {
        let mut config = OpenAiConfig::new("sk-test", "m");
        config.base_url = "http://127.0.0.1:1/v1".to_string();
        let provider = OpenAiProvider::new(config).unwrap();
        let result = provider.chat(&[ChatMessage::user("hi")], &[], "").await;
        assert!(result.is_err());
    }
}
