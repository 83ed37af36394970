//! Receiving side of an exchange: route turns, dispatch tool calls, build
//! the correlated reply.

use async_trait::async_trait;
use serde_json::{Map, Value, json};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::error::ToolError;
use crate::protocol::{A2AMessage, AgentContext, ConversationTurn, ToolCall, ToolResponse};

/// A capability this agent exposes to peers under a fixed tool name
#[async_trait]
pub trait A2aTool: Send + Sync {
    fn name(&self) -> &str;

    /// Whether the backing capability can serve calls right now
    fn is_ready(&self) -> bool {
        true
    }

    async fn invoke(&self, input: &Map<String, Value>) -> Result<Value, ToolError>;
}

/// Answers inbound messages on behalf of one agent
pub struct Responder {
    context: AgentContext,
    tools: HashMap<String, Arc<dyn A2aTool>>,
}

impl Responder {
    pub fn new(context: AgentContext) -> Self {
        Self {
            context,
            tools: HashMap::new(),
        }
    }

    pub fn register(&mut self, tool: Arc<dyn A2aTool>) {
        debug!("{}: registering A2A tool {}", self.context.agent_name, tool.name());
        self.tools.insert(tool.name().to_string(), tool);
    }

    pub fn with_tool(mut self, tool: Arc<dyn A2aTool>) -> Self {
        self.register(tool);
        self
    }

    pub fn context(&self) -> &AgentContext {
        &self.context
    }

    pub fn tool_names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.tools.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    pub fn is_ready(&self) -> bool {
        self.tools.values().all(|t| t.is_ready())
    }

    /// Build the reply to `message`.
    ///
    /// Only turns addressed to this agent are processed. Each tool call in
    /// them yields exactly one response with the same `tool_call_id`. All
    /// responses go into one turn addressed to the sender of the first
    /// inbound turn; with no responses the reply has no turns. The reply
    /// always carries the inbound `conversation_id`.
    pub async fn respond(&self, message: &A2AMessage) -> A2AMessage {
        let me = self.context.agent_name.as_str();
        let mut responses = Vec::new();

        for turn in &message.turns {
            if !turn.is_addressed_to(me) {
                debug!(
                    "{}: turn {} not for me (recipient: {})",
                    me, turn.id, turn.recipient.agent_name
                );
                continue;
            }
            for call in turn.tool_calls() {
                responses.push(self.handle_call(call).await);
            }
        }

        let turns = match (responses.is_empty(), message.turns.first()) {
            (false, Some(first)) => vec![
                ConversationTurn::new(self.context.clone(), first.sender.clone())
                    .with_tool_responses(responses),
            ],
            _ => {
                info!("{}: no actionable tool calls in message {}", me, message.message_id);
                Vec::new()
            }
        };

        A2AMessage::in_conversation(message.conversation_id.clone(), turns)
    }

    /// Answer a single call. Never fails: errors become error-flagged responses.
    pub async fn handle_call(&self, call: &ToolCall) -> ToolResponse {
        let Some(tool) = self.tools.get(&call.tool_name) else {
            warn!("{}: unknown tool {}", self.context.agent_name, call.tool_name);
            return ToolResponse::error(
                call,
                json!({"error": format!("Unknown tool: {}", call.tool_name)}),
            );
        };

        debug!(
            "{}: invoking {} ({})",
            self.context.agent_name, call.tool_name, call.tool_call_id
        );
        match tool.invoke(&call.tool_input).await {
            Ok(output) => ToolResponse::success(call, output),
            Err(e) => {
                warn!(
                    "{}: tool {} ({}) failed: {}",
                    self.context.agent_name, call.tool_name, call.tool_call_id, e
                );
                ToolResponse::error(call, json!({"error": e.to_string()}))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::{AgentRole, tool_names::QUERY_KNOWLEDGE_BASE};

    const ME: &str = "KnowledgeAgentLlama";

    /// Answers `query` with a canned reply; fails on the query "explode"
    struct FakeKnowledgeTool;

    #[async_trait]
    impl A2aTool for FakeKnowledgeTool {
        fn name(&self) -> &str {
            QUERY_KNOWLEDGE_BASE
        }

        async fn invoke(&self, input: &Map<String, Value>) -> Result<Value, ToolError> {
            let query = input
                .get("query")
                .and_then(Value::as_str)
                .ok_or_else(|| ToolError::missing_param("query"))?;
            if query == "explode" {
                return Err(ToolError::Failed("index offline".to_string()));
            }
            Ok(json!({"answer": format!("answer to {}", query)}))
        }
    }

    struct OfflineTool;

    #[async_trait]
    impl A2aTool for OfflineTool {
        fn name(&self) -> &str {
            "offline"
        }

        fn is_ready(&self) -> bool {
            false
        }

        async fn invoke(&self, _input: &Map<String, Value>) -> Result<Value, ToolError> {
            Err(ToolError::Failed("not ready".to_string()))
        }
    }

    fn responder() -> Responder {
        Responder::new(AgentContext::new(ME, AgentRole::Tool)).with_tool(Arc::new(FakeKnowledgeTool))
    }

    fn orchestrator() -> AgentContext {
        AgentContext::new("OrchestratorAgentLangchain", AgentRole::Assistant)
    }

    fn me() -> AgentContext {
        AgentContext::new(ME, AgentRole::Tool)
    }

    fn query(q: &str, id: &str) -> ToolCall {
        let mut input = Map::new();
        input.insert("query".to_string(), json!(q));
        ToolCall::with_id(QUERY_KNOWLEDGE_BASE, input, id)
    }

    fn request(calls: Vec<ToolCall>) -> A2AMessage {
        A2AMessage::in_conversation(
            "C1",
            vec![ConversationTurn::new(orchestrator(), me()).with_tool_calls(calls)],
        )
    }

    #[tokio::test]
    async fn test_success_preserves_call_id() {
        let reply = responder().respond(&request(vec![query("capital of France", "abc")])).await;

        assert_eq!(reply.conversation_id, "C1");
        assert_eq!(reply.turns.len(), 1);
        let turn = &reply.turns[0];
        assert_eq!(turn.sender, me());
        assert_eq!(turn.recipient, orchestrator());
        let resp = &turn.tool_responses()[0];
        assert_eq!(resp.tool_call_id, "abc");
        assert_eq!(resp.tool_name, QUERY_KNOWLEDGE_BASE);
        assert!(!resp.is_error);
        assert_eq!(resp.tool_output["answer"], "answer to capital of France");
    }

    #[tokio::test]
    async fn test_reply_gets_fresh_message_id() {
        let req = request(vec![query("q", "1")]);
        let reply = responder().respond(&req).await;
        assert_ne!(reply.message_id, req.message_id);
        assert_eq!(reply.conversation_id, req.conversation_id);
    }

    #[tokio::test]
    async fn test_unknown_tool() {
        let call = ToolCall::with_id("frobnicate", Map::new(), "x1");
        let reply = responder().respond(&request(vec![call])).await;

        let responses = reply.turns[0].tool_responses();
        assert_eq!(responses.len(), 1);
        assert_eq!(responses[0].tool_name, "frobnicate");
        assert_eq!(responses[0].tool_call_id, "x1");
        assert!(responses[0].is_error);
        assert_eq!(responses[0].tool_output["error"], "Unknown tool: frobnicate");
    }

    #[tokio::test]
    async fn test_missing_parameter() {
        let call = ToolCall::with_id(QUERY_KNOWLEDGE_BASE, Map::new(), "m1");
        let reply = responder().respond(&request(vec![call])).await;

        let resp = &reply.turns[0].tool_responses()[0];
        assert!(resp.is_error);
        assert_eq!(resp.tool_call_id, "m1");
        assert_eq!(resp.tool_output["error"], "Missing 'query' in tool_input");
    }

    #[tokio::test]
    async fn test_downstream_failure_does_not_abort_siblings() {
        let reply = responder()
            .respond(&request(vec![
                query("explode", "a"),
                ToolCall::with_id("frobnicate", Map::new(), "b"),
                query("weather", "c"),
            ]))
            .await;

        let responses = reply.turns[0].tool_responses();
        let ids: Vec<&str> = responses.iter().map(|r| r.tool_call_id.as_str()).collect();
        assert_eq!(ids, vec!["a", "b", "c"]);
        assert!(responses[0].is_error);
        assert_eq!(responses[0].tool_output["error"], "index offline");
        assert!(responses[1].is_error);
        assert!(!responses[2].is_error);
    }

    #[tokio::test]
    async fn test_turns_for_other_agents_are_skipped() {
        let other = AgentContext::new("SomeoneElse", AgentRole::Tool);
        let msg = A2AMessage::in_conversation(
            "C2",
            vec![ConversationTurn::new(orchestrator(), other).with_tool_calls(vec![query("q", "1")])],
        );
        let reply = responder().respond(&msg).await;
        assert_eq!(reply.conversation_id, "C2");
        assert!(reply.turns.is_empty());
    }

    #[tokio::test]
    async fn test_empty_message() {
        let msg = A2AMessage::in_conversation("C1", vec![]);
        let reply = responder().respond(&msg).await;
        assert_eq!(reply.conversation_id, "C1");
        assert!(reply.turns.is_empty());
    }

    #[tokio::test]
    async fn test_turn_without_calls_produces_nothing() {
        let msg = A2AMessage::in_conversation(
            "C1",
            vec![ConversationTurn::new(orchestrator(), me()).with_text("hello there")],
        );
        assert!(responder().respond(&msg).await.turns.is_empty());
    }

    #[tokio::test]
    async fn test_reply_addressed_to_first_turn_sender() {
        let first_sender = AgentContext::new("UserProxy", AgentRole::User);
        let msg = A2AMessage::in_conversation(
            "C3",
            vec![
                ConversationTurn::new(first_sender.clone(), AgentContext::new("Elsewhere", AgentRole::Tool)),
                ConversationTurn::new(orchestrator(), me()).with_tool_calls(vec![query("q", "z")]),
            ],
        );
        let reply = responder().respond(&msg).await;
        assert_eq!(reply.turns.len(), 1);
        assert_eq!(reply.turns[0].recipient, first_sender);
    }

    #[tokio::test]
    async fn test_calls_across_turns_collected_into_one_turn() {
        let msg = A2AMessage::in_conversation(
            "C4",
            vec![
                ConversationTurn::new(orchestrator(), me()).with_tool_calls(vec![query("a", "1")]),
                ConversationTurn::new(orchestrator(), me()).with_tool_calls(vec![query("b", "2")]),
            ],
        );
        let reply = responder().respond(&msg).await;
        assert_eq!(reply.turns.len(), 1);
        assert_eq!(reply.turns[0].tool_responses().len(), 2);
    }

    #[test]
    fn test_readiness_and_names() {
        let mut r = responder();
        assert!(r.is_ready());
        r.register(Arc::new(OfflineTool));
        assert!(!r.is_ready());
        assert_eq!(r.tool_names(), vec!["offline", QUERY_KNOWLEDGE_BASE]);
    }
}
