//! A2A (Agent-to-Agent) message types
//!
//! An [`A2AMessage`] carries ordered [`ConversationTurn`]s between named
//! agents. Turns hold tool calls, tool responses and/or free text. A
//! [`ToolResponse`] answers the [`ToolCall`] with the same `tool_call_id`;
//! a reply message reuses the request's `conversation_id`.

use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::ValidationError;
use crate::validate;

/// Tool names shared by both agents
pub mod tool_names {
    pub const QUERY_KNOWLEDGE_BASE: &str = "query_knowledge_base";
}

/// Fresh random identifier (UUID v4, hyphenated)
pub fn new_id() -> String {
    uuid::Uuid::new_v4().to_string()
}

/// Current wall-clock time in fractional seconds since the Unix epoch
pub fn now_timestamp() -> f64 {
    Utc::now().timestamp_micros() as f64 / 1_000_000.0
}

fn finite_timestamp<S: serde::Serializer>(ts: &f64, serializer: S) -> Result<S::Ok, S::Error> {
    if !ts.is_finite() {
        return Err(serde::ser::Error::custom(format!(
            "timestamp must be a finite number, got {}",
            ts
        )));
    }
    serializer.serialize_f64(*ts)
}

/// Role an agent plays within a turn
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AgentRole {
    User,
    Assistant,
    System,
    Tool,
}

impl AgentRole {
    pub const ALL: [AgentRole; 4] = [Self::User, Self::Assistant, Self::System, Self::Tool];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::User => "user",
            Self::Assistant => "assistant",
            Self::System => "system",
            Self::Tool => "tool",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|r| r.as_str() == s)
    }
}

impl std::fmt::Display for AgentRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Who sent or receives a turn. `agent_name` is the routing key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AgentContext {
    pub agent_name: String,
    pub role: AgentRole,
}

impl AgentContext {
    pub fn new(agent_name: impl Into<String>, role: AgentRole) -> Self {
        Self {
            agent_name: agent_name.into(),
            role,
        }
    }
}

/// Request to invoke a named tool on the recipient
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCall {
    pub tool_name: String,
    /// Opaque to the protocol; interpreted by the tool
    pub tool_input: Map<String, Value>,
    #[serde(default = "new_id")]
    pub tool_call_id: String,
}

impl ToolCall {
    pub fn new(tool_name: impl Into<String>, tool_input: Map<String, Value>) -> Self {
        Self::with_id(tool_name, tool_input, new_id())
    }

    pub fn with_id(
        tool_name: impl Into<String>,
        tool_input: Map<String, Value>,
        tool_call_id: impl Into<String>,
    ) -> Self {
        Self {
            tool_name: tool_name.into(),
            tool_input,
            tool_call_id: tool_call_id.into(),
        }
    }
}

/// Result of a [`ToolCall`], correlated by `tool_call_id`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolResponse {
    pub tool_name: String,
    pub tool_call_id: String,
    pub tool_output: Value,
    #[serde(default)]
    pub is_error: bool,
}

impl ToolResponse {
    pub fn new(
        tool_name: impl Into<String>,
        tool_call_id: impl Into<String>,
        tool_output: Value,
        is_error: bool,
    ) -> Self {
        Self {
            tool_name: tool_name.into(),
            tool_call_id: tool_call_id.into(),
            tool_output,
            is_error,
        }
    }

    /// Successful answer to `call`
    pub fn success(call: &ToolCall, tool_output: Value) -> Self {
        Self::new(&call.tool_name, &call.tool_call_id, tool_output, false)
    }

    /// Error-flagged answer to `call`
    pub fn error(call: &ToolCall, tool_output: Value) -> Self {
        Self::new(&call.tool_name, &call.tool_call_id, tool_output, true)
    }

    pub fn answers(&self, call: &ToolCall) -> bool {
        self.tool_call_id == call.tool_call_id
    }
}

/// One directed unit of conversation from `sender` to `recipient`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConversationTurn {
    #[serde(default = "new_id")]
    pub id: String,
    /// Must be finite; NaN and infinities cannot be encoded
    #[serde(default = "now_timestamp", serialize_with = "finite_timestamp")]
    pub timestamp: f64,
    pub sender: AgentContext,
    pub recipient: AgentContext,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_calls: Option<Vec<ToolCall>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_responses: Option<Vec<ToolResponse>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text_content: Option<String>,
}

impl ConversationTurn {
    pub fn new(sender: AgentContext, recipient: AgentContext) -> Self {
        Self {
            id: new_id(),
            timestamp: now_timestamp(),
            sender,
            recipient,
            tool_calls: None,
            tool_responses: None,
            text_content: None,
        }
    }

    pub fn with_tool_calls(mut self, calls: Vec<ToolCall>) -> Self {
        self.tool_calls = Some(calls);
        self
    }

    pub fn with_tool_responses(mut self, responses: Vec<ToolResponse>) -> Self {
        self.tool_responses = Some(responses);
        self
    }

    pub fn with_text(mut self, text: impl Into<String>) -> Self {
        self.text_content = Some(text.into());
        self
    }

    /// Whether this turn is routed to the agent called `agent_name`
    pub fn is_addressed_to(&self, agent_name: &str) -> bool {
        self.recipient.agent_name == agent_name
    }

    pub fn tool_calls(&self) -> &[ToolCall] {
        self.tool_calls.as_deref().unwrap_or_default()
    }

    pub fn tool_responses(&self) -> &[ToolResponse] {
        self.tool_responses.as_deref().unwrap_or_default()
    }
}

/// Envelope exchanged between agents
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct A2AMessage {
    #[serde(default = "new_id")]
    pub message_id: String,
    /// Session key; replies reuse the request's value
    #[serde(default = "new_id")]
    pub conversation_id: String,
    pub turns: Vec<ConversationTurn>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<Map<String, Value>>,
}

impl A2AMessage {
    /// Message opening a new conversation
    pub fn new(turns: Vec<ConversationTurn>) -> Self {
        Self::in_conversation(new_id(), turns)
    }

    /// Message continuing (or replying within) an existing conversation
    pub fn in_conversation(conversation_id: impl Into<String>, turns: Vec<ConversationTurn>) -> Self {
        Self {
            message_id: new_id(),
            conversation_id: conversation_id.into(),
            turns,
            metadata: None,
        }
    }

    pub fn with_metadata(mut self, metadata: Map<String, Value>) -> Self {
        self.metadata = Some(metadata);
        self
    }

    /// Every tool response across all turns, in order
    pub fn tool_responses(&self) -> impl Iterator<Item = &ToolResponse> {
        self.turns.iter().flat_map(|t| t.tool_responses().iter())
    }

    /// The response answering the call with `tool_call_id`, if any
    pub fn response_for(&self, tool_call_id: &str) -> Option<&ToolResponse> {
        self.tool_responses()
            .find(|r| r.tool_call_id == tool_call_id)
    }

    /// Fails only for a turn whose timestamp is not finite
    pub fn to_value(&self) -> Result<Value, serde_json::Error> {
        serde_json::to_value(self)
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    /// Pretty form for logs and display
    pub fn to_json_pretty(&self) -> String {
        serde_json::to_string_pretty(self)
            .unwrap_or_else(|e| format!("<unencodable message {}: {}>", self.message_id, e))
    }

    /// Parse and validate a wire document
    pub fn from_json(json: &str) -> Result<Self, ValidationError> {
        Self::from_slice(json.as_bytes())
    }

    pub fn from_slice(bytes: &[u8]) -> Result<Self, ValidationError> {
        let value: Value = serde_json::from_slice(bytes).map_err(ValidationError::syntax)?;
        Self::from_value(value)
    }

    /// Validate an already-parsed document and build the message
    pub fn from_value(value: Value) -> Result<Self, ValidationError> {
        validate::check_message(&value)?;
        serde_json::from_value(value).map_err(ValidationError::decode)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::collections::HashSet;

    fn orchestrator() -> AgentContext {
        AgentContext::new("OrchestratorAgentLangchain", AgentRole::Assistant)
    }

    fn knowledge() -> AgentContext {
        AgentContext::new("KnowledgeAgentLlama", AgentRole::Tool)
    }

    fn input(query: &str) -> Map<String, Value> {
        let mut map = Map::new();
        map.insert("query".to_string(), json!(query));
        map
    }

    #[test]
    fn test_role_wire_names() {
        for role in AgentRole::ALL {
            let json = serde_json::to_value(role).unwrap();
            assert_eq!(json, role.as_str());
            assert_eq!(AgentRole::parse(role.as_str()), Some(role));
        }
        assert_eq!(AgentRole::parse("admin"), None);
        assert_eq!(AgentRole::Tool.to_string(), "tool");
    }

    #[test]
    fn test_serialized_shape() {
        let call = ToolCall::with_id(tool_names::QUERY_KNOWLEDGE_BASE, input("capital"), "abc");
        let turn = ConversationTurn::new(orchestrator(), knowledge()).with_tool_calls(vec![call]);
        let msg = A2AMessage::in_conversation("C1", vec![turn]);
        let json = msg.to_value().unwrap();

        assert_eq!(json["conversation_id"], "C1");
        assert!(json.get("metadata").is_none());
        let turn = &json["turns"][0];
        assert_eq!(turn["sender"]["agent_name"], "OrchestratorAgentLangchain");
        assert_eq!(turn["recipient"]["role"], "tool");
        assert_eq!(turn["tool_calls"][0]["tool_call_id"], "abc");
        assert_eq!(turn["tool_calls"][0]["tool_input"]["query"], "capital");
        assert!(turn["timestamp"].is_f64());
        assert!(turn.get("tool_responses").is_none());
        assert!(turn.get("text_content").is_none());
    }

    #[test]
    fn test_roundtrip_full_message() {
        let call = ToolCall::new("query_knowledge_base", input("weather in Paris"));
        let response = ToolResponse::success(&call, json!({"answer": "Sunny"}));
        let mut meta = Map::new();
        meta.insert("trace".to_string(), json!({"hops": [1, 2]}));

        let turns = AgentRole::ALL
            .into_iter()
            .map(|role| {
                ConversationTurn::new(AgentContext::new("a", role), AgentContext::new("b", role))
            })
            .chain([
                ConversationTurn::new(orchestrator(), knowledge())
                    .with_tool_calls(vec![call.clone()])
                    .with_text("please look this up"),
                ConversationTurn::new(knowledge(), orchestrator())
                    .with_tool_responses(vec![response, ToolResponse::error(&call, Value::Null)]),
                ConversationTurn::new(knowledge(), orchestrator())
                    .with_tool_calls(vec![])
                    .with_text(""),
            ])
            .collect();
        let msg = A2AMessage::new(turns).with_metadata(meta);

        let parsed = A2AMessage::from_json(&msg.to_json().unwrap()).unwrap();
        assert_eq!(parsed, msg);
        let parsed = A2AMessage::from_json(&msg.to_json_pretty()).unwrap();
        assert_eq!(parsed, msg);
    }

    #[test]
    fn test_roundtrip_empty_turns() {
        let msg = A2AMessage::in_conversation("C1", vec![]);
        let parsed = A2AMessage::from_json(&msg.to_json().unwrap()).unwrap();
        assert_eq!(parsed, msg);
        assert!(parsed.turns.is_empty());
    }

    #[test]
    fn test_timestamp_roundtrip_is_exact() {
        let mut turn = ConversationTurn::new(orchestrator(), knowledge());
        for ts in [0.0, 1718000000.123456, 1.0e-7, 0.1 + 0.2, now_timestamp()] {
            turn.timestamp = ts;
            let msg = A2AMessage::new(vec![turn.clone()]);
            let parsed = A2AMessage::from_json(&msg.to_json().unwrap()).unwrap();
            assert_eq!(parsed.turns[0].timestamp.to_bits(), ts.to_bits());
        }
    }

    #[test]
    fn test_non_finite_timestamp_is_not_encodable() {
        for ts in [f64::NAN, f64::INFINITY, f64::NEG_INFINITY] {
            let mut turn = ConversationTurn::new(orchestrator(), knowledge());
            turn.timestamp = ts;
            let msg = A2AMessage::new(vec![turn]);
            let err = msg.to_json().unwrap_err();
            assert!(err.to_string().contains("timestamp must be a finite number"));
            assert!(msg.to_value().is_err());
            assert!(msg.to_json_pretty().starts_with("<unencodable message"));
        }
    }

    #[test]
    fn test_defaults_filled_on_decode() {
        let json = json!({
            "turns": [{
                "sender": {"agent_name": "A", "role": "user"},
                "recipient": {"agent_name": "B", "role": "tool"},
                "tool_calls": [{"tool_name": "t", "tool_input": {}}],
                "tool_responses": [{"tool_name": "t", "tool_call_id": "x", "tool_output": "ok"}]
            }]
        });
        let msg = A2AMessage::from_value(json).unwrap();
        assert!(!msg.message_id.is_empty());
        assert!(!msg.conversation_id.is_empty());
        assert_ne!(msg.message_id, msg.conversation_id);
        let turn = &msg.turns[0];
        assert!(!turn.id.is_empty());
        assert!(turn.timestamp > 0.0);
        assert!(!turn.tool_calls()[0].tool_call_id.is_empty());
        assert!(!turn.tool_responses()[0].is_error);
    }

    #[test]
    fn test_null_and_absent_optionals_are_equivalent() {
        let base = json!({
            "message_id": "m", "conversation_id": "c",
            "turns": [{
                "id": "t", "timestamp": 1.5,
                "sender": {"agent_name": "A", "role": "user"},
                "recipient": {"agent_name": "B", "role": "tool"}
            }]
        });
        let mut with_nulls = base.clone();
        with_nulls["metadata"] = Value::Null;
        for key in ["tool_calls", "tool_responses", "text_content"] {
            with_nulls["turns"][0][key] = Value::Null;
        }
        let a = A2AMessage::from_value(base).unwrap();
        let b = A2AMessage::from_value(with_nulls).unwrap();
        assert_eq!(a, b);
        assert_eq!(a.turns[0].tool_calls, None);
        assert_eq!(a.metadata, None);
    }

    #[test]
    fn test_integer_timestamp_accepted() {
        let json = json!({
            "turns": [{
                "timestamp": 1700000000,
                "sender": {"agent_name": "A", "role": "system"},
                "recipient": {"agent_name": "B", "role": "assistant"}
            }]
        });
        let msg = A2AMessage::from_value(json).unwrap();
        assert_eq!(msg.turns[0].timestamp, 1700000000.0);
    }

    #[test]
    fn test_ids_are_unique() {
        let ctx = orchestrator();
        let mut ids = HashSet::new();
        for _ in 0..10_000 {
            assert!(ids.insert(ToolCall::new("t", Map::new()).tool_call_id));
            assert!(ids.insert(ConversationTurn::new(ctx.clone(), ctx.clone()).id));
            let msg = A2AMessage::new(vec![]);
            assert!(ids.insert(msg.message_id));
            assert!(ids.insert(msg.conversation_id));
        }
        assert_eq!(ids.len(), 40_000);
    }

    #[test]
    fn test_id_format() {
        let id = new_id();
        assert_eq!(id.len(), 36);
        assert!(uuid::Uuid::parse_str(&id).is_ok());
    }

    #[test]
    fn test_response_for_finds_correlated_response() {
        let first = ToolCall::with_id("t", Map::new(), "one");
        let second = ToolCall::with_id("t", Map::new(), "two");
        let turn = ConversationTurn::new(knowledge(), orchestrator()).with_tool_responses(vec![
            ToolResponse::success(&second, json!(2)),
            ToolResponse::success(&first, json!(1)),
        ]);
        let msg = A2AMessage::new(vec![turn]);

        assert_eq!(msg.tool_responses().count(), 2);
        let found = msg.response_for("one").unwrap();
        assert!(found.answers(&first));
        assert_eq!(found.tool_output, json!(1));
        assert!(msg.response_for("three").is_none());
    }

    #[test]
    fn test_turn_addressing() {
        let turn = ConversationTurn::new(orchestrator(), knowledge());
        assert!(turn.is_addressed_to("KnowledgeAgentLlama"));
        assert!(!turn.is_addressed_to("OrchestratorAgentLangchain"));
        assert!(turn.tool_calls().is_empty());
        assert!(turn.tool_responses().is_empty());
    }
}
