//! `query_knowledge_agent` tool: asks a peer knowledge agent over A2A

use anyhow::{Result, anyhow};
use async_trait::async_trait;
use serde_json::{Map, Value, json};
use tracing::{debug, info, warn};

use duet_core::tools::{ToolHandler, json_schema};

use crate::client::{A2aClient, PeerAgentConfig};
use crate::error::ValidationError;
use crate::protocol::{
    A2AMessage, AgentContext, AgentRole, ConversationTurn, ToolCall, ToolResponse,
    tool_names::QUERY_KNOWLEDGE_BASE,
};

const NO_USABLE_RESPONSE: &str = "KnowledgeAgent provided no usable response.";

/// LLM-facing tool that forwards a natural-language query to the knowledge
/// agent as a `query_knowledge_base` call and renders the reply as text.
pub struct KnowledgeAgentTool {
    client: A2aClient,
    sender: AgentContext,
    peer: PeerAgentConfig,
}

impl KnowledgeAgentTool {
    /// `sender_name` is this agent's routing name; `peer` is the knowledge agent
    pub fn new(client: A2aClient, sender_name: &str, peer: PeerAgentConfig) -> Self {
        Self {
            client,
            sender: AgentContext::new(sender_name, AgentRole::Assistant),
            peer,
        }
    }

    /// Message carrying a single knowledge-base call to the peer
    pub fn build_request(&self, query: &str) -> A2AMessage {
        let mut input = Map::new();
        input.insert("query".to_string(), json!(query));
        let call = ToolCall::new(QUERY_KNOWLEDGE_BASE, input);

        let recipient = AgentContext::new(&self.peer.name, AgentRole::Tool);
        A2AMessage::new(vec![
            ConversationTurn::new(self.sender.clone(), recipient).with_tool_calls(vec![call]),
        ])
    }

    /// Ask the peer and return its answer as text.
    ///
    /// Transport failures come back as text too, so the model can tell the
    /// user instead of the whole turn failing.
    pub async fn ask(&self, query: &str) -> String {
        let request = self.build_request(query);
        debug!(
            "Sending A2A message to {}:\n{}",
            self.peer.url,
            request.to_json_pretty()
        );

        match self.client.exchange(&self.peer.url, &request).await {
            Ok(reply) => {
                debug!("Received A2A response:\n{}", reply.to_json_pretty());
                render_reply(&request, &reply)
            }
            Err(e) => {
                warn!("A2A exchange with {} failed: {:#}", self.peer.name, e);
                match e.downcast_ref::<ValidationError>() {
                    Some(invalid) => format!("Error parsing response from KnowledgeAgent: {}", invalid),
                    None => format!("Error communicating with KnowledgeAgent: {:#}", e),
                }
            }
        }
    }
}

/// Render the responses in `reply` that answer calls made in `request`.
pub fn render_reply(request: &A2AMessage, reply: &A2AMessage) -> String {
    if reply.conversation_id != request.conversation_id {
        warn!(
            "Reply conversation {} does not match request conversation {}",
            reply.conversation_id, request.conversation_id
        );
    }

    let lines: Vec<String> = request
        .turns
        .iter()
        .flat_map(|t| t.tool_calls())
        .filter_map(|call| reply.response_for(&call.tool_call_id))
        .map(render_response)
        .collect();

    if lines.is_empty() {
        NO_USABLE_RESPONSE.to_string()
    } else {
        lines.join("\n")
    }
}

fn render_response(resp: &ToolResponse) -> String {
    if resp.is_error {
        let error = field_text(&resp.tool_output, "error")
            .unwrap_or_else(|| "Unknown error from tool.".to_string());
        format!("Error from KnowledgeAgent: {}", error)
    } else {
        field_text(&resp.tool_output, "answer").unwrap_or_else(|| "No answer found.".to_string())
    }
}

/// `output[key]` as text; a bare string output counts as the field itself
fn field_text(output: &Value, key: &str) -> Option<String> {
    match output {
        Value::String(s) => Some(s.clone()),
        Value::Object(map) => map.get(key).map(|v| match v {
            Value::String(s) => s.clone(),
            other => other.to_string(),
        }),
        _ => None,
    }
}

#[async_trait]
impl ToolHandler for KnowledgeAgentTool {
    fn name(&self) -> &str {
        "query_knowledge_agent"
    }

    fn description(&self) -> &str {
        "Use this tool to query the KnowledgeAgent for specific information. \
         Input should be a natural language query."
    }

    fn input_schema(&self) -> Value {
        json_schema(
            json!({
                "query": {
                    "type": "string",
                    "description": "The query to send to the knowledge base agent."
                }
            }),
            vec!["query"],
        )
    }

    async fn execute(&self, input: Value) -> Result<String> {
        let query = input
            .get("query")
            .and_then(|v| v.as_str())
            .filter(|q| !q.trim().is_empty())
            .ok_or_else(|| anyhow!("Missing 'query' parameter"))?;

        info!("Querying {} with: {}", self.peer.name, query);
        Ok(self.ask(query).await)
    }
}
