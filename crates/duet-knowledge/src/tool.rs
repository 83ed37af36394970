//! `query_knowledge_base`: the knowledge agent's A2A tool

use async_trait::async_trait;
use serde_json::{Map, Value, json};
use std::sync::Arc;
use tracing::{info, warn};

use duet_a2a::protocol::tool_names::QUERY_KNOWLEDGE_BASE;
use duet_a2a::{A2aTool, AgentContext, AgentRole, Responder, ToolError};

use crate::engine::QueryEngine;

/// Detail reported while the knowledge base is unavailable
pub const NOT_INITIALIZED: &str = "Knowledge base not initialized.";

/// Answers `{"query": "..."}` with `{"answer": "..."}`
pub struct KnowledgeBaseTool {
    engine: Option<Arc<dyn QueryEngine>>,
}

impl KnowledgeBaseTool {
    pub fn new(engine: Arc<dyn QueryEngine>) -> Self {
        Self {
            engine: Some(engine),
        }
    }

    /// A tool whose knowledge base failed to load; never ready
    pub fn unavailable() -> Self {
        Self { engine: None }
    }
}

#[async_trait]
impl A2aTool for KnowledgeBaseTool {
    fn name(&self) -> &str {
        QUERY_KNOWLEDGE_BASE
    }

    fn is_ready(&self) -> bool {
        self.engine.is_some()
    }

    async fn invoke(&self, input: &Map<String, Value>) -> Result<Value, ToolError> {
        let query = input
            .get("query")
            .and_then(Value::as_str)
            .filter(|q| !q.trim().is_empty())
            .ok_or_else(|| ToolError::missing_param("query"))?;

        let engine = self
            .engine
            .as_ref()
            .ok_or_else(|| ToolError::Failed(NOT_INITIALIZED.to_string()))?;

        info!("Processing query: {}", query);
        match engine.query(query).await {
            Ok(answer) => Ok(json!({ "answer": answer })),
            Err(e) => {
                warn!("Error querying knowledge base: {:#}", e);
                Err(e.into())
            }
        }
    }
}

/// Responder for the knowledge agent named `agent_name`.
///
/// `engine` is `None` when the knowledge base could not be built; the agent
/// then reports itself not ready.
pub fn knowledge_responder(agent_name: &str, engine: Option<Arc<dyn QueryEngine>>) -> Responder {
    let tool = match engine {
        Some(engine) => KnowledgeBaseTool::new(engine),
        None => KnowledgeBaseTool::unavailable(),
    };
    Responder::new(AgentContext::new(agent_name, AgentRole::Tool)).with_tool(Arc::new(tool))
}
