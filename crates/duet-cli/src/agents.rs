//! Wiring of the two agents from configuration

use anyhow::{Context, Result};
use serde_json::json;
use std::sync::Arc;
use tracing::info;

use duet_a2a::{
    A2AMessage, A2aClient, ConversationTurn, KnowledgeAgentTool, PeerAgentConfig, Responder,
    ToolResponse,
};
use duet_core::{AgentLoop, ChatSession, LlmProvider, OpenAiConfig, OpenAiProvider, ToolRegistry};
use duet_knowledge::{
    ChunkingConfig, PassageIndex, QueryEngine, RetrievalQueryEngine, build_index,
    knowledge_responder, load_documents,
};

use crate::config::{DuetConfig, LlmConfig};

pub fn orchestrator_system_prompt(agent_name: &str) -> String {
    format!(
        "You are a helpful assistant named {}. \
         You have access to a specialized KnowledgeAgent. \
         If a user asks about specific facts like capitals of countries, information about cities, \
         or current weather in a specific city that might be in a knowledge base, \
         use the 'query_knowledge_agent' tool to get this information. \
         Do not make up information if you can retrieve it. \
         Always state that you are retrieving information from the KnowledgeAgent when you use the tool. \
         If the user asks a general question, or something you can answer directly, do so.",
        agent_name
    )
}

fn llm_provider(llm: &LlmConfig, model: &str, temperature: Option<f32>) -> Result<Arc<dyn LlmProvider>> {
    let mut config = OpenAiConfig::new(llm.require_api_key()?, model);
    config.base_url = llm.base_url.clone();
    config.timeout = llm.timeout();
    config.temperature = temperature;
    let provider = OpenAiProvider::new(config)?;
    Ok(Arc::new(provider))
}

/// Load the documents, build the index and return the knowledge agent's
/// responder. Any failure here means the agent cannot serve.
pub fn build_knowledge_responder(config: &DuetConfig) -> Result<Responder> {
    let knowledge = &config.knowledge;

    let documents = load_documents(&knowledge.data_dir)?;
    let index = if knowledge.index_dir.is_empty() {
        PassageIndex::in_memory()?
    } else {
        PassageIndex::open(&knowledge.index_dir)?
    };
    let chunking = ChunkingConfig::new(knowledge.chunk_size, knowledge.chunk_overlap);
    build_index(&documents, &chunking, &index)?;

    let mut engine = RetrievalQueryEngine::new(Arc::new(index), knowledge.top_k);
    if knowledge.synthesize {
        engine = engine.with_llm(llm_provider(&config.llm, &knowledge.model, None)?);
    } else {
        info!("Answer synthesis disabled, returning retrieved passages");
    }
    let engine: Arc<dyn QueryEngine> = Arc::new(engine);

    Ok(knowledge_responder(&knowledge.agent_name, Some(engine)))
}

/// Tool the orchestrator uses to reach the knowledge agent
pub fn knowledge_agent_tool(config: &DuetConfig) -> Result<KnowledgeAgentTool> {
    let orchestrator = &config.orchestrator;
    let client = A2aClient::with_timeout(orchestrator.request_timeout())?;
    Ok(KnowledgeAgentTool::new(
        client,
        &orchestrator.agent_name,
        PeerAgentConfig {
            name: orchestrator.knowledge_agent_name.clone(),
            url: orchestrator.knowledge_url.clone(),
        },
    ))
}

pub fn build_chat_session(config: &DuetConfig) -> Result<ChatSession> {
    let orchestrator = &config.orchestrator;
    let provider = llm_provider(
        &config.llm,
        &orchestrator.model,
        Some(orchestrator.temperature),
    )
    .context("Cannot start the orchestrator")?;

    let mut tools = ToolRegistry::new();
    tools.register(Arc::new(knowledge_agent_tool(config)?));

    let agent = AgentLoop::new(
        provider,
        Arc::new(tools),
        orchestrator_system_prompt(&orchestrator.agent_name),
    )
    .with_max_iterations(orchestrator.max_iterations);
    Ok(ChatSession::new(agent))
}

/// A request the orchestrator would send and the knowledge agent's answer
pub fn example_exchange(config: &DuetConfig) -> Result<(A2AMessage, A2AMessage)> {
    let request = knowledge_agent_tool(config)?.build_request("What is the capital of France?");
    let turn = &request.turns[0];
    let call = &turn.tool_calls()[0];

    let reply = A2AMessage::in_conversation(
        request.conversation_id.clone(),
        vec![
            ConversationTurn::new(turn.recipient.clone(), turn.sender.clone())
                .with_tool_responses(vec![ToolResponse::success(
                    call,
                    json!({ "answer": "The capital of France is Paris." }),
                )]),
        ],
    );
    Ok((request, reply))
}
