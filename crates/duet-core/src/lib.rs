//! duet-core: shared agent machinery
//!
//! Tool registry, LLM provider abstraction and the tool-calling agent loop
//! used by the orchestrator agent, and the LLM used by the knowledge agent
//! to synthesize answers.

pub mod agent;
pub mod providers;
pub mod tools;

pub use agent::{AgentLoop, ChatSession};
pub use providers::{ChatMessage, LlmProvider, OpenAiConfig, OpenAiProvider};
pub use tools::{ToolDefinition, ToolExecutor, ToolHandler, ToolRegistry};
