//! A2A (Agent-to-Agent) messaging for duet
//!
//! A small typed envelope for conversational turns, tool calls and tool
//! responses between named agents. Provides the message model and its
//! validated JSON form, the [`Responder`] that answers calls on the
//! receiving side, and an HTTP client and server to carry messages.

pub mod client;
pub mod error;
pub mod protocol;
pub mod responder;
pub mod server;
pub mod tool;
mod validate;

pub use client::{A2aClient, PeerAgentConfig};
pub use error::{ToolError, ValidationError, ValidationErrorKind};
pub use protocol::{
    A2AMessage, AgentContext, AgentRole, ConversationTurn, ToolCall, ToolResponse, new_id,
    now_timestamp,
};
pub use responder::{A2aTool, Responder};
pub use server::A2aServer;
pub use tool::KnowledgeAgentTool;
