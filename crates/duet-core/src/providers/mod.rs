//! LLM provider abstraction
//!
//! Providers implement [`LlmProvider`]. The only bundled implementation talks
//! to the OpenAI chat completions API, which also covers compatible servers.

pub mod openai;
pub mod types;

pub use openai::{OpenAiConfig, OpenAiProvider};
pub use types::{
    ChatBlock, ChatMessage, ChatMessageContent, ChatResponse, ChatResponseBlock, ChatRole,
    ChatUsage, LlmProvider, StopReason,
};
