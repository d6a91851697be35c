//! YWT LLM - chat-model backed capabilities
//!
//! Implements the orchestrator's generator, analyzer and summarizer on top
//! of a single [`ChatModel`]. [`OpenAiChat`] talks to any OpenAI-compatible
//! `chat/completions` endpoint.

pub mod adapters;
pub mod chat;
pub mod config;
pub mod prompts;

pub use adapters::{chat_capabilities, ChatAnalyzer, ChatEntityGenerator, ChatSummarizer};
pub use chat::{parse_http_error, ChatModel, OpenAiChat};
pub use config::{LlmConfig, LlmError};
