//! LLM module: completion contract and HTTP client
//!
//! This module provides:
//! - `CompletionClient`, the text-in/text-out contract the chat orchestrator relies on
//! - `LlmClientConfig`, `LlmClient` for talking to OpenAI-compatible backends

mod client;

pub use client::{ChatMessage, ChatRole, CompletionClient, LlmClient, LlmClientConfig};
