//! Remote LLM provider implementations.
//!
//! - **OpenRouter** - Unified OpenAI-compatible API for multiple providers

pub mod openrouter;

pub use openrouter::OpenRouterClient;
