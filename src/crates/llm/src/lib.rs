//! LLM provider layer for the SOS triage engine.
//!
//! Defines the provider-agnostic [`ChatModel`] trait and ships an
//! [`remote::OpenRouterClient`] implementation.
//!
//! ```rust,ignore
//! use llm::remote::OpenRouterClient;
//! use llm::{ChatModel, ChatRequest, Message, RemoteLlmConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = RemoteLlmConfig::openrouter_from_env("deepseek/deepseek-chat")?;
//!     let client = OpenRouterClient::new(config)?;
//!
//!     let request = ChatRequest::new(vec![Message::human("Is a paper cut serious?")])
//!         .with_temperature(0.3);
//!
//!     let response = client.chat(request).await?;
//!     println!("{}", response.message.text());
//!     Ok(())
//! }
//! ```

pub mod chat;
pub mod config;
pub mod error;

#[cfg(feature = "remote")]
pub mod remote;

pub use chat::{
    ChatConfig, ChatModel, ChatRequest, ChatResponse, Message, MessageRole, UsageMetadata,
};
pub use config::{RemoteLlmConfig, DEFAULT_MODEL, OPENROUTER_BASE_URL};
pub use error::{LlmError, Result};
