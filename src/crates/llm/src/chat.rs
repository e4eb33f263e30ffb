//! Core chat-model trait and request/response types.
//!
//! The triage engine talks to language models only through [`ChatModel`].
//! Providers implement the trait; tests implement it with scripted mocks.

use crate::error::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Role of a message sender.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageRole {
    /// Instructions and constraints for the model.
    System,
    /// End-user input.
    Human,
    /// Model output.
    Assistant,
}

/// A single conversational message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    /// Role of the message sender
    pub role: MessageRole,
    /// Text content
    pub content: String,
}

impl Message {
    /// Create a new message with the given role and content
    pub fn new(role: MessageRole, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
        }
    }

    /// Create a system message
    pub fn system(content: impl Into<String>) -> Self {
        Self::new(MessageRole::System, content)
    }

    /// Create a human message
    pub fn human(content: impl Into<String>) -> Self {
        Self::new(MessageRole::Human, content)
    }

    /// Create an assistant message
    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new(MessageRole::Assistant, content)
    }

    /// Get the text content
    pub fn text(&self) -> &str {
        &self.content
    }
}

/// Generation parameters for a chat request.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ChatConfig {
    /// Sampling temperature.
    pub temperature: Option<f32>,
    /// Maximum tokens to generate.
    pub max_tokens: Option<usize>,
    /// Ask the provider to constrain output to a JSON object.
    pub json_mode: bool,
}

/// A request to a chat model containing messages and configuration.
///
/// ```rust,ignore
/// let request = ChatRequest::new(vec![
///     Message::system("You are an emergency assessment specialist"),
///     Message::human("Assess this emergency: kitchen fire"),
/// ])
/// .with_temperature(0.3)
/// .with_max_tokens(500)
/// .with_json_mode();
/// ```
#[derive(Debug, Clone)]
pub struct ChatRequest {
    /// The conversation messages to send to the model.
    pub messages: Vec<Message>,

    /// Configuration for generation behavior.
    pub config: ChatConfig,
}

impl ChatRequest {
    /// Create a new chat request with the given messages.
    pub fn new(messages: Vec<Message>) -> Self {
        Self {
            messages,
            config: ChatConfig::default(),
        }
    }

    /// Set the temperature for generation.
    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.config.temperature = Some(temperature);
        self
    }

    /// Set the maximum number of tokens to generate.
    pub fn with_max_tokens(mut self, max_tokens: usize) -> Self {
        self.config.max_tokens = Some(max_tokens);
        self
    }

    /// Request a JSON object response.
    pub fn with_json_mode(mut self) -> Self {
        self.config.json_mode = true;
        self
    }
}

/// Token usage reported by the provider.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UsageMetadata {
    /// Prompt tokens
    pub input_tokens: usize,
    /// Completion tokens
    pub output_tokens: usize,
    /// Prompt + completion
    pub total_tokens: usize,
}

impl UsageMetadata {
    /// Build usage from prompt and completion counts.
    pub fn new(input_tokens: usize, output_tokens: usize) -> Self {
        Self {
            input_tokens,
            output_tokens,
            total_tokens: input_tokens + output_tokens,
        }
    }
}

/// A complete response from a chat model.
#[derive(Debug, Clone)]
pub struct ChatResponse {
    /// The assistant's reply.
    pub message: Message,
    /// Token usage, when the provider reports it.
    pub usage: Option<UsageMetadata>,
    /// Provider-specific metadata (model, finish reason, upstream provider).
    pub metadata: HashMap<String, serde_json::Value>,
}

impl ChatResponse {
    /// Total tokens consumed, zero when the provider did not report usage.
    pub fn total_tokens(&self) -> usize {
        self.usage.map(|u| u.total_tokens).unwrap_or(0)
    }
}

/// Core trait for chat-based language models.
///
/// Implementations must be `Send + Sync`; share them as `Arc<dyn ChatModel>`.
#[async_trait]
pub trait ChatModel: Send + Sync {
    /// Generate a complete chat response from messages.
    ///
    /// # Errors
    ///
    /// Network failures, authentication errors, rate limiting and malformed
    /// provider payloads surface as [`crate::LlmError`].
    async fn chat(&self, request: ChatRequest) -> Result<ChatResponse>;

    /// Model identifier, used for logging and response metadata.
    fn model_name(&self) -> &str;
}
