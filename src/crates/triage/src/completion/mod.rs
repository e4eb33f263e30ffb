//! Structured completion contract
//!
//! A step executor sends one [`CompletionRequest`] (system prompt, user
//! prompt, the JSON keys it expects back) and receives either a
//! [`Completion`] with exactly those keys parsed, or a
//! [`CompletionFailure`]. Guessed or partial fields are never returned.

pub mod client;
pub mod parser;
pub mod retry;
pub mod session;

pub use client::ChatCompletionClient;
pub use parser::{extract_json, parse_fields};
pub use retry::{retry_with_backoff, RetryConfig};
pub use session::SessionHistory;

use async_trait::async_trait;
use llm::LlmError;
use serde_json::{Map, Value};
use thiserror::Error;

/// Why a completion produced no usable fields.
#[derive(Debug, Error)]
pub enum CompletionFailure {
    /// Timeout, authentication, rate limit or transport failure
    #[error("Provider error: {0}")]
    Provider(#[from] LlmError),

    /// The reply did not contain a parseable JSON object
    #[error("Malformed JSON in completion: {0}")]
    MalformedJson(String),

    /// The JSON object lacked an expected key
    #[error("Missing expected field `{0}`")]
    MissingField(String),

    /// A key was present with the wrong shape
    #[error("Field `{field}` is not {expected}")]
    InvalidField { field: String, expected: &'static str },
}

/// One structured completion request.
#[derive(Debug, Clone, PartialEq)]
pub struct CompletionRequest {
    pub system_prompt: String,
    pub user_prompt: String,
    pub expected_fields: Vec<String>,
    /// Opaque id, forwarded unchanged
    pub session_id: Option<String>,
    pub temperature: Option<f32>,
    pub max_tokens: Option<usize>,
}

impl CompletionRequest {
    pub fn new<I, S>(
        system_prompt: impl Into<String>,
        user_prompt: impl Into<String>,
        expected_fields: I,
    ) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            system_prompt: system_prompt.into(),
            user_prompt: user_prompt.into(),
            expected_fields: expected_fields.into_iter().map(Into::into).collect(),
            session_id: None,
            temperature: None,
            max_tokens: None,
        }
    }

    pub fn with_session(mut self, session_id: Option<String>) -> Self {
        self.session_id = session_id;
        self
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = Some(temperature);
        self
    }

    pub fn with_max_tokens(mut self, max_tokens: Option<usize>) -> Self {
        self.max_tokens = max_tokens;
        self
    }
}

/// Parsed fields plus the tokens the call consumed.
#[derive(Debug, Clone, PartialEq)]
pub struct Completion {
    pub fields: Map<String, Value>,
    pub tokens_used: u64,
}

impl Completion {
    pub fn new(fields: Map<String, Value>, tokens_used: u64) -> Self {
        Self {
            fields,
            tokens_used,
        }
    }

    fn field(&self, name: &str) -> Result<&Value, CompletionFailure> {
        self.fields
            .get(name)
            .ok_or_else(|| CompletionFailure::MissingField(name.to_string()))
    }

    /// A string field; numbers and booleans are rendered as text.
    pub fn string(&self, name: &str) -> Result<String, CompletionFailure> {
        match self.field(name)? {
            Value::String(s) => Ok(s.clone()),
            Value::Number(n) => Ok(n.to_string()),
            Value::Bool(b) => Ok(b.to_string()),
            _ => Err(invalid(name, "a string")),
        }
    }

    /// A list of strings. A single string is accepted as a one-item list.
    pub fn string_list(&self, name: &str) -> Result<Vec<String>, CompletionFailure> {
        value_to_strings(name, self.field(name)?)
    }

    /// Like [`Completion::string_list`] but `null` yields `None`.
    pub fn optional_string_list(
        &self,
        name: &str,
    ) -> Result<Option<Vec<String>>, CompletionFailure> {
        match self.field(name)? {
            Value::Null => Ok(None),
            value => value_to_strings(name, value).map(Some),
        }
    }

    /// A finite number; numeric strings such as `"4"` are accepted.
    pub fn number(&self, name: &str) -> Result<f64, CompletionFailure> {
        let number = match self.field(name)? {
            Value::Number(n) => n.as_f64(),
            Value::String(s) => s.trim().parse::<f64>().ok(),
            _ => None,
        };
        number
            .filter(|n| n.is_finite())
            .ok_or_else(|| invalid(name, "a number"))
    }
}

fn invalid(field: &str, expected: &'static str) -> CompletionFailure {
    CompletionFailure::InvalidField {
        field: field.to_string(),
        expected,
    }
}

fn value_to_strings(name: &str, value: &Value) -> Result<Vec<String>, CompletionFailure> {
    match value {
        Value::Array(items) => items
            .iter()
            .map(|item| match item {
                Value::String(s) => Ok(s.clone()),
                Value::Number(n) => Ok(n.to_string()),
                _ => Err(invalid(name, "a list of strings")),
            })
            .collect(),
        Value::String(s) => Ok(vec![s.clone()]),
        _ => Err(invalid(name, "a list of strings")),
    }
}

/// Anything that can answer a structured completion request.
#[async_trait]
pub trait CompletionClient: Send + Sync {
    async fn complete(&self, request: CompletionRequest) -> Result<Completion, CompletionFailure>;
}
