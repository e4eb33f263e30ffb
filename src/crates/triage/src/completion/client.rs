//! Completion client backed by a chat model

use super::parser::parse_fields;
use super::retry::{retry_with_backoff, RetryConfig};
use super::session::SessionHistory;
use super::{Completion, CompletionClient, CompletionFailure, CompletionRequest};
use crate::telemetry;
use async_trait::async_trait;
use llm::{ChatModel, ChatRequest, Message};
use std::sync::Arc;
use std::time::Instant;
use tracing::debug;

/// [`CompletionClient`] over any [`ChatModel`].
///
/// Each request becomes `[system, prior session turns.., user]` with JSON
/// mode on. Transient provider errors are retried per [`RetryConfig`]; a
/// successful reply is recorded into the session history when a session id
/// is present and a history is attached.
#[derive(Clone)]
pub struct ChatCompletionClient {
    model: Arc<dyn ChatModel>,
    retry: RetryConfig,
    history: Option<Arc<SessionHistory>>,
}

impl ChatCompletionClient {
    pub fn new(model: Arc<dyn ChatModel>) -> Self {
        Self {
            model,
            retry: RetryConfig::default(),
            history: None,
        }
    }

    pub fn with_retry(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }

    /// Attach session memory.
    pub fn with_history(mut self, history: Arc<SessionHistory>) -> Self {
        self.history = Some(history);
        self
    }

    pub fn model_name(&self) -> &str {
        self.model.model_name()
    }

    fn system_prompt(request: &CompletionRequest) -> String {
        if request.expected_fields.is_empty() {
            return request.system_prompt.clone();
        }
        format!(
            "{}\n\nReply with a single JSON object containing exactly these keys: {}.",
            request.system_prompt.trim_end(),
            request.expected_fields.join(", ")
        )
    }

    fn build_request(&self, request: &CompletionRequest) -> ChatRequest {
        let mut messages = vec![Message::system(Self::system_prompt(request))];

        if let (Some(history), Some(session_id)) = (&self.history, &request.session_id) {
            messages.extend(history.messages(session_id));
        }
        messages.push(Message::human(request.user_prompt.clone()));

        let mut chat = ChatRequest::new(messages).with_json_mode();
        if let Some(temperature) = request.temperature {
            chat = chat.with_temperature(temperature);
        }
        if let Some(max_tokens) = request.max_tokens {
            chat = chat.with_max_tokens(max_tokens);
        }
        chat
    }
}

#[async_trait]
impl CompletionClient for ChatCompletionClient {
    async fn complete(&self, request: CompletionRequest) -> Result<Completion, CompletionFailure> {
        let chat_request = self.build_request(&request);
        let start = Instant::now();

        let result = retry_with_backoff(&self.retry, "chat_completion", || {
            let model = Arc::clone(&self.model);
            let chat_request = chat_request.clone();
            async move { model.chat(chat_request).await }
        })
        .await;

        let response = match result {
            Ok(response) => response,
            Err(e) => {
                telemetry::llm_call(self.model.model_name(), 0, start.elapsed(), false);
                return Err(e.into());
            }
        };

        let tokens = response.total_tokens() as u64;
        telemetry::llm_call(self.model.model_name(), tokens, start.elapsed(), true);

        let reply = response.message.text();
        debug!(reply = %telemetry::truncate(reply, 200), "Completion reply received");

        let fields = parse_fields(reply, &request.expected_fields)?;

        if let (Some(history), Some(session_id)) = (&self.history, &request.session_id) {
            history.record(session_id, request.user_prompt.as_str(), reply);
        }

        Ok(Completion::new(fields, tokens))
    }
}
