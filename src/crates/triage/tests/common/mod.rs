//! Shared mocks for integration tests.

#![allow(dead_code)]

use async_trait::async_trait;
use llm::{ChatModel, ChatRequest, ChatResponse, LlmError, Message, MessageRole, UsageMetadata};
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use triage::{Completion, CompletionClient, CompletionFailure, CompletionRequest, StepName};

/// Which step a request belongs to, judged by the keys it expects.
pub fn step_of(expected_fields: &[String]) -> StepName {
    if expected_fields.iter().any(|f| f == "emergency_type") {
        StepName::Classification
    } else if expected_fields.iter().any(|f| f == "steps") {
        StepName::Guidance
    } else {
        StepName::Resources
    }
}

#[derive(Clone)]
enum Reply {
    Fields(Value, u64),
    Fail,
}

/// A [`CompletionClient`] with a canned reply per step.
///
/// Steps without a reply fail with a provider error.
#[derive(Clone, Default)]
pub struct ScriptedClient {
    replies: HashMap<StepName, Reply>,
    delays: HashMap<StepName, Duration>,
    requests: Arc<Mutex<Vec<CompletionRequest>>>,
}

impl ScriptedClient {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn reply(mut self, step: StepName, fields: Value, tokens: u64) -> Self {
        self.replies.insert(step, Reply::Fields(fields, tokens));
        self
    }

    pub fn fail(mut self, step: StepName) -> Self {
        self.replies.insert(step, Reply::Fail);
        self
    }

    pub fn delay(mut self, step: StepName, delay: Duration) -> Self {
        self.delays.insert(step, delay);
        self
    }

    pub fn requests(&self) -> Vec<CompletionRequest> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl CompletionClient for ScriptedClient {
    async fn complete(&self, request: CompletionRequest) -> Result<Completion, CompletionFailure> {
        let step = step_of(&request.expected_fields);
        self.requests.lock().unwrap().push(request);

        if let Some(delay) = self.delays.get(&step) {
            tokio::time::sleep(*delay).await;
        }

        match self.replies.get(&step) {
            Some(Reply::Fields(Value::Object(map), tokens)) => {
                Ok(Completion::new(map.clone(), *tokens))
            }
            Some(Reply::Fields(_, _)) => {
                Err(CompletionFailure::MalformedJson("not an object".to_string()))
            }
            Some(Reply::Fail) | None => {
                Err(LlmError::ServiceUnavailable("scripted outage".to_string()).into())
            }
        }
    }
}

/// A [`ChatModel`] that answers by looking at the key list in the system
/// prompt, and records every request it receives.
#[derive(Clone, Default)]
pub struct ScriptedChatModel {
    replies: HashMap<StepName, String>,
    requests: Arc<Mutex<Vec<ChatRequest>>>,
}

impl ScriptedChatModel {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn reply(mut self, step: StepName, body: Value) -> Self {
        self.replies.insert(step, body.to_string());
        self
    }

    pub fn requests(&self) -> Vec<ChatRequest> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl ChatModel for ScriptedChatModel {
    async fn chat(&self, request: ChatRequest) -> llm::Result<ChatResponse> {
        let system = request
            .messages
            .iter()
            .find(|m| m.role == MessageRole::System)
            .map(|m| m.text().to_string())
            .unwrap_or_default();
        self.requests.lock().unwrap().push(request);

        let step = if system.contains("emergency_type") {
            StepName::Classification
        } else if system.contains("steps") {
            StepName::Guidance
        } else {
            StepName::Resources
        };

        let body = self
            .replies
            .get(&step)
            .cloned()
            .ok_or_else(|| LlmError::ProviderError(format!("no reply for {}", step)))?;

        Ok(ChatResponse {
            message: Message::assistant(body),
            usage: Some(UsageMetadata::new(30, 20)),
            metadata: HashMap::new(),
        })
    }

    fn model_name(&self) -> &str {
        "scripted/model"
    }
}

pub fn chest_pain_classification() -> Value {
    json!({
        "emergency_type": "medical",
        "severity": 5,
        "immediate_risks": ["Possible heart attack", "Loss of consciousness"],
        "recommended_response": "call_911",
        "confidence": 4.5,
    })
}

pub fn paper_cut_classification() -> Value {
    json!({
        "emergency_type": "accident",
        "severity": 1,
        "immediate_risks": ["Minor bleeding"],
        "recommended_response": "self-help",
        "confidence": 4.8,
    })
}

pub fn guidance_reply() -> Value {
    json!({
        "steps": [
            "Call 911 now",
            "Sit down and stay still",
            "Chew an aspirin if not allergic",
            "Loosen tight clothing",
            "Unlock the door for responders",
        ],
        "confidence": 4.0,
    })
}

pub fn resources_reply() -> Value {
    json!({
        "emergency_services": "911",
        "nearby_hospitals": ["General Hospital - 1.2 miles"],
        "additional_resources": ["American Heart Association hotline"],
        "confidence": 3.5,
    })
}

/// A client that answers every step for the chest pain scenario.
pub fn chest_pain_client() -> ScriptedClient {
    ScriptedClient::new()
        .reply(StepName::Classification, chest_pain_classification(), 100)
        .reply(StepName::Guidance, guidance_reply(), 150)
        .reply(StepName::Resources, resources_reply(), 80)
}
