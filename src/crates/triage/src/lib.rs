//! Emergency triage workflow engine.
//!
//! A supervisor-routed, strictly sequential pipeline: after every step the
//! [`router::Router`] inspects the accumulated [`state::WorkflowState`] and
//! picks the next step (classification, guidance, resources) or finishes.
//! Each step issues one structured completion through a
//! [`completion::CompletionClient`] and falls back to safe defaults when the
//! call fails, so a caller always receives a complete
//! [`assembler::AssessmentResult`].
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use llm::remote::OpenRouterClient;
//! use llm::RemoteLlmConfig;
//! use triage::{EngineConfig, WorkflowEngine};
//!
//! let config = EngineConfig::from_env()?;
//! let model = OpenRouterClient::new(RemoteLlmConfig::openrouter_from_env(&config.model)?)?;
//! let engine = WorkflowEngine::from_chat_model(Arc::new(model), config);
//!
//! let result = engine
//!     .run("Severe chest pain and difficulty breathing", Some("Home"), None)
//!     .await?;
//! println!("{}", serde_json::to_string_pretty(&result)?);
//! ```

pub mod agents;
pub mod assembler;
pub mod completion;
pub mod config;
pub mod engine;
pub mod router;
pub mod state;
pub mod telemetry;

use thiserror::Error;

pub use agents::StepExecutor;
pub use assembler::{AssessmentResult, Metrics, Orchestration};
pub use completion::{
    ChatCompletionClient, Completion, CompletionClient, CompletionFailure, CompletionRequest,
    RetryConfig, SessionHistory,
};
pub use config::{EngineConfig, RoutingPolicy, StepSettings, StepSettingsSet};
pub use engine::WorkflowEngine;
pub use router::{Route, Router, RoutingDecision, Supervisor};
pub use state::{
    Actor, Classification, Guidance, RecommendedResponse, Resources, StepName, TraceEntry,
    WorkflowState,
};

/// Errors that can surface from the triage engine.
///
/// Step-level completion failures never appear here; executors absorb them
/// into fallback values.
#[derive(Debug, Error)]
pub enum TriageError {
    /// The router did not reach `Done` within the iteration ceiling.
    #[error("Routing overrun in workflow {workflow_id}: no terminal decision after {iterations} iterations")]
    RoutingOverrun {
        workflow_id: String,
        iterations: usize,
        trace: Vec<TraceEntry>,
    },

    /// Input rejected before any step ran.
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Configuration could not be loaded or failed validation.
    #[error("Configuration error: {0}")]
    Config(String),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Result type for engine operations
pub type Result<T> = std::result::Result<T, TriageError>;

/// Get version information
pub fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
