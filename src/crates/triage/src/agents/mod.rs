//! Step executors
//!
//! Each executor wraps one structured completion with its own prompt and
//! output schema. On success it writes its section into the workflow
//! state; on any [`CompletionFailure`] it writes the section's fallback
//! instead. Either way it books exactly one trace entry, its duration and
//! its tokens, and marks its step completed.
//!
//! State is only touched after the completion call returns, so a run
//! cancelled mid-call leaves no partial section behind.

pub mod advisor;
pub mod classifier;
pub mod resourcer;

pub use advisor::Advisor;
pub use classifier::Classifier;
pub use resourcer::Resourcer;

use crate::completion::{Completion, CompletionClient, CompletionFailure, CompletionRequest};
use crate::state::{Actor, StepName, TraceEntry, WorkflowState};
use crate::telemetry;
use async_trait::async_trait;
use std::time::{Duration, Instant};

/// One workflow step.
#[async_trait]
pub trait StepExecutor: Send + Sync {
    fn step(&self) -> StepName;

    /// Run the step against `state`. Never fails; failures become fallbacks.
    async fn execute(&self, state: &mut WorkflowState);
}

/// Result of one completion call, parsed into a step's output type.
pub(crate) struct Attempt<T> {
    pub result: Result<T, CompletionFailure>,
    pub tokens: u64,
    pub elapsed: Duration,
}

/// Issue `request` and parse the reply with `parse`.
///
/// Tokens are only counted when the reply parsed into a usable output.
pub(crate) async fn attempt<T, F>(
    client: &dyn CompletionClient,
    workflow_id: &str,
    step: StepName,
    request: CompletionRequest,
    parse: F,
) -> Attempt<T>
where
    F: FnOnce(&Completion) -> Result<T, CompletionFailure>,
{
    telemetry::step_started(workflow_id, step);
    let start = Instant::now();

    let (result, tokens) = match client.complete(request).await {
        Ok(completion) => match parse(&completion) {
            Ok(output) => (Ok(output), completion.tokens_used),
            Err(e) => (Err(e), 0),
        },
        Err(e) => (Err(e), 0),
    };

    Attempt {
        result,
        tokens,
        elapsed: start.elapsed(),
    }
}

/// Book a successful step.
pub(crate) fn record_success(
    state: &mut WorkflowState,
    step: StepName,
    action: &str,
    attempt_tokens: u64,
    elapsed: Duration,
    confidence: f64,
    detail: impl FnOnce(TraceEntry) -> TraceEntry,
) {
    let entry = TraceEntry::new(Actor::Step(step), action, elapsed)
        .with_detail("confidence", confidence)
        .with_detail("tokens", attempt_tokens);
    let entry = detail(entry);

    telemetry::confidence_score(&state.workflow_id, step, confidence);
    telemetry::step_completed(&state.workflow_id, step, elapsed, attempt_tokens);
    state.record_step(step, entry, attempt_tokens);
}

/// Book a failed step whose fallback has already been written.
pub(crate) fn record_failure(
    state: &mut WorkflowState,
    step: StepName,
    elapsed: Duration,
    error: &CompletionFailure,
) {
    telemetry::step_failed(&state.workflow_id, step, elapsed, error);
    state.record_step(step, TraceEntry::error(step, error.to_string(), elapsed), 0);
}

/// Lower-case, underscore-separated emergency type; `unknown` when blank.
pub(crate) fn normalize_type(raw: &str) -> String {
    let normalized = raw
        .trim()
        .to_lowercase()
        .split(|c: char| c.is_whitespace() || c == '-')
        .filter(|part| !part.is_empty())
        .collect::<Vec<_>>()
        .join("_");

    if normalized.is_empty() {
        "unknown".to_string()
    } else {
        normalized
    }
}

/// Drop blank entries and surrounding whitespace.
pub(crate) fn clean_list(items: Vec<String>) -> Vec<String> {
    items
        .into_iter()
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}
