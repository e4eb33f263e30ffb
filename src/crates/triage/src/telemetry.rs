//! Structured logging for workflow runs
//!
//! All engine and step events go through these helpers so field names stay
//! consistent (`workflow_id`, `step`, `duration_ms`, `tokens`). Nothing here
//! installs a subscriber except [`init_tracing`], which binaries call once.

use crate::router::RoutingDecision;
use crate::state::StepName;
use std::fmt::Display;
use std::time::Duration;
use tracing::{debug, error, info, warn};
use tracing_subscriber::EnvFilter;

/// Install a `fmt` subscriber filtered by `RUST_LOG` (default `info`).
///
/// Returns `false` when a global subscriber was already set.
pub fn init_tracing() -> bool {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .try_init()
        .is_ok()
}

pub fn workflow_started(workflow_id: &str, description: &str, location: Option<&str>) {
    info!(
        workflow_id = workflow_id,
        description = %truncate(description, 100),
        location = location.unwrap_or("unknown"),
        "Workflow started"
    );
}

pub fn workflow_completed(
    workflow_id: &str,
    steps: &[StepName],
    total_tokens: u64,
    elapsed: Duration,
    timed_out: bool,
) {
    let steps: Vec<&str> = steps.iter().map(StepName::as_str).collect();
    info!(
        workflow_id = workflow_id,
        steps = ?steps,
        total_tokens = total_tokens,
        duration = %format_duration(elapsed),
        timed_out = timed_out,
        "Workflow completed"
    );
}

pub fn routing_decision(workflow_id: &str, iteration: usize, decision: &RoutingDecision) {
    info!(
        workflow_id = workflow_id,
        iteration = iteration,
        next = %decision.route,
        reason = %decision.reason,
        "Routing decision"
    );
}

/// The router asked for a step that already ran.
pub fn repeated_step_refused(workflow_id: &str, step: StepName) {
    warn!(
        workflow_id = workflow_id,
        step = step.as_str(),
        "Router requested a completed step; not re-running it"
    );
}

pub fn routing_overrun(workflow_id: &str, iterations: usize) {
    error!(
        workflow_id = workflow_id,
        iterations = iterations,
        "Routing ceiling reached without a terminal decision"
    );
}

pub fn deadline_reached(workflow_id: &str, step: Option<StepName>) {
    warn!(
        workflow_id = workflow_id,
        step = step.map(|s| s.as_str()).unwrap_or("none"),
        "Workflow deadline reached"
    );
}

pub fn step_started(workflow_id: &str, step: StepName) {
    debug!(workflow_id = workflow_id, step = step.as_str(), "Step started");
}

pub fn step_completed(workflow_id: &str, step: StepName, elapsed: Duration, tokens: u64) {
    info!(
        workflow_id = workflow_id,
        step = step.as_str(),
        duration_ms = elapsed.as_secs_f64() * 1000.0,
        tokens = tokens,
        "Step completed"
    );
}

pub fn step_failed(workflow_id: &str, step: StepName, elapsed: Duration, error: &dyn Display) {
    warn!(
        workflow_id = workflow_id,
        step = step.as_str(),
        duration_ms = elapsed.as_secs_f64() * 1000.0,
        error = %error,
        "Step failed, using fallback"
    );
}

pub fn confidence_score(workflow_id: &str, step: StepName, confidence: f64) {
    debug!(
        workflow_id = workflow_id,
        step = step.as_str(),
        confidence = confidence,
        "Confidence score"
    );
}

pub fn llm_call(model: &str, tokens: u64, elapsed: Duration, success: bool) {
    debug!(
        model = model,
        tokens = tokens,
        duration_ms = elapsed.as_secs_f64() * 1000.0,
        success = success,
        "LLM call"
    );
}

/// Cut `text` to at most `max_chars` characters, marking the cut with `...`.
pub fn truncate(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((idx, _)) => format!("{}...", &text[..idx]),
        None => text.to_string(),
    }
}

/// Human-readable duration for log lines.
pub fn format_duration(duration: Duration) -> String {
    let micros = duration.as_micros();
    if micros < 1000 {
        format!("{}μs", micros)
    } else if micros < 1_000_000 {
        format!("{}ms", micros / 1000)
    } else {
        format!("{:.2}s", duration.as_secs_f64())
    }
}
