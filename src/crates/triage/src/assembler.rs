//! Final response projection
//!
//! [`assemble`] turns a finished [`WorkflowState`] into the external
//! [`AssessmentResult`]. Sections whose step never ran are filled with
//! their fallback values so every key is always present.

use crate::state::{
    Actor, Classification, Guidance, Resources, StepName, TraceEntry, WorkflowState,
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::time::Duration;

/// Run-level bookkeeping.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Orchestration {
    /// Steps in execution order
    pub agents_called: Vec<StepName>,
    /// Wall-clock seconds for the whole run
    pub total_time: f64,
    pub total_tokens: u64,
    pub workflow_id: String,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub timed_out: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
}

/// Execution diagnostics.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Metrics {
    pub execution_trace: Vec<TraceEntry>,
    /// Step name → milliseconds
    pub agent_timings: BTreeMap<String, f64>,
    /// `"{target}: {reason}"` per routing decision, in order
    pub routing_decisions: Vec<String>,
}

/// The complete triage response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AssessmentResult {
    pub assessment: Classification,
    pub guidance: Guidance,
    pub resources: Resources,
    pub orchestration: Orchestration,
    pub metrics: Metrics,
}

impl AssessmentResult {
    pub fn workflow_id(&self) -> &str {
        &self.orchestration.workflow_id
    }

    pub fn agents_called(&self) -> &[StepName] {
        &self.orchestration.agents_called
    }

    pub fn to_json_pretty(&self) -> crate::Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

/// Build the response from final state.
pub fn assemble(
    state: &WorkflowState,
    elapsed: Duration,
    timed_out: bool,
    model: Option<&str>,
) -> AssessmentResult {
    let trace = state.trace();

    let agent_timings = trace
        .iter()
        .filter_map(|entry| match entry.actor {
            Actor::Step(step) => Some((step.as_str().to_string(), entry.duration_ms)),
            Actor::Router => None,
        })
        .collect();

    let routing_decisions = trace
        .iter()
        .filter(|entry| entry.actor == Actor::Router)
        .map(routing_summary)
        .collect();

    AssessmentResult {
        assessment: state
            .classification
            .clone()
            .unwrap_or_else(Classification::fallback),
        guidance: state.guidance.clone().unwrap_or_else(Guidance::fallback),
        resources: state.resources.clone().unwrap_or_else(Resources::fallback),
        orchestration: Orchestration {
            agents_called: state.steps_completed().to_vec(),
            total_time: elapsed.as_secs_f64(),
            total_tokens: state.tokens_used(),
            workflow_id: state.workflow_id.clone(),
            timed_out,
            model: model.map(str::to_string),
        },
        metrics: Metrics {
            execution_trace: trace.to_vec(),
            agent_timings,
            routing_decisions,
        },
    }
}

fn routing_summary(entry: &TraceEntry) -> String {
    let target = entry
        .detail
        .get("next")
        .and_then(|v| v.as_str())
        .unwrap_or(entry.action.as_str());
    match entry.detail.get("reason").and_then(|v| v.as_str()) {
        Some(reason) => format!("{}: {}", target, reason),
        None => target.to_string(),
    }
}
