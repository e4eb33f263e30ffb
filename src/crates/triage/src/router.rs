//! Supervisor routing
//!
//! The router is a pure function of the workflow state. Classification
//! always runs first, guidance second; resources run only when the
//! emergency is severe enough or of a critical type.

use crate::config::RoutingPolicy;
use crate::state::{Classification, StepName, WorkflowState};
use std::fmt;

/// Where the workflow goes next.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Route {
    Step(StepName),
    Done,
}

impl fmt::Display for Route {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Route::Step(step) => f.write_str(step.as_str()),
            Route::Done => f.write_str("done"),
        }
    }
}

/// A route plus the rationale recorded in the trace.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoutingDecision {
    pub route: Route,
    pub reason: String,
}

impl RoutingDecision {
    pub fn step(step: StepName, reason: impl Into<String>) -> Self {
        Self {
            route: Route::Step(step),
            reason: reason.into(),
        }
    }

    pub fn done(reason: impl Into<String>) -> Self {
        Self {
            route: Route::Done,
            reason: reason.into(),
        }
    }

    /// `"{target}: {reason}"`, as reported in `metrics.routing_decisions`.
    pub fn summary(&self) -> String {
        format!("{}: {}", self.route, self.reason)
    }
}

/// Decides the next step from the current state.
///
/// Implementations must not mutate anything and must return the same
/// decision for the same state.
pub trait Supervisor: Send + Sync {
    fn decide(&self, state: &WorkflowState) -> RoutingDecision;
}

/// The default rule-based supervisor.
#[derive(Debug, Clone, Default)]
pub struct Router {
    policy: RoutingPolicy,
}

impl Router {
    pub fn new(policy: RoutingPolicy) -> Self {
        Self { policy }
    }

    /// Whether the resources step should run for this classification.
    fn needs_resources(&self, classification: &Classification) -> bool {
        classification.severity >= self.policy.severity_threshold
            || self.policy.is_critical_type(&classification.emergency_type)
    }
}

impl Supervisor for Router {
    fn decide(&self, state: &WorkflowState) -> RoutingDecision {
        if !state.is_completed(StepName::Classification) {
            return RoutingDecision::step(
                StepName::Classification,
                "initial classification required",
            );
        }

        if !state.is_completed(StepName::Guidance) {
            let reason = match &state.classification {
                Some(c) => format!(
                    "guidance needed for {} emergency (severity {})",
                    c.emergency_type, c.severity
                ),
                None => "guidance needed for unclassified emergency".to_string(),
            };
            return RoutingDecision::step(StepName::Guidance, reason);
        }

        if !state.is_completed(StepName::Resources) {
            return match &state.classification {
                Some(c) if !self.needs_resources(c) => {
                    RoutingDecision::done("low severity - resources skipped")
                }
                Some(c) => RoutingDecision::step(
                    StepName::Resources,
                    format!("resource coordination needed for severity {}", c.severity),
                ),
                None => RoutingDecision::step(
                    StepName::Resources,
                    "resource coordination needed for unclassified emergency",
                ),
            };
        }

        RoutingDecision::done("all steps consulted")
    }
}
