//! Workflow engine
//!
//! Drives one run: ask the supervisor, execute the chosen step, repeat
//! until the supervisor says done. Completed steps are never re-run. The
//! loop is bounded by `max_iterations`; an optional deadline stops new
//! steps from starting and cancels the one in flight.

use crate::agents::{Advisor, Classifier, Resourcer, StepExecutor};
use crate::assembler::{assemble, AssessmentResult};
use crate::completion::{ChatCompletionClient, CompletionClient, SessionHistory};
use crate::config::EngineConfig;
use crate::router::{Route, Router, Supervisor};
use crate::state::{Actor, StepName, TraceEntry, WorkflowState};
use crate::{telemetry, Result, TriageError};
use llm::ChatModel;
use std::sync::Arc;
use std::time::Instant;
use uuid::Uuid;

/// The three step executors, addressed by name.
#[derive(Clone)]
struct Steps {
    classification: Arc<dyn StepExecutor>,
    guidance: Arc<dyn StepExecutor>,
    resources: Arc<dyn StepExecutor>,
}

impl Steps {
    fn get(&self, step: StepName) -> &dyn StepExecutor {
        match step {
            StepName::Classification => self.classification.as_ref(),
            StepName::Guidance => self.guidance.as_ref(),
            StepName::Resources => self.resources.as_ref(),
        }
    }
}

/// Runs triage workflows.
///
/// Holds no per-request state; share one engine across tasks with `Arc`.
#[derive(Clone)]
pub struct WorkflowEngine {
    supervisor: Arc<dyn Supervisor>,
    steps: Steps,
    config: EngineConfig,
    model: Option<String>,
}

impl WorkflowEngine {
    /// Build an engine over any completion client.
    pub fn new(client: Arc<dyn CompletionClient>, config: EngineConfig) -> Self {
        let steps = Steps {
            classification: Arc::new(Classifier::new(
                Arc::clone(&client),
                config.steps.classification.clone(),
            )),
            guidance: Arc::new(Advisor::new(
                Arc::clone(&client),
                config.steps.guidance.clone(),
                config.max_guidance_steps,
            )),
            resources: Arc::new(Resourcer::new(client, config.steps.resources.clone())),
        };

        Self {
            supervisor: Arc::new(Router::new(config.routing.clone())),
            steps,
            config,
            model: None,
        }
    }

    /// Build an engine over a chat model, with retries and session history.
    pub fn from_chat_model(model: Arc<dyn ChatModel>, config: EngineConfig) -> Self {
        let history = Arc::new(SessionHistory::new(config.session_history_turns));
        let client = ChatCompletionClient::new(model)
            .with_retry(config.retry.clone())
            .with_history(history);
        let model_name = client.model_name().to_string();

        Self::new(Arc::new(client), config).with_model_name(model_name)
    }

    /// Replace the default rule-based router.
    pub fn with_supervisor(mut self, supervisor: Arc<dyn Supervisor>) -> Self {
        self.supervisor = supervisor;
        self
    }

    /// Model identifier reported in `orchestration.model`.
    pub fn with_model_name(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Assess one emergency.
    ///
    /// Step failures never surface here; they become fallback sections.
    ///
    /// # Errors
    ///
    /// - [`TriageError::InvalidInput`] when `description` is blank
    /// - [`TriageError::RoutingOverrun`] when the supervisor does not
    ///   finish within `max_iterations` decisions
    pub async fn run(
        &self,
        description: &str,
        location: Option<&str>,
        session_id: Option<&str>,
    ) -> Result<AssessmentResult> {
        let description = description.trim();
        if description.is_empty() {
            return Err(TriageError::InvalidInput(
                "emergency description cannot be empty".to_string(),
            ));
        }

        let location = location
            .map(str::trim)
            .filter(|l| !l.is_empty())
            .map(str::to_string);
        let mut state = WorkflowState::new(
            Uuid::new_v4().to_string(),
            description,
            location,
            session_id.map(str::to_string),
        );

        telemetry::workflow_started(&state.workflow_id, description, state.location.as_deref());
        let start = Instant::now();
        let deadline = self
            .config
            .deadline()
            .map(|budget| tokio::time::Instant::now() + budget);
        let mut timed_out = false;
        let mut iterations = 0;

        loop {
            if iterations >= self.config.max_iterations {
                telemetry::routing_overrun(&state.workflow_id, iterations);
                return Err(TriageError::RoutingOverrun {
                    workflow_id: state.workflow_id.clone(),
                    iterations,
                    trace: state.trace().to_vec(),
                });
            }
            iterations += 1;

            let route_start = Instant::now();
            let decision = self.supervisor.decide(&state);
            telemetry::routing_decision(&state.workflow_id, iterations, &decision);
            state.push_trace(
                TraceEntry::new(Actor::Router, "route", route_start.elapsed())
                    .with_detail("next", decision.route.to_string())
                    .with_detail("reason", decision.reason.clone())
                    .with_detail("iteration", iterations),
            );

            let step = match decision.route {
                Route::Done => break,
                Route::Step(step) => step,
            };

            if state.is_completed(step) {
                telemetry::repeated_step_refused(&state.workflow_id, step);
                continue;
            }

            let executor = self.steps.get(step);
            match deadline {
                Some(deadline) => {
                    if tokio::time::Instant::now() >= deadline {
                        telemetry::deadline_reached(&state.workflow_id, Some(step));
                        timed_out = true;
                        break;
                    }
                    let step_start = tokio::time::Instant::now();
                    let finished = tokio::time::timeout_at(deadline, executor.execute(&mut state))
                        .await
                        .is_ok();
                    if !finished {
                        telemetry::deadline_reached(&state.workflow_id, Some(step));
                        state.push_trace(
                            TraceEntry::error(step, "deadline exceeded", step_start.elapsed())
                                .with_detail("timed_out", true),
                        );
                        timed_out = true;
                        break;
                    }
                }
                None => executor.execute(&mut state).await,
            }
        }

        let elapsed = start.elapsed();
        telemetry::workflow_completed(
            &state.workflow_id,
            state.steps_completed(),
            state.tokens_used(),
            elapsed,
            timed_out,
        );

        Ok(assemble(&state, elapsed, timed_out, self.model.as_deref()))
    }
}
