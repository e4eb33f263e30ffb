//! Step-by-step guidance

use super::{attempt, clean_list, record_failure, record_success, StepExecutor};
use crate::completion::{Completion, CompletionClient, CompletionFailure, CompletionRequest};
use crate::config::StepSettings;
use crate::state::{clamp_confidence, Guidance, StepName, WorkflowState};
use async_trait::async_trait;
use std::sync::Arc;

const SYSTEM_PROMPT: &str = "You write immediate safety instructions for people in an emergency.

Give short imperative steps, most urgent first. Personal safety comes \
before anything else. Do not diagnose. Tell the person to call emergency \
services whenever the situation may be life-threatening.

Return:
- steps: list of instructions
- confidence: number from 1.0 (guessing) to 5.0 (certain)";

const FIELDS: [&str; 2] = ["steps", "confidence"];

/// Fills [`WorkflowState::guidance`].
pub struct Advisor {
    client: Arc<dyn CompletionClient>,
    settings: StepSettings,
    max_steps: usize,
}

impl Advisor {
    pub fn new(client: Arc<dyn CompletionClient>, settings: StepSettings, max_steps: usize) -> Self {
        Self {
            client,
            settings,
            max_steps,
        }
    }

    fn request(&self, state: &WorkflowState) -> CompletionRequest {
        let mut user_prompt = format!("Emergency: {}\n", state.description);
        if let Some(c) = &state.classification {
            user_prompt.push_str(&format!(
                "Type: {}\nSeverity: {}/5\nRecommended response: {}\n",
                c.emergency_type, c.severity, c.recommended_response
            ));
            if !c.immediate_risks.is_empty() {
                user_prompt.push_str(&format!("Immediate risks: {}\n", c.immediate_risks.join("; ")));
            }
        }
        user_prompt.push_str(&format!("Give up to {} steps.", self.max_steps));

        CompletionRequest::new(SYSTEM_PROMPT, user_prompt, FIELDS)
            .with_session(state.session_id.clone())
            .with_temperature(self.settings.temperature)
            .with_max_tokens(self.settings.max_tokens)
    }

    fn parse(&self, completion: &Completion) -> Result<Guidance, CompletionFailure> {
        let mut steps = clean_list(completion.string_list("steps")?);
        if steps.is_empty() {
            return Err(CompletionFailure::InvalidField {
                field: "steps".to_string(),
                expected: "a non-empty list",
            });
        }
        steps.truncate(self.max_steps);

        Ok(Guidance {
            steps,
            confidence: clamp_confidence(completion.number("confidence")?),
        })
    }
}

#[async_trait]
impl StepExecutor for Advisor {
    fn step(&self) -> StepName {
        StepName::Guidance
    }

    async fn execute(&self, state: &mut WorkflowState) {
        let step = self.step();
        let outcome = attempt(
            self.client.as_ref(),
            &state.workflow_id,
            step,
            self.request(state),
            |c| self.parse(c),
        )
        .await;

        match outcome.result {
            Ok(guidance) => {
                let confidence = guidance.confidence;
                let step_count = guidance.steps.len();
                state.guidance = Some(guidance);
                record_success(
                    state,
                    step,
                    "generate_guidance",
                    outcome.tokens,
                    outcome.elapsed,
                    confidence,
                    |entry| entry.with_detail("steps", step_count),
                );
            }
            Err(e) => {
                state.guidance = Some(Guidance::fallback());
                record_failure(state, step, outcome.elapsed, &e);
            }
        }
    }
}
