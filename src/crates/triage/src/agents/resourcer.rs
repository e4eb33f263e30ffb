//! Resource coordination step

use super::{attempt, clean_list, record_failure, record_success, StepExecutor};
use crate::completion::{Completion, CompletionClient, CompletionFailure, CompletionRequest};
use crate::config::StepSettings;
use crate::state::{clamp_confidence, Resources, StepName, WorkflowState, DEFAULT_EMERGENCY_SERVICES};
use async_trait::async_trait;
use std::sync::Arc;

const SYSTEM_PROMPT: &str = "You point people in an emergency to the help available to them.

Return:
- emergency_services: the number or service to contact (for example 911)
- nearby_hospitals: list of hospitals or facilities near the location, or null if no location is known
- additional_resources: hotlines, shelters or support services worth knowing
- confidence: number from 1.0 (guessing) to 5.0 (certain)

Without precise location data, suggest generally available resources.";

const FIELDS: [&str; 4] = [
    "emergency_services",
    "nearby_hospitals",
    "additional_resources",
    "confidence",
];

/// Fills [`WorkflowState::resources`].
pub struct Resourcer {
    client: Arc<dyn CompletionClient>,
    settings: StepSettings,
}

impl Resourcer {
    pub fn new(client: Arc<dyn CompletionClient>, settings: StepSettings) -> Self {
        Self { client, settings }
    }

    fn request(&self, state: &WorkflowState) -> CompletionRequest {
        let mut user_prompt = format!(
            "Emergency: {}\nLocation: {}\n",
            state.description,
            state.location_or_unknown()
        );
        if let Some(c) = &state.classification {
            user_prompt.push_str(&format!(
                "Type: {}\nSeverity: {}/5\nRecommended response: {}\n",
                c.emergency_type, c.severity, c.recommended_response
            ));
        }

        CompletionRequest::new(SYSTEM_PROMPT, user_prompt, FIELDS)
            .with_session(state.session_id.clone())
            .with_temperature(self.settings.temperature)
            .with_max_tokens(self.settings.max_tokens)
    }
}

/// Build resources from the model's fields.
///
/// Hospitals are dropped when no location was given; a blank or `unknown`
/// service number becomes the generic default.
pub fn parse_resources(
    completion: &Completion,
    has_location: bool,
) -> Result<Resources, CompletionFailure> {
    let services = completion.string("emergency_services")?;
    let services = services.trim();
    let emergency_services = if services.is_empty() || services.eq_ignore_ascii_case("unknown") {
        DEFAULT_EMERGENCY_SERVICES.to_string()
    } else {
        services.to_string()
    };

    let nearby_hospitals = if has_location {
        completion
            .optional_string_list("nearby_hospitals")?
            .map(clean_list)
            .filter(|list| !list.is_empty())
    } else {
        None
    };

    let additional_resources = completion
        .optional_string_list("additional_resources")?
        .map(clean_list)
        .unwrap_or_default();

    Ok(Resources {
        nearby_hospitals,
        emergency_services,
        additional_resources,
        confidence: clamp_confidence(completion.number("confidence")?),
    })
}

#[async_trait]
impl StepExecutor for Resourcer {
    fn step(&self) -> StepName {
        StepName::Resources
    }

    async fn execute(&self, state: &mut WorkflowState) {
        let step = self.step();
        let has_location = state.location.is_some();
        let outcome = attempt(
            self.client.as_ref(),
            &state.workflow_id,
            step,
            self.request(state),
            |c| parse_resources(c, has_location),
        )
        .await;

        match outcome.result {
            Ok(resources) => {
                let confidence = resources.confidence;
                let services = resources.emergency_services.clone();
                state.resources = Some(resources);
                record_success(
                    state,
                    step,
                    "coordinate_resources",
                    outcome.tokens,
                    outcome.elapsed,
                    confidence,
                    |entry| entry.with_detail("emergency_services", services),
                );
            }
            Err(e) => {
                state.resources = Some(Resources::fallback());
                record_failure(state, step, outcome.elapsed, &e);
            }
        }
    }
}
