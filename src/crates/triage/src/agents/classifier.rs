//! Situation classification step

use super::{attempt, clean_list, normalize_type, record_failure, record_success, StepExecutor};
use crate::completion::{Completion, CompletionClient, CompletionFailure, CompletionRequest};
use crate::config::StepSettings;
use crate::state::{clamp_confidence, Classification, RecommendedResponse, StepName, WorkflowState};
use async_trait::async_trait;
use std::sync::Arc;
use tracing::warn;

const SYSTEM_PROMPT: &str = "You classify emergency reports for a triage service.

Determine:
- emergency_type: one of medical, security, natural_disaster, accident, other
- severity: integer from 1 (minor) to 5 (life-threatening)
- immediate_risks: short list of concrete dangers right now
- recommended_response: one of \"self-help\", \"contact_help\", \"call_911\"
- confidence: number from 1.0 (guessing) to 5.0 (certain)

Prefer the safer response when in doubt.";

const FIELDS: [&str; 5] = [
    "emergency_type",
    "severity",
    "immediate_risks",
    "recommended_response",
    "confidence",
];

/// Fills [`WorkflowState::classification`].
pub struct Classifier {
    client: Arc<dyn CompletionClient>,
    settings: StepSettings,
}

impl Classifier {
    pub fn new(client: Arc<dyn CompletionClient>, settings: StepSettings) -> Self {
        Self { client, settings }
    }

    fn request(&self, state: &WorkflowState) -> CompletionRequest {
        let user_prompt = format!(
            "Emergency: {}\nLocation: {}",
            state.description,
            state.location_or_unknown()
        );

        CompletionRequest::new(SYSTEM_PROMPT, user_prompt, FIELDS)
            .with_session(state.session_id.clone())
            .with_temperature(self.settings.temperature)
            .with_max_tokens(self.settings.max_tokens)
    }
}

/// Build a normalized classification from the model's fields.
pub fn parse_classification(completion: &Completion) -> Result<Classification, CompletionFailure> {
    let emergency_type = normalize_type(&completion.string("emergency_type")?);
    let severity = completion.number("severity")?.round().clamp(1.0, 5.0) as u8;
    let immediate_risks = clean_list(completion.string_list("immediate_risks")?);

    let raw_response = completion.string("recommended_response")?;
    let recommended_response = RecommendedResponse::parse_lenient(&raw_response).unwrap_or_else(|| {
        warn!(value = %raw_response, "Unknown recommended_response, using contact_help");
        RecommendedResponse::ContactHelp
    });

    Ok(Classification {
        emergency_type,
        severity,
        immediate_risks,
        recommended_response,
        confidence: clamp_confidence(completion.number("confidence")?),
    })
}

#[async_trait]
impl StepExecutor for Classifier {
    fn step(&self) -> StepName {
        StepName::Classification
    }

    async fn execute(&self, state: &mut WorkflowState) {
        let step = self.step();
        let outcome = attempt(
            self.client.as_ref(),
            &state.workflow_id,
            step,
            self.request(state),
            parse_classification,
        )
        .await;

        match outcome.result {
            Ok(classification) => {
                let confidence = classification.confidence;
                let emergency_type = classification.emergency_type.clone();
                let severity = classification.severity;
                state.classification = Some(classification);
                record_success(
                    state,
                    step,
                    "assess_situation",
                    outcome.tokens,
                    outcome.elapsed,
                    confidence,
                    |entry| {
                        entry
                            .with_detail("emergency_type", emergency_type)
                            .with_detail("severity", severity)
                    },
                );
            }
            Err(e) => {
                state.classification = Some(Classification::fallback());
                record_failure(state, step, outcome.elapsed, &e);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{json, Value};

    fn completion(value: Value) -> Completion {
        match value {
            Value::Object(map) => Completion::new(map, 0),
            _ => panic!("expected an object"),
        }
    }

    #[test]
    fn test_parse_normalizes() {
        let c = completion(json!({
            "emergency_type": "Natural Disaster",
            "severity": 7,
            "immediate_risks": ["flooding", " "],
            "recommended_response": "Call 911",
            "confidence": 9.5,
        }));

        let classification = parse_classification(&c).unwrap();
        assert_eq!(classification.emergency_type, "natural_disaster");
        assert_eq!(classification.severity, 5);
        assert_eq!(classification.immediate_risks, vec!["flooding"]);
        assert_eq!(classification.recommended_response, RecommendedResponse::Call911);
        assert_eq!(classification.confidence, 5.0);
    }

    #[test]
    fn test_unknown_response_defaults_to_contact_help() {
        let c = completion(json!({
            "emergency_type": "accident",
            "severity": 0,
            "immediate_risks": [],
            "recommended_response": "panic",
            "confidence": 0.2,
        }));

        let classification = parse_classification(&c).unwrap();
        assert_eq!(classification.severity, 1);
        assert_eq!(classification.recommended_response, RecommendedResponse::ContactHelp);
        assert_eq!(classification.confidence, 1.0);
    }

    #[test]
    fn test_wrong_shape_fails() {
        let c = completion(json!({
            "emergency_type": "medical",
            "severity": "very bad",
            "immediate_risks": [],
            "recommended_response": "call_911",
            "confidence": 3,
        }));

        assert!(parse_classification(&c).is_err());
    }

    #[test]
    fn test_nan_severity_fails() {
        let c = completion(json!({
            "emergency_type": "medical",
            "severity": "NaN",
            "immediate_risks": [],
            "recommended_response": "call_911",
            "confidence": 3,
        }));

        assert!(matches!(
            parse_classification(&c),
            Err(CompletionFailure::InvalidField { field, .. }) if field == "severity"
        ));
    }
}
