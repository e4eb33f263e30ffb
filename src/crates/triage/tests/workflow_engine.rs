mod common;

use common::*;
use proptest::prelude::*;
use serde_json::json;
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;
use triage::{
    Actor, Classification, EngineConfig, Guidance, RecommendedResponse, Resources, RoutingDecision,
    StepName, Supervisor, TriageError, WorkflowEngine, WorkflowState,
};

fn engine(client: ScriptedClient) -> WorkflowEngine {
    WorkflowEngine::new(Arc::new(client), EngineConfig::default())
}

#[tokio::test]
async fn test_chest_pain_runs_all_steps() {
    let engine = engine(chest_pain_client());

    let result = engine
        .run(
            "Severe chest pain and difficulty breathing",
            Some("Home, Springfield"),
            None,
        )
        .await
        .unwrap();

    assert_eq!(
        result.agents_called(),
        [
            StepName::Classification,
            StepName::Guidance,
            StepName::Resources
        ]
    );
    assert_eq!(
        result.assessment.recommended_response,
        RecommendedResponse::Call911
    );
    assert_eq!(result.assessment.severity, 5);
    assert_eq!(result.guidance.steps.len(), 5);
    assert_eq!(
        result.resources.nearby_hospitals,
        Some(vec!["General Hospital - 1.2 miles".to_string()])
    );
    assert_eq!(result.orchestration.total_tokens, 330);
    assert!(!result.orchestration.timed_out);

    assert_eq!(result.metrics.agent_timings.len(), 3);
    assert_eq!(
        result.metrics.routing_decisions,
        vec![
            "classification: initial classification required".to_string(),
            "guidance: guidance needed for medical emergency (severity 5)".to_string(),
            "resources: resource coordination needed for severity 5".to_string(),
            "done: all steps consulted".to_string(),
        ]
    );
}

#[tokio::test]
async fn test_paper_cut_skips_resources() {
    let client = ScriptedClient::new()
        .reply(StepName::Classification, paper_cut_classification(), 60)
        .reply(StepName::Guidance, guidance_reply(), 70);
    let engine = engine(client.clone());

    let result = engine.run("Small paper cut on finger", None, None).await.unwrap();

    assert_eq!(
        result.agents_called(),
        [StepName::Classification, StepName::Guidance]
    );
    assert_eq!(
        result.assessment.recommended_response,
        RecommendedResponse::SelfHelp
    );
    assert_eq!(result.resources.emergency_services, "911");
    assert_eq!(result.resources.confidence, 1.0);
    assert_eq!(result.orchestration.total_tokens, 130);
    assert_eq!(
        result.metrics.routing_decisions.last().map(String::as_str),
        Some("done: low severity - resources skipped")
    );
    assert_eq!(client.requests().len(), 2);
}

#[tokio::test]
async fn test_critical_type_gets_resources_at_low_severity() {
    let classification = json!({
        "emergency_type": "security",
        "severity": 2,
        "immediate_risks": ["Intruder may return"],
        "recommended_response": "contact_help",
        "confidence": 3.0,
    });
    let client = ScriptedClient::new()
        .reply(StepName::Classification, classification, 10)
        .reply(StepName::Guidance, guidance_reply(), 10)
        .reply(StepName::Resources, resources_reply(), 10);

    let result = engine(client)
        .run("Someone tried to break in", Some("Apartment 4B"), None)
        .await
        .unwrap();

    assert!(result.agents_called().contains(&StepName::Resources));
}

#[tokio::test]
async fn test_all_failures_still_produce_complete_result() {
    let engine = engine(ScriptedClient::new());

    let result = engine.run("Something is wrong", None, None).await.unwrap();

    assert_eq!(result.assessment.emergency_type, "unknown");
    assert_eq!(result.assessment.severity, 3);
    assert_eq!(
        result.assessment.recommended_response,
        RecommendedResponse::ContactHelp
    );
    assert_eq!(result.assessment.confidence, 1.0);
    assert_eq!(result.guidance.confidence, 1.0);
    assert_eq!(result.guidance.steps.len(), 5);
    assert_eq!(result.resources.confidence, 1.0);
    assert_eq!(result.resources.emergency_services, "911");
    assert_eq!(result.orchestration.total_tokens, 0);

    let errors: Vec<_> = result
        .metrics
        .execution_trace
        .iter()
        .filter(|e| e.is_error())
        .collect();
    assert_eq!(errors.len(), 3);
    assert!(errors
        .iter()
        .all(|e| e.detail["error"].as_str().unwrap().contains("scripted outage")));
}

#[tokio::test]
async fn test_partial_failure_keeps_other_sections() {
    let client = ScriptedClient::new()
        .reply(StepName::Classification, chest_pain_classification(), 100)
        .fail(StepName::Guidance)
        .reply(StepName::Resources, resources_reply(), 80);

    let result = engine(client)
        .run("Chest pain", Some("Office"), None)
        .await
        .unwrap();

    assert_eq!(result.assessment.confidence, 4.5);
    assert_eq!(result.guidance.confidence, 1.0);
    assert_eq!(result.resources.confidence, 3.5);
    assert_eq!(result.orchestration.total_tokens, 180);
    assert_eq!(result.agents_called().len(), 3);
}

#[tokio::test]
async fn test_trace_order_is_execution_order() {
    let result = engine(chest_pain_client())
        .run("Chest pain", None, None)
        .await
        .unwrap();

    let actors: Vec<Actor> = result
        .metrics
        .execution_trace
        .iter()
        .map(|e| e.actor)
        .collect();
    assert_eq!(
        actors,
        vec![
            Actor::Router,
            Actor::Step(StepName::Classification),
            Actor::Router,
            Actor::Step(StepName::Guidance),
            Actor::Router,
            Actor::Step(StepName::Resources),
            Actor::Router,
        ]
    );

    let timestamps: Vec<i64> = result
        .metrics
        .execution_trace
        .iter()
        .map(|e| e.timestamp_ms)
        .collect();
    assert!(timestamps.windows(2).all(|w| w[0] <= w[1]));
}

#[tokio::test]
async fn test_no_location_means_no_hospitals() {
    let result = engine(chest_pain_client())
        .run("Chest pain", None, None)
        .await
        .unwrap();

    assert_eq!(result.resources.nearby_hospitals, None);
    assert_eq!(
        result.resources.additional_resources,
        vec!["American Heart Association hotline"]
    );
}

#[tokio::test]
async fn test_session_id_passed_unchanged() {
    let client = chest_pain_client();
    let engine = engine(client.clone());

    engine
        .run("Chest pain", Some("Home"), Some("session-7f3a"))
        .await
        .unwrap();
    engine
        .run("The pain is spreading to my arm", Some("Home"), Some("session-7f3a"))
        .await
        .unwrap();

    let requests = client.requests();
    assert_eq!(requests.len(), 6);
    assert!(requests
        .iter()
        .all(|r| r.session_id.as_deref() == Some("session-7f3a")));
}

#[tokio::test]
async fn test_session_history_carries_over_runs() {
    let model = ScriptedChatModel::new()
        .reply(StepName::Classification, paper_cut_classification())
        .reply(StepName::Guidance, guidance_reply());
    let engine = WorkflowEngine::from_chat_model(Arc::new(model.clone()), EngineConfig::default());

    let first = engine
        .run("Paper cut", None, Some("s-1"))
        .await
        .unwrap();
    engine
        .run("It stopped bleeding", None, Some("s-1"))
        .await
        .unwrap();
    engine.run("Unrelated paper cut", None, None).await.unwrap();

    let requests = model.requests();
    assert_eq!(requests.len(), 6);
    // First run: system + user only.
    assert_eq!(requests[0].messages.len(), 2);
    // Second run sees the two turns recorded by the first run.
    assert_eq!(requests[2].messages.len(), 6);
    assert!(requests[2].messages[1].text().contains("Paper cut"));
    // No session id, no history.
    assert_eq!(requests[4].messages.len(), 2);

    assert_eq!(first.orchestration.model.as_deref(), Some("scripted/model"));
    assert_eq!(first.orchestration.total_tokens, 100);
}

struct NeverDone;

impl Supervisor for NeverDone {
    fn decide(&self, state: &WorkflowState) -> RoutingDecision {
        let step = StepName::ALL[state.trace().len() % 3];
        RoutingDecision::step(step, "keep going")
    }
}

#[tokio::test]
async fn test_faulty_supervisor_hits_ceiling() {
    let engine = engine(chest_pain_client()).with_supervisor(Arc::new(NeverDone));

    match engine.run("Chest pain", None, None).await {
        Err(TriageError::RoutingOverrun {
            iterations, trace, ..
        }) => {
            assert_eq!(iterations, 10);
            let steps: Vec<_> = trace.iter().filter(|e| e.actor != Actor::Router).collect();
            assert!(steps.len() <= 3);
        }
        Err(other) => panic!("unexpected error: {}", other),
        Ok(_) => panic!("faulty supervisor should not finish"),
    }
}

#[tokio::test(start_paused = true)]
async fn test_deadline_cancels_slow_step() {
    let client = chest_pain_client().delay(StepName::Guidance, Duration::from_secs(30));
    let config = EngineConfig::default().with_deadline_secs(5);
    let engine = WorkflowEngine::new(Arc::new(client), config);

    let result = engine.run("Chest pain", None, None).await.unwrap();

    assert!(result.orchestration.timed_out);
    assert_eq!(result.agents_called(), [StepName::Classification]);
    assert_eq!(result.assessment.severity, 5);
    assert_eq!(result.guidance.confidence, 1.0);
    assert_eq!(result.orchestration.total_tokens, 100);

    let json = serde_json::to_value(&result).unwrap();
    assert_eq!(json["orchestration"]["timed_out"], true);

    let last = result.metrics.execution_trace.last().unwrap();
    assert_eq!(last.actor, Actor::Step(StepName::Guidance));
    assert!(last.is_error());
    assert_eq!(last.detail["error"], "deadline exceeded");
    assert_eq!(last.detail["timed_out"], true);
    assert!(last.duration_ms >= 5000.0);
    assert!(result.metrics.agent_timings.contains_key("guidance"));
}

#[tokio::test(start_paused = true)]
async fn test_deadline_during_classification_yields_fallbacks() {
    let client = chest_pain_client().delay(StepName::Classification, Duration::from_secs(30));
    let config = EngineConfig::default().with_deadline_secs(5);
    let engine = WorkflowEngine::new(Arc::new(client), config);

    let result = engine.run("Chest pain", None, None).await.unwrap();

    assert!(result.orchestration.timed_out);
    assert!(result.agents_called().is_empty());
    assert_eq!(result.orchestration.total_tokens, 0);
    assert_eq!(result.assessment, Classification::fallback());
    assert_eq!(result.guidance, Guidance::fallback());
    assert_eq!(result.resources, Resources::fallback());

    let actions: Vec<String> = result
        .metrics
        .execution_trace
        .iter()
        .map(|e| format!("{}:{}", e.actor.as_str(), e.action))
        .collect();
    assert_eq!(actions, ["router:route", "classification:error"]);
}

#[tokio::test(start_paused = true)]
async fn test_deadline_passed_before_next_step_starts() {
    // Classification finishes exactly at the deadline, so guidance never starts.
    let client = chest_pain_client().delay(StepName::Classification, Duration::from_secs(5));
    let config = EngineConfig::default().with_deadline_secs(5);
    let engine = WorkflowEngine::new(Arc::new(client), config);

    let result = engine.run("Chest pain", None, None).await.unwrap();

    assert!(result.orchestration.timed_out);
    assert_eq!(result.agents_called(), [StepName::Classification]);
    assert_eq!(result.assessment.severity, 5);
    assert_eq!(result.guidance, Guidance::fallback());
    assert_eq!(result.resources, Resources::fallback());

    let trace = &result.metrics.execution_trace;
    assert_eq!(trace.len(), 3);
    assert_eq!(trace[2].actor, Actor::Router);
    assert_eq!(trace[2].detail["next"], "guidance");
}

#[tokio::test]
async fn test_blank_description_rejected() {
    let result = engine(chest_pain_client()).run("  \n", None, None).await;
    assert!(matches!(result, Err(TriageError::InvalidInput(_))));
}

#[tokio::test]
async fn test_concurrent_runs_are_independent() {
    let engine = Arc::new(engine(chest_pain_client()));
    let mut handles = Vec::new();

    for i in 0..8 {
        let engine = Arc::clone(&engine);
        handles.push(tokio::spawn(async move {
            engine
                .run(&format!("Chest pain #{}", i), None, None)
                .await
                .unwrap()
        }));
    }

    let mut ids = HashSet::new();
    for handle in handles {
        let result = handle.await.unwrap();
        assert_eq!(result.orchestration.total_tokens, 330);
        ids.insert(result.orchestration.workflow_id);
    }
    assert_eq!(ids.len(), 8);
}

#[tokio::test]
async fn test_response_json_shape() {
    let result = engine(chest_pain_client())
        .run("Chest pain", Some("Home"), None)
        .await
        .unwrap();
    let json = serde_json::to_value(&result).unwrap();

    for key in [
        "emergency_type",
        "severity",
        "immediate_risks",
        "recommended_response",
        "confidence",
    ] {
        assert!(json["assessment"].get(key).is_some(), "missing assessment.{}", key);
    }
    assert!(json["guidance"]["steps"].is_array());
    assert_eq!(json["resources"]["emergency_services"], "911");
    assert!(json["resources"]["additional_resources"].is_array());
    assert!(json["orchestration"]["total_time"].is_f64());
    assert_eq!(json["orchestration"]["total_tokens"], 330);
    assert!(json["orchestration"].get("timed_out").is_none());
    assert!(json["metrics"]["agent_timings"]["guidance"].is_f64());
    assert_eq!(json["metrics"]["routing_decisions"].as_array().unwrap().len(), 4);
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    #[test]
    fn prop_steps_run_in_order_without_duplicates(
        severity in 1u8..=5,
        type_idx in 0usize..5,
        fail_mask in 0u8..8,
    ) {
        let types = ["medical", "security", "natural_disaster", "accident", "other"];
        let mut client = ScriptedClient::new()
            .reply(
                StepName::Classification,
                json!({
                    "emergency_type": types[type_idx],
                    "severity": severity,
                    "immediate_risks": [],
                    "recommended_response": "contact_help",
                    "confidence": 3.0,
                }),
                10,
            )
            .reply(StepName::Guidance, guidance_reply(), 10)
            .reply(StepName::Resources, resources_reply(), 10);
        for (bit, step) in StepName::ALL.into_iter().enumerate() {
            if fail_mask & (1 << bit) != 0 {
                client = client.fail(step);
            }
        }

        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .unwrap();
        let result = runtime
            .block_on(engine(client).run("Emergency", None, None))
            .unwrap();

        let called = result.agents_called();
        prop_assert!(called.len() >= 2);
        prop_assert_eq!(called[0], StepName::Classification);
        prop_assert_eq!(called[1], StepName::Guidance);
        let unique: HashSet<_> = called.iter().collect();
        prop_assert_eq!(unique.len(), called.len());

        let step_tokens: u64 = result
            .metrics
            .execution_trace
            .iter()
            .filter_map(|e| e.detail.get("tokens").and_then(|t| t.as_u64()))
            .sum();
        prop_assert_eq!(step_tokens, result.orchestration.total_tokens);
    }
}
