//! Workflow state shared by the router and step executors.
//!
//! One [`WorkflowState`] is created per `run()` and owned exclusively by that
//! run. The trace and the completed-step list are append-only; the only way
//! to mark a step done is [`WorkflowState::record_step`], which also books
//! its tokens and its trace entry.

use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;
use std::time::Duration;

/// Lowest confidence a step can report; also the fallback confidence.
pub const MIN_CONFIDENCE: f64 = 1.0;

/// Highest confidence a step can report.
pub const MAX_CONFIDENCE: f64 = 5.0;

/// Clamp a model-reported confidence into `1.0..=5.0`.
pub fn clamp_confidence(value: f64) -> f64 {
    if value.is_nan() {
        return MIN_CONFIDENCE;
    }
    value.clamp(MIN_CONFIDENCE, MAX_CONFIDENCE)
}

/// The closed set of workflow steps.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepName {
    /// Situation classification (type, severity, risks, response level)
    Classification,
    /// Step-by-step safety guidance
    Guidance,
    /// Emergency services and nearby facilities
    Resources,
}

impl StepName {
    /// All steps in policy order.
    pub const ALL: [StepName; 3] = [
        StepName::Classification,
        StepName::Guidance,
        StepName::Resources,
    ];

    /// Wire name of the step.
    pub fn as_str(&self) -> &'static str {
        match self {
            StepName::Classification => "classification",
            StepName::Guidance => "guidance",
            StepName::Resources => "resources",
        }
    }

    /// Parse a wire name.
    pub fn parse(value: &str) -> Option<Self> {
        StepName::ALL.into_iter().find(|s| s.as_str() == value)
    }
}

impl fmt::Display for StepName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Recommended response level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RecommendedResponse {
    #[serde(rename = "self-help")]
    SelfHelp,
    #[serde(rename = "contact_help")]
    ContactHelp,
    #[serde(rename = "call_911")]
    Call911,
}

impl RecommendedResponse {
    /// Wire name of the response level.
    pub fn as_str(&self) -> &'static str {
        match self {
            RecommendedResponse::SelfHelp => "self-help",
            RecommendedResponse::ContactHelp => "contact_help",
            RecommendedResponse::Call911 => "call_911",
        }
    }

    /// Parse the canonical names plus the spellings models commonly emit
    /// ("self help", "Call 911", "contact-help").
    pub fn parse_lenient(value: &str) -> Option<Self> {
        let normalized: String = value
            .trim()
            .to_lowercase()
            .chars()
            .map(|c| if c == ' ' || c == '-' { '_' } else { c })
            .collect();

        match normalized.as_str() {
            "self_help" => Some(RecommendedResponse::SelfHelp),
            "contact_help" => Some(RecommendedResponse::ContactHelp),
            "call_911" | "call_emergency_services" => Some(RecommendedResponse::Call911),
            _ => None,
        }
    }
}

impl fmt::Display for RecommendedResponse {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Output of the classification step.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Classification {
    /// Normalized type, e.g. `medical`, `security`, `natural_disaster`, `accident`
    pub emergency_type: String,
    /// 1 (minor) to 5 (life-threatening)
    pub severity: u8,
    pub immediate_risks: Vec<String>,
    pub recommended_response: RecommendedResponse,
    pub confidence: f64,
}

impl Classification {
    /// Safe default used when the classification call fails.
    pub fn fallback() -> Self {
        Self {
            emergency_type: "unknown".to_string(),
            severity: 3,
            immediate_risks: vec!["Unable to assess with AI - proceed with caution".to_string()],
            recommended_response: RecommendedResponse::ContactHelp,
            confidence: MIN_CONFIDENCE,
        }
    }
}

/// Output of the guidance step.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Guidance {
    pub steps: Vec<String>,
    pub confidence: f64,
}

impl Guidance {
    /// Generic safety steps used when the guidance call fails.
    pub fn fallback() -> Self {
        Self {
            steps: vec![
                "Stay calm and assess the situation".to_string(),
                "Move to a safe location if possible".to_string(),
                "Call 911 if life-threatening".to_string(),
                "Contact your emergency contacts".to_string(),
                "Follow any specific safety protocols for your situation".to_string(),
            ],
            confidence: MIN_CONFIDENCE,
        }
    }
}

/// Generic emergency number used when nothing more specific is known.
pub const DEFAULT_EMERGENCY_SERVICES: &str = "911";

/// Output of the resources step.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Resources {
    /// `None` when no location was supplied
    pub nearby_hospitals: Option<Vec<String>>,
    pub emergency_services: String,
    /// Hotlines and support services
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub additional_resources: Vec<String>,
    pub confidence: f64,
}

impl Resources {
    /// Safe default used when the resources call fails or the step is skipped.
    pub fn fallback() -> Self {
        Self {
            nearby_hospitals: None,
            emergency_services: DEFAULT_EMERGENCY_SERVICES.to_string(),
            additional_resources: Vec::new(),
            confidence: MIN_CONFIDENCE,
        }
    }
}

/// Who produced a trace entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub enum Actor {
    Router,
    Step(StepName),
}

impl Actor {
    pub fn as_str(&self) -> &'static str {
        match self {
            Actor::Router => "router",
            Actor::Step(step) => step.as_str(),
        }
    }
}

impl From<Actor> for String {
    fn from(actor: Actor) -> Self {
        actor.as_str().to_string()
    }
}

impl TryFrom<String> for Actor {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        if value == "router" {
            return Ok(Actor::Router);
        }
        StepName::parse(&value)
            .map(Actor::Step)
            .ok_or_else(|| format!("unknown trace actor `{}`", value))
    }
}

/// One immutable record of a routing decision or a step outcome.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TraceEntry {
    pub actor: Actor,
    pub action: String,
    /// Unix epoch milliseconds at which the entry was recorded
    pub timestamp_ms: i64,
    pub duration_ms: f64,
    #[serde(default)]
    pub detail: Map<String, Value>,
}

impl TraceEntry {
    /// Create an entry stamped with the current time.
    pub fn new(actor: Actor, action: impl Into<String>, duration: Duration) -> Self {
        Self {
            actor,
            action: action.into(),
            timestamp_ms: Utc::now().timestamp_millis(),
            duration_ms: duration.as_secs_f64() * 1000.0,
            detail: Map::new(),
        }
    }

    /// Error entry for a failed step.
    pub fn error(step: StepName, message: impl Into<String>, duration: Duration) -> Self {
        Self::new(Actor::Step(step), "error", duration)
            .with_detail("error", Value::String(message.into()))
    }

    /// Add a detail field.
    pub fn with_detail(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.detail.insert(key.into(), value.into());
        self
    }

    /// Whether this entry records a step failure.
    pub fn is_error(&self) -> bool {
        self.action == "error"
    }
}

/// Mutable state for one workflow run.
#[derive(Debug, Clone)]
pub struct WorkflowState {
    pub workflow_id: String,
    pub description: String,
    pub location: Option<String>,
    pub session_id: Option<String>,
    pub classification: Option<Classification>,
    pub guidance: Option<Guidance>,
    pub resources: Option<Resources>,
    steps_completed: Vec<StepName>,
    trace: Vec<TraceEntry>,
    tokens_used: u64,
}

impl WorkflowState {
    /// Fresh state with no steps completed.
    pub fn new(
        workflow_id: impl Into<String>,
        description: impl Into<String>,
        location: Option<String>,
        session_id: Option<String>,
    ) -> Self {
        Self {
            workflow_id: workflow_id.into(),
            description: description.into(),
            location,
            session_id,
            classification: None,
            guidance: None,
            resources: None,
            steps_completed: Vec::new(),
            trace: Vec::new(),
            tokens_used: 0,
        }
    }

    /// Completed steps in execution order.
    pub fn steps_completed(&self) -> &[StepName] {
        &self.steps_completed
    }

    pub fn is_completed(&self, step: StepName) -> bool {
        self.steps_completed.contains(&step)
    }

    pub fn trace(&self) -> &[TraceEntry] {
        &self.trace
    }

    pub fn tokens_used(&self) -> u64 {
        self.tokens_used
    }

    /// Append a trace entry.
    pub fn push_trace(&mut self, entry: TraceEntry) {
        self.trace.push(entry);
    }

    /// Book a finished step: add its tokens, append its trace entry and
    /// mark it completed. A step already completed is not added twice.
    pub fn record_step(&mut self, step: StepName, entry: TraceEntry, tokens: u64) {
        self.tokens_used += tokens;
        self.trace.push(entry);
        if !self.is_completed(step) {
            self.steps_completed.push(step);
        }
    }

    /// Location text for prompts.
    pub fn location_or_unknown(&self) -> &str {
        self.location.as_deref().unwrap_or("Unknown")
    }
}
