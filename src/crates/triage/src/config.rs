//! Engine configuration
//!
//! Loaded from YAML, optionally overridden from `SOS_*` environment
//! variables, and validated before use. Every field has a default so an
//! empty document is a valid configuration.

use crate::completion::RetryConfig;
use crate::state::StepName;
use crate::{Result, TriageError};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Routing thresholds for the resources step.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoutingPolicy {
    /// Minimum severity that triggers resource coordination
    #[serde(default = "default_severity_threshold")]
    pub severity_threshold: u8,

    /// Emergency types that always trigger resource coordination
    #[serde(default = "default_critical_types")]
    pub critical_types: Vec<String>,
}

fn default_severity_threshold() -> u8 {
    3
}

fn default_critical_types() -> Vec<String> {
    vec![
        "medical".to_string(),
        "security".to_string(),
        "natural_disaster".to_string(),
    ]
}

impl Default for RoutingPolicy {
    fn default() -> Self {
        Self {
            severity_threshold: default_severity_threshold(),
            critical_types: default_critical_types(),
        }
    }
}

impl RoutingPolicy {
    /// Set the severity threshold
    pub fn with_severity_threshold(mut self, threshold: u8) -> Self {
        self.severity_threshold = threshold;
        self
    }

    /// Whether an emergency type is in the critical set.
    pub fn is_critical_type(&self, emergency_type: &str) -> bool {
        self.critical_types
            .iter()
            .any(|t| t.eq_ignore_ascii_case(emergency_type))
    }
}

/// Generation parameters for one step's completion call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StepSettings {
    #[serde(default = "default_temperature")]
    pub temperature: f32,
    #[serde(default)]
    pub max_tokens: Option<usize>,
}

fn default_temperature() -> f32 {
    0.3
}

impl StepSettings {
    pub fn new(max_tokens: usize) -> Self {
        Self {
            temperature: default_temperature(),
            max_tokens: Some(max_tokens),
        }
    }
}

/// Per-step generation settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StepSettingsSet {
    #[serde(default = "default_classification_settings")]
    pub classification: StepSettings,
    #[serde(default = "default_guidance_settings")]
    pub guidance: StepSettings,
    #[serde(default = "default_resources_settings")]
    pub resources: StepSettings,
}

fn default_classification_settings() -> StepSettings {
    StepSettings::new(500)
}

fn default_guidance_settings() -> StepSettings {
    StepSettings::new(600)
}

fn default_resources_settings() -> StepSettings {
    StepSettings::new(500)
}

impl Default for StepSettingsSet {
    fn default() -> Self {
        Self {
            classification: default_classification_settings(),
            guidance: default_guidance_settings(),
            resources: default_resources_settings(),
        }
    }
}

impl StepSettingsSet {
    pub fn for_step(&self, step: StepName) -> &StepSettings {
        match step {
            StepName::Classification => &self.classification,
            StepName::Guidance => &self.guidance,
            StepName::Resources => &self.resources,
        }
    }

    fn set_temperature(&mut self, temperature: f32) {
        self.classification.temperature = temperature;
        self.guidance.temperature = temperature;
        self.resources.temperature = temperature;
    }
}

/// Configuration for the triage workflow engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Model identifier passed to the provider
    #[serde(default = "default_model")]
    pub model: String,

    /// Hard ceiling on router iterations per run
    #[serde(default = "default_max_iterations")]
    pub max_iterations: usize,

    /// Overall wall-clock budget for one run, in seconds
    #[serde(default)]
    pub deadline_secs: Option<u64>,

    #[serde(default)]
    pub routing: RoutingPolicy,

    #[serde(default)]
    pub steps: StepSettingsSet,

    /// Upper bound on guidance steps kept from the model
    #[serde(default = "default_max_guidance_steps")]
    pub max_guidance_steps: usize,

    /// Retry policy for transient provider errors
    #[serde(default)]
    pub retry: RetryConfig,

    /// Prior turns kept per session id
    #[serde(default = "default_session_history_turns")]
    pub session_history_turns: usize,
}

fn default_model() -> String {
    llm::DEFAULT_MODEL.to_string()
}

fn default_max_iterations() -> usize {
    10
}

fn default_max_guidance_steps() -> usize {
    5
}

fn default_session_history_turns() -> usize {
    10
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            model: default_model(),
            max_iterations: default_max_iterations(),
            deadline_secs: None,
            routing: RoutingPolicy::default(),
            steps: StepSettingsSet::default(),
            max_guidance_steps: default_max_guidance_steps(),
            retry: RetryConfig::default(),
            session_history_turns: default_session_history_turns(),
        }
    }
}

impl EngineConfig {
    /// Load configuration from a YAML file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| {
            TriageError::Config(format!(
                "Failed to read config file {}: {}",
                path.display(),
                e
            ))
        })?;

        Self::from_yaml(&content)
    }

    /// Parse and validate a YAML document
    pub fn from_yaml(content: &str) -> Result<Self> {
        let config: Self = serde_yaml::from_str(content)
            .map_err(|e| TriageError::Config(format!("Failed to parse YAML config: {}", e)))?;

        config.validate()?;
        Ok(config)
    }

    /// Load a YAML file, then apply environment overrides
    pub fn from_file_with_env(path: impl AsRef<Path>) -> Result<Self> {
        let mut config = Self::from_file(path)?;
        config.apply_env_overrides()?;
        config.validate()?;
        Ok(config)
    }

    /// Defaults plus environment overrides
    pub fn from_env() -> Result<Self> {
        let mut config = Self::default();
        config.apply_env_overrides()?;
        config.validate()?;
        Ok(config)
    }

    /// Apply environment variable overrides
    ///
    /// Supported environment variables:
    /// - SOS_MODEL: Model identifier
    /// - SOS_MAX_ITERATIONS: Router iteration ceiling
    /// - SOS_DEADLINE_SECS: Overall run deadline
    /// - SOS_RESOURCE_SEVERITY_THRESHOLD: Severity that triggers resources
    /// - SOS_TEMPERATURE: Temperature for every step
    /// - SOS_MAX_RETRIES: Retries for transient provider errors
    pub fn apply_env_overrides(&mut self) -> Result<()> {
        self.apply_overrides_from(|key| std::env::var(key).ok())
    }

    /// Apply overrides from an arbitrary key lookup.
    pub fn apply_overrides_from<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(model) = lookup("SOS_MODEL") {
            self.model = model;
        }
        if let Some(value) = lookup("SOS_MAX_ITERATIONS") {
            self.max_iterations = parse_override("SOS_MAX_ITERATIONS", &value)?;
        }
        if let Some(value) = lookup("SOS_DEADLINE_SECS") {
            self.deadline_secs = Some(parse_override("SOS_DEADLINE_SECS", &value)?);
        }
        if let Some(value) = lookup("SOS_RESOURCE_SEVERITY_THRESHOLD") {
            self.routing.severity_threshold =
                parse_override("SOS_RESOURCE_SEVERITY_THRESHOLD", &value)?;
        }
        if let Some(value) = lookup("SOS_TEMPERATURE") {
            let temperature: f32 = parse_override("SOS_TEMPERATURE", &value)?;
            self.steps.set_temperature(temperature);
        }
        if let Some(value) = lookup("SOS_MAX_RETRIES") {
            self.retry.max_retries = parse_override("SOS_MAX_RETRIES", &value)?;
        }
        Ok(())
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        if self.model.trim().is_empty() {
            return Err(TriageError::Config("model cannot be empty".to_string()));
        }

        // Every step plus the final "done" decision.
        let min_iterations = StepName::ALL.len() + 1;
        if self.max_iterations < min_iterations {
            return Err(TriageError::Config(format!(
                "max_iterations must be at least {}, got {}",
                min_iterations, self.max_iterations
            )));
        }

        if !(1..=5).contains(&self.routing.severity_threshold) {
            return Err(TriageError::Config(format!(
                "routing.severity_threshold must be between 1 and 5, got {}",
                self.routing.severity_threshold
            )));
        }

        for step in StepName::ALL {
            let settings = self.steps.for_step(step);
            if !(0.0..=2.0).contains(&settings.temperature) {
                return Err(TriageError::Config(format!(
                    "{} temperature must be between 0.0 and 2.0, got {}",
                    step, settings.temperature
                )));
            }
            if settings.max_tokens == Some(0) {
                return Err(TriageError::Config(format!(
                    "{} max_tokens must be greater than 0",
                    step
                )));
            }
        }

        if self.max_guidance_steps == 0 {
            return Err(TriageError::Config(
                "max_guidance_steps must be at least 1".to_string(),
            ));
        }

        if self.deadline_secs == Some(0) {
            return Err(TriageError::Config(
                "deadline_secs must be greater than 0".to_string(),
            ));
        }

        Ok(())
    }

    /// Overall run deadline, if configured
    pub fn deadline(&self) -> Option<Duration> {
        self.deadline_secs.map(Duration::from_secs)
    }

    /// Set the router iteration ceiling
    pub fn with_max_iterations(mut self, max_iterations: usize) -> Self {
        self.max_iterations = max_iterations;
        self
    }

    /// Set the overall run deadline
    pub fn with_deadline_secs(mut self, secs: u64) -> Self {
        self.deadline_secs = Some(secs);
        self
    }

    /// Replace the routing policy
    pub fn with_routing(mut self, routing: RoutingPolicy) -> Self {
        self.routing = routing;
        self
    }

    /// Replace the retry policy
    pub fn with_retry(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }
}

fn parse_override<T: std::str::FromStr>(key: &str, value: &str) -> Result<T> {
    value
        .trim()
        .parse()
        .map_err(|_| TriageError::Config(format!("{} has an invalid value: {:?}", key, value)))
}
