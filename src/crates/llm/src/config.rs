//! Configuration for remote LLM providers.

use crate::error::{LlmError, Result};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Default OpenRouter endpoint.
pub const OPENROUTER_BASE_URL: &str = "https://openrouter.ai/api/v1";

/// Default model used for triage completions.
pub const DEFAULT_MODEL: &str = "deepseek/deepseek-chat";

/// Configuration for remote LLM providers (OpenRouter and other
/// OpenAI-compatible APIs).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RemoteLlmConfig {
    /// API key for authentication.
    pub api_key: String,

    /// Base URL for the API, e.g. "https://openrouter.ai/api/v1".
    pub base_url: String,

    /// Model name/identifier.
    pub model: String,

    /// Request timeout duration.
    #[serde(default = "default_timeout")]
    pub timeout: Duration,

    /// Site URL sent as `HTTP-Referer` for OpenRouter attribution.
    #[serde(default)]
    pub site_url: Option<String>,

    /// Site name sent as `X-Title` for OpenRouter attribution.
    #[serde(default)]
    pub site_name: Option<String>,
}

impl RemoteLlmConfig {
    /// Create a new remote LLM configuration.
    pub fn new(
        api_key: impl Into<String>,
        base_url: impl Into<String>,
        model: impl Into<String>,
    ) -> Self {
        Self {
            api_key: api_key.into(),
            base_url: base_url.into(),
            model: model.into(),
            timeout: default_timeout(),
            site_url: None,
            site_name: None,
        }
    }

    /// Create configuration from environment variable.
    pub fn from_env(
        env_var: &str,
        base_url: impl Into<String>,
        model: impl Into<String>,
    ) -> Result<Self> {
        let api_key = std::env::var(env_var)
            .map_err(|_| LlmError::ApiKeyNotFound(format!("Environment variable: {}", env_var)))?;

        if api_key.trim().is_empty() {
            return Err(LlmError::ApiKeyNotFound(format!(
                "Environment variable {} is empty",
                env_var
            )));
        }

        Ok(Self::new(api_key, base_url, model))
    }

    /// OpenRouter configuration read from `OPENROUTER_API_KEY`, with the
    /// optional `SITE_URL` and `SITE_NAME` attribution headers.
    pub fn openrouter_from_env(model: impl Into<String>) -> Result<Self> {
        let mut config = Self::from_env("OPENROUTER_API_KEY", OPENROUTER_BASE_URL, model)?;
        config.site_url = std::env::var("SITE_URL").ok();
        config.site_name = std::env::var("SITE_NAME").ok();
        Ok(config)
    }

    /// Set the request timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Set the attribution headers.
    pub fn with_site(mut self, url: impl Into<String>, name: impl Into<String>) -> Self {
        self.site_url = Some(url.into());
        self.site_name = Some(name.into());
        self
    }
}

fn default_timeout() -> Duration {
    Duration::from_secs(30)
}
