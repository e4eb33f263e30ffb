//! sos-triage - run one emergency assessment from the command line
//!
//! Reads `OPENROUTER_API_KEY` (and optionally `SITE_URL`, `SITE_NAME`)
//! from the environment and prints the assessment as JSON.

use anyhow::{Context, Result};
use clap::Parser;
use llm::remote::OpenRouterClient;
use llm::RemoteLlmConfig;
use std::path::PathBuf;
use std::sync::Arc;
use triage::{telemetry, EngineConfig, WorkflowEngine};

#[derive(Parser)]
#[command(name = "sos-triage")]
#[command(about = "Assess an emergency description and print structured guidance", long_about = None)]
#[command(version = env!("CARGO_PKG_VERSION"))]
struct Cli {
    /// Free-text description of the emergency
    #[arg(short, long)]
    description: String,

    /// Where the emergency is happening
    #[arg(short, long)]
    location: Option<String>,

    /// Opaque id that links follow-up requests
    #[arg(short, long, env = "SOS_SESSION_ID")]
    session_id: Option<String>,

    /// YAML engine configuration
    #[arg(short, long, env = "SOS_CONFIG")]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    telemetry::init_tracing();
    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => EngineConfig::from_file_with_env(path)
            .with_context(|| format!("loading {}", path.display()))?,
        None => EngineConfig::from_env().context("reading SOS_* overrides")?,
    };
    tracing::info!(
        model = %config.model,
        max_iterations = config.max_iterations,
        "Configuration loaded"
    );

    let llm_config =
        RemoteLlmConfig::openrouter_from_env(config.model.clone()).context("OpenRouter setup")?;
    let model = OpenRouterClient::new(llm_config).context("building HTTP client")?;
    let engine = WorkflowEngine::from_chat_model(Arc::new(model), config);

    let result = engine
        .run(
            &cli.description,
            cli.location.as_deref(),
            cli.session_id.as_deref(),
        )
        .await?;

    println!("{}", result.to_json_pretty()?);
    Ok(())
}
