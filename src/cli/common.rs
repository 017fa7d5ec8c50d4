//! Shared helpers for CLI commands.

use anyhow::{Context, Result};
use tracing::warn;

use arborclaw::agent::Agent;
use arborclaw::config::Config;
use arborclaw::tools::{EchoTool, ToolRegistry};
use arborclaw::utils::logging::init_logging;

/// Load config, install logging and build an agent with the built-in tools.
pub(crate) fn create_agent() -> Result<(Config, Agent)> {
    let config = Config::load().with_context(|| "Failed to load configuration")?;
    init_logging(&config.logging).with_context(|| "Failed to initialize logging")?;

    if config.providers.is_empty() {
        warn!("No providers configured, falling back to the last-resort list");
        eprintln!(
            "Warning: No AI provider configured. Set ARBORCLAW_PROVIDERS_OPENAI_API_KEY"
        );
        eprintln!("or add a provider to {}", Config::path().display());
        eprintln!();
    }

    let mut tools = ToolRegistry::new();
    tools.register(Box::new(EchoTool));

    let agent = Agent::from_config(&config, tools).with_context(|| "Invalid configuration")?;
    Ok((config, agent))
}
