//! Configuration management for ArborClaw
//!
//! Configuration is loaded from `~/.arborclaw/config.json` with environment
//! variable overrides. Nothing here is process-global: callers load a
//! [`Config`] and hand the pieces to the objects they build.

mod types;
pub mod validate;

pub use types::*;

use std::path::{Path, PathBuf};

use tracing::debug;

use crate::error::{ClawError, Result};

/// Prefix shared by every environment override.
const ENV_PREFIX: &str = "ARBORCLAW_";

impl Config {
    /// Returns the ArborClaw configuration directory path (~/.arborclaw)
    pub fn dir() -> PathBuf {
        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".arborclaw")
    }

    /// Returns the path to the config file (~/.arborclaw/config.json)
    pub fn path() -> PathBuf {
        Self::dir().join("config.json")
    }

    /// Load configuration from the default path with environment overrides.
    ///
    /// If the config file doesn't exist, returns default configuration.
    pub fn load() -> Result<Self> {
        Self::load_from_path(&Self::path())
    }

    /// Load configuration from a specific path with environment overrides.
    pub fn load_from_path(path: &Path) -> Result<Self> {
        let mut config = if path.exists() {
            debug!(path = %path.display(), "Loading config file");
            let content = std::fs::read_to_string(path)?;
            serde_json::from_str(&content)
                .map_err(|e| ClawError::Config(format!("{}: {}", path.display(), e)))?
        } else {
            Config::default()
        };

        config.apply_env_overrides();
        Ok(config)
    }

    /// Save configuration to a specific path, creating parent directories.
    pub fn save_to_path(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = serde_json::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Apply `ARBORCLAW_*` environment variable overrides.
    fn apply_env_overrides(&mut self) {
        self.apply_overrides(std::env::vars());
    }

    /// Apply overrides from `(name, value)` pairs.
    ///
    /// Recognised names follow `ARBORCLAW_SECTION_KEY`, plus
    /// `ARBORCLAW_PROVIDERS_<NAME>_API_KEY` / `_API_BASE` for any provider
    /// name. Values that fail to parse are ignored.
    pub fn apply_overrides<I>(&mut self, vars: I)
    where
        I: IntoIterator<Item = (String, String)>,
    {
        for (name, val) in vars {
            let Some(key) = name.strip_prefix(ENV_PREFIX) else {
                continue;
            };
            match key {
                "AGENT_MODEL" => self.agent.model = val,
                "AGENT_TEMPERATURE" => set_parsed(&mut self.agent.temperature, &val),
                "AGENT_MAX_TOKENS" => set_parsed(&mut self.agent.max_tokens, &val),
                "AGENT_MAX_ITERATIONS" => set_parsed(&mut self.agent.max_iterations, &val),
                "AGENT_SYSTEM_PROMPT" => self.agent.system_prompt = val,
                "CONTEXT_MAX_CONTEXT_MESSAGES" => {
                    set_parsed(&mut self.context.max_context_messages, &val)
                }
                "CONTEXT_SUMMARIZE" => set_parsed(&mut self.context.summarize, &val),
                "SESSION_HISTORY_CAPACITY" => {
                    set_parsed(&mut self.session.history_capacity, &val)
                }
                "ROUTING_DEFAULT_PROVIDER" => self.routing.default_provider = Some(val),
                "ROUTING_FALLBACKS" => {
                    self.routing.fallbacks = val
                        .split(',')
                        .map(str::trim)
                        .filter(|s| !s.is_empty())
                        .map(str::to_string)
                        .collect();
                }
                "RETRY_MAX_RETRIES" => set_parsed(&mut self.retry.max_retries, &val),
                "RETRY_CALL_TIMEOUT_SECS" => set_parsed(&mut self.retry.call_timeout_secs, &val),
                "LOG_LEVEL" => self.logging.level = val,
                other => self.apply_provider_override(other, val),
            }
        }
    }

    fn apply_provider_override(&mut self, key: &str, val: String) {
        let Some(rest) = key.strip_prefix("PROVIDERS_") else {
            return;
        };
        if let Some(name) = rest.strip_suffix("_API_KEY") {
            self.providers
                .entry(name.to_lowercase())
                .or_default()
                .api_key = Some(val);
        } else if let Some(name) = rest.strip_suffix("_API_BASE") {
            self.providers
                .entry(name.to_lowercase())
                .or_default()
                .api_base = Some(val);
        }
    }

    /// Check the parsed values.
    ///
    /// # Errors
    ///
    /// `ClawError::Config` naming every failing field.
    pub fn validate(&self) -> Result<()> {
        let errors: Vec<String> = validate::validate_values(self)
            .into_iter()
            .filter(validate::Diagnostic::is_error)
            .map(|d| format!("{}: {}", d.path, d.message))
            .collect();
        if errors.is_empty() {
            Ok(())
        } else {
            Err(ClawError::Config(errors.join("; ")))
        }
    }

    /// API key configured for `provider`, if any.
    pub fn api_key(&self, provider: &str) -> Option<&str> {
        self.providers
            .get(provider)
            .and_then(|p| p.api_key.as_deref())
            .filter(|k| !k.trim().is_empty())
    }
}

fn set_parsed<T: std::str::FromStr>(slot: &mut T, raw: &str) {
    match raw.trim().parse() {
        Ok(v) => *slot = v,
        Err(_) => debug!(value = raw, "Ignoring unparsable config override"),
    }
}
