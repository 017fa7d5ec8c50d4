//! Configuration type definitions for ArborClaw
//!
//! All types implement serde traits for JSON serialization and have sensible
//! defaults, so a partial `config.json` only needs the fields it changes.

use std::collections::HashMap;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::providers::{RetryPolicy, RouteRule};

/// Main configuration struct for ArborClaw
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Model, sampling and loop settings
    pub agent: AgentConfig,
    /// Context window assembly
    pub context: ContextConfig,
    /// Per-session settings
    pub session: SessionConfig,
    /// Provider backends keyed by name ("openai", "ollama", ...)
    pub providers: HashMap<String, ProviderConfig>,
    /// Model → provider routing
    pub routing: RoutingConfig,
    /// Retry and timeout policy for provider calls
    pub retry: RetryConfig,
    /// Log output
    pub logging: LoggingConfig,
}

// ============================================================================
// Agent Configuration
// ============================================================================

/// Default model when neither session nor config names one.
pub const DEFAULT_MODEL: &str = "gpt-4o";

/// Default system prompt.
pub const DEFAULT_SYSTEM_PROMPT: &str = "You are ArborClaw, a helpful assistant. \
Use the available tools when they help answer the user, and answer directly otherwise.";

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AgentConfig {
    /// Model hint used for routing and the provider request
    pub model: String,
    /// Sampling temperature (0.0 - 2.0)
    pub temperature: f32,
    /// Maximum tokens per reply
    pub max_tokens: u32,
    /// Hard cap on Sending passes per processed message
    pub max_iterations: u32,
    /// System turn prepended to every context
    pub system_prompt: String,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            model: DEFAULT_MODEL.to_string(),
            temperature: 0.7,
            max_tokens: 4096,
            max_iterations: 20,
            system_prompt: DEFAULT_SYSTEM_PROMPT.to_string(),
        }
    }
}

// ============================================================================
// Context Configuration
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ContextConfig {
    /// Cap on turns sent per request, system turn included
    pub max_context_messages: usize,
    /// Collapse turns older than the window into one summary turn
    pub summarize: bool,
    /// Ask the provider to write the summary instead of extracting one locally
    pub summarize_with_provider: bool,
    /// Length cap on the summary text
    pub summary_max_chars: usize,
}

impl Default for ContextConfig {
    fn default() -> Self {
        Self {
            max_context_messages: 40,
            summarize: true,
            summarize_with_provider: false,
            summary_max_chars: 2000,
        }
    }
}

// ============================================================================
// Session Configuration
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Bounded navigation-history depth per session
    pub history_capacity: usize,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            history_capacity: crate::session::DEFAULT_HISTORY_CAPACITY,
        }
    }
}

// ============================================================================
// Provider Configuration
// ============================================================================

/// One OpenAI-compatible backend.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ProviderConfig {
    /// Shared key for every route to this provider
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
    /// Endpoint override; the OpenAI endpoint when unset
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_base: Option<String>,
    /// Model used when the request names none
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default_model: Option<String>,
    /// Local gateways that accept unauthenticated requests
    pub local: bool,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct RoutingConfig {
    /// Provider used when no rule matches
    pub default_provider: Option<String>,
    /// Longest-prefix model rules
    pub rules: Vec<RouteRule>,
    /// Ordered providers tried when the chosen one is unhealthy
    pub fallbacks: Vec<String>,
}

// ============================================================================
// Retry Configuration
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    pub max_retries: u32,
    pub initial_backoff_ms: u64,
    pub max_backoff_ms: u64,
    /// Upper bound for one provider call
    pub call_timeout_secs: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            initial_backoff_ms: 1000,
            max_backoff_ms: 30_000,
            call_timeout_secs: 120,
        }
    }
}

impl RetryConfig {
    pub fn to_policy(&self) -> RetryPolicy {
        RetryPolicy::new()
            .with_max_retries(self.max_retries)
            .with_initial_backoff_ms(self.initial_backoff_ms)
            .with_max_backoff_ms(self.max_backoff_ms)
            .with_call_timeout(Duration::from_secs(self.call_timeout_secs))
    }
}

// ============================================================================
// Logging Configuration
// ============================================================================

/// Log line format.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// Multi-line human-readable output
    Pretty,
    /// One compact line per event
    #[default]
    Component,
    /// JSON lines for log aggregators
    Json,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub format: LogFormat,
    /// Filter directive used when `RUST_LOG` is unset
    pub level: String,
    /// Append to this file instead of stderr
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file: Option<String>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            format: LogFormat::Component,
            level: "info".to_string(),
            file: None,
        }
    }
}
