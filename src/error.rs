//! Error types for ArborClaw
//!
//! This module defines all error types used throughout the orchestration core.
//! Uses `thiserror` for ergonomic error handling with automatic `Display` and
//! `Error` trait implementations.

use std::fmt;
use thiserror::Error;

// ============================================================================
// Provider Error Classification
// ============================================================================

/// Structured provider error classification.
///
/// Splits backend failures into retryable and terminal classes so the
/// router can decide between backing off, failing over, or giving up
/// without string matching.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProviderError {
    /// Connection refused, reset, DNS failure
    Network(String),
    /// Connection or read timeout, including the per-call timeout
    Timeout(String),
    /// 503 and other upstream-unavailable conditions
    Unavailable(String),
    /// 429: Rate limit or quota exceeded
    RateLimit(String),
    /// 502: Bad gateway
    BadGateway(String),
    /// 400: Bad request, malformed parameters
    InvalidArgument(String),
    /// 507 or backend-reported resource exhaustion
    OutOfMemory(String),
    /// 401: Invalid API key or authentication failure
    Auth(String),
    /// 403: Token rejected, expired or lacking scope
    InvalidToken(String),
    /// 404: Model not found or endpoint not available
    ModelNotFound(String),
    /// Catch-all for unrecognized errors
    Unknown(String),
}

impl fmt::Display for ProviderError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProviderError::Network(msg) => write!(f, "Network error: {}", msg),
            ProviderError::Timeout(msg) => write!(f, "Timeout: {}", msg),
            ProviderError::Unavailable(msg) => write!(f, "Upstream unavailable: {}", msg),
            ProviderError::RateLimit(msg) => write!(f, "Rate limit error: {}", msg),
            ProviderError::BadGateway(msg) => write!(f, "Bad gateway: {}", msg),
            ProviderError::InvalidArgument(msg) => write!(f, "Invalid argument: {}", msg),
            ProviderError::OutOfMemory(msg) => write!(f, "Out of memory: {}", msg),
            ProviderError::Auth(msg) => write!(f, "Authentication error: {}", msg),
            ProviderError::InvalidToken(msg) => write!(f, "Invalid token: {}", msg),
            ProviderError::ModelNotFound(msg) => write!(f, "Model not found: {}", msg),
            ProviderError::Unknown(msg) => write!(f, "Unknown provider error: {}", msg),
        }
    }
}

impl ProviderError {
    /// Returns `true` if this error is transient and the request should be retried.
    ///
    /// Retryable errors: Network, Timeout, Unavailable, RateLimit, BadGateway.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            ProviderError::Network(_)
                | ProviderError::Timeout(_)
                | ProviderError::Unavailable(_)
                | ProviderError::RateLimit(_)
                | ProviderError::BadGateway(_)
        )
    }

    /// Returns `true` if this error should trigger failover to another provider.
    ///
    /// Credential and request-shape errors would fail against any backend,
    /// so they surface immediately.
    pub fn should_fallback(&self) -> bool {
        !matches!(
            self,
            ProviderError::InvalidArgument(_)
                | ProviderError::Auth(_)
                | ProviderError::InvalidToken(_)
        )
    }

    /// Returns the HTTP status code associated with this error, if applicable.
    pub fn status_code(&self) -> Option<u16> {
        match self {
            ProviderError::InvalidArgument(_) => Some(400),
            ProviderError::Auth(_) => Some(401),
            ProviderError::InvalidToken(_) => Some(403),
            ProviderError::ModelNotFound(_) => Some(404),
            ProviderError::RateLimit(_) => Some(429),
            ProviderError::BadGateway(_) => Some(502),
            ProviderError::Unavailable(_) => Some(503),
            ProviderError::OutOfMemory(_) => Some(507),
            ProviderError::Network(_) | ProviderError::Timeout(_) | ProviderError::Unknown(_) => {
                None
            }
        }
    }
}

impl From<ProviderError> for ClawError {
    fn from(err: ProviderError) -> Self {
        ClawError::Provider(err)
    }
}

// ============================================================================
// Primary Error Type
// ============================================================================

/// The primary error type for ArborClaw operations.
#[derive(Error, Debug)]
pub enum ClawError {
    /// Missing or invalid credentials, model, or configuration values
    #[error("Configuration error: {0}")]
    Config(String),

    /// Provider failure that survived retry and failover
    #[error("Provider error: {0}")]
    Provider(ProviderError),

    /// Tool dispatch failure. Folded into the tree by the agent loop.
    #[error("Tool error: {0}")]
    Tool(String),

    /// A caller passed a handle or value the operation cannot accept
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// Navigation on empty history, at the root, or a broken tree invariant
    #[error("Invalid state: {0}")]
    InvalidState(String),

    /// Resource not found (sessions, nodes, tools, providers)
    #[error("Not found: {0}")]
    NotFound(String),

    /// The tool-calling loop ran out of passes
    #[error("Iteration limit reached after {max_iterations} passes")]
    IterationLimit { max_iterations: u32 },

    /// The turn was cancelled before the next provider call
    #[error("Cancelled: {0}")]
    Cancelled(String),

    /// Standard I/O errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// HTTP request errors
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
}

impl ClawError {
    /// The provider classification, when this is a provider failure.
    pub fn provider_error(&self) -> Option<&ProviderError> {
        match self {
            ClawError::Provider(pe) => Some(pe),
            _ => None,
        }
    }
}

/// A specialized `Result` type for ArborClaw operations.
pub type Result<T> = std::result::Result<T, ClawError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = ClawError::Config("missing API key".to_string());
        assert_eq!(err.to_string(), "Configuration error: missing API key");
    }

    #[test]
    fn test_error_from_io() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let claw_err: ClawError = io_err.into();
        assert!(matches!(claw_err, ClawError::Io(_)));
    }

    #[test]
    fn test_iteration_limit_display() {
        let err = ClawError::IterationLimit { max_iterations: 5 };
        assert_eq!(err.to_string(), "Iteration limit reached after 5 passes");
    }

    #[test]
    fn test_provider_error_is_retryable() {
        assert!(ProviderError::Network("reset".into()).is_retryable());
        assert!(ProviderError::Timeout("30s".into()).is_retryable());
        assert!(ProviderError::Unavailable("503".into()).is_retryable());
        assert!(ProviderError::RateLimit("429".into()).is_retryable());
        assert!(ProviderError::BadGateway("502".into()).is_retryable());

        assert!(!ProviderError::InvalidArgument("400".into()).is_retryable());
        assert!(!ProviderError::OutOfMemory("507".into()).is_retryable());
        assert!(!ProviderError::Auth("401".into()).is_retryable());
        assert!(!ProviderError::InvalidToken("403".into()).is_retryable());
        assert!(!ProviderError::ModelNotFound("404".into()).is_retryable());
        assert!(!ProviderError::Unknown("???".into()).is_retryable());
    }

    #[test]
    fn test_provider_error_should_fallback() {
        assert!(ProviderError::Unavailable("503".into()).should_fallback());
        assert!(ProviderError::ModelNotFound("404".into()).should_fallback());
        assert!(ProviderError::OutOfMemory("507".into()).should_fallback());

        assert!(!ProviderError::Auth("401".into()).should_fallback());
        assert!(!ProviderError::InvalidToken("403".into()).should_fallback());
        assert!(!ProviderError::InvalidArgument("400".into()).should_fallback());
    }

    #[test]
    fn test_provider_error_status_code() {
        assert_eq!(ProviderError::Auth("x".into()).status_code(), Some(401));
        assert_eq!(ProviderError::BadGateway("x".into()).status_code(), Some(502));
        assert_eq!(ProviderError::Timeout("x".into()).status_code(), None);
    }

    #[test]
    fn test_provider_error_into_claw_error() {
        let ce: ClawError = ProviderError::RateLimit("too fast".into()).into();
        assert!(matches!(ce, ClawError::Provider(_)));
        assert_eq!(ce.to_string(), "Provider error: Rate limit error: too fast");
        assert!(ce.provider_error().is_some_and(|pe| pe.is_retryable()));
    }
}
