//! Providers module - the Provider Port and its router
//!
//! This module defines the `LLMProvider` trait every backend implements,
//! the [`ProviderRouter`] that selects a backend per request, and the
//! [`RetryPolicy`] the router wraps around every call. An OpenAI-compatible
//! backend ships in [`openai`]; any other backend only needs to implement
//! the trait.
//!
//! # Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use arborclaw::providers::{ChatOptions, OpenAIProvider, ProviderRouter, RouteRequest, Turn};
//!
//! async fn example() -> arborclaw::Result<()> {
//!     let mut router = ProviderRouter::new();
//!     router.register("openai", Arc::new(OpenAIProvider::new()));
//!     router.set_shared_key("openai", "sk-...");
//!     router.set_default_provider("openai");
//!
//!     let reply = router
//!         .chat(vec![Turn::user("Hello!")], vec![], &RouteRequest::default(), ChatOptions::new())
//!         .await?;
//!     println!("Response: {}", reply.content);
//!     Ok(())
//! }
//! ```

pub mod openai;
pub mod retry;
pub mod router;
mod types;

use crate::error::ProviderError;

pub use openai::OpenAIProvider;
pub use retry::RetryPolicy;
pub use router::{
    ProviderRouter, ResolvedProvider, RouteRequest, RouteRule, LAST_RESORT_PROVIDERS,
};
pub use types::{
    ApiKey, ChatOptions, LLMProvider, LLMResponse, LLMToolCall, Role, ToolDefinition, Turn, Usage,
};

/// Parse an HTTP status code and response body into a structured [`ProviderError`].
///
/// Backends call this so every provider reports the same error classes for
/// the same upstream conditions.
pub fn parse_provider_error(status: u16, body: &str) -> ProviderError {
    match status {
        400 => ProviderError::InvalidArgument(body.to_string()),
        401 => ProviderError::Auth(body.to_string()),
        403 => ProviderError::InvalidToken(body.to_string()),
        404 => ProviderError::ModelNotFound(body.to_string()),
        408 => ProviderError::Timeout(body.to_string()),
        429 => ProviderError::RateLimit(body.to_string()),
        502 => ProviderError::BadGateway(body.to_string()),
        504 => ProviderError::Timeout(body.to_string()),
        507 => ProviderError::OutOfMemory(body.to_string()),
        500..=599 => ProviderError::Unavailable(body.to_string()),
        _ => ProviderError::Unknown(format!("HTTP {}: {}", status, body)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_provider_error_auth_classes() {
        let err = parse_provider_error(401, "invalid api key");
        assert!(matches!(err, ProviderError::Auth(_)));
        assert_eq!(err.status_code(), Some(401));

        let err = parse_provider_error(403, "token expired");
        assert!(matches!(err, ProviderError::InvalidToken(_)));
        assert!(!err.should_fallback());
    }

    #[test]
    fn test_parse_provider_error_retryable_classes() {
        for status in [429, 500, 502, 503, 504] {
            let err = parse_provider_error(status, "upstream");
            assert!(err.is_retryable(), "status {} should be retryable", status);
        }
    }

    #[test]
    fn test_parse_provider_error_terminal_classes() {
        assert!(matches!(
            parse_provider_error(400, "bad"),
            ProviderError::InvalidArgument(_)
        ));
        assert!(matches!(
            parse_provider_error(507, "oom"),
            ProviderError::OutOfMemory(_)
        ));
        assert!(!parse_provider_error(507, "oom").is_retryable());
        assert!(matches!(
            parse_provider_error(404, "no model"),
            ProviderError::ModelNotFound(_)
        ));
    }

    #[test]
    fn test_parse_provider_error_unknown() {
        let err = parse_provider_error(418, "teapot");
        assert!(matches!(err, ProviderError::Unknown(_)));
        assert!(err.to_string().contains("HTTP 418"));
    }
}
