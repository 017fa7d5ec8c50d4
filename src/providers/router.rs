//! Provider router - picks a backend per request, with retry and failover.
//!
//! Resolution order for a request:
//!
//! 1. the session's explicit provider override, if any;
//! 2. the routing rule with the longest prefix matching the model hint;
//! 3. the configured default provider;
//! 4. the configured fallback list, in order;
//! 5. the built-in last-resort list ([`LAST_RESORT_PROVIDERS`]).
//!
//! Names already attempted are skipped, unregistered names are ignored, and a
//! candidate is only used once its health probe passes. The chosen provider's
//! chat call runs under the [`RetryPolicy`]; if it still fails with an error
//! class that another backend could serve, the router moves on to the next
//! candidate.
//!
//! # Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use arborclaw::providers::{OpenAIProvider, ProviderRouter, RouteRequest, RouteRule};
//!
//! let mut router = ProviderRouter::new();
//! router.register("openai", Arc::new(OpenAIProvider::new()));
//! router.set_shared_key("openai", "sk-...");
//! router.add_rule(RouteRule::new("gpt-", "openai"));
//! router.set_default_provider("openai");
//!
//! let reply = router.chat(turns, tools, &RouteRequest::model("gpt-4o"), options).await?;
//! ```

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::config::Config;
use crate::error::{ClawError, ProviderError, Result};

use super::openai::OpenAIProvider;
use super::retry::RetryPolicy;
use super::types::{ApiKey, ChatOptions, LLMProvider, LLMResponse, ToolDefinition, Turn};

/// Providers tried after every configured option has failed.
pub const LAST_RESORT_PROVIDERS: &[&str] = &["anthropic", "openai", "ollama"];

/// Explicit model-hint → provider rule.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RouteRule {
    /// Model-name prefix this rule applies to (e.g. "gpt-", "claude-")
    pub prefix: String,
    /// Provider to route matching requests to
    pub provider: String,
    /// Key that overrides the provider's shared key on this route
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
}

impl RouteRule {
    pub fn new(prefix: &str, provider: &str) -> Self {
        Self {
            prefix: prefix.to_string(),
            provider: provider.to_string(),
            api_key: None,
        }
    }

    pub fn with_api_key(mut self, api_key: &str) -> Self {
        self.api_key = Some(api_key.to_string());
        self
    }
}

/// What a caller wants routed.
#[derive(Debug, Clone, Copy, Default)]
pub struct RouteRequest<'a> {
    /// Model hint matched against rule prefixes
    pub model: Option<&'a str>,
    /// Provider that must be tried first
    pub provider: Option<&'a str>,
}

impl<'a> RouteRequest<'a> {
    pub fn model(model: &'a str) -> Self {
        Self {
            model: Some(model),
            provider: None,
        }
    }

    pub fn with_provider(mut self, provider: Option<&'a str>) -> Self {
        self.provider = provider;
        self
    }
}

/// A healthy provider ready for a chat call.
#[derive(Clone)]
pub struct ResolvedProvider {
    pub name: String,
    pub provider: Arc<dyn LLMProvider>,
    pub api_key: Option<ApiKey>,
    /// Model to request: the hint, or the provider's default
    pub model: String,
}

impl std::fmt::Debug for ResolvedProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResolvedProvider")
            .field("name", &self.name)
            .field("model", &self.model)
            .field("api_key", &self.api_key)
            .finish()
    }
}

#[derive(Debug, Clone)]
struct Candidate {
    name: String,
    route_key: Option<String>,
}

/// Routes provider calls with rule matching, health-probe failover, and retry.
///
/// Build it once, then share it behind an `Arc`; every routing method takes
/// `&self` and the router holds no interior mutability.
pub struct ProviderRouter {
    providers: HashMap<String, Arc<dyn LLMProvider>>,
    /// Registration order, for stable health reports
    order: Vec<String>,
    shared_keys: HashMap<String, String>,
    rules: Vec<RouteRule>,
    default_provider: Option<String>,
    fallbacks: Vec<String>,
    last_resort: Vec<String>,
    retry: RetryPolicy,
}

impl std::fmt::Debug for ProviderRouter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProviderRouter")
            .field("providers", &self.order)
            .field("rules", &self.rules.len())
            .field("default_provider", &self.default_provider)
            .field("fallbacks", &self.fallbacks)
            .field("retry", &self.retry)
            .finish()
    }
}

impl Default for ProviderRouter {
    fn default() -> Self {
        Self::new()
    }
}

impl ProviderRouter {
    pub fn new() -> Self {
        Self {
            providers: HashMap::new(),
            order: Vec::new(),
            shared_keys: HashMap::new(),
            rules: Vec::new(),
            default_provider: None,
            fallbacks: Vec::new(),
            last_resort: LAST_RESORT_PROVIDERS.iter().map(|s| s.to_string()).collect(),
            retry: RetryPolicy::default(),
        }
    }

    /// Build a router from configuration: one OpenAI-compatible backend per
    /// configured provider, plus the configured rules, default, fallbacks
    /// and retry policy.
    pub fn from_config(config: &Config) -> Self {
        let mut router = Self::new();
        router.set_retry_policy(config.retry.to_policy());

        let mut names: Vec<&String> = config.providers.keys().collect();
        names.sort();
        for name in names {
            let settings = &config.providers[name];
            let mut provider = match settings.api_base.as_deref() {
                Some(base) => OpenAIProvider::with_base_url(base),
                None => OpenAIProvider::new(),
            }
            .with_name(name)
            .with_key_required(!settings.local);
            if let Some(model) = settings.default_model.as_deref() {
                provider = provider.with_default_model(model);
            }
            router.register(name, Arc::new(provider));
            if let Some(key) = config.api_key(name) {
                router.set_shared_key(name, key);
            }
        }

        for rule in &config.routing.rules {
            router.add_rule(rule.clone());
        }
        if let Some(default) = config.routing.default_provider.as_deref() {
            router.set_default_provider(default);
        }
        router.set_fallbacks(config.routing.fallbacks.clone());
        router
    }

    /// Register a backend under `name`, replacing any previous one.
    pub fn register(&mut self, name: &str, provider: Arc<dyn LLMProvider>) {
        info!(provider = %name, "Registering provider");
        if self.providers.insert(name.to_string(), provider).is_none() {
            self.order.push(name.to_string());
        }
    }

    /// Key shared by every route to `name` unless a rule overrides it.
    pub fn set_shared_key(&mut self, name: &str, api_key: &str) {
        self.shared_keys
            .insert(name.to_string(), api_key.to_string());
    }

    pub fn add_rule(&mut self, rule: RouteRule) {
        self.rules.push(rule);
    }

    pub fn set_default_provider(&mut self, name: &str) {
        self.default_provider = Some(name.to_string());
    }

    pub fn set_fallbacks(&mut self, fallbacks: Vec<String>) {
        self.fallbacks = fallbacks;
    }

    /// Replace the built-in last-resort list.
    pub fn set_last_resort(&mut self, last_resort: Vec<String>) {
        self.last_resort = last_resort;
    }

    pub fn set_retry_policy(&mut self, retry: RetryPolicy) {
        self.retry = retry;
    }

    pub fn retry_policy(&self) -> &RetryPolicy {
        &self.retry
    }

    pub fn has_provider(&self, name: &str) -> bool {
        self.providers.contains_key(name)
    }

    /// Registered provider names in registration order.
    pub fn provider_names(&self) -> &[String] {
        &self.order
    }

    /// Rule with the longest prefix matching `model`.
    fn match_rule(&self, model: &str) -> Option<&RouteRule> {
        self.rules
            .iter()
            .filter(|r| model.starts_with(r.prefix.as_str()))
            .max_by_key(|r| r.prefix.len())
    }

    /// Candidate names in resolution order, without duplicates.
    fn candidates(&self, request: &RouteRequest<'_>) -> Vec<Candidate> {
        let mut seen = HashSet::new();
        let mut out = Vec::new();
        let mut push = |name: &str, route_key: Option<String>| {
            if seen.insert(name.to_string()) {
                out.push(Candidate {
                    name: name.to_string(),
                    route_key,
                });
            }
        };

        if let Some(name) = request.provider {
            push(name, None);
        }
        if let Some(rule) = request.model.and_then(|m| self.match_rule(m)) {
            push(&rule.provider, rule.api_key.clone());
        }
        if let Some(name) = self.default_provider.as_deref() {
            push(name, None);
        }
        for name in self.fallbacks.iter().chain(self.last_resort.iter()) {
            push(name, None);
        }
        out
    }

    /// Resolve the key for `candidate`: route key first, then the shared key.
    ///
    /// # Errors
    ///
    /// `Config` if the provider needs a key and none is configured.
    fn resolve_key(
        &self,
        candidate: &Candidate,
        provider: &dyn LLMProvider,
    ) -> Result<Option<ApiKey>> {
        let key = candidate
            .route_key
            .as_deref()
            .or_else(|| self.shared_keys.get(&candidate.name).map(String::as_str))
            .filter(|k| !k.trim().is_empty());

        match key {
            Some(k) => Ok(Some(ApiKey::new(k))),
            None if provider.requires_api_key() => Err(ClawError::Config(format!(
                "no API key configured for provider '{}'",
                candidate.name
            ))),
            None => Ok(None),
        }
    }

    /// Probe one candidate. `Ok(None)` means unregistered or unhealthy.
    async fn try_candidate(
        &self,
        candidate: &Candidate,
        model: Option<&str>,
    ) -> Result<Option<ResolvedProvider>> {
        let Some(provider) = self.providers.get(&candidate.name) else {
            debug!(provider = %candidate.name, "Skipping unregistered provider");
            return Ok(None);
        };
        let api_key = self.resolve_key(candidate, provider.as_ref())?;

        if !provider.health_check().await {
            warn!(provider = %candidate.name, "Health probe failed, trying next provider");
            return Ok(None);
        }

        Ok(Some(ResolvedProvider {
            name: candidate.name.clone(),
            provider: Arc::clone(provider),
            api_key,
            model: model
                .map(str::to_string)
                .unwrap_or_else(|| provider.default_model().to_string()),
        }))
    }

    /// Walk the candidates in order, skipping `attempted`, and return the
    /// first healthy one.
    async fn next_healthy(
        &self,
        candidates: &[Candidate],
        attempted: &mut HashSet<String>,
        model: Option<&str>,
    ) -> Result<Option<ResolvedProvider>> {
        for candidate in candidates {
            if !attempted.insert(candidate.name.clone()) {
                continue;
            }
            if let Some(resolved) = self.try_candidate(candidate, model).await? {
                return Ok(Some(resolved));
            }
        }
        Ok(None)
    }

    fn no_provider_error(&self, request: &RouteRequest<'_>, any_registered: bool) -> ClawError {
        let model = request.model.unwrap_or("<default>");
        if any_registered {
            ClawError::Provider(ProviderError::Unavailable(format!(
                "no healthy provider for model '{}'",
                model
            )))
        } else {
            ClawError::Config(format!("no provider configured for model '{}'", model))
        }
    }

    /// Select a healthy provider for `request`.
    ///
    /// Only health probes are issued; no chat call is made.
    ///
    /// # Errors
    ///
    /// `Config` when nothing usable is configured or a chosen provider lacks
    /// a key, `Provider(Unavailable)` when every candidate failed its probe.
    pub async fn get_provider(&self, request: &RouteRequest<'_>) -> Result<ResolvedProvider> {
        let candidates = self.candidates(request);
        let mut attempted = HashSet::new();
        match self
            .next_healthy(&candidates, &mut attempted, request.model)
            .await?
        {
            Some(resolved) => Ok(resolved),
            None => {
                let any_registered = candidates.iter().any(|c| self.has_provider(&c.name));
                Err(self.no_provider_error(request, any_registered))
            }
        }
    }

    /// Send `turns` through the first healthy provider, retrying transient
    /// errors and failing over when another backend could serve the request.
    ///
    /// # Errors
    ///
    /// The last provider error once every candidate is exhausted, or the
    /// first error whose class no other backend could fix.
    pub async fn chat(
        &self,
        turns: Vec<Turn>,
        tools: Vec<ToolDefinition>,
        request: &RouteRequest<'_>,
        options: ChatOptions,
    ) -> Result<LLMResponse> {
        let candidates = self.candidates(request);
        let mut attempted = HashSet::new();
        let mut last_err: Option<ClawError> = None;

        while let Some(resolved) = self
            .next_healthy(&candidates, &mut attempted, request.model)
            .await?
        {
            let mut call_options = options.clone();
            call_options.api_key = resolved.api_key.clone();

            let outcome = self
                .retry
                .run(&resolved.name, || {
                    resolved.provider.chat(
                        turns.clone(),
                        tools.clone(),
                        Some(resolved.model.as_str()),
                        call_options.clone(),
                    )
                })
                .await;

            match outcome {
                Ok(response) => {
                    debug!(provider = %resolved.name, model = %resolved.model, "Provider call succeeded");
                    return Ok(response);
                }
                Err(err) => {
                    let fallback = err.provider_error().map_or(false, |pe| pe.should_fallback());
                    if !fallback {
                        warn!(provider = %resolved.name, error = %err, "Provider error is terminal, not failing over");
                        return Err(err);
                    }
                    warn!(provider = %resolved.name, error = %err, "Provider failed, failing over");
                    last_err = Some(err);
                }
            }
        }

        Err(last_err.unwrap_or_else(|| {
            let any_registered = candidates.iter().any(|c| self.has_provider(&c.name));
            self.no_provider_error(request, any_registered)
        }))
    }

    /// Probe every registered provider.
    pub async fn health_report(&self) -> Vec<(String, bool)> {
        let mut report = Vec::with_capacity(self.order.len());
        for name in &self.order {
            if let Some(provider) = self.providers.get(name) {
                report.push((name.clone(), provider.health_check().await));
            }
        }
        report
    }

    /// `true` when at least one registered provider passes its probe.
    pub async fn health_check(&self) -> bool {
        for name in &self.order {
            if let Some(provider) = self.providers.get(name) {
                if provider.health_check().await {
                    return true;
                }
            }
        }
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicU32, Ordering};

    /// Stub backend with scripted health and failures.
    struct StubProvider {
        name: &'static str,
        healthy: bool,
        needs_key: bool,
        fail_times: u32,
        failure: ProviderError,
        chat_calls: AtomicU32,
        health_calls: AtomicU32,
        last_key: std::sync::Mutex<Option<String>>,
    }

    impl StubProvider {
        fn new(name: &'static str) -> Self {
            Self {
                name,
                healthy: true,
                needs_key: false,
                fail_times: 0,
                failure: ProviderError::Unavailable("down".into()),
                chat_calls: AtomicU32::new(0),
                health_calls: AtomicU32::new(0),
                last_key: std::sync::Mutex::new(None),
            }
        }

        fn unhealthy(mut self) -> Self {
            self.healthy = false;
            self
        }

        fn needing_key(mut self) -> Self {
            self.needs_key = true;
            self
        }

        fn failing(mut self, times: u32, failure: ProviderError) -> Self {
            self.fail_times = times;
            self.failure = failure;
            self
        }

        fn chat_calls(&self) -> u32 {
            self.chat_calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl LLMProvider for StubProvider {
        async fn chat(
            &self,
            _turns: Vec<Turn>,
            _tools: Vec<ToolDefinition>,
            _model: Option<&str>,
            options: ChatOptions,
        ) -> Result<LLMResponse> {
            *self.last_key.lock().unwrap() = options.api_key.map(|k| k.expose().to_string());
            let n = self.chat_calls.fetch_add(1, Ordering::SeqCst);
            if n < self.fail_times {
                return Err(ClawError::Provider(self.failure.clone()));
            }
            Ok(LLMResponse::text(&format!("from {}", self.name)))
        }

        async fn health_check(&self) -> bool {
            self.health_calls.fetch_add(1, Ordering::SeqCst);
            self.healthy
        }

        fn default_model(&self) -> &str {
            "stub-model"
        }

        fn name(&self) -> &str {
            self.name
        }

        fn requires_api_key(&self) -> bool {
            self.needs_key
        }
    }

    fn fast_router() -> ProviderRouter {
        let mut router = ProviderRouter::new();
        router.set_last_resort(vec![]);
        router.set_retry_policy(
            RetryPolicy::new()
                .with_initial_backoff_ms(1)
                .with_max_backoff_ms(2),
        );
        router
    }

    #[tokio::test]
    async fn test_longest_prefix_rule_wins() {
        let mut router = fast_router();
        router.register("general", Arc::new(StubProvider::new("general")));
        router.register("special", Arc::new(StubProvider::new("special")));
        router.add_rule(RouteRule::new("gpt", "general"));
        router.add_rule(RouteRule::new("gpt-4o-mini", "special"));
        router.set_default_provider("general");

        let resolved = router
            .get_provider(&RouteRequest::model("gpt-4o-mini-2024"))
            .await
            .unwrap();
        assert_eq!(resolved.name, "special");
        assert_eq!(resolved.model, "gpt-4o-mini-2024");

        let resolved = router
            .get_provider(&RouteRequest::model("gpt-3.5"))
            .await
            .unwrap();
        assert_eq!(resolved.name, "general");
    }

    #[tokio::test]
    async fn test_default_provider_when_no_rule_matches() {
        let mut router = fast_router();
        router.register("main", Arc::new(StubProvider::new("main")));
        router.set_default_provider("main");

        let resolved = router.get_provider(&RouteRequest::default()).await.unwrap();
        assert_eq!(resolved.name, "main");
        assert_eq!(resolved.model, "stub-model");
    }

    #[tokio::test]
    async fn test_unhealthy_provider_is_probed_but_never_chatted() {
        let a = Arc::new(StubProvider::new("a").unhealthy());
        let b = Arc::new(StubProvider::new("b"));
        let mut router = fast_router();
        router.register("a", a.clone());
        router.register("b", b.clone());
        router.set_default_provider("a");
        router.set_fallbacks(vec!["a".into(), "b".into()]);

        let resolved = router.get_provider(&RouteRequest::default()).await.unwrap();
        assert_eq!(resolved.name, "b");

        let reply = router
            .chat(vec![], vec![], &RouteRequest::default(), ChatOptions::new())
            .await
            .unwrap();
        assert_eq!(reply.content, "from b");
        assert_eq!(a.chat_calls(), 0);
        assert_eq!(a.health_calls.load(Ordering::SeqCst), 2);
        assert_eq!(b.chat_calls(), 1);
    }

    #[tokio::test]
    async fn test_last_resort_list_after_configured_options() {
        let mut router = fast_router();
        router.register("primary", Arc::new(StubProvider::new("primary").unhealthy()));
        router.register("rescue", Arc::new(StubProvider::new("rescue")));
        router.set_default_provider("primary");
        router.set_last_resort(vec!["rescue".into()]);

        let resolved = router.get_provider(&RouteRequest::default()).await.unwrap();
        assert_eq!(resolved.name, "rescue");
    }

    #[tokio::test]
    async fn test_all_unhealthy_is_unavailable() {
        let mut router = fast_router();
        router.register("a", Arc::new(StubProvider::new("a").unhealthy()));
        router.set_default_provider("a");

        let err = router
            .get_provider(&RouteRequest::default())
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            ClawError::Provider(ProviderError::Unavailable(_))
        ));
    }

    #[tokio::test]
    async fn test_nothing_registered_is_config_error() {
        let router = fast_router();
        let err = router
            .get_provider(&RouteRequest::model("gpt-4o"))
            .await
            .unwrap_err();
        assert!(matches!(err, ClawError::Config(_)));
    }

    #[tokio::test]
    async fn test_route_key_overrides_shared_key() {
        let stub = Arc::new(StubProvider::new("openai").needing_key());
        let mut router = fast_router();
        router.register("openai", stub.clone());
        router.set_shared_key("openai", "sk-shared");
        router.add_rule(RouteRule::new("gpt-", "openai").with_api_key("sk-route"));
        router.set_default_provider("openai");

        router
            .chat(vec![], vec![], &RouteRequest::model("gpt-4o"), ChatOptions::new())
            .await
            .unwrap();
        assert_eq!(stub.last_key.lock().unwrap().as_deref(), Some("sk-route"));

        router
            .chat(vec![], vec![], &RouteRequest::model("o1"), ChatOptions::new())
            .await
            .unwrap();
        assert_eq!(stub.last_key.lock().unwrap().as_deref(), Some("sk-shared"));
    }

    #[tokio::test]
    async fn test_missing_key_is_config_error() {
        let mut router = fast_router();
        router.register("openai", Arc::new(StubProvider::new("openai").needing_key()));
        router.set_default_provider("openai");

        let err = router
            .get_provider(&RouteRequest::default())
            .await
            .unwrap_err();
        assert!(matches!(err, ClawError::Config(_)));
    }

    #[tokio::test]
    async fn test_retryable_failures_within_budget_succeed() {
        let stub = Arc::new(
            StubProvider::new("flaky").failing(3, ProviderError::RateLimit("429".into())),
        );
        let mut router = fast_router();
        router.register("flaky", stub.clone());
        router.set_default_provider("flaky");

        let reply = router
            .chat(vec![], vec![], &RouteRequest::default(), ChatOptions::new())
            .await
            .unwrap();
        assert_eq!(reply.content, "from flaky");
        assert_eq!(stub.chat_calls(), 4);
    }

    #[tokio::test]
    async fn test_terminal_error_neither_retried_nor_failed_over() {
        let a = Arc::new(StubProvider::new("a").failing(1, ProviderError::Auth("401".into())));
        let b = Arc::new(StubProvider::new("b"));
        let mut router = fast_router();
        router.register("a", a.clone());
        router.register("b", b.clone());
        router.set_default_provider("a");
        router.set_fallbacks(vec!["b".into()]);

        let err = router
            .chat(vec![], vec![], &RouteRequest::default(), ChatOptions::new())
            .await
            .unwrap_err();
        assert!(matches!(err, ClawError::Provider(ProviderError::Auth(_))));
        assert_eq!(a.chat_calls(), 1);
        assert_eq!(b.chat_calls(), 0);
    }

    #[tokio::test]
    async fn test_exhausted_provider_fails_over() {
        let a = Arc::new(
            StubProvider::new("a").failing(100, ProviderError::BadGateway("502".into())),
        );
        let b = Arc::new(StubProvider::new("b"));
        let mut router = fast_router();
        router.set_retry_policy(
            RetryPolicy::new()
                .with_max_retries(1)
                .with_initial_backoff_ms(1)
                .with_max_backoff_ms(1),
        );
        router.register("a", a.clone());
        router.register("b", b.clone());
        router.set_default_provider("a");
        router.set_fallbacks(vec!["b".into()]);

        let reply = router
            .chat(vec![], vec![], &RouteRequest::default(), ChatOptions::new())
            .await
            .unwrap();
        assert_eq!(reply.content, "from b");
        assert_eq!(a.chat_calls(), 2);
    }

    #[tokio::test]
    async fn test_session_provider_override_goes_first() {
        let mut router = fast_router();
        router.register("a", Arc::new(StubProvider::new("a")));
        router.register("b", Arc::new(StubProvider::new("b")));
        router.set_default_provider("a");

        let request = RouteRequest::default().with_provider(Some("b"));
        let resolved = router.get_provider(&request).await.unwrap();
        assert_eq!(resolved.name, "b");
    }

    #[test]
    fn test_from_config() {
        let config: Config = serde_json::from_str(
            r#"{
                "providers": {
                    "openai": {"api_key": "sk-test"},
                    "ollama": {"api_base": "http://localhost:11434/v1", "local": true}
                },
                "routing": {
                    "default_provider": "openai",
                    "rules": [{"prefix": "llama", "provider": "ollama"}],
                    "fallbacks": ["ollama"]
                },
                "retry": {"max_retries": 1}
            }"#,
        )
        .unwrap();
        let router = ProviderRouter::from_config(&config);
        assert_eq!(router.provider_names(), &["ollama".to_string(), "openai".to_string()]);
        assert_eq!(router.retry_policy().max_retries(), 1);
        assert_eq!(
            router.match_rule("llama3").map(|r| r.provider.as_str()),
            Some("ollama")
        );
        assert_eq!(router.shared_keys.get("openai").map(String::as_str), Some("sk-test"));
        assert!(!router.providers["ollama"].requires_api_key());
    }

    #[tokio::test]
    async fn test_health_report() {
        let mut router = fast_router();
        router.register("up", Arc::new(StubProvider::new("up")));
        router.register("down", Arc::new(StubProvider::new("down").unhealthy()));
        assert_eq!(
            router.health_report().await,
            vec![("up".to_string(), true), ("down".to_string(), false)]
        );
        assert!(router.health_check().await);
    }
}
