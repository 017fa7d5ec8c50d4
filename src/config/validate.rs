//! Configuration validation: unknown field detection and value checks.

use std::collections::HashSet;

use serde_json::Value;

use super::Config;

/// Known top-level config field names.
const KNOWN_TOP_LEVEL: &[&str] = &[
    "agent",
    "context",
    "session",
    "providers",
    "routing",
    "retry",
    "logging",
];

/// Known fields for each section.
const KNOWN_SECTIONS: &[(&str, &[&str])] = &[
    (
        "agent",
        &[
            "model",
            "temperature",
            "max_tokens",
            "max_iterations",
            "system_prompt",
        ],
    ),
    (
        "context",
        &[
            "max_context_messages",
            "summarize",
            "summarize_with_provider",
            "summary_max_chars",
        ],
    ),
    ("session", &["history_capacity"]),
    ("routing", &["default_provider", "rules", "fallbacks"]),
    (
        "retry",
        &[
            "max_retries",
            "initial_backoff_ms",
            "max_backoff_ms",
            "call_timeout_secs",
        ],
    ),
    ("logging", &["format", "level", "file"]),
];

const KNOWN_PROVIDER_FIELDS: &[&str] = &["api_key", "api_base", "default_model", "local"];

/// A validation diagnostic.
#[derive(Debug)]
pub struct Diagnostic {
    pub level: DiagnosticLevel,
    pub path: String,
    pub message: String,
}

#[derive(Debug, PartialEq)]
pub enum DiagnosticLevel {
    Ok,
    Warn,
    Error,
}

impl Diagnostic {
    fn error(path: &str, message: String) -> Self {
        Self {
            level: DiagnosticLevel::Error,
            path: path.to_string(),
            message,
        }
    }

    fn warn(path: &str, message: String) -> Self {
        Self {
            level: DiagnosticLevel::Warn,
            path: path.to_string(),
            message,
        }
    }

    fn ok(message: &str) -> Self {
        Self {
            level: DiagnosticLevel::Ok,
            path: String::new(),
            message: message.to_string(),
        }
    }

    pub fn is_error(&self) -> bool {
        self.level == DiagnosticLevel::Error
    }
}

impl std::fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let prefix = match self.level {
            DiagnosticLevel::Ok => "[OK]",
            DiagnosticLevel::Warn => "[WARN]",
            DiagnosticLevel::Error => "[ERROR]",
        };
        if self.path.is_empty() {
            write!(f, "{} {}", prefix, self.message)
        } else {
            write!(f, "{} {}: {}", prefix, self.path, self.message)
        }
    }
}

/// Simple Levenshtein distance for "did you mean?" suggestions.
pub fn levenshtein(a: &str, b: &str) -> usize {
    let a: Vec<char> = a.chars().collect();
    let b: Vec<char> = b.chars().collect();
    let mut prev: Vec<usize> = (0..=b.len()).collect();
    let mut row = vec![0usize; b.len() + 1];

    for (i, ca) in a.iter().enumerate() {
        row[0] = i + 1;
        for (j, cb) in b.iter().enumerate() {
            let cost = usize::from(ca != cb);
            row[j + 1] = (prev[j + 1] + 1).min(row[j] + 1).min(prev[j] + cost);
        }
        std::mem::swap(&mut prev, &mut row);
    }
    prev[b.len()]
}

/// Suggest the closest known field name (if distance <= 3).
pub fn suggest_field(unknown: &str, known: &[&str]) -> Option<String> {
    known
        .iter()
        .map(|k| (k, levenshtein(unknown, k)))
        .filter(|(_, d)| *d <= 3)
        .min_by_key(|(_, d)| *d)
        .map(|(k, _)| format!("did you mean '{}'?", k))
}

fn check_keys(
    obj: &serde_json::Map<String, Value>,
    known: &[&str],
    prefix: &str,
    out: &mut Vec<Diagnostic>,
) -> bool {
    let known_set: HashSet<&str> = known.iter().copied().collect();
    let mut has_unknown = false;
    for key in obj.keys() {
        if known_set.contains(key.as_str()) {
            continue;
        }
        has_unknown = true;
        let path = if prefix.is_empty() {
            key.clone()
        } else {
            format!("{}.{}", prefix, key)
        };
        let message = match suggest_field(key, known) {
            Some(suggestion) => format!("Unknown field '{}' ({})", key, suggestion),
            None => format!("Unknown field '{}'", key),
        };
        out.push(Diagnostic::error(&path, message));
    }
    has_unknown
}

/// Validate a raw JSON config value against known field names.
pub fn validate_config(raw: &Value) -> Vec<Diagnostic> {
    let mut diagnostics = Vec::new();

    let Some(obj) = raw.as_object() else {
        diagnostics.push(Diagnostic::error(
            "",
            "Config must be a JSON object".to_string(),
        ));
        return diagnostics;
    };
    diagnostics.push(Diagnostic::ok("Valid JSON"));

    let mut has_unknown = check_keys(obj, KNOWN_TOP_LEVEL, "", &mut diagnostics);

    for (section, fields) in KNOWN_SECTIONS {
        if let Some(inner) = obj.get(*section).and_then(Value::as_object) {
            has_unknown |= check_keys(inner, fields, section, &mut diagnostics);
        }
    }

    if let Some(providers) = obj.get("providers").and_then(Value::as_object) {
        for (name, entry) in providers {
            if let Some(inner) = entry.as_object() {
                let prefix = format!("providers.{}", name);
                has_unknown |= check_keys(inner, KNOWN_PROVIDER_FIELDS, &prefix, &mut diagnostics);
            }
        }
    }

    if !has_unknown {
        diagnostics.push(Diagnostic::ok("All fields recognized"));
    }

    diagnostics
}

/// Check the values of a parsed config.
pub fn validate_values(config: &Config) -> Vec<Diagnostic> {
    let mut diagnostics = Vec::new();

    if config.agent.max_iterations == 0 {
        diagnostics.push(Diagnostic::error(
            "agent.max_iterations",
            "must be at least 1".to_string(),
        ));
    }
    if !(0.0..=2.0).contains(&config.agent.temperature) {
        diagnostics.push(Diagnostic::error(
            "agent.temperature",
            format!("{} is outside 0.0..=2.0", config.agent.temperature),
        ));
    }
    if config.agent.model.trim().is_empty() {
        diagnostics.push(Diagnostic::error(
            "agent.model",
            "must not be empty".to_string(),
        ));
    }
    // system + summary + at least one recent turn
    if config.context.max_context_messages < 3 {
        diagnostics.push(Diagnostic::error(
            "context.max_context_messages",
            format!(
                "{} is too small, minimum is 3",
                config.context.max_context_messages
            ),
        ));
    }
    if config.session.history_capacity == 0 {
        diagnostics.push(Diagnostic::error(
            "session.history_capacity",
            "must be at least 1".to_string(),
        ));
    }
    if config.retry.call_timeout_secs == 0 {
        diagnostics.push(Diagnostic::error(
            "retry.call_timeout_secs",
            "must be at least 1".to_string(),
        ));
    }
    if config.retry.initial_backoff_ms > config.retry.max_backoff_ms {
        diagnostics.push(Diagnostic::warn(
            "retry.initial_backoff_ms",
            "exceeds max_backoff_ms; every delay will be capped".to_string(),
        ));
    }

    for (i, rule) in config.routing.rules.iter().enumerate() {
        let path = format!("routing.rules[{}]", i);
        if rule.prefix.is_empty() {
            diagnostics.push(Diagnostic::error(&path, "empty prefix".to_string()));
        }
        if rule.provider.trim().is_empty() {
            diagnostics.push(Diagnostic::error(&path, "empty provider name".to_string()));
        } else if !config.providers.contains_key(&rule.provider) {
            diagnostics.push(Diagnostic::warn(
                &path,
                format!("provider '{}' is not configured", rule.provider),
            ));
        }
    }

    if config.providers.is_empty() {
        diagnostics.push(Diagnostic::warn(
            "providers",
            "no provider configured".to_string(),
        ));
    }
    for (name, provider) in &config.providers {
        let has_key = provider
            .api_key
            .as_deref()
            .is_some_and(|k| !k.trim().is_empty());
        let rule_key = config
            .routing
            .rules
            .iter()
            .any(|r| &r.provider == name && r.api_key.is_some());
        if !provider.local && !has_key && !rule_key {
            diagnostics.push(Diagnostic::warn(
                &format!("providers.{}.api_key", name),
                "missing; requests to this provider will fail".to_string(),
            ));
        }
    }

    diagnostics
}
