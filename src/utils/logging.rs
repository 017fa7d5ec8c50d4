//! Logging initialization for ArborClaw.
//!
//! Supports three formats:
//! - `pretty`: multi-line human-readable output
//! - `component`: one compact `LEVEL target message {fields}` line per event
//! - `json`: structured JSON lines for log aggregators
//!
//! `RUST_LOG` always wins over the configured level.

use std::fs::OpenOptions;
use std::sync::Arc;

use tracing_subscriber::EnvFilter;

use crate::config::{LogFormat, LoggingConfig};
use crate::error::{ClawError, Result};

/// Build the filter: `RUST_LOG` if set, else `cfg.level`.
fn build_filter(cfg: &LoggingConfig) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&cfg.level))
}

/// Initialize the global tracing subscriber from config.
///
/// Call this once at startup before any tracing events are emitted.
///
/// # Errors
///
/// `Io` if the log file cannot be opened, `Config` if a global subscriber
/// is already installed.
pub fn init_logging(cfg: &LoggingConfig) -> Result<()> {
    let filter = build_filter(cfg);
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true);

    let installed = match (&cfg.file, cfg.format) {
        (Some(path), format) => {
            let file = OpenOptions::new().create(true).append(true).open(path)?;
            let writer = Arc::new(file);
            let builder = builder.with_ansi(false).with_writer(writer);
            match format {
                LogFormat::Json => builder.json().try_init(),
                LogFormat::Pretty => builder.pretty().try_init(),
                LogFormat::Component => builder.compact().try_init(),
            }
        }
        (None, LogFormat::Json) => builder.json().try_init(),
        (None, LogFormat::Pretty) => builder.pretty().try_init(),
        (None, LogFormat::Component) => builder.compact().try_init(),
    };

    installed.map_err(|e| ClawError::Config(format!("logging already initialized: {}", e)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_logging_config() {
        let cfg = LoggingConfig::default();
        assert_eq!(cfg.format, LogFormat::Component);
        assert_eq!(cfg.level, "info");
        assert!(cfg.file.is_none());
    }

    #[test]
    fn test_log_format_deserialize() {
        let cfg: LoggingConfig =
            serde_json::from_str(r#"{"format":"json","level":"debug"}"#).unwrap();
        assert_eq!(cfg.format, LogFormat::Json);
        assert_eq!(cfg.level, "debug");

        let cfg: LoggingConfig = serde_json::from_str(r#"{"format":"pretty"}"#).unwrap();
        assert_eq!(cfg.format, LogFormat::Pretty);
        assert_eq!(cfg.level, "info");
    }

    #[test]
    fn test_unopenable_log_file_is_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let cfg = LoggingConfig {
            file: Some(dir.path().join("missing").join("x.log").display().to_string()),
            ..LoggingConfig::default()
        };
        assert!(matches!(init_logging(&cfg), Err(ClawError::Io(_))));
    }
}
