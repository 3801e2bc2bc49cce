//! Logging setup for hosts embedding isostore
//!
//! The library only emits `tracing` events: store lifecycle at debug level,
//! individual operations at trace level. Hosts that have no subscriber of
//! their own can install one with [`init_logging`].

use serde::{Deserialize, Serialize};
use std::sync::Once;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// One-time initialization flag for logging
static INIT: Once = Once::new();

/// Logging configuration structure
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: LogLevel,
    pub format: LogFormat,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: LogLevel::Info,
            format: LogFormat::Compact,
        }
    }
}

/// Log levels supported by the logging system
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl LogLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            LogLevel::Error => "error",
            LogLevel::Warn => "warn",
            LogLevel::Info => "info",
            LogLevel::Debug => "debug",
            LogLevel::Trace => "trace",
        }
    }

    /// Parse log level from string
    pub fn parse(s: &str) -> Option<LogLevel> {
        match s.to_uppercase().as_str() {
            "ERROR" => Some(LogLevel::Error),
            "WARN" | "WARNING" => Some(LogLevel::Warn),
            "INFO" => Some(LogLevel::Info),
            "DEBUG" => Some(LogLevel::Debug),
            "TRACE" => Some(LogLevel::Trace),
            _ => None,
        }
    }
}

/// Log format options
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// Level and message only
    Compact,
    /// Timestamp, level, target, thread id and message
    Full,
    /// One JSON object per event
    Json,
}

/// Install a global `tracing` subscriber
///
/// `RUST_LOG` takes precedence over `config.level` when set. Only the first
/// call has any effect, and an already-installed subscriber is left alone.
pub fn init_logging(config: LoggingConfig) {
    INIT.call_once(|| {
        let filter = EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new(config.level.as_str()));
        let registry = tracing_subscriber::registry().with(filter);

        let result = match config.format {
            LogFormat::Compact => registry
                .with(
                    fmt::layer()
                        .compact()
                        .with_target(false)
                        .with_writer(std::io::stderr),
                )
                .try_init(),
            LogFormat::Full => registry
                .with(
                    fmt::layer()
                        .with_thread_ids(true)
                        .with_level(true)
                        .with_writer(std::io::stderr),
                )
                .try_init(),
            LogFormat::Json => registry
                .with(fmt::layer().json().with_writer(std::io::stderr))
                .try_init(),
        };

        if result.is_err() {
            tracing::debug!("A global tracing subscriber was already installed");
        }
    });
}

/// Check if logging has been initialized
pub fn is_logging_initialized() -> bool {
    INIT.is_completed()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = LoggingConfig::default();
        assert_eq!(config.level, LogLevel::Info);
        assert_eq!(config.format, LogFormat::Compact);
    }

    #[test]
    fn test_level_parsing() {
        assert_eq!(LogLevel::parse("warning"), Some(LogLevel::Warn));
        assert_eq!(LogLevel::parse("TRACE"), Some(LogLevel::Trace));
        assert_eq!(LogLevel::parse("loud"), None);
        assert!(LogLevel::Debug > LogLevel::Info);
    }

    #[test]
    fn test_config_from_yaml() {
        let config: LoggingConfig = serde_yaml::from_str("level: debug\nformat: json\n").unwrap();
        assert_eq!(config.level, LogLevel::Debug);
        assert_eq!(config.format, LogFormat::Json);
    }

    #[test]
    fn test_repeated_initialization() {
        init_logging(LoggingConfig::default());
        init_logging(LoggingConfig {
            level: LogLevel::Trace,
            format: LogFormat::Json,
        });
        assert!(is_logging_initialized());
    }
}
