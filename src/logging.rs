//! Tracing setup shared by the `podium` and `podium-api` binaries.
//!
//! `RUST_LOG` wins over the configured level when set.

use std::str::FromStr;
use thiserror::Error;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::config::LoggingConfig;

/// Output format for log lines
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

impl FromStr for LogFormat {
    type Err = LoggingError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "pretty" | "text" => Ok(LogFormat::Pretty),
            "json" => Ok(LogFormat::Json),
            other => Err(LoggingError::UnknownFormat(other.to_string())),
        }
    }
}

#[derive(Debug, Error)]
pub enum LoggingError {
    #[error("Unknown log format: {0} (expected pretty or json)")]
    UnknownFormat(String),

    #[error("Invalid log filter: {0}")]
    Filter(#[from] tracing_subscriber::filter::ParseError),

    #[error("Subscriber already installed: {0}")]
    Init(#[from] tracing_subscriber::util::TryInitError),
}

/// Filter directive for a configured level
pub fn default_directive(level: &str) -> String {
    format!("podium={level},tower_http={level}", level = level.trim())
}

/// Install the global subscriber
pub fn init(config: &LoggingConfig) -> Result<(), LoggingError> {
    let format: LogFormat = config.format.parse()?;
    let filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => EnvFilter::try_new(default_directive(&config.level))?,
    };

    let registry = tracing_subscriber::registry().with(filter);
    match format {
        LogFormat::Pretty => registry.with(fmt::layer()).try_init()?,
        LogFormat::Json => registry.with(fmt::layer().json()).try_init()?,
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_format() {
        assert_eq!("pretty".parse::<LogFormat>().unwrap(), LogFormat::Pretty);
        assert_eq!(" JSON ".parse::<LogFormat>().unwrap(), LogFormat::Json);
        assert!("xml".parse::<LogFormat>().is_err());
    }

    #[test]
    fn test_default_directive() {
        assert_eq!(default_directive("debug"), "podium=debug,tower_http=debug");
        assert!(EnvFilter::try_new(default_directive("info")).is_ok());
    }

    #[test]
    fn test_init_rejects_unknown_format() {
        let config = LoggingConfig {
            level: "info".to_string(),
            format: "yaml".to_string(),
        };
        assert!(matches!(init(&config), Err(LoggingError::UnknownFormat(_))));
    }
}
