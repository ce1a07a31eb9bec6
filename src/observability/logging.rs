//! Structured logging configuration.

use crate::config::LoggingSettings;
use std::path::PathBuf;
use std::str::FromStr;
use tracing_subscriber::EnvFilter;

/// Environment variable holding the log filter.
pub const LOG_ENV: &str = "DATALAYER_LOG";

/// Log output format.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum LogFormat {
    /// Human readable, multi-line output.
    #[default]
    Pretty,
    /// One JSON object per event.
    Json,
}

impl FromStr for LogFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "pretty" | "text" => Ok(Self::Pretty),
            "json" => Ok(Self::Json),
            other => Err(format!("unknown log format: {other}")),
        }
    }
}

/// Logging configuration.
#[derive(Debug)]
pub struct LoggingConfig {
    /// Output format.
    pub format: LogFormat,
    /// Event filter.
    pub filter: EnvFilter,
    /// Log file; stderr when unset.
    pub file: Option<PathBuf>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            format: LogFormat::default(),
            filter: EnvFilter::new("info"),
            file: None,
        }
    }
}

impl LoggingConfig {
    /// Builds a logging config from file settings.
    ///
    /// The filter comes from `DATALAYER_LOG`, then `RUST_LOG`, then the
    /// settings, then `info` (`debug` when `verbose`). Unknown formats fall
    /// back to pretty output.
    #[must_use]
    pub fn from_settings(settings: Option<&LoggingSettings>, verbose: bool) -> Self {
        let format = settings
            .and_then(|s| s.format.as_deref())
            .and_then(|f| f.parse().ok())
            .unwrap_or_default();

        let directive = std::env::var(LOG_ENV)
            .ok()
            .or_else(|| std::env::var("RUST_LOG").ok())
            .or_else(|| settings.and_then(|s| s.filter.clone()))
            .unwrap_or_else(|| if verbose { "debug" } else { "info" }.to_string());
        let filter = EnvFilter::try_new(&directive).unwrap_or_else(|_| EnvFilter::new("info"));

        Self {
            format,
            filter,
            file: settings.and_then(|s| s.file.as_ref()).map(PathBuf::from),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_log_format_parse() {
        assert_eq!("JSON".parse::<LogFormat>().unwrap(), LogFormat::Json);
        assert_eq!("pretty".parse::<LogFormat>().unwrap(), LogFormat::Pretty);
        assert!("xml".parse::<LogFormat>().is_err());
    }

    #[test]
    fn test_from_settings() {
        let settings = LoggingSettings {
            format: Some("json".to_string()),
            filter: None,
            file: Some("/tmp/datalayer.log".to_string()),
        };
        let config = LoggingConfig::from_settings(Some(&settings), false);
        assert_eq!(config.format, LogFormat::Json);
        assert_eq!(config.file, Some(PathBuf::from("/tmp/datalayer.log")));

        let config = LoggingConfig::from_settings(None, true);
        assert_eq!(config.format, LogFormat::Pretty);
        assert!(config.file.is_none());
    }
}
