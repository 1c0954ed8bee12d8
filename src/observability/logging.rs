//! Structured logging configuration.

use crate::config::LoggingSettings;
use std::fmt;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

/// Default filter directive.
pub const DEFAULT_LOG_LEVEL: &str = "info";

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    /// Human-readable multi-line output.
    #[default]
    Pretty,
    /// One JSON object per event.
    Json,
}

impl LogFormat {
    /// Returns the format as a string slice.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Pretty => "pretty",
            Self::Json => "json",
        }
    }

    /// Parses a format name, defaulting to pretty.
    #[must_use]
    pub fn parse(s: &str) -> Self {
        match s.trim().to_lowercase().as_str() {
            "json" => Self::Json,
            _ => Self::Pretty,
        }
    }
}

impl fmt::Display for LogFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Resolved logging configuration.
///
/// # Environment Variables
///
/// | Variable | Description |
/// |----------|-------------|
/// | `FWNOTIFY_LOG` | `EnvFilter` directive, e.g. `fwnotify=debug` |
/// | `FWNOTIFY_LOG_FORMAT` | `pretty` or `json` |
/// | `FWNOTIFY_LOG_FILE` | Append logs to this file instead of stderr |
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoggingConfig {
    /// Filter directive.
    pub level: String,
    /// Output format.
    pub format: LogFormat,
    /// Optional log file.
    pub file: Option<PathBuf>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: DEFAULT_LOG_LEVEL.to_string(),
            format: LogFormat::Pretty,
            file: None,
        }
    }
}

impl LoggingConfig {
    /// Builds logging configuration from environment variables.
    #[must_use]
    pub fn from_env(verbose: bool) -> Self {
        Self::from_settings(None, verbose)
    }

    /// Builds logging configuration from config settings with env overrides.
    ///
    /// `verbose` raises the default level to `debug` unless `FWNOTIFY_LOG`
    /// is set.
    #[must_use]
    pub fn from_settings(settings: Option<&LoggingSettings>, verbose: bool) -> Self {
        let mut config = Self::default();

        if let Some(settings) = settings {
            if let Some(level) = settings.level.as_deref().filter(|l| !l.trim().is_empty()) {
                config.level = level.to_string();
            }
            if let Some(format) = settings.format.as_deref() {
                config.format = LogFormat::parse(format);
            }
            config.file.clone_from(&settings.file);
        }

        if verbose {
            config.level = "debug".to_string();
        }
        if let Ok(level) = std::env::var("FWNOTIFY_LOG")
            && !level.trim().is_empty()
        {
            config.level = level;
        }
        if let Ok(format) = std::env::var("FWNOTIFY_LOG_FORMAT") {
            config.format = LogFormat::parse(&format);
        }
        if let Ok(file) = std::env::var("FWNOTIFY_LOG_FILE")
            && !file.is_empty()
        {
            config.file = Some(PathBuf::from(file));
        }

        config
    }

    /// Builds the event filter, falling back to the default level when the
    /// directive does not parse.
    #[must_use]
    pub fn filter(&self) -> EnvFilter {
        EnvFilter::try_new(&self.level).unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_LEVEL))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_parse() {
        assert_eq!(LogFormat::parse("JSON"), LogFormat::Json);
        assert_eq!(LogFormat::parse("pretty"), LogFormat::Pretty);
        assert_eq!(LogFormat::parse("unknown"), LogFormat::Pretty);
        assert_eq!(LogFormat::Json.to_string(), "json");
    }

    #[test]
    fn test_settings_applied() {
        let settings = LoggingSettings {
            level: Some("warn".to_string()),
            format: Some("json".to_string()),
            file: Some(PathBuf::from("/tmp/fwnotify.log")),
        };
        // Only meaningful when the override variables are unset.
        if std::env::var("FWNOTIFY_LOG").is_err() && std::env::var("FWNOTIFY_LOG_FORMAT").is_err() {
            let config = LoggingConfig::from_settings(Some(&settings), false);
            assert_eq!(config.level, "warn");
            assert_eq!(config.format, LogFormat::Json);
        }
    }

    #[test]
    fn test_verbose_raises_level() {
        if std::env::var("FWNOTIFY_LOG").is_err() {
            assert_eq!(LoggingConfig::from_settings(None, true).level, "debug");
        }
    }
}
