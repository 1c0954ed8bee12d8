//! Configuration management.
//!
//! Configuration is read from a TOML file and then overridden by
//! `FWNOTIFY_*` environment variables:
//!
//! ```toml
//! cache_max_age_ms = 300000
//! queue_capacity = 2
//! rules_path = "/var/lib/fwnotify/rules.json"
//!
//! [devices]
//! '\Device\HarddiskVolume3' = "C:"
//!
//! [logging]
//! level = "fwnotify=debug"
//! format = "json"
//!
//! [metrics]
//! enabled = true
//! port = 9090
//! ```

use crate::clock::Tick;
use crate::monitor::DEFAULT_MONITOR_WORKERS;
use crate::path::DevicePathNormalizer;
use crate::services::DEFAULT_QUEUE_CAPACITY;
use crate::services::deduplication::DeduplicationConfig;
use crate::storage::FileRuleStore;
use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// Main configuration for fwnotify.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NotifierConfig {
    /// Dedup entry lifetime and cache rebuild interval, in milliseconds.
    pub cache_max_age_ms: Tick,
    /// Decision queue capacity.
    pub queue_capacity: usize,
    /// Longest accepted path, in characters.
    pub max_path_len: usize,
    /// Dedup cache hash buckets.
    pub cache_buckets: usize,
    /// Block monitor dispatcher threads.
    pub monitor_workers: usize,
    /// Rule file location.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rules_path: Option<PathBuf>,
    /// Device name to drive letter table.
    pub devices: BTreeMap<String, String>,
    /// Logging section.
    pub logging: LoggingSettings,
    /// Metrics section.
    pub metrics: MetricsSettings,
    /// File this configuration was loaded from.
    #[serde(skip)]
    pub source: Option<PathBuf>,
}

/// Logging section in config file.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoggingSettings {
    /// Filter directive.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub level: Option<String>,
    /// `pretty` or `json`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub format: Option<String>,
    /// Log file path.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file: Option<PathBuf>,
}

/// Metrics section in config file.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetricsSettings {
    /// Whether the Prometheus exporter runs.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub enabled: Option<bool>,
    /// Exporter port.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub port: Option<u16>,
}

/// Configuration file structure (for TOML parsing).
#[derive(Debug, Deserialize, Default)]
#[serde(deny_unknown_fields)]
pub struct ConfigFile {
    /// Cache age.
    pub cache_max_age_ms: Option<Tick>,
    /// Queue capacity.
    pub queue_capacity: Option<usize>,
    /// Maximum path length.
    pub max_path_len: Option<usize>,
    /// Hash buckets.
    pub cache_buckets: Option<usize>,
    /// Monitor threads.
    pub monitor_workers: Option<usize>,
    /// Rule file.
    pub rules_path: Option<String>,
    /// Device table.
    #[serde(default)]
    pub devices: BTreeMap<String, String>,
    /// Logging section.
    pub logging: Option<LoggingSettings>,
    /// Metrics section.
    pub metrics: Option<MetricsSettings>,
}

impl Default for NotifierConfig {
    fn default() -> Self {
        let dedup = DeduplicationConfig::default();
        Self {
            cache_max_age_ms: dedup.max_age_ms,
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
            max_path_len: dedup.max_path_len,
            cache_buckets: dedup.bucket_count,
            monitor_workers: DEFAULT_MONITOR_WORKERS,
            rules_path: FileRuleStore::default_path(),
            devices: BTreeMap::new(),
            logging: LoggingSettings::default(),
            metrics: MetricsSettings::default(),
            source: None,
        }
    }
}

impl NotifierConfig {
    /// Creates a configuration with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Loads configuration from a file path.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn load_from_file(path: &Path) -> Result<Self> {
        let contents =
            std::fs::read_to_string(path).map_err(|e| Error::operation("read_config_file", e))?;
        let file: ConfigFile =
            toml::from_str(&contents).map_err(|e| Error::operation("parse_config_file", e))?;

        let mut config = Self::from_config_file(file);
        config.source = Some(path.to_path_buf());
        Ok(config)
    }

    /// Loads configuration from the default location.
    ///
    /// Checks the following paths in order:
    /// 1. Platform-specific config dir (`~/Library/Application Support/fwnotify/` on macOS)
    /// 2. XDG config dir (`~/.config/fwnotify/`)
    ///
    /// Returns default configuration if no readable config file is found.
    #[must_use]
    pub fn load_default() -> Self {
        let Some(base_dirs) = directories::BaseDirs::new() else {
            return Self::default();
        };

        let candidates = [
            base_dirs.config_dir().join("fwnotify").join("config.toml"),
            base_dirs
                .home_dir()
                .join(".config")
                .join("fwnotify")
                .join("config.toml"),
        ];

        for candidate in candidates.iter().filter(|path| path.exists()) {
            match Self::load_from_file(candidate) {
                Ok(config) => return config,
                Err(e) => {
                    tracing::warn!(path = %candidate.display(), error = %e, "Ignoring config file");
                },
            }
        }

        Self::default()
    }

    /// Converts a `ConfigFile` to `NotifierConfig`.
    fn from_config_file(file: ConfigFile) -> Self {
        let mut config = Self::default();

        if let Some(v) = file.cache_max_age_ms {
            config.cache_max_age_ms = v;
        }
        if let Some(v) = file.queue_capacity {
            config.queue_capacity = v.max(1);
        }
        if let Some(v) = file.max_path_len {
            config.max_path_len = v.max(1);
        }
        if let Some(v) = file.cache_buckets {
            config.cache_buckets = v.max(1);
        }
        if let Some(v) = file.monitor_workers {
            config.monitor_workers = v.max(1);
        }
        if let Some(path) = file.rules_path {
            config.rules_path = Some(PathBuf::from(path));
        }
        config.devices = file.devices;
        if let Some(logging) = file.logging {
            config.logging = logging;
        }
        if let Some(metrics) = file.metrics {
            config.metrics = metrics;
        }

        config
    }

    /// Applies `FWNOTIFY_*` environment overrides.
    ///
    /// Logging and metrics variables are resolved by
    /// [`crate::observability`] instead.
    #[must_use]
    pub fn with_env_overrides(mut self) -> Self {
        let dedup = self.dedup().with_env_overrides();
        self.cache_max_age_ms = dedup.max_age_ms;
        self.cache_buckets = dedup.bucket_count;
        self.max_path_len = dedup.max_path_len;

        if let Ok(v) = std::env::var("FWNOTIFY_QUEUE_CAPACITY")
            && let Ok(parsed) = v.parse::<usize>()
        {
            self.queue_capacity = parsed.max(1);
        }
        if let Ok(v) = std::env::var("FWNOTIFY_MONITOR_WORKERS")
            && let Ok(parsed) = v.parse::<usize>()
        {
            self.monitor_workers = parsed.max(1);
        }
        if let Ok(v) = std::env::var("FWNOTIFY_RULES_PATH")
            && !v.is_empty()
        {
            self.rules_path = Some(PathBuf::from(v));
        }
        self
    }

    /// Returns the dedup cache settings.
    #[must_use]
    pub const fn dedup(&self) -> DeduplicationConfig {
        DeduplicationConfig {
            max_age_ms: self.cache_max_age_ms,
            bucket_count: self.cache_buckets,
            max_path_len: self.max_path_len,
        }
    }

    /// Builds a path normalizer from the device table.
    #[must_use]
    pub fn normalizer(&self) -> DevicePathNormalizer {
        DevicePathNormalizer::from_map(&self.devices)
    }

    /// Returns the rule file path.
    ///
    /// # Errors
    ///
    /// Returns an error if no path is configured and no data directory
    /// could be determined.
    pub fn rules_path(&self) -> Result<&Path> {
        self.rules_path.as_deref().ok_or_else(|| {
            Error::InvalidInput("no rules_path configured and no data directory found".to_string())
        })
    }

    /// Sets the rule file path.
    #[must_use]
    pub fn with_rules_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.rules_path = Some(path.into());
        self
    }

    /// Sets the cache age.
    #[must_use]
    pub const fn with_cache_max_age_ms(mut self, max_age_ms: Tick) -> Self {
        self.cache_max_age_ms = max_age_ms;
        self
    }

    /// Sets the queue capacity.
    #[must_use]
    pub const fn with_queue_capacity(mut self, capacity: usize) -> Self {
        self.queue_capacity = capacity;
        self
    }

    /// Renders the configuration as TOML.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization fails.
    pub fn to_toml(&self) -> Result<String> {
        toml::to_string_pretty(self).map_err(|e| Error::operation("serialize_config", e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_defaults() {
        let config = NotifierConfig::default();
        assert_eq!(config.cache_max_age_ms, 300_000);
        assert_eq!(config.queue_capacity, 2);
        assert_eq!(config.max_path_len, 32_767);
        assert_eq!(config.cache_buckets, 2053);
        assert_eq!(config.monitor_workers, 4);
        assert!(config.devices.is_empty());
    }

    #[test]
    fn test_load_from_file() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(
            file,
            r#"
cache_max_age_ms = 1000
queue_capacity = 0
rules_path = "/tmp/rules.json"

[devices]
'\Device\HarddiskVolume3' = "C:"

[logging]
format = "json"

[metrics]
port = 9200
"#
        )
        .unwrap();

        let config = NotifierConfig::load_from_file(file.path()).unwrap();
        assert_eq!(config.cache_max_age_ms, 1000);
        assert_eq!(config.queue_capacity, 1);
        assert_eq!(config.rules_path().unwrap(), Path::new("/tmp/rules.json"));
        assert_eq!(config.logging.format.as_deref(), Some("json"));
        assert_eq!(config.metrics.port, Some(9200));
        assert_eq!(config.source.as_deref(), Some(file.path()));

        let normalizer = config.normalizer();
        assert_eq!(normalizer.len(), 1);
    }

    #[test]
    fn test_unknown_key_rejected() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "queue_capacty = 4").unwrap();
        assert!(matches!(
            NotifierConfig::load_from_file(file.path()),
            Err(Error::OperationFailed { .. })
        ));
    }

    #[test]
    fn test_missing_file_errors() {
        assert!(NotifierConfig::load_from_file(Path::new("/nonexistent/fwnotify.toml")).is_err());
    }

    #[test]
    fn test_dedup_projection() {
        let config = NotifierConfig::default().with_cache_max_age_ms(10);
        let dedup = config.dedup();
        assert_eq!(dedup.max_age_ms, 10);
        assert_eq!(dedup.bucket_count, 2053);
    }

    #[test]
    fn test_to_toml_roundtrips_keys() {
        let rendered = NotifierConfig::default()
            .with_rules_path("/tmp/r.json")
            .to_toml()
            .unwrap();
        assert!(rendered.contains("queue_capacity = 2"));
        assert!(rendered.contains("rules_path = \"/tmp/r.json\""));
    }
}
