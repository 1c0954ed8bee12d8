//! Deduplication configuration.

use super::cache::{DEFAULT_BUCKET_COUNT, DEFAULT_MAX_PATH_LEN};
use crate::clock::Tick;

/// Default cache age in milliseconds (5 minutes).
pub const DEFAULT_CACHE_MAX_AGE_MS: Tick = 300_000;

/// Configuration for the dedup cache and its aging.
///
/// # Environment Variables
///
/// | Variable | Type | Default | Description |
/// |----------|------|---------|-------------|
/// | `FWNOTIFY_CACHE_MAX_AGE_MS` | u64 | `300000` | Entry lifetime and rebuild interval |
/// | `FWNOTIFY_CACHE_BUCKETS` | usize | `2053` | Hash table buckets |
/// | `FWNOTIFY_MAX_PATH_LEN` | usize | `32767` | Longest accepted path |
///
/// # Example
///
/// ```rust
/// use fwnotify::services::deduplication::DeduplicationConfig;
///
/// let config = DeduplicationConfig::default().with_max_age_ms(1_000);
/// assert_eq!(config.max_age_ms, 1_000);
/// assert_eq!(config.bucket_count, 2053);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeduplicationConfig {
    /// Ticks before an entry becomes prunable; also the rebuild interval.
    pub max_age_ms: Tick,

    /// Number of hash buckets.
    pub bucket_count: usize,

    /// Maximum path length in characters.
    pub max_path_len: usize,
}

impl DeduplicationConfig {
    /// Creates a configuration from environment variables.
    ///
    /// Falls back to defaults for any unset or unparsable variable.
    #[must_use]
    pub fn from_env() -> Self {
        Self::default().with_env_overrides()
    }

    /// Applies `FWNOTIFY_*` environment overrides.
    #[must_use]
    pub fn with_env_overrides(mut self) -> Self {
        if let Ok(v) = std::env::var("FWNOTIFY_CACHE_MAX_AGE_MS")
            && let Ok(parsed) = v.parse::<Tick>()
        {
            self.max_age_ms = parsed;
        }
        if let Ok(v) = std::env::var("FWNOTIFY_CACHE_BUCKETS")
            && let Ok(parsed) = v.parse::<usize>()
        {
            self.bucket_count = parsed.max(1);
        }
        if let Ok(v) = std::env::var("FWNOTIFY_MAX_PATH_LEN")
            && let Ok(parsed) = v.parse::<usize>()
        {
            self.max_path_len = parsed.max(1);
        }
        self
    }

    /// Builder method to set the maximum age.
    #[must_use]
    pub const fn with_max_age_ms(mut self, max_age_ms: Tick) -> Self {
        self.max_age_ms = max_age_ms;
        self
    }

    /// Builder method to set the bucket count.
    #[must_use]
    pub const fn with_bucket_count(mut self, bucket_count: usize) -> Self {
        self.bucket_count = bucket_count;
        self
    }

    /// Builder method to set the maximum path length.
    #[must_use]
    pub const fn with_max_path_len(mut self, max_path_len: usize) -> Self {
        self.max_path_len = max_path_len;
        self
    }
}

impl Default for DeduplicationConfig {
    fn default() -> Self {
        Self {
            max_age_ms: DEFAULT_CACHE_MAX_AGE_MS,
            bucket_count: DEFAULT_BUCKET_COUNT,
            max_path_len: DEFAULT_MAX_PATH_LEN,
        }
    }
}
