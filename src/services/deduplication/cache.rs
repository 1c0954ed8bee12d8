//! Recently-handled path cache.
//!
//! A chained hash table of normalized paths and the tick each was last seen.
//! The table has a fixed, prime number of buckets and never resizes; pruning
//! and clearing are single passes over every bucket. The cache keeps no clock
//! of its own, callers hand it ticks.
//!
//! The cache is not synchronized. The event coordinator owns it behind its
//! coordination lock.

use super::hasher::PathHasher;
use crate::clock::Tick;

/// Default number of buckets. Prime to spread FNV residues.
pub const DEFAULT_BUCKET_COUNT: usize = 2053;

/// Default maximum path length in characters.
pub const DEFAULT_MAX_PATH_LEN: usize = 32767;

/// A single cached path.
#[derive(Debug)]
struct CacheEntry {
    path: Box<str>,
    last_seen: Tick,
}

/// Dedup cache of recently handled paths.
///
/// # Example
///
/// ```rust
/// use fwnotify::services::DedupCache;
///
/// let mut cache = DedupCache::new(53, 260);
/// assert!(cache.insert_or_refresh(r"c:\tools\app.exe", 100));
/// assert!(cache.contains(r"c:\tools\app.exe"));
///
/// // Entries older than max_age are pruned.
/// assert_eq!(cache.prune(1_200, 1_000), 1);
/// assert!(cache.is_empty());
/// ```
#[derive(Debug)]
pub struct DedupCache {
    buckets: Vec<Vec<CacheEntry>>,
    len: usize,
    max_path_len: usize,
}

impl DedupCache {
    /// Creates an empty cache.
    ///
    /// A zero `bucket_count` is treated as 1.
    #[must_use]
    pub fn new(bucket_count: usize, max_path_len: usize) -> Self {
        let buckets = (0..bucket_count.max(1)).map(|_| Vec::new()).collect();
        Self {
            buckets,
            len: 0,
            max_path_len,
        }
    }

    /// Returns true if the exact path is cached.
    #[must_use]
    pub fn contains(&self, path: &str) -> bool {
        !path.is_empty() && self.find(path).is_some()
    }

    /// Returns the tick a path was last seen, if cached.
    #[must_use]
    pub fn last_seen(&self, path: &str) -> Option<Tick> {
        self.find(path).map(|entry| entry.last_seen)
    }

    /// Inserts a path, or refreshes its tick if it is already cached.
    ///
    /// An existing entry keeps the later of its tick and `time`. Returns
    /// false, leaving the cache untouched, if the path is empty, longer than
    /// the configured maximum, or cannot be allocated.
    pub fn insert_or_refresh(&mut self, path: &str, time: Tick) -> bool {
        if PathHasher::is_out_of_bounds(path, self.max_path_len) {
            return false;
        }

        let index = self.bucket_index(path);
        let bucket = &mut self.buckets[index];

        if let Some(entry) = bucket.iter_mut().find(|entry| &*entry.path == path) {
            entry.last_seen = entry.last_seen.max(time);
            return true;
        }

        let Some(copy) = PathHasher::bounded_copy(path, self.max_path_len) else {
            return false;
        };
        if bucket.try_reserve(1).is_err() {
            return false;
        }

        bucket.push(CacheEntry {
            path: copy.into_boxed_str(),
            last_seen: time,
        });
        self.len += 1;
        true
    }

    /// Removes every entry with `now - last_seen > max_age`.
    ///
    /// Entries stamped after `now` are kept. Returns the number removed.
    pub fn prune(&mut self, now: Tick, max_age: Tick) -> usize {
        let mut removed = 0;
        for bucket in &mut self.buckets {
            let before = bucket.len();
            bucket.retain(|entry| now.saturating_sub(entry.last_seen) <= max_age);
            removed += before - bucket.len();
        }
        self.len -= removed;
        removed
    }

    /// Removes every entry and releases bucket storage.
    pub fn clear(&mut self) {
        for bucket in &mut self.buckets {
            *bucket = Vec::new();
        }
        self.len = 0;
    }

    /// Returns the number of cached paths.
    #[must_use]
    pub const fn len(&self) -> usize {
        self.len
    }

    /// Returns true if nothing is cached.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Returns the fixed bucket count.
    #[must_use]
    pub fn bucket_count(&self) -> usize {
        self.buckets.len()
    }

    /// Returns the maximum accepted path length.
    #[must_use]
    pub const fn max_path_len(&self) -> usize {
        self.max_path_len
    }

    fn find(&self, path: &str) -> Option<&CacheEntry> {
        self.buckets[self.bucket_index(path)]
            .iter()
            .find(|entry| &*entry.path == path)
    }

    fn bucket_index(&self, path: &str) -> usize {
        let count = u64::try_from(self.buckets.len()).unwrap_or(u64::MAX);
        usize::try_from(PathHasher::hash(path) % count).unwrap_or(0)
    }
}

impl Default for DedupCache {
    fn default() -> Self {
        Self::new(DEFAULT_BUCKET_COUNT, DEFAULT_MAX_PATH_LEN)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const APP1: &str = r"c:\tools\app1.exe";
    const APP2: &str = r"c:\tools\app2.exe";

    #[test]
    fn test_new_cache_is_empty() {
        let cache = DedupCache::default();
        assert!(cache.is_empty());
        assert_eq!(cache.bucket_count(), DEFAULT_BUCKET_COUNT);
        assert!(!cache.contains(APP1));
    }

    #[test]
    fn test_zero_buckets_clamped() {
        let mut cache = DedupCache::new(0, 64);
        assert_eq!(cache.bucket_count(), 1);
        assert!(cache.insert_or_refresh(APP1, 1));
        assert!(cache.contains(APP1));
    }

    #[test]
    fn test_insert_and_contains() {
        let mut cache = DedupCache::default();
        assert!(cache.insert_or_refresh(APP1, 10));
        assert!(cache.contains(APP1));
        assert!(!cache.contains(APP2));
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_lookup_is_exact() {
        let mut cache = DedupCache::default();
        cache.insert_or_refresh(APP1, 10);
        assert!(!cache.contains(r"C:\TOOLS\APP1.EXE"));
    }

    #[test]
    fn test_refresh_keeps_single_entry_and_max_time() {
        let mut cache = DedupCache::default();
        assert!(cache.insert_or_refresh(APP1, 10));
        assert!(cache.insert_or_refresh(APP1, 50));
        assert!(cache.insert_or_refresh(APP1, 20));
        assert_eq!(cache.len(), 1);
        assert_eq!(cache.last_seen(APP1), Some(50));
    }

    #[test]
    fn test_rejects_empty_and_oversized() {
        let mut cache = DedupCache::new(7, 8);
        assert!(!cache.insert_or_refresh("", 1));
        assert!(!cache.insert_or_refresh("123456789", 1));
        assert!(cache.is_empty());
        assert!(!cache.contains(""));
    }

    #[test]
    fn test_prune_removes_only_expired() {
        let mut cache = DedupCache::default();
        cache.insert_or_refresh(APP1, 0);
        cache.insert_or_refresh(APP2, 600);

        // APP1 is 1001 old, APP2 is 401 old.
        assert_eq!(cache.prune(1001, 1000), 1);
        assert!(!cache.contains(APP1));
        assert!(cache.contains(APP2));
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_prune_boundary_is_inclusive() {
        let mut cache = DedupCache::default();
        cache.insert_or_refresh(APP1, 0);
        assert_eq!(cache.prune(1000, 1000), 0);
        assert!(cache.contains(APP1));
    }

    #[test]
    fn test_prune_keeps_future_entries() {
        let mut cache = DedupCache::default();
        cache.insert_or_refresh(APP1, 5000);
        assert_eq!(cache.prune(10, 1), 0);
        assert!(cache.contains(APP1));
    }

    #[test]
    fn test_prune_whole_chain_in_single_bucket() {
        // One bucket forces every entry into the same chain.
        let mut cache = DedupCache::new(1, 64);
        for i in 0..10u64 {
            cache.insert_or_refresh(&format!("app{i}.exe"), i * 100);
        }
        assert_eq!(cache.prune(1000, 500), 5);
        assert_eq!(cache.len(), 5);
        for i in 0..10u64 {
            assert_eq!(cache.contains(&format!("app{i}.exe")), i >= 5);
        }
    }

    #[test]
    fn test_clear() {
        let mut cache = DedupCache::new(3, 64);
        cache.insert_or_refresh(APP1, 1);
        cache.insert_or_refresh(APP2, 2);
        cache.clear();
        assert!(cache.is_empty());
        assert!(!cache.contains(APP1));
        assert!(cache.insert_or_refresh(APP1, 3));
        assert_eq!(cache.len(), 1);
    }
}
