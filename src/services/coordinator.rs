//! Event coordinator.
//!
//! Every raw block event passes through [`EventCoordinator::on_block_event`],
//! possibly from many threads at once:
//!
//! ```text
//! Received ─► Closed-Check ─► Normalize ─► Age-Check ─► Dedup-Check ─► Enqueue
//!     │            │              │            │              │            │
//!  Rejected      Closed        Rejected   prune+rebuild   Duplicate   Queued/Dropped
//! ```
//!
//! Normalization runs outside the coordination lock. Everything from the age
//! check to the cache refresh runs under it, so two producers racing on the
//! same new path enqueue it once, and no producer can enqueue after
//! [`EventCoordinator::close`] returns.

use super::deduplication::{DedupCache, DeduplicationConfig, PathHasher};
use super::queue::BoundedQueue;
use crate::clock::{Clock, Tick};
use crate::path::PathNormalizer;
use crate::storage::RuleStore;
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tracing::instrument;

/// What happened to a raw block event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventOutcome {
    /// Shutdown in progress; ignored.
    Closed,
    /// Path was empty, untranslatable or too long.
    Rejected,
    /// Path was seen recently or already has a rule.
    Duplicate,
    /// Path was handed to the decision loop.
    Queued,
    /// Queue was full; the path was not cached and may be reported again.
    Dropped,
}

impl EventOutcome {
    /// Returns the outcome as a string slice.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Closed => "closed",
            Self::Rejected => "rejected",
            Self::Duplicate => "duplicate",
            Self::Queued => "queued",
            Self::Dropped => "dropped",
        }
    }
}

impl fmt::Display for EventOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Point-in-time view of the coordinator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CoordinatorSnapshot {
    /// Entries in the dedup cache.
    pub cache_entries: usize,
    /// Paths waiting for a decision.
    pub queue_depth: usize,
    /// Tick of the last rebuild, `None` if the next event will rebuild.
    pub last_rebuild: Option<Tick>,
    /// Whether shutdown has begun.
    pub closed: bool,
}

/// State guarded by the coordination lock.
#[derive(Debug)]
struct CoordinatorState {
    cache: DedupCache,
    last_rebuild: Option<Tick>,
    closed: bool,
}

/// Routes block events through the dedup cache into the decision queue.
pub struct EventCoordinator {
    state: Mutex<CoordinatorState>,
    queue: Arc<BoundedQueue<String>>,
    normalizer: Arc<dyn PathNormalizer>,
    rules: Arc<dyn RuleStore>,
    clock: Arc<dyn Clock>,
    config: DeduplicationConfig,
}

impl EventCoordinator {
    /// Creates a coordinator with an empty cache.
    ///
    /// The first event, or an explicit [`rebuild_cache`](Self::rebuild_cache),
    /// populates the cache from the rule store.
    #[must_use]
    pub fn new(
        config: DeduplicationConfig,
        queue: Arc<BoundedQueue<String>>,
        normalizer: Arc<dyn PathNormalizer>,
        rules: Arc<dyn RuleStore>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            state: Mutex::new(CoordinatorState {
                cache: DedupCache::new(config.bucket_count, config.max_path_len),
                last_rebuild: None,
                closed: false,
            }),
            queue,
            normalizer,
            rules,
            clock,
            config,
        }
    }

    /// Handles one raw block event.
    ///
    /// Never blocks beyond the coordination lock and never fails: every
    /// problem is reported through the returned outcome and the log.
    #[instrument(skip(self), fields(operation = "block_event"))]
    pub fn on_block_event(&self, raw_path: &str) -> EventOutcome {
        let outcome = self.process(raw_path);
        metrics::counter!("block_events_total", "outcome" => outcome.as_str()).increment(1);
        tracing::debug!(outcome = %outcome, "Block event handled");
        outcome
    }

    fn process(&self, raw_path: &str) -> EventOutcome {
        if self.is_closed() {
            return EventOutcome::Closed;
        }
        if raw_path.is_empty() {
            return EventOutcome::Rejected;
        }

        let translated = match self.normalizer.normalize(raw_path) {
            Ok(path) => path,
            Err(e) => {
                tracing::warn!(error = %e, "Failed to normalize block event path");
                return EventOutcome::Rejected;
            },
        };
        let Some(key) = PathHasher::normalize(&translated, self.config.max_path_len) else {
            tracing::warn!(length = translated.len(), "Block event path out of bounds");
            return EventOutcome::Rejected;
        };

        let mut state = self.lock();
        if state.closed {
            return EventOutcome::Closed;
        }

        let now = self.clock.now();
        let stale = state
            .last_rebuild
            .is_none_or(|last| now.saturating_sub(last) >= self.config.max_age_ms);
        if stale {
            let pruned = state.cache.prune(now, self.config.max_age_ms);
            metrics::counter!("dedup_cache_pruned_total").increment(pruned as u64);
            self.populate(&mut state, now, "age");
        }

        if state.cache.contains(&key) {
            return EventOutcome::Duplicate;
        }

        match self.queue.enqueue(key.clone()) {
            Ok(()) => {
                if !state.cache.insert_or_refresh(&key, now) {
                    tracing::warn!("Failed to cache queued path");
                }
                record_sizes(&state.cache, &self.queue);
                EventOutcome::Queued
            },
            Err(rejected) => {
                tracing::debug!(reason = %rejected.reason, "Decision queue rejected path");
                EventOutcome::Dropped
            },
        }
    }

    /// Clears the cache and repopulates it from the rule store now.
    #[instrument(skip(self), fields(operation = "rebuild_cache"))]
    pub fn rebuild_cache(&self) {
        let mut state = self.lock();
        let now = self.clock.now();
        state.cache.clear();
        self.populate(&mut state, now, "manual");
    }

    /// Forgets the last rebuild so the next event rebuilds the cache.
    ///
    /// Called when the user opens the rule editor, where rules may change
    /// behind the cache's back. Cached entries are left in place.
    pub fn invalidate(&self) {
        self.lock().last_rebuild = None;
        tracing::debug!("Dedup cache marked stale");
    }

    /// Refreshes the cache entry for a path that just received a rule.
    ///
    /// Returns false if the path could not be cached.
    pub fn record_decision(&self, path: &str) -> bool {
        let Some(key) = PathHasher::normalize(path, self.config.max_path_len) else {
            return false;
        };
        let mut state = self.lock();
        let now = self.clock.now();
        let cached = state.cache.insert_or_refresh(&key, now);
        record_sizes(&state.cache, &self.queue);
        cached
    }

    /// Begins shutdown: stops accepting events, then closes the queue.
    ///
    /// Returns true if this call performed the close.
    pub fn close(&self) -> bool {
        {
            let mut state = self.lock();
            if state.closed {
                return false;
            }
            state.closed = true;
        }
        self.queue.close();
        tracing::info!("Event coordinator closed");
        true
    }

    /// Returns true once shutdown has begun.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.lock().closed
    }

    /// Returns a point-in-time view of the coordinator.
    #[must_use]
    pub fn snapshot(&self) -> CoordinatorSnapshot {
        let state = self.lock();
        CoordinatorSnapshot {
            cache_entries: state.cache.len(),
            queue_depth: self.queue.len(),
            last_rebuild: state.last_rebuild,
            closed: state.closed,
        }
    }

    /// Returns true if the exact normalized path is cached.
    #[must_use]
    pub fn is_cached(&self, path: &str) -> bool {
        self.lock().cache.contains(path)
    }

    /// Returns the decision queue.
    #[must_use]
    pub fn queue(&self) -> &Arc<BoundedQueue<String>> {
        &self.queue
    }

    /// Returns the cache settings.
    #[must_use]
    pub const fn config(&self) -> &DeduplicationConfig {
        &self.config
    }

    /// Inserts every enumerated rule path at `now` and records the rebuild.
    ///
    /// An enumeration failure keeps whatever the cache holds; the store is
    /// tried again at the next interval.
    fn populate(&self, state: &mut CoordinatorState, now: Tick, trigger: &'static str) {
        match self.rules.enumerate() {
            Ok(paths) => {
                let total = paths.len();
                let inserted = paths
                    .iter()
                    .filter_map(|path| PathHasher::normalize(path, self.config.max_path_len))
                    .filter(|key| state.cache.insert_or_refresh(key, now))
                    .count();
                tracing::info!(trigger, total, inserted, "Dedup cache rebuilt");
            },
            Err(e) => {
                metrics::counter!("rule_store_failures_total", "operation" => "enumerate")
                    .increment(1);
                tracing::warn!(trigger, error = %e, "Failed to enumerate rules");
            },
        }
        state.last_rebuild = Some(now);
        metrics::counter!("dedup_cache_rebuilds_total", "trigger" => trigger).increment(1);
        record_sizes(&state.cache, &self.queue);
    }

    fn lock(&self) -> MutexGuard<'_, CoordinatorState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl fmt::Debug for EventCoordinator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventCoordinator")
            .field("snapshot", &self.snapshot())
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

#[allow(clippy::cast_precision_loss)]
fn record_sizes(cache: &DedupCache, queue: &BoundedQueue<String>) {
    metrics::gauge!("dedup_cache_entries").set(cache.len() as f64);
    metrics::gauge!("decision_queue_depth").set(queue.len() as f64);
}
