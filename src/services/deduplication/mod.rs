//! Deduplication of block events.
//!
//! Repeated blocks of the same program are collapsed by a time-aware cache
//! keyed on the case-folded path:
//!
//! ```text
//! ┌─────────────────────────────────────────────────────┐
//! │                     DedupCache                      │
//! │  bucket[fnv1a(path) % 2053] → [entry, entry, ...]   │
//! │  entry = (normalized path, last_seen tick)          │
//! │                                                     │
//! │  prune(now, max_age)   clear()   insert_or_refresh  │
//! └─────────────────────────────────────────────────────┘
//! ```
//!
//! `PathHasher` supplies the hashing, case folding, and bounded copies the
//! cache is built on.

mod cache;
mod config;
mod hasher;

pub use cache::{DEFAULT_BUCKET_COUNT, DEFAULT_MAX_PATH_LEN, DedupCache};
pub use config::{DEFAULT_CACHE_MAX_AGE_MS, DeduplicationConfig};
pub use hasher::PathHasher;
