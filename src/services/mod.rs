//! Notifier services.
//!
//! The concurrency core of fwnotify:
//! - [`deduplication`]: path hashing and the TTL dedup cache
//! - [`BoundedQueue`]: fixed-capacity, drop-on-full decision queue
//! - [`EventCoordinator`]: per-event routing under the coordination lock
//! - [`DecisionLoop`]: the single consumer that prompts and records rules
//! - [`Notifier`]: startup, console actions and shutdown for one session

mod coordinator;
mod decision;
pub mod deduplication;
mod notifier;
mod queue;

pub use coordinator::{CoordinatorSnapshot, EventCoordinator, EventOutcome};
pub use decision::{DecisionLoop, DecisionStats};
pub use deduplication::{DedupCache, DeduplicationConfig, PathHasher};
pub use notifier::{Collaborators, DECISION_THREAD_NAME, Notifier};
pub use queue::{BoundedQueue, DEFAULT_QUEUE_CAPACITY, RejectReason, Rejected};
