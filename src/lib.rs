//! # fwnotify
//!
//! Outbound firewall block notifier.
//!
//! fwnotify listens for outbound connections dropped by the packet filter,
//! deduplicates repeated blocks of the same program, and asks a single
//! decision point whether the program should be allowed, blocked, or
//! skipped. Decisions are recorded as firewall rules.
//!
//! ## Architecture
//!
//! ```text
//!  producer threads            coordination lock            decision thread
//! ┌──────────────┐   ┌──────────────────────────────────┐   ┌──────────────┐
//! │ BlockMonitor │──▶│ EventCoordinator                 │   │ DecisionLoop │
//! │  dispatchers │   │  normalize → age → dedup → queue │──▶│ prompt, rule │
//! └──────────────┘   │  DedupCache (chained, TTL)       │◀──│ record       │
//!                    └──────────────────────────────────┘   └──────────────┘
//!                                  │ BoundedQueue (own lock + condvar)
//! ```
//!
//! ## Example
//!
//! ```rust,ignore
//! use fwnotify::{Notifier, NotifierConfig};
//!
//! let notifier = Notifier::start(&NotifierConfig::default(), collaborators)?;
//! notifier.coordinator().on_block_event(r"\device\harddiskvolume2\tools\app.exe");
//! let stats = notifier.shutdown();
//! ```

#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]
#![warn(missing_docs)]
#![forbid(unsafe_code)]
#![allow(clippy::multiple_crate_versions)]

use thiserror::Error as ThisError;

// Module declarations
pub mod cli;
pub mod clock;
pub mod config;
pub mod models;
pub mod monitor;
pub mod observability;
pub mod path;
pub mod prompt;
pub mod services;
pub mod storage;

// Re-exports for convenience
pub use clock::{Clock, ManualClock, MonotonicClock, Tick};
pub use config::NotifierConfig;
pub use models::{ConsoleAction, Decision, FirewallRule, RuleAction, RuleDirection};
pub use monitor::{BlockMonitor, EventSender};
pub use path::{DevicePathNormalizer, IdentityNormalizer, PathNormalizer};
pub use prompt::{DecisionPrompt, PolicyPrompt, TerminalPrompt};
pub use services::{
    BoundedQueue, Collaborators, CoordinatorSnapshot, DecisionLoop, DecisionStats, DedupCache,
    EventCoordinator, EventOutcome, Notifier, RejectReason, Rejected,
};
pub use storage::{FileRuleStore, MemoryRuleStore, RuleStore};

/// Error type for fwnotify operations.
///
/// # Error Variant Triggers
///
/// | Variant | Raised When |
/// |---------|-------------|
/// | `InvalidInput` | Empty paths, unmapped device paths, malformed console commands |
/// | `OperationFailed` | Rule store I/O, path translation, prompt I/O, config parsing |
/// | `Closed` | A component is used after the notifier shut down |
#[derive(Debug, ThisError)]
pub enum Error {
    /// Invalid input was provided.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// An operation failed.
    ///
    /// Raised when:
    /// - The rule file cannot be read, parsed, or written
    /// - The terminal prompt cannot read or write
    /// - Observability is initialized twice
    #[error("operation '{operation}' failed: {cause}")]
    OperationFailed {
        /// The operation that failed.
        operation: String,
        /// The underlying cause.
        cause: String,
    },

    /// The notifier has been shut down.
    #[error("notifier is shut down")]
    Closed,
}

impl Error {
    /// Builds an [`Error::OperationFailed`] from an operation name and any displayable cause.
    pub fn operation(operation: &str, cause: impl std::fmt::Display) -> Self {
        Self::OperationFailed {
            operation: operation.to_string(),
            cause: cause.to_string(),
        }
    }
}

/// Result type alias for fwnotify operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Returns the current Unix timestamp in seconds.
///
/// Falls back to 0 if the system clock is before the Unix epoch.
#[must_use]
pub fn current_timestamp() -> u64 {
    use std::time::{SystemTime, UNIX_EPOCH};
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}
