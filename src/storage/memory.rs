//! In-memory rule store.
//!
//! Holds rules for the lifetime of the process.

use super::traits::RuleStore;
use crate::models::{FirewallRule, RuleAction};
use crate::{Error, Result};
use std::sync::RwLock;
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::instrument;

/// Process-local rule store.
#[derive(Debug, Default)]
pub struct MemoryRuleStore {
    rules: RwLock<Vec<FirewallRule>>,
    filtering: AtomicBool,
}

impl MemoryRuleStore {
    /// Creates an empty store with filtering off.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a store pre-populated with rules.
    #[must_use]
    pub fn with_rules(rules: Vec<FirewallRule>) -> Self {
        Self {
            rules: RwLock::new(rules),
            filtering: AtomicBool::new(false),
        }
    }

    /// Inserts an arbitrary rule.
    ///
    /// # Errors
    ///
    /// Returns an error if the rule lock is poisoned.
    pub fn insert(&self, rule: FirewallRule) -> Result<()> {
        self.rules
            .write()
            .map_err(|e| Error::operation("memory_rules_write", e))?
            .push(rule);
        Ok(())
    }

    /// Returns the number of stored rules.
    #[must_use]
    pub fn len(&self) -> usize {
        self.rules.read().map(|rules| rules.len()).unwrap_or(0)
    }

    /// Returns true if no rules are stored.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl RuleStore for MemoryRuleStore {
    fn rules(&self) -> Result<Vec<FirewallRule>> {
        Ok(self
            .rules
            .read()
            .map_err(|e| Error::operation("memory_rules_read", e))?
            .clone())
    }

    #[instrument(skip(self), fields(operation = "add_rule", backend = "memory"))]
    fn add_rule(&self, path: &str, action: RuleAction) -> Result<()> {
        if path.is_empty() {
            return Err(Error::InvalidInput("rule path is empty".to_string()));
        }
        self.insert(FirewallRule::outbound(path, action))
    }

    fn filtering(&self) -> Result<bool> {
        Ok(self.filtering.load(Ordering::SeqCst))
    }

    fn set_filtering(&self, enabled: bool) -> Result<()> {
        self.filtering.store(enabled, Ordering::SeqCst);
        Ok(())
    }
}
