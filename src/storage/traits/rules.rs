//! Rule store trait.

use crate::Result;
use crate::models::{FirewallRule, RuleAction};
use crate::services::deduplication::PathHasher;

/// Trait for firewall rule stores.
///
/// The rule store is the authoritative record of allow/block decisions and
/// of the outbound filtering switch. Implementations are shared between the
/// producer threads (cache rebuilds) and the decision thread (new rules), so
/// every method takes `&self`.
pub trait RuleStore: Send + Sync {
    /// Returns every rule in the store.
    fn rules(&self) -> Result<Vec<FirewallRule>>;

    /// Records an outbound rule for the program at `path`.
    fn add_rule(&self, path: &str, action: RuleAction) -> Result<()>;

    /// Returns true if outbound connections are blocked by default.
    fn filtering(&self) -> Result<bool>;

    /// Turns default outbound blocking on or off.
    fn set_filtering(&self, enabled: bool) -> Result<()>;

    /// Returns the case-folded paths of every cache-eligible rule.
    ///
    /// See [`FirewallRule::is_cache_eligible`].
    fn enumerate(&self) -> Result<Vec<String>> {
        Ok(self
            .rules()?
            .iter()
            .filter(|rule| rule.is_cache_eligible() && !rule.path.is_empty())
            .map(|rule| PathHasher::fold_case(&rule.path))
            .collect())
    }
}
