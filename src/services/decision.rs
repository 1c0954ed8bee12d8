//! Decision loop.
//!
//! The single consumer of the decision queue. Each dequeued path is put to
//! the prompt; allow and block answers become rules, and the path's cache
//! entry is refreshed so it is not asked about again straight away.

use super::coordinator::EventCoordinator;
use super::queue::BoundedQueue;
use crate::prompt::DecisionPrompt;
use crate::storage::RuleStore;
use std::sync::Arc;
use tracing::instrument;

/// Counters reported when the decision loop exits.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DecisionStats {
    /// Paths put to the prompt.
    pub prompted: usize,
    /// Allow rules recorded.
    pub allowed: usize,
    /// Block rules recorded.
    pub blocked: usize,
    /// Paths skipped without a rule.
    pub skipped: usize,
    /// Prompt or rule store failures.
    pub failed: usize,
}

impl DecisionStats {
    /// Returns the number of rules recorded.
    #[must_use]
    pub const fn recorded(&self) -> usize {
        self.allowed + self.blocked
    }
}

/// Serialized consumer of the decision queue.
pub struct DecisionLoop {
    queue: Arc<BoundedQueue<String>>,
    coordinator: Arc<EventCoordinator>,
    prompt: Arc<dyn DecisionPrompt>,
    rules: Arc<dyn RuleStore>,
}

impl DecisionLoop {
    /// Creates a decision loop.
    #[must_use]
    pub fn new(
        coordinator: Arc<EventCoordinator>,
        prompt: Arc<dyn DecisionPrompt>,
        rules: Arc<dyn RuleStore>,
    ) -> Self {
        Self {
            queue: Arc::clone(coordinator.queue()),
            coordinator,
            prompt,
            rules,
        }
    }

    /// Runs until the coordinator closes.
    ///
    /// Paths still queued at close are left for the caller to discard.
    pub fn run(self) -> DecisionStats {
        let mut stats = DecisionStats::default();
        tracing::info!("Decision loop started");

        while !self.coordinator.is_closed() {
            let Some(path) = self.queue.dequeue() else {
                break;
            };
            self.decide(&path, &mut stats);
        }

        tracing::info!(
            prompted = stats.prompted,
            recorded = stats.recorded(),
            skipped = stats.skipped,
            failed = stats.failed,
            "Decision loop stopped"
        );
        stats
    }

    #[instrument(skip(self, stats), fields(operation = "decide"))]
    fn decide(&self, path: &str, stats: &mut DecisionStats) {
        stats.prompted += 1;

        let decision = match self.prompt.ask(path) {
            Ok(decision) => decision,
            Err(e) => {
                stats.failed += 1;
                tracing::warn!(error = %e, "Prompt failed");
                return;
            },
        };
        metrics::counter!("decisions_total", "decision" => decision.as_str()).increment(1);

        let Some(action) = decision.rule_action() else {
            stats.skipped += 1;
            tracing::debug!("Decision skipped");
            return;
        };

        if let Err(e) = self.rules.add_rule(path, action) {
            stats.failed += 1;
            metrics::counter!("rule_store_failures_total", "operation" => "add_rule")
                .increment(1);
            tracing::warn!(error = %e, action = %action, "Failed to record rule");
            return;
        }

        if action.is_allow() {
            stats.allowed += 1;
        } else {
            stats.blocked += 1;
        }
        if !self.coordinator.record_decision(path) {
            tracing::warn!("Failed to refresh cache after decision");
        }
        tracing::info!(action = %action, "Rule recorded");
    }
}
