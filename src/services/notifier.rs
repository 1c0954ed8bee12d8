//! Notifier subsystem.
//!
//! Owns the dedup cache, the decision queue and the decision thread for the
//! lifetime of one notifier session.
//!
//! # Startup
//!
//! 1. Build the queue and the [`EventCoordinator`]
//! 2. Turn outbound filtering on (a failure is logged, not fatal)
//! 3. Populate the dedup cache from the rule store
//! 4. Spawn the `fwnotify-decision` thread
//!
//! # Shutdown
//!
//! [`Notifier::shutdown`] closes the coordinator (closed flag first, then the
//! queue), joins the decision thread, and discards whatever is still queued.

use super::coordinator::{CoordinatorSnapshot, EventCoordinator};
use super::decision::{DecisionLoop, DecisionStats};
use super::queue::BoundedQueue;
use crate::clock::{Clock, MonotonicClock};
use crate::config::NotifierConfig;
use crate::models::ConsoleAction;
use crate::path::{IdentityNormalizer, PathNormalizer};
use crate::prompt::DecisionPrompt;
use crate::storage::RuleStore;
use crate::{Error, Result};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use tracing::instrument;

/// Name of the decision thread.
pub const DECISION_THREAD_NAME: &str = "fwnotify-decision";

/// External collaborators a notifier talks to.
#[derive(Clone)]
pub struct Collaborators {
    /// Translates raw event paths.
    pub normalizer: Arc<dyn PathNormalizer>,
    /// Authoritative rule store.
    pub rules: Arc<dyn RuleStore>,
    /// Asks for decisions.
    pub prompt: Arc<dyn DecisionPrompt>,
    /// Tick source.
    pub clock: Arc<dyn Clock>,
}

impl Collaborators {
    /// Creates collaborators with pass-through paths and a monotonic clock.
    #[must_use]
    pub fn new(rules: Arc<dyn RuleStore>, prompt: Arc<dyn DecisionPrompt>) -> Self {
        Self {
            normalizer: Arc::new(IdentityNormalizer),
            rules,
            prompt,
            clock: Arc::new(MonotonicClock::new()),
        }
    }

    /// Sets the path normalizer.
    #[must_use]
    pub fn with_normalizer(mut self, normalizer: Arc<dyn PathNormalizer>) -> Self {
        self.normalizer = normalizer;
        self
    }

    /// Sets the clock.
    #[must_use]
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }
}

/// A running notifier session.
pub struct Notifier {
    coordinator: Arc<EventCoordinator>,
    rules: Arc<dyn RuleStore>,
    decision_thread: Option<JoinHandle<DecisionStats>>,
}

impl Notifier {
    /// Starts a notifier session.
    ///
    /// # Errors
    ///
    /// Returns an error if the decision thread cannot be spawned.
    #[instrument(skip_all, fields(operation = "notifier_start"))]
    pub fn start(config: &NotifierConfig, collaborators: Collaborators) -> Result<Self> {
        let Collaborators {
            normalizer,
            rules,
            prompt,
            clock,
        } = collaborators;

        let queue = Arc::new(BoundedQueue::new(config.queue_capacity));
        let coordinator = Arc::new(EventCoordinator::new(
            config.dedup(),
            queue,
            normalizer,
            Arc::clone(&rules),
            clock,
        ));

        if let Err(e) = rules.set_filtering(true) {
            metrics::counter!("rule_store_failures_total", "operation" => "set_filtering")
                .increment(1);
            tracing::warn!(error = %e, "Failed to enable outbound filtering");
        }

        coordinator.rebuild_cache();

        let decision_loop = DecisionLoop::new(Arc::clone(&coordinator), prompt, Arc::clone(&rules));
        let handle = thread::Builder::new()
            .name(DECISION_THREAD_NAME.to_string())
            .spawn(move || decision_loop.run())
            .map_err(|e| Error::operation("spawn_decision_thread", e))?;

        tracing::info!(
            queue_capacity = config.queue_capacity,
            cache_max_age_ms = config.cache_max_age_ms,
            "Notifier started"
        );

        Ok(Self {
            coordinator,
            rules,
            decision_thread: Some(handle),
        })
    }

    /// Returns the coordinator handle producers deliver events to.
    #[must_use]
    pub fn coordinator(&self) -> Arc<EventCoordinator> {
        Arc::clone(&self.coordinator)
    }

    /// Returns a point-in-time view of the session.
    #[must_use]
    pub fn snapshot(&self) -> CoordinatorSnapshot {
        self.coordinator.snapshot()
    }

    /// Applies a console action.
    ///
    /// Returns the new filtering state for [`ConsoleAction::ToggleFiltering`]
    /// and `None` for the other actions.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Closed`] after shutdown has begun, or the rule
    /// store's error if filtering cannot be read or changed.
    #[instrument(skip(self), fields(operation = "console_action", action = %action))]
    pub fn handle_console_action(&self, action: ConsoleAction) -> Result<Option<bool>> {
        if self.coordinator.is_closed() {
            return Err(Error::Closed);
        }

        match action {
            ConsoleAction::OpenRules => {
                self.coordinator.invalidate();
                Ok(None)
            },
            ConsoleAction::RebuildCache => {
                self.coordinator.rebuild_cache();
                Ok(None)
            },
            ConsoleAction::ToggleFiltering => {
                let enabled = !self.rules.filtering()?;
                self.rules.set_filtering(enabled)?;
                tracing::info!(enabled, "Outbound filtering toggled");
                Ok(Some(enabled))
            },
        }
    }

    /// Stops the session and returns the decision loop's counters.
    ///
    /// Blocks until a prompt in progress is answered.
    pub fn shutdown(mut self) -> DecisionStats {
        self.stop()
    }

    fn stop(&mut self) -> DecisionStats {
        self.coordinator.close();

        let stats = match self.decision_thread.take().map(JoinHandle::join) {
            Some(Ok(stats)) => stats,
            Some(Err(_)) => {
                tracing::error!("Decision thread panicked");
                DecisionStats::default()
            },
            None => DecisionStats::default(),
        };

        let discarded = self.coordinator.queue().drain();
        if !discarded.is_empty() {
            tracing::info!(count = discarded.len(), "Discarded undecided paths at shutdown");
        }
        stats
    }
}

impl Drop for Notifier {
    fn drop(&mut self) {
        if self.decision_thread.is_some() {
            self.stop();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::models::{Decision, RuleAction};
    use crate::prompt::PolicyPrompt;
    use crate::services::coordinator::EventOutcome;
    use crate::storage::MemoryRuleStore;
    use std::time::{Duration, Instant};

    fn start(decision: Decision) -> (Notifier, Arc<MemoryRuleStore>) {
        let rules = Arc::new(MemoryRuleStore::new());
        rules.add_rule("known.exe", RuleAction::Allow).unwrap();
        let collaborators = Collaborators::new(
            rules.clone(),
            Arc::new(PolicyPrompt::new(decision)),
        )
        .with_clock(Arc::new(ManualClock::new(0)));
        let notifier = Notifier::start(&NotifierConfig::default(), collaborators).unwrap();
        (notifier, rules)
    }

    fn wait_for(mut done: impl FnMut() -> bool) {
        let deadline = Instant::now() + Duration::from_secs(5);
        while !done() {
            assert!(Instant::now() < deadline, "condition not reached");
            thread::sleep(Duration::from_millis(5));
        }
    }

    #[test]
    fn test_start_enables_filtering_and_builds_cache() {
        let (notifier, rules) = start(Decision::Skip);
        assert!(rules.filtering().unwrap());

        let snapshot = notifier.snapshot();
        assert_eq!(snapshot.cache_entries, 1);
        assert_eq!(snapshot.last_rebuild, Some(0));
        assert_eq!(
            notifier.coordinator().on_block_event("known.exe"),
            EventOutcome::Duplicate
        );
        notifier.shutdown();
    }

    #[test]
    fn test_decisions_become_rules() {
        let (notifier, rules) = start(Decision::Block);
        let coordinator = notifier.coordinator();
        assert_eq!(coordinator.on_block_event("new.exe"), EventOutcome::Queued);

        wait_for(|| rules.len() == 2);
        let stats = notifier.shutdown();
        assert_eq!(stats.blocked, 1);
        assert_eq!(rules.rules().unwrap()[1].action, RuleAction::Block);
    }

    #[test]
    fn test_console_actions() {
        let (notifier, rules) = start(Decision::Skip);

        assert_eq!(
            notifier.handle_console_action(ConsoleAction::ToggleFiltering).unwrap(),
            Some(false)
        );
        assert!(!rules.filtering().unwrap());

        notifier.handle_console_action(ConsoleAction::OpenRules).unwrap();
        assert_eq!(notifier.snapshot().last_rebuild, None);

        notifier.handle_console_action(ConsoleAction::RebuildCache).unwrap();
        assert_eq!(notifier.snapshot().last_rebuild, Some(0));
        notifier.shutdown();
    }

    #[test]
    fn test_console_action_after_close() {
        let (notifier, _rules) = start(Decision::Skip);
        notifier.coordinator().close();
        assert!(matches!(
            notifier.handle_console_action(ConsoleAction::RebuildCache),
            Err(Error::Closed)
        ));
        notifier.shutdown();
    }

    #[test]
    fn test_events_rejected_after_shutdown() {
        let (notifier, _rules) = start(Decision::Skip);
        let coordinator = notifier.coordinator();
        notifier.shutdown();
        assert_eq!(coordinator.on_block_event("late.exe"), EventOutcome::Closed);
        assert!(coordinator.queue().is_empty());
    }
}
