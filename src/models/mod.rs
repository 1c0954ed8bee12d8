//! Data models for fwnotify.

mod console;
mod decision;
mod rule;

pub use console::ConsoleAction;
pub use decision::{Decision, RuleAction};
pub use rule::{FirewallRule, RuleDirection};
