//! Storage backend traits.

mod rules;

pub use rules::RuleStore;
