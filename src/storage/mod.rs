//! Rule storage.
//!
//! The rule store is the durable record of allow/block decisions. Two
//! backends are provided:
//! - [`MemoryRuleStore`]: process-local, for tests and embedding
//! - [`FileRuleStore`]: a JSON document on disk, used by the binary

// Allow significant_drop_tightening - guards are held across short critical sections.
#![allow(clippy::significant_drop_tightening)]

mod file;
mod memory;
pub mod traits;

pub use file::FileRuleStore;
pub use memory::MemoryRuleStore;
pub use traits::RuleStore;
