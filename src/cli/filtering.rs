//! Filtering CLI command.

use super::{CommandResult, output_error};
use crate::storage::RuleStore;
use std::io::Write;

/// Shows the outbound filtering state, or sets it when `enabled` is given.
///
/// # Errors
///
/// Returns an error if the store cannot be read or updated.
pub fn cmd_filtering(
    store: &dyn RuleStore,
    enabled: Option<bool>,
    out: &mut impl Write,
) -> CommandResult {
    if let Some(enabled) = enabled {
        store.set_filtering(enabled)?;
        tracing::info!(enabled, "Outbound filtering set");
    }
    let state = if store.filtering()? { "on" } else { "off" };
    writeln!(out, "Outbound filtering: {state}").map_err(output_error)
}
