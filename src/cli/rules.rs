//! Rules CLI commands.

use super::{CommandResult, OutputFormat, output_error};
use crate::models::{FirewallRule, RuleAction};
use crate::storage::RuleStore;
use crate::{Error, Result};
use chrono::DateTime;
use std::io::Write;

/// Lists every recorded rule.
///
/// # Errors
///
/// Returns an error if the store cannot be read or output cannot be written.
pub fn cmd_rules_list(
    store: &dyn RuleStore,
    format: OutputFormat,
    out: &mut impl Write,
) -> CommandResult {
    let rules = store.rules()?;

    match format {
        OutputFormat::Json => {
            let json = serde_json::to_string_pretty(&rules)
                .map_err(|e| Error::operation("serialize_rules", e))?;
            writeln!(out, "{json}").map_err(output_error)
        },
        OutputFormat::Table => print_rules_table(&rules, out),
    }
}

/// Records a rule for `path`.
///
/// # Errors
///
/// Returns an error if the path is empty or the store rejects the rule.
pub fn cmd_rules_add(
    store: &dyn RuleStore,
    path: &str,
    action: RuleAction,
    out: &mut impl Write,
) -> CommandResult {
    let path = path.trim();
    if path.is_empty() {
        return Err(Error::InvalidInput("rule path is empty".to_string()));
    }
    store.add_rule(path, action)?;
    writeln!(out, "Recorded {action} rule for {path}").map_err(output_error)
}

fn print_rules_table(rules: &[FirewallRule], out: &mut impl Write) -> CommandResult {
    if rules.is_empty() {
        return writeln!(out, "No rules found.").map_err(output_error);
    }

    writeln!(
        out,
        "{:<6} {:<4} {:<8} {:<17} PATH",
        "ACTION", "DIR", "ENABLED", "CREATED"
    )
    .map_err(output_error)?;
    writeln!(out, "{}", "-".repeat(80)).map_err(output_error)?;

    for rule in rules {
        writeln!(
            out,
            "{:<6} {:<4} {:<8} {:<17} {}",
            rule.action.as_str(),
            rule.direction.as_str(),
            if rule.enabled { "yes" } else { "no" },
            format_created(rule.created_at),
            rule.path
        )
        .map_err(output_error)?;
    }

    writeln!(out).map_err(output_error)?;
    writeln!(out, "Total: {} rules", rules.len()).map_err(output_error)
}

fn format_created(created_at: u64) -> String {
    i64::try_from(created_at)
        .ok()
        .and_then(|secs| DateTime::from_timestamp(secs, 0))
        .map_or_else(|| "-".to_string(), |at| at.format("%Y-%m-%d %H:%M").to_string())
}

/// Parses the `--allow`/`--block` pair into an action.
///
/// # Errors
///
/// Returns an error unless exactly one flag is set.
pub fn action_from_flags(allow: bool, block: bool) -> Result<RuleAction> {
    match (allow, block) {
        (true, false) => Ok(RuleAction::Allow),
        (false, true) => Ok(RuleAction::Block),
        _ => Err(Error::InvalidInput(
            "exactly one of --allow or --block is required".to_string(),
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryRuleStore;

    #[test]
    fn test_list_empty() {
        let mut out = Vec::new();
        cmd_rules_list(&MemoryRuleStore::new(), OutputFormat::Table, &mut out).unwrap();
        assert_eq!(String::from_utf8(out).unwrap(), "No rules found.\n");
    }

    #[test]
    fn test_add_then_list_table() {
        let store = MemoryRuleStore::new();
        let mut out = Vec::new();
        cmd_rules_add(&store, r"  C:\Tools\app.exe ", RuleAction::Block, &mut out).unwrap();

        let mut table = Vec::new();
        cmd_rules_list(&store, OutputFormat::Table, &mut table).unwrap();
        let table = String::from_utf8(table).unwrap();
        assert!(table.contains(r"block  out  yes"));
        assert!(table.contains(r"C:\Tools\app.exe"));
        assert!(table.contains("Total: 1 rules"));
    }

    #[test]
    fn test_list_json() {
        let store = MemoryRuleStore::new();
        store.add_rule("a.exe", RuleAction::Allow).unwrap();
        let mut out = Vec::new();
        cmd_rules_list(&store, OutputFormat::Json, &mut out).unwrap();

        let parsed: Vec<FirewallRule> = serde_json::from_slice(&out).unwrap();
        assert_eq!(parsed.len(), 1);
        assert_eq!(parsed[0].action, RuleAction::Allow);
    }

    #[test]
    fn test_add_rejects_blank() {
        let mut out = Vec::new();
        assert!(cmd_rules_add(&MemoryRuleStore::new(), "  ", RuleAction::Allow, &mut out).is_err());
    }

    #[test]
    fn test_action_from_flags() {
        assert_eq!(action_from_flags(true, false).unwrap(), RuleAction::Allow);
        assert_eq!(action_from_flags(false, true).unwrap(), RuleAction::Block);
        assert!(action_from_flags(true, true).is_err());
        assert!(action_from_flags(false, false).is_err());
    }

    #[test]
    fn test_format_created() {
        assert_eq!(format_created(0), "1970-01-01 00:00");
        assert_eq!(format_created(u64::MAX), "-");
    }
}
