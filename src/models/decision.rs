//! Decisions and the rule actions they produce.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Answer to a block prompt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Decision {
    /// Add an allow rule for the program.
    Allow,
    /// Add a block rule for the program.
    Block,
    /// Do nothing this time.
    #[default]
    Skip,
}

impl Decision {
    /// Returns all decisions.
    #[must_use]
    pub const fn all() -> &'static [Self] {
        &[Self::Allow, Self::Block, Self::Skip]
    }

    /// Returns the decision as a string slice.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Allow => "allow",
            Self::Block => "block",
            Self::Skip => "skip",
        }
    }

    /// Parses a decision, accepting full words or their first letter.
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "allow" | "a" => Some(Self::Allow),
            "block" | "b" => Some(Self::Block),
            "skip" | "s" => Some(Self::Skip),
            _ => None,
        }
    }

    /// Returns the rule action this decision records, or `None` for skip.
    #[must_use]
    pub const fn rule_action(&self) -> Option<RuleAction> {
        match self {
            Self::Allow => Some(RuleAction::Allow),
            Self::Block => Some(RuleAction::Block),
            Self::Skip => None,
        }
    }
}

impl fmt::Display for Decision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Action of a firewall rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RuleAction {
    /// Permit matching traffic.
    Allow,
    /// Drop matching traffic.
    Block,
}

impl RuleAction {
    /// Returns the action as a string slice.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Allow => "allow",
            Self::Block => "block",
        }
    }

    /// Returns true for [`RuleAction::Allow`].
    #[must_use]
    pub const fn is_allow(&self) -> bool {
        matches!(self, Self::Allow)
    }
}

impl From<bool> for RuleAction {
    fn from(allow: bool) -> Self {
        if allow { Self::Allow } else { Self::Block }
    }
}

impl fmt::Display for RuleAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    #[test_case("allow", Some(Decision::Allow); "allow word")]
    #[test_case("A", Some(Decision::Allow); "allow letter upper")]
    #[test_case(" block ", Some(Decision::Block); "block padded")]
    #[test_case("b", Some(Decision::Block); "block letter")]
    #[test_case("SKIP", Some(Decision::Skip); "skip upper")]
    #[test_case("s", Some(Decision::Skip); "skip letter")]
    #[test_case("maybe", None; "unknown")]
    #[test_case("", None; "empty")]
    fn test_decision_parse(input: &str, expected: Option<Decision>) {
        assert_eq!(Decision::parse(input), expected);
    }

    #[test]
    fn test_decision_roundtrips_through_as_str() {
        for decision in Decision::all() {
            assert_eq!(Decision::parse(decision.as_str()), Some(*decision));
        }
    }

    #[test]
    fn test_rule_action_mapping() {
        assert_eq!(Decision::Allow.rule_action(), Some(RuleAction::Allow));
        assert_eq!(Decision::Block.rule_action(), Some(RuleAction::Block));
        assert_eq!(Decision::Skip.rule_action(), None);
        assert!(RuleAction::from(true).is_allow());
        assert!(!RuleAction::from(false).is_allow());
    }

    #[test]
    fn test_serde_lowercase() {
        let json = serde_json::to_string(&RuleAction::Block).unwrap();
        assert_eq!(json, "\"block\"");
        let decision: Decision = serde_json::from_str("\"allow\"").unwrap();
        assert_eq!(decision, Decision::Allow);
    }
}
