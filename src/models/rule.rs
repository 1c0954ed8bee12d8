//! Firewall rule records.

use super::decision::RuleAction;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Traffic direction a rule applies to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RuleDirection {
    /// Inbound connections.
    In,
    /// Outbound connections.
    #[default]
    Out,
}

impl RuleDirection {
    /// Returns the direction as a string slice.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::In => "in",
            Self::Out => "out",
        }
    }
}

impl fmt::Display for RuleDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A firewall rule bound to a program path.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FirewallRule {
    /// Display name. Rules created from prompts are named after the path.
    pub name: String,
    /// Program path the rule applies to.
    pub path: String,
    /// Allow or block.
    pub action: RuleAction,
    /// Traffic direction.
    #[serde(default)]
    pub direction: RuleDirection,
    /// Whether the rule is active.
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    /// Local port filter; `None` or `"*"` means every port.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub local_ports: Option<String>,
    /// Creation time (Unix seconds).
    #[serde(default)]
    pub created_at: u64,
}

const fn default_enabled() -> bool {
    true
}

impl FirewallRule {
    /// Creates an enabled outbound rule for every port, named after the path.
    #[must_use]
    pub fn outbound(path: impl Into<String>, action: RuleAction) -> Self {
        let path = path.into();
        Self {
            name: path.clone(),
            path,
            action,
            direction: RuleDirection::Out,
            enabled: true,
            local_ports: None,
            created_at: crate::current_timestamp(),
        }
    }

    /// Sets the direction.
    #[must_use]
    pub const fn with_direction(mut self, direction: RuleDirection) -> Self {
        self.direction = direction;
        self
    }

    /// Sets the enabled flag.
    #[must_use]
    pub const fn with_enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }

    /// Sets the local port filter.
    #[must_use]
    pub fn with_local_ports(mut self, ports: impl Into<String>) -> Self {
        self.local_ports = Some(ports.into());
        self
    }

    /// Returns true if the rule covers every local port.
    #[must_use]
    pub fn covers_all_ports(&self) -> bool {
        self.local_ports
            .as_deref()
            .is_none_or(|ports| ports.trim() == "*")
    }

    /// Returns true if the rule should seed the dedup cache.
    ///
    /// That holds for enabled outbound rules that either block, or allow on
    /// every port. A port-restricted allow still lets other ports get
    /// blocked, so its program must stay promptable.
    #[must_use]
    pub fn is_cache_eligible(&self) -> bool {
        self.enabled
            && self.direction == RuleDirection::Out
            && match self.action {
                RuleAction::Block => true,
                RuleAction::Allow => self.covers_all_ports(),
            }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const PATH: &str = r"c:\tools\app.exe";

    #[test]
    fn test_outbound_defaults() {
        let rule = FirewallRule::outbound(PATH, RuleAction::Allow);
        assert_eq!(rule.name, PATH);
        assert_eq!(rule.direction, RuleDirection::Out);
        assert!(rule.enabled);
        assert!(rule.covers_all_ports());
        assert!(rule.is_cache_eligible());
    }

    #[test]
    fn test_inbound_not_eligible() {
        let rule =
            FirewallRule::outbound(PATH, RuleAction::Block).with_direction(RuleDirection::In);
        assert!(!rule.is_cache_eligible());
    }

    #[test]
    fn test_disabled_not_eligible() {
        let rule = FirewallRule::outbound(PATH, RuleAction::Block).with_enabled(false);
        assert!(!rule.is_cache_eligible());
    }

    #[test]
    fn test_port_restricted_allow_not_eligible() {
        let rule = FirewallRule::outbound(PATH, RuleAction::Allow).with_local_ports("443");
        assert!(!rule.is_cache_eligible());

        let wildcard = FirewallRule::outbound(PATH, RuleAction::Allow).with_local_ports("*");
        assert!(wildcard.is_cache_eligible());
    }

    #[test]
    fn test_port_restricted_block_eligible() {
        let rule = FirewallRule::outbound(PATH, RuleAction::Block).with_local_ports("80");
        assert!(rule.is_cache_eligible());
    }

    #[test]
    fn test_deserialize_fills_defaults() {
        let rule: FirewallRule =
            serde_json::from_str(r#"{"name":"x","path":"c:\\x.exe","action":"block"}"#).unwrap();
        assert!(rule.enabled);
        assert_eq!(rule.direction, RuleDirection::Out);
        assert_eq!(rule.local_ports, None);
        assert_eq!(rule.created_at, 0);
    }
}
