//! Front-end console actions.

use std::fmt;

/// Action requested from the tray/console front end.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConsoleAction {
    /// The user opened the rule editor; cached state may go stale.
    OpenRules,
    /// Clear and rebuild the dedup cache now.
    RebuildCache,
    /// Flip outbound filtering on or off.
    ToggleFiltering,
}

impl ConsoleAction {
    /// Returns the action as a string slice.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::OpenRules => "rules",
            Self::RebuildCache => "rebuild",
            Self::ToggleFiltering => "toggle",
        }
    }

    /// Parses an action name.
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "rules" | "open-rules" => Some(Self::OpenRules),
            "rebuild" | "rebuild-cache" => Some(Self::RebuildCache),
            "toggle" | "toggle-filtering" => Some(Self::ToggleFiltering),
            _ => None,
        }
    }
}

impl fmt::Display for ConsoleAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_roundtrip() {
        for action in [
            ConsoleAction::OpenRules,
            ConsoleAction::RebuildCache,
            ConsoleAction::ToggleFiltering,
        ] {
            assert_eq!(ConsoleAction::parse(action.as_str()), Some(action));
        }
        assert_eq!(ConsoleAction::parse("Rebuild-Cache"), Some(ConsoleAction::RebuildCache));
        assert_eq!(ConsoleAction::parse("quit"), None);
    }
}
