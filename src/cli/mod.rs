//! CLI command implementations.
//!
//! Each submodule implements one `fwnotify` command. Commands write to any
//! [`std::io::Write`] so they can be exercised without a terminal.
//!
//! # Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `run` | Start the notifier on an event feed |
//! | `rules list` | Show recorded rules |
//! | `rules add` | Record an allow or block rule |
//! | `filtering` | Show or set default outbound blocking |
//! | `config` | Show the effective configuration |
//!
//! # Example Usage
//!
//! ```bash
//! # Answer prompts in the terminal for events read from a file
//! fwnotify run --events blocks.txt
//!
//! # Block everything reported on stdin without asking
//! tail -f blocks.log | fwnotify run --policy block
//!
//! # Allow a program up front
//! fwnotify rules add 'C:\Tools\app.exe' --allow
//! ```

mod config;
mod filtering;
mod rules;
mod run;

pub use config::cmd_config;
pub use filtering::cmd_filtering;
pub use rules::{action_from_flags, cmd_rules_add, cmd_rules_list};
pub use run::{
    FeedEnd, FeedLine, FeedMessage, FeedSummary, RunOptions, cmd_run, drive_feed, spawn_reader,
};

use crate::{Error, Result};
use std::fmt;

/// Output format for listing commands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OutputFormat {
    /// Aligned columns.
    #[default]
    Table,
    /// Pretty-printed JSON.
    Json,
}

impl OutputFormat {
    /// Parses output format from string.
    #[must_use]
    pub fn parse(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "json" => Self::Json,
            _ => Self::Table,
        }
    }
}

impl fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Table => write!(f, "table"),
            Self::Json => write!(f, "json"),
        }
    }
}

/// Converts an output write failure.
#[allow(clippy::needless_pass_by_value)]
fn output_error(e: std::io::Error) -> Error {
    Error::operation("write_output", e)
}

/// Result alias for command output.
type CommandResult = Result<()>;
