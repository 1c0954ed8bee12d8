//! Config CLI command.

use super::{CommandResult, output_error};
use crate::config::NotifierConfig;
use std::io::Write;

/// Shows the effective configuration.
///
/// # Errors
///
/// Returns an error if the configuration cannot be rendered or written.
pub fn cmd_config(config: &NotifierConfig, show: bool, out: &mut impl Write) -> CommandResult {
    if !show {
        writeln!(out, "Use --show to display configuration").map_err(output_error)?;
        return match &config.source {
            Some(path) => writeln!(out, "Loaded from: {}", path.display()),
            None => writeln!(out, "Using built-in defaults"),
        }
        .map_err(output_error);
    }

    writeln!(out, "# Current configuration").map_err(output_error)?;
    if let Some(path) = &config.source {
        writeln!(out, "# Source: {}", path.display()).map_err(output_error)?;
    }
    write!(out, "{}", config.to_toml()?).map_err(output_error)
}
