//! Binary entry point for fwnotify.
//!
//! This binary provides the CLI interface for the outbound block notifier.

#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(missing_docs)]
// Allow print_stderr in main binary for CLI output
#![allow(clippy::print_stderr)]
// Allow needless_pass_by_value for command functions
#![allow(clippy::needless_pass_by_value)]
// Allow multiple crate versions from transitive dependencies
#![allow(clippy::multiple_crate_versions)]

use clap::{Parser, Subcommand};
use fwnotify::cli::{
    OutputFormat, RunOptions, action_from_flags, cmd_config, cmd_filtering, cmd_rules_add,
    cmd_rules_list, cmd_run,
};
use fwnotify::config::NotifierConfig;
use fwnotify::observability::{self, ObservabilityConfig};
use fwnotify::storage::FileRuleStore;
use fwnotify::{Decision, Error};
use std::io;
use std::path::Path;
use std::process::ExitCode;

/// fwnotify - Ask once about every program the firewall blocks.
#[derive(Parser)]
#[command(name = "fwnotify")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Enable verbose output.
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Path to configuration file.
    #[arg(short, long, global = true)]
    config: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

/// Available commands.
#[derive(Subcommand)]
enum Commands {
    /// Run the notifier on a feed of blocked program paths.
    Run {
        /// Event feed file, or `-` for stdin.
        #[arg(short, long, default_value = "-")]
        events: String,

        /// Answer every prompt with allow, block, or skip.
        #[arg(short, long)]
        policy: Option<String>,
    },

    /// Manage firewall rules.
    Rules {
        /// Rules subcommand.
        #[command(subcommand)]
        action: RulesAction,
    },

    /// Show or set default outbound blocking.
    Filtering {
        /// `on` or `off`.
        #[arg(value_parser = ["on", "off"])]
        state: Option<String>,
    },

    /// Manage configuration.
    Config {
        /// Show current configuration.
        #[arg(long)]
        show: bool,
    },
}

/// Rules subcommands.
#[derive(Subcommand)]
enum RulesAction {
    /// List recorded rules.
    List {
        /// Output format: table or json.
        #[arg(short, long, default_value = "table")]
        format: String,
    },

    /// Record a rule for a program.
    Add {
        /// Program path.
        path: String,

        /// Allow outbound connections.
        #[arg(long, conflicts_with = "block")]
        allow: bool,

        /// Block outbound connections.
        #[arg(long)]
        block: bool,
    },
}

/// Main entry point.
fn main() -> ExitCode {
    // A missing .env file is not an error.
    let _ = dotenvy::dotenv();

    let cli = Cli::parse();

    let config = match load_config(cli.config.as_deref()) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Failed to load configuration: {e}");
            return ExitCode::FAILURE;
        },
    };

    let _observability =
        match observability::init(ObservabilityConfig::from_config(&config, cli.verbose)) {
            Ok(handle) => handle,
            Err(e) => {
                eprintln!("Failed to initialize observability: {e}");
                return ExitCode::FAILURE;
            },
        };

    match run_command(cli, &config) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {e}");
            ExitCode::FAILURE
        },
    }
}

/// Runs the selected command.
fn run_command(cli: Cli, config: &NotifierConfig) -> Result<(), Box<dyn std::error::Error>> {
    // Not locked: the terminal prompt writes to stdout from the decision thread.
    let mut out = io::stdout();

    match cli.command {
        Commands::Run { events, policy } => {
            let policy = policy.as_deref().map(parse_policy).transpose()?;
            cmd_run(config, &RunOptions { events, policy }, &mut out)?;
            Ok(())
        },

        Commands::Rules { action } => {
            let store = FileRuleStore::open(config.rules_path()?)?;
            match action {
                RulesAction::List { format } => {
                    cmd_rules_list(&store, OutputFormat::parse(&format), &mut out)?;
                },
                RulesAction::Add { path, allow, block } => {
                    let action = action_from_flags(allow, block)?;
                    cmd_rules_add(&store, &path, action, &mut out)?;
                },
            }
            Ok(())
        },

        Commands::Filtering { state } => {
            let store = FileRuleStore::open(config.rules_path()?)?;
            cmd_filtering(&store, state.map(|s| s == "on"), &mut out)?;
            Ok(())
        },

        Commands::Config { show } => {
            cmd_config(config, show, &mut out)?;
            Ok(())
        },
    }
}

/// Parses a `--policy` value.
fn parse_policy(value: &str) -> Result<Decision, Error> {
    Decision::parse(value)
        .ok_or_else(|| Error::InvalidInput(format!("unknown policy: {value} (allow, block, skip)")))
}

/// Loads configuration.
fn load_config(path: Option<&str>) -> Result<NotifierConfig, Box<dyn std::error::Error>> {
    // If a path is provided, load from that file
    if let Some(config_path) = path {
        return Ok(NotifierConfig::load_from_file(Path::new(config_path))?.with_env_overrides());
    }

    // Environment override for config path
    if let Ok(config_path) = std::env::var("FWNOTIFY_CONFIG_PATH")
        && !config_path.trim().is_empty()
    {
        return Ok(NotifierConfig::load_from_file(Path::new(&config_path))?.with_env_overrides());
    }

    // Otherwise, load from default location
    Ok(NotifierConfig::load_default().with_env_overrides())
}
