//! Run CLI command.
//!
//! Reads a feed of raw block event paths, one per line, and runs a notifier
//! session over it. Lines starting with `:` are console commands:
//!
//! | Line | Effect |
//! |------|--------|
//! | `:rules` | Mark the dedup cache stale |
//! | `:rebuild` | Rebuild the dedup cache now |
//! | `:toggle` | Flip outbound filtering |
//! | `:quit` | Stop, discarding undecided paths |
//!
//! Blank lines and lines starting with `#` are ignored. At end of input the
//! session waits for queued paths to be decided before stopping. Ctrl-C stops
//! at once; a second Ctrl-C exits the process.

use super::output_error;
use crate::config::NotifierConfig;
use crate::models::{ConsoleAction, Decision};
use crate::monitor::{BlockMonitor, EventSender};
use crate::prompt::{DecisionPrompt, PolicyPrompt, TerminalPrompt};
use crate::services::{Collaborators, DecisionStats, Notifier};
use crate::storage::{FileRuleStore, RuleStore};
use crate::{Error, Result};
use std::fs::File;
use std::io::{self, BufRead, BufReader, Write};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender};
use std::thread::{self, JoinHandle};
use std::time::Duration;
use tracing::instrument;

/// Feed path meaning stdin.
pub const STDIN_FEED: &str = "-";

const IDLE_POLL: Duration = Duration::from_millis(50);

/// Options for `fwnotify run`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunOptions {
    /// Event feed file, or `-` for stdin.
    pub events: String,
    /// Answer every prompt with this decision instead of asking.
    pub policy: Option<Decision>,
}

impl Default for RunOptions {
    fn default() -> Self {
        Self {
            events: STDIN_FEED.to_string(),
            policy: None,
        }
    }
}

impl RunOptions {
    /// Returns true if events are read from stdin.
    #[must_use]
    pub fn reads_stdin(&self) -> bool {
        self.events == STDIN_FEED
    }
}

/// One parsed feed line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FeedLine {
    /// Blank line or comment.
    Blank,
    /// Raw block event path.
    Event(String),
    /// Console action.
    Console(ConsoleAction),
    /// Stop the session.
    Quit,
}

impl FeedLine {
    /// Parses a feed line.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidInput`] for an unknown `:` command.
    pub fn parse(line: &str) -> Result<Self> {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            return Ok(Self::Blank);
        }

        let Some(command) = line.strip_prefix(':') else {
            return Ok(Self::Event(line.to_string()));
        };
        match command.trim().to_lowercase().as_str() {
            "quit" | "q" | "exit" => Ok(Self::Quit),
            other => ConsoleAction::parse(other)
                .map(Self::Console)
                .ok_or_else(|| Error::InvalidInput(format!("unknown console command: :{other}"))),
        }
    }
}

/// Message from the feed reader or the interrupt handler.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FeedMessage {
    /// A line of input.
    Line(String),
    /// Input is exhausted.
    End,
    /// Ctrl-C.
    Interrupt,
}

/// Why the feed stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FeedEnd {
    /// End of input.
    Eof,
    /// A `:quit` line.
    Quit,
    /// Ctrl-C.
    Interrupted,
}

/// What a feed run did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FeedSummary {
    /// Events delivered to the monitor.
    pub events: usize,
    /// Console commands applied.
    pub commands: usize,
    /// Why the feed stopped.
    pub end: FeedEnd,
}

/// Reads lines on a background thread and forwards them to `tx`.
///
/// # Errors
///
/// Returns an error if the thread cannot be spawned.
pub fn spawn_reader<R>(reader: R, tx: Sender<FeedMessage>) -> Result<JoinHandle<()>>
where
    R: BufRead + Send + 'static,
{
    thread::Builder::new()
        .name("fwnotify-feed".to_string())
        .spawn(move || {
            for line in reader.lines() {
                match line {
                    Ok(line) => {
                        if tx.send(FeedMessage::Line(line)).is_err() {
                            return;
                        }
                    },
                    Err(e) => {
                        tracing::warn!(error = %e, "Failed to read event feed");
                        break;
                    },
                }
            }
            // The receiver may already be gone.
            let _ = tx.send(FeedMessage::End);
        })
        .map_err(|e| Error::operation("spawn_feed_reader", e))
}

/// Applies feed messages until the feed ends.
///
/// # Errors
///
/// Returns an error if output cannot be written.
pub fn drive_feed(
    rx: &Receiver<FeedMessage>,
    notifier: &Notifier,
    sender: &EventSender,
    out: &mut impl Write,
) -> Result<FeedSummary> {
    let mut summary = FeedSummary {
        events: 0,
        commands: 0,
        end: FeedEnd::Eof,
    };

    loop {
        let line = match rx.recv() {
            Ok(FeedMessage::Line(line)) => line,
            Ok(FeedMessage::End) | Err(_) => break,
            Ok(FeedMessage::Interrupt) => {
                summary.end = FeedEnd::Interrupted;
                break;
            },
        };

        match FeedLine::parse(&line) {
            Ok(FeedLine::Blank) => {},
            Ok(FeedLine::Event(path)) => {
                if !sender.deliver(path) {
                    break;
                }
                summary.events += 1;
            },
            Ok(FeedLine::Console(action)) => {
                summary.commands += 1;
                match notifier.handle_console_action(action) {
                    Ok(Some(enabled)) => {
                        let state = if enabled { "on" } else { "off" };
                        writeln!(out, "Outbound filtering: {state}").map_err(output_error)?;
                    },
                    Ok(None) => {
                        writeln!(out, "Applied :{action}").map_err(output_error)?;
                    },
                    Err(e) => {
                        tracing::warn!(action = %action, error = %e, "Console action failed");
                        writeln!(out, "Failed :{action}: {e}").map_err(output_error)?;
                    },
                }
            },
            Ok(FeedLine::Quit) => {
                summary.end = FeedEnd::Quit;
                break;
            },
            Err(e) => {
                writeln!(out, "{e}").map_err(output_error)?;
            },
        }
    }

    Ok(summary)
}

/// Runs a notifier session over an event feed.
///
/// # Errors
///
/// Returns an error if the rule store, feed, or notifier cannot be set up,
/// or if interactive prompts would compete with events for stdin.
#[instrument(skip_all, fields(operation = "run", events = %options.events))]
pub fn cmd_run(
    config: &NotifierConfig,
    options: &RunOptions,
    out: &mut impl Write,
) -> Result<DecisionStats> {
    let prompt: Arc<dyn DecisionPrompt> = match options.policy {
        Some(decision) => Arc::new(PolicyPrompt::new(decision)),
        None if options.reads_stdin() => {
            return Err(Error::InvalidInput(
                "prompts read stdin; pass --events <file> or --policy".to_string(),
            ));
        },
        None => Arc::new(TerminalPrompt::stdio()),
    };
    let reader: Box<dyn BufRead + Send> = if options.reads_stdin() {
        Box::new(BufReader::new(io::stdin()))
    } else {
        let file = File::open(&options.events).map_err(|e| {
            Error::operation("open_event_feed", format!("{}: {e}", options.events))
        })?;
        Box::new(BufReader::new(file))
    };

    let rules: Arc<dyn RuleStore> = Arc::new(FileRuleStore::open(config.rules_path()?)?);
    let collaborators =
        Collaborators::new(rules, prompt).with_normalizer(Arc::new(config.normalizer()));

    let notifier = Notifier::start(config, collaborators)?;
    let (sender, mut monitor) = BlockMonitor::start(notifier.coordinator(), config.monitor_workers)?;

    let (tx, rx) = mpsc::channel();
    install_interrupt_handler(tx.clone())?;
    spawn_reader(reader, tx)?;

    let summary = drive_feed(&rx, &notifier, &sender, out)?;
    monitor.stop();
    if summary.end == FeedEnd::Eof {
        wait_for_decisions(&notifier, &rx);
    }

    let stats = notifier.shutdown();
    writeln!(
        out,
        "Processed {} events: {} prompted, {} allowed, {} blocked, {} skipped",
        summary.events, stats.prompted, stats.allowed, stats.blocked, stats.skipped
    )
    .map_err(output_error)?;
    Ok(stats)
}

/// Waits until the decision queue is empty or Ctrl-C arrives.
fn wait_for_decisions(notifier: &Notifier, rx: &Receiver<FeedMessage>) {
    while notifier.snapshot().queue_depth > 0 {
        match rx.recv_timeout(IDLE_POLL) {
            Ok(FeedMessage::Interrupt) => return,
            Ok(_) | Err(RecvTimeoutError::Timeout) => {},
            Err(RecvTimeoutError::Disconnected) => thread::sleep(IDLE_POLL),
        }
    }
}

/// Routes Ctrl-C into the feed. A second Ctrl-C exits immediately.
fn install_interrupt_handler(tx: Sender<FeedMessage>) -> Result<()> {
    let interrupted = AtomicBool::new(false);
    let installed = ctrlc::set_handler(move || {
        if interrupted.swap(true, Ordering::SeqCst) {
            std::process::exit(130);
        }
        let _ = tx.send(FeedMessage::Interrupt);
    });

    match installed {
        Ok(()) => Ok(()),
        Err(ctrlc::Error::MultipleHandlers) => {
            tracing::debug!("Interrupt handler already installed");
            Ok(())
        },
        Err(e) => Err(Error::operation("install_interrupt_handler", e)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::models::RuleAction;
    use crate::storage::MemoryRuleStore;
    use std::io::Cursor;
    use test_case::test_case;

    #[test_case("", FeedLine::Blank ; "empty")]
    #[test_case("  # comment", FeedLine::Blank ; "comment")]
    #[test_case(r" C:\app.exe ", FeedLine::Event(r"C:\app.exe".to_string()) ; "event")]
    #[test_case(":rules", FeedLine::Console(ConsoleAction::OpenRules) ; "open rules")]
    #[test_case(":Rebuild", FeedLine::Console(ConsoleAction::RebuildCache) ; "rebuild")]
    #[test_case(": toggle", FeedLine::Console(ConsoleAction::ToggleFiltering) ; "toggle")]
    #[test_case(":quit", FeedLine::Quit ; "quit")]
    fn test_parse_feed_line(line: &str, expected: FeedLine) {
        assert_eq!(FeedLine::parse(line).unwrap(), expected);
    }

    #[test]
    fn test_unknown_command() {
        assert!(matches!(FeedLine::parse(":reboot"), Err(Error::InvalidInput(_))));
    }

    fn session() -> (Notifier, Arc<MemoryRuleStore>) {
        let rules = Arc::new(MemoryRuleStore::new());
        let collaborators = Collaborators::new(
            rules.clone(),
            Arc::new(PolicyPrompt::new(Decision::Skip)),
        )
        .with_clock(Arc::new(ManualClock::new(0)));
        (
            Notifier::start(&NotifierConfig::default(), collaborators).unwrap(),
            rules,
        )
    }

    #[test]
    fn test_drive_feed_applies_lines() {
        let (notifier, rules) = session();
        let (sender, mut monitor) = BlockMonitor::start(notifier.coordinator(), 2).unwrap();
        let (tx, rx) = mpsc::channel();
        let feed = "a.exe\n\n:toggle\n:bogus\nb.exe\n:quit\nc.exe\n";
        spawn_reader(Cursor::new(feed), tx).unwrap().join().unwrap();

        let mut out = Vec::new();
        let summary = drive_feed(&rx, &notifier, &sender, &mut out).unwrap();
        monitor.stop();

        assert_eq!(summary.events, 2);
        assert_eq!(summary.commands, 1);
        assert_eq!(summary.end, FeedEnd::Quit);
        assert!(!rules.filtering().unwrap());

        let out = String::from_utf8(out).unwrap();
        assert!(out.contains("Outbound filtering: off"));
        assert!(out.contains("unknown console command: :bogus"));
        notifier.shutdown();
    }

    #[test]
    fn test_drive_feed_interrupt() {
        let (notifier, _rules) = session();
        let (sender, _monitor) = BlockMonitor::start(notifier.coordinator(), 1).unwrap();
        let (tx, rx) = mpsc::channel();
        tx.send(FeedMessage::Line("a.exe".to_string())).unwrap();
        tx.send(FeedMessage::Interrupt).unwrap();
        tx.send(FeedMessage::Line("b.exe".to_string())).unwrap();

        let summary = drive_feed(&rx, &notifier, &sender, &mut Vec::new()).unwrap();
        assert_eq!(summary.events, 1);
        assert_eq!(summary.end, FeedEnd::Interrupted);
        notifier.shutdown();
    }

    #[test]
    fn test_stdin_prompt_conflict() {
        let config = NotifierConfig::default();
        let result = cmd_run(&config, &RunOptions::default(), &mut Vec::new());
        assert!(matches!(result, Err(Error::InvalidInput(_))));
    }

    #[test]
    fn test_run_over_file_feed() {
        let dir = tempfile::TempDir::new().unwrap();
        let events = dir.path().join("events.txt");
        std::fs::write(&events, "one.exe\nONE.exe\ntwo.exe\n").unwrap();
        let config = NotifierConfig::default()
            .with_rules_path(dir.path().join("rules.json"))
            .with_queue_capacity(8);
        let options = RunOptions {
            events: events.display().to_string(),
            policy: Some(Decision::Block),
        };

        let mut out = Vec::new();
        let stats = cmd_run(&config, &options, &mut out).unwrap();

        assert_eq!(stats.blocked, 2);
        let store = FileRuleStore::open(dir.path().join("rules.json")).unwrap();
        assert!(store.filtering().unwrap());
        let rules = store.rules().unwrap();
        assert_eq!(rules.len(), 2);
        assert!(rules.iter().all(|rule| rule.action == RuleAction::Block));
        assert!(String::from_utf8(out).unwrap().contains("Processed 3 events"));
    }
}
