//! Decision prompts.
//!
//! The decision loop asks a [`DecisionPrompt`] what to do about each newly
//! blocked program. [`TerminalPrompt`] asks a person over any reader/writer
//! pair; [`PolicyPrompt`] answers unattended.

use crate::models::Decision;
use crate::{Error, Result};
use std::io::{self, BufRead, BufReader, Stdin, Stdout, Write};
use std::sync::{Mutex, PoisonError};
use tracing::instrument;

/// Number of times an unrecognised answer is re-asked before skipping.
pub const MAX_ATTEMPTS: usize = 3;

/// Obtains an allow/block/skip decision for a path.
pub trait DecisionPrompt: Send + Sync {
    /// Asks for a decision about `path`. May block for as long as the user
    /// takes to answer.
    ///
    /// # Errors
    ///
    /// Returns an error if the prompt surface fails. The path is then
    /// treated as unanswered.
    fn ask(&self, path: &str) -> Result<Decision>;
}

/// Answers every prompt with the same decision.
#[derive(Debug, Clone, Copy, Default)]
pub struct PolicyPrompt {
    decision: Decision,
}

impl PolicyPrompt {
    /// Creates a prompt that always answers `decision`.
    #[must_use]
    pub const fn new(decision: Decision) -> Self {
        Self { decision }
    }

    /// Returns the fixed decision.
    #[must_use]
    pub const fn decision(&self) -> Decision {
        self.decision
    }
}

impl DecisionPrompt for PolicyPrompt {
    fn ask(&self, _path: &str) -> Result<Decision> {
        Ok(self.decision)
    }
}

struct PromptIo<R, W> {
    input: R,
    output: W,
}

/// Line-oriented interactive prompt.
///
/// Reaching end of input answers [`Decision::Skip`].
pub struct TerminalPrompt<R, W> {
    io: Mutex<PromptIo<R, W>>,
}

impl TerminalPrompt<BufReader<Stdin>, Stdout> {
    /// Creates a prompt on the process's stdin and stdout.
    #[must_use]
    pub fn stdio() -> Self {
        Self::new(BufReader::new(io::stdin()), io::stdout())
    }
}

impl<R, W> TerminalPrompt<R, W>
where
    R: BufRead + Send,
    W: Write + Send,
{
    /// Creates a prompt over the given input and output.
    pub const fn new(input: R, output: W) -> Self {
        Self {
            io: Mutex::new(PromptIo { input, output }),
        }
    }

    /// Consumes the prompt and returns its input and output.
    pub fn into_inner(self) -> (R, W) {
        let io = self.io.into_inner().unwrap_or_else(PoisonError::into_inner);
        (io.input, io.output)
    }
}

impl<R, W> DecisionPrompt for TerminalPrompt<R, W>
where
    R: BufRead + Send,
    W: Write + Send,
{
    #[instrument(skip(self), level = "debug")]
    fn ask(&self, path: &str) -> Result<Decision> {
        let mut guard = self.io.lock().unwrap_or_else(PoisonError::into_inner);
        let io = &mut *guard;

        writeln!(io.output, "Outbound connection blocked: {path}")
            .map_err(|e| Error::operation("write_prompt", e))?;

        for _ in 0..MAX_ATTEMPTS {
            write!(io.output, "Allow, block or skip? [a/b/s] ")
                .and_then(|()| io.output.flush())
                .map_err(|e| Error::operation("write_prompt", e))?;

            let mut line = String::new();
            let read = io
                .input
                .read_line(&mut line)
                .map_err(|e| Error::operation("read_answer", e))?;
            if read == 0 {
                return Ok(Decision::Skip);
            }

            match Decision::parse(&line) {
                Some(decision) => return Ok(decision),
                None => {
                    writeln!(io.output, "Unrecognised answer: {}", line.trim())
                        .map_err(|e| Error::operation("write_prompt", e))?;
                },
            }
        }

        tracing::debug!(path, "No valid answer, skipping");
        Ok(Decision::Skip)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn prompt(input: &str) -> TerminalPrompt<Cursor<Vec<u8>>, Vec<u8>> {
        TerminalPrompt::new(Cursor::new(input.as_bytes().to_vec()), Vec::new())
    }

    #[test]
    fn test_answers_parsed() {
        assert_eq!(prompt("a\n").ask("c:\\x.exe").unwrap(), Decision::Allow);
        assert_eq!(prompt("Block\n").ask("c:\\x.exe").unwrap(), Decision::Block);
        assert_eq!(prompt("s\n").ask("c:\\x.exe").unwrap(), Decision::Skip);
    }

    #[test]
    fn test_eof_skips() {
        assert_eq!(prompt("").ask("c:\\x.exe").unwrap(), Decision::Skip);
    }

    #[test]
    fn test_reasks_then_accepts() {
        let p = prompt("maybe\nb\n");
        assert_eq!(p.ask("c:\\x.exe").unwrap(), Decision::Block);

        let (_, output) = p.into_inner();
        let output = String::from_utf8(output).unwrap();
        assert!(output.contains("Outbound connection blocked: c:\\x.exe"));
        assert!(output.contains("Unrecognised answer: maybe"));
    }

    #[test]
    fn test_gives_up_after_max_attempts() {
        let p = prompt("x\ny\nz\na\n");
        assert_eq!(p.ask("c:\\x.exe").unwrap(), Decision::Skip);
        // The fourth line is left for the next question.
        assert_eq!(p.ask("c:\\y.exe").unwrap(), Decision::Allow);
    }

    #[test]
    fn test_policy_prompt() {
        let p = PolicyPrompt::new(Decision::Block);
        assert_eq!(p.decision(), Decision::Block);
        assert_eq!(p.ask("anything").unwrap(), Decision::Block);
        assert_eq!(PolicyPrompt::default().ask("x").unwrap(), Decision::Skip);
    }
}
