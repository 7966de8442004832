//! Terminal prompts: the CAPTCHA yes/no question and the page-count / start-episode
//! questions asked when the values are not given on the command line.

use crate::scraper::Confirm;
use std::io::{self, BufRead, Write};

/// Line-based prompt over any reader/writer pair (stdin/stderr in the CLI).
pub struct TerminalPrompt<R, W> {
    input: R,
    output: W,
}

impl TerminalPrompt<io::StdinLock<'static>, io::Stderr> {
    pub fn stdio() -> Self {
        Self::new(io::stdin().lock(), io::stderr())
    }
}

impl<R: BufRead, W: Write> TerminalPrompt<R, W> {
    pub fn new(input: R, output: W) -> Self {
        Self { input, output }
    }

    /// Ask for a positive integer. Empty input takes `default`. `None` on EOF, I/O
    /// error, or anything that is not a positive integer.
    pub fn ask_number(&mut self, message: &str, default: Option<u32>) -> Option<u32> {
        let hint = default.map(|d| format!(" [{}]", d)).unwrap_or_default();
        let line = self.ask(&format!("{}{}: ", message, hint))?;
        let line = line.trim();
        if line.is_empty() {
            return default;
        }
        parse_positive(line)
    }

    fn ask(&mut self, prompt: &str) -> Option<String> {
        write!(self.output, "{}", prompt).ok()?;
        self.output.flush().ok()?;
        let mut line = String::new();
        match self.input.read_line(&mut line) {
            Ok(0) | Err(_) => None,
            Ok(_) => Some(line),
        }
    }
}

impl<R: BufRead, W: Write> Confirm for TerminalPrompt<R, W> {
    fn confirm(&mut self, message: &str) -> bool {
        let answer = self.ask(&format!("{}\nRetry now? [y/N] ", message));
        matches!(
            answer.as_deref().map(|a| a.trim().to_lowercase()).as_deref(),
            Some("y") | Some("yes")
        )
    }
}

/// Declines every CAPTCHA prompt (unattended runs).
#[derive(Debug, Default)]
pub struct DeclineAll;

impl Confirm for DeclineAll {
    fn confirm(&mut self, _message: &str) -> bool {
        tracing::info!("CAPTCHA prompt declined automatically");
        false
    }
}

fn parse_positive(s: &str) -> Option<u32> {
    s.parse::<u32>().ok().filter(|n| *n >= 1)
}
