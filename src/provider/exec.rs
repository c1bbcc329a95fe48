//! Shared prompt-pump/line-buffering logic used by both the local and SSH
//! executors, so the interactive-password behavior is identical regardless
//! of transport.

use once_cell::sync::Lazy;
use regex::Regex;

/// Rolling buffer cap while scanning for a multi-chunk prompt.
const MAX_BUFFER: usize = 4096;
/// Size the buffer is truncated to once it exceeds [`MAX_BUFFER`].
const TRUNCATE_TO: usize = 2048;

static GENERIC_PASSWORD_PROMPT: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)(password|passphrase)( for [^:]+)?:\s*$").unwrap()
});

static AUTH_DENIED: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)(sorry, try again|incorrect password|permission denied)").unwrap()
});

/// What the scanner wants the caller to do after ingesting a chunk.
#[derive(Debug, Clone, Default)]
pub struct PromptOutcome {
    /// Send this to the process's stdin (the password, newline-terminated).
    pub write_password: Option<String>,
    /// The authentication was observed to be rejected.
    pub auth_denied: bool,
}

/// Scans a combined stdout+stderr byte stream for an escalation password
/// prompt, either a configured marker or a generic `password:`-style regex,
/// each matched at most once per scanner instance.
pub struct PromptScanner {
    marker: Option<String>,
    password: Option<String>,
    hide_prompt_line: bool,
    buffer: String,
    marker_matched: bool,
    generic_matched: bool,
    auth_denied: bool,
}

impl PromptScanner {
    pub fn new(marker: Option<String>, password: Option<String>, hide_prompt_line: bool) -> Self {
        Self {
            marker,
            password,
            hide_prompt_line,
            buffer: String::new(),
            marker_matched: false,
            generic_matched: false,
            auth_denied: false,
        }
    }

    pub fn is_active(&self) -> bool {
        self.password.is_some()
    }

    /// `true` if any ingested chunk has matched the auth-denied regex.
    pub fn auth_denied(&self) -> bool {
        self.auth_denied
    }

    /// Feed a newly-received chunk (already lossily decoded). Returns the
    /// prompt outcome and the text that should actually be surfaced to the
    /// caller's `on_stdout`/`on_stderr` callback (with the matched marker
    /// line stripped, if `hide_prompt_line` is set).
    pub fn ingest(&mut self, chunk: &str) -> (PromptOutcome, String) {
        let mut outcome = PromptOutcome::default();
        let mut visible = chunk.to_string();

        if AUTH_DENIED.is_match(chunk) {
            outcome.auth_denied = true;
            self.auth_denied = true;
        }

        if self.password.is_some() {
            self.buffer.push_str(chunk);
            if self.buffer.len() > MAX_BUFFER {
                let start = self.buffer.len() - TRUNCATE_TO;
                self.buffer = self.buffer[start..].to_string();
            }

            if !self.marker_matched {
                if let Some(marker) = &self.marker {
                    if self.buffer.contains(marker.as_str()) {
                        self.marker_matched = true;
                        outcome.write_password =
                            Some(format!("{}\n", self.password.as_ref().unwrap()));
                        if self.hide_prompt_line {
                            visible = strip_line_containing(&visible, marker);
                        }
                    }
                }
            }

            if outcome.write_password.is_none() && !self.generic_matched {
                if GENERIC_PASSWORD_PROMPT.is_match(&self.buffer) {
                    self.generic_matched = true;
                    outcome.write_password =
                        Some(format!("{}\n", self.password.as_ref().unwrap()));
                }
            }
        }

        (outcome, visible)
    }
}

fn strip_line_containing(text: &str, needle: &str) -> String {
    text.lines()
        .filter(|line| !line.contains(needle))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Splits a growing buffer into complete lines, leaving any trailing partial
/// line for the next call. Used to feed `on_stdout`/`on_stderr` one full
/// line at a time.
#[derive(Default)]
pub struct LineBuffer {
    pending: String,
}

impl LineBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append `chunk`, returning the complete lines it produced (newline
    /// stripped). Call [`Self::flush`] at end-of-stream for any remainder.
    pub fn push(&mut self, chunk: &str) -> Vec<String> {
        self.pending.push_str(chunk);
        let mut lines = Vec::new();
        while let Some(idx) = self.pending.find('\n') {
            let line = self.pending[..idx].to_string();
            self.pending = self.pending[idx + 1..].to_string();
            lines.push(line);
        }
        lines
    }

    /// Return and clear any partial trailing line.
    pub fn flush(&mut self) -> Option<String> {
        if self.pending.is_empty() {
            None
        } else {
            Some(std::mem::take(&mut self.pending))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn marker_prompt_triggers_single_password_write() {
        let mut scanner = PromptScanner::new(
            Some("KATMER_SUDO_PROMPT:".into()),
            Some("hunter2".into()),
            true,
        );
        let (outcome, visible) = scanner.ingest("KATMER_SUDO_PROMPT:\n");
        assert_eq!(outcome.write_password.as_deref(), Some("hunter2\n"));
        assert!(!visible.contains("KATMER_SUDO_PROMPT:"));

        let (outcome2, _) = scanner.ingest("KATMER_SUDO_PROMPT:\n");
        assert!(outcome2.write_password.is_none());
    }

    #[test]
    fn generic_prompt_matches_once() {
        let mut scanner = PromptScanner::new(None, Some("hunter2".into()), true);
        let (outcome, _) = scanner.ingest("[sudo] password for deploy: ");
        assert_eq!(outcome.write_password.as_deref(), Some("hunter2\n"));
    }

    #[test]
    fn auth_denied_is_flagged() {
        let mut scanner = PromptScanner::new(None, Some("hunter2".into()), true);
        let (outcome, _) = scanner.ingest("Sorry, try again.\n");
        assert!(outcome.auth_denied);
    }

    #[test]
    fn line_buffer_splits_complete_lines() {
        let mut buf = LineBuffer::new();
        let lines = buf.push("foo\nbar\nbaz");
        assert_eq!(lines, vec!["foo".to_string(), "bar".to_string()]);
        assert_eq!(buf.flush(), Some("baz".to_string()));
    }
}
