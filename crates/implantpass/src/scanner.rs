//! Keyboard-wedge scanner input.
//!
//! Hardware QR scanners attached as keyboards "type" the payload and usually
//! finish with Enter. Some models omit the terminator, so a buffer that has
//! been idle longer than the timeout is also treated as complete.
//!
//! [`ScanBuffer`] is a plain state machine: callers feed it keys with the time
//! they arrived and poll it periodically. It performs no I/O and never reads
//! the clock itself.

use std::time::{Duration, Instant};

use tracing::{debug, trace};

/// Default idle gap after which a partial scan is flushed.
pub const DEFAULT_SCAN_TIMEOUT: Duration = Duration::from_millis(100);

/// A key event as delivered by the input layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Key {
    /// A printable character.
    Char(char),
    /// The Enter / Return key.
    Enter,
    /// Any other key (modifiers, arrows, function keys).
    Other,
}

/// How a scan was terminated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Completion {
    /// The scanner sent Enter.
    Delimiter,
    /// No key arrived within the timeout.
    Timeout,
}

/// One completed scan.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Scan {
    /// The scanned text, trimmed.
    pub text: String,
    /// What ended the scan.
    pub completed_by: Completion,
    /// When the first key of the scan arrived.
    pub captured_at: Instant,
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum State {
    Idle,
    Accumulating { since: Instant, last: Instant },
}

/// Assembles key events into scans.
#[derive(Debug, Clone)]
pub struct ScanBuffer {
    state: State,
    buffer: String,
    timeout: Duration,
}

impl Default for ScanBuffer {
    fn default() -> Self {
        Self::new(DEFAULT_SCAN_TIMEOUT)
    }
}

impl ScanBuffer {
    /// Create a buffer that flushes after `timeout` of inactivity.
    #[must_use]
    pub fn new(timeout: Duration) -> Self {
        Self {
            state: State::Idle,
            buffer: String::new(),
            timeout,
        }
    }

    /// The configured idle timeout.
    #[must_use]
    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Whether a scan is in progress.
    #[must_use]
    pub fn is_accumulating(&self) -> bool {
        matches!(self.state, State::Accumulating { .. })
    }

    /// Characters buffered so far.
    #[must_use]
    pub fn pending(&self) -> &str {
        &self.buffer
    }

    /// Feed one key that arrived at `now`.
    ///
    /// Returns a scan when `key` is Enter, or when the previous partial scan
    /// had already timed out before this key arrived. In the latter case the
    /// key starts the next scan.
    pub fn push_key(&mut self, key: Key, now: Instant) -> Option<Scan> {
        let expired = self.poll(now);

        match key {
            Key::Char(c) if !c.is_control() => {
                self.state = match self.state {
                    State::Idle => State::Accumulating {
                        since: now,
                        last: now,
                    },
                    State::Accumulating { since, .. } => State::Accumulating { since, last: now },
                };
                self.buffer.push(c);
                expired
            }
            Key::Enter => expired.or_else(|| self.flush(Completion::Delimiter)),
            Key::Char(_) | Key::Other => {
                trace!(?key, "Ignoring non-printable key");
                expired
            }
        }
    }

    /// Flush the buffer if it has been idle longer than the timeout.
    pub fn poll(&mut self, now: Instant) -> Option<Scan> {
        match self.state {
            State::Accumulating { last, .. }
                if now.saturating_duration_since(last) > self.timeout =>
            {
                self.flush(Completion::Timeout)
            }
            _ => None,
        }
    }

    /// Drive a whole string through the buffer, one key per character.
    ///
    /// Newlines act as Enter and all characters share the instant `now`, so
    /// only delimiters complete scans. A trailing unterminated scan stays
    /// buffered.
    pub fn feed_str(&mut self, input: &str, now: Instant) -> Vec<Scan> {
        input
            .chars()
            .filter_map(|c| {
                let key = match c {
                    '\n' | '\r' => Key::Enter,
                    c => Key::Char(c),
                };
                self.push_key(key, now)
            })
            .collect()
    }

    /// Emit whatever is buffered, regardless of timing.
    pub fn finish(&mut self) -> Option<Scan> {
        self.flush(Completion::Timeout)
    }

    fn flush(&mut self, completed_by: Completion) -> Option<Scan> {
        let State::Accumulating { since, .. } = std::mem::replace(&mut self.state, State::Idle)
        else {
            return None;
        };
        let raw = std::mem::take(&mut self.buffer);
        let text = raw.trim();
        if text.is_empty() {
            return None;
        }

        debug!(chars = text.chars().count(), ?completed_by, "Scan completed");
        Some(Scan {
            text: text.to_string(),
            completed_by,
            captured_at: since,
        })
    }
}
