//! Output capture buffer.
//!
//! Accumulates everything a shell session prints while a command is in
//! flight. Bytes are decoded as UTF-8 incrementally, so a multi-byte
//! character split across two reads is not mangled.

use crate::framing::{Frame, FrameOutput};
use settings::constants::terminal::NO_OUTPUT;

/// Text accumulator for one shell session.
#[derive(Debug, Default)]
pub struct OutputBuffer {
    text: String,
    /// Trailing bytes of an incomplete UTF-8 sequence.
    pending: Vec<u8>,
}

impl OutputBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Clear all captured output.
    pub fn reset(&mut self) {
        self.text.clear();
        self.pending.clear();
    }

    /// Append already-decoded text.
    pub fn append(&mut self, text: &str) {
        self.flush_pending_lossy();
        self.text.push_str(text);
    }

    /// Append raw bytes from the shell.
    pub fn append_bytes(&mut self, bytes: &[u8]) {
        self.pending.extend_from_slice(bytes);
        let mut start = 0;
        loop {
            match std::str::from_utf8(&self.pending[start..]) {
                Ok(valid) => {
                    self.text.push_str(valid);
                    self.pending.clear();
                    return;
                }
                Err(error) => {
                    let valid_end = start + error.valid_up_to();
                    self.text
                        .push_str(&String::from_utf8_lossy(&self.pending[start..valid_end]));
                    match error.error_len() {
                        Some(invalid_len) => {
                            self.text.push(char::REPLACEMENT_CHARACTER);
                            start = valid_end + invalid_len;
                        }
                        None => {
                            // Incomplete sequence at the end; keep it for the next read.
                            self.pending.drain(..valid_end);
                            return;
                        }
                    }
                }
            }
        }
    }

    /// Raw captured text.
    pub fn contents(&self) -> &str {
        &self.text
    }

    pub fn is_empty(&self) -> bool {
        self.text.is_empty() && self.pending.is_empty()
    }

    /// Captured text with the first and last line dropped.
    ///
    /// Only used when completion is guessed from a quiet period: with an
    /// echoing shell the first line is the command and the last one the next
    /// prompt. A single line is returned as is; nothing at all becomes
    /// `"No output"`.
    pub fn snapshot(&self) -> String {
        let normalized = util::normalize_newlines(&self.text);
        let trimmed = normalized.trim();
        let lines: Vec<&str> = trimmed.split('\n').collect();
        let kept = if lines.len() > 1 {
            &lines[1..lines.len() - 1]
        } else {
            &lines[..]
        };
        let joined = kept.join("\n");
        if joined.is_empty() {
            NO_OUTPUT.to_string()
        } else {
            joined
        }
    }

    /// Output of `frame` if its end marker has arrived.
    pub fn extract_frame(&self, frame: &Frame) -> Option<FrameOutput> {
        frame.extract(&self.text)
    }

    /// Output of `frame` so far, for frames that never closed.
    pub fn partial_frame(&self, frame: &Frame) -> String {
        frame.partial(&self.text)
    }

    fn flush_pending_lossy(&mut self) {
        if !self.pending.is_empty() {
            self.text.push_str(&String::from_utf8_lossy(&self.pending));
            self.pending.clear();
        }
    }
}
