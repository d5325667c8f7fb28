//! Decoder for the newline-delimited JSON reply stream.
//!
//! Network reads do not line up with JSON objects: one read may carry
//! several objects, or end halfway through one. The decoder buffers bytes
//! until a full line is available.

use crate::AssistantError;
use serde::Deserialize;

/// One object of the reply stream.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct GenerateChunk {
    #[serde(default)]
    pub response: String,
    #[serde(default)]
    pub done: bool,
    #[serde(default)]
    pub error: Option<String>,
}

/// Assembles reply fragments from raw stream reads.
#[derive(Debug, Default)]
pub struct StreamDecoder {
    pending: Vec<u8>,
    reply: String,
    done: bool,
}

impl StreamDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed one read. Returns the fragments completed by it, in order.
    pub fn push(&mut self, bytes: &[u8]) -> Result<Vec<String>, AssistantError> {
        self.pending.extend_from_slice(bytes);
        let mut fragments = Vec::new();
        while let Some(newline) = self.pending.iter().position(|b| *b == b'\n') {
            let line: Vec<u8> = self.pending.drain(..=newline).collect();
            if let Some(fragment) = self.decode_line(&line)? {
                fragments.push(fragment);
            }
        }
        Ok(fragments)
    }

    /// Flush a final line that had no trailing newline and return the reply.
    pub fn finish(mut self) -> Result<String, AssistantError> {
        let rest = std::mem::take(&mut self.pending);
        self.decode_line(&rest)?;
        if !self.done && self.reply.is_empty() {
            return Err(AssistantError::Incomplete);
        }
        if !self.done {
            tracing::debug!("Reply stream ended without a done marker");
        }
        Ok(self.reply)
    }

    /// Reply assembled so far.
    pub fn reply(&self) -> &str {
        &self.reply
    }

    pub fn is_done(&self) -> bool {
        self.done
    }

    fn decode_line(&mut self, line: &[u8]) -> Result<Option<String>, AssistantError> {
        let text = String::from_utf8_lossy(line);
        let text = text.trim();
        if text.is_empty() {
            return Ok(None);
        }
        let chunk: GenerateChunk = serde_json::from_str(text)?;
        if let Some(error) = chunk.error {
            return Err(AssistantError::Model(error));
        }
        if chunk.done {
            self.done = true;
        }
        if chunk.response.is_empty() {
            return Ok(None);
        }
        self.reply.push_str(&chunk.response);
        Ok(Some(chunk.response))
    }
}
