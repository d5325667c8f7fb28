//! Chat assistant context.
//!
//! Builds generation requests from the files open in the editor and turns
//! the endpoint's newline-delimited JSON stream back into a reply. The HTTP
//! transport lives outside this crate.

mod prompt;
mod stream;
mod transcript;

pub use prompt::{build_prompt, format_context, GenerateRequest, OpenFile};
pub use stream::{GenerateChunk, StreamDecoder};
pub use transcript::{ChatMessage, ChatTranscript, Role, CONNECTION_FAILED};

use thiserror::Error;

/// Failures while reading a generation stream.
#[derive(Debug, Error)]
pub enum AssistantError {
    #[error("malformed stream line: {0}")]
    Malformed(#[from] serde_json::Error),
    #[error("model reported an error: {0}")]
    Model(String),
    #[error("stream ended before the reply was done")]
    Incomplete,
}
