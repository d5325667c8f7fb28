use serde::Serialize;

/// Shown in place of a reply when the endpoint cannot be reached.
pub const CONNECTION_FAILED: &str =
    "Error: Failed to connect to the language model. Make sure it's running locally.";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
}

/// Messages of one chat panel, oldest first.
///
/// A reply starts as an empty assistant message that grows as fragments
/// stream in.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ChatTranscript {
    messages: Vec<ChatMessage>,
    awaiting_reply: bool,
}

impl ChatTranscript {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn messages(&self) -> &[ChatMessage] {
        &self.messages
    }

    pub fn is_awaiting_reply(&self) -> bool {
        self.awaiting_reply
    }

    /// Record a question. Blank input, or input while a reply is still
    /// streaming, is refused and `false` returned.
    pub fn ask(&mut self, question: &str) -> bool {
        if question.trim().is_empty() || self.awaiting_reply {
            return false;
        }
        self.messages.push(ChatMessage {
            role: Role::User,
            content: question.to_string(),
        });
        self.awaiting_reply = true;
        true
    }

    /// Append a streamed fragment to the reply in progress.
    pub fn append_reply(&mut self, fragment: &str) {
        match self.messages.last_mut() {
            Some(message) if message.role == Role::Assistant && self.awaiting_reply => {
                message.content.push_str(fragment);
            }
            _ => self.messages.push(ChatMessage {
                role: Role::Assistant,
                content: fragment.to_string(),
            }),
        }
    }

    pub fn finish_reply(&mut self) {
        self.awaiting_reply = false;
    }

    /// End the reply in progress with the connection failure message.
    pub fn connection_failed(&mut self) {
        tracing::warn!("Language model endpoint unreachable");
        self.messages.push(ChatMessage {
            role: Role::Assistant,
            content: CONNECTION_FAILED.to_string(),
        });
        self.awaiting_reply = false;
    }
}
