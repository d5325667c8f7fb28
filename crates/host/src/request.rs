//! Typed requests and replies crossing the UI boundary.

use crate::capability::{Capability, CapabilityKind};
use crate::error::BridgeError;
use serde::Serialize;
use serde_json::Value;
use terminal::CommandOutput;

/// A validated request from the UI.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HostRequest {
    TerminalCommand { command: String },
}

impl HostRequest {
    /// Parse an invocation of `channel` with JSON `args`.
    ///
    /// Arguments are positional: either a bare value or an array whose
    /// first element is used.
    pub fn parse(channel: &str, args: &Value) -> Result<Self, BridgeError> {
        match Capability::parse_for(channel, CapabilityKind::Invoke)? {
            Capability::TerminalCommand => {
                let command = first_arg(args)
                    .and_then(Value::as_str)
                    .ok_or_else(|| invalid(channel, "expected a command string"))?;
                Ok(Self::TerminalCommand {
                    command: command.to_string(),
                })
            }
            Capability::TerminalOutput => Err(BridgeError::ChannelNotAllowed(channel.to_string())),
        }
    }
}

fn first_arg(args: &Value) -> Option<&Value> {
    match args {
        Value::Array(items) => items.first(),
        other => Some(other),
    }
}

fn invalid(channel: &str, reason: &str) -> BridgeError {
    BridgeError::InvalidArguments {
        channel: channel.to_string(),
        reason: reason.to_string(),
    }
}

/// Reply to a [`HostRequest`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum HostResponse {
    TerminalCommand(CommandReply),
}

/// Serializable form of a command's result.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CommandReply {
    pub output: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub exit_code: Option<i32>,
    pub truncated: bool,
}

impl From<CommandOutput> for CommandReply {
    fn from(output: CommandOutput) -> Self {
        Self {
            output: output.text,
            exit_code: output.exit_code,
            truncated: output.truncated,
        }
    }
}
