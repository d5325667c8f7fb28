//! The surface the UI talks to.

use crate::capability::{Capability, CapabilityKind};
use crate::error::BridgeError;
use crate::files::{save_file, SaveFileResult};
use crate::request::{HostRequest, HostResponse};
use serde_json::Value;
use std::future::Future;
use std::path::Path;
use terminal::{CommandChannel, CommandOutput, OutputEvent};
use terminal_view::CommandExecutor;
use tokio::sync::broadcast::{self, error::RecvError};

/// Allow-listed entry points into the host. Cheap to clone.
#[derive(Clone)]
pub struct Bridge {
    channel: CommandChannel,
}

impl Bridge {
    pub fn new(channel: CommandChannel) -> Self {
        Self { channel }
    }

    /// Dispatch a request by channel name.
    pub async fn invoke(&self, channel: &str, args: &Value) -> Result<HostResponse, BridgeError> {
        match HostRequest::parse(channel, args)? {
            HostRequest::TerminalCommand { command } => {
                let output = self.execute_terminal_command(&command).await?;
                Ok(HostResponse::TerminalCommand(output.into()))
            }
        }
    }

    /// Run a command line in the shell session.
    pub async fn execute_terminal_command(
        &self,
        command: &str,
    ) -> Result<CommandOutput, BridgeError> {
        Ok(self.channel.execute(command).await?)
    }

    /// Subscribe to a channel by name.
    pub fn subscribe(&self, channel: &str) -> Result<OutputSubscription, BridgeError> {
        match Capability::parse_for(channel, CapabilityKind::Subscribe)? {
            Capability::TerminalOutput => Ok(self.subscribe_terminal_output()),
            Capability::TerminalCommand => Err(BridgeError::ChannelNotAllowed(channel.to_string())),
        }
    }

    /// Everything the shell prints from now on.
    pub fn subscribe_terminal_output(&self) -> OutputSubscription {
        OutputSubscription {
            events: self.channel.subscribe(),
        }
    }

    /// Overwrite an existing file. See [`save_file`].
    pub fn save_file(&self, path: impl AsRef<Path>, content: &str) -> SaveFileResult {
        save_file(path, content)
    }

    pub(crate) fn channel(&self) -> &CommandChannel {
        &self.channel
    }
}

impl CommandExecutor for Bridge {
    type Error = BridgeError;

    fn execute(
        &self,
        command: &str,
    ) -> impl Future<Output = Result<CommandOutput, BridgeError>> + Send {
        self.execute_terminal_command(command)
    }
}

/// Live feed of shell output.
pub struct OutputSubscription {
    events: broadcast::Receiver<OutputEvent>,
}

impl OutputSubscription {
    /// Next event, or `None` once the session is gone.
    ///
    /// A subscriber that falls behind loses the oldest events and keeps going.
    pub async fn recv(&mut self) -> Option<OutputEvent> {
        loop {
            match self.events.recv().await {
                Ok(event) => return Some(event),
                Err(RecvError::Lagged(skipped)) => {
                    tracing::warn!(skipped, "Output subscriber fell behind");
                }
                Err(RecvError::Closed) => return None,
            }
        }
    }
}
