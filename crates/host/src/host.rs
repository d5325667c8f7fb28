//! Trusted host.
//!
//! Owns the single shell session and exposes it to the UI only through the
//! [`Bridge`]: two allow-listed channels plus the file-save operation.

mod bridge;
mod capability;
mod error;
mod files;
mod request;

pub use bridge::{Bridge, OutputSubscription};
pub use capability::{Capability, CapabilityKind};
pub use error::BridgeError;
pub use files::{save_file, SaveFileResult};
pub use request::{CommandReply, HostRequest, HostResponse};

use anyhow::{Context as _, Result};
use assistant::{GenerateRequest, OpenFile};
use settings::{CompletionMode, Config};
use terminal::{ChannelConfig, CommandChannel, ShellOptions, ShellSession};
use tokio::task::JoinHandle;

/// A running host: one shell session and the bridge in front of it.
pub struct Host {
    bridge: Bridge,
    worker: JoinHandle<()>,
    config: Config,
}

impl Host {
    /// Spawn the shell and start its command channel.
    ///
    /// Must be called inside a tokio runtime. Failing to spawn the shell is
    /// an error: the host is useless without it.
    pub fn start(config: &Config) -> Result<Self> {
        let options = ShellOptions::from_config(config);
        let (session, output) = ShellSession::spawn(&options)
            .with_context(|| format!("Failed to start shell `{}`", options.program))?;

        let (channel, worker) =
            CommandChannel::start(session, output, ChannelConfig::from_config(config));

        tracing::info!(
            shell = %options.program,
            completion = ?config.completion,
            "Host started"
        );
        Ok(Self {
            bridge: Bridge::new(channel),
            worker,
            config: config.clone(),
        })
    }

    pub fn bridge(&self) -> &Bridge {
        &self.bridge
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Whether command results can be trusted to be complete unless flagged.
    pub fn confirms_completion(&self) -> bool {
        self.config.completion == CompletionMode::Framed
    }

    /// Request body for asking the chat model `question` about `files`.
    pub fn chat_request(&self, files: &[OpenFile], question: &str) -> GenerateRequest {
        GenerateRequest::new(self.config.assistant_model.clone(), files, question)
    }

    /// Where chat requests are sent.
    pub fn assistant_endpoint(&self) -> &str {
        &self.config.assistant_endpoint
    }

    /// Terminate the shell and wait for the channel worker to stop.
    pub async fn shutdown(self) -> Result<()> {
        self.bridge.channel().shutdown().await;
        self.worker
            .await
            .context("Command channel worker panicked")?;
        tracing::info!("Host shut down");
        Ok(())
    }
}
