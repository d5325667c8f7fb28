use terminal::ShellError;
use thiserror::Error;

/// Failures reported back across the UI boundary.
#[derive(Debug, Error)]
pub enum BridgeError {
    #[error("channel \"{0}\" is not allowed")]
    ChannelNotAllowed(String),
    #[error("invalid arguments for \"{channel}\": {reason}")]
    InvalidArguments { channel: String, reason: String },
    #[error(transparent)]
    Shell(#[from] ShellError),
}
