use thiserror::Error;

/// Failures of the shell session and the command channel.
#[derive(Debug, Error)]
pub enum ShellError {
    #[error("failed to spawn shell `{shell}`: {reason}")]
    Spawn { shell: String, reason: String },
    #[error("shell I/O failed: {0}")]
    Io(#[from] std::io::Error),
    #[error("command must be a single line")]
    MultiLine,
    #[error("shell session has exited")]
    Exited,
    #[error("command channel is closed")]
    Closed,
}
