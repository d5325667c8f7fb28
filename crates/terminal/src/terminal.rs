//! Terminal bridge core.
//!
//! Shell process management, output capture and the framed command channel.
//! This crate has no UI dependencies; the line editor lives in `terminal_view`.

pub mod buffer;
pub mod channel;
mod error;
pub mod framing;
pub mod session;

pub use buffer::OutputBuffer;
pub use channel::{ChannelConfig, CommandChannel, CommandOutput, OutputEvent};
pub use error::ShellError;
pub use framing::{Frame, FrameOutput, ShellFlavor};
pub use session::{OutputChunk, OutputStream, ShellIo, ShellOptions, ShellSession};
