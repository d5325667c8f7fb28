//! Shell process management.

use crate::error::ShellError;
use crate::framing::ShellFlavor;
use portable_pty::{native_pty_system, Child, CommandBuilder, MasterPty, PtyPair, PtySize};
use settings::constants::shell::{POSIX_FALLBACK, READ_BUFFER_SIZE, TERM, WINDOWS_SHELL};
use settings::{Config, ShellBackend};
use std::fmt::Display;
use std::io::{Read, Write};
use std::path::PathBuf;
use std::process::{Command, Stdio};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};

/// Which process stream a chunk was read from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputStream {
    Stdout,
    Stderr,
}

/// Bytes read from the shell in one go.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputChunk {
    pub stream: OutputStream,
    pub data: Vec<u8>,
}

/// Input side of a shell session, as seen by the command channel.
pub trait ShellIo: Send + 'static {
    /// Command syntax of the shell.
    fn flavor(&self) -> ShellFlavor;

    /// Write `data` to the shell's input as is.
    fn write_raw(&mut self, data: &str) -> Result<(), ShellError>;

    /// Write one line of input; the line terminator is appended.
    fn write(&mut self, text: &str) -> Result<(), ShellError> {
        let line = format!("{}{}", text, self.flavor().line_ending());
        self.write_raw(&line)
    }

    /// True once the shell's output stream has closed.
    fn has_exited(&self) -> bool;

    /// Terminate the shell and close its streams. Idempotent.
    fn shutdown(&mut self);
}

/// Everything needed to start a shell.
#[derive(Debug, Clone, PartialEq)]
pub struct ShellOptions {
    pub program: String,
    pub args: Vec<String>,
    pub backend: ShellBackend,
    pub cols: u16,
    pub rows: u16,
    pub working_directory: Option<PathBuf>,
}

impl ShellOptions {
    pub fn from_config(config: &Config) -> Self {
        Self {
            program: config
                .shell
                .clone()
                .unwrap_or_else(Self::default_program),
            args: Vec::new(),
            backend: config.shell_backend,
            cols: config.cols(),
            rows: config.rows(),
            working_directory: config.working_directory.as_deref().map(util::expand_home),
        }
    }

    /// `cmd.exe` on Windows; `$SHELL` or `/bin/sh` elsewhere.
    pub fn default_program() -> String {
        if cfg!(windows) {
            WINDOWS_SHELL.to_string()
        } else {
            std::env::var("SHELL")
                .ok()
                .filter(|shell| !shell.trim().is_empty())
                .unwrap_or_else(|| POSIX_FALLBACK.to_string())
        }
    }

    pub fn flavor(&self) -> ShellFlavor {
        ShellFlavor::detect(&self.program)
    }
}

enum ProcessHandle {
    Pipe(std::process::Child),
    Pty {
        child: Box<dyn Child + Send + Sync>,
        // Closing the master hangs up the session.
        _master: Box<dyn MasterPty + Send>,
    },
}

impl ProcessHandle {
    fn process_id(&self) -> Option<u32> {
        match self {
            Self::Pipe(child) => Some(child.id()),
            Self::Pty { child, .. } => child.process_id(),
        }
    }

    fn kill_and_reap(&mut self) {
        let (kill, wait) = match self {
            Self::Pipe(child) => (child.kill(), child.wait().map(|_| ())),
            Self::Pty { child, .. } => (child.kill(), child.wait().map(|_| ())),
        };
        // Kill fails with ESRCH when the shell already exited.
        if let Err(e) = kill {
            tracing::debug!("Kill shell process: {}", e);
        }
        if let Err(e) = wait {
            tracing::debug!("Wait for shell process: {}", e);
        }
    }
}

/// One long-lived shell process and its streams.
///
/// Output is read on background threads and forwarded as [`OutputChunk`]s
/// over the receiver returned by [`ShellSession::spawn`]. The process is
/// killed and reaped on [`ShellIo::shutdown`] or on drop.
pub struct ShellSession {
    program: String,
    flavor: ShellFlavor,
    writer: Box<dyn Write + Send>,
    process: ProcessHandle,
    exited: Arc<AtomicBool>,
    shut_down: bool,
    _reader_threads: Vec<thread::JoinHandle<()>>,
}

impl ShellSession {
    /// Spawn the shell described by `options`.
    ///
    /// Spawn failures are returned, never swallowed: a host without a working
    /// shell should refuse to start.
    pub fn spawn(
        options: &ShellOptions,
    ) -> Result<(Self, UnboundedReceiver<OutputChunk>), ShellError> {
        let (output_tx, output_rx) = mpsc::unbounded_channel();
        let exited = Arc::new(AtomicBool::new(false));

        let mut session = match options.backend {
            ShellBackend::Pipe => Self::spawn_pipe(options, output_tx, exited)?,
            ShellBackend::Pty => Self::spawn_pty(options, output_tx, exited)?,
        };

        session.write_raw(&session.flavor.setup_script(options.backend))?;

        tracing::info!(
            shell = %session.program,
            pid = ?session.process.process_id(),
            backend = ?options.backend,
            "Shell session started"
        );
        Ok((session, output_rx))
    }

    fn spawn_pipe(
        options: &ShellOptions,
        output_tx: UnboundedSender<OutputChunk>,
        exited: Arc<AtomicBool>,
    ) -> Result<Self, ShellError> {
        let program = &options.program;
        let mut command = Command::new(program);
        command
            .args(&options.args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());
        if let Some(dir) = &options.working_directory {
            command.current_dir(dir);
        }

        let mut child = command.spawn().map_err(|e| spawn_error(program, e))?;
        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| spawn_error(program, "stdin was not captured"))?;
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| spawn_error(program, "stdout was not captured"))?;
        let stderr = child
            .stderr
            .take()
            .ok_or_else(|| spawn_error(program, "stderr was not captured"))?;

        let reader_threads = vec![
            spawn_reader(stdout, OutputStream::Stdout, output_tx.clone(), Some(exited.clone())),
            spawn_reader(stderr, OutputStream::Stderr, output_tx, None),
        ];

        Ok(Self {
            program: program.clone(),
            flavor: options.flavor(),
            writer: Box::new(stdin),
            process: ProcessHandle::Pipe(child),
            exited,
            shut_down: false,
            _reader_threads: reader_threads,
        })
    }

    fn spawn_pty(
        options: &ShellOptions,
        output_tx: UnboundedSender<OutputChunk>,
        exited: Arc<AtomicBool>,
    ) -> Result<Self, ShellError> {
        let program = &options.program;
        let pty_system = native_pty_system();

        let PtyPair { master, slave } = pty_system
            .openpty(PtySize {
                rows: options.rows,
                cols: options.cols,
                pixel_width: 0,
                pixel_height: 0,
            })
            .map_err(|e| spawn_error(program, format!("failed to open PTY: {e}")))?;

        let mut cmd = CommandBuilder::new(program);
        cmd.args(&options.args);
        cmd.env("TERM", TERM);
        if let Some(dir) = &options.working_directory {
            cmd.cwd(dir);
        }

        let child = slave
            .spawn_command(cmd)
            .map_err(|e| spawn_error(program, e))?;
        // Only the child holds the slave side from here on, so EOF follows its exit.
        drop(slave);

        let writer = master
            .take_writer()
            .map_err(|e| spawn_error(program, format!("failed to get PTY writer: {e}")))?;
        let reader = master
            .try_clone_reader()
            .map_err(|e| spawn_error(program, format!("failed to get PTY reader: {e}")))?;

        let reader_threads = vec![spawn_reader(
            reader,
            OutputStream::Stdout,
            output_tx,
            Some(exited.clone()),
        )];

        Ok(Self {
            program: program.clone(),
            flavor: options.flavor(),
            writer,
            process: ProcessHandle::Pty {
                child,
                _master: master,
            },
            exited,
            shut_down: false,
            _reader_threads: reader_threads,
        })
    }

    /// Shell program this session runs.
    pub fn program(&self) -> &str {
        &self.program
    }
}

impl ShellIo for ShellSession {
    fn flavor(&self) -> ShellFlavor {
        self.flavor
    }

    fn write_raw(&mut self, data: &str) -> Result<(), ShellError> {
        if self.shut_down || self.has_exited() {
            return Err(ShellError::Exited);
        }
        self.writer.write_all(data.as_bytes())?;
        self.writer.flush()?;
        tracing::trace!(bytes = data.len(), "Wrote shell input");
        Ok(())
    }

    fn has_exited(&self) -> bool {
        self.exited.load(Ordering::SeqCst)
    }

    fn shutdown(&mut self) {
        if self.shut_down {
            return;
        }
        self.shut_down = true;
        self.exited.store(true, Ordering::SeqCst);
        self.process.kill_and_reap();
        tracing::info!(shell = %self.program, "Shell session shut down");
    }
}

impl Drop for ShellSession {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn spawn_error(program: &str, reason: impl Display) -> ShellError {
    ShellError::Spawn {
        shell: program.to_string(),
        reason: reason.to_string(),
    }
}

/// Forward everything read from `reader` until EOF.
///
/// `exited` is raised on EOF of the stream whose end means the shell is gone.
fn spawn_reader(
    mut reader: impl Read + Send + 'static,
    stream: OutputStream,
    output_tx: UnboundedSender<OutputChunk>,
    exited: Option<Arc<AtomicBool>>,
) -> thread::JoinHandle<()> {
    thread::spawn(move || {
        let mut buf = [0u8; READ_BUFFER_SIZE];
        loop {
            match reader.read(&mut buf) {
                Ok(0) => break,
                Ok(n) => {
                    let chunk = OutputChunk {
                        stream,
                        data: buf[..n].to_vec(),
                    };
                    if output_tx.send(chunk).is_err() {
                        break; // Channel closed
                    }
                }
                Err(e) if e.kind() == std::io::ErrorKind::Interrupted => continue,
                Err(e) => {
                    tracing::debug!(?stream, "Shell read failed: {}", e);
                    break;
                }
            }
        }
        if let Some(exited) = exited {
            exited.store(true, Ordering::SeqCst);
        }
        tracing::debug!(?stream, "Shell output stream closed");
    })
}
