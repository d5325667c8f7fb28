//! Command/response channel.
//!
//! A single worker task owns the shell session and its output buffer.
//! Callers queue requests and get the result back over a oneshot, so only
//! one command is ever in flight per session and outputs never interleave.
//! Every chunk the shell prints is also broadcast to output subscribers.

use crate::buffer::OutputBuffer;
use crate::error::ShellError;
use crate::framing::Frame;
use crate::session::{OutputChunk, OutputStream, ShellIo};
use settings::constants::channel::{OUTPUT_BROADCAST_CAPACITY, REQUEST_QUEUE_DEPTH};
use settings::constants::terminal::NO_OUTPUT;
use settings::{CompletionMode, Config};
use std::time::Duration;
use tokio::sync::mpsc::{self, UnboundedReceiver};
use tokio::sync::{broadcast, oneshot};
use tokio::task::JoinHandle;
use tokio::time::Instant;

/// Completion settings for a channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChannelConfig {
    pub completion: CompletionMode,
    pub quiescence_window: Duration,
    pub max_wait: Duration,
}

impl ChannelConfig {
    pub fn from_config(config: &Config) -> Self {
        Self {
            completion: config.completion,
            quiescence_window: config.quiescence_window(),
            max_wait: config.max_wait(),
        }
    }
}

impl Default for ChannelConfig {
    fn default() -> Self {
        Self::from_config(&Config::default())
    }
}

/// Result of one command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandOutput {
    /// Captured text, or `"No output"`.
    pub text: String,
    /// Exit status, when the shell reported one.
    pub exit_code: Option<i32>,
    /// Completion was not confirmed: the wait ran out, the shell exited
    /// mid-command, or the channel runs in quiescence mode.
    pub truncated: bool,
}

impl CommandOutput {
    fn new(text: String, exit_code: Option<i32>, truncated: bool) -> Self {
        let text = if text.trim().is_empty() {
            NO_OUTPUT.to_string()
        } else {
            text
        };
        Self {
            text,
            exit_code,
            truncated,
        }
    }
}

/// Shell output as seen by subscribers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputEvent {
    pub stream: OutputStream,
    pub text: String,
}

enum Request {
    Execute {
        command: String,
        reply: oneshot::Sender<Result<CommandOutput, ShellError>>,
    },
    Shutdown {
        done: oneshot::Sender<()>,
    },
}

/// Handle to a session's worker. Cheap to clone; all clones share the queue.
#[derive(Clone)]
pub struct CommandChannel {
    requests: mpsc::Sender<Request>,
    events: broadcast::Sender<OutputEvent>,
}

impl CommandChannel {
    /// Start the worker for `shell` on the current tokio runtime.
    ///
    /// `output` is the receiver returned alongside the shell when it was
    /// spawned. The worker stops after [`CommandChannel::shutdown`] or once
    /// every handle has been dropped; either way the shell is shut down.
    pub fn start<S: ShellIo>(
        shell: S,
        output: UnboundedReceiver<OutputChunk>,
        config: ChannelConfig,
    ) -> (Self, JoinHandle<()>) {
        let (requests_tx, requests_rx) = mpsc::channel(REQUEST_QUEUE_DEPTH);
        let (events, _) = broadcast::channel(OUTPUT_BROADCAST_CAPACITY);

        let worker = Worker {
            shell,
            output,
            output_open: true,
            events: events.clone(),
            buffer: OutputBuffer::new(),
            config,
            token: session_token(),
            sequence: 0,
        };
        let handle = tokio::spawn(worker.run(requests_rx));

        (
            Self {
                requests: requests_tx,
                events,
            },
            handle,
        )
    }

    /// Run one command line and wait for its output.
    pub async fn execute(&self, command: &str) -> Result<CommandOutput, ShellError> {
        if command.contains(['\n', '\r']) {
            return Err(ShellError::MultiLine);
        }

        let (reply, response) = oneshot::channel();
        self.requests
            .send(Request::Execute {
                command: command.to_string(),
                reply,
            })
            .await
            .map_err(|_| ShellError::Closed)?;
        response.await.map_err(|_| ShellError::Closed)?
    }

    /// Receive every chunk the shell prints from now on.
    pub fn subscribe(&self) -> broadcast::Receiver<OutputEvent> {
        self.events.subscribe()
    }

    /// Stop the worker and terminate the shell. Queued commands ahead of the
    /// shutdown still run.
    pub async fn shutdown(&self) {
        let (done, finished) = oneshot::channel();
        if self.requests.send(Request::Shutdown { done }).await.is_ok() {
            let _ = finished.await;
        }
    }
}

fn session_token() -> String {
    let mut token = uuid::Uuid::new_v4().simple().to_string();
    token.truncate(8);
    token
}

struct Worker<S> {
    shell: S,
    output: UnboundedReceiver<OutputChunk>,
    output_open: bool,
    events: broadcast::Sender<OutputEvent>,
    buffer: OutputBuffer,
    config: ChannelConfig,
    token: String,
    sequence: u64,
}

impl<S: ShellIo> Worker<S> {
    async fn run(mut self, mut requests: mpsc::Receiver<Request>) {
        loop {
            tokio::select! {
                request = requests.recv() => match request {
                    Some(Request::Execute { command, reply }) => {
                        let result = self.execute(&command).await;
                        if reply.send(result).is_err() {
                            tracing::debug!("Caller dropped before the command finished");
                        }
                    }
                    Some(Request::Shutdown { done }) => {
                        self.shell.shutdown();
                        let _ = done.send(());
                        break;
                    }
                    None => {
                        self.shell.shutdown();
                        break;
                    }
                },
                chunk = self.output.recv(), if self.output_open => match chunk {
                    Some(chunk) => self.publish(&chunk),
                    None => self.mark_closed(),
                },
            }
        }
        tracing::debug!("Command channel worker stopped");
    }

    async fn execute(&mut self, command: &str) -> Result<CommandOutput, ShellError> {
        if !self.output_open || self.shell.has_exited() {
            return Err(ShellError::Exited);
        }

        self.drain_idle_output();
        self.buffer.reset();
        self.sequence += 1;
        let frame = Frame::new(&self.token, self.sequence);
        let mode = self.config.completion;

        let wait = match mode {
            CompletionMode::Framed => {
                let input = frame.wrap(self.shell.flavor(), command);
                self.shell.write_raw(&input)?;
                self.config.max_wait
            }
            CompletionMode::Quiescence => {
                self.shell.write(command)?;
                self.config.quiescence_window
            }
        };
        tracing::debug!(frame = frame.id(), ?mode, "Submitted command");

        let deadline = Instant::now() + wait;
        loop {
            match tokio::time::timeout_at(deadline, self.output.recv()).await {
                Ok(Some(chunk)) => {
                    self.publish(&chunk);
                    self.buffer.append_bytes(&chunk.data);
                    if mode == CompletionMode::Framed {
                        if let Some(output) = self.buffer.extract_frame(&frame) {
                            tracing::debug!(
                                frame = frame.id(),
                                exit_code = ?output.exit_code,
                                "Command completed"
                            );
                            return Ok(CommandOutput::new(output.text, output.exit_code, false));
                        }
                    }
                }
                Ok(None) => {
                    self.mark_closed();
                    break;
                }
                Err(_elapsed) => break,
            }
        }

        let output = match mode {
            CompletionMode::Quiescence => CommandOutput::new(self.buffer.snapshot(), None, true),
            CompletionMode::Framed => {
                tracing::warn!(
                    frame = frame.id(),
                    "Command did not complete within {:?}; returning partial output",
                    wait
                );
                CommandOutput::new(self.buffer.partial_frame(&frame), None, true)
            }
        };
        Ok(output)
    }

    /// Publish output that arrived while no command was running.
    fn drain_idle_output(&mut self) {
        while let Ok(chunk) = self.output.try_recv() {
            self.publish(&chunk);
        }
    }

    fn publish(&self, chunk: &OutputChunk) {
        // No subscribers is fine.
        let _ = self.events.send(OutputEvent {
            stream: chunk.stream,
            text: String::from_utf8_lossy(&chunk.data).into_owned(),
        });
    }

    fn mark_closed(&mut self) {
        if self.output_open {
            self.output_open = false;
            tracing::warn!("Shell output closed; the session has exited");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::framing::ShellFlavor;
    use parking_lot::Mutex;
    use pretty_assertions::assert_eq;
    use std::sync::Arc;
    use tokio::sync::mpsc::UnboundedSender;

    /// A tiny line-oriented stand-in for a POSIX shell.
    ///
    /// Understands the framing `printf` lines, `echo`, `false`, `hang`
    /// (swallows all further input) and `exit`. With `echo_input` set it
    /// echoes each line and prints a prompt, like a shell on a terminal.
    struct FakeShell {
        inputs: Arc<Mutex<Vec<String>>>,
        output: Option<UnboundedSender<OutputChunk>>,
        echo_input: bool,
        hung: bool,
        last_status: i32,
    }

    impl FakeShell {
        fn new(echo_input: bool) -> (Self, UnboundedReceiver<OutputChunk>, Arc<Mutex<Vec<String>>>) {
            let (tx, rx) = mpsc::unbounded_channel();
            let inputs = Arc::new(Mutex::new(Vec::new()));
            let shell = Self {
                inputs: inputs.clone(),
                output: Some(tx),
                echo_input,
                hung: false,
                last_status: 0,
            };
            (shell, rx, inputs)
        }

        fn emit(&self, text: &str) {
            if let Some(tx) = &self.output {
                let _ = tx.send(OutputChunk {
                    stream: OutputStream::Stdout,
                    data: text.as_bytes().to_vec(),
                });
            }
        }

        fn run_line(&mut self, line: &str) {
            if self.hung || self.output.is_none() {
                return;
            }
            if self.echo_input {
                self.emit(&format!("{line}\n"));
            }
            if let Some(id) = framing_id(line, "BEGIN") {
                self.emit(&format!("__CODESHELL_BEGIN_{id}__\n"));
            } else if let Some(id) = framing_id(line, "END") {
                self.emit(&format!("\n__CODESHELL_END_{id}__:{}\n", self.last_status));
            } else if let Some(text) = line.strip_prefix("echo ") {
                self.emit(&format!("{text}\n"));
                self.last_status = 0;
            } else if line == "false" {
                self.last_status = 1;
            } else if line == "hang" {
                self.hung = true;
                return;
            } else if line == "exit" {
                self.output = None;
                return;
            }
            if self.echo_input {
                self.emit("$ ");
            }
        }
    }

    fn framing_id(line: &str, kind: &str) -> Option<String> {
        if !line.starts_with("printf ") {
            return None;
        }
        let mut words = line.split_whitespace().rev();
        let last = words.next()?;
        if last == "\"$?\"" {
            let id = words.next()?;
            (words.next()? == kind).then(|| id.to_string())
        } else {
            (words.next()? == kind).then(|| last.to_string())
        }
    }

    impl ShellIo for FakeShell {
        fn flavor(&self) -> ShellFlavor {
            ShellFlavor::Posix
        }

        fn write_raw(&mut self, data: &str) -> Result<(), ShellError> {
            if self.output.is_none() {
                return Err(ShellError::Exited);
            }
            self.inputs.lock().push(data.to_string());
            for line in data.lines() {
                self.run_line(line);
            }
            Ok(())
        }

        fn has_exited(&self) -> bool {
            self.output.is_none()
        }

        fn shutdown(&mut self) {
            self.output = None;
        }
    }

    fn framed() -> ChannelConfig {
        ChannelConfig {
            completion: CompletionMode::Framed,
            quiescence_window: Duration::from_millis(500),
            max_wait: Duration::from_secs(10),
        }
    }

    fn quiescence() -> ChannelConfig {
        ChannelConfig {
            completion: CompletionMode::Quiescence,
            ..framed()
        }
    }

    #[tokio::test]
    async fn framed_command_returns_output_and_status() {
        let (shell, rx, inputs) = FakeShell::new(false);
        let (channel, _worker) = CommandChannel::start(shell, rx, framed());

        let output = channel.execute("echo hi").await.expect("execute");
        assert_eq!(
            output,
            CommandOutput {
                text: "hi".to_string(),
                exit_code: Some(0),
                truncated: false,
            }
        );

        let written = inputs.lock().join("");
        assert!(written.contains("\necho hi\n"), "input was {written:?}");
    }

    #[tokio::test]
    async fn framed_command_reports_failure_status() {
        let (shell, rx, _inputs) = FakeShell::new(false);
        let (channel, _worker) = CommandChannel::start(shell, rx, framed());

        let output = channel.execute("false").await.expect("execute");
        assert_eq!(output.text, "No output");
        assert_eq!(output.exit_code, Some(1));
        assert!(!output.truncated);
    }

    #[tokio::test]
    async fn output_printed_between_commands_is_not_captured() {
        let (shell, rx, _inputs) = FakeShell::new(false);
        shell.emit("banner\n");
        let (channel, _worker) = CommandChannel::start(shell, rx, framed());

        let output = channel.execute("echo only").await.expect("execute");
        assert_eq!(output.text, "only");
    }

    #[tokio::test(start_paused = true)]
    async fn quiescence_mode_writes_plain_line_and_trims() {
        let (shell, rx, inputs) = FakeShell::new(true);
        let (channel, _worker) = CommandChannel::start(shell, rx, quiescence());

        let started = Instant::now();
        let output = channel.execute("echo hi").await.expect("execute");
        assert_eq!(output.text, "hi");
        assert_eq!(output.exit_code, None);
        assert!(output.truncated);
        assert!(started.elapsed() >= Duration::from_millis(500));
        assert_eq!(inputs.lock().as_slice(), ["echo hi\n".to_string()]);
    }

    #[tokio::test(start_paused = true)]
    async fn hung_command_resolves_after_max_wait() {
        let (shell, rx, _inputs) = FakeShell::new(false);
        let config = ChannelConfig {
            max_wait: Duration::from_secs(2),
            ..framed()
        };
        let (channel, _worker) = CommandChannel::start(shell, rx, config);

        let started = Instant::now();
        let output = channel.execute("hang").await.expect("execute");
        let elapsed = started.elapsed();
        assert!(output.truncated);
        assert_eq!(output.exit_code, None);
        assert!(elapsed >= Duration::from_secs(2));
        assert!(elapsed < Duration::from_secs(3));
    }

    #[tokio::test]
    async fn concurrent_commands_are_isolated() {
        let (shell, rx, _inputs) = FakeShell::new(false);
        let (channel, _worker) = CommandChannel::start(shell, rx, framed());

        let first = channel.clone();
        let second = channel.clone();
        let (one, two) = tokio::join!(first.execute("echo one"), second.execute("echo two"));
        assert_eq!(one.expect("first").text, "one");
        assert_eq!(two.expect("second").text, "two");
    }

    #[tokio::test]
    async fn multi_line_commands_are_rejected() {
        let (shell, rx, inputs) = FakeShell::new(false);
        let (channel, _worker) = CommandChannel::start(shell, rx, framed());

        let result = channel.execute("echo a\necho b").await;
        assert!(matches!(result, Err(ShellError::MultiLine)));
        assert!(inputs.lock().is_empty());
    }

    #[tokio::test]
    async fn exited_shell_fails_later_commands() {
        let (shell, rx, _inputs) = FakeShell::new(false);
        let (channel, _worker) = CommandChannel::start(shell, rx, framed());

        let output = channel.execute("exit").await.expect("execute");
        assert!(output.truncated);

        let result = channel.execute("echo after").await;
        assert!(matches!(result, Err(ShellError::Exited)), "got {result:?}");
    }

    #[tokio::test]
    async fn subscribers_see_raw_output() {
        let (shell, rx, _inputs) = FakeShell::new(false);
        let (channel, _worker) = CommandChannel::start(shell, rx, framed());
        let mut events = channel.subscribe();

        channel.execute("echo streamed").await.expect("execute");

        let mut seen = String::new();
        while let Ok(event) = events.try_recv() {
            seen.push_str(&event.text);
        }
        assert!(seen.contains("streamed\n"), "events were {seen:?}");
        assert!(seen.contains("__CODESHELL_END_"));
    }

    #[tokio::test]
    async fn shutdown_stops_worker_and_closes_channel() {
        let (shell, rx, _inputs) = FakeShell::new(false);
        let (channel, worker) = CommandChannel::start(shell, rx, framed());

        channel.shutdown().await;
        worker.await.expect("worker should finish cleanly");

        let result = channel.execute("echo late").await;
        assert!(matches!(result, Err(ShellError::Closed)));
    }

    #[cfg(unix)]
    mod real_shell {
        use super::*;
        use pretty_assertions::assert_eq;
        use crate::session::{ShellOptions, ShellSession};
        use settings::ShellBackend;
        use std::path::Path;
        use test_case::test_case;

        fn spawn(
            program: &str,
            args: &[&str],
            backend: ShellBackend,
            config: ChannelConfig,
        ) -> CommandChannel {
            let options = ShellOptions {
                program: program.to_string(),
                args: args.iter().map(|arg| arg.to_string()).collect(),
                backend,
                cols: 80,
                rows: 24,
                working_directory: None,
            };
            let (session, output) = ShellSession::spawn(&options).expect("spawn shell");
            CommandChannel::start(session, output, config).0
        }

        fn start(config: ChannelConfig) -> CommandChannel {
            spawn("/bin/sh", &[], ShellBackend::Pipe, config)
        }

        #[tokio::test]
        async fn echo_round_trip() {
            let channel = start(framed());
            let output = channel.execute("echo hi").await.expect("execute");
            assert_eq!(output.text, "hi");
            assert_eq!(output.exit_code, Some(0));
            assert!(!output.truncated);
            channel.shutdown().await;
        }

        #[tokio::test]
        async fn exit_status_and_stderr_are_captured() {
            let channel = start(framed());
            let output = channel
                .execute("echo oops 1>&2; (exit 3)")
                .await
                .expect("execute");
            assert_eq!(output.text, "oops");
            assert_eq!(output.exit_code, Some(3));
            channel.shutdown().await;
        }

        #[tokio::test]
        async fn output_without_newline_is_kept() {
            let channel = start(framed());
            let output = channel.execute("printf abc").await.expect("execute");
            assert_eq!(output.text, "abc");
            channel.shutdown().await;
        }

        #[tokio::test]
        async fn shell_state_persists_between_commands() {
            let channel = start(framed());
            channel.execute("CODESHELL_TEST_VAR=kept").await.expect("set");
            let output = channel
                .execute("echo $CODESHELL_TEST_VAR")
                .await
                .expect("read");
            assert_eq!(output.text, "kept");
            channel.shutdown().await;
        }

        #[test_case("/bin/sh", &[] ; "sh")]
        #[test_case("/bin/bash", &["--norc", "--noprofile"] ; "bash")]
        #[tokio::test]
        async fn pty_output_is_free_of_terminal_noise(program: &str, args: &[&str]) {
            if !Path::new(program).exists() {
                return;
            }
            let channel = spawn(program, args, ShellBackend::Pty, framed());

            let output = channel.execute("echo hi").await.expect("echo");
            assert_eq!(output.text, "hi");
            assert_eq!(output.exit_code, Some(0));

            let output = channel
                .execute("ls /codeshell_missing_dir")
                .await
                .expect("ls");
            assert_ne!(output.exit_code, Some(0));
            assert!(output.text.contains("/codeshell_missing_dir"), "got {:?}", output.text);
            assert!(!output.text.contains('\x1b'), "got {:?}", output.text);
            assert!(!output.text.starts_with('\n'), "got {:?}", output.text);

            channel.shutdown().await;
        }

        #[tokio::test]
        async fn slow_command_is_truncated() {
            let channel = start(ChannelConfig {
                max_wait: Duration::from_millis(300),
                ..framed()
            });
            let started = std::time::Instant::now();
            let output = channel
                .execute("echo early; sleep 2; echo late")
                .await
                .expect("execute");
            assert!(output.truncated);
            assert_eq!(output.text, "early");
            assert!(started.elapsed() < Duration::from_secs(2));
            channel.shutdown().await;
        }
    }
}
