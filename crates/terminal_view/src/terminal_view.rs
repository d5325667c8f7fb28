//! Terminal view controller.
//!
//! A line-editing state machine between raw keystrokes and the command
//! channel. Input is append-only: there is no cursor movement within the
//! line. Everything is drawn through a [`TerminalSurface`].

mod line_editor;
mod surface;

pub use line_editor::{CommandHistory, Key, LineEditState};
pub use surface::{AnsiSurface, MemorySurface, TerminalSurface};

use settings::constants::terminal::{CLEAR_COMMAND, ECHO_MARGIN, PROMPT};
use std::fmt::Display;
use std::future::Future;
use terminal::{CommandChannel, CommandOutput, ShellError};

/// Erases the line and returns to column zero.
const REDRAW_LINE: &str = "\x1b[2K\r";
/// Steps back one column and blanks it.
const ERASE_CHAR: &str = "\x1b[D \x1b[D";
const NEWLINE: &str = "\r\n";
const TRUNCATED_NOTICE: &str = "[output may be incomplete]";

/// Anything that can run a command line on the user's behalf.
pub trait CommandExecutor {
    type Error: Display;

    fn execute(
        &self,
        command: &str,
    ) -> impl Future<Output = Result<CommandOutput, Self::Error>> + Send;
}

impl CommandExecutor for CommandChannel {
    type Error = ShellError;

    fn execute(
        &self,
        command: &str,
    ) -> impl Future<Output = Result<CommandOutput, ShellError>> + Send {
        CommandChannel::execute(self, command)
    }
}

/// Where the view is in its input cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ViewState {
    /// Accepting input for a new line.
    Idle,
    /// A command is running; keystrokes are ignored.
    Submitting,
    /// The line holds a command recalled from history.
    HistoryBrowse,
}

/// A command the view has handed off and is waiting on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingCommand {
    pub id: u64,
    pub command: String,
}

pub struct TerminalView<S> {
    surface: S,
    history: CommandHistory,
    edit: LineEditState,
    pending: Option<PendingCommand>,
    next_id: u64,
    truncation_notice: bool,
}

impl<S: TerminalSurface> TerminalView<S> {
    /// Create the view and draw the first prompt.
    pub fn new(mut surface: S) -> Self {
        surface.write(PROMPT);
        Self {
            surface,
            history: CommandHistory::new(),
            edit: LineEditState::new(),
            pending: None,
            next_id: 1,
            truncation_notice: true,
        }
    }

    /// Whether outputs flagged as truncated get a notice line. Off for
    /// channels that never confirm completion.
    pub fn with_truncation_notice(mut self, enabled: bool) -> Self {
        self.truncation_notice = enabled;
        self
    }

    pub fn state(&self) -> ViewState {
        if self.pending.is_some() {
            ViewState::Submitting
        } else if self.edit.history_index().is_some() {
            ViewState::HistoryBrowse
        } else {
            ViewState::Idle
        }
    }

    pub fn line(&self) -> &str {
        self.edit.line()
    }

    pub fn history_index(&self) -> Option<usize> {
        self.edit.history_index()
    }

    pub fn history(&self) -> &CommandHistory {
        &self.history
    }

    pub fn surface(&self) -> &S {
        &self.surface
    }

    pub fn surface_mut(&mut self) -> &mut S {
        &mut self.surface
    }

    /// Apply one keystroke.
    ///
    /// Returns the command to run when Enter submits a line that has to go
    /// to the shell. The caller runs it and reports back with
    /// [`TerminalView::finish`].
    pub fn handle_key(&mut self, key: Key) -> Option<PendingCommand> {
        if let Some(pending) = &self.pending {
            tracing::trace!(id = pending.id, ?key, "Ignoring key while a command runs");
            return None;
        }

        match key {
            Key::Char(c) => {
                let echo = self.edit.len() + 1 < self.echo_limit();
                self.edit.push(c, echo);
                if echo {
                    let mut buf = [0u8; 4];
                    self.surface.write(c.encode_utf8(&mut buf));
                }
                None
            }
            Key::Backspace => {
                if self.edit.pop() == Some(true) {
                    self.surface.write(ERASE_CHAR);
                }
                None
            }
            Key::ArrowUp => {
                if let Some(command) = self.edit.history_up(&self.history) {
                    let redraw = self.recalled_line(command);
                    self.surface.write(&redraw);
                    self.surface.scroll_to_bottom();
                }
                None
            }
            Key::ArrowDown => {
                let redraw = match self.edit.history_down(&self.history) {
                    Some(command) => self.recalled_line(command),
                    None => format!("{REDRAW_LINE}{PROMPT}"),
                };
                self.surface.write(&redraw);
                self.surface.scroll_to_bottom();
                None
            }
            Key::Enter => self.submit(),
        }
    }

    /// Apply a batch of keys and run whatever they submit through `executor`.
    ///
    /// Keys after a submitting Enter arrived while the command was running
    /// and are dropped.
    pub async fn feed<E: CommandExecutor>(&mut self, executor: &E, keys: &[Key]) {
        for (position, key) in keys.iter().enumerate() {
            if let Some(pending) = self.handle_key(*key) {
                let result = executor.execute(&pending.command).await;
                self.finish(result);
                let dropped = keys.len() - position - 1;
                if dropped > 0 {
                    tracing::debug!(dropped, "Dropped keys typed during a command");
                }
                return;
            }
        }
    }

    /// Draw the result of the pending command and prompt for the next one.
    pub fn finish<E: Display>(&mut self, result: Result<CommandOutput, E>) {
        let Some(pending) = self.pending.take() else {
            util::debug_panic!("finish called with no command in flight");
            return;
        };

        match result {
            Ok(output) => {
                self.surface.write(&display_lines(&output.text));
                self.surface.write(NEWLINE);
                if let Some(code) = output.exit_code.filter(|code| *code != 0) {
                    self.surface.write(&format!("[exit {code}]{NEWLINE}"));
                }
                if output.truncated && self.truncation_notice {
                    self.surface.write(TRUNCATED_NOTICE);
                    self.surface.write(NEWLINE);
                }
            }
            Err(e) => {
                tracing::warn!(id = pending.id, "Command failed: {}", e);
                self.surface.write(&format!("Error: {e}{NEWLINE}"));
            }
        }
        self.surface.write(PROMPT);
        self.surface.scroll_to_bottom();
    }

    fn submit(&mut self) -> Option<PendingCommand> {
        let command = self.edit.take().trim().to_string();
        self.surface.write(NEWLINE);

        if command.is_empty() {
            self.surface.write(NEWLINE);
            self.surface.write(PROMPT);
            self.surface.scroll_to_bottom();
            return None;
        }

        self.history.push(command.clone());

        if command == CLEAR_COMMAND {
            self.surface.clear();
            self.surface.write(PROMPT);
            self.surface.scroll_to_bottom();
            return None;
        }

        self.surface.scroll_to_bottom();
        let pending = PendingCommand {
            id: self.next_id,
            command,
        };
        self.next_id += 1;
        self.pending = Some(pending.clone());
        tracing::debug!(id = pending.id, "Submitting command");
        Some(pending)
    }

    /// Redraw for a command recalled from history. The command is padded
    /// with blanks to the end of the row, then the cursor steps back to
    /// just after it.
    fn recalled_line(&self, command: &str) -> String {
        let width = self.surface.cols().saturating_sub(PROMPT.chars().count());
        let padding = width.saturating_sub(command.chars().count());
        let mut line = format!("{REDRAW_LINE}{PROMPT}{command:<width$}");
        if padding > 0 {
            line.push_str(&format!("\x1b[{padding}D"));
        }
        line
    }

    fn echo_limit(&self) -> usize {
        self.surface.cols().saturating_sub(ECHO_MARGIN)
    }
}

fn display_lines(text: &str) -> String {
    util::normalize_newlines(text).replace('\n', NEWLINE)
}
