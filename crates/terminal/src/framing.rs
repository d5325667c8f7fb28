//! Command framing.
//!
//! Each command is written between two marker lines so the channel can tell
//! exactly where its output starts and ends, and which exit status it had.
//! Markers are assembled by the shell at run time (`printf` arguments on
//! POSIX, a variable on cmd.exe), so a terminal that echoes input never
//! produces the marker text by echo alone.

use settings::ShellBackend;

const MARKER_PREFIX: &str = "__CODESHELL_";
const CMD_MARKER_VAR: &str = "CODESHELL_M";

/// Command syntax family of the spawned shell.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShellFlavor {
    /// sh, bash, zsh, dash and friends.
    Posix,
    /// Windows cmd.exe.
    Cmd,
}

impl ShellFlavor {
    /// Guess the flavor from the shell program path.
    ///
    /// Both `/` and `\` count as separators, so a Windows path is
    /// recognized on any host.
    pub fn detect(program: &str) -> Self {
        let name = program.rsplit(['/', '\\']).next().unwrap_or(program);
        let stem = name.rsplit_once('.').map_or(name, |(stem, _)| stem);
        if stem.eq_ignore_ascii_case("cmd") {
            Self::Cmd
        } else {
            Self::Posix
        }
    }

    /// Line terminator for input written to the shell.
    pub fn line_ending(self) -> &'static str {
        match self {
            Self::Posix => "\n",
            Self::Cmd => "\r\n",
        }
    }

    /// Input written once right after spawn.
    ///
    /// Pipe sessions merge stderr into stdout so both arrive in order; pty
    /// sessions drop echo, prompts and line editing so frames carry only
    /// command output. Each `set` gets its own line: a shell that rejects
    /// the option skips the rest of that line.
    pub fn setup_script(self, backend: ShellBackend) -> String {
        match (self, backend) {
            (Self::Posix, ShellBackend::Pipe) => "exec 2>&1\n".to_string(),
            (Self::Posix, ShellBackend::Pty) => concat!(
                "stty -echo 2>/dev/null; PS1=''; PS2=''; unset PROMPT_COMMAND\n",
                "set +o emacs 2>/dev/null\n",
                "set +o vi 2>/dev/null\n",
                "set +o zle 2>/dev/null\n",
            )
            .to_string(),
            (Self::Cmd, _) => format!("@echo off\r\nset {CMD_MARKER_VAR}={MARKER_PREFIX}\r\n"),
        }
    }
}

/// Marker pair for a single command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    id: String,
    begin: String,
    end: String,
}

/// Output recovered from a completed frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FrameOutput {
    /// Everything the command printed, trailing newlines removed.
    pub text: String,
    /// Exit status reported by the end marker.
    pub exit_code: Option<i32>,
}

impl Frame {
    /// `token` identifies the session, `sequence` the command within it.
    pub fn new(token: &str, sequence: u64) -> Self {
        let id = format!("{token}_{sequence}");
        Self {
            begin: format!("{MARKER_PREFIX}BEGIN_{id}__"),
            end: format!("{MARKER_PREFIX}END_{id}__:"),
            id,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn begin_marker(&self) -> &str {
        &self.begin
    }

    pub fn end_marker(&self) -> &str {
        &self.end
    }

    /// The input to write for `command`, including the marker lines.
    pub fn wrap(&self, flavor: ShellFlavor, command: &str) -> String {
        let id = &self.id;
        match flavor {
            ShellFlavor::Posix => format!(
                "printf '{MARKER_PREFIX}%s_%s__\\n' BEGIN {id}\n\
                 {command}\n\
                 printf '\\n{MARKER_PREFIX}%s_%s__:%d\\n' END {id} \"$?\"\n"
            ),
            ShellFlavor::Cmd => format!(
                "echo %{CMD_MARKER_VAR}%BEGIN_{id}__\r\n\
                 {command}\r\n\
                 echo %{CMD_MARKER_VAR}%END_{id}__:%ERRORLEVEL%\r\n"
            ),
        }
    }

    /// Extract the command output once the end marker line is complete.
    ///
    /// Returns `None` while the frame is still open.
    pub fn extract(&self, text: &str) -> Option<FrameOutput> {
        let body_start = self.body_start(text)?;
        let end_offset = text[body_start..].find(&self.end)?;
        let end_index = body_start + end_offset;

        let status_start = end_index + self.end.len();
        let status_len = text[status_start..].find(['\n', '\r'])?;
        let exit_code = text[status_start..status_start + status_len]
            .trim()
            .parse::<i32>()
            .ok();

        Some(FrameOutput {
            text: clean_body(&text[body_start..end_index]),
            exit_code,
        })
    }

    /// Output of a frame that never closed: whatever follows the begin line.
    pub fn partial(&self, text: &str) -> String {
        match self.body_start(text) {
            Some(start) => clean_body(&text[start..]),
            None => String::new(),
        }
    }

    fn body_start(&self, text: &str) -> Option<usize> {
        let begin_index = text.find(&self.begin)?;
        let after_marker = begin_index + self.begin.len();
        let newline = text[after_marker..].find('\n')?;
        Some(after_marker + newline + 1)
    }
}

fn clean_body(body: &str) -> String {
    strip_mode_switches(&util::normalize_newlines(body))
        .trim_end_matches(['\n', '\r'])
        .to_string()
}

/// Drop DEC private mode switches (`ESC [ ? Pn h` and `ESC [ ? Pn l`).
/// Line editors on a pty emit them around every prompt, bracketed paste
/// being the usual one. Other escape sequences are left alone.
fn strip_mode_switches(text: &str) -> String {
    const INTRO: &str = "\x1b[?";

    let mut out = String::with_capacity(text.len());
    let mut rest = text;
    while let Some(start) = rest.find(INTRO) {
        out.push_str(&rest[..start]);
        let params = &rest[start + INTRO.len()..];
        let params_len = params
            .find(|c: char| !(c.is_ascii_digit() || c == ';'))
            .unwrap_or(params.len());
        match params[params_len..].chars().next() {
            Some('h' | 'l') => rest = &params[params_len + 1..],
            _ => {
                out.push_str(INTRO);
                rest = params;
            }
        }
    }
    out.push_str(rest);
    out
}
