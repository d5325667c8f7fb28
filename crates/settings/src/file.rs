//! TOML config file support.
//!
//! Config location: `~/.config/codeshell/config.toml`

use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::constants;

/// How the shell process is attached to the host.
#[derive(Debug, Clone, Copy, Default, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub enum ShellBackend {
    /// Plain stdin/stdout/stderr pipes.
    #[default]
    Pipe,
    /// A pseudo-terminal.
    Pty,
}

/// How the command channel decides that a command has finished.
#[derive(Debug, Clone, Copy, Default, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub enum CompletionMode {
    /// Wait for the end marker written after each command.
    #[default]
    Framed,
    /// Wait a fixed window and take whatever arrived.
    Quiescence,
}

/// User-facing config parsed from TOML.
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default, rename_all = "kebab-case")]
pub struct Config {
    /// Shell program. Platform default when unset.
    pub shell: Option<String>,
    /// Pipe or pty attachment.
    pub shell_backend: ShellBackend,
    /// Completion detection strategy.
    pub completion: CompletionMode,
    /// Fixed wait for quiescence mode, in milliseconds.
    pub quiescence_ms: u64,
    /// Framed-mode fallback bound, in milliseconds.
    pub max_wait_ms: u64,
    /// Terminal view width in columns.
    pub terminal_cols: u16,
    /// Terminal height in rows (pty backend).
    pub terminal_rows: u16,
    /// Initial working directory of the shell.
    pub working_directory: Option<String>,
    /// Chat assistant generation endpoint.
    pub assistant_endpoint: String,
    /// Chat assistant model identifier.
    pub assistant_model: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            shell: None,
            shell_backend: ShellBackend::default(),
            completion: CompletionMode::default(),
            quiescence_ms: constants::timing::QUIESCENCE_WINDOW.as_millis() as u64,
            max_wait_ms: constants::timing::MAX_WAIT.as_millis() as u64,
            terminal_cols: constants::terminal::DEFAULT_COLS,
            terminal_rows: constants::terminal::DEFAULT_ROWS,
            working_directory: None,
            assistant_endpoint: constants::assistant::DEFAULT_ENDPOINT.to_string(),
            assistant_model: constants::assistant::DEFAULT_MODEL.to_string(),
        }
    }
}

impl Config {
    /// Fixed wait used by quiescence mode.
    pub fn quiescence_window(&self) -> Duration {
        Duration::from_millis(self.quiescence_ms)
    }

    /// Framed-mode fallback, never shorter than the quiescence window and
    /// never longer than the hard ceiling.
    pub fn max_wait(&self) -> Duration {
        Duration::from_millis(self.max_wait_ms)
            .max(self.quiescence_window())
            .min(constants::timing::MAX_WAIT_CEILING)
    }

    /// Column width clamped to the supported range.
    pub fn cols(&self) -> u16 {
        self.terminal_cols.clamp(
            constants::terminal::MIN_COLS,
            constants::terminal::MAX_COLS,
        )
    }

    /// Row count, at least one.
    pub fn rows(&self) -> u16 {
        self.terminal_rows.max(1)
    }

    /// Drop string values that exceed the length limit.
    fn sanitize(mut self) -> Self {
        let limit = constants::settings::MAX_STRING_LENGTH;
        let defaults = Config::default();

        if self.shell.as_ref().is_some_and(|s| s.len() > limit) {
            tracing::warn!("Ignoring overlong shell setting");
            self.shell = None;
        }
        if self
            .working_directory
            .as_ref()
            .is_some_and(|s| s.len() > limit)
        {
            tracing::warn!("Ignoring overlong working-directory setting");
            self.working_directory = None;
        }
        if self.assistant_endpoint.len() > limit {
            tracing::warn!("Ignoring overlong assistant-endpoint setting");
            self.assistant_endpoint = defaults.assistant_endpoint;
        }
        if self.assistant_model.len() > limit {
            tracing::warn!("Ignoring overlong assistant-model setting");
            self.assistant_model = defaults.assistant_model;
        }
        self
    }
}

/// Default config file content with comments (generated on first launch).
const DEFAULT_CONFIG: &str = r#"# codeshell configuration
# Every key is optional; delete a line to go back to the default.

# Shell program (defaults to $SHELL, or cmd.exe on Windows)
# shell = "/bin/bash"

# How the shell is attached: "pipe" or "pty"
shell-backend = "pipe"

# How command completion is detected:
#   "framed"     - wait for an end marker written after each command
#   "quiescence" - wait a fixed window and take whatever arrived
completion = "framed"

# Fixed wait for "quiescence" mode (milliseconds)
quiescence-ms = 500

# Longest wait for a framed command before returning partial output (milliseconds)
max-wait-ms = 10000

# Terminal size
terminal-cols = 80
terminal-rows = 24

# Initial working directory of the shell
# working-directory = "~/projects"

# Chat assistant
assistant-endpoint = "http://localhost:11434/api/generate"
assistant-model = "qwen2.5-coder:3b"
"#;

/// Return the config file path.
pub fn config_path() -> PathBuf {
    codeshell_paths::config_file()
}

/// Ensure the config file exists, creating a default if missing.
/// Returns the path to the config file.
pub fn ensure_config_file() -> Option<PathBuf> {
    let path = config_path();
    if !path.exists() {
        let parent = path.parent()?;
        std::fs::create_dir_all(parent).ok()?;
        std::fs::write(&path, DEFAULT_CONFIG).ok()?;
        tracing::info!("Created default config at {:?}", path);
    }
    Some(path)
}

/// Load and parse the config file. Returns default on any error.
pub fn load_config() -> Config {
    load_config_from(&config_path())
}

/// Load and parse a config file at `path`. Returns default on any error.
pub fn load_config_from(path: &Path) -> Config {
    let content = match std::fs::read_to_string(path) {
        Ok(c) => c,
        Err(e) => {
            if e.kind() != std::io::ErrorKind::NotFound {
                tracing::warn!("Failed to read config: {}", e);
            }
            return Config::default();
        }
    };

    // Size guard
    if content.len() > constants::settings::MAX_FILE_SIZE as usize {
        tracing::warn!(
            "Config file too large ({} bytes), using defaults",
            content.len()
        );
        return Config::default();
    }

    match toml::from_str::<Config>(&content) {
        Ok(cfg) => cfg.sanitize(),
        Err(e) => {
            tracing::warn!("Failed to parse config.toml: {}", e);
            Config::default()
        }
    }
}
