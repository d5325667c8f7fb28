//! Centralized configuration constants for codeshell.
//!
//! Organized by component. Anything a user may want to change also has a
//! config file key; these are the defaults and hard limits.

/// Terminal view configuration.
pub mod terminal {
    /// Default view width in columns.
    pub const DEFAULT_COLS: u16 = 80;
    /// Default view height in rows (pty backend only).
    pub const DEFAULT_ROWS: u16 = 24;
    /// Smallest accepted column width.
    pub const MIN_COLS: u16 = 10;
    /// Largest accepted column width.
    pub const MAX_COLS: u16 = 1000;
    /// Columns kept free at the end of the line before echo stops.
    pub const ECHO_MARGIN: usize = 2;
    /// Prompt drawn at the start of every input line.
    pub const PROMPT: &str = "$ ";
    /// Literal command handled by the view without contacting the shell.
    pub const CLEAR_COMMAND: &str = "clear";
    /// Text returned when a command produced nothing.
    pub const NO_OUTPUT: &str = "No output";
}

/// Shell session configuration.
pub mod shell {
    /// POSIX fallback when neither config nor `$SHELL` names a shell.
    pub const POSIX_FALLBACK: &str = "/bin/sh";
    /// Command interpreter on Windows.
    pub const WINDOWS_SHELL: &str = "cmd.exe";
    /// TERM exported to pty sessions.
    pub const TERM: &str = "xterm-256color";
    /// Size of the reader threads' read buffer.
    pub const READ_BUFFER_SIZE: usize = 4096;
}

/// Command channel configuration.
pub mod channel {
    /// Requests waiting behind the one in flight before senders block.
    pub const REQUEST_QUEUE_DEPTH: usize = 32;
    /// Output chunks retained for slow output-event subscribers.
    pub const OUTPUT_BROADCAST_CAPACITY: usize = 256;
}

/// Timing configuration.
pub mod timing {
    use std::time::Duration;

    /// Fixed wait used by the quiescence completion mode.
    pub const QUIESCENCE_WINDOW: Duration = Duration::from_millis(500);
    /// Upper bound on waiting for a framed command's end marker.
    pub const MAX_WAIT: Duration = Duration::from_secs(10);
    /// Hard ceiling for `max-wait-ms`.
    pub const MAX_WAIT_CEILING: Duration = Duration::from_secs(600);
}

/// Chat assistant configuration.
pub mod assistant {
    /// Local generation endpoint.
    pub const DEFAULT_ENDPOINT: &str = "http://localhost:11434/api/generate";
    /// Model identifier sent with every request.
    pub const DEFAULT_MODEL: &str = "qwen2.5-coder:3b";
}

/// Settings file validation limits.
pub mod settings {
    /// Maximum settings file size in bytes (64 KB).
    /// Settings files should be tiny; anything larger is suspicious.
    pub const MAX_FILE_SIZE: u64 = 64 * 1024;

    /// Maximum length for string fields (shell path, model name).
    pub const MAX_STRING_LENGTH: usize = 256;
}

#[cfg(test)]
#[allow(clippy::assertions_on_constants, clippy::const_is_empty)]
mod tests {
    use super::*;

    #[test]
    fn test_default_cols_leave_room_for_echo() {
        assert!(
            terminal::DEFAULT_COLS as usize > terminal::ECHO_MARGIN + terminal::PROMPT.len(),
            "DEFAULT_COLS ({}) should fit the prompt and echo margin",
            terminal::DEFAULT_COLS
        );
    }

    #[test]
    fn test_col_limits_are_ordered() {
        assert!(terminal::MIN_COLS <= terminal::DEFAULT_COLS);
        assert!(terminal::DEFAULT_COLS <= terminal::MAX_COLS);
    }

    #[test]
    fn test_max_wait_exceeds_quiescence_window() {
        assert!(
            timing::MAX_WAIT > timing::QUIESCENCE_WINDOW,
            "MAX_WAIT ({:?}) should exceed QUIESCENCE_WINDOW ({:?})",
            timing::MAX_WAIT,
            timing::QUIESCENCE_WINDOW
        );
        assert!(timing::MAX_WAIT <= timing::MAX_WAIT_CEILING);
    }

    #[test]
    fn test_max_string_length_allows_shell_paths() {
        let long_shell = "/nix/store/0123456789abcdfghijklmnpqrsvwxyz-bash-interactive-5.2p37/bin/bash";
        assert!(
            settings::MAX_STRING_LENGTH >= long_shell.len(),
            "MAX_STRING_LENGTH ({}) should allow shell paths like '{}'",
            settings::MAX_STRING_LENGTH,
            long_shell
        );
    }
}
