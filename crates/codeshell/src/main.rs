//! codeshell - trusted host for the editor's terminal and chat panels
//!
//! Main entry point. Starts the shell session behind the bridge and drives a
//! terminal view with keystrokes read from stdin, drawing on stdout. Logs go
//! to stderr.

use anyhow::{Context, Result};
use host::Host;
use once_cell::sync::Lazy;
use std::time::Instant;
use terminal_view::{AnsiSurface, Key, TerminalView};
use tokio::io::AsyncReadExt;
use tracing::{debug, error, info};

/// Application startup time for performance monitoring
static STARTUP_TIME: Lazy<Instant> = Lazy::new(Instant::now);

const STDIN_BUFFER_SIZE: usize = 1024;

/// Create the config directory.
fn init_paths() -> Result<()> {
    let config_dir = codeshell_paths::config_dir();
    std::fs::create_dir_all(config_dir)
        .with_context(|| format!("Failed to create config directory: {:?}", config_dir))?;
    debug!("Initialized paths - config: {:?}", config_dir);
    Ok(())
}

/// Check if debug mode is enabled via environment variable.
fn is_debug_mode() -> bool {
    std::env::var("CODESHELL_DEBUG").is_ok()
}

fn default_filter(debug_mode: bool) -> &'static str {
    if debug_mode {
        "codeshell=trace,host=trace,terminal=trace,terminal_view=trace,info"
    } else {
        "codeshell=info,warn"
    }
}

/// Initialize the logging system. Everything goes to stderr; stdout belongs
/// to the terminal view.
fn init_logging() {
    use tracing_subscriber::{fmt, prelude::*, EnvFilter};

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_filter(is_debug_mode())));

    tracing_subscriber::registry()
        .with(
            fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(true)
                .with_line_number(true),
        )
        .with(filter)
        .init();

    if is_debug_mode() {
        info!(
            "codeshell v{} starting up (DEBUG MODE ENABLED)",
            env!("CARGO_PKG_VERSION")
        );
        info!("Set RUST_LOG for custom log levels, e.g. RUST_LOG=terminal=trace");
    } else {
        info!("codeshell v{} starting up", env!("CARGO_PKG_VERSION"));
    }
}

/// Turns stdin reads into keys, holding back a UTF-8 sequence split
/// between reads.
#[derive(Debug, Default)]
struct InputDecoder {
    pending: Vec<u8>,
}

impl InputDecoder {
    fn decode(&mut self, bytes: &[u8]) -> Vec<Key> {
        self.pending.extend_from_slice(bytes);
        let valid = match std::str::from_utf8(&self.pending) {
            Ok(_) => self.pending.len(),
            Err(e) if e.error_len().is_none() => e.valid_up_to(),
            // Invalid bytes are not going to become valid; decode them lossily.
            Err(_) => self.pending.len(),
        };
        let complete: Vec<u8> = self.pending.drain(..valid).collect();
        Key::parse_input(&String::from_utf8_lossy(&complete))
    }
}

/// Feed stdin to the view until EOF.
async fn run_terminal(host: &Host) -> Result<()> {
    let config = host.config();
    let surface = AnsiSurface::new(std::io::stdout(), usize::from(config.cols()));
    let mut view =
        TerminalView::new(surface).with_truncation_notice(host.confirms_completion());

    let mut stdin = tokio::io::stdin();
    let mut decoder = InputDecoder::default();
    let mut buf = [0u8; STDIN_BUFFER_SIZE];
    loop {
        let n = stdin.read(&mut buf).await.context("Failed to read stdin")?;
        if n == 0 {
            debug!("stdin closed");
            return Ok(());
        }
        let keys = decoder.decode(&buf[..n]);
        view.feed(host.bridge(), &keys).await;
    }
}

async fn run() -> Result<()> {
    init_paths()?;
    settings::ensure_config_file();
    let config = settings::load_config();

    let host = Host::start(&config)?;
    info!(
        "Host ready in {:?}, reading keys from stdin",
        STARTUP_TIME.elapsed()
    );

    let result = run_terminal(&host).await;
    host.shutdown().await?;
    result
}

#[tokio::main]
async fn main() {
    let _ = *STARTUP_TIME;

    init_logging();

    if let Err(e) = run().await {
        error!("{:#}", e);
        std::process::exit(1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serial_test::serial;
    use test_case::test_case;

    #[test]
    #[serial]
    fn debug_mode_follows_env() {
        let previous = std::env::var("CODESHELL_DEBUG").ok();

        std::env::set_var("CODESHELL_DEBUG", "1");
        assert!(is_debug_mode());
        std::env::remove_var("CODESHELL_DEBUG");
        assert!(!is_debug_mode());

        if let Some(value) = previous {
            std::env::set_var("CODESHELL_DEBUG", value);
        }
    }

    #[test_case(true, "codeshell=trace" ; "debug")]
    #[test_case(false, "codeshell=info" ; "normal")]
    fn filter_matches_mode(debug_mode: bool, expected_prefix: &str) {
        assert!(default_filter(debug_mode).starts_with(expected_prefix));
    }

    #[test]
    fn decoder_joins_split_characters() {
        let mut decoder = InputDecoder::default();
        let bytes = "é\r".as_bytes();
        assert_eq!(decoder.decode(&bytes[..1]), Vec::<Key>::new());
        assert_eq!(decoder.decode(&bytes[1..]), vec![Key::Char('é'), Key::Enter]);
    }

    #[test]
    fn decoder_passes_invalid_bytes_lossily() {
        let mut decoder = InputDecoder::default();
        assert_eq!(
            decoder.decode(b"a\xFFb"),
            vec![Key::Char('a'), Key::Char('\u{FFFD}'), Key::Char('b')]
        );
    }
}
