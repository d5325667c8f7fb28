//! Shared helpers for codeshell crates.

use std::path::PathBuf;

/// Panic in debug builds, log error with backtrace in release.
///
/// For states the caller's protocol rules out, where a release build should
/// log and carry on.
#[macro_export]
macro_rules! debug_panic {
    ( $($fmt_arg:tt)* ) => {
        if cfg!(debug_assertions) {
            panic!( $($fmt_arg)* );
        } else {
            let backtrace = std::backtrace::Backtrace::capture();
            tracing::error!("{}\n{:?}", format_args!($($fmt_arg)*), backtrace);
        }
    };
}

/// Resolve a leading `~` to the home directory. Other paths are returned
/// as given; so is `~` when there is no home directory.
pub fn expand_home(path: &str) -> PathBuf {
    match path.strip_prefix("~/") {
        Some(rest) => dirs::home_dir()
            .map(|home| home.join(rest))
            .unwrap_or_else(|| PathBuf::from(path)),
        None if path == "~" => dirs::home_dir().unwrap_or_else(|| PathBuf::from(path)),
        None => PathBuf::from(path),
    }
}

/// Replace `\r\n` with `\n`. Lone `\r` is kept.
pub fn normalize_newlines(text: &str) -> String {
    text.replace("\r\n", "\n")
}
