//! Centralized path management for codeshell.
//!
//! Directories are lazily resolved and cached on first access.

use std::path::PathBuf;
use std::sync::OnceLock;

const APP_DIR_NAME: &str = "codeshell";

static CONFIG_DIR: OnceLock<PathBuf> = OnceLock::new();

/// ~/.config/codeshell (or platform equivalent)
pub fn config_dir() -> &'static PathBuf {
    CONFIG_DIR.get_or_init(|| {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(APP_DIR_NAME)
    })
}

/// Config file path: config_dir()/config.toml
pub fn config_file() -> PathBuf {
    config_dir().join("config.toml")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_dir_ends_with_app_name() {
        let dir = config_dir();
        assert!(
            dir.ends_with("codeshell"),
            "config_dir should end with 'codeshell': {:?}",
            dir
        );
    }

    #[test]
    fn config_file_is_toml() {
        let path = config_file();
        assert_eq!(path.extension().and_then(|e| e.to_str()), Some("toml"));
    }
}
