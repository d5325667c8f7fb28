//! Saving editor buffers.

use serde::{Deserialize, Serialize};
use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};

const MISSING_FILE: &str = "File does not exist.";

/// Outcome of [`save_file`], serialized as `{"success", "error"?}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SaveFileResult {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl SaveFileResult {
    fn saved() -> Self {
        Self {
            success: true,
            error: None,
        }
    }

    fn failed(error: impl Into<String>) -> Self {
        Self {
            success: false,
            error: Some(error.into()),
        }
    }
}

/// Overwrite an existing file with `content`.
///
/// Never creates files: a path that does not exist is reported as a failure
/// and left untouched. Relative paths resolve against the working directory.
/// Failures are returned in the result, not as errors.
pub fn save_file(path: impl AsRef<Path>, content: &str) -> SaveFileResult {
    let path = match absolute(path.as_ref()) {
        Ok(path) => path,
        Err(e) => return SaveFileResult::failed(e.to_string()),
    };
    tracing::debug!(path = %path.display(), "Saving file");

    if !path.exists() {
        tracing::warn!(path = %path.display(), "Refusing to save: file does not exist");
        return SaveFileResult::failed(MISSING_FILE);
    }

    // No `create`: a file removed since the check is an error, not a new file.
    let written = OpenOptions::new()
        .write(true)
        .truncate(true)
        .open(&path)
        .and_then(|mut file| file.write_all(content.as_bytes()));

    match written {
        Ok(()) => {
            tracing::info!(path = %path.display(), bytes = content.len(), "Saved file");
            SaveFileResult::saved()
        }
        Err(e) => {
            tracing::warn!(path = %path.display(), "Failed to save file: {}", e);
            SaveFileResult::failed(e.to_string())
        }
    }
}

fn absolute(path: &Path) -> std::io::Result<PathBuf> {
    if path.is_absolute() {
        Ok(path.to_path_buf())
    } else {
        Ok(std::env::current_dir()?.join(path))
    }
}
