//! Shared helpers for the host integration tests.

// Not every test binary uses every helper.
#![allow(dead_code)]

use host::Host;
use settings::Config;
use std::path::{Path, PathBuf};
use std::time::Duration;

pub use tempfile::{tempdir, TempDir};

/// Upper bound for anything that should finish promptly.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(5);

/// How long to wait when asserting that nothing happens.
pub const QUIET_PERIOD: Duration = Duration::from_millis(300);

/// Config for a host running `/bin/sh` over pipes.
pub fn sh_config() -> Config {
    Config {
        shell: Some("/bin/sh".to_string()),
        ..Config::default()
    }
}

pub fn start_host() -> Host {
    Host::start(&sh_config()).expect("host should start with /bin/sh")
}

/// Scratch directory with helpers for seeding files.
pub struct TestEnv {
    pub temp_dir: TempDir,
}

impl TestEnv {
    pub fn new() -> Self {
        Self {
            temp_dir: tempdir().expect("Failed to create temp directory"),
        }
    }

    pub fn path(&self) -> &Path {
        self.temp_dir.path()
    }

    /// Create `name` with `content` and return its path.
    pub fn file(&self, name: &str, content: &str) -> PathBuf {
        let path = self.temp_dir.path().join(name);
        std::fs::write(&path, content).expect("Failed to seed file");
        path
    }
}

impl Default for TestEnv {
    fn default() -> Self {
        Self::new()
    }
}
