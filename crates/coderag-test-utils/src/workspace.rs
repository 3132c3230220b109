//! Temporary on-disk workspaces.
//!
//! Helpers for tests that need a real config file, prompt overrides, or a
//! knowledge directory.

use std::path::{Path, PathBuf};

use coderag_config::AppConfig;
use tempfile::TempDir;

/// A test-scoped directory holding a config file and any extra files.
///
/// The directory is deleted when this value is dropped, even on panic.
pub struct TestWorkspace {
    pub config: AppConfig,
    pub config_path: PathBuf,
    temp_dir: TempDir,
}

impl TestWorkspace {
    /// Write `toml_content` to `coderag.toml` in a fresh temp directory and
    /// load it.
    pub async fn with_toml(toml_content: &str) -> Self {
        let temp_dir = TempDir::new().expect("failed to create temp dir");
        let config_path = temp_dir.path().join("coderag.toml");
        tokio::fs::write(&config_path, toml_content)
            .await
            .expect("failed to write test config");

        let config = AppConfig::load(&config_path)
            .await
            .expect("failed to parse test config");

        Self {
            config,
            config_path,
            temp_dir,
        }
    }

    /// A workspace with the default config.
    pub async fn default_config() -> Self {
        Self::with_toml("").await
    }

    pub fn root(&self) -> &Path {
        self.temp_dir.path()
    }

    /// Write a file relative to the workspace root, creating parent
    /// directories. Returns its absolute path.
    pub async fn write_file(&self, relative: &str, content: &str) -> PathBuf {
        let path = self.temp_dir.path().join(relative);
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .expect("failed to create parent directory");
        }
        tokio::fs::write(&path, content)
            .await
            .expect("failed to write test file");
        path
    }
}
