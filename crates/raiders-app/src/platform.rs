//! Directory resolution for the client binary.

use std::io;
use std::path::{Path, PathBuf};

/// Errors that can occur while resolving or creating directories.
#[derive(Debug, thiserror::Error)]
pub enum PlatformError {
    /// The OS did not provide a configuration directory.
    #[error("could not determine OS configuration directory")]
    NoConfigDir,

    /// Creating a directory failed.
    #[error("platform I/O error: {0}")]
    Io(#[from] io::Error),
}

/// Where the client keeps its files.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppDirs {
    /// Holds `config.ron`.
    pub config_dir: PathBuf,
    /// Holds the JSON log file.
    pub log_dir: PathBuf,
}

const APP_NAME: &str = "raiders";

impl AppDirs {
    /// Platform directories, e.g. `~/.config/raiders` on Linux.
    pub fn resolve() -> Result<Self, PlatformError> {
        let base = dirs::config_dir().ok_or(PlatformError::NoConfigDir)?;
        Ok(Self::with_config_dir(base.join(APP_NAME)))
    }

    /// Directories rooted at an explicit config directory, as given by `--config`.
    pub fn with_config_dir(config_dir: impl Into<PathBuf>) -> Self {
        let config_dir = config_dir.into();
        Self {
            log_dir: config_dir.join("logs"),
            config_dir,
        }
    }

    /// Create all directories on disk.
    pub fn create(&self) -> Result<(), PlatformError> {
        std::fs::create_dir_all(&self.config_dir)?;
        std::fs::create_dir_all(&self.log_dir)?;
        Ok(())
    }

    pub fn log_dir(&self) -> &Path {
        &self.log_dir
    }
}
