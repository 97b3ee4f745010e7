//! core::config
//!
//! Configuration schema and loading.
//!
//! # Locations
//!
//! Searched in order, first existing file wins:
//! 1. `$DOCSYNC_CONFIG` if set
//! 2. `$XDG_CONFIG_HOME/docsync/config.toml`
//! 3. `~/.docsync/config.toml`
//!
//! Missing files are not an error; defaults are used. Configuration is
//! read-only here, persisting edits belongs to the embedding application.
//!
//! # Example
//!
//! ```no_run
//! use docsync::core::config::Config;
//!
//! let config = Config::load().unwrap();
//! for share in config.shares() {
//!     println!("{} ({:?})", share.path.display(), share.sync_type);
//! }
//! println!("fetch timeout: {:?}", config.timeouts().fetch);
//! ```

pub mod schema;

pub use schema::{GlobalConfig, Share, SyncType, TimeoutConfig, Timeouts};

use std::fs;
use std::path::{Path, PathBuf};

use thiserror::Error;

/// Errors from configuration operations.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file '{path}': {source}")]
    ReadError {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to parse config file '{path}': {message}")]
    ParseError { path: PathBuf, message: String },

    #[error("invalid config value: {0}")]
    InvalidValue(String),
}

/// Loaded configuration.
#[derive(Debug, Clone, Default)]
pub struct Config {
    pub global: GlobalConfig,
    /// Path the configuration was read from (if any)
    loaded_from: Option<PathBuf>,
}

impl Config {
    /// Load configuration from the default locations.
    ///
    /// # Errors
    ///
    /// Returns an error if a config file exists but cannot be read, parsed
    /// or validated.
    pub fn load() -> Result<Self, ConfigError> {
        match Self::locate() {
            Some(path) => Self::load_from(&path),
            None => Ok(Self::default()),
        }
    }

    /// Load configuration from an explicit file.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        let contents = fs::read_to_string(path).map_err(|e| ConfigError::ReadError {
            path: path.to_path_buf(),
            source: e,
        })?;

        let global: GlobalConfig =
            toml::from_str(&contents).map_err(|e| ConfigError::ParseError {
                path: path.to_path_buf(),
                message: e.to_string(),
            })?;
        global.validate()?;

        tracing::debug!(path = %path.display(), shares = global.shares.len(), "loaded config");

        Ok(Self {
            global,
            loaded_from: Some(path.to_path_buf()),
        })
    }

    fn locate() -> Option<PathBuf> {
        // 1. Check $DOCSYNC_CONFIG
        if let Ok(path) = std::env::var("DOCSYNC_CONFIG") {
            let path = PathBuf::from(path);
            if path.exists() {
                return Some(path);
            }
        }

        // 2. Check $XDG_CONFIG_HOME/docsync/config.toml
        if let Ok(xdg_home) = std::env::var("XDG_CONFIG_HOME") {
            let path = PathBuf::from(xdg_home).join("docsync/config.toml");
            if path.exists() {
                return Some(path);
            }
        }

        // 3. Check ~/.docsync/config.toml
        let path = dirs::home_dir()?.join(".docsync/config.toml");
        path.exists().then_some(path)
    }

    pub fn timeouts(&self) -> Timeouts {
        self.global
            .timeouts
            .as_ref()
            .map(TimeoutConfig::resolve)
            .unwrap_or_default()
    }

    pub fn shares(&self) -> &[Share] {
        &self.global.shares
    }

    pub fn loaded_from(&self) -> Option<&Path> {
        self.loaded_from.as_deref()
    }
}
