//! core::config::schema
//!
//! Configuration schema types.
//!
//! # Example
//!
//! ```toml
//! [timeouts]
//! fetch_secs = 120
//! merge_secs = 120
//! push_secs = 120
//! grep_secs = 30
//!
//! [[shares]]
//! path = "/home/me/docs"
//! remote_name = "origin"
//! branch_name = "master"
//! sync_type = "full"
//! ```
//!
//! # Validation
//!
//! Values are validated after parsing: timeouts must be positive and share
//! paths non-empty.

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::ConfigError;

/// Top level configuration file.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct GlobalConfig {
    /// Backend timeouts
    pub timeouts: Option<TimeoutConfig>,

    /// Shared directories
    pub shares: Vec<Share>,
}

impl GlobalConfig {
    /// Validate the configuration values.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::InvalidValue` if any value is invalid.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if let Some(timeouts) = &self.timeouts {
            timeouts.validate()?;
        }

        for share in &self.shares {
            if share.path.as_os_str().is_empty() {
                return Err(ConfigError::InvalidValue(
                    "share path cannot be empty".into(),
                ));
            }
        }

        Ok(())
    }
}

/// Timeout overrides, in seconds.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct TimeoutConfig {
    pub fetch_secs: Option<u64>,
    pub merge_secs: Option<u64>,
    pub push_secs: Option<u64>,
    pub grep_secs: Option<u64>,
}

impl TimeoutConfig {
    fn validate(&self) -> Result<(), ConfigError> {
        let fields = [
            ("fetch_secs", self.fetch_secs),
            ("merge_secs", self.merge_secs),
            ("push_secs", self.push_secs),
            ("grep_secs", self.grep_secs),
        ];
        for (name, value) in fields {
            if value == Some(0) {
                return Err(ConfigError::InvalidValue(format!(
                    "timeouts.{} must be greater than zero",
                    name
                )));
            }
        }
        Ok(())
    }

    /// Apply the overrides on top of the defaults.
    pub fn resolve(&self) -> Timeouts {
        let defaults = Timeouts::default();
        Timeouts {
            fetch: self.fetch_secs.map(Duration::from_secs).unwrap_or(defaults.fetch),
            merge: self.merge_secs.map(Duration::from_secs).unwrap_or(defaults.merge),
            push: self.push_secs.map(Duration::from_secs).unwrap_or(defaults.push),
            grep: self.grep_secs.map(Duration::from_secs).unwrap_or(defaults.grep),
        }
    }
}

/// Resolved timeouts for backend operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Timeouts {
    pub fetch: Duration,
    pub merge: Duration,
    pub push: Duration,
    pub grep: Duration,
}

impl Default for Timeouts {
    fn default() -> Self {
        Self {
            fetch: Duration::from_secs(120),
            merge: Duration::from_secs(120),
            push: Duration::from_secs(120),
            grep: Duration::from_secs(30),
        }
    }
}

/// Which half of the sync cycle a share runs.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncType {
    /// Commit, fetch, merge and push
    #[default]
    Full,
    /// Fetch only
    Fetch,
}

/// A synchronized directory and where it syncs to.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct Share {
    /// Working directory of the repository
    pub path: PathBuf,

    /// Remote to sync with (defaults to "origin")
    #[serde(default)]
    pub remote_name: Option<String>,

    /// Branch to sync (defaults to the branch HEAD points at)
    #[serde(default)]
    pub branch_name: Option<String>,

    #[serde(default)]
    pub sync_type: SyncType,
}

impl Share {
    /// A share for `path` using default remote, branch and sync type.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            remote_name: None,
            branch_name: None,
            sync_type: SyncType::Full,
        }
    }
}
