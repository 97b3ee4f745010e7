//! core::types
//!
//! Strong types for core domain concepts.
//!
//! # Types
//!
//! - [`Oid`] - Git object identifier (SHA)
//! - [`CommitRef`] - A commit read out of history, with its [`Author`]
//! - [`ConflictEntry`] - One contested path found while merging
//! - [`FileListingItem`] - A child entry of a listed directory
//! - [`Revision`] - Display form of a commit touching a path
//! - [`Meta`] - Author/size/modification summary for a path
//! - [`InvalidReason`] - Why a repository could not be opened
//!
//! # Validation
//!
//! These types enforce validity at construction time. Invalid values
//! cannot be represented, preventing entire classes of bugs.
//!
//! # Examples
//!
//! ```
//! use docsync::core::types::{normalize_relative_path, Oid};
//!
//! let oid = Oid::new("abc123def4567890abc123def4567890abc12345").unwrap();
//! assert_eq!(oid.abbrev(), "abc123d");
//!
//! assert_eq!(normalize_relative_path("/directory//file/"), "directory/file");
//! assert!(Oid::new("not-a-sha").is_err());
//! ```

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors from type validation.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum TypeError {
    #[error("invalid object id: {0}")]
    InvalidOid(String),
}

/// A Git object identifier (SHA-1 or SHA-256).
///
/// OIDs are normalized to lowercase for consistency.
///
/// # Example
///
/// ```
/// use docsync::core::types::Oid;
///
/// // Create from hex string (normalized to lowercase)
/// let oid = Oid::new("ABC123DEF4567890ABC123DEF4567890ABC12345").unwrap();
/// assert_eq!(oid.as_str(), "abc123def4567890abc123def4567890abc12345");
///
/// // Get abbreviated form
/// assert_eq!(oid.short(7), "abc123d");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Oid(String);

impl Oid {
    /// Length of the abbreviated form used in conflict artifacts and revisions.
    pub const SHORT_LEN: usize = 7;

    /// Create a new validated object id.
    ///
    /// The OID is normalized to lowercase.
    ///
    /// # Errors
    ///
    /// Returns `TypeError::InvalidOid` if the string is not a valid hex OID.
    pub fn new(oid: impl Into<String>) -> Result<Self, TypeError> {
        let oid = oid.into().to_ascii_lowercase();
        Self::validate(&oid)?;
        Ok(Self(oid))
    }

    /// Get an abbreviated form of the OID.
    ///
    /// Returns the first `len` characters. If `len` exceeds the OID length,
    /// returns the full OID.
    pub fn short(&self, len: usize) -> &str {
        let end = len.min(self.0.len());
        &self.0[..end]
    }

    /// The 7 character prefix.
    ///
    /// Prefixes can collide in large histories; callers only use them for
    /// human-facing disambiguation.
    pub fn abbrev(&self) -> &str {
        self.short(Self::SHORT_LEN)
    }

    /// Validate an object id.
    fn validate(oid: &str) -> Result<(), TypeError> {
        // SHA-1 is 40 hex chars, SHA-256 is 64
        if oid.len() != 40 && oid.len() != 64 {
            return Err(TypeError::InvalidOid(format!(
                "expected 40 or 64 hex characters, got {}",
                oid.len()
            )));
        }
        if !oid.chars().all(|c| c.is_ascii_hexdigit()) {
            return Err(TypeError::InvalidOid(
                "object id must be hexadecimal".into(),
            ));
        }
        Ok(())
    }

    /// Get the object id as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for Oid {
    type Error = TypeError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        Self::new(s)
    }
}

impl From<Oid> for String {
    fn from(oid: Oid) -> Self {
        oid.0
    }
}

impl AsRef<str> for Oid {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for Oid {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Commit author.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Author {
    pub name: String,
    pub email: String,
    pub time: DateTime<Utc>,
}

impl Author {
    /// `Name <email>`, the key used by author counts.
    pub fn identity(&self) -> String {
        format!("{} <{}>", self.name, self.email)
    }
}

/// A commit read from the object store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CommitRef {
    /// The commit OID
    pub oid: Oid,
    /// Full commit message
    pub message: String,
    /// Commit author
    pub author: Author,
    /// Parent commits, in order (0 for a root commit, 2 for a merge)
    pub parents: Vec<Oid>,
}

impl CommitRef {
    /// Abbreviated commit id.
    pub fn short_oid(&self) -> &str {
        self.oid.abbrev()
    }

    /// First line of the message.
    pub fn subject(&self) -> &str {
        self.message.lines().next().unwrap_or("")
    }
}

/// A path both sides changed while merging.
///
/// The ids are blob ids. `ancestor` is absent when the path is new on both
/// sides; `local` or `remote` is absent when that side deleted the path.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ConflictEntry {
    /// Slash separated path relative to the repository root
    pub path: String,
    pub ancestor: Option<Oid>,
    pub local: Option<Oid>,
    pub remote: Option<Oid>,
}

/// Child entry of a directory listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FileListingItem {
    pub name: String,
    pub is_directory: bool,
}

/// One historical commit touching a path, in display form.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Revision {
    /// Abbreviated commit id
    pub commit: String,
    /// First line of the commit message
    pub subject: String,
    /// Author name
    pub author: String,
    /// Author timestamp
    pub date: DateTime<Utc>,
}

impl From<&CommitRef> for Revision {
    fn from(commit: &CommitRef) -> Self {
        Self {
            commit: commit.short_oid().to_string(),
            subject: commit.subject().to_string(),
            author: commit.author.name.clone(),
            date: commit.author.time,
        }
    }
}

/// Author identity (`Name <email>`) to commit count.
pub type AuthorCount = HashMap<String, usize>;

/// Summary of a path's last change and size.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Meta {
    /// Author name of the most recent commit touching the path
    pub author: String,
    /// Size in bytes; -1 for empty files and empty directories
    pub size: i64,
    /// Author timestamp of the most recent commit touching the path
    pub modified: DateTime<Utc>,
}

/// Why a repository is unusable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum InvalidReason {
    /// The root directory does not exist
    DirectoryMissing,
    /// The root exists but holds no object store
    NoRepository,
}

impl std::fmt::Display for InvalidReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            InvalidReason::DirectoryMissing => write!(f, "directory missing"),
            InvalidReason::NoRepository => write!(f, "no repository"),
        }
    }
}

/// Normalize a repository relative path.
///
/// The result is slash separated with no leading or trailing slash, no
/// empty or `.` components. `..` removes the previous component and never
/// climbs above the root, which is the empty string.
pub fn normalize_relative_path(path: &str) -> String {
    let mut components: Vec<&str> = Vec::new();
    for component in path.split(['/', '\\']) {
        match component {
            "" | "." => {}
            ".." => {
                components.pop();
            }
            _ => components.push(component),
        }
    }
    components.join("/")
}

/// Parent directory of a normalized relative path; `""` at the root.
pub fn relative_dirname(path: &str) -> &str {
    match path.rfind('/') {
        Some(idx) => &path[..idx],
        None => "",
    }
}

/// Final component of a normalized relative path.
pub fn relative_basename(path: &str) -> &str {
    match path.rfind('/') {
        Some(idx) => &path[idx + 1..],
        None => path,
    }
}
