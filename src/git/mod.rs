//! git
//!
//! Single interface for all Git operations.
//!
//! # Architecture
//!
//! This module is the **ONLY doorway** to Git. All object store reads and
//! writes flow through [`Git`]. No other module imports `git2`, and nothing
//! shells out to the git CLI.
//!
//! # Responsibilities
//!
//! - Opening, initializing and cloning repositories
//! - Ref resolution and enumeration
//! - Staging, committing and history queries
//! - Fetch, push and merge, bounded by timeouts
//! - Searching tracked files
//!
//! # Invariants
//!
//! - Local operations return `Result<_, GitError>`
//! - Timeout-bounded operations return [`Outcome`] and never raise
//! - All operations return strong types (`Oid`, `CommitRef`)
//!
//! # Example
//!
//! ```ignore
//! use docsync::git::{Git, Outcome};
//! use std::path::Path;
//! use std::time::Duration;
//!
//! let git = Git::open(Path::new("."))?;
//! match git.fetch("origin", "master", Duration::from_secs(120)) {
//!     Outcome::Ok(()) => {}
//!     Outcome::Timeout => eprintln!("fetch timed out"),
//!     other => eprintln!("fetch failed: {other:?}"),
//! }
//! ```

pub mod fault_injection;
mod interface;
mod merge;
mod network;

pub use interface::{Git, GitError, GrepMatch, Outcome, WorktreeStatus};
pub use merge::ConflictSide;
