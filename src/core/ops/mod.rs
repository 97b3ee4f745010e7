//! core::ops
//!
//! Operation locking.
//!
//! # Modules
//!
//! - [`lock`] - Exclusive repository lock
//!
//! # Architecture
//!
//! Every sync cycle:
//! 1. Acquires the exclusive repo lock
//! 2. Commits, fetches, merges and pushes
//! 3. Releases the lock when the guard drops
//!
//! # Example
//!
//! ```ignore
//! use docsync::core::ops::lock::RepoLock;
//!
//! let lock = RepoLock::acquire(git_dir)?;
//! repository.commit()?;
//! drop(lock);
//! ```

pub mod lock;
