//! Docsync - file-system-like directory synchronization over git
//!
//! Docsync keeps a directory tree in step across participants by storing it
//! in a git repository: local edits are committed, remote changes fetched
//! and merged, and the result pushed back. Concurrent edits to the same file
//! never lose data; every version is kept side by side.
//!
//! # Architecture
//!
//! The codebase follows a strict layered architecture:
//!
//! - [`engine`] - Sync cycles driven per share
//! - [`repository`] - A synchronized working directory and its paths
//! - [`git`] - Single interface for all Git operations
//! - [`core`] - Domain types, configuration, and locking
//!
//! Watching the filesystem, scheduling cycles, and presenting results are
//! left to the embedding application.
//!
//! # Correctness Invariants
//!
//! 1. At most one mutating operation runs against a repository at a time
//! 2. Network and merge operations are bounded by timeouts
//! 3. A merge conflict keeps every version of the contested file
//! 4. A failing repository never takes the host process down

pub mod core;
pub mod engine;
pub mod git;
pub mod repository;
