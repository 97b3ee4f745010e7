//! engine
//!
//! Drives sync cycles: Commit -> Fetch -> Merge -> Push.
//!
//! # Architecture
//!
//! The engine sits between the embedding application's scheduler and the
//! [`Repository`](crate::repository::Repository). The scheduler decides
//! *when* a share syncs; a [`Runner`] decides *how*, one cycle per call.
//!
//! # Invariants
//!
//! - One runner per share; runners for different shares are independent
//! - Every cycle holds the repository lock from start to finish
//! - Backend failures are reported, never retried by the engine
//!
//! # Example
//!
//! ```ignore
//! use docsync::core::config::Config;
//! use docsync::engine::Runner;
//!
//! let config = Config::load()?;
//! let mut runners: Vec<Runner> = config
//!     .shares()
//!     .iter()
//!     .map(|share| Runner::from_share(share, config.timeouts()))
//!     .collect();
//!
//! for runner in &mut runners {
//!     let report = runner.sync_changes()?;
//! }
//! ```

pub mod runner;

pub use runner::{RunError, Runner, SyncReport};
