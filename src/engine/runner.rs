//! engine::runner
//!
//! One sync cycle per call for a single share.
//!
//! # Lifecycle
//!
//! ```text
//! Lock -> Commit -> Fetch -> Merge -> Push -> Record
//! ```
//!
//! - **Lock**: take the repository's [`RepoLock`] for the whole cycle
//! - **Commit**: only for [`SyncType::Full`]
//! - **Fetch**: the cycle stops here unless it succeeded, and always for
//!   [`SyncType::Fetch`]
//! - **Merge**: conflicts are materialized and committed; error text stops
//!   the cycle
//! - **Push**: a rejection is reported, never retried here
//! - **Record**: HEAD becomes the last synced commit
//!
//! # Invariants
//!
//! - The runner owns its repository, so `&mut self` serializes cycles in
//!   process; the lock serializes them across processes
//! - Backend failures end up in the [`SyncReport`], never in `Err`
//!
//! # Example
//!
//! ```ignore
//! use docsync::core::config::{Share, Timeouts};
//! use docsync::engine::runner::Runner;
//!
//! let mut runner = Runner::from_share(&Share::new("/home/me/docs"), Timeouts::default());
//! let report = runner.sync_changes()?;
//! for path in report.conflicts() {
//!     println!("conflict in {path}");
//! }
//! ```

use thiserror::Error;

use crate::core::config::{Share, SyncType, Timeouts};
use crate::core::ops::lock::{LockError, RepoLock};
use crate::core::types::{AuthorCount, InvalidReason, Oid};
use crate::repository::{FetchResult, MergeResult, PushResult, RepoError, Repository};

/// Errors from a sync cycle.
#[derive(Debug, Error)]
pub enum RunError {
    #[error("repository is not valid: {0}")]
    Invalid(InvalidReason),

    #[error(transparent)]
    Lock(#[from] LockError),

    #[error("commit failed: {0}")]
    Commit(#[from] RepoError),
}

/// What each step of a cycle produced. Steps that did not run are `None`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SyncReport {
    /// Whether anything was committed
    pub commit: Option<bool>,
    pub fetch: Option<FetchResult>,
    pub merge: Option<MergeResult>,
    /// Commits per author that arrived since the previous cycle
    pub authors: AuthorCount,
    pub push: Option<PushResult>,
}

impl SyncReport {
    /// Paths that conflicted while merging.
    pub fn conflicts(&self) -> &[String] {
        match &self.merge {
            Some(MergeResult::Conflicted(paths)) => paths,
            _ => &[],
        }
    }

    /// Whether local and remote agree after the cycle.
    pub fn is_synced(&self) -> bool {
        matches!(self.push, Some(PushResult::Ok | PushResult::Nothing))
    }
}

/// Drives sync cycles for one repository.
#[derive(Debug)]
pub struct Runner {
    repository: Repository,
    sync_type: SyncType,
    last_synced: Option<Oid>,
}

impl Runner {
    pub fn new(repository: Repository, sync_type: SyncType) -> Self {
        let last_synced = repository.current_oid();
        Self {
            repository,
            sync_type,
            last_synced,
        }
    }

    pub fn from_share(share: &Share, timeouts: Timeouts) -> Self {
        Self::new(
            Repository::from_share(share).with_timeouts(timeouts),
            share.sync_type,
        )
    }

    pub fn repository(&self) -> &Repository {
        &self.repository
    }

    /// HEAD as of the end of the last cycle.
    pub fn last_synced(&self) -> Option<&Oid> {
        self.last_synced.as_ref()
    }

    /// Run one cycle.
    ///
    /// # Errors
    ///
    /// - [`RunError::Invalid`] if the repository cannot be used
    /// - [`RunError::Lock`] if another process is syncing it
    /// - [`RunError::Commit`] if local changes cannot be committed
    pub fn sync_changes(&mut self) -> Result<SyncReport, RunError> {
        let Some(git_dir) = self.repository.git_dir() else {
            return Err(RunError::Invalid(
                self.repository
                    .invalid_reason()
                    .unwrap_or(InvalidReason::NoRepository),
            ));
        };
        let _lock = RepoLock::acquire(git_dir)?;

        let mut report = SyncReport::default();

        if self.sync_type == SyncType::Full {
            report.commit = self.repository.commit()?;
        }

        report.fetch = self.repository.fetch();
        if report.fetch != Some(FetchResult::Ok) || self.sync_type == SyncType::Fetch {
            tracing::debug!(fetch = ?report.fetch, "sync cycle ends after fetch");
            return Ok(report);
        }

        report.merge = self.repository.merge();
        if let Some(MergeResult::Error(message)) = &report.merge {
            tracing::warn!(error = %message, "merge failed, skipping push");
            return Ok(report);
        }

        report.authors = self.repository.author_count(self.last_synced.as_ref());
        report.push = self.repository.push();
        self.last_synced = self.repository.current_oid();

        tracing::info!(
            committed = ?report.commit,
            conflicts = report.conflicts().len(),
            push = ?report.push,
            "sync cycle finished"
        );
        Ok(report)
    }
}
