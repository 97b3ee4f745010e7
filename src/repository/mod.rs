//! repository
//!
//! A synchronized working directory.
//!
//! # Architecture
//!
//! [`Repository`] binds one working directory to the [`Git`] backend and
//! exposes the sync primitives (commit, fetch, merge, push) plus the history
//! queries that [`RepoPath`] builds on.
//!
//! Construction never fails. A missing directory or a directory without a
//! repository yields an invalid `Repository` whose queries degrade to
//! `None`, `false` or empty results.
//!
//! # Results
//!
//! Fetch, merge and push report through [`FetchResult`], [`MergeResult`]
//! and [`PushResult`]. Timeouts and backend failures are carried as
//! `Error(text)` values so one broken share never takes the host down.
//!
//! # Concurrency
//!
//! At most one mutating operation may run against a repository at a time.
//! [`Runner`](crate::engine::runner::Runner) enforces this for sync cycles;
//! other callers must serialize themselves.
//!
//! # Example
//!
//! ```no_run
//! use docsync::repository::{MergeResult, Repository};
//!
//! let repository = Repository::open("/home/me/docs");
//! if repository.is_dirty() {
//!     repository.commit().unwrap();
//! }
//! if let Some(MergeResult::Conflicted(paths)) = repository.merge() {
//!     println!("kept all versions of {paths:?}");
//! }
//! ```

pub mod path;

pub use path::{PathError, RepoPath};

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use regex::RegexBuilder;
use thiserror::Error;

use crate::core::config::{Share, Timeouts};
use crate::core::types::{
    normalize_relative_path, AuthorCount, CommitRef, ConflictEntry, InvalidReason, Oid,
};
use crate::git::{ConflictSide, Git, GitError, Outcome};

/// Errors from repository operations.
#[derive(Debug, Error)]
pub enum RepoError {
    #[error(transparent)]
    Git(#[from] GitError),

    #[error("i/o error at {path}: {source}")]
    Io {
        path: PathBuf,
        source: io::Error,
    },

    #[error("clone of {url} failed: {message}")]
    Clone { url: String, message: String },
}

impl RepoError {
    fn io(path: &Path, source: io::Error) -> Self {
        RepoError::Io {
            path: path.to_path_buf(),
            source,
        }
    }
}

/// Result of [`Repository::fetch`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FetchResult {
    Ok,
    NoRemote,
    /// Timeout description or backend error text
    Error(String),
}

/// Result of [`Repository::merge`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MergeResult {
    Ok,
    NoRemote,
    /// Paths that conflicted; each was replaced by its renamed versions
    /// and the merge committed.
    Conflicted(Vec<String>),
    /// Timeout description or backend error text
    Error(String),
}

/// Result of [`Repository::push`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PushResult {
    Ok,
    NoRemote,
    /// Local history is not ahead of the remote.
    Nothing,
    /// The remote has commits the local side lacks; fetch and merge first.
    Conflict,
    /// Timeout description or backend error text
    Error(String),
}

enum State {
    Valid(Git),
    Invalid(InvalidReason),
}

/// One working directory synchronized through git.
pub struct Repository {
    root: PathBuf,
    remote_name: String,
    branch_name: Option<String>,
    timeouts: Timeouts,
    state: State,
}

impl std::fmt::Debug for Repository {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Repository")
            .field("root", &self.root)
            .field("remote_name", &self.remote_name)
            .field("branch_name", &self.branch_name)
            .field("valid", &self.is_valid())
            .finish()
    }
}

impl Repository {
    /// Pending commit message, read by [`commit`](Self::commit).
    pub const COMMIT_MESSAGE_FILE: &'static str = ".gitmessage~";

    /// Placeholder written into empty directories so git tracks them.
    pub const DIRECTORY_PLACEHOLDER: &'static str = ".gitignore";

    /// Message used when no pending commit message exists.
    pub const DEFAULT_COMMIT_MESSAGE: &'static str = "Auto-commit from gitdocs";

    pub const DEFAULT_REMOTE: &'static str = "origin";

    pub const DEFAULT_BRANCH: &'static str = "master";

    /// Open the repository at `path`, syncing with `origin` on the branch
    /// HEAD points at.
    pub fn open(path: impl AsRef<Path>) -> Self {
        Self::from_share(&Share::new(path.as_ref()))
    }

    /// Open the repository a share describes.
    pub fn from_share(share: &Share) -> Self {
        let root = std::path::absolute(&share.path).unwrap_or_else(|_| share.path.clone());

        let state = if !root.is_dir() {
            State::Invalid(InvalidReason::DirectoryMissing)
        } else {
            match Git::open(&root) {
                Ok(git) => State::Valid(git),
                Err(e) => {
                    tracing::debug!(root = %root.display(), error = %e, "not a repository");
                    State::Invalid(InvalidReason::NoRepository)
                }
            }
        };

        Self {
            root,
            remote_name: share
                .remote_name
                .clone()
                .unwrap_or_else(|| Self::DEFAULT_REMOTE.to_string()),
            branch_name: share.branch_name.clone(),
            timeouts: Timeouts::default(),
            state,
        }
    }

    /// Clone `url` into `path`.
    ///
    /// # Errors
    ///
    /// [`RepoError::Clone`] if the remote is unreachable or invalid.
    pub fn clone_at(path: impl AsRef<Path>, url: &str) -> Result<Self, RepoError> {
        let path = path.as_ref();
        match Git::clone(url, path, Timeouts::default().fetch) {
            Ok(_) => {
                tracing::info!(url, path = %path.display(), "cloned repository");
                Ok(Self::open(path))
            }
            Err(GitError::CloneFailed { url, message }) => Err(RepoError::Clone { url, message }),
            Err(e) => Err(e.into()),
        }
    }

    /// Create an empty repository at `path`, creating the directory if
    /// needed.
    pub fn init(path: impl AsRef<Path>) -> Result<Self, RepoError> {
        let path = path.as_ref();
        fs::create_dir_all(path).map_err(|e| RepoError::io(path, e))?;
        Git::init(path)?;
        Ok(Self::open(path))
    }

    /// Replace the default operation timeouts.
    pub fn with_timeouts(mut self, timeouts: Timeouts) -> Self {
        self.timeouts = timeouts;
        self
    }

    fn git(&self) -> Option<&Git> {
        match &self.state {
            State::Valid(git) => Some(git),
            State::Invalid(_) => None,
        }
    }

    pub fn is_valid(&self) -> bool {
        matches!(self.state, State::Valid(_))
    }

    pub fn invalid_reason(&self) -> Option<InvalidReason> {
        match self.state {
            State::Valid(_) => None,
            State::Invalid(reason) => Some(reason),
        }
    }

    /// Absolute working directory, `None` when invalid.
    pub fn root(&self) -> Option<&Path> {
        self.git().map(|_| self.root.as_path())
    }

    pub fn git_dir(&self) -> Option<&Path> {
        self.git().map(Git::git_dir)
    }

    pub fn remote_name(&self) -> &str {
        &self.remote_name
    }

    /// Branch synchronized with the remote.
    pub fn branch_name(&self) -> String {
        self.branch_name
            .clone()
            .or_else(|| self.git().and_then(Git::head_branch))
            .unwrap_or_else(|| Self::DEFAULT_BRANCH.to_string())
    }

    /// Handle on `relative_path` inside this repository.
    pub fn path(&self, relative_path: &str) -> RepoPath<'_> {
        RepoPath::new(self, relative_path)
    }

    pub fn available_remotes(&self) -> Option<Vec<String>> {
        let git = self.git()?;
        match git.list_remotes() {
            Ok(remotes) => Some(remotes),
            Err(e) => {
                tracing::warn!(root = %self.root.display(), error = %e, "cannot list remotes");
                Some(Vec::new())
            }
        }
    }

    pub fn available_branches(&self) -> Option<Vec<String>> {
        let git = self.git()?;
        match git.list_branches() {
            Ok(branches) => Some(branches),
            Err(e) => {
                tracing::warn!(root = %self.root.display(), error = %e, "cannot list branches");
                Some(Vec::new())
            }
        }
    }

    /// HEAD commit, `None` before the first commit.
    pub fn current_oid(&self) -> Option<Oid> {
        let git = self.git()?;
        match git.head_oid() {
            Ok(oid) => oid,
            Err(e) => {
                tracing::warn!(root = %self.root.display(), error = %e, "cannot read HEAD");
                None
            }
        }
    }

    fn tracking_ref(&self) -> String {
        format!("refs/remotes/{}/{}", self.remote_name, self.branch_name())
    }

    fn has_remote(&self, git: &Git) -> bool {
        git.has_remote(&self.remote_name)
    }

    fn remote_oid(&self, git: &Git) -> Option<Oid> {
        let refname = self.tracking_ref();
        match git.try_resolve_ref(&refname) {
            Ok(oid) => oid,
            Err(e) => {
                tracing::warn!(refname, error = %e, "cannot resolve tracking ref");
                None
            }
        }
    }

    // =========================================================================
    // Divergence
    // =========================================================================

    /// Whether the working tree differs from HEAD, untracked files and
    /// empty directories included.
    pub fn is_dirty(&self) -> bool {
        let Some(git) = self.git() else {
            return false;
        };

        match git.worktree_status(&[Self::COMMIT_MESSAGE_FILE]) {
            Ok(status) if !status.is_clean() => return true,
            Ok(_) => {}
            Err(e) => {
                tracing::warn!(root = %self.root.display(), error = %e, "status failed");
                return false;
            }
        }

        !self.empty_directories().is_empty()
    }

    /// Whether local HEAD and the remote tracking ref point at different
    /// commits.
    pub fn need_sync(&self) -> bool {
        let Some(git) = self.git() else {
            return false;
        };
        if !self.has_remote(git) {
            return false;
        }

        let local = git.head_oid().ok().flatten();
        local != self.remote_oid(git)
    }

    /// Directories under the root with no entries at all.
    fn empty_directories(&self) -> Vec<PathBuf> {
        let mut found = Vec::new();
        collect_empty_directories(&self.root, &mut found);
        found
    }

    // =========================================================================
    // Sync Primitives
    // =========================================================================

    pub fn fetch(&self) -> Option<FetchResult> {
        let git = self.git()?;
        if !self.has_remote(git) {
            return Some(FetchResult::NoRemote);
        }

        let branch = self.branch_name();
        tracing::debug!(root = %self.root.display(), remote = %self.remote_name, branch, "fetching");

        Some(
            match git.fetch(&self.remote_name, &branch, self.timeouts.fetch) {
                Outcome::Ok(()) => FetchResult::Ok,
                Outcome::Timeout => {
                    FetchResult::Error(format!("Fetch timed out for {}", self.root.display()))
                }
                Outcome::Failed(message) => FetchResult::Error(message),
                Outcome::Conflict(_) => FetchResult::Error("fetch reported a conflict".into()),
            },
        )
    }

    /// Merge the remote tracking ref into the working tree.
    ///
    /// Every conflicting path is replaced by its ancestor, local and remote
    /// versions (see [`conflict_artifacts`]) and the merge is committed.
    pub fn merge(&self) -> Option<MergeResult> {
        let git = self.git()?;
        if !self.has_remote(git) {
            return Some(MergeResult::NoRemote);
        }

        let upstream = self.tracking_ref();
        let message = format!("Merge {} into {}", upstream, self.branch_name());

        Some(
            match git.merge(&upstream, &message, self.timeouts.merge, &conflict_artifacts) {
                Outcome::Ok(()) => MergeResult::Ok,
                Outcome::Conflict(entries) => {
                    MergeResult::Conflicted(entries.into_iter().map(|e| e.path).collect())
                }
                Outcome::Timeout => {
                    MergeResult::Error(format!("Merge timed out for {}", self.root.display()))
                }
                Outcome::Failed(message) => MergeResult::Error(message),
            },
        )
    }

    /// Commit every change in the working tree.
    ///
    /// Returns `None` when invalid, `Some(false)` when there was nothing to
    /// commit.
    pub fn commit(&self) -> Result<Option<bool>, RepoError> {
        let Some(git) = self.git() else {
            return Ok(None);
        };
        if !self.is_dirty() {
            return Ok(Some(false));
        }

        for directory in self.empty_directories() {
            let placeholder = directory.join(Self::DIRECTORY_PLACEHOLDER);
            fs::write(&placeholder, "").map_err(|e| RepoError::io(&placeholder, e))?;
        }

        let tree = git.stage_all(&[Self::COMMIT_MESSAGE_FILE])?;

        let message_file = self.root.join(Self::COMMIT_MESSAGE_FILE);
        let message = match fs::read_to_string(&message_file) {
            Ok(text) if !text.is_empty() => text,
            Ok(_) => Self::DEFAULT_COMMIT_MESSAGE.to_string(),
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                Self::DEFAULT_COMMIT_MESSAGE.to_string()
            }
            Err(e) => return Err(RepoError::io(&message_file, e)),
        };

        let oid = git.commit_tree(&tree, &format!("{}\n", message.trim_end_matches('\n')))?;
        remove_if_present(&message_file)?;

        tracing::info!(root = %self.root.display(), oid = %oid.abbrev(), "committed changes");
        Ok(Some(true))
    }

    pub fn push(&self) -> Option<PushResult> {
        let git = self.git()?;
        if !self.has_remote(git) {
            return Some(PushResult::NoRemote);
        }

        let ahead = match (git.head_oid().ok().flatten(), self.remote_oid(git)) {
            (None, _) => false,
            (Some(_), None) => true,
            (Some(local), Some(remote)) => match git.ahead_behind(&local, &remote) {
                Ok((ahead, _)) => ahead > 0,
                Err(e) => {
                    tracing::warn!(error = %e, "ahead/behind failed, pushing anyway");
                    true
                }
            },
        };
        if !ahead {
            return Some(PushResult::Nothing);
        }

        let branch = self.branch_name();
        tracing::debug!(root = %self.root.display(), remote = %self.remote_name, branch, "pushing");

        Some(match git.push(&self.remote_name, &branch, self.timeouts.push) {
            Outcome::Ok(()) => PushResult::Ok,
            Outcome::Conflict(_) => PushResult::Conflict,
            Outcome::Timeout => {
                PushResult::Error(format!("Push timed out for {}", self.root.display()))
            }
            Outcome::Failed(message) => PushResult::Error(message),
        })
    }

    // =========================================================================
    // Queries
    // =========================================================================

    /// Case-insensitive search of tracked files.
    ///
    /// Calls `on_match(file, line)` for every matching line and returns the
    /// matches as `file:line` lines. Failures and timeouts yield no matches.
    pub fn grep<F>(&self, pattern: &str, mut on_match: F) -> String
    where
        F: FnMut(&str, &str),
    {
        let Some(git) = self.git() else {
            return String::new();
        };

        let regex = match RegexBuilder::new(pattern).case_insensitive(true).build() {
            Ok(regex) => regex,
            Err(e) => {
                tracing::debug!(pattern, error = %e, "invalid grep pattern");
                return String::new();
            }
        };

        match git.grep(&regex, self.timeouts.grep) {
            Outcome::Ok(matches) => {
                let mut output = String::new();
                for found in matches {
                    on_match(&found.file, &found.line);
                    output.push_str(&format!("{}:{}\n", found.file, found.line));
                }
                output
            }
            other => {
                tracing::debug!(root = %self.root.display(), outcome = ?other, "grep produced no result");
                String::new()
            }
        }
    }

    /// Commits per author identity, newest first from HEAD, stopping before
    /// `last`. Empty when `last` is not in the history.
    pub fn author_count(&self, last: Option<&Oid>) -> AuthorCount {
        let mut counts = AuthorCount::new();
        let Some(git) = self.git() else {
            return counts;
        };
        let Some(head) = self.current_oid() else {
            return counts;
        };

        let history = match git.walk_from(&head) {
            Ok(history) => history,
            Err(e) => {
                tracing::warn!(root = %self.root.display(), error = %e, "history walk failed");
                return counts;
            }
        };

        for oid in history {
            if Some(&oid) == last {
                return counts;
            }
            match git.commit_info(&oid) {
                Ok(commit) => *counts.entry(commit.author.identity()).or_default() += 1,
                Err(e) => {
                    tracing::warn!(oid = %oid, error = %e, "cannot read commit");
                    return AuthorCount::new();
                }
            }
        }

        if last.is_some() {
            AuthorCount::new()
        } else {
            counts
        }
    }

    /// Store the message for the next commit; `None` or empty clears it.
    pub fn write_commit_message(&self, message: Option<&str>) -> Result<(), RepoError> {
        if self.git().is_none() {
            return Ok(());
        }

        let path = self.root.join(Self::COMMIT_MESSAGE_FILE);
        match message {
            Some(text) if !text.is_empty() => {
                fs::write(&path, text).map_err(|e| RepoError::io(&path, e))
            }
            _ => remove_if_present(&path),
        }
    }

    /// Up to `limit` most recent commits touching `path`, newest first.
    pub fn commits_for(&self, path: &str, limit: usize) -> Result<Vec<CommitRef>, RepoError> {
        let Some(git) = self.git() else {
            return Ok(Vec::new());
        };
        Ok(git.commits_touching(&normalize_relative_path(path), limit)?)
    }

    pub fn last_commit_for(&self, path: &str) -> Result<Option<CommitRef>, RepoError> {
        Ok(self.commits_for(path, 1)?.into_iter().next())
    }

    /// Content of `path` as of commit `reference`; `None` if either does
    /// not exist.
    pub fn blob_at(&self, path: &str, reference: &str) -> Result<Option<Vec<u8>>, RepoError> {
        let Some(git) = self.git() else {
            return Ok(None);
        };
        let Some(commit) = git.resolve_commit(reference)? else {
            return Ok(None);
        };
        Ok(git.blob_at(&commit, &normalize_relative_path(path))?)
    }
}

/// Artifact names for one conflicting path:
/// `"<path> (<ancestor> original)"`, `"<path> (<local>)"` and
/// `"<path> (<remote>)"`, using abbreviated blob ids. Sides missing from the
/// conflict get no artifact.
pub fn conflict_artifacts(entry: &ConflictEntry) -> Vec<(String, ConflictSide)> {
    let mut artifacts = Vec::with_capacity(3);
    if let Some(ancestor) = &entry.ancestor {
        artifacts.push((
            format!("{} ({} original)", entry.path, ancestor.abbrev()),
            ConflictSide::Ancestor,
        ));
    }
    if let Some(local) = &entry.local {
        artifacts.push((
            format!("{} ({})", entry.path, local.abbrev()),
            ConflictSide::Local,
        ));
    }
    if let Some(remote) = &entry.remote {
        artifacts.push((
            format!("{} ({})", entry.path, remote.abbrev()),
            ConflictSide::Remote,
        ));
    }
    artifacts
}

fn collect_empty_directories(dir: &Path, found: &mut Vec<PathBuf>) {
    let Ok(entries) = fs::read_dir(dir) else {
        return;
    };

    for entry in entries.flatten() {
        if entry.file_name() == ".git" {
            continue;
        }
        let Ok(file_type) = entry.file_type() else {
            continue;
        };
        if !file_type.is_dir() {
            continue;
        }

        let path = entry.path();
        let is_empty = fs::read_dir(&path)
            .map(|mut children| children.next().is_none())
            .unwrap_or(false);
        if is_empty {
            found.push(path);
        } else {
            collect_empty_directories(&path, found);
        }
    }
}

fn remove_if_present(path: &Path) -> Result<(), RepoError> {
    match fs::remove_file(path) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(RepoError::io(path, e)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::git::fault_injection::{self, Fault, Operation};
    use tempfile::TempDir;

    /// A repository with one commit and an `origin` remote that is never
    /// contacted.
    fn repository_with_remote() -> (TempDir, Repository) {
        let dir = TempDir::new().unwrap();
        let repository = Repository::init(dir.path()).unwrap();
        let git = repository.git().unwrap();
        git.add_remote("origin", "/nonexistent/remote").unwrap();

        fs::write(dir.path().join("file1"), "foobar").unwrap();
        repository.commit().unwrap();
        (dir, repository)
    }

    fn oid(hex: &str) -> Oid {
        Oid::new(hex).unwrap()
    }

    #[test]
    fn missing_directory_is_invalid() {
        let dir = TempDir::new().unwrap();
        let repository = Repository::open(dir.path().join("missing"));

        assert!(!repository.is_valid());
        assert_eq!(
            repository.invalid_reason(),
            Some(InvalidReason::DirectoryMissing)
        );
        assert_eq!(repository.root(), None);
        assert_eq!(repository.fetch(), None);
        assert_eq!(repository.merge(), None);
        assert_eq!(repository.push(), None);
        assert_eq!(repository.commit().unwrap(), None);
        assert!(!repository.is_dirty());
        assert!(!repository.need_sync());
        assert!(repository.author_count(None).is_empty());
        assert_eq!(repository.grep("foo", |_, _| {}), "");
    }

    #[test]
    fn plain_directory_is_not_a_repository() {
        let dir = TempDir::new().unwrap();
        let repository = Repository::open(dir.path());

        assert_eq!(
            repository.invalid_reason(),
            Some(InvalidReason::NoRepository)
        );
        assert_eq!(repository.available_remotes(), None);
        assert_eq!(repository.available_branches(), None);
    }

    #[test]
    fn share_settings_are_used() {
        let dir = TempDir::new().unwrap();
        Repository::init(dir.path()).unwrap();

        let share = Share {
            remote_name: Some("remote".to_string()),
            branch_name: Some("branch".to_string()),
            ..Share::new(dir.path())
        };
        let repository = Repository::from_share(&share);

        assert!(repository.is_valid());
        assert_eq!(repository.remote_name(), "remote");
        assert_eq!(repository.branch_name(), "branch");
    }

    #[test]
    fn conflict_artifact_names() {
        let entry = ConflictEntry {
            path: "dir/file1".to_string(),
            ancestor: Some(oid("f6ea0495187600e7b2288c8ac19c5886383a4632")),
            local: Some(oid("18ed963a5c6a7d1e8d4e9a3c6fcb3a3b1c1c0ea4")),
            remote: Some(oid("7bfce5c0a4b6fb4ae4a2e1e6c7b0bd5e8c2d1b3a")),
        };

        let names: Vec<_> = conflict_artifacts(&entry)
            .into_iter()
            .map(|(name, _)| name)
            .collect();
        assert_eq!(
            names,
            vec![
                "dir/file1 (f6ea049 original)",
                "dir/file1 (18ed963)",
                "dir/file1 (7bfce5c)",
            ]
        );
    }

    #[test]
    fn conflict_without_ancestor_has_two_artifacts() {
        let entry = ConflictEntry {
            path: "file".to_string(),
            ancestor: None,
            local: Some(oid("18ed963a5c6a7d1e8d4e9a3c6fcb3a3b1c1c0ea4")),
            remote: Some(oid("7bfce5c0a4b6fb4ae4a2e1e6c7b0bd5e8c2d1b3a")),
        };

        let sides: Vec<_> = conflict_artifacts(&entry)
            .into_iter()
            .map(|(_, side)| side)
            .collect();
        assert_eq!(sides, vec![ConflictSide::Local, ConflictSide::Remote]);
    }

    #[test]
    fn fetch_timeout_is_described() {
        let (dir, repository) = repository_with_remote();
        fault_injection::inject(Operation::Fetch, Fault::Timeout);

        let result = repository.fetch();
        fault_injection::reset();

        let root = std::path::absolute(dir.path()).unwrap();
        assert_eq!(
            result,
            Some(FetchResult::Error(format!(
                "Fetch timed out for {}",
                root.display()
            )))
        );
    }

    #[test]
    fn fetch_failure_returns_error_text() {
        let (_dir, repository) = repository_with_remote();
        fault_injection::inject(Operation::Fetch, Fault::Failed("fetch error output".into()));

        let result = repository.fetch();
        fault_injection::reset();

        assert_eq!(
            result,
            Some(FetchResult::Error("fetch error output".to_string()))
        );
    }

    #[test]
    fn merge_timeout_is_described() {
        let (dir, repository) = repository_with_remote();
        fault_injection::inject(Operation::Merge, Fault::Timeout);

        let result = repository.merge();
        fault_injection::reset();

        let root = std::path::absolute(dir.path()).unwrap();
        assert_eq!(
            result,
            Some(MergeResult::Error(format!(
                "Merge timed out for {}",
                root.display()
            )))
        );
    }

    #[test]
    fn merge_failure_returns_error_text() {
        let (_dir, repository) = repository_with_remote();
        fault_injection::inject(Operation::Merge, Fault::Failed("merge error output".into()));

        let result = repository.merge();
        fault_injection::reset();

        assert_eq!(
            result,
            Some(MergeResult::Error("merge error output".to_string()))
        );
    }

    #[test]
    fn push_failure_returns_error_text() {
        let (_dir, repository) = repository_with_remote();
        fault_injection::inject(Operation::Push, Fault::Failed("error message".into()));

        let result = repository.push();
        fault_injection::reset();

        assert_eq!(result, Some(PushResult::Error("error message".to_string())));
    }

    #[test]
    fn grep_failures_are_swallowed() {
        let (_dir, repository) = repository_with_remote();

        for fault in [Fault::Timeout, Fault::Failed("grep error output".into())] {
            let mut seen = Vec::new();
            fault_injection::inject(Operation::Grep, fault);
            let output = repository.grep("foo", |file, line| seen.push(format!("{file} {line}")));
            fault_injection::reset();

            assert_eq!(output, "");
            assert!(seen.is_empty());
        }
    }

    #[test]
    fn commit_uses_pending_message() {
        let (dir, repository) = repository_with_remote();
        repository.write_commit_message(Some("custom message")).unwrap();
        fs::write(dir.path().join("file2"), "x").unwrap();

        assert_eq!(repository.commit().unwrap(), Some(true));

        let git = repository.git().unwrap();
        let head = repository.current_oid().unwrap();
        assert_eq!(git.commit_info(&head).unwrap().message, "custom message\n");
        assert!(!dir.path().join(Repository::COMMIT_MESSAGE_FILE).exists());
        assert!(!repository.is_dirty());
    }

    #[test]
    fn whitespace_message_is_used_verbatim() {
        let (dir, repository) = repository_with_remote();
        fs::write(dir.path().join(Repository::COMMIT_MESSAGE_FILE), "  ").unwrap();
        fs::write(dir.path().join("file2"), "x").unwrap();

        assert_eq!(repository.commit().unwrap(), Some(true));

        let git = repository.git().unwrap();
        let head = repository.current_oid().unwrap();
        assert_eq!(git.commit_info(&head).unwrap().message, "  \n");
    }

    #[test]
    fn pending_message_alone_is_not_dirty() {
        let (_dir, repository) = repository_with_remote();
        repository.write_commit_message(Some("later")).unwrap();
        assert!(!repository.is_dirty());
    }
}
