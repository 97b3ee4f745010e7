//! git::interface
//!
//! Git interface implementation using git2.
//!
//! This module provides the **single doorway** to the object store. All
//! repository reads and writes flow through [`Git`], which returns strong
//! types and normalizes errors into typed failure categories.
//!
//! Network and merge operations live in sibling modules
//! ([`network`](super::network), [`merge`](super::merge)) as further `impl Git`
//! blocks and report through [`Outcome`] instead of `Result`.
//!
//! # Error Handling
//!
//! Git errors are categorized into typed variants:
//! - [`GitError::NotARepo`]: No object store at the path
//! - [`GitError::RefNotFound`]: Requested ref does not exist
//! - [`GitError::ObjectNotFound`]: Requested object does not exist
//! - [`GitError::CloneFailed`]: Remote unreachable or invalid while cloning

use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use regex::Regex;
use thiserror::Error;

use crate::core::types::{Author, CommitRef, ConflictEntry, Oid, TypeError};

use super::fault_injection::{self, Operation};

/// Errors from Git operations.
#[derive(Debug, Error)]
pub enum GitError {
    /// No repository at the path.
    #[error("not a git repository: {path}")]
    NotARepo {
        /// The path that was opened
        path: PathBuf,
    },

    /// Repository is bare (no working directory).
    #[error("bare repository not supported")]
    BareRepo,

    /// Requested ref does not exist.
    #[error("ref not found: {refname}")]
    RefNotFound {
        /// The ref that was not found
        refname: String,
    },

    /// Object not found in repository.
    #[error("object not found: {oid}")]
    ObjectNotFound {
        /// The OID that was not found
        oid: String,
    },

    /// Invalid object id format.
    #[error("invalid object id: {oid}")]
    InvalidOid {
        /// The invalid OID string
        oid: String,
    },

    /// Cloning did not produce a repository.
    #[error("clone of {url} failed: {message}")]
    CloneFailed {
        /// The remote that was cloned
        url: String,
        /// Why it failed
        message: String,
    },

    /// Permission or filesystem error.
    #[error("repository access error: {message}")]
    AccessError {
        /// Description of the error
        message: String,
    },

    /// Internal git2 error.
    #[error("git error: {message}")]
    Internal {
        /// The error message
        message: String,
    },
}

impl GitError {
    /// Create a GitError from a git2::Error with richer context.
    pub(crate) fn from_git2(err: git2::Error, context: &str) -> Self {
        match err.code() {
            git2::ErrorCode::NotFound => {
                if context.starts_with("refs/") || context.contains("ref") || context == "HEAD" {
                    GitError::RefNotFound {
                        refname: context.to_string(),
                    }
                } else {
                    GitError::ObjectNotFound {
                        oid: context.to_string(),
                    }
                }
            }
            git2::ErrorCode::InvalidSpec => GitError::InvalidOid {
                oid: context.to_string(),
            },
            git2::ErrorCode::Locked => GitError::AccessError {
                message: format!("repository is locked: {}", err.message()),
            },
            _ => GitError::Internal {
                message: format!("{}: {}", context, err.message()),
            },
        }
    }
}

impl From<git2::Error> for GitError {
    fn from(err: git2::Error) -> Self {
        match err.code() {
            git2::ErrorCode::NotFound => GitError::ObjectNotFound {
                oid: err.message().to_string(),
            },
            git2::ErrorCode::InvalidSpec => GitError::InvalidOid {
                oid: err.message().to_string(),
            },
            _ => GitError::Internal {
                message: err.message().to_string(),
            },
        }
    }
}

impl From<TypeError> for GitError {
    fn from(err: TypeError) -> Self {
        match err {
            TypeError::InvalidOid(msg) => GitError::InvalidOid { oid: msg },
        }
    }
}

/// Result of a timeout-bounded backend operation.
///
/// Timeouts and command failures are data, not errors: callers turn them
/// into descriptive results and keep running.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome<T> {
    /// The operation completed.
    Ok(T),
    /// The operation did not complete before its deadline.
    Timeout,
    /// The operation failed; carries the backend's error text.
    Failed(String),
    /// Histories conflicted. For merges the entries were already
    /// materialized and committed; a rejected push carries no entries.
    Conflict(Vec<ConflictEntry>),
}

impl<T> Outcome<T> {
    pub fn is_ok(&self) -> bool {
        matches!(self, Outcome::Ok(_))
    }
}

/// Deadline for in-process operations.
#[derive(Debug, Clone, Copy)]
pub(crate) struct Deadline {
    start: Instant,
    timeout: Duration,
}

impl Deadline {
    pub(crate) fn after(timeout: Duration) -> Self {
        Self {
            start: Instant::now(),
            timeout,
        }
    }

    pub(crate) fn expired(&self) -> bool {
        self.start.elapsed() >= self.timeout
    }
}

/// Summary of working tree status.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WorktreeStatus {
    /// Number of staged changes
    pub staged: usize,
    /// Number of unstaged changes to tracked files
    pub unstaged: usize,
    /// Number of untracked files
    pub untracked: usize,
    /// Whether there are unresolved conflicts
    pub has_conflicts: bool,
}

impl WorktreeStatus {
    /// Check if the worktree has no difference from HEAD at all,
    /// untracked files included.
    pub fn is_clean(&self) -> bool {
        self.staged == 0 && self.unstaged == 0 && self.untracked == 0 && !self.has_conflicts
    }
}

/// One line matched by [`Git::grep`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GrepMatch {
    /// Slash separated path relative to the working directory
    pub file: String,
    /// The matching line, without its terminator
    pub line: String,
}

/// The Git interface.
///
/// This is the **single point of interaction** with Git. No other module
/// imports `git2` directly.
pub struct Git {
    /// The underlying git2 repository
    pub(super) repo: git2::Repository,
}

impl std::fmt::Debug for Git {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Git")
            .field("path", &self.repo.path())
            .finish()
    }
}

pub(super) fn to_oid(oid: git2::Oid) -> Result<Oid, GitError> {
    Oid::new(oid.to_string()).map_err(GitError::from)
}

pub(super) fn to_git2(oid: &Oid) -> Result<git2::Oid, GitError> {
    git2::Oid::from_str(oid.as_str()).map_err(|e| GitError::from_git2(e, oid.as_str()))
}

impl Git {
    // =========================================================================
    // Repository Opening and Info
    // =========================================================================

    /// Open the repository whose working directory (or git directory) is
    /// exactly `path`. Parent directories are not searched.
    ///
    /// # Errors
    ///
    /// - [`GitError::NotARepo`] if no repository is found
    /// - [`GitError::BareRepo`] if the repository has no working directory
    pub fn open(path: &Path) -> Result<Self, GitError> {
        let repo = git2::Repository::open(path).map_err(|_| GitError::NotARepo {
            path: path.to_path_buf(),
        })?;

        if repo.is_bare() {
            return Err(GitError::BareRepo);
        }

        Ok(Self { repo })
    }

    /// Create a new, empty repository with a working directory at `path`.
    pub fn init(path: &Path) -> Result<Self, GitError> {
        let repo = git2::Repository::init(path).map_err(|e| GitError::AccessError {
            message: format!("cannot init {}: {}", path.display(), e.message()),
        })?;
        Ok(Self { repo })
    }

    /// Get direct access to the .git directory path.
    pub fn git_dir(&self) -> &Path {
        self.repo.path()
    }

    // =========================================================================
    // Ref Resolution
    // =========================================================================

    /// The commit HEAD points at, or `None` before the first commit.
    pub fn head_oid(&self) -> Result<Option<Oid>, GitError> {
        let head = match self.repo.head() {
            Ok(h) => h,
            Err(e)
                if e.code() == git2::ErrorCode::UnbornBranch
                    || e.code() == git2::ErrorCode::NotFound =>
            {
                return Ok(None)
            }
            Err(e) => return Err(GitError::from_git2(e, "HEAD")),
        };

        let oid = head
            .peel_to_commit()
            .map_err(|e| GitError::from_git2(e, "HEAD"))?
            .id();

        Ok(Some(to_oid(oid)?))
    }

    /// Full name of the ref HEAD points at (`refs/heads/<branch>`), which
    /// may not exist yet. `HEAD` itself when detached.
    pub fn head_ref_name(&self) -> String {
        self.repo
            .find_reference("HEAD")
            .ok()
            .and_then(|head| head.symbolic_target().map(String::from))
            .unwrap_or_else(|| "HEAD".to_string())
    }

    /// Short name of the branch HEAD points at, even before the first commit.
    pub fn head_branch(&self) -> Option<String> {
        self.head_ref_name()
            .strip_prefix("refs/heads/")
            .map(String::from)
    }

    /// Resolve a ref to the commit it points at, `None` if it is absent.
    pub fn try_resolve_ref(&self, refname: &str) -> Result<Option<Oid>, GitError> {
        let reference = match self.repo.find_reference(refname) {
            Ok(r) => r,
            Err(e) if e.code() == git2::ErrorCode::NotFound => return Ok(None),
            Err(e) => return Err(GitError::from_git2(e, refname)),
        };

        let oid = reference
            .peel_to_commit()
            .map_err(|e| GitError::from_git2(e, refname))?
            .id();

        Ok(Some(to_oid(oid)?))
    }

    /// Resolve a revision expression (full or abbreviated oid, ref name) to
    /// a commit, `None` if it names nothing.
    pub fn resolve_commit(&self, spec: &str) -> Result<Option<Oid>, GitError> {
        let object = match self.repo.revparse_single(spec) {
            Ok(o) => o,
            Err(e)
                if matches!(
                    e.code(),
                    git2::ErrorCode::NotFound
                        | git2::ErrorCode::InvalidSpec
                        | git2::ErrorCode::Ambiguous
                ) =>
            {
                return Ok(None)
            }
            Err(e) => return Err(GitError::from_git2(e, spec)),
        };

        match object.peel_to_commit() {
            Ok(commit) => Ok(Some(to_oid(commit.id())?)),
            Err(_) => Ok(None),
        }
    }

    /// Point `refname` at `oid`, creating it if needed. A `refname` of
    /// `HEAD` detaches HEAD.
    pub fn set_ref(&self, refname: &str, oid: &Oid, message: &str) -> Result<(), GitError> {
        let target = to_git2(oid)?;
        if refname == "HEAD" {
            self.repo
                .set_head_detached(target)
                .map_err(|e| GitError::from_git2(e, refname))?;
        } else {
            self.repo
                .reference(refname, target, true, message)
                .map_err(|e| GitError::from_git2(e, refname))?;
        }
        Ok(())
    }

    // =========================================================================
    // Ref Enumeration
    // =========================================================================

    /// List local branch names.
    pub fn list_branches(&self) -> Result<Vec<String>, GitError> {
        let branches = self.repo.branches(Some(git2::BranchType::Local))?;

        let mut names = Vec::new();
        for branch in branches {
            let (branch, _) = branch?;
            if let Some(name) = branch.name().ok().flatten() {
                names.push(name.to_string());
            }
        }

        Ok(names)
    }

    /// List configured remote names.
    pub fn list_remotes(&self) -> Result<Vec<String>, GitError> {
        let remotes = self.repo.remotes()?;
        Ok(remotes.iter().flatten().map(String::from).collect())
    }

    /// Whether a remote named `name` is configured.
    pub fn has_remote(&self, name: &str) -> bool {
        self.repo.find_remote(name).is_ok()
    }

    /// Configure a new remote.
    pub fn add_remote(&self, name: &str, url: &str) -> Result<(), GitError> {
        self.repo
            .remote(name, url)
            .map_err(|e| GitError::from_git2(e, name))?;
        Ok(())
    }

    // =========================================================================
    // Ancestry Queries
    // =========================================================================

    /// Commits unique to each side: `(ahead, behind)` of `local` relative
    /// to `upstream`.
    pub fn ahead_behind(&self, local: &Oid, upstream: &Oid) -> Result<(usize, usize), GitError> {
        let counts = self
            .repo
            .graph_ahead_behind(to_git2(local)?, to_git2(upstream)?)?;
        Ok(counts)
    }

    // =========================================================================
    // Working Tree Status
    // =========================================================================

    /// Status of the working tree and index against HEAD, untracked files
    /// included. Paths listed in `ignore` are left out.
    pub fn worktree_status(&self, ignore: &[&str]) -> Result<WorktreeStatus, GitError> {
        let mut opts = git2::StatusOptions::new();
        opts.include_untracked(true)
            .recurse_untracked_dirs(true)
            .include_ignored(false);

        let statuses = self.repo.statuses(Some(&mut opts))?;

        let mut result = WorktreeStatus::default();

        for entry in statuses.iter() {
            if entry.path().is_some_and(|p| ignore.contains(&p)) {
                continue;
            }

            let status = entry.status();

            if status.is_conflicted() {
                result.has_conflicts = true;
            }

            if status.is_index_new()
                || status.is_index_modified()
                || status.is_index_deleted()
                || status.is_index_renamed()
                || status.is_index_typechange()
            {
                result.staged += 1;
            }

            if status.is_wt_modified()
                || status.is_wt_deleted()
                || status.is_wt_renamed()
                || status.is_wt_typechange()
            {
                result.unstaged += 1;
            }

            if status.is_wt_new() {
                result.untracked += 1;
            }
        }

        Ok(result)
    }

    // =========================================================================
    // Index and Commits
    // =========================================================================

    /// Stage every addition, modification and deletion in the working
    /// tree, except paths listed in `exclude`. Returns the written tree.
    pub fn stage_all(&self, exclude: &[&str]) -> Result<Oid, GitError> {
        let mut index = self.repo.index()?;

        let mut skip_excluded = |path: &Path, _spec: &[u8]| -> i32 {
            let path = path.to_string_lossy();
            i32::from(exclude.contains(&path.as_ref()))
        };

        index.add_all(
            ["*"].iter(),
            git2::IndexAddOption::DEFAULT,
            Some(&mut skip_excluded as &mut git2::IndexMatchedPath<'_>),
        )?;
        index.update_all(["*"].iter(), None)?;
        index.write()?;

        to_oid(index.write_tree()?)
    }

    /// Create a commit of `tree` on top of HEAD and advance HEAD to it.
    /// The first commit of a repository has no parent.
    pub fn commit_tree(&self, tree: &Oid, message: &str) -> Result<Oid, GitError> {
        let tree = self.repo.find_tree(to_git2(tree)?)?;
        let signature = self.signature()?;

        let parents = match self.head_oid()? {
            Some(head) => vec![self.repo.find_commit(to_git2(&head)?)?],
            None => Vec::new(),
        };
        let parent_refs: Vec<_> = parents.iter().collect();

        let oid = self.repo.commit(
            Some("HEAD"),
            &signature,
            &signature,
            message,
            &tree,
            &parent_refs,
        )?;

        to_oid(oid)
    }

    /// Identity from repository configuration, or a fixed fallback.
    pub(super) fn signature(&self) -> Result<git2::Signature<'static>, GitError> {
        match self.repo.signature() {
            Ok(sig) => Ok(sig),
            Err(_) => Ok(git2::Signature::now("docsync", "docsync@localhost")?),
        }
    }

    /// Paths of every tracked file, in index order.
    pub fn tracked_files(&self) -> Result<Vec<String>, GitError> {
        let index = self.repo.index()?;
        Ok(index
            .iter()
            .filter(|entry| (entry.flags >> 12) & 0x3 == 0)
            .map(|entry| String::from_utf8_lossy(&entry.path).into_owned())
            .collect())
    }

    // =========================================================================
    // Commit Information
    // =========================================================================

    /// Read one commit.
    pub fn commit_info(&self, oid: &Oid) -> Result<CommitRef, GitError> {
        let commit = self
            .repo
            .find_commit(to_git2(oid)?)
            .map_err(|e| GitError::from_git2(e, oid.as_str()))?;
        commit_ref(&commit)
    }

    /// Commit ids reachable from `from`, newest first.
    pub fn walk_from(&self, from: &Oid) -> Result<Vec<Oid>, GitError> {
        let mut revwalk = self.repo.revwalk()?;
        revwalk.set_sorting(git2::Sort::TOPOLOGICAL | git2::Sort::TIME)?;
        revwalk.push(to_git2(from)?)?;

        let mut oids = Vec::new();
        for oid in revwalk {
            oids.push(to_oid(oid?)?);
        }
        Ok(oids)
    }

    /// Up to `limit` most recent commits reachable from HEAD whose content at
    /// `path` differs from every parent. An empty `path` is the root tree.
    pub fn commits_touching(&self, path: &str, limit: usize) -> Result<Vec<CommitRef>, GitError> {
        let Some(head) = self.head_oid()? else {
            return Ok(Vec::new());
        };

        let mut revwalk = self.repo.revwalk()?;
        revwalk.set_sorting(git2::Sort::TOPOLOGICAL | git2::Sort::TIME)?;
        revwalk.push(to_git2(&head)?)?;

        let mut result = Vec::new();
        for oid in revwalk {
            if result.len() >= limit {
                break;
            }
            let commit = self.repo.find_commit(oid?)?;
            let current = entry_id(&commit, path)?;
            if current.is_none() && commit.parent_count() == 0 {
                continue;
            }

            let mut touched = true;
            for parent in commit.parents() {
                if entry_id(&parent, path)? == current {
                    touched = false;
                    break;
                }
            }

            if touched {
                result.push(commit_ref(&commit)?);
            }
        }

        Ok(result)
    }

    // =========================================================================
    // Blob Operations
    // =========================================================================

    /// Read a blob by id.
    pub fn read_blob(&self, oid: &Oid) -> Result<Vec<u8>, GitError> {
        let blob = self
            .repo
            .find_blob(to_git2(oid)?)
            .map_err(|e| GitError::from_git2(e, oid.as_str()))?;

        Ok(blob.content().to_vec())
    }

    /// Content of the blob at `path` in commit `commit`, `None` if the path
    /// is absent there or is not a file.
    pub fn blob_at(&self, commit: &Oid, path: &str) -> Result<Option<Vec<u8>>, GitError> {
        let commit = self.repo.find_commit(to_git2(commit)?)?;
        let tree = commit.tree()?;

        let entry = match tree.get_path(Path::new(path)) {
            Ok(entry) => entry,
            Err(e) if e.code() == git2::ErrorCode::NotFound => return Ok(None),
            Err(e) => return Err(GitError::from_git2(e, path)),
        };

        if entry.kind() != Some(git2::ObjectType::Blob) {
            return Ok(None);
        }

        let blob = self.repo.find_blob(entry.id())?;
        Ok(Some(blob.content().to_vec()))
    }

    // =========================================================================
    // Search
    // =========================================================================

    /// Search the working tree copy of every tracked file, in index order
    /// then line order. Non UTF-8 files are skipped.
    pub fn grep(&self, pattern: &Regex, timeout: Duration) -> Outcome<Vec<GrepMatch>> {
        if let Some(outcome) = fault_injection::injected(Operation::Grep) {
            return outcome;
        }

        let deadline = Deadline::after(timeout);
        let Some(work_dir) = self.repo.workdir() else {
            return Outcome::Failed("bare repository not supported".to_string());
        };
        let files = match self.tracked_files() {
            Ok(files) => files,
            Err(e) => return Outcome::Failed(e.to_string()),
        };

        let mut matches = Vec::new();
        for file in files {
            if deadline.expired() {
                return Outcome::Timeout;
            }
            let Ok(bytes) = std::fs::read(work_dir.join(&file)) else {
                continue;
            };
            let Ok(text) = String::from_utf8(bytes) else {
                continue;
            };
            for line in text.lines() {
                if pattern.is_match(line) {
                    matches.push(GrepMatch {
                        file: file.clone(),
                        line: line.to_string(),
                    });
                }
            }
        }

        Outcome::Ok(matches)
    }
}

/// Id of the tree entry at `path` (the root tree for `""`).
fn entry_id(commit: &git2::Commit<'_>, path: &str) -> Result<Option<git2::Oid>, GitError> {
    let tree = commit.tree()?;
    if path.is_empty() {
        return Ok(Some(tree.id()));
    }
    match tree.get_path(Path::new(path)) {
        Ok(entry) => Ok(Some(entry.id())),
        Err(e) if e.code() == git2::ErrorCode::NotFound => Ok(None),
        Err(e) => Err(GitError::from_git2(e, path)),
    }
}

pub(super) fn commit_ref(commit: &git2::Commit<'_>) -> Result<CommitRef, GitError> {
    let author = commit.author();
    let time = chrono::DateTime::from_timestamp(author.when().seconds(), 0)
        .unwrap_or(chrono::DateTime::UNIX_EPOCH);

    let mut parents = Vec::new();
    for parent in commit.parent_ids() {
        parents.push(to_oid(parent)?);
    }

    Ok(CommitRef {
        oid: to_oid(commit.id())?,
        message: commit.message().unwrap_or("").to_string(),
        author: Author {
            name: author.name().unwrap_or("").to_string(),
            email: author.email().unwrap_or("").to_string(),
            time,
        },
        parents,
    })
}
