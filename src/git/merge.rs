//! git::merge
//!
//! Merging an upstream tracking ref into the current branch.
//!
//! A merge never stops half way. Conflicting paths are resolved by the
//! caller-supplied resolver, which names the files each side's content is
//! written to; the original path is dropped. The result is committed as a
//! regular two-parent merge commit and checked out.

use std::path::Path;
use std::time::Duration;

use crate::core::types::ConflictEntry;

use super::fault_injection::{self, Operation};
use super::interface::{to_git2, to_oid, Deadline, Git, GitError, Outcome};

/// Which version of a conflicting file an artifact carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConflictSide {
    /// Merge base version
    Ancestor,
    /// Current branch version
    Local,
    /// Upstream version
    Remote,
}

impl Git {
    /// Merge `upstream_ref` into HEAD's branch.
    ///
    /// Does nothing when the ref is absent or already merged, fast-forwards
    /// when possible. For every conflicting path, `resolve` returns the
    /// artifact names to write and which side each one holds.
    pub fn merge(
        &self,
        upstream_ref: &str,
        message: &str,
        timeout: Duration,
        resolve: &dyn Fn(&ConflictEntry) -> Vec<(String, ConflictSide)>,
    ) -> Outcome<()> {
        if let Some(outcome) = fault_injection::injected(Operation::Merge) {
            return outcome;
        }

        let deadline = Deadline::after(timeout);
        match self.merge_into_head(upstream_ref, message, deadline, resolve) {
            Ok(outcome) => outcome,
            Err(e) => Outcome::Failed(e.to_string()),
        }
    }

    fn merge_into_head(
        &self,
        upstream_ref: &str,
        message: &str,
        deadline: Deadline,
        resolve: &dyn Fn(&ConflictEntry) -> Vec<(String, ConflictSide)>,
    ) -> Result<Outcome<()>, GitError> {
        let Some(upstream) = self.try_resolve_ref(upstream_ref)? else {
            tracing::debug!(upstream_ref, "nothing to merge");
            return Ok(Outcome::Ok(()));
        };

        let upstream_commit = self.repo.find_commit(to_git2(&upstream)?)?;
        let annotated = self.repo.find_annotated_commit(upstream_commit.id())?;
        let (analysis, _) = self.repo.merge_analysis(&[&annotated])?;

        if analysis.is_up_to_date() {
            return Ok(Outcome::Ok(()));
        }

        let target_ref = self.head_ref_name();
        let mut checkout = git2::build::CheckoutBuilder::new();
        checkout.safe();

        if analysis.is_unborn() || analysis.is_fast_forward() {
            self.repo
                .checkout_tree(upstream_commit.as_object(), Some(&mut checkout))?;
            self.set_ref(&target_ref, &upstream, "docsync: fast-forward")?;
            tracing::info!(upstream = %upstream.abbrev(), "fast-forwarded");
            return Ok(Outcome::Ok(()));
        }

        let local = self.head_oid()?.ok_or_else(|| GitError::RefNotFound {
            refname: "HEAD".to_string(),
        })?;
        let local_commit = self.repo.find_commit(to_git2(&local)?)?;

        if deadline.expired() {
            return Ok(Outcome::Timeout);
        }

        let mut index = self
            .repo
            .merge_commits(&local_commit, &upstream_commit, None)?;

        if deadline.expired() {
            return Ok(Outcome::Timeout);
        }

        let mut entries = Vec::new();
        if index.has_conflicts() {
            let conflicts = index.conflicts()?.collect::<Result<Vec<_>, _>>()?;

            for conflict in conflicts {
                let Some(path) = [&conflict.our, &conflict.their, &conflict.ancestor]
                    .into_iter()
                    .flatten()
                    .next()
                    .map(|e| String::from_utf8_lossy(&e.path).into_owned())
                else {
                    continue;
                };

                let entry = ConflictEntry {
                    path: path.clone(),
                    ancestor: conflict.ancestor.as_ref().map(|e| to_oid(e.id)).transpose()?,
                    local: conflict.our.as_ref().map(|e| to_oid(e.id)).transpose()?,
                    remote: conflict.their.as_ref().map(|e| to_oid(e.id)).transpose()?,
                };

                index.conflict_remove(Path::new(&path))?;

                for (name, side) in resolve(&entry) {
                    let source = match side {
                        ConflictSide::Ancestor => conflict.ancestor.as_ref(),
                        ConflictSide::Local => conflict.our.as_ref(),
                        ConflictSide::Remote => conflict.their.as_ref(),
                    };
                    if let Some(source) = source {
                        index.add(&renamed(source, &name))?;
                    }
                }

                tracing::warn!(path = %entry.path, "merge conflict, keeping all versions");
                entries.push(entry);
            }
        }

        let tree = self.repo.find_tree(index.write_tree_to(&self.repo)?)?;
        let signature = self.signature()?;
        let merged = self.repo.commit(
            None,
            &signature,
            &signature,
            message,
            &tree,
            &[&local_commit, &upstream_commit],
        )?;

        if deadline.expired() {
            return Ok(Outcome::Timeout);
        }

        let merge_commit = self.repo.find_commit(merged)?;
        self.repo
            .checkout_tree(merge_commit.as_object(), Some(&mut checkout))?;
        let merged = to_oid(merged)?;
        self.set_ref(&target_ref, &merged, "docsync: merge")?;

        tracing::info!(
            upstream = %upstream.abbrev(),
            merge = %merged.abbrev(),
            conflicts = entries.len(),
            "merged upstream"
        );

        if entries.is_empty() {
            Ok(Outcome::Ok(()))
        } else {
            Ok(Outcome::Conflict(entries))
        }
    }
}

/// Stage-0 copy of a conflict entry under a new path.
fn renamed(source: &git2::IndexEntry, path: &str) -> git2::IndexEntry {
    let path = path.as_bytes().to_vec();
    git2::IndexEntry {
        ctime: source.ctime,
        mtime: source.mtime,
        dev: source.dev,
        ino: source.ino,
        mode: source.mode,
        uid: source.uid,
        gid: source.gid,
        file_size: source.file_size,
        id: source.id,
        // Name length lives in the low 12 bits, the stage above it.
        flags: path.len().min(0xfff) as u16,
        flags_extended: 0,
        path,
    }
}
