//! Shared fixtures for integration tests.
//!
//! Repositories are built with `git2` directly: a bare repository plays the
//! remote, working repositories are initialized or cloned from it, and
//! commits carry explicit authors.

#![allow(dead_code)]

use std::path::{Path, PathBuf};

use tempfile::TempDir;

use docsync::core::types::Oid;

pub const AUTHOR1: (&str, &str) = ("Art T. Fish", "afish@example.com");
pub const AUTHOR2: (&str, &str) = ("A U Thor", "author@example.com");

pub fn identity(author: (&str, &str)) -> String {
    format!("{} <{}>", author.0, author.1)
}

fn init_options(bare: bool) -> git2::RepositoryInitOptions {
    let mut options = git2::RepositoryInitOptions::new();
    options.bare(bare).initial_head("master");
    options
}

fn to_oid(oid: git2::Oid) -> Oid {
    Oid::new(oid.to_string()).unwrap()
}

/// Commits reachable from `refname`, 0 if it does not exist.
pub fn commit_count(repo: &git2::Repository, refname: &str) -> usize {
    let Ok(reference) = repo.find_reference(refname) else {
        return 0;
    };
    let mut walk = repo.revwalk().unwrap();
    walk.push(reference.peel_to_commit().unwrap().id()).unwrap();
    walk.count()
}

/// A bare repository standing in for the shared remote.
pub struct Remote {
    dir: TempDir,
    pub repo: git2::Repository,
}

impl Remote {
    pub fn new() -> Self {
        let dir = TempDir::new().unwrap();
        let repo = git2::Repository::init_opts(dir.path(), &init_options(true)).unwrap();
        Self { dir, repo }
    }

    /// A remote whose master holds `file1` = `foobar`.
    pub fn with_commit() -> Self {
        let remote = Self::new();
        remote.commit("file1", "foobar", "initial commit", AUTHOR1);
        remote
    }

    pub fn url(&self) -> String {
        self.dir.path().to_str().unwrap().to_string()
    }

    /// Commit a top-level file directly onto master.
    pub fn commit(&self, file: &str, content: &str, message: &str, author: (&str, &str)) -> Oid {
        let blob = self.repo.blob(content.as_bytes()).unwrap();
        self.commit_with(message, author, |builder| {
            builder.insert(file, blob, 0o100644).unwrap();
        })
    }

    /// Commit the removal of a top-level file directly onto master.
    pub fn delete(&self, file: &str, message: &str, author: (&str, &str)) -> Oid {
        self.commit_with(message, author, |builder| {
            builder.remove(file).unwrap();
        })
    }

    fn commit_with(
        &self,
        message: &str,
        author: (&str, &str),
        edit: impl FnOnce(&mut git2::TreeBuilder<'_>),
    ) -> Oid {
        let repo = &self.repo;
        let parent = repo
            .find_reference("refs/heads/master")
            .ok()
            .map(|r| r.peel_to_commit().unwrap());
        let base_tree = parent.as_ref().map(|p| p.tree().unwrap());

        let mut builder = repo.treebuilder(base_tree.as_ref()).unwrap();
        edit(&mut builder);
        let tree = repo.find_tree(builder.write().unwrap()).unwrap();

        let signature = git2::Signature::now(author.0, author.1).unwrap();
        let parents: Vec<&git2::Commit<'_>> = parent.iter().collect();
        let oid = repo
            .commit(
                Some("refs/heads/master"),
                &signature,
                &signature,
                message,
                &tree,
                &parents,
            )
            .unwrap();
        to_oid(oid)
    }

    pub fn commit_count(&self) -> usize {
        commit_count(&self.repo, "refs/heads/master")
    }
}

/// A working repository.
pub struct Local {
    dir: TempDir,
    pub repo: git2::Repository,
}

impl Local {
    /// A fresh repository without remotes.
    pub fn new() -> Self {
        let dir = TempDir::new().unwrap();
        let repo = git2::Repository::init_opts(dir.path(), &init_options(false)).unwrap();
        Self::configure(&repo);
        Self { dir, repo }
    }

    /// A fresh repository whose `origin` is `remote`, nothing fetched.
    pub fn with_remote(remote: &Remote) -> Self {
        let local = Self::new();
        local.repo.remote("origin", &remote.url()).unwrap();
        local
    }

    /// A clone of `remote`.
    pub fn clone_of(remote: &Remote) -> Self {
        let dir = TempDir::new().unwrap();
        let repo = git2::Repository::clone(&remote.url(), dir.path()).unwrap();
        Self::configure(&repo);
        Self { dir, repo }
    }

    fn configure(repo: &git2::Repository) {
        let mut config = repo.config().unwrap();
        config.set_str("user.name", "Test User").unwrap();
        config.set_str("user.email", "test@example.com").unwrap();
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    pub fn absolute_path(&self) -> PathBuf {
        std::path::absolute(self.dir.path()).unwrap()
    }

    pub fn write(&self, file: &str, content: &str) {
        let full = self.dir.path().join(file);
        std::fs::create_dir_all(full.parent().unwrap()).unwrap();
        std::fs::write(full, content).unwrap();
    }

    pub fn mkdir(&self, dir: &str) {
        std::fs::create_dir_all(self.dir.path().join(dir)).unwrap();
    }

    pub fn remove(&self, file: &str) {
        std::fs::remove_file(self.dir.path().join(file)).unwrap();
    }

    pub fn read(&self, file: &str) -> String {
        std::fs::read_to_string(self.dir.path().join(file)).unwrap()
    }

    pub fn exists(&self, file: &str) -> bool {
        self.dir.path().join(file).exists()
    }

    /// Names of every file below the root, `.git` excluded, sorted.
    pub fn files(&self) -> Vec<String> {
        fn walk(dir: &Path, prefix: &str, out: &mut Vec<String>) {
            for entry in std::fs::read_dir(dir).unwrap().flatten() {
                let name = entry.file_name().to_string_lossy().into_owned();
                if name == ".git" {
                    continue;
                }
                let relative = format!("{prefix}{name}");
                if entry.path().is_dir() {
                    walk(&entry.path(), &format!("{relative}/"), out);
                } else {
                    out.push(relative);
                }
            }
        }

        let mut files = Vec::new();
        walk(self.dir.path(), "", &mut files);
        files.sort();
        files
    }

    /// Write `file` and commit everything as `author`.
    pub fn write_and_commit(
        &self,
        file: &str,
        content: &str,
        message: &str,
        author: (&str, &str),
    ) -> Oid {
        self.write(file, content);

        let mut index = self.repo.index().unwrap();
        index
            .add_all(["*"].iter(), git2::IndexAddOption::DEFAULT, None)
            .unwrap();
        index.update_all(["*"].iter(), None).unwrap();
        index.write().unwrap();
        let tree = self.repo.find_tree(index.write_tree().unwrap()).unwrap();

        let signature = git2::Signature::now(author.0, author.1).unwrap();
        let parent = self.repo.head().ok().map(|h| h.peel_to_commit().unwrap());
        let parents: Vec<&git2::Commit<'_>> = parent.iter().collect();
        let oid = self
            .repo
            .commit(Some("HEAD"), &signature, &signature, message, &tree, &parents)
            .unwrap();
        to_oid(oid)
    }

    pub fn head(&self) -> git2::Commit<'_> {
        self.repo.head().unwrap().peel_to_commit().unwrap()
    }

    pub fn commit_count(&self) -> usize {
        commit_count(&self.repo, "HEAD")
    }

    pub fn tracking_oid(&self) -> Option<Oid> {
        self.repo
            .refname_to_id("refs/remotes/origin/master")
            .ok()
            .map(to_oid)
    }

    /// No staged, unstaged or untracked changes.
    pub fn is_clean(&self) -> bool {
        let mut options = git2::StatusOptions::new();
        options.include_untracked(true).recurse_untracked_dirs(true);
        self.repo.statuses(Some(&mut options)).unwrap().is_empty()
    }
}
