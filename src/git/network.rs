//! git::network
//!
//! Timeout-bounded network operations: fetch, push and clone.
//!
//! # Timeouts
//!
//! Each operation runs on a worker thread holding its own handle on the
//! repository, while the caller waits at most the given timeout for the
//! result. When the timeout fires the caller reports [`Outcome::Timeout`]
//! and raises a cancellation flag; the worker's credential and transfer
//! callbacks observe it and abort at the next report. Nothing is retried
//! here.
//!
//! An abandoned worker outlives the caller, and with it any lock the
//! caller held. It never writes a ref docsync manages itself once
//! cancelled, but a fetch that libgit2 is already finishing may still move
//! `refs/remotes/<remote>/<branch>`. That ref only mirrors the remote, so a
//! late update is equivalent to the next successful fetch.

use std::cell::RefCell;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{mpsc, Arc};
use std::thread;
use std::time::Duration;

use super::fault_injection::{self, Operation};
use super::interface::{Git, GitError, Outcome};

impl Git {
    /// Fetch `branch` from `remote` into `refs/remotes/<remote>/<branch>`.
    pub fn fetch(&self, remote: &str, branch: &str, timeout: Duration) -> Outcome<()> {
        if let Some(outcome) = fault_injection::injected(Operation::Fetch) {
            return outcome;
        }

        let git_dir = self.repo.path().to_path_buf();
        let remote_name = remote.to_string();
        let refspec = format!("+refs/heads/{branch}:refs/remotes/{remote}/{branch}");

        run_bounded(timeout, move |cancelled| {
            let repo = match git2::Repository::open(&git_dir) {
                Ok(repo) => repo,
                Err(e) => return Outcome::Failed(e.message().to_string()),
            };
            let mut remote = match repo.find_remote(&remote_name) {
                Ok(remote) => remote,
                Err(e) => return Outcome::Failed(e.message().to_string()),
            };

            let mut options = git2::FetchOptions::new();
            options.remote_callbacks(remote_callbacks(repo.config().ok(), cancelled));

            match remote.fetch(&[refspec.as_str()], Some(&mut options), None) {
                Ok(()) => Outcome::Ok(()),
                Err(_) if cancelled.load(Ordering::SeqCst) => Outcome::Timeout,
                Err(e) => Outcome::Failed(e.message().to_string()),
            }
        })
    }

    /// Push local `branch` to the same branch on `remote`.
    ///
    /// A non-fast-forward rejection is reported as `Conflict` with no
    /// entries; the caller has to fetch and merge before pushing again.
    pub fn push(&self, remote: &str, branch: &str, timeout: Duration) -> Outcome<()> {
        if let Some(outcome) = fault_injection::injected(Operation::Push) {
            return outcome;
        }

        let git_dir = self.repo.path().to_path_buf();
        let remote_name = remote.to_string();
        let local_ref = format!("refs/heads/{branch}");
        let tracking_ref = format!("refs/remotes/{remote}/{branch}");
        let refspec = format!("{local_ref}:{local_ref}");

        run_bounded(timeout, move |cancelled| {
            let repo = match git2::Repository::open(&git_dir) {
                Ok(repo) => repo,
                Err(e) => return Outcome::Failed(e.message().to_string()),
            };
            let mut remote = match repo.find_remote(&remote_name) {
                Ok(remote) => remote,
                Err(e) => return Outcome::Failed(e.message().to_string()),
            };

            let rejection: RefCell<Option<String>> = RefCell::new(None);
            let result = {
                let mut callbacks = remote_callbacks(repo.config().ok(), cancelled);
                callbacks.push_update_reference(|_refname, status| {
                    if let Some(message) = status {
                        *rejection.borrow_mut() = Some(message.to_string());
                    }
                    Ok(())
                });

                let mut options = git2::PushOptions::new();
                options.remote_callbacks(callbacks);
                remote.push(&[refspec.as_str()], Some(&mut options))
            };

            if let Err(e) = result {
                if cancelled.load(Ordering::SeqCst) {
                    return Outcome::Timeout;
                }
                if e.code() == git2::ErrorCode::NotFastForward || is_rejection(e.message()) {
                    return Outcome::Conflict(Vec::new());
                }
                return Outcome::Failed(e.message().to_string());
            }

            if let Some(message) = rejection.into_inner() {
                if is_rejection(&message) {
                    return Outcome::Conflict(Vec::new());
                }
                return Outcome::Failed(message);
            }

            if !mirror_pushed(&repo, &local_ref, &tracking_ref, cancelled) {
                return Outcome::Timeout;
            }
            Outcome::Ok(())
        })
    }

    /// Clone `url` into `path` and open the result.
    ///
    /// # Errors
    ///
    /// [`GitError::CloneFailed`] if the remote is unreachable or invalid, or
    /// the clone does not finish within `timeout`.
    pub fn clone(url: &str, path: &Path, timeout: Duration) -> Result<Self, GitError> {
        let source = url.to_string();
        let target: PathBuf = path.to_path_buf();

        let outcome = run_bounded(timeout, move |cancelled| {
            let mut options = git2::FetchOptions::new();
            options.remote_callbacks(remote_callbacks(
                git2::Config::open_default().ok(),
                cancelled,
            ));

            match git2::build::RepoBuilder::new()
                .fetch_options(options)
                .clone(&source, &target)
            {
                Ok(_) => Outcome::Ok(()),
                Err(_) if cancelled.load(Ordering::SeqCst) => Outcome::Timeout,
                Err(e) => Outcome::Failed(e.message().to_string()),
            }
        });

        let message = match outcome {
            Outcome::Ok(()) => return Git::open(path),
            Outcome::Timeout => format!("timed out after {}s", timeout.as_secs()),
            Outcome::Failed(message) => message,
            Outcome::Conflict(_) => "unexpected conflict".to_string(),
        };

        Err(GitError::CloneFailed {
            url: url.to_string(),
            message,
        })
    }
}

/// Whether a push error text describes a non-fast-forward rejection.
fn is_rejection(message: &str) -> bool {
    message.contains("non-fast-forward")
        || message.contains("fetch first")
        || message.contains("not present locally")
        || message.contains("cannot push non-fastforwardable")
}

/// Point `tracking_ref` at what was just pushed from `local_ref`.
///
/// Returns false without touching the ref when the caller already gave up.
fn mirror_pushed(
    repo: &git2::Repository,
    local_ref: &str,
    tracking_ref: &str,
    cancelled: &AtomicBool,
) -> bool {
    if cancelled.load(Ordering::SeqCst) {
        return false;
    }
    if let Ok(pushed) = repo.refname_to_id(local_ref) {
        if let Err(e) = repo.reference(tracking_ref, pushed, true, "docsync: push") {
            tracing::warn!(error = %e.message(), refname = %tracking_ref, "failed to update tracking ref");
        }
    }
    true
}

/// Callbacks shared by every network operation: credentials and
/// cancellation.
fn remote_callbacks(config: Option<git2::Config>, cancelled: &AtomicBool) -> git2::RemoteCallbacks<'_> {
    let mut callbacks = git2::RemoteCallbacks::new();
    callbacks.credentials(move |url, username_from_url, allowed| {
        if cancelled.load(Ordering::SeqCst) {
            return Err(git2::Error::from_str("cancelled"));
        }
        if allowed.is_ssh_key() {
            if let Some(user) = username_from_url {
                return git2::Cred::ssh_key_from_agent(user);
            }
        }
        if allowed.is_user_pass_plaintext() {
            if let Some(ref cfg) = config {
                if let Ok(cred) = git2::Cred::credential_helper(cfg, url, username_from_url) {
                    return Ok(cred);
                }
            }
        }
        git2::Cred::default()
    });
    callbacks.transfer_progress(move |_| !cancelled.load(Ordering::SeqCst));
    callbacks.sideband_progress(move |_| !cancelled.load(Ordering::SeqCst));
    callbacks
}

/// Run `op` on a worker thread, waiting at most `timeout` for its result.
fn run_bounded<T, F>(timeout: Duration, op: F) -> Outcome<T>
where
    T: Send + 'static,
    F: FnOnce(&AtomicBool) -> Outcome<T> + Send + 'static,
{
    let cancelled = Arc::new(AtomicBool::new(false));
    let worker_flag = Arc::clone(&cancelled);
    let (tx, rx) = mpsc::channel();

    let spawned = thread::Builder::new()
        .name("docsync-network".into())
        .spawn(move || {
            // The receiver is gone once the caller timed out.
            let _ = tx.send(op(&worker_flag));
        });

    if let Err(e) = spawned {
        return Outcome::Failed(format!("cannot start network worker: {e}"));
    }

    match rx.recv_timeout(timeout) {
        Ok(outcome) => outcome,
        Err(mpsc::RecvTimeoutError::Timeout) => {
            cancelled.store(true, Ordering::SeqCst);
            Outcome::Timeout
        }
        Err(mpsc::RecvTimeoutError::Disconnected) => {
            Outcome::Failed("network worker exited without a result".to_string())
        }
    }
}
