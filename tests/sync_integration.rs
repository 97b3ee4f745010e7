//! End-to-end sync cycles between two working copies of one remote.

mod support;

use std::collections::HashMap;

use docsync::core::config::{Share, SyncType, Timeouts};
use docsync::engine::runner::Runner;
use docsync::repository::{FetchResult, MergeResult, PushResult};

use support::{Local, Remote};

fn runner(local: &Local) -> Runner {
    Runner::from_share(&Share::new(local.path()), Timeouts::default())
}

#[test]
fn changes_travel_between_copies() {
    let remote = Remote::with_commit();
    let alice = Local::clone_of(&remote);
    let bob = Local::clone_of(&remote);
    let mut alice_runner = runner(&alice);
    let mut bob_runner = runner(&bob);

    alice.write("notes/todo", "buy milk");
    let report = alice_runner.sync_changes().unwrap();
    assert_eq!(report.commit, Some(true));
    assert_eq!(report.fetch, Some(FetchResult::Ok));
    assert_eq!(report.merge, Some(MergeResult::Ok));
    assert_eq!(report.push, Some(PushResult::Ok));
    assert!(report.is_synced());
    assert_eq!(remote.commit_count(), 2);

    let report = bob_runner.sync_changes().unwrap();
    assert_eq!(report.commit, Some(false));
    assert_eq!(report.merge, Some(MergeResult::Ok));
    assert_eq!(report.push, Some(PushResult::Nothing));
    assert_eq!(
        report.authors,
        HashMap::from([("Test User <test@example.com>".to_string(), 1)])
    );
    assert_eq!(bob.read("notes/todo"), "buy milk");
    assert_eq!(bob_runner.last_synced(), alice_runner.last_synced());

    // Nothing new arrived since.
    let report = bob_runner.sync_changes().unwrap();
    assert!(report.authors.is_empty());
}

#[test]
fn concurrent_edits_are_kept_side_by_side() {
    let remote = Remote::with_commit();
    let alice = Local::clone_of(&remote);
    let bob = Local::clone_of(&remote);
    let mut alice_runner = runner(&alice);
    let mut bob_runner = runner(&bob);

    alice.write("file1", "dead");
    bob.write("file1", "beef");

    let report = alice_runner.sync_changes().unwrap();
    assert_eq!(report.push, Some(PushResult::Ok));

    let report = bob_runner.sync_changes().unwrap();
    assert_eq!(report.conflicts(), ["file1".to_string()]);
    assert_eq!(report.push, Some(PushResult::Ok));

    let report = alice_runner.sync_changes().unwrap();
    assert_eq!(report.merge, Some(MergeResult::Ok));
    assert_eq!(
        alice.files(),
        vec!["file1 (18ed963)", "file1 (7bfce5c)", "file1 (f6ea049 original)"]
    );
    assert_eq!(alice.files(), bob.files());
}

#[test]
fn fetch_only_share_leaves_working_tree_alone() {
    let remote = Remote::with_commit();
    let local = Local::clone_of(&remote);
    remote.commit("file2", "foo", "remote commit", support::AUTHOR2);
    local.write("draft", "unsaved");

    let share = Share {
        sync_type: SyncType::Fetch,
        ..Share::new(local.path())
    };
    let mut runner = Runner::from_share(&share, Timeouts::default());
    let report = runner.sync_changes().unwrap();

    assert_eq!(report.commit, None);
    assert_eq!(report.fetch, Some(FetchResult::Ok));
    assert_eq!(report.merge, None);
    assert!(!local.exists("file2"));
    assert!(runner.repository().need_sync());
}
