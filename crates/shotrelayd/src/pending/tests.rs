//! Unit tests for the pending request table.

use std::sync::{Arc, Barrier};
use std::thread;
use std::time::Duration;

use rstest::{fixture, rstest};
use time::OffsetDateTime;

use super::*;
use crate::caller::RecordingCaller;

const TIMEOUT: Duration = Duration::from_secs(30);

fn at(seconds: u64) -> OffsetDateTime {
    OffsetDateTime::UNIX_EPOCH + Duration::from_secs(seconds)
}

fn caller() -> Arc<dyn CallerHandle> {
    Arc::new(RecordingCaller::default())
}

#[fixture]
fn table() -> PendingRequests {
    PendingRequests::new()
}

#[rstest]
fn resolves_exactly_once(table: PendingRequests) {
    table.insert("t1", caller(), "agent", at(0)).expect("fresh token");
    let resolved = table.resolve("t1").expect("outstanding");
    assert_eq!(resolved.target_agent_id, "agent");
    assert_eq!(resolved.created_at, at(0));
    assert!(table.resolve("t1").is_none());
    assert!(table.is_empty());
}

#[rstest]
fn duplicate_tokens_are_refused(table: PendingRequests) {
    table.insert("t1", caller(), "first", at(0)).expect("fresh token");
    assert_eq!(
        table.insert("t1", caller(), "second", at(1)),
        Err(PendingError::DuplicateToken {
            token: "t1".to_owned()
        })
    );
    let kept = table.resolve("t1").expect("original entry kept");
    assert_eq!(kept.target_agent_id, "first");
}

#[rstest]
fn sweep_keeps_entries_until_strictly_older_than_threshold(table: PendingRequests) {
    table.insert("t1", caller(), "agent", at(100)).expect("fresh token");

    assert!(table.sweep_expired(at(129), TIMEOUT).is_empty());
    assert!(table.sweep_expired(at(130), TIMEOUT).is_empty());
    assert!(table.contains("t1"));

    let evicted = table.sweep_expired(at(131), TIMEOUT);
    assert_eq!(evicted.len(), 1);
    assert!(!table.contains("t1"));
}

#[rstest]
fn sweep_leaves_unexpired_entries(table: PendingRequests) {
    table.insert("old", caller(), "agent", at(0)).expect("fresh token");
    table.insert("new", caller(), "agent", at(50)).expect("fresh token");

    let evicted: Vec<_> = table
        .sweep_expired(at(60), TIMEOUT)
        .into_iter()
        .map(|request| request.token)
        .collect();

    assert_eq!(evicted, ["old"]);
    assert!(table.contains("new"));
}

#[rstest]
fn resolve_after_sweep_finds_nothing(table: PendingRequests) {
    table.insert("t1", caller(), "agent", at(0)).expect("fresh token");
    assert_eq!(table.sweep_expired(at(31), TIMEOUT).len(), 1);
    assert!(table.resolve("t1").is_none());
}

#[test]
fn racing_resolvers_remove_a_token_once() {
    let table = Arc::new(PendingRequests::new());
    table.insert("t1", caller(), "agent", at(0)).expect("fresh token");
    let barrier = Arc::new(Barrier::new(8));

    let racers: Vec<_> = (0..8)
        .map(|index| {
            let table = Arc::clone(&table);
            let barrier = Arc::clone(&barrier);
            thread::spawn(move || {
                barrier.wait();
                if index % 2 == 0 {
                    usize::from(table.resolve("t1").is_some())
                } else {
                    table.sweep_expired(at(60), TIMEOUT).len()
                }
            })
        })
        .collect();

    let removals: usize = racers
        .into_iter()
        .map(|racer| racer.join().expect("racer panicked"))
        .sum();
    assert_eq!(removals, 1);
}
