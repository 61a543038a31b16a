//! Conformance test suite for [`KeyChainStore`] implementations.
//!
//! Every adapter, whether in-memory or backed by a remote deque, can run the
//! same checks to prove it honours the newest-first contract the rotation
//! algorithm relies on.
//!
//! # Usage
//!
//! Enable the `testutil` feature and call each function with a fresh, empty
//! store:
//!
//! ```no_run
//! use keychain_storage::{MemoryKeyChainStore, conformance};
//!
//! #[tokio::test]
//! async fn peek_on_empty_returns_none() {
//!     conformance::peek_on_empty_returns_none(&MemoryKeyChainStore::new()).await;
//! }
//! ```

use std::sync::Arc;

use crate::{record::KeyChainRecord, store::KeyChainStore, testutil::make_record};

/// `peek_first` on an empty store returns `Ok(None)`.
pub async fn peek_on_empty_returns_none<S: KeyChainStore>(store: &S) {
    let head = store.peek_first().await.expect("peek_first should succeed");
    assert!(head.is_none(), "empty store should have no head");
    assert_eq!(store.size().await.expect("size"), 0);
}

/// `add_first` makes the new record the head.
pub async fn add_first_becomes_head<S: KeyChainStore>(store: &S) {
    store.add_first(make_record(1)).await.expect("add_first");
    store.add_first(make_record(2)).await.expect("add_first");
    let head = store.peek_first().await.expect("peek_first").expect("head exists");
    assert_eq!(head.id, make_record(2).id);
}

/// `remove_last` removes the oldest record first.
pub async fn remove_last_evicts_oldest<S: KeyChainStore>(store: &S) {
    for idx in 1..=3 {
        store.add_first(make_record(idx)).await.expect("add_first");
    }
    let evicted = store.remove_last().await.expect("remove_last").expect("tail exists");
    assert_eq!(evicted.id, make_record(1).id);
    assert_eq!(store.size().await.expect("size"), 2);
}

/// `remove_last` on an empty store is a no-op returning `None`.
pub async fn remove_last_on_empty_is_noop<S: KeyChainStore>(store: &S) {
    let evicted = store.remove_last().await.expect("remove_last");
    assert!(evicted.is_none());
}

/// `list` returns records newest-first.
pub async fn list_is_newest_first<S: KeyChainStore>(store: &S) {
    for idx in 1..=4 {
        store.add_first(make_record(idx)).await.expect("add_first");
    }
    let ids: Vec<String> = store.list().await.expect("list").into_iter().map(|r| r.id).collect();
    let expected: Vec<String> = (1..=4).rev().map(|idx| make_record(idx).id).collect();
    assert_eq!(ids, expected);
}

/// `find` locates a non-head record and returns `None` for unknown ids.
pub async fn find_scans_all_records<S: KeyChainStore>(store: &S) {
    for idx in 1..=3 {
        store.add_first(make_record(idx)).await.expect("add_first");
    }
    let target = make_record(1);
    let found = store
        .find(&|r: &KeyChainRecord| r.has_id(&target.id))
        .await
        .expect("find")
        .expect("record should be found");
    assert_eq!(found, target);

    let missing = store.find(&|r: &KeyChainRecord| r.has_id("kid-unknown")).await.expect("find");
    assert!(missing.is_none());
}

/// Records come back byte-identical to what was stored.
pub async fn records_roundtrip_unchanged<S: KeyChainStore>(store: &S) {
    let record = make_record(77);
    store.add_first(record.clone()).await.expect("add_first");
    let head = store.peek_first().await.expect("peek_first").expect("head");
    assert_eq!(head, record);
}

/// `clear` removes everything.
pub async fn clear_removes_all<S: KeyChainStore>(store: &S) {
    for idx in 1..=3 {
        store.add_first(make_record(idx)).await.expect("add_first");
    }
    store.clear().await.expect("clear");
    assert_eq!(store.size().await.expect("size"), 0);
    assert!(store.peek_first().await.expect("peek_first").is_none());
}

/// Concurrent `add_first` calls are all retained.
pub async fn concurrent_adds_are_all_retained<S: KeyChainStore + 'static>(store: Arc<S>) {
    let mut handles = Vec::new();
    for idx in 0..16 {
        let store = Arc::clone(&store);
        handles.push(tokio::spawn(async move {
            store.add_first(make_record(idx)).await.expect("add_first");
        }));
    }
    for handle in handles {
        handle.await.expect("task panicked");
    }
    assert_eq!(store.size().await.expect("size"), 16);
}

/// Runs every conformance check against stores produced by `factory`.
pub async fn run_all<S, F>(factory: F)
where
    S: KeyChainStore + 'static,
    F: Fn() -> S,
{
    peek_on_empty_returns_none(&factory()).await;
    add_first_becomes_head(&factory()).await;
    remove_last_evicts_oldest(&factory()).await;
    remove_last_on_empty_is_noop(&factory()).await;
    list_is_newest_first(&factory()).await;
    find_scans_all_records(&factory()).await;
    records_roundtrip_unchanged(&factory()).await;
    clear_removes_all(&factory()).await;
    concurrent_adds_are_all_retained(Arc::new(factory())).await;
}
