//! Rotation store trait and in-memory implementation.
//!
//! A rotation store is an ordered, double-ended collection of
//! [`KeyChainRecord`]s kept **newest-first**. The head is the record most
//! recently accepted as "current" by some instance; older records stay
//! behind it until they are evicted from the tail.
//!
//! ```text
//!   add_first ─►┌────────┬────────┬────────┬────────┐─► remove_last
//!               │  K4    │  K3    │  K2    │  K1    │
//!               │ (head) │        │        │ (tail) │
//!               └────────┴────────┴────────┴────────┘
//!                ▲ peek_first                 evicted first
//! ```
//!
//! Each primitive is expected to be atomic on its own against the shared
//! store (as a single Redis `LPUSH`/`RPOP`/`LINDEX` would be). Callers compose
//! them without a transaction, so concurrent writers on different instances
//! can interleave between a read and the following write.

use std::{collections::VecDeque, sync::Arc};

use async_trait::async_trait;
use parking_lot::RwLock;

use crate::{error::StoreResult, record::KeyChainRecord};

/// Predicate used by [`KeyChainStore::find`].
pub type RecordPredicate<'a> = &'a (dyn Fn(&KeyChainRecord) -> bool + Send + Sync);

/// Deque-like persistence for KeyChain records, newest-first.
///
/// Implementations must be thread-safe and every method must be atomic on
/// its own. Capacity enforcement is the caller's job: the store never drops
/// records by itself.
///
/// # Method Summary
///
/// | Method | Redis analogue |
/// |--------|----------------|
/// | [`peek_first`](Self::peek_first) | `LINDEX key 0` |
/// | [`add_first`](Self::add_first) | `LPUSH key record` |
/// | [`remove_last`](Self::remove_last) | `RPOP key` |
/// | [`size`](Self::size) | `LLEN key` |
/// | [`find`](Self::find) | `LRANGE key 0 -1` + scan |
/// | [`list`](Self::list) | `LRANGE key 0 -1` |
/// | [`clear`](Self::clear) | `DEL key` |
#[async_trait]
pub trait KeyChainStore: Send + Sync {
    /// Returns the head (newest) record, or `None` if the store is empty.
    async fn peek_first(&self) -> StoreResult<Option<KeyChainRecord>>;

    /// Inserts a record at the head.
    async fn add_first(&self, record: KeyChainRecord) -> StoreResult<()>;

    /// Removes and returns the tail (oldest) record, or `None` if empty.
    async fn remove_last(&self) -> StoreResult<Option<KeyChainRecord>>;

    /// Returns the number of records currently held.
    async fn size(&self) -> StoreResult<usize>;

    /// Returns the first record, scanning newest to oldest, that matches
    /// `predicate`.
    ///
    /// A linear scan is acceptable; stores are bounded by a small capacity.
    async fn find(&self, predicate: RecordPredicate<'_>) -> StoreResult<Option<KeyChainRecord>>;

    /// Returns a snapshot of every record, newest-first.
    async fn list(&self) -> StoreResult<Vec<KeyChainRecord>>;

    /// Removes every record.
    async fn clear(&self) -> StoreResult<()>;
}

#[async_trait]
impl<S: KeyChainStore + ?Sized> KeyChainStore for Arc<S> {
    async fn peek_first(&self) -> StoreResult<Option<KeyChainRecord>> {
        (**self).peek_first().await
    }

    async fn add_first(&self, record: KeyChainRecord) -> StoreResult<()> {
        (**self).add_first(record).await
    }

    async fn remove_last(&self) -> StoreResult<Option<KeyChainRecord>> {
        (**self).remove_last().await
    }

    async fn size(&self) -> StoreResult<usize> {
        (**self).size().await
    }

    async fn find(&self, predicate: RecordPredicate<'_>) -> StoreResult<Option<KeyChainRecord>> {
        (**self).find(predicate).await
    }

    async fn list(&self) -> StoreResult<Vec<KeyChainRecord>> {
        (**self).list().await
    }

    async fn clear(&self) -> StoreResult<()> {
        (**self).clear().await
    }
}

/// In-memory [`KeyChainStore`] backed by a [`VecDeque`].
///
/// Suitable for single-process deployments and tests. Clones share the same
/// underlying deque, so two repositories built over clones of one store
/// behave like two service instances sharing a Redis list.
///
/// # Example
///
/// ```
/// use keychain_storage::{KeyChainRecord, KeyChainStore, MemoryKeyChainStore};
///
/// # tokio::runtime::Builder::new_current_thread().enable_all().build().unwrap().block_on(async {
/// let store = MemoryKeyChainStore::new();
/// let record = KeyChainRecord::builder()
///     .id("kid-1")
///     .algorithm("EdDSA")
///     .created_at(0)
///     .public_key(vec![1u8; 32])
///     .private_key(vec![2u8; 32])
///     .build();
///
/// store.add_first(record).await.unwrap();
/// assert_eq!(store.size().await.unwrap(), 1);
/// assert_eq!(store.peek_first().await.unwrap().map(|r| r.id), Some("kid-1".to_owned()));
/// # });
/// ```
#[derive(Debug, Default, Clone)]
pub struct MemoryKeyChainStore {
    records: Arc<RwLock<VecDeque<KeyChainRecord>>>,
}

impl MemoryKeyChainStore {
    /// Creates a new empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl KeyChainStore for MemoryKeyChainStore {
    #[tracing::instrument(skip(self))]
    async fn peek_first(&self) -> StoreResult<Option<KeyChainRecord>> {
        Ok(self.records.read().front().cloned())
    }

    #[tracing::instrument(skip(self, record), fields(kid = %record.id))]
    async fn add_first(&self, record: KeyChainRecord) -> StoreResult<()> {
        self.records.write().push_front(record);
        Ok(())
    }

    #[tracing::instrument(skip(self))]
    async fn remove_last(&self) -> StoreResult<Option<KeyChainRecord>> {
        Ok(self.records.write().pop_back())
    }

    #[tracing::instrument(skip(self))]
    async fn size(&self) -> StoreResult<usize> {
        Ok(self.records.read().len())
    }

    #[tracing::instrument(skip(self, predicate))]
    async fn find(&self, predicate: RecordPredicate<'_>) -> StoreResult<Option<KeyChainRecord>> {
        Ok(self.records.read().iter().find(|record| predicate(record)).cloned())
    }

    #[tracing::instrument(skip(self))]
    async fn list(&self) -> StoreResult<Vec<KeyChainRecord>> {
        Ok(self.records.read().iter().cloned().collect())
    }

    #[tracing::instrument(skip(self))]
    async fn clear(&self) -> StoreResult<()> {
        self.records.write().clear();
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
mod tests {
    use super::*;

    fn record(id: &str) -> KeyChainRecord {
        KeyChainRecord::builder()
            .id(id)
            .algorithm("EdDSA")
            .created_at(0)
            .public_key(vec![1u8; 4])
            .private_key(vec![2u8; 4])
            .build()
    }

    #[tokio::test]
    async fn test_empty_store() {
        let store = MemoryKeyChainStore::new();
        assert_eq!(store.size().await.unwrap(), 0);
        assert!(store.peek_first().await.unwrap().is_none());
        assert!(store.remove_last().await.unwrap().is_none());
        assert!(store.list().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_newest_first_ordering() {
        let store = MemoryKeyChainStore::new();
        store.add_first(record("k1")).await.unwrap();
        store.add_first(record("k2")).await.unwrap();
        store.add_first(record("k3")).await.unwrap();

        let ids: Vec<String> = store.list().await.unwrap().into_iter().map(|r| r.id).collect();
        assert_eq!(ids, vec!["k3", "k2", "k1"]);
        assert_eq!(store.peek_first().await.unwrap().unwrap().id, "k3");
        assert_eq!(store.remove_last().await.unwrap().unwrap().id, "k1");
        assert_eq!(store.size().await.unwrap(), 2);
    }

    #[tokio::test]
    async fn test_find_by_predicate() {
        let store = MemoryKeyChainStore::new();
        store.add_first(record("k1")).await.unwrap();
        store.add_first(record("k2")).await.unwrap();

        let found = store.find(&|r: &KeyChainRecord| r.has_id("k1")).await.unwrap();
        assert_eq!(found.map(|r| r.id), Some("k1".to_owned()));

        let missing = store.find(&|r: &KeyChainRecord| r.has_id("k9")).await.unwrap();
        assert!(missing.is_none());
    }

    #[tokio::test]
    async fn test_clones_share_state() {
        let store = MemoryKeyChainStore::new();
        let other = store.clone();
        store.add_first(record("shared")).await.unwrap();
        assert_eq!(other.size().await.unwrap(), 1);

        other.clear().await.unwrap();
        assert_eq!(store.size().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_arc_dyn_store_delegates() {
        let store: Arc<dyn KeyChainStore> = Arc::new(MemoryKeyChainStore::new());
        store.add_first(record("k1")).await.unwrap();
        assert_eq!(store.size().await.unwrap(), 1);
    }
}
