//! Shared test utilities for rotation store testing.
//!
//! Record factories and store wrappers that inject failures or latency. The
//! module is feature-gated behind `testutil` to keep it out of production
//! builds.
//!
//! # Usage
//!
//! ```toml
//! [dev-dependencies]
//! keychain-storage = { path = "../storage", features = ["testutil"] }
//! ```
//!
//! ```no_run
//! // Requires the `testutil` feature to be enabled.
//! use keychain_storage::testutil::{FailingStore, make_record};
//! ```

use std::{sync::Arc, time::Duration};

use async_trait::async_trait;
use parking_lot::Mutex;

use crate::{
    error::{StoreError, StoreResult},
    record::KeyChainRecord,
    store::{KeyChainStore, MemoryKeyChainStore, RecordPredicate},
};

/// Create a deterministic record from an index.
///
/// Ids are zero-padded (`"kid-000042"`) so lexical order matches numeric
/// order. `created_at` equals the index, and the key blobs are filled with
/// the low byte of the index.
#[must_use]
pub fn make_record(idx: usize) -> KeyChainRecord {
    make_record_at(&format!("kid-{idx:06}"), idx as i64)
}

/// Create a record with the given id and `created_at = 0`.
#[must_use]
pub fn make_record_with_id(id: &str) -> KeyChainRecord {
    make_record_at(id, 0)
}

/// Create a record with the given id and creation time (epoch millis).
#[must_use]
pub fn make_record_at(id: &str, created_at: i64) -> KeyChainRecord {
    let fill = (created_at & 0xFF) as u8;
    KeyChainRecord::builder()
        .id(id)
        .algorithm("EdDSA")
        .created_at(created_at)
        .public_key(vec![fill; 32])
        .private_key(vec![fill.wrapping_add(1); 32])
        .build()
}

/// A store that delegates to an inner [`MemoryKeyChainStore`] and can be
/// switched into a failing mode at any time.
///
/// While a failure is configured, every primitive returns a clone of it.
#[derive(Debug, Default, Clone)]
pub struct FailingStore {
    /// The store that receives calls while no failure is configured.
    pub inner: MemoryKeyChainStore,
    fail_with: Arc<Mutex<Option<StoreError>>>,
}

impl FailingStore {
    /// Creates a healthy store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Wraps an existing memory store, sharing its records.
    #[must_use]
    pub fn wrapping(inner: MemoryKeyChainStore) -> Self {
        Self { inner, fail_with: Arc::default() }
    }

    /// Sets (or clears, with `None`) the failure returned by every call.
    pub fn set_failure(&self, error: Option<StoreError>) {
        *self.fail_with.lock() = error;
    }

    fn check(&self) -> StoreResult<()> {
        match self.fail_with.lock().as_ref() {
            Some(error) => Err(error.clone()),
            None => Ok(()),
        }
    }
}

#[async_trait]
impl KeyChainStore for FailingStore {
    async fn peek_first(&self) -> StoreResult<Option<KeyChainRecord>> {
        self.check()?;
        self.inner.peek_first().await
    }

    async fn add_first(&self, record: KeyChainRecord) -> StoreResult<()> {
        self.check()?;
        self.inner.add_first(record).await
    }

    async fn remove_last(&self) -> StoreResult<Option<KeyChainRecord>> {
        self.check()?;
        self.inner.remove_last().await
    }

    async fn size(&self) -> StoreResult<usize> {
        self.check()?;
        self.inner.size().await
    }

    async fn find(&self, predicate: RecordPredicate<'_>) -> StoreResult<Option<KeyChainRecord>> {
        self.check()?;
        self.inner.find(predicate).await
    }

    async fn list(&self) -> StoreResult<Vec<KeyChainRecord>> {
        self.check()?;
        self.inner.list().await
    }

    async fn clear(&self) -> StoreResult<()> {
        self.check()?;
        self.inner.clear().await
    }
}

/// A store that sleeps before every call, simulating a slow network hop.
#[derive(Debug, Default, Clone)]
pub struct DelayedStore {
    /// The store that eventually serves each call.
    pub inner: MemoryKeyChainStore,
    delay: Duration,
}

impl DelayedStore {
    /// Creates an empty store adding `delay` to every call.
    #[must_use]
    pub fn new(delay: Duration) -> Self {
        Self { inner: MemoryKeyChainStore::new(), delay }
    }
}

#[async_trait]
impl KeyChainStore for DelayedStore {
    async fn peek_first(&self) -> StoreResult<Option<KeyChainRecord>> {
        tokio::time::sleep(self.delay).await;
        self.inner.peek_first().await
    }

    async fn add_first(&self, record: KeyChainRecord) -> StoreResult<()> {
        tokio::time::sleep(self.delay).await;
        self.inner.add_first(record).await
    }

    async fn remove_last(&self) -> StoreResult<Option<KeyChainRecord>> {
        tokio::time::sleep(self.delay).await;
        self.inner.remove_last().await
    }

    async fn size(&self) -> StoreResult<usize> {
        tokio::time::sleep(self.delay).await;
        self.inner.size().await
    }

    async fn find(&self, predicate: RecordPredicate<'_>) -> StoreResult<Option<KeyChainRecord>> {
        tokio::time::sleep(self.delay).await;
        self.inner.find(predicate).await
    }

    async fn list(&self) -> StoreResult<Vec<KeyChainRecord>> {
        tokio::time::sleep(self.delay).await;
        self.inner.list().await
    }

    async fn clear(&self) -> StoreResult<()> {
        tokio::time::sleep(self.delay).await;
        self.inner.clear().await
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
mod tests {
    use super::*;

    #[test]
    fn test_make_record_ids_sort_numerically() {
        assert!(make_record(9).id < make_record(10).id);
        assert_eq!(make_record(42).id, "kid-000042");
    }

    #[tokio::test]
    async fn test_failing_store_toggles() {
        let store = FailingStore::new();
        store.add_first(make_record(1)).await.unwrap();

        store.set_failure(Some(StoreError::connection("down")));
        assert!(matches!(store.size().await, Err(StoreError::Connection { .. })));

        store.set_failure(None);
        assert_eq!(store.size().await.unwrap(), 1);
    }
}
