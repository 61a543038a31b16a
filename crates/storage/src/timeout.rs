//! Per-call I/O timeout for rotation stores.
//!
//! [`TimeoutStore`] wraps any [`KeyChainStore`] and bounds every primitive
//! with [`tokio::time::timeout`]. An elapsed call surfaces as
//! [`StoreError::Timeout`]. This deadline is purely an I/O bound; it has
//! nothing to do with how long a key must stay current before rotation.

use std::{future::Future, time::Duration};

use async_trait::async_trait;

use crate::{
    error::{StoreError, StoreResult},
    record::KeyChainRecord,
    store::{KeyChainStore, RecordPredicate},
};

/// Default per-call timeout (5 seconds).
pub const DEFAULT_STORE_TIMEOUT: Duration = Duration::from_secs(5);

/// A [`KeyChainStore`] decorator enforcing a deadline on every call.
#[derive(Debug, Clone)]
pub struct TimeoutStore<S> {
    inner: S,
    timeout: Duration,
}

impl<S: KeyChainStore> TimeoutStore<S> {
    /// Wraps `inner`, bounding each call by `timeout`.
    #[must_use]
    pub fn new(inner: S, timeout: Duration) -> Self {
        Self { inner, timeout }
    }

    /// Returns the configured per-call timeout.
    #[must_use]
    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Returns a reference to the wrapped store.
    #[must_use]
    pub fn inner(&self) -> &S {
        &self.inner
    }

    async fn bounded<T>(
        &self,
        operation: &'static str,
        fut: impl Future<Output = StoreResult<T>> + Send,
    ) -> StoreResult<T> {
        match tokio::time::timeout(self.timeout, fut).await {
            Ok(result) => result,
            Err(_elapsed) => {
                tracing::warn!(
                    operation,
                    timeout_ms = self.timeout.as_millis() as u64,
                    "rotation store call timed out"
                );
                Err(StoreError::timeout())
            },
        }
    }
}

#[async_trait]
impl<S: KeyChainStore> KeyChainStore for TimeoutStore<S> {
    async fn peek_first(&self) -> StoreResult<Option<KeyChainRecord>> {
        self.bounded("peek_first", self.inner.peek_first()).await
    }

    async fn add_first(&self, record: KeyChainRecord) -> StoreResult<()> {
        self.bounded("add_first", self.inner.add_first(record)).await
    }

    async fn remove_last(&self) -> StoreResult<Option<KeyChainRecord>> {
        self.bounded("remove_last", self.inner.remove_last()).await
    }

    async fn size(&self) -> StoreResult<usize> {
        self.bounded("size", self.inner.size()).await
    }

    async fn find(&self, predicate: RecordPredicate<'_>) -> StoreResult<Option<KeyChainRecord>> {
        self.bounded("find", self.inner.find(predicate)).await
    }

    async fn list(&self) -> StoreResult<Vec<KeyChainRecord>> {
        self.bounded("list", self.inner.list()).await
    }

    async fn clear(&self) -> StoreResult<()> {
        self.bounded("clear", self.inner.clear()).await
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
mod tests {
    use super::*;
    use crate::testutil::{DelayedStore, make_record, make_record_with_id};

    #[tokio::test]
    async fn test_fast_calls_pass_through() {
        let store = TimeoutStore::new(crate::MemoryKeyChainStore::new(), Duration::from_secs(1));
        store.add_first(make_record(1)).await.unwrap();
        assert_eq!(store.size().await.unwrap(), 1);
        assert_eq!(store.timeout(), Duration::from_secs(1));
    }

    #[tokio::test]
    async fn test_slow_call_times_out() {
        let slow = DelayedStore::new(Duration::from_millis(200));
        let store = TimeoutStore::new(slow, Duration::from_millis(20));

        let result = store.peek_first().await;
        assert!(matches!(result, Err(StoreError::Timeout)), "got {result:?}");
    }

    #[tokio::test]
    async fn test_timed_out_write_is_reported() {
        let slow = DelayedStore::new(Duration::from_millis(200));
        let store = TimeoutStore::new(slow, Duration::from_millis(20));

        let result = store.add_first(make_record_with_id("late")).await;
        assert!(result.unwrap_err().is_transient());
    }
}
