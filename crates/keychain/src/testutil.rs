//! Shared test utilities for KeyChain repositories.
//!
//! Available with the `testutil` feature or inside this crate's own tests.
//!
//! - **KeyChain factories**: [`make_keychain`] and [`make_keychain_at`] build valid Ed25519
//!   KeyChains with chosen ids and creation times
//! - **[`GatedStore`]**: holds its first `peek_first` at a shared barrier so several repositories
//!   observe the same head before any of them writes

use std::sync::{
    Arc,
    atomic::{AtomicBool, Ordering},
};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use keychain_storage::{KeyChainRecord, KeyChainStore, RecordPredicate, StoreResult};
use tokio::sync::Barrier;

use crate::{
    algorithm::Algorithm,
    key_pair::{Ed25519KeyPairGenerator, KeyPairGenerator},
    keychain::KeyChain,
};

/// Builds an Ed25519 KeyChain with the given id, created now.
///
/// # Panics
///
/// Panics if key generation fails.
#[must_use]
pub fn make_keychain(id: &str) -> KeyChain {
    make_keychain_at(id, Utc::now())
}

/// Builds an Ed25519 KeyChain with the given id and creation time.
///
/// # Panics
///
/// Panics if key generation fails.
#[must_use]
pub fn make_keychain_at(id: &str, created_at: DateTime<Utc>) -> KeyChain {
    let key_pair =
        Ed25519KeyPairGenerator.generate(Algorithm::EdDsa).expect("Ed25519 generation succeeds");
    KeyChain::builder()
        .id(id)
        .algorithm(Algorithm::EdDsa)
        .key_pair(key_pair)
        .created_at(created_at)
        .build()
        .expect("EdDSA is asymmetric")
}

/// A store wrapper whose first `peek_first` waits on a shared barrier.
///
/// Give every racing repository its own `GatedStore` over the same inner
/// store and one `Barrier` sized to the number of racers. Each racer reads
/// the head, then blocks until all racers have read it. Later calls pass
/// straight through.
pub struct GatedStore<S> {
    inner: S,
    barrier: Arc<Barrier>,
    armed: AtomicBool,
}

impl<S: KeyChainStore> GatedStore<S> {
    /// Wraps `inner`, gating its first head read on `barrier`.
    pub fn new(inner: S, barrier: Arc<Barrier>) -> Self {
        Self { inner, barrier, armed: AtomicBool::new(true) }
    }
}

#[async_trait]
impl<S: KeyChainStore> KeyChainStore for GatedStore<S> {
    async fn peek_first(&self) -> StoreResult<Option<KeyChainRecord>> {
        let head = self.inner.peek_first().await;
        if self.armed.swap(false, Ordering::AcqRel) {
            self.barrier.wait().await;
        }
        head
    }

    async fn add_first(&self, record: KeyChainRecord) -> StoreResult<()> {
        self.inner.add_first(record).await
    }

    async fn remove_last(&self) -> StoreResult<Option<KeyChainRecord>> {
        self.inner.remove_last().await
    }

    async fn size(&self) -> StoreResult<usize> {
        self.inner.size().await
    }

    async fn find(&self, predicate: RecordPredicate<'_>) -> StoreResult<Option<KeyChainRecord>> {
        self.inner.find(predicate).await
    }

    async fn list(&self) -> StoreResult<Vec<KeyChainRecord>> {
        self.inner.list().await
    }

    async fn clear(&self) -> StoreResult<()> {
        self.inner.clear().await
    }
}
