//! The KeyChain repository protocol and its implementations.
//!
//! - [`CachedKeyChain`]: in-process cache of the current KeyChain with lazy
//!   bootstrap and a periodic background refresh
//! - [`DistributedKeyChainRepository`]: rotation over a shared
//!   [`KeyChainStore`](keychain_storage::KeyChainStore), safe to run on many
//!   instances at once

mod cached;
mod distributed;

use std::{sync::Arc, time::Duration};

use async_trait::async_trait;
pub use cached::CachedKeyChain;
pub use distributed::DistributedKeyChainRepository;

use crate::{error::Result, keychain::KeyChain};

/// Access to the current signing KeyChain and its retained history.
///
/// Token issuers call [`current`](Self::current), verifiers call
/// [`find`](Self::find), and a scheduler or operator drives
/// [`rotate`](Self::rotate) and [`forced_rotate`](Self::forced_rotate).
#[async_trait]
pub trait KeyChainRepository: Send + Sync {
    /// Maximum number of KeyChains retained for verification.
    fn capacity(&self) -> usize;

    /// Returns the current signing KeyChain.
    ///
    /// # Errors
    ///
    /// Returns [`KeyChainError::UninitializedRepository`](crate::KeyChainError::UninitializedRepository)
    /// if nothing is cached and the store is empty, unreachable or holds an
    /// undecodable head.
    async fn current(&self) -> Result<Arc<KeyChain>>;

    /// Looks up a retained KeyChain by id, current or not.
    ///
    /// Returns `Ok(None)` for ids that were evicted or never existed, and
    /// when the store cannot be read. Store failures are logged.
    ///
    /// # Errors
    ///
    /// Returns [`KeyChainError::DecodeFailure`](crate::KeyChainError::DecodeFailure) if the
    /// matching record is corrupt.
    async fn find(&self, kid: &str) -> Result<Option<Arc<KeyChain>>>;

    /// Promotes `candidate` if the current head is older than
    /// `min_validity`.
    ///
    /// Returns `true` only when the store was changed. Store failures are
    /// logged and reported as `false`.
    async fn rotate(&self, candidate: KeyChain, min_validity: Duration) -> bool;

    /// Promotes `candidate` regardless of the current head's age.
    ///
    /// Returns `false` only if the write failed.
    async fn forced_rotate(&self, candidate: KeyChain) -> bool;

    /// Removes every retained KeyChain and invalidates the local cache.
    ///
    /// # Errors
    ///
    /// Returns [`KeyChainError::StoreUnavailable`](crate::KeyChainError::StoreUnavailable) if the
    /// store cannot be cleared.
    async fn clear(&self) -> Result<()>;
}

#[async_trait]
impl<R: KeyChainRepository + ?Sized> KeyChainRepository for Arc<R> {
    fn capacity(&self) -> usize {
        (**self).capacity()
    }

    async fn current(&self) -> Result<Arc<KeyChain>> {
        (**self).current().await
    }

    async fn find(&self, kid: &str) -> Result<Option<Arc<KeyChain>>> {
        (**self).find(kid).await
    }

    async fn rotate(&self, candidate: KeyChain, min_validity: Duration) -> bool {
        (**self).rotate(candidate, min_validity).await
    }

    async fn forced_rotate(&self, candidate: KeyChain) -> bool {
        (**self).forced_rotate(candidate).await
    }

    async fn clear(&self) -> Result<()> {
        (**self).clear().await
    }
}
