//! Rotation over a store shared by many instances.

use std::{sync::Arc, time::Duration};

use async_trait::async_trait;
use fail::fail_point;
use keychain_storage::{KeyChainRecord, KeyChainStore, TimeoutStore};

use super::{KeyChainRepository, cached::CachedKeyChain};
use crate::{
    clock::{Clock, SystemClock},
    codec::KeyChainCodec,
    config::KeyChainRepositoryConfig,
    error::{KeyChainError, Result},
    keychain::{KeyChain, is_expired},
};

/// KeyChain repository whose rotation store may be shared by several
/// service instances.
///
/// # Rotation
///
/// [`rotate`](KeyChainRepository::rotate) reads the store head and only
/// inserts the candidate if the head is older than `min_validity` and is a
/// different KeyChain. An empty store always accepts. After an insert the
/// tail is evicted until the store is back within
/// [`capacity`](KeyChainRepository::capacity).
///
/// # Cross-instance races
///
/// The head read and the insert are separate store calls with no lock in
/// between. Two instances that observe the same expired head may both
/// insert, leaving two fresh KeyChains at the top of the store. Both remain
/// verifiable through [`find`](KeyChainRepository::find) and every instance
/// converges on the newest head at its next refresh.
///
/// # Example
///
/// ```
/// use std::{sync::Arc, time::Duration};
///
/// use keychain::{
///     Algorithm, DistributedKeyChainRepository, KeyChain, KeyChainRepository,
///     id::UuidV7Generator, key_pair::Ed25519KeyPairGenerator,
/// };
/// use keychain_storage::MemoryKeyChainStore;
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() -> keychain::Result<()> {
/// let repository = DistributedKeyChainRepository::builder()
///     .store(Arc::new(MemoryKeyChainStore::new()))
///     .build()?;
///
/// let first = KeyChain::generate(Algorithm::EdDsa, &Ed25519KeyPairGenerator, &UuidV7Generator)?;
/// assert!(repository.rotate(first.clone(), Duration::from_secs(3600)).await);
///
/// // Still within its validity window, so the next rotation is a no-op.
/// let second = KeyChain::generate(Algorithm::EdDsa, &Ed25519KeyPairGenerator, &UuidV7Generator)?;
/// assert!(!repository.rotate(second, Duration::from_secs(3600)).await);
/// assert_eq!(repository.current().await?.id(), first.id());
/// # Ok(())
/// # }
/// ```
pub struct DistributedKeyChainRepository {
    base: Arc<CachedKeyChain>,
    config: KeyChainRepositoryConfig,
    clock: Arc<dyn Clock>,
}

#[bon::bon]
impl DistributedKeyChainRepository {
    /// Creates a repository over `store`.
    ///
    /// Every store call is bounded by the configured `store_timeout`. The
    /// background refresh is not started; call
    /// [`start_refresh`](Self::start_refresh) from within a Tokio runtime.
    ///
    /// # Optional Fields
    ///
    /// * `config` - Repository settings (default: [`KeyChainRepositoryConfig::default`]).
    /// * `codec` - Record codec (default: raw private keys).
    /// * `clock` - Time source for expiry checks (default: system clock).
    ///
    /// # Errors
    ///
    /// Returns [`KeyChainError::InvalidConfig`] if `config` does not
    /// validate.
    #[builder]
    pub fn new(
        store: Arc<dyn KeyChainStore>,
        #[builder(default)] config: KeyChainRepositoryConfig,
        #[builder(default)] codec: KeyChainCodec,
        #[builder(default = Arc::new(SystemClock) as Arc<dyn Clock>)] clock: Arc<dyn Clock>,
    ) -> Result<Self> {
        let config = config.validate()?;
        let store: Arc<dyn KeyChainStore> =
            Arc::new(TimeoutStore::new(store, config.store_timeout()));
        let base = Arc::new(CachedKeyChain::new(store, codec, config.refresh_interval()));

        Ok(Self { base, config, clock })
    }
}

impl DistributedKeyChainRepository {
    /// The repository configuration.
    #[must_use]
    pub fn config(&self) -> &KeyChainRepositoryConfig {
        &self.config
    }

    /// The time source used for expiry checks.
    #[must_use]
    pub fn clock(&self) -> &Arc<dyn Clock> {
        &self.clock
    }

    /// The cache this repository reads through.
    #[must_use]
    pub fn cache(&self) -> &Arc<CachedKeyChain> {
        &self.base
    }

    /// Rotates using the configured default `min_validity`.
    pub async fn rotate_default(&self, candidate: KeyChain) -> bool {
        self.rotate(candidate, self.config.min_validity()).await
    }

    /// Returns every decodable retained KeyChain, newest first.
    ///
    /// Records that fail to decode are logged and skipped.
    ///
    /// # Errors
    ///
    /// Returns [`KeyChainError::StoreUnavailable`] if the store cannot be
    /// listed.
    #[tracing::instrument(skip(self))]
    pub async fn history(&self) -> Result<Vec<KeyChain>> {
        let records = self.store().list().await?;
        let total = records.len();

        let keychains: Vec<KeyChain> = records
            .iter()
            .filter_map(|record| match self.base.codec().decode(record) {
                Ok(keychain) => Some(keychain),
                Err(err) => {
                    tracing::warn!(
                        kid = %record.id,
                        error = %err,
                        "skipping undecodable KeyChain record"
                    );
                    None
                },
            })
            .collect();

        tracing::debug!(total, decoded = keychains.len(), "listed KeyChain history");
        Ok(keychains)
    }

    /// Reloads the current KeyChain from the store once.
    ///
    /// # Errors
    ///
    /// See [`CachedKeyChain::refresh`].
    pub async fn refresh(&self) -> Result<bool> {
        self.base.refresh().await
    }

    /// Starts the background cache refresh.
    ///
    /// # Panics
    ///
    /// Must be called within a Tokio runtime context.
    pub fn start_refresh(&self) {
        self.base.start_refresh();
    }

    /// Stops the background cache refresh and waits for it to exit.
    pub async fn shutdown(&self) {
        self.base.shutdown().await;
    }

    /// Number of completed background refresh cycles.
    #[must_use]
    pub fn refresh_count(&self) -> u64 {
        self.base.refresh_count()
    }

    /// Number of failed background refresh cycles.
    #[must_use]
    pub fn refresh_errors_total(&self) -> u64 {
        self.base.refresh_errors_total()
    }

    fn store(&self) -> &Arc<dyn KeyChainStore> {
        self.base.store()
    }

    /// Core rotation. `None` for `min_validity` skips the expiry check.
    #[tracing::instrument(
        skip(self, candidate),
        fields(kid = candidate.id(), forced = min_validity.is_none())
    )]
    async fn try_rotate(
        &self,
        candidate: KeyChain,
        min_validity: Option<Duration>,
    ) -> Result<bool> {
        let observed = self.base.generation();
        if let Some(min_validity) = min_validity
            && let Some(head) = self.store().peek_first().await?
        {
            if !is_expired(head.created_at, min_validity, self.clock.now()) {
                tracing::debug!(head = %head.id, "current KeyChain still valid, rotation skipped");
                self.adopt_head(&head, observed);
                return Ok(false);
            }
            if head.has_id(candidate.id()) {
                tracing::debug!("candidate is already the store head, rotation skipped");
                return Ok(false);
            }
        }

        self.insert(candidate).await?;
        Ok(true)
    }

    async fn insert(&self, candidate: KeyChain) -> Result<()> {
        let record = self.base.codec().encode(&candidate)?;

        fail_point!("keychain-before-store-write", |_| {
            Err(KeyChainError::from(keychain_storage::StoreError::internal(
                "injected failure before store write",
            )))
        });

        self.store().add_first(record).await?;
        self.base.set_current(Arc::new(candidate));
        self.evict_overflow().await;
        Ok(())
    }

    /// Trims the tail back to capacity. Failures here leave the store
    /// temporarily over capacity; the next accepted rotation trims again.
    async fn evict_overflow(&self) {
        let capacity = self.config.capacity();
        loop {
            match self.store().size().await {
                Ok(size) if size > capacity => {},
                Ok(_) => break,
                Err(err) => {
                    tracing::warn!(error = %err, capacity, "could not read store size for eviction");
                    break;
                },
            }

            match self.store().remove_last().await {
                Ok(Some(evicted)) => {
                    tracing::debug!(kid = %evicted.id, "evicted oldest KeyChain");
                },
                Ok(None) => break,
                Err(err) => {
                    tracing::warn!(error = %err, capacity, "KeyChain eviction failed");
                    break;
                },
            }
        }
    }

    /// Caches a head written by another instance, unless the cache was
    /// written after `observed` was taken.
    fn adopt_head(&self, head: &KeyChainRecord, observed: u64) {
        if self.base.cached().is_some_and(|current| current.id() == head.id) {
            return;
        }
        match self.base.codec().decode(head) {
            Ok(keychain) => {
                self.base.adopt(&Arc::new(keychain), observed);
            },
            Err(err) => tracing::warn!(kid = %head.id, error = %err, "store head is undecodable"),
        }
    }

    fn audit_rotation(&self, action: &'static str, kid: &str, result: &Result<bool>) {
        match result {
            Ok(true) => tracing::info!(
                audit.action = action,
                audit.resource = %format_args!("kid:{kid}"),
                audit.result = "success",
                "audit_event"
            ),
            Ok(false) => {},
            Err(err) => tracing::warn!(
                audit.action = action,
                audit.resource = %format_args!("kid:{kid}"),
                audit.result = %format_args!("failure: {err}"),
                "audit_event"
            ),
        }
    }
}

#[async_trait]
impl KeyChainRepository for DistributedKeyChainRepository {
    fn capacity(&self) -> usize {
        self.config.capacity()
    }

    async fn current(&self) -> Result<Arc<KeyChain>> {
        self.base.current().await
    }

    #[tracing::instrument(skip(self))]
    async fn find(&self, kid: &str) -> Result<Option<Arc<KeyChain>>> {
        if let Some(current) = self.base.cached()
            && current.id() == kid
        {
            return Ok(Some(current));
        }

        let predicate = |record: &KeyChainRecord| record.has_id(kid);
        let record = match self.store().find(&predicate).await {
            Ok(Some(record)) => record,
            Ok(None) => {
                tracing::debug!("KeyChain not retained");
                return Ok(None);
            },
            Err(err) => {
                tracing::warn!(error = %err, "KeyChain lookup failed, treating as absent");
                return Ok(None);
            },
        };

        self.base.codec().decode(&record).map(|keychain| Some(Arc::new(keychain)))
    }

    async fn rotate(&self, candidate: KeyChain, min_validity: Duration) -> bool {
        let kid = candidate.id().to_owned();
        let result = self.try_rotate(candidate, Some(min_validity)).await;
        self.audit_rotation("rotate_keychain", &kid, &result);
        result.unwrap_or(false)
    }

    async fn forced_rotate(&self, candidate: KeyChain) -> bool {
        let kid = candidate.id().to_owned();
        let result = self.try_rotate(candidate, None).await;
        self.audit_rotation("forced_rotate_keychain", &kid, &result);
        result.unwrap_or(false)
    }

    #[tracing::instrument(skip(self))]
    async fn clear(&self) -> Result<()> {
        self.store().clear().await?;
        self.base.invalidate();
        tracing::info!(
            audit.action = "clear_keychains",
            audit.resource = "all_keychains",
            audit.result = "success",
            "audit_event"
        );
        Ok(())
    }
}

impl std::fmt::Debug for DistributedKeyChainRepository {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DistributedKeyChainRepository")
            .field("config", &self.config)
            .field("cache", &self.base)
            .finish_non_exhaustive()
    }
}
