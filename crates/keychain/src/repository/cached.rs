//! In-process cache of the current KeyChain.

use std::{
    sync::{
        Arc,
        atomic::{AtomicU64, Ordering},
    },
    time::{Duration, Instant},
};

use fail::fail_point;
use keychain_storage::KeyChainStore;
use parking_lot::Mutex;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::{
    codec::KeyChainCodec,
    error::{KeyChainError, Result},
    keychain::KeyChain,
};

/// Cache of the last-known current KeyChain, backed by a rotation store.
///
/// # Lookup
///
/// [`current`](Self::current) serves the cached value. On a cold cache it
/// loads the store head once (lazy bootstrap) and caches it.
///
/// # Refresh
///
/// [`start_refresh`](Self::start_refresh) spawns a task that re-reads the
/// store head every `refresh_interval`. A failed refresh is logged and
/// counted but never clears the cache, so a KeyChain that was loaded once
/// stays available through store outages.
///
/// The task holds only a weak reference to the cache. It stops on
/// [`shutdown`](Self::shutdown) or when the last strong reference is
/// dropped. Shutdown is terminal: the task cannot be restarted.
///
/// # Locking
///
/// The cached slot is guarded by one `parking_lot` mutex that is never held
/// across an await point. Every write bumps the slot's generation. Loads
/// from the store note the generation before reading and only write back if
/// it is unchanged, so a head read before a local rotation can never
/// replace that rotation's KeyChain.
pub struct CachedKeyChain {
    store: Arc<dyn KeyChainStore>,
    codec: KeyChainCodec,
    slot: Mutex<Slot>,
    refresh_interval: Duration,
    cancel_token: CancellationToken,
    refresh_handle: Mutex<Option<JoinHandle<()>>>,
    /// Completed refresh cycles, failed ones included.
    refresh_count: AtomicU64,
    refresh_errors_total: AtomicU64,
    refresh_latency_us: AtomicU64,
}

#[derive(Default)]
struct Slot {
    keychain: Option<Arc<KeyChain>>,
    generation: u64,
}

impl Slot {
    fn replace(&mut self, keychain: Option<Arc<KeyChain>>) {
        self.keychain = keychain;
        self.generation = self.generation.wrapping_add(1);
    }
}

impl CachedKeyChain {
    /// Creates an empty cache over `store`.
    ///
    /// No I/O happens until the first lookup or refresh.
    #[must_use]
    pub fn new(
        store: Arc<dyn KeyChainStore>,
        codec: KeyChainCodec,
        refresh_interval: Duration,
    ) -> Self {
        Self {
            store,
            codec,
            slot: Mutex::new(Slot::default()),
            refresh_interval,
            cancel_token: CancellationToken::new(),
            refresh_handle: Mutex::new(None),
            refresh_count: AtomicU64::new(0),
            refresh_errors_total: AtomicU64::new(0),
            refresh_latency_us: AtomicU64::new(0),
        }
    }

    /// The backing store.
    #[must_use]
    pub fn store(&self) -> &Arc<dyn KeyChainStore> {
        &self.store
    }

    /// The record codec.
    #[must_use]
    pub fn codec(&self) -> &KeyChainCodec {
        &self.codec
    }

    /// The cached KeyChain, without touching the store.
    #[must_use]
    pub fn cached(&self) -> Option<Arc<KeyChain>> {
        self.slot.lock().keychain.clone()
    }

    /// Replaces the cached KeyChain.
    ///
    /// Loads already in flight will not overwrite it.
    pub fn set_current(&self, keychain: Arc<KeyChain>) {
        self.slot.lock().replace(Some(keychain));
    }

    /// Drops the cached KeyChain. The next lookup reloads from the store.
    pub fn invalidate(&self) {
        self.slot.lock().replace(None);
    }

    /// Write counter of the cached slot. Pass it to
    /// [`adopt`](Self::adopt) after reading the store.
    pub(crate) fn generation(&self) -> u64 {
        self.slot.lock().generation
    }

    /// Caches `keychain` if the slot was not written since `observed` was
    /// taken. Returns whether the slot was updated.
    pub(crate) fn adopt(&self, keychain: &Arc<KeyChain>, observed: u64) -> bool {
        let mut slot = self.slot.lock();
        if slot.generation != observed {
            return false;
        }
        slot.replace(Some(Arc::clone(keychain)));
        true
    }

    /// Returns the current KeyChain, loading it from the store on a cold
    /// cache.
    ///
    /// # Errors
    ///
    /// Returns [`KeyChainError::UninitializedRepository`] if nothing is
    /// cached and the store is empty, unreachable or holds an undecodable
    /// head. The store or decode failure is attached as the error source.
    #[tracing::instrument(skip(self))]
    pub async fn current(&self) -> Result<Arc<KeyChain>> {
        if let Some(keychain) = self.cached() {
            tracing::debug!(kid = keychain.id(), "current KeyChain cache hit");
            return Ok(keychain);
        }

        tracing::debug!("current KeyChain cache miss, loading store head");
        let observed = self.generation();
        match self.load_head().await {
            Ok(Some(keychain)) => {
                let keychain = Arc::new(keychain);
                if self.adopt(&keychain, observed) {
                    return Ok(keychain);
                }
                tracing::debug!("cache written during cold load, serving the newer value");
                Ok(self.cached().unwrap_or(keychain))
            },
            Ok(None) => Err(KeyChainError::uninitialized()),
            Err(err) => {
                tracing::warn!(error = %err, "cold load of current KeyChain failed");
                Err(KeyChainError::uninitialized_by(err))
            },
        }
    }

    /// Re-reads the store head into the cache once.
    ///
    /// Returns `Ok(true)` if the cache now holds the store head. Returns
    /// `Ok(false)` if the store is empty or the cache was written while the
    /// head was being read; the cache is left as it was in both cases.
    ///
    /// # Errors
    ///
    /// Store and decode failures are returned unchanged. The cache is not
    /// modified on error.
    #[tracing::instrument(skip(self))]
    pub async fn refresh(&self) -> Result<bool> {
        fail_point!("keychain-before-refresh", |_| {
            Err(KeyChainError::from(keychain_storage::StoreError::internal(
                "injected failure before refresh",
            )))
        });

        let observed = self.generation();
        match self.load_head().await? {
            Some(keychain) => {
                let adopted = self.adopt(&Arc::new(keychain), observed);
                if !adopted {
                    tracing::debug!("cache written during refresh, discarding loaded head");
                }
                Ok(adopted)
            },
            None => {
                tracing::debug!("store is empty, keeping cached KeyChain");
                Ok(false)
            },
        }
    }

    /// Starts the background refresh task.
    ///
    /// Idempotent while the task runs. Has no effect after
    /// [`shutdown`](Self::shutdown).
    ///
    /// # Panics
    ///
    /// Must be called within a Tokio runtime context.
    pub fn start_refresh(self: &Arc<Self>) {
        let mut handle = self.refresh_handle.lock();
        if handle.is_some() || self.cancel_token.is_cancelled() {
            return;
        }

        let weak = Arc::downgrade(self);
        let token = self.cancel_token.clone();
        let interval = self.refresh_interval;

        *handle = Some(tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            // First tick fires immediately.
            ticker.tick().await;

            loop {
                tokio::select! {
                    _ = token.cancelled() => {
                        tracing::info!("KeyChain refresh task shutting down");
                        break;
                    }
                    _ = ticker.tick() => {
                        let Some(cache) = weak.upgrade() else {
                            break;
                        };
                        cache.refresh_cycle().await;
                    }
                }
            }
        }));

        tracing::info!(interval_ms = interval.as_millis() as u64, "KeyChain refresh task started");
    }

    /// Returns `true` while the background refresh task is running.
    #[must_use]
    pub fn is_refreshing(&self) -> bool {
        self.refresh_handle.lock().as_ref().is_some_and(|handle| !handle.is_finished())
    }

    /// Stops the background refresh task and waits for it to exit.
    ///
    /// The cached KeyChain stays readable.
    pub async fn shutdown(&self) {
        self.cancel_token.cancel();
        let handle = self.refresh_handle.lock().take();
        if let Some(handle) = handle
            && let Err(err) = handle.await
        {
            tracing::warn!(error = %err, "KeyChain refresh task panicked");
        }
    }

    /// The cancellation token of the refresh task, for wiring into external
    /// shutdown signals.
    #[must_use]
    pub fn cancel_token(&self) -> &CancellationToken {
        &self.cancel_token
    }

    /// Number of completed refresh cycles, successful or not.
    #[must_use]
    pub fn refresh_count(&self) -> u64 {
        self.refresh_count.load(Ordering::Relaxed)
    }

    /// Number of refresh cycles that failed.
    #[must_use]
    pub fn refresh_errors_total(&self) -> u64 {
        self.refresh_errors_total.load(Ordering::Relaxed)
    }

    /// Cumulative refresh latency in microseconds.
    #[must_use]
    pub fn refresh_latency_us(&self) -> u64 {
        self.refresh_latency_us.load(Ordering::Relaxed)
    }

    async fn refresh_cycle(&self) {
        let start = Instant::now();
        let result = self.refresh().await;
        let elapsed = start.elapsed();

        self.refresh_count.fetch_add(1, Ordering::Relaxed);
        self.refresh_latency_us
            .fetch_add(u64::try_from(elapsed.as_micros()).unwrap_or(u64::MAX), Ordering::Relaxed);

        match result {
            Ok(loaded) => {
                tracing::debug!(
                    loaded,
                    elapsed_ms = elapsed.as_millis() as u64,
                    "KeyChain refresh cycle complete"
                );
            },
            Err(err) => {
                self.refresh_errors_total.fetch_add(1, Ordering::Relaxed);
                tracing::warn!(
                    error = %err,
                    stale = self.slot.lock().keychain.is_some(),
                    "KeyChain refresh failed, keeping cached value"
                );
            },
        }
    }

    async fn load_head(&self) -> Result<Option<KeyChain>> {
        match self.store.peek_first().await? {
            Some(record) => self.codec.decode(&record).map(Some),
            None => Ok(None),
        }
    }
}

impl Drop for CachedKeyChain {
    fn drop(&mut self) {
        self.cancel_token.cancel();
    }
}

impl std::fmt::Debug for CachedKeyChain {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CachedKeyChain")
            .field("current", &self.cached().map(|k| k.id().to_owned()))
            .field("refresh_interval", &self.refresh_interval)
            .field("refreshing", &self.is_refreshing())
            .finish_non_exhaustive()
    }
}
