//! Configuration for KeyChain repositories.
//!
//! [`KeyChainRepositoryConfig`] carries the rotation window, cache refresh
//! cadence and store I/O deadline. It can be built in code through a
//! validating builder or deserialized from configuration files, with
//! durations written in humantime form (`"60s"`, `"1day"`).

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{KeyChainError, Result};

/// Smallest retained history. One slot for the current key plus one for
/// the key being rotated out.
pub const MIN_CAPACITY: usize = 2;

/// Largest retained history.
pub const MAX_CAPACITY: usize = 100;

/// Default retained history.
pub const DEFAULT_CAPACITY: usize = 10;

/// Default background refresh interval (60 seconds).
pub const DEFAULT_REFRESH_INTERVAL: Duration = Duration::from_secs(60);

/// Default minimum validity used by [`rotate_default`] (1 day).
///
/// [`rotate_default`]: crate::DistributedKeyChainRepository::rotate_default
pub const DEFAULT_MIN_VALIDITY: Duration = Duration::from_secs(24 * 60 * 60);

/// Default per-call store timeout (5 seconds).
pub const DEFAULT_STORE_TIMEOUT: Duration = keychain_storage::DEFAULT_STORE_TIMEOUT;

/// Configuration for [`DistributedKeyChainRepository`](crate::DistributedKeyChainRepository).
///
/// # Example
///
/// ```
/// use std::time::Duration;
///
/// use keychain::KeyChainRepositoryConfig;
///
/// let config = KeyChainRepositoryConfig::builder()
///     .capacity(5)
///     .refresh_interval(Duration::from_secs(30))
///     .build()?;
///
/// assert_eq!(config.capacity(), 5);
/// # Ok::<(), keychain::KeyChainError>(())
/// ```
///
/// Out-of-range capacities are clamped rather than rejected:
///
/// ```
/// use keychain::{KeyChainRepositoryConfig, config::MIN_CAPACITY};
///
/// let config = KeyChainRepositoryConfig::builder().capacity(0).build()?;
/// assert_eq!(config.capacity(), MIN_CAPACITY);
/// # Ok::<(), keychain::KeyChainError>(())
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct KeyChainRepositoryConfig {
    /// Maximum number of retained KeyChains.
    #[serde(default = "default_capacity")]
    pub(crate) capacity: usize,

    /// Interval between background cache refreshes.
    #[serde(with = "humantime_serde", default = "default_refresh_interval")]
    pub(crate) refresh_interval: Duration,

    /// Validity window applied by `rotate_default`.
    #[serde(with = "humantime_serde", default = "default_min_validity")]
    pub(crate) min_validity: Duration,

    /// Deadline for each individual store call.
    #[serde(with = "humantime_serde", default = "default_store_timeout")]
    pub(crate) store_timeout: Duration,
}

fn default_capacity() -> usize {
    DEFAULT_CAPACITY
}

fn default_refresh_interval() -> Duration {
    DEFAULT_REFRESH_INTERVAL
}

fn default_min_validity() -> Duration {
    DEFAULT_MIN_VALIDITY
}

fn default_store_timeout() -> Duration {
    DEFAULT_STORE_TIMEOUT
}

#[bon::bon]
impl KeyChainRepositoryConfig {
    /// Creates a new configuration.
    ///
    /// # Optional Fields
    ///
    /// * `capacity` - Retained history (default: 10, clamped to `[2, 100]`).
    /// * `refresh_interval` - Background refresh cadence (default: 60 seconds).
    /// * `min_validity` - Window used by `rotate_default` (default: 1 day).
    /// * `store_timeout` - Per-call store deadline (default: 5 seconds).
    ///
    /// # Errors
    ///
    /// Returns [`KeyChainError::InvalidConfig`] if `refresh_interval` or
    /// `store_timeout` is zero.
    #[builder]
    pub fn new(
        #[builder(default = DEFAULT_CAPACITY)] capacity: usize,
        #[builder(default = DEFAULT_REFRESH_INTERVAL)] refresh_interval: Duration,
        #[builder(default = DEFAULT_MIN_VALIDITY)] min_validity: Duration,
        #[builder(default = DEFAULT_STORE_TIMEOUT)] store_timeout: Duration,
    ) -> Result<Self> {
        let config = Self { capacity, refresh_interval, min_validity, store_timeout };
        config.validate()
    }

    /// Checks durations and clamps the capacity into range.
    ///
    /// Deserialized configurations bypass the builder; call this before use.
    ///
    /// # Errors
    ///
    /// Returns [`KeyChainError::InvalidConfig`] if `refresh_interval` or
    /// `store_timeout` is zero.
    pub fn validate(mut self) -> Result<Self> {
        if self.refresh_interval.is_zero() {
            return Err(KeyChainError::invalid_config("refresh_interval must be non-zero"));
        }
        if self.store_timeout.is_zero() {
            return Err(KeyChainError::invalid_config("store_timeout must be non-zero"));
        }

        let clamped = self.capacity.clamp(MIN_CAPACITY, MAX_CAPACITY);
        if clamped != self.capacity {
            tracing::warn!(
                requested = self.capacity,
                capacity = clamped,
                min = MIN_CAPACITY,
                max = MAX_CAPACITY,
                "KeyChain capacity out of range, clamping"
            );
            self.capacity = clamped;
        }

        Ok(self)
    }

    /// Returns the retained history size.
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Returns the background refresh interval.
    #[must_use]
    pub fn refresh_interval(&self) -> Duration {
        self.refresh_interval
    }

    /// Returns the validity window used by `rotate_default`.
    #[must_use]
    pub fn min_validity(&self) -> Duration {
        self.min_validity
    }

    /// Returns the per-call store deadline.
    #[must_use]
    pub fn store_timeout(&self) -> Duration {
        self.store_timeout
    }
}

impl Default for KeyChainRepositoryConfig {
    fn default() -> Self {
        Self {
            capacity: DEFAULT_CAPACITY,
            refresh_interval: DEFAULT_REFRESH_INTERVAL,
            min_validity: DEFAULT_MIN_VALIDITY,
            store_timeout: DEFAULT_STORE_TIMEOUT,
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use rstest::rstest;

    use super::*;

    #[test]
    fn test_defaults() {
        let config = KeyChainRepositoryConfig::builder().build().unwrap();
        assert_eq!(config, KeyChainRepositoryConfig::default());
        assert_eq!(config.capacity(), 10);
        assert_eq!(config.refresh_interval(), Duration::from_secs(60));
        assert_eq!(config.min_validity(), Duration::from_secs(86_400));
        assert_eq!(config.store_timeout(), Duration::from_secs(5));
    }

    #[rstest]
    #[case::zero(0, MIN_CAPACITY)]
    #[case::one(1, MIN_CAPACITY)]
    #[case::min(2, 2)]
    #[case::typical(3, 3)]
    #[case::max(100, MAX_CAPACITY)]
    #[case::too_large(1_000, MAX_CAPACITY)]
    fn test_capacity_clamped(#[case] requested: usize, #[case] expected: usize) {
        let config = KeyChainRepositoryConfig::builder().capacity(requested).build().unwrap();
        assert_eq!(config.capacity(), expected);
    }

    #[test]
    fn test_zero_refresh_interval_rejected() {
        let result = KeyChainRepositoryConfig::builder().refresh_interval(Duration::ZERO).build();
        assert!(
            matches!(result, Err(KeyChainError::InvalidConfig(ref msg)) if msg.contains("refresh_interval"))
        );
    }

    #[test]
    fn test_zero_store_timeout_rejected() {
        let result = KeyChainRepositoryConfig::builder().store_timeout(Duration::ZERO).build();
        assert!(
            matches!(result, Err(KeyChainError::InvalidConfig(ref msg)) if msg.contains("store_timeout"))
        );
    }

    #[test]
    fn test_zero_min_validity_allowed() {
        let config = KeyChainRepositoryConfig::builder().min_validity(Duration::ZERO).build();
        assert_eq!(config.unwrap().min_validity(), Duration::ZERO);
    }

    #[test]
    fn test_deserialize_humantime_durations() {
        let json = r#"{"capacity":3,"refresh_interval":"30s","min_validity":"12h","store_timeout":"250ms"}"#;
        let config: KeyChainRepositoryConfig = serde_json::from_str(json).unwrap();
        let config = config.validate().unwrap();

        assert_eq!(config.capacity(), 3);
        assert_eq!(config.refresh_interval(), Duration::from_secs(30));
        assert_eq!(config.min_validity(), Duration::from_secs(12 * 3600));
        assert_eq!(config.store_timeout(), Duration::from_millis(250));
    }

    #[test]
    fn test_deserialize_fills_defaults() {
        let config: KeyChainRepositoryConfig = serde_json::from_str("{}").unwrap();
        assert_eq!(config, KeyChainRepositoryConfig::default());
    }

    #[test]
    fn test_deserialize_rejects_unknown_fields() {
        let result = serde_json::from_str::<KeyChainRepositoryConfig>(r#"{"namespace":"x"}"#);
        assert!(result.is_err());
    }

    #[test]
    fn test_validate_clamps_deserialized_capacity() {
        let config: KeyChainRepositoryConfig = serde_json::from_str(r#"{"capacity":1}"#).unwrap();
        assert_eq!(config.validate().unwrap().capacity(), MIN_CAPACITY);
    }
}
