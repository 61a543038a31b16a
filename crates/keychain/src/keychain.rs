//! The KeyChain value type.

use std::{fmt, time::Duration};

use chrono::{DateTime, Utc};

use crate::{
    algorithm::{Algorithm, validate_algorithm},
    clock::{Clock, SystemClock},
    error::Result,
    id::IdGenerator,
    key_pair::{KeyPair, KeyPairGenerator},
};

/// One generation of asymmetric signing key material plus its metadata.
///
/// A KeyChain is immutable once built. Its [`id`](Self::id) is the `kid`
/// tokens reference and the identity used by stores and caches.
///
/// # Equality
///
/// Two KeyChains are equal when their id, algorithm and both key halves are
/// equal. `created_at` is metadata and does not take part.
///
/// # Example
///
/// ```
/// use keychain::{
///     Algorithm, KeyChain,
///     id::UuidV7Generator,
///     key_pair::Ed25519KeyPairGenerator,
/// };
///
/// let keychain =
///     KeyChain::generate(Algorithm::EdDsa, &Ed25519KeyPairGenerator, &UuidV7Generator).unwrap();
/// assert_eq!(keychain.algorithm(), Algorithm::EdDsa);
///
/// // Symmetric algorithms are rejected.
/// assert!(KeyChain::generate(Algorithm::HS256, &Ed25519KeyPairGenerator, &UuidV7Generator).is_err());
/// ```
#[derive(Clone)]
pub struct KeyChain {
    id: String,
    algorithm: Algorithm,
    key_pair: KeyPair,
    created_at: DateTime<Utc>,
}

#[bon::bon]
impl KeyChain {
    /// Builds a KeyChain from existing parts.
    ///
    /// `created_at` defaults to now and is truncated to millisecond precision,
    /// the resolution records persist.
    ///
    /// # Errors
    ///
    /// Returns [`KeyChainError::InvalidAlgorithm`](crate::KeyChainError::InvalidAlgorithm)
    /// if `algorithm` is not asymmetric.
    #[builder]
    pub fn new(
        #[builder(into)] id: String,
        algorithm: Algorithm,
        key_pair: KeyPair,
        #[builder(default = Utc::now())] created_at: DateTime<Utc>,
    ) -> Result<Self> {
        validate_algorithm(algorithm)?;

        let created_at =
            DateTime::from_timestamp_millis(created_at.timestamp_millis()).unwrap_or(created_at);

        Ok(Self { id, algorithm, key_pair, created_at })
    }
}

impl KeyChain {
    /// Generates a fresh KeyChain.
    ///
    /// The algorithm is validated before any key material is produced. No
    /// I/O is performed.
    ///
    /// # Errors
    ///
    /// - [`KeyChainError::InvalidAlgorithm`](crate::KeyChainError::InvalidAlgorithm) for
    ///   symmetric algorithms
    /// - [`KeyChainError::KeyGeneration`](crate::KeyChainError::KeyGeneration) if the generator
    ///   fails
    pub fn generate(
        algorithm: Algorithm,
        key_pair_generator: &dyn KeyPairGenerator,
        id_generator: &dyn IdGenerator,
    ) -> Result<Self> {
        Self::generate_at(algorithm, key_pair_generator, id_generator, &SystemClock)
    }

    /// Like [`generate`](Self::generate), stamping `created_at` from `clock`.
    ///
    /// Pass the repository's clock so candidates and expiry checks share one
    /// time source.
    ///
    /// # Errors
    ///
    /// Same as [`generate`](Self::generate).
    pub fn generate_at(
        algorithm: Algorithm,
        key_pair_generator: &dyn KeyPairGenerator,
        id_generator: &dyn IdGenerator,
        clock: &dyn Clock,
    ) -> Result<Self> {
        validate_algorithm(algorithm)?;
        let key_pair = key_pair_generator.generate(algorithm)?;
        Self::builder()
            .id(id_generator.next_id())
            .algorithm(algorithm)
            .key_pair(key_pair)
            .created_at(clock.now())
            .build()
    }

    /// The key id (`kid`).
    #[must_use]
    pub fn id(&self) -> &str {
        &self.id
    }

    /// The signature algorithm.
    #[must_use]
    pub fn algorithm(&self) -> Algorithm {
        self.algorithm
    }

    /// The key material.
    #[must_use]
    pub fn key_pair(&self) -> &KeyPair {
        &self.key_pair
    }

    /// When this KeyChain was created.
    #[must_use]
    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    /// Creation time in epoch milliseconds.
    #[must_use]
    pub fn created_at_millis(&self) -> i64 {
        self.created_at.timestamp_millis()
    }

    /// Whether this KeyChain is old enough to be superseded by a normal
    /// rotation at `now`.
    #[must_use]
    pub fn is_expired_at(&self, min_validity: Duration, now: DateTime<Utc>) -> bool {
        is_expired(self.created_at_millis(), min_validity, now)
    }
}

/// Expiry rule shared by KeyChains and raw records:
/// `created_at + min_validity < now`, and always expired for a zero
/// `min_validity`.
pub(crate) fn is_expired(
    created_at_millis: i64,
    min_validity: Duration,
    now: DateTime<Utc>,
) -> bool {
    if min_validity.is_zero() {
        return true;
    }
    let validity_ms = i64::try_from(min_validity.as_millis()).unwrap_or(i64::MAX);
    created_at_millis.saturating_add(validity_ms) < now.timestamp_millis()
}

impl PartialEq for KeyChain {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id && self.algorithm == other.algorithm && self.key_pair == other.key_pair
    }
}

impl Eq for KeyChain {}

impl fmt::Debug for KeyChain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KeyChain")
            .field("id", &self.id)
            .field("algorithm", &self.algorithm)
            .field("key_pair", &self.key_pair)
            .field("created_at", &self.created_at)
            .finish()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
mod tests {
    use chrono::TimeZone;
    use rstest::rstest;
    use zeroize::Zeroizing;

    use super::*;
    use crate::{KeyChainError, id::UuidV7Generator, key_pair::Ed25519KeyPairGenerator};

    fn pair(fill: u8) -> KeyPair {
        KeyPair::new(vec![fill; 32], Zeroizing::new(vec![fill.wrapping_add(1); 32]))
    }

    #[test]
    fn test_generate_ed25519() {
        let keychain =
            KeyChain::generate(Algorithm::EdDsa, &Ed25519KeyPairGenerator, &UuidV7Generator)
                .unwrap();
        assert_eq!(keychain.algorithm(), Algorithm::EdDsa);
        assert_eq!(keychain.key_pair().public_key().len(), 32);
        assert!(!keychain.id().is_empty());
    }

    #[test]
    fn test_generate_at_uses_clock() {
        let at = Utc.timestamp_millis_opt(1_700_000_000_000).unwrap();
        let clock = crate::clock::ManualClock::new(at);
        let keychain = KeyChain::generate_at(
            Algorithm::EdDsa,
            &Ed25519KeyPairGenerator,
            &UuidV7Generator,
            &clock,
        )
        .unwrap();
        assert_eq!(keychain.created_at(), at);
    }

    #[rstest]
    #[case::hs256(Algorithm::HS256)]
    #[case::hs384(Algorithm::HS384)]
    #[case::hs512(Algorithm::HS512)]
    #[case::none(Algorithm::Unsigned)]
    fn test_symmetric_algorithms_rejected(#[case] algorithm: Algorithm) {
        let result = KeyChain::generate(algorithm, &Ed25519KeyPairGenerator, &UuidV7Generator);
        assert!(matches!(result, Err(KeyChainError::InvalidAlgorithm { .. })));

        let result = KeyChain::builder().id("kid").algorithm(algorithm).key_pair(pair(1)).build();
        assert!(matches!(result, Err(KeyChainError::InvalidAlgorithm { .. })));
    }

    #[test]
    fn test_created_at_truncated_to_millis() {
        let precise = Utc.timestamp_opt(1_700_000_000, 123_456_789).unwrap();
        let keychain = KeyChain::builder()
            .id("kid")
            .algorithm(Algorithm::EdDsa)
            .key_pair(pair(1))
            .created_at(precise)
            .build()
            .unwrap();
        assert_eq!(keychain.created_at_millis(), 1_700_000_000_123);
        assert_eq!(keychain.created_at().timestamp_subsec_nanos(), 123_000_000);
    }

    #[test]
    fn test_equality_ignores_created_at() {
        let a = KeyChain::builder()
            .id("kid")
            .algorithm(Algorithm::EdDsa)
            .key_pair(pair(1))
            .created_at(Utc.timestamp_opt(1, 0).unwrap())
            .build()
            .unwrap();
        let b = KeyChain::builder()
            .id("kid")
            .algorithm(Algorithm::EdDsa)
            .key_pair(pair(1))
            .created_at(Utc.timestamp_opt(2, 0).unwrap())
            .build()
            .unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_equality_checks_each_identity_field() {
        let base = KeyChain::builder().id("kid").algorithm(Algorithm::EdDsa).key_pair(pair(1));
        let a = base.build().unwrap();

        let other_id =
            KeyChain::builder().id("kid-2").algorithm(Algorithm::EdDsa).key_pair(pair(1)).build();
        let other_alg =
            KeyChain::builder().id("kid").algorithm(Algorithm::ES256).key_pair(pair(1)).build();
        let other_key =
            KeyChain::builder().id("kid").algorithm(Algorithm::EdDsa).key_pair(pair(2)).build();

        assert_ne!(a, other_id.unwrap());
        assert_ne!(a, other_alg.unwrap());
        assert_ne!(a, other_key.unwrap());
    }

    #[rstest]
    #[case::zero_validity_always_expired(0, Duration::ZERO, 0, true)]
    #[case::fresh(0, Duration::from_secs(3600), 1_000, false)]
    #[case::exactly_at_boundary(0, Duration::from_secs(60), 60_000, false)]
    #[case::just_past_boundary(0, Duration::from_secs(60), 60_001, true)]
    #[case::huge_validity_never_expires(0, Duration::MAX, i64::MAX / 2, false)]
    fn test_is_expired(
        #[case] created_at: i64,
        #[case] min_validity: Duration,
        #[case] now_millis: i64,
        #[case] expected: bool,
    ) {
        let now = DateTime::from_timestamp_millis(now_millis).unwrap_or(DateTime::<Utc>::MAX_UTC);
        assert_eq!(is_expired(created_at, min_validity, now), expected);
    }

    #[test]
    fn test_debug_does_not_leak_private_key() {
        let keychain =
            KeyChain::builder().id("kid").algorithm(Algorithm::EdDsa).key_pair(pair(1)).build();
        let debug = format!("{:?}", keychain.unwrap());
        assert!(debug.contains("kid"));
        assert!(debug.contains("<redacted>"));
    }
}
