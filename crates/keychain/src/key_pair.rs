//! Key-pair material and generators.
//!
//! [`KeyPair`] is algorithm-agnostic: it holds the encoded public and private
//! halves as bytes. Generators decide what those bytes are; the
//! [`Ed25519KeyPairGenerator`] produces the raw 32-byte verifying key and the
//! raw 32-byte signing seed.

use std::fmt;

use ed25519_dalek::SigningKey;
use rand_core::OsRng;
use zeroize::Zeroizing;

use crate::{
    algorithm::Algorithm,
    error::{KeyChainError, Result},
};

/// An asymmetric key pair.
///
/// The private half is wrapped in [`Zeroizing`] so it is scrubbed from memory
/// when the pair is dropped. `Debug` output never includes it.
#[derive(Clone, PartialEq, Eq)]
pub struct KeyPair {
    public_key: Vec<u8>,
    private_key: Zeroizing<Vec<u8>>,
}

impl KeyPair {
    /// Creates a key pair from its encoded halves.
    #[must_use]
    pub fn new(public_key: impl Into<Vec<u8>>, private_key: Zeroizing<Vec<u8>>) -> Self {
        Self { public_key: public_key.into(), private_key }
    }

    /// Encoded public half.
    #[must_use]
    pub fn public_key(&self) -> &[u8] {
        &self.public_key
    }

    /// Encoded private half.
    #[must_use]
    pub fn private_key(&self) -> &[u8] {
        &self.private_key
    }
}

impl fmt::Debug for KeyPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KeyPair")
            .field("public_key_len", &self.public_key.len())
            .field("private_key", &"<redacted>")
            .finish()
    }
}

/// Produces fresh key pairs for a given algorithm.
pub trait KeyPairGenerator: Send + Sync {
    /// Returns `true` if this generator can produce keys for `algorithm`.
    fn supports(&self, algorithm: Algorithm) -> bool;

    /// Generates a new key pair.
    ///
    /// # Errors
    ///
    /// Returns [`KeyChainError::KeyGeneration`] if the algorithm is not
    /// supported or the underlying primitive fails.
    fn generate(&self, algorithm: Algorithm) -> Result<KeyPair>;
}

/// Ed25519 key-pair generator backed by `ed25519-dalek` and OS randomness.
#[derive(Debug, Default, Clone, Copy)]
pub struct Ed25519KeyPairGenerator;

impl KeyPairGenerator for Ed25519KeyPairGenerator {
    fn supports(&self, algorithm: Algorithm) -> bool {
        algorithm == Algorithm::EdDsa
    }

    fn generate(&self, algorithm: Algorithm) -> Result<KeyPair> {
        if !self.supports(algorithm) {
            return Err(KeyChainError::key_generation(format!(
                "Ed25519 generator cannot produce {algorithm} keys"
            )));
        }

        let signing_key = SigningKey::generate(&mut OsRng);
        let public_key = signing_key.verifying_key().to_bytes().to_vec();
        let private_key = Zeroizing::new(signing_key.to_bytes().to_vec());

        Ok(KeyPair::new(public_key, private_key))
    }
}
