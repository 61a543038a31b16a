//! KeyChain error types.
//!
//! This module defines errors raised while constructing, persisting, rotating
//! and resolving signing keys.
//!
//! # Propagation
//!
//! Transient store failures during rotation and background refresh are
//! absorbed and logged. Structural failures (invalid algorithm, missing
//! bootstrap, undecodable records) are returned to the immediate caller.

use keychain_storage::StoreError;
use thiserror::Error;

/// Errors produced by the KeyChain subsystem.
///
/// # Non-exhaustive
///
/// This enum is marked `#[non_exhaustive]` — new variants may be added in
/// future minor releases without a semver-breaking change. Downstream match
/// expressions must include a wildcard arm (`_ =>`).
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum KeyChainError {
    /// A KeyChain was requested for an algorithm that cannot sign
    /// asymmetrically (HMAC family or `none`).
    #[error("Invalid algorithm: {algorithm} is not an asymmetric signature algorithm")]
    InvalidAlgorithm {
        /// Name of the rejected algorithm.
        algorithm: String,
    },

    /// An algorithm name could not be parsed.
    #[error("Unknown algorithm: {0}")]
    UnknownAlgorithm(String),

    /// The key-pair generator failed or does not support the algorithm.
    #[error("Key generation failed: {0}")]
    KeyGeneration(String),

    /// The rotation store could not be reached or returned an error.
    #[error("Key store unavailable: {0}")]
    StoreUnavailable(
        /// The underlying store error.
        #[source]
        StoreError,
    ),

    /// No current KeyChain is cached and none could be loaded.
    ///
    /// Indicates a missing bootstrap rotation, not a transient fault.
    #[error("KeyChain repository is not initialized")]
    UninitializedRepository {
        /// Why the cold load failed, if the store was not simply empty.
        #[source]
        source: Option<Box<KeyChainError>>,
    },

    /// A stored record could not be turned back into a KeyChain.
    #[error("Failed to decode KeyChain {kid}: {message}")]
    DecodeFailure {
        /// Id of the undecodable record.
        kid: String,
        /// What went wrong.
        message: String,
    },

    /// A KeyChain could not be serialized into its record form.
    #[error("Failed to encode KeyChain {kid}: {message}")]
    EncodeFailure {
        /// Id of the KeyChain being encoded.
        kid: String,
        /// What went wrong.
        message: String,
    },

    /// Repository configuration was rejected.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// A token referenced a key id that is not (or no longer) in the store.
    #[error("Signing key not found: {kid}")]
    KeyNotFound {
        /// The unresolved key id.
        kid: String,
    },

    /// Token signing or verification failed.
    #[error("Token error: {0}")]
    Token(String),
}

impl KeyChainError {
    /// Creates an `InvalidAlgorithm` error.
    #[must_use]
    pub fn invalid_algorithm(algorithm: impl Into<String>) -> Self {
        Self::InvalidAlgorithm { algorithm: algorithm.into() }
    }

    /// Creates a `KeyGeneration` error.
    #[must_use]
    pub fn key_generation(message: impl Into<String>) -> Self {
        Self::KeyGeneration(message.into())
    }

    /// Creates an `UninitializedRepository` error without a store cause.
    #[must_use]
    pub fn uninitialized() -> Self {
        Self::UninitializedRepository { source: None }
    }

    /// Creates an `UninitializedRepository` error caused by a failed cold
    /// load.
    #[must_use]
    pub fn uninitialized_by(cause: KeyChainError) -> Self {
        Self::UninitializedRepository { source: Some(Box::new(cause)) }
    }

    /// Creates a `DecodeFailure` error.
    #[must_use]
    pub fn decode_failure(kid: impl Into<String>, message: impl Into<String>) -> Self {
        Self::DecodeFailure { kid: kid.into(), message: message.into() }
    }

    /// Creates an `EncodeFailure` error.
    #[must_use]
    pub fn encode_failure(kid: impl Into<String>, message: impl Into<String>) -> Self {
        Self::EncodeFailure { kid: kid.into(), message: message.into() }
    }

    /// Creates an `InvalidConfig` error.
    #[must_use]
    pub fn invalid_config(message: impl Into<String>) -> Self {
        Self::InvalidConfig(message.into())
    }

    /// Creates a `KeyNotFound` error.
    #[must_use]
    pub fn key_not_found(kid: impl Into<String>) -> Self {
        Self::KeyNotFound { kid: kid.into() }
    }

    /// Creates a `Token` error.
    #[must_use]
    pub fn token(message: impl Into<String>) -> Self {
        Self::Token(message.into())
    }
}

impl From<StoreError> for KeyChainError {
    fn from(err: StoreError) -> Self {
        KeyChainError::StoreUnavailable(err)
    }
}

impl From<jsonwebtoken::errors::Error> for KeyChainError {
    fn from(err: jsonwebtoken::errors::Error) -> Self {
        use jsonwebtoken::errors::ErrorKind;

        match err.kind() {
            ErrorKind::InvalidSignature => KeyChainError::token("invalid signature"),
            ErrorKind::ExpiredSignature => KeyChainError::token("token expired"),
            ErrorKind::InvalidAlgorithm => KeyChainError::token("algorithm mismatch"),
            _ => KeyChainError::token(format!("JWT error: {err}")),
        }
    }
}

/// Result type alias for KeyChain operations.
pub type Result<T> = std::result::Result<T, KeyChainError>;
