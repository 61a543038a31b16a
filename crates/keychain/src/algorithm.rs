//! Signature algorithm identifiers and the asymmetric-only policy.
//!
//! A KeyChain holds a key *pair*: the private half signs, the public half is
//! what verifiers need. Symmetric (HMAC) algorithms and `none` have no such
//! split and are rejected at construction time.

use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};

use crate::error::{KeyChainError, Result};

/// Algorithms that are never accepted for a KeyChain.
///
/// - `none`: no signature at all
/// - `HS256`, `HS384`, `HS512`: shared-secret algorithms with no public half
pub const FORBIDDEN_ALGORITHMS: &[&str] = &["none", "HS256", "HS384", "HS512"];

/// JOSE signature algorithm identifiers.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Algorithm {
    /// Ed25519 (EdDSA).
    #[serde(rename = "EdDSA")]
    EdDsa,
    /// ECDSA with P-256 and SHA-256.
    ES256,
    /// ECDSA with P-384 and SHA-384.
    ES384,
    /// RSASSA-PKCS1-v1_5 with SHA-256.
    RS256,
    /// RSASSA-PKCS1-v1_5 with SHA-384.
    RS384,
    /// RSASSA-PKCS1-v1_5 with SHA-512.
    RS512,
    /// RSASSA-PSS with SHA-256.
    PS256,
    /// RSASSA-PSS with SHA-384.
    PS384,
    /// RSASSA-PSS with SHA-512.
    PS512,
    /// HMAC with SHA-256.
    HS256,
    /// HMAC with SHA-384.
    HS384,
    /// HMAC with SHA-512.
    HS512,
    /// Unsecured (`none`).
    #[serde(rename = "none")]
    Unsigned,
}

impl Algorithm {
    /// Every known algorithm, asymmetric ones first.
    pub const ALL: [Algorithm; 13] = [
        Algorithm::EdDsa,
        Algorithm::ES256,
        Algorithm::ES384,
        Algorithm::RS256,
        Algorithm::RS384,
        Algorithm::RS512,
        Algorithm::PS256,
        Algorithm::PS384,
        Algorithm::PS512,
        Algorithm::HS256,
        Algorithm::HS384,
        Algorithm::HS512,
        Algorithm::Unsigned,
    ];

    /// Returns the JOSE `alg` name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Algorithm::EdDsa => "EdDSA",
            Algorithm::ES256 => "ES256",
            Algorithm::ES384 => "ES384",
            Algorithm::RS256 => "RS256",
            Algorithm::RS384 => "RS384",
            Algorithm::RS512 => "RS512",
            Algorithm::PS256 => "PS256",
            Algorithm::PS384 => "PS384",
            Algorithm::PS512 => "PS512",
            Algorithm::HS256 => "HS256",
            Algorithm::HS384 => "HS384",
            Algorithm::HS512 => "HS512",
            Algorithm::Unsigned => "none",
        }
    }

    /// Returns `true` if the algorithm signs with a private key and verifies
    /// with a distinct public key.
    #[must_use]
    pub const fn is_asymmetric(self) -> bool {
        !matches!(
            self,
            Algorithm::HS256 | Algorithm::HS384 | Algorithm::HS512 | Algorithm::Unsigned
        )
    }
}

impl fmt::Display for Algorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Algorithm {
    type Err = KeyChainError;

    fn from_str(s: &str) -> Result<Self> {
        Algorithm::ALL
            .into_iter()
            .find(|alg| alg.as_str() == s)
            .ok_or_else(|| KeyChainError::UnknownAlgorithm(s.to_owned()))
    }
}

/// Checks that `algorithm` may back a KeyChain.
///
/// # Errors
///
/// Returns [`KeyChainError::InvalidAlgorithm`] for symmetric algorithms and
/// `none`.
///
/// # Examples
///
/// ```
/// use keychain::algorithm::{Algorithm, validate_algorithm};
///
/// assert!(validate_algorithm(Algorithm::EdDsa).is_ok());
/// assert!(validate_algorithm(Algorithm::HS256).is_err());
/// ```
pub fn validate_algorithm(algorithm: Algorithm) -> Result<()> {
    if algorithm.is_asymmetric() {
        Ok(())
    } else {
        Err(KeyChainError::invalid_algorithm(algorithm.as_str()))
    }
}
