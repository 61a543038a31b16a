//! JWT signing and verification backed by a KeyChain repository.
//!
//! Tokens are signed with the repository's current KeyChain and carry its id
//! in the `kid` header. Verification resolves `kid` through
//! [`KeyChainRepository::find`], so tokens signed by any retained KeyChain
//! verify until that KeyChain is evicted.
//!
//! Only EdDSA (Ed25519) is supported.

use std::sync::Arc;

use base64::{Engine, engine::general_purpose::URL_SAFE_NO_PAD};
use ed25519_dalek::SECRET_KEY_LENGTH;
use jsonwebtoken::{
    Algorithm as JwtAlgorithm, DecodingKey, EncodingKey, Header, Validation, decode, decode_header,
};
use serde::{Serialize, de::DeserializeOwned};
use zeroize::Zeroizing;

use crate::{
    algorithm::Algorithm,
    error::{KeyChainError, Result},
    keychain::KeyChain,
    repository::KeyChainRepository,
};

/// PKCS#8 v1 prefix for a bare Ed25519 private key.
const ED25519_PKCS8_PREFIX: [u8; 16] = [
    0x30, 0x2e, // SEQUENCE, 46 bytes
    0x02, 0x01, 0x00, // INTEGER version 0
    0x30, 0x05, // SEQUENCE, 5 bytes (algorithm identifier)
    0x06, 0x03, 0x2b, 0x65, 0x70, // OID 1.3.101.112 (Ed25519)
    0x04, 0x22, // OCTET STRING, 34 bytes
    0x04, 0x20, // OCTET STRING, 32 bytes (the actual key)
];

/// Signs and verifies JWTs with KeyChains from a repository.
///
/// # Example
///
/// ```
/// use std::sync::Arc;
///
/// use keychain::{
///     Algorithm, DistributedKeyChainRepository, KeyChain, KeyChainRepository, KeyChainSigner,
///     id::UuidV7Generator, key_pair::Ed25519KeyPairGenerator,
/// };
/// use keychain_storage::MemoryKeyChainStore;
/// use serde::{Deserialize, Serialize};
///
/// #[derive(Serialize, Deserialize)]
/// struct Claims {
///     sub: String,
/// }
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() -> keychain::Result<()> {
/// let repository = Arc::new(
///     DistributedKeyChainRepository::builder()
///         .store(Arc::new(MemoryKeyChainStore::new()))
///         .build()?,
/// );
/// let keychain = KeyChain::generate(Algorithm::EdDsa, &Ed25519KeyPairGenerator, &UuidV7Generator)?;
/// repository.forced_rotate(keychain).await;
///
/// let signer = KeyChainSigner::new(repository);
/// let token = signer.sign(&Claims { sub: "alice".into() }).await?;
/// let claims: Claims = signer.verify(&token).await?;
/// assert_eq!(claims.sub, "alice");
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct KeyChainSigner {
    repository: Arc<dyn KeyChainRepository>,
}

impl KeyChainSigner {
    /// Creates a signer over `repository`.
    #[must_use]
    pub fn new(repository: Arc<dyn KeyChainRepository>) -> Self {
        Self { repository }
    }

    /// Signs `claims` with the current KeyChain.
    ///
    /// # Errors
    ///
    /// - [`KeyChainError::UninitializedRepository`] if no KeyChain was ever rotated in
    /// - [`KeyChainError::Token`] if the current KeyChain is not Ed25519 or encoding fails
    #[tracing::instrument(skip_all)]
    pub async fn sign<C: Serialize + Sync>(&self, claims: &C) -> Result<String> {
        let keychain = self.repository.current().await?;
        let encoding_key = encoding_key(&keychain)?;

        let mut header = Header::new(JwtAlgorithm::EdDSA);
        header.kid = Some(keychain.id().to_owned());

        let token = jsonwebtoken::encode(&header, claims, &encoding_key)?;
        tracing::debug!(kid = keychain.id(), "signed token");
        Ok(token)
    }

    /// Verifies `token` and returns its claims.
    ///
    /// The `exp` claim is checked when present. Audience is not checked.
    ///
    /// # Errors
    ///
    /// - [`KeyChainError::Token`] if the token is malformed, lacks a `kid`, is not EdDSA, has an
    ///   invalid signature or is expired
    /// - [`KeyChainError::KeyNotFound`] if `kid` is not retained or the store cannot be read
    #[tracing::instrument(skip_all)]
    pub async fn verify<C: DeserializeOwned>(&self, token: &str) -> Result<C> {
        let header = decode_header(token)?;
        if header.alg != JwtAlgorithm::EdDSA {
            return Err(KeyChainError::token("algorithm mismatch"));
        }

        let kid =
            header.kid.ok_or_else(|| KeyChainError::token("JWT header missing 'kid' field"))?;

        let keychain = self.repository.find(&kid).await?.ok_or_else(|| {
            tracing::debug!(kid = %kid, "token references an unknown KeyChain");
            KeyChainError::key_not_found(&kid)
        })?;

        let decoding_key = decoding_key(&keychain)?;
        let mut validation = Validation::new(JwtAlgorithm::EdDSA);
        validation.validate_aud = false;
        validation.required_spec_claims.clear();

        let data = decode::<C>(token, &decoding_key, &validation)?;
        tracing::debug!(kid = %kid, "token verified");
        Ok(data.claims)
    }
}

impl std::fmt::Debug for KeyChainSigner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KeyChainSigner").finish_non_exhaustive()
    }
}

fn require_ed25519(keychain: &KeyChain) -> Result<()> {
    if keychain.algorithm() == Algorithm::EdDsa {
        Ok(())
    } else {
        Err(KeyChainError::token(format!(
            "KeyChain {} uses {}, only EdDSA tokens are supported",
            keychain.id(),
            keychain.algorithm()
        )))
    }
}

fn encoding_key(keychain: &KeyChain) -> Result<EncodingKey> {
    require_ed25519(keychain)?;

    let seed = keychain.key_pair().private_key();
    if seed.len() != SECRET_KEY_LENGTH {
        return Err(KeyChainError::token(format!(
            "Ed25519 private key for {} must be {SECRET_KEY_LENGTH} bytes, got {}",
            keychain.id(),
            seed.len()
        )));
    }

    let mut der = Zeroizing::new(Vec::with_capacity(ED25519_PKCS8_PREFIX.len() + seed.len()));
    der.extend_from_slice(&ED25519_PKCS8_PREFIX);
    der.extend_from_slice(seed);

    Ok(EncodingKey::from_ed_der(&der))
}

fn decoding_key(keychain: &KeyChain) -> Result<DecodingKey> {
    require_ed25519(keychain)?;
    Ok(DecodingKey::from_ed_components(&URL_SAFE_NO_PAD.encode(keychain.key_pair().public_key()))?)
}
