//! Conversion between [`KeyChain`] values and persisted [`KeyChainRecord`]s.
//!
//! Both halves of a key pair pass through a pluggable [`KeySerializer`]
//! before they reach the store.

use std::{fmt, sync::Arc};

use base64::{Engine, engine::general_purpose::URL_SAFE_NO_PAD};
use keychain_storage::KeyChainRecord;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use zeroize::Zeroizing;

use crate::{
    algorithm::Algorithm,
    error::{KeyChainError, Result},
    key_pair::KeyPair,
    keychain::KeyChain,
};

/// Failure inside a [`KeySerializer`].
#[derive(Debug, Error)]
#[error("{serializer} serializer: {message}")]
pub struct CodecError {
    serializer: &'static str,
    message: String,
}

impl CodecError {
    /// Creates a codec error attributed to `serializer`.
    #[must_use]
    pub fn new(serializer: &'static str, message: impl Into<String>) -> Self {
        Self { serializer, message: message.into() }
    }
}

/// Turns key bytes into a storable blob and back.
pub trait KeySerializer: Send + Sync + fmt::Debug {
    /// Short name used in logs and errors.
    fn name(&self) -> &'static str;

    /// Serializes one half of a key pair.
    ///
    /// # Errors
    ///
    /// Returns [`CodecError`] if the bytes cannot be represented.
    fn serialize(&self, key: &[u8]) -> std::result::Result<Vec<u8>, CodecError>;

    /// Reverses [`serialize`](Self::serialize).
    ///
    /// # Errors
    ///
    /// Returns [`CodecError`] if `blob` was not produced by this serializer.
    /// The result is zeroized on drop since it may hold a private key.
    fn deserialize(&self, blob: &[u8]) -> std::result::Result<Zeroizing<Vec<u8>>, CodecError>;
}

/// Stores key bytes verbatim.
#[derive(Debug, Default, Clone, Copy)]
pub struct RawSerializer;

impl KeySerializer for RawSerializer {
    fn name(&self) -> &'static str {
        "raw"
    }

    fn serialize(&self, key: &[u8]) -> std::result::Result<Vec<u8>, CodecError> {
        Ok(key.to_vec())
    }

    fn deserialize(&self, blob: &[u8]) -> std::result::Result<Zeroizing<Vec<u8>>, CodecError> {
        if blob.is_empty() {
            return Err(CodecError::new(self.name(), "empty key blob"));
        }
        Ok(Zeroizing::new(blob.to_vec()))
    }
}

/// Versioned JSON envelope around base64url key bytes.
///
/// Produces `{"v":1,"key":"<base64url>"}`. Useful when the backing store is
/// inspected by humans or shared with tooling that expects text.
#[derive(Debug, Default, Clone, Copy)]
pub struct JsonSerializer;

const JSON_ENVELOPE_VERSION: u8 = 1;

#[derive(Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
struct Envelope {
    v: u8,
    key: String,
}

impl KeySerializer for JsonSerializer {
    fn name(&self) -> &'static str {
        "json"
    }

    fn serialize(&self, key: &[u8]) -> std::result::Result<Vec<u8>, CodecError> {
        let envelope = Envelope { v: JSON_ENVELOPE_VERSION, key: URL_SAFE_NO_PAD.encode(key) };
        serde_json::to_vec(&envelope).map_err(|e| CodecError::new(self.name(), e.to_string()))
    }

    fn deserialize(&self, blob: &[u8]) -> std::result::Result<Zeroizing<Vec<u8>>, CodecError> {
        let envelope: Envelope =
            serde_json::from_slice(blob).map_err(|e| CodecError::new(self.name(), e.to_string()))?;
        if envelope.v != JSON_ENVELOPE_VERSION {
            return Err(CodecError::new(
                self.name(),
                format!("unsupported envelope version {}", envelope.v),
            ));
        }
        let key = Zeroizing::new(envelope.key);
        URL_SAFE_NO_PAD
            .decode(key.as_bytes())
            .map(Zeroizing::new)
            .map_err(|e| CodecError::new(self.name(), format!("invalid base64url: {e}")))
    }
}

/// Encodes KeyChains into records and decodes them back.
///
/// # Example
///
/// ```
/// use keychain::{Algorithm, KeyChain, KeyChainCodec, key_pair::KeyPair};
/// use zeroize::Zeroizing;
///
/// let keychain = KeyChain::builder()
///     .id("kid-1")
///     .algorithm(Algorithm::EdDsa)
///     .key_pair(KeyPair::new(vec![1u8; 32], Zeroizing::new(vec![2u8; 32])))
///     .build()
///     .unwrap();
///
/// let codec = KeyChainCodec::default();
/// let record = codec.encode(&keychain).unwrap();
/// assert_eq!(record.algorithm, "EdDSA");
/// assert_eq!(codec.decode(&record).unwrap(), keychain);
/// ```
#[derive(Debug, Clone)]
pub struct KeyChainCodec {
    serializer: Arc<dyn KeySerializer>,
}

impl KeyChainCodec {
    /// Creates a codec using `serializer` for both key blobs.
    #[must_use]
    pub fn new(serializer: Arc<dyn KeySerializer>) -> Self {
        Self { serializer }
    }

    /// The key serializer in use.
    #[must_use]
    pub fn serializer(&self) -> &dyn KeySerializer {
        self.serializer.as_ref()
    }

    /// Encodes a KeyChain into its persisted record.
    ///
    /// # Errors
    ///
    /// Returns [`KeyChainError::EncodeFailure`] if the serializer rejects
    /// either key half.
    pub fn encode(&self, keychain: &KeyChain) -> Result<KeyChainRecord> {
        let serialize = |half: &str, bytes: &[u8]| {
            self.serializer
                .serialize(bytes)
                .map_err(|e| KeyChainError::encode_failure(keychain.id(), format!("{half}: {e}")))
        };
        let public_key = serialize("public key", keychain.key_pair().public_key())?;
        let private_key = serialize("private key", keychain.key_pair().private_key())?;

        Ok(KeyChainRecord::builder()
            .id(keychain.id())
            .algorithm(keychain.algorithm().as_str())
            .created_at(keychain.created_at_millis())
            .public_key(public_key)
            .private_key(private_key)
            .build())
    }

    /// Decodes a persisted record into a KeyChain.
    ///
    /// # Errors
    ///
    /// Returns [`KeyChainError::DecodeFailure`] if the algorithm is unknown or
    /// symmetric, the timestamp is out of range, or the serializer rejects
    /// either key blob or yields an empty key.
    pub fn decode(&self, record: &KeyChainRecord) -> Result<KeyChain> {
        let fail = |message: String| KeyChainError::decode_failure(&record.id, message);

        let algorithm: Algorithm =
            record.algorithm.parse().map_err(|e: KeyChainError| fail(e.to_string()))?;
        let created_at = chrono::DateTime::from_timestamp_millis(record.created_at)
            .ok_or_else(|| fail(format!("created_at {} out of range", record.created_at)))?;
        let public_key = self
            .serializer
            .deserialize(&record.public_key)
            .map_err(|e| fail(format!("public key: {e}")))?;
        let private_key = self
            .serializer
            .deserialize(&record.private_key)
            .map_err(|e| fail(format!("private key: {e}")))?;
        if public_key.is_empty() || private_key.is_empty() {
            return Err(fail("empty key material".to_owned()));
        }

        KeyChain::builder()
            .id(record.id.as_str())
            .algorithm(algorithm)
            .key_pair(KeyPair::new(public_key.to_vec(), private_key))
            .created_at(created_at)
            .build()
            .map_err(|e| fail(e.to_string()))
    }
}

impl Default for KeyChainCodec {
    fn default() -> Self {
        Self::new(Arc::new(RawSerializer))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
mod tests {
    use chrono::TimeZone;
    use rstest::rstest;

    use super::*;

    fn sample(created_at_ms: i64) -> KeyChain {
        KeyChain::builder()
            .id("kid-1")
            .algorithm(Algorithm::EdDsa)
            .key_pair(KeyPair::new(vec![3u8; 32], Zeroizing::new(vec![4u8; 32])))
            .created_at(chrono::Utc.timestamp_millis_opt(created_at_ms).unwrap())
            .build()
            .unwrap()
    }

    #[rstest]
    #[case::raw(Arc::new(RawSerializer) as Arc<dyn KeySerializer>)]
    #[case::json(Arc::new(JsonSerializer) as Arc<dyn KeySerializer>)]
    fn test_roundtrip_preserves_all_fields(#[case] serializer: Arc<dyn KeySerializer>) {
        let codec = KeyChainCodec::new(serializer);
        let original = sample(1_700_000_000_123);

        let decoded = codec.decode(&codec.encode(&original).unwrap()).unwrap();

        assert_eq!(decoded, original);
        assert_eq!(decoded.created_at(), original.created_at());
    }

    #[test]
    fn test_json_envelope_shape() {
        let blob = JsonSerializer.serialize(&[0xFF, 0x00]).unwrap();
        let value: serde_json::Value = serde_json::from_slice(&blob).unwrap();
        assert_eq!(value["v"], 1);
        assert_eq!(value["key"], "_wA");
    }

    #[test]
    fn test_json_rejects_future_version() {
        let result = JsonSerializer.deserialize(br#"{"v":2,"key":"AA"}"#);
        assert!(result.unwrap_err().to_string().contains("unsupported envelope version 2"));
    }

    #[test]
    fn test_decode_rejects_unknown_algorithm() {
        let codec = KeyChainCodec::default();
        let mut record = codec.encode(&sample(0)).unwrap();
        record.algorithm = "XX999".to_owned();

        let err = codec.decode(&record).unwrap_err();
        assert!(matches!(err, KeyChainError::DecodeFailure { ref kid, .. } if kid == "kid-1"));
    }

    #[test]
    fn test_decode_rejects_symmetric_algorithm() {
        let codec = KeyChainCodec::default();
        let mut record = codec.encode(&sample(0)).unwrap();
        record.algorithm = "HS256".to_owned();

        assert!(matches!(codec.decode(&record), Err(KeyChainError::DecodeFailure { .. })));
    }

    #[test]
    fn test_decode_rejects_empty_key_material() {
        let codec = KeyChainCodec::default();
        let mut record = codec.encode(&sample(0)).unwrap();
        record.private_key = Zeroizing::new(Vec::new());
        assert!(matches!(codec.decode(&record), Err(KeyChainError::DecodeFailure { .. })));

        let mut record = codec.encode(&sample(0)).unwrap();
        record.public_key = Vec::<u8>::new().into();
        assert!(matches!(codec.decode(&record), Err(KeyChainError::DecodeFailure { .. })));
    }

    #[test]
    fn test_serializer_mismatch_is_decode_failure() {
        let raw = KeyChainCodec::default();
        let json = KeyChainCodec::new(Arc::new(JsonSerializer));

        let record = raw.encode(&sample(0)).unwrap();
        assert!(matches!(json.decode(&record), Err(KeyChainError::DecodeFailure { .. })));

        // Only the public half is foreign: still rejected.
        let mut record = json.encode(&sample(0)).unwrap();
        record.public_key = raw.encode(&sample(0)).unwrap().public_key;
        let err = json.decode(&record).unwrap_err();
        let KeyChainError::DecodeFailure { message, .. } = err else {
            panic!("expected DecodeFailure, got {err:?}");
        };
        assert!(message.contains("public key"), "unexpected message: {message}");
    }

    #[test]
    fn test_json_serializer_wraps_both_halves() {
        let codec = KeyChainCodec::new(Arc::new(JsonSerializer));
        let record = codec.encode(&sample(0)).unwrap();

        for blob in [&record.public_key[..], &record.private_key[..]] {
            let value: serde_json::Value = serde_json::from_slice(blob).unwrap();
            assert_eq!(value["v"], 1);
        }
        let public: serde_json::Value = serde_json::from_slice(&record.public_key).unwrap();
        assert_eq!(public["key"], URL_SAFE_NO_PAD.encode([3u8; 32]));
    }
}
