//! Persisted form of a KeyChain.

use bytes::Bytes;
use serde::{Deserialize, Serialize};
use zeroize::Zeroizing;

/// Transport form of one KeyChain generation, as held by a rotation store.
///
/// All fields are plain scalars or serializer-opaque blobs; turning a record
/// back into usable key material is the job of the codec in the `keychain`
/// crate. Records are identified by [`id`](Self::id), which is also the `kid`
/// referenced by issued tokens.
///
/// # Example
///
/// ```
/// use keychain_storage::KeyChainRecord;
///
/// let record = KeyChainRecord::builder()
///     .id("0192b3c4-0000-7000-8000-000000000001")
///     .algorithm("EdDSA")
///     .created_at(1_700_000_000_000)
///     .public_key(vec![1u8; 32])
///     .private_key(vec![2u8; 32])
///     .build();
///
/// assert_eq!(record.algorithm, "EdDSA");
/// ```
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, bon::Builder)]
#[serde(deny_unknown_fields)]
pub struct KeyChainRecord {
    /// Unique, time-ordered key identifier.
    #[builder(into)]
    pub id: String,

    /// JOSE name of the signature algorithm (e.g. `EdDSA`).
    #[builder(into)]
    pub algorithm: String,

    /// Creation time in epoch milliseconds. Never mutated.
    pub created_at: i64,

    /// Serialized public half.
    #[builder(into)]
    pub public_key: Bytes,

    /// Serialized private half.
    ///
    /// Wrapped in [`Zeroizing`] so the blob is scrubbed when the record is
    /// dropped.
    #[builder(into)]
    pub private_key: Zeroizing<Vec<u8>>,
}

impl KeyChainRecord {
    /// Returns `true` if this record carries the given key id.
    #[must_use]
    pub fn has_id(&self, kid: &str) -> bool {
        self.id == kid
    }
}
