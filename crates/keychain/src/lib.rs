//! Distributed signing-key rotation.
//!
//! A [`KeyChain`] is one generation of asymmetric signing key material. A
//! [`KeyChainRepository`] keeps a bounded, newest-first history of them in a
//! shared [`KeyChainStore`](keychain_storage::KeyChainStore), caches the
//! current one in process, and rotates it without any cross-instance lock.
//!
//! # Components
//!
//! - [`KeyChain`]: key pair plus id, algorithm and creation time
//! - [`KeyChainCodec`]: KeyChain to [`KeyChainRecord`](keychain_storage::KeyChainRecord) and back,
//!   with a pluggable [`KeySerializer`](codec::KeySerializer) for private keys
//! - [`CachedKeyChain`]: cached current KeyChain with lazy bootstrap and background refresh
//! - [`DistributedKeyChainRepository`]: expiry-gated rotation and capacity eviction
//! - [`KeyChainSigner`]: JWT signing with the current KeyChain and verification by `kid`
//!
//! # Rotation Model
//!
//! ```text
//!            rotate(candidate, min_validity)
//!                        │
//!              store empty? ──yes──► insert
//!                        │no
//!          head.created_at + min_validity < now? ──no──► false
//!                        │yes
//!              head.id == candidate.id? ──yes──► false
//!                        │no
//!                     insert ──► evict tail while size > capacity ──► true
//! ```
//!
//! Store failures during rotation are logged and reported as `false`. Once a
//! KeyChain has been loaded, [`current`](KeyChainRepository::current) keeps
//! serving it through store outages.
//!
//! # Feature Flags
//!
//! - **`testutil`**: Enables the [`testutil`] module (KeyChain factories, gated store wrapper).
//! - **`failpoints`**: Activates the `keychain-before-store-write` and `keychain-before-refresh`
//!   fail points.

#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod algorithm;
pub mod clock;
pub mod codec;
pub mod config;
pub mod error;
pub mod id;
pub mod jwt;
pub mod key_pair;
pub mod keychain;
pub mod repository;
#[cfg(any(test, feature = "testutil"))]
#[allow(clippy::expect_used, clippy::unwrap_used)]
pub mod testutil;

pub use algorithm::{Algorithm, FORBIDDEN_ALGORITHMS, validate_algorithm};
pub use codec::KeyChainCodec;
pub use config::KeyChainRepositoryConfig;
pub use error::{KeyChainError, Result};
pub use jwt::KeyChainSigner;
pub use keychain::KeyChain;
pub use repository::{CachedKeyChain, DistributedKeyChainRepository, KeyChainRepository};
