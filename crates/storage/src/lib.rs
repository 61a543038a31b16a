//! Rotation store abstraction for KeyChain records.
//!
//! This crate provides the [`KeyChainStore`] trait, the persisted
//! [`KeyChainRecord`] form, and an in-memory implementation. The `keychain`
//! crate builds its cached, rotating repository on top of it.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                   Token signing / verification              │
//! ├─────────────────────────────────────────────────────────────┤
//! │                  KeyChainRepository (keychain)              │
//! │     current, find, rotate, forced_rotate, clear             │
//! ├─────────────────────────────────────────────────────────────┤
//! │                  keychain-storage                           │
//! │                 KeyChainStore trait                         │
//! │  (peek_first, add_first, remove_last, size, find, clear)    │
//! ├──────────────────────┬──────────────────────────────────────┤
//! │ MemoryKeyChainStore  │   Shared deque (Redis list, etc.)    │
//! │ (single process)     │   (multi-instance deployments)       │
//! └──────────────────────┴──────────────────────────────────────┘
//! ```
//!
//! # Implementing a Store
//!
//! 1. Implement [`KeyChainStore`], keeping every primitive individually atomic
//! 2. Map client errors to [`StoreError`]
//! 3. Run the [`conformance`] suite against it (requires the `testutil` feature)
//!
//! Wrap any store in [`TimeoutStore`] to bound each call with an I/O deadline.
//!
//! # Feature Flags
//!
//! - **`testutil`**: Enables the `testutil` and `conformance` modules (record factories, failing
//!   and delayed store wrappers, conformance checks).

#![deny(unsafe_code)]

#[cfg(any(test, feature = "testutil"))]
#[allow(clippy::expect_used, clippy::panic)]
pub mod conformance;
pub mod error;
pub mod record;
pub mod store;
#[cfg(any(test, feature = "testutil"))]
#[allow(clippy::expect_used)]
pub mod testutil;
pub mod timeout;

pub use error::{BoxError, StoreError, StoreResult};
pub use record::KeyChainRecord;
pub use store::{KeyChainStore, MemoryKeyChainStore, RecordPredicate};
pub use timeout::{DEFAULT_STORE_TIMEOUT, TimeoutStore};
pub use zeroize::Zeroizing;
