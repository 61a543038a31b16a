//! Store error types and result alias.
//!
//! Every [`KeyChainStore`](crate::KeyChainStore) implementation maps its
//! client-specific failures onto [`StoreError`]. The repository layer treats
//! all of them as "store unavailable"; [`StoreError::is_transient`] tells
//! callers which ones are worth retrying on their own schedule.
//!
//! # Example
//!
//! ```
//! use keychain_storage::{StoreError, StoreResult};
//!
//! fn connect(endpoint: &str) -> StoreResult<()> {
//!     Err(StoreError::connection(format!("refused: {endpoint}")))
//! }
//!
//! assert!(connect("redis://localhost").unwrap_err().is_transient());
//! ```

use std::sync::Arc;

use thiserror::Error;

/// A boxed error type for source chain tracking.
pub type BoxError = Arc<dyn std::error::Error + Send + Sync>;

/// Result type alias for rotation store operations.
pub type StoreResult<T> = Result<T, StoreError>;

/// Errors that can occur while talking to a rotation store.
///
/// Errors preserve their source chain via the `#[source]` attribute.
///
/// # Non-exhaustive
///
/// New variants may be added in future minor releases. Downstream match
/// expressions must include a wildcard arm (`_ =>`).
#[derive(Debug, Clone, Error)]
#[non_exhaustive]
pub enum StoreError {
    /// Network or connection failure reaching the backing store.
    #[error("Connection error: {message}")]
    Connection {
        /// Description of the connection error.
        message: String,
        /// The underlying error that caused this connection failure.
        #[source]
        source: Option<BoxError>,
    },

    /// A store call exceeded its configured I/O timeout.
    #[error("Operation timeout")]
    Timeout,

    /// A record could not be encoded for, or decoded from, the store.
    #[error("Serialization error: {message}")]
    Serialization {
        /// Description of the serialization error.
        message: String,
        /// The underlying error that caused serialization to fail.
        #[source]
        source: Option<BoxError>,
    },

    /// Backend-specific failure that fits no other category.
    #[error("Internal error: {message}")]
    Internal {
        /// Description of the internal error.
        message: String,
        /// The underlying error that caused this internal failure.
        #[source]
        source: Option<BoxError>,
    },
}

impl StoreError {
    /// Creates a new `Connection` error with the given message.
    #[must_use]
    pub fn connection(message: impl Into<String>) -> Self {
        Self::Connection { message: message.into(), source: None }
    }

    /// Creates a new `Connection` error with a message and source error.
    #[must_use]
    pub fn connection_with_source(
        message: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self::Connection { message: message.into(), source: Some(Arc::new(source)) }
    }

    /// Creates a new `Timeout` error.
    #[must_use]
    pub fn timeout() -> Self {
        Self::Timeout
    }

    /// Creates a new `Serialization` error with the given message.
    #[must_use]
    pub fn serialization(message: impl Into<String>) -> Self {
        Self::Serialization { message: message.into(), source: None }
    }

    /// Creates a new `Serialization` error with a message and source error.
    #[must_use]
    pub fn serialization_with_source(
        message: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self::Serialization { message: message.into(), source: Some(Arc::new(source)) }
    }

    /// Creates a new `Internal` error with the given message.
    #[must_use]
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal { message: message.into(), source: None }
    }

    /// Returns `true` for failures that may succeed if retried later
    /// (connection loss and timeouts).
    #[must_use]
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Connection { .. } | Self::Timeout)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
mod tests {
    use std::error::Error;

    use super::*;

    #[test]
    fn test_error_display() {
        assert_eq!(StoreError::connection("refused").to_string(), "Connection error: refused");
        assert_eq!(StoreError::timeout().to_string(), "Operation timeout");
        assert_eq!(StoreError::serialization("bad").to_string(), "Serialization error: bad");
        assert_eq!(StoreError::internal("boom").to_string(), "Internal error: boom");
    }

    #[test]
    fn test_transient_classification() {
        assert!(StoreError::connection("x").is_transient());
        assert!(StoreError::timeout().is_transient());
        assert!(!StoreError::serialization("x").is_transient());
        assert!(!StoreError::internal("x").is_transient());
    }

    #[test]
    fn test_source_chain_preserved() {
        let err = StoreError::connection_with_source("pool exhausted", StoreError::Timeout);
        let source = err.source().expect("source must be preserved");
        assert_eq!(source.to_string(), "Operation timeout");
    }

    #[test]
    fn test_clone_shares_source() {
        let err = StoreError::serialization_with_source("corrupt", StoreError::internal("inner"));
        let cloned = err.clone();
        assert_eq!(err.to_string(), cloned.to_string());
        assert!(cloned.source().is_some());
    }
}
