//! KeyChain id generation.
//!
//! Ids double as the `kid` header of issued tokens. The repository never
//! checks them for uniqueness against the store, so generators must make
//! collisions negligible by construction.

use uuid::Uuid;

/// Produces unique KeyChain ids.
pub trait IdGenerator: Send + Sync {
    /// Returns a new id that no live KeyChain uses.
    fn next_id(&self) -> String;
}

/// Time-ordered UUIDv7 ids.
///
/// The 48-bit millisecond timestamp prefix makes ids sort lexically by
/// creation time; the remaining random bits make same-millisecond collisions
/// negligible.
#[derive(Debug, Default, Clone, Copy)]
pub struct UuidV7Generator;

impl IdGenerator for UuidV7Generator {
    fn next_id(&self) -> String {
        Uuid::now_v7().hyphenated().to_string()
    }
}
