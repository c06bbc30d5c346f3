//! Store-layer error model.

use thiserror::Error;

/// Error raised by the record store.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The migration pipeline failed. Fatal: [`crate::Store::open`] refuses
    /// to produce a handle, so no operation can run against a stale layout.
    #[error("schema upgrade failed: {0}")]
    SchemaUpgrade(String),

    /// A unique index rejected a write. For `daily_stock` this signals a
    /// ledger bug (lazy create-by-key should make it unreachable).
    #[error("uniqueness violated on {store}.{index} for key {key}")]
    UniquenessViolation {
        store: String,
        index: String,
        key: String,
    },

    /// The named store is not part of the current schema.
    #[error("unknown store '{0}'")]
    UnknownStore(String),

    /// The named index is not declared on the store.
    #[error("unknown index '{index}' on store '{store}'")]
    UnknownIndex { store: String, index: String },

    /// A transaction touched a store outside its declared scope.
    #[error("store '{0}' is outside the transaction scope")]
    OutOfScope(String),

    #[error("serialization failed: {0}")]
    Serialization(String),

    #[error("backend error: {0}")]
    Backend(String),
}

impl StoreError {
    pub fn schema(msg: impl Into<String>) -> Self {
        Self::SchemaUpgrade(msg.into())
    }

    pub fn serialization(err: impl core::fmt::Display) -> Self {
        Self::Serialization(err.to_string())
    }

    pub fn backend(err: impl core::fmt::Display) -> Self {
        Self::Backend(err.to_string())
    }
}
