//! Durability layer beneath the engine.
//!
//! The engine owns the authoritative in-memory state; a backend persists
//! committed batches atomically and hands everything back at open.

use serde_json::Value as JsonValue;

use stockbook_core::RecordId;

use crate::error::StoreError;

/// Everything a backend had persisted, loaded once at open.
#[derive(Debug, Default)]
pub struct BackendImage {
    /// Last schema version recorded as applied; `0` for a fresh store.
    pub schema_version: u32,
    pub records: Vec<(String, RecordId, JsonValue)>,
}

/// One atomic batch of durable changes.
#[derive(Debug, Default)]
pub struct CommitBatch {
    /// Set when the batch records a newly applied schema version.
    pub schema_version: Option<u32>,
    pub puts: Vec<(String, RecordId, JsonValue)>,
    pub deletes: Vec<(String, RecordId)>,
}

impl CommitBatch {
    pub fn is_empty(&self) -> bool {
        self.schema_version.is_none() && self.puts.is_empty() && self.deletes.is_empty()
    }
}

/// Storage backend contract.
///
/// `persist` must be all-or-nothing: a batch that fails may not leave any of
/// its puts or deletes behind, because the engine keeps its in-memory state
/// only when `persist` succeeds.
pub trait StoreBackend: Send + Sync {
    /// Load everything previously persisted.
    fn load(&self) -> Result<BackendImage, StoreError>;

    /// Durably apply one commit batch.
    fn persist(&self, batch: &CommitBatch) -> Result<(), StoreError>;
}

/// No-durability backend: the test and ephemeral-store configuration.
#[derive(Debug, Default)]
pub struct MemoryBackend;

impl MemoryBackend {
    pub fn new() -> Self {
        Self
    }
}

impl StoreBackend for MemoryBackend {
    fn load(&self) -> Result<BackendImage, StoreError> {
        Ok(BackendImage::default())
    }

    fn persist(&self, _batch: &CommitBatch) -> Result<(), StoreError> {
        Ok(())
    }
}
