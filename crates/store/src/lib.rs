//! Embedded record store with versioned schemas.
//!
//! Records are JSON documents grouped into named stores, queried through
//! field indexes that the schema pipeline declares version by version. All
//! reads and writes go through an in-memory engine; a pluggable backend
//! makes committed batches durable. See [`Store::open`] for the startup
//! sequence and [`WriteTxn`] for the transaction rules.

pub mod backend;
pub mod engine;
pub mod error;
pub mod record;
pub mod redb;
pub mod schema;
pub mod txn;

pub use backend::{BackendImage, CommitBatch, MemoryBackend, StoreBackend};
pub use engine::{ReadTxn, Store};
pub use error::StoreError;
pub use record::{IndexKey, Record};
pub use schema::{IndexSpec, SchemaManager, SchemaVersion, StoreSpec};
pub use txn::WriteTxn;

pub use self::redb::RedbBackend;
