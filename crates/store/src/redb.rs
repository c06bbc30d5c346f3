//! Durable backend on an embedded redb database.
//!
//! Rows live in a single table keyed by `(store, record id)` with the
//! document serialized as JSON bytes; the applied schema version sits in a
//! one-row meta table. A commit batch maps onto one redb write transaction,
//! which gives the all-or-nothing guarantee the engine relies on.

use std::path::Path;

use redb::{Database, ReadableTable, TableDefinition, TableError};

use stockbook_core::RecordId;

use crate::backend::{BackendImage, CommitBatch, StoreBackend};
use crate::error::StoreError;

const RECORDS: TableDefinition<(&str, &str), &[u8]> = TableDefinition::new("records");
const META: TableDefinition<&str, u32> = TableDefinition::new("meta");

const SCHEMA_VERSION_KEY: &str = "schema_version";

/// File-backed [`StoreBackend`].
pub struct RedbBackend {
    db: Database,
}

impl RedbBackend {
    /// Open the database at `path`, creating it when missing.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let db = Database::create(path).map_err(StoreError::backend)?;
        Ok(Self { db })
    }
}

impl StoreBackend for RedbBackend {
    fn load(&self) -> Result<BackendImage, StoreError> {
        let txn = self.db.begin_read().map_err(StoreError::backend)?;
        let mut image = BackendImage::default();

        // Both tables are absent until the first persist.
        match txn.open_table(META) {
            Ok(table) => {
                if let Some(v) = table.get(SCHEMA_VERSION_KEY).map_err(StoreError::backend)? {
                    image.schema_version = v.value();
                }
            }
            Err(TableError::TableDoesNotExist(_)) => {}
            Err(e) => return Err(StoreError::backend(e)),
        }

        match txn.open_table(RECORDS) {
            Ok(table) => {
                for entry in table.iter().map_err(StoreError::backend)? {
                    let (key, value) = entry.map_err(StoreError::backend)?;
                    let (store, id) = key.value();
                    let id: RecordId = id.parse().map_err(StoreError::serialization)?;
                    let doc =
                        serde_json::from_slice(value.value()).map_err(StoreError::serialization)?;
                    image.records.push((store.to_string(), id, doc));
                }
            }
            Err(TableError::TableDoesNotExist(_)) => {}
            Err(e) => return Err(StoreError::backend(e)),
        }

        Ok(image)
    }

    fn persist(&self, batch: &CommitBatch) -> Result<(), StoreError> {
        let txn = self.db.begin_write().map_err(StoreError::backend)?;
        {
            let mut table = txn.open_table(RECORDS).map_err(StoreError::backend)?;
            for (store, id, doc) in &batch.puts {
                let bytes = serde_json::to_vec(doc).map_err(StoreError::serialization)?;
                table
                    .insert((store.as_str(), id.to_string().as_str()), bytes.as_slice())
                    .map_err(StoreError::backend)?;
            }
            for (store, id) in &batch.deletes {
                table
                    .remove((store.as_str(), id.to_string().as_str()))
                    .map_err(StoreError::backend)?;
            }
        }
        if let Some(version) = batch.schema_version {
            let mut table = txn.open_table(META).map_err(StoreError::backend)?;
            table
                .insert(SCHEMA_VERSION_KEY, version)
                .map_err(StoreError::backend)?;
        }
        txn.commit().map_err(StoreError::backend)?;
        Ok(())
    }
}
