//! Scoped write transactions.

use std::sync::RwLockWriteGuard;

use serde_json::Value as JsonValue;

use stockbook_core::RecordId;

use crate::backend::{CommitBatch, StoreBackend};
use crate::engine::{EngineState, StoreData};
use crate::error::StoreError;
use crate::record::{IndexKey, Record, decode, encode, extract_key, format_key};

enum UndoOp {
    /// Put the prior document back (undoes an overwrite or a delete).
    Restore {
        store: String,
        id: RecordId,
        doc: JsonValue,
    },
    /// Remove the document again (undoes a fresh insert).
    Remove { store: String, id: RecordId },
}

/// Exclusive transaction over a declared set of stores.
///
/// Mutations hit the in-memory state immediately (the exclusive lock keeps
/// them invisible to every reader) and are journalled. `commit` hands the
/// accumulated batch to the backend in one durable step; dropping the
/// transaction without committing rolls every mutation back, so a failed
/// operation leaves the store exactly as it found it. Touching a store
/// outside the declared scope is an error.
pub struct WriteTxn<'a> {
    state: RwLockWriteGuard<'a, EngineState>,
    backend: &'a dyn StoreBackend,
    scope: Vec<String>,
    undo: Vec<UndoOp>,
    batch: CommitBatch,
    committed: bool,
}

impl<'a> WriteTxn<'a> {
    pub(crate) fn new(
        state: RwLockWriteGuard<'a, EngineState>,
        backend: &'a dyn StoreBackend,
        scope: &[&str],
    ) -> Self {
        Self {
            state,
            backend,
            scope: scope.iter().map(|s| (*s).to_string()).collect(),
            undo: Vec::new(),
            batch: CommitBatch::default(),
            committed: false,
        }
    }

    fn check_scope(&self, store: &str) -> Result<(), StoreError> {
        if self.scope.iter().any(|s| s == store) {
            Ok(())
        } else {
            Err(StoreError::OutOfScope(store.to_string()))
        }
    }

    fn store_data(&self, name: &str) -> Result<&StoreData, StoreError> {
        self.state
            .stores
            .get(name)
            .ok_or_else(|| StoreError::UnknownStore(name.to_string()))
    }

    fn store_data_mut(&mut self, name: &str) -> Result<&mut StoreData, StoreError> {
        self.state
            .stores
            .get_mut(name)
            .ok_or_else(|| StoreError::UnknownStore(name.to_string()))
    }

    pub fn get<R: Record>(&self, id: RecordId) -> Result<Option<R>, StoreError> {
        self.check_scope(R::STORE)?;
        let data = self.store_data(R::STORE)?;
        data.records.get(&id).map(|doc| decode(doc)).transpose()
    }

    pub fn find<R: Record>(&self, index: &str, key: &[IndexKey]) -> Result<Vec<R>, StoreError> {
        self.check_scope(R::STORE)?;
        let data = self.store_data(R::STORE)?;
        let idx = data.indexes.get(index).ok_or_else(|| StoreError::UnknownIndex {
            store: R::STORE.to_string(),
            index: index.to_string(),
        })?;

        let mut out = Vec::new();
        if let Some(ids) = idx.entries.get(key) {
            for id in ids {
                if let Some(doc) = data.records.get(id) {
                    out.push(decode(doc)?);
                }
            }
        }
        Ok(out)
    }

    pub fn find_unique<R: Record>(
        &self,
        index: &str,
        key: &[IndexKey],
    ) -> Result<Option<R>, StoreError> {
        let matches = self.find::<R>(index, key)?;
        if matches.len() > 1 {
            return Err(StoreError::UniquenessViolation {
                store: R::STORE.to_string(),
                index: index.to_string(),
                key: format_key(key),
            });
        }
        Ok(matches.into_iter().next())
    }

    /// Rows in `store` whose `index` key equals `key`, without the record
    /// type. The store must be in scope.
    pub fn count_matching(
        &self,
        store: &str,
        index: &str,
        key: &[IndexKey],
    ) -> Result<usize, StoreError> {
        self.check_scope(store)?;
        let data = self.store_data(store)?;
        let idx = data.indexes.get(index).ok_or_else(|| StoreError::UnknownIndex {
            store: store.to_string(),
            index: index.to_string(),
        })?;
        Ok(idx.entries.get(key).map_or(0, |ids| ids.len()))
    }

    /// Number of rows in `store`, including uncommitted writes. The store
    /// must be in scope.
    pub fn count(&self, store: &str) -> Result<usize, StoreError> {
        self.check_scope(store)?;
        Ok(self.store_data(store)?.records.len())
    }

    /// Insert a record whose id must not already exist.
    pub fn insert<R: Record>(&mut self, record: &R) -> Result<(), StoreError> {
        self.put_doc(R::STORE, record.id(), encode(record)?, true)
    }

    /// Insert or replace by primary key.
    pub fn put<R: Record>(&mut self, record: &R) -> Result<(), StoreError> {
        self.put_doc(R::STORE, record.id(), encode(record)?, false)
    }

    /// Delete by primary key; returns whether a row was removed.
    pub fn delete<R: Record>(&mut self, id: RecordId) -> Result<bool, StoreError> {
        self.check_scope(R::STORE)?;
        let data = self.store_data_mut(R::STORE)?;
        let Some(doc) = data.records.get(&id).cloned() else {
            return Ok(false);
        };

        raw_remove(data, id);
        self.undo.push(UndoOp::Restore {
            store: R::STORE.to_string(),
            id,
            doc,
        });
        self.batch.deletes.push((R::STORE.to_string(), id));
        Ok(true)
    }

    fn put_doc(
        &mut self,
        store: &str,
        id: RecordId,
        doc: JsonValue,
        must_be_new: bool,
    ) -> Result<(), StoreError> {
        self.check_scope(store)?;
        let data = self.store_data_mut(store)?;

        let prior = data.records.get(&id).cloned();
        if must_be_new && prior.is_some() {
            return Err(StoreError::UniquenessViolation {
                store: store.to_string(),
                index: "primary".to_string(),
                key: id.to_string(),
            });
        }

        // Validate every unique index against the new document before any
        // mutation, so a rejected write has nothing to undo.
        for (name, index) in &data.indexes {
            if !index.unique {
                continue;
            }
            let key = extract_key(&doc, &index.key);
            if key.iter().any(IndexKey::is_absent) {
                continue;
            }
            if let Some(ids) = index.entries.get(&key) {
                if ids.iter().any(|other| *other != id) {
                    return Err(StoreError::UniquenessViolation {
                        store: store.to_string(),
                        index: name.clone(),
                        key: format_key(&key),
                    });
                }
            }
        }

        raw_put(data, id, doc.clone());

        self.undo.push(match prior {
            Some(old_doc) => UndoOp::Restore {
                store: store.to_string(),
                id,
                doc: old_doc,
            },
            None => UndoOp::Remove {
                store: store.to_string(),
                id,
            },
        });
        self.batch.puts.push((store.to_string(), id, doc));
        Ok(())
    }

    /// Make the transaction durable. Consumes the transaction; on backend
    /// failure the in-memory state is rolled back on drop and the error is
    /// returned.
    pub fn commit(mut self) -> Result<(), StoreError> {
        let batch = std::mem::take(&mut self.batch);
        match self.backend.persist(&batch) {
            Ok(()) => {
                self.committed = true;
                self.undo.clear();
                Ok(())
            }
            Err(e) => Err(e),
        }
    }

    fn rollback(&mut self) {
        while let Some(op) = self.undo.pop() {
            match op {
                UndoOp::Restore { store, id, doc } => {
                    if let Some(data) = self.state.stores.get_mut(&store) {
                        raw_put(data, id, doc);
                    }
                }
                UndoOp::Remove { store, id } => {
                    if let Some(data) = self.state.stores.get_mut(&store) {
                        raw_remove(data, id);
                    }
                }
            }
        }
    }
}

impl Drop for WriteTxn<'_> {
    fn drop(&mut self) {
        if !self.committed {
            self.rollback();
        }
    }
}

/// Remove a row and its index entries. No journalling.
fn raw_remove(data: &mut StoreData, id: RecordId) {
    if let Some(doc) = data.records.remove(&id) {
        for index in data.indexes.values_mut() {
            let key = extract_key(&doc, &index.key);
            if key.iter().any(IndexKey::is_absent) {
                continue;
            }
            if let Some(ids) = index.entries.get_mut(&key) {
                ids.remove(&id);
                if ids.is_empty() {
                    index.entries.remove(&key);
                }
            }
        }
    }
}

/// Install a row, replacing any current one, and index it. No journalling.
fn raw_put(data: &mut StoreData, id: RecordId, doc: JsonValue) {
    raw_remove(data, id);
    for index in data.indexes.values_mut() {
        let key = extract_key(&doc, &index.key);
        if !key.iter().any(IndexKey::is_absent) {
            index.entries.entry(key).or_default().insert(id);
        }
    }
    data.records.insert(id, doc);
}

#[cfg(test)]
mod tests {
    use serde::{Deserialize, Serialize};

    use stockbook_core::IdGenerator;

    use crate::backend::MemoryBackend;
    use crate::engine::Store;
    use crate::schema::{IndexSpec, SchemaManager, SchemaVersion, StoreSpec};

    use super::*;

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    struct Crate {
        id: RecordId,
        label: String,
        slot: i64,
    }

    impl Record for Crate {
        const STORE: &'static str = "crates";

        fn id(&self) -> RecordId {
            self.id
        }
    }

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    struct Note {
        id: RecordId,
        body: String,
    }

    impl Record for Note {
        const STORE: &'static str = "notes";

        fn id(&self) -> RecordId {
            self.id
        }
    }

    fn test_store() -> Store {
        let mut crates = StoreSpec::new(Crate::STORE);
        crates.indexes = vec![
            IndexSpec::new("label", &["label"]),
            IndexSpec::unique("slot", &["slot"]),
        ];
        let notes = StoreSpec::new(Note::STORE);

        Store::open(
            Box::new(MemoryBackend::new()),
            SchemaManager::new(vec![SchemaVersion::new(1, vec![crates, notes])]).unwrap(),
        )
        .unwrap()
    }

    fn a_crate(label: &str, slot: i64) -> Crate {
        Crate {
            id: IdGenerator::new().next_id(),
            label: label.to_string(),
            slot,
        }
    }

    #[test]
    fn dropping_without_commit_rolls_everything_back() {
        let store = test_store();
        let row = a_crate("apples", 1);

        {
            let mut txn = store.write(&[Crate::STORE]).unwrap();
            txn.insert(&row).unwrap();
            assert!(txn.get::<Crate>(row.id).unwrap().is_some());
            // dropped here, uncommitted
        }

        assert!(store.get::<Crate>(row.id).unwrap().is_none());
        assert_eq!(store.count(Crate::STORE).unwrap(), 0);
        assert!(store
            .find::<Crate>("label", &[IndexKey::text("apples")])
            .unwrap()
            .is_empty());
    }

    #[test]
    fn transactions_read_their_own_writes() {
        let store = test_store();
        let mut row = a_crate("pears", 2);

        let mut txn = store.write(&[Crate::STORE]).unwrap();
        txn.insert(&row).unwrap();

        row.label = "ripe pears".to_string();
        txn.put(&row).unwrap();

        let seen = txn.get::<Crate>(row.id).unwrap().unwrap();
        assert_eq!(seen.label, "ripe pears");

        let by_label: Vec<Crate> = txn.find("label", &[IndexKey::text("ripe pears")]).unwrap();
        assert_eq!(by_label.len(), 1);
        // The stale index entry is gone.
        assert!(txn
            .find::<Crate>("label", &[IndexKey::text("pears")])
            .unwrap()
            .is_empty());

        txn.commit().unwrap();
        assert_eq!(store.count(Crate::STORE).unwrap(), 1);
    }

    #[test]
    fn counts_include_uncommitted_writes() {
        let store = test_store();

        let mut txn = store.write(&[Crate::STORE]).unwrap();
        assert_eq!(txn.count(Crate::STORE).unwrap(), 0);
        txn.insert(&a_crate("apples", 1)).unwrap();
        txn.insert(&a_crate("pears", 2)).unwrap();
        assert_eq!(txn.count(Crate::STORE).unwrap(), 2);

        let err = txn.count(Note::STORE).unwrap_err();
        assert!(matches!(err, StoreError::OutOfScope(_)));
    }

    #[test]
    fn touching_a_store_outside_the_scope_is_rejected() {
        let store = test_store();
        let mut txn = store.write(&[Crate::STORE]).unwrap();

        let err = txn
            .insert(&Note {
                id: IdGenerator::new().next_id(),
                body: "out of bounds".to_string(),
            })
            .unwrap_err();
        assert!(matches!(err, StoreError::OutOfScope(_)));
    }

    #[test]
    fn unique_index_rejects_a_second_row_and_keeps_state_clean() {
        let store = test_store();
        let first = a_crate("first", 7);
        let second = a_crate("second", 7);

        let mut txn = store.write(&[Crate::STORE]).unwrap();
        txn.insert(&first).unwrap();
        let err = txn.insert(&second).unwrap_err();
        assert!(matches!(err, StoreError::UniquenessViolation { .. }));
        drop(txn);

        // The failed transaction left nothing behind, not even the first row.
        assert_eq!(store.count(Crate::STORE).unwrap(), 0);
    }

    #[test]
    fn replacing_a_row_keeps_its_unique_slot() {
        let store = test_store();
        let mut row = a_crate("olives", 3);

        let mut txn = store.write(&[Crate::STORE]).unwrap();
        txn.insert(&row).unwrap();
        row.label = "green olives".to_string();
        // Same id, same slot: must not trip the unique index.
        txn.put(&row).unwrap();
        txn.commit().unwrap();

        let found: Option<Crate> = store.find_unique("slot", &[IndexKey::int(3)]).unwrap();
        assert_eq!(found.unwrap().label, "green olives");
    }

    #[test]
    fn inserting_an_existing_id_is_a_primary_key_violation() {
        let store = test_store();
        let row = a_crate("figs", 4);

        let mut txn = store.write(&[Crate::STORE]).unwrap();
        txn.insert(&row).unwrap();
        let err = txn.insert(&row).unwrap_err();
        assert!(matches!(
            err,
            StoreError::UniquenessViolation { ref index, .. } if index == "primary"
        ));
    }

    #[test]
    fn delete_removes_row_and_index_entries() {
        let store = test_store();
        let row = a_crate("dates", 5);

        let mut txn = store.write(&[Crate::STORE]).unwrap();
        txn.insert(&row).unwrap();
        txn.commit().unwrap();

        let mut txn = store.write(&[Crate::STORE]).unwrap();
        assert!(txn.delete::<Crate>(row.id).unwrap());
        assert!(!txn.delete::<Crate>(row.id).unwrap());
        txn.commit().unwrap();

        assert!(store.get::<Crate>(row.id).unwrap().is_none());
        assert!(store
            .find::<Crate>("slot", &[IndexKey::int(5)])
            .unwrap()
            .is_empty());
    }
}
