//! The record store engine: sorted-map collections plus an in-process index
//! layer, opened only through the migration pipeline.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::{RwLock, RwLockReadGuard};

use serde_json::Value as JsonValue;
use tracing::info;

use stockbook_core::RecordId;

use crate::backend::{CommitBatch, StoreBackend};
use crate::error::StoreError;
use crate::record::{IndexKey, Record, decode, extract_key, format_key};
use crate::schema::{IndexSpec, SchemaManager, SchemaVersion};
use crate::txn::WriteTxn;

#[derive(Debug, Default)]
pub(crate) struct IndexData {
    pub(crate) key: Vec<String>,
    pub(crate) unique: bool,
    pub(crate) entries: BTreeMap<Vec<IndexKey>, BTreeSet<RecordId>>,
}

#[derive(Debug, Default)]
pub(crate) struct StoreData {
    pub(crate) records: BTreeMap<RecordId, JsonValue>,
    pub(crate) indexes: BTreeMap<String, IndexData>,
}

#[derive(Debug, Default)]
pub(crate) struct EngineState {
    pub(crate) version: u32,
    pub(crate) stores: BTreeMap<String, StoreData>,
}

/// The embedded record store.
///
/// [`Store::open`] loads the backend, runs every pending schema version in
/// order, and only then hands out a handle; the migration barrier cannot be
/// bypassed because no other constructor exists. Mutations go through
/// [`Store::write`] (an exclusive, scoped transaction); reads go through
/// [`Store::read`] or the single-shot convenience methods.
pub struct Store {
    state: RwLock<EngineState>,
    backend: Box<dyn StoreBackend>,
}

impl Store {
    pub fn open(backend: Box<dyn StoreBackend>, schema: SchemaManager) -> Result<Self, StoreError> {
        let image = backend.load()?;
        if image.schema_version > schema.latest() {
            return Err(StoreError::schema(format!(
                "store is at version {} but only {} versions are declared",
                image.schema_version,
                schema.latest()
            )));
        }

        let mut state = EngineState {
            version: image.schema_version,
            stores: BTreeMap::new(),
        };

        // Lay the stores out as declared at the loaded version, then replay
        // the persisted rows into them.
        if let Some(current) = schema.declaration(state.version) {
            for spec in &current.stores {
                state.stores.entry(spec.name.clone()).or_default();
            }
        }
        for (store_name, id, doc) in image.records {
            let data = state.stores.get_mut(&store_name).ok_or_else(|| {
                StoreError::schema(format!(
                    "backend contains records for undeclared store '{store_name}'"
                ))
            })?;
            data.records.insert(id, doc);
        }

        // Rebuild the already-declared indexes over the replayed rows; a
        // unique index that fails to build means corrupted data.
        if let Some(current) = schema.declaration(state.version) {
            apply_version(&mut state, current)?;
        }

        // Startup barrier: run each pending version in order and record it
        // durably before admitting any transactional operation.
        for version in schema.pending(state.version)? {
            apply_version(&mut state, version)?;
            state.version = version.version;
            backend
                .persist(&CommitBatch {
                    schema_version: Some(version.version),
                    ..CommitBatch::default()
                })
                .map_err(|e| {
                    StoreError::schema(format!("recording version {} failed: {e}", version.version))
                })?;
            info!(version = version.version, "schema version applied");
        }

        Ok(Self {
            state: RwLock::new(state),
            backend,
        })
    }

    fn state(&self) -> Result<RwLockReadGuard<'_, EngineState>, StoreError> {
        self.state
            .read()
            .map_err(|_| StoreError::backend("store lock poisoned"))
    }

    /// Consistent read snapshot; holds a shared lock for its lifetime.
    pub fn read(&self) -> Result<ReadTxn<'_>, StoreError> {
        Ok(ReadTxn {
            state: self.state()?,
        })
    }

    /// Exclusive write transaction over exactly the named stores.
    pub fn write(&self, scope: &[&str]) -> Result<WriteTxn<'_>, StoreError> {
        let guard = self
            .state
            .write()
            .map_err(|_| StoreError::backend("store lock poisoned"))?;
        for name in scope {
            if !guard.stores.contains_key(*name) {
                return Err(StoreError::UnknownStore((*name).to_string()));
            }
        }
        Ok(WriteTxn::new(guard, self.backend.as_ref(), scope))
    }

    /// Schema version the store is currently at.
    pub fn schema_version(&self) -> Result<u32, StoreError> {
        Ok(self.state()?.version)
    }

    /// Names of all stores in the current layout.
    pub fn store_names(&self) -> Result<Vec<String>, StoreError> {
        Ok(self.state()?.stores.keys().cloned().collect())
    }

    /// Declared index names on one store.
    pub fn index_names(&self, store: &str) -> Result<Vec<String>, StoreError> {
        let state = self.state()?;
        let data = state
            .stores
            .get(store)
            .ok_or_else(|| StoreError::UnknownStore(store.to_string()))?;
        Ok(data.indexes.keys().cloned().collect())
    }

    pub fn get<R: Record>(&self, id: RecordId) -> Result<Option<R>, StoreError> {
        self.read()?.get(id)
    }

    pub fn find<R: Record>(&self, index: &str, key: &[IndexKey]) -> Result<Vec<R>, StoreError> {
        self.read()?.find(index, key)
    }

    pub fn find_unique<R: Record>(
        &self,
        index: &str,
        key: &[IndexKey],
    ) -> Result<Option<R>, StoreError> {
        self.read()?.find_unique(index, key)
    }

    pub fn list<R: Record>(&self) -> Result<Vec<R>, StoreError> {
        self.read()?.list()
    }

    pub fn count(&self, store: &str) -> Result<usize, StoreError> {
        self.read()?.count(store)
    }

    pub fn count_matching(
        &self,
        store: &str,
        index: &str,
        key: &[IndexKey],
    ) -> Result<usize, StoreError> {
        self.read()?.count_matching(store, index, key)
    }
}

impl core::fmt::Debug for Store {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Store").finish_non_exhaustive()
    }
}

/// Consistent read snapshot over the whole store.
pub struct ReadTxn<'a> {
    state: RwLockReadGuard<'a, EngineState>,
}

impl ReadTxn<'_> {
    fn store_data(&self, name: &str) -> Result<&StoreData, StoreError> {
        self.state
            .stores
            .get(name)
            .ok_or_else(|| StoreError::UnknownStore(name.to_string()))
    }

    pub fn get<R: Record>(&self, id: RecordId) -> Result<Option<R>, StoreError> {
        let data = self.store_data(R::STORE)?;
        data.records.get(&id).map(|doc| decode(doc)).transpose()
    }

    pub fn find<R: Record>(&self, index: &str, key: &[IndexKey]) -> Result<Vec<R>, StoreError> {
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

    pub fn list<R: Record>(&self) -> Result<Vec<R>, StoreError> {
        let data = self.store_data(R::STORE)?;
        data.records.values().map(|doc| decode(doc)).collect()
    }

    pub fn count(&self, store: &str) -> Result<usize, StoreError> {
        Ok(self.store_data(store)?.records.len())
    }

    /// Rows in `store` whose `index` key equals `key`, counted without
    /// knowing the record type. Lets one service check for references held
    /// in another service's store.
    pub fn count_matching(
        &self,
        store: &str,
        index: &str,
        key: &[IndexKey],
    ) -> Result<usize, StoreError> {
        let data = self.store_data(store)?;
        let idx = data.indexes.get(index).ok_or_else(|| StoreError::UnknownIndex {
            store: store.to_string(),
            index: index.to_string(),
        })?;
        Ok(idx.entries.get(key).map_or(0, BTreeSet::len))
    }
}

/// Bring `state` to `version`'s layout: create missing stores and
/// (re)build every declared index from the rows on hand.
fn apply_version(state: &mut EngineState, version: &SchemaVersion) -> Result<(), StoreError> {
    for spec in &version.stores {
        let data = state.stores.entry(spec.name.clone()).or_default();
        for index in &spec.indexes {
            let built = build_index(&spec.name, &data.records, index).map_err(|e| match e {
                StoreError::SchemaUpgrade(_) => e,
                other => StoreError::schema(format!(
                    "building index '{}.{}' for version {}: {other}",
                    spec.name, index.name, version.version
                )),
            })?;
            data.indexes.insert(index.name.clone(), built);
        }
    }
    Ok(())
}

fn build_index(
    store: &str,
    records: &BTreeMap<RecordId, JsonValue>,
    spec: &IndexSpec,
) -> Result<IndexData, StoreError> {
    let mut data = IndexData {
        key: spec.key.clone(),
        unique: spec.unique,
        entries: BTreeMap::new(),
    };

    for (id, doc) in records {
        let key = extract_key(doc, &data.key);
        if key.iter().any(IndexKey::is_absent) {
            continue;
        }
        let slot = data.entries.entry(key.clone()).or_default();
        if data.unique && !slot.is_empty() && !slot.contains(id) {
            return Err(StoreError::UniquenessViolation {
                store: store.to_string(),
                index: spec.name.clone(),
                key: format_key(&key),
            });
        }
        slot.insert(*id);
    }
    Ok(data)
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};

    use serde::{Deserialize, Serialize};

    use crate::backend::{BackendImage, MemoryBackend};
    use crate::schema::StoreSpec;

    use super::*;

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    struct Gadget {
        id: RecordId,
        name: String,
        size: i64,
        tag: Option<String>,
    }

    impl Record for Gadget {
        const STORE: &'static str = "gadgets";

        fn id(&self) -> RecordId {
            self.id
        }
    }

    fn gadget(name: &str, size: i64, tag: Option<&str>) -> Gadget {
        Gadget {
            id: stockbook_core::IdGenerator::new().next_id(),
            name: name.to_string(),
            size,
            tag: tag.map(|t| t.to_string()),
        }
    }

    fn gadget_store(indexes: Vec<IndexSpec>) -> StoreSpec {
        let mut spec = StoreSpec::new(Gadget::STORE);
        spec.indexes = indexes;
        spec
    }

    fn v1() -> SchemaVersion {
        SchemaVersion::new(
            1,
            vec![gadget_store(vec![
                IndexSpec::new("name", &["name"]),
                IndexSpec::unique("tag", &["tag"]),
            ])],
        )
    }

    fn v2() -> SchemaVersion {
        SchemaVersion::new(
            2,
            vec![gadget_store(vec![
                IndexSpec::new("name", &["name"]),
                IndexSpec::unique("tag", &["tag"]),
                IndexSpec::new("size", &["size"]),
            ])],
        )
    }

    fn v3() -> SchemaVersion {
        let mut redeclared = v2();
        redeclared.version = 3;
        redeclared
    }

    fn open_memory(versions: Vec<SchemaVersion>) -> Store {
        Store::open(
            Box::new(MemoryBackend::new()),
            SchemaManager::new(versions).unwrap(),
        )
        .unwrap()
    }

    /// Backend whose contents survive reopen, for migration tests.
    #[derive(Clone, Default)]
    struct SharedBackend {
        inner: Arc<Mutex<SharedState>>,
    }

    #[derive(Default)]
    struct SharedState {
        version: u32,
        records: BTreeMap<(String, RecordId), JsonValue>,
    }

    impl StoreBackend for SharedBackend {
        fn load(&self) -> Result<BackendImage, StoreError> {
            let state = self.inner.lock().unwrap();
            Ok(BackendImage {
                schema_version: state.version,
                records: state
                    .records
                    .iter()
                    .map(|((store, id), doc)| (store.clone(), *id, doc.clone()))
                    .collect(),
            })
        }

        fn persist(&self, batch: &CommitBatch) -> Result<(), StoreError> {
            let mut state = self.inner.lock().unwrap();
            if let Some(version) = batch.schema_version {
                state.version = version;
            }
            for (store, id, doc) in &batch.puts {
                state.records.insert((store.clone(), *id), doc.clone());
            }
            for (store, id) in &batch.deletes {
                state.records.remove(&(store.clone(), *id));
            }
            Ok(())
        }
    }

    #[test]
    fn open_builds_declared_stores_and_indexes() {
        let store = open_memory(vec![v1()]);

        assert_eq!(store.schema_version().unwrap(), 1);
        assert_eq!(store.store_names().unwrap(), vec!["gadgets".to_string()]);
        assert_eq!(
            store.index_names("gadgets").unwrap(),
            vec!["name".to_string(), "tag".to_string()]
        );
    }

    #[test]
    fn insert_then_query_by_index() {
        let store = open_memory(vec![v1()]);
        let small = gadget("clamp", 2, Some("c-1"));
        let large = gadget("clamp", 9, Some("c-2"));

        let mut txn = store.write(&[Gadget::STORE]).unwrap();
        txn.insert(&small).unwrap();
        txn.insert(&large).unwrap();
        txn.commit().unwrap();

        let by_name: Vec<Gadget> = store.find("name", &[IndexKey::text("clamp")]).unwrap();
        assert_eq!(by_name.len(), 2);

        let by_tag: Option<Gadget> = store
            .find_unique("tag", &[IndexKey::text("c-2")])
            .unwrap();
        assert_eq!(by_tag.unwrap().size, 9);
    }

    #[test]
    fn rows_with_absent_key_components_stay_out_of_the_index() {
        let store = open_memory(vec![v1()]);
        let untagged = gadget("loose", 1, None);

        let mut txn = store.write(&[Gadget::STORE]).unwrap();
        txn.insert(&untagged).unwrap();
        txn.commit().unwrap();

        // Not reachable through the tag index, still reachable by id.
        assert!(store
            .find::<Gadget>("tag", &[IndexKey::Absent])
            .unwrap()
            .is_empty());
        assert!(store.get::<Gadget>(untagged.id).unwrap().is_some());
    }

    #[test]
    fn unknown_store_and_index_are_errors() {
        let store = open_memory(vec![v1()]);

        assert!(matches!(
            store.count("nonexistent").unwrap_err(),
            StoreError::UnknownStore(_)
        ));
        assert!(matches!(
            store.find::<Gadget>("nope", &[IndexKey::int(1)]).unwrap_err(),
            StoreError::UnknownIndex { .. }
        ));
    }

    #[test]
    fn sequential_and_direct_migrations_agree() {
        let backend = SharedBackend::default();

        // Write data at version 1.
        {
            let store = Store::open(
                Box::new(backend.clone()),
                SchemaManager::new(vec![v1()]).unwrap(),
            )
            .unwrap();
            let mut txn = store.write(&[Gadget::STORE]).unwrap();
            txn.insert(&gadget("vice", 4, Some("v-1"))).unwrap();
            txn.insert(&gadget("anvil", 40, Some("a-1"))).unwrap();
            txn.commit().unwrap();
        }

        // Step through v2 then v3.
        let stepped = backend.clone();
        {
            let store = Store::open(
                Box::new(stepped.clone()),
                SchemaManager::new(vec![v1(), v2()]).unwrap(),
            )
            .unwrap();
            assert_eq!(store.schema_version().unwrap(), 2);
        }
        let stepped_store = Store::open(
            Box::new(stepped.clone()),
            SchemaManager::new(vec![v1(), v2(), v3()]).unwrap(),
        )
        .unwrap();

        // Same starting data, jumped straight to v3.
        let direct = SharedBackend::default();
        {
            let store = Store::open(
                Box::new(direct.clone()),
                SchemaManager::new(vec![v1()]).unwrap(),
            )
            .unwrap();
            let mut txn = store.write(&[Gadget::STORE]).unwrap();
            txn.insert(&gadget("vice", 4, Some("v-1"))).unwrap();
            txn.insert(&gadget("anvil", 40, Some("a-1"))).unwrap();
            txn.commit().unwrap();
        }
        let direct_store = Store::open(
            Box::new(direct.clone()),
            SchemaManager::new(vec![v1(), v2(), v3()]).unwrap(),
        )
        .unwrap();

        assert_eq!(stepped_store.schema_version().unwrap(), 3);
        assert_eq!(direct_store.schema_version().unwrap(), 3);
        assert_eq!(
            stepped_store.index_names("gadgets").unwrap(),
            direct_store.index_names("gadgets").unwrap()
        );
        assert_eq!(stepped_store.count("gadgets").unwrap(), 2);
        assert_eq!(direct_store.count("gadgets").unwrap(), 2);

        // The v2 index answers queries after both paths.
        let by_size: Vec<Gadget> = stepped_store.find("size", &[IndexKey::int(40)]).unwrap();
        assert_eq!(by_size.len(), 1);
        assert_eq!(by_size[0].name, "anvil");
    }

    #[test]
    fn reopening_past_the_declared_versions_is_fatal() {
        let backend = SharedBackend::default();
        {
            Store::open(
                Box::new(backend.clone()),
                SchemaManager::new(vec![v1(), v2()]).unwrap(),
            )
            .unwrap();
        }

        let err = Store::open(
            Box::new(backend),
            SchemaManager::new(vec![v1()]).unwrap(),
        )
        .unwrap_err();
        assert!(matches!(err, StoreError::SchemaUpgrade(_)));
    }

    #[test]
    fn duplicate_unique_values_in_persisted_rows_abort_the_open() {
        let backend = SharedBackend::default();
        {
            let store = Store::open(
                Box::new(backend.clone()),
                SchemaManager::new(vec![v1()]).unwrap(),
            )
            .unwrap();
            let mut txn = store.write(&[Gadget::STORE]).unwrap();
            txn.insert(&gadget("vice", 4, Some("dup"))).unwrap();
            txn.commit().unwrap();
        }

        // Corrupt the backend behind the engine's back.
        {
            let mut state = backend.inner.lock().unwrap();
            let rogue = gadget("vice-copy", 5, Some("dup"));
            state.records.insert(
                ("gadgets".to_string(), rogue.id),
                serde_json::to_value(&rogue).unwrap(),
            );
        }

        let err = Store::open(
            Box::new(backend),
            SchemaManager::new(vec![v1()]).unwrap(),
        )
        .unwrap_err();
        assert!(matches!(err, StoreError::SchemaUpgrade(_)));
    }
}
