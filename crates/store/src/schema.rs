//! Schema versions and the migration pipeline.
//!
//! A [`SchemaVersion`] declares the full store layout at that version
//! (stores and their secondary indexes). Versions are cumulative: a later
//! version repeats everything the previous one declared, plus its additions.
//! [`SchemaManager`] validates the sequence up front; applying happens inside
//! `Store::open`, one pending version at a time, each recorded durably.

use crate::error::StoreError;

/// Declared secondary index: a name, the document fields forming its key,
/// and whether the key must be unique across the store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexSpec {
    pub name: String,
    pub key: Vec<String>,
    pub unique: bool,
}

impl IndexSpec {
    pub fn new(name: &str, key: &[&str]) -> Self {
        Self {
            name: name.to_string(),
            key: key.iter().map(|f| (*f).to_string()).collect(),
            unique: false,
        }
    }

    pub fn unique(name: &str, key: &[&str]) -> Self {
        Self {
            unique: true,
            ..Self::new(name, key)
        }
    }
}

/// Declared store with its secondary indexes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreSpec {
    pub name: String,
    pub indexes: Vec<IndexSpec>,
}

impl StoreSpec {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            indexes: Vec::new(),
        }
    }

    pub fn with_index(mut self, index: IndexSpec) -> Self {
        self.indexes.push(index);
        self
    }
}

/// The full layout at one schema version.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SchemaVersion {
    pub version: u32,
    pub stores: Vec<StoreSpec>,
}

impl SchemaVersion {
    pub fn new(version: u32, stores: Vec<StoreSpec>) -> Self {
        Self { version, stores }
    }
}

/// Ordered, validated sequence of schema versions.
///
/// Construction rejects a bad pipeline outright: versions must run
/// contiguously from 1, and each successor must keep every store and index
/// of its predecessor unchanged (re-declaring an index identically is how a
/// version forces a rebuild; redefining or dropping one would be a
/// destructive change and needs an explicit migration step instead).
#[derive(Debug, Clone)]
pub struct SchemaManager {
    versions: Vec<SchemaVersion>,
}

impl SchemaManager {
    pub fn new(versions: Vec<SchemaVersion>) -> Result<Self, StoreError> {
        if versions.is_empty() {
            return Err(StoreError::schema("no schema versions declared"));
        }

        for (position, declared) in versions.iter().enumerate() {
            let expected = position as u32 + 1;
            if declared.version != expected {
                return Err(StoreError::schema(format!(
                    "versions must be contiguous from 1: found {} where {} was expected",
                    declared.version, expected
                )));
            }
            Self::ensure_distinct_names(declared)?;
        }

        for pair in versions.windows(2) {
            Self::ensure_additive(&pair[0], &pair[1])?;
        }

        Ok(Self { versions })
    }

    /// Highest declared version.
    pub fn latest(&self) -> u32 {
        self.versions.len() as u32
    }

    /// Layout declared at `version`, if any (`0` means "nothing applied yet").
    pub(crate) fn declaration(&self, version: u32) -> Option<&SchemaVersion> {
        if version == 0 {
            return None;
        }
        self.versions.get(version as usize - 1)
    }

    /// Versions still to apply when the store is at `current`.
    pub(crate) fn pending(&self, current: u32) -> Result<&[SchemaVersion], StoreError> {
        if current > self.latest() {
            return Err(StoreError::schema(format!(
                "store is at version {} but only {} versions are declared",
                current,
                self.latest()
            )));
        }
        Ok(&self.versions[current as usize..])
    }

    fn ensure_distinct_names(version: &SchemaVersion) -> Result<(), StoreError> {
        for (i, store) in version.stores.iter().enumerate() {
            if version.stores[..i].iter().any(|s| s.name == store.name) {
                return Err(StoreError::schema(format!(
                    "version {} declares store '{}' twice",
                    version.version, store.name
                )));
            }
            for (j, index) in store.indexes.iter().enumerate() {
                if store.indexes[..j].iter().any(|x| x.name == index.name) {
                    return Err(StoreError::schema(format!(
                        "version {} declares index '{}.{}' twice",
                        version.version, store.name, index.name
                    )));
                }
            }
        }
        Ok(())
    }

    fn ensure_additive(prev: &SchemaVersion, next: &SchemaVersion) -> Result<(), StoreError> {
        for store in &prev.stores {
            let Some(successor) = next.stores.iter().find(|s| s.name == store.name) else {
                return Err(StoreError::schema(format!(
                    "version {} drops store '{}'",
                    next.version, store.name
                )));
            };

            for index in &store.indexes {
                match successor.indexes.iter().find(|x| x.name == index.name) {
                    None => {
                        return Err(StoreError::schema(format!(
                            "version {} drops index '{}.{}'",
                            next.version, store.name, index.name
                        )));
                    }
                    Some(redeclared)
                        if redeclared.key != index.key || redeclared.unique != index.unique =>
                    {
                        return Err(StoreError::schema(format!(
                            "version {} redefines index '{}.{}'; a destructive change needs its own migration step",
                            next.version, store.name, index.name
                        )));
                    }
                    Some(_) => {}
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn one_store(version: u32, indexes: Vec<IndexSpec>) -> SchemaVersion {
        let mut spec = StoreSpec::new("things");
        spec.indexes = indexes;
        SchemaVersion::new(version, vec![spec])
    }

    #[test]
    fn versions_must_start_at_one_and_stay_contiguous() {
        let err = SchemaManager::new(vec![one_store(2, vec![])]).unwrap_err();
        assert!(matches!(err, StoreError::SchemaUpgrade(_)));

        let err = SchemaManager::new(vec![one_store(1, vec![]), one_store(3, vec![])]).unwrap_err();
        assert!(matches!(err, StoreError::SchemaUpgrade(_)));
    }

    #[test]
    fn empty_pipeline_is_rejected() {
        assert!(matches!(
            SchemaManager::new(vec![]).unwrap_err(),
            StoreError::SchemaUpgrade(_)
        ));
    }

    #[test]
    fn dropping_a_store_or_index_is_rejected() {
        let v1 = SchemaVersion::new(
            1,
            vec![StoreSpec::new("things").with_index(IndexSpec::new("name", &["name"]))],
        );
        let v2_drops_index = SchemaVersion::new(2, vec![StoreSpec::new("things")]);
        let err = SchemaManager::new(vec![v1.clone(), v2_drops_index]).unwrap_err();
        assert!(err.to_string().contains("drops index"));

        let v2_drops_store = SchemaVersion::new(2, vec![StoreSpec::new("others")]);
        let err = SchemaManager::new(vec![v1, v2_drops_store]).unwrap_err();
        assert!(err.to_string().contains("drops store"));
    }

    #[test]
    fn redefining_an_index_is_rejected() {
        let v1 = one_store(1, vec![IndexSpec::new("name", &["name"])]);
        let v2 = one_store(2, vec![IndexSpec::unique("name", &["name"])]);

        let err = SchemaManager::new(vec![v1, v2]).unwrap_err();
        assert!(err.to_string().contains("redefines index"));
    }

    #[test]
    fn identical_redeclaration_is_additive() {
        let index = IndexSpec::new("name", &["name"]);
        let v1 = one_store(1, vec![index.clone()]);
        let v2 = one_store(2, vec![index.clone(), IndexSpec::new("size", &["size"])]);
        let v3 = one_store(3, vec![index, IndexSpec::new("size", &["size"])]);

        let manager = SchemaManager::new(vec![v1, v2, v3]).unwrap();
        assert_eq!(manager.latest(), 3);
    }

    #[test]
    fn pending_lists_only_unapplied_versions() {
        let manager =
            SchemaManager::new(vec![one_store(1, vec![]), one_store(2, vec![])]).unwrap();

        assert_eq!(manager.pending(0).unwrap().len(), 2);
        assert_eq!(manager.pending(1).unwrap().len(), 1);
        assert_eq!(manager.pending(2).unwrap().len(), 0);
        assert!(manager.pending(3).is_err());
    }
}
