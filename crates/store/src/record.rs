//! Typed records and index keys.
//!
//! Records are persisted as JSON documents; secondary index keys are
//! extracted from the document by field name, so the schema alone decides
//! what is indexed and record types carry no index code of their own.

use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value as JsonValue;

use stockbook_core::RecordId;

use crate::error::StoreError;

/// A typed record persisted in a named store.
pub trait Record: Serialize + DeserializeOwned {
    /// Name of the store this record lives in.
    const STORE: &'static str;

    /// Primary key.
    fn id(&self) -> RecordId;
}

/// One component of a secondary index key.
///
/// Rows where any component is [`IndexKey::Absent`] (field missing or null)
/// are left out of that index entirely, so optional fields neither pollute
/// lookups nor trip unique constraints.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum IndexKey {
    Absent,
    Int(i64),
    Text(String),
}

impl IndexKey {
    pub fn int(value: i64) -> Self {
        Self::Int(value)
    }

    pub fn text(value: impl Into<String>) -> Self {
        Self::Text(value.into())
    }

    pub fn is_absent(&self) -> bool {
        matches!(self, Self::Absent)
    }

    fn from_json(value: Option<&JsonValue>) -> Self {
        match value {
            None | Some(JsonValue::Null) => Self::Absent,
            Some(JsonValue::Bool(b)) => Self::Int(i64::from(*b)),
            Some(JsonValue::Number(n)) => match n.as_i64() {
                Some(i) => Self::Int(i),
                None => Self::Text(n.to_string()),
            },
            Some(JsonValue::String(s)) => Self::Text(s.clone()),
            Some(other) => Self::Text(other.to_string()),
        }
    }
}

impl core::fmt::Display for IndexKey {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::Absent => f.write_str("null"),
            Self::Int(i) => write!(f, "{i}"),
            Self::Text(s) => f.write_str(s),
        }
    }
}

/// Extract the composite key for `fields` from a serialized record.
pub(crate) fn extract_key(doc: &JsonValue, fields: &[String]) -> Vec<IndexKey> {
    fields.iter().map(|f| IndexKey::from_json(doc.get(f))).collect()
}

/// Human-readable rendering of a composite key for error messages.
pub(crate) fn format_key(key: &[IndexKey]) -> String {
    let parts: Vec<String> = key.iter().map(ToString::to_string).collect();
    parts.join("/")
}

pub(crate) fn encode<R: Record>(record: &R) -> Result<JsonValue, StoreError> {
    serde_json::to_value(record).map_err(StoreError::serialization)
}

pub(crate) fn decode<R: Record>(doc: &JsonValue) -> Result<R, StoreError> {
    serde_json::from_value(doc.clone()).map_err(StoreError::serialization)
}
