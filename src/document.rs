//! The wire form of a model: an ordered mapping from field name to value.
//!
//! Documents are what the store actually reads and writes. A document never
//! contains the model key or revision as plain attributes (they live in the
//! `_key`/`_rev` system fields) and never contains relation-backed
//! attributes, which are represented as graph edges instead.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// System field holding the document key.
pub const KEY_FIELD: &str = "_key";

/// System field holding the document revision.
pub const REV_FIELD: &str = "_rev";

/// System field holding the full graph id (`collection/key`).
pub const ID_FIELD: &str = "_id";

/// System field holding an edge's source vertex id.
pub const FROM_FIELD: &str = "_from";

/// System field holding an edge's target vertex id.
pub const TO_FIELD: &str = "_to";

/// Edge attribute used to recover the original map key of a keyed relation.
pub const HASH_KEY_FIELD: &str = "hash_key";

/// Build the graph id of a document from its collection and key.
pub fn graph_id(collection: &str, key: &str) -> String {
    format!("{collection}/{key}")
}

/// Split a graph id into its collection and key parts.
pub fn split_graph_id(id: &str) -> Option<(&str, &str)> {
    id.split_once('/')
}

/// An ordered field/value mapping.
///
/// Field order is preserved (`serde_json` with `preserve_order`), so a
/// document round-trips through the store without reshuffling.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Document {
    fields: Map<String, Value>,
}

impl Document {
    /// Creates an empty document.
    pub fn new() -> Self {
        Self { fields: Map::new() }
    }

    /// Sets a field, replacing any previous value.
    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<Value>) {
        self.fields.insert(name.into(), value.into());
    }

    /// Returns the value of a field, if present.
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.fields.get(name)
    }

    /// Returns a field as a string slice, if present and a string.
    pub fn get_str(&self, name: &str) -> Option<&str> {
        self.fields.get(name).and_then(Value::as_str)
    }

    /// Removes a field, returning its previous value.
    pub fn remove(&mut self, name: &str) -> Option<Value> {
        self.fields.remove(name)
    }

    /// True if the field is present.
    pub fn contains(&self, name: &str) -> bool {
        self.fields.contains_key(name)
    }

    /// Iterates over fields in document order.
    pub fn iter(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.fields.iter()
    }

    /// Number of fields.
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    /// True if the document has no fields.
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// The document key (`_key`), if present.
    pub fn key(&self) -> Option<&str> {
        self.get_str(KEY_FIELD)
    }

    /// The document revision (`_rev`), if present.
    pub fn rev(&self) -> Option<&str> {
        self.get_str(REV_FIELD)
    }

    /// A copy of this document with all system fields removed.
    pub fn without_system_fields(&self) -> Document {
        let fields = self
            .fields
            .iter()
            .filter(|(name, _)| {
                !matches!(name.as_str(), KEY_FIELD | REV_FIELD | ID_FIELD | FROM_FIELD | TO_FIELD)
            })
            .map(|(name, value)| (name.clone(), value.clone()))
            .collect();
        Self { fields }
    }

    /// A copy of this document with every field of `other` set on top.
    pub fn merged(&self, other: &Document) -> Document {
        let mut merged = self.clone();
        for (name, value) in other.iter() {
            merged.insert(name.clone(), value.clone());
        }
        merged
    }

    /// The document as a JSON value.
    pub fn to_value(&self) -> Value {
        Value::Object(self.fields.clone())
    }
}

impl From<Map<String, Value>> for Document {
    fn from(fields: Map<String, Value>) -> Self {
        Self { fields }
    }
}

impl FromIterator<(String, Value)> for Document {
    fn from_iter<I: IntoIterator<Item = (String, Value)>>(iter: I) -> Self {
        Self {
            fields: iter.into_iter().collect(),
        }
    }
}
