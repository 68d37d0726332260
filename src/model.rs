//! Dynamic model values and their relation slots.
//!
//! A [`Model`] is a domain object identified by a runtime [`ModelType`] tag.
//! Plain attributes live in an ordered [`Document`]; relation-backed
//! attributes live in separate slots holding either an unresolved
//! [`RelationProxy`](crate::proxy::RelationProxy) or an already materialized
//! [`RelationTarget`](crate::proxy::RelationTarget).
//!
//! Models are shared within one unit of work as `Rc<RefCell<Model>>`
//! ([`ModelRef`]): the mapping layer assumes single-threaded use per unit
//! of work, and the identity map hands out the same instance for the same
//! persisted key.
//!
//! Every model carries a process-unique `instance_id` assigned at
//! construction. It stands in for the persisted graph id while a model has
//! not been saved yet, so edges between brand-new vertices can be expressed
//! before the store has assigned real ids.

use std::cell::RefCell;
use std::collections::BTreeMap;
use std::fmt;
use std::rc::Rc;
use std::sync::atomic::{AtomicU64, Ordering};

use serde_json::Value;

use crate::document::Document;
use crate::proxy::{RelationProxy, RelationTarget};

static NEXT_INSTANCE_ID: AtomicU64 = AtomicU64::new(1);

/// Runtime type tag of a model. Two tags are equal iff their names match.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ModelType(pub &'static str);

impl ModelType {
    /// The type name.
    pub fn name(&self) -> &'static str {
        self.0
    }
}

impl fmt::Display for ModelType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.0)
    }
}

/// A shared, interior-mutable handle to a model.
pub type ModelRef = Rc<RefCell<Model>>;

/// The value of a relation-backed attribute.
pub enum RelationValue {
    /// Not yet materialized; resolves through the edge collection on first use.
    Proxy(RelationProxy),
    /// A concrete relation value, set by application code or by resolution.
    Target(RelationTarget),
}

impl RelationValue {
    /// A scalar relation pointing at one model (or none).
    pub fn single(model: Option<ModelRef>) -> Self {
        Self::Target(RelationTarget::Single(model))
    }

    /// An ordered relation over several models.
    pub fn list(models: Vec<ModelRef>) -> Self {
        Self::Target(RelationTarget::List(models))
    }

    /// A keyed relation mapping strings to models.
    pub fn map(models: BTreeMap<String, ModelRef>) -> Self {
        Self::Target(RelationTarget::Map(models))
    }
}

impl fmt::Debug for RelationValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Proxy(proxy) if proxy.is_resolved() => f.write_str("Proxy(resolved)"),
            Self::Proxy(_) => f.write_str("Proxy(unresolved)"),
            Self::Target(target) => write!(f, "Target(len {})", target.len()),
        }
    }
}

/// A domain object with a key (once persisted), a revision marker, plain
/// attributes, and relation slots.
pub struct Model {
    model_type: ModelType,
    instance_id: u64,
    key: Option<String>,
    rev: Option<String>,
    attributes: Document,
    relations: BTreeMap<String, RelationValue>,
}

impl Model {
    /// Creates an empty model of the given type with a fresh instance id.
    pub fn new(model_type: ModelType) -> Self {
        Self {
            model_type,
            instance_id: NEXT_INSTANCE_ID.fetch_add(1, Ordering::Relaxed),
            key: None,
            rev: None,
            attributes: Document::new(),
            relations: BTreeMap::new(),
        }
    }

    /// Creates a model with the given plain attributes.
    pub fn with_attributes(model_type: ModelType, attributes: Document) -> Self {
        let mut model = Self::new(model_type);
        model.attributes = attributes;
        model
    }

    /// Wraps this model in a shared handle.
    pub fn into_ref(self) -> ModelRef {
        Rc::new(RefCell::new(self))
    }

    /// The runtime type tag.
    pub fn model_type(&self) -> ModelType {
        self.model_type
    }

    /// The process-unique instance id (transient edge-endpoint token).
    pub fn instance_id(&self) -> u64 {
        self.instance_id
    }

    /// The persisted key, if the model has been saved.
    pub fn key(&self) -> Option<&str> {
        self.key.as_deref()
    }

    pub fn set_key(&mut self, key: impl Into<String>) {
        self.key = Some(key.into());
    }

    /// True once the model carries a persisted key.
    pub fn is_persisted(&self) -> bool {
        self.key.is_some()
    }

    /// The revision marker, if known.
    pub fn rev(&self) -> Option<&str> {
        self.rev.as_deref()
    }

    pub fn set_rev(&mut self, rev: impl Into<String>) {
        self.rev = Some(rev.into());
    }

    /// The plain attributes (never includes key, revision, or relations).
    pub fn attributes(&self) -> &Document {
        &self.attributes
    }

    /// One plain attribute value.
    pub fn attribute(&self, name: &str) -> Option<&Value> {
        self.attributes.get(name)
    }

    pub fn set_attribute(&mut self, name: impl Into<String>, value: impl Into<Value>) {
        self.attributes.insert(name, value);
    }

    /// The relation slot for an attribute, if one has been set.
    pub fn relation(&self, name: &str) -> Option<&RelationValue> {
        self.relations.get(name)
    }

    /// Replaces a relation slot.
    pub fn set_relation(&mut self, name: impl Into<String>, value: RelationValue) {
        self.relations.insert(name.into(), value);
    }

    /// Names of all relation slots currently set.
    pub fn relation_names(&self) -> impl Iterator<Item = &str> {
        self.relations.keys().map(String::as_str)
    }
}

impl fmt::Debug for Model {
    // Relations are printed by name only: resolved targets can form cycles.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Model")
            .field("model_type", &self.model_type)
            .field("instance_id", &self.instance_id)
            .field("key", &self.key)
            .field("rev", &self.rev)
            .field("attributes", &self.attributes)
            .field("relations", &self.relations.keys().collect::<Vec<_>>())
            .finish()
    }
}
