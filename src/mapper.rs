//! Document/model translation and relation metadata.
//!
//! A [`Mapper`] owns the declared [`Attribute`] list of one model type and
//! translates both ways between the stored document and the in-memory
//! model. Relation-backed attributes are never embedded in documents: on
//! the way in they become lazy proxies, on the way out they are stripped
//! and handled by the transaction builder as edges.

use std::collections::HashSet;
use std::hash::{Hash, Hasher};

use serde_json::Value;

use crate::context::GraphContext;
use crate::document::{Document, ID_FIELD, KEY_FIELD, REV_FIELD};
use crate::edge_collection::EdgeType;
use crate::error::{GraphError, Result};
use crate::model::{Model, ModelRef, ModelType, RelationValue};
use crate::proxy::{ProxyVariant, RelationProxy, RelationTarget};

/// Declared multiplicity of an attribute.
///
/// Disambiguates relation shape when proxies are attached: a keyed map
/// resolves as a Hash proxy, an ordered collection as an Array proxy, a
/// scalar as a Single proxy.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AttributeShape {
    Scalar,
    List,
    Map,
}

/// Metadata for one model attribute.
///
/// Two attributes are equal iff their names match.
#[derive(Clone, Debug)]
pub struct Attribute {
    name: String,
    shape: AttributeShape,
    via_edge: Option<EdgeType>,
    inverse: bool,
}

impl Attribute {
    /// A plain attribute with no relation backing.
    pub fn new(name: impl Into<String>, shape: AttributeShape) -> Self {
        Self {
            name: name.into(),
            shape,
            via_edge: None,
            inverse: false,
        }
    }

    /// An attribute backed by a graph edge relation.
    pub fn via(name: impl Into<String>, shape: AttributeShape, edge_type: EdgeType) -> Self {
        Self {
            name: name.into(),
            shape,
            via_edge: Some(edge_type),
            inverse: false,
        }
    }

    /// An edge-backed attribute traversed against the edge direction.
    pub fn via_inverse(name: impl Into<String>, shape: AttributeShape, edge_type: EdgeType) -> Self {
        Self {
            inverse: true,
            ..Self::via(name, shape, edge_type)
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// The declared multiplicity.
    pub fn shape(&self) -> AttributeShape {
        self.shape
    }

    /// The edge type backing this attribute, if any.
    pub fn edge_type(&self) -> Option<EdgeType> {
        self.via_edge
    }

    pub fn is_inverse(&self) -> bool {
        self.inverse
    }

    /// Should this attribute be persisted as edges in the graph?
    pub fn maps_via_edge(&self) -> bool {
        self.via_edge.is_some()
    }

    /// The attribute's current relation value, fully materialized.
    ///
    /// An unresolved proxy is resolved through the context; an unset slot
    /// materializes as the empty value of the declared shape.
    pub fn get_value(&self, ctx: &GraphContext, model: &ModelRef) -> Result<RelationTarget> {
        let guard = model.borrow();
        match guard.relation(&self.name) {
            None => Ok(RelationTarget::empty(self.shape)),
            Some(RelationValue::Target(target)) => Ok(target.clone()),
            Some(RelationValue::Proxy(proxy)) => proxy.resolve(ctx),
        }
    }
}

impl PartialEq for Attribute {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name
    }
}

impl Eq for Attribute {}

impl Hash for Attribute {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.name.hash(state);
    }
}

/// Translates between stored documents and model instances of one type.
#[derive(Debug)]
pub struct Mapper {
    model_type: ModelType,
    attributes: Vec<Attribute>,
    models_to_embed: Vec<String>,
}

impl Mapper {
    pub fn new(model_type: ModelType) -> Self {
        Self {
            model_type,
            attributes: Vec::new(),
            models_to_embed: Vec::new(),
        }
    }

    /// Declares a plain attribute.
    pub fn attribute(mut self, name: impl Into<String>, shape: AttributeShape) -> Self {
        self.attributes.push(Attribute::new(name, shape));
        self
    }

    /// Declares an attribute backed by a graph edge relation.
    pub fn relation(
        mut self,
        name: impl Into<String>,
        shape: AttributeShape,
        edge_type: EdgeType,
    ) -> Self {
        self.attributes.push(Attribute::via(name, shape, edge_type));
        self
    }

    /// Declares an edge-backed attribute traversed against the edge direction.
    pub fn inverse_relation(
        mut self,
        name: impl Into<String>,
        shape: AttributeShape,
        edge_type: EdgeType,
    ) -> Self {
        self.attributes
            .push(Attribute::via_inverse(name, shape, edge_type));
        self
    }

    /// Declares an attribute whose value embeds a collection of models.
    ///
    /// Embedded models are stored inline as an array of their own
    /// attributes, stripped of key and revision.
    pub fn embeds(mut self, name: impl Into<String>) -> Self {
        self.models_to_embed.push(name.into());
        self
    }

    pub fn model_type(&self) -> ModelType {
        self.model_type
    }

    pub fn attributes(&self) -> &[Attribute] {
        &self.attributes
    }

    /// The declared attributes that are backed by an edge relation.
    pub fn edge_attributes(&self) -> impl Iterator<Item = &Attribute> {
        self.attributes.iter().filter(|a| a.maps_via_edge())
    }

    /// True if at least one attribute maps via an edge.
    pub fn has_edge_attributes(&self) -> bool {
        self.edge_attributes().next().is_some()
    }

    pub fn models_to_embed(&self) -> &[String] {
        &self.models_to_embed
    }

    /// Is this mapper the one for the given model?
    pub fn responsible_for(&self, model: &Model) -> bool {
        model.model_type() == self.model_type
    }

    /// Maps a document to a model.
    ///
    /// The instance comes out of the context's identity map: mapping the
    /// same key twice within one unit of work yields the identical model.
    /// Relation-backed attributes are attached as unresolved proxies, which
    /// is what lets cyclic relations map without recursing forever.
    pub fn document_to_model(&self, ctx: &GraphContext, document: &Document) -> Result<ModelRef> {
        let key = document.key().ok_or(GraphError::MissingKey {
            model_type: self.model_type,
        })?;
        let rev = document.rev().map(str::to_string);

        ctx.identity_map().retrieve_or_store(self.model_type, key, || {
            let relation_names: HashSet<&str> =
                self.edge_attributes().map(Attribute::name).collect();

            let mut model = Model::new(self.model_type);
            for (name, value) in document.iter() {
                if matches!(name.as_str(), KEY_FIELD | REV_FIELD | ID_FIELD) {
                    continue;
                }
                if relation_names.contains(name.as_str()) {
                    continue;
                }
                model.set_attribute(name.clone(), value.clone());
            }
            model.set_key(key);
            if let Some(rev) = &rev {
                model.set_rev(rev.clone());
            }

            for attribute in self.edge_attributes() {
                if let Some(edge_type) = attribute.edge_type() {
                    let variant = match attribute.shape() {
                        AttributeShape::Map => ProxyVariant::Hash,
                        AttributeShape::List => ProxyVariant::Array,
                        AttributeShape::Scalar => ProxyVariant::Single,
                    };
                    model.set_relation(
                        attribute.name().to_string(),
                        RelationValue::Proxy(RelationProxy::new(
                            self.model_type,
                            key,
                            edge_type,
                            variant,
                            attribute.is_inverse(),
                        )),
                    );
                }
            }

            Ok(model.into_ref())
        })
    }

    /// Maps a model to its document.
    ///
    /// Copies all attributes except key and revision, inlines embedded
    /// collections stripped of key/revision, and removes every
    /// relation-backed attribute (relations exist only as edges).
    pub fn model_to_document(&self, model: &Model) -> Document {
        let mut document = model.attributes().clone();
        document.remove(KEY_FIELD);
        document.remove(REV_FIELD);

        for name in &self.models_to_embed {
            if let Some(Value::Array(items)) = document.get(name).cloned() {
                let stripped: Vec<Value> = items
                    .into_iter()
                    .map(|item| match item {
                        Value::Object(mut fields) => {
                            fields.remove(KEY_FIELD);
                            fields.remove(REV_FIELD);
                            Value::Object(fields)
                        }
                        other => other,
                    })
                    .collect();
                document.insert(name.clone(), Value::Array(stripped));
            }
        }

        for attribute in self.attributes.iter().filter(|a| a.maps_via_edge()) {
            document.remove(attribute.name());
        }

        document
    }
}
