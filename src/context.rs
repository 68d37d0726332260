//! The unit-of-work scope.
//!
//! A [`GraphContext`] owns everything one unit of work needs: the store
//! handle, configuration, the vertex-collection registry, the declared edge
//! types, the lazily populated edge-collection registry, and the identity
//! map. Create one per request/operation and drop it at the end; a
//! longer-lived context would keep handing out stale identity-mapped
//! instances.
//!
//! Collections and edge types are declared up front through the builder.
//! Looking up an undeclared edge type is an explicit error; nothing is
//! synthesized at access time.

use std::cell::RefCell;
use std::collections::BTreeMap;
use std::rc::Rc;

use tracing::debug;

use crate::config::Config;
use crate::edge_collection::{
    derive_collection_name, derive_handle_name, EdgeCollection, EdgeType,
};
use crate::error::{GraphError, Result};
use crate::identity_map::IdentityMap;
use crate::mapper::Mapper;
use crate::model::{Model, ModelType};
use crate::store::{EdgeDefinition, Store};

/// A vertex collection: a storage name paired with the mapper for its
/// model type.
#[derive(Debug)]
pub struct Collection {
    name: String,
    mapper: Mapper,
}

impl Collection {
    pub fn new(name: impl Into<String>, mapper: Mapper) -> Self {
        Self {
            name: name.into(),
            mapper,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn mapper(&self) -> &Mapper {
        &self.mapper
    }

    pub fn model_type(&self) -> ModelType {
        self.mapper.model_type()
    }
}

/// Builder for a [`GraphContext`].
pub struct GraphContextBuilder {
    store: Rc<dyn Store>,
    config: Config,
    collections: Vec<Collection>,
    edge_types: Vec<EdgeType>,
}

impl GraphContextBuilder {
    /// Registers a vertex collection.
    pub fn collection(mut self, name: impl Into<String>, mapper: Mapper) -> Self {
        self.collections.push(Collection::new(name, mapper));
        self
    }

    /// Declares an edge type.
    pub fn edge_type(mut self, edge_type: EdgeType) -> Self {
        self.edge_types.push(edge_type);
        self
    }

    pub fn build(self) -> GraphContext {
        GraphContext {
            store: self.store,
            config: self.config,
            collections: self
                .collections
                .into_iter()
                .map(|collection| (collection.model_type(), Rc::new(collection)))
                .collect(),
            edge_types: self
                .edge_types
                .into_iter()
                .map(|edge_type| (edge_type.name, edge_type))
                .collect(),
            edge_collections: RefCell::new(BTreeMap::new()),
            identity_map: IdentityMap::new(),
        }
    }
}

/// One unit of work against one graph.
pub struct GraphContext {
    store: Rc<dyn Store>,
    config: Config,
    collections: BTreeMap<ModelType, Rc<Collection>>,
    edge_types: BTreeMap<&'static str, EdgeType>,
    edge_collections: RefCell<BTreeMap<&'static str, Rc<EdgeCollection>>>,
    identity_map: IdentityMap,
}

impl GraphContext {
    pub fn builder(store: Rc<dyn Store>, config: Config) -> GraphContextBuilder {
        GraphContextBuilder {
            store,
            config,
            collections: Vec::new(),
            edge_types: Vec::new(),
        }
    }

    pub fn store(&self) -> &dyn Store {
        self.store.as_ref()
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// The name of the graph all edge definitions and traversals use.
    pub fn graph_name(&self) -> &str {
        &self.config.graph
    }

    /// This unit of work's identity map.
    pub fn identity_map(&self) -> &IdentityMap {
        &self.identity_map
    }

    /// The registered collection for a model type.
    pub fn collection_for(&self, model_type: ModelType) -> Result<Rc<Collection>> {
        self.collections
            .get(&model_type)
            .map(Rc::clone)
            .ok_or(GraphError::MissingCollection { model_type })
    }

    /// The registered collection for a model.
    pub fn collection_of(&self, model: &Model) -> Result<Rc<Collection>> {
        self.collection_for(model.model_type())
    }

    /// A declared edge type by name.
    pub fn edge_type(&self, name: &str) -> Result<EdgeType> {
        self.edge_types
            .get(name)
            .copied()
            .ok_or_else(|| GraphError::UnknownEdgeType {
                name: name.to_string(),
            })
    }

    /// The edge collection for a declared edge type.
    ///
    /// The first lookup derives the collection name and registers the edge
    /// definition with the graph; later lookups return the cached handle.
    /// Safe to call any number of times.
    pub fn edge_collection(&self, name: &str) -> Result<Rc<EdgeCollection>> {
        if let Some(found) = self.edge_collections.borrow().get(name) {
            return Ok(Rc::clone(found));
        }

        let edge_type = self.edge_type(name)?;
        let collection_name = derive_collection_name(edge_type.name);
        let handle_name = derive_handle_name(edge_type.name, &self.config.edge_collection_suffix);

        let from = self.collection_for(edge_type.from)?;
        let to = self.collection_for(edge_type.to)?;
        let definition = EdgeDefinition {
            collection: collection_name.clone(),
            from: vec![from.name().to_string()],
            to: vec![to.name().to_string()],
        };
        self.store.ensure_edge_definition(self.graph_name(), &definition)?;
        debug!(
            edge = edge_type.name,
            collection = %collection_name,
            "registered edge definition"
        );

        let handle = Rc::new(EdgeCollection::new(edge_type, collection_name, handle_name));
        self.edge_collections
            .borrow_mut()
            .insert(edge_type.name, Rc::clone(&handle));
        Ok(handle)
    }

    /// The edge collection for an already-resolved edge type value.
    pub fn edge_collection_for(&self, edge_type: &EdgeType) -> Result<Rc<EdgeCollection>> {
        self.edge_collection(edge_type.name)
    }
}
