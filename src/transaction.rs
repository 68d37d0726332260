//! Target states and the atomic graph transaction.
//!
//! Saving a model means computing the exact set of vertices, edges, and
//! stale edges the store must write, then submitting them as one atomic
//! server-side transaction. [`TargetStateBuilder`] produces one
//! [`TargetState`] per relation attribute (or a single vertex-only state
//! for models without relations); [`Transaction`] unions the collection
//! sets and submits the payload together with the configured server-side
//! script.
//!
//! Relations use full-replace semantics: every previously stored edge for
//! the relation and vertex is deleted and the newly computed set inserted.
//! There is no incremental diff against prior state.

use std::collections::HashSet;
use std::rc::Rc;

use serde_json::{json, Value};
use tracing::debug;

use crate::context::{Collection, GraphContext};
use crate::document::{self, Document, HASH_KEY_FIELD};
use crate::error::{GraphError, Result};
use crate::mapper::Attribute;
use crate::model::ModelRef;
use crate::proxy::RelationTarget;
use crate::store::{EndpointField, TransactionRequest};

/// An edge endpoint: the persisted graph id if the vertex has one, or the
/// model's transient instance id so the server script can correlate edges
/// against vertices created in the same transaction.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum VertexId {
    Persisted(String),
    Transient(u64),
}

impl VertexId {
    pub fn to_value(&self) -> Value {
        match self {
            VertexId::Persisted(id) => Value::String(id.clone()),
            VertexId::Transient(token) => json!(token),
        }
    }
}

/// A unit to be written as a graph node.
#[derive(Clone, Debug)]
pub struct Vertex {
    model: ModelRef,
    collection: String,
    document: Document,
    edge_attributes: Document,
}

impl Vertex {
    pub fn new(model: ModelRef, collection: String, document: Document) -> Self {
        Self {
            model,
            collection,
            document,
            edge_attributes: Document::new(),
        }
    }

    /// A vertex carrying the edge attributes of its relation pair (set for
    /// keyed relations, where the map key travels on the edge).
    pub fn with_edge_attributes(
        model: ModelRef,
        collection: String,
        document: Document,
        edge_attributes: Document,
    ) -> Self {
        Self {
            model,
            collection,
            document,
            edge_attributes,
        }
    }

    pub fn model(&self) -> &ModelRef {
        &self.model
    }

    pub fn collection(&self) -> &str {
        &self.collection
    }

    pub fn document(&self) -> &Document {
        &self.document
    }

    pub fn edge_attributes(&self) -> &Document {
        &self.edge_attributes
    }

    /// The key of the wrapped model.
    pub fn key(&self) -> Option<String> {
        self.model.borrow().key().map(str::to_string)
    }

    /// The persisted graph id of the wrapped model.
    pub fn id(&self) -> Option<String> {
        self.key()
            .map(|key| document::graph_id(&self.collection, &key))
    }

    /// True once the wrapped model carries a persisted key.
    pub fn is_persisted(&self) -> bool {
        self.model.borrow().is_persisted()
    }

    /// An id suitable for resolving edges inside the transaction.
    pub fn id_for_edge(&self) -> VertexId {
        match self.id() {
            Some(id) => VertexId::Persisted(id),
            None => VertexId::Transient(self.model.borrow().instance_id()),
        }
    }

    pub fn as_json(&self) -> Value {
        json!({
            "object_id": self.model.borrow().instance_id(),
            "collection": self.collection,
            "document": self.document.to_value(),
            "_key": self.key(),
            "_id": self.id(),
        })
    }
}

/// A directed relation between two vertices.
#[derive(Clone, Debug)]
pub struct Edge {
    pub from: VertexId,
    pub to: VertexId,
    pub attributes: Document,
}

impl Edge {
    pub fn as_json(&self) -> Value {
        json!({
            "_from": self.from.to_value(),
            "_to": self.to.to_value(),
            "attributes": self.attributes.to_value(),
        })
    }
}

/// The target state of the graph for a model without relations.
#[derive(Debug)]
pub struct VertexTargetState {
    vertex: Vertex,
}

impl VertexTargetState {
    pub fn build(model: &ModelRef, collection: &Collection) -> Self {
        let document = collection.mapper().model_to_document(&model.borrow());
        Self {
            vertex: Vertex::new(Rc::clone(model), collection.name().to_string(), document),
        }
    }

    pub fn vertex(&self) -> &Vertex {
        &self.vertex
    }

    pub fn as_json(&self) -> Value {
        json!({
            "name": Value::Null,
            "fromVertices": [self.vertex.as_json()],
            "toVertices": [],
            "edges": [],
            "oldEdges": [],
        })
    }
}

/// The target state of the graph for one relation attribute of a model.
#[derive(Debug)]
pub struct SubGraphTargetState {
    edge_collection_name: String,
    from_vertices: Vec<Vertex>,
    to_vertices: Vec<Vertex>,
    edges: Vec<Edge>,
    old_edge_keys: Vec<String>,
}

impl SubGraphTargetState {
    /// Computes the full target state for `model`'s relation `attribute`.
    ///
    /// The side of the edge the model occupies collapses to a single
    /// vertex; the other side fans out over the related models, each mapped
    /// through its own responsible mapper. Stale edges are collected by
    /// example on the model's persisted graph id.
    pub fn build(ctx: &GraphContext, model: &ModelRef, attribute: &Attribute) -> Result<Self> {
        let edge_type = attribute.edge_type().ok_or_else(|| GraphError::NotARelation {
            name: attribute.name().to_string(),
        })?;
        let edge_collection = ctx.edge_collection_for(&edge_type)?;

        let owner_type = model.borrow().model_type();
        let side = edge_collection.side_of(owner_type)?;

        let related = related_models(ctx, model, attribute)?;

        let from_endpoint = ctx.collection_for(edge_type.from)?;
        let to_endpoint = ctx.collection_for(edge_type.to)?;
        let (anchor_endpoint, fan_endpoint) = match side {
            EndpointField::From => (&from_endpoint, &to_endpoint),
            EndpointField::To => (&to_endpoint, &from_endpoint),
        };

        let anchor_document = edge_collection
            .mapper_for_start(ctx, &model.borrow())?
            .mapper()
            .model_to_document(&model.borrow());
        let anchor = Vertex::new(
            Rc::clone(model),
            anchor_endpoint.name().to_string(),
            anchor_document,
        );

        let mut fan_out = Vec::with_capacity(related.len());
        for (related_model, edge_attributes) in &related {
            let start = edge_collection.mapper_for_start(ctx, &related_model.borrow())?;
            let document = start.mapper().model_to_document(&related_model.borrow());
            fan_out.push(Vertex::with_edge_attributes(
                Rc::clone(related_model),
                fan_endpoint.name().to_string(),
                document,
                edge_attributes.clone(),
            ));
        }

        let owner_key = model.borrow().key().map(str::to_string);
        let old_edge_keys = match owner_key {
            Some(key) => {
                let id = document::graph_id(anchor_endpoint.name(), &key);
                edge_collection.old_edge_keys(ctx, side, &id)?
            }
            None => Vec::new(),
        };

        let (from_vertices, to_vertices) = match side {
            EndpointField::From => (vec![anchor], fan_out),
            EndpointField::To => (fan_out, vec![anchor]),
        };

        let mut edges = Vec::with_capacity(from_vertices.len() * to_vertices.len());
        for from_vertex in &from_vertices {
            for to_vertex in &to_vertices {
                let attributes = from_vertex
                    .edge_attributes()
                    .merged(to_vertex.edge_attributes());
                edges.push(Edge {
                    from: from_vertex.id_for_edge(),
                    to: to_vertex.id_for_edge(),
                    attributes,
                });
            }
        }

        Ok(Self {
            edge_collection_name: edge_collection.name().to_string(),
            from_vertices,
            to_vertices,
            edges,
            old_edge_keys,
        })
    }

    pub fn edge_collection_name(&self) -> &str {
        &self.edge_collection_name
    }

    pub fn from_vertices(&self) -> &[Vertex] {
        &self.from_vertices
    }

    pub fn to_vertices(&self) -> &[Vertex] {
        &self.to_vertices
    }

    pub fn edges(&self) -> &[Edge] {
        &self.edges
    }

    /// Keys of every previously stored edge for this relation and vertex;
    /// the transaction deletes them all before inserting [`edges`](Self::edges).
    pub fn old_edge_keys(&self) -> &[String] {
        &self.old_edge_keys
    }

    /// The to-side vertices actually shipped for insertion.
    ///
    /// Vertices that already exist in the store are referenced by id in the
    /// edges and not re-inserted. The filter applies to the to side only.
    pub fn insertable_to_vertices(&self) -> Vec<&Vertex> {
        self.to_vertices
            .iter()
            .filter(|vertex| !vertex.is_persisted())
            .collect()
    }

    pub fn as_json(&self) -> Value {
        json!({
            "name": self.edge_collection_name,
            "fromVertices": self.from_vertices.iter().map(Vertex::as_json).collect::<Vec<_>>(),
            "toVertices": self.insertable_to_vertices().iter().map(|v| v.as_json()).collect::<Vec<_>>(),
            "edges": self.edges.iter().map(Edge::as_json).collect::<Vec<_>>(),
            "oldEdges": self.old_edge_keys,
        })
    }
}

/// A unit of transactional intent: a lone vertex or one relation's full
/// vertex/edge set.
#[derive(Debug)]
pub enum TargetState {
    VertexOnly(VertexTargetState),
    SubGraph(SubGraphTargetState),
}

impl TargetState {
    /// The edge collection this state writes to (`None` for vertex-only).
    pub fn edge_collection_name(&self) -> Option<&str> {
        match self {
            TargetState::VertexOnly(_) => None,
            TargetState::SubGraph(state) => Some(state.edge_collection_name()),
        }
    }

    pub fn from_vertices(&self) -> &[Vertex] {
        match self {
            TargetState::VertexOnly(state) => std::slice::from_ref(&state.vertex),
            TargetState::SubGraph(state) => state.from_vertices(),
        }
    }

    pub fn to_vertices(&self) -> &[Vertex] {
        match self {
            TargetState::VertexOnly(_) => &[],
            TargetState::SubGraph(state) => state.to_vertices(),
        }
    }

    pub fn edges(&self) -> &[Edge] {
        match self {
            TargetState::VertexOnly(_) => &[],
            TargetState::SubGraph(state) => state.edges(),
        }
    }

    pub fn old_edge_keys(&self) -> &[String] {
        match self {
            TargetState::VertexOnly(_) => &[],
            TargetState::SubGraph(state) => state.old_edge_keys(),
        }
    }

    pub fn as_json(&self) -> Value {
        match self {
            TargetState::VertexOnly(state) => state.as_json(),
            TargetState::SubGraph(state) => state.as_json(),
        }
    }
}

/// Factory for the target states of one save operation.
pub struct TargetStateBuilder;

impl TargetStateBuilder {
    /// One vertex-only state when the mapper declares no relations,
    /// otherwise exactly one sub-graph state per relation attribute.
    pub fn build(
        ctx: &GraphContext,
        model: &ModelRef,
        collection: &Collection,
    ) -> Result<Vec<TargetState>> {
        let edge_attributes: Vec<Attribute> =
            collection.mapper().edge_attributes().cloned().collect();

        if edge_attributes.is_empty() {
            return Ok(vec![TargetState::VertexOnly(VertexTargetState::build(
                model, collection,
            ))]);
        }

        edge_attributes
            .iter()
            .map(|attribute| {
                SubGraphTargetState::build(ctx, model, attribute).map(TargetState::SubGraph)
            })
            .collect()
    }
}

fn related_models(
    ctx: &GraphContext,
    model: &ModelRef,
    attribute: &Attribute,
) -> Result<Vec<(ModelRef, Document)>> {
    Ok(match attribute.get_value(ctx, model)? {
        RelationTarget::Single(None) => Vec::new(),
        RelationTarget::Single(Some(related)) => vec![(related, Document::new())],
        RelationTarget::List(models) => models
            .into_iter()
            .map(|related| (related, Document::new()))
            .collect(),
        RelationTarget::Map(models) => models
            .into_iter()
            .map(|(key, related)| {
                let mut attributes = Document::new();
                attributes.insert(HASH_KEY_FIELD, key);
                (related, attributes)
            })
            .collect(),
    })
}

/// One atomic save of a model and its relations.
pub struct Transaction {
    collection: Rc<Collection>,
    model: ModelRef,
    target_states: Vec<TargetState>,
}

impl Transaction {
    /// Builds the transaction for a model.
    ///
    /// Eagerly makes sure the owning collection exists on the store before
    /// computing any state, so lazy provisioning happens up front.
    pub fn new(ctx: &GraphContext, collection: Rc<Collection>, model: ModelRef) -> Result<Self> {
        ctx.store().ensure_collection(collection.name())?;
        let target_states = TargetStateBuilder::build(ctx, &model, &collection)?;
        Ok(Self {
            collection,
            model,
            target_states,
        })
    }

    /// Builds and executes in one step.
    pub fn run(ctx: &GraphContext, collection: Rc<Collection>, model: ModelRef) -> Result<Value> {
        Self::new(ctx, collection, model)?.execute(ctx)
    }

    pub fn collection(&self) -> &Collection {
        &self.collection
    }

    pub fn model(&self) -> &ModelRef {
        &self.model
    }

    pub fn target_states(&self) -> &[TargetState] {
        &self.target_states
    }

    /// The unique, order-stable union of every collection this transaction
    /// writes to: each state's edge collection plus every vertex collection.
    pub fn write_collections(&self) -> Vec<String> {
        let mut seen = HashSet::new();
        let mut names = Vec::new();

        for state in &self.target_states {
            if let Some(name) = state.edge_collection_name() {
                if seen.insert(name.to_string()) {
                    names.push(name.to_string());
                }
            }
            for vertex in state.from_vertices().iter().chain(state.to_vertices()) {
                if seen.insert(vertex.collection().to_string()) {
                    names.push(vertex.collection().to_string());
                }
            }
        }

        names
    }

    /// The server script reads current edges from everything it writes, so
    /// the read set equals the write set.
    pub fn read_collections(&self) -> Vec<String> {
        self.write_collections()
    }

    /// The parameters submitted alongside the server-side script.
    pub fn transaction_params(&self, graph: &str) -> Value {
        json!({
            "edgeCollections": self
                .target_states
                .iter()
                .map(TargetState::as_json)
                .collect::<Vec<_>>(),
            "graph": graph,
            "logLevel": "debug",
        })
    }

    /// Submits the transaction to the store and returns the script result.
    ///
    /// Durability confirmation (wait-for-sync) is requested before the call
    /// returns. Execution failures propagate unchanged; the underlying
    /// execution is atomic by contract.
    pub fn execute(&self, ctx: &GraphContext) -> Result<Value> {
        let code = ctx.config().load_transaction_script()?;
        let write = self.write_collections();
        let read = self.read_collections();
        let params = self.transaction_params(ctx.graph_name());

        debug!(
            collection = self.collection.name(),
            states = self.target_states.len(),
            write = ?write,
            "submitting graph transaction"
        );

        let request = TransactionRequest {
            code,
            write,
            read,
            params,
            wait_for_sync: true,
        };
        Ok(ctx.store().execute_transaction(&request)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Model, RelationValue};
    use crate::store::mem::MemStore;
    use crate::test_utils::{
        blog_context, garage_context, seed_authorship, seed_post, seed_user, CAR, GARAGE, POST,
        USER,
    };
    use rstest::rstest;
    use serde_json::json;
    use std::collections::BTreeMap;
    use std::rc::Rc;

    fn persisted_user(key: &str, name: &str) -> ModelRef {
        let mut user = Model::new(USER);
        user.set_key(key);
        user.set_attribute("name", name);
        user.into_ref()
    }

    fn new_post(title: &str) -> ModelRef {
        let mut post = Model::new(POST);
        post.set_attribute("title", title);
        post.into_ref()
    }

    #[rstest]
    fn test_vertex_ids() {
        let saved = Vertex::new(persisted_user("u1", "Lisa"), "users".to_string(), Document::new());
        assert_eq!(saved.id(), Some("users/u1".to_string()));
        assert_eq!(
            saved.id_for_edge(),
            VertexId::Persisted("users/u1".to_string())
        );

        let unsaved = Vertex::new(new_post("draft"), "posts".to_string(), Document::new());
        assert_eq!(unsaved.id(), None);
        let token = unsaved.model().borrow().instance_id();
        assert_eq!(unsaved.id_for_edge(), VertexId::Transient(token));
    }

    #[rstest]
    fn test_vertex_as_json_shape() {
        let vertex = Vertex::new(persisted_user("u1", "Lisa"), "users".to_string(), Document::new());
        let value = vertex.as_json();

        assert_eq!(value["collection"], json!("users"));
        assert_eq!(value["_key"], json!("u1"));
        assert_eq!(value["_id"], json!("users/u1"));
        assert!(value["object_id"].is_u64());
    }

    #[rstest]
    fn test_vertex_only_state_for_model_without_relations() {
        let store = Rc::new(MemStore::new());
        let ctx = garage_context(store);
        let cars = ctx.collection_for(CAR).unwrap();

        let mut car = Model::new(CAR);
        car.set_key("c1");
        car.set_attribute("plate", "X-123");
        let car = car.into_ref();

        let states = TargetStateBuilder::build(&ctx, &car, &cars).unwrap();
        assert_eq!(states.len(), 1);

        let state = &states[0];
        assert!(state.edge_collection_name().is_none());
        assert_eq!(state.from_vertices().len(), 1);
        assert_eq!(state.from_vertices()[0].collection(), "cars");
        assert!(state.to_vertices().is_empty());
        assert!(state.edges().is_empty());
        assert!(state.old_edge_keys().is_empty());

        let value = state.as_json();
        assert_eq!(value["name"], Value::Null);
        assert_eq!(value["toVertices"], json!([]));
        assert_eq!(value["edges"], json!([]));
        assert_eq!(value["oldEdges"], json!([]));
    }

    #[rstest]
    fn test_one_sub_graph_state_per_relation_attribute() {
        let store = Rc::new(MemStore::new());
        let ctx = blog_context(store);
        let users = ctx.collection_for(USER).unwrap();

        let user = persisted_user("u1", "Lisa");
        user.borrow_mut()
            .set_relation("posts", RelationValue::list(vec![]));

        let states = TargetStateBuilder::build(&ctx, &user, &users).unwrap();
        assert_eq!(states.len(), 1);
        assert_eq!(states[0].edge_collection_name(), Some("authorships"));
    }

    // Scenario: scalar-ish relation from the from side, related model not
    // yet persisted.
    #[rstest]
    fn test_from_side_edges_use_transient_ids_for_new_vertices() {
        let store = Rc::new(MemStore::new());
        let ctx = blog_context(store);
        let users = ctx.collection_for(USER).unwrap();

        let user = persisted_user("u1", "Lisa");
        let post = new_post("fresh");
        let post_token = post.borrow().instance_id();
        user.borrow_mut()
            .set_relation("posts", RelationValue::list(vec![post]));

        let states = TargetStateBuilder::build(&ctx, &user, &users).unwrap();
        let state = &states[0];

        assert_eq!(state.from_vertices().len(), 1);
        assert_eq!(state.from_vertices()[0].id(), Some("users/u1".to_string()));
        assert_eq!(state.to_vertices().len(), 1);
        assert_eq!(state.to_vertices()[0].collection(), "posts");

        assert_eq!(state.edges().len(), 1);
        let edge = &state.edges()[0];
        assert_eq!(edge.from, VertexId::Persisted("users/u1".to_string()));
        assert_eq!(edge.to, VertexId::Transient(post_token));
        assert!(edge.attributes.is_empty());
    }

    // Scenario: keyed relation carries the map key as hash_key on each edge.
    #[rstest]
    fn test_keyed_relation_edges_carry_hash_keys() {
        let store = Rc::new(MemStore::new());
        let ctx = garage_context(store);
        let garages = ctx.collection_for(GARAGE).unwrap();

        let mut garage = Model::new(GARAGE);
        garage.set_key("g1");
        let garage = garage.into_ref();

        let mut cars = BTreeMap::new();
        cars.insert("blue".to_string(), new_car("B-1"));
        cars.insert("red".to_string(), new_car("R-1"));
        garage.borrow_mut().set_relation("cars", RelationValue::map(cars));

        let states = TargetStateBuilder::build(&ctx, &garage, &garages).unwrap();
        let state = &states[0];

        assert_eq!(state.edges().len(), 2);
        let hash_keys: Vec<&str> = state
            .edges()
            .iter()
            .filter_map(|e| e.attributes.get_str(HASH_KEY_FIELD))
            .collect();
        assert_eq!(hash_keys, vec!["blue", "red"]);
    }

    fn new_car(plate: &str) -> ModelRef {
        let mut car = Model::new(CAR);
        car.set_attribute("plate", plate);
        car.into_ref()
    }

    // Scenario: old edges are collected by example on the persisted id,
    // independent of how many new edges are produced.
    #[rstest]
    fn test_old_edge_keys_query_by_example() {
        let store = Rc::new(MemStore::new());
        seed_user(&store, "u1", "Lisa");
        seed_post(&store, "p1", "old one");
        seed_post(&store, "p2", "old two");
        seed_authorship(&store, "e1", "u1", "p1", Document::new());
        seed_authorship(&store, "e2", "u1", "p2", Document::new());

        let ctx = blog_context(store);
        let users = ctx.collection_for(USER).unwrap();

        // The new relation value has a single entry; the old edges are
        // still all collected.
        let user = persisted_user("u1", "Lisa");
        user.borrow_mut()
            .set_relation("posts", RelationValue::list(vec![new_post("only one")]));

        let states = TargetStateBuilder::build(&ctx, &user, &users).unwrap();
        let state = &states[0];

        assert_eq!(state.old_edge_keys(), ["e1".to_string(), "e2".to_string()]);
        assert_eq!(state.edges().len(), 1);
    }

    #[rstest]
    fn test_inverse_side_fans_out_from_vertices() {
        let store = Rc::new(MemStore::new());
        let ctx = blog_context(store);
        let posts = ctx.collection_for(POST).unwrap();

        let mut post = Model::new(POST);
        post.set_key("p1");
        let post = post.into_ref();
        post.borrow_mut()
            .set_relation("author", RelationValue::single(Some(persisted_user("u1", "Lisa"))));

        let states = TargetStateBuilder::build(&ctx, &post, &posts).unwrap();
        let state = &states[0];

        // The post is the to side; the author fans out on the from side.
        assert_eq!(state.from_vertices().len(), 1);
        assert_eq!(state.from_vertices()[0].collection(), "users");
        assert_eq!(state.to_vertices().len(), 1);
        assert_eq!(state.to_vertices()[0].id(), Some("posts/p1".to_string()));

        let edge = &state.edges()[0];
        assert_eq!(edge.from, VertexId::Persisted("users/u1".to_string()));
        assert_eq!(edge.to, VertexId::Persisted("posts/p1".to_string()));
    }

    #[rstest]
    fn test_serialization_filters_persisted_to_vertices() {
        let store = Rc::new(MemStore::new());
        let ctx = blog_context(store);
        let users = ctx.collection_for(USER).unwrap();

        let user = persisted_user("u1", "Lisa");
        let mut saved_post = Model::new(POST);
        saved_post.set_key("p1");
        let saved_post = saved_post.into_ref();
        user.borrow_mut().set_relation(
            "posts",
            RelationValue::list(vec![saved_post, new_post("fresh")]),
        );

        let states = TargetStateBuilder::build(&ctx, &user, &users).unwrap();
        let state = match &states[0] {
            TargetState::SubGraph(state) => state,
            TargetState::VertexOnly(_) => panic!("expected a sub-graph state"),
        };

        // Both vertices participate in edges, but only the unsaved one is
        // shipped for insertion.
        assert_eq!(state.to_vertices().len(), 2);
        assert_eq!(state.insertable_to_vertices().len(), 1);
        assert_eq!(state.edges().len(), 2);

        let value = state.as_json();
        assert_eq!(value["toVertices"].as_array().unwrap().len(), 1);
        assert_eq!(value["fromVertices"].as_array().unwrap().len(), 1);
    }

    #[rstest]
    fn test_unmapped_relation_endpoint_is_fatal() {
        let store = Rc::new(MemStore::new());
        let ctx = blog_context(store);
        let users = ctx.collection_for(USER).unwrap();

        let user = persisted_user("u1", "Lisa");
        let stranger = Model::new(GARAGE).into_ref();
        user.borrow_mut()
            .set_relation("posts", RelationValue::list(vec![stranger]));

        let err = TargetStateBuilder::build(&ctx, &user, &users).unwrap_err();
        assert!(matches!(err, GraphError::UnmappedEndpoint { .. }));
    }

    #[rstest]
    fn test_write_collections_deduplicate() {
        let store = Rc::new(MemStore::new());
        let ctx = blog_context(store);
        let users = ctx.collection_for(USER).unwrap();

        let user = persisted_user("u1", "Lisa");
        user.borrow_mut().set_relation(
            "posts",
            RelationValue::list(vec![new_post("a"), new_post("b")]),
        );

        let transaction = Transaction::new(&ctx, users, user).unwrap();
        let write = transaction.write_collections();
        assert_eq!(write, vec!["authorships", "users", "posts"]);
        assert_eq!(transaction.read_collections(), write);
    }

    #[rstest]
    fn test_new_ensures_owning_collection() {
        let store = Rc::new(MemStore::new());
        let ctx = garage_context(store.clone());
        let cars = ctx.collection_for(CAR).unwrap();

        let mut car = Model::new(CAR);
        car.set_key("c1");
        Transaction::new(&ctx, cars, car.into_ref()).unwrap();

        assert!(store.collection_names().contains(&"cars".to_string()));
    }

    #[rstest]
    fn test_transaction_params_shape() {
        let store = Rc::new(MemStore::new());
        let ctx = garage_context(store);
        let cars = ctx.collection_for(CAR).unwrap();

        let mut car = Model::new(CAR);
        car.set_key("c1");
        let transaction = Transaction::new(&ctx, cars, car.into_ref()).unwrap();

        let params = transaction.transaction_params("test_graph");
        assert_eq!(params["graph"], json!("test_graph"));
        assert_eq!(params["logLevel"], json!("debug"));
        assert_eq!(params["edgeCollections"].as_array().unwrap().len(), 1);
    }
}
