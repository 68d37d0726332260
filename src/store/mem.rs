//! In-memory store implementation.
//!
//! `MemStore` implements the full [`Store`](super::Store) contract against
//! plain maps, including the server-side transaction script's observable
//! behavior: per target state it upserts vertices, deletes the stale edges,
//! and inserts the newly computed edges, all-or-nothing. Executed requests
//! are recorded so tests can assert on the exact payload that was submitted.

use std::cell::RefCell;
use std::collections::{BTreeMap, HashMap, HashSet};

use serde_json::{json, Map, Value};
use tracing::trace;

use crate::document::{self, Document, FROM_FIELD, KEY_FIELD, TO_FIELD};

use super::{
    Direction, EdgeDefinition, EdgeRecord, EndpointField, NeighborRow, Store, StoreError,
    TransactionRequest, TraversalParams,
};

#[derive(Default)]
struct MemState {
    /// Collection name -> key -> document. Edge collections store their
    /// endpoints in `_from`/`_to` and their attributes as plain fields.
    collections: BTreeMap<String, BTreeMap<String, Document>>,
    /// Graph name -> registered edge definitions.
    edge_definitions: BTreeMap<String, Vec<EdgeDefinition>>,
    /// Every transaction request that was executed, in order.
    executed: Vec<TransactionRequest>,
    next_key: u64,
}

/// A single-process store backed by ordered maps.
#[derive(Default)]
pub struct MemStore {
    state: RefCell<MemState>,
}

impl MemStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seeds a document, creating the collection if needed. The `_key`
    /// field is set from `key`.
    pub fn insert_document(&self, collection: &str, key: &str, mut document: Document) {
        document.insert(KEY_FIELD, key);
        self.state
            .borrow_mut()
            .collections
            .entry(collection.to_string())
            .or_default()
            .insert(key.to_string(), document);
    }

    /// Seeds an edge document with its endpoints and attributes.
    pub fn insert_edge(
        &self,
        collection: &str,
        key: &str,
        from: &str,
        to: &str,
        attributes: Document,
    ) {
        let mut document = Document::new();
        document.insert(KEY_FIELD, key);
        document.insert(FROM_FIELD, from);
        document.insert(TO_FIELD, to);
        let document = document.merged(&attributes);
        self.state
            .borrow_mut()
            .collections
            .entry(collection.to_string())
            .or_default()
            .insert(key.to_string(), document);
    }

    /// Returns a stored document by collection and key.
    pub fn document(&self, collection: &str, key: &str) -> Option<Document> {
        self.state
            .borrow()
            .collections
            .get(collection)
            .and_then(|docs| docs.get(key))
            .cloned()
    }

    /// Returns every document of a collection in key order.
    pub fn documents(&self, collection: &str) -> Vec<Document> {
        self.state
            .borrow()
            .collections
            .get(collection)
            .map(|docs| docs.values().cloned().collect())
            .unwrap_or_default()
    }

    /// Names of all existing collections.
    pub fn collection_names(&self) -> Vec<String> {
        self.state.borrow().collections.keys().cloned().collect()
    }

    /// The edge definitions registered with a graph.
    pub fn edge_definitions(&self, graph: &str) -> Vec<EdgeDefinition> {
        self.state
            .borrow()
            .edge_definitions
            .get(graph)
            .cloned()
            .unwrap_or_default()
    }

    /// Every transaction request executed so far, oldest first.
    pub fn executed_transactions(&self) -> Vec<TransactionRequest> {
        self.state.borrow().executed.clone()
    }
}

fn fresh_key(counter: &mut u64) -> String {
    *counter += 1;
    format!("{}", 9000 + *counter)
}

fn vertices_of<'a>(state: &'a Value, side: &str) -> &'a [Value] {
    state
        .get(side)
        .and_then(Value::as_array)
        .map(Vec::as_slice)
        .unwrap_or(&[])
}

fn resolve_endpoint(
    value: Option<&Value>,
    assigned: &HashMap<u64, String>,
) -> Result<String, StoreError> {
    match value {
        Some(Value::String(id)) => Ok(id.clone()),
        Some(Value::Number(n)) => n
            .as_u64()
            .and_then(|object_id| assigned.get(&object_id).cloned())
            .ok_or_else(|| StoreError::TransactionFailed {
                message: "edge references an unknown transient vertex".to_string(),
            }),
        _ => Err(StoreError::TransactionFailed {
            message: "edge is missing an endpoint".to_string(),
        }),
    }
}

impl Store for MemStore {
    fn ensure_collection(&self, name: &str) -> Result<(), StoreError> {
        self.state
            .borrow_mut()
            .collections
            .entry(name.to_string())
            .or_default();
        Ok(())
    }

    fn ensure_edge_definition(
        &self,
        graph: &str,
        definition: &EdgeDefinition,
    ) -> Result<(), StoreError> {
        let mut state = self.state.borrow_mut();

        state
            .collections
            .entry(definition.collection.clone())
            .or_default();
        for endpoint in definition.from.iter().chain(&definition.to) {
            state.collections.entry(endpoint.clone()).or_default();
        }

        let definitions = state.edge_definitions.entry(graph.to_string()).or_default();
        match definitions.iter().find(|d| d.collection == definition.collection) {
            Some(existing) if existing == definition => Ok(()),
            Some(_) => Err(StoreError::EdgeDefinitionConflict {
                collection: definition.collection.clone(),
            }),
            None => {
                definitions.push(definition.clone());
                Ok(())
            }
        }
    }

    fn neighbors(&self, params: &TraversalParams) -> Result<Vec<NeighborRow>, StoreError> {
        let state = self.state.borrow();

        let known = state
            .edge_definitions
            .get(&params.graph)
            .map(|defs| defs.iter().any(|d| d.collection == params.edge_collection))
            .unwrap_or(false);
        if !known {
            return Err(StoreError::TraversalFailed {
                message: format!(
                    "edge collection '{}' is not part of graph '{}'",
                    params.edge_collection, params.graph
                ),
            });
        }

        let edges = match state.collections.get(&params.edge_collection) {
            Some(edges) => edges,
            None => return Ok(Vec::new()),
        };

        let (own_field, neighbor_field) = match params.direction {
            Direction::Outbound => (FROM_FIELD, TO_FIELD),
            Direction::Inbound => (TO_FIELD, FROM_FIELD),
        };

        let mut rows = Vec::new();
        for edge in edges.values() {
            let own = edge.get_str(own_field).and_then(document::split_graph_id);
            if own.map(|(_, key)| key) != Some(params.model_key.as_str()) {
                continue;
            }
            let Some(neighbor_id) = edge.get_str(neighbor_field) else {
                continue;
            };
            let Some((collection, key)) = document::split_graph_id(neighbor_id) else {
                continue;
            };
            let Some(vertex) = state
                .collections
                .get(collection)
                .and_then(|docs| docs.get(key))
            else {
                continue;
            };
            rows.push(NeighborRow {
                vertex: vertex.clone(),
                edge_attributes: edge.without_system_fields(),
            });
        }
        Ok(rows)
    }

    fn edges_by_example(
        &self,
        collection: &str,
        field: EndpointField,
        value: &str,
    ) -> Result<Vec<EdgeRecord>, StoreError> {
        let state = self.state.borrow();
        let edges = match state.collections.get(collection) {
            Some(edges) => edges,
            None => return Ok(Vec::new()),
        };

        let mut records = Vec::new();
        for edge in edges.values() {
            if edge.get_str(field.field_name()) != Some(value) {
                continue;
            }
            let (Some(key), Some(from), Some(to)) = (
                edge.key(),
                edge.get_str(FROM_FIELD),
                edge.get_str(TO_FIELD),
            ) else {
                continue;
            };
            records.push(EdgeRecord {
                key: key.to_string(),
                from: from.to_string(),
                to: to.to_string(),
                attributes: edge.without_system_fields(),
            });
        }
        Ok(records)
    }

    fn execute_transaction(
        &self,
        request: &TransactionRequest,
    ) -> Result<serde_json::Value, StoreError> {
        let mut state = self.state.borrow_mut();
        state.executed.push(request.clone());

        let states = request
            .params
            .get("edgeCollections")
            .and_then(Value::as_array)
            .ok_or_else(|| StoreError::TransactionFailed {
                message: "params are missing 'edgeCollections'".to_string(),
            })?;

        let writable: HashSet<&str> = request.write.iter().map(String::as_str).collect();

        // All changes are staged and committed in one swap at the end; a
        // failing state leaves the store untouched.
        let mut staged = state.collections.clone();
        let mut next_key = state.next_key;
        let mut assigned: HashMap<u64, String> = HashMap::new();
        let (mut upserted, mut inserted, mut removed) = (0usize, 0usize, 0usize);

        for target_state in states {
            for side in ["fromVertices", "toVertices"] {
                for vertex in vertices_of(target_state, side) {
                    let collection = vertex
                        .get("collection")
                        .and_then(Value::as_str)
                        .ok_or_else(|| StoreError::TransactionFailed {
                            message: "vertex is missing its collection".to_string(),
                        })?;
                    if !writable.contains(collection) {
                        return Err(StoreError::TransactionFailed {
                            message: format!(
                                "collection '{collection}' was not declared for writing"
                            ),
                        });
                    }

                    let document: Document = serde_json::from_value(
                        vertex
                            .get("document")
                            .cloned()
                            .unwrap_or(Value::Object(Map::new())),
                    )
                    .map_err(|e| StoreError::TransactionFailed {
                        message: format!("malformed vertex document: {e}"),
                    })?;

                    let key = match vertex.get(KEY_FIELD).and_then(Value::as_str) {
                        Some(key) => key.to_string(),
                        None => fresh_key(&mut next_key),
                    };
                    let mut stored = document;
                    stored.insert(KEY_FIELD, key.clone());
                    staged
                        .entry(collection.to_string())
                        .or_default()
                        .insert(key.clone(), stored);
                    upserted += 1;

                    if let Some(object_id) = vertex.get("object_id").and_then(Value::as_u64) {
                        assigned.insert(object_id, document::graph_id(collection, &key));
                    }
                    trace!(collection, key, "upserted vertex");
                }
            }
        }

        for target_state in states {
            let Some(name) = target_state.get("name").and_then(Value::as_str) else {
                continue;
            };
            if !writable.contains(name) {
                return Err(StoreError::TransactionFailed {
                    message: format!("collection '{name}' was not declared for writing"),
                });
            }
            let edge_collection = staged.entry(name.to_string()).or_default();

            for old_key in target_state
                .get("oldEdges")
                .and_then(Value::as_array)
                .map(Vec::as_slice)
                .unwrap_or(&[])
            {
                if let Some(key) = old_key.as_str() {
                    if edge_collection.remove(key).is_some() {
                        removed += 1;
                        trace!(collection = name, key, "removed stale edge");
                    }
                }
            }

            for edge in target_state
                .get("edges")
                .and_then(Value::as_array)
                .map(Vec::as_slice)
                .unwrap_or(&[])
            {
                let from = resolve_endpoint(edge.get(FROM_FIELD), &assigned)?;
                let to = resolve_endpoint(edge.get(TO_FIELD), &assigned)?;
                let attributes: Document = serde_json::from_value(
                    edge.get("attributes")
                        .cloned()
                        .unwrap_or(Value::Object(Map::new())),
                )
                .map_err(|e| StoreError::TransactionFailed {
                    message: format!("malformed edge attributes: {e}"),
                })?;

                let key = fresh_key(&mut next_key);
                let mut document = Document::new();
                document.insert(KEY_FIELD, key.clone());
                document.insert(FROM_FIELD, from);
                document.insert(TO_FIELD, to);
                let document = document.merged(&attributes);
                edge_collection.insert(key, document);
                inserted += 1;
            }
        }

        state.collections = staged;
        state.next_key = next_key;
        Ok(json!({
            "vertices": upserted,
            "edges": inserted,
            "removedEdges": removed,
        }))
    }
}
