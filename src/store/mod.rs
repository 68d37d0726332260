//! The boundary to the document store.
//!
//! This module defines the trait the mapping layer talks through, plus the
//! wire types of the three external interfaces it consumes: neighbor
//! traversal, by-example edge lookup, and atomic transaction execution.
//! Low-level document CRUD and raw query execution live behind this boundary
//! and are not part of the mapper.
//!
//! The [`mem`] submodule provides an in-memory implementation honoring the
//! transaction-script contract, which is what the test suite runs against.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::document::Document;

pub mod mem;

/// Traversal direction relative to the starting vertex.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Inbound,
    Outbound,
}

impl Direction {
    /// The wire spelling of the direction.
    pub fn as_str(&self) -> &'static str {
        match self {
            Direction::Inbound => "inbound",
            Direction::Outbound => "outbound",
        }
    }
}

/// Traversals default to inbound.
impl Default for Direction {
    fn default() -> Self {
        Direction::Inbound
    }
}

/// Which endpoint field of an edge a by-example lookup matches on.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum EndpointField {
    From,
    To,
}

impl EndpointField {
    /// The edge document field this endpoint is stored in.
    pub fn field_name(&self) -> &'static str {
        match self {
            EndpointField::From => crate::document::FROM_FIELD,
            EndpointField::To => crate::document::TO_FIELD,
        }
    }
}

/// An edge definition registered with a named graph.
#[derive(Clone, Debug, PartialEq)]
pub struct EdgeDefinition {
    /// The edge collection the definition covers.
    pub collection: String,
    /// Vertex collections edges may start from.
    pub from: Vec<String>,
    /// Vertex collections edges may point to.
    pub to: Vec<String>,
}

/// Bound parameters of a neighbor traversal.
#[derive(Clone, Debug, PartialEq)]
pub struct TraversalParams {
    pub graph: String,
    pub model_key: String,
    pub edge_collection: String,
    pub direction: Direction,
}

/// One traversal result: the neighboring vertex document together with the
/// traversed edge's own attributes.
#[derive(Clone, Debug)]
pub struct NeighborRow {
    pub vertex: Document,
    pub edge_attributes: Document,
}

/// One edge record returned by a by-example lookup.
#[derive(Clone, Debug)]
pub struct EdgeRecord {
    pub key: String,
    pub from: String,
    pub to: String,
    pub attributes: Document,
}

/// Everything the store needs to run one atomic server-side transaction.
#[derive(Clone, Debug)]
pub struct TransactionRequest {
    /// The server-side procedural script.
    pub code: String,
    /// Collections the script writes to.
    pub write: Vec<String>,
    /// Collections the script reads from.
    pub read: Vec<String>,
    /// Script parameters (`edgeCollections`, `graph`, `logLevel`).
    pub params: serde_json::Value,
    /// Request durability confirmation before returning.
    pub wait_for_sync: bool,
}

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("collection '{name}' could not be provisioned: {message}")]
    CollectionFailed { name: String, message: String },

    #[error("edge definition for '{collection}' conflicts with an existing definition")]
    EdgeDefinitionConflict { collection: String },

    #[error("neighbor traversal failed: {message}")]
    TraversalFailed { message: String },

    #[error("by-example lookup on '{collection}' failed: {message}")]
    LookupFailed { collection: String, message: String },

    #[error("transaction execution failed: {message}")]
    TransactionFailed { message: String },
}

/// The store operations the graph persistence subsystem consumes.
///
/// Implementations are used through `Rc<dyn Store>` within one unit of work;
/// the mapping layer is single-threaded, so no `Send`/`Sync` bound is
/// required here.
pub trait Store {
    /// Makes sure a (vertex or edge) collection exists, creating it if needed.
    fn ensure_collection(&self, name: &str) -> Result<(), StoreError>;

    /// Registers an edge definition with a named graph.
    ///
    /// Registering the same definition twice is not an error; registering a
    /// different definition under the same collection name is.
    fn ensure_edge_definition(
        &self,
        graph: &str,
        definition: &EdgeDefinition,
    ) -> Result<(), StoreError>;

    /// Runs a neighbor traversal restricted to one edge collection and
    /// direction.
    fn neighbors(&self, params: &TraversalParams) -> Result<Vec<NeighborRow>, StoreError>;

    /// Returns the edges in `collection` whose `_from`/`_to` equals `value`.
    fn edges_by_example(
        &self,
        collection: &str,
        field: EndpointField,
        value: &str,
    ) -> Result<Vec<EdgeRecord>, StoreError>;

    /// Executes one atomic server-side transaction and returns its result.
    fn execute_transaction(
        &self,
        request: &TransactionRequest,
    ) -> Result<serde_json::Value, StoreError>;
}
