//! Object/graph mapper for a document database with graph edges.
//!
//! Translates stored documents into in-memory models with lazy relation
//! proxies, and a model plus its relations back into one atomic,
//! multi-collection transaction:
//!
//! - [`mapper`] owns relation metadata and the document/model translation.
//! - [`proxy`] gives relation attributes resolve-once lazy access.
//! - [`edge_collection`] derives edge collections from declared edge types
//!   and builds neighbor-traversal queries.
//! - [`transaction`] computes the vertices, edges, and stale edges a save
//!   must write and submits them as a single server-side transaction.
//! - [`context`] scopes one unit of work: registries, identity map, store.
//! - [`store`] is the boundary to the database, with an in-memory
//!   implementation used by the test suite.

pub mod config;
pub mod context;
pub mod document;
pub mod edge_collection;
pub mod error;
pub mod identity_map;
pub mod mapper;
pub mod model;
pub mod proxy;
pub mod store;
pub mod transaction;
pub mod utils;

#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;

// Re-export commonly used items
pub use config::Config;
pub use context::{Collection, GraphContext, GraphContextBuilder};
pub use document::Document;
pub use edge_collection::{EdgeCollection, EdgeType, NeighborEdge, NeighborsQuery};
pub use error::{GraphError, Result};
pub use identity_map::IdentityMap;
pub use mapper::{Attribute, AttributeShape, Mapper};
pub use model::{Model, ModelRef, ModelType, RelationValue};
pub use proxy::{ProxyVariant, RelationProxy, RelationTarget};
pub use store::{Direction, Store};
pub use transaction::{
    TargetState, TargetStateBuilder, Transaction, Vertex, VertexId,
};
