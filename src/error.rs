//! Error types for the mapping layer.

use thiserror::Error;

use crate::config::ConfigError;
use crate::model::ModelType;
use crate::store::StoreError;

/// Result type of the mapping layer.
pub type Result<T> = std::result::Result<T, GraphError>;

/// Everything that can go wrong between a model and the store.
///
/// Configuration mistakes (unknown edge types, unmapped or ambiguous
/// endpoints, missing collections) are raised synchronously and are not
/// retried; store failures propagate unchanged, since the underlying
/// transaction execution is atomic by contract.
#[derive(Error, Debug)]
pub enum GraphError {
    /// The edge type was never declared in the context.
    #[error("no edge type named '{name}' is declared in this context")]
    UnknownEdgeType { name: String },

    /// No collection is registered for a model type.
    #[error("no collection registered for model type '{model_type}'")]
    MissingCollection { model_type: ModelType },

    /// Neither endpoint mapper of the edge claims the model.
    #[error("neither endpoint of edge '{edge}' is mapped for model type '{model_type}'")]
    UnmappedEndpoint {
        edge: &'static str,
        model_type: ModelType,
    },

    /// Both endpoint mappers of the edge claim the model.
    #[error("both endpoints of edge '{edge}' claim model type '{model_type}'")]
    AmbiguousEndpoint {
        edge: &'static str,
        model_type: ModelType,
    },

    /// A document without a `_key` cannot be mapped to a model.
    #[error("document for '{model_type}' has no '_key' field")]
    MissingKey { model_type: ModelType },

    /// Relations can only be traversed from a persisted model.
    #[error("model of type '{model_type}' has no key yet; relations cannot be traversed")]
    UnsavedModel { model_type: ModelType },

    /// The attribute has no edge type declared.
    #[error("attribute '{name}' is not backed by an edge relation")]
    NotARelation { name: String },

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Config(#[from] ConfigError),
}
