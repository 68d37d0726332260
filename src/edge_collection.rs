//! Edge types, derived edge collections, and neighbor traversal queries.
//!
//! An [`EdgeType`] declares the two endpoint model types of a relation. The
//! context derives the concrete edge collection from it (pluralized,
//! snake_cased name; the handle label carries a fixed suffix) and registers
//! the edge definition with the graph exactly once. From a handle you get
//! composable, unexecuted [`NeighborsQuery`] values and by-example lookups
//! of stale edge keys.

use std::rc::Rc;

use crate::context::{Collection, GraphContext};
use crate::document::Document;
use crate::error::{GraphError, Result};
use crate::model::{Model, ModelRef, ModelType};
use crate::store::{Direction, EndpointField, TraversalParams};
use crate::utils::{demodulize, pluralize, snake_case};

/// Declares an edge's two endpoint model types.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct EdgeType {
    pub name: &'static str,
    pub from: ModelType,
    pub to: ModelType,
}

impl EdgeType {
    pub const fn new(name: &'static str, from: ModelType, to: ModelType) -> Self {
        Self { name, from, to }
    }
}

/// The storage collection name derived from an edge type name.
///
/// `"blog::Authorship"` -> `"authorships"`.
pub fn derive_collection_name(edge_name: &str) -> String {
    snake_case(&pluralize(demodulize(edge_name)))
}

/// The handle label derived from an edge type name and configured suffix.
///
/// `"blog::Authorship"` + `"Collection"` -> `"AuthorshipsCollection"`.
pub fn derive_handle_name(edge_name: &str, suffix: &str) -> String {
    format!("{}{}", pluralize(demodulize(edge_name)), suffix)
}

/// A registered edge collection bound to one edge type.
#[derive(Debug)]
pub struct EdgeCollection {
    edge_type: EdgeType,
    name: String,
    handle_name: String,
}

impl EdgeCollection {
    pub(crate) fn new(edge_type: EdgeType, name: String, handle_name: String) -> Self {
        Self {
            edge_type,
            name,
            handle_name,
        }
    }

    /// The storage collection name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The derived handle label (pluralized edge type name + suffix).
    pub fn handle_name(&self) -> &str {
        &self.handle_name
    }

    pub fn edge_type(&self) -> EdgeType {
        self.edge_type
    }

    /// Which side of the edge a model type occupies.
    ///
    /// Matching neither endpoint is an unmapped-endpoint error; matching
    /// both (a self-edge) is ambiguous. Both are configuration mistakes.
    pub fn side_of(&self, model_type: ModelType) -> Result<EndpointField> {
        match (model_type == self.edge_type.from, model_type == self.edge_type.to) {
            (true, false) => Ok(EndpointField::From),
            (false, true) => Ok(EndpointField::To),
            (true, true) => Err(GraphError::AmbiguousEndpoint {
                edge: self.edge_type.name,
                model_type,
            }),
            (false, false) => Err(GraphError::UnmappedEndpoint {
                edge: self.edge_type.name,
                model_type,
            }),
        }
    }

    /// The endpoint model type on the other side of `owner_type`.
    pub fn target_type(&self, owner_type: ModelType) -> Result<ModelType> {
        Ok(match self.side_of(owner_type)? {
            EndpointField::From => self.edge_type.to,
            EndpointField::To => self.edge_type.from,
        })
    }

    /// The endpoint collection whose mapper claims the model.
    pub fn mapper_for_start(&self, ctx: &GraphContext, model: &Model) -> Result<Rc<Collection>> {
        let (claiming, _) = self.claiming_collections(ctx, model)?;
        Ok(claiming)
    }

    /// The endpoint collection on the other side of the model.
    pub fn mapper_for_target(&self, ctx: &GraphContext, model: &Model) -> Result<Rc<Collection>> {
        let (_, other) = self.claiming_collections(ctx, model)?;
        Ok(other)
    }

    fn claiming_collections(
        &self,
        ctx: &GraphContext,
        model: &Model,
    ) -> Result<(Rc<Collection>, Rc<Collection>)> {
        let from = ctx.collection_for(self.edge_type.from)?;
        let to = ctx.collection_for(self.edge_type.to)?;

        match (
            from.mapper().responsible_for(model),
            to.mapper().responsible_for(model),
        ) {
            (true, false) => Ok((from, to)),
            (false, true) => Ok((to, from)),
            (true, true) => Err(GraphError::AmbiguousEndpoint {
                edge: self.edge_type.name,
                model_type: model.model_type(),
            }),
            (false, false) => Err(GraphError::UnmappedEndpoint {
                edge: self.edge_type.name,
                model_type: model.model_type(),
            }),
        }
    }

    /// Builds an unexecuted neighbor traversal for a persisted model.
    pub fn neighbors(
        &self,
        ctx: &GraphContext,
        model: &ModelRef,
        direction: Direction,
    ) -> Result<NeighborsQuery> {
        let guard = model.borrow();
        let key = guard.key().ok_or(GraphError::UnsavedModel {
            model_type: guard.model_type(),
        })?;
        self.neighbors_by_key(ctx, guard.model_type(), key, direction)
    }

    /// Builds a neighbor traversal from an owner type and key.
    ///
    /// Used by relation proxies, which hold the owner's key rather than the
    /// owner itself.
    pub fn neighbors_by_key(
        &self,
        ctx: &GraphContext,
        owner_type: ModelType,
        key: &str,
        direction: Direction,
    ) -> Result<NeighborsQuery> {
        let target_type = self.target_type(owner_type)?;
        Ok(NeighborsQuery {
            params: TraversalParams {
                graph: ctx.graph_name().to_string(),
                model_key: key.to_string(),
                edge_collection: self.name.clone(),
                direction,
            },
            target_type,
        })
    }

    /// Keys of the edges currently stored with the given endpoint value.
    ///
    /// This is the full-replace set: everything returned here is deleted by
    /// the next transaction for this relation and vertex.
    pub fn old_edge_keys(
        &self,
        ctx: &GraphContext,
        field: EndpointField,
        id: &str,
    ) -> Result<Vec<String>> {
        let records = ctx.store().edges_by_example(&self.name, field, id)?;
        Ok(records.into_iter().map(|record| record.key).collect())
    }
}

/// A composable, unexecuted neighbor traversal.
#[derive(Clone, Debug)]
pub struct NeighborsQuery {
    params: TraversalParams,
    target_type: ModelType,
}

impl NeighborsQuery {
    /// The bound traversal parameters.
    pub fn params(&self) -> &TraversalParams {
        &self.params
    }

    /// The endpoint model type results will be mapped to.
    pub fn target_type(&self) -> ModelType {
        self.target_type
    }

    /// Executes the traversal, mapping each neighboring vertex document
    /// through the target endpoint's mapper.
    pub fn run(&self, ctx: &GraphContext) -> Result<Vec<NeighborEdge>> {
        let rows = ctx.store().neighbors(&self.params)?;
        let target = ctx.collection_for(self.target_type)?;

        let mut results = Vec::with_capacity(rows.len());
        for row in rows {
            let model = target.mapper().document_to_model(ctx, &row.vertex)?;
            results.push(NeighborEdge {
                edge_attributes: row.edge_attributes,
                model,
            });
        }
        Ok(results)
    }
}

/// One traversal result: the mapped neighbor model annotated with the
/// traversed edge's own attributes.
pub struct NeighborEdge {
    pub edge_attributes: Document,
    pub model: ModelRef,
}
