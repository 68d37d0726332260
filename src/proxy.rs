//! Lazy relation access.
//!
//! A [`RelationProxy`] stands in for the materialized result of a neighbor
//! traversal until something actually needs the value. It carries two
//! explicit states, `Unresolved` and `Resolved`, and a small accessor
//! surface; there is no catch-all forwarding. The first accessor call runs
//! the traversal through the edge-collection registry and memoizes the
//! result; errors are never cached, so resolving again (or building a fresh
//! proxy) after a failure is safe.
//!
//! Resolution is not safe for concurrent first access on one proxy
//! instance. The mapping layer is single-threaded per unit of work, which
//! makes the `RefCell` state sound.

use std::cell::RefCell;
use std::collections::BTreeMap;

use tracing::debug;

use crate::context::GraphContext;
use crate::document::HASH_KEY_FIELD;
use crate::edge_collection::EdgeType;
use crate::error::Result;
use crate::mapper::AttributeShape;
use crate::model::{ModelRef, ModelType};
use crate::store::Direction;

/// How a resolved relation is shaped.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ProxyVariant {
    /// At most one related model.
    Single,
    /// An ordered list of related models.
    Array,
    /// Related models keyed by the edge-carried `hash_key` attribute.
    Hash,
}

/// A materialized relation value.
#[derive(Clone, Debug)]
pub enum RelationTarget {
    Single(Option<ModelRef>),
    List(Vec<ModelRef>),
    Map(BTreeMap<String, ModelRef>),
}

impl RelationTarget {
    /// The empty value of a declared multiplicity.
    pub fn empty(shape: AttributeShape) -> Self {
        match shape {
            AttributeShape::Scalar => Self::Single(None),
            AttributeShape::List => Self::List(Vec::new()),
            AttributeShape::Map => Self::Map(BTreeMap::new()),
        }
    }

    /// Every related model, flattened.
    pub fn models(&self) -> Vec<ModelRef> {
        match self {
            Self::Single(model) => model.iter().cloned().collect(),
            Self::List(models) => models.clone(),
            Self::Map(models) => models.values().cloned().collect(),
        }
    }

    /// Number of related models.
    pub fn len(&self) -> usize {
        match self {
            Self::Single(model) => usize::from(model.is_some()),
            Self::List(models) => models.len(),
            Self::Map(models) => models.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[derive(Debug)]
enum ProxyState {
    Unresolved,
    Resolved(RelationTarget),
}

/// Lazily resolved relation attribute value.
pub struct RelationProxy {
    owner_type: ModelType,
    owner_key: String,
    edge_type: EdgeType,
    variant: ProxyVariant,
    inverse: bool,
    state: RefCell<ProxyState>,
}

impl RelationProxy {
    /// Creates an unresolved proxy for a relation of `owner`.
    pub fn new(
        owner_type: ModelType,
        owner_key: impl Into<String>,
        edge_type: EdgeType,
        variant: ProxyVariant,
        inverse: bool,
    ) -> Self {
        Self {
            owner_type,
            owner_key: owner_key.into(),
            edge_type,
            variant,
            inverse,
            state: RefCell::new(ProxyState::Unresolved),
        }
    }

    pub fn variant(&self) -> ProxyVariant {
        self.variant
    }

    pub fn edge_type(&self) -> EdgeType {
        self.edge_type
    }

    pub fn is_inverse(&self) -> bool {
        self.inverse
    }

    /// Traversal direction: inbound for inverse relations, outbound otherwise.
    pub fn direction(&self) -> Direction {
        if self.inverse {
            Direction::Inbound
        } else {
            Direction::Outbound
        }
    }

    /// True once a first access has materialized the target.
    pub fn is_resolved(&self) -> bool {
        matches!(&*self.state.borrow(), ProxyState::Resolved(_))
    }

    /// Materializes the relation, running the neighbor traversal on first
    /// call and reusing the memoized target afterwards.
    pub fn resolve(&self, ctx: &GraphContext) -> Result<RelationTarget> {
        if let ProxyState::Resolved(target) = &*self.state.borrow() {
            return Ok(target.clone());
        }

        let edge_collection = ctx.edge_collection(self.edge_type.name)?;
        let query =
            edge_collection.neighbors_by_key(ctx, self.owner_type, &self.owner_key, self.direction())?;
        let results = query.run(ctx)?;

        let target = match self.variant {
            ProxyVariant::Single => {
                RelationTarget::Single(results.into_iter().next().map(|r| r.model))
            }
            ProxyVariant::Array => {
                RelationTarget::List(results.into_iter().map(|r| r.model).collect())
            }
            ProxyVariant::Hash => {
                let mut models = BTreeMap::new();
                for result in results {
                    // Edges written without a hash_key cannot be keyed.
                    if let Some(key) = result.edge_attributes.get_str(HASH_KEY_FIELD) {
                        models.insert(key.to_string(), result.model);
                    }
                }
                RelationTarget::Map(models)
            }
        };

        debug!(
            edge = self.edge_type.name,
            owner = %self.owner_key,
            related = target.len(),
            "resolved relation proxy"
        );
        *self.state.borrow_mut() = ProxyState::Resolved(target.clone());
        Ok(target)
    }

    /// The single related model (first result for list/map shapes).
    pub fn get(&self, ctx: &GraphContext) -> Result<Option<ModelRef>> {
        Ok(self.resolve(ctx)?.models().into_iter().next())
    }

    /// All related models in traversal order.
    pub fn to_vec(&self, ctx: &GraphContext) -> Result<Vec<ModelRef>> {
        Ok(self.resolve(ctx)?.models())
    }

    /// The related model stored under a map key, for Hash relations.
    pub fn get_key(&self, ctx: &GraphContext, key: &str) -> Result<Option<ModelRef>> {
        Ok(match self.resolve(ctx)? {
            RelationTarget::Map(models) => models.get(key).cloned(),
            _ => None,
        })
    }

    /// Key/model pairs, for Hash relations (empty otherwise).
    pub fn entries(&self, ctx: &GraphContext) -> Result<Vec<(String, ModelRef)>> {
        Ok(match self.resolve(ctx)? {
            RelationTarget::Map(models) => models.into_iter().collect(),
            _ => Vec::new(),
        })
    }

    /// Number of related models.
    pub fn len(&self, ctx: &GraphContext) -> Result<usize> {
        Ok(self.resolve(ctx)?.len())
    }

    pub fn is_empty(&self, ctx: &GraphContext) -> Result<bool> {
        Ok(self.resolve(ctx)?.is_empty())
    }
}
