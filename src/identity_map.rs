//! Per-unit-of-work cache guaranteeing one in-memory instance per persisted key.
//!
//! The map is owned by a [`GraphContext`](crate::context::GraphContext) and
//! lives exactly as long as the unit of work it belongs to. It is what makes
//! cyclic relations (A→B→A) resolvable without infinite recursion: relation
//! attributes are attached as unmaterialized proxies, so mapping a document
//! never eagerly walks the graph, and a second lookup for the same key hits
//! the cache instead of building a second instance.

use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

use crate::model::{ModelRef, ModelType};

/// Cache keyed by `(ModelType, key)`.
#[derive(Default)]
pub struct IdentityMap {
    cache: RefCell<HashMap<(ModelType, String), ModelRef>>,
}

impl IdentityMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the cached instance for `(model_type, key)`, or evaluates
    /// `build` once and caches its result.
    ///
    /// The cache borrow is released before `build` runs, so a builder that
    /// recursively maps other documents (or even re-enters for the same key)
    /// cannot deadlock; if a same-key entry appears during the build, the
    /// earlier insert wins.
    pub fn retrieve_or_store<F, E>(
        &self,
        model_type: ModelType,
        key: &str,
        build: F,
    ) -> Result<ModelRef, E>
    where
        F: FnOnce() -> Result<ModelRef, E>,
    {
        if let Some(hit) = self.cache.borrow().get(&(model_type, key.to_owned())) {
            return Ok(Rc::clone(hit));
        }

        let built = build()?;

        let mut cache = self.cache.borrow_mut();
        let entry = cache.entry((model_type, key.to_owned())).or_insert(built);
        Ok(Rc::clone(entry))
    }

    /// Returns the cached instance without building.
    pub fn get(&self, model_type: ModelType, key: &str) -> Option<ModelRef> {
        self.cache
            .borrow()
            .get(&(model_type, key.to_owned()))
            .map(Rc::clone)
    }

    /// Number of cached instances.
    pub fn len(&self) -> usize {
        self.cache.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.cache.borrow().is_empty()
    }

    /// Drops every cached instance.
    pub fn clear(&self) {
        self.cache.borrow_mut().clear();
    }
}
