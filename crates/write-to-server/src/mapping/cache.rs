//! Process-wide memo of context mappings.
//!
//! A context's model is described once per context type and reused by every
//! later bulk insert. Entries are never invalidated: a schema change at
//! runtime needs a new process (or a private [`MappingCache`]).

use std::any::TypeId;
use std::sync::{Arc, LazyLock};

use dashmap::DashMap;

use super::DbMapping;
use crate::context::DbContext;
use crate::error::Result;

static GLOBAL: LazyLock<MappingCache> = LazyLock::new(MappingCache::new);

/// Mappings keyed by context type.
///
/// The first resolve for a context type builds the mapping while holding
/// that key's shard lock, so concurrent first callers wait for one build and
/// share its result. `on_model_creating` must not resolve mappings itself.
#[derive(Debug, Default)]
pub struct MappingCache {
    entries: DashMap<TypeId, Arc<DbMapping>>,
}

impl MappingCache {
    /// Create an empty cache.
    pub fn new() -> Self {
        Self::default()
    }

    /// The cache shared by all contexts in the process.
    pub fn global() -> &'static MappingCache {
        &GLOBAL
    }

    /// Mapping for `context`'s type, built on first access.
    pub fn resolve<C: DbContext>(&self, context: &C) -> Result<Arc<DbMapping>> {
        let key = TypeId::of::<C>();
        if let Some(existing) = self.entries.get(&key) {
            return Ok(Arc::clone(existing.value()));
        }

        let entry = self
            .entries
            .entry(key)
            .or_try_insert_with(|| DbMapping::build(context).map(Arc::new))?;
        Ok(Arc::clone(entry.value()))
    }

    /// Whether a mapping for context type `C` has been built.
    pub fn contains<C: DbContext>(&self) -> bool {
        self.entries.contains_key(&TypeId::of::<C>())
    }

    /// Number of cached context types.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether nothing has been cached yet.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
