//! # Component Tuple Cache
//!
//! A tuple is a set of component types. Its cache holds one row per entity
//! that currently has a component of every type in the set:
//!
//! ```text
//! tuple {Mesh, Transform}      (type ids sorted: #0, #2)
//! ┌──────────┬──────────┬───────────────┐
//! │ entity   │ #0 Mesh  │ #2 Transform  │
//! ├──────────┼──────────┼───────────────┤
//! │ entity:4 │ h(0,12)  │ h(2,3)        │
//! │ entity:9 │ h(0,7)   │ h(2,8)        │
//! └──────────┴──────────┴───────────────┘
//! ```
//!
//! Caches are found through a combined hash of the sorted id set. Two
//! different sets may share a hash, so a lookup always compares the full
//! set before returning a cache.

use std::collections::HashMap;

use super::component::ComponentTypeId;
use super::entity::EntityId;
use super::handle::ComponentHandle;

/// One entity's components for a tuple, in the tuple's type order.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TupleRow {
    entity: EntityId,
    handles: Vec<ComponentHandle>,
}

impl TupleRow {
    /// The entity holding the components.
    #[inline]
    #[must_use]
    pub const fn entity(&self) -> EntityId {
        self.entity
    }

    /// One handle per type id of the tuple, in sorted type order.
    #[inline]
    #[must_use]
    pub fn handles(&self) -> &[ComponentHandle] {
        &self.handles
    }

    /// Handle of the given type, if it belongs to the tuple.
    #[must_use]
    pub fn handle(&self, component_type: ComponentTypeId) -> Option<ComponentHandle> {
        self.handles
            .iter()
            .copied()
            .find(|handle| handle.component_type() == component_type)
    }
}

/// Cached view over every entity matching one set of component types.
#[derive(Clone, Debug, Default)]
pub struct TupleCache {
    type_ids: Vec<ComponentTypeId>,
    rows: Vec<TupleRow>,
    row_of: HashMap<EntityId, usize>,
}

impl TupleCache {
    fn new(type_ids: Vec<ComponentTypeId>) -> Self {
        Self {
            type_ids,
            rows: Vec::new(),
            row_of: HashMap::new(),
        }
    }

    /// The tuple's type ids, sorted and deduplicated.
    #[inline]
    #[must_use]
    pub fn type_ids(&self) -> &[ComponentTypeId] {
        &self.type_ids
    }

    /// Number of matching entities.
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    /// Whether no entity matches.
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Iterates over matching entities. Order is unspecified.
    pub fn rows(&self) -> impl Iterator<Item = &TupleRow> {
        self.rows.iter()
    }

    /// Row of one entity, if it matches.
    #[must_use]
    pub fn row(&self, entity: EntityId) -> Option<&TupleRow> {
        self.rows.get(*self.row_of.get(&entity)?)
    }

    /// Whether `entity` has every component of the tuple.
    #[inline]
    #[must_use]
    pub fn contains(&self, entity: EntityId) -> bool {
        self.row_of.contains_key(&entity)
    }

    fn involves(&self, component_type: ComponentTypeId) -> bool {
        self.type_ids.binary_search(&component_type).is_ok()
    }

    /// Inserts or replaces the entity's row if every type resolves, removes
    /// it otherwise.
    fn refresh(
        &mut self,
        entity: EntityId,
        lookup: &dyn Fn(ComponentTypeId) -> Option<ComponentHandle>,
    ) {
        let handles: Option<Vec<ComponentHandle>> =
            self.type_ids.iter().map(|type_id| lookup(*type_id)).collect();

        match handles {
            Some(handles) => match self.row_of.get(&entity).copied() {
                Some(row) => self.rows[row].handles = handles,
                None => {
                    self.row_of.insert(entity, self.rows.len());
                    self.rows.push(TupleRow { entity, handles });
                }
            },
            None => self.remove(entity),
        }
    }

    fn remove(&mut self, entity: EntityId) {
        let Some(row) = self.row_of.remove(&entity) else {
            return;
        };
        self.rows.swap_remove(row);
        if let Some(moved) = self.rows.get(row) {
            self.row_of.insert(moved.entity, row);
        }
    }
}

/// Canonical form of a type id set: sorted, no duplicates.
#[must_use]
pub fn canonical_type_ids(type_ids: &[ComponentTypeId]) -> Vec<ComponentTypeId> {
    let mut ids = type_ids.to_vec();
    ids.sort_unstable();
    ids.dedup();
    ids
}

/// Combined hash of a canonical id set.
#[must_use]
pub fn hash_type_ids(type_ids: &[ComponentTypeId]) -> u64 {
    type_ids.iter().fold(0u64, |seed, type_id| {
        seed ^ u64::from(type_id.raw())
            .wrapping_add(0x9e37_79b9_7f4a_7c15)
            .wrapping_add(seed << 6)
            .wrapping_add(seed >> 2)
    })
}

/// Every registered tuple, bucketed by hash.
#[derive(Default)]
pub(crate) struct TupleRegistry {
    buckets: HashMap<u64, Vec<TupleCache>>,
}

impl TupleRegistry {
    /// Number of registered tuples.
    pub(crate) fn len(&self) -> usize {
        self.buckets.values().map(Vec::len).sum()
    }

    /// Registers a canonical id set. Returns `false` if it already exists.
    pub(crate) fn register(&mut self, type_ids: Vec<ComponentTypeId>) -> bool {
        let key = hash_type_ids(&type_ids);
        self.register_keyed(key, type_ids)
    }

    fn register_keyed(&mut self, key: u64, type_ids: Vec<ComponentTypeId>) -> bool {
        let bucket = self.buckets.entry(key).or_default();
        if bucket.iter().any(|cache| cache.type_ids == type_ids) {
            return false;
        }
        bucket.push(TupleCache::new(type_ids));
        true
    }

    /// Finds the cache of a canonical id set.
    pub(crate) fn get(&self, type_ids: &[ComponentTypeId]) -> Option<&TupleCache> {
        self.get_keyed(hash_type_ids(type_ids), type_ids)
    }

    fn get_keyed(&self, key: u64, type_ids: &[ComponentTypeId]) -> Option<&TupleCache> {
        self.buckets
            .get(&key)?
            .iter()
            .find(|cache| cache.type_ids == type_ids)
    }

    fn get_keyed_mut(
        &mut self,
        key: u64,
        type_ids: &[ComponentTypeId],
    ) -> Option<&mut TupleCache> {
        self.buckets
            .get_mut(&key)?
            .iter_mut()
            .find(|cache| cache.type_ids == type_ids)
    }

    /// Refreshes one entity in one tuple.
    pub(crate) fn refresh_in(
        &mut self,
        type_ids: &[ComponentTypeId],
        entity: EntityId,
        lookup: &dyn Fn(ComponentTypeId) -> Option<ComponentHandle>,
    ) {
        if let Some(cache) = self.get_keyed_mut(hash_type_ids(type_ids), type_ids) {
            cache.refresh(entity, lookup);
        }
    }

    /// Refreshes one entity in every tuple that involves `component_type`.
    pub(crate) fn refresh(
        &mut self,
        entity: EntityId,
        component_type: ComponentTypeId,
        lookup: &dyn Fn(ComponentTypeId) -> Option<ComponentHandle>,
    ) {
        for cache in self.caches_mut() {
            if cache.involves(component_type) {
                cache.refresh(entity, lookup);
            }
        }
    }

    /// Drops the entity's row from every tuple that involves
    /// `component_type`.
    pub(crate) fn component_removed(&mut self, entity: EntityId, component_type: ComponentTypeId) {
        for cache in self.caches_mut() {
            if cache.involves(component_type) {
                cache.remove(entity);
            }
        }
    }

    /// Drops the entity's row from every tuple.
    pub(crate) fn entity_removed(&mut self, entity: EntityId) {
        for cache in self.caches_mut() {
            cache.remove(entity);
        }
    }

    pub(crate) fn clear(&mut self) {
        self.buckets.clear();
    }

    fn caches_mut(&mut self) -> impl Iterator<Item = &mut TupleCache> {
        self.buckets.values_mut().flatten()
    }
}
