//! # Entity Records
//!
//! Entities are identified two ways:
//! - [`EntityId`]: sequential, never reused, stable for the entity's lifetime
//! - [`EntityHandle`](super::EntityHandle): weak reference to the record's
//!   slot in the entity pool
//!
//! Hierarchy edges and component attachments live in their own node pools
//! as singly linked lists; a record only stores the list heads.

use std::fmt;

use serde::{Deserialize, Serialize};

use super::handle::ComponentHandle;
use crate::memory::PoolHandle;

/// Unique, sequential identifier for an entity.
///
/// Ids are assigned in creation order and never handed out twice.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(transparent)]
pub struct EntityId(u64);

impl EntityId {
    /// Null/invalid entity ID.
    pub const INVALID: Self = Self(u64::MAX);

    /// Creates an id from its raw value.
    #[inline]
    #[must_use]
    pub const fn new(raw: u64) -> Self {
        Self(raw)
    }

    /// Returns the raw id.
    #[inline]
    #[must_use]
    pub const fn raw(self) -> u64 {
        self.0
    }

    /// Checks that this is not the [`INVALID`](Self::INVALID) sentinel.
    #[inline]
    #[must_use]
    pub const fn is_valid(self) -> bool {
        self.0 != u64::MAX
    }
}

impl Default for EntityId {
    fn default() -> Self {
        Self::INVALID
    }
}

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_valid() {
            write!(f, "entity:{}", self.0)
        } else {
            f.write_str("entity:invalid")
        }
    }
}

/// What happens to the children of a destroyed entity.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DestroyPolicy {
    /// Destroy the whole subtree.
    #[default]
    DestroyChildren,
    /// Move the children to the destroyed entity's parent (or make them
    /// roots). They are appended after the parent's existing children.
    ReparentChildren,
}

/// Entity record stored in the entity pool.
///
/// A record only exists while its entity is alive; liveness is pool
/// membership, see `EntitiesCollection::is_alive`.
#[derive(Clone, Debug)]
pub struct EntityRecord {
    pub(crate) id: EntityId,
    pub(crate) enabled: bool,
    pub(crate) active: bool,
    pub(crate) parent: Option<EntityId>,
    pub(crate) children_head: Option<PoolHandle>,
    pub(crate) children_tail: Option<PoolHandle>,
    pub(crate) children_count: usize,
    pub(crate) components_head: Option<PoolHandle>,
    pub(crate) components_count: usize,
    pub(crate) depth: u32,
}

impl EntityRecord {
    /// Creates an enabled, active, parentless record.
    #[inline]
    #[must_use]
    pub const fn new(id: EntityId) -> Self {
        Self {
            id,
            enabled: true,
            active: true,
            parent: None,
            children_head: None,
            children_tail: None,
            children_count: 0,
            components_head: None,
            components_count: 0,
            depth: 0,
        }
    }

    /// Returns the entity id.
    #[inline]
    #[must_use]
    pub const fn id(&self) -> EntityId {
        self.id
    }

    /// The entity's own enabled flag.
    #[inline]
    #[must_use]
    pub const fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Effective activation: own enabled flag AND every ancestor's.
    #[inline]
    #[must_use]
    pub const fn is_active(&self) -> bool {
        self.active
    }

    /// Parent id, if any.
    #[inline]
    #[must_use]
    pub const fn parent(&self) -> Option<EntityId> {
        self.parent
    }

    /// Number of direct children.
    #[inline]
    #[must_use]
    pub const fn children_count(&self) -> usize {
        self.children_count
    }

    /// Number of attached components.
    #[inline]
    #[must_use]
    pub const fn components_count(&self) -> usize {
        self.components_count
    }

    /// Distance to the root of the entity's tree (roots are at depth 0).
    #[inline]
    #[must_use]
    pub const fn depth(&self) -> u32 {
        self.depth
    }
}

/// One parent -> child edge in the hierarchy node pool.
#[derive(Clone, Copy, Debug)]
pub(crate) struct HierarchyNode {
    pub(crate) next: Option<PoolHandle>,
    pub(crate) child: EntityId,
}

/// One attached component in the component-map node pool.
#[derive(Clone, Copy, Debug)]
pub(crate) struct ComponentMapNode {
    pub(crate) next: Option<PoolHandle>,
    pub(crate) handle: ComponentHandle,
}
