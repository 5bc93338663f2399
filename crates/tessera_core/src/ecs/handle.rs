//! # Handles
//!
//! Weak references to entities and components.
//!
//! A handle is a domain tag (entity, or a component type id) plus a pool
//! slot and the generation that slot had when the handle was issued. It
//! says where to look; it owns nothing and keeps nothing alive. Once the
//! referent is destroyed the slot generation moves on and the handle stops
//! resolving, even if the slot is reused by an unrelated value.

use super::component::ComponentTypeId;
use crate::memory::PoolHandle;

/// The store a handle points into.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum HandleDomain {
    /// The entity pool.
    Entity,
    /// The collection of one component type.
    Component(ComponentTypeId),
}

/// Weak reference to an entity record.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct EntityHandle {
    slot: PoolHandle,
}

impl EntityHandle {
    /// Null/invalid entity handle.
    pub const NULL: Self = Self {
        slot: PoolHandle::NULL,
    };

    /// Wraps a slot of the entity pool.
    #[inline]
    #[must_use]
    pub const fn new(slot: PoolHandle) -> Self {
        Self { slot }
    }

    /// Returns the underlying pool slot.
    #[inline]
    #[must_use]
    pub const fn slot(self) -> PoolHandle {
        self.slot
    }

    /// Returns the slot index.
    #[inline]
    #[must_use]
    pub const fn index(self) -> u32 {
        self.slot.index()
    }

    /// Returns the slot generation this handle was issued with.
    #[inline]
    #[must_use]
    pub const fn generation(self) -> u32 {
        self.slot.generation()
    }

    /// Always [`HandleDomain::Entity`].
    #[inline]
    #[must_use]
    pub const fn domain(self) -> HandleDomain {
        HandleDomain::Entity
    }

    /// Checks if this is the null handle.
    #[inline]
    #[must_use]
    pub const fn is_null(self) -> bool {
        self.slot.is_null()
    }
}

impl Default for EntityHandle {
    fn default() -> Self {
        Self::NULL
    }
}

/// Weak reference to one component payload.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ComponentHandle {
    type_id: ComponentTypeId,
    slot: PoolHandle,
}

impl ComponentHandle {
    /// Null/invalid component handle.
    pub const NULL: Self = Self {
        type_id: ComponentTypeId::INVALID,
        slot: PoolHandle::NULL,
    };

    /// Creates a handle to a slot of the collection of `type_id`.
    #[inline]
    #[must_use]
    pub const fn new(type_id: ComponentTypeId, slot: PoolHandle) -> Self {
        Self { type_id, slot }
    }

    /// Returns the component type this handle points into.
    #[inline]
    #[must_use]
    pub const fn component_type(self) -> ComponentTypeId {
        self.type_id
    }

    /// Returns the underlying pool slot.
    #[inline]
    #[must_use]
    pub const fn slot(self) -> PoolHandle {
        self.slot
    }

    /// Returns the slot index.
    #[inline]
    #[must_use]
    pub const fn index(self) -> u32 {
        self.slot.index()
    }

    /// Returns the slot generation this handle was issued with.
    #[inline]
    #[must_use]
    pub const fn generation(self) -> u32 {
        self.slot.generation()
    }

    /// Returns the component domain of this handle.
    #[inline]
    #[must_use]
    pub const fn domain(self) -> HandleDomain {
        HandleDomain::Component(self.type_id)
    }

    /// Checks if this is the null handle.
    #[inline]
    #[must_use]
    pub const fn is_null(self) -> bool {
        !self.type_id.is_valid() || self.slot.is_null()
    }
}

impl Default for ComponentHandle {
    fn default() -> Self {
        Self::NULL
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_handle_equality_includes_generation() {
        let type_id = ComponentTypeId::new(1);
        let a = ComponentHandle::new(type_id, PoolHandle::new(5, 0));
        let b = ComponentHandle::new(type_id, PoolHandle::new(5, 1));
        let c = ComponentHandle::new(ComponentTypeId::new(2), PoolHandle::new(5, 0));

        assert_ne!(a, b);
        assert_ne!(a, c);
        assert_eq!(a, ComponentHandle::new(type_id, PoolHandle::new(5, 0)));
    }

    #[test]
    fn test_domains() {
        let entity = EntityHandle::new(PoolHandle::new(0, 0));
        assert_eq!(entity.domain(), HandleDomain::Entity);

        let component = ComponentHandle::new(ComponentTypeId::new(4), PoolHandle::new(0, 0));
        assert_eq!(
            component.domain(),
            HandleDomain::Component(ComponentTypeId::new(4))
        );
    }

    #[test]
    fn test_null_handles() {
        assert!(EntityHandle::default().is_null());
        assert!(ComponentHandle::default().is_null());
        assert!(!EntityHandle::new(PoolHandle::new(0, 0)).is_null());
    }
}
