//! # Component Collections
//!
//! One collection per registered component type. Each wraps a slot pool of
//! that type's payloads together with a per-slot active flag and the entity
//! the component is attached to, if any.
//!
//! The manager keeps collections behind the type-erased
//! [`ErasedCollection`] trait so it can route by [`ComponentTypeId`] alone;
//! typed access goes through a downcast to [`ComponentCollection<T>`].

use std::any::Any;

use super::component::{Component, ComponentTypeId};
use super::entity::EntityId;
use super::handle::ComponentHandle;
use crate::memory::{PoolHandle, SlotPool};

/// Payload plus bookkeeping for one component slot.
struct ComponentRecord<T> {
    data: T,
    active: bool,
    owner: Option<EntityId>,
}

/// Storage for a single component type.
///
/// Handles are checked against both the collection's type id and the slot
/// generation, so a handle into another collection or to a destroyed
/// component never resolves.
///
/// # Example
///
/// ```rust
/// use tessera_core::{Component, ComponentCollection, ComponentTypeId};
///
/// #[derive(Clone, Default, PartialEq, Debug)]
/// struct Label(String);
///
/// impl Component for Label {
///     const NAME: &'static str = "Label";
/// }
///
/// let mut labels = ComponentCollection::<Label>::new(ComponentTypeId::new(0), 64);
/// let handle = labels.create(Label("root".into()));
/// assert_eq!(labels.get(handle), Some(&Label("root".into())));
/// ```
pub struct ComponentCollection<T: Component> {
    type_id: ComponentTypeId,
    pool: SlotPool<ComponentRecord<T>>,
}

impl<T: Component> ComponentCollection<T> {
    /// Creates an empty collection for the type registered as `type_id`.
    ///
    /// # Panics
    ///
    /// Panics if `chunk_size` is zero.
    #[must_use]
    pub fn new(type_id: ComponentTypeId, chunk_size: usize) -> Self {
        Self {
            type_id,
            pool: SlotPool::new(chunk_size),
        }
    }

    /// Returns the type id this collection was registered with.
    #[inline]
    #[must_use]
    pub const fn component_type(&self) -> ComponentTypeId {
        self.type_id
    }

    /// Returns the number of live components.
    #[inline]
    #[must_use]
    pub const fn len(&self) -> usize {
        self.pool.allocated_count()
    }

    /// Returns `true` if the collection holds no component.
    #[inline]
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.pool.is_empty()
    }

    /// Returns the number of storage chunks grown so far.
    #[inline]
    #[must_use]
    pub fn chunk_count(&self) -> usize {
        self.pool.chunk_count()
    }

    /// Stores `data` in a new, active, unattached slot.
    pub fn create(&mut self, data: T) -> ComponentHandle {
        let slot = self.pool.allocate(ComponentRecord {
            data,
            active: true,
            owner: None,
        });
        ComponentHandle::new(self.type_id, slot)
    }

    /// Frees the component's slot and returns its payload.
    ///
    /// Returns `None` (and does nothing) for a null, stale or foreign handle.
    pub fn destroy(&mut self, handle: ComponentHandle) -> Option<T> {
        let slot = self.slot_of(handle)?;
        self.pool.deallocate(slot).map(|record| record.data)
    }

    /// Checks if `handle` refers to a live component of this collection.
    #[inline]
    #[must_use]
    pub fn contains(&self, handle: ComponentHandle) -> bool {
        self.record(handle).is_some()
    }

    /// Gets the payload behind `handle`.
    #[inline]
    #[must_use]
    pub fn get(&self, handle: ComponentHandle) -> Option<&T> {
        self.record(handle).map(|record| &record.data)
    }

    /// Gets the payload behind `handle` mutably.
    #[inline]
    pub fn get_mut(&mut self, handle: ComponentHandle) -> Option<&mut T> {
        let slot = self.slot_of(handle)?;
        self.pool.get_mut(slot).map(|record| &mut record.data)
    }

    /// Gets the payload stored at a raw slot index.
    #[inline]
    #[must_use]
    pub fn get_at(&self, index: u32) -> Option<&T> {
        self.pool.get_at(index).map(|record| &record.data)
    }

    /// Whether the component is active. `false` for an invalid handle.
    #[inline]
    #[must_use]
    pub fn is_active(&self, handle: ComponentHandle) -> bool {
        self.record(handle).is_some_and(|record| record.active)
    }

    /// Marks the slot active or inactive. Returns `false` for an invalid
    /// handle.
    pub fn set_active(&mut self, handle: ComponentHandle, active: bool) -> bool {
        match self.record_mut(handle) {
            Some(record) => {
                record.active = active;
                true
            }
            None => false,
        }
    }

    /// The entity this component is attached to.
    #[inline]
    #[must_use]
    pub fn owner(&self, handle: ComponentHandle) -> Option<EntityId> {
        self.record(handle)?.owner
    }

    /// Records the entity this component is attached to.
    pub fn set_owner(&mut self, handle: ComponentHandle, owner: Option<EntityId>) -> bool {
        match self.record_mut(handle) {
            Some(record) => {
                record.owner = owner;
                true
            }
            None => false,
        }
    }

    /// Duplicates the payload into a new slot.
    ///
    /// The clone is active and unattached whatever the source's state.
    pub fn clone_component(&mut self, handle: ComponentHandle) -> Option<ComponentHandle> {
        let data = self.get(handle)?.clone();
        Some(self.create(data))
    }

    /// Moves the payload out into `destination` and frees the slot.
    ///
    /// `handle` and every copy of it become stale; the caller is responsible
    /// for repointing anything that referenced the old slot. Returns `false`
    /// (leaving `destination` untouched) for an invalid handle.
    pub fn move_data(&mut self, handle: ComponentHandle, destination: &mut T) -> bool {
        match self.destroy(handle) {
            Some(data) => {
                *destination = data;
                true
            }
            None => false,
        }
    }

    /// Iterates over all live components in slot order.
    pub fn iter(&self) -> impl Iterator<Item = (ComponentHandle, &T)> {
        let type_id = self.type_id;
        self.pool
            .iter()
            .map(move |(slot, record)| (ComponentHandle::new(type_id, slot), &record.data))
    }

    /// Iterates over active components only.
    pub fn iter_active(&self) -> impl Iterator<Item = (ComponentHandle, &T)> {
        let type_id = self.type_id;
        self.pool
            .iter()
            .filter(|(_, record)| record.active)
            .map(move |(slot, record)| (ComponentHandle::new(type_id, slot), &record.data))
    }

    /// Iterates mutably over active components only.
    pub fn iter_active_mut(&mut self) -> impl Iterator<Item = (ComponentHandle, &mut T)> {
        let type_id = self.type_id;
        self.pool
            .iter_mut()
            .filter(|(_, record)| record.active)
            .map(move |(slot, record)| (ComponentHandle::new(type_id, slot), &mut record.data))
    }

    /// Drops every component. All outstanding handles become stale.
    pub fn clear(&mut self) {
        self.pool.clear();
    }

    #[inline]
    fn slot_of(&self, handle: ComponentHandle) -> Option<PoolHandle> {
        (handle.component_type() == self.type_id).then_some(handle.slot())
    }

    #[inline]
    fn record(&self, handle: ComponentHandle) -> Option<&ComponentRecord<T>> {
        self.pool.get(self.slot_of(handle)?)
    }

    #[inline]
    fn record_mut(&mut self, handle: ComponentHandle) -> Option<&mut ComponentRecord<T>> {
        let slot = self.slot_of(handle)?;
        self.pool.get_mut(slot)
    }
}

/// Type-erased view of a [`ComponentCollection`].
///
/// This is what the manager stores per registered type; it covers every
/// operation that does not need the concrete payload type.
pub trait ErasedCollection {
    /// Type id the collection was registered with.
    fn component_type(&self) -> ComponentTypeId;
    /// Registration name of the payload type.
    fn name(&self) -> &'static str;
    /// Number of live components.
    fn len(&self) -> usize;
    /// Whether the collection is empty.
    fn is_empty(&self) -> bool {
        self.len() == 0
    }
    /// Creates a component holding the payload type's default value.
    fn create_default(&mut self) -> ComponentHandle;
    /// Frees a component. `false` for an invalid handle.
    fn release(&mut self, handle: ComponentHandle) -> bool;
    /// Checks if `handle` refers to a live component.
    fn contains(&self, handle: ComponentHandle) -> bool;
    /// Whether the component is active.
    fn is_active(&self, handle: ComponentHandle) -> bool;
    /// Marks the component active or inactive.
    fn set_active(&mut self, handle: ComponentHandle, active: bool) -> bool;
    /// The entity the component is attached to.
    fn owner(&self, handle: ComponentHandle) -> Option<EntityId>;
    /// Records the entity the component is attached to.
    fn set_owner(&mut self, handle: ComponentHandle, owner: Option<EntityId>) -> bool;
    /// Duplicates the payload into a new slot.
    fn clone_component(&mut self, handle: ComponentHandle) -> Option<ComponentHandle>;
    /// Payload as `&dyn Any`.
    fn get_raw(&self, handle: ComponentHandle) -> Option<&dyn Any>;
    /// Payload as `&mut dyn Any`.
    fn get_raw_mut(&mut self, handle: ComponentHandle) -> Option<&mut dyn Any>;
    /// Moves the payload into `destination`, which must be the payload type.
    fn move_data_raw(&mut self, handle: ComponentHandle, destination: &mut dyn Any) -> bool;
    /// Drops every component.
    fn clear(&mut self);
    /// Upcast for typed access.
    fn as_any(&self) -> &dyn Any;
    /// Mutable upcast for typed access.
    fn as_any_mut(&mut self) -> &mut dyn Any;
}

impl<T: Component> ErasedCollection for ComponentCollection<T> {
    fn component_type(&self) -> ComponentTypeId {
        self.type_id
    }

    fn name(&self) -> &'static str {
        T::NAME
    }

    fn len(&self) -> usize {
        self.pool.allocated_count()
    }

    fn create_default(&mut self) -> ComponentHandle {
        self.create(T::default())
    }

    fn release(&mut self, handle: ComponentHandle) -> bool {
        self.destroy(handle).is_some()
    }

    fn contains(&self, handle: ComponentHandle) -> bool {
        self.record(handle).is_some()
    }

    fn is_active(&self, handle: ComponentHandle) -> bool {
        self.record(handle).is_some_and(|record| record.active)
    }

    fn set_active(&mut self, handle: ComponentHandle, active: bool) -> bool {
        ComponentCollection::set_active(self, handle, active)
    }

    fn owner(&self, handle: ComponentHandle) -> Option<EntityId> {
        self.record(handle)?.owner
    }

    fn set_owner(&mut self, handle: ComponentHandle, owner: Option<EntityId>) -> bool {
        ComponentCollection::set_owner(self, handle, owner)
    }

    fn clone_component(&mut self, handle: ComponentHandle) -> Option<ComponentHandle> {
        ComponentCollection::clone_component(self, handle)
    }

    fn get_raw(&self, handle: ComponentHandle) -> Option<&dyn Any> {
        self.get(handle).map(|data| data as &dyn Any)
    }

    fn get_raw_mut(&mut self, handle: ComponentHandle) -> Option<&mut dyn Any> {
        self.get_mut(handle).map(|data| data as &mut dyn Any)
    }

    fn move_data_raw(&mut self, handle: ComponentHandle, destination: &mut dyn Any) -> bool {
        match destination.downcast_mut::<T>() {
            Some(destination) => self.move_data(handle, destination),
            None => false,
        }
    }

    fn clear(&mut self) {
        self.pool.clear();
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}
