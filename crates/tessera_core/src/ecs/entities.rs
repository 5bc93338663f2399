//! # Entities Collection
//!
//! Owns every entity record plus the two node pools that hang off them:
//!
//! ```text
//! records:        [E0] [E1] [E2] ...          id -> slot lookup table
//!                   |children_head
//! hierarchy:      (E1) -> (E2) -> None        one node per parent/child edge
//!                   |components_head
//! component map:  (h:Mesh) -> (h:Label) -> None   one node per attachment
//! ```
//!
//! Both lists are singly linked through stable pool handles, so growing a
//! node pool never invalidates a link.
//!
//! ## Ordering
//!
//! - Children are appended at the tail; iteration and `child_at` follow
//!   insertion order. `child_at(k)` is O(k).
//! - Components are appended at the tail of the component map.
//!
//! ## Activation
//!
//! `active = enabled AND parent.active`. Any change is pushed to the
//! entity's components (through [`EntityListener::component_activation_changed`])
//! and down the subtree, stopping wherever the effective flag does not move.

use std::cmp::Ordering;
use std::collections::HashMap;

use super::component::ComponentTypeId;
use super::entity::{ComponentMapNode, DestroyPolicy, EntityId, EntityRecord, HierarchyNode};
use super::handle::{ComponentHandle, EntityHandle};
use crate::error::{EcsError, EcsResult};
use crate::memory::{PoolHandle, SlotPool, DEFAULT_CHUNK_SIZE};

/// Default slots per chunk of the hierarchy and component-map node pools.
pub const DEFAULT_NODE_CHUNK_SIZE: usize = 256;

/// Receives the side effects of entity operations.
///
/// The collection does not own component storage or notification
/// delegates; whoever drives it (normally the manager) plugs them in here.
/// Every method defaults to doing nothing, and `()` ignores everything.
/// Lifecycle methods also get the collection itself, in the state the
/// notification describes.
pub trait EntityListener {
    /// An entity was created.
    fn entity_created(&mut self, _entities: &EntitiesCollection, _entity: EntityId) {}
    /// An entity is being destroyed; it is already unlinked from its parent
    /// and its components, and its record is still readable.
    fn entity_destroyed(&mut self, _entities: &EntitiesCollection, _entity: EntityId) {}
    /// A component was linked into an entity's component map.
    fn component_attached(
        &mut self,
        _entities: &EntitiesCollection,
        _entity: EntityId,
        _handle: ComponentHandle,
    ) {
    }
    /// A component is about to be unlinked from an entity's component map;
    /// the link is still in place.
    fn component_detached(
        &mut self,
        _entities: &EntitiesCollection,
        _entity: EntityId,
        _handle: ComponentHandle,
    ) {
    }
    /// A component's effective activation must follow its entity's.
    fn component_activation_changed(&mut self, _handle: ComponentHandle, _active: bool) {}
}

impl EntityListener for () {}

/// Iterator over the children of one entity, in insertion order.
pub struct Children<'a> {
    nodes: &'a SlotPool<HierarchyNode>,
    cursor: Option<PoolHandle>,
}

impl Iterator for Children<'_> {
    type Item = EntityId;

    fn next(&mut self) -> Option<Self::Item> {
        let node = self.nodes.get(self.cursor?)?;
        self.cursor = node.next;
        Some(node.child)
    }
}

/// Iterator over the component handles attached to one entity.
pub struct Components<'a> {
    nodes: &'a SlotPool<ComponentMapNode>,
    cursor: Option<PoolHandle>,
}

impl Iterator for Components<'_> {
    type Item = ComponentHandle;

    fn next(&mut self) -> Option<Self::Item> {
        let node = self.nodes.get(self.cursor?)?;
        self.cursor = node.next;
        Some(node.handle)
    }
}

/// Entity records, hierarchy and component mapping.
pub struct EntitiesCollection {
    records: SlotPool<EntityRecord>,
    ids: HashMap<EntityId, PoolHandle>,
    hierarchy: SlotPool<HierarchyNode>,
    component_map: SlotPool<ComponentMapNode>,
    next_id: u64,
    active_count: usize,
}

impl EntitiesCollection {
    /// Creates an empty collection.
    ///
    /// # Panics
    ///
    /// Panics if either chunk size is zero.
    #[must_use]
    pub fn new(entity_chunk_size: usize, node_chunk_size: usize) -> Self {
        Self {
            records: SlotPool::new(entity_chunk_size),
            ids: HashMap::new(),
            hierarchy: SlotPool::new(node_chunk_size),
            component_map: SlotPool::new(node_chunk_size),
            next_id: 0,
            active_count: 0,
        }
    }

    /// Number of live entities.
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.records.allocated_count()
    }

    /// Whether no entity is alive.
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Number of live entities whose effective activation is on.
    #[inline]
    #[must_use]
    pub const fn active_count(&self) -> usize {
        self.active_count
    }

    // =========================================================================
    // Lifecycle
    // =========================================================================

    /// Creates an enabled, active root entity with the next sequential id.
    pub fn create_entity(&mut self, listener: &mut dyn EntityListener) -> EntityHandle {
        let id = EntityId::new(self.next_id);
        self.next_id += 1;

        let slot = self.records.allocate(EntityRecord::new(id));
        self.ids.insert(id, slot);
        self.active_count += 1;

        listener.entity_created(&*self, id);
        EntityHandle::new(slot)
    }

    /// Destroys an entity.
    ///
    /// The entity is detached from its parent and every attached component
    /// is unlinked (one detach notification each). Children are destroyed
    /// or reparented according to `policy`. Returns `false` if the entity
    /// is not alive.
    pub fn destroy_entity(
        &mut self,
        id: EntityId,
        policy: DestroyPolicy,
        listener: &mut dyn EntityListener,
    ) -> bool {
        if !self.is_alive(id) {
            return false;
        }

        match policy {
            DestroyPolicy::DestroyChildren => {
                // Breadth-first order lists every entity before its
                // descendants; reversed, leaves go first.
                for entity in self.branch(id).into_iter().rev() {
                    self.destroy_single(entity, listener);
                }
            }
            DestroyPolicy::ReparentChildren => {
                let parent = self.parent_of(id);
                let children: Vec<EntityId> = self.children(id).collect();
                for child in children {
                    self.unlink_child(id, child);
                    self.attach_to(child, parent, listener);
                }
                self.destroy_single(id, listener);
            }
        }

        true
    }

    /// Destroys every entity and resets the node pools.
    ///
    /// Notifications fire as for [`destroy_entity`](Self::destroy_entity).
    /// Ids keep counting up; they are never reused.
    pub fn clear(&mut self, listener: &mut dyn EntityListener) {
        let roots: Vec<EntityId> = self
            .records
            .iter()
            .filter(|(_, record)| record.parent.is_none())
            .map(|(_, record)| record.id)
            .collect();

        for root in roots {
            self.destroy_entity(root, DestroyPolicy::DestroyChildren, listener);
        }

        self.records.clear();
        self.hierarchy.clear();
        self.component_map.clear();
        self.ids.clear();
        self.active_count = 0;
    }

    // =========================================================================
    // Lookup
    // =========================================================================

    /// Checks if an entity with this id is alive.
    #[inline]
    #[must_use]
    pub fn is_alive(&self, id: EntityId) -> bool {
        self.ids.contains_key(&id)
    }

    /// Returns the current handle of an entity.
    #[inline]
    #[must_use]
    pub fn handle_of(&self, id: EntityId) -> Option<EntityHandle> {
        self.ids.get(&id).copied().map(EntityHandle::new)
    }

    /// Resolves a handle to its entity id. `None` for a stale handle.
    #[inline]
    #[must_use]
    pub fn id_of(&self, handle: EntityHandle) -> Option<EntityId> {
        self.records.get(handle.slot()).map(EntityRecord::id)
    }

    /// Resolves a handle to its record.
    #[inline]
    #[must_use]
    pub fn entity(&self, handle: EntityHandle) -> Option<&EntityRecord> {
        self.records.get(handle.slot())
    }

    /// Looks up a record by entity id.
    #[inline]
    #[must_use]
    pub fn get(&self, id: EntityId) -> Option<&EntityRecord> {
        self.records.get(*self.ids.get(&id)?)
    }

    /// Iterates over every live record in slot order.
    pub fn iter(&self) -> impl Iterator<Item = &EntityRecord> {
        self.records.iter().map(|(_, record)| record)
    }

    // =========================================================================
    // Hierarchy
    // =========================================================================

    /// Appends `child` to the children of `parent`.
    ///
    /// A child that already has another parent is moved. Adding an existing
    /// child again is a no-op.
    ///
    /// # Errors
    ///
    /// - [`EcsError::SelfParent`] if `parent == child`
    /// - [`EcsError::EntityNotFound`] if either entity is not alive
    /// - [`EcsError::HierarchyCycle`] if `child` is an ancestor of `parent`
    pub fn add_child(
        &mut self,
        parent: EntityId,
        child: EntityId,
        listener: &mut dyn EntityListener,
    ) -> EcsResult<()> {
        if parent == child {
            return Err(EcsError::SelfParent(child));
        }
        if !self.is_alive(parent) {
            return Err(EcsError::EntityNotFound(parent));
        }
        let current_parent = self.get(child).ok_or(EcsError::EntityNotFound(child))?.parent;

        if current_parent == Some(parent) {
            return Ok(());
        }
        if self.is_ancestor(child, parent) {
            return Err(EcsError::HierarchyCycle { parent, child });
        }

        if let Some(old_parent) = current_parent {
            self.unlink_child(old_parent, child);
        }
        self.attach_to(child, Some(parent), listener);

        Ok(())
    }

    /// Removes `child` from the children of `parent`; it becomes a root.
    ///
    /// Returns `false` if `child` is not a child of `parent`.
    pub fn remove_child(
        &mut self,
        parent: EntityId,
        child: EntityId,
        listener: &mut dyn EntityListener,
    ) -> bool {
        if !self.unlink_child(parent, child) {
            return false;
        }
        self.attach_to(child, None, listener);
        true
    }

    /// Removes every child of `parent`, destroying their subtrees if
    /// `destroy` is set and turning them into roots otherwise.
    pub fn clear_children(
        &mut self,
        parent: EntityId,
        destroy: bool,
        listener: &mut dyn EntityListener,
    ) {
        let children: Vec<EntityId> = self.children(parent).collect();
        for child in children {
            if destroy {
                self.destroy_entity(child, DestroyPolicy::DestroyChildren, listener);
            } else {
                self.remove_child(parent, child, listener);
            }
        }
    }

    /// Iterates over the children of `parent` in insertion order.
    ///
    /// Empty for an unknown entity.
    #[must_use]
    pub fn children(&self, parent: EntityId) -> Children<'_> {
        Children {
            nodes: &self.hierarchy,
            cursor: self.get(parent).and_then(|record| record.children_head),
        }
    }

    /// Returns the `index`-th child of `parent`. O(index).
    #[must_use]
    pub fn child_at(&self, parent: EntityId, index: usize) -> Option<EntityId> {
        self.children(parent).nth(index)
    }

    /// Number of direct children of `parent`.
    #[inline]
    #[must_use]
    pub fn children_count(&self, parent: EntityId) -> usize {
        self.get(parent).map_or(0, EntityRecord::children_count)
    }

    /// Parent of `id`, if any.
    #[inline]
    #[must_use]
    pub fn parent_of(&self, id: EntityId) -> Option<EntityId> {
        self.get(id)?.parent
    }

    /// Position of `id` among its parent's children.
    #[must_use]
    pub fn order_in_parent(&self, id: EntityId) -> Option<usize> {
        let parent = self.parent_of(id)?;
        self.children(parent).position(|child| child == id)
    }

    /// Depth of `id` in its tree (roots are at depth 0).
    #[inline]
    #[must_use]
    pub fn depth(&self, id: EntityId) -> Option<u32> {
        self.get(id).map(EntityRecord::depth)
    }

    /// Checks whether `ancestor` is a strict ancestor of `id`.
    #[must_use]
    pub fn is_ancestor(&self, ancestor: EntityId, id: EntityId) -> bool {
        let mut cursor = self.parent_of(id);
        while let Some(current) = cursor {
            if current == ancestor {
                return true;
            }
            cursor = self.parent_of(current);
        }
        false
    }

    /// Number of entities in the branch rooted at `root`, root included.
    #[must_use]
    pub fn branch_len(&self, root: EntityId) -> usize {
        self.branch(root).len()
    }

    /// Number of active entities in the branch rooted at `root`.
    #[must_use]
    pub fn active_branch_len(&self, root: EntityId) -> usize {
        self.branch(root)
            .into_iter()
            .filter(|id| self.is_active(*id))
            .count()
    }

    /// Orders two entities of the same tree as a pre-order walk visits them.
    ///
    /// Returns `None` if either entity is dead or the two live in
    /// different trees.
    #[must_use]
    pub fn compare_in_hierarchy(&self, lhs: EntityId, rhs: EntityId) -> Option<Ordering> {
        let (lhs_root, lhs_path) = self.hierarchy_path(lhs)?;
        let (rhs_root, rhs_path) = self.hierarchy_path(rhs)?;
        (lhs_root == rhs_root).then(|| lhs_path.cmp(&rhs_path))
    }

    /// Signed distance from `pivot` to `id` in the pre-order walk of
    /// their shared tree. Positive when `id` comes after `pivot`.
    ///
    /// Returns `None` if either entity is dead or the two live in
    /// different trees.
    #[must_use]
    pub fn hierarchy_offset(&self, id: EntityId, pivot: EntityId) -> Option<isize> {
        let (root, _) = self.hierarchy_path(id)?;
        let (pivot_root, _) = self.hierarchy_path(pivot)?;
        if root != pivot_root {
            return None;
        }

        let mut id_index = None;
        let mut pivot_index = None;
        let mut stack = vec![root];
        let mut index = 0usize;
        while let Some(current) = stack.pop() {
            if current == id {
                id_index = Some(index);
            }
            if current == pivot {
                pivot_index = Some(index);
            }
            if let (Some(id_index), Some(pivot_index)) = (id_index, pivot_index) {
                let id_index = isize::try_from(id_index).ok()?;
                let pivot_index = isize::try_from(pivot_index).ok()?;
                return Some(id_index - pivot_index);
            }
            let first = stack.len();
            stack.extend(self.children(current));
            stack[first..].reverse();
            index += 1;
        }
        None
    }

    // =========================================================================
    // Activation
    // =========================================================================

    /// Sets the entity's own enabled flag and pushes the resulting
    /// activation change to its components and descendants.
    ///
    /// Returns `false` if the entity is not alive.
    pub fn set_enabled(
        &mut self,
        id: EntityId,
        enabled: bool,
        listener: &mut dyn EntityListener,
    ) -> bool {
        let Some(record) = self.record_mut(id) else {
            return false;
        };
        record.enabled = enabled;
        self.refresh_activation(id, listener);
        true
    }

    /// The entity's own enabled flag. `false` for a dead entity.
    #[inline]
    #[must_use]
    pub fn is_enabled(&self, id: EntityId) -> bool {
        self.get(id).is_some_and(EntityRecord::is_enabled)
    }

    /// Effective activation. `false` for a dead entity.
    #[inline]
    #[must_use]
    pub fn is_active(&self, id: EntityId) -> bool {
        self.get(id).is_some_and(EntityRecord::is_active)
    }

    // =========================================================================
    // Component mapping
    // =========================================================================

    /// Appends `handle` to the entity's component map.
    ///
    /// The component's activation is aligned with the entity's, then the
    /// attach notification fires.
    ///
    /// # Errors
    ///
    /// - [`EcsError::EntityNotFound`] if the entity is not alive
    /// - [`EcsError::InvalidHandle`] for a null handle
    /// - [`EcsError::DuplicateComponent`] if a component of the same type is
    ///   already attached; the existing attachment is kept
    pub fn add_component(
        &mut self,
        entity: EntityId,
        handle: ComponentHandle,
        listener: &mut dyn EntityListener,
    ) -> EcsResult<()> {
        if handle.is_null() {
            return Err(EcsError::InvalidHandle);
        }
        let record = self.get(entity).ok_or(EcsError::EntityNotFound(entity))?;
        let active = record.active;

        let mut cursor = record.components_head;
        let mut last = None;
        while let Some(node_handle) = cursor {
            let Some(node) = self.component_map.get(node_handle) else {
                break;
            };
            if node.handle.component_type() == handle.component_type() {
                return Err(EcsError::DuplicateComponent {
                    entity,
                    component_type: handle.component_type(),
                });
            }
            last = Some(node_handle);
            cursor = node.next;
        }

        let node = self.component_map.allocate(ComponentMapNode { next: None, handle });
        if let Some(tail) = last {
            if let Some(tail) = self.component_map.get_mut(tail) {
                tail.next = Some(node);
            }
        }
        if let Some(record) = self.record_mut(entity) {
            if last.is_none() {
                record.components_head = Some(node);
            }
            record.components_count += 1;
        }

        listener.component_activation_changed(handle, active);
        listener.component_attached(&*self, entity, handle);
        Ok(())
    }

    /// Unlinks the component of `component_type` from the entity.
    ///
    /// The detach notification fires before the link is removed. Returns
    /// the detached handle, or `None` if nothing of that type is attached.
    pub fn remove_component(
        &mut self,
        entity: EntityId,
        component_type: ComponentTypeId,
        listener: &mut dyn EntityListener,
    ) -> Option<ComponentHandle> {
        let mut cursor = self.get(entity)?.components_head;
        let mut previous: Option<PoolHandle> = None;

        while let Some(node_handle) = cursor {
            let node = *self.component_map.get(node_handle)?;
            if node.handle.component_type() == component_type {
                listener.component_detached(&*self, entity, node.handle);

                if let Some(prev) = previous {
                    if let Some(prev) = self.component_map.get_mut(prev) {
                        prev.next = node.next;
                    }
                }
                if let Some(record) = self.record_mut(entity) {
                    if previous.is_none() {
                        record.components_head = node.next;
                    }
                    record.components_count -= 1;
                }
                self.component_map.deallocate(node_handle);
                return Some(node.handle);
            }
            previous = Some(node_handle);
            cursor = node.next;
        }

        None
    }

    /// Checks if a component of `component_type` is attached.
    #[inline]
    #[must_use]
    pub fn has_component(&self, entity: EntityId, component_type: ComponentTypeId) -> bool {
        self.component_handle(entity, component_type).is_some()
    }

    /// Handle of the attached component of `component_type`. Linear in the
    /// number of attached components.
    #[must_use]
    pub fn component_handle(
        &self,
        entity: EntityId,
        component_type: ComponentTypeId,
    ) -> Option<ComponentHandle> {
        self.components(entity)
            .find(|handle| handle.component_type() == component_type)
    }

    /// Iterates over the handles attached to `entity`, in attach order.
    #[must_use]
    pub fn components(&self, entity: EntityId) -> Components<'_> {
        Components {
            nodes: &self.component_map,
            cursor: self.get(entity).and_then(|record| record.components_head),
        }
    }

    /// Number of components attached to `entity`.
    #[inline]
    #[must_use]
    pub fn components_count(&self, entity: EntityId) -> usize {
        self.get(entity).map_or(0, EntityRecord::components_count)
    }

    // =========================================================================
    // Internals
    // =========================================================================

    fn record_mut(&mut self, id: EntityId) -> Option<&mut EntityRecord> {
        let slot = *self.ids.get(&id)?;
        self.records.get_mut(slot)
    }

    /// `root` and all its descendants, breadth first.
    fn branch(&self, root: EntityId) -> Vec<EntityId> {
        let mut branch = Vec::new();
        if !self.is_alive(root) {
            return branch;
        }

        branch.push(root);
        let mut next = 0;
        while next < branch.len() {
            let id = branch[next];
            branch.extend(self.children(id));
            next += 1;
        }
        branch
    }

    /// Root of the tree holding `id`, and the child positions leading to it.
    fn hierarchy_path(&self, id: EntityId) -> Option<(EntityId, Vec<usize>)> {
        self.get(id)?;

        let mut path = Vec::new();
        let mut current = id;
        while let Some(parent) = self.parent_of(current) {
            path.push(self.order_in_parent(current)?);
            current = parent;
        }
        path.reverse();
        Some((current, path))
    }

    /// Appends a hierarchy node for `child` at the tail of `parent`'s list.
    fn link_child(&mut self, parent: EntityId, child: EntityId) {
        let Some(tail) = self.get(parent).map(|record| record.children_tail) else {
            return;
        };

        let node = self.hierarchy.allocate(HierarchyNode { next: None, child });
        if let Some(last) = tail.and_then(|tail| self.hierarchy.get_mut(tail)) {
            last.next = Some(node);
        }
        if let Some(record) = self.record_mut(parent) {
            if record.children_head.is_none() {
                record.children_head = Some(node);
            }
            record.children_tail = Some(node);
            record.children_count += 1;
        }
    }

    /// Splices `child` out of `parent`'s list and frees its node.
    ///
    /// Leaves the child's own record untouched.
    fn unlink_child(&mut self, parent: EntityId, child: EntityId) -> bool {
        let Some(record) = self.get(parent) else {
            return false;
        };
        let mut cursor = record.children_head;
        let mut previous: Option<PoolHandle> = None;

        while let Some(node_handle) = cursor {
            let Some(node) = self.hierarchy.get(node_handle).copied() else {
                return false;
            };
            if node.child == child {
                if let Some(prev) = previous {
                    if let Some(prev) = self.hierarchy.get_mut(prev) {
                        prev.next = node.next;
                    }
                }
                if let Some(record) = self.record_mut(parent) {
                    if previous.is_none() {
                        record.children_head = node.next;
                    }
                    if record.children_tail == Some(node_handle) {
                        record.children_tail = previous;
                    }
                    record.children_count -= 1;
                }
                self.hierarchy.deallocate(node_handle);
                return true;
            }
            previous = Some(node_handle);
            cursor = node.next;
        }

        false
    }

    /// Makes `child` (already unlinked) a child of `parent`, or a root,
    /// then refreshes depth and activation of its subtree.
    fn attach_to(
        &mut self,
        child: EntityId,
        parent: Option<EntityId>,
        listener: &mut dyn EntityListener,
    ) {
        let depth = match parent {
            Some(parent) => {
                self.link_child(parent, child);
                self.depth(parent).map_or(0, |depth| depth + 1)
            }
            None => 0,
        };
        if let Some(record) = self.record_mut(child) {
            record.parent = parent;
        }

        self.refresh_depth(child, depth);
        self.refresh_activation(child, listener);
    }

    fn refresh_depth(&mut self, root: EntityId, depth: u32) {
        let mut stack = vec![(root, depth)];
        while let Some((id, depth)) = stack.pop() {
            if let Some(record) = self.record_mut(id) {
                record.depth = depth;
            }
            stack.extend(self.children(id).map(|child| (child, depth + 1)));
        }
    }

    /// Recomputes `active = enabled AND parent.active` from `root` down.
    fn refresh_activation(&mut self, root: EntityId, listener: &mut dyn EntityListener) {
        let mut stack = vec![root];

        while let Some(id) = stack.pop() {
            let parent_active = self
                .parent_of(id)
                .map_or(true, |parent| self.is_active(parent));

            let Some(record) = self.record_mut(id) else {
                continue;
            };
            let active = record.enabled && parent_active;
            if record.active == active {
                continue;
            }
            record.active = active;
            let components_head = record.components_head;

            if active {
                self.active_count += 1;
            } else {
                self.active_count -= 1;
            }

            let mut cursor = components_head;
            while let Some(node) = cursor.and_then(|node| self.component_map.get(node)) {
                listener.component_activation_changed(node.handle, active);
                cursor = node.next;
            }

            stack.extend(self.children(id));
        }
    }

    /// Frees one entity whose children are already gone or moved.
    fn destroy_single(&mut self, id: EntityId, listener: &mut dyn EntityListener) {
        let Some(slot) = self.ids.get(&id).copied() else {
            return;
        };

        if let Some(parent) = self.parent_of(id) {
            self.unlink_child(parent, id);
        }

        // Orphan anything still linked so no record points at a dead parent.
        let leftover: Vec<EntityId> = self.children(id).collect();
        for child in leftover {
            self.unlink_child(id, child);
            self.attach_to(child, None, listener);
        }

        let mut cursor = self.get(id).and_then(|record| record.components_head);
        while let Some(node_handle) = cursor {
            let Some(node) = self.component_map.get(node_handle).copied() else {
                break;
            };
            listener.component_detached(&*self, id, node.handle);
            self.component_map.deallocate(node_handle);
            if let Some(record) = self.record_mut(id) {
                record.components_head = node.next;
                record.components_count -= 1;
            }
            cursor = node.next;
        }

        if let Some(record) = self.record_mut(id) {
            if record.active {
                self.active_count -= 1;
            }
        }

        listener.entity_destroyed(&*self, id);
        self.records.deallocate(slot);
        self.ids.remove(&id);
    }
}

impl Default for EntitiesCollection {
    fn default() -> Self {
        Self::new(DEFAULT_CHUNK_SIZE, DEFAULT_NODE_CHUNK_SIZE)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn spawn(entities: &mut EntitiesCollection) -> EntityId {
        let handle = entities.create_entity(&mut ());
        entities.id_of(handle).unwrap()
    }

    fn handle(type_id: u16, index: u32) -> ComponentHandle {
        ComponentHandle::new(ComponentTypeId::new(type_id), PoolHandle::new(index, 0))
    }

    /// Records every listener call.
    #[derive(Default)]
    struct Recorder {
        log: Vec<String>,
    }

    impl EntityListener for Recorder {
        fn entity_created(&mut self, entities: &EntitiesCollection, entity: EntityId) {
            self.log
                .push(format!("created {} alive={}", entity.raw(), entities.is_alive(entity)));
        }

        fn entity_destroyed(&mut self, entities: &EntitiesCollection, entity: EntityId) {
            self.log.push(format!(
                "destroyed {} components={}",
                entity.raw(),
                entities.components_count(entity)
            ));
        }

        fn component_attached(
            &mut self,
            entities: &EntitiesCollection,
            entity: EntityId,
            handle: ComponentHandle,
        ) {
            let linked = entities.has_component(entity, handle.component_type());
            self.log.push(format!(
                "attached {} {} linked={linked}",
                entity.raw(),
                handle.component_type().raw()
            ));
        }

        fn component_detached(
            &mut self,
            entities: &EntitiesCollection,
            entity: EntityId,
            handle: ComponentHandle,
        ) {
            let linked = entities.has_component(entity, handle.component_type());
            self.log.push(format!(
                "detached {} {} linked={linked}",
                entity.raw(),
                handle.component_type().raw()
            ));
        }

        fn component_activation_changed(&mut self, handle: ComponentHandle, active: bool) {
            self.log
                .push(format!("active {} {active}", handle.component_type().raw()));
        }
    }

    #[test]
    fn test_sequential_ids() {
        let mut entities = EntitiesCollection::default();
        let a = spawn(&mut entities);
        let b = spawn(&mut entities);
        assert_eq!(a.raw() + 1, b.raw());
        assert_eq!(entities.len(), 2);
        assert_eq!(entities.active_count(), 2);

        let handle = entities.handle_of(b).unwrap();
        assert_eq!(entities.entity(handle).unwrap().id(), b);
    }

    #[test]
    fn test_children_append_at_tail() {
        let mut entities = EntitiesCollection::default();
        let a = spawn(&mut entities);
        let b = spawn(&mut entities);
        let c = spawn(&mut entities);

        entities.add_child(a, b, &mut ()).unwrap();
        entities.add_child(a, c, &mut ()).unwrap();

        assert_eq!(entities.children(a).collect::<Vec<_>>(), vec![b, c]);
        assert_eq!(entities.child_at(a, 1), Some(c));
        assert_eq!(entities.order_in_parent(c), Some(1));
        assert_eq!(entities.children_count(a), 2);

        assert!(entities.remove_child(a, b, &mut ()));
        assert_eq!(entities.children(a).collect::<Vec<_>>(), vec![c]);
        assert_eq!(entities.children_count(a), 1);
        assert_eq!(entities.parent_of(b), None);
        assert!(!entities.remove_child(a, b, &mut ()));
    }

    #[test]
    fn test_append_after_removing_tail() {
        let mut entities = EntitiesCollection::default();
        let a = spawn(&mut entities);
        let b = spawn(&mut entities);
        let c = spawn(&mut entities);
        let d = spawn(&mut entities);

        entities.add_child(a, b, &mut ()).unwrap();
        entities.add_child(a, c, &mut ()).unwrap();
        entities.remove_child(a, c, &mut ());
        entities.add_child(a, d, &mut ()).unwrap();

        assert_eq!(entities.children(a).collect::<Vec<_>>(), vec![b, d]);
    }

    #[test]
    fn test_reparent_moves_child() {
        let mut entities = EntitiesCollection::default();
        let a = spawn(&mut entities);
        let b = spawn(&mut entities);
        let c = spawn(&mut entities);

        entities.add_child(a, c, &mut ()).unwrap();
        entities.add_child(b, c, &mut ()).unwrap();

        assert_eq!(entities.children_count(a), 0);
        assert_eq!(entities.children(b).collect::<Vec<_>>(), vec![c]);
        assert_eq!(entities.parent_of(c), Some(b));
    }

    #[test]
    fn test_cycle_rejected() {
        let mut entities = EntitiesCollection::default();
        let a = spawn(&mut entities);
        let b = spawn(&mut entities);
        let c = spawn(&mut entities);

        entities.add_child(a, b, &mut ()).unwrap();
        entities.add_child(b, c, &mut ()).unwrap();

        assert_eq!(
            entities.add_child(c, a, &mut ()),
            Err(EcsError::HierarchyCycle { parent: c, child: a })
        );
        assert_eq!(entities.add_child(a, a, &mut ()), Err(EcsError::SelfParent(a)));
        assert_eq!(entities.parent_of(a), None);
    }

    #[test]
    fn test_depth_follows_reparent() {
        let mut entities = EntitiesCollection::default();
        let a = spawn(&mut entities);
        let b = spawn(&mut entities);
        let c = spawn(&mut entities);

        entities.add_child(b, c, &mut ()).unwrap();
        entities.add_child(a, b, &mut ()).unwrap();
        assert_eq!(entities.depth(c), Some(2));

        entities.remove_child(a, b, &mut ());
        assert_eq!(entities.depth(b), Some(0));
        assert_eq!(entities.depth(c), Some(1));
    }

    #[test]
    fn test_destroy_subtree() {
        let mut entities = EntitiesCollection::default();
        let root = spawn(&mut entities);
        let a = spawn(&mut entities);
        let b = spawn(&mut entities);
        let a1 = spawn(&mut entities);
        let other = spawn(&mut entities);

        entities.add_child(root, a, &mut ()).unwrap();
        entities.add_child(root, b, &mut ()).unwrap();
        entities.add_child(a, a1, &mut ()).unwrap();
        assert_eq!(entities.branch_len(root), 4);

        let before = entities.len();
        assert!(entities.destroy_entity(a, DestroyPolicy::DestroyChildren, &mut ()));
        assert_eq!(entities.len(), before - 2);
        assert!(!entities.is_alive(a1));
        assert_eq!(entities.children(root).collect::<Vec<_>>(), vec![b]);
        assert!(entities.is_alive(other));
        assert!(!entities.destroy_entity(a, DestroyPolicy::DestroyChildren, &mut ()));
    }

    #[test]
    fn test_destroy_reparents_children() {
        let mut entities = EntitiesCollection::default();
        let root = spawn(&mut entities);
        let middle = spawn(&mut entities);
        let x = spawn(&mut entities);
        let y = spawn(&mut entities);

        entities.add_child(root, middle, &mut ()).unwrap();
        entities.add_child(middle, x, &mut ()).unwrap();
        entities.add_child(middle, y, &mut ()).unwrap();

        entities.destroy_entity(middle, DestroyPolicy::ReparentChildren, &mut ());

        assert_eq!(entities.children(root).collect::<Vec<_>>(), vec![x, y]);
        assert_eq!(entities.depth(x), Some(1));
        assert_eq!(entities.len(), 3);
    }

    #[test]
    fn test_destroy_root_reparents_to_none() {
        let mut entities = EntitiesCollection::default();
        let root = spawn(&mut entities);
        let child = spawn(&mut entities);
        entities.add_child(root, child, &mut ()).unwrap();

        entities.destroy_entity(root, DestroyPolicy::ReparentChildren, &mut ());
        assert_eq!(entities.parent_of(child), None);
        assert!(entities.is_alive(child));
    }

    #[test]
    fn test_activation_cascade() {
        let mut entities = EntitiesCollection::default();
        let root = spawn(&mut entities);
        let child = spawn(&mut entities);
        let grandchild = spawn(&mut entities);
        entities.add_child(root, child, &mut ()).unwrap();
        entities.add_child(child, grandchild, &mut ()).unwrap();

        // Grandchild disabled on its own
        entities.set_enabled(grandchild, false, &mut ());
        assert!(!entities.is_active(grandchild));

        entities.set_enabled(root, false, &mut ());
        assert!(!entities.is_active(child));
        assert!(!entities.is_active(grandchild));
        assert!(entities.is_enabled(child));
        assert_eq!(entities.active_count(), 0);
        assert_eq!(entities.active_branch_len(root), 0);

        entities.set_enabled(root, true, &mut ());
        assert!(entities.is_active(child));
        assert!(!entities.is_active(grandchild));
        assert_eq!(entities.active_count(), 2);
    }

    #[test]
    fn test_adding_child_under_inactive_parent() {
        let mut entities = EntitiesCollection::default();
        let parent = spawn(&mut entities);
        let child = spawn(&mut entities);
        entities.set_enabled(parent, false, &mut ());

        entities.add_child(parent, child, &mut ()).unwrap();
        assert!(!entities.is_active(child));

        entities.remove_child(parent, child, &mut ());
        assert!(entities.is_active(child));
    }

    #[test]
    fn test_component_map() {
        let mut entities = EntitiesCollection::default();
        let e = spawn(&mut entities);
        let mesh = handle(0, 3);
        let label = handle(1, 0);

        entities.add_component(e, mesh, &mut ()).unwrap();
        entities.add_component(e, label, &mut ()).unwrap();
        assert_eq!(entities.components(e).collect::<Vec<_>>(), vec![mesh, label]);
        assert_eq!(entities.components_count(e), 2);
        assert!(entities.has_component(e, ComponentTypeId::new(1)));
        assert_eq!(entities.component_handle(e, ComponentTypeId::new(0)), Some(mesh));

        let duplicate = handle(0, 7);
        assert_eq!(
            entities.add_component(e, duplicate, &mut ()),
            Err(EcsError::DuplicateComponent {
                entity: e,
                component_type: ComponentTypeId::new(0),
            })
        );
        assert_eq!(entities.component_handle(e, ComponentTypeId::new(0)), Some(mesh));

        assert_eq!(
            entities.remove_component(e, ComponentTypeId::new(0), &mut ()),
            Some(mesh)
        );
        assert_eq!(entities.components(e).collect::<Vec<_>>(), vec![label]);
        assert_eq!(entities.components_count(e), 1);
        assert!(entities
            .remove_component(e, ComponentTypeId::new(0), &mut ())
            .is_none());
    }

    #[test]
    fn test_listener_order() {
        let mut entities = EntitiesCollection::default();
        let mut recorder = Recorder::default();

        let parent = entities.create_entity(&mut recorder);
        let parent = entities.id_of(parent).unwrap();
        let child = spawn(&mut entities);
        entities.add_child(parent, child, &mut ()).unwrap();
        entities.add_component(child, handle(2, 0), &mut recorder).unwrap();

        entities.set_enabled(parent, false, &mut recorder);
        entities.destroy_entity(parent, DestroyPolicy::DestroyChildren, &mut recorder);

        assert_eq!(
            recorder.log,
            vec![
                "created 0 alive=true",
                "active 2 true",
                "attached 1 2 linked=true",
                "active 2 false",
                "detached 1 2 linked=true",
                "destroyed 1 components=0",
                "destroyed 0 components=0",
            ]
        );
    }

    #[test]
    fn test_compare_in_hierarchy() {
        let mut entities = EntitiesCollection::default();
        let root = spawn(&mut entities);
        let a = spawn(&mut entities);
        let b = spawn(&mut entities);
        let a1 = spawn(&mut entities);
        let lone = spawn(&mut entities);
        entities.add_child(root, a, &mut ()).unwrap();
        entities.add_child(root, b, &mut ()).unwrap();
        entities.add_child(a, a1, &mut ()).unwrap();

        assert_eq!(entities.compare_in_hierarchy(root, a), Some(Ordering::Less));
        assert_eq!(entities.compare_in_hierarchy(a1, b), Some(Ordering::Less));
        assert_eq!(entities.compare_in_hierarchy(b, a), Some(Ordering::Greater));
        assert_eq!(entities.compare_in_hierarchy(a, lone), None);
    }

    #[test]
    fn test_clear_children_and_clear() {
        let mut entities = EntitiesCollection::default();
        let root = spawn(&mut entities);
        let a = spawn(&mut entities);
        let b = spawn(&mut entities);
        entities.add_child(root, a, &mut ()).unwrap();
        entities.add_child(root, b, &mut ()).unwrap();

        entities.clear_children(root, false, &mut ());
        assert_eq!(entities.children_count(root), 0);
        assert!(entities.is_alive(a));

        entities.add_child(root, a, &mut ()).unwrap();
        entities.clear_children(root, true, &mut ());
        assert!(!entities.is_alive(a));
        assert!(entities.is_alive(b));

        entities.clear(&mut ());
        assert!(entities.is_empty());
        assert_eq!(entities.active_count(), 0);
        assert!(!entities.is_alive(root));
    }

    #[test]
    fn test_listener_sees_links_on_detach() {
        let mut entities = EntitiesCollection::default();
        let mut recorder = Recorder::default();
        let e = spawn(&mut entities);
        entities.add_component(e, handle(1, 0), &mut recorder).unwrap();
        entities.add_component(e, handle(2, 0), &mut recorder).unwrap();
        entities.add_component(e, handle(3, 0), &mut recorder).unwrap();
        recorder.log.clear();

        entities.remove_component(e, ComponentTypeId::new(2), &mut recorder);
        entities.destroy_entity(e, DestroyPolicy::DestroyChildren, &mut recorder);

        assert_eq!(
            recorder.log,
            vec![
                "detached 0 2 linked=true",
                "detached 0 1 linked=true",
                "detached 0 3 linked=true",
                "destroyed 0 components=0",
            ]
        );
    }

    #[test]
    fn test_destroyed_entity_unreachable() {
        let mut entities = EntitiesCollection::default();
        let handle = entities.create_entity(&mut ());
        let id = entities.id_of(handle).unwrap();
        assert!(entities.entity(handle).is_some());

        entities.destroy_entity(id, DestroyPolicy::DestroyChildren, &mut ());
        assert!(!entities.is_alive(id));
        assert!(entities.entity(handle).is_none());
        assert!(entities.get(id).is_none());
        assert_eq!(entities.id_of(handle), None);
        assert_eq!(entities.iter().count(), 0);

        let reused = entities.create_entity(&mut ());
        assert!(entities.entity(handle).is_none());
        assert_ne!(entities.id_of(reused), Some(id));
    }

    #[test]
    fn test_hierarchy_offset() {
        let mut entities = EntitiesCollection::default();
        let root = spawn(&mut entities);
        let a = spawn(&mut entities);
        let b = spawn(&mut entities);
        let a1 = spawn(&mut entities);
        let a2 = spawn(&mut entities);
        let lone = spawn(&mut entities);
        entities.add_child(root, a, &mut ()).unwrap();
        entities.add_child(root, b, &mut ()).unwrap();
        entities.add_child(a, a1, &mut ()).unwrap();
        entities.add_child(a, a2, &mut ()).unwrap();

        // Pre-order: root, a, a1, a2, b
        assert_eq!(entities.hierarchy_offset(b, root), Some(4));
        assert_eq!(entities.hierarchy_offset(root, b), Some(-4));
        assert_eq!(entities.hierarchy_offset(a2, a), Some(2));
        assert_eq!(entities.hierarchy_offset(a1, b), Some(-2));
        assert_eq!(entities.hierarchy_offset(a, a), Some(0));
        assert_eq!(entities.hierarchy_offset(a, lone), None);

        entities.destroy_entity(a1, DestroyPolicy::DestroyChildren, &mut ());
        assert_eq!(entities.hierarchy_offset(b, root), Some(3));
        assert_eq!(entities.hierarchy_offset(a1, root), None);
    }
}
