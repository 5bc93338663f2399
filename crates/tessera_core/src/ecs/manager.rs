//! # ECS Manager
//!
//! The top-level container: component type registry, one collection per
//! registered type, the entities collection, the system scheduler, the
//! tuple cache and the lifecycle delegates.
//!
//! ## Lifecycle
//!
//! ```text
//! Setup ──init()──► Running ──destroy()──► Destroyed
//!   │                  │
//!   │ register_*       │ update() / render() once per frame
//! ```
//!
//! Component types and systems are registered during setup. Entity and
//! component operations work in setup and running phases. After
//! `destroy()` the manager is empty and frame calls are rejected.

use std::any::{Any, TypeId};
use std::collections::{HashMap, VecDeque};

use super::component::{Component, ComponentTypeId};
use super::entities::{EntitiesCollection, EntityListener};
use super::entity::{DestroyPolicy, EntityId, EntityRecord};
use super::events::{AttachmentEvent, ComponentEvent, EntityEvent, Events};
use super::handle::{ComponentHandle, EntityHandle};
use super::scheduler::Scheduler;
use super::storage::{ComponentCollection, ErasedCollection};
use super::system::{System, SystemId};
use super::tuple::{canonical_type_ids, TupleCache, TupleRegistry};
use crate::config::ManagerConfig;
use crate::error::{EcsError, EcsResult};

/// Name reported for an unknown component type id.
pub const UNDEFINED_COMPONENT_NAME: &str = "[UNDEFINED]";

/// Lifecycle phase of a [`Manager`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Phase {
    /// Registration is open; `init` has not run.
    Setup,
    /// `init` has run; frames may be driven.
    Running,
    /// `destroy` has run.
    Destroyed,
}

/// Side effects of entity operations on the manager-owned state.
struct Hooks<'a> {
    collections: &'a mut [Box<dyn ErasedCollection>],
    tuples: &'a mut TupleRegistry,
    events: &'a mut Events,
}

impl Hooks<'_> {
    fn collection(&mut self, handle: ComponentHandle) -> Option<&mut Box<dyn ErasedCollection>> {
        self.collections.get_mut(handle.component_type().index())
    }
}

impl EntityListener for Hooks<'_> {
    fn entity_created(&mut self, entities: &EntitiesCollection, entity: EntityId) {
        self.events
            .entity_created
            .broadcast(&EntityEvent { entity }, entities);
    }

    fn entity_destroyed(&mut self, entities: &EntitiesCollection, entity: EntityId) {
        self.tuples.entity_removed(entity);
        self.events
            .entity_destroyed
            .broadcast(&EntityEvent { entity }, entities);
    }

    fn component_attached(
        &mut self,
        entities: &EntitiesCollection,
        entity: EntityId,
        handle: ComponentHandle,
    ) {
        if let Some(collection) = self.collection(handle) {
            collection.set_owner(handle, Some(entity));
        }
        self.events
            .component_attached
            .broadcast(&AttachmentEvent { entity, handle }, entities);
    }

    fn component_detached(
        &mut self,
        entities: &EntitiesCollection,
        entity: EntityId,
        handle: ComponentHandle,
    ) {
        self.events
            .component_detached
            .broadcast(&AttachmentEvent { entity, handle }, entities);
        if let Some(collection) = self.collection(handle) {
            collection.set_owner(handle, None);
            collection.set_active(handle, true);
        }
        self.tuples.component_removed(entity, handle.component_type());
    }

    fn component_activation_changed(&mut self, handle: ComponentHandle, active: bool) {
        if let Some(collection) = self.collection(handle) {
            collection.set_active(handle, active);
        }
    }
}

/// The ECS manager.
///
/// One instance is created by the host application and passed by
/// reference to whatever needs it; systems receive it in every hook.
///
/// # Example
///
/// ```rust
/// use tessera_core::{Component, Manager, System};
///
/// #[derive(Clone, Default)]
/// struct Health(u32);
///
/// impl Component for Health {
///     const NAME: &'static str = "Health";
/// }
///
/// struct Regen;
///
/// impl System for Regen {
///     fn update(&mut self, manager: &mut Manager) {
///         manager.for_each_active::<Health>(|_, health| health.0 += 1);
///     }
/// }
///
/// let mut manager = Manager::new();
/// manager.register_component_type::<Health>().unwrap();
/// manager.register_system(Regen).unwrap();
/// manager.init().unwrap();
///
/// let handle = manager.create_component(Health(9)).unwrap();
/// manager.update().unwrap();
/// assert_eq!(manager.get_component::<Health>(handle).unwrap().0, 10);
///
/// manager.destroy();
/// ```
pub struct Manager {
    config: ManagerConfig,
    phase: Phase,

    // =========================================================================
    // Component registry
    // =========================================================================
    /// Indexed by `ComponentTypeId::index()`.
    collections: Vec<Box<dyn ErasedCollection>>,
    type_ids: HashMap<TypeId, ComponentTypeId>,
    names: HashMap<&'static str, ComponentTypeId>,

    entities: EntitiesCollection,
    scheduler: Scheduler,
    tuples: TupleRegistry,
    events: Events,
}

impl Manager {
    /// Creates a manager with the default configuration.
    #[must_use]
    pub fn new() -> Self {
        Self::build(ManagerConfig::default())
    }

    /// Creates a manager with a custom configuration.
    ///
    /// # Errors
    ///
    /// Returns [`EcsError::InvalidConfig`] if the configuration does not
    /// validate.
    pub fn with_config(config: ManagerConfig) -> EcsResult<Self> {
        config.validate()?;
        Ok(Self::build(config))
    }

    fn build(config: ManagerConfig) -> Self {
        Self {
            entities: EntitiesCollection::new(config.entity_chunk_size, config.node_chunk_size),
            config,
            phase: Phase::Setup,
            collections: Vec::new(),
            type_ids: HashMap::new(),
            names: HashMap::new(),
            scheduler: Scheduler::default(),
            tuples: TupleRegistry::default(),
            events: Events::default(),
        }
    }

    /// The configuration this manager was built with.
    #[inline]
    #[must_use]
    pub const fn config(&self) -> &ManagerConfig {
        &self.config
    }

    /// Current lifecycle phase.
    #[inline]
    #[must_use]
    pub const fn phase(&self) -> Phase {
        self.phase
    }

    /// Lifecycle delegates.
    #[inline]
    #[must_use]
    pub const fn events(&self) -> &Events {
        &self.events
    }

    /// Lifecycle delegates, for subscribing.
    #[inline]
    pub fn events_mut(&mut self) -> &mut Events {
        &mut self.events
    }

    /// Read access to entity records and the hierarchy.
    ///
    /// Mutations go through the manager so notifications, component
    /// activation and tuple caches stay in sync.
    #[inline]
    #[must_use]
    pub const fn entities(&self) -> &EntitiesCollection {
        &self.entities
    }

    // =========================================================================
    // Component type registry
    // =========================================================================

    /// Registers a component type and creates its collection.
    ///
    /// Ids are dense and assigned in registration order.
    ///
    /// # Errors
    ///
    /// - [`EcsError::RegistrationClosed`] after [`init`](Self::init)
    /// - [`EcsError::DuplicateComponentType`] if the type or its name is
    ///   already registered
    pub fn register_component_type<T: Component>(&mut self) -> EcsResult<ComponentTypeId> {
        if self.phase != Phase::Setup {
            tracing::warn!("Rejected registration of component {} after init", T::NAME);
            return Err(EcsError::RegistrationClosed(T::NAME.to_string()));
        }
        if self.type_ids.contains_key(&TypeId::of::<T>()) || self.names.contains_key(T::NAME) {
            return Err(EcsError::DuplicateComponentType(T::NAME.to_string()));
        }

        let id = u16::try_from(self.collections.len())
            .ok()
            .filter(|raw| *raw != ComponentTypeId::INVALID.raw())
            .map(ComponentTypeId::new)
            .ok_or_else(|| EcsError::InvalidConfig("too many component types".to_string()))?;

        self.collections.push(Box::new(ComponentCollection::<T>::new(
            id,
            self.config.component_chunk_size,
        )));
        self.type_ids.insert(TypeId::of::<T>(), id);
        self.names.insert(T::NAME, id);

        tracing::debug!("Registered component type {} as {}", T::NAME, id);
        Ok(id)
    }

    /// Id of a registered component type, or [`ComponentTypeId::INVALID`].
    #[must_use]
    pub fn component_type_id<T: Component>(&self) -> ComponentTypeId {
        self.type_ids
            .get(&TypeId::of::<T>())
            .copied()
            .unwrap_or(ComponentTypeId::INVALID)
    }

    /// Id registered under `name`, or [`ComponentTypeId::INVALID`].
    #[must_use]
    pub fn component_type_id_by_name(&self, name: &str) -> ComponentTypeId {
        self.names
            .get(name)
            .copied()
            .unwrap_or(ComponentTypeId::INVALID)
    }

    /// Registration name of a component type id, or
    /// [`UNDEFINED_COMPONENT_NAME`].
    #[must_use]
    pub fn component_name(&self, type_id: ComponentTypeId) -> &'static str {
        self.collections
            .get(type_id.index())
            .map_or(UNDEFINED_COMPONENT_NAME, |collection| collection.name())
    }

    /// Number of registered component types.
    #[inline]
    #[must_use]
    pub fn component_type_count(&self) -> usize {
        self.collections.len()
    }

    /// Typed collection of `T`.
    #[must_use]
    pub fn collection<T: Component>(&self) -> Option<&ComponentCollection<T>> {
        let id = self.type_ids.get(&TypeId::of::<T>())?;
        self.collections.get(id.index())?.as_any().downcast_ref()
    }

    /// Mutable typed collection of `T`.
    ///
    /// Creating or destroying components through it bypasses notifications;
    /// prefer the manager's methods for that.
    pub fn collection_mut<T: Component>(&mut self) -> Option<&mut ComponentCollection<T>> {
        let id = self.type_ids.get(&TypeId::of::<T>())?;
        self.collections
            .get_mut(id.index())?
            .as_any_mut()
            .downcast_mut()
    }

    // =========================================================================
    // Components
    // =========================================================================

    /// Creates an active, unattached component.
    ///
    /// # Errors
    ///
    /// - [`EcsError::UnregisteredType`] if `T` is not registered
    /// - [`EcsError::Destroyed`] after [`destroy`](Self::destroy)
    pub fn create_component<T: Component>(&mut self, value: T) -> EcsResult<ComponentHandle> {
        self.ensure_alive()?;
        let handle = self
            .collection_mut::<T>()
            .ok_or_else(|| EcsError::UnregisteredType(T::NAME.to_string()))?
            .create(value);
        self.events
            .component_created
            .broadcast(&ComponentEvent { handle }, &self.entities);
        Ok(handle)
    }

    /// Creates a component of a registered type holding its default value.
    ///
    /// # Errors
    ///
    /// - [`EcsError::UnregisteredType`] for an unknown id
    /// - [`EcsError::Destroyed`] after [`destroy`](Self::destroy)
    pub fn create_component_by_type_id(
        &mut self,
        type_id: ComponentTypeId,
    ) -> EcsResult<ComponentHandle> {
        self.ensure_alive()?;
        let handle = self
            .collections
            .get_mut(type_id.index())
            .ok_or_else(|| EcsError::UnregisteredType(type_id.to_string()))?
            .create_default();
        self.events
            .component_created
            .broadcast(&ComponentEvent { handle }, &self.entities);
        Ok(handle)
    }

    /// Creates a component of the type registered under `name`, holding its
    /// default value.
    ///
    /// # Errors
    ///
    /// As [`create_component_by_type_id`](Self::create_component_by_type_id).
    pub fn create_component_by_name(&mut self, name: &str) -> EcsResult<ComponentHandle> {
        let type_id = self
            .names
            .get(name)
            .copied()
            .ok_or_else(|| EcsError::UnregisteredType(name.to_string()))?;
        self.create_component_by_type_id(type_id)
    }

    /// Destroys a component.
    ///
    /// An attached component is detached first (detach notification), then
    /// its slot is freed (destroy notification). Returns `false` and does
    /// nothing for an invalid or stale handle.
    pub fn destroy_component(&mut self, handle: ComponentHandle) -> bool {
        let Some(owner) = self.collections.get(handle.component_type().index()).and_then(
            |collection| collection.contains(handle).then(|| collection.owner(handle)),
        ) else {
            return false;
        };

        if let Some(entity) = owner {
            self.detach_component(entity, handle.component_type());
        }

        let released = self
            .collections
            .get_mut(handle.component_type().index())
            .is_some_and(|collection| collection.release(handle));
        if released {
            self.events
                .component_destroyed
                .broadcast(&ComponentEvent { handle }, &self.entities);
        }
        released
    }

    /// Payload of a component. `None` for an invalid or stale handle.
    #[must_use]
    pub fn get_component<T: Component>(&self, handle: ComponentHandle) -> Option<&T> {
        self.collection::<T>()?.get(handle)
    }

    /// Mutable payload of a component.
    pub fn get_component_mut<T: Component>(&mut self, handle: ComponentHandle) -> Option<&mut T> {
        self.collection_mut::<T>()?.get_mut(handle)
    }

    /// Payload of a component of any type, as `&dyn Any`.
    #[must_use]
    pub fn get_component_raw(&self, handle: ComponentHandle) -> Option<&dyn Any> {
        self.collections
            .get(handle.component_type().index())?
            .get_raw(handle)
    }

    /// Whether `handle` refers to a live component.
    #[must_use]
    pub fn is_component_valid(&self, handle: ComponentHandle) -> bool {
        self.collections
            .get(handle.component_type().index())
            .is_some_and(|collection| collection.contains(handle))
    }

    /// Whether the component is active (its entity is active, or it is
    /// unattached).
    #[must_use]
    pub fn is_component_active(&self, handle: ComponentHandle) -> bool {
        self.collections
            .get(handle.component_type().index())
            .is_some_and(|collection| collection.is_active(handle))
    }

    /// Entity the component is attached to.
    #[must_use]
    pub fn component_owner(&self, handle: ComponentHandle) -> Option<EntityId> {
        self.collections
            .get(handle.component_type().index())?
            .owner(handle)
    }

    /// Copies a component's payload into a new, unattached component.
    pub fn clone_component(&mut self, handle: ComponentHandle) -> Option<ComponentHandle> {
        let copy = self
            .collections
            .get_mut(handle.component_type().index())?
            .clone_component(handle)?;
        self.events
            .component_created
            .broadcast(&ComponentEvent { handle: copy }, &self.entities);
        Some(copy)
    }

    /// Moves a component's payload into `destination` and frees the slot.
    ///
    /// The component is detached first if needed. `handle` and every copy
    /// of it become stale; callers relocating data must re-point them.
    /// Returns `false` for an invalid handle or a type mismatch.
    pub fn move_component_data<T: Component>(
        &mut self,
        handle: ComponentHandle,
        destination: &mut T,
    ) -> bool {
        if handle.component_type() != self.component_type_id::<T>()
            || !self.is_component_valid(handle)
        {
            return false;
        }
        if let Some(entity) = self.component_owner(handle) {
            self.detach_component(entity, handle.component_type());
        }

        let moved = self
            .collections
            .get_mut(handle.component_type().index())
            .is_some_and(|collection| collection.move_data_raw(handle, destination));
        if moved {
            self.events
                .component_destroyed
                .broadcast(&ComponentEvent { handle }, &self.entities);
        }
        moved
    }

    /// Calls `f` for every active component of type `T`.
    pub fn for_each_active<T: Component>(&mut self, mut f: impl FnMut(ComponentHandle, &mut T)) {
        if let Some(collection) = self.collection_mut::<T>() {
            for (handle, data) in collection.iter_active_mut() {
                f(handle, data);
            }
        }
    }

    // =========================================================================
    // Entities
    // =========================================================================

    /// Creates an enabled root entity.
    pub fn create_entity(&mut self) -> EntityHandle {
        if self.phase == Phase::Destroyed {
            tracing::warn!("Entity created after manager destroy");
        }
        let (entities, mut hooks) = self.split();
        entities.create_entity(&mut hooks)
    }

    /// Current handle of an entity.
    #[must_use]
    pub fn entity_by_id(&self, id: EntityId) -> Option<EntityHandle> {
        self.entities.handle_of(id)
    }

    /// Resolves a handle to its record. `None` for a stale handle.
    #[must_use]
    pub fn entity(&self, handle: EntityHandle) -> Option<&EntityRecord> {
        self.entities.entity(handle)
    }

    /// Resolves a handle to its entity id.
    #[must_use]
    pub fn entity_id(&self, handle: EntityHandle) -> Option<EntityId> {
        self.entities.id_of(handle)
    }

    /// Number of live entities.
    #[inline]
    #[must_use]
    pub fn entity_count(&self) -> usize {
        self.entities.len()
    }

    /// Destroys an entity using the configured [`DestroyPolicy`].
    pub fn destroy_entity(&mut self, id: EntityId) -> bool {
        self.destroy_entity_with(id, self.config.destroy_policy)
    }

    /// Destroys an entity with an explicit policy for its children.
    ///
    /// Attached components are detached, not destroyed. Returns `false` if
    /// the entity is not alive.
    pub fn destroy_entity_with(&mut self, id: EntityId, policy: DestroyPolicy) -> bool {
        let (entities, mut hooks) = self.split();
        let destroyed = entities.destroy_entity(id, policy, &mut hooks);
        if destroyed {
            tracing::debug!("Destroyed {} ({:?})", id, policy);
        }
        destroyed
    }

    /// Appends `child` to the children of `parent`.
    ///
    /// # Errors
    ///
    /// See [`EntitiesCollection::add_child`].
    pub fn add_child(&mut self, parent: EntityId, child: EntityId) -> EcsResult<()> {
        let (entities, mut hooks) = self.split();
        entities.add_child(parent, child, &mut hooks)
    }

    /// Detaches `child` from `parent`; it becomes a root.
    pub fn remove_child(&mut self, parent: EntityId, child: EntityId) -> bool {
        let (entities, mut hooks) = self.split();
        entities.remove_child(parent, child, &mut hooks)
    }

    /// Removes every child of `parent`, destroying them if `destroy` is set.
    pub fn clear_children(&mut self, parent: EntityId, destroy: bool) {
        let (entities, mut hooks) = self.split();
        entities.clear_children(parent, destroy, &mut hooks);
    }

    /// Sets an entity's own enabled flag. Returns `false` if it is not
    /// alive.
    pub fn set_enabled(&mut self, id: EntityId, enabled: bool) -> bool {
        let (entities, mut hooks) = self.split();
        entities.set_enabled(id, enabled, &mut hooks)
    }

    /// The entity's own enabled flag.
    #[must_use]
    pub fn is_enabled(&self, id: EntityId) -> bool {
        self.entities.is_enabled(id)
    }

    /// Effective activation: enabled and every ancestor enabled.
    #[must_use]
    pub fn is_active(&self, id: EntityId) -> bool {
        self.entities.is_active(id)
    }

    /// Attaches a component to an entity.
    ///
    /// The component's active flag follows the entity from now on.
    ///
    /// # Errors
    ///
    /// - [`EcsError::InvalidHandle`] for an invalid or stale handle
    /// - [`EcsError::ComponentAlreadyAttached`] if another attachment exists
    /// - [`EcsError::EntityNotFound`] if the entity is not alive
    /// - [`EcsError::DuplicateComponent`] if the entity already has a
    ///   component of this type
    pub fn attach_component(&mut self, entity: EntityId, handle: ComponentHandle) -> EcsResult<()> {
        let collection = self
            .collections
            .get(handle.component_type().index())
            .filter(|collection| collection.contains(handle))
            .ok_or(EcsError::InvalidHandle)?;
        if let Some(owner) = collection.owner(handle) {
            return Err(EcsError::ComponentAlreadyAttached(owner));
        }

        let (entities, mut hooks) = self.split();
        entities.add_component(entity, handle, &mut hooks)?;

        let entities = &self.entities;
        self.tuples.refresh(entity, handle.component_type(), &|type_id| {
            entities.component_handle(entity, type_id)
        });
        Ok(())
    }

    /// Detaches the component of `component_type` from the entity.
    ///
    /// The component stays alive and becomes active again.
    pub fn detach_component(
        &mut self,
        entity: EntityId,
        component_type: ComponentTypeId,
    ) -> Option<ComponentHandle> {
        let (entities, mut hooks) = self.split();
        entities.remove_component(entity, component_type, &mut hooks)
    }

    /// Handle of the entity's component of type `T`.
    #[must_use]
    pub fn entity_component<T: Component>(&self, entity: EntityId) -> Option<ComponentHandle> {
        self.entities
            .component_handle(entity, self.component_type_id::<T>())
    }

    /// Creates a copy of an entity: every attached component is cloned and
    /// every descendant is cloned, keeping enabled flags and child
    /// order. The copy is a root.
    ///
    /// # Errors
    ///
    /// Returns [`EcsError::EntityNotFound`] if `source` is not alive.
    pub fn clone_entity(&mut self, source: EntityId) -> EcsResult<EntityHandle> {
        if !self.entities.is_alive(source) {
            return Err(EcsError::EntityNotFound(source));
        }

        // (source, parent of its copy); parents are copied before children
        // and siblings leave the queue in child order.
        let mut pending = VecDeque::from([(source, None)]);
        let mut root = None;
        while let Some((source, copy_parent)) = pending.pop_front() {
            let copy = self.clone_single(source)?;
            match copy_parent {
                Some(parent) => self.add_child(parent, copy)?,
                None => root = Some(copy),
            }
            pending.extend(self.entities.children(source).map(|child| (child, Some(copy))));
        }

        let root = root.ok_or(EcsError::EntityNotFound(source))?;
        self.entities
            .handle_of(root)
            .ok_or(EcsError::EntityNotFound(root))
    }

    /// Copies one entity and its components, without children.
    fn clone_single(&mut self, source: EntityId) -> EcsResult<EntityId> {
        let enabled = self
            .entities
            .get(source)
            .ok_or(EcsError::EntityNotFound(source))?
            .is_enabled();
        let components: Vec<ComponentHandle> = self.entities.components(source).collect();

        let handle = self.create_entity();
        let copy = self.entity_id(handle).ok_or(EcsError::InvalidHandle)?;

        for component in components {
            let cloned = self
                .clone_component(component)
                .ok_or(EcsError::InvalidHandle)?;
            self.attach_component(copy, cloned)?;
        }
        if !enabled {
            self.set_enabled(copy, false);
        }
        Ok(copy)
    }

    // =========================================================================
    // Tuples
    // =========================================================================

    /// Registers a tuple cache over a set of component types and fills it
    /// from the current entities. Order and duplicates in `type_ids` do not
    /// matter. Registering an existing set is a no-op.
    ///
    /// # Errors
    ///
    /// - [`EcsError::EmptyTuple`] if `type_ids` is empty
    /// - [`EcsError::UnregisteredType`] if any id is unknown
    pub fn register_components_tuple(&mut self, type_ids: &[ComponentTypeId]) -> EcsResult<()> {
        if type_ids.is_empty() {
            tracing::warn!("Rejected empty components tuple");
            return Err(EcsError::EmptyTuple);
        }
        if let Some(unknown) = type_ids
            .iter()
            .find(|type_id| type_id.index() >= self.collections.len())
        {
            return Err(EcsError::UnregisteredType(unknown.to_string()));
        }

        let type_ids = canonical_type_ids(type_ids);
        if !self.tuples.register(type_ids.clone()) {
            return Ok(());
        }

        let entities = &self.entities;
        for id in entities.iter().map(EntityRecord::id) {
            self.tuples.refresh_in(&type_ids, id, &|type_id| {
                entities.component_handle(id, type_id)
            });
        }

        tracing::debug!(
            "Registered components tuple {:?} ({} tuples)",
            type_ids,
            self.tuples.len()
        );
        Ok(())
    }

    /// The cache of a registered tuple. Order and duplicates in `type_ids`
    /// do not matter.
    #[must_use]
    pub fn components_tuple(&self, type_ids: &[ComponentTypeId]) -> Option<&TupleCache> {
        self.tuples.get(&canonical_type_ids(type_ids))
    }

    // =========================================================================
    // Systems
    // =========================================================================

    /// Registers a system. It is initialized by [`init`](Self::init).
    ///
    /// # Errors
    ///
    /// - [`EcsError::RegistrationClosed`] after [`init`](Self::init)
    /// - [`EcsError::DuplicateSystem`] if a system of this type exists
    pub fn register_system<S: System>(&mut self, system: S) -> EcsResult<SystemId> {
        if self.phase != Phase::Setup {
            tracing::warn!(
                "Rejected registration of system {} after init",
                std::any::type_name::<S>()
            );
            return Err(EcsError::RegistrationClosed(
                std::any::type_name::<S>().to_string(),
            ));
        }

        let entry = self
            .scheduler
            .make_entry(system)
            .ok_or_else(|| EcsError::DuplicateSystem(std::any::type_name::<S>().to_string()))?;
        let id = entry.id;
        tracing::info!("Registered system {} as {} (priority {})", entry.name, id, entry.priority);
        self.scheduler.insert(entry);
        Ok(id)
    }

    /// Adds a system at any time before [`destroy`](Self::destroy).
    ///
    /// During setup this is [`register_system`](Self::register_system).
    /// While running and outside a pass the system is inserted and
    /// initialized immediately. During a pass it is queued, then inserted
    /// and initialized at the start of the next [`update`](Self::update), so
    /// it never runs in the frame it was added.
    ///
    /// # Errors
    ///
    /// - [`EcsError::Destroyed`] after [`destroy`](Self::destroy)
    /// - [`EcsError::DuplicateSystem`] if a system of this type exists
    pub fn add_system<S: System>(&mut self, system: S) -> EcsResult<SystemId> {
        match self.phase {
            Phase::Setup => return self.register_system(system),
            Phase::Destroyed => {
                tracing::warn!("Rejected system add after manager destroy");
                return Err(EcsError::Destroyed);
            }
            Phase::Running => {}
        }

        let entry = self
            .scheduler
            .make_entry(system)
            .ok_or_else(|| EcsError::DuplicateSystem(std::any::type_name::<S>().to_string()))?;
        let id = entry.id;

        if self.scheduler.is_updating() {
            tracing::debug!("Deferred add of system {} until the pass ends", entry.name);
            self.scheduler.defer_add(entry);
        } else {
            tracing::debug!("Added system {}", entry.name);
            self.scheduler.insert(entry);
            self.init_system(id);
        }
        Ok(id)
    }

    /// Removes a system.
    ///
    /// Outside a pass the system's `destroy` hook runs and it is unlinked
    /// immediately. During a pass the removal is applied once the pass
    /// ends. Returns `false` for an unknown id.
    pub fn remove_system(&mut self, id: SystemId) -> bool {
        if self.scheduler.is_updating() {
            let queued = self.scheduler.defer_remove(id);
            if queued {
                tracing::debug!("Deferred removal of {} until the pass ends", id);
            }
            return queued;
        }
        self.remove_system_now(id)
    }

    fn remove_system_now(&mut self, id: SystemId) -> bool {
        let Some((mut entry, initialized)) = self.scheduler.remove(id) else {
            return false;
        };
        if initialized && self.phase == Phase::Running {
            if let Some(system) = entry.system.as_mut() {
                system.destroy(self);
            }
        }
        tracing::debug!("Removed system {}", entry.name);
        true
    }

    /// Changes a system's priority. Takes effect at the next
    /// [`update`](Self::update), never during a running pass.
    pub fn set_system_priority(&mut self, id: SystemId, priority: i32) -> bool {
        self.scheduler.set_priority(id, priority)
    }

    /// Id of the system of type `S`.
    #[must_use]
    pub fn system_id<S: System>(&self) -> Option<SystemId> {
        self.scheduler.id_of_type(TypeId::of::<S>())
    }

    /// Id of the system whose type name (last path segment) is `name`.
    #[must_use]
    pub fn system_id_by_name(&self, name: &str) -> Option<SystemId> {
        self.scheduler.id_of_name(name)
    }

    /// Number of known systems, queued additions included.
    #[must_use]
    pub fn system_count(&self) -> usize {
        self.scheduler.len()
    }

    /// Ids of the ordered system list, in run order. Systems queued for
    /// addition are not listed until the next update inserts them.
    #[must_use]
    pub fn system_order(&self) -> Vec<SystemId> {
        self.scheduler.ordered_ids()
    }

    // =========================================================================
    // Frame loop
    // =========================================================================

    /// Closes registration and initializes every registered system in
    /// priority order.
    ///
    /// # Errors
    ///
    /// Returns [`EcsError::RegistrationClosed`] if called twice, or
    /// [`EcsError::Destroyed`] after [`destroy`](Self::destroy).
    pub fn init(&mut self) -> EcsResult<()> {
        match self.phase {
            Phase::Setup => {}
            Phase::Running => {
                tracing::warn!("Manager init called twice");
                return Err(EcsError::RegistrationClosed("init".to_string()));
            }
            Phase::Destroyed => {
                tracing::warn!("Manager init called after destroy");
                return Err(EcsError::Destroyed);
            }
        }

        self.phase = Phase::Running;
        self.run_pass(|system, manager| system.init(manager));

        tracing::info!(
            "Manager initialized: {} component types, {} systems",
            self.collections.len(),
            self.scheduler.len()
        );
        Ok(())
    }

    /// Runs one frame:
    ///
    /// 1. inserts and initializes systems added during the previous pass
    /// 2. re-sorts the system list if a priority changed
    /// 3. calls every system's `update`, in order
    /// 4. applies removals requested during the pass
    ///
    /// # Errors
    ///
    /// [`EcsError::NotInitialized`] before [`init`](Self::init),
    /// [`EcsError::Destroyed`] after [`destroy`](Self::destroy).
    pub fn update(&mut self) -> EcsResult<()> {
        self.ensure_running("update")?;
        tracing::trace!("Frame update begin");

        for entry in self.scheduler.take_pending_adds() {
            tracing::debug!("Added deferred system {}", entry.name);
            let id = entry.id;
            self.scheduler.insert(entry);
            self.init_system(id);
        }
        self.scheduler.apply_priorities();
        self.run_pass(|system, manager| system.update(manager));

        tracing::trace!("Frame update end");
        Ok(())
    }

    /// Calls every system's `render`, in order.
    ///
    /// # Errors
    ///
    /// As [`update`](Self::update).
    pub fn render(&mut self) -> EcsResult<()> {
        self.ensure_running("render")?;
        self.run_pass(|system, manager| system.render(manager));
        Ok(())
    }

    /// Tears everything down: each system's `destroy` hook in order, then
    /// every entity (notifications fire), every component and every
    /// registry. Delegates are cleared last.
    pub fn destroy(&mut self) {
        if self.phase == Phase::Destroyed {
            tracing::warn!("Manager destroy called twice");
            return;
        }
        let initialized = self.phase == Phase::Running;
        self.phase = Phase::Destroyed;

        let systems = self.scheduler.drain();
        let system_count = systems.len();
        if initialized {
            for mut system in systems.into_iter().filter_map(|entry| entry.system) {
                system.destroy(self);
            }
        }

        let (entities, mut hooks) = self.split();
        entities.clear(&mut hooks);

        for collection in &mut self.collections {
            collection.clear();
        }
        self.collections.clear();
        self.type_ids.clear();
        self.names.clear();
        self.tuples.clear();
        self.events.clear();

        tracing::info!("Manager destroyed ({} systems torn down)", system_count);
    }

    // =========================================================================
    // Internals
    // =========================================================================

    fn split(&mut self) -> (&mut EntitiesCollection, Hooks<'_>) {
        (
            &mut self.entities,
            Hooks {
                collections: &mut self.collections,
                tuples: &mut self.tuples,
                events: &mut self.events,
            },
        )
    }

    fn ensure_alive(&self) -> EcsResult<()> {
        if self.phase == Phase::Destroyed {
            tracing::warn!("Component created after manager destroy");
            return Err(EcsError::Destroyed);
        }
        Ok(())
    }

    fn ensure_running(&self, operation: &str) -> EcsResult<()> {
        match self.phase {
            Phase::Running => Ok(()),
            Phase::Setup => {
                tracing::warn!("Manager {} called before init", operation);
                Err(EcsError::NotInitialized)
            }
            Phase::Destroyed => {
                tracing::warn!("Manager {} called after destroy", operation);
                Err(EcsError::Destroyed)
            }
        }
    }

    /// Runs one hook over the ordered list, then applies queued removals.
    /// Runs `hook` on every system of the ordered list, in order.
    fn run_pass(&mut self, hook: fn(&mut Box<dyn System>, &mut Self)) {
        self.scheduler.begin_pass();
        for index in 0..self.scheduler.ordered_len() {
            let Some((id, mut system)) = self.scheduler.take_system(index) else {
                continue;
            };
            hook(&mut system, self);
            self.scheduler.restore_system(index, id, system);
        }
        self.scheduler.end_pass();

        for id in self.scheduler.take_pending_removes() {
            self.remove_system_now(id);
        }
    }

    /// Calls `init` on a system already in the ordered list.
    fn init_system(&mut self, id: SystemId) {
        let Some(index) = self.scheduler.position(id) else {
            return;
        };
        if let Some((id, mut system)) = self.scheduler.take_system(index) {
            system.init(self);
            self.scheduler.restore_system(index, id, system);
        }
    }
}

impl Default for Manager {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::rc::Rc;

    #[derive(Clone, Debug, Default, PartialEq)]
    struct Mesh {
        vertices: u32,
    }

    impl Component for Mesh {
        const NAME: &'static str = "Mesh";
    }

    #[derive(Clone, Debug, Default, PartialEq)]
    struct Label(String);

    impl Component for Label {
        const NAME: &'static str = "Label";
    }

    fn manager() -> Manager {
        let mut manager = Manager::new();
        manager.register_component_type::<Mesh>().unwrap();
        manager.register_component_type::<Label>().unwrap();
        manager
    }

    fn spawn(manager: &mut Manager) -> EntityId {
        let handle = manager.create_entity();
        manager.entity_id(handle).unwrap()
    }

    #[test]
    fn test_dense_type_ids() {
        let manager = manager();
        assert_eq!(manager.component_type_id::<Mesh>(), ComponentTypeId::new(0));
        assert_eq!(manager.component_type_id_by_name("Label"), ComponentTypeId::new(1));
        assert_eq!(manager.component_type_id_by_name("Nope"), ComponentTypeId::INVALID);
        assert_eq!(manager.component_name(ComponentTypeId::new(1)), "Label");
        assert_eq!(manager.component_name(ComponentTypeId::new(9)), UNDEFINED_COMPONENT_NAME);
    }

    #[test]
    fn test_registration_rules() {
        let mut manager = manager();
        assert_eq!(
            manager.register_component_type::<Mesh>(),
            Err(EcsError::DuplicateComponentType("Mesh".to_string()))
        );

        manager.init().unwrap();
        #[derive(Clone, Default)]
        struct Late;
        impl Component for Late {
            const NAME: &'static str = "Late";
        }
        assert!(matches!(
            manager.register_component_type::<Late>(),
            Err(EcsError::RegistrationClosed(_))
        ));
    }

    #[test]
    fn test_create_by_name_and_id() {
        let mut manager = manager();
        let by_name = manager.create_component_by_name("Mesh").unwrap();
        assert_eq!(manager.get_component::<Mesh>(by_name), Some(&Mesh::default()));

        let by_id = manager
            .create_component_by_type_id(ComponentTypeId::new(1))
            .unwrap();
        assert_eq!(by_id.component_type(), ComponentTypeId::new(1));
        assert!(manager
            .get_component_raw(by_id)
            .unwrap()
            .downcast_ref::<Label>()
            .is_some());

        assert!(matches!(
            manager.create_component_by_name("Ghost"),
            Err(EcsError::UnregisteredType(_))
        ));
    }

    #[test]
    fn test_destroy_attached_component_detaches_first() {
        let mut manager = manager();
        let log = Rc::new(RefCell::new(Vec::new()));

        let detached = Rc::clone(&log);
        manager
            .events_mut()
            .component_detached
            .subscribe(move |_, _| detached.borrow_mut().push("detached"));
        let destroyed = Rc::clone(&log);
        manager
            .events_mut()
            .component_destroyed
            .subscribe(move |_, _| destroyed.borrow_mut().push("destroyed"));

        let entity = spawn(&mut manager);
        let mesh = manager.create_component(Mesh { vertices: 3 }).unwrap();
        manager.attach_component(entity, mesh).unwrap();

        assert!(manager.destroy_component(mesh));
        assert_eq!(*log.borrow(), vec!["detached", "destroyed"]);
        assert_eq!(manager.entities().components_count(entity), 0);
        assert!(!manager.destroy_component(mesh));
    }

    #[test]
    fn test_attach_rules() {
        let mut manager = manager();
        let a = spawn(&mut manager);
        let b = spawn(&mut manager);
        let mesh = manager.create_component(Mesh::default()).unwrap();

        manager.attach_component(a, mesh).unwrap();
        assert_eq!(manager.component_owner(mesh), Some(a));
        assert_eq!(
            manager.attach_component(b, mesh),
            Err(EcsError::ComponentAlreadyAttached(a))
        );

        let second = manager.create_component(Mesh::default()).unwrap();
        assert!(matches!(
            manager.attach_component(a, second),
            Err(EcsError::DuplicateComponent { .. })
        ));
        assert_eq!(manager.entity_component::<Mesh>(a), Some(mesh));

        assert_eq!(manager.detach_component(a, mesh.component_type()), Some(mesh));
        assert_eq!(manager.component_owner(mesh), None);
        manager.attach_component(b, mesh).unwrap();
    }

    #[test]
    fn test_component_activation_follows_entity() {
        let mut manager = manager();
        let parent = spawn(&mut manager);
        let child = spawn(&mut manager);
        manager.add_child(parent, child).unwrap();

        let mesh = manager.create_component(Mesh::default()).unwrap();
        manager.attach_component(child, mesh).unwrap();
        assert!(manager.is_component_active(mesh));

        manager.set_enabled(parent, false);
        assert!(!manager.is_component_active(mesh));

        let mut seen = 0;
        manager.for_each_active::<Mesh>(|_, _| seen += 1);
        assert_eq!(seen, 0);

        manager.set_enabled(parent, true);
        assert!(manager.is_component_active(mesh));
    }

    #[test]
    fn test_move_component_data() {
        let mut manager = manager();
        let entity = spawn(&mut manager);
        let mesh = manager.create_component(Mesh { vertices: 12 }).unwrap();
        manager.attach_component(entity, mesh).unwrap();

        let mut destination = Mesh::default();
        assert!(!manager.move_component_data(mesh, &mut Label::default()));
        assert!(manager.move_component_data(mesh, &mut destination));
        assert_eq!(destination.vertices, 12);
        assert!(!manager.is_component_valid(mesh));
        assert!(manager.entity_component::<Mesh>(entity).is_none());
    }

    #[test]
    fn test_clone_entity() {
        let mut manager = manager();
        let root = spawn(&mut manager);
        let first = spawn(&mut manager);
        let second = spawn(&mut manager);
        manager.add_child(root, first).unwrap();
        manager.add_child(root, second).unwrap();
        manager.set_enabled(second, false);

        let mesh = manager.create_component(Mesh { vertices: 4 }).unwrap();
        manager.attach_component(first, mesh).unwrap();

        let copy = manager.clone_entity(root).unwrap();
        let copy = manager.entity_id(copy).unwrap();

        let children: Vec<EntityId> = manager.entities().children(copy).collect();
        assert_eq!(children.len(), 2);
        assert!(manager.is_enabled(children[0]));
        assert!(!manager.is_enabled(children[1]));

        let cloned_mesh = manager.entity_component::<Mesh>(children[0]).unwrap();
        assert_ne!(cloned_mesh, mesh);
        assert_eq!(manager.get_component::<Mesh>(cloned_mesh).unwrap().vertices, 4);
        assert_eq!(manager.entity_count(), 6);
    }

    #[test]
    fn test_clone_deep_chain() {
        const DEPTH: usize = 5_000;

        let mut manager = manager();
        let root = spawn(&mut manager);
        let mut tail = root;
        for _ in 1..DEPTH {
            let next = spawn(&mut manager);
            manager.add_child(tail, next).unwrap();
            tail = next;
        }
        let mesh = manager.create_component(Mesh { vertices: 9 }).unwrap();
        manager.attach_component(tail, mesh).unwrap();

        let copy = manager.clone_entity(root).unwrap();
        let copy = manager.entity_id(copy).unwrap();
        assert_eq!(manager.entity_count(), 2 * DEPTH);
        assert_eq!(manager.entities().parent_of(copy), None);
        assert_eq!(manager.entities().branch_len(copy), DEPTH);

        let mut leaf = copy;
        while let Some(child) = manager.entities().child_at(leaf, 0) {
            leaf = child;
        }
        assert_eq!(manager.entities().depth(leaf), Some(u32::try_from(DEPTH - 1).unwrap()));
        let cloned_mesh = manager.entity_component::<Mesh>(leaf).unwrap();
        assert_eq!(manager.get_component::<Mesh>(cloned_mesh).unwrap().vertices, 9);
    }

    #[test]
    fn test_tuple_cache_tracks_attachments() {
        let mut manager = manager();
        let mesh_id = manager.component_type_id::<Mesh>();
        let label_id = manager.component_type_id::<Label>();

        let early = spawn(&mut manager);
        let mesh = manager.create_component(Mesh::default()).unwrap();
        let label = manager.create_component(Label::default()).unwrap();
        manager.attach_component(early, mesh).unwrap();
        manager.attach_component(early, label).unwrap();

        manager.register_components_tuple(&[label_id, mesh_id]).unwrap();
        let tuple = manager.components_tuple(&[mesh_id, label_id]).unwrap();
        assert_eq!(tuple.len(), 1);
        assert_eq!(tuple.row(early).unwrap().handles(), &[mesh, label]);

        let late = spawn(&mut manager);
        let late_mesh = manager.create_component(Mesh::default()).unwrap();
        manager.attach_component(late, late_mesh).unwrap();
        assert_eq!(manager.components_tuple(&[mesh_id, label_id]).unwrap().len(), 1);

        let late_label = manager.create_component(Label::default()).unwrap();
        manager.attach_component(late, late_label).unwrap();
        assert_eq!(manager.components_tuple(&[mesh_id, label_id]).unwrap().len(), 2);

        manager.detach_component(early, label_id);
        manager.destroy_entity(late);
        assert!(manager.components_tuple(&[mesh_id, label_id]).unwrap().is_empty());

        assert!(matches!(
            manager.register_components_tuple(&[ComponentTypeId::new(40)]),
            Err(EcsError::UnregisteredType(_))
        ));
    }

    #[test]
    fn test_empty_tuple_rejected() {
        let mut manager = manager();
        let early = spawn(&mut manager);

        assert_eq!(manager.register_components_tuple(&[]), Err(EcsError::EmptyTuple));
        assert!(manager.components_tuple(&[]).is_none());

        let late = spawn(&mut manager);
        let mesh = manager.create_component(Mesh::default()).unwrap();
        manager.attach_component(late, mesh).unwrap();
        assert!(manager.components_tuple(&[]).is_none());
        assert!(manager.entities().is_alive(early));
    }

    #[test]
    fn test_frame_calls_need_init() {
        let mut manager = manager();
        assert_eq!(manager.update(), Err(EcsError::NotInitialized));
        manager.init().unwrap();
        assert!(manager.update().is_ok());
        assert!(manager.render().is_ok());
        manager.destroy();
        assert_eq!(manager.update(), Err(EcsError::Destroyed));
        assert_eq!(manager.phase(), Phase::Destroyed);
        assert!(matches!(
            manager.create_component(Mesh::default()),
            Err(EcsError::Destroyed)
        ));
    }

    #[test]
    fn test_with_config_validates() {
        let config = ManagerConfig {
            node_chunk_size: 0,
            ..ManagerConfig::default()
        };
        assert!(matches!(
            Manager::with_config(config),
            Err(EcsError::InvalidConfig(_))
        ));
    }
}
