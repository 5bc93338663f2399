//! # Lifecycle Notifications
//!
//! Synchronous delegates fired by the manager on the calling thread. Every
//! callback receives the event and a read view of the entities, so it can
//! inspect hierarchy and component links as they stand when it fires.
//!
//! | Delegate              | Fires                                            |
//! |-----------------------|--------------------------------------------------|
//! | `component_created`   | after the slot is allocated                      |
//! | `component_destroyed` | after the slot is freed                          |
//! | `component_attached`  | after the component is linked to the entity      |
//! | `component_detached`  | before the link is removed                       |
//! | `entity_created`      | after the record is allocated                    |
//! | `entity_destroyed`    | once the entity is unlinked, before its slot is freed |

use super::entities::EntitiesCollection;
use super::entity::EntityId;
use super::handle::ComponentHandle;

/// Payload of component creation/destruction notifications.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ComponentEvent {
    /// The component.
    pub handle: ComponentHandle,
}

/// Payload of attach/detach notifications.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct AttachmentEvent {
    /// The entity the component is (or was) attached to.
    pub entity: EntityId,
    /// The component.
    pub handle: ComponentHandle,
}

/// Payload of entity creation/destruction notifications.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct EntityEvent {
    /// The entity.
    pub entity: EntityId,
}

/// Token returned by [`Delegate::subscribe`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u32);

type Callback<E> = Box<dyn FnMut(&E, &EntitiesCollection)>;

/// An ordered list of callbacks for one kind of event.
pub struct Delegate<E> {
    subscribers: Vec<(SubscriptionId, Callback<E>)>,
    next_id: u32,
}

impl<E> Delegate<E> {
    /// Creates a delegate with no subscriber.
    #[must_use]
    pub fn new() -> Self {
        Self {
            subscribers: Vec::new(),
            next_id: 0,
        }
    }

    /// Adds a callback. Callbacks run in subscription order.
    pub fn subscribe(
        &mut self,
        callback: impl FnMut(&E, &EntitiesCollection) + 'static,
    ) -> SubscriptionId {
        let id = SubscriptionId(self.next_id);
        self.next_id = self.next_id.wrapping_add(1);
        self.subscribers.push((id, Box::new(callback)));
        id
    }

    /// Removes a callback. Returns `false` if it was not subscribed.
    pub fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        let before = self.subscribers.len();
        self.subscribers.retain(|(subscriber, _)| *subscriber != id);
        self.subscribers.len() != before
    }

    /// Number of subscribed callbacks.
    #[must_use]
    pub fn len(&self) -> usize {
        self.subscribers.len()
    }

    /// Whether nobody is subscribed.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.subscribers.is_empty()
    }

    /// Removes every callback.
    pub fn clear(&mut self) {
        self.subscribers.clear();
    }

    /// Invokes every callback with `event`.
    pub fn broadcast(&mut self, event: &E, entities: &EntitiesCollection) {
        for (_, callback) in &mut self.subscribers {
            callback(event, entities);
        }
    }
}

impl<E> Default for Delegate<E> {
    fn default() -> Self {
        Self::new()
    }
}

/// The six lifecycle delegates owned by the manager.
#[derive(Default)]
pub struct Events {
    /// Component slot allocated.
    pub component_created: Delegate<ComponentEvent>,
    /// Component slot freed.
    pub component_destroyed: Delegate<ComponentEvent>,
    /// Component linked into an entity's component map.
    pub component_attached: Delegate<AttachmentEvent>,
    /// Component about to be unlinked from an entity's component map.
    pub component_detached: Delegate<AttachmentEvent>,
    /// Entity created.
    pub entity_created: Delegate<EntityEvent>,
    /// Entity destroyed.
    pub entity_destroyed: Delegate<EntityEvent>,
}

impl Events {
    /// Drops every subscription of every delegate.
    pub fn clear(&mut self) {
        self.component_created.clear();
        self.component_destroyed.clear();
        self.component_attached.clear();
        self.component_detached.clear();
        self.entity_created.clear();
        self.entity_destroyed.clear();
    }
}
