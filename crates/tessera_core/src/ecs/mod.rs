//! # Entity Component System
//!
//! Entities, components, hierarchy and system scheduling on top of the
//! chunked slot pools in [`crate::memory`].
//!
//! ## Design Philosophy
//!
//! - Every store is a slot pool: growth appends a chunk and never moves data
//! - Handles are weak references carrying the slot generation
//! - Hierarchy and component mapping are intrusive lists in node pools
//! - Dynamic dispatch only at registration seams (collections, systems)

mod component;
mod entities;
mod entity;
mod events;
mod handle;
mod manager;
mod scheduler;
mod storage;
mod system;
mod tuple;

pub use component::{Component, ComponentTypeId};
pub use entities::{Children, Components, EntitiesCollection, EntityListener, DEFAULT_NODE_CHUNK_SIZE};
pub use entity::{DestroyPolicy, EntityId, EntityRecord};
pub use events::{
    AttachmentEvent, ComponentEvent, Delegate, EntityEvent, Events, SubscriptionId,
};
pub use handle::{ComponentHandle, EntityHandle, HandleDomain};
pub use manager::{Manager, Phase, UNDEFINED_COMPONENT_NAME};
pub use storage::{ComponentCollection, ErasedCollection};
pub use system::{System, SystemId};
pub use tuple::{canonical_type_ids, hash_type_ids, TupleCache, TupleRow};
