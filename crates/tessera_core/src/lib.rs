//! # TESSERA Core
//!
//! Single-threaded ECS runtime substrate:
//! - Chunked slot pools with stable, generation-checked handles
//! - Entity hierarchy with activation cascade
//! - Priority-ordered systems with deferred add/remove
//! - Component tuple caches and lifecycle notifications
//!
//! ## Architecture Rules
//!
//! 1. **Growth never relocates** - pools append chunks, indices stay valid
//! 2. **Handles are weak** - a stale handle resolves to `None`, never to
//!    another value
//! 3. **No globals** - the host owns one [`Manager`] and passes it around
//!
//! ## Example
//!
//! ```rust
//! use tessera_core::{Component, Manager};
//!
//! #[derive(Clone, Default)]
//! struct Transform {
//!     x: f32,
//! }
//!
//! impl Component for Transform {
//!     const NAME: &'static str = "Transform";
//! }
//!
//! let mut manager = Manager::new();
//! manager.register_component_type::<Transform>().unwrap();
//! manager.init().unwrap();
//!
//! let entity = manager.create_entity();
//! let entity = manager.entity_id(entity).unwrap();
//! let transform = manager.create_component(Transform { x: 1.0 }).unwrap();
//! manager.attach_component(entity, transform).unwrap();
//!
//! manager.destroy_component(transform);
//! assert!(manager.get_component::<Transform>(transform).is_none());
//! ```

#![deny(missing_docs)]
#![deny(unsafe_code)]
#![warn(clippy::pedantic)]
#![deny(clippy::perf)]

pub mod config;
pub mod ecs;
pub mod error;
pub mod memory;

pub use config::ManagerConfig;
pub use ecs::{
    Component, ComponentCollection, ComponentHandle, ComponentTypeId, DestroyPolicy,
    EntitiesCollection, EntityHandle, EntityId, EntityListener, EntityRecord, ErasedCollection,
    Events, HandleDomain, Manager, Phase, System, SystemId, TupleCache, TupleRow,
};
pub use error::{EcsError, EcsResult};
pub use memory::{PoolHandle, SlotPool};
