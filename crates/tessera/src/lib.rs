//! # TESSERA
//!
//! Facade over the runtime crates, plus the pieces a host needs to drive
//! frames.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────┐
//! │                     host / driver                    │
//! │   FrameLoop::run ──► Manager::update ──► render      │
//! ├──────────────────────────────────────────────────────┤
//! │                    tessera_core                      │
//! │  Manager ─┬─ ComponentCollection<T> (per type)       │
//! │           ├─ EntitiesCollection (hierarchy, map)     │
//! │           ├─ Scheduler (ordered systems)             │
//! │           └─ TupleRegistry, Events                   │
//! │                 all on SlotPool<T>                   │
//! └──────────────────────────────────────────────────────┘
//! ```
//!
//! ## Modules
//!
//! - `frame_loop`: fixed frame count driver with timing stats
//! - `demo`: sample component and system used by the driver binary

pub mod demo;
pub mod frame_loop;

pub use tessera_core as core;

pub use demo::{StaticMesh, UiSystem};
pub use frame_loop::{FrameLoop, FrameLoopConfig, FrameStats};
pub use tessera_core::{
    Component, ComponentHandle, EcsError, EcsResult, EntityId, Manager, ManagerConfig, System,
};
