//! # Systems
//!
//! A system is a unit of per-frame logic. It receives the [`Manager`] by
//! mutable reference in every hook, so it can create, query and destroy
//! entities and components, or add and remove other systems.
//!
//! ## Lifecycle
//!
//! ```text
//! register / add ──► init ──► update, render (every frame) ──► destroy
//! ```
//!
//! Systems run in ascending [`priority`](System::priority) order; systems
//! with equal priority run in the order they were added.

use std::fmt;

use super::manager::Manager;

/// Per-frame logic plugged into the [`Manager`].
///
/// Only [`update`](System::update) is required.
///
/// ```
/// use tessera_core::{Manager, System};
///
/// struct Clock {
///     frames: u64,
/// }
///
/// impl System for Clock {
///     fn priority(&self) -> i32 {
///         -10
///     }
///
///     fn update(&mut self, _manager: &mut Manager) {
///         self.frames += 1;
///     }
/// }
/// ```
pub trait System: 'static {
    /// Initial ordering key. Lower values run first.
    fn priority(&self) -> i32 {
        0
    }

    /// Called once before the first update this system takes part in.
    fn init(&mut self, _manager: &mut Manager) {}

    /// Called once per frame by [`Manager::update`].
    fn update(&mut self, manager: &mut Manager);

    /// Called once per frame by [`Manager::render`].
    fn render(&mut self, _manager: &mut Manager) {}

    /// Called when the system is removed or the manager is destroyed.
    fn destroy(&mut self, _manager: &mut Manager) {}
}

/// Dense system identifier, assigned in registration order.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(transparent)]
pub struct SystemId(u32);

impl SystemId {
    /// Creates an id from its raw value.
    #[inline]
    #[must_use]
    pub const fn new(raw: u32) -> Self {
        Self(raw)
    }

    /// Returns the raw id.
    #[inline]
    #[must_use]
    pub const fn raw(self) -> u32 {
        self.0
    }
}

impl fmt::Display for SystemId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "system:{}", self.0)
    }
}

/// Last path segment of a type name, generics stripped
/// (`game::ui::UiSystem<f32>` becomes `UiSystem`).
pub(crate) fn short_type_name(full: &'static str) -> &'static str {
    let base = full.split('<').next().unwrap_or(full);
    base.rsplit("::").next().unwrap_or(base)
}
