//! Sample payloads: a mesh-like component and a UI-like system.

use tessera_core::{Component, Manager, System};

/// Mesh colour payload.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct StaticMesh {
    /// Alpha channel.
    pub color_a: f32,
    /// Red channel.
    pub color_x: f32,
    /// Green channel.
    pub color_y: f32,
    /// Blue channel.
    pub color_z: f32,
}

impl StaticMesh {
    /// Creates a mesh with the given colour.
    #[must_use]
    pub const fn new(color_a: f32, color_x: f32, color_y: f32, color_z: f32) -> Self {
        Self {
            color_a,
            color_x,
            color_y,
            color_z,
        }
    }
}

impl Component for StaticMesh {
    const NAME: &'static str = "StaticMesh";
}

/// Counts active meshes every update and reports them on render.
#[derive(Debug, Default)]
pub struct UiSystem {
    visible_meshes: usize,
    updates: u64,
    renders: u64,
}

impl UiSystem {
    /// Active meshes seen by the last update.
    #[must_use]
    pub const fn visible_meshes(&self) -> usize {
        self.visible_meshes
    }
}

impl System for UiSystem {
    fn priority(&self) -> i32 {
        100
    }

    fn init(&mut self, manager: &mut Manager) {
        tracing::info!(
            "UiSystem init ({} component types registered)",
            manager.component_type_count()
        );
    }

    fn update(&mut self, manager: &mut Manager) {
        self.updates += 1;
        self.visible_meshes = manager
            .collection::<StaticMesh>()
            .map_or(0, |meshes| meshes.iter_active().count());
    }

    fn render(&mut self, _manager: &mut Manager) {
        self.renders += 1;
        tracing::trace!("UiSystem render: {} meshes", self.visible_meshes);
    }

    fn destroy(&mut self, _manager: &mut Manager) {
        tracing::info!(
            "UiSystem destroyed after {} updates, {} renders",
            self.updates,
            self.renders
        );
    }
}
