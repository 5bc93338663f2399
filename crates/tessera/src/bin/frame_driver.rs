//! # Frame Driver
//!
//! End-to-end run of the runtime:
//!
//! register mesh + UI system → 2050 meshes → destroy #1500 → create one
//! more → check the stale handle → N frames → destroy
//!
//! Usage: `frame_driver [frames]` (default 1000).

use std::time::Instant;

use tessera::{
    EcsError, EcsResult, FrameLoop, FrameLoopConfig, Manager, StaticMesh, UiSystem,
};

const MESH_COUNT: usize = 2050;
const DESTROYED_MESH: usize = 1500;
const PAINTED_MESH: usize = 5;

fn main() -> EcsResult<()> {
    let frames = match std::env::args().nth(1) {
        Some(arg) => arg
            .parse::<u64>()
            .map_err(|err| EcsError::InvalidConfig(format!("frame count {arg:?}: {err}")))?,
        None => 1000,
    };

    println!("╔══════════════════════════════════════════════════════════════════╗");
    println!("║                  TESSERA FRAME DRIVER                            ║");
    println!("║        Pools → Handles → Systems → Frames → Teardown             ║");
    println!("╚══════════════════════════════════════════════════════════════════╝");
    println!();

    let mut manager = Manager::new();
    manager.register_component_type::<StaticMesh>()?;
    manager.register_system(UiSystem::default())?;
    manager.init()?;

    // =========================================================================
    // STEP 1: Fill the mesh pool past two chunks
    // =========================================================================
    let start = Instant::now();
    let mut meshes = Vec::with_capacity(MESH_COUNT);
    for _ in 0..MESH_COUNT {
        meshes.push(manager.create_component(StaticMesh::default())?);
    }
    let create_time = start.elapsed();

    if let Some(mesh) = manager.get_component_mut::<StaticMesh>(meshes[PAINTED_MESH]) {
        *mesh = StaticMesh::new(1.0, 0.25, 0.5, 0.75);
    }

    // =========================================================================
    // STEP 2: Release one slot and reuse it
    // =========================================================================
    let stale = meshes[DESTROYED_MESH];
    manager.destroy_component(stale);
    let reused = manager.create_component(StaticMesh::new(1.0, 1.0, 1.0, 1.0))?;

    let chunks = manager
        .collection::<StaticMesh>()
        .map_or(0, |collection| collection.chunk_count());

    println!("┌─ COMPONENTS ───────────────────────────────────────────────────┐");
    println!("│ Created:            {MESH_COUNT} in {create_time:?}");
    println!("│ Chunks:             {chunks}");
    match manager.get_component::<StaticMesh>(meshes[PAINTED_MESH]) {
        Some(mesh) => println!(
            "│ Mesh #{PAINTED_MESH}:            ({}, {}, {}, {})",
            mesh.color_a, mesh.color_x, mesh.color_y, mesh.color_z
        ),
        None => println!("│ Mesh #{PAINTED_MESH}:            missing"),
    }
    println!("│ Reused slot:        {reused:?}");
    if manager.is_component_valid(stale) {
        println!("│ ✗ Stale handle #{DESTROYED_MESH} still resolves");
    } else {
        println!("│ ✓ Stale handle #{DESTROYED_MESH}: invalid");
    }
    println!("└──────────────────────────────────────────────────────────────────┘");
    println!();

    // =========================================================================
    // STEP 3: Frames
    // =========================================================================
    println!("Running {frames} frames...");
    let mut frame_loop = FrameLoop::new(FrameLoopConfig {
        frames,
        enable_timing_logs: true,
        ..FrameLoopConfig::default()
    });
    frame_loop.run(&mut manager)?.print_summary();
    println!();

    // =========================================================================
    // STEP 4: Teardown
    // =========================================================================
    manager.destroy();
    println!("Manager destroyed ({:?}).", manager.phase());
    Ok(())
}
