//! Export a small skinned character and bake a wave onto the export skeleton.
//!
//! Builds the scene in memory, so no host application is needed.
//! Set FEBEX_VERBOSE=1 for debug logging.
//!
//! Usage:
//!   cargo run -p febex --example export_rig

use std::error::Error;

use febex::{
    ExportBuilder, FrameRange, MemoryScene, NodeId, Quaternion, SceneStore, Transform, Vector3D,
    VertexWeights, logging,
    progress::PrintProgressHandler,
};

fn build_scene() -> febex::Result<(MemoryScene, NodeId, NodeId)> {
    let mut scene = MemoryScene::new();
    let hips = scene.add_joint("Hips", None, Vector3D::ZERO)?;
    let spine = scene.add_joint("Spine", Some(&hips), Vector3D::new(0.0, 1.0, 0.0))?;
    let shoulder = scene.add_joint("Shoulder", Some(&spine), Vector3D::new(0.5, 1.5, 0.0))?;
    let arm = scene.add_joint("Arm", Some(&shoulder), Vector3D::new(1.0, 1.5, 0.0))?;
    // helper joint nobody skins to
    scene.add_joint("Arm_end", Some(&arm), Vector3D::new(2.0, 1.5, 0.0))?;

    let mut points = Vec::new();
    let mut weights = Vec::new();
    for row in 0..4 {
        let x = row as f32 * 0.7 - 0.3;
        for y in [1.3, 1.7] {
            points.push(Vector3D::new(x, y, 0.0));
            let mut w = VertexWeights::new();
            let t = (x / 2.0).clamp(0.0, 1.0);
            w.add(&spine, 1.0 - t).add(&arm, t);
            weights.push(w);
        }
    }
    let triangles = (0..3u32)
        .flat_map(|i| [[i * 2, i * 2 + 2, i * 2 + 1], [i * 2 + 1, i * 2 + 2, i * 2 + 3]])
        .collect();
    let (sleeve, shape) = scene.add_mesh("sleeve", points, triangles)?;
    scene.add_skin(&shape, &[spine, arm.clone()], weights)?;

    for frame in 1..=12 {
        let angle = (frame as f32 / 12.0 * std::f32::consts::TAU).sin() * 0.8;
        scene.set_key(
            &arm,
            f64::from(frame),
            Transform::new(Vector3D::new(1.0, 1.5, 0.0), Quaternion::from_rotation_z(angle)),
        )?;
    }
    Ok((scene, sleeve, hips))
}

fn main() -> Result<(), Box<dyn Error>> {
    let verbose = std::env::var("FEBEX_VERBOSE").ok().as_deref() == Some("1");
    logging::init(if verbose {
        febex::LogLevel::Debug
    } else {
        febex::LogLevel::Info
    })?;
    logging::attach_stdout_stream();

    let (mut scene, sleeve, hips) = build_scene()?;
    let result = ExportBuilder::new()
        .with_animation_bake(Some(FrameRange::new(1.0, 12.0)))
        .with_progress_handler(Box::new(PrintProgressHandler::new()))
        .run(&mut scene, &sleeve, &hips)?;

    println!("Export group: {}", result.export_group);
    for (old, new) in result.old_influences.iter().zip(&result.new_influences) {
        let parent = scene
            .parent_of(new.id())?
            .map_or_else(|| "<world>".to_string(), |p| p.to_string());
        println!("  {old:<10} -> {new:<12} parent {parent}");
    }
    println!("Export mesh: {}", result.export_mesh.container());
    for stage in febex::TransferStage::ALL {
        println!(
            "  {:?}: {} vertices",
            stage,
            result.report.resolved_by(stage)
        );
    }
    if let Some(bake) = result.bake {
        println!(
            "Baked {} joints over {} frames, {} constraints removed",
            bake.joints, bake.frames, bake.discarded
        );
    }

    logging::detach_all_streams();
    Ok(())
}
