//! Tests for skin rebinding and the weight transfer fallback chain

use approx::assert_relative_eq;
use febex::{
    InfluenceSet, InfluenceTreeBuilder, MemoryScene, NodeId, SceneStore, SkinBinding,
    TransferOptions, TransferReport, TransferStage, Vector3D, VertexWeights, mesh,
    progress::SilentProgressHandler, skin,
};

/// Two parallel triangles one unit above and below the origin.
/// The upper one is skinned to `A`, the lower one to `B`, so a sample at the
/// origin is equally close to both and the surface stage is ambiguous.
fn sandwich(b_position: Vector3D, b_parent: Option<Vector3D>) -> (MemoryScene, SkinBinding) {
    let mut scene = MemoryScene::new();
    let root = scene
        .add_joint("R", None, Vector3D::new(-3.0, 0.0, 0.0))
        .unwrap();
    let a = scene
        .add_joint("A", Some(&root), Vector3D::new(3.0, 0.0, 0.0))
        .unwrap();
    let b_holder = match b_parent {
        Some(position) => scene.add_joint("C", Some(&root), position).unwrap(),
        None => root.clone(),
    };
    let b = scene.add_joint("B", Some(&b_holder), b_position).unwrap();

    let points = vec![
        Vector3D::new(-1.0, -1.0, 1.0),
        Vector3D::new(1.0, -1.0, 1.0),
        Vector3D::new(0.0, 1.0, 1.0),
        Vector3D::new(-1.0, -1.0, -1.0),
        Vector3D::new(0.0, 1.0, -1.0),
        Vector3D::new(1.0, -1.0, -1.0),
    ];
    let (src, shape) = scene
        .add_mesh("src", points, vec![[0, 1, 2], [3, 4, 5]])
        .unwrap();
    let mut weights = vec![VertexWeights::single(a.clone()); 3];
    weights.extend(vec![VertexWeights::single(b.clone()); 3]);
    scene.add_skin(&shape, &[a, b], weights).unwrap();

    let handle = mesh::resolve(&scene, &src).unwrap();
    let old = SkinBinding::read(&scene, &handle).unwrap();
    (scene, old)
}

/// Export `old` onto a sample mesh whose vertex 3 sits at the origin
fn transfer_to_sample(
    scene: &mut MemoryScene,
    old: &SkinBinding,
) -> (SkinBinding, TransferReport) {
    let used: InfluenceSet = old.influences.iter().cloned().collect();
    let tree = InfluenceTreeBuilder::default()
        .build(scene, &NodeId::new("R"), &used, None)
        .unwrap();
    let far = Vector3D::splat(20.0);
    let (sample, _) = scene
        .add_mesh(
            "sample",
            vec![far, far + Vector3D::X, far + Vector3D::Y, Vector3D::ZERO],
            vec![[0, 1, 2]],
        )
        .unwrap();
    let new = skin::rebind(scene, &sample, tree.mapping()).unwrap();
    let report = skin::transfer_weights(
        scene,
        old,
        &new,
        tree.mapping(),
        &TransferOptions::default(),
        &mut SilentProgressHandler::new(),
    )
    .unwrap();
    (new, report)
}

fn origin_weights(scene: &MemoryScene, new: &SkinBinding) -> VertexWeights {
    scene.get_vertex_weights(new.cluster.id(), 3).unwrap()
}

#[test]
fn test_ambiguous_surface_falls_back_to_closest_bone() {
    // A's bone runs through the origin, B's bone misses it
    let (mut scene, old) = sandwich(Vector3D::new(0.0, 4.0, 0.0), None);
    let (new, report) = transfer_to_sample(&mut scene, &old);

    assert_eq!(report.stage_of(3), Some(TransferStage::ClosestBone));
    assert_relative_eq!(origin_weights(&scene, &new).get(&NodeId::new("A_INF")), 1.0);
}

#[test]
fn test_tied_bones_fall_back_to_closest_joint() {
    // both bones run through the origin, A's joint is closer
    let (mut scene, old) = sandwich(
        Vector3D::new(0.0, 4.0, 0.0),
        Some(Vector3D::new(0.0, -4.0, 0.0)),
    );
    let (new, report) = transfer_to_sample(&mut scene, &old);

    assert_eq!(report.stage_of(3), Some(TransferStage::ClosestJoint));
    assert_relative_eq!(origin_weights(&scene, &new).get(&NodeId::new("A_INF")), 1.0);
}

#[test]
fn test_full_tie_falls_back_to_name_match() {
    // bones and joints are equidistant; vertex 3 of the source is on B
    let (mut scene, old) = sandwich(
        Vector3D::new(0.0, 3.0, 0.0),
        Some(Vector3D::new(0.0, -3.0, 0.0)),
    );
    let (new, report) = transfer_to_sample(&mut scene, &old);

    assert_eq!(report.stage_of(3), Some(TransferStage::NameMatch));
    assert_eq!(report.resolved_by(TransferStage::NameMatch), 1);
    assert_relative_eq!(origin_weights(&scene, &new).get(&NodeId::new("B_INF")), 1.0);
}

#[test]
fn test_name_match_follows_renamed_copies() {
    let (mut scene, old) = sandwich(
        Vector3D::new(0.0, 3.0, 0.0),
        Some(Vector3D::new(0.0, -3.0, 0.0)),
    );
    // left over from an earlier export, so the new copy of B is renamed
    scene.add_joint("B_INF", None, Vector3D::ZERO).unwrap();
    let (new, report) = transfer_to_sample(&mut scene, &old);

    assert_eq!(report.stage_of(3), Some(TransferStage::NameMatch));
    let weights = origin_weights(&scene, &new);
    assert_relative_eq!(weights.get(&NodeId::new("B_INF1")), 1.0);
    assert_eq!(weights.get(&NodeId::new("B_INF")), 0.0);
}

#[test]
fn test_blended_weights_sum_to_one_on_displaced_mesh() {
    let mut scene = MemoryScene::new();
    let hips = scene.add_joint("Hips", None, Vector3D::ZERO).unwrap();
    let knee = scene
        .add_joint("Knee", Some(&hips), Vector3D::new(0.0, -2.0, 0.0))
        .unwrap();
    let foot = scene
        .add_joint("Foot", Some(&knee), Vector3D::new(0.0, -4.0, 0.0))
        .unwrap();

    // a 3 x 5 strip down the leg with weights graded by height
    let mut points = Vec::new();
    let mut weights = Vec::new();
    for row in 0..5 {
        let y = -(row as f32);
        for col in 0..3 {
            points.push(Vector3D::new(col as f32 - 1.0, y, 0.0));
            let mut w = VertexWeights::new();
            let t = row as f32 / 4.0;
            w.add(&hips, (1.0 - t) * 0.5)
                .add(&knee, 0.5)
                .add(&foot, t * 0.5);
            weights.push(w);
        }
    }
    let mut triangles = Vec::new();
    for row in 0..4u32 {
        for col in 0..2u32 {
            let i = row * 3 + col;
            triangles.push([i, i + 1, i + 3]);
            triangles.push([i + 1, i + 4, i + 3]);
        }
    }
    let (leg, shape) = scene.add_mesh("leg", points.clone(), triangles.clone()).unwrap();
    scene
        .add_skin(&shape, &[hips.clone(), knee.clone(), foot.clone()], weights)
        .unwrap();

    let old = SkinBinding::read(&scene, &mesh::resolve(&scene, &leg).unwrap()).unwrap();
    let used: InfluenceSet = old.influences.iter().cloned().collect();
    let tree = InfluenceTreeBuilder::default()
        .build(&mut scene, &hips, &used, None)
        .unwrap();

    // same topology, pushed off the surface and sheared
    let moved: Vec<Vector3D> = points
        .iter()
        .map(|p| *p + Vector3D::new(0.1 * p.y, 0.0, 0.3))
        .collect();
    let (sample, _) = scene.add_mesh("leg_moved", moved, triangles).unwrap();
    let new = skin::rebind(&mut scene, &sample, tree.mapping()).unwrap();
    let report = skin::transfer_weights(
        &mut scene,
        &old,
        &new,
        tree.mapping(),
        &TransferOptions::default(),
        &mut SilentProgressHandler::new(),
    )
    .unwrap();

    assert_eq!(report.num_vertices(), 15);
    for vertex in 0..15 {
        let weights = scene.get_vertex_weights(new.cluster.id(), vertex).unwrap();
        assert!(weights.is_normalized(), "vertex {vertex}: {weights:?}");
        assert!(weights.joints().all(|j| j.as_str().ends_with("_INF")));
    }
    // the middle of the top row stays half on the knee
    let top = scene.get_vertex_weights(new.cluster.id(), 1).unwrap();
    assert_relative_eq!(top.get(&NodeId::new("Knee_INF")), 0.5, epsilon = 1e-3);
}
