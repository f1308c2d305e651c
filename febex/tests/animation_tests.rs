//! Tests for binding and baking animation onto an export skeleton

use approx::assert_relative_eq;
use febex::{
    AnimationBaker, BakeState, BakerOptions, ConstraintKind, Error, FrameRange, JointHandle,
    MemoryScene, NodeId, NodeType, Quaternion, SceneStore, Transform, Vector3D, bake_animation,
    progress::SilentProgressHandler,
};

struct Rig {
    scene: MemoryScene,
    old: Vec<JointHandle>,
    new: Vec<JointHandle>,
}

fn rig(names: &[&str]) -> Rig {
    let mut scene = MemoryScene::new();
    let mut old = Vec::new();
    let mut new = Vec::new();
    let mut parents: Option<(NodeId, NodeId)> = None;
    for (i, name) in names.iter().enumerate() {
        let position = Vector3D::new(0.0, i as f32, 0.0);
        let source = scene
            .add_joint(name, parents.as_ref().map(|p| &p.0), position)
            .unwrap();
        let export = scene
            .add_joint(&format!("{name}_INF"), parents.as_ref().map(|p| &p.1), position)
            .unwrap();
        old.push(JointHandle::resolve(&scene, &source).unwrap());
        new.push(JointHandle::resolve(&scene, &export).unwrap());
        parents = Some((source, export));
    }
    Rig { scene, old, new }
}

#[test]
fn test_length_mismatch_creates_nothing() {
    let Rig {
        mut scene,
        old,
        new,
    } = rig(&["Hips", "Spine", "Head"]);
    let before = scene.node_count();

    let err = AnimationBaker::bind(&mut scene, &old, &new[..2], BakerOptions::default())
        .unwrap_err();
    assert!(matches!(err, Error::MissingMapping { .. }));
    assert_eq!(scene.node_count(), before);
}

#[test]
fn test_misnamed_pair_creates_nothing() {
    let Rig {
        mut scene,
        old,
        mut new,
    } = rig(&["Hips", "Spine"]);
    new.swap(0, 1);
    let before = scene.node_count();

    let err = AnimationBaker::bind(&mut scene, &old, &new, BakerOptions::default()).unwrap_err();
    assert!(matches!(err, Error::MissingMapping { .. }));
    assert_eq!(scene.node_count(), before);

    // without name verification the same pairing is accepted
    let options = BakerOptions {
        verify_suffix: None,
        ..BakerOptions::default()
    };
    let baker = AnimationBaker::bind(&mut scene, &old, &new, options).unwrap();
    assert_eq!(baker.constraints().len(), 2);
}

#[test]
fn test_no_flip_keeps_rotations_continuous() {
    let Rig {
        mut scene,
        old,
        new,
    } = rig(&["Arm"]);
    let arm = old[0].id().clone();

    // a spin around Y past 180 degrees, keyed with alternating quaternion signs
    let source: Vec<Quaternion> = (0..8)
        .map(|i| {
            let q = Quaternion::from_rotation_y(0.6 * i as f32);
            if i % 2 == 0 { q } else { -q }
        })
        .collect();
    for (i, q) in source.iter().enumerate() {
        scene
            .set_key(&arm, (i + 1) as f64, Transform::new(Vector3D::ZERO, *q))
            .unwrap();
    }

    let mut baker = AnimationBaker::bind(&mut scene, &old, &new, BakerOptions::default()).unwrap();
    assert_eq!(baker.state(), BakeState::Constrained);
    let report = baker
        .bake(
            &mut scene,
            Some(FrameRange::new(1.0, 8.0)),
            &mut SilentProgressHandler::new(),
        )
        .unwrap();
    assert_eq!(baker.state(), BakeState::Baked);
    assert_eq!(report.frames, 8);

    let keys = scene.keys(new[0].id());
    assert_eq!(keys.len(), 8);
    for pair in keys.windows(2) {
        assert!(
            pair[0].transform.rotation.dot(pair[1].transform.rotation) >= 0.0,
            "flip between frame {} and {}",
            pair[0].frame,
            pair[1].frame
        );
    }
    for (key, expected) in keys.iter().zip(&source) {
        assert_relative_eq!(key.transform.rotation.dot(*expected).abs(), 1.0, epsilon = 1e-4);
    }
}

#[test]
fn test_parent_constraint_bakes_translation() {
    let Rig {
        mut scene,
        old,
        new,
    } = rig(&["Root"]);
    let root = old[0].id().clone();
    scene
        .set_key(&root, 0.0, Transform::from_translation(Vector3D::ZERO))
        .unwrap();
    scene
        .set_key(&root, 4.0, Transform::from_translation(Vector3D::new(4.0, 0.0, 0.0)))
        .unwrap();

    let options = BakerOptions {
        constraint_kind: ConstraintKind::Parent,
        ..BakerOptions::default()
    };
    let mut baker = AnimationBaker::bind(&mut scene, &old, &new, options).unwrap();
    baker
        .bake(
            &mut scene,
            Some(FrameRange::new(0.0, 4.0)),
            &mut SilentProgressHandler::new(),
        )
        .unwrap();

    let keys = scene.keys(new[0].id());
    assert_eq!(keys.len(), 5);
    assert_relative_eq!(keys[2].transform.translation.x, 2.0, epsilon = 1e-5);
    assert_relative_eq!(keys[4].transform.translation.x, 4.0, epsilon = 1e-5);
}

#[test]
fn test_interrupted_bake_keeps_constraints() {
    let Rig {
        mut scene,
        old,
        new,
    } = rig(&["Hips", "Spine"]);
    let mut baker = AnimationBaker::bind(&mut scene, &old, &new, BakerOptions::default()).unwrap();

    let err = baker
        .bake(
            &mut scene,
            Some(FrameRange::new(1.0, 10.0)),
            &mut SilentProgressHandler::cancel_after(3),
        )
        .unwrap_err();
    assert!(err.is_cancelled());
    assert_eq!(baker.state(), BakeState::Constrained);
    for constraint in baker.constraints() {
        assert!(scene.exists(constraint));
    }
    assert!(!scene.keys(new[0].id()).is_empty());
}

#[test]
fn test_bake_uses_playback_range_by_default() {
    let Rig {
        mut scene,
        old,
        new,
    } = rig(&["Hips"]);
    scene.set_playback_range(FrameRange::new(10.0, 14.0));

    let report = bake_animation(&mut scene, &old, &new, None).unwrap();
    assert_eq!(report.range, FrameRange::new(10.0, 14.0));
    assert_eq!(report.frames, 5);
    assert_eq!(report.discarded, 1);
    assert!(
        scene
            .nodes_of_type(&NodeType::Constraint(ConstraintKind::Orient))
            .is_empty()
    );
    assert_eq!(scene.keys(new[0].id()).first().map(|k| k.frame), Some(10.0));
}

#[test]
fn test_unbounded_ranges_are_rejected() {
    let Rig {
        mut scene,
        old,
        new,
    } = rig(&["Hips"]);
    let mut baker = AnimationBaker::bind(&mut scene, &old, &new, BakerOptions::default()).unwrap();

    for range in [
        FrameRange::new(1.0, f64::NAN),
        FrameRange::new(f64::NAN, 4.0),
        FrameRange::new(0.0, f64::INFINITY),
        FrameRange::new(0.0, 1e12),
    ] {
        let err = baker
            .bake(&mut scene, Some(range), &mut SilentProgressHandler::new())
            .unwrap_err();
        assert!(matches!(err, Error::InvalidParameter { .. }), "{range:?}");
    }
    assert_eq!(baker.state(), BakeState::Constrained);
    assert!(scene.keys(new[0].id()).is_empty());
}
