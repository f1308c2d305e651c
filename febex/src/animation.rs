//! Animation transfer onto the export skeleton
//!
//! Baking is a two step state machine. [`AnimationBaker::bind`] constrains
//! every export joint to its source joint ([`BakeState::Constrained`]).
//! [`AnimationBaker::bake`] then samples the constrained motion frame by frame
//! into keys on the export joints and, by default, deletes the now vestigial
//! constraints ([`BakeState::Baked`]).

use crate::{
    config::ExportConfig,
    error::{Error, Result},
    progress::{PrintProgressHandler, ProgressHandler, step_or_cancel, with_progress},
    scene::{ConstraintOptions, SceneStore},
    types::{
        AttributeValue, BakeOptions, Channels, ConstraintKind, FrameRange, InterpType, JointHandle,
        NodeId,
    },
};

/// Where an [`AnimationBaker`] is in its lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BakeState {
    /// Export joints are driven by live constraints
    Constrained,
    /// Motion has been written as keys
    Baked,
}

/// Options for [`AnimationBaker`]
#[derive(Debug, Clone, PartialEq)]
pub struct BakerOptions {
    /// Constraint driving each export joint
    pub constraint_kind: ConstraintKind,
    /// When set, every export joint must be named `{source}{suffix}`
    pub verify_suffix: Option<String>,
    /// Frame step between samples
    pub step: f64,
    /// Channels written as keys
    pub channels: Channels,
    /// Delete the constraints after baking
    pub discard_constraints: bool,
}

impl Default for BakerOptions {
    fn default() -> Self {
        Self {
            constraint_kind: ConstraintKind::Orient,
            verify_suffix: Some("_INF".to_string()),
            step: 1.0,
            channels: Channels::default(),
            discard_constraints: true,
        }
    }
}

impl From<&ExportConfig> for BakerOptions {
    fn from(config: &ExportConfig) -> Self {
        Self {
            constraint_kind: config.constraint_kind,
            // pairs from an export run come straight from its mapping, and
            // the scene may have renamed copies to keep names unique
            verify_suffix: None,
            step: config.bake_step,
            channels: Channels::default(),
            discard_constraints: config.discard_constraints,
        }
    }
}

/// Summary of a finished bake
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BakeReport {
    /// Frames that were sampled
    pub range: FrameRange,
    /// Number of samples taken per joint
    pub frames: usize,
    /// Number of joints keyed
    pub joints: usize,
    /// Number of constraints deleted afterwards
    pub discarded: usize,
}

/// Drives export joints from their source joints and bakes the result
#[derive(Debug, Clone)]
pub struct AnimationBaker {
    pairs: Vec<(JointHandle, JointHandle)>,
    constraints: Vec<NodeId>,
    state: BakeState,
    options: BakerOptions,
}

impl AnimationBaker {
    /// Constrain each `new[i]` to `old[i]` with a no-flip constraint
    ///
    /// All checks run before the first constraint is created, so a failed
    /// call leaves the scene untouched.
    ///
    /// # Errors
    /// [`Error::MissingMapping`] if the lists differ in length or, when
    /// [`BakerOptions::verify_suffix`] is set, a name does not correspond.
    pub fn bind<S: SceneStore + ?Sized>(
        store: &mut S,
        old: &[JointHandle],
        new: &[JointHandle],
        options: BakerOptions,
    ) -> Result<Self> {
        if old.len() != new.len() {
            return Err(Error::missing_mapping(format!(
                "{} source influences but {} export influences",
                old.len(),
                new.len()
            )));
        }
        for (source, export) in old.iter().zip(new) {
            JointHandle::resolve(&*store, source.id())?;
            JointHandle::resolve(&*store, export.id())?;
            if let Some(suffix) = &options.verify_suffix {
                let expected = format!("{}{suffix}", store.name_of(source.id())?);
                let found = store.name_of(export.id())?;
                if found != expected {
                    return Err(Error::missing_mapping(format!(
                        "{source} should drive {expected} but is paired with {found}"
                    )));
                }
            }
        }

        log::info!("Binding new export skeleton to old skeleton...");
        let mut constraints = Vec::with_capacity(old.len());
        for (source, export) in old.iter().zip(new) {
            let constraint = store.create_constraint(
                options.constraint_kind,
                source.id(),
                export.id(),
                ConstraintOptions::default(),
            )?;
            store.set_attribute(
                &constraint,
                InterpType::ATTRIBUTE,
                AttributeValue::Int(InterpType::NoFlip.as_int()),
            )?;
            constraints.push(constraint);
        }

        Ok(Self {
            pairs: old.iter().cloned().zip(new.iter().cloned()).collect(),
            constraints,
            state: BakeState::Constrained,
            options,
        })
    }

    /// Current state
    pub fn state(&self) -> BakeState {
        self.state
    }

    /// Constraints created by [`AnimationBaker::bind`]
    pub fn constraints(&self) -> &[NodeId] {
        &self.constraints
    }

    /// `(source, export)` joint pairs
    pub fn pairs(&self) -> &[(JointHandle, JointHandle)] {
        &self.pairs
    }

    /// Sample the constrained motion into keys on the export joints
    ///
    /// `range` defaults to the playback range. Every frame is one progress step.
    ///
    /// # Errors
    /// - [`Error::InvalidParameter`] if already baked, or the range is empty,
    ///   not finite or too long to sample
    /// - [`Error::Cancelled`] if `progress` reports an interrupt; frames
    ///   sampled so far keep their keys and the constraints are kept
    pub fn bake<S: SceneStore + ?Sized>(
        &mut self,
        store: &mut S,
        range: Option<FrameRange>,
        progress: &mut dyn ProgressHandler,
    ) -> Result<BakeReport> {
        if self.state == BakeState::Baked {
            return Err(Error::invalid_parameter("animation is already baked"));
        }
        let range = match range {
            Some(range) => range,
            None => store.query_playback_range()?,
        };
        if !range.is_finite() {
            return Err(Error::invalid_parameter(format!(
                "frame range {}..{} is not finite",
                range.start, range.end
            )));
        }
        let frames = range.frames(self.options.step);
        if frames.is_empty() {
            return Err(Error::invalid_parameter(format!(
                "frame range {}..{} is empty or needs more than {} samples",
                range.start,
                range.end,
                FrameRange::MAX_SAMPLES
            )));
        }

        let targets: Vec<NodeId> = self.pairs.iter().map(|(_, e)| e.id().clone()).collect();
        let options = BakeOptions {
            step: self.options.step,
            channels: self.options.channels,
        };
        log::info!(
            "Baking {} joints over frames {}..{}",
            targets.len(),
            range.start,
            range.end
        );
        with_progress(progress, frames.len(), "Baking animation", |progress| {
            for &frame in &frames {
                store.bake_samples(&targets, FrameRange::single(frame), options)?;
                step_or_cancel(progress, 1, "animation bake")?;
            }
            Ok(())
        })?;

        let mut discarded = 0;
        if self.options.discard_constraints {
            for constraint in self.constraints.drain(..) {
                if store.exists(&constraint) {
                    store.delete_node(&constraint)?;
                    discarded += 1;
                }
            }
        }
        self.state = BakeState::Baked;

        Ok(BakeReport {
            range,
            frames: frames.len(),
            joints: targets.len(),
            discarded,
        })
    }
}

/// Bind and bake in one call with default options
pub fn bake_animation<S: SceneStore + ?Sized>(
    store: &mut S,
    old: &[JointHandle],
    new: &[JointHandle],
    range: Option<FrameRange>,
) -> Result<BakeReport> {
    let mut baker = AnimationBaker::bind(store, old, new, BakerOptions::default())?;
    baker.bake(store, range, &mut PrintProgressHandler::new())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        memory::MemoryScene,
        progress::SilentProgressHandler,
        types::{NodeType, Quaternion, Transform, Vector3D},
    };

    fn pair(scene: &mut MemoryScene, name: &str) -> (JointHandle, JointHandle) {
        let old = scene.add_joint(name, None, Vector3D::ZERO).unwrap();
        let new = scene
            .add_joint(&format!("{name}_INF"), None, Vector3D::ZERO)
            .unwrap();
        (
            JointHandle::resolve(&*scene, &old).unwrap(),
            JointHandle::resolve(&*scene, &new).unwrap(),
        )
    }

    #[test]
    fn test_bind_sets_no_flip() {
        let mut scene = MemoryScene::new();
        let (old, new) = pair(&mut scene, "Hips");
        let baker = AnimationBaker::bind(
            &mut scene,
            &[old],
            &[new.clone()],
            BakerOptions::default(),
        )
        .unwrap();
        assert_eq!(baker.state(), BakeState::Constrained);
        let constraint = &baker.constraints()[0];
        assert_eq!(
            scene.type_of(constraint).unwrap(),
            NodeType::Constraint(ConstraintKind::Orient)
        );
        assert_eq!(
            scene.attribute(constraint, InterpType::ATTRIBUTE),
            Some(&AttributeValue::Int(0))
        );
        assert_eq!(scene.parent_of(constraint).unwrap().as_ref(), Some(new.id()));
    }

    #[test]
    fn test_name_mismatch_creates_nothing() {
        let mut scene = MemoryScene::new();
        let (hips, _) = pair(&mut scene, "Hips");
        let (_, spine_copy) = pair(&mut scene, "Spine");
        let before = scene.node_count();
        let err = AnimationBaker::bind(
            &mut scene,
            &[hips],
            &[spine_copy],
            BakerOptions::default(),
        )
        .unwrap_err();
        assert!(matches!(err, Error::MissingMapping { .. }));
        assert_eq!(scene.node_count(), before);
    }

    #[test]
    fn test_bake_keys_and_discards() {
        let mut scene = MemoryScene::new();
        let (old, new) = pair(&mut scene, "Hips");
        let turned = Quaternion::from_rotation_z(0.5);
        scene
            .set_key(old.id(), 1.0, Transform::IDENTITY)
            .unwrap();
        scene
            .set_key(old.id(), 3.0, Transform::new(Vector3D::ZERO, turned))
            .unwrap();

        let mut baker = AnimationBaker::bind(
            &mut scene,
            &[old],
            &[new.clone()],
            BakerOptions::default(),
        )
        .unwrap();
        let mut progress = SilentProgressHandler::new();
        let report = baker
            .bake(&mut scene, Some(FrameRange::new(1.0, 3.0)), &mut progress)
            .unwrap();

        assert_eq!(report.frames, 3);
        assert_eq!(report.discarded, 1);
        assert_eq!(baker.state(), BakeState::Baked);
        assert!(baker.constraints().is_empty());
        assert_eq!(progress.current(), 3);

        let keys = scene.keys(new.id());
        assert_eq!(keys.len(), 3);
        assert!(keys[2].transform.rotation.dot(turned).abs() > 0.9999);
        assert!(
            baker
                .bake(&mut scene, None, &mut SilentProgressHandler::new())
                .is_err()
        );
    }

    #[test]
    fn test_bake_uses_playback_range() {
        let mut scene = MemoryScene::new();
        scene.set_playback_range(FrameRange::new(10.0, 14.0));
        let (old, new) = pair(&mut scene, "Hips");
        let report = bake_animation(&mut scene, &[old], &[new.clone()], None).unwrap();
        assert_eq!(report.frames, 5);
        assert_eq!(scene.keys(new.id()).len(), 5);
    }
}
