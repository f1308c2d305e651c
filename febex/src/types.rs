//! Common types used throughout the exporter
//!
//! Scene identifiers coming from the host are plain strings. They are wrapped
//! here in strongly typed handles ([`GeometryHandle`], [`JointHandle`],
//! [`ClusterHandle`]) which can only be obtained through a validating
//! constructor, so code holding a handle never has to re-check what it points at.
//!
//! Math types are re-exported from glam.

use std::{borrow::Borrow, fmt};

use bitflags::bitflags;

use crate::{
    error::{Error, Result},
    scene::SceneStore,
};

// Re-export glam types as our primary math types
pub use glam::{Mat4 as Matrix4x4, Quat as Quaternion, Vec3 as Vector3D};

/// An opaque host node identifier
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(String);

impl NodeId {
    /// Wrap a host identifier
    pub fn new<S: Into<String>>(id: S) -> Self {
        Self(id.into())
    }

    /// The identifier as the host knows it
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for NodeId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

impl From<String> for NodeId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

impl AsRef<str> for NodeId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Node type tags understood by the exporter
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum NodeType {
    /// A container (transform) node
    Transform,
    /// A polygonal mesh shape
    Mesh,
    /// A skeleton joint
    Joint,
    /// A skin deformation cluster
    SkinCluster,
    /// A constraint node
    Constraint(ConstraintKind),
    /// Anything else, carrying the host's type name
    Other(String),
}

impl NodeType {
    /// The host's type name for this tag
    pub fn as_str(&self) -> &str {
        match self {
            Self::Transform => "transform",
            Self::Mesh => "mesh",
            Self::Joint => "joint",
            Self::SkinCluster => "skinCluster",
            Self::Constraint(kind) => kind.as_str(),
            Self::Other(name) => name,
        }
    }

    /// Parse a host type name
    pub fn from_host_name(name: &str) -> Self {
        match name {
            "transform" => Self::Transform,
            "mesh" => Self::Mesh,
            "joint" => Self::Joint,
            "skinCluster" => Self::SkinCluster,
            "orientConstraint" => Self::Constraint(ConstraintKind::Orient),
            "parentConstraint" => Self::Constraint(ConstraintKind::Parent),
            other => Self::Other(other.to_string()),
        }
    }
}

impl fmt::Display for NodeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Constraint flavours used for animation transfer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ConstraintKind {
    /// Rotation only
    #[default]
    Orient,
    /// Translation and rotation
    Parent,
}

impl ConstraintKind {
    /// The host's type name for this constraint
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Orient => "orientConstraint",
            Self::Parent => "parentConstraint",
        }
    }
}

/// Rotation interpolation modes of a constraint (`interpType` attribute)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum InterpType {
    /// Keeps successive orientations continuous instead of taking the short way round
    #[default]
    NoFlip,
    /// Average of the driver orientations
    Average,
    /// Shortest arc
    Shortest,
}

impl InterpType {
    /// Attribute name on the constraint node
    pub const ATTRIBUTE: &'static str = "interpType";

    /// Integer value the host stores for this mode
    pub fn as_int(self) -> i64 {
        match self {
            Self::NoFlip => 0,
            Self::Average => 1,
            Self::Shortest => 2,
        }
    }

    /// Decode the host's integer value
    pub fn from_int(value: i64) -> Option<Self> {
        match value {
            0 => Some(Self::NoFlip),
            1 => Some(Self::Average),
            2 => Some(Self::Shortest),
            _ => None,
        }
    }
}

/// Connection direction for [`SceneStore::connections_to`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Direction {
    /// Nodes feeding into the queried node
    Upstream,
    /// Nodes the queried node feeds
    Downstream,
}

/// Attribute values accepted by [`SceneStore::set_attribute`]
#[derive(Debug, Clone, PartialEq)]
pub enum AttributeValue {
    /// Integer attribute
    Int(i64),
    /// Float attribute
    Float(f64),
    /// Boolean attribute
    Bool(bool),
    /// String attribute
    Text(String),
}

bitflags! {
    /// Options for [`SceneStore::duplicate`]
    #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default)]
    pub struct DuplicateOptions: u32 {
        /// Duplicate only the node itself, not its children
        const PARENT_ONLY = 1 << 0;
        /// Also duplicate upstream (history) nodes
        const UPSTREAM_NODES = 1 << 1;
        /// Keep input connections on the duplicate
        const INPUT_CONNECTIONS = 1 << 2;
        /// Name duplicated children after the new node instead of the originals
        const RENAME_CHILDREN = 1 << 3;
    }
}

bitflags! {
    /// Animation channels written by [`SceneStore::bake_samples`]
    #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
    pub struct Channels: u32 {
        /// Translation keys
        const TRANSLATE = 1 << 0;
        /// Rotation keys
        const ROTATE = 1 << 1;
    }
}

impl Default for Channels {
    fn default() -> Self {
        Self::TRANSLATE | Self::ROTATE
    }
}

/// An inclusive range of frames
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FrameRange {
    /// First frame
    pub start: f64,
    /// Last frame (inclusive)
    pub end: f64,
}

impl FrameRange {
    /// Create a new frame range
    pub fn new(start: f64, end: f64) -> Self {
        Self { start, end }
    }

    /// A range covering a single frame
    pub fn single(frame: f64) -> Self {
        Self {
            start: frame,
            end: frame,
        }
    }

    /// Most samples [`FrameRange::frames`] produces for one range
    pub const MAX_SAMPLES: usize = 1_000_000;

    /// Whether both ends are finite numbers
    pub fn is_finite(&self) -> bool {
        self.start.is_finite() && self.end.is_finite()
    }

    /// Frames visited when sampling the range with `step`
    ///
    /// The end frame is always included. A step that is not a positive number
    /// yields only the start. Ranges that are reversed, not finite, or would
    /// need more than [`FrameRange::MAX_SAMPLES`] samples yield nothing.
    pub fn frames(&self, step: f64) -> Vec<f64> {
        if !self.is_finite() || self.end < self.start {
            return Vec::new();
        }
        if !(step.is_finite() && step > 0.0) {
            return vec![self.start];
        }
        let steps = ((self.end - self.start) / step + 1e-9).floor();
        if steps >= Self::MAX_SAMPLES as f64 {
            return Vec::new();
        }
        let mut frames: Vec<f64> = (0..=steps as usize)
            .map(|index| self.start + step * index as f64)
            .collect();
        if frames
            .last()
            .is_some_and(|last| (self.end - last).abs() > 1e-9)
        {
            frames.push(self.end);
        }
        frames
    }
}

/// Options for [`SceneStore::bake_samples`]
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BakeOptions {
    /// Sampling interval in frames
    pub step: f64,
    /// Channels to key
    pub channels: Channels,
}

impl Default for BakeOptions {
    fn default() -> Self {
        Self {
            step: 1.0,
            channels: Channels::default(),
        }
    }
}

/// A rigid transform (no scale)
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Transform {
    /// World translation
    pub translation: Vector3D,
    /// World rotation
    pub rotation: Quaternion,
}

impl Transform {
    /// The identity transform
    pub const IDENTITY: Self = Self {
        translation: Vector3D::ZERO,
        rotation: Quaternion::IDENTITY,
    };

    /// Create a transform from a translation
    pub fn from_translation(translation: Vector3D) -> Self {
        Self {
            translation,
            rotation: Quaternion::IDENTITY,
        }
    }

    /// Create a transform from translation and rotation
    pub fn new(translation: Vector3D, rotation: Quaternion) -> Self {
        Self {
            translation,
            rotation,
        }
    }

    /// Convert to a 4x4 matrix
    pub fn to_matrix(&self) -> Matrix4x4 {
        Matrix4x4::from_rotation_translation(self.rotation, self.translation)
    }
}

impl Default for Transform {
    fn default() -> Self {
        Self::IDENTITY
    }
}

#[cfg(feature = "mint")]
impl From<Transform> for mint::Vector3<f32> {
    fn from(transform: Transform) -> Self {
        transform.translation.into()
    }
}

#[cfg(feature = "mint")]
impl From<Transform> for mint::Quaternion<f32> {
    fn from(transform: Transform) -> Self {
        transform.rotation.into()
    }
}

#[cfg(feature = "mint")]
impl From<Transform> for mint::ColumnMatrix4<f32> {
    fn from(transform: Transform) -> Self {
        transform.to_matrix().into()
    }
}

/// A validated polygonal mesh: its shape node and the container above it
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct GeometryHandle {
    container: NodeId,
    shape: NodeId,
}

impl GeometryHandle {
    pub(crate) fn new(container: NodeId, shape: NodeId) -> Self {
        Self { container, shape }
    }

    /// The container (transform) node
    pub fn container(&self) -> &NodeId {
        &self.container
    }

    /// The mesh shape node
    pub fn shape(&self) -> &NodeId {
        &self.shape
    }
}

/// A validated joint node
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct JointHandle(NodeId);

impl JointHandle {
    pub(crate) fn new_unchecked(id: NodeId) -> Self {
        Self(id)
    }

    /// Validate that `id` names an existing joint
    pub fn resolve<S: SceneStore + ?Sized>(store: &S, id: &NodeId) -> Result<Self> {
        if !store.exists(id) {
            return Err(Error::not_found(id.as_str()));
        }
        match store.type_of(id)? {
            NodeType::Joint => Ok(Self(id.clone())),
            _ => Err(Error::not_a_joint(id.as_str())),
        }
    }

    /// The underlying node id
    pub fn id(&self) -> &NodeId {
        &self.0
    }
}

impl Borrow<NodeId> for JointHandle {
    fn borrow(&self) -> &NodeId {
        &self.0
    }
}

impl fmt::Display for JointHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// A validated skin cluster node
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ClusterHandle(NodeId);

impl ClusterHandle {
    pub(crate) fn new_unchecked(id: NodeId) -> Self {
        Self(id)
    }

    /// Validate that `id` names an existing skin cluster
    pub fn resolve<S: SceneStore + ?Sized>(store: &S, id: &NodeId) -> Result<Self> {
        if !store.exists(id) {
            return Err(Error::not_found(id.as_str()));
        }
        match store.type_of(id)? {
            NodeType::SkinCluster => Ok(Self(id.clone())),
            other => Err(Error::wrong_type(
                id.as_str(),
                NodeType::SkinCluster.as_str(),
                other.as_str(),
            )),
        }
    }

    /// The underlying node id
    pub fn id(&self) -> &NodeId {
        &self.0
    }
}

impl fmt::Display for ClusterHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_node_type_round_trip_names() {
        for name in ["transform", "mesh", "joint", "skinCluster", "orientConstraint"] {
            assert_eq!(NodeType::from_host_name(name).as_str(), name);
        }
        assert_eq!(
            NodeType::from_host_name("nurbsCurve"),
            NodeType::Other("nurbsCurve".to_string())
        );
    }

    #[test]
    fn test_frame_range_includes_end() {
        let frames = FrameRange::new(1.0, 3.5).frames(1.0);
        assert_eq!(frames, vec![1.0, 2.0, 3.0, 3.5]);

        let frames = FrameRange::new(0.0, 2.0).frames(1.0);
        assert_eq!(frames, vec![0.0, 1.0, 2.0]);

        assert!(FrameRange::new(5.0, 1.0).frames(1.0).is_empty());
        assert_eq!(FrameRange::single(4.0).frames(1.0), vec![4.0]);
    }

    #[test]
    fn test_frame_range_rejects_unbounded_input() {
        assert!(FrameRange::new(1.0, f64::NAN).frames(1.0).is_empty());
        assert!(FrameRange::new(f64::NEG_INFINITY, 3.0).frames(1.0).is_empty());
        assert!(FrameRange::new(0.0, 1e12).frames(1.0).is_empty());
        assert_eq!(FrameRange::new(2.0, 5.0).frames(f64::NAN), vec![2.0]);
        assert_eq!(
            FrameRange::new(0.0, 10.0).frames(0.5).len(),
            21
        );
    }

    #[test]
    fn test_interp_type_codes() {
        assert_eq!(InterpType::NoFlip.as_int(), 0);
        assert_eq!(InterpType::from_int(2), Some(InterpType::Shortest));
        assert_eq!(InterpType::from_int(7), None);
    }
}
