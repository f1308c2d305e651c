//! The host scene boundary
//!
//! The exporter never talks to a host application directly. Everything it
//! needs (queries, node creation, skin binding, constraints and baking) goes
//! through [`SceneStore`], which a front end implements on top of its host
//! API. [`crate::memory::MemoryScene`] is a complete in-memory implementation.
//!
//! The store is a single shared mutable resource: calls are synchronous and
//! every mutation is committed before the next call starts. There is no undo.

use crate::{
    error::Result,
    types::{
        AttributeValue, BakeOptions, ConstraintKind, Direction, DuplicateOptions, FrameRange,
        NodeId, NodeType, Vector3D,
    },
    weights::VertexWeights,
};

/// Which children [`SceneStore::children_of`] reports
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChildFilter {
    /// Every direct child
    All,
    /// Only shape children (geometry nodes of any kind)
    Shapes,
    /// Only children of the given type
    OfType(NodeType),
}

impl ChildFilter {
    /// Only joint children
    pub fn joints() -> Self {
        Self::OfType(NodeType::Joint)
    }
}

/// Options for [`SceneStore::create_constraint`]
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ConstraintOptions {
    /// Keep the driven node's current offset from the driver
    pub maintain_offset: bool,
    /// Constraint weight
    pub weight: f32,
}

impl Default for ConstraintOptions {
    fn default() -> Self {
        Self {
            maintain_offset: false,
            weight: 1.0,
        }
    }
}

/// Read and write access to a host scene graph
///
/// Failing host calls surface as [`crate::Error::Scene`]; querying a node
/// that does not exist surfaces as [`crate::Error::NotFound`].
pub trait SceneStore {
    /// Whether a node with this identifier exists
    fn exists(&self, id: &NodeId) -> bool;

    /// Type of a node
    fn type_of(&self, id: &NodeId) -> Result<NodeType>;

    /// Short display name of a node
    fn name_of(&self, id: &NodeId) -> Result<String>;

    /// Direct children of a node, in hierarchy order
    fn children_of(&self, id: &NodeId, filter: &ChildFilter) -> Result<Vec<NodeId>>;

    /// Parent of a node, `None` for nodes at the world root
    fn parent_of(&self, id: &NodeId) -> Result<Option<NodeId>>;

    /// Nodes directly connected to `id` in `direction`, optionally filtered by type
    fn connections_to(
        &self,
        id: &NodeId,
        direction: Direction,
        type_filter: Option<&NodeType>,
    ) -> Result<Vec<NodeId>>;

    /// Every node in the deformation history of `id`, nearest first
    fn history_of(&self, id: &NodeId) -> Result<Vec<NodeId>>;

    /// World-space pivot of a transform or joint
    fn world_position(&self, id: &NodeId) -> Result<Vector3D>;

    /// World-space vertex positions of a mesh shape
    fn mesh_points(&self, shape: &NodeId) -> Result<Vec<Vector3D>>;

    /// Triangulated faces of a mesh shape, as vertex indices
    fn mesh_triangles(&self, shape: &NodeId) -> Result<Vec<[u32; 3]>>;

    /// Duplicate a node, returning the new node's id
    ///
    /// The duplicate is placed under the original's parent.
    fn duplicate(&mut self, id: &NodeId, name: &str, options: DuplicateOptions)
    -> Result<NodeId>;

    /// Create a node at the world root
    fn create_node(&mut self, node_type: &NodeType, name: &str) -> Result<NodeId>;

    /// Move a node under a new parent (or to the world root), keeping its world transform
    fn reparent(&mut self, id: &NodeId, new_parent: Option<&NodeId>) -> Result<()>;

    /// Delete a node and everything below it
    fn delete_node(&mut self, id: &NodeId) -> Result<()>;

    /// Bind a mesh shape to a set of joints with a rigid, closest-joint initial pose
    fn create_cluster_binding(&mut self, mesh: &NodeId, influences: &[NodeId])
    -> Result<NodeId>;

    /// Ordered influence list of a skin cluster
    fn query_cluster_influences(&self, cluster: &NodeId) -> Result<Vec<NodeId>>;

    /// Replace the weights of one vertex
    fn set_vertex_weights(
        &mut self,
        cluster: &NodeId,
        vertex: u32,
        weights: &VertexWeights,
    ) -> Result<()>;

    /// Weights of one vertex
    fn get_vertex_weights(&self, cluster: &NodeId, vertex: u32) -> Result<VertexWeights>;

    /// Constrain `driven` to `driver`
    fn create_constraint(
        &mut self,
        kind: ConstraintKind,
        driver: &NodeId,
        driven: &NodeId,
        options: ConstraintOptions,
    ) -> Result<NodeId>;

    /// Set an attribute on a node
    fn set_attribute(&mut self, id: &NodeId, attr: &str, value: AttributeValue) -> Result<()>;

    /// Sample the evaluated motion of `targets` over `range` and key it onto them
    fn bake_samples(
        &mut self,
        targets: &[NodeId],
        range: FrameRange,
        options: BakeOptions,
    ) -> Result<()>;

    /// Current playback range of the scene
    fn query_playback_range(&self) -> Result<FrameRange>;
}
