//! An in-memory scene store
//!
//! [`MemoryScene`] implements [`SceneStore`] without a host application. It
//! is deterministic (identifiers are unique names, iteration follows creation
//! order) and is what the integration tests and the demo run against.
//!
//! Simplifications compared to a real host:
//! - every node stores its world transform directly; reparenting keeps it and
//!   animating a parent does not move its children,
//! - mesh points are stored in world space,
//! - a new skin binds each vertex rigidly to its closest influence.

use std::collections::{BTreeMap, HashMap, HashSet, VecDeque};

use crate::{
    error::{Error, Result},
    scene::{ChildFilter, ConstraintOptions, SceneStore},
    types::{
        AttributeValue, BakeOptions, Channels, ConstraintKind, Direction, DuplicateOptions,
        FrameRange, InterpType, NodeId, NodeType, Quaternion, Transform, Vector3D,
    },
    weights::VertexWeights,
};

/// Constraints may drive other constrained nodes; deeper chains are treated as cycles
const MAX_CONSTRAINT_DEPTH: usize = 64;

const FRAME_EPSILON: f64 = 1e-9;

/// A key on a node's transform
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Keyframe {
    /// Frame of the key
    pub frame: f64,
    /// World transform at that frame
    pub transform: Transform,
}

#[derive(Debug, Clone)]
struct MeshData {
    points: Vec<Vector3D>,
    triangles: Vec<[u32; 3]>,
}

#[derive(Debug, Clone)]
struct ClusterData {
    influences: Vec<NodeId>,
    weights: Vec<VertexWeights>,
}

#[derive(Debug, Clone)]
struct ConstraintData {
    kind: ConstraintKind,
    driver: NodeId,
    driven: NodeId,
    offset: Transform,
    weight: f32,
}

#[derive(Debug, Clone)]
struct NodeData {
    node_type: NodeType,
    is_shape: bool,
    parent: Option<NodeId>,
    children: Vec<NodeId>,
    world: Transform,
    mesh: Option<MeshData>,
    cluster: Option<ClusterData>,
    constraint: Option<ConstraintData>,
    attributes: BTreeMap<String, AttributeValue>,
    keys: Vec<Keyframe>,
}

impl NodeData {
    fn new(node_type: NodeType, world: Transform) -> Self {
        let is_shape = node_type == NodeType::Mesh;
        let cluster = (node_type == NodeType::SkinCluster).then(|| ClusterData {
            influences: Vec::new(),
            weights: Vec::new(),
        });
        Self {
            node_type,
            is_shape,
            parent: None,
            children: Vec::new(),
            world,
            mesh: None,
            cluster,
            constraint: None,
            attributes: BTreeMap::new(),
            keys: Vec::new(),
        }
    }
}

/// A self-contained scene graph implementing [`SceneStore`]
#[derive(Debug, Clone)]
pub struct MemoryScene {
    nodes: HashMap<NodeId, NodeData>,
    order: Vec<NodeId>,
    // (source, destination)
    connections: Vec<(NodeId, NodeId)>,
    playback: FrameRange,
}

impl Default for MemoryScene {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryScene {
    /// Create an empty scene with a 1-24 playback range
    pub fn new() -> Self {
        Self {
            nodes: HashMap::new(),
            order: Vec::new(),
            connections: Vec::new(),
            playback: FrameRange::new(1.0, 24.0),
        }
    }

    /// Number of nodes in the scene
    pub fn node_count(&self) -> usize {
        self.order.len()
    }

    /// All nodes of a type, in creation order
    pub fn nodes_of_type(&self, node_type: &NodeType) -> Vec<NodeId> {
        self.order
            .iter()
            .filter(|id| self.nodes.get(*id).is_some_and(|n| &n.node_type == node_type))
            .cloned()
            .collect()
    }

    /// Add a transform node
    pub fn add_transform(
        &mut self,
        name: &str,
        parent: Option<&NodeId>,
        position: Vector3D,
    ) -> Result<NodeId> {
        self.add_node(
            NodeType::Transform,
            name,
            parent,
            Transform::from_translation(position),
        )
    }

    /// Add a joint
    pub fn add_joint(
        &mut self,
        name: &str,
        parent: Option<&NodeId>,
        position: Vector3D,
    ) -> Result<NodeId> {
        self.add_node(
            NodeType::Joint,
            name,
            parent,
            Transform::from_translation(position),
        )
    }

    /// Add a node of any type
    pub fn add_node(
        &mut self,
        node_type: NodeType,
        name: &str,
        parent: Option<&NodeId>,
        world: Transform,
    ) -> Result<NodeId> {
        if let Some(parent) = parent {
            self.node(parent)?;
        }
        let id = self.insert(name, NodeData::new(node_type, world));
        if let Some(parent) = parent {
            self.attach(&id, parent);
        }
        Ok(id)
    }

    /// Add a non-mesh shape (curve, locator, ...) under a container
    pub fn add_shape(
        &mut self,
        container: &NodeId,
        node_type: NodeType,
        name: &str,
    ) -> Result<NodeId> {
        let world = self.node(container)?.world;
        let id = self.add_node(node_type, name, Some(container), world)?;
        if let Some(node) = self.nodes.get_mut(&id) {
            node.is_shape = true;
        }
        Ok(id)
    }

    /// Add a polygonal mesh: a container named `name` with a `{name}Shape` mesh below it
    ///
    /// Returns `(container, shape)`.
    pub fn add_mesh(
        &mut self,
        name: &str,
        points: Vec<Vector3D>,
        triangles: Vec<[u32; 3]>,
    ) -> Result<(NodeId, NodeId)> {
        if let Some(bad) = triangles.iter().flatten().find(|&&i| i as usize >= points.len()) {
            return Err(Error::invalid_parameter(format!(
                "triangle index {bad} out of range for {} points",
                points.len()
            )));
        }
        let container = self.add_transform(name, None, Vector3D::ZERO)?;
        let shape = self.add_node(
            NodeType::Mesh,
            &format!("{name}Shape"),
            Some(&container),
            Transform::IDENTITY,
        )?;
        if let Some(node) = self.nodes.get_mut(&shape) {
            node.mesh = Some(MeshData { points, triangles });
        }
        Ok((container, shape))
    }

    /// Bind a mesh shape to joints and set every vertex's weights
    pub fn add_skin(
        &mut self,
        shape: &NodeId,
        influences: &[NodeId],
        weights: Vec<VertexWeights>,
    ) -> Result<NodeId> {
        let cluster = self.create_cluster_binding(shape, influences)?;
        for (vertex, vertex_weights) in weights.iter().enumerate() {
            self.set_vertex_weights(&cluster, vertex as u32, vertex_weights)?;
        }
        Ok(cluster)
    }

    /// Add a connection from `source` to `destination`
    pub fn connect(&mut self, source: &NodeId, destination: &NodeId) -> Result<()> {
        self.node(source)?;
        self.node(destination)?;
        let edge = (source.clone(), destination.clone());
        if !self.connections.contains(&edge) {
            self.connections.push(edge);
        }
        Ok(())
    }

    /// Remove a connection
    pub fn disconnect(&mut self, source: &NodeId, destination: &NodeId) {
        self.connections
            .retain(|(s, d)| !(s == source && d == destination));
    }

    /// World transform of a node at rest
    pub fn world_transform(&self, id: &NodeId) -> Result<Transform> {
        Ok(self.node(id)?.world)
    }

    /// Set the rest world transform of a node
    pub fn set_world_transform(&mut self, id: &NodeId, transform: Transform) -> Result<()> {
        self.node_mut(id)?.world = transform;
        Ok(())
    }

    /// Key a node's transform at `frame`, replacing an existing key on that frame
    pub fn set_key(&mut self, id: &NodeId, frame: f64, transform: Transform) -> Result<()> {
        let node = self.node_mut(id)?;
        insert_key(&mut node.keys, Keyframe { frame, transform });
        Ok(())
    }

    /// Keys of a node, sorted by frame
    pub fn keys(&self, id: &NodeId) -> &[Keyframe] {
        self.nodes.get(id).map(|n| n.keys.as_slice()).unwrap_or(&[])
    }

    /// Value of an attribute, if set
    pub fn attribute(&self, id: &NodeId, attr: &str) -> Option<&AttributeValue> {
        self.nodes.get(id).and_then(|n| n.attributes.get(attr))
    }

    /// Driver and driven node of a constraint
    pub fn constraint_targets(&self, id: &NodeId) -> Option<(NodeId, NodeId)> {
        self.nodes
            .get(id)
            .and_then(|n| n.constraint.as_ref())
            .map(|c| (c.driver.clone(), c.driven.clone()))
    }

    /// Set the playback range
    pub fn set_playback_range(&mut self, range: FrameRange) {
        self.playback = range;
    }

    /// Evaluate a node's world transform at `frame`
    ///
    /// Constraints take precedence over keys, keys over the rest transform.
    pub fn evaluate(&self, id: &NodeId, frame: f64) -> Result<Transform> {
        self.evaluate_depth(id, frame, 0)
    }

    fn evaluate_depth(&self, id: &NodeId, frame: f64, depth: usize) -> Result<Transform> {
        if depth > MAX_CONSTRAINT_DEPTH {
            return Err(Error::scene(format!("constraint cycle through {id}")));
        }
        let node = self.node(id)?;
        let base = sample_keys(&node.keys).map_or(node.world, |sample| sample(frame));

        let Some(constraint) = self.driving_constraint(id) else {
            return Ok(base);
        };
        let driver = self.evaluate_depth(&constraint.driver, frame, depth + 1)?;
        let rotation = base
            .rotation
            .slerp(driver.rotation * constraint.offset.rotation, constraint.weight);
        let translation = match constraint.kind {
            ConstraintKind::Orient => base.translation,
            ConstraintKind::Parent => base.translation.lerp(
                driver.translation + driver.rotation * constraint.offset.translation,
                constraint.weight,
            ),
        };
        Ok(Transform::new(translation, rotation))
    }

    fn driving_constraint(&self, id: &NodeId) -> Option<&ConstraintData> {
        self.order
            .iter()
            .filter_map(|c| self.nodes.get(c)?.constraint.as_ref())
            .find(|c| &c.driven == id && self.nodes.contains_key(&c.driver))
    }

    fn interp_type_driving(&self, id: &NodeId) -> Option<InterpType> {
        self.order.iter().find_map(|c| {
            let node = self.nodes.get(c)?;
            let constraint = node.constraint.as_ref()?;
            if &constraint.driven != id {
                return None;
            }
            match node.attributes.get(InterpType::ATTRIBUTE) {
                Some(AttributeValue::Int(value)) => InterpType::from_int(*value),
                _ => Some(InterpType::Average),
            }
        })
    }

    fn node(&self, id: &NodeId) -> Result<&NodeData> {
        self.nodes
            .get(id)
            .ok_or_else(|| Error::not_found(id.as_str()))
    }

    fn node_mut(&mut self, id: &NodeId) -> Result<&mut NodeData> {
        self.nodes
            .get_mut(id)
            .ok_or_else(|| Error::not_found(id.as_str()))
    }

    /// `base` if free, otherwise `base1`, `base2`, ...
    fn unique_name(&self, base: &str) -> NodeId {
        let candidate = NodeId::new(base);
        if !self.nodes.contains_key(&candidate) {
            return candidate;
        }
        self.numbered_name(base)
    }

    /// First free `base{n}` with n >= 1
    fn numbered_name(&self, base: &str) -> NodeId {
        (1u32..)
            .map(|n| NodeId::new(format!("{base}{n}")))
            .find(|id| !self.nodes.contains_key(id))
            .unwrap_or_else(|| NodeId::new(base))
    }

    fn insert(&mut self, name: &str, data: NodeData) -> NodeId {
        let id = self.unique_name(name);
        self.nodes.insert(id.clone(), data);
        self.order.push(id.clone());
        id
    }

    fn attach(&mut self, id: &NodeId, parent: &NodeId) {
        if let Some(node) = self.nodes.get_mut(id) {
            node.parent = Some(parent.clone());
        }
        if let Some(parent) = self.nodes.get_mut(parent) {
            parent.children.push(id.clone());
        }
    }

    fn detach(&mut self, id: &NodeId) {
        let parent = self.nodes.get_mut(id).and_then(|n| n.parent.take());
        if let Some(parent) = parent.and_then(|p| self.nodes.get_mut(&p)) {
            parent.children.retain(|c| c != id);
        }
    }

    fn subtree(&self, id: &NodeId) -> Vec<NodeId> {
        let mut out = Vec::new();
        let mut stack = vec![id.clone()];
        while let Some(current) = stack.pop() {
            if let Some(node) = self.nodes.get(&current) {
                stack.extend(node.children.iter().rev().cloned());
            }
            out.push(current);
        }
        out
    }

    fn duplicate_into(
        &mut self,
        id: &NodeId,
        name: &str,
        parent: Option<&NodeId>,
        options: DuplicateOptions,
    ) -> Result<NodeId> {
        let source = self.node(id)?.clone();
        let mut copy = NodeData::new(source.node_type.clone(), source.world);
        copy.is_shape = source.is_shape;
        copy.mesh = source.mesh.clone();
        copy.attributes = source.attributes.clone();
        let new_id = self.insert(name, copy);
        if let Some(parent) = parent {
            self.attach(&new_id, parent);
        }

        if options.intersects(DuplicateOptions::INPUT_CONNECTIONS | DuplicateOptions::UPSTREAM_NODES)
        {
            let inputs: Vec<NodeId> = self
                .connections
                .iter()
                .filter(|(_, d)| d == id)
                .map(|(s, _)| s.clone())
                .collect();
            for input in inputs {
                self.connections.push((input, new_id.clone()));
            }
        }

        if !options.contains(DuplicateOptions::PARENT_ONLY) {
            for child in &source.children {
                let is_constraint = self
                    .nodes
                    .get(child)
                    .is_some_and(|c| c.constraint.is_some());
                if is_constraint {
                    continue;
                }
                let child_name = match child.as_str().strip_prefix(id.as_str()) {
                    Some(rest) if options.contains(DuplicateOptions::RENAME_CHILDREN) => {
                        format!("{new_id}{rest}")
                    }
                    _ => child.to_string(),
                };
                self.duplicate_into(child, &child_name, Some(&new_id), options)?;
            }
        }
        Ok(new_id)
    }
}

impl SceneStore for MemoryScene {
    fn exists(&self, id: &NodeId) -> bool {
        self.nodes.contains_key(id)
    }

    fn type_of(&self, id: &NodeId) -> Result<NodeType> {
        Ok(self.node(id)?.node_type.clone())
    }

    fn name_of(&self, id: &NodeId) -> Result<String> {
        self.node(id)?;
        Ok(id.to_string())
    }

    fn children_of(&self, id: &NodeId, filter: &ChildFilter) -> Result<Vec<NodeId>> {
        let node = self.node(id)?;
        Ok(node
            .children
            .iter()
            .filter(|child| {
                let Some(data) = self.nodes.get(*child) else {
                    return false;
                };
                match filter {
                    ChildFilter::All => true,
                    ChildFilter::Shapes => data.is_shape,
                    ChildFilter::OfType(node_type) => &data.node_type == node_type,
                }
            })
            .cloned()
            .collect())
    }

    fn parent_of(&self, id: &NodeId) -> Result<Option<NodeId>> {
        Ok(self.node(id)?.parent.clone())
    }

    fn connections_to(
        &self,
        id: &NodeId,
        direction: Direction,
        type_filter: Option<&NodeType>,
    ) -> Result<Vec<NodeId>> {
        self.node(id)?;
        let mut seen = HashSet::new();
        Ok(self
            .connections
            .iter()
            .filter_map(|(source, destination)| match direction {
                Direction::Upstream if destination == id => Some(source),
                Direction::Downstream if source == id => Some(destination),
                _ => None,
            })
            .filter(|other| {
                type_filter.is_none_or(|t| self.nodes.get(*other).is_some_and(|n| &n.node_type == t))
            })
            .filter(|other| seen.insert((*other).clone()))
            .cloned()
            .collect())
    }

    fn history_of(&self, id: &NodeId) -> Result<Vec<NodeId>> {
        self.node(id)?;
        let mut history = Vec::new();
        let mut seen = HashSet::from([id.clone()]);
        let mut queue = VecDeque::from([id.clone()]);
        while let Some(current) = queue.pop_front() {
            for (source, destination) in &self.connections {
                if destination == &current && seen.insert(source.clone()) {
                    history.push(source.clone());
                    queue.push_back(source.clone());
                }
            }
        }
        Ok(history)
    }

    fn world_position(&self, id: &NodeId) -> Result<Vector3D> {
        Ok(self.node(id)?.world.translation)
    }

    fn mesh_points(&self, shape: &NodeId) -> Result<Vec<Vector3D>> {
        let node = self.node(shape)?;
        node.mesh
            .as_ref()
            .map(|m| m.points.clone())
            .ok_or_else(|| Error::wrong_type(shape.as_str(), "mesh", node.node_type.as_str()))
    }

    fn mesh_triangles(&self, shape: &NodeId) -> Result<Vec<[u32; 3]>> {
        let node = self.node(shape)?;
        node.mesh
            .as_ref()
            .map(|m| m.triangles.clone())
            .ok_or_else(|| Error::wrong_type(shape.as_str(), "mesh", node.node_type.as_str()))
    }

    fn duplicate(
        &mut self,
        id: &NodeId,
        name: &str,
        options: DuplicateOptions,
    ) -> Result<NodeId> {
        let parent = self.node(id)?.parent.clone();
        self.duplicate_into(id, name, parent.as_ref(), options)
    }

    fn create_node(&mut self, node_type: &NodeType, name: &str) -> Result<NodeId> {
        if name.is_empty() {
            return Err(Error::invalid_parameter("node name must not be empty"));
        }
        Ok(self.insert(name, NodeData::new(node_type.clone(), Transform::IDENTITY)))
    }

    fn reparent(&mut self, id: &NodeId, new_parent: Option<&NodeId>) -> Result<()> {
        self.node(id)?;
        if let Some(parent) = new_parent {
            self.node(parent)?;
            if self.subtree(id).contains(parent) {
                return Err(Error::scene(format!(
                    "cannot parent {id} under its own descendant {parent}"
                )));
            }
        }
        self.detach(id);
        if let Some(parent) = new_parent {
            self.attach(id, parent);
        }
        Ok(())
    }

    fn delete_node(&mut self, id: &NodeId) -> Result<()> {
        self.node(id)?;
        self.detach(id);
        let doomed: HashSet<NodeId> = self.subtree(id).into_iter().collect();
        for node in &doomed {
            self.nodes.remove(node);
        }
        self.order.retain(|n| !doomed.contains(n));
        self.connections
            .retain(|(s, d)| !doomed.contains(s) && !doomed.contains(d));
        Ok(())
    }

    fn create_cluster_binding(
        &mut self,
        mesh: &NodeId,
        influences: &[NodeId],
    ) -> Result<NodeId> {
        let node = self.node(mesh)?;
        let points = match (&node.node_type, &node.mesh) {
            (NodeType::Mesh, Some(data)) => data.points.clone(),
            _ => return Err(Error::scene(format!("{mesh} is not a mesh shape"))),
        };
        if influences.is_empty() {
            return Err(Error::scene("no influences to bind"));
        }
        let mut pivots = Vec::with_capacity(influences.len());
        for influence in influences {
            let data = self.node(influence)?;
            if data.node_type != NodeType::Joint {
                return Err(Error::scene(format!("{influence} is not a joint")));
            }
            pivots.push(data.world.translation);
        }
        let skin = NodeType::SkinCluster;
        if self
            .history_of(mesh)?
            .iter()
            .any(|h| self.nodes.get(h).is_some_and(|n| n.node_type == skin))
        {
            return Err(Error::scene(format!(
                "{mesh} is already connected to a skinCluster"
            )));
        }

        let weights = points
            .iter()
            .map(|point| {
                let closest = pivots
                    .iter()
                    .enumerate()
                    .min_by(|(_, a), (_, b)| {
                        point.distance_squared(**a).total_cmp(&point.distance_squared(**b))
                    })
                    .map_or(0, |(i, _)| i);
                VertexWeights::single(influences[closest].clone())
            })
            .collect();

        let id = self.numbered_name("skinCluster");
        let mut data = NodeData::new(skin, Transform::IDENTITY);
        data.cluster = Some(ClusterData {
            influences: influences.to_vec(),
            weights,
        });
        self.nodes.insert(id.clone(), data);
        self.order.push(id.clone());
        for influence in influences {
            self.connections.push((influence.clone(), id.clone()));
        }
        self.connections.push((id.clone(), mesh.clone()));
        Ok(id)
    }

    fn query_cluster_influences(&self, cluster: &NodeId) -> Result<Vec<NodeId>> {
        let node = self.node(cluster)?;
        node.cluster
            .as_ref()
            .map(|c| c.influences.clone())
            .ok_or_else(|| {
                Error::wrong_type(cluster.as_str(), "skinCluster", node.node_type.as_str())
            })
    }

    fn set_vertex_weights(
        &mut self,
        cluster: &NodeId,
        vertex: u32,
        weights: &VertexWeights,
    ) -> Result<()> {
        let node = self.node_mut(cluster)?;
        let found = node.node_type.as_str().to_string();
        let data = node
            .cluster
            .as_mut()
            .ok_or_else(|| Error::wrong_type(cluster.as_str(), "skinCluster", found))?;
        if let Some(stranger) = weights.iter().find(|w| !data.influences.contains(&w.joint)) {
            return Err(Error::scene(format!(
                "{} is not an influence of {cluster}",
                stranger.joint
            )));
        }
        let slot = data.weights.get_mut(vertex as usize).ok_or_else(|| {
            Error::scene(format!("vertex {vertex} out of range on {cluster}"))
        })?;
        *slot = weights.clone();
        Ok(())
    }

    fn get_vertex_weights(&self, cluster: &NodeId, vertex: u32) -> Result<VertexWeights> {
        let node = self.node(cluster)?;
        let data = node.cluster.as_ref().ok_or_else(|| {
            Error::wrong_type(cluster.as_str(), "skinCluster", node.node_type.as_str())
        })?;
        data.weights
            .get(vertex as usize)
            .cloned()
            .ok_or_else(|| Error::scene(format!("vertex {vertex} out of range on {cluster}")))
    }

    fn create_constraint(
        &mut self,
        kind: ConstraintKind,
        driver: &NodeId,
        driven: &NodeId,
        options: ConstraintOptions,
    ) -> Result<NodeId> {
        let driver_world = self.node(driver)?.world;
        let driven_world = self.node(driven)?.world;
        let offset = if options.maintain_offset {
            let inverse = driver_world.rotation.inverse();
            Transform::new(
                inverse * (driven_world.translation - driver_world.translation),
                inverse * driven_world.rotation,
            )
        } else {
            Transform::IDENTITY
        };

        let id = self.numbered_name(&format!("{driven}_{}", kind.as_str()));
        let mut data = NodeData::new(NodeType::Constraint(kind), driven_world);
        data.constraint = Some(ConstraintData {
            kind,
            driver: driver.clone(),
            driven: driven.clone(),
            offset,
            weight: options.weight.clamp(0.0, 1.0),
        });
        data.attributes.insert(
            InterpType::ATTRIBUTE.to_string(),
            AttributeValue::Int(InterpType::Average.as_int()),
        );
        self.nodes.insert(id.clone(), data);
        self.order.push(id.clone());
        self.attach(&id, driven);
        self.connections.push((driver.clone(), id.clone()));
        self.connections.push((id.clone(), driven.clone()));
        Ok(id)
    }

    fn set_attribute(&mut self, id: &NodeId, attr: &str, value: AttributeValue) -> Result<()> {
        self.node_mut(id)?.attributes.insert(attr.to_string(), value);
        Ok(())
    }

    fn bake_samples(
        &mut self,
        targets: &[NodeId],
        range: FrameRange,
        options: BakeOptions,
    ) -> Result<()> {
        let frames = range.frames(options.step);
        let mut baked = Vec::with_capacity(targets.len());
        for target in targets {
            let rest = self.node(target)?.world;
            let no_flip = self.interp_type_driving(target) == Some(InterpType::NoFlip);
            let mut previous = self
                .node(target)?
                .keys
                .iter()
                .rev()
                .find(|k| k.frame < range.start - FRAME_EPSILON)
                .map(|k| k.transform.rotation);

            let mut keys = Vec::with_capacity(frames.len());
            for &frame in &frames {
                let sample = self.evaluate(target, frame)?;
                let mut rotation = if options.channels.contains(Channels::ROTATE) {
                    sample.rotation
                } else {
                    rest.rotation
                };
                if no_flip && previous.is_some_and(|p| p.dot(rotation) < 0.0) {
                    rotation = -rotation;
                }
                previous = Some(rotation);
                let translation = if options.channels.contains(Channels::TRANSLATE) {
                    sample.translation
                } else {
                    rest.translation
                };
                keys.push(Keyframe {
                    frame,
                    transform: Transform::new(translation, rotation),
                });
            }
            baked.push((target.clone(), keys));
        }

        for (target, keys) in baked {
            let node = self.node_mut(&target)?;
            for key in keys {
                insert_key(&mut node.keys, key);
            }
        }
        Ok(())
    }

    fn query_playback_range(&self) -> Result<FrameRange> {
        Ok(self.playback)
    }
}

fn insert_key(keys: &mut Vec<Keyframe>, key: Keyframe) {
    match keys
        .iter()
        .position(|k| (k.frame - key.frame).abs() < FRAME_EPSILON)
    {
        Some(index) => keys[index] = key,
        None => {
            let index = keys.partition_point(|k| k.frame < key.frame);
            keys.insert(index, key);
        }
    }
}

/// A sampler over sorted keys, `None` when there are no keys
fn sample_keys(keys: &[Keyframe]) -> Option<impl Fn(f64) -> Transform + '_> {
    if keys.is_empty() {
        return None;
    }
    Some(move |frame: f64| {
        let next = keys.partition_point(|k| k.frame <= frame + FRAME_EPSILON);
        if next == 0 {
            return keys[0].transform;
        }
        let previous = keys[next - 1];
        if next == keys.len() || (frame - previous.frame).abs() < FRAME_EPSILON {
            return previous.transform;
        }
        let following = keys[next];
        let t = ((frame - previous.frame) / (following.frame - previous.frame)) as f32;
        Transform::new(
            previous
                .transform
                .translation
                .lerp(following.transform.translation, t),
            slerp(previous.transform.rotation, following.transform.rotation, t),
        )
    })
}

fn slerp(from: Quaternion, to: Quaternion, t: f32) -> Quaternion {
    from.slerp(to, t).normalize()
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn chain() -> (MemoryScene, NodeId, NodeId, NodeId) {
        let mut scene = MemoryScene::new();
        let hips = scene.add_joint("Hips", None, Vector3D::ZERO).unwrap();
        let spine = scene
            .add_joint("Spine", Some(&hips), Vector3D::new(0.0, 1.0, 0.0))
            .unwrap();
        let head = scene
            .add_joint("Head", Some(&spine), Vector3D::new(0.0, 2.0, 0.0))
            .unwrap();
        (scene, hips, spine, head)
    }

    #[test]
    fn test_unique_names() {
        let mut scene = MemoryScene::new();
        let a = scene.create_node(&NodeType::Transform, "export_group").unwrap();
        let b = scene.create_node(&NodeType::Transform, "export_group").unwrap();
        assert_eq!(a.as_str(), "export_group");
        assert_eq!(b.as_str(), "export_group1");
    }

    #[test]
    fn test_duplicate_parent_only_keeps_parent_and_world() {
        let (mut scene, hips, spine, _) = chain();
        let copy = scene
            .duplicate(&spine, "Spine_INF", DuplicateOptions::PARENT_ONLY)
            .unwrap();
        assert_eq!(scene.parent_of(&copy).unwrap(), Some(hips));
        assert!(scene.children_of(&copy, &ChildFilter::All).unwrap().is_empty());
        assert_eq!(
            scene.world_position(&copy).unwrap(),
            Vector3D::new(0.0, 1.0, 0.0)
        );
    }

    #[test]
    fn test_duplicate_mesh_container_copies_shape() {
        let mut scene = MemoryScene::new();
        let (body, _) = scene
            .add_mesh("body", vec![Vector3D::ZERO, Vector3D::X, Vector3D::Y], vec![[0, 1, 2]])
            .unwrap();
        let copy = scene
            .duplicate(&body, "body_EXP", DuplicateOptions::RENAME_CHILDREN)
            .unwrap();
        let shapes = scene.children_of(&copy, &ChildFilter::Shapes).unwrap();
        assert_eq!(shapes, vec![NodeId::new("body_EXPShape")]);
        assert_eq!(scene.mesh_points(&shapes[0]).unwrap().len(), 3);
    }

    #[test]
    fn test_duplicate_without_rename_keeps_child_names_unique() {
        let mut scene = MemoryScene::new();
        let (body, _) = scene
            .add_mesh("body", vec![Vector3D::ZERO, Vector3D::X, Vector3D::Y], vec![[0, 1, 2]])
            .unwrap();
        let copy = scene
            .duplicate(&body, "body_EXP", DuplicateOptions::empty())
            .unwrap();
        let shapes = scene.children_of(&copy, &ChildFilter::Shapes).unwrap();
        assert_eq!(shapes, vec![NodeId::new("bodyShape1")]);
        assert!(scene.exists(&NodeId::new("bodyShape")));
    }

    #[test]
    fn test_reparent_rejects_cycles() {
        let (mut scene, hips, _, head) = chain();
        assert!(scene.reparent(&hips, Some(&head)).is_err());
        scene.reparent(&head, Some(&hips)).unwrap();
        assert_eq!(
            scene.children_of(&hips, &ChildFilter::joints()).unwrap().len(),
            2
        );
    }

    #[test]
    fn test_history_walks_through_intermediate_nodes() {
        let (mut scene, hips, _, _) = chain();
        let (_, shape) = scene
            .add_mesh("body", vec![Vector3D::ZERO, Vector3D::X, Vector3D::Y], vec![[0, 1, 2]])
            .unwrap();
        let cluster = scene.create_cluster_binding(&shape, &[hips]).unwrap();
        let tweak = scene
            .create_node(&NodeType::Other("tweak".to_string()), "tweak1")
            .unwrap();
        scene.disconnect(&cluster, &shape);
        scene.connect(&cluster, &tweak).unwrap();
        scene.connect(&tweak, &shape).unwrap();

        let direct = scene
            .connections_to(&shape, Direction::Upstream, Some(&NodeType::SkinCluster))
            .unwrap();
        assert!(direct.is_empty());
        assert!(scene.history_of(&shape).unwrap().contains(&cluster));
    }

    #[test]
    fn test_new_cluster_binds_to_closest_joint() {
        let (mut scene, hips, _, head) = chain();
        let (_, shape) = scene
            .add_mesh(
                "body",
                vec![Vector3D::ZERO, Vector3D::new(0.0, 2.1, 0.0), Vector3D::X],
                vec![[0, 1, 2]],
            )
            .unwrap();
        let cluster = scene
            .create_cluster_binding(&shape, &[hips.clone(), head.clone()])
            .unwrap();
        assert_eq!(cluster.as_str(), "skinCluster1");
        assert_eq!(scene.get_vertex_weights(&cluster, 0).unwrap().get(&hips), 1.0);
        assert_eq!(scene.get_vertex_weights(&cluster, 1).unwrap().get(&head), 1.0);
        assert!(scene.create_cluster_binding(&shape, &[hips]).is_err());
    }

    #[test]
    fn test_orient_constraint_follows_driver_rotation() {
        let (mut scene, hips, spine, _) = chain();
        let turned = Quaternion::from_rotation_y(1.0);
        scene
            .set_key(&hips, 1.0, Transform::new(Vector3D::ZERO, turned))
            .unwrap();
        scene
            .create_constraint(
                ConstraintKind::Orient,
                &hips,
                &spine,
                ConstraintOptions::default(),
            )
            .unwrap();
        let evaluated = scene.evaluate(&spine, 1.0).unwrap();
        assert_relative_eq!(evaluated.rotation.dot(turned).abs(), 1.0, epsilon = 1e-6);
        assert_eq!(evaluated.translation, Vector3D::new(0.0, 1.0, 0.0));
    }

    #[test]
    fn test_keys_interpolate() {
        let (mut scene, hips, _, _) = chain();
        scene
            .set_key(&hips, 0.0, Transform::from_translation(Vector3D::ZERO))
            .unwrap();
        scene
            .set_key(&hips, 10.0, Transform::from_translation(Vector3D::X * 10.0))
            .unwrap();
        assert_relative_eq!(scene.evaluate(&hips, 5.0).unwrap().translation.x, 5.0);
        assert_relative_eq!(scene.evaluate(&hips, 20.0).unwrap().translation.x, 10.0);
        assert_relative_eq!(scene.evaluate(&hips, -3.0).unwrap().translation.x, 0.0);
    }

    #[test]
    fn test_delete_removes_subtree_and_connections() {
        let (mut scene, hips, spine, head) = chain();
        let constraint = scene
            .create_constraint(
                ConstraintKind::Orient,
                &hips,
                &head,
                ConstraintOptions::default(),
            )
            .unwrap();
        scene.delete_node(&spine).unwrap();
        assert!(!scene.exists(&head));
        assert!(!scene.exists(&constraint));
        assert!(scene
            .connections_to(&hips, Direction::Downstream, None)
            .unwrap()
            .is_empty());
        assert_eq!(scene.node_count(), 1);
    }
}
