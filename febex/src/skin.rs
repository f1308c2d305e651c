//! Skin rebinding and weight transfer
//!
//! [`rebind`] creates a fresh cluster between a duplicated mesh and the
//! export skeleton. [`transfer_weights`] then fills the new cluster from the
//! old one, vertex by vertex, using an ordered chain of strategies:
//!
//! 1. closest point on the old surface,
//! 2. closest bone associated with that surface,
//! 3. closest joint,
//! 4. name match on the vertex with the same index.
//!
//! A later strategy only runs when the earlier one is ambiguous or undefined
//! for the vertex.

use std::collections::BTreeSet;

use crate::{
    aabb::AABB,
    cluster,
    error::{Error, Result},
    math::{closest_point_on_triangle, is_degenerate, point_segment_distance_squared},
    mesh::{self, MeshGeometry},
    progress::{ProgressHandler, step_or_cancel, with_progress},
    scene::SceneStore,
    skeleton::InfluenceMapping,
    types::{ClusterHandle, GeometryHandle, JointHandle, NodeId, NodeType, Vector3D},
    weights::{VertexWeights, WEIGHT_SUM_TOLERANCE},
};

/// A mesh bound to a skin cluster
#[derive(Debug, Clone, PartialEq)]
pub struct SkinBinding {
    /// The deformed mesh
    pub mesh: GeometryHandle,
    /// The cluster deforming it
    pub cluster: ClusterHandle,
    /// Influences in the cluster's order
    pub influences: Vec<JointHandle>,
}

impl SkinBinding {
    /// Read the binding of an already skinned mesh
    pub fn read<S: SceneStore + ?Sized>(store: &S, mesh: &GeometryHandle) -> Result<Self> {
        let cluster = cluster::locate(store, mesh)?;
        let influences = cluster::influences(store, &cluster)?;
        Ok(Self {
            mesh: mesh.clone(),
            cluster,
            influences,
        })
    }
}

/// Bind `mesh` to the export copies recorded in `mapping`
pub fn rebind<S: SceneStore + ?Sized>(
    store: &mut S,
    mesh: &NodeId,
    mapping: &InfluenceMapping,
) -> Result<SkinBinding> {
    let influences: Vec<NodeId> = mapping.destinations().map(|j| j.id().clone()).collect();
    rebind_influences(store, mesh, &influences)
}

/// Bind `mesh` to `influences` with a fresh rigid binding
///
/// # Errors
/// - [`Error::NotFound`] if `mesh` does not exist
/// - [`Error::InvalidMesh`] if `mesh` does not resolve to a mesh
/// - any other error from the store while resolving `mesh`, unchanged
/// - [`Error::EmptyInfluenceList`] if `influences` is empty
/// - [`Error::NotAJoint`] for the first influence that is not a joint
pub fn rebind_influences<S: SceneStore + ?Sized>(
    store: &mut S,
    mesh: &NodeId,
    influences: &[NodeId],
) -> Result<SkinBinding> {
    let handle = match mesh::resolve(&*store, mesh) {
        Ok(handle) => handle,
        Err(Error::WrongType { .. } | Error::MissingShape { .. } | Error::InvalidMesh { .. }) => {
            return Err(Error::invalid_mesh(mesh.as_str()));
        }
        Err(err) => return Err(err),
    };
    if influences.is_empty() {
        return Err(Error::EmptyInfluenceList);
    }
    let joints = influences
        .iter()
        .map(|id| JointHandle::resolve(&*store, id))
        .collect::<Result<Vec<_>>>()?;

    let cluster = store.create_cluster_binding(handle.shape(), influences)?;
    log::debug!("Bound {} to {} influences with {cluster}", handle.shape(), joints.len());
    Ok(SkinBinding {
        mesh: handle,
        cluster: ClusterHandle::new_unchecked(cluster),
        influences: joints,
    })
}

/// Strategy that produced a vertex's weights
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum TransferStage {
    /// Blend of the closest point on the old surface
    ClosestPoint,
    /// Closest bone associated with the surface
    ClosestBone,
    /// Closest joint
    ClosestJoint,
    /// Old weights of the same vertex index, moved onto the export copies
    NameMatch,
}

impl TransferStage {
    /// All stages, in the order they are tried
    pub const ALL: [Self; 4] = [
        Self::ClosestPoint,
        Self::ClosestBone,
        Self::ClosestJoint,
        Self::NameMatch,
    ];

    fn index(self) -> usize {
        self as usize
    }
}

/// Options for [`transfer_weights`]
#[derive(Debug, Clone, PartialEq)]
pub struct TransferOptions {
    /// Distances within this of the minimum count as a tie
    pub tie_tolerance: f32,
}

impl Default for TransferOptions {
    fn default() -> Self {
        Self { tie_tolerance: 1e-4 }
    }
}

/// Outcome of a weight transfer
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TransferReport {
    counts: [usize; 4],
    stages: Vec<TransferStage>,
}

impl TransferReport {
    /// Number of vertices written
    pub fn num_vertices(&self) -> usize {
        self.stages.len()
    }

    /// Number of vertices resolved by `stage`
    pub fn resolved_by(&self, stage: TransferStage) -> usize {
        self.counts[stage.index()]
    }

    /// Stage that resolved a vertex
    pub fn stage_of(&self, vertex: usize) -> Option<TransferStage> {
        self.stages.get(vertex).copied()
    }

    fn record(&mut self, stage: TransferStage) {
        self.counts[stage.index()] += 1;
        self.stages.push(stage);
    }
}

struct Triangle {
    corners: [usize; 3],
    points: [Vector3D; 3],
    bounds: AABB,
}

struct Bone {
    source: JointHandle,
    head: Vector3D,
    tail: Vector3D,
}

/// Everything about the old binding needed per vertex, read once
struct SourceSkin {
    triangles: Vec<Triangle>,
    weights: Vec<VertexWeights>,
    bones: Vec<Bone>,
}

impl SourceSkin {
    fn read<S: SceneStore + ?Sized>(
        store: &S,
        old: &SkinBinding,
        mapping: &InfluenceMapping,
    ) -> Result<Self> {
        let geometry = MeshGeometry::read(store, &old.mesh)?;
        let triangles = geometry
            .triangles
            .iter()
            .enumerate()
            .filter_map(|(index, &[a, b, c])| {
                let points = geometry.triangle(index)?;
                if is_degenerate(points[0], points[1], points[2]) {
                    return None;
                }
                Some(Triangle {
                    corners: [a as usize, b as usize, c as usize],
                    points,
                    bounds: AABB::from_points(points),
                })
            })
            .collect();

        let weights = (0..geometry.num_vertices())
            .map(|v| store.get_vertex_weights(old.cluster.id(), v as u32))
            .collect::<Result<Vec<_>>>()?;

        let joint = NodeType::Joint;
        let mut bones = Vec::new();
        for source in old.influences.iter().filter(|j| mapping.contains(j.id())) {
            let head = store.world_position(source.id())?;
            let tail = match store.parent_of(source.id())? {
                Some(parent) if store.type_of(&parent)? == joint => store.world_position(&parent)?,
                _ => head,
            };
            bones.push(Bone {
                source: source.clone(),
                head,
                tail,
            });
        }

        Ok(Self {
            triangles,
            weights,
            bones,
        })
    }
}

/// Copy skin weights from `old` to `new`
///
/// Every vertex of the new mesh receives weights summing to 1.0, expressed in
/// terms of `new`'s influences. The old cluster is left untouched.
///
/// # Errors
/// [`Error::Cancelled`] if `progress` reports an interrupt; vertices written
/// before the interrupt keep their new weights.
pub fn transfer_weights<S: SceneStore + ?Sized>(
    store: &mut S,
    old: &SkinBinding,
    new: &SkinBinding,
    mapping: &InfluenceMapping,
    options: &TransferOptions,
    progress: &mut dyn ProgressHandler,
) -> Result<TransferReport> {
    if options.tie_tolerance < 0.0 || !options.tie_tolerance.is_finite() {
        return Err(Error::invalid_parameter(format!(
            "tie tolerance must be a finite non-negative number, got {}",
            options.tie_tolerance
        )));
    }
    log::info!(
        "Copying skin weights from {} to {}",
        old.cluster,
        new.cluster
    );

    let source = SourceSkin::read(&*store, old, mapping)?;
    let targets = store.mesh_points(new.mesh.shape())?;
    let resolver = Resolver {
        source: &source,
        mapping,
        fallback: &new.influences,
        tolerance: options.tie_tolerance,
    };

    with_progress(progress, targets.len(), "Copying skin weights", |progress| {
        let mut report = TransferReport::default();
        for (vertex, point) in targets.iter().enumerate() {
            let (stage, weights) = resolver.resolve(vertex, *point)?;
            store.set_vertex_weights(new.cluster.id(), vertex as u32, &weights)?;
            report.record(stage);
            step_or_cancel(progress, 1, "weight transfer")?;
        }
        log::debug!(
            "Weights resolved by stage: {:?}",
            TransferStage::ALL.map(|s| report.resolved_by(s))
        );
        Ok(report)
    })
}

struct Resolver<'a> {
    source: &'a SourceSkin,
    mapping: &'a InfluenceMapping,
    fallback: &'a [JointHandle],
    tolerance: f32,
}

impl Resolver<'_> {
    fn resolve(&self, vertex: usize, point: Vector3D) -> Result<(TransferStage, VertexWeights)> {
        let candidates = self.surface_candidates(point);

        let mut distinct: Vec<VertexWeights> = Vec::new();
        for weights in candidates.iter().map(|&(tri, bary)| self.blend(tri, bary)) {
            if !distinct.iter().any(|d| d.approx_eq(&weights, WEIGHT_SUM_TOLERANCE)) {
                distinct.push(weights);
            }
        }
        if let [only] = distinct.as_slice() {
            if let Some(weights) = self.to_export(only) {
                return Ok((TransferStage::ClosestPoint, weights));
            }
        }

        let associated: BTreeSet<&NodeId> = candidates
            .iter()
            .flat_map(|&(tri, _)| self.source.triangles[tri].corners)
            .filter_map(|corner| self.source.weights.get(corner))
            .flat_map(VertexWeights::joints)
            .collect();
        let bones: Vec<&Bone> = self
            .source
            .bones
            .iter()
            .filter(|b| associated.is_empty() || associated.contains(b.source.id()))
            .collect();
        let bone_ties = self.ties(bones.iter().map(|b| {
            (
                &b.source,
                point_segment_distance_squared(point, b.head, b.tail).sqrt(),
            )
        }));
        if let [only] = bone_ties.as_slice() {
            if let Some(weights) = self.single(only) {
                return Ok((TransferStage::ClosestBone, weights));
            }
        }

        let joint_ties = self.ties(
            self.source
                .bones
                .iter()
                .map(|b| (&b.source, point.distance(b.head))),
        );
        if let [only] = joint_ties.as_slice() {
            if let Some(weights) = self.single(only) {
                return Ok((TransferStage::ClosestJoint, weights));
            }
        }

        let by_name = self
            .source
            .weights
            .get(vertex)
            .and_then(|old| self.to_export(old));
        let weights = match by_name {
            Some(weights) => weights,
            None => {
                let first = joint_ties
                    .iter()
                    .find_map(|j| self.mapping.get(j.id()))
                    .or_else(|| self.fallback.first())
                    .ok_or(Error::EmptyInfluenceList)?;
                VertexWeights::single(first.id().clone())
            }
        };
        Ok((TransferStage::NameMatch, weights))
    }

    /// Triangles whose closest point is within tolerance of the minimum,
    /// with the barycentric coordinates of that point
    fn surface_candidates(&self, point: Vector3D) -> Vec<(usize, [f32; 3])> {
        let mut best = f32::INFINITY;
        let mut hits = Vec::new();
        for (index, triangle) in self.source.triangles.iter().enumerate() {
            if triangle.bounds.distance_squared_to_point(point).sqrt() > best + self.tolerance {
                continue;
            }
            let [a, b, c] = triangle.points;
            let Some(hit) = closest_point_on_triangle(point, a, b, c) else {
                continue;
            };
            let distance = hit.distance_squared.sqrt();
            best = best.min(distance);
            hits.push((distance, index, hit.barycentric));
        }
        hits.into_iter()
            .filter(|(distance, _, _)| *distance <= best + self.tolerance)
            .map(|(_, index, bary)| (index, bary))
            .collect()
    }

    fn blend(&self, triangle: usize, barycentric: [f32; 3]) -> VertexWeights {
        let corners = self.source.triangles[triangle].corners;
        VertexWeights::blend(
            corners
                .iter()
                .zip(barycentric)
                .filter_map(|(&c, factor)| Some((self.source.weights.get(c)?, factor))),
        )
    }

    fn to_export(&self, weights: &VertexWeights) -> Option<VertexWeights> {
        weights
            .remap(|joint| self.mapping.get(joint).map(|j| j.id().clone()))
            .normalized()
    }

    fn single(&self, source: &JointHandle) -> Option<VertexWeights> {
        self.mapping
            .get(source.id())
            .map(|dest| VertexWeights::single(dest.id().clone()))
    }

    /// Sources within tolerance of the minimum distance, sorted by id
    fn ties<'b, I>(&self, distances: I) -> Vec<&'b JointHandle>
    where
        I: Iterator<Item = (&'b JointHandle, f32)>,
    {
        let distances: Vec<_> = distances.collect();
        let Some(best) = distances.iter().map(|(_, d)| *d).reduce(f32::min) else {
            return Vec::new();
        };
        let mut ties: Vec<&JointHandle> = distances
            .into_iter()
            .filter(|(_, d)| *d <= best + self.tolerance)
            .map(|(j, _)| j)
            .collect();
        ties.sort();
        ties.dedup();
        ties
    }
}
