//! Mesh resolution
//!
//! A user may name either the container (transform) of a mesh or the mesh
//! shape itself. [`resolve`] turns either into a [`GeometryHandle`].

use crate::{
    error::{Error, Result},
    scene::{ChildFilter, SceneStore},
    types::{GeometryHandle, NodeId, NodeType, Vector3D},
};

/// Resolve a container or mesh identifier into a validated [`GeometryHandle`]
///
/// Pure query; the scene is not modified.
///
/// # Errors
/// - [`Error::NotFound`] if `id` does not exist
/// - [`Error::MissingShape`] if `id` is a container without a shape child
/// - [`Error::WrongType`] if `id` is neither a container nor a mesh, or if the
///   container's shape is not a mesh
/// - [`Error::InvalidMesh`] if a mesh shape has no container
pub fn resolve<S: SceneStore + ?Sized>(store: &S, id: &NodeId) -> Result<GeometryHandle> {
    if !store.exists(id) {
        return Err(Error::not_found(id.as_str()));
    }

    match store.type_of(id)? {
        NodeType::Transform => {
            let shape = store
                .children_of(id, &ChildFilter::Shapes)?
                .into_iter()
                .next()
                .ok_or_else(|| Error::missing_shape(id.as_str()))?;
            match store.type_of(&shape)? {
                NodeType::Mesh => Ok(GeometryHandle::new(id.clone(), shape)),
                other => Err(Error::wrong_type(
                    shape.as_str(),
                    NodeType::Mesh.as_str(),
                    other.as_str(),
                )),
            }
        }
        NodeType::Mesh => {
            let container = store
                .parent_of(id)?
                .ok_or_else(|| Error::invalid_mesh(id.as_str()))?;
            Ok(GeometryHandle::new(container, id.clone()))
        }
        other => Err(Error::wrong_type(
            id.as_str(),
            NodeType::Mesh.as_str(),
            other.as_str(),
        )),
    }
}

/// Geometry of a mesh shape, read once for repeated queries
#[derive(Debug, Clone, Default)]
pub struct MeshGeometry {
    /// World-space vertex positions
    pub points: Vec<Vector3D>,
    /// Triangulated faces indexing into `points`
    pub triangles: Vec<[u32; 3]>,
}

impl MeshGeometry {
    /// Read the points and triangles of a resolved mesh
    pub fn read<S: SceneStore + ?Sized>(store: &S, mesh: &GeometryHandle) -> Result<Self> {
        let points = store.mesh_points(mesh.shape())?;
        let triangles = store.mesh_triangles(mesh.shape())?;
        if let Some(bad) = triangles
            .iter()
            .flatten()
            .find(|&&i| i as usize >= points.len())
        {
            return Err(Error::scene(format!(
                "{} has a face referencing vertex {bad} of {}",
                mesh.shape(),
                points.len()
            )));
        }
        Ok(Self { points, triangles })
    }

    /// Number of vertices
    pub fn num_vertices(&self) -> usize {
        self.points.len()
    }

    /// Corner positions of a triangle
    pub fn triangle(&self, index: usize) -> Option<[Vector3D; 3]> {
        let [a, b, c] = *self.triangles.get(index)?;
        Some([
            self.points[a as usize],
            self.points[b as usize],
            self.points[c as usize],
        ])
    }
}
