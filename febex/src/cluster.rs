//! Skin cluster lookup and influence queries

use crate::{
    error::{Error, Result},
    scene::SceneStore,
    types::{ClusterHandle, Direction, GeometryHandle, JointHandle, NodeId, NodeType},
};

/// Find the skin cluster deforming a mesh
///
/// Direct upstream connections of the shape are checked first. Only when
/// there are none is the full deformation history searched, since
/// intermediate deformers can hide the cluster from the direct query.
///
/// # Errors
/// - [`Error::AmbiguousCluster`] if more than one cluster is directly connected
/// - [`Error::NoCluster`] if neither search finds one
pub fn locate<S: SceneStore + ?Sized>(store: &S, mesh: &GeometryHandle) -> Result<ClusterHandle> {
    let skin = NodeType::SkinCluster;
    let direct = store.connections_to(mesh.shape(), Direction::Upstream, Some(&skin))?;
    log::debug!(
        "Clusters found are {:?}",
        direct.iter().map(NodeId::as_str).collect::<Vec<_>>()
    );

    match direct.as_slice() {
        [cluster] => return Ok(ClusterHandle::new_unchecked(cluster.clone())),
        [] => {}
        many => {
            return Err(Error::ambiguous_cluster(
                mesh.shape().as_str(),
                many.iter().map(NodeId::to_string).collect(),
            ));
        }
    }

    for node in store.history_of(mesh.shape())? {
        if store.type_of(&node)? == skin {
            log::debug!("Found {node} in the deformation history of {}", mesh.shape());
            return Ok(ClusterHandle::new_unchecked(node));
        }
    }
    Err(Error::no_cluster(mesh.shape().as_str()))
}

/// Influences bound to a cluster, in the cluster's order
///
/// # Errors
/// - [`Error::NotFound`] / [`Error::WrongType`] if `cluster` is not a skin cluster
/// - [`Error::EmptyInfluenceList`] if the cluster has no influences
/// - [`Error::NotAJoint`] if an influence is not a joint
pub fn find_influences<S: SceneStore + ?Sized>(
    store: &S,
    cluster: &NodeId,
) -> Result<Vec<JointHandle>> {
    let cluster = ClusterHandle::resolve(store, cluster)?;
    influences(store, &cluster)
}

/// Influences of an already validated cluster
pub fn influences<S: SceneStore + ?Sized>(
    store: &S,
    cluster: &ClusterHandle,
) -> Result<Vec<JointHandle>> {
    let ids = store.query_cluster_influences(cluster.id())?;
    if ids.is_empty() {
        return Err(Error::EmptyInfluenceList);
    }
    ids.iter()
        .map(|id| JointHandle::resolve(store, id))
        .collect()
}
