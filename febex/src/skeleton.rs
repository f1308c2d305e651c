//! Export skeleton reconstruction
//!
//! [`InfluenceTreeBuilder`] rebuilds a joint hierarchy that keeps only the
//! joints actually driving a skin. Every kept joint ends up below the copy of
//! its nearest kept ancestor, so ancestor/descendant relationships among kept
//! joints survive while unused joints in between disappear.

use std::collections::{BTreeSet, HashMap};

use crate::{
    error::{Error, Result},
    node::Node,
    scene::{ChildFilter, SceneStore},
    types::{DuplicateOptions, JointHandle, NodeId},
};

/// Joints that drive a skin cluster
pub type InfluenceSet = BTreeSet<JointHandle>;

/// One-to-one mapping from source joints to their export copies
///
/// Iteration follows insertion order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct InfluenceMapping {
    pairs: Vec<(JointHandle, JointHandle)>,
    by_source: HashMap<NodeId, usize>,
    by_destination: HashMap<NodeId, usize>,
}

impl InfluenceMapping {
    /// Create an empty mapping
    pub fn new() -> Self {
        Self::default()
    }

    /// Record `source -> destination`
    ///
    /// Fails with [`Error::MissingMapping`] if either side is already mapped.
    pub fn insert(&mut self, source: JointHandle, destination: JointHandle) -> Result<()> {
        if self.by_source.contains_key(source.id()) {
            return Err(Error::missing_mapping(format!("{source} is mapped twice")));
        }
        if self.by_destination.contains_key(destination.id()) {
            return Err(Error::missing_mapping(format!(
                "{destination} is the copy of more than one joint"
            )));
        }
        let index = self.pairs.len();
        self.by_source.insert(source.id().clone(), index);
        self.by_destination.insert(destination.id().clone(), index);
        self.pairs.push((source, destination));
        Ok(())
    }

    /// Copy of a source joint
    pub fn get(&self, source: &NodeId) -> Option<&JointHandle> {
        self.by_source.get(source).map(|&i| &self.pairs[i].1)
    }

    /// Source joint of a copy
    pub fn source_of(&self, destination: &NodeId) -> Option<&JointHandle> {
        self.by_destination.get(destination).map(|&i| &self.pairs[i].0)
    }

    /// Whether a source joint is mapped
    pub fn contains(&self, source: &NodeId) -> bool {
        self.by_source.contains_key(source)
    }

    /// Number of mapped joints
    pub fn len(&self) -> usize {
        self.pairs.len()
    }

    /// Whether nothing is mapped
    pub fn is_empty(&self) -> bool {
        self.pairs.is_empty()
    }

    /// Source joints in insertion order
    pub fn sources(&self) -> impl Iterator<Item = &JointHandle> {
        self.pairs.iter().map(|(s, _)| s)
    }

    /// Destination joints in insertion order
    pub fn destinations(&self) -> impl Iterator<Item = &JointHandle> {
        self.pairs.iter().map(|(_, d)| d)
    }

    /// `(source, destination)` pairs in insertion order
    pub fn iter(&self) -> impl Iterator<Item = (&JointHandle, &JointHandle)> {
        self.pairs.iter().map(|(s, d)| (s, d))
    }
}

/// The result of [`InfluenceTreeBuilder::build`]
#[derive(Debug, Clone)]
pub struct InfluenceTree {
    mapping: InfluenceMapping,
    root: JointHandle,
    source_root: JointHandle,
    missing: Vec<JointHandle>,
}

impl InfluenceTree {
    /// Source to export joint mapping
    pub fn mapping(&self) -> &InfluenceMapping {
        &self.mapping
    }

    /// Root of the export skeleton
    ///
    /// Always present, even when the source root is not itself an influence.
    pub fn root(&self) -> &JointHandle {
        &self.root
    }

    /// The top joint the tree was built from
    pub fn source_root(&self) -> &JointHandle {
        &self.source_root
    }

    /// Used influences that are not part of the source hierarchy
    pub fn missing(&self) -> &[JointHandle] {
        &self.missing
    }

    /// Number of joints in the export skeleton
    pub fn num_joints(&self) -> usize {
        if self.mapping.get(self.source_root.id()).is_some() {
            self.mapping.len()
        } else {
            self.mapping.len() + 1
        }
    }

    /// Take the mapping, dropping the rest
    pub fn into_mapping(self) -> InfluenceMapping {
        self.mapping
    }
}

/// Builds pruned copies of joint hierarchies
#[derive(Debug, Clone)]
pub struct InfluenceTreeBuilder {
    suffix: String,
    warn_missing: bool,
}

impl Default for InfluenceTreeBuilder {
    fn default() -> Self {
        Self::new("_INF")
    }
}

impl InfluenceTreeBuilder {
    /// Create a builder naming copies `{name}{suffix}`
    pub fn new<S: Into<String>>(suffix: S) -> Self {
        Self {
            suffix: suffix.into(),
            warn_missing: true,
        }
    }

    /// Whether to log a warning for each used influence outside the hierarchy
    pub fn with_missing_warnings(mut self, warn: bool) -> Self {
        self.warn_missing = warn;
        self
    }

    /// Name given to the copy of `source`
    pub fn copy_name<S: SceneStore + ?Sized>(&self, store: &S, source: &NodeId) -> Result<String> {
        Ok(format!("{}{}", store.name_of(source)?, self.suffix))
    }

    /// Copy the joints of `root`'s hierarchy that appear in `used`
    ///
    /// The copy of `root` always anchors the new tree and is parented under
    /// `container` when one is given. Used influences that are not below
    /// `root` are skipped and listed in [`InfluenceTree::missing`].
    ///
    /// # Errors
    /// - [`Error::NotFound`] / [`Error::NotAJoint`] if `root` is not a joint
    /// - [`Error::EmptyHierarchy`] if `root` has no descendant joints and is not used
    pub fn build<S: SceneStore + ?Sized>(
        &self,
        store: &mut S,
        root: &NodeId,
        used: &InfluenceSet,
        container: Option<&NodeId>,
    ) -> Result<InfluenceTree> {
        let source_root = JointHandle::resolve(&*store, root)?;
        let descendants: Vec<NodeId> = match Node::get(&*store, root) {
            Some(node) => node
                .descendants(&ChildFilter::joints())?
                .into_iter()
                .map(|n| n.id().clone())
                .collect(),
            None => return Err(Error::not_found(root.as_str())),
        };
        let root_used = used.contains(root);
        if descendants.is_empty() && !root_used {
            return Err(Error::empty_hierarchy(root.as_str()));
        }

        let mut mapping = InfluenceMapping::new();
        let root_name = self.copy_name(&*store, root)?;
        let dest_root =
            JointHandle::new_unchecked(store.duplicate(root, &root_name, DuplicateOptions::PARENT_ONLY)?);
        if root_used {
            mapping.insert(source_root.clone(), dest_root.clone())?;
        }

        for joint in descendants.iter().filter(|j| used.contains(*j)) {
            let name = self.copy_name(&*store, joint)?;
            let copy = store.duplicate(joint, &name, DuplicateOptions::PARENT_ONLY)?;
            mapping.insert(
                JointHandle::new_unchecked(joint.clone()),
                JointHandle::new_unchecked(copy),
            )?;
        }

        for (source, copy) in mapping.iter() {
            if source.id() == root {
                continue;
            }
            let Some(node) = Node::get(&*store, source.id()) else {
                return Err(Error::not_found(source.id().as_str()));
            };
            let target = match node.nearest_ancestor(Some(root), |id| used.contains(id))? {
                Some(ancestor) => mapping
                    .get(ancestor.id())
                    .map(JointHandle::id)
                    .unwrap_or(dest_root.id()),
                None => dest_root.id(),
            };
            if store.parent_of(copy.id())?.as_ref() != Some(target) {
                store.reparent(copy.id(), Some(target))?;
            }
        }

        let missing: Vec<JointHandle> = used
            .iter()
            .filter(|j| !mapping.contains(j.id()))
            .cloned()
            .collect();
        if self.warn_missing {
            for joint in &missing {
                log::warn!("{joint} drives the skin but is not below {root}, skipping it");
            }
        }

        store.reparent(dest_root.id(), container)?;
        log::debug!(
            "Built export skeleton {dest_root} with {} influences",
            mapping.len()
        );

        Ok(InfluenceTree {
            mapping,
            root: dest_root,
            source_root,
            missing,
        })
    }
}
