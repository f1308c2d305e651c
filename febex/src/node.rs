//! Read-only views over the scene hierarchy

use crate::{
    error::Result,
    scene::{ChildFilter, SceneStore},
    types::{NodeId, NodeType},
};

/// A node in the scene hierarchy, borrowed from a [`SceneStore`]
pub struct Node<'a, S: SceneStore + ?Sized> {
    store: &'a S,
    id: NodeId,
}

impl<S: SceneStore + ?Sized> Clone for Node<'_, S> {
    fn clone(&self) -> Self {
        Self {
            store: self.store,
            id: self.id.clone(),
        }
    }
}

impl<S: SceneStore + ?Sized> std::fmt::Debug for Node<'_, S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("Node").field(&self.id).finish()
    }
}

impl<'a, S: SceneStore + ?Sized> Node<'a, S> {
    /// View an existing node, `None` if it does not exist
    pub fn get(store: &'a S, id: &NodeId) -> Option<Self> {
        store.exists(id).then(|| Self {
            store,
            id: id.clone(),
        })
    }

    fn wrap(&self, id: NodeId) -> Self {
        Self {
            store: self.store,
            id,
        }
    }

    /// Identifier of the node
    pub fn id(&self) -> &NodeId {
        &self.id
    }

    /// Get the name of the node
    pub fn name(&self) -> Result<String> {
        self.store.name_of(&self.id)
    }

    /// Get the type of the node
    pub fn node_type(&self) -> Result<NodeType> {
        self.store.type_of(&self.id)
    }

    /// Get the parent node
    pub fn parent(&self) -> Result<Option<Self>> {
        Ok(self.store.parent_of(&self.id)?.map(|p| self.wrap(p)))
    }

    /// Direct children passing `filter`
    pub fn children(&self, filter: &ChildFilter) -> Result<Vec<Self>> {
        Ok(self
            .store
            .children_of(&self.id, filter)?
            .into_iter()
            .map(|c| self.wrap(c))
            .collect())
    }

    /// All descendants passing `filter`, in pre-order
    ///
    /// The walk goes through every child; the filter only decides what is
    /// reported, so joints below a plain transform are still found.
    pub fn descendants(&self, filter: &ChildFilter) -> Result<Vec<Self>> {
        let mut found = Vec::new();
        let mut stack: Vec<NodeId> = self.store.children_of(&self.id, &ChildFilter::All)?;
        stack.reverse();
        while let Some(current) = stack.pop() {
            let mut children = self.store.children_of(&current, &ChildFilter::All)?;
            if self.matches(&current, filter)? {
                found.push(self.wrap(current));
            }
            children.reverse();
            stack.extend(children);
        }
        Ok(found)
    }

    /// Closest proper ancestor for which `predicate` holds
    ///
    /// The walk stops (returning `None`) when it reaches `stop` or the top of the hierarchy.
    pub fn nearest_ancestor<F>(&self, stop: Option<&NodeId>, mut predicate: F) -> Result<Option<Self>>
    where
        F: FnMut(&NodeId) -> bool,
    {
        let mut current = self.store.parent_of(&self.id)?;
        while let Some(id) = current {
            if Some(&id) == stop {
                return Ok(None);
            }
            if predicate(&id) {
                return Ok(Some(self.wrap(id)));
            }
            current = self.store.parent_of(&id)?;
        }
        Ok(None)
    }

    /// Find a node by name in this subtree (recursive search)
    pub fn find_node(&self, name: &str) -> Result<Option<Self>> {
        if self.name()? == name {
            return Ok(Some(self.clone()));
        }
        for child in self.children(&ChildFilter::All)? {
            if let Some(found) = child.find_node(name)? {
                return Ok(Some(found));
            }
        }
        Ok(None)
    }

    fn matches(&self, id: &NodeId, filter: &ChildFilter) -> Result<bool> {
        Ok(match filter {
            ChildFilter::All => true,
            ChildFilter::OfType(node_type) => &self.store.type_of(id)? == node_type,
            ChildFilter::Shapes => {
                let Some(parent) = self.store.parent_of(id)? else {
                    return Ok(false);
                };
                self.store
                    .children_of(&parent, &ChildFilter::Shapes)?
                    .contains(id)
            }
        })
    }
}
