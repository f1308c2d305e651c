//! Per-vertex skin weights
//!
//! A skinned vertex is influenced by one or more joints, each with a weight.
//! After a transfer the weights of every vertex sum to 1.0.

use crate::types::NodeId;

/// Tolerance used when checking that weights sum to one
pub const WEIGHT_SUM_TOLERANCE: f32 = 1e-4;

/// A single joint's contribution to a vertex
#[derive(Debug, Clone, PartialEq)]
pub struct VertexWeight {
    /// The influencing joint
    pub joint: NodeId,
    /// The weight value (typically 0.0 to 1.0)
    pub weight: f32,
}

impl VertexWeight {
    /// Create a new vertex weight
    pub fn new(joint: NodeId, weight: f32) -> Self {
        Self { joint, weight }
    }
}

/// All joint contributions to one vertex, in insertion order, one entry per joint
#[derive(Debug, Clone, PartialEq, Default)]
pub struct VertexWeights {
    entries: Vec<VertexWeight>,
}

impl VertexWeights {
    /// Create an empty weight set
    pub fn new() -> Self {
        Self::default()
    }

    /// A vertex rigidly bound to one joint
    pub fn single(joint: NodeId) -> Self {
        Self {
            entries: vec![VertexWeight::new(joint, 1.0)],
        }
    }

    /// Add `weight` to `joint`, merging with an existing entry
    pub fn add(&mut self, joint: &NodeId, weight: f32) -> &mut Self {
        match self.entries.iter_mut().find(|w| &w.joint == joint) {
            Some(existing) => existing.weight += weight,
            None => self.entries.push(VertexWeight::new(joint.clone(), weight)),
        }
        self
    }

    /// Weight of a joint (0.0 if it does not influence the vertex)
    pub fn get(&self, joint: &NodeId) -> f32 {
        self.entries
            .iter()
            .find(|w| &w.joint == joint)
            .map(|w| w.weight)
            .unwrap_or(0.0)
    }

    /// Iterate the entries
    pub fn iter(&self) -> impl Iterator<Item = &VertexWeight> {
        self.entries.iter()
    }

    /// Joints carrying a non-zero weight
    pub fn joints(&self) -> impl Iterator<Item = &NodeId> {
        self.entries
            .iter()
            .filter(|w| w.weight > 0.0)
            .map(|w| &w.joint)
    }

    /// Number of entries
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether there are no entries
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Sum of all weights
    pub fn total(&self) -> f32 {
        self.entries.iter().map(|w| w.weight).sum()
    }

    /// Whether the weights sum to 1.0 within [`WEIGHT_SUM_TOLERANCE`]
    pub fn is_normalized(&self) -> bool {
        (self.total() - 1.0).abs() <= WEIGHT_SUM_TOLERANCE
    }

    /// Drop zero and negative entries and scale the rest to sum to 1.0
    ///
    /// Returns `None` when nothing positive is left.
    pub fn normalized(&self) -> Option<Self> {
        let entries: Vec<VertexWeight> = self
            .entries
            .iter()
            .filter(|w| w.weight > 0.0 && w.weight.is_finite())
            .cloned()
            .collect();
        let total: f32 = entries.iter().map(|w| w.weight).sum();
        if total <= 0.0 {
            return None;
        }
        Some(Self {
            entries: entries
                .into_iter()
                .map(|w| VertexWeight::new(w.joint, w.weight / total))
                .collect(),
        })
    }

    /// Rename joints through `map`, dropping joints it has no answer for
    pub fn remap<F>(&self, mut map: F) -> Self
    where
        F: FnMut(&NodeId) -> Option<NodeId>,
    {
        let mut remapped = Self::new();
        for entry in &self.entries {
            if let Some(joint) = map(&entry.joint) {
                remapped.add(&joint, entry.weight);
            }
        }
        remapped
    }

    /// Weighted sum of several weight sets
    pub fn blend<'a, I>(parts: I) -> Self
    where
        I: IntoIterator<Item = (&'a VertexWeights, f32)>,
    {
        let mut blended = Self::new();
        for (weights, factor) in parts {
            for entry in weights.iter() {
                blended.add(&entry.joint, entry.weight * factor);
            }
        }
        blended
    }

    /// Whether two weight sets assign the same weight to every joint, within `tolerance`
    pub fn approx_eq(&self, other: &Self, tolerance: f32) -> bool {
        let covers = |a: &Self, b: &Self| {
            a.entries
                .iter()
                .all(|w| (w.weight - b.get(&w.joint)).abs() <= tolerance)
        };
        covers(self, other) && covers(other, self)
    }
}

impl FromIterator<(NodeId, f32)> for VertexWeights {
    fn from_iter<T: IntoIterator<Item = (NodeId, f32)>>(iter: T) -> Self {
        let mut weights = Self::new();
        for (joint, weight) in iter {
            weights.add(&joint, weight);
        }
        weights
    }
}

impl<'a> IntoIterator for &'a VertexWeights {
    type Item = &'a VertexWeight;
    type IntoIter = std::slice::Iter<'a, VertexWeight>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.iter()
    }
}
