//! Triangle bounds for surface queries
//!
//! Weight transfer keeps one box per source triangle and skips triangles
//! whose box is already farther away than the best candidate so far.

use crate::types::Vector3D;

/// An axis-aligned box given by its two extreme corners
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AABB {
    /// Smallest coordinate on every axis
    pub min: Vector3D,
    /// Largest coordinate on every axis
    pub max: Vector3D,
}

impl AABB {
    /// Box spanning `min` to `max`
    pub fn new(min: Vector3D, max: Vector3D) -> Self {
        Self { min, max }
    }

    /// A box containing nothing; every distance to it is infinite
    pub fn empty() -> Self {
        Self::new(
            Vector3D::splat(f32::INFINITY),
            Vector3D::splat(f32::NEG_INFINITY),
        )
    }

    /// Tightest box around `points`
    pub fn from_points<I>(points: I) -> Self
    where
        I: IntoIterator<Item = Vector3D>,
    {
        points.into_iter().fold(Self::empty(), |mut bounds, point| {
            bounds.grow(point);
            bounds
        })
    }

    /// True while no point has been added
    pub fn is_empty(&self) -> bool {
        self.min.cmpgt(self.max).any()
    }

    /// Extend the box so it covers `point`
    pub fn grow(&mut self, point: Vector3D) {
        self.min = self.min.min(point);
        self.max = self.max.max(point);
    }

    /// Squared distance from `point` to the nearest point of the box, zero inside
    pub fn distance_squared_to_point(&self, point: Vector3D) -> f32 {
        if self.is_empty() {
            return f32::INFINITY;
        }
        point.distance_squared(point.clamp(self.min, self.max))
    }
}

impl Default for AABB {
    fn default() -> Self {
        Self::empty()
    }
}
