//! Geometric queries used by weight transfer
//!
//! Closest-point routines follow the region tests from Ericson's
//! "Real-Time Collision Detection".

use crate::types::Vector3D;

/// Squared area below which a triangle is treated as degenerate
pub const DEGENERATE_AREA_SQ: f32 = 1e-12;

/// Result of a closest-point-on-triangle query
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TrianglePoint {
    /// Closest point on the triangle
    pub point: Vector3D,
    /// Barycentric coordinates of `point` for vertices a, b and c
    pub barycentric: [f32; 3],
    /// Squared distance from the query point
    pub distance_squared: f32,
}

/// Whether a triangle has (near) zero area
pub fn is_degenerate(a: Vector3D, b: Vector3D, c: Vector3D) -> bool {
    (b - a).cross(c - a).length_squared() <= DEGENERATE_AREA_SQ
}

/// Closest point to `p` on triangle `abc`
///
/// Returns `None` for degenerate triangles, whose barycentric coordinates
/// are not well defined.
pub fn closest_point_on_triangle(
    p: Vector3D,
    a: Vector3D,
    b: Vector3D,
    c: Vector3D,
) -> Option<TrianglePoint> {
    if is_degenerate(a, b, c) {
        return None;
    }

    let finish = |point: Vector3D, barycentric: [f32; 3]| TrianglePoint {
        point,
        barycentric,
        distance_squared: p.distance_squared(point),
    };

    let ab = b - a;
    let ac = c - a;
    let ap = p - a;
    let d1 = ab.dot(ap);
    let d2 = ac.dot(ap);
    if d1 <= 0.0 && d2 <= 0.0 {
        return Some(finish(a, [1.0, 0.0, 0.0]));
    }

    let bp = p - b;
    let d3 = ab.dot(bp);
    let d4 = ac.dot(bp);
    if d3 >= 0.0 && d4 <= d3 {
        return Some(finish(b, [0.0, 1.0, 0.0]));
    }

    let vc = d1 * d4 - d3 * d2;
    if vc <= 0.0 && d1 >= 0.0 && d3 <= 0.0 {
        let v = d1 / (d1 - d3);
        return Some(finish(a + ab * v, [1.0 - v, v, 0.0]));
    }

    let cp = p - c;
    let d5 = ab.dot(cp);
    let d6 = ac.dot(cp);
    if d6 >= 0.0 && d5 <= d6 {
        return Some(finish(c, [0.0, 0.0, 1.0]));
    }

    let vb = d5 * d2 - d1 * d6;
    if vb <= 0.0 && d2 >= 0.0 && d6 <= 0.0 {
        let w = d2 / (d2 - d6);
        return Some(finish(a + ac * w, [1.0 - w, 0.0, w]));
    }

    let va = d3 * d6 - d5 * d4;
    if va <= 0.0 && (d4 - d3) >= 0.0 && (d5 - d6) >= 0.0 {
        let w = (d4 - d3) / ((d4 - d3) + (d5 - d6));
        return Some(finish(b + (c - b) * w, [0.0, 1.0 - w, w]));
    }

    let denom = 1.0 / (va + vb + vc);
    let v = vb * denom;
    let w = vc * denom;
    Some(finish(a + ab * v + ac * w, [1.0 - v - w, v, w]))
}

/// Squared distance from `p` to the segment `ab` (a point when `a == b`)
pub fn point_segment_distance_squared(p: Vector3D, a: Vector3D, b: Vector3D) -> f32 {
    let ab = b - a;
    let len_sq = ab.length_squared();
    if len_sq <= f32::EPSILON {
        return p.distance_squared(a);
    }
    let t = ((p - a).dot(ab) / len_sq).clamp(0.0, 1.0);
    p.distance_squared(a + ab * t)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn tri() -> (Vector3D, Vector3D, Vector3D) {
        (
            Vector3D::new(0.0, 0.0, 0.0),
            Vector3D::new(2.0, 0.0, 0.0),
            Vector3D::new(0.0, 2.0, 0.0),
        )
    }

    #[test]
    fn test_interior_projection() {
        let (a, b, c) = tri();
        let hit = closest_point_on_triangle(Vector3D::new(0.5, 0.5, 3.0), a, b, c).unwrap();
        assert_relative_eq!(hit.point.x, 0.5);
        assert_relative_eq!(hit.point.y, 0.5);
        assert_relative_eq!(hit.point.z, 0.0);
        assert_relative_eq!(hit.distance_squared, 9.0);
        let sum: f32 = hit.barycentric.iter().sum();
        assert_relative_eq!(sum, 1.0, epsilon = 1e-6);
        assert_relative_eq!(hit.barycentric[1], 0.25, epsilon = 1e-6);
    }

    #[test]
    fn test_vertex_and_edge_regions() {
        let (a, b, c) = tri();
        let hit = closest_point_on_triangle(Vector3D::new(-1.0, -1.0, 0.0), a, b, c).unwrap();
        assert_eq!(hit.barycentric, [1.0, 0.0, 0.0]);

        let hit = closest_point_on_triangle(Vector3D::new(1.0, -1.0, 0.0), a, b, c).unwrap();
        assert_relative_eq!(hit.point.x, 1.0);
        assert_relative_eq!(hit.barycentric[0], 0.5);
        assert_relative_eq!(hit.barycentric[1], 0.5);
    }

    #[test]
    fn test_degenerate_triangle() {
        let a = Vector3D::ZERO;
        let b = Vector3D::X;
        let c = Vector3D::X * 2.0;
        assert!(is_degenerate(a, b, c));
        assert!(closest_point_on_triangle(Vector3D::Y, a, b, c).is_none());
    }

    #[test]
    fn test_point_segment_distance() {
        let a = Vector3D::ZERO;
        let b = Vector3D::new(0.0, 4.0, 0.0);
        assert_relative_eq!(point_segment_distance_squared(Vector3D::new(1.0, 2.0, 0.0), a, b), 1.0);
        assert_relative_eq!(point_segment_distance_squared(Vector3D::new(0.0, 6.0, 0.0), a, b), 4.0);
        assert_relative_eq!(point_segment_distance_squared(Vector3D::new(3.0, 0.0, 0.0), a, a), 9.0);
    }
}
