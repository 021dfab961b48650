use cgmath::{InnerSpace, Point3, Vector3};

use crate::EPSILON;

/// A half-line with a normalized direction.
#[derive(Debug, Copy, Clone)]
pub struct Ray {
    pub origin: Point3<f32>,
    pub direction: Vector3<f32>,
}

impl Ray {
    /// Creates a ray; `direction` is normalized.
    pub fn new(origin: Point3<f32>, direction: Vector3<f32>) -> Self {
        Self {
            origin,
            direction: direction.normalize(),
        }
    }

    /// Ray starting at `from` and passing through `to`.
    pub fn through(from: Point3<f32>, to: Point3<f32>) -> Option<Self> {
        let direction = to - from;
        if direction.magnitude2() < EPSILON * EPSILON {
            return None;
        }
        Some(Self::new(from, direction))
    }

    pub fn point_at(&self, t: f32) -> Point3<f32> {
        self.origin + self.direction * t
    }

    /// Double-sided Möller-Trumbore test.
    ///
    /// Returns `(t, u, v)` where `t` is the distance along the ray and `u`, `v`
    /// are the barycentric weights of `v1` and `v2`.
    pub fn intersect_triangle(
        &self,
        v0: Point3<f32>,
        v1: Point3<f32>,
        v2: Point3<f32>,
    ) -> Option<(f32, f32, f32)> {
        let edge1 = v1 - v0;
        let edge2 = v2 - v0;

        // Parallel test relative to the triangle's size, so small triangles still hit
        let h = self.direction.cross(edge2);
        let det = edge1.dot(h);
        let scale = edge1.magnitude() * edge2.magnitude();
        if !det.is_finite() || det.abs() <= EPSILON * scale {
            return None;
        }

        let inv_det = 1.0 / det;
        let s = self.origin - v0;

        let u = inv_det * s.dot(h);
        if !(0.0..=1.0).contains(&u) {
            return None;
        }

        let q = s.cross(edge1);
        let v = inv_det * self.direction.dot(q);
        if v < 0.0 || u + v > 1.0 {
            return None;
        }

        let t = inv_det * edge2.dot(q);
        (t > EPSILON).then_some((t, u, v))
    }
}
