use cgmath::Point3;

use crate::{Ray, EPSILON};

/// An axis-aligned bounding box in world space.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct Aabb {
    pub min: Point3<f32>,
    pub max: Point3<f32>,
}

impl Aabb {
    pub fn new(min: Point3<f32>, max: Point3<f32>) -> Self {
        Self { min, max }
    }

    /// Bounding box of a set of points, or `None` when there are no points.
    pub fn from_points<I>(points: I) -> Option<Self>
    where
        I: IntoIterator<Item = Point3<f32>>,
    {
        let mut points = points.into_iter();
        let first = points.next()?;
        Some(points.fold(Self::new(first, first), |aabb, p| aabb.expand(p)))
    }

    /// Same as [`Aabb::from_points`] for raw `[x, y, z]` triples.
    pub fn from_positions(positions: &[[f32; 3]]) -> Option<Self> {
        Self::from_points(positions.iter().map(|p| Point3::new(p[0], p[1], p[2])))
    }

    /// Grows the box to include `point`.
    pub fn expand(&self, point: Point3<f32>) -> Self {
        Self {
            min: Point3::new(
                self.min.x.min(point.x),
                self.min.y.min(point.y),
                self.min.z.min(point.z),
            ),
            max: Point3::new(
                self.max.x.max(point.x),
                self.max.y.max(point.y),
                self.max.z.max(point.z),
            ),
        }
    }

    /// Smallest box containing both `self` and `other`.
    pub fn merge(&self, other: &Aabb) -> Self {
        self.expand(other.min).expand(other.max)
    }

    /// Merges two optional boxes; `None` acts as the empty box.
    pub fn merge_opt(a: Option<Aabb>, b: Option<Aabb>) -> Option<Aabb> {
        match (a, b) {
            (Some(a), Some(b)) => Some(a.merge(&b)),
            (a, None) => a,
            (None, b) => b,
        }
    }

    pub fn center(&self) -> Point3<f32> {
        Point3::new(
            (self.min.x + self.max.x) / 2.0,
            (self.min.y + self.max.y) / 2.0,
            (self.min.z + self.max.z) / 2.0,
        )
    }

    /// Extents along each axis.
    pub fn size(&self) -> (f32, f32, f32) {
        (
            self.max.x - self.min.x,
            self.max.y - self.min.y,
            self.max.z - self.min.z,
        )
    }

    /// Index of the longest axis (0 = x, 1 = y, 2 = z).
    pub fn longest_axis(&self) -> usize {
        let (x, y, z) = self.size();
        if x >= y && x >= z {
            0
        } else if y >= z {
            1
        } else {
            2
        }
    }

    /// Inclusive point containment.
    pub fn contains_point(&self, point: Point3<f32>) -> bool {
        point.x >= self.min.x && point.x <= self.max.x &&
        point.y >= self.min.y && point.y <= self.max.y &&
        point.z >= self.min.z && point.z <= self.max.z
    }

    /// True when `other` lies entirely inside `self` (within `EPSILON`).
    pub fn contains_aabb(&self, other: &Aabb) -> bool {
        other.min.x >= self.min.x - EPSILON && other.max.x <= self.max.x + EPSILON &&
        other.min.y >= self.min.y - EPSILON && other.max.y <= self.max.y + EPSILON &&
        other.min.z >= self.min.z - EPSILON && other.max.z <= self.max.z + EPSILON
    }

    /// Slab test. Returns the entry distance along the ray, `0.0` if the ray
    /// starts inside the box, or `None` when the box is missed or behind.
    pub fn intersects_ray(&self, ray: &Ray) -> Option<f32> {
        let origin = [ray.origin.x, ray.origin.y, ray.origin.z];
        let dir = [ray.direction.x, ray.direction.y, ray.direction.z];
        let min = [self.min.x, self.min.y, self.min.z];
        let max = [self.max.x, self.max.y, self.max.z];

        let mut tmin = f32::NEG_INFINITY;
        let mut tmax = f32::INFINITY;

        for axis in 0..3 {
            if dir[axis].abs() < EPSILON {
                // Parallel to the slab
                if origin[axis] < min[axis] || origin[axis] > max[axis] {
                    return None;
                }
                continue;
            }

            let inv_dir = 1.0 / dir[axis];
            let mut t1 = (min[axis] - origin[axis]) * inv_dir;
            let mut t2 = (max[axis] - origin[axis]) * inv_dir;
            if t1 > t2 {
                std::mem::swap(&mut t1, &mut t2);
            }

            tmin = tmin.max(t1);
            tmax = tmax.min(t2);
            if tmin > tmax {
                return None;
            }
        }

        if tmin >= 0.0 {
            Some(tmin)
        } else if tmax >= 0.0 {
            Some(0.0)
        } else {
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cgmath::Vector3;

    fn unit_box() -> Aabb {
        Aabb::new(Point3::new(0.0, 0.0, 0.0), Point3::new(1.0, 1.0, 1.0))
    }

    #[test]
    fn test_from_points_empty() {
        assert!(Aabb::from_points(Vec::new()).is_none());
    }

    #[test]
    fn test_from_positions() {
        let aabb = Aabb::from_positions(&[[1.0, -2.0, 0.0], [-1.0, 3.0, 0.5]]).unwrap();
        assert_eq!(aabb.min, Point3::new(-1.0, -2.0, 0.0));
        assert_eq!(aabb.max, Point3::new(1.0, 3.0, 0.5));
    }

    #[test]
    fn test_merge_opt() {
        let a = unit_box();
        let b = Aabb::new(Point3::new(2.0, 2.0, 2.0), Point3::new(3.0, 3.0, 3.0));

        assert_eq!(Aabb::merge_opt(None, None), None);
        assert_eq!(Aabb::merge_opt(Some(a), None), Some(a));

        let merged = Aabb::merge_opt(Some(a), Some(b)).unwrap();
        assert_eq!(merged.min, Point3::new(0.0, 0.0, 0.0));
        assert_eq!(merged.max, Point3::new(3.0, 3.0, 3.0));
        assert!(merged.contains_aabb(&a));
        assert!(merged.contains_aabb(&b));
    }

    #[test]
    fn test_longest_axis() {
        let aabb = Aabb::new(Point3::new(0.0, 0.0, 0.0), Point3::new(1.0, 5.0, 2.0));
        assert_eq!(aabb.longest_axis(), 1);
    }

    #[test]
    fn test_ray_hits_box() {
        let ray = Ray::new(Point3::new(0.5, 0.5, -2.0), Vector3::new(0.0, 0.0, 1.0));
        let t = unit_box().intersects_ray(&ray).unwrap();
        assert!((t - 2.0).abs() < EPSILON);
    }

    #[test]
    fn test_ray_inside_box() {
        let ray = Ray::new(Point3::new(0.5, 0.5, 0.5), Vector3::new(1.0, 0.0, 0.0));
        assert_eq!(unit_box().intersects_ray(&ray), Some(0.0));
    }

    #[test]
    fn test_ray_misses_box() {
        let ray = Ray::new(Point3::new(2.0, 2.0, -2.0), Vector3::new(0.0, 0.0, 1.0));
        assert!(unit_box().intersects_ray(&ray).is_none());

        let behind = Ray::new(Point3::new(0.5, 0.5, 2.0), Vector3::new(0.0, 0.0, 1.0));
        assert!(unit_box().intersects_ray(&behind).is_none());
    }

    #[test]
    fn test_flat_box_is_hit() {
        // Zero thickness along z, as produced by a single planar quad
        let flat = Aabb::new(Point3::new(0.0, 0.0, 0.0), Point3::new(1.0, 1.0, 0.0));
        let ray = Ray::new(Point3::new(0.5, 0.5, 5.0), Vector3::new(0.0, 0.0, -1.0));
        let t = flat.intersects_ray(&ray).unwrap();
        assert!((t - 5.0).abs() < 1e-4);
    }
}
