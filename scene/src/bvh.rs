//! Bounding-volume hierarchy over a triangle soup.
//!
//! Nodes live in a flat array. Leaves reference a contiguous run of
//! `triangle_order`, so the soup itself is never reordered.

use cgmath::Point3;

use crate::common::{Aabb, Ray};

#[derive(Debug, Clone, PartialEq)]
pub struct BvhNode {
    pub bounds: Aabb,
    pub kind: BvhNodeKind,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BvhNodeKind {
    Internal { left: u32, right: u32 },
    Leaf { first: u32, count: u32 },
}

/// A triangle hit reported by [`Bvh::intersect_all`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BvhHit {
    /// Index of the triangle in the soup (vertex offset / 3).
    pub triangle: u32,
    pub distance: f32,
}

#[derive(Debug, Clone, Default)]
pub struct Bvh {
    nodes: Vec<BvhNode>,
    root: Option<u32>,
    triangle_order: Vec<u32>,
}

struct BuildTriangle {
    bounds: Aabb,
    centroid: Point3<f32>,
}

impl Bvh {
    /// Builds the hierarchy over `positions`, read as a non-indexed triangle
    /// list. Trailing vertices that do not form a full triangle are ignored.
    pub fn build(positions: &[[f32; 3]], max_leaf_triangles: usize) -> Self {
        let triangles: Vec<BuildTriangle> = positions
            .chunks_exact(3)
            .filter_map(|tri| {
                let bounds = Aabb::from_positions(tri)?;
                Some(BuildTriangle {
                    centroid: bounds.center(),
                    bounds,
                })
            })
            .collect();

        if triangles.is_empty() {
            return Self::default();
        }

        let mut triangle_order: Vec<u32> = (0..triangles.len() as u32).collect();
        let mut nodes = Vec::with_capacity(triangles.len() * 2);
        let root = build_recursive(
            &triangles,
            &mut triangle_order,
            0,
            max_leaf_triangles.max(1),
            &mut nodes,
        );

        let bvh = Self {
            nodes,
            root: Some(root),
            triangle_order,
        };
        log::debug!(
            "built BVH over {} triangles: {} nodes, depth {}",
            triangles.len(),
            bvh.nodes.len(),
            bvh.depth()
        );
        bvh
    }

    pub fn is_empty(&self) -> bool {
        self.root.is_none()
    }

    pub fn nodes(&self) -> &[BvhNode] {
        &self.nodes
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn triangle_count(&self) -> usize {
        self.triangle_order.len()
    }

    pub fn bounds(&self) -> Option<Aabb> {
        self.root.map(|root| self.nodes[root as usize].bounds)
    }

    /// Length of the longest root-to-leaf path, counting nodes.
    pub fn depth(&self) -> usize {
        let Some(root) = self.root else {
            return 0;
        };

        let mut max_depth = 0;
        let mut stack = vec![(root, 1usize)];
        while let Some((index, depth)) = stack.pop() {
            max_depth = max_depth.max(depth);
            if let BvhNodeKind::Internal { left, right } = self.nodes[index as usize].kind {
                stack.push((left, depth + 1));
                stack.push((right, depth + 1));
            }
        }
        max_depth
    }

    /// Every triangle the ray hits, unordered. `positions` must be the soup the
    /// hierarchy was built from.
    pub fn intersect_all(&self, ray: &Ray, positions: &[[f32; 3]]) -> Vec<BvhHit> {
        let mut hits = Vec::new();
        let Some(root) = self.root else {
            return hits;
        };

        let mut stack = vec![root];
        while let Some(index) = stack.pop() {
            let Some(node) = self.nodes.get(index as usize) else {
                continue;
            };
            if node.bounds.intersects_ray(ray).is_none() {
                continue;
            }

            match node.kind {
                BvhNodeKind::Internal { left, right } => {
                    stack.push(left);
                    stack.push(right);
                }
                BvhNodeKind::Leaf { first, count } => {
                    let run = &self.triangle_order[first as usize..(first + count) as usize];
                    for &triangle in run {
                        let base = triangle as usize * 3;
                        let Some(tri) = positions.get(base..base + 3) else {
                            continue;
                        };
                        if let Some((distance, _, _)) =
                            ray.intersect_triangle(point(tri[0]), point(tri[1]), point(tri[2]))
                        {
                            hits.push(BvhHit { triangle, distance });
                        }
                    }
                }
            }
        }

        hits
    }
}

fn point(p: [f32; 3]) -> Point3<f32> {
    Point3::new(p[0], p[1], p[2])
}

fn axis_value(p: Point3<f32>, axis: usize) -> f32 {
    match axis {
        0 => p.x,
        1 => p.y,
        _ => p.z,
    }
}

fn build_recursive(
    triangles: &[BuildTriangle],
    order: &mut [u32],
    offset: u32,
    max_leaf_triangles: usize,
    nodes: &mut Vec<BvhNode>,
) -> u32 {
    let bounds = order
        .iter()
        .map(|&t| triangles[t as usize].bounds)
        .reduce(|a, b| a.merge(&b))
        .unwrap_or_else(|| Aabb::new(Point3::new(0.0, 0.0, 0.0), Point3::new(0.0, 0.0, 0.0)));

    if order.len() <= max_leaf_triangles {
        let index = nodes.len() as u32;
        nodes.push(BvhNode {
            bounds,
            kind: BvhNodeKind::Leaf {
                first: offset,
                count: order.len() as u32,
            },
        });
        return index;
    }

    // Split at the median centroid along the longest axis of the centroid bounds
    let centroid_bounds = Aabb::from_points(order.iter().map(|&t| triangles[t as usize].centroid))
        .unwrap_or(bounds);
    let axis = centroid_bounds.longest_axis();
    let mid = order.len() / 2;
    order.select_nth_unstable_by(mid, |&a, &b| {
        let ca = axis_value(triangles[a as usize].centroid, axis);
        let cb = axis_value(triangles[b as usize].centroid, axis);
        ca.total_cmp(&cb).then(a.cmp(&b))
    });

    let (left_order, right_order) = order.split_at_mut(mid);
    let left = build_recursive(triangles, left_order, offset, max_leaf_triangles, nodes);
    let right = build_recursive(
        triangles,
        right_order,
        offset + mid as u32,
        max_leaf_triangles,
        nodes,
    );

    let index = nodes.len() as u32;
    nodes.push(BvhNode {
        bounds,
        kind: BvhNodeKind::Internal { left, right },
    });
    index
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::EPSILON;
    use cgmath::Vector3;

    /// A row of unit triangles in the z = 0 plane, one per integer x offset.
    fn triangle_row(count: usize) -> Vec<[f32; 3]> {
        (0..count)
            .flat_map(|i| {
                let x = i as f32 * 2.0;
                [[x, 0.0, 0.0], [x + 1.0, 0.0, 0.0], [x, 1.0, 0.0]]
            })
            .collect()
    }

    fn down_ray(x: f32, y: f32) -> Ray {
        Ray::new(Point3::new(x, y, 5.0), Vector3::new(0.0, 0.0, -1.0))
    }

    #[test]
    fn test_empty_soup() {
        let bvh = Bvh::build(&[], 4);
        assert!(bvh.is_empty());
        assert_eq!(bvh.depth(), 0);
        assert!(bvh.intersect_all(&down_ray(0.0, 0.0), &[]).is_empty());
    }

    #[test]
    fn test_single_leaf_when_small() {
        let soup = triangle_row(3);
        let bvh = Bvh::build(&soup, 4);
        assert_eq!(bvh.node_count(), 1);
        assert_eq!(bvh.triangle_count(), 3);
    }

    #[test]
    fn test_every_triangle_in_exactly_one_leaf() {
        let soup = triangle_row(37);
        let bvh = Bvh::build(&soup, 2);

        let mut seen = vec![0; 37];
        for node in bvh.nodes() {
            if let BvhNodeKind::Leaf { first, count } = node.kind {
                assert!(count <= 2);
                for &t in &bvh.triangle_order[first as usize..(first + count) as usize] {
                    seen[t as usize] += 1;
                }
            }
        }
        assert!(seen.iter().all(|&n| n == 1));
        assert!(bvh.depth() <= 8);
    }

    #[test]
    fn test_node_bounds_contain_children() {
        let soup = triangle_row(20);
        let bvh = Bvh::build(&soup, 1);
        for node in bvh.nodes() {
            if let BvhNodeKind::Internal { left, right } = node.kind {
                assert!(node.bounds.contains_aabb(&bvh.nodes()[left as usize].bounds));
                assert!(node.bounds.contains_aabb(&bvh.nodes()[right as usize].bounds));
            }
        }
    }

    #[test]
    fn test_intersect_finds_the_right_triangle() {
        let soup = triangle_row(16);
        let bvh = Bvh::build(&soup, 2);

        let hits = bvh.intersect_all(&down_ray(10.25, 0.25), &soup);
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].triangle, 5);
        assert!((hits[0].distance - 5.0).abs() < EPSILON);

        // Gap between two triangles
        assert!(bvh.intersect_all(&down_ray(1.5, 0.75), &soup).is_empty());
    }

    #[test]
    fn test_intersect_reports_all_layers() {
        let mut soup = triangle_row(1);
        soup.extend([[0.0, 0.0, -2.0], [1.0, 0.0, -2.0], [0.0, 1.0, -2.0]]);
        let bvh = Bvh::build(&soup, 1);

        let mut hits = bvh.intersect_all(&down_ray(0.25, 0.25), &soup);
        hits.sort_by(|a, b| a.distance.total_cmp(&b.distance));
        assert_eq!(hits.iter().map(|h| h.triangle).collect::<Vec<_>>(), vec![0, 1]);
    }
}
