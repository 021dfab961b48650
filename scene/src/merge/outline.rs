use std::collections::HashMap;

use cgmath::{InnerSpace, Vector3};

const QUANTIZE: f32 = 1.0e4;

type VertexKey = [i64; 3];

struct EdgeRecord {
    a: [f32; 3],
    b: [f32; 3],
    normal: Vector3<f32>,
    faces: usize,
    hard: bool,
}

fn key(p: [f32; 3]) -> VertexKey {
    p.map(|c| (c * QUANTIZE).round() as i64)
}

fn vector(p: [f32; 3]) -> Vector3<f32> {
    Vector3::new(p[0], p[1], p[2])
}

pub(super) fn face_normal(tri: &[[f32; 3]]) -> Option<Vector3<f32>> {
    let (a, b, c) = (vector(tri[0]), vector(tri[1]), vector(tri[2]));
    let (e1, e2) = (b - a, c - a);
    let n = e1.cross(e2);
    let len = n.magnitude();
    // Degenerate relative to the edge lengths, not in absolute units
    (len.is_finite() && len > f32::EPSILON * e1.magnitude() * e2.magnitude()).then(|| n / len)
}

/// Extracts hard edges from a triangle soup as a line list.
///
/// An edge is emitted when it borders only one face, or when the normals of
/// the faces sharing it differ by at least `threshold_degrees`. Output order
/// follows first appearance in the soup.
pub(super) fn hard_edges(soup: &[[f32; 3]], threshold_degrees: f32) -> Vec<[f32; 3]> {
    let threshold_dot = threshold_degrees.to_radians().cos();

    let mut edges: HashMap<(VertexKey, VertexKey), usize> = HashMap::new();
    let mut records: Vec<EdgeRecord> = Vec::new();

    for tri in soup.chunks_exact(3) {
        let Some(normal) = face_normal(tri) else {
            continue;
        };

        for (i, j) in [(0, 1), (1, 2), (2, 0)] {
            let (a, b) = (tri[i], tri[j]);
            let (ka, kb) = (key(a), key(b));
            if ka == kb {
                continue;
            }
            let edge = if ka < kb { (ka, kb) } else { (kb, ka) };

            match edges.get(&edge) {
                Some(&index) => {
                    let record = &mut records[index];
                    record.faces += 1;
                    if record.normal.dot(normal) <= threshold_dot {
                        record.hard = true;
                    }
                }
                None => {
                    edges.insert(edge, records.len());
                    records.push(EdgeRecord {
                        a,
                        b,
                        normal,
                        faces: 1,
                        hard: false,
                    });
                }
            }
        }
    }

    records
        .into_iter()
        .filter(|r| r.faces == 1 || r.hard)
        .flat_map(|r| [r.a, r.b])
        .collect()
}
