use std::collections::HashMap;

use super::outline::face_normal;

/// Appends one leaf's triangles to the collision soup, tagging every vertex
/// with `slot`.
///
/// Degenerate triangles are dropped. With a `cell_size`, vertices are clustered
/// onto a grid first: every vertex in a cell takes the position of the first
/// vertex seen there, and triangles that collapse are dropped. Clusters never
/// span leaves.
pub(super) fn append_leaf(
    soup: &[[f32; 3]],
    slot: u32,
    cell_size: Option<f32>,
    positions: &mut Vec<[f32; 3]>,
    owners: &mut Vec<u32>,
) {
    let cell_size = cell_size.filter(|size| *size > 0.0);
    let mut clusters: HashMap<[i64; 3], [f32; 3]> = HashMap::new();

    for tri in soup.chunks_exact(3) {
        let tri: [[f32; 3]; 3] = match cell_size {
            Some(size) => [tri[0], tri[1], tri[2]].map(|p| {
                let cell = p.map(|c| (c / size).floor() as i64);
                *clusters.entry(cell).or_insert(p)
            }),
            None => [tri[0], tri[1], tri[2]],
        };

        if face_normal(&tri).is_none() {
            continue;
        }

        positions.extend_from_slice(&tri);
        owners.extend_from_slice(&[slot; 3]);
    }
}
