//! The parsed scene description an external loader hands to the core.
//!
//! Geometry is already in world space: the loader resolves node matrices before
//! building these values. Everything here is plain data and deserializable, so
//! scene descriptions can also be read from JSON.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::common::Aabb;
use crate::entity::EndpointMetadata;
use crate::material::Material;

/// Attribute names the merger always produces itself.
pub const RESERVED_ATTRIBUTES: [&str; 2] = ["position", "normal"];

/// A named per-vertex float attribute (uvs, colors, custom data).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VertexAttribute {
    pub item_size: usize,
    pub values: Vec<f32>,
}

impl VertexAttribute {
    pub fn new(item_size: usize, values: Vec<f32>) -> Self {
        Self { item_size, values }
    }

    /// Values of vertex `index`.
    pub fn item(&self, index: usize) -> &[f32] {
        &self.values[index * self.item_size..(index + 1) * self.item_size]
    }
}

/// A drawable triangle mesh, optionally indexed.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SourceMesh {
    pub positions: Vec<[f32; 3]>,
    #[serde(default)]
    pub indices: Option<Vec<u32>>,
    #[serde(default)]
    pub attributes: BTreeMap<String, VertexAttribute>,
}

impl SourceMesh {
    pub fn new(positions: Vec<[f32; 3]>, indices: Option<Vec<u32>>) -> Self {
        Self {
            positions,
            indices,
            attributes: BTreeMap::new(),
        }
    }

    pub fn with_attribute(mut self, name: impl Into<String>, attribute: VertexAttribute) -> Self {
        self.attributes.insert(name.into(), attribute);
        self
    }

    /// A square in the plane `z = center.z`, split into two triangles.
    pub fn quad(center: [f32; 3], half_extent: f32) -> Self {
        let [x, y, z] = center;
        let h = half_extent;
        Self::new(
            vec![
                [x - h, y - h, z],
                [x + h, y - h, z],
                [x + h, y + h, z],
                [x - h, y + h, z],
            ],
            Some(vec![0, 1, 2, 0, 2, 3]),
        )
    }

    /// An axis-aligned box spanning `min..max`.
    pub fn cuboid(min: [f32; 3], max: [f32; 3]) -> Self {
        let [x0, y0, z0] = min;
        let [x1, y1, z1] = max;
        let positions = vec![
            [x0, y0, z0],
            [x1, y0, z0],
            [x1, y1, z0],
            [x0, y1, z0],
            [x0, y0, z1],
            [x1, y0, z1],
            [x1, y1, z1],
            [x0, y1, z1],
        ];
        #[rustfmt::skip]
        let indices = vec![
            0, 2, 1, 0, 3, 2, // -z
            4, 5, 6, 4, 6, 7, // +z
            0, 1, 5, 0, 5, 4, // -y
            3, 7, 6, 3, 6, 2, // +y
            0, 4, 7, 0, 7, 3, // -x
            1, 2, 6, 1, 6, 5, // +x
        ];
        Self::new(positions, Some(indices))
    }

    pub fn vertex_count(&self) -> usize {
        self.positions.len()
    }

    pub fn triangle_count(&self) -> usize {
        match &self.indices {
            Some(indices) => indices.len() / 3,
            None => self.positions.len() / 3,
        }
    }

    /// Vertex indices in triangle-soup order (the index buffer, or `0..n`).
    pub fn soup_indices(&self) -> Vec<u32> {
        match &self.indices {
            Some(indices) => indices.clone(),
            None => (0..self.positions.len() as u32).collect(),
        }
    }

    /// Positions flattened to a non-indexed triangle soup.
    pub fn soup_positions(&self) -> Vec<[f32; 3]> {
        self.soup_indices()
            .into_iter()
            .map(|i| self.positions[i as usize])
            .collect()
    }

    pub fn bounds(&self) -> Option<Aabb> {
        Aabb::from_positions(&self.positions)
    }

    /// Checks index ranges and attribute lengths.
    pub fn validate(&self) -> Result<(), String> {
        let vertex_count = self.positions.len();

        if let Some(p) = self.positions.iter().find(|p| p.iter().any(|c| !c.is_finite())) {
            return Err(format!("non-finite vertex position {p:?}"));
        }

        match &self.indices {
            Some(indices) => {
                if indices.len() % 3 != 0 {
                    return Err(format!(
                        "index count {} is not a multiple of 3",
                        indices.len()
                    ));
                }
                if let Some(&bad) = indices.iter().find(|&&i| i as usize >= vertex_count) {
                    return Err(format!(
                        "index {bad} out of range for {vertex_count} vertices"
                    ));
                }
            }
            None => {
                if vertex_count % 3 != 0 {
                    return Err(format!(
                        "non-indexed vertex count {vertex_count} is not a multiple of 3"
                    ));
                }
            }
        }

        for (name, attribute) in &self.attributes {
            if attribute.item_size == 0 {
                return Err(format!("attribute '{name}' has item size 0"));
            }
            if attribute.values.len() != vertex_count * attribute.item_size {
                return Err(format!(
                    "attribute '{name}' has {} values, expected {}",
                    attribute.values.len(),
                    vertex_count * attribute.item_size
                ));
            }
        }

        Ok(())
    }
}

/// A drawable point set. Point sets are never merged into the union mesh.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SourcePoints {
    pub positions: Vec<[f32; 3]>,
    #[serde(default)]
    pub colors: Option<Vec<[f32; 3]>>,
}

impl SourcePoints {
    pub fn new(positions: Vec<[f32; 3]>) -> Self {
        Self {
            positions,
            colors: None,
        }
    }

    pub fn bounds(&self) -> Option<Aabb> {
        Aabb::from_positions(&self.positions)
    }

    pub fn validate(&self) -> Result<(), String> {
        if let Some(p) = self.positions.iter().find(|p| p.iter().any(|c| !c.is_finite())) {
            return Err(format!("non-finite point position {p:?}"));
        }
        if let Some(colors) = &self.colors {
            if colors.len() != self.positions.len() {
                return Err(format!(
                    "{} colors for {} points",
                    colors.len(),
                    self.positions.len()
                ));
            }
        }
        Ok(())
    }
}

/// Geometry type of a source node, as reported by the loader.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum SourceGeometry {
    /// A pure container
    Group,
    Triangles(SourceMesh),
    Points(SourcePoints),
    /// Lights, cameras, helpers and anything else the core does not draw
    Other {
        #[serde(default)]
        label: Option<String>,
    },
}

impl Default for SourceGeometry {
    fn default() -> Self {
        SourceGeometry::Group
    }
}

/// One node of the parsed scene graph.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SourceNode {
    pub name: Option<String>,
    pub geometry: SourceGeometry,
    pub material: Option<Material>,
    pub properties: BTreeMap<String, serde_json::Value>,
    pub userdata: Option<EndpointMetadata>,
    pub visible: bool,
    pub selectable: bool,
    pub children: Vec<SourceNode>,
}

impl Default for SourceNode {
    fn default() -> Self {
        Self {
            name: None,
            geometry: SourceGeometry::Group,
            material: None,
            properties: BTreeMap::new(),
            userdata: None,
            visible: true,
            selectable: true,
            children: Vec::new(),
        }
    }
}

impl SourceNode {
    pub fn group(name: impl Into<String>, children: Vec<SourceNode>) -> Self {
        Self {
            name: Some(name.into()),
            children,
            ..Self::default()
        }
    }

    pub fn mesh(name: impl Into<String>, mesh: SourceMesh) -> Self {
        Self {
            name: Some(name.into()),
            geometry: SourceGeometry::Triangles(mesh),
            ..Self::default()
        }
    }

    pub fn points(name: impl Into<String>, points: SourcePoints) -> Self {
        Self {
            name: Some(name.into()),
            geometry: SourceGeometry::Points(points),
            ..Self::default()
        }
    }

    pub fn other(name: impl Into<String>) -> Self {
        Self {
            name: Some(name.into()),
            geometry: SourceGeometry::Other { label: None },
            ..Self::default()
        }
    }

    pub fn with_material(mut self, material: Material) -> Self {
        self.material = Some(material);
        self
    }

    pub fn with_property(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.properties.insert(key.into(), value);
        self
    }

    pub fn with_userdata(mut self, userdata: EndpointMetadata) -> Self {
        self.userdata = Some(userdata);
        self
    }

    pub fn with_selectable(mut self, selectable: bool) -> Self {
        self.selectable = selectable;
        self
    }

    pub fn with_visible(mut self, visible: bool) -> Self {
        self.visible = visible;
        self
    }

    /// Label used in error messages.
    pub fn display_name(&self) -> &str {
        self.name.as_deref().unwrap_or("<unnamed>")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_quad_is_two_triangles() {
        let quad = SourceMesh::quad([0.0, 0.0, 0.0], 1.0);
        assert_eq!(quad.triangle_count(), 2);
        assert!(quad.validate().is_ok());
        assert_eq!(quad.soup_positions().len(), 6);
    }

    #[test]
    fn test_validate_rejects_out_of_range_index() {
        let mesh = SourceMesh::new(vec![[0.0; 3], [1.0, 0.0, 0.0], [0.0, 1.0, 0.0]], Some(vec![0, 1, 3]));
        let err = mesh.validate().unwrap_err();
        assert!(err.contains("out of range"), "{err}");
    }

    #[test]
    fn test_validate_rejects_partial_triangle() {
        let mesh = SourceMesh::new(vec![[0.0; 3], [1.0, 0.0, 0.0]], None);
        assert!(mesh.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_short_attribute() {
        let mesh = SourceMesh::quad([0.0, 0.0, 0.0], 1.0)
            .with_attribute("uv", VertexAttribute::new(2, vec![0.0; 6]));
        let err = mesh.validate().unwrap_err();
        assert!(err.contains("uv"), "{err}");
    }

    #[test]
    fn test_points_color_count_checked() {
        let mut points = SourcePoints::new(vec![[0.0; 3], [1.0; 3]]);
        points.colors = Some(vec![[1.0, 0.0, 0.0]]);
        assert!(points.validate().is_err());
    }

    #[test]
    fn test_node_from_json() {
        let json = r#"{
            "name": "site",
            "children": [
                { "name": "slab", "geometry": { "type": "triangles",
                  "positions": [[0,0,0],[1,0,0],[0,1,0]] } },
                { "name": "scan", "geometry": { "type": "points",
                  "positions": [[0,0,1]] }, "selectable": false },
                { "name": "sun", "geometry": { "type": "other", "label": "light" } }
            ]
        }"#;
        let node: SourceNode = serde_json::from_str(json).unwrap();
        assert_eq!(node.geometry, SourceGeometry::Group);
        assert!(node.visible);
        assert_eq!(node.children.len(), 3);
        assert!(matches!(node.children[0].geometry, SourceGeometry::Triangles(_)));
        assert!(!node.children[1].selectable);
        assert!(matches!(
            node.children[2].geometry,
            SourceGeometry::Other { label: Some(_) }
        ));
    }
}
