//! Union-mesh builder: merges every mesh leaf of a subtree into a few draw
//! buffers, a hard-edge outline buffer and a collision buffer with a BVH.
//!
//! Each mesh leaf owns one slot. Slot `i` refers to the same entity in the
//! draw groups, the outline groups, the collision owner tags and the material
//! arrays, so per-entity state can be changed without touching topology.

mod collision;
mod normalize;
mod outline;

use std::collections::{BTreeMap, HashMap};

use cgmath::Point3;
use serde::{Deserialize, Serialize};

use crate::bvh::Bvh;
use crate::common::{Aabb, Ray, RgbaColor};
use crate::entity::{EntityId, EntityKind};
use crate::error::{invariant, MergeError};
use crate::material::Material;
use crate::source::VertexAttribute;
use crate::tree::EntityTree;

/// What to do with vertex attributes that only some leaves carry.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum AttributePolicy {
    /// Remove the attribute from the merged buffer and log a warning.
    #[default]
    Drop,
    /// Abort the merge with [`MergeError::AttributeMismatch`].
    Fail,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MergeOptions {
    pub attribute_policy: AttributePolicy,
    /// Minimum angle between adjacent faces for their shared edge to be outlined.
    pub outline_threshold_degrees: f32,
    /// Vertex budget per render fragment. A leaf is never split, so a single
    /// leaf above the budget gets a fragment of its own.
    pub max_fragment_vertices: usize,
    /// Grid size for collision-buffer vertex clustering. `None` keeps full detail.
    pub collision_cell_size: Option<f32>,
    pub max_leaf_triangles: usize,
}

impl Default for MergeOptions {
    fn default() -> Self {
        Self {
            attribute_policy: AttributePolicy::Drop,
            outline_threshold_degrees: 1.0,
            max_fragment_vertices: u16::MAX as usize,
            collision_cell_size: None,
            max_leaf_triangles: 4,
        }
    }
}

/// A contiguous vertex range of one slot inside a buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DrawGroup {
    pub start: u32,
    pub count: u32,
    pub slot: u32,
}

/// One merged non-indexed triangle buffer.
#[derive(Debug, Clone, Default)]
pub struct Fragment {
    positions: Vec<[f32; 3]>,
    normals: Vec<[f32; 3]>,
    attributes: BTreeMap<String, VertexAttribute>,
    groups: Vec<DrawGroup>,
}

impl Fragment {
    pub fn positions(&self) -> &[[f32; 3]] {
        &self.positions
    }

    pub fn normals(&self) -> &[[f32; 3]] {
        &self.normals
    }

    pub fn attributes(&self) -> &BTreeMap<String, VertexAttribute> {
        &self.attributes
    }

    pub fn groups(&self) -> &[DrawGroup] {
        &self.groups
    }

    pub fn vertex_count(&self) -> usize {
        self.positions.len()
    }

    pub fn position_bytes(&self) -> &[u8] {
        bytemuck::cast_slice(&self.positions)
    }

    pub fn normal_bytes(&self) -> &[u8] {
        bytemuck::cast_slice(&self.normals)
    }

    /// Recomputes flat vertex normals over the whole fragment.
    fn compute_normals(&mut self) {
        self.normals = self
            .positions
            .chunks_exact(3)
            .flat_map(|tri| {
                let n = outline::face_normal(tri).map_or([0.0, 0.0, 0.0], |n| [n.x, n.y, n.z]);
                [n; 3]
            })
            .collect();
    }
}

/// Line-list buffer of hard edges, grouped by slot.
#[derive(Debug, Clone, Default)]
pub struct OutlineBuffer {
    positions: Vec<[f32; 3]>,
    groups: Vec<DrawGroup>,
}

impl OutlineBuffer {
    pub fn positions(&self) -> &[[f32; 3]] {
        &self.positions
    }

    pub fn groups(&self) -> &[DrawGroup] {
        &self.groups
    }

    pub fn is_empty(&self) -> bool {
        self.positions.is_empty()
    }

    pub fn position_bytes(&self) -> &[u8] {
        bytemuck::cast_slice(&self.positions)
    }
}

/// Position-only triangle soup used for picking. Every vertex carries the slot
/// of the leaf it came from.
#[derive(Debug, Clone, Default)]
pub struct CollisionBuffer {
    positions: Vec<[f32; 3]>,
    owners: Vec<u32>,
    bvh: Bvh,
}

impl CollisionBuffer {
    pub fn positions(&self) -> &[[f32; 3]] {
        &self.positions
    }

    pub fn owners(&self) -> &[u32] {
        &self.owners
    }

    pub fn bvh(&self) -> &Bvh {
        &self.bvh
    }

    pub fn triangle_count(&self) -> usize {
        self.positions.len() / 3
    }

    pub fn owner_bytes(&self) -> &[u8] {
        bytemuck::cast_slice(&self.owners)
    }
}

/// A collision-buffer hit mapped back to its entity.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MergeHit {
    pub entity: EntityId,
    pub slot: u32,
    pub distance: f32,
    pub point: Point3<f32>,
    pub triangle: u32,
}

#[derive(Debug, Clone)]
pub struct SpatialMerger {
    id_map: Vec<EntityId>,
    slots: HashMap<EntityId, u32>,
    fragments: Vec<Fragment>,
    outline: OutlineBuffer,
    collision: CollisionBuffer,
    materials: Vec<Material>,
    outline_materials: Vec<Material>,
    slot_visible: Vec<bool>,
    dropped_attributes: Vec<String>,
    bounds: Option<Aabb>,
}

impl SpatialMerger {
    /// Material used for outlines until a slot is recolored.
    pub fn default_outline_material() -> Material {
        Material::new(RgbaColor::BLACK).with_name("outline")
    }

    /// Merges every mesh leaf under `root`, in pre-order.
    pub fn build(
        tree: &EntityTree,
        root: EntityId,
        options: &MergeOptions,
    ) -> Result<Self, MergeError> {
        let mut leaves = Vec::new();
        for id in tree.preorder(root) {
            let Some(entity) = tree.get(id) else {
                return Err(invariant(format!("entity {id} missing from its own tree")));
            };
            if entity.kind() != EntityKind::Mesh {
                continue;
            }
            let Some(mesh) = entity.mesh() else {
                return Err(invariant(format!("mesh entity {id} has no mesh payload")));
            };
            leaves.push((id, mesh));
        }

        if leaves.is_empty() {
            return Err(MergeError::Empty);
        }

        let common = normalize::common_attributes(&leaves, options.attribute_policy)?;

        let mut merger = Self {
            id_map: Vec::with_capacity(leaves.len()),
            slots: HashMap::with_capacity(leaves.len()),
            fragments: Vec::new(),
            outline: OutlineBuffer::default(),
            collision: CollisionBuffer::default(),
            materials: Vec::with_capacity(leaves.len()),
            outline_materials: Vec::with_capacity(leaves.len()),
            slot_visible: Vec::with_capacity(leaves.len()),
            dropped_attributes: common.dropped,
            bounds: None,
        };

        let mut fragment = Fragment::default();
        for (slot, &(id, mesh)) in leaves.iter().enumerate() {
            let slot = slot as u32;
            let Some(entity) = tree.get(id) else {
                return Err(invariant(format!("entity {id} missing from its own tree")));
            };

            merger.id_map.push(id);
            merger.slots.insert(id, slot);
            merger
                .materials
                .push(entity.current_material().cloned().unwrap_or_else(Material::fallback));
            merger.outline_materials.push(Self::default_outline_material());
            merger.slot_visible.push(entity.is_visible());
            merger.bounds = Aabb::merge_opt(merger.bounds, mesh.bounds());

            let soup_indices = mesh.soup_indices();
            let soup: Vec<[f32; 3]> = soup_indices
                .iter()
                .map(|&i| mesh.positions[i as usize])
                .collect();

            // Start a new fragment when this leaf would overflow the current one
            if !fragment.positions.is_empty()
                && fragment.positions.len() + soup.len() > options.max_fragment_vertices
            {
                merger.fragments.push(std::mem::take(&mut fragment));
            }

            fragment.groups.push(DrawGroup {
                start: fragment.positions.len() as u32,
                count: soup.len() as u32,
                slot,
            });
            fragment.positions.extend_from_slice(&soup);
            for (name, &item_size) in &common.kept {
                let Some(source) = mesh.attributes.get(name) else {
                    return Err(invariant(format!("entity {id} lost attribute '{name}'")));
                };
                let merged = fragment
                    .attributes
                    .entry(name.clone())
                    .or_insert_with(|| VertexAttribute::new(item_size, Vec::new()));
                for &i in &soup_indices {
                    merged.values.extend_from_slice(source.item(i as usize));
                }
            }

            let edges = outline::hard_edges(&soup, options.outline_threshold_degrees);
            merger.outline.groups.push(DrawGroup {
                start: merger.outline.positions.len() as u32,
                count: edges.len() as u32,
                slot,
            });
            merger.outline.positions.extend(edges);

            collision::append_leaf(
                &soup,
                slot,
                options.collision_cell_size,
                &mut merger.collision.positions,
                &mut merger.collision.owners,
            );
        }

        if !fragment.positions.is_empty() || merger.fragments.is_empty() {
            merger.fragments.push(fragment);
        }
        for fragment in &mut merger.fragments {
            fragment.compute_normals();
        }

        merger.collision.bvh = Bvh::build(&merger.collision.positions, options.max_leaf_triangles);

        log::debug!(
            "merged {} leaves into {} fragment(s), {} outline vertices, {} collision triangles",
            merger.id_map.len(),
            merger.fragments.len(),
            merger.outline.positions.len(),
            merger.collision.triangle_count()
        );

        Ok(merger)
    }

    /// Slot-indexed entity ids.
    pub fn id_map(&self) -> &[EntityId] {
        &self.id_map
    }

    pub fn slot_count(&self) -> usize {
        self.id_map.len()
    }

    pub fn slot_of(&self, entity: EntityId) -> Option<u32> {
        self.slots.get(&entity).copied()
    }

    pub fn entity_at(&self, slot: u32) -> Option<EntityId> {
        self.id_map.get(slot as usize).copied()
    }

    pub fn contains_entity(&self, entity: EntityId) -> bool {
        self.slots.contains_key(&entity)
    }

    pub fn fragments(&self) -> &[Fragment] {
        &self.fragments
    }

    pub fn outline(&self) -> &OutlineBuffer {
        &self.outline
    }

    pub fn collision(&self) -> &CollisionBuffer {
        &self.collision
    }

    pub fn bounds(&self) -> Option<Aabb> {
        self.bounds
    }

    /// Attributes removed by normalization, sorted by name.
    pub fn dropped_attributes(&self) -> &[String] {
        &self.dropped_attributes
    }

    /// Slot-indexed surface materials.
    pub fn materials(&self) -> &[Material] {
        &self.materials
    }

    /// Slot-indexed outline materials.
    pub fn outline_materials(&self) -> &[Material] {
        &self.outline_materials
    }

    pub fn material_for_entity(&self, entity: EntityId) -> Option<&Material> {
        self.slot_of(entity)
            .and_then(|slot| self.materials.get(slot as usize))
    }

    pub fn outline_material_for_entity(&self, entity: EntityId) -> Option<&Material> {
        self.slot_of(entity)
            .and_then(|slot| self.outline_materials.get(slot as usize))
    }

    /// Writes `material` into the entity's slot. Returns `false` if the entity
    /// has no slot.
    pub fn set_material_for_entity(&mut self, entity: EntityId, material: Material) -> bool {
        match self.slot_of(entity) {
            Some(slot) => {
                self.materials[slot as usize] = material;
                true
            }
            None => false,
        }
    }

    pub fn set_outline_material_for_entity(&mut self, entity: EntityId, material: Material) -> bool {
        match self.slot_of(entity) {
            Some(slot) => {
                self.outline_materials[slot as usize] = material;
                true
            }
            None => false,
        }
    }

    /// Marks the slot drawn or skipped. Returns `false` if the entity has no slot.
    pub fn set_visibility_for_entity(&mut self, entity: EntityId, visible: bool) -> bool {
        match self.slot_of(entity) {
            Some(slot) => {
                self.slot_visible[slot as usize] = visible;
                true
            }
            None => false,
        }
    }

    pub fn is_slot_visible(&self, slot: u32) -> bool {
        self.slot_visible.get(slot as usize).copied().unwrap_or(false)
    }

    /// Every collision triangle the ray hits, mapped to its entity. Unordered,
    /// unfiltered: callers decide which entities may be picked.
    pub fn intersect_ray(&self, ray: &Ray) -> Vec<MergeHit> {
        let collision = &self.collision;
        collision
            .bvh
            .intersect_all(ray, &collision.positions)
            .into_iter()
            .filter_map(|hit| {
                let Some(&slot) = collision.owners.get(hit.triangle as usize * 3) else {
                    log::error!("invariant violated: triangle {} has no owner", hit.triangle);
                    return None;
                };
                let Some(entity) = self.entity_at(slot) else {
                    log::error!("invariant violated: slot {slot} missing from id map");
                    return None;
                };
                Some(MergeHit {
                    entity,
                    slot,
                    distance: hit.distance,
                    point: ray.point_at(hit.distance),
                    triangle: hit.triangle,
                })
            })
            .collect()
    }
}
