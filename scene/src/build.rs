//! Entity-tree construction from a parsed source scene.

use std::collections::HashMap;

use crate::entity::{Entity, EntityId, EntityKind, EntityPayload, ModelId, Visibility};
use crate::error::ImportError;
use crate::material::Material;
use crate::source::{SourceGeometry, SourceNode};
use crate::tree::EntityTree;

/// Hands out entity and model ids. Ids are monotonically increasing and never
/// reused, including ids burned by a failed import.
#[derive(Debug, Clone)]
pub struct IdGenerator {
    next_entity: EntityId,
    next_model: ModelId,
}

impl Default for IdGenerator {
    fn default() -> Self {
        Self::new()
    }
}

impl IdGenerator {
    pub fn new() -> Self {
        Self {
            next_entity: 1,
            next_model: 1,
        }
    }

    pub fn next_entity_id(&mut self) -> EntityId {
        let id = self.next_entity;
        self.next_entity += 1;
        id
    }

    pub fn next_model_id(&mut self) -> ModelId {
        let id = self.next_model;
        self.next_model += 1;
        id
    }
}

type Classifier = fn(&SourceGeometry) -> bool;

/// Classification policy, checked in order. The first matching row wins.
const CLASSIFICATION: [(Classifier, EntityKind); 3] = [
    (|g| matches!(g, SourceGeometry::Group), EntityKind::Group),
    (
        |g| matches!(g, SourceGeometry::Triangles(mesh) if mesh.triangle_count() > 0),
        EntityKind::Mesh,
    ),
    (
        |g| matches!(g, SourceGeometry::Points(points) if !points.positions.is_empty()),
        EntityKind::PointCloud,
    ),
];

/// Maps a source geometry type to its logical kind. Empty meshes and point
/// sets are not drawable and fall through to [`EntityKind::Default`].
pub fn classify(geometry: &SourceGeometry) -> EntityKind {
    CLASSIFICATION
        .iter()
        .find(|(matches, _)| matches(geometry))
        .map(|&(_, kind)| kind)
        .unwrap_or(EntityKind::Default)
}

/// Builds the entity arena for one model.
///
/// Ids are assigned top-down in pre-order, so a parent always has a smaller id
/// than its children. Bounds are computed bottom-up once the arena is complete.
/// Any malformed node aborts the whole build.
pub fn build_entity_tree(
    model: ModelId,
    root: SourceNode,
    ids: &mut IdGenerator,
) -> Result<EntityTree, ImportError> {
    let mut entities = HashMap::new();
    let root_id = build_entity(model, root, None, ids, &mut entities)?;

    let mut tree = EntityTree::from_parts(entities, root_id);
    tree.recompute_bounds(root_id);
    Ok(tree)
}

fn build_entity(
    model: ModelId,
    source: SourceNode,
    parent: Option<EntityId>,
    ids: &mut IdGenerator,
    entities: &mut HashMap<EntityId, Entity>,
) -> Result<EntityId, ImportError> {
    let kind = classify(&source.geometry);
    let malformed = |reason: String| ImportError::MalformedGeometry {
        node: source.display_name().to_string(),
        reason,
    };

    match &source.geometry {
        SourceGeometry::Triangles(mesh) => mesh.validate().map_err(malformed)?,
        SourceGeometry::Points(points) => points.validate().map_err(malformed)?,
        SourceGeometry::Group | SourceGeometry::Other { .. } => {}
    }

    let id = ids.next_entity_id();

    let SourceNode {
        name,
        geometry,
        material,
        properties,
        userdata,
        visible,
        selectable,
        children,
    } = source;

    let payload = match (kind, geometry) {
        (EntityKind::Mesh, SourceGeometry::Triangles(mesh)) => EntityPayload::Mesh(mesh),
        (EntityKind::PointCloud, SourceGeometry::Points(points)) => EntityPayload::PointCloud(points),
        (EntityKind::Group, _) => EntityPayload::Group,
        _ => EntityPayload::Default,
    };

    let default_material = kind
        .capabilities()
        .owns_material
        .then(|| material.unwrap_or_else(Material::fallback));

    let mut child_ids = Vec::with_capacity(children.len());
    for child in children {
        child_ids.push(build_entity(model, child, Some(id), ids, entities)?);
    }

    let entity = Entity {
        id,
        model,
        kind,
        name,
        parent,
        children: child_ids,
        bounds: None,
        visibility: if visible {
            Visibility::Visible
        } else {
            Visibility::Invisible
        },
        selectable,
        enabled: true,
        selected: false,
        properties,
        userdata,
        current_material: default_material.clone(),
        default_material,
        payload,
    };
    entities.insert(id, entity);

    Ok(id)
}
