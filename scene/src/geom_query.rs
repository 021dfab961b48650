use cgmath::Point3;

use crate::common::Ray;
use crate::entity::{EntityId, ModelId};
use crate::index::EntityIndex;

/// Result of a ray hit against a model's collision buffer.
#[derive(Debug, Clone, PartialEq)]
pub struct RayPickResult {
    /// The leaf entity whose triangle was hit
    pub entity: EntityId,
    pub model: ModelId,
    /// Slot of the entity in its model's merger
    pub slot: u32,
    /// Distance along the ray to the hit point
    pub distance: f32,
    /// World-space hit location
    pub hit_point: Point3<f32>,
}

/// Casts `ray` against every pickable model in `index` and returns all hits
/// on visible, selectable entities, sorted by distance (closest first).
///
/// Scope filtering is left to the caller.
pub fn pick_all_from_ray(ray: &Ray, index: &EntityIndex) -> Vec<RayPickResult> {
    let mut results = Vec::new();

    for model in index.models() {
        if model
            .bounds()
            .is_some_and(|bounds| bounds.intersects_ray(ray).is_none())
        {
            continue;
        }

        for hit in model.intersect_ray(ray) {
            let Some(entity) = model.entity(hit.entity) else {
                log::error!(
                    "invariant violated: model {} hit entity {} it does not own",
                    model.id(),
                    hit.entity
                );
                continue;
            };
            if !entity.is_visible() || !entity.is_selectable() {
                continue;
            }

            results.push(RayPickResult {
                entity: hit.entity,
                model: model.id(),
                slot: hit.slot,
                distance: hit.distance,
                hit_point: hit.point,
            });
        }
    }

    results.sort_by(|a, b| a.distance.total_cmp(&b.distance));
    results
}
