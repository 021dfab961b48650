//! Ray picking against every loaded model, resolved to the current scope.

use std::collections::HashSet;

use crate::camera::{Camera, Viewport};
use crate::common::Ray;
use crate::navigation::Scope;
use crate::scene::{pick_all_from_ray, EntityId, EntityIndex, RayPickResult};

/// A resolved pick.
#[derive(Debug, Clone, PartialEq)]
pub struct PickHit {
    /// The entity that receives the pick at the current scope
    pub entity: EntityId,
    /// The leaf that was actually hit
    pub raw: RayPickResult,
}

/// Turns pointer positions into entity ids.
///
/// Queries are pure: picking never changes scene or selection state.
#[derive(Debug, Clone, Default)]
pub struct PickResolver {
    custom_scope: Option<HashSet<EntityId>>,
}

impl PickResolver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Restricts resolution to exact membership in `ids`, with no walk-up.
    /// `None` restores scope-based resolution.
    pub fn set_custom_scope(&mut self, ids: Option<Vec<EntityId>>) {
        self.custom_scope = ids.map(|ids| ids.into_iter().collect());
    }

    pub fn custom_scope(&self) -> Option<&HashSet<EntityId>> {
        self.custom_scope.as_ref()
    }

    /// Picks through a pixel position.
    pub fn pick(
        &self,
        index: &EntityIndex,
        scope: Scope,
        camera: &Camera,
        viewport: Viewport,
        position: (f32, f32),
    ) -> Option<PickHit> {
        let ray = camera.ray_from_screen(position.0, position.1, viewport)?;
        self.pick_ray(index, scope, &ray)
    }

    /// Picks along a world-space ray.
    ///
    /// The nearest visible, selectable hit wins. Without a custom scope, hits
    /// on entities disabled by navigation are discarded as well.
    pub fn pick_ray(&self, index: &EntityIndex, scope: Scope, ray: &Ray) -> Option<PickHit> {
        let nearest = pick_all_from_ray(ray, index).into_iter().find(|hit| {
            self.custom_scope.is_some()
                || index.entity(hit.entity).is_some_and(|e| e.is_enabled())
        })?;

        let entity = self.resolve(index, scope, nearest.entity)?;
        Some(PickHit { entity, raw: nearest })
    }

    /// Maps a raw hit entity to the entity that should receive the pick.
    pub fn resolve(&self, index: &EntityIndex, scope: Scope, hit: EntityId) -> Option<EntityId> {
        if let Some(custom) = &self.custom_scope {
            let resolved = custom.contains(&hit).then_some(hit);
            if resolved.is_none() {
                log::trace!("entity {hit} is outside the custom pick scope");
            }
            return resolved;
        }

        let mut candidate = hit;
        loop {
            let entity = index.entity(candidate)?;
            let parent = entity.parent();
            let reached = match scope {
                Scope::World => parent.is_none(),
                Scope::Group(group) => parent == Some(group),
            };
            if reached {
                return Some(candidate);
            }

            match parent {
                Some(parent) => candidate = parent,
                None => {
                    log::trace!("entity {hit} does not resolve inside scope {scope:?}");
                    return None;
                }
            }
        }
    }
}
