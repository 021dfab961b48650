use std::collections::HashMap;

use crate::common::Aabb;
use crate::entity::{EffectiveVisibility, Entity, EntityId, EntityKind, Visibility};

/// Callbacks for a depth-first walk over an [`EntityTree`].
pub trait TreeVisitor {
    /// Called before the entity's children. Return `false` to skip the subtree.
    fn enter_entity(&mut self, entity: &Entity) -> bool;

    /// Called after the entity's children.
    fn exit_entity(&mut self, _entity: &Entity) {}
}

/// Walks the tree depth-first from `id`, children in insertion order.
pub fn walk_tree<V: TreeVisitor>(tree: &EntityTree, id: EntityId, visitor: &mut V) {
    let Some(entity) = tree.get(id) else {
        return;
    };

    if visitor.enter_entity(entity) {
        for &child in entity.children() {
            walk_tree(tree, child, visitor);
        }
    }

    visitor.exit_entity(entity);
}

/// Collects ids in pre-order, optionally filtered by kind.
struct PreorderCollector {
    kind: Option<EntityKind>,
    ids: Vec<EntityId>,
}

impl TreeVisitor for PreorderCollector {
    fn enter_entity(&mut self, entity: &Entity) -> bool {
        if self.kind.map_or(true, |kind| entity.kind() == kind) {
            self.ids.push(entity.id());
        }
        true
    }
}

/// Arena holding every entity of one model.
///
/// The parent exclusively owns its children through the arena; `parent` links
/// are plain ids, so there are no reference cycles.
#[derive(Debug, Clone)]
pub struct EntityTree {
    entities: HashMap<EntityId, Entity>,
    root: EntityId,
}

impl EntityTree {
    pub(crate) fn from_parts(entities: HashMap<EntityId, Entity>, root: EntityId) -> Self {
        Self { entities, root }
    }

    pub fn root(&self) -> EntityId {
        self.root
    }

    pub fn get(&self, id: EntityId) -> Option<&Entity> {
        self.entities.get(&id)
    }

    pub(crate) fn get_mut(&mut self, id: EntityId) -> Option<&mut Entity> {
        self.entities.get_mut(&id)
    }

    pub fn contains(&self, id: EntityId) -> bool {
        self.entities.contains_key(&id)
    }

    pub fn len(&self) -> usize {
        self.entities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }

    /// All entities, in no particular order.
    pub fn iter(&self) -> impl Iterator<Item = &Entity> {
        self.entities.values()
    }

    pub fn ids(&self) -> impl Iterator<Item = EntityId> + '_ {
        self.entities.keys().copied()
    }

    /// Ids of `id` and its descendants in depth-first pre-order.
    pub fn preorder(&self, id: EntityId) -> Vec<EntityId> {
        let mut collector = PreorderCollector {
            kind: None,
            ids: Vec::new(),
        };
        walk_tree(self, id, &mut collector);
        collector.ids
    }

    /// Ids of all entities of `kind`, in deterministic traversal order.
    pub fn entities_of_kind(&self, kind: EntityKind) -> Vec<EntityId> {
        let mut collector = PreorderCollector {
            kind: Some(kind),
            ids: Vec::new(),
        };
        walk_tree(self, self.root, &mut collector);
        collector.ids
    }

    /// Parent chain of `id`, nearest first, excluding `id` itself.
    pub fn ancestors(&self, id: EntityId) -> Ancestors<'_> {
        Ancestors {
            tree: self,
            next: self.get(id).and_then(Entity::parent),
        }
    }

    /// True if `ancestor` is `id` or one of its ancestors.
    pub fn is_in_subtree(&self, ancestor: EntityId, id: EntityId) -> bool {
        id == ancestor || self.ancestors(id).any(|a| a == ancestor)
    }

    /// Explicit visibility of the subtree as a whole.
    pub fn effective_visibility(&self, id: EntityId) -> Option<EffectiveVisibility> {
        let entity = self.get(id)?;
        if !entity.is_visible() {
            return Some(EffectiveVisibility::Invisible);
        }
        let all_visible = self
            .preorder(id)
            .into_iter()
            .filter_map(|d| self.get(d))
            .all(Entity::is_visible);
        Some(if all_visible {
            EffectiveVisibility::Visible
        } else {
            EffectiveVisibility::Mixed
        })
    }

    /// Recomputes bounds for the whole subtree under `id`, bottom-up.
    pub(crate) fn recompute_bounds(&mut self, id: EntityId) -> Option<Aabb> {
        let entity = self.get(id)?;
        let children = entity.children().to_vec();

        let mut bounds = entity.payload().bounds();
        for child in children {
            let child_bounds = self.recompute_bounds(child);
            if self.get(child).is_some_and(Entity::is_visible) {
                bounds = Aabb::merge_opt(bounds, child_bounds);
            }
        }

        if let Some(entity) = self.get_mut(id) {
            entity.bounds = bounds;
        }
        bounds
    }

    /// Recomputes the bounds of every ancestor of `id` from their children.
    pub(crate) fn refresh_ancestor_bounds(&mut self, id: EntityId) {
        let ancestors: Vec<EntityId> = self.ancestors(id).collect();
        for ancestor in ancestors {
            let Some(entity) = self.get(ancestor) else {
                continue;
            };
            let bounds = entity
                .children()
                .iter()
                .filter_map(|&c| self.get(c))
                .filter(|c| c.is_visible())
                .fold(entity.payload().bounds(), |acc, c| Aabb::merge_opt(acc, c.bounds()));
            if let Some(entity) = self.get_mut(ancestor) {
                entity.bounds = bounds;
            }
        }
    }

    /// Sets visibility on `id` and every descendant. Returns the touched ids.
    pub(crate) fn set_visibility_recursive(
        &mut self,
        id: EntityId,
        visibility: Visibility,
    ) -> Vec<EntityId> {
        let ids = self.preorder(id);
        for &d in &ids {
            if let Some(entity) = self.get_mut(d) {
                entity.visibility = visibility;
            }
        }
        ids
    }

    /// Sets the scope-enabled flag on `id` and every descendant.
    pub(crate) fn set_enabled_recursive(&mut self, id: EntityId, enabled: bool) {
        for d in self.preorder(id) {
            if let Some(entity) = self.get_mut(d) {
                entity.enabled = enabled;
            }
        }
    }

    /// Checks that every entity's bounds contain the bounds of its visible
    /// children.
    pub fn bounds_invariant_holds(&self) -> bool {
        self.iter().all(|entity| {
            entity
                .children()
                .iter()
                .filter_map(|&c| self.get(c))
                .filter(|c| c.is_visible())
                .all(|child| match (entity.bounds(), child.bounds()) {
                    (_, None) => true,
                    (Some(parent), Some(child)) => parent.contains_aabb(&child),
                    (None, Some(_)) => false,
                })
        })
    }
}

/// Iterator over a parent chain.
pub struct Ancestors<'a> {
    tree: &'a EntityTree,
    next: Option<EntityId>,
}

impl Iterator for Ancestors<'_> {
    type Item = EntityId;

    fn next(&mut self) -> Option<EntityId> {
        let current = self.next?;
        self.next = self.tree.get(current).and_then(Entity::parent);
        Some(current)
    }
}
