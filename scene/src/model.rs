use crate::build::{build_entity_tree, IdGenerator};
use crate::common::{Aabb, Ray};
use crate::entity::{Entity, EntityId, EntityKind, ModelId, Visibility};
use crate::error::{ImportError, MergeError};
use crate::material::Material;
use crate::merge::{MergeHit, MergeOptions, SpatialMerger};
use crate::source::SourceNode;
use crate::tree::EntityTree;

pub type RenderObjectId = u32;

/// What a render object handed to the renderer draws.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RenderObjectKind {
    /// Fragment `n` of the model's merged triangle buffer.
    MergedFragment(usize),
    MergedOutline,
    /// A point cloud drawn on its own, never merged.
    PointCloud(EntityId),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RenderObject {
    pub id: RenderObjectId,
    pub model: ModelId,
    pub kind: RenderObjectKind,
}

/// The external renderer's scene. Receives the objects a model contributes.
pub trait SceneSink {
    fn on_objects_added(&mut self, objects: &[RenderObject]);
    fn on_objects_removed(&mut self, objects: &[RenderObject]);

    /// A re-imported model swaps `old` for `new`. Sinks that keep their
    /// objects in order should put `new` where `old` was. Defaults to a
    /// removal followed by an addition.
    fn on_objects_replaced(&mut self, old: &[RenderObject], new: &[RenderObject]) {
        self.on_objects_removed(old);
        self.on_objects_added(new);
    }
}

/// A sink that ignores everything, for headless sessions.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullSink;

impl SceneSink for NullSink {
    fn on_objects_added(&mut self, _objects: &[RenderObject]) {}
    fn on_objects_removed(&mut self, _objects: &[RenderObject]) {}
}

/// Materials applied to selected entities.
#[derive(Debug, Clone, PartialEq)]
pub struct Highlight {
    pub surface: Material,
    pub outline: Material,
}

impl Default for Highlight {
    fn default() -> Self {
        Self {
            surface: Material::highlight(crate::common::RgbaColor::ORANGE),
            outline: Material::highlight(crate::common::RgbaColor::MAGENTA),
        }
    }
}

/// One imported scene: its entity tree, its merged pick surface and the render
/// objects it contributed.
#[derive(Debug)]
pub struct ModelContainer {
    id: ModelId,
    tree: EntityTree,
    merger: Option<SpatialMerger>,
    render_objects: Vec<RenderObject>,
    next_render_object_id: RenderObjectId,
    attached: bool,
}

/// Tree and merger built for a model before anything is installed.
struct Built {
    tree: EntityTree,
    merger: Option<SpatialMerger>,
}

fn build(
    model: ModelId,
    source: SourceNode,
    ids: &mut IdGenerator,
    options: &MergeOptions,
) -> Result<Built, ImportError> {
    let tree = build_entity_tree(model, source, ids)?;
    let merger = match SpatialMerger::build(&tree, tree.root(), options) {
        Ok(merger) => Some(merger),
        Err(MergeError::Empty) => {
            log::info!("model {model} has no mesh leaves; it will not be pickable");
            None
        }
        Err(err) => return Err(err.into()),
    };
    Ok(Built { tree, merger })
}

impl ModelContainer {
    /// Builds a model from a source scene. Nothing is shared with any other
    /// model until the container is added to an index.
    pub fn import(
        id: ModelId,
        source: SourceNode,
        ids: &mut IdGenerator,
        options: &MergeOptions,
    ) -> Result<Self, ImportError> {
        let Built { tree, merger } = build(id, source, ids, options)?;
        let mut container = Self {
            id,
            tree,
            merger,
            render_objects: Vec::new(),
            next_render_object_id: 1,
            attached: false,
        };
        container.render_objects = container.collect_render_objects();
        Ok(container)
    }

    pub fn id(&self) -> ModelId {
        self.id
    }

    pub fn tree(&self) -> &EntityTree {
        &self.tree
    }

    pub fn root(&self) -> EntityId {
        self.tree.root()
    }

    pub fn entity(&self, id: EntityId) -> Option<&Entity> {
        self.tree.get(id)
    }

    pub fn merger(&self) -> Option<&SpatialMerger> {
        self.merger.as_ref()
    }

    /// True if the model has a merged pick surface.
    pub fn is_pickable(&self) -> bool {
        self.merger.is_some()
    }

    pub fn bounds(&self) -> Option<Aabb> {
        self.tree.get(self.tree.root()).and_then(Entity::bounds)
    }

    pub fn render_objects(&self) -> &[RenderObject] {
        &self.render_objects
    }

    pub fn is_attached(&self) -> bool {
        self.attached
    }

    pub fn intersect_ray(&self, ray: &Ray) -> Vec<MergeHit> {
        self.merger
            .as_ref()
            .map(|merger| merger.intersect_ray(ray))
            .unwrap_or_default()
    }

    fn collect_render_objects(&mut self) -> Vec<RenderObject> {
        let mut kinds = Vec::new();
        if let Some(merger) = &self.merger {
            kinds.extend((0..merger.fragments().len()).map(RenderObjectKind::MergedFragment));
            if !merger.outline().is_empty() {
                kinds.push(RenderObjectKind::MergedOutline);
            }
        }
        kinds.extend(
            self.tree
                .preorder(self.tree.root())
                .into_iter()
                .filter(|&id| {
                    self.tree
                        .get(id)
                        .is_some_and(|e| e.capabilities().renders_standalone)
                })
                .map(RenderObjectKind::PointCloud),
        );

        kinds
            .into_iter()
            .map(|kind| {
                let id = self.next_render_object_id;
                self.next_render_object_id += 1;
                RenderObject {
                    id,
                    model: self.id,
                    kind,
                }
            })
            .collect()
    }

    /// Hands this model's render objects to the renderer.
    pub fn attach(&mut self, sink: &mut dyn SceneSink) {
        if self.attached {
            return;
        }
        sink.on_objects_added(&self.render_objects);
        self.attached = true;
    }

    /// Withdraws every render object this model contributed.
    pub fn detach(&mut self, sink: &mut dyn SceneSink) {
        if !self.attached {
            return;
        }
        sink.on_objects_removed(&self.render_objects);
        self.attached = false;
    }

    /// Replaces the tree and merger with ones built from `source`, keeping the
    /// container's identity. The new state is built completely before anything
    /// is swapped, so on error the model is unchanged. Returns the replaced tree.
    pub fn reimport(
        &mut self,
        source: SourceNode,
        ids: &mut IdGenerator,
        options: &MergeOptions,
        sink: &mut dyn SceneSink,
    ) -> Result<EntityTree, ImportError> {
        let Built { tree, merger } = build(self.id, source, ids, options)?;

        let old_tree = std::mem::replace(&mut self.tree, tree);
        self.merger = merger;
        let old_objects = std::mem::take(&mut self.render_objects);
        self.render_objects = self.collect_render_objects();

        if self.attached {
            sink.on_objects_replaced(&old_objects, &self.render_objects);
        }
        Ok(old_tree)
    }

    /// Sets the selected flag on `id` and refreshes the materials of its
    /// subtree. A drawable shows `highlight` while it or any ancestor is
    /// selected, and its default material otherwise.
    pub fn set_selected(&mut self, id: EntityId, selected: bool, highlight: &Highlight) -> bool {
        let Some(entity) = self.tree.get_mut(id) else {
            return false;
        };
        entity.selected = selected;

        for d in self.tree.preorder(id) {
            let Some(entity) = self.tree.get(d) else {
                continue;
            };
            if !entity.capabilities().owns_material {
                continue;
            }
            let kind = entity.kind();
            let highlighted =
                entity.is_selected() || self.tree.ancestors(d).any(|a| self.is_selected(a));
            let material = if highlighted {
                highlight.surface.clone()
            } else {
                entity.default_material().cloned().unwrap_or_else(Material::fallback)
            };

            if kind == EntityKind::Mesh {
                if let Some(merger) = &mut self.merger {
                    let outline = if highlighted {
                        highlight.outline.clone()
                    } else {
                        SpatialMerger::default_outline_material()
                    };
                    if !merger.set_material_for_entity(d, material.clone()) {
                        log::error!("invariant violated: mesh entity {d} has no merger slot");
                    }
                    merger.set_outline_material_for_entity(d, outline);
                }
            }
            if let Some(entity) = self.tree.get_mut(d) {
                entity.current_material = Some(material);
            }
        }
        true
    }

    fn is_selected(&self, id: EntityId) -> bool {
        self.tree.get(id).is_some_and(Entity::is_selected)
    }

    /// Sets visibility on `id` and its subtree, refreshes bounds up to the
    /// root and mirrors the change into the merger's slots. Returns the ids
    /// that changed.
    pub fn set_visibility(&mut self, id: EntityId, visibility: Visibility) -> Vec<EntityId> {
        if !self.tree.contains(id) {
            return Vec::new();
        }

        let touched = self.tree.set_visibility_recursive(id, visibility);
        self.tree.recompute_bounds(id);
        self.tree.refresh_ancestor_bounds(id);

        if let Some(merger) = &mut self.merger {
            let visible = visibility == Visibility::Visible;
            for &d in &touched {
                merger.set_visibility_for_entity(d, visible);
            }
        }
        touched
    }

    /// Scope-enables or disables `id` and its subtree.
    pub fn set_enabled(&mut self, id: EntityId, enabled: bool) {
        self.tree.set_enabled_recursive(id, enabled);
    }

    pub fn set_selectable(&mut self, id: EntityId, selectable: bool) -> bool {
        match self.tree.get_mut(id) {
            Some(entity) => {
                entity.set_selectable(selectable);
                true
            }
            None => false,
        }
    }

    pub fn set_property(&mut self, id: EntityId, key: impl Into<String>, value: serde_json::Value) -> bool {
        match self.tree.get_mut(id) {
            Some(entity) => {
                entity.set_property(key, value);
                true
            }
            None => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::RgbaColor;
    use crate::source::{SourceMesh, SourcePoints};

    #[derive(Default)]
    struct RecordingSink {
        added: Vec<RenderObject>,
        removed: Vec<RenderObject>,
    }

    impl SceneSink for RecordingSink {
        fn on_objects_added(&mut self, objects: &[RenderObject]) {
            self.added.extend_from_slice(objects);
        }

        fn on_objects_removed(&mut self, objects: &[RenderObject]) {
            self.removed.extend_from_slice(objects);
        }
    }

    fn mixed_scene() -> SourceNode {
        SourceNode::group(
            "root",
            vec![
                SourceNode::group(
                    "g",
                    vec![
                        SourceNode::mesh("a", SourceMesh::quad([0.0; 3], 1.0)),
                        SourceNode::mesh("b", SourceMesh::quad([3.0, 0.0, 0.0], 1.0)),
                    ],
                ),
                SourceNode::points("cloud", SourcePoints::new(vec![[0.0, 5.0, 0.0]])),
            ],
        )
    }

    fn import(source: SourceNode) -> (ModelContainer, IdGenerator) {
        let mut ids = IdGenerator::new();
        let model = ModelContainer::import(1, source, &mut ids, &MergeOptions::default()).unwrap();
        (model, ids)
    }

    #[test]
    fn test_render_objects() {
        let (mut model, _) = import(mixed_scene());
        let kinds: Vec<_> = model.render_objects().iter().map(|o| o.kind).collect();
        assert_eq!(
            kinds,
            vec![
                RenderObjectKind::MergedFragment(0),
                RenderObjectKind::MergedOutline,
                RenderObjectKind::PointCloud(5),
            ]
        );

        let mut sink = RecordingSink::default();
        model.attach(&mut sink);
        model.attach(&mut sink);
        assert_eq!(sink.added.len(), 3);

        model.detach(&mut sink);
        assert_eq!(sink.removed, sink.added);
        assert!(!model.is_attached());
    }

    #[test]
    fn test_group_only_model_has_no_merger() {
        let (model, _) = import(SourceNode::group("lonely", vec![]));
        assert!(!model.is_pickable());
        assert!(model.render_objects().is_empty());
        assert_eq!(model.tree().len(), 1);
    }

    #[test]
    fn test_selection_highlights_subtree() {
        let (mut model, _) = import(mixed_scene());
        let highlight = Highlight::default();
        let (g, a, b) = (2, 3, 4);

        assert!(model.set_selected(g, true, &highlight));
        let merger = model.merger().unwrap();
        assert_eq!(merger.material_for_entity(a), Some(&highlight.surface));
        assert_eq!(merger.material_for_entity(b), Some(&highlight.surface));
        assert_eq!(merger.outline_material_for_entity(a), Some(&highlight.outline));

        // Deselecting a leaf inside a selected group keeps the group highlight
        model.set_selected(a, false, &highlight);
        assert_eq!(model.merger().unwrap().material_for_entity(a), Some(&highlight.surface));

        model.set_selected(g, false, &highlight);
        let merger = model.merger().unwrap();
        assert_eq!(merger.material_for_entity(a), Some(&Material::fallback()));
        assert_eq!(
            merger.outline_material_for_entity(b),
            Some(&SpatialMerger::default_outline_material())
        );
        assert_eq!(model.entity(a).unwrap().current_material(), Some(&Material::fallback()));
    }

    #[test]
    fn test_point_cloud_selection_updates_current_material() {
        let (mut model, _) = import(mixed_scene());
        let highlight = Highlight {
            surface: Material::highlight(RgbaColor::RED),
            ..Default::default()
        };
        model.set_selected(5, true, &highlight);
        assert_eq!(model.entity(5).unwrap().current_material(), Some(&highlight.surface));
    }

    #[test]
    fn test_visibility_updates_bounds_and_slots() {
        let (mut model, _) = import(mixed_scene());
        let b = 4;

        let touched = model.set_visibility(2, Visibility::Invisible);
        assert_eq!(touched, vec![2, 3, 4]);
        let merger = model.merger().unwrap();
        assert!(!merger.is_slot_visible(merger.slot_of(b).unwrap()));

        // Only the point cloud remains in the root bounds
        let bounds = model.bounds().unwrap();
        assert_eq!(bounds.min.x, 0.0);
        assert_eq!(bounds.max.x, 0.0);
        assert!(model.tree().bounds_invariant_holds());

        model.set_visibility(2, Visibility::Visible);
        assert_eq!(model.bounds().unwrap().max.x, 4.0);
        assert!(model.merger().unwrap().is_slot_visible(1));
    }

    #[test]
    fn test_reimport_swaps_in_place() {
        let (mut model, mut ids) = import(mixed_scene());
        let mut sink = RecordingSink::default();
        model.attach(&mut sink);
        let old_objects = model.render_objects().to_vec();

        let replacement = SourceNode::mesh("solo", SourceMesh::cuboid([0.0; 3], [1.0; 3]));
        let old_tree = model
            .reimport(replacement, &mut ids, &MergeOptions::default(), &mut sink)
            .unwrap();

        assert_eq!(old_tree.len(), 5);
        assert_eq!(model.id(), 1);
        assert_eq!(model.root(), 6);
        assert_eq!(sink.removed, old_objects);
        assert_eq!(sink.added.len(), old_objects.len() + 2);
        assert!(model.is_attached());
        // Render object ids are never reused
        assert!(model.render_objects().iter().all(|o| o.id > 3));
    }

    #[test]
    fn test_failed_reimport_keeps_old_state() {
        let (mut model, mut ids) = import(mixed_scene());
        let mut sink = RecordingSink::default();
        model.attach(&mut sink);

        let broken = SourceNode::mesh("bad", SourceMesh::new(vec![[0.0; 3]], Some(vec![0, 0, 4])));
        let err = model
            .reimport(broken, &mut ids, &MergeOptions::default(), &mut sink)
            .unwrap_err();

        assert!(matches!(err, ImportError::MalformedGeometry { .. }));
        assert_eq!(model.root(), 1);
        assert!(model.is_pickable());
        assert!(sink.removed.is_empty());
    }
}
