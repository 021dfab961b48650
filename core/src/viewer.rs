use std::collections::BTreeMap;

use crate::{
    camera::{Camera, Viewport},
    common::Ray,
    config::ViewerConfig,
    error::ViewerError,
    event::{EventDispatcher, ViewerEvent},
    input::{MouseButton, Modifiers, PointerEvent, PointerEventKind},
    navigation::{NavigationStack, Scope},
    pick::PickResolver,
    props::{PropertyUpdateService, PropsUpdateReport},
    scene::{
        Entity, EntityId, EntityIndex, Highlight, ModelId, NullSink, SceneSink, SourceNode,
        Visibility,
    },
    selection::{ClickAction, SelectionConfig, SelectionSet},
};

/// One viewer session: the loaded models, the selection and the navigation
/// stack, plus the observers that watch them.
///
/// Every operation runs to completion before returning. Per-entity visuals are
/// always applied before the aggregate notification is dispatched.
pub struct Viewer {
    index: EntityIndex,
    selection: SelectionSet,
    navigation: NavigationStack,
    resolver: PickResolver,
    dispatcher: EventDispatcher,
    config: SelectionConfig,
    highlight: Highlight,
    sink: Box<dyn SceneSink>,
}

impl Viewer {
    /// Create a new Viewer that hands render objects to `sink`
    pub fn new(config: ViewerConfig, sink: Box<dyn SceneSink>) -> Self {
        let ViewerConfig { merge, selection } = config;
        Self {
            index: EntityIndex::new(merge),
            highlight: selection.highlight(),
            config: selection,
            selection: SelectionSet::new(),
            navigation: NavigationStack::new(),
            resolver: PickResolver::new(),
            dispatcher: EventDispatcher::new(),
            sink,
        }
    }

    /// Create a new Viewer without a renderer
    pub fn headless(config: ViewerConfig) -> Self {
        Self::new(config, Box::new(NullSink))
    }

    pub fn index(&self) -> &EntityIndex {
        &self.index
    }

    pub fn entity(&self, id: EntityId) -> Option<&Entity> {
        self.index.entity(id)
    }

    pub fn selection(&self) -> &SelectionSet {
        &self.selection
    }

    pub fn navigation(&self) -> &NavigationStack {
        &self.navigation
    }

    pub fn scope(&self) -> Scope {
        self.navigation.scope()
    }

    pub fn resolver(&self) -> &PickResolver {
        &self.resolver
    }

    pub fn selection_config(&self) -> &SelectionConfig {
        &self.config
    }

    /// Observer registry for [`ViewerEvent`]s.
    pub fn events_mut(&mut self) -> &mut EventDispatcher {
        &mut self.dispatcher
    }

    // ========== Models ==========

    /// Imports a scene as a new model. On failure nothing is installed and the
    /// viewer keeps its previous state.
    pub fn import_scene(&mut self, source: SourceNode) -> Result<ModelId, ViewerError> {
        let model = self
            .index
            .import_model(source, self.sink.as_mut())
            .inspect_err(|err| log::warn!("model failed to load: {err}"))?;

        // Inside a group, only the group's children are active
        if let Scope::Group(_) = self.scope() {
            if let Some(container) = self.index.model_mut(model) {
                let root = container.root();
                container.set_enabled(root, false);
            }
        }

        self.publish_model_changes();
        Ok(model)
    }

    /// Rebuilds a model in place. Selection entries and navigation frames that
    /// referenced the replaced entities are dropped.
    pub fn reimport_scene(&mut self, model: ModelId, source: SourceNode) -> Result<(), ViewerError> {
        if self.index.model(model).is_none() {
            return Err(ViewerError::UnknownModel(model));
        }

        self.index
            .reimport_model(model, source, self.sink.as_mut())
            .inspect_err(|err| log::warn!("model {model} failed to re-import: {err}"))?;

        self.forget_missing_entities();
        self.publish_model_changes();
        Ok(())
    }

    pub fn remove_model(&mut self, model: ModelId) -> Result<(), ViewerError> {
        self.index
            .remove_model(model, self.sink.as_mut())
            .ok_or(ViewerError::UnknownModel(model))?;

        self.forget_missing_entities();
        self.publish_model_changes();
        Ok(())
    }

    /// Drops state that refers to entities no longer in the index and
    /// re-derives the enabled flags from the surviving scope.
    fn forget_missing_entities(&mut self) {
        let index = &self.index;
        let mut selection_changed = !self.selection.retain(|id| index.contains_entity(id)).is_empty();

        let dropped = self.navigation.truncate_where(|group| index.contains_entity(group));
        let scope_changed = !dropped.is_empty();
        if let Some(frame) = dropped.into_iter().next() {
            // Land in the deepest surviving scope with the selection it had
            for id in self.selection.clear() {
                self.apply_visual(id, false);
            }
            self.restore_selection(frame.saved_selection);
            selection_changed = true;
        }

        match self.scope() {
            Scope::World => self.set_scope_children_enabled(Scope::World, true),
            scope => {
                self.set_scope_children_enabled(Scope::World, false);
                self.set_scope_children_enabled(scope, true);
            }
        }

        if selection_changed {
            self.notify_selection();
        }
        if scope_changed {
            self.notify_scope();
        }
    }

    fn publish_model_changes(&mut self) {
        let changes = self.index.drain_changes();
        if !changes.is_empty() {
            self.dispatcher.dispatch(&ViewerEvent::ModelsChanged { changes });
        }
    }

    // ========== Picking ==========

    /// Restricts picking to exactly these entities. `None` restores
    /// scope-based resolution.
    pub fn set_custom_scope(&mut self, ids: Option<Vec<EntityId>>) {
        self.resolver.set_custom_scope(ids);
    }

    /// The entity a pointer at `position` would pick at the current scope.
    pub fn pick(&self, camera: &Camera, viewport: Viewport, position: (f32, f32)) -> Option<EntityId> {
        self.resolver
            .pick(&self.index, self.scope(), camera, viewport, position)
            .map(|hit| hit.entity)
    }

    pub fn pick_ray(&self, ray: &Ray) -> Option<EntityId> {
        self.resolver
            .pick_ray(&self.index, self.scope(), ray)
            .map(|hit| hit.entity)
    }

    /// Picks and applies a pointer event. Only the primary button acts.
    /// Returns the picked entity.
    pub fn handle_pointer(
        &mut self,
        event: &PointerEvent,
        camera: &Camera,
        viewport: Viewport,
    ) -> Option<EntityId> {
        if event.button != MouseButton::Left {
            return None;
        }

        let picked = self.pick(camera, viewport, event.position);
        match event.kind {
            PointerEventKind::Click => {
                self.click(picked, event.modifiers);
            }
            PointerEventKind::DoubleClick => {
                self.double_click(picked);
            }
        }
        picked
    }

    /// Primary click on `target`, or on empty space when `None`. Returns
    /// `true` if the selection changed.
    pub fn click(&mut self, target: Option<EntityId>, modifiers: Modifiers) -> bool {
        match (target, self.config.click_action(&modifiers)) {
            (Some(id), ClickAction::Replace) => self.select_only(id),
            (Some(id), ClickAction::Add) => self.add_to_selection(id),
            (Some(id), ClickAction::Remove) => self.remove_from_selection(id),
            (None, ClickAction::Replace) => self.clear_selection(),
            (None, _) => false,
        }
    }

    /// Double-click on a group enters it; on empty space leaves the current
    /// group. Returns `true` if the scope changed.
    pub fn double_click(&mut self, target: Option<EntityId>) -> bool {
        match target {
            Some(id) => {
                let enterable = self
                    .index
                    .entity(id)
                    .is_some_and(|e| e.capabilities().can_enter);
                enterable && self.enter_group(id).is_ok()
            }
            None => self.leave_group(),
        }
    }

    // ========== Selection ==========

    fn apply_visual(&mut self, id: EntityId, selected: bool) {
        if let Some(container) = self.index.container_of_mut(id) {
            container.set_selected(id, selected, &self.highlight);
        }
    }

    fn notify_selection(&mut self) {
        let event = ViewerEvent::SelectionChanged {
            selected: self.selection.as_slice().to_vec(),
            primary: self.selection.primary(),
        };
        self.dispatcher.dispatch(&event);
    }

    fn notify_scope(&mut self) {
        let event = ViewerEvent::ScopeChanged {
            scope: self.scope().group(),
            depth: self.navigation.depth(),
        };
        self.dispatcher.dispatch(&event);
    }

    fn restore_selection(&mut self, mut saved: SelectionSet) {
        let index = &self.index;
        saved.retain(|id| index.contains_entity(id));
        self.selection = saved;
        for id in self.selection.as_slice().to_vec() {
            self.apply_visual(id, true);
        }
    }

    fn is_known(&self, id: EntityId) -> bool {
        let known = self.index.contains_entity(id);
        if !known {
            log::warn!("ignoring selection of unknown entity {id}");
        }
        known
    }

    /// Replaces the selection with `{id}`.
    pub fn select_only(&mut self, id: EntityId) -> bool {
        if !self.is_known(id) || self.selection.as_slice() == [id] {
            return false;
        }

        for old in self.selection.clear() {
            if old != id {
                self.apply_visual(old, false);
            }
        }
        self.selection.add(id);
        self.apply_visual(id, true);
        self.notify_selection();
        true
    }

    pub fn add_to_selection(&mut self, id: EntityId) -> bool {
        if !self.is_known(id) || self.selection.contains(id) {
            return false;
        }

        self.selection.add(id);
        self.apply_visual(id, true);
        self.notify_selection();
        true
    }

    pub fn remove_from_selection(&mut self, id: EntityId) -> bool {
        if !self.selection.remove(id) {
            return false;
        }

        self.apply_visual(id, false);
        self.notify_selection();
        true
    }

    pub fn clear_selection(&mut self) -> bool {
        let cleared = self.selection.clear();
        if cleared.is_empty() {
            return false;
        }

        for id in cleared {
            self.apply_visual(id, false);
        }
        self.notify_selection();
        true
    }

    // ========== Navigation ==========

    fn set_scope_children_enabled(&mut self, scope: Scope, enabled: bool) {
        match scope {
            Scope::World => {
                for model in self.index.model_ids().to_vec() {
                    if let Some(container) = self.index.model_mut(model) {
                        let root = container.root();
                        container.set_enabled(root, enabled);
                    }
                }
            }
            Scope::Group(group) => {
                let Some(container) = self.index.container_of_mut(group) else {
                    return;
                };
                let children = container
                    .entity(group)
                    .map(|e| e.children().to_vec())
                    .unwrap_or_default();
                for child in children {
                    container.set_enabled(child, enabled);
                }
            }
        }
    }

    /// Pushes `group` onto the navigation stack. The selection is cleared and
    /// only the group's children stay pickable.
    ///
    /// `group` must be a group at the top level of the current scope: a model
    /// root at world scope, or a direct child of the entered group.
    pub fn enter_group(&mut self, group: EntityId) -> Result<(), ViewerError> {
        let entity = self
            .index
            .entity(group)
            .ok_or(ViewerError::UnknownEntity(group))?;
        let previous = self.scope();
        if !entity.capabilities().can_enter || entity.parent() != previous.group() {
            return Err(ViewerError::NotEnterable(group));
        }

        let saved = self.selection.clone();
        let had_selection = !saved.is_empty();
        for id in self.selection.clear() {
            self.apply_visual(id, false);
        }
        self.navigation.push(group, saved);

        self.set_scope_children_enabled(previous, false);
        self.set_scope_children_enabled(Scope::Group(group), true);

        log::debug!("entered group {group} (depth {})", self.navigation.depth());
        if had_selection {
            self.notify_selection();
        }
        self.notify_scope();
        Ok(())
    }

    /// Pops one level and restores the parent scope with the selection it had
    /// when the group was entered. No-op at world scope.
    pub fn leave_group(&mut self) -> bool {
        let Some(frame) = self.navigation.pop() else {
            return false;
        };

        for id in self.selection.clear() {
            self.apply_visual(id, false);
        }

        let parent = self.scope();
        self.set_scope_children_enabled(Scope::Group(frame.group), false);
        self.set_scope_children_enabled(parent, true);
        self.restore_selection(frame.saved_selection);

        log::debug!(
            "left group {} (depth {})",
            frame.group,
            self.navigation.depth()
        );
        self.notify_selection();
        self.notify_scope();
        true
    }

    // ========== Entity state ==========

    /// Shows or hides `id` and its subtree.
    pub fn set_visibility(&mut self, id: EntityId, visible: bool) -> Result<(), ViewerError> {
        let container = self
            .index
            .container_of_mut(id)
            .ok_or(ViewerError::UnknownEntity(id))?;
        let visibility = if visible {
            Visibility::Visible
        } else {
            Visibility::Invisible
        };
        container.set_visibility(id, visibility);
        Ok(())
    }

    pub fn set_selectable(&mut self, id: EntityId, selectable: bool) -> Result<(), ViewerError> {
        let container = self
            .index
            .container_of_mut(id)
            .ok_or(ViewerError::UnknownEntity(id))?;
        container.set_selectable(id, selectable);
        Ok(())
    }

    /// Hands each selected entity's endpoint metadata to `service` together
    /// with `props`. Accepted updates are merged into the entity's properties.
    pub fn push_props_update(
        &mut self,
        service: &mut dyn PropertyUpdateService,
        props: &BTreeMap<String, serde_json::Value>,
    ) -> PropsUpdateReport {
        let mut report = PropsUpdateReport::default();

        for id in self.selection.as_slice().to_vec() {
            let Some(endpoint) = self.index.entity(id).and_then(|e| e.userdata().cloned()) else {
                report.skipped.push(id);
                continue;
            };

            match service.update_properties(&endpoint, props) {
                Ok(()) => {
                    if let Some(container) = self.index.container_of_mut(id) {
                        for (key, value) in props {
                            container.set_property(id, key.clone(), value.clone());
                        }
                    }
                    report.updated.push(id);
                }
                Err(err) => {
                    log::warn!("property update for entity {id} failed: {err:#}");
                    report.failed.push((id, format!("{err:#}")));
                }
            }
        }

        report
    }
}
