use std::collections::HashMap;

use crate::build::IdGenerator;
use crate::entity::{Entity, EntityId, ModelId};
use crate::error::ImportError;
use crate::merge::MergeOptions;
use crate::model::{ModelContainer, SceneSink};
use crate::source::SourceNode;

/// A structural change to the set of loaded models.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IndexChange {
    Added(ModelId),
    Removed(ModelId),
    Reimported {
        model: ModelId,
        removed: Vec<EntityId>,
    },
}

/// Registry of every loaded model and every entity they own, for one viewer
/// session.
#[derive(Debug, Default)]
pub struct EntityIndex {
    models: HashMap<ModelId, ModelContainer>,
    order: Vec<ModelId>,
    owners: HashMap<EntityId, ModelId>,
    ids: IdGenerator,
    options: MergeOptions,
    changes: Vec<IndexChange>,
}

impl EntityIndex {
    pub fn new(options: MergeOptions) -> Self {
        Self {
            options,
            ..Default::default()
        }
    }

    pub fn merge_options(&self) -> &MergeOptions {
        &self.options
    }

    /// Options used by subsequent imports. Loaded models keep their merge.
    pub fn set_merge_options(&mut self, options: MergeOptions) {
        self.options = options;
    }

    /// Imports `source` as a new model and hands its render objects to `sink`.
    /// On error nothing is installed.
    pub fn import_model(
        &mut self,
        source: SourceNode,
        sink: &mut dyn SceneSink,
    ) -> Result<ModelId, ImportError> {
        let id = self.ids.next_model_id();
        let container = ModelContainer::import(id, source, &mut self.ids, &self.options)?;
        self.add_model(container)?;
        if let Some(container) = self.models.get_mut(&id) {
            container.attach(sink);
        }
        Ok(id)
    }

    /// Indexes an already built container.
    pub fn add_model(&mut self, container: ModelContainer) -> Result<(), ImportError> {
        let model = container.id();
        let entities = container.tree().preorder(container.root());
        if let Some(&duplicate) = entities.iter().find(|&&id| self.owners.contains_key(&id)) {
            log::error!("model {model}: entity {duplicate} is already indexed");
            return Err(ImportError::DuplicateEntity(duplicate));
        }
        if self.models.contains_key(&model) {
            return Err(crate::error::invariant(format!("model {model} is already loaded")));
        }

        for id in entities {
            self.owners.insert(id, model);
        }
        log::info!(
            "added model {model} with {} entities",
            container.tree().len()
        );
        self.models.insert(model, container);
        self.order.push(model);
        self.changes.push(IndexChange::Added(model));
        Ok(())
    }

    /// Removes a model, withdrawing its render objects from `sink`.
    pub fn remove_model(
        &mut self,
        model: ModelId,
        sink: &mut dyn SceneSink,
    ) -> Option<ModelContainer> {
        let mut container = self.models.remove(&model)?;
        container.detach(sink);
        for id in container.tree().ids() {
            self.owners.remove(&id);
        }
        self.order.retain(|&m| m != model);
        self.changes.push(IndexChange::Removed(model));
        log::info!("removed model {model}");
        Some(container)
    }

    /// Rebuilds a model from `source` in place. Returns the ids of the entities
    /// that no longer exist. On error the model is unchanged.
    pub fn reimport_model(
        &mut self,
        model: ModelId,
        source: SourceNode,
        sink: &mut dyn SceneSink,
    ) -> Result<Vec<EntityId>, ImportError> {
        let Some(container) = self.models.get_mut(&model) else {
            return Err(crate::error::invariant(format!("model {model} is not loaded")));
        };

        let old_tree = container.reimport(source, &mut self.ids, &self.options, sink)?;
        let removed: Vec<EntityId> = old_tree.preorder(old_tree.root());
        for id in &removed {
            self.owners.remove(id);
        }
        for id in container.tree().preorder(container.root()) {
            self.owners.insert(id, model);
        }

        log::info!(
            "re-imported model {model}: {} entities replaced by {}",
            removed.len(),
            container.tree().len()
        );
        self.changes.push(IndexChange::Reimported {
            model,
            removed: removed.clone(),
        });
        Ok(removed)
    }

    pub fn model(&self, model: ModelId) -> Option<&ModelContainer> {
        self.models.get(&model)
    }

    pub fn model_mut(&mut self, model: ModelId) -> Option<&mut ModelContainer> {
        self.models.get_mut(&model)
    }

    /// Loaded models in load order.
    pub fn models(&self) -> impl Iterator<Item = &ModelContainer> {
        self.order.iter().filter_map(|id| self.models.get(id))
    }

    pub fn model_ids(&self) -> &[ModelId] {
        &self.order
    }

    pub fn model_count(&self) -> usize {
        self.order.len()
    }

    pub fn model_of(&self, entity: EntityId) -> Option<ModelId> {
        self.owners.get(&entity).copied()
    }

    pub fn entity(&self, id: EntityId) -> Option<&Entity> {
        let model = self.model_of(id)?;
        self.models.get(&model)?.entity(id)
    }

    pub fn contains_entity(&self, id: EntityId) -> bool {
        self.owners.contains_key(&id)
    }

    pub fn entity_count(&self) -> usize {
        self.owners.len()
    }

    /// The container that owns `entity`.
    pub fn container_of_mut(&mut self, entity: EntityId) -> Option<&mut ModelContainer> {
        let model = self.model_of(entity)?;
        self.models.get_mut(&model)
    }

    /// Root entity of every model, in load order.
    pub fn root_entities(&self) -> Vec<EntityId> {
        self.models().map(ModelContainer::root).collect()
    }

    /// Takes the changes recorded since the last call.
    pub fn drain_changes(&mut self) -> Vec<IndexChange> {
        std::mem::take(&mut self.changes)
    }
}
