//! Selection state for entities.
//!
//! [`SelectionSet`] only tracks membership and order. Visual feedback is
//! applied by the [`Viewer`](crate::Viewer), which owns the entities.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use crate::common::RgbaColor;
use crate::input::{ModifierKey, Modifiers};
use crate::scene::{EntityId, Highlight, Material};

/// Configuration for selection visual feedback and click modifiers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SelectionConfig {
    /// Surface color of selected entities.
    pub highlight_color: RgbaColor,
    /// Outline color of selected entities.
    pub outline_color: RgbaColor,
    /// Modifiers that make a click add to the selection.
    pub add_modifiers: Vec<ModifierKey>,
    /// Modifiers that make a click remove from the selection.
    pub remove_modifiers: Vec<ModifierKey>,
}

impl Default for SelectionConfig {
    fn default() -> Self {
        Self {
            highlight_color: RgbaColor::ORANGE,
            outline_color: RgbaColor::MAGENTA,
            add_modifiers: vec![ModifierKey::Shift],
            remove_modifiers: vec![ModifierKey::Alt, ModifierKey::Control],
        }
    }
}

/// How a primary click edits the selection.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum ClickAction {
    Replace,
    Add,
    Remove,
}

impl SelectionConfig {
    /// Materials applied to selected entities.
    pub fn highlight(&self) -> Highlight {
        Highlight {
            surface: Material::highlight(self.highlight_color).with_name("selection"),
            outline: Material::highlight(self.outline_color).with_name("selection-outline"),
        }
    }

    /// Add wins over remove when both are held.
    pub fn click_action(&self, modifiers: &Modifiers) -> ClickAction {
        if modifiers.any_pressed(&self.add_modifiers) {
            ClickAction::Add
        } else if modifiers.any_pressed(&self.remove_modifiers) {
            ClickAction::Remove
        } else {
            ClickAction::Replace
        }
    }
}

/// Set of selected entities.
///
/// Maintains both a set for O(1) membership tests and a vector for ordered
/// iteration.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SelectionSet {
    /// Set of currently selected entities (for fast lookup)
    selected: HashSet<EntityId>,
    /// Selection in order of addition (for ordered iteration)
    selection_order: Vec<EntityId>,
    /// The primary/active selection (last added)
    primary: Option<EntityId>,
}

impl SelectionSet {
    pub fn new() -> Self {
        Self::default()
    }

    // ========== Query API ==========

    pub fn is_empty(&self) -> bool {
        self.selected.is_empty()
    }

    pub fn len(&self) -> usize {
        self.selected.len()
    }

    pub fn contains(&self, id: EntityId) -> bool {
        self.selected.contains(&id)
    }

    /// Returns the primary/active selection, if any.
    pub fn primary(&self) -> Option<EntityId> {
        self.primary
    }

    /// Iterates over selected entities in order of selection.
    pub fn iter(&self) -> impl Iterator<Item = EntityId> + '_ {
        self.selection_order.iter().copied()
    }

    pub fn as_slice(&self) -> &[EntityId] {
        &self.selection_order
    }

    // ========== Mutation API ==========

    /// Clears the set, returning what was selected.
    pub fn clear(&mut self) -> Vec<EntityId> {
        self.selected.clear();
        self.primary = None;
        std::mem::take(&mut self.selection_order)
    }

    /// Adds an entity and makes it primary. Returns `true` if it was not
    /// already selected.
    pub fn add(&mut self, id: EntityId) -> bool {
        let inserted = self.selected.insert(id);
        if inserted {
            self.selection_order.push(id);
        }
        self.primary = Some(id);
        inserted
    }

    /// Adds several entities in order.
    pub fn extend(&mut self, ids: impl IntoIterator<Item = EntityId>) {
        for id in ids {
            self.add(id);
        }
    }

    /// Removes an entity. Returns `true` if it was selected.
    pub fn remove(&mut self, id: EntityId) -> bool {
        if !self.selected.remove(&id) {
            return false;
        }
        self.selection_order.retain(|&i| i != id);
        if self.primary == Some(id) {
            self.primary = self.selection_order.last().copied();
        }
        true
    }

    /// Keeps only the entities for which `keep` returns true. Returns the
    /// removed ids.
    pub fn retain(&mut self, mut keep: impl FnMut(EntityId) -> bool) -> Vec<EntityId> {
        let removed: Vec<EntityId> = self.iter().filter(|&id| !keep(id)).collect();
        for &id in &removed {
            self.remove(id);
        }
        removed
    }
}
