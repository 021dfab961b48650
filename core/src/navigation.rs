//! Navigation stack of entered groups.

use crate::scene::EntityId;
use crate::selection::SelectionSet;

/// The current navigation scope.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Scope {
    /// Nothing entered; model roots are the pickable top level.
    World,
    /// Inside a group; its direct children are the pickable top level.
    Group(EntityId),
}

impl Scope {
    pub fn group(self) -> Option<EntityId> {
        match self {
            Scope::World => None,
            Scope::Group(id) => Some(id),
        }
    }
}

/// One entered group plus the selection of the scope it was entered from.
#[derive(Debug, Clone, PartialEq)]
pub struct NavigationFrame {
    pub group: EntityId,
    pub saved_selection: SelectionSet,
}

#[derive(Debug, Clone, Default)]
pub struct NavigationStack {
    frames: Vec<NavigationFrame>,
}

impl NavigationStack {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn scope(&self) -> Scope {
        self.frames
            .last()
            .map_or(Scope::World, |frame| Scope::Group(frame.group))
    }

    /// Scope directly below the top frame.
    pub fn parent_scope(&self) -> Scope {
        match self.frames.len() {
            0 | 1 => Scope::World,
            n => Scope::Group(self.frames[n - 2].group),
        }
    }

    pub fn depth(&self) -> usize {
        self.frames.len()
    }

    pub fn is_world(&self) -> bool {
        self.frames.is_empty()
    }

    /// Entered groups, outermost first.
    pub fn groups(&self) -> impl Iterator<Item = EntityId> + '_ {
        self.frames.iter().map(|frame| frame.group)
    }

    pub fn push(&mut self, group: EntityId, saved_selection: SelectionSet) {
        self.frames.push(NavigationFrame {
            group,
            saved_selection,
        });
    }

    /// Pops one level. `None` at world scope.
    pub fn pop(&mut self) -> Option<NavigationFrame> {
        self.frames.pop()
    }

    /// Drops the first frame whose group fails `keep`, and every frame above
    /// it. Returns the dropped frames, outermost first.
    pub fn truncate_where(&mut self, mut keep: impl FnMut(EntityId) -> bool) -> Vec<NavigationFrame> {
        match self.frames.iter().position(|frame| !keep(frame.group)) {
            Some(index) => self.frames.split_off(index),
            None => Vec::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_world_scope_by_default() {
        let stack = NavigationStack::new();
        assert_eq!(stack.scope(), Scope::World);
        assert_eq!(stack.depth(), 0);
        assert!(stack.is_world());
    }

    #[test]
    fn test_push_pop() {
        let mut stack = NavigationStack::new();
        let mut saved = SelectionSet::new();
        saved.add(9);

        stack.push(2, saved.clone());
        stack.push(5, SelectionSet::new());
        assert_eq!(stack.scope(), Scope::Group(5));
        assert_eq!(stack.parent_scope(), Scope::Group(2));
        assert_eq!(stack.groups().collect::<Vec<_>>(), vec![2, 5]);

        assert_eq!(stack.pop().unwrap().group, 5);
        assert_eq!(stack.parent_scope(), Scope::World);
        let frame = stack.pop().unwrap();
        assert_eq!(frame.saved_selection, saved);
        assert!(stack.pop().is_none());
        assert_eq!(stack.scope(), Scope::World);
    }

    #[test]
    fn test_truncate_where() {
        let mut stack = NavigationStack::new();
        for group in [1, 2, 3] {
            stack.push(group, SelectionSet::new());
        }

        let dropped = stack.truncate_where(|g| g != 2);
        assert_eq!(dropped.iter().map(|f| f.group).collect::<Vec<_>>(), vec![2, 3]);
        assert_eq!(stack.scope(), Scope::Group(1));
        assert!(stack.truncate_where(|_| true).is_empty());
    }
}
