use std::collections::HashMap;

use crate::scene::{EntityId, IndexChange};

/// Unique identifier for a registered callback.
pub type CallbackId = u32;

/// Type alias for observer callbacks.
type EventCallback = Box<dyn FnMut(&ViewerEvent)>;

/// enum representing event types.
#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug)]
pub enum EventKind {
    /// The selection set changed
    SelectionChanged,
    /// A group was entered or left
    ScopeChanged,
    /// Models were added, removed or re-imported
    ModelsChanged,
}

/// Notifications published by the [`Viewer`](crate::Viewer).
///
/// Every notification is sent after the state it describes has settled,
/// including per-entity visuals.
#[derive(Debug, Clone, PartialEq)]
pub enum ViewerEvent {
    SelectionChanged {
        /// Selected entities in selection order
        selected: Vec<EntityId>,
        primary: Option<EntityId>,
    },
    ScopeChanged {
        /// The entered group, or `None` at world scope
        scope: Option<EntityId>,
        /// Navigation stack depth
        depth: usize,
    },
    ModelsChanged {
        changes: Vec<IndexChange>,
    },
}

impl ViewerEvent {
    /// Returns the [`EventKind`] discriminant for this event.
    pub fn kind(&self) -> EventKind {
        match self {
            Self::SelectionChanged { .. } => EventKind::SelectionChanged,
            Self::ScopeChanged { .. } => EventKind::ScopeChanged,
            Self::ModelsChanged { .. } => EventKind::ModelsChanged,
        }
    }
}

/// Observer registry keyed by [`EventKind`].
///
/// Callbacks are invoked in registration order. Each callback is assigned a
/// unique [`CallbackId`] when registered.
#[derive(Default)]
pub struct EventDispatcher {
    callback_map: HashMap<EventKind, Vec<(CallbackId, EventCallback)>>,
    next_id: u32,
}

impl std::fmt::Debug for EventDispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventDispatcher")
            .field("callbacks", &self.callback_count())
            .field("next_id", &self.next_id)
            .finish()
    }
}

impl EventDispatcher {
    /// Creates a new empty event dispatcher.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a callback for a specific event kind.
    ///
    /// Returns a [`CallbackId`] that can be used to unregister this callback.
    pub fn register<F>(&mut self, kind: EventKind, callback: F) -> CallbackId
    where
        F: FnMut(&ViewerEvent) + 'static,
    {
        let id = self.next_id;
        self.next_id += 1;

        self.callback_map
            .entry(kind)
            .or_default()
            .push((id, Box::new(callback)));

        id
    }

    /// Unregisters a callback by its ID.
    ///
    /// Returns `true` if the callback was found and removed, `false` otherwise.
    pub fn unregister(&mut self, id: CallbackId) -> bool {
        for callbacks in self.callback_map.values_mut() {
            if let Some(pos) = callbacks.iter().position(|(cid, _)| *cid == id) {
                let _ = callbacks.remove(pos);
                return true;
            }
        }
        false
    }

    /// Number of registered callbacks across all kinds.
    pub fn callback_count(&self) -> usize {
        self.callback_map.values().map(Vec::len).sum()
    }

    /// Sends `event` to every callback registered for its kind. Returns the
    /// number of callbacks invoked.
    pub fn dispatch(&mut self, event: &ViewerEvent) -> usize {
        let Some(callbacks) = self.callback_map.get_mut(&event.kind()) else {
            return 0;
        };
        for (_id, callback) in callbacks.iter_mut() {
            callback(event);
        }
        callbacks.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::rc::Rc;

    fn scope_event(depth: usize) -> ViewerEvent {
        ViewerEvent::ScopeChanged { scope: None, depth }
    }

    #[test]
    fn test_register_returns_unique_ids() {
        let mut dispatcher = EventDispatcher::new();
        let a = dispatcher.register(EventKind::ScopeChanged, |_| {});
        let b = dispatcher.register(EventKind::SelectionChanged, |_| {});
        assert_ne!(a, b);
        assert_eq!(dispatcher.callback_count(), 2);
    }

    #[test]
    fn test_dispatch_in_registration_order() {
        let mut dispatcher = EventDispatcher::new();
        let log = Rc::new(RefCell::new(Vec::new()));

        for tag in ["first", "second"] {
            let log = log.clone();
            dispatcher.register(EventKind::ScopeChanged, move |_| log.borrow_mut().push(tag));
        }

        assert_eq!(dispatcher.dispatch(&scope_event(1)), 2);
        assert_eq!(*log.borrow(), vec!["first", "second"]);
    }

    #[test]
    fn test_dispatch_only_matching_kind() {
        let mut dispatcher = EventDispatcher::new();
        let count = Rc::new(RefCell::new(0));
        let counter = count.clone();
        dispatcher.register(EventKind::SelectionChanged, move |_| *counter.borrow_mut() += 1);

        assert_eq!(dispatcher.dispatch(&scope_event(0)), 0);
        assert_eq!(*count.borrow(), 0);
    }

    #[test]
    fn test_unregister() {
        let mut dispatcher = EventDispatcher::new();
        let id = dispatcher.register(EventKind::ModelsChanged, |_| {});

        assert!(dispatcher.unregister(id));
        assert!(!dispatcher.unregister(id));
        assert_eq!(
            dispatcher.dispatch(&ViewerEvent::ModelsChanged { changes: vec![] }),
            0
        );
    }
}
