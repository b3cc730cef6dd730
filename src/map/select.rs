use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

use crate::map::{Feature, FeatureId, InteractionId, LayerId, ListenerKey};

/// Kind of pointer event delivered by the terminal
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum PointerKind {
    Move,
    Click,
}

/// A pointer event in target pixel coordinates
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct PointerEvent {
    pub kind: PointerKind,
    pub pixel: (i32, i32),
}

impl PointerEvent {
    pub fn moved(px: i32, py: i32) -> Self {
        Self {
            kind: PointerKind::Move,
            pixel: (px, py),
        }
    }

    pub fn click(px: i32, py: i32) -> Self {
        Self {
            kind: PointerKind::Click,
            pixel: (px, py),
        }
    }
}

/// Which pointer events a select interaction reacts to
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Condition {
    /// Hover
    PointerMove,
    Click,
}

impl Condition {
    pub fn matches(self, kind: PointerKind) -> bool {
        matches!(
            (self, kind),
            (Condition::PointerMove, PointerKind::Move) | (Condition::Click, PointerKind::Click)
        )
    }
}

/// Selection change produced by a select interaction
#[derive(Debug, Clone)]
pub struct SelectEvent {
    pub selected: Vec<Feature>,
    pub deselected: Vec<FeatureId>,
}

type Listener = Box<dyn FnMut(&SelectEvent)>;

/// The engine's selection primitive: picks features of its layers under the
/// pointer and notifies listeners when the selection changes.
pub struct Select {
    id: InteractionId,
    layers: Vec<LayerId>,
    condition: Condition,
    selected: RefCell<Option<FeatureId>>,
    listeners: RefCell<Vec<(ListenerKey, Listener)>>,
}

impl fmt::Debug for Select {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Select")
            .field("id", &self.id)
            .field("layers", &self.layers)
            .field("condition", &self.condition)
            .field("listeners", &self.listener_count())
            .finish()
    }
}

impl Select {
    pub fn new(layers: Vec<LayerId>, condition: Condition) -> Rc<Self> {
        Rc::new(Self {
            id: InteractionId::next(),
            layers,
            condition,
            selected: RefCell::new(None),
            listeners: RefCell::new(Vec::new()),
        })
    }

    pub fn id(&self) -> InteractionId {
        self.id
    }

    pub fn condition(&self) -> Condition {
        self.condition
    }

    pub fn layers(&self) -> &[LayerId] {
        &self.layers
    }

    /// Register a listener for `select` events
    pub fn on(&self, listener: impl FnMut(&SelectEvent) + 'static) -> ListenerKey {
        let key = ListenerKey::next();
        self.listeners.borrow_mut().push((key, Box::new(listener)));
        key
    }

    /// Remove a listener. Returns false if the key was not registered.
    pub fn un(&self, key: ListenerKey) -> bool {
        let mut listeners = self.listeners.borrow_mut();
        let before = listeners.len();
        listeners.retain(|(k, _)| *k != key);
        listeners.len() != before
    }

    pub fn listener_count(&self) -> usize {
        self.listeners.borrow().len()
    }

    pub fn selected(&self) -> Option<FeatureId> {
        *self.selected.borrow()
    }

    /// Forget the current selection without emitting anything
    pub fn clear_selection(&self) {
        self.selected.replace(None);
    }

    /// Update the selection from a hit test.
    ///
    /// Hover only reports changes of the hovered feature. A click reports
    /// every hit, and a miss only when it clears an earlier selection.
    pub(crate) fn update(&self, kind: PointerKind, hit: Option<Feature>) -> Option<SelectEvent> {
        let previous = *self.selected.borrow();
        let hit_id = hit.as_ref().map(Feature::id);

        let emit = match kind {
            PointerKind::Move => hit_id != previous,
            PointerKind::Click => hit.is_some() || previous.is_some(),
        };
        if !emit {
            return None;
        }

        self.selected.replace(hit_id);
        Some(SelectEvent {
            deselected: previous.filter(|p| Some(*p) != hit_id).into_iter().collect(),
            selected: hit.into_iter().collect(),
        })
    }

    /// Call every listener once with the event
    pub(crate) fn dispatch(&self, event: &SelectEvent) {
        for (_, listener) in self.listeners.borrow_mut().iter_mut() {
            listener(event);
        }
    }
}
