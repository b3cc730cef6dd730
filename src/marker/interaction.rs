use std::rc::Rc;
use std::sync::Arc;

use glam::DVec2;
use tracing::debug;

use crate::error::EngineError;
use crate::map::{Condition, InteractionId, LayerId, ListenerKey, MapInstance, Select, SelectEvent};
use crate::marker::MarkerRecord;

/// Normalized selection result. `info` and `coords` are only set on a hit.
#[derive(Debug, Clone, PartialEq)]
pub struct InteractionEvent {
    pub hit: bool,
    pub info: Option<Arc<MarkerRecord>>,
    pub coords: Option<DVec2>,
}

impl InteractionEvent {
    pub fn miss() -> Self {
        Self {
            hit: false,
            info: None,
            coords: None,
        }
    }

    pub fn hit(info: Arc<MarkerRecord>, coords: Option<DVec2>) -> Self {
        Self {
            hit: true,
            info: Some(info),
            coords,
        }
    }

    /// Only the first selected feature counts. A feature that carries no
    /// marker record is treated as a miss.
    pub fn from_select(event: &SelectEvent) -> Self {
        let Some(feature) = event.selected.first() else {
            return Self::miss();
        };
        match feature.marker() {
            Some(record) => Self::hit(Arc::clone(record), feature.geometry.as_point()),
            None => Self::miss(),
        }
    }
}

/// A (layer, condition) select bound to at most one map, with the listeners
/// registered through it.
///
/// Nothing touches a map until [`Interaction::mount`]. [`Interaction::cleanup`]
/// releases listeners only; unmounting is the owner's job.
#[derive(Debug)]
pub struct Interaction {
    select: Rc<Select>,
    listeners: Vec<ListenerKey>,
    mounted_on: Option<u64>,
}

impl Interaction {
    pub fn new(layer: LayerId, condition: Condition) -> Self {
        Self {
            select: Select::new(vec![layer], condition),
            listeners: Vec::new(),
            mounted_on: None,
        }
    }

    pub fn id(&self) -> InteractionId {
        self.select.id()
    }

    pub fn condition(&self) -> Condition {
        self.select.condition()
    }

    /// Generation of the map this interaction is mounted on
    pub fn mounted_on(&self) -> Option<u64> {
        self.mounted_on
    }

    pub fn is_mounted(&self) -> bool {
        self.mounted_on.is_some()
    }

    pub fn mount(&mut self, map: &mut MapInstance) {
        map.add_interaction(Rc::clone(&self.select));
        self.mounted_on = Some(map.generation());
    }

    /// Remove the select from the map. The interaction counts as unmounted
    /// even if the map no longer knew it.
    pub fn unmount(&mut self, map: &mut MapInstance) -> Result<(), EngineError> {
        self.mounted_on = None;
        self.select.clear_selection();
        map.remove_interaction(self.id()).map(|_| ())
    }

    /// Register a callback that receives one normalized event per select event
    pub fn on(&mut self, mut callback: impl FnMut(&InteractionEvent) + 'static) -> ListenerKey {
        let key = self.select.on(move |event| callback(&InteractionEvent::from_select(event)));
        self.listeners.push(key);
        key
    }

    pub fn listener_count(&self) -> usize {
        self.listeners.len()
    }

    /// Release every registered listener. Returns how many were released.
    pub fn cleanup(&mut self) -> usize {
        let released = self.listeners.drain(..).filter(|key| self.select.un(*key)).count();
        if released > 0 {
            debug!(interaction = %self.id(), released, "interaction listeners released");
        }
        released
    }
}
