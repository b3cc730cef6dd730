use std::cell::Cell;
use std::rc::Rc;
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender};
use std::sync::Arc;
use std::time::{Duration, Instant};

use glam::DVec2;
use tracing::{debug, warn};

use crate::error::{EngineError, MapError};
use crate::map::select::{PointerEvent, Select};
use crate::map::source::{FeatureFetcher, LoadResult};
use crate::map::{Feature, InteractionId, Layer, LayerId, ListenerKey, Overlay, OverlayId, View, ViewOptions};

/// Pointer distance, in braille pixels, that still counts as a hit
pub const HIT_TOLERANCE_PX: i32 = 4;

/// Mouse cursor shown over the target
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Cursor {
    Default,
    Pointer,
}

/// The pane a map renders into. At most one live instance is bound to it.
#[derive(Debug)]
pub struct MapTarget {
    selector: String,
    /// Size in braille pixels
    size: Cell<(usize, usize)>,
    cursor: Cell<Cursor>,
    bound_to: Cell<Option<u64>>,
}

impl MapTarget {
    pub fn new(selector: impl Into<String>, width: usize, height: usize) -> Rc<Self> {
        Rc::new(Self {
            selector: selector.into(),
            size: Cell::new((width, height)),
            cursor: Cell::new(Cursor::Default),
            bound_to: Cell::new(None),
        })
    }

    pub fn selector(&self) -> &str {
        &self.selector
    }

    pub fn size(&self) -> (usize, usize) {
        self.size.get()
    }

    pub fn set_size(&self, width: usize, height: usize) {
        self.size.set((width, height));
    }

    pub fn cursor(&self) -> Cursor {
        self.cursor.get()
    }

    pub fn set_cursor(&self, cursor: Cursor) {
        self.cursor.set(cursor);
    }

    /// Generation of the map instance currently bound, if any
    pub fn bound_generation(&self) -> Option<u64> {
        self.bound_to.get()
    }
}

/// View events listeners can subscribe to
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum ViewEvent {
    /// `change:resolution`
    Resolution,
}

/// What a view listener does when its event fires
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum ViewAction {
    /// Mark the layer changed so it is redrawn
    RefreshLayer(LayerId),
}

#[derive(Debug)]
struct ViewListener {
    key: ListenerKey,
    event: ViewEvent,
    action: ViewAction,
}

/// A live map: one view, ordered layers, interactions and overlays bound to
/// a target pane.
pub struct MapInstance {
    generation: u64,
    target: Option<Rc<MapTarget>>,
    view: View,
    layers: Vec<Layer>,
    interactions: Vec<Rc<Select>>,
    overlays: Vec<Overlay>,
    view_listeners: Vec<ViewListener>,
    fetcher: Arc<dyn FeatureFetcher>,
    loads_tx: Sender<LoadResult>,
    loads_rx: Receiver<LoadResult>,
    pending_loads: usize,
}

impl MapInstance {
    /// Create a map bound to `target`. Fails if the view options are
    /// invalid or another live instance still owns the target.
    pub fn new(
        generation: u64,
        target: Rc<MapTarget>,
        options: &ViewOptions,
        fetcher: Arc<dyn FeatureFetcher>,
    ) -> Result<Self, MapError> {
        if let Some(owner) = target.bound_generation() {
            return Err(MapError::TargetInUse {
                selector: target.selector().to_string(),
                generation: owner,
            });
        }
        let (width, height) = target.size();
        let view = View::new(options, width, height)?;

        target.bound_to.set(Some(generation));
        let (loads_tx, loads_rx) = mpsc::channel();
        Ok(Self {
            generation,
            target: Some(target),
            view,
            layers: Vec::new(),
            interactions: Vec::new(),
            overlays: Vec::new(),
            view_listeners: Vec::new(),
            fetcher,
            loads_tx,
            loads_rx,
            pending_loads: 0,
        })
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn target(&self) -> Option<&Rc<MapTarget>> {
        self.target.as_ref()
    }

    /// Bind or unbind the target pane
    pub fn set_target(&mut self, target: Option<Rc<MapTarget>>) {
        if let Some(old) = self.target.take() {
            if old.bound_generation() == Some(self.generation) {
                old.bound_to.set(None);
            }
            old.set_cursor(Cursor::Default);
        }
        if let Some(new) = &target {
            new.bound_to.set(Some(self.generation));
        }
        self.target = target;
    }

    pub fn view(&self) -> &View {
        &self.view
    }

    /// Re-read the target size after a resize
    pub fn update_size(&mut self) {
        if let Some(target) = &self.target {
            let (width, height) = target.size();
            self.view.set_size(width, height);
        }
    }

    pub fn pan(&mut self, dx: i32, dy: i32) {
        self.view.pan(dx, dy);
    }

    /// Zoom around a pixel, or the view center when `at` is `None`
    pub fn zoom(&mut self, factor: f64, at: Option<(i32, i32)>) {
        let changed = match at {
            Some((px, py)) => self.view.zoom_at(px, py, factor),
            None => self.view.zoom_by(factor),
        };
        if changed {
            self.fire_view_event(ViewEvent::Resolution);
        }
    }

    // Layers

    /// Add a layer unless one with the same id is already present.
    /// Returns true if the layer was added.
    pub fn add_layer(&mut self, layer: Layer) -> bool {
        if self.has_layer(layer.id()) {
            return false;
        }
        self.layers.push(layer);
        true
    }

    pub fn has_layer(&self, id: LayerId) -> bool {
        self.layers.iter().any(|l| l.id() == id)
    }

    pub fn layer(&self, id: LayerId) -> Option<&Layer> {
        self.layers.iter().find(|l| l.id() == id)
    }

    pub fn layer_by_name(&self, name: &str) -> Option<&Layer> {
        self.layers.iter().find(|l| l.name() == name)
    }

    /// Layers in registration order
    pub fn layers(&self) -> &[Layer] {
        &self.layers
    }

    pub fn layer_ids(&self) -> Vec<LayerId> {
        self.layers.iter().map(Layer::id).collect()
    }

    pub fn remove_layer(&mut self, id: LayerId) -> Result<Layer, EngineError> {
        let idx = self
            .layers
            .iter()
            .position(|l| l.id() == id)
            .ok_or(EngineError::UnknownLayer(id))?;
        Ok(self.layers.remove(idx))
    }

    // Interactions

    pub fn add_interaction(&mut self, select: Rc<Select>) {
        if !self.interactions.iter().any(|s| s.id() == select.id()) {
            self.interactions.push(select);
        }
    }

    pub fn remove_interaction(&mut self, id: InteractionId) -> Result<Rc<Select>, EngineError> {
        let idx = self
            .interactions
            .iter()
            .position(|s| s.id() == id)
            .ok_or(EngineError::UnknownInteraction(id))?;
        Ok(self.interactions.remove(idx))
    }

    pub fn interactions(&self) -> &[Rc<Select>] {
        &self.interactions
    }

    pub fn interaction_ids(&self) -> Vec<InteractionId> {
        self.interactions.iter().map(|s| s.id()).collect()
    }

    // Overlays

    pub fn add_overlay(&mut self, overlay: Overlay) {
        if !self.overlays.iter().any(|o| o.id() == overlay.id()) {
            self.overlays.push(overlay);
        }
    }

    /// Remove an overlay, hiding its element
    pub fn remove_overlay(&mut self, id: OverlayId) -> Result<Overlay, EngineError> {
        let idx = self
            .overlays
            .iter()
            .position(|o| o.id() == id)
            .ok_or(EngineError::UnknownOverlay(id))?;
        let handle = self.overlays[idx].element();
        let mut element = handle.try_borrow_mut().map_err(|_| EngineError::OverlayBusy(id))?;
        element.position = None;
        Ok(self.overlays.remove(idx))
    }

    pub fn overlays(&self) -> &[Overlay] {
        &self.overlays
    }

    pub fn overlay_ids(&self) -> Vec<OverlayId> {
        self.overlays.iter().map(Overlay::id).collect()
    }

    // View listeners

    pub fn on_view_event(&mut self, event: ViewEvent, action: ViewAction) -> ListenerKey {
        let key = ListenerKey::next();
        self.view_listeners.push(ViewListener { key, event, action });
        key
    }

    pub fn un_view_event(&mut self, key: ListenerKey) -> bool {
        let before = self.view_listeners.len();
        self.view_listeners.retain(|l| l.key != key);
        self.view_listeners.len() != before
    }

    pub fn view_listener_count(&self) -> usize {
        self.view_listeners.len()
    }

    /// Drop every view listener, returning how many there were
    pub fn clear_view_listeners(&mut self) -> usize {
        std::mem::take(&mut self.view_listeners).len()
    }

    fn fire_view_event(&mut self, event: ViewEvent) {
        let actions: Vec<ViewAction> = self
            .view_listeners
            .iter()
            .filter(|l| l.event == event)
            .map(|l| l.action)
            .collect();
        for action in actions {
            match action {
                ViewAction::RefreshLayer(id) => {
                    if let Some(layer) = self.layers.iter_mut().find(|l| l.id() == id) {
                        layer.changed();
                    }
                }
            }
        }
    }

    // Pointer handling

    /// Run a pointer event through every interaction whose condition matches.
    /// Returns how many select events were emitted.
    pub fn handle_pointer(&mut self, event: PointerEvent) -> usize {
        // Listeners run user code; hold our own handles rather than borrowing self
        let selects: Vec<Rc<Select>> = self
            .interactions
            .iter()
            .filter(|s| s.condition().matches(event.kind))
            .cloned()
            .collect();

        let mut emitted = 0;
        for select in selects {
            let hit = self.hit_test(select.layers(), event.pixel);
            if let Some(select_event) = select.update(event.kind, hit) {
                select.dispatch(&select_event);
                emitted += 1;
            }
        }
        emitted
    }

    /// Nearest point feature of the given layers within the hit tolerance,
    /// topmost layer first
    pub fn hit_test(&self, layers: &[LayerId], pixel: (i32, i32)) -> Option<Feature> {
        let (lon, lat) = self.view.unproject(pixel.0, pixel.1);
        let radius = self.view.degrees_per_pixel() * HIT_TOLERANCE_PX as f64 * 2.0;
        let max_dist2 = HIT_TOLERANCE_PX * HIT_TOLERANCE_PX;

        let mut candidates: Vec<&Layer> = self.layers.iter().filter(|l| layers.contains(&l.id())).collect();
        candidates.sort_by(|a, b| b.tier().cmp(&a.tier()));

        for layer in candidates {
            let handle = layer.source();
            let Ok(source) = handle.try_borrow() else {
                continue;
            };
            let nearest = source
                .points_near(DVec2::new(lon, lat), radius)
                .filter_map(|f| {
                    let p = f.geometry.as_point()?;
                    let (fx, fy) = self.view.project_coord(p);
                    let d2 = (fx - pixel.0).pow(2) + (fy - pixel.1).pow(2);
                    (d2 <= max_dist2).then_some((d2, f))
                })
                .min_by_key(|(d2, _)| *d2);
            if let Some((_, feature)) = nearest {
                return Some(feature.clone());
            }
        }
        None
    }

    // Remote loads

    /// Start loads for remote layers that have not been fetched yet.
    /// Called before each frame; loads run on the rayon pool.
    pub fn prepare_frame(&mut self) -> usize {
        let mut started = 0;
        for layer in &self.layers {
            let handle = layer.source();
            let Ok(mut source) = handle.try_borrow_mut() else {
                continue;
            };
            let Some((url, revision)) = source.begin_load() else {
                continue;
            };

            let tx = self.loads_tx.clone();
            let fetcher = Arc::clone(&self.fetcher);
            let generation = self.generation;
            let layer_id = layer.id();
            debug!(%layer_id, url = %url, "loading layer source");
            rayon::spawn(move || {
                let outcome = fetcher.fetch(&url).map_err(|e| format!("{url}: {e:#}"));
                // The map may be gone by now; nothing to do then
                let _ = tx.send(LoadResult {
                    generation,
                    layer: layer_id,
                    revision,
                    outcome,
                });
            });
            started += 1;
        }
        self.pending_loads += started;
        started
    }

    /// Apply every load that has finished. Returns how many were applied.
    pub fn poll_loads(&mut self) -> usize {
        let mut applied = 0;
        while let Ok(result) = self.loads_rx.try_recv() {
            applied += usize::from(self.apply_load(result));
        }
        applied
    }

    /// Block until every started load has arrived or the timeout passes
    pub fn settle_loads(&mut self, timeout: Duration) -> usize {
        let deadline = Instant::now() + timeout;
        let mut applied = 0;
        while self.pending_loads > 0 {
            let remaining = deadline.saturating_duration_since(Instant::now());
            match self.loads_rx.recv_timeout(remaining) {
                Ok(result) => applied += usize::from(self.apply_load(result)),
                Err(RecvTimeoutError::Timeout) | Err(RecvTimeoutError::Disconnected) => break,
            }
        }
        applied
    }

    pub fn pending_loads(&self) -> usize {
        self.pending_loads
    }

    /// Apply a load if the layer and source revision it was made for still
    /// exist on this map. Stale results are dropped.
    pub(crate) fn apply_load(&mut self, result: LoadResult) -> bool {
        self.pending_loads = self.pending_loads.saturating_sub(1);

        if result.generation != self.generation {
            debug!(layer = %result.layer, generation = result.generation, "dropping load for another map");
            return false;
        }
        let Some(layer) = self.layer(result.layer) else {
            debug!(layer = %result.layer, "dropping load for removed layer");
            return false;
        };
        let handle = layer.source();
        let Ok(mut source) = handle.try_borrow_mut() else {
            warn!(layer = %result.layer, "source busy, dropping load");
            return false;
        };
        if source.revision() != result.revision {
            debug!(layer = %result.layer, "dropping load for cleared source");
            return false;
        }

        if let Err(err) = &result.outcome {
            warn!(layer = %result.layer, error = %err, "boundary load failed, layer stays empty");
        }
        source.finish_load(result.outcome);
        true
    }
}

impl Drop for MapInstance {
    fn drop(&mut self) {
        // Never leave the pane bound to a dead instance
        self.set_target(None);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::map::{Condition, Geometry, LoadState, Tier, VectorSource};
    use anyhow::{bail, Result};
    use std::cell::RefCell;

    struct FixedFetcher;

    impl FeatureFetcher for FixedFetcher {
        fn fetch(&self, url: &str) -> Result<Vec<Feature>> {
            if url.contains("missing") {
                bail!("no such resource");
            }
            Ok(vec![Feature::new(Geometry::LineString(vec![
                DVec2::new(100.0, 30.0),
                DVec2::new(101.0, 31.0),
            ]))])
        }
    }

    fn options() -> ViewOptions {
        ViewOptions {
            center: [116.4, 39.9],
            zoom: 8.0,
            min_zoom: 1.0,
            max_zoom: 50.0,
            extent: [70.0, 15.0, 140.0, 55.0],
        }
    }

    fn map(target: &Rc<MapTarget>) -> MapInstance {
        MapInstance::new(1, Rc::clone(target), &options(), Arc::new(FixedFetcher)).unwrap()
    }

    fn point_layer(lon: f64, lat: f64) -> Layer {
        let mut source = VectorSource::local();
        source.add_feature(Feature::new(Geometry::Point(DVec2::new(lon, lat))));
        Layer::new("points", Tier::Marker, source)
    }

    #[test]
    fn target_can_only_be_bound_once() {
        let target = MapTarget::new("#map", 200, 100);
        let first = map(&target);
        let second = MapInstance::new(2, Rc::clone(&target), &options(), Arc::new(FixedFetcher));
        assert!(matches!(second, Err(MapError::TargetInUse { generation: 1, .. })));

        drop(first);
        assert_eq!(target.bound_generation(), None);
        assert!(MapInstance::new(3, target, &options(), Arc::new(FixedFetcher)).is_ok());
    }

    #[test]
    fn add_layer_is_idempotent_by_id() {
        let target = MapTarget::new("#map", 200, 100);
        let mut map = map(&target);
        let layer = point_layer(116.4, 39.9);
        let id = layer.id();
        assert!(map.add_layer(layer));

        let again = map.remove_layer(id).unwrap();
        assert!(map.add_layer(again));
        assert_eq!(map.layers().len(), 1);
        assert!(matches!(map.remove_layer(LayerId(u64::MAX)), Err(EngineError::UnknownLayer(_))));
    }

    #[test]
    fn pointer_hits_nearby_points_only() {
        let target = MapTarget::new("#map", 200, 100);
        let mut map = map(&target);
        let layer = point_layer(116.4, 39.9);
        let id = layer.id();
        map.add_layer(layer);

        let (px, py) = map.view().project(116.4, 39.9);
        assert!(map.hit_test(&[id], (px + 1, py)).is_some());
        assert!(map.hit_test(&[id], (px + 40, py)).is_none());
        assert!(map.hit_test(&[LayerId(u64::MAX)], (px, py)).is_none());
    }

    #[test]
    fn pointer_events_reach_matching_interactions() {
        let target = MapTarget::new("#map", 200, 100);
        let mut map = map(&target);
        let layer = point_layer(116.4, 39.9);
        let select = Select::new(vec![layer.id()], Condition::Click);
        map.add_layer(layer);
        map.add_interaction(Rc::clone(&select));

        let hits = Rc::new(RefCell::new(Vec::new()));
        let seen = Rc::clone(&hits);
        select.on(move |e| seen.borrow_mut().push(e.selected.len()));

        let (px, py) = map.view().project(116.4, 39.9);
        assert_eq!(map.handle_pointer(PointerEvent::moved(px, py)), 0);
        assert_eq!(map.handle_pointer(PointerEvent::click(px, py)), 1);
        assert_eq!(map.handle_pointer(PointerEvent::click(0, 0)), 1);
        assert_eq!(*hits.borrow(), vec![1, 0]);
    }

    #[test]
    fn remote_sources_load_lazily() {
        let target = MapTarget::new("#map", 200, 100);
        let mut map = map(&target);
        let ok = Layer::new("ok", Tier::Boundary, VectorSource::remote("/geojson/china/beijing.json"));
        let bad = Layer::new("bad", Tier::Boundary, VectorSource::remote("/geojson/china/missing.json"));
        let (ok_source, bad_source) = (ok.source(), bad.source());
        map.add_layer(ok);
        map.add_layer(bad);

        assert_eq!(ok_source.borrow().state(), LoadState::Idle);
        assert_eq!(map.prepare_frame(), 2);
        assert_eq!(map.prepare_frame(), 0);
        assert_eq!(map.settle_loads(Duration::from_secs(5)), 2);

        assert_eq!(ok_source.borrow().state(), LoadState::Ready);
        assert_eq!(ok_source.borrow().len(), 1);
        assert_eq!(bad_source.borrow().state(), LoadState::Failed);
        assert!(bad_source.borrow().is_empty());
    }

    #[test]
    fn loads_for_cleared_sources_are_dropped() {
        let target = MapTarget::new("#map", 200, 100);
        let mut map = map(&target);
        let layer = Layer::new("b", Tier::Boundary, VectorSource::remote("/geojson/china/beijing.json"));
        let (id, source) = (layer.id(), layer.source());
        map.add_layer(layer);

        let revision = source.borrow_mut().begin_load().unwrap().1;
        source.borrow_mut().clear();

        let late = LoadResult {
            generation: map.generation(),
            layer: id,
            revision,
            outcome: Ok(vec![Feature::new(Geometry::Point(DVec2::ZERO))]),
        };
        assert!(!map.apply_load(late));
        assert!(source.borrow().is_empty());

        let foreign = LoadResult {
            generation: map.generation() + 1,
            layer: id,
            revision: source.borrow().revision(),
            outcome: Ok(vec![Feature::new(Geometry::Point(DVec2::ZERO))]),
        };
        assert!(!map.apply_load(foreign));
        assert!(source.borrow().is_empty());
    }

    #[test]
    fn zoom_fires_resolution_listeners() {
        let target = MapTarget::new("#map", 200, 100);
        let mut map = map(&target);
        let layer = point_layer(116.4, 39.9);
        let id = layer.id();
        map.add_layer(layer);
        map.on_view_event(ViewEvent::Resolution, ViewAction::RefreshLayer(id));

        map.zoom(1.5, None);
        map.pan(3, 0);
        assert_eq!(map.layer(id).unwrap().revision(), 1);
        assert_eq!(map.clear_view_listeners(), 1);
        map.zoom(1.5, Some((10, 10)));
        assert_eq!(map.layer(id).unwrap().revision(), 1);
    }

    #[test]
    fn resize_follows_target() {
        let target = MapTarget::new("#map", 200, 100);
        let mut map = map(&target);
        target.set_size(80, 40);
        map.update_size();
        assert_eq!((map.view().width, map.view().height), (80, 40));
    }

    #[test]
    fn busy_overlay_cannot_be_removed() {
        let target = MapTarget::new("#map", 200, 100);
        let mut map = map(&target);
        let overlay = Overlay::new((0, 0));
        let (id, element) = (overlay.id(), overlay.element());
        map.add_overlay(overlay);

        let guard = element.borrow();
        assert_eq!(map.remove_overlay(id).unwrap_err(), EngineError::OverlayBusy(id));
        drop(guard);
        assert!(map.remove_overlay(id).is_ok());
        assert!(map.overlays().is_empty());
    }
}
