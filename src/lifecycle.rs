//! Creation and teardown of the map, and the wiring of its marker
//! interactions.
//!
//! [`MapLifecycle`] owns the single live [`MapInstance`]. `init_map` always
//! tears down the previous instance before building a new one, so no two
//! instances ever share the target pane. Teardown is best effort: every
//! resource is removed independently and failures end up in a
//! [`TeardownReport`] instead of aborting the sequence.

use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;
use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::boundary::BoundaryLayerSet;
use crate::error::{EngineError, MapError};
use crate::map::{
    Condition, Cursor, Feature, FeatureFetcher, Layer, LayerId, ListenerKey, MapInstance, MapTarget, PointerEvent,
    Tier, VectorSource, ViewAction, ViewEvent, ViewOptions,
};
use crate::marker::{
    build_marker_layer, Interaction, MarkerDataSource, MarkerPreviewController, PreviewState, MARKER_LAYER_NAME,
};
use crate::navigation::{NavigationOutcome, Navigator};
use crate::style::base_style;

/// Selector of the pane the map renders into
pub const MAP_SELECTOR: &str = "#map";

pub const BASE_LAYER_NAME: &str = "base";

/// Everything needed to build a map
pub struct MapSettings {
    pub view: ViewOptions,
    pub region: String,
    pub region_keys: Vec<String>,
    /// Features of the base outline layer
    pub base_features: Vec<Feature>,
    pub markers: MarkerDataSource,
    pub fetcher: Arc<dyn FeatureFetcher>,
}

impl MapSettings {
    pub fn new(fetcher: Arc<dyn FeatureFetcher>) -> Self {
        Self {
            view: ViewOptions::default(),
            region: "china".to_string(),
            region_keys: Vec::new(),
            base_features: Vec::new(),
            markers: MarkerDataSource::default(),
            fetcher,
        }
    }
}

impl fmt::Debug for MapSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MapSettings")
            .field("view", &self.view)
            .field("region", &self.region)
            .field("region_keys", &self.region_keys)
            .field("base_features", &self.base_features.len())
            .field("markers", &self.markers.len())
            .finish()
    }
}

/// Class of resource removed during teardown
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum ResourceKind {
    Interaction,
    Overlay,
    Layer,
}

/// One resource that could not be released cleanly
#[derive(Debug, Clone, PartialEq)]
pub struct TeardownFailure {
    pub kind: ResourceKind,
    pub resource: String,
    pub error: EngineError,
}

/// Outcome of `destroy_map`
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TeardownReport {
    /// Generation of the destroyed map; `None` when there was nothing to destroy
    pub generation: Option<u64>,
    pub interactions: usize,
    pub listeners: usize,
    pub overlays: usize,
    pub layers: usize,
    pub view_listeners: usize,
    pub failures: Vec<TeardownFailure>,
}

impl TeardownReport {
    pub fn is_noop(&self) -> bool {
        self.generation.is_none()
    }

    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }

    pub fn failed(&self, kind: ResourceKind) -> bool {
        self.failures.iter().any(|f| f.kind == kind)
    }

    fn fail(&mut self, kind: ResourceKind, resource: impl Into<String>, error: EngineError) {
        let resource = resource.into();
        warn!(?kind, %resource, %error, "failed to release map resource");
        self.failures.push(TeardownFailure { kind, resource, error });
    }
}

/// Whether the terminal resize listener has been registered
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum ResizeState {
    Unregistered,
    Listening,
}

/// The live hover/click pair on the marker layer
#[derive(Debug, Default)]
struct MarkerBindings {
    hover: Option<Interaction>,
    click: Option<Interaction>,
}

impl MarkerBindings {
    /// Clean up and unmount the current pair, whatever it is
    fn release(&mut self, map: &mut MapInstance, report: &mut TeardownReport) {
        for mut interaction in [self.hover.take(), self.click.take()].into_iter().flatten() {
            report.listeners += interaction.cleanup();
            let id = interaction.id();
            match interaction.unmount(map) {
                Ok(()) => report.interactions += 1,
                Err(error) => report.fail(ResourceKind::Interaction, id.to_string(), error),
            }
        }
    }
}

/// Owns the current map and everything bound to it
pub struct MapLifecycle {
    settings: MapSettings,
    target: Option<Rc<MapTarget>>,
    generation: u64,
    map: Option<MapInstance>,
    boundaries: BoundaryLayerSet,
    bindings: MarkerBindings,
    preview: Option<Rc<RefCell<MarkerPreviewController>>>,
    navigator: Navigator,
    last_navigation: Rc<RefCell<Option<NavigationOutcome>>>,
    resolution_listener: Option<ListenerKey>,
    resize: ResizeState,
    resize_registrations: usize,
}

impl fmt::Debug for MapLifecycle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MapLifecycle")
            .field("settings", &self.settings)
            .field("generation", &self.generation)
            .field("live", &self.map.is_some())
            .field("resize", &self.resize)
            .finish()
    }
}

impl MapLifecycle {
    pub fn new(settings: MapSettings, navigator: Navigator) -> Self {
        let boundaries = BoundaryLayerSet::new(settings.region.clone(), settings.region_keys.iter().cloned());
        Self {
            settings,
            target: None,
            generation: 0,
            map: None,
            boundaries,
            bindings: MarkerBindings::default(),
            preview: None,
            navigator,
            last_navigation: Rc::new(RefCell::new(None)),
            resolution_listener: None,
            resize: ResizeState::Unregistered,
            resize_registrations: 0,
        }
    }

    /// Provide the pane maps render into
    pub fn attach_target(&mut self, target: Rc<MapTarget>) {
        self.target = Some(target);
    }

    pub fn target(&self) -> Option<&Rc<MapTarget>> {
        self.target.as_ref()
    }

    /// Build a fresh map, tearing down the current one first.
    ///
    /// Layers are registered base first, then boundaries, then markers.
    pub fn init_map(&mut self) -> Result<(), MapError> {
        if self.map.is_some() {
            let report = self.destroy_map();
            debug!(generation = ?report.generation, clean = report.is_clean(), "previous map destroyed");
        }

        let target = self
            .target
            .clone()
            .ok_or_else(|| MapError::MissingTarget(MAP_SELECTOR.to_string()))?;

        let generation = self.generation + 1;
        let mut map = MapInstance::new(generation, target, &self.settings.view, Arc::clone(&self.settings.fetcher))?;
        self.generation = generation;

        let mut base = VectorSource::local();
        base.extend(self.settings.base_features.iter().cloned());
        map.add_layer(Layer::new(BASE_LAYER_NAME, Tier::Base, base).with_style(base_style));

        self.boundaries.setup(&mut map);

        let markers = build_marker_layer(&self.settings.markers);
        let marker_layer = markers.id();
        map.add_layer(markers);
        self.resolution_listener = Some(map.on_view_event(ViewEvent::Resolution, ViewAction::RefreshLayer(marker_layer)));

        let preview = MarkerPreviewController::new();
        map.add_overlay(preview.overlay().clone());
        self.preview = Some(Rc::new(RefCell::new(preview)));

        self.bind_marker_events(&mut map, marker_layer);

        if self.resize == ResizeState::Unregistered {
            self.resize = ResizeState::Listening;
            self.resize_registrations += 1;
            debug!("resize listener registered");
        }

        info!(
            generation,
            layers = map.layers().len(),
            markers = self.settings.markers.len(),
            "map initialised"
        );
        self.map = Some(map);
        Ok(())
    }

    /// Tear down the current map. Does nothing when there is none.
    ///
    /// Order: interactions, overlays, layers (sources cleared first), view
    /// listeners, target. The map reference is always released.
    pub fn destroy_map(&mut self) -> TeardownReport {
        let Some(mut map) = self.map.take() else {
            return TeardownReport::default();
        };
        let mut report = TeardownReport {
            generation: Some(map.generation()),
            ..TeardownReport::default()
        };

        self.bindings.release(&mut map, &mut report);
        for id in map.interaction_ids() {
            match map.remove_interaction(id) {
                Ok(_) => report.interactions += 1,
                Err(error) => report.fail(ResourceKind::Interaction, id.to_string(), error),
            }
        }

        for id in map.overlay_ids() {
            match map.remove_overlay(id) {
                Ok(_) => report.overlays += 1,
                Err(error) => report.fail(ResourceKind::Overlay, id.to_string(), error),
            }
        }
        self.preview = None;

        for id in map.layer_ids() {
            if let Err(error) = clear_layer_source(&map, id) {
                let name = map.layer(id).map(|l| l.name().to_string()).unwrap_or_else(|| id.to_string());
                report.fail(ResourceKind::Layer, name, error);
            }
            match map.remove_layer(id) {
                Ok(_) => report.layers += 1,
                Err(error) => report.fail(ResourceKind::Layer, id.to_string(), error),
            }
        }

        self.resolution_listener = None;
        report.view_listeners = map.clear_view_listeners();

        map.set_target(None);
        drop(map);

        info!(
            generation = ?report.generation,
            interactions = report.interactions,
            overlays = report.overlays,
            layers = report.layers,
            failures = report.failures.len(),
            "map destroyed"
        );
        report
    }

    /// Replace the hover/click pair on the live map. Returns false if there
    /// is no map or it has no marker layer.
    pub fn rebind_marker_events(&mut self) -> bool {
        let Some(mut map) = self.map.take() else {
            return false;
        };
        let rebound = match map.layer_by_name(MARKER_LAYER_NAME).map(Layer::id) {
            Some(layer) => {
                self.bind_marker_events(&mut map, layer);
                true
            }
            None => false,
        };
        self.map = Some(map);
        rebound
    }

    /// Bind a new hover/click pair, fully releasing the previous one first
    fn bind_marker_events(&mut self, map: &mut MapInstance, layer: LayerId) {
        let mut report = TeardownReport::default();
        self.bindings.release(map, &mut report);

        // The released hover select held the selection, so reset what it drove
        if let Some(preview) = &self.preview {
            match preview.try_borrow_mut() {
                Ok(mut preview) => preview.hide(),
                Err(_) => warn!("preview busy, not hidden on rebind"),
            }
        }
        if let Some(target) = map.target() {
            target.set_cursor(Cursor::Default);
        }

        let mut hover = Interaction::new(layer, Condition::PointerMove);
        hover.mount(map);
        let target = map.target().map(Rc::downgrade);
        let preview = self.preview.clone();
        hover.on(move |event| {
            if let Some(target) = target.as_ref().and_then(|t| t.upgrade()) {
                target.set_cursor(if event.hit { Cursor::Pointer } else { Cursor::Default });
            }
            let Some(preview) = &preview else {
                return;
            };
            match preview.try_borrow_mut() {
                Ok(mut preview) => preview.handle(event),
                Err(_) => warn!("preview busy, hover event dropped"),
            }
        });

        let mut click = Interaction::new(layer, Condition::Click);
        click.mount(map);
        let navigator = self.navigator.clone();
        let last = Rc::clone(&self.last_navigation);
        click.on(move |event| {
            let outcome = navigator.handle_click(event);
            if outcome != NavigationOutcome::Ignored {
                last.replace(Some(outcome));
            }
        });

        self.bindings.hover = Some(hover);
        self.bindings.click = Some(click);
        debug!(%layer, released = report.interactions, "marker events bound");
    }

    /// Resize notification from the terminal. Ignored until the listener is
    /// registered by the first `init_map`.
    pub fn handle_resize(&mut self, width: usize, height: usize) -> bool {
        if self.resize != ResizeState::Listening {
            return false;
        }
        if let Some(target) = &self.target {
            target.set_size(width, height);
        }
        if let Some(map) = &mut self.map {
            map.update_size();
        }
        true
    }

    /// Feed a pointer event to the live map
    pub fn handle_pointer(&mut self, event: PointerEvent) -> usize {
        match &mut self.map {
            Some(map) => map.handle_pointer(event),
            None => 0,
        }
    }

    /// The navigation the last click caused, if not yet consumed
    pub fn take_navigation(&self) -> Option<NavigationOutcome> {
        self.last_navigation.borrow_mut().take()
    }

    pub fn map(&self) -> Option<&MapInstance> {
        self.map.as_ref()
    }

    pub fn map_mut(&mut self) -> Option<&mut MapInstance> {
        self.map.as_mut()
    }

    pub fn is_live(&self) -> bool {
        self.map.is_some()
    }

    /// Generation of the most recently created map
    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn hover_interaction(&self) -> Option<&Interaction> {
        self.bindings.hover.as_ref()
    }

    pub fn click_interaction(&self) -> Option<&Interaction> {
        self.bindings.click.as_ref()
    }

    pub fn preview_state(&self) -> Option<PreviewState> {
        let preview = self.preview.as_ref()?;
        let state = preview.try_borrow().ok()?.state().clone();
        Some(state)
    }

    pub fn resize_state(&self) -> ResizeState {
        self.resize
    }

    /// How many times the resize listener was registered
    pub fn resize_registrations(&self) -> usize {
        self.resize_registrations
    }

    pub fn resolution_listener(&self) -> Option<ListenerKey> {
        self.resolution_listener
    }

    pub fn settings(&self) -> &MapSettings {
        &self.settings
    }

    pub fn boundaries(&self) -> &BoundaryLayerSet {
        &self.boundaries
    }
}

/// Empty a layer's data source so no feature outlives the map
fn clear_layer_source(map: &MapInstance, id: LayerId) -> Result<(), EngineError> {
    let layer = map.layer(id).ok_or(EngineError::UnknownLayer(id))?;
    let source = layer.source();
    let mut source = source.try_borrow_mut().map_err(|_| EngineError::SourceBusy(id))?;
    source.clear();
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::marker::{DisplayInfo, MarkerRecord};
    use crate::navigation::ExternalLocation;

    struct NoFetch;

    impl FeatureFetcher for NoFetch {
        fn fetch(&self, _url: &str) -> anyhow::Result<Vec<Feature>> {
            Ok(Vec::new())
        }
    }

    fn lifecycle() -> MapLifecycle {
        let mut settings = MapSettings::new(Arc::new(NoFetch));
        settings.region_keys = vec!["beijing".into(), "sichuan".into()];
        settings.markers = MarkerDataSource::new(vec![MarkerRecord::new(
            1,
            Some([116.4, 39.9]),
            Some("/beijing"),
            DisplayInfo::titled("Beijing"),
        )]);
        let navigator = Navigator::new(None, Rc::new(ExternalLocation::new("https://example.org")));
        let mut lifecycle = MapLifecycle::new(settings, navigator);
        lifecycle.attach_target(MapTarget::new(MAP_SELECTOR, 200, 100));
        lifecycle
    }

    #[test]
    fn init_without_target_fails() {
        let settings = MapSettings::new(Arc::new(NoFetch));
        let navigator = Navigator::new(None, Rc::new(ExternalLocation::default()));
        let mut lifecycle = MapLifecycle::new(settings, navigator);

        assert_eq!(lifecycle.init_map(), Err(MapError::MissingTarget(MAP_SELECTOR.into())));
        assert!(!lifecycle.is_live());
        assert_eq!(lifecycle.resize_registrations(), 0);
    }

    #[test]
    fn invalid_view_fails_without_binding_target() {
        let mut lifecycle = lifecycle();
        lifecycle.settings.view.zoom = 1_000.0;

        assert!(matches!(lifecycle.init_map(), Err(MapError::InvalidView(_))));
        assert_eq!(lifecycle.target().unwrap().bound_generation(), None);
        assert_eq!(lifecycle.generation(), 0);
    }

    #[test]
    fn layers_are_registered_in_order() {
        let mut lifecycle = lifecycle();
        lifecycle.init_map().unwrap();

        let tiers: Vec<Tier> = lifecycle.map().unwrap().layers().iter().map(Layer::tier).collect();
        assert_eq!(tiers, vec![Tier::Base, Tier::Boundary, Tier::Boundary, Tier::Marker]);
        assert_eq!(lifecycle.map().unwrap().overlays().len(), 1);
        assert_eq!(lifecycle.map().unwrap().view_listener_count(), 1);
        assert_eq!(lifecycle.resize_state(), ResizeState::Listening);
    }

    #[test]
    fn destroy_releases_everything() {
        let mut lifecycle = lifecycle();
        lifecycle.init_map().unwrap();
        let target = Rc::clone(lifecycle.target().unwrap());

        let report = lifecycle.destroy_map();
        assert!(report.is_clean());
        assert_eq!(report.generation, Some(1));
        assert_eq!(report.interactions, 2);
        assert_eq!(report.listeners, 2);
        assert_eq!(report.overlays, 1);
        assert_eq!(report.layers, 4);
        assert_eq!(report.view_listeners, 1);
        assert!(!lifecycle.is_live());
        assert!(lifecycle.hover_interaction().is_none());
        assert_eq!(target.bound_generation(), None);

        assert!(lifecycle.destroy_map().is_noop());
    }

    #[test]
    fn rebind_replaces_the_pair() {
        let mut lifecycle = lifecycle();
        lifecycle.init_map().unwrap();
        let before = lifecycle.hover_interaction().unwrap().id();

        assert!(lifecycle.rebind_marker_events());
        assert!(lifecycle.rebind_marker_events());

        let map = lifecycle.map().unwrap();
        assert_eq!(map.interactions().len(), 2);
        assert!(!map.interaction_ids().contains(&before));
        assert_eq!(lifecycle.hover_interaction().unwrap().listener_count(), 1);
    }

    #[test]
    fn rebind_resets_hover_state() {
        let mut lifecycle = lifecycle();
        lifecycle.init_map().unwrap();
        let target = Rc::clone(lifecycle.target().unwrap());
        let (px, py) = lifecycle.map().unwrap().view().project(116.4, 39.9);

        lifecycle.handle_pointer(PointerEvent::moved(px, py));
        assert!(lifecycle.preview_state().unwrap().is_visible());
        assert_eq!(target.cursor(), Cursor::Pointer);

        assert!(lifecycle.rebind_marker_events());
        assert!(!lifecycle.preview_state().unwrap().is_visible());
        assert_eq!(target.cursor(), Cursor::Default);

        lifecycle.handle_pointer(PointerEvent::moved(0, 0));
        assert!(!lifecycle.preview_state().unwrap().is_visible());
        assert_eq!(target.cursor(), Cursor::Default);
    }

    #[test]
    fn resize_is_ignored_before_first_init() {
        let mut lifecycle = lifecycle();
        assert!(!lifecycle.handle_resize(80, 40));
        lifecycle.init_map().unwrap();
        assert!(lifecycle.handle_resize(80, 40));
        assert_eq!(lifecycle.map().unwrap().view().width, 80);
    }
}
