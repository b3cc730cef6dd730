use std::cell::RefCell;
use std::rc::Rc;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use anyhow::{bail, Result};
use glam::DVec2;

use travel_map::error::{EngineError, MapError, NavigationError};
use travel_map::lifecycle::{MapLifecycle, MapSettings, ResizeState, ResourceKind, MAP_SELECTOR};
use travel_map::map::{
    Cursor, Feature, FeatureFetcher, Geometry, LoadState, MapTarget, PointerEvent, Tier, MapInstance,
};
use travel_map::marker::{DisplayInfo, MarkerDataSource, MarkerRecord, MARKER_LAYER_NAME};
use travel_map::navigation::{ExternalLocation, NavigationOutcome, Navigator, Router};

/// Serves a square for `beijing`, fails for anything else
struct StaticFetcher {
    delay: Duration,
}

impl FeatureFetcher for StaticFetcher {
    fn fetch(&self, url: &str) -> Result<Vec<Feature>> {
        thread::sleep(self.delay);
        if !url.ends_with("/beijing.json") {
            bail!("404 {url}");
        }
        let ring = vec![
            DVec2::new(115.4, 39.4),
            DVec2::new(117.5, 39.4),
            DVec2::new(117.5, 41.1),
            DVec2::new(115.4, 39.4),
        ];
        Ok(vec![Feature::new(Geometry::Polygon(vec![ring]))])
    }
}

#[derive(Default)]
struct RecordingRouter {
    calls: RefCell<Vec<String>>,
    reject: bool,
}

impl Router for RecordingRouter {
    fn navigate(&self, path: &str) -> Result<(), NavigationError> {
        self.calls.borrow_mut().push(path.to_string());
        if self.reject {
            return Err(NavigationError::UnknownRoute(path.to_string()));
        }
        Ok(())
    }
}

fn journal() -> MarkerDataSource {
    MarkerDataSource::new(vec![
        MarkerRecord::new(1, Some([116.4, 39.9]), Some("/beijing"), DisplayInfo::titled("Beijing")),
        MarkerRecord::new(2, None, Some("/nowhere"), DisplayInfo::titled("Nowhere")),
    ])
}

fn lifecycle_with(router: Option<Rc<RecordingRouter>>, delay: Duration) -> MapLifecycle {
    let mut settings = MapSettings::new(Arc::new(StaticFetcher { delay }));
    settings.region_keys = vec!["beijing".into(), "sichuan".into()];
    settings.markers = journal();
    settings.base_features = vec![Feature::new(Geometry::LineString(vec![
        DVec2::new(100.0, 20.0),
        DVec2::new(120.0, 40.0),
    ]))];

    let router = router.map(|r| r as Rc<dyn Router>);
    let navigator = Navigator::new(router, Rc::new(ExternalLocation::new("https://example.org")));
    let mut lifecycle = MapLifecycle::new(settings, navigator);
    lifecycle.attach_target(MapTarget::new(MAP_SELECTOR, 200, 100));
    lifecycle
}

fn lifecycle() -> MapLifecycle {
    lifecycle_with(None, Duration::ZERO)
}

fn beijing_pixel(map: &MapInstance) -> (i32, i32) {
    map.view().project(116.4, 39.9)
}

#[test]
fn marker_layer_holds_only_plottable_records() {
    let mut lifecycle = lifecycle();
    lifecycle.init_map().unwrap();

    let map = lifecycle.map().unwrap();
    let layer = map.layer_by_name(MARKER_LAYER_NAME).unwrap();
    let source = layer.source();
    let source = source.borrow();
    assert_eq!(source.len(), 1);
    assert_eq!(source.features()[0].marker().map(|r| r.id), Some(1));
    assert!(source.features().iter().all(|f| f.marker().map(|r| r.id) != Some(2)));
}

#[test]
fn clicking_a_marker_navigates_once() {
    let router = Rc::new(RecordingRouter::default());
    let mut lifecycle = lifecycle_with(Some(Rc::clone(&router)), Duration::ZERO);
    lifecycle.init_map().unwrap();

    let (px, py) = beijing_pixel(lifecycle.map().unwrap());
    assert_eq!(lifecycle.handle_pointer(PointerEvent::click(px, py)), 1);

    assert_eq!(*router.calls.borrow(), vec!["/beijing"]);
    assert_eq!(lifecycle.take_navigation(), Some(NavigationOutcome::Routed("/beijing".into())));
}

#[test]
fn clicking_empty_map_never_navigates() {
    let router = Rc::new(RecordingRouter::default());
    let mut lifecycle = lifecycle_with(Some(Rc::clone(&router)), Duration::ZERO);
    lifecycle.init_map().unwrap();

    lifecycle.handle_pointer(PointerEvent::click(0, 0));
    lifecycle.handle_pointer(PointerEvent::click(199, 99));
    assert!(router.calls.borrow().is_empty());
    assert_eq!(lifecycle.take_navigation(), None);
}

#[test]
fn rejected_navigation_keeps_pipeline_alive() {
    let router = Rc::new(RecordingRouter {
        reject: true,
        ..RecordingRouter::default()
    });
    let mut lifecycle = lifecycle_with(Some(Rc::clone(&router)), Duration::ZERO);
    lifecycle.init_map().unwrap();
    let (px, py) = beijing_pixel(lifecycle.map().unwrap());

    lifecycle.handle_pointer(PointerEvent::click(px, py));
    assert!(matches!(lifecycle.take_navigation(), Some(NavigationOutcome::Failed(_))));

    lifecycle.handle_pointer(PointerEvent::click(px, py));
    assert_eq!(router.calls.borrow().len(), 2);
}

#[test]
fn hover_drives_preview_and_cursor() {
    let mut lifecycle = lifecycle();
    lifecycle.init_map().unwrap();
    let target = Rc::clone(lifecycle.target().unwrap());
    let (px, py) = beijing_pixel(lifecycle.map().unwrap());

    lifecycle.handle_pointer(PointerEvent::moved(px, py));
    let state = lifecycle.preview_state().unwrap();
    assert!(state.is_visible());
    assert_eq!(state.content.unwrap().title, "Beijing");
    assert_eq!(state.position, Some(DVec2::new(116.4, 39.9)));
    assert_eq!(target.cursor(), Cursor::Pointer);

    let overlay = &lifecycle.map().unwrap().overlays()[0];
    assert!(overlay.element().borrow().is_shown());

    lifecycle.handle_pointer(PointerEvent::moved(0, 0));
    assert!(!lifecycle.preview_state().unwrap().is_visible());
    assert_eq!(target.cursor(), Cursor::Default);
}

#[test]
fn init_twice_replaces_everything() {
    let mut lifecycle = lifecycle();
    lifecycle.init_map().unwrap();
    let first_layers = lifecycle.map().unwrap().layers().len();
    let first_selects = lifecycle.map().unwrap().interactions().to_vec();

    lifecycle.init_map().unwrap();
    let map = lifecycle.map().unwrap();
    assert_eq!(map.generation(), 2);
    assert_eq!(map.layers().len(), first_layers);
    assert_eq!(map.layers().iter().filter(|l| l.tier() == Tier::Boundary).count(), 2);
    assert_eq!(map.interactions().len(), 2);

    let live = map.interaction_ids();
    assert!(first_selects.iter().all(|s| !live.contains(&s.id())));
    assert!(first_selects.iter().all(|s| s.listener_count() == 0));
    assert_eq!(
        live,
        vec![
            lifecycle.hover_interaction().unwrap().id(),
            lifecycle.click_interaction().unwrap().id()
        ]
    );
    assert_eq!(lifecycle.target().unwrap().bound_generation(), Some(2));
}

#[test]
fn destroy_is_a_noop_without_a_map() {
    let mut lifecycle = lifecycle();
    assert!(lifecycle.destroy_map().is_noop());

    lifecycle.init_map().unwrap();
    assert!(!lifecycle.destroy_map().is_noop());
    assert!(lifecycle.destroy_map().is_noop());
    assert!(!lifecycle.is_live());
}

#[test]
fn destroy_clears_layer_sources() {
    let mut lifecycle = lifecycle();
    lifecycle.init_map().unwrap();
    let marker_source = lifecycle.map().unwrap().layer_by_name(MARKER_LAYER_NAME).unwrap().source();

    let report = lifecycle.destroy_map();
    assert!(report.is_clean());
    assert!(marker_source.borrow().is_empty());
}

#[test]
fn teardown_continues_past_failures() {
    let mut lifecycle = lifecycle();
    lifecycle.init_map().unwrap();
    let target = Rc::clone(lifecycle.target().unwrap());

    let map = lifecycle.map().unwrap();
    let busy = map.layers().iter().find(|l| l.tier() == Tier::Boundary).unwrap();
    let busy_id = busy.id();
    let busy_source = busy.source();
    let overlay_element = map.overlays()[0].element();

    let source_guard = busy_source.borrow();
    let overlay_guard = overlay_element.borrow();
    let report = lifecycle.destroy_map();
    drop(overlay_guard);
    drop(source_guard);

    assert!(report.failed(ResourceKind::Layer));
    assert!(report.failed(ResourceKind::Overlay));
    assert!(!report.failed(ResourceKind::Interaction));
    assert!(report
        .failures
        .iter()
        .any(|f| f.error == EngineError::SourceBusy(busy_id)));

    assert_eq!(report.interactions, 2);
    assert_eq!(report.layers, 4);
    assert_eq!(report.view_listeners, 1);
    assert!(!lifecycle.is_live());
    assert_eq!(target.bound_generation(), None);

    lifecycle.init_map().unwrap();
    assert!(lifecycle.is_live());
}

#[test]
fn resize_listener_is_registered_once() {
    let mut lifecycle = lifecycle();
    assert_eq!(lifecycle.resize_state(), ResizeState::Unregistered);
    for _ in 0..3 {
        lifecycle.init_map().unwrap();
    }
    lifecycle.destroy_map();
    lifecycle.init_map().unwrap();

    assert_eq!(lifecycle.resize_registrations(), 1);
    assert!(lifecycle.handle_resize(120, 60));
    let view = lifecycle.map().unwrap().view();
    assert_eq!((view.width, view.height), (120, 60));
}

#[test]
fn missing_target_is_a_construction_error() {
    let settings = MapSettings::new(Arc::new(StaticFetcher { delay: Duration::ZERO }));
    let mut lifecycle = MapLifecycle::new(settings, Navigator::new(None, Rc::new(ExternalLocation::default())));
    assert_eq!(lifecycle.init_map(), Err(MapError::MissingTarget("#map".into())));
}

#[test]
fn target_bound_elsewhere_is_a_construction_error() {
    let mut lifecycle = lifecycle();
    let target = Rc::clone(lifecycle.target().unwrap());
    let other = MapInstance::new(
        99,
        target,
        &Default::default(),
        Arc::new(StaticFetcher { delay: Duration::ZERO }),
    )
    .unwrap();

    assert!(matches!(
        lifecycle.init_map(),
        Err(MapError::TargetInUse { generation: 99, .. })
    ));
    drop(other);
    assert!(lifecycle.init_map().is_ok());
}

#[test]
fn boundaries_load_lazily_and_degrade_to_empty() {
    let mut lifecycle = lifecycle();
    lifecycle.init_map().unwrap();
    let map = lifecycle.map_mut().unwrap();

    let ids = map.layer_ids();
    let beijing = lifecycle.boundaries().layer_id("beijing").unwrap();
    let sichuan = lifecycle.boundaries().layer_id("sichuan").unwrap();
    assert!(ids.contains(&beijing) && ids.contains(&sichuan));

    let map = lifecycle.map_mut().unwrap();
    assert_eq!(map.layer(beijing).unwrap().source().borrow().state(), LoadState::Idle);
    assert_eq!(map.prepare_frame(), 2);
    map.settle_loads(Duration::from_secs(5));

    let loaded = map.layer(beijing).unwrap().source();
    assert_eq!(loaded.borrow().state(), LoadState::Ready);
    assert_eq!(loaded.borrow().len(), 1);
    let failed = map.layer(sichuan).unwrap().source();
    assert_eq!(failed.borrow().state(), LoadState::Failed);
    assert!(failed.borrow().is_empty());
}

#[test]
fn late_loads_never_reach_the_new_map() {
    let mut lifecycle = lifecycle_with(None, Duration::from_millis(50));
    lifecycle.init_map().unwrap();
    let old_source = {
        let map = lifecycle.map_mut().unwrap();
        assert_eq!(map.prepare_frame(), 2);
        let id = lifecycle.boundaries().layer_id("beijing").unwrap();
        lifecycle.map().unwrap().layer(id).unwrap().source()
    };

    lifecycle.init_map().unwrap();
    thread::sleep(Duration::from_millis(150));

    let id = lifecycle.boundaries().layer_id("beijing").unwrap();
    let map = lifecycle.map_mut().unwrap();
    assert_eq!(map.poll_loads(), 0);
    let source = map.layer(id).unwrap().source();
    assert_eq!(source.borrow().state(), LoadState::Idle);
    assert!(source.borrow().is_empty());
    assert!(old_source.borrow().is_empty());
}

#[test]
fn zooming_refreshes_marker_layer_until_teardown() {
    let mut lifecycle = lifecycle();
    lifecycle.init_map().unwrap();
    let map = lifecycle.map_mut().unwrap();

    map.zoom(1.5, None);
    let marker = map.layer_by_name(MARKER_LAYER_NAME).unwrap();
    assert_eq!(marker.revision(), 1);
    assert!(lifecycle.resolution_listener().is_some());

    let report = lifecycle.destroy_map();
    assert_eq!(report.view_listeners, 1);
    assert!(lifecycle.resolution_listener().is_none());
}
