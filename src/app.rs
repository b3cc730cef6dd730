use std::rc::Rc;

use tracing::{error, info};

use crate::lifecycle::{MapLifecycle, MAP_SELECTOR};
use crate::map::{MapTarget, PointerEvent, ZOOM_FACTOR};
use crate::navigation::{ExternalLocation, NavigationOutcome, PageRouter};

/// What the terminal currently shows
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Screen {
    Map,
    /// An in-app page, by route
    Page(String),
}

/// Application state
pub struct App {
    pub lifecycle: MapLifecycle,
    router: Option<Rc<PageRouter>>,
    location: Rc<ExternalLocation>,
    pub screen: Screen,
    pub should_quit: bool,
    /// Full-page navigation target to print on exit
    pub exit_url: Option<String>,
    /// Last mouse position for drag tracking
    pub last_mouse: Option<(u16, u16)>,
    /// Whether the current button press has moved
    dragged: bool,
    /// Current mouse position for cursor marker
    pub mouse_pos: Option<(u16, u16)>,
    /// Last error shown in the status bar
    pub status: Option<String>,
}

impl App {
    /// `width` and `height` are the terminal size in cells
    pub fn new(
        mut lifecycle: MapLifecycle,
        router: Option<Rc<PageRouter>>,
        location: Rc<ExternalLocation>,
        width: usize,
        height: usize,
    ) -> Self {
        let (px, py) = pixel_size(width, height);
        lifecycle.attach_target(MapTarget::new(MAP_SELECTOR, px, py));
        Self {
            lifecycle,
            router,
            location,
            screen: Screen::Map,
            should_quit: false,
            exit_url: None,
            last_mouse: None,
            dragged: false,
            mouse_pos: None,
            status: None,
        }
    }

    /// (Re)build the map, keeping the error for the status bar
    pub fn rebuild(&mut self) {
        match self.lifecycle.init_map() {
            Ok(()) => self.status = None,
            Err(err) => {
                error!(error = %err, "failed to initialise map");
                self.status = Some(err.to_string());
            }
        }
    }

    /// Update the map size when the terminal resizes
    pub fn resize(&mut self, width: usize, height: usize) {
        let (px, py) = pixel_size(width, height);
        self.lifecycle.handle_resize(px, py);
    }

    /// Start remote loads and apply finished ones
    pub fn tick(&mut self) {
        if let Some(map) = self.lifecycle.map_mut() {
            map.prepare_frame();
            map.poll_loads();
        }
    }

    /// Pan the map
    pub fn pan(&mut self, dx: i32, dy: i32) {
        if let Some(map) = self.lifecycle.map_mut() {
            map.pan(dx, dy);
        }
    }

    pub fn zoom_in(&mut self) {
        if let Some(map) = self.lifecycle.map_mut() {
            map.zoom(ZOOM_FACTOR, None);
        }
    }

    pub fn zoom_out(&mut self) {
        if let Some(map) = self.lifecycle.map_mut() {
            map.zoom(1.0 / ZOOM_FACTOR, None);
        }
    }

    /// Zoom in towards a screen position (terminal column/row)
    pub fn zoom_in_at(&mut self, col: u16, row: u16) {
        let at = cell_to_pixel(col, row);
        if let Some(map) = self.lifecycle.map_mut() {
            map.zoom(ZOOM_FACTOR, Some(at));
        }
    }

    /// Zoom out from a screen position (terminal column/row)
    pub fn zoom_out_at(&mut self, col: u16, row: u16) {
        let at = cell_to_pixel(col, row);
        if let Some(map) = self.lifecycle.map_mut() {
            map.zoom(1.0 / ZOOM_FACTOR, Some(at));
        }
    }

    /// Request quit
    pub fn quit(&mut self) {
        self.should_quit = true;
    }

    /// Pointer moved: hover dispatch on the map
    pub fn pointer_moved(&mut self, col: u16, row: u16) {
        self.mouse_pos = Some((col, row));
        if self.screen == Screen::Map {
            let (px, py) = cell_to_pixel(col, row);
            self.lifecycle.handle_pointer(PointerEvent::moved(px, py));
        }
    }

    pub fn begin_press(&mut self, col: u16, row: u16) {
        self.last_mouse = Some((col, row));
        self.dragged = false;
    }

    /// Handle mouse drag by panning
    pub fn handle_drag(&mut self, x: u16, y: u16) {
        if let Some((last_x, last_y)) = self.last_mouse {
            let dx = last_x as i32 - x as i32;
            let dy = last_y as i32 - y as i32;
            if dx != 0 || dy != 0 {
                self.dragged = true;
            }
            // Less sensitive when zoomed out
            let zoom = self.lifecycle.map().map_or(1.0, |m| m.view().zoom);
            let scale = if zoom < 2.0 {
                2
            } else if zoom < 4.0 {
                3
            } else {
                4
            };
            self.pan(dx * scale, dy * scale);
        }
        self.last_mouse = Some((x, y));
    }

    /// Button released: a press that never moved is a click
    pub fn end_press(&mut self, col: u16, row: u16) {
        let was_click = !self.dragged;
        self.last_mouse = None;
        self.dragged = false;
        if was_click && self.screen == Screen::Map {
            let (px, py) = cell_to_pixel(col, row);
            self.lifecycle.handle_pointer(PointerEvent::click(px, py));
            self.follow_navigation();
        }
    }

    /// React to the navigation the last click caused
    pub fn follow_navigation(&mut self) {
        match self.lifecycle.take_navigation() {
            Some(NavigationOutcome::Routed(route)) => {
                // The map is unmounted while a page is open
                self.lifecycle.destroy_map();
                self.status = None;
                self.screen = Screen::Page(route);
            }
            Some(NavigationOutcome::FullPage(_)) => {
                self.exit_url = self.location.take();
                info!(url = ?self.exit_url, "leaving for full-page navigation");
                self.quit();
            }
            Some(NavigationOutcome::Failed(err)) => self.status = Some(err.to_string()),
            Some(NavigationOutcome::Ignored) | None => {}
        }
    }

    /// Leave the current page and bring the map back
    pub fn back(&mut self) {
        if let Screen::Page(_) = self.screen {
            if let Some(router) = &self.router {
                router.back();
            }
            self.screen = Screen::Map;
            self.rebuild();
        }
    }

    pub fn page_title(&self) -> Option<&str> {
        match &self.screen {
            Screen::Page(route) => self.router.as_ref()?.title(route),
            Screen::Map => None,
        }
    }

    /// Get current zoom level as a string
    pub fn zoom_level(&self) -> String {
        self.lifecycle
            .map()
            .map_or_else(|| "-".to_string(), |m| format!("{:.1}x", m.view().zoom))
    }

    /// Get current center coordinates as a string
    pub fn center_coords(&self) -> String {
        let Some(map) = self.lifecycle.map() else {
            return String::new();
        };
        let view = map.view();
        format!(
            "{:.1}°{}, {:.1}°{}",
            view.center_lat.abs(),
            if view.center_lat >= 0.0 { "N" } else { "S" },
            view.center_lon.abs(),
            if view.center_lon >= 0.0 { "E" } else { "W" }
        )
    }

    /// Get mouse position in braille pixel coordinates
    pub fn mouse_pixel_pos(&self) -> Option<(i32, i32)> {
        self.mouse_pos.map(|(col, row)| cell_to_pixel(col, row))
    }
}

/// Terminal cell to braille pixel, inside the map border
fn cell_to_pixel(col: u16, row: u16) -> (i32, i32) {
    // Each terminal cell is 2 braille pixels wide, 4 tall; 1 cell border
    let px = (col.saturating_sub(1) as i32) * 2;
    let py = (row.saturating_sub(1) as i32) * 4;
    (px, py)
}

/// Braille pixel size of the map pane for a terminal size
fn pixel_size(width: usize, height: usize) -> (usize, usize) {
    // 2 for border horizontally; 2 for border + 1 for status bar vertically
    let inner_width = width.saturating_sub(2);
    let inner_height = height.saturating_sub(3);
    (inner_width * 2, inner_height * 4)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lifecycle::MapSettings;
    use crate::map::{Feature, FeatureFetcher};
    use crate::marker::{DisplayInfo, MarkerDataSource, MarkerRecord};
    use crate::navigation::Navigator;
    use std::sync::Arc;

    struct NoFetch;

    impl FeatureFetcher for NoFetch {
        fn fetch(&self, _url: &str) -> anyhow::Result<Vec<Feature>> {
            Ok(Vec::new())
        }
    }

    fn app(with_router: bool) -> App {
        let markers = MarkerDataSource::new(vec![MarkerRecord::new(
            1,
            Some([104.0, 35.5]),
            Some("/lanzhou"),
            DisplayInfo::titled("Lanzhou"),
        )]);
        let router = with_router.then(|| Rc::new(PageRouter::from_markers(&markers)));
        let location = Rc::new(ExternalLocation::new("https://example.org"));

        let mut settings = MapSettings::new(Arc::new(NoFetch));
        settings.markers = markers;
        let navigator = Navigator::new(
            router.clone().map(|r| r as Rc<dyn crate::navigation::Router>),
            location.clone(),
        );
        let mut app = App::new(MapLifecycle::new(settings, navigator), router, location, 102, 53);
        app.rebuild();
        app
    }

    /// Terminal cell of the map center
    fn center_cell(app: &App) -> (u16, u16) {
        let view = app.lifecycle.map().unwrap().view();
        let (px, py) = view.project(view.center_lon, view.center_lat);
        ((px / 2 + 1) as u16, (py / 4 + 1) as u16)
    }

    #[test]
    fn click_opens_page_and_back_restores_map() {
        let mut app = app(true);
        let (col, row) = center_cell(&app);

        app.begin_press(col, row);
        app.end_press(col, row);
        assert_eq!(app.screen, Screen::Page("/lanzhou".into()));
        assert_eq!(app.page_title(), Some("Lanzhou"));
        assert!(!app.lifecycle.is_live());

        app.back();
        assert_eq!(app.screen, Screen::Map);
        assert!(app.lifecycle.is_live());
        assert_eq!(app.lifecycle.generation(), 2);
    }

    #[test]
    fn click_without_router_quits_with_url() {
        let mut app = app(false);
        let (col, row) = center_cell(&app);

        app.begin_press(col, row);
        app.end_press(col, row);
        assert!(app.should_quit);
        assert_eq!(app.exit_url.as_deref(), Some("https://example.org/lanzhou"));
    }

    #[test]
    fn drag_is_not_a_click() {
        let mut app = app(true);
        let (col, row) = center_cell(&app);

        app.begin_press(col + 3, row);
        app.handle_drag(col, row);
        app.end_press(col, row);
        assert_eq!(app.screen, Screen::Map);
    }

    #[test]
    fn resize_reaches_the_map() {
        let mut app = app(true);
        app.resize(42, 23);
        let view = app.lifecycle.map().unwrap().view();
        assert_eq!((view.width, view.height), (80, 80));
    }
}
