//! Click navigation: in-app routing with a full-page fallback.

use std::cell::RefCell;
use std::collections::BTreeMap;
use std::rc::Rc;

use tracing::{debug, error, info, warn};

use crate::error::NavigationError;
use crate::marker::{InteractionEvent, MarkerDataSource};

/// In-app navigation capability
pub trait Router {
    fn navigate(&self, path: &str) -> Result<(), NavigationError>;
}

/// Full-page navigation capability
pub trait Location {
    fn assign(&self, href: &str);
}

/// Router over the journal's pages, one per marker route
#[derive(Debug, Default)]
pub struct PageRouter {
    pages: BTreeMap<String, String>,
    history: RefCell<Vec<String>>,
}

impl PageRouter {
    pub fn new() -> Self {
        Self::default()
    }

    /// One page per routed marker, titled after it
    pub fn from_markers(markers: &MarkerDataSource) -> Self {
        let mut router = Self::new();
        for record in markers.records() {
            if let Some(route) = record.route() {
                router.add_page(route, &record.display.title);
            }
        }
        router
    }

    pub fn add_page(&mut self, route: impl Into<String>, title: impl Into<String>) {
        self.pages.insert(route.into(), title.into());
    }

    pub fn has_page(&self, route: &str) -> bool {
        self.pages.contains_key(route)
    }

    /// Currently open page, `None` while on the map
    pub fn current(&self) -> Option<String> {
        self.history.borrow().last().cloned()
    }

    pub fn title(&self, route: &str) -> Option<&str> {
        self.pages.get(route).map(String::as_str)
    }

    /// Leave the current page. Returns false if already on the map.
    pub fn back(&self) -> bool {
        self.history.borrow_mut().pop().is_some()
    }

    pub fn depth(&self) -> usize {
        self.history.borrow().len()
    }
}

impl Router for PageRouter {
    fn navigate(&self, path: &str) -> Result<(), NavigationError> {
        if !path.starts_with('/') {
            return Err(NavigationError::InvalidRoute(path.to_string()));
        }
        if !self.has_page(path) {
            return Err(NavigationError::UnknownRoute(path.to_string()));
        }
        self.history.borrow_mut().push(path.to_string());
        Ok(())
    }
}

/// Records full-page navigations against the site url; the app leaves the
/// map when one is pending.
#[derive(Debug, Default)]
pub struct ExternalLocation {
    base: String,
    pending: RefCell<Option<String>>,
}

impl ExternalLocation {
    pub fn new(base: impl Into<String>) -> Self {
        Self {
            base: base.into().trim_end_matches('/').to_string(),
            pending: RefCell::new(None),
        }
    }

    pub fn pending(&self) -> Option<String> {
        self.pending.borrow().clone()
    }

    pub fn take(&self) -> Option<String> {
        self.pending.borrow_mut().take()
    }
}

impl Location for ExternalLocation {
    fn assign(&self, href: &str) {
        let href = if href.starts_with('/') {
            format!("{}{}", self.base, href)
        } else {
            href.to_string()
        };
        self.pending.replace(Some(href));
    }
}

/// What a click led to
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NavigationOutcome {
    /// The router accepted the route
    Routed(String),
    /// No router; the location was assigned
    FullPage(String),
    /// Missed, or the marker has no route
    Ignored,
    /// The router rejected the route
    Failed(NavigationError),
}

/// The click callback: routes to the clicked marker's page
#[derive(Clone)]
pub struct Navigator {
    router: Option<Rc<dyn Router>>,
    location: Rc<dyn Location>,
}

impl std::fmt::Debug for Navigator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Navigator")
            .field("router", &self.router.is_some())
            .finish()
    }
}

impl Navigator {
    pub fn new(router: Option<Rc<dyn Router>>, location: Rc<dyn Location>) -> Self {
        Self { router, location }
    }

    pub fn has_router(&self) -> bool {
        self.router.is_some()
    }

    pub fn handle_click(&self, event: &InteractionEvent) -> NavigationOutcome {
        if !event.hit {
            return NavigationOutcome::Ignored;
        }
        let Some(info) = &event.info else {
            return NavigationOutcome::Ignored;
        };
        debug!(marker = info.id, "marker clicked");
        let Some(route) = info.route() else {
            warn!(marker = info.id, "no route for marker");
            return NavigationOutcome::Ignored;
        };

        match &self.router {
            Some(router) => match router.navigate(route) {
                Ok(()) => {
                    info!(route, "navigating");
                    NavigationOutcome::Routed(route.to_string())
                }
                Err(err) => {
                    error!(route, error = %err, "navigation failed");
                    NavigationOutcome::Failed(err)
                }
            },
            None => {
                warn!(route, "router not available, using full-page navigation");
                self.location.assign(route);
                NavigationOutcome::FullPage(route.to_string())
            }
        }
    }
}
