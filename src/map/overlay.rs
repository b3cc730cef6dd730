use std::cell::RefCell;
use std::rc::Rc;

use glam::DVec2;

use crate::map::OverlayId;
use crate::style::Rgba;

/// Content drawn inside an overlay box
#[derive(Debug, Clone, PartialEq)]
pub struct OverlayBody {
    pub title: String,
    pub lines: Vec<String>,
    pub accent: Rgba,
    /// Box width in cells
    pub width: u16,
}

/// The positioned element an overlay renders
#[derive(Debug, Clone, Default, PartialEq)]
pub struct OverlayElement {
    /// Geographic anchor; the overlay is hidden when absent
    pub position: Option<DVec2>,
    pub body: Option<OverlayBody>,
}

impl OverlayElement {
    pub fn is_shown(&self) -> bool {
        self.position.is_some() && self.body.is_some()
    }
}

/// An element anchored to map coordinates
#[derive(Debug, Clone)]
pub struct Overlay {
    id: OverlayId,
    element: Rc<RefCell<OverlayElement>>,
    /// Cell offset from the anchor
    pub offset: (i16, i16),
}

impl Overlay {
    pub fn new(offset: (i16, i16)) -> Self {
        Self {
            id: OverlayId::next(),
            element: Rc::new(RefCell::new(OverlayElement::default())),
            offset,
        }
    }

    pub fn id(&self) -> OverlayId {
        self.id
    }

    pub fn element(&self) -> Rc<RefCell<OverlayElement>> {
        Rc::clone(&self.element)
    }
}
