use std::cell::RefCell;
use std::rc::Rc;

use crate::map::{Feature, LayerId, VectorSource};
use crate::style::{Style, StyleFunction};

/// Layering priority. Layers render in tier order, lowest first.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Tier {
    Base,
    Boundary,
    Marker,
}

/// A named rendering unit with its own data source
#[derive(Debug)]
pub struct Layer {
    id: LayerId,
    name: String,
    tier: Tier,
    source: Rc<RefCell<VectorSource>>,
    style: Option<StyleFunction>,
    /// Bumped whenever the layer must be redrawn
    revision: u64,
}

impl Layer {
    pub fn new(name: impl Into<String>, tier: Tier, source: VectorSource) -> Self {
        Self {
            id: LayerId::next(),
            name: name.into(),
            tier,
            source: Rc::new(RefCell::new(source)),
            style: None,
            revision: 0,
        }
    }

    pub fn with_style(mut self, style: StyleFunction) -> Self {
        self.style = Some(style);
        self
    }

    pub fn id(&self) -> LayerId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn tier(&self) -> Tier {
        self.tier
    }

    /// Shared handle to the data source
    pub fn source(&self) -> Rc<RefCell<VectorSource>> {
        Rc::clone(&self.source)
    }

    /// Styles for a feature: its own style wins over the layer style function
    pub fn styles_for(&self, feature: &Feature) -> Vec<Style> {
        match (&feature.style, self.style) {
            (Some(style), _) => vec![style.clone()],
            (None, Some(style_fn)) => style_fn(feature),
            (None, None) => Vec::new(),
        }
    }

    /// Mark the layer as needing a redraw
    pub fn changed(&mut self) {
        self.revision += 1;
    }

    pub fn revision(&self) -> u64 {
        self.revision
    }
}
