use std::sync::Arc;

use geojson::JsonObject;
use glam::DVec2;

use crate::map::FeatureId;
use crate::marker::MarkerRecord;
use crate::style::Style;

/// A ring or line of geographic coordinates (`x` = lon, `y` = lat)
pub type Path = Vec<DVec2>;

/// Geometry of a feature, in geographic coordinates
#[derive(Debug, Clone, PartialEq)]
pub enum Geometry {
    Point(DVec2),
    LineString(Path),
    /// Exterior ring first, then holes
    Polygon(Vec<Path>),
    MultiPolygon(Vec<Vec<Path>>),
}

impl Geometry {
    pub fn as_point(&self) -> Option<DVec2> {
        match self {
            Geometry::Point(p) => Some(*p),
            _ => None,
        }
    }

    /// Outlines to stroke when rendering (exterior rings only for areas)
    pub fn outlines(&self) -> Vec<&Path> {
        match self {
            Geometry::Point(_) => Vec::new(),
            Geometry::LineString(line) => vec![line],
            Geometry::Polygon(rings) => rings.first().into_iter().collect(),
            Geometry::MultiPolygon(polygons) => polygons.iter().filter_map(|rings| rings.first()).collect(),
        }
    }

    /// Bounding box as `(min, max)` corners
    pub fn bounds(&self) -> Option<(DVec2, DVec2)> {
        let mut points: Box<dyn Iterator<Item = &DVec2> + '_> = match self {
            Geometry::Point(p) => Box::new(std::iter::once(p)),
            _ => Box::new(self.outlines().into_iter().flatten()),
        };
        let first = *points.next()?;
        Some(points.fold((first, first), |(min, max), p| (min.min(*p), max.max(*p))))
    }

    /// Where a label for this geometry is drawn
    pub fn label_anchor(&self) -> Option<DVec2> {
        self.bounds().map(|(min, max)| (min + max) * 0.5)
    }
}

/// Domain data attached to a feature, recovered from selection hits
#[derive(Debug, Clone, PartialEq)]
pub enum Attachment {
    Marker(Arc<MarkerRecord>),
}

/// A single geometry plus its properties, optional own style and attachment
#[derive(Debug, Clone)]
pub struct Feature {
    id: FeatureId,
    pub geometry: Geometry,
    pub properties: JsonObject,
    /// Overrides the layer style when set
    pub style: Option<Style>,
    pub attachment: Option<Attachment>,
}

impl Feature {
    pub fn new(geometry: Geometry) -> Self {
        Self {
            id: FeatureId::next(),
            geometry,
            properties: JsonObject::new(),
            style: None,
            attachment: None,
        }
    }

    pub fn with_properties(mut self, properties: JsonObject) -> Self {
        self.properties = properties;
        self
    }

    pub fn with_style(mut self, style: Style) -> Self {
        self.style = Some(style);
        self
    }

    pub fn with_attachment(mut self, attachment: Attachment) -> Self {
        self.attachment = Some(attachment);
        self
    }

    pub fn id(&self) -> FeatureId {
        self.id
    }

    /// String property lookup; empty strings count as absent
    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.properties
            .get(key)
            .and_then(|v| v.as_str())
            .filter(|s| !s.is_empty())
    }

    pub fn marker(&self) -> Option<&Arc<MarkerRecord>> {
        match &self.attachment {
            Some(Attachment::Marker(record)) => Some(record),
            None => None,
        }
    }
}
