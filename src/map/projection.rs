use std::f64::consts::PI;

use glam::DVec2;
use serde::Deserialize;

use crate::error::MapError;

/// Geographic bounding box in degrees: `[min_lon, min_lat, max_lon, max_lat]`
pub type Extent = [f64; 4];

/// Zoom step applied by a single zoom in/out action
pub const ZOOM_FACTOR: f64 = 1.5;

/// Latitude limit of the Web Mercator projection
const MAX_LAT: f64 = 85.0;

/// View configuration, as read from the config file
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct ViewOptions {
    /// Initial center as `[lon, lat]`
    pub center: [f64; 2],
    pub zoom: f64,
    pub min_zoom: f64,
    pub max_zoom: f64,
    /// The center is never allowed to leave this box
    pub extent: Extent,
}

impl Default for ViewOptions {
    fn default() -> Self {
        Self {
            center: [104.0, 35.5],
            zoom: 4.0,
            min_zoom: 2.0,
            max_zoom: 60.0,
            extent: [70.0, 15.0, 140.0, 55.0],
        }
    }
}

impl ViewOptions {
    /// Reject configurations that cannot produce a usable view
    pub fn validate(&self) -> Result<(), MapError> {
        let [lon, lat] = self.center;
        let [min_lon, min_lat, max_lon, max_lat] = self.extent;
        let all = [lon, lat, self.zoom, self.min_zoom, self.max_zoom, min_lon, min_lat, max_lon, max_lat];
        if all.iter().any(|v| !v.is_finite()) {
            return Err(MapError::InvalidView("non-finite value".into()));
        }
        if self.min_zoom <= 0.0 || self.min_zoom > self.max_zoom {
            return Err(MapError::InvalidView(format!(
                "zoom range {}..{} is empty",
                self.min_zoom, self.max_zoom
            )));
        }
        if self.zoom < self.min_zoom || self.zoom > self.max_zoom {
            return Err(MapError::InvalidView(format!(
                "zoom {} outside {}..{}",
                self.zoom, self.min_zoom, self.max_zoom
            )));
        }
        if min_lon >= max_lon || min_lat >= max_lat || min_lat < -MAX_LAT || max_lat > MAX_LAT {
            return Err(MapError::InvalidView(format!("extent {:?} is not a valid box", self.extent)));
        }
        if lon < min_lon || lon > max_lon || lat < min_lat || lat > max_lat {
            return Err(MapError::InvalidView(format!("center {:?} lies outside the extent", self.center)));
        }
        Ok(())
    }
}

/// The visible map area: center, zoom and pixel size of the target
#[derive(Debug, Clone, PartialEq)]
pub struct View {
    /// Center longitude (-180 to 180)
    pub center_lon: f64,
    /// Center latitude (-85 to 85)
    pub center_lat: f64,
    /// Zoom level (higher = more zoomed in, 1.0 = whole world across the width)
    pub zoom: f64,
    pub min_zoom: f64,
    pub max_zoom: f64,
    pub extent: Extent,
    /// Canvas pixel width
    pub width: usize,
    /// Canvas pixel height
    pub height: usize,
}

impl View {
    pub fn new(options: &ViewOptions, width: usize, height: usize) -> Result<Self, MapError> {
        options.validate()?;
        Ok(Self {
            center_lon: options.center[0],
            center_lat: options.center[1],
            zoom: options.zoom,
            min_zoom: options.min_zoom,
            max_zoom: options.max_zoom,
            extent: options.extent,
            width,
            height,
        })
    }

    /// Resize the pixel area without touching center or zoom
    pub fn set_size(&mut self, width: usize, height: usize) {
        self.width = width;
        self.height = height;
    }

    /// Pan the view by pixel delta, keeping the center inside the extent
    pub fn pan(&mut self, dx: i32, dy: i32) {
        let scale = self.degrees_per_pixel();
        self.center_lon += dx as f64 * scale;
        self.center_lat -= dy as f64 * scale * 0.5; // Mercator distortion
        self.constrain_center();
    }

    /// Zoom by factor around the view center. Returns true if the zoom changed.
    pub fn zoom_by(&mut self, factor: f64) -> bool {
        let before = self.zoom;
        self.zoom = (self.zoom * factor).clamp(self.min_zoom, self.max_zoom);
        self.zoom != before
    }

    /// Zoom by factor keeping the geographic point under `(px, py)` in place.
    /// Returns true if the zoom changed.
    pub fn zoom_at(&mut self, px: i32, py: i32, factor: f64) -> bool {
        // Geographic coordinates under the pointer before zooming
        let (lon, lat) = self.unproject(px, py);

        if !self.zoom_by(factor) {
            return false;
        }

        // Pan so that point lands back under the pointer
        let (new_px, new_py) = self.project(lon, lat);
        self.pan(new_px - px, new_py - py);
        true
    }

    /// Degrees of longitude covered by one pixel at the current zoom
    pub fn degrees_per_pixel(&self) -> f64 {
        360.0 / (self.zoom * self.width.max(1) as f64)
    }

    /// Project a geographic coordinate (lon, lat) to pixel coordinates
    pub fn project(&self, lon: f64, lat: f64) -> (i32, i32) {
        let p = mercator(lon, lat);
        let c = mercator(self.center_lon, self.center_lat);
        let scale = self.scale();

        let px = ((p.x - c.x) * scale + self.width as f64 / 2.0) as i32;
        let py = ((p.y - c.y) * scale + self.height as f64 / 2.0) as i32;
        (px, py)
    }

    /// Project a coordinate stored as a vector (`x` = lon, `y` = lat)
    pub fn project_coord(&self, coord: DVec2) -> (i32, i32) {
        self.project(coord.x, coord.y)
    }

    /// Unproject pixel coordinates back to geographic coordinates (lon, lat)
    pub fn unproject(&self, px: i32, py: i32) -> (f64, f64) {
        let c = mercator(self.center_lon, self.center_lat);
        let scale = self.scale();

        let x = (px as f64 - self.width as f64 / 2.0) / scale + c.x;
        let y = (py as f64 - self.height as f64 / 2.0) / scale + c.y;

        let lon = x * 360.0 - 180.0;
        let lat = (PI * (1.0 - 2.0 * y)).sinh().atan().to_degrees();
        (lon, lat)
    }

    /// Check if a projected point is visible in the view
    pub fn is_visible(&self, px: i32, py: i32) -> bool {
        px >= -10 && px < self.width as i32 + 10 && py >= -10 && py < self.height as i32 + 10
    }

    /// Check if a line segment might be visible (rough bounding box check)
    pub fn line_might_be_visible(&self, p1: (i32, i32), p2: (i32, i32)) -> bool {
        let min_x = p1.0.min(p2.0);
        let max_x = p1.0.max(p2.0);
        let min_y = p1.1.min(p2.1);
        let max_y = p1.1.max(p2.1);

        max_x >= 0 && min_x < self.width as i32 && max_y >= 0 && min_y < self.height as i32
    }

    fn scale(&self) -> f64 {
        self.zoom * self.width as f64
    }

    fn constrain_center(&mut self) {
        let [min_lon, min_lat, max_lon, max_lat] = self.extent;
        self.center_lon = self.center_lon.clamp(min_lon, max_lon);
        self.center_lat = self.center_lat.clamp(min_lat, max_lat);
    }
}

/// Normalized Web Mercator coordinates in `[0, 1]`
fn mercator(lon: f64, lat: f64) -> DVec2 {
    let lat_rad = lat.clamp(-MAX_LAT, MAX_LAT).to_radians();
    DVec2::new(
        (lon + 180.0) / 360.0,
        (1.0 - (lat_rad.tan() + 1.0 / lat_rad.cos()).ln() / PI) / 2.0,
    )
}
