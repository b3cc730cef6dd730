use std::fs;
use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use glam::DVec2;
use serde::Deserialize;

/// What the preview shows for a marker
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct DisplayInfo {
    pub title: String,
    #[serde(default)]
    pub summary: Option<String>,
    #[serde(default)]
    pub date: Option<String>,
    /// `#rrggbb` accent used by the preview
    #[serde(default)]
    pub accent: Option<String>,
}

impl DisplayInfo {
    pub fn titled(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            summary: None,
            date: None,
            accent: None,
        }
    }
}

/// One journal location. Immutable once built.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct MarkerRecord {
    pub id: u64,
    /// `[lon, lat]`; records without coordinates are not plotted
    #[serde(default)]
    pub coords: Option<[f64; 2]>,
    #[serde(default)]
    pub route: Option<String>,
    pub display: DisplayInfo,
}

impl MarkerRecord {
    pub fn new(id: u64, coords: Option<[f64; 2]>, route: Option<&str>, display: DisplayInfo) -> Self {
        Self {
            id,
            coords,
            route: route.map(str::to_string),
            display,
        }
    }

    /// The plottable position, if the coordinates are present and in range
    pub fn position(&self) -> Option<DVec2> {
        let [lon, lat] = self.coords?;
        let valid = lon.is_finite() && lat.is_finite() && (-180.0..=180.0).contains(&lon) && (-90.0..=90.0).contains(&lat);
        valid.then(|| DVec2::new(lon, lat))
    }

    /// The route to navigate to; empty routes count as absent
    pub fn route(&self) -> Option<&str> {
        self.route.as_deref().filter(|r| !r.is_empty())
    }
}

/// The static list of marker records the marker layer is built from
#[derive(Debug, Clone, Default)]
pub struct MarkerDataSource {
    records: Vec<Arc<MarkerRecord>>,
}

impl MarkerDataSource {
    pub fn new(records: Vec<MarkerRecord>) -> Self {
        Self {
            records: records.into_iter().map(Arc::new).collect(),
        }
    }

    /// Parse a JSON array of records
    pub fn from_json_slice(bytes: &mut [u8]) -> Result<Self> {
        let records: Vec<MarkerRecord> = simd_json::serde::from_slice(bytes)?;
        Ok(Self::new(records))
    }

    pub fn load(path: &Path) -> Result<Self> {
        let mut bytes = fs::read(path).with_context(|| format!("reading {}", path.display()))?;
        Self::from_json_slice(&mut bytes).with_context(|| format!("parsing {}", path.display()))
    }

    /// The journal's built-in locations
    pub fn builtin() -> Self {
        let entry = |id, lon, lat, route: &str, title: &str, date: &str| {
            MarkerRecord::new(
                id,
                Some([lon, lat]),
                Some(route),
                DisplayInfo {
                    title: title.to_string(),
                    summary: None,
                    date: Some(date.to_string()),
                    accent: None,
                },
            )
        };

        Self::new(vec![
            entry(1, 116.4, 39.9, "/beijing", "北京 Beijing", "2023-10-01"),
            entry(2, 104.07, 30.67, "/chengdu", "成都 Chengdu", "2023-07-15"),
            entry(3, 91.13, 29.65, "/lhasa", "拉萨 Lhasa", "2023-08-02"),
            entry(4, 120.15, 30.28, "/hangzhou", "杭州 Hangzhou", "2024-04-05"),
            entry(5, 100.23, 25.61, "/dali", "大理 Dali", "2024-01-20"),
            entry(6, 87.62, 43.82, "/urumqi", "乌鲁木齐 Urumqi", "2024-09-10"),
            entry(7, 113.26, 23.13, "/guangzhou", "广州 Guangzhou", "2022-12-24"),
            entry(8, 121.47, 31.23, "/shanghai", "上海 Shanghai", "2022-05-01"),
        ])
    }

    pub fn records(&self) -> &[Arc<MarkerRecord>] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn position_requires_valid_coordinates() {
        let at = |coords| MarkerRecord::new(1, coords, None, DisplayInfo::titled("x"));
        assert_eq!(at(Some([116.4, 39.9])).position(), Some(DVec2::new(116.4, 39.9)));
        assert_eq!(at(None).position(), None);
        assert_eq!(at(Some([f64::NAN, 39.9])).position(), None);
        assert_eq!(at(Some([181.0, 0.0])).position(), None);
        assert_eq!(at(Some([0.0, -90.5])).position(), None);
    }

    #[test]
    fn empty_route_is_absent() {
        let record = MarkerRecord::new(1, None, Some(""), DisplayInfo::titled("x"));
        assert_eq!(record.route(), None);
    }

    #[test]
    fn parses_records_from_json() {
        let mut json = br##"[
            {"id": 1, "coords": [116.4, 39.9], "route": "/beijing", "display": {"title": "Beijing", "accent": "#1e88e5"}},
            {"id": 2, "coords": null, "display": {"title": "Nowhere"}}
        ]"##
        .to_vec();
        let source = MarkerDataSource::from_json_slice(&mut json).unwrap();
        assert_eq!(source.len(), 2);

        let first = &source.records()[0];
        assert_eq!(first.route(), Some("/beijing"));
        assert_eq!(first.display.accent.as_deref(), Some("#1e88e5"));
        assert_eq!(source.records()[1].coords, None);
        assert_eq!(source.records()[1].route(), None);
    }

    #[test]
    fn rejects_invalid_json() {
        let mut json = br#"[{"id": "one"}]"#.to_vec();
        assert!(MarkerDataSource::from_json_slice(&mut json).is_err());
    }

    #[test]
    fn builtin_records_are_plottable() {
        let source = MarkerDataSource::builtin();
        assert!(!source.is_empty());
        assert!(source.records().iter().all(|r| r.position().is_some() && r.route().is_some()));
    }
}
