use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use geojson::{GeoJson, Value};
use glam::DVec2;
use tracing::{debug, warn};

use crate::map::{Feature, Geometry, Path as Ring};

/// Base outline files, coarsest first. Missing files are skipped.
const BASE_FILES: [&str; 3] = ["ne_110m_coastline.json", "ne_50m_coastline.json", "ne_50m_borders.json"];

/// Parse a GeoJSON document into features, keeping their properties.
/// Geometries without a usable rendering are dropped.
pub fn parse_features(content: &str) -> Result<Vec<Feature>> {
    let geojson: GeoJson = content.parse()?;
    let mut features = Vec::new();

    match geojson {
        GeoJson::FeatureCollection(fc) => {
            for feature in fc.features {
                push_feature(&mut features, feature);
            }
        }
        GeoJson::Feature(feature) => push_feature(&mut features, feature),
        GeoJson::Geometry(geometry) => {
            features.extend(convert_value(&geometry.value).into_iter().map(Feature::new));
        }
    }
    Ok(features)
}

fn push_feature(features: &mut Vec<Feature>, feature: geojson::Feature) {
    let Some(geometry) = feature.geometry else {
        return;
    };
    let properties = feature.properties.unwrap_or_default();
    for converted in convert_value(&geometry.value) {
        features.push(Feature::new(converted).with_properties(properties.clone()));
    }
}

/// Convert one GeoJSON geometry. Multi-geometries split into parts except
/// multipolygons, which keep their parts together for labelling.
fn convert_value(value: &Value) -> Vec<Geometry> {
    match value {
        Value::Point(c) if c.len() >= 2 => vec![Geometry::Point(DVec2::new(c[0], c[1]))],
        Value::MultiPoint(points) => points
            .iter()
            .filter(|c| c.len() >= 2)
            .map(|c| Geometry::Point(DVec2::new(c[0], c[1])))
            .collect(),
        Value::LineString(coords) => vec![Geometry::LineString(ring(coords))],
        Value::MultiLineString(lines) => lines.iter().map(|l| Geometry::LineString(ring(l))).collect(),
        Value::Polygon(rings) => vec![Geometry::Polygon(rings.iter().map(|r| ring(r)).collect())],
        Value::MultiPolygon(polygons) => vec![Geometry::MultiPolygon(
            polygons.iter().map(|rings| rings.iter().map(|r| ring(r)).collect()).collect(),
        )],
        Value::GeometryCollection(geometries) => geometries.iter().flat_map(|g| convert_value(&g.value)).collect(),
        _ => Vec::new(),
    }
}

fn ring(coords: &[Vec<f64>]) -> Ring {
    coords
        .iter()
        .filter(|c| c.len() >= 2)
        .map(|c| DVec2::new(c[0], c[1]))
        .collect()
}

/// Read one GeoJSON file
pub fn load_features(path: &Path) -> Result<Vec<Feature>> {
    let content = fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
    parse_features(&content).with_context(|| format!("parsing {}", path.display()))
}

/// Load the Natural Earth base outlines found in `data_dir`, falling back to
/// the built-in world outline when none are present.
pub fn load_base_features(data_dir: &Path) -> Vec<Feature> {
    let mut features = Vec::new();
    for filename in BASE_FILES {
        let path = data_dir.join(filename);
        if !path.exists() {
            continue;
        }
        match load_features(&path) {
            Ok(loaded) => {
                debug!(file = filename, count = loaded.len(), "loaded base outlines");
                features.extend(loaded);
            }
            Err(e) => warn!(file = filename, error = %format!("{e:#}"), "failed to load base outlines"),
        }
    }

    if features.is_empty() {
        debug!("no base outline data found, using built-in outline");
        features = simple_world();
    }
    features
}

/// A coarse outline of the land around China, used when no data file is
/// available
pub fn simple_world() -> Vec<Feature> {
    let outlines: [&[(f64, f64)]; 4] = [
        // East Asian coast from the Gulf of Tonkin to the Sea of Okhotsk
        &[
            (105.0, 10.0),
            (108.0, 16.0),
            (108.5, 21.5),
            (113.0, 22.2),
            (117.0, 23.5),
            (120.0, 26.5),
            (122.0, 30.0),
            (121.0, 32.5),
            (119.5, 35.0),
            (122.5, 37.0),
            (118.0, 38.5),
            (121.5, 40.8),
            (124.5, 40.0),
            (126.5, 37.5),
            (129.5, 35.2),
            (129.5, 42.5),
            (135.0, 43.5),
            (140.5, 48.5),
            (141.0, 53.0),
        ],
        // South Asia and the Indochina peninsula
        &[
            (67.0, 24.5),
            (72.5, 21.0),
            (73.5, 16.0),
            (77.5, 8.1),
            (80.2, 13.0),
            (82.5, 17.0),
            (87.0, 21.5),
            (91.0, 22.5),
            (94.5, 16.5),
            (97.5, 16.5),
            (98.5, 8.0),
            (100.5, 13.5),
            (103.0, 10.5),
            (105.0, 10.0),
        ],
        // Taiwan
        &[(120.1, 23.0), (120.8, 21.9), (121.9, 24.6), (121.5, 25.3), (120.1, 23.0)],
        // Hainan
        &[(108.6, 19.2), (109.6, 18.2), (111.0, 19.6), (110.2, 20.1), (108.6, 19.2)],
    ];

    outlines
        .iter()
        .map(|coords| {
            let line = coords.iter().map(|&(lon, lat)| DVec2::new(lon, lat)).collect();
            Feature::new(Geometry::LineString(line))
        })
        .collect()
}
