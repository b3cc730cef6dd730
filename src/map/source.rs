use std::path::PathBuf;

use anyhow::Result;
use glam::DVec2;

use crate::data;
use crate::map::spatial::SpatialGrid;
use crate::map::{Feature, FeatureId, LayerId};

/// Cell size of the point index, in degrees
const POINT_CELL_DEGREES: f64 = 1.0;

/// Where a source's features come from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SourceOrigin {
    /// Features are added directly
    Local,
    /// Features are fetched from a url the first time the layer is rendered
    Remote { url: String },
}

/// Progress of a remote load
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadState {
    Idle,
    Loading,
    Ready,
    /// The fetch failed; the source stays empty
    Failed,
}

/// The container holding renderable features for a layer
#[derive(Debug)]
pub struct VectorSource {
    origin: SourceOrigin,
    features: Vec<Feature>,
    /// Indices into `features` for point geometries
    points: SpatialGrid<usize>,
    state: LoadState,
    /// Bumped by `clear()`; loads started before a clear are discarded
    revision: u64,
}

impl VectorSource {
    pub fn local() -> Self {
        Self::with_origin(SourceOrigin::Local, LoadState::Ready)
    }

    pub fn remote(url: impl Into<String>) -> Self {
        Self::with_origin(SourceOrigin::Remote { url: url.into() }, LoadState::Idle)
    }

    fn with_origin(origin: SourceOrigin, state: LoadState) -> Self {
        Self {
            origin,
            features: Vec::new(),
            points: SpatialGrid::new(POINT_CELL_DEGREES),
            state,
            revision: 0,
        }
    }

    pub fn add_feature(&mut self, feature: Feature) {
        if let Some(p) = feature.geometry.as_point() {
            self.points.insert(p.x, p.y, self.features.len());
        }
        self.features.push(feature);
    }

    pub fn extend(&mut self, features: impl IntoIterator<Item = Feature>) {
        for feature in features {
            self.add_feature(feature);
        }
    }

    /// Remove every feature. Remote sources return to `Idle` and any load in
    /// flight is invalidated.
    pub fn clear(&mut self) {
        self.features.clear();
        self.points.clear();
        self.revision += 1;
        if matches!(self.origin, SourceOrigin::Remote { .. }) {
            self.state = LoadState::Idle;
        }
    }

    pub fn features(&self) -> &[Feature] {
        &self.features
    }

    pub fn feature(&self, id: FeatureId) -> Option<&Feature> {
        self.features.iter().find(|f| f.id() == id)
    }

    pub fn len(&self) -> usize {
        self.features.len()
    }

    pub fn is_empty(&self) -> bool {
        self.features.is_empty()
    }

    pub fn origin(&self) -> &SourceOrigin {
        &self.origin
    }

    pub fn url(&self) -> Option<&str> {
        match &self.origin {
            SourceOrigin::Remote { url } => Some(url),
            SourceOrigin::Local => None,
        }
    }

    pub fn state(&self) -> LoadState {
        self.state
    }

    pub fn revision(&self) -> u64 {
        self.revision
    }

    /// Point features within `radius_degrees` of `center`, by cell
    pub fn points_near(&self, center: DVec2, radius_degrees: f64) -> impl Iterator<Item = &Feature> + '_ {
        self.points
            .query_radius(center.x, center.y, radius_degrees)
            .filter_map(move |&idx| self.features.get(idx))
    }

    /// Mark a remote load as started. Returns the url and revision to tag the
    /// request with, or `None` if nothing should be fetched.
    pub(crate) fn begin_load(&mut self) -> Option<(String, u64)> {
        match (&self.origin, self.state) {
            (SourceOrigin::Remote { url }, LoadState::Idle) => {
                self.state = LoadState::Loading;
                Some((url.clone(), self.revision))
            }
            _ => None,
        }
    }

    /// Apply a finished load
    pub(crate) fn finish_load(&mut self, outcome: std::result::Result<Vec<Feature>, String>) {
        match outcome {
            Ok(features) => {
                self.extend(features);
                self.state = LoadState::Ready;
            }
            Err(_) => self.state = LoadState::Failed,
        }
    }
}

/// Capability that turns a resource url into features.
/// Runs on a worker thread.
pub trait FeatureFetcher: Send + Sync {
    fn fetch(&self, url: &str) -> Result<Vec<Feature>>;
}

/// Resolves urls as paths below a data directory and parses GeoJSON
#[derive(Debug, Clone)]
pub struct FsFetcher {
    root: PathBuf,
}

impl FsFetcher {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn resolve(&self, url: &str) -> PathBuf {
        self.root.join(url.trim_start_matches('/'))
    }
}

impl FeatureFetcher for FsFetcher {
    fn fetch(&self, url: &str) -> Result<Vec<Feature>> {
        data::load_features(&self.resolve(url))
    }
}

/// A finished fetch, tagged with what it was requested for
#[derive(Debug)]
pub(crate) struct LoadResult {
    pub generation: u64,
    pub layer: LayerId,
    pub revision: u64,
    pub outcome: std::result::Result<Vec<Feature>, String>,
}
