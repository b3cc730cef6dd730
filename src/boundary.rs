//! Administrative boundary layers, one per region key, each lazily loaded
//! from `/geojson/<region>/<key>.json`.

use std::collections::HashMap;

use tracing::debug;

use crate::map::{Layer, LayerId, MapInstance, Tier, VectorSource};
use crate::style::boundary_style;

/// Builds and caches the boundary layers of the current map
#[derive(Debug)]
pub struct BoundaryLayerSet {
    region: String,
    keys: Vec<String>,
    cache: HashMap<(Tier, String), LayerId>,
    /// Map generation the cache belongs to
    generation: Option<u64>,
}

impl BoundaryLayerSet {
    pub fn new(region: impl Into<String>, keys: impl IntoIterator<Item = impl Into<String>>) -> Self {
        Self {
            region: region.into(),
            keys: keys.into_iter().map(Into::into).collect(),
            cache: HashMap::new(),
            generation: None,
        }
    }

    pub fn region(&self) -> &str {
        &self.region
    }

    pub fn keys(&self) -> &[String] {
        &self.keys
    }

    pub fn url(&self, key: &str) -> String {
        format!("/geojson/{}/{}.json", self.region, key)
    }

    /// Cached layer for a region key on the current map
    pub fn layer_id(&self, key: &str) -> Option<LayerId> {
        self.cache.get(&(Tier::Boundary, key.to_string())).copied()
    }

    /// Add one boundary layer per region key. Keys already present on this
    /// map are skipped. Returns how many layers were added.
    pub fn setup(&mut self, map: &mut MapInstance) -> usize {
        if self.generation != Some(map.generation()) {
            self.cache.clear();
            self.generation = Some(map.generation());
        }

        let mut added = 0;
        for key in self.keys.clone() {
            let cache_key = (Tier::Boundary, key.clone());
            if let Some(id) = self.cache.get(&cache_key) {
                if map.has_layer(*id) {
                    continue;
                }
            }

            let url = self.url(&key);
            let layer = Layer::new(format!("boundary:{key}"), Tier::Boundary, VectorSource::remote(url))
                .with_style(boundary_style);
            self.cache.insert(cache_key, layer.id());
            if map.add_layer(layer) {
                added += 1;
            }
        }

        debug!(region = %self.region, added, total = self.cache.len(), "boundary layers set up");
        added
    }
}
