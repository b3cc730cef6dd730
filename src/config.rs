//! Command line and config file.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::Parser;
use serde::Deserialize;

use crate::map::ViewOptions;

/// Terminal travel-journal map
#[derive(Debug, Clone, Parser)]
#[command(name = "travel-map", version, about, long_about = None)]
pub struct Args {
    /// Directory holding GeoJSON data and markers.json
    #[arg(long, default_value = "public")]
    pub data_dir: PathBuf,

    /// JSON config file (view, region, region keys)
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// JSON marker list; defaults to <data-dir>/markers.json, then the built-in list
    #[arg(long)]
    pub markers: Option<PathBuf>,

    /// Region whose boundaries are shown, overriding the config
    #[arg(long)]
    pub region: Option<String>,

    /// Site prefix for full-page navigation
    #[arg(long, default_value = "https://travel.example.org")]
    pub site_url: String,

    /// Disable in-app pages; clicks fall back to full-page navigation
    #[arg(long)]
    pub no_router: bool,

    /// Directory for the log file
    #[arg(long, default_value = "logs")]
    pub log_dir: PathBuf,
}

impl Args {
    /// The marker file to read, if any
    pub fn markers_path(&self) -> Option<PathBuf> {
        if let Some(path) = &self.markers {
            return Some(path.clone());
        }
        let default = self.data_dir.join("markers.json");
        default.exists().then_some(default)
    }
}

/// Map configuration. Every field has a default.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct MapConfig {
    pub view: ViewOptions,
    pub region: String,
    pub region_keys: Vec<String>,
}

impl Default for MapConfig {
    fn default() -> Self {
        Self {
            view: ViewOptions::default(),
            region: "china".to_string(),
            region_keys: [
                "beijing",
                "shanghai",
                "sichuan",
                "yunnan",
                "xizang",
                "xinjiang",
                "guangdong",
                "zhejiang",
            ]
            .into_iter()
            .map(str::to_string)
            .collect(),
        }
    }
}

impl MapConfig {
    pub fn from_json_slice(bytes: &mut [u8]) -> Result<Self> {
        Ok(simd_json::serde::from_slice(bytes)?)
    }

    pub fn load(path: &Path) -> Result<Self> {
        let mut bytes = fs::read(path).with_context(|| format!("reading {}", path.display()))?;
        Self::from_json_slice(&mut bytes).with_context(|| format!("parsing {}", path.display()))
    }

    /// Config from `args`: the file if given, then the region override
    pub fn resolve(args: &Args) -> Result<Self> {
        let mut config = match &args.config {
            Some(path) => Self::load(path)?,
            None => Self::default(),
        };
        if let Some(region) = &args.region {
            config.region = region.clone();
        }
        Ok(config)
    }
}
