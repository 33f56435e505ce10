use std::{fs, path::Path};

use anyhow::{Context, Result};
use serde::Deserialize;

use crate::editor::DEFAULT_SEARCH_RADIUS_M;

/// Server settings, read from an optional TOML file.
/// Every key is optional; missing keys take the defaults below.
#[derive(Clone, Debug, Deserialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    /// ip and port to bind to
    pub listen: String,

    /// sqlx sqlite connection url
    pub database_url: String,

    /// Maximum upload size, in bytes
    pub upload_limit: usize,

    /// Title of the tile map service
    pub tms_title: String,

    /// Click tolerance of the feature finder, in meters
    pub search_radius_m: f64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            listen: "127.0.0.1:8000".into(),
            database_url: "sqlite://shape-editor.sqlite?mode=rwc".into(),
            upload_limit: 64 * 1024 * 1024, // 64Mb
            tms_title: "ShapeEditor Tile Map Service".into(),
            search_radius_m: DEFAULT_SEARCH_RADIUS_M,
        }
    }
}

impl Config {
    pub fn from_toml(text: &str) -> Result<Self> {
        toml::from_str(text).context("invalid configuration")
    }

    pub fn load(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path)
            .with_context(|| format!("failed to read config {}", path.display()))?;
        Self::from_toml(&text).with_context(|| format!("in {}", path.display()))
    }
}
