//! Shapefile reading and writing.
//!
//! - `dbf` - dBase attribute tables with raw field access
//! - `import` - zipped shapefile → parsed records for the store
//! - `export` - stored records → zipped shapefile
//! - `basemap` - world borders reference layer for tile backgrounds

pub mod basemap;
pub mod dbf;
pub mod export;
pub mod import;

use std::path::Path;

use anyhow::{anyhow, ensure, Context, Result};
use shapefile::{Shape, ShapeReader, ShapeType};

use crate::common::find_companion;
use dbf::DbfReader;

/// Geometry and attribute halves of a `.shp` on disk.
pub(crate) struct Layer {
    pub(crate) shape_type: ShapeType,
    pub(crate) shapes: Vec<Shape>,
    pub(crate) table: DbfReader,
}

impl Layer {
    /// Read every shape of `shp_path` and the `.dbf` that sits next to it.
    pub(crate) fn open(shp_path: &Path) -> Result<Self> {
        let reader = ShapeReader::from_path(shp_path)
            .with_context(|| format!("failed to open {}", shp_path.display()))?;
        let shape_type = reader.header().shape_type;
        let shapes = reader.read()
            .with_context(|| format!("failed to read shapes from {}", shp_path.display()))?;

        let dir = shp_path.parent().unwrap_or(Path::new("."));
        let stem = shp_path.file_stem()
            .and_then(|s| s.to_str())
            .ok_or_else(|| anyhow!("unusable file name {}", shp_path.display()))?;
        let dbf_path = find_companion(dir, stem, "dbf")?
            .ok_or_else(|| anyhow!("no .dbf next to {}", shp_path.display()))?;
        let table = DbfReader::open(&dbf_path)?;

        ensure!(shapes.len() == table.record_count(),
            "{} has {} shapes but {} attribute records", shp_path.display(), shapes.len(), table.record_count());

        Ok(Self { shape_type, shapes, table })
    }
}
