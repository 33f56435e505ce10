//! Base-map reference layer (world borders) for the tile background.

use std::path::Path;

use anyhow::{anyhow, bail, Context, Result};

use super::{
    dbf::{decode_value, CharacterEncoding},
    Layer,
};
use crate::{
    common::shape_to_geometry,
    geometry::{FeatureGeometry, GeometryKind},
    store::BaseMap,
};

/// Attribute holding each polygon's name.
pub const NAME_FIELD: &str = "NAME";

/// Reference layers are distributed in Latin-1.
pub const BASE_MAP_ENCODING: CharacterEncoding = CharacterEncoding::Latin1;

/// Read the named polygons of a world-borders style shapefile.
/// Coordinates are taken as longitude/latitude without reprojection.
pub fn read_base_map(shp_path: &Path) -> Result<Vec<BaseMap>> {
    let layer = Layer::open(shp_path)?;

    let (name_index, name_field) = layer.table.fields().iter().enumerate()
        .find(|(_, f)| f.name.eq_ignore_ascii_case(NAME_FIELD))
        .ok_or_else(|| anyhow!("{} has no {NAME_FIELD} attribute", shp_path.display()))?;

    let mut rows = Vec::with_capacity(layer.shapes.len());
    for (i, shape) in layer.shapes.into_iter().enumerate() {
        let record = layer.table.record(i)?;
        if record.deleted { continue }

        let raw = record.field(name_index).unwrap_or_default();
        let name = decode_value(name_field, raw, BASE_MAP_ENCODING)
            .with_context(|| format!("record {}", i + 1))?
            .unwrap_or_default();

        match shape_to_geometry(shape, GeometryKind::MultiPolygon)
            .with_context(|| format!("base map record {} ({name})", i + 1))?
        {
            Some(FeatureGeometry::MultiPolygon(geometry)) => rows.push(BaseMap { name, geometry }),
            Some(other) => bail!("base map record {} is a {}, expected polygons", i + 1, other.kind()),
            None => continue,
        }
    }
    Ok(rows)
}
