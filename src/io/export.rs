//! Export a stored shapefile as a zipped `.shp/.shx/.dbf/.prj` set.

use std::{fs, io::Cursor};

use anyhow::Context;
use shapefile::ShapeWriter;
use thiserror::Error;
use tracing::{debug, info};

use super::dbf::{encode_value, DbfWriter, ValueError};
use crate::{
    common::{zip_dir, ShapeBatch},
    crs::{CoordTransform, SpatialReference},
    geometry::{FeatureGeometry, GeometryKind},
    store::{Attribute, Feature, Shapefile, Store},
};

#[derive(Debug, Error)]
pub enum ExportError {
    #[error("Unsupported spatial reference: {0}")]
    SpatialReference(String),

    #[error("{0} features cannot be written to a shapefile.")]
    UnsupportedGeometry(GeometryKind),

    #[error("Unable to reproject feature {id}: {detail}")]
    Reproject { id: i64, detail: String },

    #[error(transparent)]
    Value(#[from] ValueError),

    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

/// A finished archive and the name it should be downloaded as.
#[derive(Clone, Debug)]
pub struct ExportedArchive {
    pub filename: String,
    pub bytes: Vec<u8>,
}

/// Write `features` (with values in attribute order) back to the shapefile's
/// own spatial reference and zip the result.
pub fn write_archive(
    shapefile: &Shapefile,
    attributes: &[Attribute],
    features: &[(Feature, Vec<Option<String>>)],
) -> Result<ExportedArchive, ExportError> {
    let kind = shapefile.storage_kind();
    if kind == GeometryKind::GeometryCollection {
        return Err(ExportError::UnsupportedGeometry(kind));
    }

    let target = SpatialReference::from_wkt(&shapefile.srs_wkt)
        .map_err(|e| ExportError::SpatialReference(format!("{e:#}")))?;
    let transform = CoordTransform::new(&SpatialReference::wgs84(), &target)
        .map_err(|e| ExportError::SpatialReference(format!("{e:#}")))?;

    let geometries = features.iter()
        .map(|(feature, _)| transform.transform(&feature.geometry)
            .map_err(|e| ExportError::Reproject { id: feature.id, detail: format!("{e:#}") }))
        .collect::<Result<Vec<FeatureGeometry>, _>>()?;

    let stem = shapefile.stem();
    let dir = tempfile::tempdir().context("failed to create export directory")?;

    let shp_path = dir.path().join(format!("{stem}.shp"));
    {
        // the writer completes the .shp and .shx headers when dropped
        let mut writer = ShapeWriter::from_path(&shp_path)
            .with_context(|| format!("failed to create {}", shp_path.display()))?;
        let batch = ShapeBatch::from_geometries(kind, &geometries)?;
        debug!("writing {} {kind} shapes to {}", batch.len(), shp_path.display());
        let written = match batch {
            ShapeBatch::Points(shapes) => shapes.iter().try_for_each(|s| writer.write_shape(s)),
            ShapeBatch::Multipoints(shapes) => shapes.iter().try_for_each(|s| writer.write_shape(s)),
            ShapeBatch::Polylines(shapes) => shapes.iter().try_for_each(|s| writer.write_shape(s)),
            ShapeBatch::Polygons(shapes) => shapes.iter().try_for_each(|s| writer.write_shape(s)),
        };
        written.with_context(|| format!("failed to write {}", shp_path.display()))?;
    }

    let dbf_path = dir.path().join(format!("{stem}.dbf"));
    let fields = attributes.iter().map(Attribute::descriptor).collect::<Vec<_>>();
    let mut table = DbfWriter::new(Cursor::new(Vec::new()), &fields)?;
    for (_, values) in features {
        let encoded = fields.iter().zip(values)
            .map(|(field, value)| encode_value(field, value.as_deref(), shapefile.encoding))
            .collect::<Result<Vec<_>, _>>()?;
        table.write_record(&encoded)?;
    }
    let table_bytes = table.finish()?.into_inner();
    fs::write(&dbf_path, table_bytes)
        .with_context(|| format!("failed to write {}", dbf_path.display()))?;

    let prj_path = dir.path().join(format!("{stem}.prj"));
    fs::write(&prj_path, &shapefile.srs_wkt).with_context(|| format!("failed to write {}", prj_path.display()))?;

    let bytes = zip_dir(dir.path())?;
    Ok(ExportedArchive { filename: format!("{stem}.zip"), bytes })
}

/// Export shapefile `id`, or `None` if there is no such shapefile.
pub async fn export_data(store: &Store, id: i64) -> Result<Option<ExportedArchive>, ExportError> {
    let Some(shapefile) = store.shapefile(id).await? else { return Ok(None) };
    let attributes = store.attributes(id).await?;
    let features = store.features_with_values(id).await?;

    let count = features.len();
    let archive = tokio::task::spawn_blocking(move || write_archive(&shapefile, &attributes, &features))
        .await
        .map_err(anyhow::Error::from)??;

    info!("exported shapefile {id} as {} ({count} features, {} bytes)", archive.filename, archive.bytes.len());
    Ok(Some(archive))
}
