//! Import a zipped shapefile into the store.

use std::{
    fs,
    io::{Seek, SeekFrom, Write},
    path::Path,
};

use anyhow::{anyhow, Context};
use bytes::Bytes;
use thiserror::Error;
use tracing::{info, warn};
use zip::ZipArchive;

use super::{
    dbf::{decode_value, CharacterEncoding, ValueError},
    Layer,
};
use crate::{
    common::{entry_suffix, extract_flat, find_companion, shape_to_geometry, zip_entry_names},
    crs::{CoordTransform, SpatialReference},
    geometry::LayerGeometryType,
    store::{NewFeature, NewShapefile, Store},
};

/// Component files an uploaded archive must contain, in the order they are checked.
pub const REQUIRED_SUFFIXES: [&str; 4] = [".shp", ".shx", ".dbf", ".prj"];

/// Reasons an import is refused. The messages are shown to the uploader.
#[derive(Debug, Error)]
pub enum ImportError {
    #[error("Not a valid zip archive.")]
    NotZip,

    #[error("Archive missing required {0} file.")]
    MissingFile(&'static str),

    #[error("Not a valid shapefile.")]
    InvalidShapefile,

    #[error("Unsupported spatial reference: {0}")]
    SpatialReference(String),

    #[error("Feature {0} has no geometry.")]
    MissingGeometry(usize),

    #[error("Unable to reproject feature {index}: {detail}")]
    Reproject { index: usize, detail: String },

    #[error(transparent)]
    Value(#[from] ValueError),

    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

/// Parse an uploaded archive into a shapefile ready to persist.
/// Nothing touches the database here; temporary files are removed on return.
pub fn read_archive(data: &[u8], encoding: CharacterEncoding) -> Result<NewShapefile, ImportError> {
    let mut upload = tempfile::Builder::new()
        .prefix("upload-")
        .suffix(".zip")
        .tempfile()
        .context("failed to create temporary upload file")?;
    upload.write_all(data).context("failed to store upload")?;
    upload.seek(SeekFrom::Start(0)).context("failed to rewind upload")?;

    let mut archive = ZipArchive::new(upload.as_file()).map_err(|_| ImportError::NotZip)?;
    let names = zip_entry_names(&mut archive).map_err(|_| ImportError::NotZip)?;

    for name in &names {
        let known = entry_suffix(name).is_some_and(|s| REQUIRED_SUFFIXES.contains(&s.as_str()));
        if !known { info!("Extraneous file: {name}") }
    }
    for suffix in REQUIRED_SUFFIXES {
        if !names.iter().any(|name| entry_suffix(name).as_deref() == Some(suffix)) {
            return Err(ImportError::MissingFile(suffix));
        }
    }

    let dir = tempfile::tempdir().context("failed to create temporary directory")?;
    extract_flat(&mut archive, dir.path()).map_err(|e| {
        warn!("failed to extract upload: {e:#}");
        ImportError::NotZip
    })?;

    let filename = names.iter()
        .find(|name| entry_suffix(name).as_deref() == Some(".shp"))
        .and_then(|name| Path::new(name).file_name())
        .and_then(|name| name.to_str())
        .ok_or(ImportError::InvalidShapefile)?
        .to_string();

    read_extracted(dir.path(), &filename, encoding)
}

/// Read the extracted component files of `filename` inside `dir`.
fn read_extracted(dir: &Path, filename: &str, encoding: CharacterEncoding) -> Result<NewShapefile, ImportError> {
    fn invalid(filename: &str, err: anyhow::Error) -> ImportError {
        warn!("{filename}: {err:#}");
        ImportError::InvalidShapefile
    }

    let shp_path = dir.join(filename);
    let layer = Layer::open(&shp_path).map_err(|e| invalid(filename, e))?;
    let geom_type = LayerGeometryType::from_shape_type(layer.shape_type)
        .ok_or_else(|| invalid(filename, anyhow!("unsupported shape type {:?}", layer.shape_type)))?;
    let kind = geom_type.storage_kind();

    let stem = Path::new(filename).file_stem().and_then(|s| s.to_str()).unwrap_or(filename);
    let prj_path = find_companion(dir, stem, "prj")?
        .ok_or(ImportError::MissingFile(".prj"))?;
    let prj = fs::read(&prj_path).with_context(|| format!("failed to read {}", prj_path.display()))?;
    let srs_wkt = String::from_utf8_lossy(&prj).trim().to_string();

    let source = SpatialReference::from_wkt(&srs_wkt)
        .map_err(|e| ImportError::SpatialReference(format!("{e:#}")))?;
    let transform = CoordTransform::new(&source, &SpatialReference::wgs84())
        .map_err(|e| ImportError::SpatialReference(format!("{e:#}")))?;

    let attributes = layer.table.fields().to_vec();
    let mut features = Vec::with_capacity(layer.shapes.len());

    for (i, shape) in layer.shapes.into_iter().enumerate() {
        let record = layer.table.record(i)?;
        if record.deleted { continue }

        let number = i + 1;
        let geometry = shape_to_geometry(shape, kind)
            .map_err(|e| invalid(filename, e.context(format!("feature {number}"))))?
            .ok_or(ImportError::MissingGeometry(number))?;
        let geometry = transform.transform(&geometry)
            .map_err(|e| ImportError::Reproject { index: number, detail: format!("{e:#}") })?;

        let values = attributes.iter().enumerate()
            .map(|(j, field)| {
                let raw = record.field(j).unwrap_or_default();
                decode_value(field, raw, encoding)
            })
            .collect::<Result<Vec<_>, _>>()?;

        features.push(NewFeature { geometry, values });
    }

    Ok(NewShapefile {
        filename: filename.to_string(),
        srs_wkt,
        geom_type,
        encoding,
        attributes,
        features,
    })
}

/// Parse `data` off the async runtime and persist it in one transaction.
/// Returns the new shapefile id.
pub async fn import_data(store: &Store, data: Bytes, encoding: CharacterEncoding) -> Result<i64, ImportError> {
    let parsed = tokio::task::spawn_blocking(move || read_archive(&data, encoding))
        .await
        .map_err(anyhow::Error::from)??;

    let id = store.insert_shapefile(&parsed).await?;
    info!("imported {} as shapefile {id} ({} features)", parsed.filename, parsed.features.len());
    Ok(id)
}
