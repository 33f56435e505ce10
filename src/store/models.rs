use geo::MultiPolygon;
use serde::Serialize;

use crate::{
    geometry::{FeatureGeometry, GeometryKind, LayerGeometryType},
    io::dbf::{CharacterEncoding, FieldDescriptor},
};

/// One imported shapefile.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Shapefile {
    pub id: i64,
    pub filename: String,
    /// Source spatial reference as WKT, written back verbatim on export.
    pub srs_wkt: String,
    pub geom_type: LayerGeometryType,
    pub encoding: CharacterEncoding,
}

impl Shapefile {
    #[inline] pub fn storage_kind(&self) -> GeometryKind { self.geom_type.storage_kind() }

    /// Filename without its `.shp` extension.
    pub fn stem(&self) -> &str {
        std::path::Path::new(&self.filename)
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or(&self.filename)
    }
}

/// One field definition of a shapefile's attribute table.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Attribute {
    pub id: i64,
    pub shapefile_id: i64,
    pub ordinal: i64,
    pub name: String,
    pub type_code: char,
    pub width: u8,
    pub precision: u8,
}

impl Attribute {
    pub fn descriptor(&self) -> FieldDescriptor {
        FieldDescriptor {
            name: self.name.clone(),
            type_code: self.type_code,
            width: self.width,
            precision: self.precision,
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct Feature {
    pub id: i64,
    pub shapefile_id: i64,
    pub geometry: FeatureGeometry,
}

/// A named base-map polygon.
#[derive(Clone, Debug, PartialEq)]
pub struct BaseMap {
    pub name: String,
    pub geometry: MultiPolygon<f64>,
}

/// A fully parsed shapefile, ready to be persisted in one transaction.
#[derive(Clone, Debug)]
pub struct NewShapefile {
    pub filename: String,
    pub srs_wkt: String,
    pub geom_type: LayerGeometryType,
    pub encoding: CharacterEncoding,
    pub attributes: Vec<FieldDescriptor>,
    pub features: Vec<NewFeature>,
}

/// A feature and its attribute values, one per attribute in schema order.
#[derive(Clone, Debug)]
pub struct NewFeature {
    pub geometry: FeatureGeometry,
    pub values: Vec<Option<String>>,
}
