use geo::{Geometry, LineString, Polygon};
use serde::Serialize;
use thiserror::Error;

use crate::geometry::{FeatureGeometry, GeometryKind};

#[derive(Debug, Error, PartialEq)]
pub enum FormError {
    #[error("This field is required.")]
    Required,
    #[error("Invalid geometry: {0}")]
    Invalid(String),
    #[error("Lines need at least two points.")]
    ShortLine,
    #[error("Polygon rings need at least four coordinates.")]
    ShortRing,
}

/// Geometry form for one storage kind: a single WKT field named `geometry`.
#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
pub struct MapForm {
    pub field: &'static str,
    pub geometry_type: GeometryKind,
}

impl MapForm {
    pub const FIELD: &'static str = "geometry";

    pub fn for_kind(kind: GeometryKind) -> Self {
        Self { field: Self::FIELD, geometry_type: kind }
    }

    /// Initial field value for an existing feature.
    #[inline]
    pub fn initial(&self, geometry: &FeatureGeometry) -> String { geometry.to_wkt() }

    /// Parse and validate submitted WKT into this form's storage kind.
    pub fn clean(&self, input: Option<&str>) -> Result<FeatureGeometry, FormError> {
        let text = input.map(str::trim).filter(|s| !s.is_empty()).ok_or(FormError::Required)?;
        let geometry = FeatureGeometry::from_wkt(text, self.geometry_type)
            .map_err(|e| FormError::Invalid(e.to_string()))?;
        validate(&geometry.to_geometry())?;
        Ok(geometry)
    }
}

fn validate(geometry: &Geometry<f64>) -> Result<(), FormError> {
    match geometry {
        Geometry::LineString(ls) => validate_line(ls),
        Geometry::MultiLineString(mls) => mls.iter().try_for_each(validate_line),
        Geometry::Polygon(p) => validate_polygon(p),
        Geometry::MultiPolygon(mp) => mp.iter().try_for_each(validate_polygon),
        Geometry::GeometryCollection(gc) => gc.iter().try_for_each(validate),
        _ => Ok(()),
    }
}

fn validate_line(ls: &LineString<f64>) -> Result<(), FormError> {
    if ls.0.len() < 2 { return Err(FormError::ShortLine) }
    Ok(())
}

fn validate_polygon(polygon: &Polygon<f64>) -> Result<(), FormError> {
    std::iter::once(polygon.exterior())
        .chain(polygon.interiors())
        .try_for_each(|ring| if ring.0.len() < 4 { Err(FormError::ShortRing) } else { Ok(()) })
}
