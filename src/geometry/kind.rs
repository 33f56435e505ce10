use std::{fmt, str::FromStr};

use anyhow::{anyhow, Result};
use serde::{Deserialize, Serialize};
use shapefile::ShapeType;

/// Geometry type declared by an imported layer, as reported by its `.shp` header.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum LayerGeometryType {
    Point,
    LineString,
    Polygon,
    MultiPoint,
    MultiLineString,
    MultiPolygon,
    GeometryCollection,
}

/// The geometry variant a feature row actually stores.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum GeometryKind {
    Point,
    MultiPoint,
    MultiLineString,
    MultiPolygon,
    GeometryCollection,
}

/// Rendering category of a geometry.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum GeometryCategory { Point, Line, Polygon, Mixed }

impl LayerGeometryType {
    pub const ALL: [LayerGeometryType; 7] = [
        Self::Point,
        Self::LineString,
        Self::Polygon,
        Self::MultiPoint,
        Self::MultiLineString,
        Self::MultiPolygon,
        Self::GeometryCollection,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Self::Point => "Point",
            Self::LineString => "LineString",
            Self::Polygon => "Polygon",
            Self::MultiPoint => "MultiPoint",
            Self::MultiLineString => "MultiLineString",
            Self::MultiPolygon => "MultiPolygon",
            Self::GeometryCollection => "GeometryCollection",
        }
    }

    /// Storage kind for features of this layer; single line strings and
    /// polygons are stored in their multi form.
    pub fn storage_kind(&self) -> GeometryKind {
        match self {
            Self::Point => GeometryKind::Point,
            Self::MultiPoint => GeometryKind::MultiPoint,
            Self::LineString | Self::MultiLineString => GeometryKind::MultiLineString,
            Self::Polygon | Self::MultiPolygon => GeometryKind::MultiPolygon,
            Self::GeometryCollection => GeometryKind::GeometryCollection,
        }
    }

    /// Map a `.shp` header shape type onto a layer geometry type (Z/M variants drop to 2D).
    pub fn from_shape_type(ty: ShapeType) -> Option<Self> {
        match ty {
            ShapeType::Point | ShapeType::PointM | ShapeType::PointZ => Some(Self::Point),
            ShapeType::Polyline | ShapeType::PolylineM | ShapeType::PolylineZ => Some(Self::LineString),
            ShapeType::Polygon | ShapeType::PolygonM | ShapeType::PolygonZ => Some(Self::Polygon),
            ShapeType::Multipoint | ShapeType::MultipointM | ShapeType::MultipointZ => Some(Self::MultiPoint),
            _ => None,
        }
    }
}

impl fmt::Display for LayerGeometryType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { f.write_str(self.name()) }
}

impl FromStr for LayerGeometryType {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::ALL.into_iter()
            .find(|ty| ty.name() == s)
            .ok_or_else(|| anyhow!("unknown layer geometry type: {s:?}"))
    }
}

impl GeometryKind {
    pub const ALL: [GeometryKind; 5] = [
        Self::Point,
        Self::MultiPoint,
        Self::MultiLineString,
        Self::MultiPolygon,
        Self::GeometryCollection,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Self::Point => "Point",
            Self::MultiPoint => "MultiPoint",
            Self::MultiLineString => "MultiLineString",
            Self::MultiPolygon => "MultiPolygon",
            Self::GeometryCollection => "GeometryCollection",
        }
    }

    pub fn category(&self) -> GeometryCategory {
        match self {
            Self::Point | Self::MultiPoint => GeometryCategory::Point,
            Self::MultiLineString => GeometryCategory::Line,
            Self::MultiPolygon => GeometryCategory::Polygon,
            Self::GeometryCollection => GeometryCategory::Mixed,
        }
    }
}

impl fmt::Display for GeometryKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { f.write_str(self.name()) }
}

impl FromStr for GeometryKind {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::ALL.into_iter()
            .find(|kind| kind.name() == s)
            .ok_or_else(|| anyhow!("unknown geometry kind: {s:?}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn polygons_and_lines_are_stored_as_multi() {
        assert_eq!(LayerGeometryType::Polygon.storage_kind(), GeometryKind::MultiPolygon);
        assert_eq!(LayerGeometryType::LineString.storage_kind(), GeometryKind::MultiLineString);
        assert_eq!(LayerGeometryType::Point.storage_kind(), GeometryKind::Point);
        assert_eq!(LayerGeometryType::MultiPoint.storage_kind(), GeometryKind::MultiPoint);
    }

    #[test]
    fn shape_types_drop_measure_and_z() {
        assert_eq!(LayerGeometryType::from_shape_type(ShapeType::PolygonZ), Some(LayerGeometryType::Polygon));
        assert_eq!(LayerGeometryType::from_shape_type(ShapeType::PolylineM), Some(LayerGeometryType::LineString));
        assert_eq!(LayerGeometryType::from_shape_type(ShapeType::NullShape), None);
        assert_eq!(LayerGeometryType::from_shape_type(ShapeType::Multipatch), None);
    }

    #[test]
    fn names_round_trip() {
        for ty in LayerGeometryType::ALL {
            assert_eq!(ty.name().parse::<LayerGeometryType>().unwrap(), ty);
        }
        for kind in GeometryKind::ALL {
            assert_eq!(kind.to_string().parse::<GeometryKind>().unwrap(), kind);
        }
        assert!("Circle".parse::<GeometryKind>().is_err());
    }
}
