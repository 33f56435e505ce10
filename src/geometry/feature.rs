use anyhow::{anyhow, bail, Result};
use geo::{
    BoundingRect, Coord, Geometry, GeometryCollection, MapCoords, MultiLineString, MultiPoint,
    MultiPolygon, Point, Rect,
};
use wkt::{ToWkt, TryFromWkt};

use super::GeometryKind;

/// The single geometry a feature stores, one variant per storage kind.
#[derive(Clone, Debug, PartialEq)]
pub enum FeatureGeometry {
    Point(Point<f64>),
    MultiPoint(MultiPoint<f64>),
    MultiLineString(MultiLineString<f64>),
    MultiPolygon(MultiPolygon<f64>),
    GeometryCollection(GeometryCollection<f64>),
}

impl FeatureGeometry {
    pub fn kind(&self) -> GeometryKind {
        match self {
            Self::Point(_) => GeometryKind::Point,
            Self::MultiPoint(_) => GeometryKind::MultiPoint,
            Self::MultiLineString(_) => GeometryKind::MultiLineString,
            Self::MultiPolygon(_) => GeometryKind::MultiPolygon,
            Self::GeometryCollection(_) => GeometryKind::GeometryCollection,
        }
    }

    /// Coerce a generic geometry into the given storage kind.
    /// Single line strings and polygons are wrapped into their multi form;
    /// anything else must already match `kind`.
    pub fn coerce(geometry: Geometry<f64>, kind: GeometryKind) -> Result<Self> {
        let found = geometry_name(&geometry);
        let coerced = match (kind, geometry) {
            (GeometryKind::Point, Geometry::Point(p)) => Self::Point(p),
            (GeometryKind::MultiPoint, Geometry::MultiPoint(mp)) => Self::MultiPoint(mp),
            (GeometryKind::MultiPoint, Geometry::Point(p)) => Self::MultiPoint(MultiPoint(vec![p])),
            (GeometryKind::MultiLineString, Geometry::MultiLineString(mls)) => Self::MultiLineString(mls),
            (GeometryKind::MultiLineString, Geometry::LineString(ls)) => Self::MultiLineString(MultiLineString(vec![ls])),
            (GeometryKind::MultiPolygon, Geometry::MultiPolygon(mp)) => Self::MultiPolygon(mp),
            (GeometryKind::MultiPolygon, Geometry::Polygon(p)) => Self::MultiPolygon(MultiPolygon(vec![p])),
            (GeometryKind::GeometryCollection, Geometry::GeometryCollection(gc)) => Self::GeometryCollection(gc),
            (kind, _) => bail!("expected a {kind} geometry, found {found}"),
        };
        Ok(coerced)
    }

    /// Parse well-known text into the given storage kind.
    pub fn from_wkt(text: &str, kind: GeometryKind) -> Result<Self> {
        let geometry = Geometry::<f64>::try_from_wkt_str(text.trim())
            .map_err(|e| anyhow!("invalid WKT: {e}"))?;
        Self::coerce(geometry, kind)
    }

    pub fn to_wkt(&self) -> String { self.to_geometry().wkt_string() }

    pub fn to_geometry(&self) -> Geometry<f64> {
        match self {
            Self::Point(p) => Geometry::Point(*p),
            Self::MultiPoint(mp) => Geometry::MultiPoint(mp.clone()),
            Self::MultiLineString(mls) => Geometry::MultiLineString(mls.clone()),
            Self::MultiPolygon(mp) => Geometry::MultiPolygon(mp.clone()),
            Self::GeometryCollection(gc) => Geometry::GeometryCollection(gc.clone()),
        }
    }

    pub fn bounding_rect(&self) -> Option<Rect<f64>> {
        match self {
            Self::Point(p) => Some(Rect::new(p.0, p.0)),
            Self::MultiPoint(mp) => mp.bounding_rect(),
            Self::MultiLineString(mls) => mls.bounding_rect(),
            Self::MultiPolygon(mp) => mp.bounding_rect(),
            Self::GeometryCollection(gc) => gc.bounding_rect(),
        }
    }

    /// Apply a fallible coordinate mapping (e.g. a reprojection) to every vertex.
    pub fn try_map_coords<F>(&self, func: F) -> Result<Self>
    where
        F: Fn(Coord<f64>) -> Result<Coord<f64>> + Copy,
    {
        Ok(match self {
            Self::Point(p) => Self::Point(p.try_map_coords(func)?),
            Self::MultiPoint(mp) => Self::MultiPoint(mp.try_map_coords(func)?),
            Self::MultiLineString(mls) => Self::MultiLineString(mls.try_map_coords(func)?),
            Self::MultiPolygon(mp) => Self::MultiPolygon(mp.try_map_coords(func)?),
            Self::GeometryCollection(gc) => Self::GeometryCollection(gc.try_map_coords(func)?),
        })
    }
}

/// WKT-style name of a geo geometry, used in mismatch messages.
fn geometry_name(geometry: &Geometry<f64>) -> &'static str {
    match geometry {
        Geometry::Point(_) => "Point",
        Geometry::Line(_) => "Line",
        Geometry::LineString(_) => "LineString",
        Geometry::Polygon(_) => "Polygon",
        Geometry::MultiPoint(_) => "MultiPoint",
        Geometry::MultiLineString(_) => "MultiLineString",
        Geometry::MultiPolygon(_) => "MultiPolygon",
        Geometry::GeometryCollection(_) => "GeometryCollection",
        Geometry::Rect(_) => "Rect",
        Geometry::Triangle(_) => "Triangle",
    }
}
