use anyhow::{bail, Result};
use geo::{Coord, LineString, MultiLineString, MultiPoint, MultiPolygon, Point, Polygon};
use shapefile as shp;

use crate::geometry::{FeatureGeometry, GeometryKind};

/// Planar coordinates of any shapefile point flavour (Z and M are dropped).
pub(crate) trait PlanarPoint {
    fn coord(&self) -> Coord<f64>;
}

impl PlanarPoint for shp::Point {
    fn coord(&self) -> Coord<f64> { Coord { x: self.x, y: self.y } }
}

impl PlanarPoint for shp::PointM {
    fn coord(&self) -> Coord<f64> { Coord { x: self.x, y: self.y } }
}

impl PlanarPoint for shp::PointZ {
    fn coord(&self) -> Coord<f64> { Coord { x: self.x, y: self.y } }
}

/// Convert a shapefile shape into the storage geometry for `kind`.
/// Returns `None` for null shapes.
pub(crate) fn shape_to_geometry(shape: shp::Shape, kind: GeometryKind) -> Result<Option<FeatureGeometry>> {
    use shp::Shape;

    let geometry = match shape {
        Shape::NullShape => return Ok(None),
        Shape::Point(p) => FeatureGeometry::Point(Point(p.coord())),
        Shape::PointM(p) => FeatureGeometry::Point(Point(p.coord())),
        Shape::PointZ(p) => FeatureGeometry::Point(Point(p.coord())),
        Shape::Multipoint(mp) => FeatureGeometry::MultiPoint(points_to_multipoint(mp.points())),
        Shape::MultipointM(mp) => FeatureGeometry::MultiPoint(points_to_multipoint(mp.points())),
        Shape::MultipointZ(mp) => FeatureGeometry::MultiPoint(points_to_multipoint(mp.points())),
        Shape::Polyline(pl) => FeatureGeometry::MultiLineString(parts_to_multilinestring(pl.parts())),
        Shape::PolylineM(pl) => FeatureGeometry::MultiLineString(parts_to_multilinestring(pl.parts())),
        Shape::PolylineZ(pl) => FeatureGeometry::MultiLineString(parts_to_multilinestring(pl.parts())),
        Shape::Polygon(p) => FeatureGeometry::MultiPolygon(shp_to_geo(p.rings())),
        Shape::PolygonM(p) => FeatureGeometry::MultiPolygon(shp_to_geo(p.rings())),
        Shape::PolygonZ(p) => FeatureGeometry::MultiPolygon(shp_to_geo(p.rings())),
        Shape::Multipatch(_) => bail!("multipatch shapes are not supported"),
    };

    FeatureGeometry::coerce(geometry.to_geometry(), kind).map(Some)
}

fn points_to_multipoint<P: PlanarPoint>(points: &[P]) -> MultiPoint<f64> {
    MultiPoint(points.iter().map(|p| Point(p.coord())).collect())
}

fn parts_to_multilinestring<P: PlanarPoint>(parts: &[Vec<P>]) -> MultiLineString<f64> {
    MultiLineString(parts.iter()
        .map(|part| LineString(part.iter().map(PlanarPoint::coord).collect()))
        .collect())
}

/// Convert shapefile polygon rings to geo::MultiPolygon<f64>.
/// Shapefiles store each outer ring followed by its holes.
pub(crate) fn shp_to_geo<P: PlanarPoint>(rings: &[shp::PolygonRing<P>]) -> MultiPolygon<f64> {
    /// Ensure first and last are the same for geo::LineString coords
    fn ensure_closed(coords: &mut Vec<Coord<f64>>) {
        if let (Some(&first), Some(&last)) = (coords.first(), coords.last()) {
            if first != last { coords.push(first) }
        }
    }

    let mut polys: Vec<Polygon<f64>> = Vec::new();
    let mut current_exterior: Option<LineString<f64>> = None;
    let mut current_holes: Vec<LineString<f64>> = Vec::new();

    for ring in rings {
        let mut coords: Vec<Coord<f64>> = ring.points().iter().map(PlanarPoint::coord).collect();
        ensure_closed(&mut coords);
        let ls = LineString(coords);

        match ring {
            shp::PolygonRing::Outer(_) => {
                // flush previous polygon
                if let Some(ext) = current_exterior.take() {
                    polys.push(Polygon::new(ext, std::mem::take(&mut current_holes)));
                }
                current_exterior = Some(ls);
            }
            shp::PolygonRing::Inner(_) => current_holes.push(ls),
        }
    }
    if let Some(ext) = current_exterior {
        polys.push(Polygon::new(ext, current_holes));
    }

    MultiPolygon(polys)
}

/// Convert geo::MultiPolygon<f64> to shapefile::Polygon
pub(crate) fn geo_to_shp(mp: &MultiPolygon<f64>) -> shp::Polygon {
    /// Create a shapefile::Point
    #[inline] fn shp_point(c: &Coord<f64>) -> shp::Point { shp::Point { x: c.x, y: c.y } }

    /// Close a ring of shapefile::Point
    fn ensure_closed(pts: &mut Vec<shp::Point>) {
        if let (Some(&first), Some(&last)) = (pts.first(), pts.last()) {
            if first.x != last.x || first.y != last.y { pts.push(first) }
        }
    }

    /// Get the signed area of a shapefile::Point list (negative for clockwise)
    fn signed_area(pts: &[shp::Point]) -> f64 {
        let mut a = 0.0;
        for w in pts.windows(2) {
            a += w[0].x * w[1].y - w[1].x * w[0].y;
        }
        a / 2.0
    }

    // Shapefile ordering: [ext CW, hole CCW, hole CCW, ..., next ext CW, ...]
    let mut rings: Vec<shp::PolygonRing<shp::Point>> = Vec::new();

    for poly in &mp.0 {
        let mut ext_pts = poly.exterior().coords().map(shp_point).collect::<Vec<_>>();
        ensure_closed(&mut ext_pts);
        if signed_area(&ext_pts) > 0.0 {
            ext_pts.reverse(); // make CW
        }
        rings.push(shp::PolygonRing::Outer(ext_pts));

        for hole in poly.interiors() {
            let mut hole_pts = hole.coords().map(shp_point).collect::<Vec<_>>();
            ensure_closed(&mut hole_pts);
            if signed_area(&hole_pts) < 0.0 {
                hole_pts.reverse(); // make CCW
            }
            rings.push(shp::PolygonRing::Inner(hole_pts));
        }
    }

    shp::Polygon::with_rings(rings)
}

/// Shapes of a single type, ready to be handed to a `ShapeWriter`.
pub(crate) enum ShapeBatch {
    Points(Vec<shp::Point>),
    Multipoints(Vec<shp::Multipoint>),
    Polylines(Vec<shp::Polyline>),
    Polygons(Vec<shp::Polygon>),
}

impl ShapeBatch {
    /// Convert geometries of one storage kind to their shapefile shapes.
    pub(crate) fn from_geometries<'a>(
        kind: GeometryKind,
        geometries: impl IntoIterator<Item = &'a FeatureGeometry>,
    ) -> Result<Self> {
        fn mismatch(kind: GeometryKind, geometry: &FeatureGeometry) -> anyhow::Error {
            anyhow::anyhow!("expected a {kind} geometry, found {}", geometry.kind())
        }

        let geometries = geometries.into_iter();
        Ok(match kind {
            GeometryKind::Point => Self::Points(geometries
                .map(|g| match g {
                    FeatureGeometry::Point(p) => Ok(shp::Point { x: p.x(), y: p.y() }),
                    other => Err(mismatch(kind, other)),
                })
                .collect::<Result<_>>()?),
            GeometryKind::MultiPoint => Self::Multipoints(geometries
                .map(|g| match g {
                    FeatureGeometry::MultiPoint(mp) => Ok(shp::Multipoint::new(
                        mp.iter().map(|p| shp::Point { x: p.x(), y: p.y() }).collect())),
                    other => Err(mismatch(kind, other)),
                })
                .collect::<Result<_>>()?),
            GeometryKind::MultiLineString => Self::Polylines(geometries
                .map(|g| match g {
                    FeatureGeometry::MultiLineString(mls) => Ok(shp::Polyline::with_parts(mls.iter()
                        .map(|ls| ls.coords().map(|c| shp::Point { x: c.x, y: c.y }).collect())
                        .collect())),
                    other => Err(mismatch(kind, other)),
                })
                .collect::<Result<_>>()?),
            GeometryKind::MultiPolygon => Self::Polygons(geometries
                .map(|g| match g {
                    FeatureGeometry::MultiPolygon(mp) => Ok(geo_to_shp(mp)),
                    other => Err(mismatch(kind, other)),
                })
                .collect::<Result<_>>()?),
            GeometryKind::GeometryCollection => bail!("geometry collections cannot be written to a shapefile"),
        })
    }

    pub(crate) fn len(&self) -> usize {
        match self {
            Self::Points(v) => v.len(),
            Self::Multipoints(v) => v.len(),
            Self::Polylines(v) => v.len(),
            Self::Polygons(v) => v.len(),
        }
    }
}
