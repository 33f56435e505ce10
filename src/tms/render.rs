//! Rasterize the base map and a shapefile's features into one PNG tile.

use anyhow::{anyhow, Context, Result};
use geo::{Coord, Geometry, LineString, Polygon};
use tiny_skia::{FillRule, Paint, Path, PathBuilder, Pixmap, Stroke, Transform};
use tracing::debug;

use super::{
    style::{LineSymbolizer, PointSymbolizer, PolygonSymbolizer, BACKGROUND, BASE_MAP, FEATURE_LINE, FEATURE_POINT, FEATURE_POLYGON},
    TileBounds, TILE_HEIGHT, TILE_WIDTH,
};
use crate::{
    geometry::{FeatureGeometry, GeometryCategory, GeometryKind},
    store::{BaseMap, Feature},
};

/// Render tile `bounds`: background, then base-map polygons, then the
/// features of a layer stored as `kind`, styled by its category.
pub fn render_tile(bounds: &TileBounds, base_map: &[BaseMap], kind: GeometryKind, features: &[Feature]) -> Result<Vec<u8>> {
    let mut canvas = Canvas::new(bounds)?;

    for row in base_map {
        for polygon in &row.geometry {
            canvas.polygon(polygon, &BASE_MAP);
        }
    }
    let category = kind.category();
    for feature in features {
        canvas.feature(&feature.geometry, category);
    }

    canvas.pixmap.encode_png().context("failed to encode tile as PNG")
}

/// Pixmap plus the mapping from lon/lat onto its pixels (north up).
struct Canvas {
    pixmap: Pixmap,
    min_long: f64,
    max_lat: f64,
    units_per_pixel: f64,
}

impl Canvas {
    fn new(bounds: &TileBounds) -> Result<Self> {
        let mut pixmap = Pixmap::new(TILE_WIDTH, TILE_HEIGHT)
            .ok_or_else(|| anyhow!("cannot allocate a {TILE_WIDTH}x{TILE_HEIGHT} tile"))?;
        pixmap.fill(BACKGROUND.color());
        Ok(Self {
            pixmap,
            min_long: bounds.rect.min().x,
            max_lat: bounds.rect.max().y,
            units_per_pixel: bounds.units_per_pixel(),
        })
    }

    #[inline]
    fn project(&self, c: &Coord<f64>) -> (f32, f32) {
        (
            ((c.x - self.min_long) / self.units_per_pixel) as f32,
            ((self.max_lat - c.y) / self.units_per_pixel) as f32,
        )
    }

    /// Draw a feature with its layer's symbolizer; only geometries of the
    /// layer's category are drawn. Collections style each member.
    fn feature(&mut self, geometry: &FeatureGeometry, category: GeometryCategory) {
        match (category, geometry) {
            (GeometryCategory::Point, FeatureGeometry::Point(p)) => self.point(&p.0, &FEATURE_POINT),
            (GeometryCategory::Point, FeatureGeometry::MultiPoint(mp)) => {
                mp.iter().for_each(|p| self.point(&p.0, &FEATURE_POINT))
            }
            (GeometryCategory::Line, FeatureGeometry::MultiLineString(mls)) => {
                mls.iter().for_each(|ls| self.line(ls, &FEATURE_LINE))
            }
            (GeometryCategory::Polygon, FeatureGeometry::MultiPolygon(mp)) => {
                mp.iter().for_each(|p| self.polygon(p, &FEATURE_POLYGON))
            }
            (GeometryCategory::Mixed, FeatureGeometry::GeometryCollection(gc)) => gc.iter().for_each(|g| self.geometry(g)),
            (category, other) => debug!("not drawing a {} in a {category:?} layer", other.kind()),
        }
    }

    fn geometry(&mut self, geometry: &Geometry<f64>) {
        match geometry {
            Geometry::Point(p) => self.point(&p.0, &FEATURE_POINT),
            Geometry::MultiPoint(mp) => mp.iter().for_each(|p| self.point(&p.0, &FEATURE_POINT)),
            Geometry::Line(l) => self.line(&LineString(vec![l.start, l.end]), &FEATURE_LINE),
            Geometry::LineString(ls) => self.line(ls, &FEATURE_LINE),
            Geometry::MultiLineString(mls) => mls.iter().for_each(|ls| self.line(ls, &FEATURE_LINE)),
            Geometry::Polygon(p) => self.polygon(p, &FEATURE_POLYGON),
            Geometry::MultiPolygon(mp) => mp.iter().for_each(|p| self.polygon(p, &FEATURE_POLYGON)),
            Geometry::Rect(r) => self.polygon(&r.to_polygon(), &FEATURE_POLYGON),
            Geometry::Triangle(t) => self.polygon(&t.to_polygon(), &FEATURE_POLYGON),
            Geometry::GeometryCollection(gc) => gc.iter().for_each(|g| self.geometry(g)),
        }
    }

    fn point(&mut self, c: &Coord<f64>, style: &PointSymbolizer) {
        let (x, y) = self.project(c);
        let Some(path) = PathBuilder::from_circle(x, y, style.radius) else { return };
        let paint = paint(style.color.color());
        self.pixmap.fill_path(&path, &paint, FillRule::Winding, Transform::identity(), None);
    }

    fn line(&mut self, ls: &LineString<f64>, style: &LineSymbolizer) {
        let mut pb = PathBuilder::new();
        self.push_coords(&mut pb, ls, false);
        if let Some(path) = pb.finish() { self.stroke(&path, style) }
    }

    fn polygon(&mut self, polygon: &Polygon<f64>, style: &PolygonSymbolizer) {
        let mut pb = PathBuilder::new();
        self.push_coords(&mut pb, polygon.exterior(), true);
        for hole in polygon.interiors() {
            self.push_coords(&mut pb, hole, true);
        }
        let Some(path) = pb.finish() else { return };

        let paint = paint(style.fill.color());
        self.pixmap.fill_path(&path, &paint, FillRule::EvenOdd, Transform::identity(), None);
        if let Some(outline) = &style.outline { self.stroke(&path, outline) }
    }

    /// Append one ring or line as a subpath.
    fn push_coords(&self, pb: &mut PathBuilder, ls: &LineString<f64>, close: bool) {
        let mut coords = ls.coords().map(|c| self.project(c));
        let Some((x, y)) = coords.next() else { return };
        pb.move_to(x, y);
        for (x, y) in coords {
            pb.line_to(x, y);
        }
        if close { pb.close() }
    }

    fn stroke(&mut self, path: &Path, style: &LineSymbolizer) {
        let paint = paint(style.color.color());
        let stroke = Stroke { width: style.width, ..Stroke::default() };
        self.pixmap.stroke_path(path, &paint, &stroke, Transform::identity(), None);
    }
}

fn paint(color: tiny_skia::Color) -> Paint<'static> {
    let mut paint = Paint::default();
    paint.set_color(color);
    paint.anti_alias = true;
    paint
}

#[cfg(test)]
mod tests {
    use super::*;
    use geo::{polygon, GeometryCollection, MultiPolygon, Point};

    const PNG_SIGNATURE: [u8; 8] = [0x89, b'P', b'N', b'G', 0x0d, 0x0a, 0x1a, 0x0a];

    fn pixel(png: &[u8], x: u32, y: u32) -> (u8, u8, u8) {
        let pixmap = Pixmap::decode_png(png).unwrap();
        let p = pixmap.pixel(x, y).unwrap();
        (p.red(), p.green(), p.blue())
    }

    #[test]
    fn empty_tile_is_background() {
        let bounds = TileBounds::new(0, 0, 0).unwrap();
        let png = render_tile(&bounds, &[], GeometryKind::MultiPolygon, &[]).unwrap();
        assert_eq!(&png[..8], &PNG_SIGNATURE);
        assert_eq!(pixel(&png, 10, 10), (0x73, 0x91, 0xad));
    }

    #[test]
    fn base_map_and_features_are_painted() {
        let bounds = TileBounds::new(0, 0, 0).unwrap();
        // a continent covering the tile's south-west quarter
        let land = BaseMap {
            name: "Land".into(),
            geometry: MultiPolygon(vec![polygon![
                (x: -180.0, y: -90.0), (x: -90.0, y: -90.0), (x: -90.0, y: 0.0), (x: -180.0, y: 0.0),
            ]]),
        };
        let parcel = Feature {
            id: 1,
            shapefile_id: 1,
            geometry: FeatureGeometry::MultiPolygon(MultiPolygon(vec![polygon![
                (x: -60.0, y: 30.0), (x: -20.0, y: 30.0), (x: -20.0, y: 70.0), (x: -60.0, y: 70.0),
            ]])),
        };

        let png = render_tile(&bounds, &[land], GeometryKind::MultiPolygon, &[parcel]).unwrap();
        // pixel (32, 192) is lon -157.5, lat -45
        assert_eq!(pixel(&png, 32, 192), (0xb5, 0xd1, 0x9c));
        // pixel (96, 64) is lon -112.5, lat 45: still ocean
        assert_eq!(pixel(&png, 96, 64), (0x73, 0x91, 0xad));
        // pixel (199, 57) is inside the parcel
        assert_eq!(pixel(&png, 199, 57), (0xf7, 0xed, 0xee));
    }

    #[test]
    fn layer_category_picks_the_symbolizer() {
        let bounds = TileBounds::new(0, 0, 0).unwrap();
        let site = |id| Feature { id, shapefile_id: 1, geometry: FeatureGeometry::Point(Point::new(-135.0, 45.0)) };

        // the marker at lon -135, lat 45 is pixel (64, 64)
        let png = render_tile(&bounds, &[], GeometryKind::Point, &[site(1)]).unwrap();
        assert_eq!(pixel(&png, 64, 64), (0, 0, 0));

        let png = render_tile(&bounds, &[], GeometryKind::MultiPolygon, &[site(2)]).unwrap();
        assert_eq!(pixel(&png, 64, 64), (0x73, 0x91, 0xad));

        let collection = Feature {
            id: 3,
            shapefile_id: 1,
            geometry: FeatureGeometry::GeometryCollection(GeometryCollection(vec![Point::new(-135.0, 45.0).into()])),
        };
        let png = render_tile(&bounds, &[], GeometryKind::GeometryCollection, &[collection]).unwrap();
        assert_eq!(pixel(&png, 64, 64), (0, 0, 0));
    }
}
