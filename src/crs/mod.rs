//! Spatial references read from `.prj` WKT and coordinate transforms between them.

mod parse;
mod proj;

use anyhow::{Context, Result};
use geo::Coord;
use proj4rs::transform::transform;

use crate::geometry::FeatureGeometry;

/// A coordinate reference system, kept as both its source WKT and PROJ.4 form.
#[derive(Clone, Debug, PartialEq)]
pub struct SpatialReference {
    wkt: String,
    proj4: String,
    geographic: bool,
}

impl SpatialReference {
    /// Interpret a WKT CRS definition (ESRI or OGC flavour).
    pub fn from_wkt(wkt: &str) -> Result<Self> {
        let root = parse::parse(wkt)?;
        let (proj4, geographic) = proj::to_proj4(&root)
            .with_context(|| format!("cannot interpret spatial reference {:?}", root.name().unwrap_or(&root.keyword)))?;
        Ok(Self { wkt: wkt.trim().to_string(), proj4, geographic })
    }

    /// EPSG:4326, the reference system features are stored in.
    pub fn wgs84() -> Self {
        Self {
            wkt: r#"GEOGCS["GCS_WGS_1984",DATUM["D_WGS_1984",SPHEROID["WGS_1984",6378137.0,298.257223563]],PRIMEM["Greenwich",0.0],UNIT["Degree",0.0174532925199433]]"#.to_string(),
            proj4: proj::WGS84_PROJ4.to_string(),
            geographic: true,
        }
    }

    pub fn wkt(&self) -> &str { &self.wkt }

    pub fn proj4(&self) -> &str { &self.proj4 }

    #[inline] pub fn is_geographic(&self) -> bool { self.geographic }
}

/// Transform between two spatial references. Geographic coordinates are
/// exchanged in degrees; proj4rs works in radians internally.
pub struct CoordTransform {
    from: proj4rs::proj::Proj,
    to: proj4rs::proj::Proj,
    from_geographic: bool,
    to_geographic: bool,
    identity: bool,
}

impl CoordTransform {
    pub fn new(src: &SpatialReference, dst: &SpatialReference) -> Result<Self> {
        Ok(Self {
            from: proj::build(src.proj4())?,
            to: proj::build(dst.proj4())?,
            from_geographic: src.is_geographic(),
            to_geographic: dst.is_geographic(),
            identity: src.proj4() == dst.proj4(),
        })
    }

    pub fn transform_coord(&self, coord: Coord<f64>) -> Result<Coord<f64>> {
        if self.identity { return Ok(coord) }

        let mut point = if self.from_geographic {
            (coord.x.to_radians(), coord.y.to_radians(), 0.0)
        } else {
            (coord.x, coord.y, 0.0)
        };
        transform(&self.from, &self.to, &mut point)
            .with_context(|| format!("failed to transform coordinate ({}, {})", coord.x, coord.y))?;

        Ok(if self.to_geographic {
            Coord { x: point.0.to_degrees(), y: point.1.to_degrees() }
        } else {
            Coord { x: point.0, y: point.1 }
        })
    }

    pub fn transform(&self, geometry: &FeatureGeometry) -> Result<FeatureGeometry> {
        if self.identity { return Ok(geometry.clone()) }
        geometry.try_map_coords(|coord| self.transform_coord(coord))
    }
}
