//! Tile Map Service: discovery documents and rendered PNG tiles in the
//! global-geodetic profile (EPSG:4326, two 256px tiles across at zoom 0).

mod render;
mod style;
mod xml;

use geo::{coord, Rect};

pub use render::render_tile;
pub use xml::{root_document, service_document, tile_map_document, TileMapEntry};

/// The only TMS version served.
pub const TMS_VERSION: &str = "1.0";

pub const MAX_ZOOM_LEVEL: u32 = 10;
pub const TILE_WIDTH: u32 = 256;
pub const TILE_HEIGHT: u32 = 256;

/// Degrees spanned by one pixel at zoom level 0.
const BASE_UNITS_PER_PIXEL: f64 = 0.703125;

#[inline]
pub fn is_supported_version(version: &str) -> bool { version == TMS_VERSION }

/// Degrees per pixel at `zoom`.
#[inline]
pub fn units_per_pixel(zoom: u32) -> f64 {
    BASE_UNITS_PER_PIXEL / 2f64.powi(zoom as i32)
}

/// Geographic extent of one tile.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct TileBounds {
    pub zoom: u32,
    pub rect: Rect<f64>,
}

impl TileBounds {
    /// Bounds of tile (`x`, `y`) at `zoom`, counting from the south-west
    /// corner. `None` if the zoom is unsupported or the tile leaves the world.
    pub fn new(zoom: i64, x: i64, y: i64) -> Option<Self> {
        let zoom = u32::try_from(zoom).ok().filter(|&z| z <= MAX_ZOOM_LEVEL)?;

        let x_extent = units_per_pixel(zoom) * TILE_WIDTH as f64;
        let y_extent = units_per_pixel(zoom) * TILE_HEIGHT as f64;
        let min_long = x as f64 * x_extent - 180.0;
        let min_lat = y as f64 * y_extent - 90.0;
        let max_long = min_long + x_extent;
        let max_lat = min_lat + y_extent;

        if min_long < -180.0 || max_long > 180.0 || min_lat < -90.0 || max_lat > 90.0 {
            return None;
        }
        Some(Self {
            zoom,
            rect: Rect::new(coord! { x: min_long, y: min_lat }, coord! { x: max_long, y: max_lat }),
        })
    }

    #[inline] pub fn units_per_pixel(&self) -> f64 { units_per_pixel(self.zoom) }
}
