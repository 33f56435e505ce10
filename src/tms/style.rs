//! Colors and symbolizers used when rendering tiles.

use std::fmt;

use tiny_skia::Color;

/// Simple RGB color.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) struct Rgb {
    pub(crate) r: u8,
    pub(crate) g: u8,
    pub(crate) b: u8,
}

impl Rgb {
    /// From a `0xRRGGBB` literal.
    pub(crate) const fn hex(value: u32) -> Self {
        Self { r: (value >> 16) as u8, g: (value >> 8) as u8, b: value as u8 }
    }

    pub(crate) fn color(&self) -> Color { Color::from_rgba8(self.r, self.g, self.b, 255) }
}

impl fmt::Display for Rgb {
    /// Format as CSS: #rrggbb
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{:02x}{:02x}{:02x}", self.r, self.g, self.b)
    }
}

/// Outline color and width in pixels.
#[derive(Clone, Copy, Debug, PartialEq)]
pub(crate) struct LineSymbolizer {
    pub(crate) color: Rgb,
    pub(crate) width: f32,
}

/// Fill and optional outline for polygons.
#[derive(Clone, Copy, Debug, PartialEq)]
pub(crate) struct PolygonSymbolizer {
    pub(crate) fill: Rgb,
    pub(crate) outline: Option<LineSymbolizer>,
}

/// Filled circle for points.
#[derive(Clone, Copy, Debug, PartialEq)]
pub(crate) struct PointSymbolizer {
    pub(crate) color: Rgb,
    pub(crate) radius: f32,
}

pub(crate) const BACKGROUND: Rgb = Rgb::hex(0x7391ad);

pub(crate) const BASE_MAP: PolygonSymbolizer = PolygonSymbolizer {
    fill: Rgb::hex(0xb5d19c),
    outline: Some(LineSymbolizer { color: Rgb::hex(0x404040), width: 0.2 }),
};

pub(crate) const FEATURE_POINT: PointSymbolizer = PointSymbolizer { color: Rgb::hex(0x000000), radius: 2.5 };

pub(crate) const FEATURE_LINE: LineSymbolizer = LineSymbolizer { color: Rgb::hex(0x000000), width: 0.5 };

pub(crate) const FEATURE_POLYGON: PolygonSymbolizer = PolygonSymbolizer {
    fill: Rgb::hex(0xf7edee),
    outline: Some(FEATURE_LINE),
};
