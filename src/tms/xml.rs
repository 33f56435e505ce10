//! TMS discovery documents (root, TileMapService, TileMap).

use std::{borrow::Cow, fmt::Write};

use anyhow::Result;

use super::{units_per_pixel, MAX_ZOOM_LEVEL, TILE_HEIGHT, TILE_WIDTH, TMS_VERSION};

const XML_DECLARATION: &str = r#"<?xml version="1.0" encoding="utf-8" ?>"#;

/// One tile map advertised by the service.
#[derive(Clone, Debug)]
pub struct TileMapEntry {
    pub id: i64,
    pub title: String,
}

/// Escape text for use in element content and attribute values.
fn escape(text: &str) -> Cow<'_, str> {
    if !text.contains(['&', '<', '>', '"', '\'']) { return Cow::Borrowed(text) }
    let mut out = String::with_capacity(text.len() + 8);
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&apos;"),
            c => out.push(c),
        }
    }
    Cow::Owned(out)
}

/// Root resource: the single TileMapService at `<base_url>/1.0`.
pub fn root_document(base_url: &str, title: &str) -> Result<String> {
    let mut xml = String::new();
    writeln!(xml, "{XML_DECLARATION}")?;
    writeln!(xml, "<Services>")?;
    writeln!(xml, r#"  <TileMapService title="{}""#, escape(title))?;
    writeln!(xml, r#"                  version="{TMS_VERSION}""#)?;
    writeln!(xml, r#"                  href="{}/{TMS_VERSION}"/>"#, escape(base_url))?;
    write!(xml, "</Services>")?;
    Ok(xml)
}

/// TileMapService resource: one TileMap per shapefile at `<base_url>/<id>`.
pub fn service_document(base_url: &str, title: &str, maps: &[TileMapEntry]) -> Result<String> {
    let base_url = escape(base_url);
    let mut xml = String::new();
    writeln!(xml, "{XML_DECLARATION}")?;
    writeln!(xml, r#"<TileMapService version="{TMS_VERSION}" services="{base_url}">"#)?;
    writeln!(xml, "  <Title>{}</Title>", escape(title))?;
    writeln!(xml, "  <Abstract></Abstract>")?;
    writeln!(xml, "  <TileMaps>")?;
    for map in maps {
        writeln!(xml, r#"    <TileMap title="{}""#, escape(&map.title))?;
        writeln!(xml, r#"             srs="EPSG:4326""#)?;
        writeln!(xml, r#"             href="{base_url}/{}"/>"#, map.id)?;
    }
    writeln!(xml, "  </TileMaps>")?;
    write!(xml, "</TileMapService>")?;
    Ok(xml)
}

/// TileMap resource: global-geodetic tile sets for zoom 0..=MAX_ZOOM_LEVEL.
pub fn tile_map_document(base_url: &str, title: &str) -> Result<String> {
    let base_url = escape(base_url);
    let mut xml = String::new();
    writeln!(xml, "{XML_DECLARATION}")?;
    writeln!(xml, r#"<TileMap version="{TMS_VERSION}" tilemapservice="{base_url}">"#)?;
    writeln!(xml, "  <Title>{}</Title>", escape(title))?;
    writeln!(xml, "  <Abstract></Abstract>")?;
    writeln!(xml, "  <SRS>EPSG:4326</SRS>")?;
    writeln!(xml, r#"  <BoundingBox minx="-180" miny="-90" maxx="180" maxy="90"/>"#)?;
    writeln!(xml, r#"  <Origin x="-180" y="-90"/>"#)?;
    writeln!(xml, r#"  <TileFormat width="{TILE_WIDTH}" height="{TILE_HEIGHT}" mime-type="image/png" extension="png"/>"#)?;
    writeln!(xml, r#"  <TileSets profile="global-geodetic">"#)?;
    for zoom in 0..=MAX_ZOOM_LEVEL {
        writeln!(xml, r#"    <TileSet href="{base_url}/{zoom}" units-per-pixel="{}" order="{zoom}"/>"#,
            units_per_pixel(zoom))?;
    }
    writeln!(xml, "  </TileSets>")?;
    write!(xml, "</TileMap>")?;
    Ok(xml)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn root_points_at_version_one() {
        let xml = root_document("http://localhost:8000/shape-editor/tms", "ShapeEditor Tile Map Service").unwrap();
        assert!(xml.starts_with(XML_DECLARATION));
        assert!(xml.contains(r#"title="ShapeEditor Tile Map Service""#));
        assert!(xml.contains(r#"href="http://localhost:8000/shape-editor/tms/1.0"/>"#));
    }

    #[test]
    fn service_lists_each_map_with_escaped_titles() {
        let maps = vec![
            TileMapEntry { id: 3, title: "roads.shp".into() },
            TileMapEntry { id: 9, title: "a&b <c>.shp".into() },
        ];
        let xml = service_document("http://h/tms/1.0", "T", &maps).unwrap();
        assert!(xml.contains(r#"href="http://h/tms/1.0/3"/>"#));
        assert!(xml.contains(r#"title="a&amp;b &lt;c&gt;.shp""#));
        assert_eq!(xml.matches("<TileMap ").count(), 2);
    }

    #[test]
    fn tile_map_has_eleven_tile_sets() {
        let xml = tile_map_document("http://h/tms/1.0/3", "roads.shp").unwrap();
        assert_eq!(xml.matches("<TileSet ").count(), 11);
        assert!(xml.contains(r#"<TileSet href="http://h/tms/1.0/3/0" units-per-pixel="0.703125" order="0"/>"#));
        assert!(xml.contains(r#"units-per-pixel="0.0006866455078125" order="10""#));
        assert!(xml.contains(r#"<TileFormat width="256" height="256" mime-type="image/png" extension="png"/>"#));
    }

    #[test]
    fn plain_text_is_not_copied() {
        assert!(matches!(escape("plain"), Cow::Borrowed(_)));
        assert_eq!(escape(r#"say "hi""#), "say &quot;hi&quot;");
    }
}
