#![allow(dead_code)]

use std::{
    fs,
    io::{Cursor, Write},
    path::Path,
};

use shape_editor::io::dbf::{encode_value, CharacterEncoding, DbfWriter, FieldDescriptor, FieldType};
use shapefile::{record::EsriShape, Multipoint, Point, Polygon, PolygonRing, Polyline, ShapeWriter};
use zip::{write::SimpleFileOptions, ZipWriter};

pub const UTM33N: &str = r#"PROJCS["WGS_1984_UTM_Zone_33N",GEOGCS["GCS_WGS_1984",DATUM["D_WGS_1984",SPHEROID["WGS_1984",6378137.0,298.257223563]],PRIMEM["Greenwich",0.0],UNIT["Degree",0.0174532925199433]],PROJECTION["Transverse_Mercator"],PARAMETER["False_Easting",500000.0],PARAMETER["False_Northing",0.0],PARAMETER["Central_Meridian",15.0],PARAMETER["Scale_Factor",0.9996],PARAMETER["Latitude_Of_Origin",0.0],UNIT["Meter",1.0]]"#;

/// One square parcel, `SIZE` meters across, with its attribute values.
pub struct Parcel<'a> {
    pub name: &'a str,
    pub population: Option<&'a str>,
    pub easting: f64,
    pub northing: f64,
}

pub const SIZE: f64 = 1000.0;

pub const PARCELS: [Parcel<'static>; 3] = [
    Parcel { name: "North Field", population: Some("1200"), easting: 500_000.0, northing: 5_000_000.0 },
    Parcel { name: "Mill Lane", population: None, easting: 503_000.0, northing: 5_000_000.0 },
    Parcel { name: "Old Quarry", population: Some("35"), easting: 506_000.0, northing: 5_003_000.0 },
];

pub fn schema() -> Vec<FieldDescriptor> {
    vec![
        FieldDescriptor::new("NAME", FieldType::Character, 16, 0),
        FieldDescriptor::new("POP", FieldType::Numeric, 10, 0),
    ]
}

/// Clockwise square ring with its south-west corner at (x, y).
fn square(x: f64, y: f64, size: f64) -> Polygon {
    Polygon::new(PolygonRing::Outer(vec![
        Point::new(x, y),
        Point::new(x, y + size),
        Point::new(x + size, y + size),
        Point::new(x + size, y),
        Point::new(x, y),
    ]))
}

/// Write `<stem>.shp/.shx/.dbf` (and `.prj` when given) into `dir`.
pub fn write_layer<S: EsriShape>(
    dir: &Path,
    stem: &str,
    fields: &[FieldDescriptor],
    rows: &[(S, Vec<Option<&str>>)],
    encoding: CharacterEncoding,
    prj: Option<&str>,
) {
    {
        let mut writer = ShapeWriter::from_path(dir.join(format!("{stem}.shp"))).unwrap();
        for (shape, _) in rows {
            writer.write_shape(shape).unwrap();
        }
    }

    let mut table = DbfWriter::new(Cursor::new(Vec::new()), fields).unwrap();
    for (_, values) in rows {
        let encoded: Vec<_> = fields.iter().zip(values)
            .map(|(field, value)| encode_value(field, *value, encoding).unwrap())
            .collect();
        table.write_record(&encoded).unwrap();
    }
    let table_bytes = table.finish().unwrap().into_inner();
    fs::write(dir.join(format!("{stem}.dbf")), table_bytes).unwrap();

    if let Some(prj) = prj {
        fs::write(dir.join(format!("{stem}.prj")), prj).unwrap();
    }
}

/// Zip every file of `dir` whose extension is not in `skip`.
pub fn zip_dir(dir: &Path, skip: &[&str]) -> Vec<u8> {
    let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
    let mut paths: Vec<_> = fs::read_dir(dir).unwrap().map(|e| e.unwrap().path()).collect();
    paths.sort();
    for path in paths {
        let ext = path.extension().and_then(|e| e.to_str()).unwrap_or_default();
        if skip.contains(&ext) { continue }
        let name = path.file_name().unwrap().to_str().unwrap();
        writer.start_file(name, SimpleFileOptions::default()).unwrap();
        writer.write_all(&fs::read(&path).unwrap()).unwrap();
    }
    writer.finish().unwrap().into_inner()
}

/// The three parcels in UTM zone 33N, zipped, leaving out components in `skip`.
pub fn parcels_zip_without(skip: &[&str]) -> Vec<u8> {
    let dir = tempfile::tempdir().unwrap();
    let rows: Vec<_> = PARCELS.iter()
        .map(|p| (square(p.easting, p.northing, SIZE), vec![Some(p.name), p.population]))
        .collect();
    write_layer(dir.path(), "parcels", &schema(), &rows, CharacterEncoding::Utf8, Some(UTM33N));
    zip_dir(dir.path(), skip)
}

/// Field types beyond text and integers, for the line and point layers.
pub fn survey_schema() -> Vec<FieldDescriptor> {
    vec![
        FieldDescriptor::new("LENGTH", FieldType::Float, 12, 3),
        FieldDescriptor::new("PAVED", FieldType::Logical, 1, 0),
        FieldDescriptor::new("SURVEYED", FieldType::Date, 8, 0),
        FieldDescriptor::new("SERIAL", FieldType::Numeric, 20, 0),
    ]
}

pub const SURVEY_VALUES: [[Option<&str>; 4]; 2] = [
    [Some("1414.214"), Some("T"), Some("2019-06-30"), Some("12345678901234567890")],
    [Some("2000.000"), Some("F"), None, None],
];

/// Two two-part polylines in UTM zone 33N, zipped.
pub fn roads_zip() -> Vec<u8> {
    let dir = tempfile::tempdir().unwrap();
    let road = |x: f64| Polyline::with_parts(vec![
        vec![Point::new(x, 5_000_000.0), Point::new(x + SIZE, 5_000_000.0 + SIZE)],
        vec![Point::new(x + 2.0 * SIZE, 5_000_000.0), Point::new(x + 2.0 * SIZE, 5_000_000.0 + 2.0 * SIZE)],
    ]);
    let rows: Vec<_> = [500_000.0, 510_000.0].into_iter()
        .zip(SURVEY_VALUES)
        .map(|(x, values)| (road(x), values.to_vec()))
        .collect();
    write_layer(dir.path(), "roads", &survey_schema(), &rows, CharacterEncoding::Utf8, Some(UTM33N));
    zip_dir(dir.path(), &[])
}

/// Two three-point clusters in UTM zone 33N, zipped.
pub fn wells_zip() -> Vec<u8> {
    let dir = tempfile::tempdir().unwrap();
    let cluster = |x: f64| Multipoint::new(vec![
        Point::new(x, 5_000_000.0),
        Point::new(x + 100.0, 5_000_000.0),
        Point::new(x, 5_000_100.0),
    ]);
    let rows: Vec<_> = [500_000.0, 520_000.0].into_iter()
        .zip(SURVEY_VALUES)
        .map(|(x, values)| (cluster(x), values.to_vec()))
        .collect();
    write_layer(dir.path(), "wells", &survey_schema(), &rows, CharacterEncoding::Utf8, Some(UTM33N));
    zip_dir(dir.path(), &[])
}

pub fn parcels_zip() -> Vec<u8> { parcels_zip_without(&[]) }

/// A one-feature layer whose NAME is stored in `stored_as`.
pub fn named_zip(name: &str, stored_as: CharacterEncoding) -> Vec<u8> {
    let dir = tempfile::tempdir().unwrap();
    let rows = vec![(square(500_000.0, 5_000_000.0, SIZE), vec![Some(name), None])];
    write_layer(dir.path(), "towns", &schema(), &rows, stored_as, Some(UTM33N));
    zip_dir(dir.path(), &[])
}

/// A lon/lat world-borders style layer: two named countries.
pub fn write_world(dir: &Path) -> std::path::PathBuf {
    let fields = vec![FieldDescriptor::new("NAME", FieldType::Character, 20, 0)];
    let rows = vec![
        (square(-10.0, 35.0, 20.0), vec![Some("Westland")]),
        (square(100.0, -40.0, 30.0), vec![Some("Südland")]),
    ];
    write_layer(dir, "world", &fields, &rows, CharacterEncoding::Latin1, None);
    dir.join("world.shp")
}
