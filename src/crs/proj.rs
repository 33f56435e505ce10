use std::collections::HashMap;

use anyhow::{anyhow, bail, Context, Result};

use super::parse::Node;

/// PROJ.4 definition of EPSG:4326, the storage reference system.
pub(crate) const WGS84_PROJ4: &str = "+proj=longlat +datum=WGS84 +no_defs";

/// Build a PROJ.4 string from a parsed `GEOGCS` or `PROJCS` node.
/// Returns the string and whether the CRS is geographic (degrees).
pub(crate) fn to_proj4(root: &Node) -> Result<(String, bool)> {
    if root.is("GEOGCS") {
        Ok((format!("+proj=longlat {} +no_defs", geographic_params(root)?), true))
    } else if root.is("PROJCS") {
        let geogcs = root.child("GEOGCS")
            .ok_or_else(|| anyhow!("PROJCS without GEOGCS"))?;
        let proj = projection_params(root)?;
        Ok((format!("{proj} {} +no_defs", geographic_params(geogcs)?), false))
    } else {
        bail!("unsupported CRS definition: {}", root.keyword)
    }
}

/// Datum (or ellipsoid + towgs84) and prime meridian of a `GEOGCS`.
fn geographic_params(geogcs: &Node) -> Result<String> {
    let datum = geogcs.child("DATUM")
        .ok_or_else(|| anyhow!("GEOGCS without DATUM"))?;
    let name = datum.name().unwrap_or_default().to_ascii_lowercase();
    let name = name.strip_prefix("d_").unwrap_or(&name);

    let mut params = match name {
        "wgs_1984" | "wgs84" | "wgs_84" | "world_geodetic_system_1984" => "+datum=WGS84".to_string(),
        "north_american_1983" | "nad83" => "+datum=NAD83".to_string(),
        _ => {
            let spheroid = datum.child("SPHEROID")
                .ok_or_else(|| anyhow!("DATUM {name:?} without SPHEROID"))?;
            let a = spheroid.number(1).ok_or_else(|| anyhow!("SPHEROID without semi-major axis"))?;
            let rf = spheroid.number(2).unwrap_or(0.0);
            let mut params = if rf == 0.0 { format!("+a={a} +b={a}") } else { format!("+a={a} +rf={rf}") };
            if let Some(towgs84) = datum.child("TOWGS84") {
                let values = (0..towgs84.args.len())
                    .map(|i| towgs84.number(i).map(|n| n.to_string()))
                    .collect::<Option<Vec<_>>>()
                    .ok_or_else(|| anyhow!("TOWGS84 with non-numeric values"))?;
                params.push_str(&format!(" +towgs84={}", values.join(",")));
            }
            params
        }
    };

    if let Some(pm) = geogcs.child("PRIMEM").and_then(|pm| pm.number(1)) {
        if pm != 0.0 { params.push_str(&format!(" +pm={pm}")) }
    }

    Ok(params)
}

/// Projection method, its parameters and linear units of a `PROJCS`.
fn projection_params(projcs: &Node) -> Result<String> {
    let method = projcs.child("PROJECTION")
        .and_then(Node::name)
        .ok_or_else(|| anyhow!("PROJCS without PROJECTION"))?
        .to_ascii_lowercase();

    let params: HashMap<String, f64> = projcs.children("PARAMETER")
        .filter_map(|p| Some((p.name()?.to_ascii_lowercase(), p.number(1)?)))
        .collect();
    let param = |names: &[&str]| names.iter().find_map(|n| params.get(*n).copied());
    let or_zero = |names: &[&str]| param(names).unwrap_or(0.0);

    let to_meter = projcs.child("UNIT").and_then(|u| u.number(1)).unwrap_or(1.0);
    let lat_0 = or_zero(&["latitude_of_origin", "latitude_of_center"]);
    let lon_0 = or_zero(&["central_meridian", "longitude_of_center", "longitude_of_origin"]);
    let k_0 = param(&["scale_factor"]).unwrap_or(1.0);
    // false easting/northing are given in the projection's own units
    let x_0 = or_zero(&["false_easting"]) * to_meter;
    let y_0 = or_zero(&["false_northing"]) * to_meter;
    let lat_1 = param(&["standard_parallel_1"]);
    let lat_2 = param(&["standard_parallel_2"]);

    let body = match method.as_str() {
        "transverse_mercator" | "gauss_kruger" => {
            format!("+proj=tmerc +lat_0={lat_0} +lon_0={lon_0} +k_0={k_0} +x_0={x_0} +y_0={y_0}")
        }
        "mercator" | "mercator_1sp" | "mercator_2sp" => match lat_1 {
            Some(lat_ts) => format!("+proj=merc +lat_ts={lat_ts} +lon_0={lon_0} +x_0={x_0} +y_0={y_0}"),
            None => format!("+proj=merc +lon_0={lon_0} +k_0={k_0} +x_0={x_0} +y_0={y_0}"),
        },
        "mercator_auxiliary_sphere" | "popular_visualisation_pseudo_mercator" => {
            // spherical web mercator; the datum of the GEOGCS is ignored
            return Ok(format!("+proj=merc +a=6378137 +b=6378137 +lat_ts=0 +lon_0={lon_0} +x_0={x_0} +y_0={y_0} +k=1 +units=m"));
        }
        "lambert_conformal_conic" | "lambert_conformal_conic_1sp" | "lambert_conformal_conic_2sp" => {
            let lat_1 = lat_1.unwrap_or(lat_0);
            let lat_2 = lat_2.unwrap_or(lat_1);
            format!("+proj=lcc +lat_1={lat_1} +lat_2={lat_2} +lat_0={lat_0} +lon_0={lon_0} +k_0={k_0} +x_0={x_0} +y_0={y_0}")
        }
        "albers" | "albers_conic_equal_area" => {
            let lat_1 = lat_1.ok_or_else(|| anyhow!("Albers projection without Standard_Parallel_1"))?;
            let lat_2 = lat_2.unwrap_or(lat_1);
            format!("+proj=aea +lat_1={lat_1} +lat_2={lat_2} +lat_0={lat_0} +lon_0={lon_0} +x_0={x_0} +y_0={y_0}")
        }
        "polar_stereographic" | "stereographic_north_pole" | "stereographic_south_pole" => {
            let lat_ts = lat_1.unwrap_or(lat_0);
            let pole = if method.ends_with("south_pole") || lat_ts < 0.0 { -90.0 } else { 90.0 };
            let lon_0 = param(&["straight_vertical_longitude_from_pole"]).unwrap_or(lon_0);
            format!("+proj=stere +lat_0={pole} +lat_ts={lat_ts} +lon_0={lon_0} +k_0={k_0} +x_0={x_0} +y_0={y_0}")
        }
        "oblique_stereographic" | "double_stereographic" => {
            format!("+proj=sterea +lat_0={lat_0} +lon_0={lon_0} +k_0={k_0} +x_0={x_0} +y_0={y_0}")
        }
        "lambert_azimuthal_equal_area" => {
            format!("+proj=laea +lat_0={lat_0} +lon_0={lon_0} +x_0={x_0} +y_0={y_0}")
        }
        "equirectangular" | "equidistant_cylindrical" | "plate_carree" => {
            format!("+proj=eqc +lat_ts={} +lon_0={lon_0} +x_0={x_0} +y_0={y_0}", lat_1.unwrap_or(0.0))
        }
        other => bail!("projection {other:?} is not supported"),
    };

    let units = if to_meter == 1.0 { "+units=m".to_string() } else { format!("+to_meter={to_meter}") };
    Ok(format!("{body} {units}"))
}

/// Build a proj4rs projection from a PROJ.4 string.
pub(crate) fn build(proj4: &str) -> Result<proj4rs::proj::Proj> {
    proj4rs::proj::Proj::from_proj_string(proj4)
        .with_context(|| anyhow!("failed to build PROJ.4: {proj4}"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crs::parse::parse;

    #[test]
    fn wgs84_geographic_matches_storage_definition() {
        let root = parse(r#"GEOGCS["GCS_WGS_1984",DATUM["D_WGS_1984",SPHEROID["WGS_1984",6378137,298.257223563]],PRIMEM["Greenwich",0],UNIT["Degree",0.017453292519943295]]"#).unwrap();
        let (proj4, geographic) = to_proj4(&root).unwrap();
        assert!(geographic);
        assert_eq!(proj4, WGS84_PROJ4);
    }

    #[test]
    fn custom_ellipsoid_uses_axis_and_flattening() {
        let root = parse(r#"GEOGCS["GCS_Bessel",DATUM["D_Bessel_1841",SPHEROID["Bessel_1841",6377397.155,299.1528128],TOWGS84[598.1,73.7,418.2,0.202,0.045,-2.455,6.7]],PRIMEM["Greenwich",0],UNIT["Degree",0.0174532925199433]]"#).unwrap();
        let (proj4, _) = to_proj4(&root).unwrap();
        assert!(proj4.contains("+a=6377397.155 +rf=299.1528128"));
        assert!(proj4.contains("+towgs84=598.1,73.7,418.2,0.202,0.045,-2.455,6.7"));
    }

    #[test]
    fn foot_units_scale_false_easting() {
        let root = parse(r#"PROJCS["NAD_1983_StatePlane_Illinois_East_FIPS_1201_Feet",GEOGCS["GCS_North_American_1983",DATUM["D_North_American_1983",SPHEROID["GRS_1980",6378137.0,298.257222101]],PRIMEM["Greenwich",0.0],UNIT["Degree",0.0174532925199433]],PROJECTION["Transverse_Mercator"],PARAMETER["False_Easting",984250.0],PARAMETER["False_Northing",0.0],PARAMETER["Central_Meridian",-88.33333333333333],PARAMETER["Scale_Factor",0.999975],PARAMETER["Latitude_Of_Origin",36.66666666666666],UNIT["Foot_US",0.3048006096012192]]"#).unwrap();
        let (proj4, geographic) = to_proj4(&root).unwrap();
        assert!(!geographic);
        assert!(proj4.starts_with("+proj=tmerc"));
        assert!(proj4.contains("+datum=NAD83"));
        assert!(proj4.contains("+to_meter=0.3048006096012192"));
        assert!(proj4.contains(&format!("+x_0={}", 984250.0 * 0.3048006096012192)));
    }

    #[test]
    fn unknown_projection_is_reported() {
        let root = parse(r#"PROJCS["x",GEOGCS["g",DATUM["D_WGS_1984",SPHEROID["WGS_1984",6378137,298.257223563]]],PROJECTION["Van_der_Grinten_I"],UNIT["Meter",1]]"#).unwrap();
        let err = to_proj4(&root).unwrap_err();
        assert!(err.to_string().contains("van_der_grinten_i"));
    }
}
