//! Feature editor support: click-to-find lookups, geometry forms and the
//! URLs the editor pages link to each other with.

mod find;
mod form;

use geo::{Destination, Geodesic, Point};

pub use find::find_feature;
pub use form::{FormError, MapForm};

/// Mount point of every editor and TMS route.
pub const BASE_PATH: &str = "/shape-editor";

/// Default click tolerance in meters.
pub const DEFAULT_SEARCH_RADIUS_M: f64 = 100.0;

/// The clicked position, if it lies on the globe.
pub fn click_location(longitude: f64, latitude: f64) -> Option<Point> {
    ((-180.0..=180.0).contains(&longitude) && (-90.0..=90.0).contains(&latitude))
        .then(|| Point::new(longitude, latitude))
}

/// Cap on the east-west part of the search radius, in degrees. Close to a
/// pole a few meters span any number of meridians.
pub const MAX_LONGITUDE_DELTA: f64 = 1.0;

/// Largest coordinate delta, in degrees, reached by travelling `meters`
/// geodesically north, east, south and west of (`longitude`, `latitude`).
/// North and south contribute their latitude change, east and west their
/// longitude change taken the short way round and capped at
/// [`MAX_LONGITUDE_DELTA`].
pub fn search_radius(longitude: f64, latitude: f64, meters: f64) -> f64 {
    let origin = Point::new(longitude, latitude);
    let towards = |bearing: f64| Geodesic.destination(origin, bearing, meters);

    let lat_delta = [0.0, 180.0].into_iter()
        .map(|bearing| (towards(bearing).y() - latitude).abs())
        .fold(0.0, f64::max);
    let lon_delta = [90.0, 270.0].into_iter()
        .map(|bearing| {
            let d = (towards(bearing).x() - longitude).abs() % 360.0;
            d.min(360.0 - d)
        })
        .fold(0.0, f64::max)
        .min(MAX_LONGITUDE_DELTA);
    lat_delta.max(lon_delta)
}

pub fn list_path() -> String { BASE_PATH.to_string() }

pub fn edit_path(shapefile_id: i64) -> String { format!("{BASE_PATH}/edit/{shapefile_id}") }

pub fn edit_feature_path(shapefile_id: i64, feature_id: i64) -> String {
    format!("{BASE_PATH}/editFeature/{shapefile_id}/{feature_id}")
}

pub fn delete_feature_path(shapefile_id: i64, feature_id: i64) -> String {
    format!("{BASE_PATH}/deleteFeature/{shapefile_id}/{feature_id}")
}

pub fn add_feature_path(shapefile_id: i64) -> String { format!("{BASE_PATH}/addFeature/{shapefile_id}") }

pub fn find_feature_path() -> String { format!("{BASE_PATH}/findFeature") }

pub fn tms_path() -> String { format!("{BASE_PATH}/tms") }

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hundred_meters_at_the_equator() {
        let radius = search_radius(0.0, 0.0, 100.0);
        // one degree of latitude is about 110.6 km at the equator
        assert!(radius > 0.00089 && radius < 0.00092, "radius {radius}");
    }

    #[test]
    fn radius_grows_with_latitude() {
        // east-west degrees shrink towards the poles, so the longitude delta dominates
        let equator = search_radius(10.0, 0.0, 100.0);
        let north = search_radius(10.0, 60.0, 100.0);
        assert!(north > equator * 1.9, "{north} vs {equator}");
    }

    #[test]
    fn radius_stays_bounded_near_the_poles() {
        for latitude in [89.9999, 90.0, -89.9999, -90.0] {
            let radius = search_radius(20.0, latitude, 100.0);
            assert!(radius <= MAX_LONGITUDE_DELTA, "radius {radius} at {latitude}");
            assert!(radius > 0.0008, "radius {radius} at {latitude}");
        }
    }

    #[test]
    fn clicks_off_the_globe_are_refused() {
        assert_eq!(click_location(15.0, 45.0), Some(Point::new(15.0, 45.0)));
        assert_eq!(click_location(-180.0, -90.0), Some(Point::new(-180.0, -90.0)));
        assert_eq!(click_location(15.0, 120.0), None);
        assert_eq!(click_location(181.0, 0.0), None);
        assert_eq!(click_location(f64::NAN, 0.0), None);
    }

    #[test]
    fn radius_ignores_the_antimeridian() {
        let radius = search_radius(179.9999, 0.0, 100.0);
        assert!(radius < 0.001, "radius {radius}");
    }

    #[test]
    fn paths_are_mounted_under_the_base() {
        assert_eq!(edit_feature_path(3, 17), "/shape-editor/editFeature/3/17");
        assert_eq!(delete_feature_path(3, 17), "/shape-editor/deleteFeature/3/17");
        assert_eq!(edit_path(3), "/shape-editor/edit/3");
        assert_eq!(tms_path(), "/shape-editor/tms");
    }
}
