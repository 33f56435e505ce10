use anyhow::Result;
use geo::{coord, Distance, Euclidean, Geometry, Point, Rect};
use tracing::debug;

use crate::store::{FeatureQuery, Shapefile, Store};

/// Id of the single feature of `shapefile` within `radius` degrees of
/// `point`. Candidates are pre-filtered by bounding box in the database;
/// `None` unless exactly one remains after the exact distance test.
pub async fn find_feature(store: &Store, shapefile: &Shapefile, point: Point<f64>, radius: f64) -> Result<Option<i64>> {
    let search_box = Rect::new(
        coord! { x: point.x() - radius, y: point.y() - radius },
        coord! { x: point.x() + radius, y: point.y() + radius },
    );
    let query = FeatureQuery::new(shapefile.id, shapefile.storage_kind()).intersecting(search_box);
    let candidates = store.query_features(&query).await?;

    let target = Geometry::Point(point);
    let mut matches = candidates.iter()
        .filter(|f| Euclidean.distance(&f.geometry.to_geometry(), &target) <= radius)
        .map(|f| f.id);

    let found = match (matches.next(), matches.next()) {
        (Some(id), None) => Some(id),
        _ => None,
    };
    debug!("find near {:?} in shapefile {}: {} candidates, match {found:?}", point.0, shapefile.id, candidates.len());
    Ok(found)
}
