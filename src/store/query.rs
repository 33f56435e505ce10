use geo::Rect;
use sqlx::{QueryBuilder, Sqlite};

use crate::geometry::GeometryKind;

/// Typed selection of feature rows: one shapefile, one storage kind and an
/// optional bounding box the feature's own box must intersect.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct FeatureQuery {
    shapefile_id: i64,
    kind: GeometryKind,
    bbox: Option<Rect<f64>>,
}

impl FeatureQuery {
    pub fn new(shapefile_id: i64, kind: GeometryKind) -> Self {
        Self { shapefile_id, kind, bbox: None }
    }

    pub fn intersecting(mut self, rect: Rect<f64>) -> Self {
        self.bbox = Some(rect);
        self
    }

    /// SQL with every value bound as a parameter.
    pub(crate) fn builder(&self) -> QueryBuilder<'static, Sqlite> {
        let mut qb = QueryBuilder::new(
            "SELECT id, shapefile_id, geom_kind, geometry FROM feature WHERE shapefile_id = ");
        qb.push_bind(self.shapefile_id);
        qb.push(" AND geom_kind = ");
        qb.push_bind(self.kind.name());

        if let Some(rect) = self.bbox {
            let (min, max) = (rect.min(), rect.max());
            qb.push(" AND max_x >= ").push_bind(min.x);
            qb.push(" AND min_x <= ").push_bind(max.x);
            qb.push(" AND max_y >= ").push_bind(min.y);
            qb.push(" AND min_y <= ").push_bind(max.y);
        }

        qb.push(" ORDER BY id");
        qb
    }
}
