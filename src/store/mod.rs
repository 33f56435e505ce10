//! SQLite persistence for shapefiles, their attributes and features, and the base map.

mod models;
mod query;

use std::{collections::HashMap, str::FromStr};

use anyhow::{anyhow, bail, ensure, Context, Result};
use geo::{BoundingRect, Rect};
use sqlx::{
    sqlite::{SqliteConnectOptions, SqlitePoolOptions, SqliteRow},
    Row, SqlitePool,
};
use tracing::{debug, info};

pub use models::{Attribute, BaseMap, Feature, NewFeature, NewShapefile, Shapefile};
pub use query::FeatureQuery;

use crate::geometry::{FeatureGeometry, GeometryKind};

/// Handle to the database; cheap to clone.
#[derive(Clone, Debug)]
pub struct Store {
    pool: SqlitePool,
}

impl Store {
    /// Open (creating if needed) the database at `url` and ensure the schema exists.
    pub async fn connect(url: &str) -> Result<Self> {
        let options = SqliteConnectOptions::from_str(url)
            .with_context(|| format!("invalid database url {url:?}"))?
            .create_if_missing(true)
            .foreign_keys(true);
        let pool = SqlitePoolOptions::new()
            .connect_with(options)
            .await
            .with_context(|| format!("failed to open database {url}"))?;
        Self::init(pool).await
    }

    /// A private in-memory database, used by tests and one-shot commands.
    pub async fn in_memory() -> Result<Self> {
        let options = SqliteConnectOptions::from_str("sqlite::memory:")?.foreign_keys(true);
        // a single connection that never expires keeps the database alive
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect_with(options)
            .await?;
        Self::init(pool).await
    }

    async fn init(pool: SqlitePool) -> Result<Self> {
        sqlx::query(include_str!("./init.sql"))
            .execute(&pool)
            .await
            .context("failed to create database schema")?;
        Ok(Self { pool })
    }

    pub async fn list_shapefiles(&self) -> Result<Vec<Shapefile>> {
        sqlx::query("SELECT id, filename, srs_wkt, geom_type, encoding FROM shapefile ORDER BY filename, id")
            .fetch_all(&self.pool)
            .await?
            .iter()
            .map(shapefile_from_row)
            .collect()
    }

    pub async fn shapefile(&self, id: i64) -> Result<Option<Shapefile>> {
        sqlx::query("SELECT id, filename, srs_wkt, geom_type, encoding FROM shapefile WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .as_ref()
            .map(shapefile_from_row)
            .transpose()
    }

    /// Persist a parsed shapefile with all its attributes, features and values
    /// in a single transaction. Returns the new shapefile id.
    pub async fn insert_shapefile(&self, new: &NewShapefile) -> Result<i64> {
        let kind = new.geom_type.storage_kind();
        for (i, feature) in new.features.iter().enumerate() {
            ensure!(feature.geometry.kind() == kind,
                "feature {} is a {}, expected {kind}", i + 1, feature.geometry.kind());
            ensure!(feature.values.len() == new.attributes.len(),
                "feature {} has {} values for {} attributes", i + 1, feature.values.len(), new.attributes.len());
        }

        let mut tx = self.pool.begin().await?;

        let shapefile_id = sqlx::query(
            "INSERT INTO shapefile (filename, srs_wkt, geom_type, encoding) VALUES (?, ?, ?, ?)")
            .bind(&new.filename)
            .bind(&new.srs_wkt)
            .bind(new.geom_type.name())
            .bind(new.encoding.name())
            .execute(&mut *tx)
            .await?
            .last_insert_rowid();

        let mut attribute_ids = Vec::with_capacity(new.attributes.len());
        for (ordinal, field) in new.attributes.iter().enumerate() {
            let id = sqlx::query(
                "INSERT INTO attribute (shapefile_id, ordinal, name, type_code, width, precision) VALUES (?, ?, ?, ?, ?, ?)")
                .bind(shapefile_id)
                .bind(ordinal as i64)
                .bind(&field.name)
                .bind(field.type_code.to_string())
                .bind(i64::from(field.width))
                .bind(i64::from(field.precision))
                .execute(&mut *tx)
                .await?
                .last_insert_rowid();
            attribute_ids.push(id);
        }

        for feature in &new.features {
            let feature_id = insert_feature(&mut tx, shapefile_id, &feature.geometry).await?;
            for (attribute_id, value) in attribute_ids.iter().zip(&feature.values) {
                sqlx::query("INSERT INTO attribute_value (feature_id, attribute_id, value) VALUES (?, ?, ?)")
                    .bind(feature_id)
                    .bind(*attribute_id)
                    .bind(value.as_deref())
                    .execute(&mut *tx)
                    .await?;
            }
        }

        tx.commit().await?;
        info!("stored shapefile {} ({} features, {} attributes) as #{shapefile_id}",
            new.filename, new.features.len(), new.attributes.len());
        Ok(shapefile_id)
    }

    /// Delete a shapefile; attributes, features and values cascade.
    pub async fn delete_shapefile(&self, id: i64) -> Result<bool> {
        let result = sqlx::query("DELETE FROM shapefile WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Attributes of a shapefile in schema order.
    pub async fn attributes(&self, shapefile_id: i64) -> Result<Vec<Attribute>> {
        sqlx::query(
            "SELECT id, shapefile_id, ordinal, name, type_code, width, precision FROM attribute WHERE shapefile_id = ? ORDER BY ordinal")
            .bind(shapefile_id)
            .fetch_all(&self.pool)
            .await?
            .iter()
            .map(attribute_from_row)
            .collect()
    }

    pub async fn feature(&self, shapefile_id: i64, feature_id: i64) -> Result<Option<Feature>> {
        sqlx::query("SELECT id, shapefile_id, geom_kind, geometry FROM feature WHERE id = ? AND shapefile_id = ?")
            .bind(feature_id)
            .bind(shapefile_id)
            .fetch_optional(&self.pool)
            .await?
            .as_ref()
            .map(feature_from_row)
            .transpose()
    }

    pub async fn query_features(&self, query: &FeatureQuery) -> Result<Vec<Feature>> {
        let mut qb = query.builder();
        debug!("feature query {query:?}");
        qb.build()
            .fetch_all(&self.pool)
            .await?
            .iter()
            .map(feature_from_row)
            .collect()
    }

    /// `(name, value)` pairs of a feature, sorted by name then value.
    pub async fn feature_attributes(&self, feature_id: i64) -> Result<Vec<(String, Option<String>)>> {
        let mut pairs = sqlx::query(
            "SELECT a.name, v.value FROM attribute_value v JOIN attribute a ON a.id = v.attribute_id WHERE v.feature_id = ?")
            .bind(feature_id)
            .fetch_all(&self.pool)
            .await?
            .iter()
            .map(|row| -> Result<(String, Option<String>)> { Ok((row.try_get("name")?, row.try_get("value")?)) })
            .collect::<Result<Vec<_>>>()?;
        pairs.sort();
        Ok(pairs)
    }

    /// Every feature of a shapefile with its values in attribute order, for export.
    pub async fn features_with_values(&self, shapefile_id: i64) -> Result<Vec<(Feature, Vec<Option<String>>)>> {
        let attribute_count = self.attributes(shapefile_id).await?.len();

        let mut values: HashMap<i64, Vec<Option<String>>> = HashMap::new();
        let rows = sqlx::query(
            "SELECT v.feature_id, a.ordinal, v.value FROM attribute_value v JOIN attribute a ON a.id = v.attribute_id WHERE a.shapefile_id = ?")
            .bind(shapefile_id)
            .fetch_all(&self.pool)
            .await?;
        for row in &rows {
            let feature_id: i64 = row.try_get("feature_id")?;
            let ordinal: i64 = row.try_get("ordinal")?;
            let slot = values.entry(feature_id).or_insert_with(|| vec![None; attribute_count]);
            let index = usize::try_from(ordinal).ok().filter(|&i| i < attribute_count)
                .ok_or_else(|| anyhow!("attribute ordinal {ordinal} out of range"))?;
            slot[index] = row.try_get("value")?;
        }

        let features = sqlx::query("SELECT id, shapefile_id, geom_kind, geometry FROM feature WHERE shapefile_id = ? ORDER BY id")
            .bind(shapefile_id)
            .fetch_all(&self.pool)
            .await?;
        features.iter()
            .map(|row| -> Result<(Feature, Vec<Option<String>>)> {
                let feature = feature_from_row(row)?;
                let vals = values.remove(&feature.id).unwrap_or_else(|| vec![None; attribute_count]);
                Ok((feature, vals))
            })
            .collect()
    }

    /// Add a feature to a shapefile with a null value for every attribute.
    pub async fn add_feature(&self, shapefile_id: i64, geometry: &FeatureGeometry) -> Result<i64> {
        self.check_kind(shapefile_id, geometry).await?;
        let mut tx = self.pool.begin().await?;
        let feature_id = insert_feature(&mut tx, shapefile_id, geometry).await?;
        sqlx::query(
            "INSERT INTO attribute_value (feature_id, attribute_id, value) SELECT ?, id, NULL FROM attribute WHERE shapefile_id = ?")
            .bind(feature_id)
            .bind(shapefile_id)
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;
        Ok(feature_id)
    }

    pub async fn update_feature_geometry(&self, shapefile_id: i64, feature_id: i64, geometry: &FeatureGeometry) -> Result<bool> {
        self.check_kind(shapefile_id, geometry).await?;
        let bbox = Bbox::of(geometry);
        let result = sqlx::query(
            "UPDATE feature SET geom_kind = ?, geometry = ?, min_x = ?, min_y = ?, max_x = ?, max_y = ? WHERE id = ? AND shapefile_id = ?")
            .bind(geometry.kind().name())
            .bind(geometry.to_wkt())
            .bind(bbox.min_x)
            .bind(bbox.min_y)
            .bind(bbox.max_x)
            .bind(bbox.max_y)
            .bind(feature_id)
            .bind(shapefile_id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    pub async fn delete_feature(&self, shapefile_id: i64, feature_id: i64) -> Result<bool> {
        let result = sqlx::query("DELETE FROM feature WHERE id = ? AND shapefile_id = ?")
            .bind(feature_id)
            .bind(shapefile_id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn check_kind(&self, shapefile_id: i64, geometry: &FeatureGeometry) -> Result<()> {
        let shapefile = self.shapefile(shapefile_id).await?
            .ok_or_else(|| anyhow!("no shapefile with id {shapefile_id}"))?;
        if geometry.kind() != shapefile.storage_kind() {
            bail!("{} stores {} features, not {}", shapefile.filename, shapefile.storage_kind(), geometry.kind());
        }
        Ok(())
    }

    pub async fn base_map_count(&self) -> Result<i64> {
        Ok(sqlx::query("SELECT COUNT(*) AS n FROM base_map")
            .fetch_one(&self.pool)
            .await?
            .try_get("n")?)
    }

    /// Load base-map polygons. Existing rows are kept unless `replace` is set,
    /// in which case they are swapped out in the same transaction.
    /// Returns the number of rows written.
    pub async fn seed_base_map(&self, rows: &[BaseMap], replace: bool) -> Result<usize> {
        if !replace && self.base_map_count().await? > 0 {
            info!("base map already seeded; skipping");
            return Ok(0);
        }

        let mut tx = self.pool.begin().await?;
        sqlx::query("DELETE FROM base_map").execute(&mut *tx).await?;
        let mut written = 0;
        for row in rows {
            let Some(rect) = row.geometry.bounding_rect() else { continue };
            sqlx::query("INSERT INTO base_map (name, geometry, min_x, min_y, max_x, max_y) VALUES (?, ?, ?, ?, ?, ?)")
                .bind(&row.name)
                .bind(FeatureGeometry::MultiPolygon(row.geometry.clone()).to_wkt())
                .bind(rect.min().x)
                .bind(rect.min().y)
                .bind(rect.max().x)
                .bind(rect.max().y)
                .execute(&mut *tx)
                .await?;
            written += 1;
        }
        tx.commit().await?;
        info!("seeded {written} base map polygons");
        Ok(written)
    }

    /// Base-map polygons whose bounding box intersects `rect`.
    pub async fn base_map_in(&self, rect: Rect<f64>) -> Result<Vec<BaseMap>> {
        sqlx::query(
            "SELECT name, geometry FROM base_map WHERE max_x >= ? AND min_x <= ? AND max_y >= ? AND min_y <= ? ORDER BY id")
            .bind(rect.min().x)
            .bind(rect.max().x)
            .bind(rect.min().y)
            .bind(rect.max().y)
            .fetch_all(&self.pool)
            .await?
            .iter()
            .map(|row| -> Result<BaseMap> {
                let wkt: String = row.try_get("geometry")?;
                let FeatureGeometry::MultiPolygon(geometry) = FeatureGeometry::from_wkt(&wkt, GeometryKind::MultiPolygon)? else {
                    bail!("base map geometry is not a multipolygon");
                };
                Ok(BaseMap { name: row.try_get("name")?, geometry })
            })
            .collect()
    }
}

/// Nullable bounding box columns of a geometry.
struct Bbox {
    min_x: Option<f64>,
    min_y: Option<f64>,
    max_x: Option<f64>,
    max_y: Option<f64>,
}

impl Bbox {
    fn of(geometry: &FeatureGeometry) -> Self {
        let rect = geometry.bounding_rect();
        Self {
            min_x: rect.map(|r| r.min().x),
            min_y: rect.map(|r| r.min().y),
            max_x: rect.map(|r| r.max().x),
            max_y: rect.map(|r| r.max().y),
        }
    }
}

async fn insert_feature(
    tx: &mut sqlx::Transaction<'_, sqlx::Sqlite>,
    shapefile_id: i64,
    geometry: &FeatureGeometry,
) -> Result<i64> {
    let bbox = Bbox::of(geometry);
    Ok(sqlx::query(
        "INSERT INTO feature (shapefile_id, geom_kind, geometry, min_x, min_y, max_x, max_y) VALUES (?, ?, ?, ?, ?, ?, ?)")
        .bind(shapefile_id)
        .bind(geometry.kind().name())
        .bind(geometry.to_wkt())
        .bind(bbox.min_x)
        .bind(bbox.min_y)
        .bind(bbox.max_x)
        .bind(bbox.max_y)
        .execute(&mut **tx)
        .await?
        .last_insert_rowid())
}

fn shapefile_from_row(row: &SqliteRow) -> Result<Shapefile> {
    let geom_type: String = row.try_get("geom_type")?;
    let encoding: String = row.try_get("encoding")?;
    Ok(Shapefile {
        id: row.try_get("id")?,
        filename: row.try_get("filename")?,
        srs_wkt: row.try_get("srs_wkt")?,
        geom_type: geom_type.parse()?,
        encoding: encoding.parse()?,
    })
}

fn attribute_from_row(row: &SqliteRow) -> Result<Attribute> {
    let type_code: String = row.try_get("type_code")?;
    let width: i64 = row.try_get("width")?;
    let precision: i64 = row.try_get("precision")?;
    Ok(Attribute {
        id: row.try_get("id")?,
        shapefile_id: row.try_get("shapefile_id")?,
        ordinal: row.try_get("ordinal")?,
        name: row.try_get("name")?,
        type_code: type_code.chars().next().ok_or_else(|| anyhow!("empty attribute type code"))?,
        width: u8::try_from(width).context("attribute width out of range")?,
        precision: u8::try_from(precision).context("attribute precision out of range")?,
    })
}

fn feature_from_row(row: &SqliteRow) -> Result<Feature> {
    let kind: String = row.try_get("geom_kind")?;
    let kind: GeometryKind = kind.parse()?;
    let wkt: String = row.try_get("geometry")?;
    let id: i64 = row.try_get("id")?;
    Ok(Feature {
        id,
        shapefile_id: row.try_get("shapefile_id")?,
        geometry: FeatureGeometry::from_wkt(&wkt, kind)
            .with_context(|| format!("feature {id} holds an unreadable geometry"))?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        geometry::LayerGeometryType,
        io::dbf::{CharacterEncoding, FieldDescriptor, FieldType},
    };
    use geo::{coord, polygon, MultiPolygon, Point};

    fn square(x: f64, y: f64) -> FeatureGeometry {
        FeatureGeometry::MultiPolygon(MultiPolygon(vec![polygon![
            (x: x, y: y), (x: x + 1.0, y: y), (x: x + 1.0, y: y + 1.0), (x: x, y: y + 1.0), (x: x, y: y),
        ]]))
    }

    fn parcels() -> NewShapefile {
        NewShapefile {
            filename: "parcels.shp".into(),
            srs_wkt: "GEOGCS[\"WGS 84\"]".into(),
            geom_type: LayerGeometryType::Polygon,
            encoding: CharacterEncoding::Utf8,
            attributes: vec![
                FieldDescriptor::new("OWNER", FieldType::Character, 20, 0),
                FieldDescriptor::new("AREA", FieldType::Numeric, 10, 2),
            ],
            features: vec![
                NewFeature { geometry: square(0.0, 0.0), values: vec![Some("Bea".into()), Some("1.00".into())] },
                NewFeature { geometry: square(5.0, 5.0), values: vec![None, Some("2.50".into())] },
            ],
        }
    }

    #[tokio::test]
    async fn insert_and_read_back() {
        let store = Store::in_memory().await.unwrap();
        let id = store.insert_shapefile(&parcels()).await.unwrap();

        let shapefile = store.shapefile(id).await.unwrap().unwrap();
        assert_eq!(shapefile.geom_type, LayerGeometryType::Polygon);
        assert_eq!(shapefile.stem(), "parcels");

        let attributes = store.attributes(id).await.unwrap();
        assert_eq!(attributes.iter().map(|a| a.name.as_str()).collect::<Vec<_>>(), ["OWNER", "AREA"]);
        assert_eq!(attributes[1].descriptor(), FieldDescriptor::new("AREA", FieldType::Numeric, 10, 2));

        let exported = store.features_with_values(id).await.unwrap();
        assert_eq!(exported.len(), 2);
        assert_eq!(exported[1].1, vec![None, Some("2.50".to_string())]);
        assert!(exported.iter().all(|(f, _)| f.geometry.kind() == GeometryKind::MultiPolygon));
    }

    #[tokio::test]
    async fn mismatched_feature_kind_is_rejected_without_writes() {
        let store = Store::in_memory().await.unwrap();
        let mut new = parcels();
        new.features[1].geometry = FeatureGeometry::Point(Point::new(1.0, 1.0));
        assert!(store.insert_shapefile(&new).await.is_err());
        assert!(store.list_shapefiles().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn bbox_query_selects_intersecting_features() {
        let store = Store::in_memory().await.unwrap();
        let id = store.insert_shapefile(&parcels()).await.unwrap();

        let rect = Rect::new(coord! { x: 4.5, y: 4.5 }, coord! { x: 5.5, y: 5.5 });
        let hits = store.query_features(&FeatureQuery::new(id, GeometryKind::MultiPolygon).intersecting(rect)).await.unwrap();
        assert_eq!(hits.len(), 1);

        let none = store.query_features(&FeatureQuery::new(id, GeometryKind::Point)).await.unwrap();
        assert!(none.is_empty());
    }

    #[tokio::test]
    async fn added_features_get_null_values_and_deletes_cascade() {
        let store = Store::in_memory().await.unwrap();
        let id = store.insert_shapefile(&parcels()).await.unwrap();

        let fid = store.add_feature(id, &square(10.0, 10.0)).await.unwrap();
        let pairs = store.feature_attributes(fid).await.unwrap();
        assert_eq!(pairs, vec![("AREA".to_string(), None), ("OWNER".to_string(), None)]);
        assert!(store.add_feature(id, &FeatureGeometry::Point(Point::new(0.0, 0.0))).await.is_err());

        assert!(store.update_feature_geometry(id, fid, &square(20.0, 20.0)).await.unwrap());
        let moved = store.feature(id, fid).await.unwrap().unwrap();
        assert_eq!(moved.geometry.bounding_rect().unwrap().min().x, 20.0);

        assert!(store.delete_feature(id, fid).await.unwrap());
        assert!(store.feature(id, fid).await.unwrap().is_none());

        assert!(store.delete_shapefile(id).await.unwrap());
        assert!(store.attributes(id).await.unwrap().is_empty());
        assert!(store.features_with_values(id).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn base_map_is_seeded_once() {
        let store = Store::in_memory().await.unwrap();
        let FeatureGeometry::MultiPolygon(mp) = square(0.0, 0.0) else { unreachable!() };
        let rows = vec![BaseMap { name: "Nowhere".into(), geometry: mp }];

        assert_eq!(store.seed_base_map(&rows, false).await.unwrap(), 1);
        assert_eq!(store.seed_base_map(&rows, false).await.unwrap(), 0);
        assert_eq!(store.seed_base_map(&rows, true).await.unwrap(), 1);
        assert_eq!(store.base_map_count().await.unwrap(), 1);

        let rect = Rect::new(coord! { x: 0.5, y: 0.5 }, coord! { x: 3.0, y: 3.0 });
        assert_eq!(store.base_map_in(rect).await.unwrap()[0].name, "Nowhere");
        let far = Rect::new(coord! { x: 50.0, y: 50.0 }, coord! { x: 60.0, y: 60.0 });
        assert!(store.base_map_in(far).await.unwrap().is_empty());
    }
}
