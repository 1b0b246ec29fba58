//! # GPS Repository
//!
//! Track-point ingestion and the last-known-position cache. Every ingest
//! refreshes the `gps-point-{sn}` cache entry; reads go cache-first with a
//! tenant check and fall back to an empty point, matching the enrichment
//! contract of the generic list endpoint.

use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DatabaseConnection, EntityTrait,
    PaginatorTrait, QueryFilter, QueryOrder, Set, Statement,
};
use serde_json::{Value as JsonValue, json};

use crate::cache::TtlCache;
use crate::error::RepositoryError;
use crate::idgen::IdGenerator;
use crate::models::gps_point::{
    ActiveModel as PointActiveModel, Entity as GpsPoint, Model as PointModel,
};
use crate::models::gps_point;

/// Cache key for the newest point of a device serial.
pub fn point_cache_key(sn: &str) -> String {
    format!("gps-point-{sn}")
}

/// Request data for ingesting a point.
#[derive(Debug, Clone)]
pub struct IngestPointRequest {
    pub sys_id: i32,
    pub org_id: i32,
    pub sn: String,
    pub longitude: f64,
    pub latitude: f64,
    pub altitude: Option<f64>,
    pub speed: Option<f64>,
}

fn point_json(point: &PointModel) -> JsonValue {
    json!({
        "id": point.id,
        "sys_id": point.sys_id,
        "org_id": point.org_id,
        "sn": point.sn,
        "longitude": point.longitude,
        "latitude": point.latitude,
        "altitude": point.altitude,
        "speed": point.speed,
        "create_time": point.create_time.to_rfc3339(),
    })
}

/// The empty point returned when no cached position matches.
pub fn empty_point() -> JsonValue {
    json!({
        "sn": null,
        "longitude": null,
        "latitude": null,
        "altitude": null,
        "speed": null,
        "create_time": null,
    })
}

/// Repository for GPS points and the last-point cache.
pub struct GpsRepository<'a> {
    db: &'a DatabaseConnection,
    cache: &'a TtlCache,
    idgen: &'a IdGenerator,
}

impl<'a> GpsRepository<'a> {
    pub fn new(db: &'a DatabaseConnection, cache: &'a TtlCache, idgen: &'a IdGenerator) -> Self {
        Self { db, cache, idgen }
    }

    /// Ingest one point and refresh the serial's last-point cache entry.
    pub async fn ingest(&self, request: IngestPointRequest) -> Result<PointModel, RepositoryError> {
        if request.sn.trim().is_empty() {
            return Err(RepositoryError::validation_error("sn cannot be empty"));
        }

        let point = PointActiveModel {
            id: Set(self.idgen.next_id("P")),
            sys_id: Set(request.sys_id),
            org_id: Set(request.org_id),
            sn: Set(request.sn.clone()),
            longitude: Set(request.longitude),
            latitude: Set(request.latitude),
            altitude: Set(request.altitude),
            speed: Set(request.speed),
            create_time: Set(chrono::Utc::now().into()),
        };
        let point = point.insert(self.db).await?;

        self.cache
            .set(point_cache_key(&point.sn), point_json(&point), None);
        Ok(point)
    }

    /// Last known position for a serial, tenant-checked. Falls back to an
    /// empty point when nothing matches.
    pub fn last_point(&self, sn: &str, sys_id: i32) -> JsonValue {
        if let Some(value) = self.cache.get(&point_cache_key(sn)) {
            if value.get("sys_id").and_then(|v| v.as_i64()) == Some(sys_id as i64) {
                return value;
            }
        }
        empty_point()
    }

    /// Rebuild the cache from the newest row per serial (all serials).
    pub async fn refresh_all(&self) -> Result<usize, RepositoryError> {
        let sql = r#"
            WITH t AS (
                SELECT *, ROW_NUMBER() OVER (PARTITION BY sn ORDER BY create_time DESC) AS rownum
                FROM gps_points
            )
            SELECT id, sys_id, org_id, sn, longitude, latitude, altitude, speed, create_time
            FROM t WHERE rownum = 1
        "#;
        self.refresh_from_sql(sql, Vec::new()).await
    }

    /// Rebuild the cache for specific serials of one tenant.
    pub async fn refresh(
        &self,
        sys_id: i32,
        org_id: i32,
        sn_list: &[String],
    ) -> Result<usize, RepositoryError> {
        if sn_list.is_empty() {
            return Ok(0);
        }

        let placeholders = (3..3 + sn_list.len())
            .map(|i| format!("${i}"))
            .collect::<Vec<_>>()
            .join(", ");
        let sql = format!(
            r#"
            WITH t AS (
                SELECT *, ROW_NUMBER() OVER (PARTITION BY sn ORDER BY create_time DESC) AS rownum
                FROM gps_points
                WHERE sys_id = $1 AND org_id = $2 AND sn IN ({placeholders})
            )
            SELECT id, sys_id, org_id, sn, longitude, latitude, altitude, speed, create_time
            FROM t WHERE rownum = 1
            "#
        );

        let mut values: Vec<sea_orm::Value> = vec![sys_id.into(), org_id.into()];
        values.extend(sn_list.iter().map(|sn| sn.clone().into()));
        self.refresh_from_sql(&sql, values).await
    }

    async fn refresh_from_sql(
        &self,
        sql: &str,
        values: Vec<sea_orm::Value>,
    ) -> Result<usize, RepositoryError> {
        let backend = self.db.get_database_backend();
        // $N placeholders are accepted by both postgres and sqlite.
        let statement = if values.is_empty() {
            Statement::from_string(backend, sql.to_string())
        } else {
            Statement::from_sql_and_values(backend, sql, values)
        };

        let points = GpsPoint::find().from_raw_sql(statement).all(self.db).await?;
        let count = points.len();
        for point in points {
            self.cache
                .set(point_cache_key(&point.sn), point_json(&point), None);
        }
        Ok(count)
    }

    pub async fn list_points(
        &self,
        sys_id: Option<i32>,
        org_id: Option<i32>,
        sn: Option<&str>,
        page: u64,
        page_size: u64,
    ) -> Result<(u64, Vec<PointModel>), RepositoryError> {
        let mut query = GpsPoint::find().order_by_desc(gps_point::Column::CreateTime);
        if let Some(sys_id) = sys_id {
            query = query.filter(gps_point::Column::SysId.eq(sys_id));
        }
        if let Some(org_id) = org_id {
            query = query.filter(gps_point::Column::OrgId.eq(org_id));
        }
        if let Some(sn) = sn {
            query = query.filter(gps_point::Column::Sn.eq(sn));
        }

        let paginator = query.paginate(self.db, page_size.max(1));
        let count = paginator.num_items().await?;
        let items = paginator.fetch_page(page.saturating_sub(1)).await?;
        Ok((count, items))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use migration::MigratorTrait;
    use sea_orm::Database;

    async fn setup() -> (DatabaseConnection, TtlCache, IdGenerator) {
        let db = Database::connect("sqlite::memory:").await.unwrap();
        migration::Migrator::up(&db, None).await.unwrap();
        (db, TtlCache::new(), IdGenerator::new())
    }

    fn request(sn: &str, sys_id: i32, lon: f64) -> IngestPointRequest {
        IngestPointRequest {
            sys_id,
            org_id: 1,
            sn: sn.to_string(),
            longitude: lon,
            latitude: 39.9,
            altitude: None,
            speed: Some(12.5),
        }
    }

    #[tokio::test]
    async fn test_ingest_refreshes_cache() {
        let (db, cache, idgen) = setup().await;
        let repo = GpsRepository::new(&db, &cache, &idgen);

        repo.ingest(request("SN1", 1, 116.3)).await.unwrap();
        repo.ingest(request("SN1", 1, 116.4)).await.unwrap();

        let last = repo.last_point("SN1", 1);
        assert_eq!(last["longitude"], serde_json::json!(116.4));
    }

    #[tokio::test]
    async fn test_last_point_tenant_check() {
        let (db, cache, idgen) = setup().await;
        let repo = GpsRepository::new(&db, &cache, &idgen);

        repo.ingest(request("SN1", 1, 116.3)).await.unwrap();

        // A different tenant gets the empty point, not another tenant's data.
        let other = repo.last_point("SN1", 2);
        assert_eq!(other["longitude"], serde_json::Value::Null);
    }

    #[tokio::test]
    async fn test_refresh_rebuilds_from_newest_rows() {
        let (db, cache, idgen) = setup().await;
        let repo = GpsRepository::new(&db, &cache, &idgen);

        repo.ingest(request("SN1", 1, 116.3)).await.unwrap();
        repo.ingest(request("SN2", 1, 117.0)).await.unwrap();
        cache.remove(&point_cache_key("SN1"));
        cache.remove(&point_cache_key("SN2"));

        let refreshed = repo
            .refresh(1, 1, &["SN1".to_string(), "SN2".to_string()])
            .await
            .unwrap();
        assert_eq!(refreshed, 2);
        assert_eq!(repo.last_point("SN2", 1)["longitude"], serde_json::json!(117.0));
    }
}
