use crate::config::DatabaseConfig;
use crate::error::DatabaseError;
use crate::models::{AssetPackRecord, AssetRecord};
use async_trait::async_trait;
use sqlx::postgres::{PgPool, PgPoolOptions, Postgres};
use sqlx::query_builder::Separated;
use sqlx::types::Json;
use sqlx::QueryBuilder;
use tracing::{debug, info, instrument};

/// Conflict target for asset upserts. The same asset id may appear in
/// several packs.
pub const ASSET_CONFLICT_TARGET: &[&str] = &["id", "asset_pack_id"];

/// A row that can be upserted into its table
pub trait Record: Send + Sync {
    const TABLE: &'static str;
    /// Columns in the order `bind_values` binds them
    const COLUMNS: &'static [&'static str];
    const DEFAULT_CONFLICT_TARGET: &'static [&'static str];
    /// Columns written on insert but left untouched on update
    const INSERT_ONLY: &'static [&'static str] = &[];

    fn bind_values(&self, row: &mut Separated<'_, 'static, Postgres, &'static str>);
}

impl Record for AssetPackRecord {
    const TABLE: &'static str = "asset_packs";
    const COLUMNS: &'static [&'static str] = &[
        "id",
        "title",
        "thumbnail",
        "user_id",
        "created_at",
        "updated_at",
    ];
    const DEFAULT_CONFLICT_TARGET: &'static [&'static str] = &["id"];
    const INSERT_ONLY: &'static [&'static str] = &["created_at"];

    fn bind_values(&self, row: &mut Separated<'_, 'static, Postgres, &'static str>) {
        row.push_bind(self.id.clone())
            .push_bind(self.title.clone())
            .push_bind(self.thumbnail.clone())
            .push_bind(self.user_id.clone())
            .push_bind(self.created_at)
            .push_bind(self.updated_at);
    }
}

impl Record for AssetRecord {
    const TABLE: &'static str = "assets";
    const COLUMNS: &'static [&'static str] = &[
        "id",
        "asset_pack_id",
        "name",
        "thumbnail",
        "model",
        "category",
        "tags",
        "contents",
    ];
    const DEFAULT_CONFLICT_TARGET: &'static [&'static str] = &["id"];

    fn bind_values(&self, row: &mut Separated<'_, 'static, Postgres, &'static str>) {
        row.push_bind(self.id.clone())
            .push_bind(self.asset_pack_id.clone())
            .push_bind(self.name.clone())
            .push_bind(self.thumbnail.clone())
            .push_bind(self.model.clone())
            .push_bind(self.category.clone())
            .push_bind(self.tags.clone())
            .push_bind(Json(self.contents.clone()));
    }
}

/// Build `INSERT ... ON CONFLICT (target) DO UPDATE` for a record.
///
/// Every column outside the conflict target and `INSERT_ONLY` is
/// overwritten with the incoming value.
pub fn build_upsert<R: Record>(
    record: &R,
    conflict_target: Option<&[&str]>,
) -> Result<QueryBuilder<'static, Postgres>, DatabaseError> {
    let target = conflict_target.unwrap_or(R::DEFAULT_CONFLICT_TARGET);

    if target.is_empty() {
        return Err(DatabaseError::EmptyConflictTarget(R::TABLE));
    }
    if let Some(column) = target.iter().find(|c| !R::COLUMNS.iter().any(|col| col == *c)) {
        return Err(DatabaseError::UnknownColumn {
            table: R::TABLE,
            column: column.to_string(),
        });
    }

    let mut builder = QueryBuilder::new(format!(
        "INSERT INTO {} ({}) VALUES (",
        R::TABLE,
        R::COLUMNS.join(", ")
    ));
    record.bind_values(&mut builder.separated(", "));
    builder.push(format!(") ON CONFLICT ({})", target.join(", ")));

    let updates: Vec<String> = R::COLUMNS
        .iter()
        .filter(|c| !target.contains(*c) && !R::INSERT_ONLY.contains(*c))
        .map(|c| format!("{c} = EXCLUDED.{c}"))
        .collect();

    if updates.is_empty() {
        builder.push(" DO NOTHING");
    } else {
        builder.push(" DO UPDATE SET ");
        builder.push(updates.join(", "));
    }

    Ok(builder)
}

/// Persistence operations the seeder depends on
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait RecordStore: Send + Sync {
    async fn upsert_asset_pack(&self, pack: &AssetPackRecord) -> Result<(), DatabaseError>;

    async fn upsert_asset(&self, asset: &AssetRecord) -> Result<(), DatabaseError>;
}

/// PostgreSQL connection pool
pub struct Database {
    pool: PgPool,
}

impl Database {
    /// Open the connection pool. Must complete before any upsert.
    pub async fn connect(config: &DatabaseConfig) -> Result<Self, DatabaseError> {
        let pool = PgPoolOptions::new()
            .max_connections(config.max_connections)
            .min_connections(config.min_connections)
            .acquire_timeout(config.connect_timeout())
            .idle_timeout(Some(config.idle_timeout()))
            .connect(&config.url)
            .await?;

        info!("Connected to PostgreSQL database");

        Ok(Self { pool })
    }

    /// Create the record tables if they do not exist
    pub async fn run_migrations(&self) -> Result<(), DatabaseError> {
        info!("Running database migrations");

        sqlx::migrate!("./migrations").run(&self.pool).await?;

        info!("Database migrations completed");
        Ok(())
    }

    /// Insert a record, or update it in place when the conflict target
    /// (default: `Record::DEFAULT_CONFLICT_TARGET`) already exists
    pub async fn upsert<R: Record>(
        &self,
        record: &R,
        conflict_target: Option<&[&str]>,
    ) -> Result<u64, DatabaseError> {
        let mut builder = build_upsert(record, conflict_target)?;
        let result = builder.build().execute(&self.pool).await?;

        Ok(result.rows_affected())
    }

    /// Close every connection in the pool
    pub async fn close(&self) {
        self.pool.close().await;
        info!("Database connections closed");
    }
}

#[async_trait]
impl RecordStore for Database {
    #[instrument(skip(self, pack), fields(pack_id = %pack.id))]
    async fn upsert_asset_pack(&self, pack: &AssetPackRecord) -> Result<(), DatabaseError> {
        self.upsert(pack, None).await?;
        debug!("Asset pack upserted");
        Ok(())
    }

    #[instrument(skip(self, asset), fields(asset_id = %asset.id, pack_id = %asset.asset_pack_id))]
    async fn upsert_asset(&self, asset: &AssetRecord) -> Result<(), DatabaseError> {
        self.upsert(asset, Some(ASSET_CONFLICT_TARGET)).await?;
        debug!("Asset upserted");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use std::collections::BTreeMap;

    fn pack_record() -> AssetPackRecord {
        let now = Utc.with_ymd_and_hms(2024, 1, 15, 10, 30, 0).unwrap();
        AssetPackRecord {
            id: "p1".to_string(),
            title: "Pack".to_string(),
            thumbnail: "p1.png".to_string(),
            user_id: "0xowner".to_string(),
            created_at: now,
            updated_at: now,
        }
    }

    fn asset_record() -> AssetRecord {
        AssetRecord {
            id: "a1".to_string(),
            asset_pack_id: "p1".to_string(),
            name: "Tree".to_string(),
            thumbnail: "tree.png".to_string(),
            model: "http://x/m.glb".to_string(),
            category: "nature".to_string(),
            tags: vec!["tree".to_string()],
            contents: BTreeMap::from([("m.glb".to_string(), "hash1".to_string())]),
        }
    }

    #[test]
    fn test_asset_pack_upsert_sql() {
        let builder = build_upsert(&pack_record(), None).unwrap();

        assert_eq!(
            builder.sql(),
            "INSERT INTO asset_packs (id, title, thumbnail, user_id, created_at, updated_at) \
             VALUES ($1, $2, $3, $4, $5, $6) ON CONFLICT (id) \
             DO UPDATE SET title = EXCLUDED.title, thumbnail = EXCLUDED.thumbnail, \
             user_id = EXCLUDED.user_id, updated_at = EXCLUDED.updated_at"
        );
    }

    #[test]
    fn test_asset_upsert_sql_uses_composite_target() {
        let builder = build_upsert(&asset_record(), Some(ASSET_CONFLICT_TARGET)).unwrap();
        let sql = builder.sql();

        assert!(sql.starts_with(
            "INSERT INTO assets (id, asset_pack_id, name, thumbnail, model, category, tags, contents) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8)"
        ));
        assert!(sql.contains("ON CONFLICT (id, asset_pack_id) DO UPDATE SET name = EXCLUDED.name"));
        assert!(!sql.contains("asset_pack_id = EXCLUDED"));
        assert!(sql.ends_with("contents = EXCLUDED.contents"));
    }

    #[test]
    fn test_unknown_conflict_column() {
        let result = build_upsert(&asset_record(), Some(&["id", "pack"][..]));

        match result {
            Err(DatabaseError::UnknownColumn { table, column }) => {
                assert_eq!(table, "assets");
                assert_eq!(column, "pack");
            }
            _ => panic!("Expected UnknownColumn error"),
        }
    }

    #[test]
    fn test_empty_conflict_target() {
        let result = build_upsert(&pack_record(), Some(&[][..]));

        match result {
            Err(e @ DatabaseError::EmptyConflictTarget("asset_packs")) => {
                assert_eq!(e.to_string(), "Empty conflict target for table asset_packs");
            }
            _ => panic!("Expected EmptyConflictTarget error"),
        }
    }
}
