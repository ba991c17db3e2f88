use std::collections::{BTreeSet, HashMap};

use assetline_core::models::{AssetMetadata, Owner, PlatformData, PlaybackId};
use assetline_core::AppError;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::Value as JsonValue;
use sqlx::types::Json;
use sqlx::PgPool;
use uuid::Uuid;

use super::store::{metadata_not_found, owners_remain, version_mismatch, MetadataStore};

#[derive(Debug, sqlx::FromRow)]
struct MetadataRow {
    asset_id: Uuid,
    title: Option<String>,
    creator_id: Option<String>,
    owners: Json<BTreeSet<Owner>>,
    version: i64,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<MetadataRow> for AssetMetadata {
    fn from(row: MetadataRow) -> Self {
        AssetMetadata {
            asset_id: row.asset_id,
            title: row.title,
            creator_id: row.creator_id,
            owners: row.owners.0,
            version: row.version,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

const METADATA_COLUMNS: &str = "asset_id, title, creator_id, owners, version, created_at, updated_at";

/// PostgreSQL metadata store, on its own pool.
#[derive(Clone)]
pub struct PostgresMetadataStore {
    pool: PgPool,
}

impl PostgresMetadataStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    async fn exists(&self, asset_id: Uuid) -> Result<bool, AppError> {
        let found: Option<(i64,)> =
            sqlx::query_as("SELECT version FROM asset_metadata WHERE asset_id = $1")
                .bind(asset_id)
                .fetch_optional(&self.pool)
                .await?;
        Ok(found.is_some())
    }
}

#[async_trait]
impl MetadataStore for PostgresMetadataStore {
    #[tracing::instrument(skip(self, metadata), fields(db.table = "asset_metadata", db.operation = "insert", asset_id = %metadata.asset_id))]
    async fn create(&self, metadata: &AssetMetadata) -> Result<(), AppError> {
        sqlx::query(
            r#"
            INSERT INTO asset_metadata (asset_id, title, creator_id, owners, version, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            "#,
        )
        .bind(metadata.asset_id)
        .bind(&metadata.title)
        .bind(&metadata.creator_id)
        .bind(Json(&metadata.owners))
        .bind(metadata.version)
        .bind(metadata.created_at)
        .bind(metadata.updated_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    #[tracing::instrument(skip(self), fields(db.table = "asset_metadata", db.operation = "select"))]
    async fn get(&self, asset_id: Uuid) -> Result<Option<AssetMetadata>, AppError> {
        let row = sqlx::query_as::<_, MetadataRow>(&format!(
            "SELECT {METADATA_COLUMNS} FROM asset_metadata WHERE asset_id = $1"
        ))
        .bind(asset_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(AssetMetadata::from))
    }

    #[tracing::instrument(skip(self, asset_ids), fields(db.table = "asset_metadata", db.operation = "select", count = asset_ids.len()))]
    async fn get_many(&self, asset_ids: &[Uuid]) -> Result<HashMap<Uuid, AssetMetadata>, AppError> {
        if asset_ids.is_empty() {
            return Ok(HashMap::new());
        }
        let rows = sqlx::query_as::<_, MetadataRow>(&format!(
            "SELECT {METADATA_COLUMNS} FROM asset_metadata WHERE asset_id = ANY($1)"
        ))
        .bind(asset_ids)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows
            .into_iter()
            .map(|row| (row.asset_id, AssetMetadata::from(row)))
            .collect())
    }

    #[tracing::instrument(skip(self, owners), fields(db.table = "asset_metadata", db.operation = "update", owners = owners.len()))]
    async fn replace_owners(
        &self,
        asset_id: Uuid,
        owners: &BTreeSet<Owner>,
        expected_version: i64,
    ) -> Result<AssetMetadata, AppError> {
        let row = sqlx::query_as::<_, MetadataRow>(&format!(
            r#"
            UPDATE asset_metadata
            SET owners = $2, version = version + 1, updated_at = NOW()
            WHERE asset_id = $1 AND version = $3
            RETURNING {METADATA_COLUMNS}
            "#
        ))
        .bind(asset_id)
        .bind(Json(owners))
        .bind(expected_version)
        .fetch_optional(&self.pool)
        .await?;

        match row {
            Some(row) => Ok(row.into()),
            None if self.exists(asset_id).await? => {
                Err(version_mismatch(asset_id, expected_version))
            }
            None => Err(metadata_not_found(asset_id)),
        }
    }

    #[tracing::instrument(skip(self, title), fields(db.table = "asset_metadata", db.operation = "update"))]
    async fn update_title(
        &self,
        asset_id: Uuid,
        title: Option<String>,
    ) -> Result<AssetMetadata, AppError> {
        let row = sqlx::query_as::<_, MetadataRow>(&format!(
            r#"
            UPDATE asset_metadata
            SET title = $2, version = version + 1, updated_at = NOW()
            WHERE asset_id = $1
            RETURNING {METADATA_COLUMNS}
            "#
        ))
        .bind(asset_id)
        .bind(title)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| metadata_not_found(asset_id))?;
        Ok(row.into())
    }

    #[tracing::instrument(skip(self), fields(db.table = "asset_platform_data", db.operation = "select"))]
    async fn get_platform_data(&self, asset_id: Uuid) -> Result<Option<PlatformData>, AppError> {
        let row: Option<(Json<Vec<JsonValue>>, Json<Vec<PlaybackId>>)> = sqlx::query_as(
            "SELECT tracks, playback_ids FROM asset_platform_data WHERE asset_id = $1",
        )
        .bind(asset_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(|(tracks, playback_ids)| PlatformData {
            tracks: tracks.0,
            playback_ids: playback_ids.0,
        }))
    }

    #[tracing::instrument(skip(self, data), fields(db.table = "asset_platform_data", db.operation = "upsert"))]
    async fn upsert_platform_data(
        &self,
        asset_id: Uuid,
        data: &PlatformData,
    ) -> Result<(), AppError> {
        sqlx::query(
            r#"
            INSERT INTO asset_platform_data (asset_id, tracks, playback_ids, updated_at)
            VALUES ($1, $2, $3, NOW())
            ON CONFLICT (asset_id) DO UPDATE
            SET tracks = EXCLUDED.tracks,
                playback_ids = EXCLUDED.playback_ids,
                updated_at = NOW()
            "#,
        )
        .bind(asset_id)
        .bind(Json(&data.tracks))
        .bind(Json(&data.playback_ids))
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    #[tracing::instrument(skip(self), fields(db.table = "asset_metadata", db.operation = "delete"))]
    async fn delete(&self, asset_id: Uuid) -> Result<bool, AppError> {
        let mut tx = self.pool.begin().await?;

        let deleted = sqlx::query(
            "DELETE FROM asset_metadata WHERE asset_id = $1 AND jsonb_array_length(owners) = 0",
        )
        .bind(asset_id)
        .execute(&mut *tx)
        .await?
        .rows_affected();

        if deleted == 0 {
            let still_there: Option<(i64,)> =
                sqlx::query_as("SELECT version FROM asset_metadata WHERE asset_id = $1")
                    .bind(asset_id)
                    .fetch_optional(&mut *tx)
                    .await?;
            if still_there.is_some() {
                tx.rollback().await?;
                return Err(owners_remain(asset_id));
            }
        }

        sqlx::query("DELETE FROM asset_platform_data WHERE asset_id = $1")
            .bind(asset_id)
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;

        Ok(deleted > 0)
    }
}
