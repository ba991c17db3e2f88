use assetline_core::models::{
    Asset, AssetListQuery, AssetPatch, AssetScope, AssetStatus, AuditRecord, CorrelationKey,
    NewAsset, PatchField, ResourceAttributes, ResourceType, SortDirection,
};
use assetline_core::validation::asset_fields;
use assetline_core::{AppError, OrderValue};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::Postgres;
use sqlx::query_builder::Separated;
use sqlx::types::Json;
use sqlx::{PgPool, QueryBuilder, Transaction};
use uuid::Uuid;

use super::store::{asset_not_found, AssetStore, AssetTransaction};

const SELECT_ASSET: &str = r#"
    SELECT id, resource_type, status, external_asset_id, external_upload_id,
           format, width, height, duration_secs, aspect_ratio, ingest_status, upload_status,
           deleted_at, created_by, archived_by, restored_by, marked_as_broken_by,
           archive_event_id, created_at, updated_at
    FROM assets
"#;

#[derive(Debug, sqlx::FromRow)]
struct AssetRow {
    id: Uuid,
    resource_type: ResourceType,
    status: AssetStatus,
    external_asset_id: Option<String>,
    external_upload_id: Option<String>,
    format: Option<String>,
    width: Option<i32>,
    height: Option<i32>,
    duration_secs: Option<f64>,
    aspect_ratio: Option<String>,
    ingest_status: Option<String>,
    upload_status: Option<String>,
    deleted_at: Option<DateTime<Utc>>,
    created_by: Json<AuditRecord>,
    archived_by: Option<Json<AuditRecord>>,
    restored_by: Option<Json<AuditRecord>>,
    marked_as_broken_by: Option<Json<AuditRecord>>,
    archive_event_id: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<AssetRow> for Asset {
    fn from(row: AssetRow) -> Self {
        Asset {
            id: row.id,
            resource_type: row.resource_type,
            status: row.status,
            external_asset_id: row.external_asset_id,
            external_upload_id: row.external_upload_id,
            attributes: ResourceAttributes {
                format: row.format,
                width: row.width,
                height: row.height,
                duration_secs: row.duration_secs,
                aspect_ratio: row.aspect_ratio,
                ingest_status: row.ingest_status,
                upload_status: row.upload_status,
            },
            deleted_at: row.deleted_at,
            created_by: row.created_by.0,
            archived_by: row.archived_by.map(|j| j.0),
            restored_by: row.restored_by.map(|j| j.0),
            marked_as_broken_by: row.marked_as_broken_by.map(|j| j.0),
            archive_event_id: row.archive_event_id,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

/// PostgreSQL canonical asset store
#[derive(Clone)]
pub struct PostgresAssetStore {
    pool: PgPool,
}

impl PostgresAssetStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl AssetStore for PostgresAssetStore {
    async fn begin(&self) -> Result<Box<dyn AssetTransaction>, AppError> {
        let tx = self.pool.begin().await?;
        Ok(Box::new(PgAssetTransaction { tx }))
    }

    #[tracing::instrument(skip(self), fields(db.table = "assets", db.operation = "select"))]
    async fn get(&self, id: Uuid) -> Result<Option<Asset>, AppError> {
        let row = sqlx::query_as::<_, AssetRow>(&format!("{SELECT_ASSET} WHERE id = $1"))
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.map(Asset::from))
    }

    #[tracing::instrument(skip(self), fields(db.table = "assets", db.operation = "select", key = %key))]
    async fn find_by_correlation(&self, key: &CorrelationKey) -> Result<Option<Asset>, AppError> {
        let row = match key {
            CorrelationKey::InternalId(id) => return self.get(*id).await,
            CorrelationKey::ExternalUploadId(upload_id) => {
                sqlx::query_as::<_, AssetRow>(&format!(
                    "{SELECT_ASSET} WHERE external_upload_id = $1"
                ))
                .bind(upload_id)
                .fetch_optional(&self.pool)
                .await?
            }
            CorrelationKey::ExternalAssetId(asset_id) => {
                sqlx::query_as::<_, AssetRow>(&format!(
                    "{SELECT_ASSET} WHERE external_asset_id = $1"
                ))
                .bind(asset_id)
                .fetch_optional(&self.pool)
                .await?
            }
        };
        Ok(row.map(Asset::from))
    }

    #[tracing::instrument(skip(self, ids), fields(db.table = "assets", db.operation = "select", count = ids.len()))]
    async fn find_by_external_asset_ids(&self, ids: &[String]) -> Result<Vec<Asset>, AppError> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let rows = sqlx::query_as::<_, AssetRow>(&format!(
            "{SELECT_ASSET} WHERE external_asset_id = ANY($1) ORDER BY id"
        ))
        .bind(ids)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(Asset::from).collect())
    }

    #[tracing::instrument(skip(self, query), fields(db.table = "assets", db.operation = "select", order_by = %query.order_by, limit = query.limit))]
    async fn list(&self, query: &AssetListQuery) -> Result<Vec<Asset>, AppError> {
        let mut qb = QueryBuilder::<Postgres>::new(SELECT_ASSET);
        qb.push(" WHERE TRUE");

        match query.scope {
            AssetScope::Live => {
                qb.push(" AND deleted_at IS NULL");
            }
            AssetScope::Archived => {
                qb.push(" AND deleted_at IS NOT NULL");
            }
            AssetScope::All => {}
        }

        if !query.filter.statuses.is_empty() {
            let statuses: Vec<String> = query
                .filter
                .statuses
                .iter()
                .map(|s| s.as_str().to_string())
                .collect();
            qb.push(" AND status::text = ANY(").push_bind(statuses).push(")");
        }
        if let Some(resource_type) = query.filter.resource_type {
            qb.push(" AND resource_type = ").push_bind(resource_type);
        }
        if let Some(actor) = &query.filter.created_by {
            qb.push(" AND created_by->>'actor_id' = ")
                .push_bind(actor.clone());
        }

        // Column names come from the static orderable list, never from input.
        let column = query.order_by.column();
        let (cmp, dir) = match query.direction {
            SortDirection::Asc => (">", "ASC"),
            SortDirection::Desc => ("<", "DESC"),
        };

        if let Some(cursor) = &query.after {
            let OrderValue::Time(value) = &cursor.value else {
                return Err(AppError::InvalidArgument(format!(
                    "page token value does not fit ordering by '{}'",
                    query.order_by
                )));
            };
            qb.push(format!(" AND ({column}, id) {cmp} ("))
                .push_bind(*value)
                .push(", ")
                .push_bind(cursor.id)
                .push(")");
        }

        qb.push(format!(" ORDER BY {column} {dir}, id {dir} LIMIT "))
            .push_bind(i64::from(query.limit));

        let rows = qb
            .build_query_as::<AssetRow>()
            .fetch_all(&self.pool)
            .await
            .map_err(|e| {
                tracing::error!(error = ?e, "Failed to list assets");
                AppError::from(e)
            })?;
        Ok(rows.into_iter().map(Asset::from).collect())
    }

    #[tracing::instrument(skip(self, asset), fields(db.table = "assets", db.operation = "insert", asset_id = %asset.id))]
    async fn create(&self, asset: NewAsset) -> Result<Asset, AppError> {
        let row = sqlx::query_as::<_, AssetRow>(
            r#"
            INSERT INTO assets (
                id, resource_type, status, external_asset_id, external_upload_id,
                created_by, created_at, updated_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $7)
            RETURNING id, resource_type, status, external_asset_id, external_upload_id,
                      format, width, height, duration_secs, aspect_ratio, ingest_status, upload_status,
                      deleted_at, created_by, archived_by, restored_by, marked_as_broken_by,
                      archive_event_id, created_at, updated_at
            "#,
        )
        .bind(asset.id)
        .bind(asset.resource_type)
        .bind(AssetStatus::UploadUrlGenerated)
        .bind(&asset.external_asset_id)
        .bind(&asset.external_upload_id)
        .bind(Json(&asset.created_by))
        .bind(asset.created_at)
        .fetch_one(&self.pool)
        .await?;

        tracing::debug!(asset_id = %row.id, "Asset row created");
        Ok(row.into())
    }

    #[tracing::instrument(skip(self), fields(db.table = "assets", db.operation = "delete"))]
    async fn delete(&self, id: Uuid) -> Result<bool, AppError> {
        let result = sqlx::query("DELETE FROM assets WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    #[tracing::instrument(skip(self), fields(db.table = "assets", db.operation = "select"))]
    async fn list_broken_before(
        &self,
        cutoff: DateTime<Utc>,
        limit: u32,
    ) -> Result<Vec<Asset>, AppError> {
        let rows = sqlx::query_as::<_, AssetRow>(&format!(
            "{SELECT_ASSET} WHERE status = 'broken' AND updated_at < $1 ORDER BY updated_at, id LIMIT $2"
        ))
        .bind(cutoff)
        .bind(i64::from(limit))
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(Asset::from).collect())
    }
}

/// Transaction over the canonical pool; locked rows are released on commit or rollback.
pub struct PgAssetTransaction {
    tx: Transaction<'static, Postgres>,
}

fn push_field<'args, T>(
    set: &mut Separated<'_, 'args, Postgres, &'static str>,
    column: &'static str,
    field: PatchField<T>,
) where
    T: 'args + sqlx::Encode<'args, Postgres> + sqlx::Type<Postgres> + Send,
{
    match field {
        PatchField::Unchanged => {}
        PatchField::Set(value) => {
            set.push(column);
            set.push_unseparated(" = ");
            set.push_bind_unseparated(value);
        }
        PatchField::Clear => {
            set.push(column);
            set.push_unseparated(" = NULL");
        }
    }
}

fn json_field(field: PatchField<AuditRecord>) -> PatchField<Json<AuditRecord>> {
    match field {
        PatchField::Unchanged => PatchField::Unchanged,
        PatchField::Set(record) => PatchField::Set(Json(record)),
        PatchField::Clear => PatchField::Clear,
    }
}

#[async_trait]
impl AssetTransaction for PgAssetTransaction {
    #[tracing::instrument(skip(self), fields(db.table = "assets", db.operation = "select_for_update"))]
    async fn lock(&mut self, id: Uuid) -> Result<Option<Asset>, AppError> {
        let row = sqlx::query_as::<_, AssetRow>(&format!(
            "{SELECT_ASSET} WHERE id = $1 FOR UPDATE"
        ))
        .bind(id)
        .fetch_optional(&mut *self.tx)
        .await?;
        Ok(row.map(Asset::from))
    }

    #[tracing::instrument(skip(self, patch), fields(db.table = "assets", db.operation = "update", fields = ?patch.changed_fields()))]
    async fn apply(&mut self, id: Uuid, patch: AssetPatch) -> Result<Asset, AppError> {
        if patch.is_empty() {
            return self.lock(id).await?.ok_or_else(|| asset_not_found(id));
        }

        let mut qb = QueryBuilder::<Postgres>::new("UPDATE assets SET ");
        {
            let mut set = qb.separated(", ");
            push_field(&mut set, asset_fields::STATUS, patch.status);
            push_field(
                &mut set,
                asset_fields::EXTERNAL_ASSET_ID,
                patch.external_asset_id,
            );
            push_field(
                &mut set,
                asset_fields::EXTERNAL_UPLOAD_ID,
                patch.external_upload_id,
            );
            push_field(&mut set, asset_fields::FORMAT, patch.format);
            push_field(&mut set, asset_fields::WIDTH, patch.width);
            push_field(&mut set, asset_fields::HEIGHT, patch.height);
            push_field(&mut set, asset_fields::DURATION_SECS, patch.duration_secs);
            push_field(&mut set, asset_fields::ASPECT_RATIO, patch.aspect_ratio);
            push_field(&mut set, asset_fields::INGEST_STATUS, patch.ingest_status);
            push_field(&mut set, asset_fields::UPLOAD_STATUS, patch.upload_status);
            push_field(&mut set, asset_fields::DELETED_AT, patch.deleted_at);
            push_field(
                &mut set,
                asset_fields::ARCHIVED_BY,
                json_field(patch.archived_by),
            );
            push_field(
                &mut set,
                asset_fields::RESTORED_BY,
                json_field(patch.restored_by),
            );
            push_field(
                &mut set,
                asset_fields::MARKED_AS_BROKEN_BY,
                json_field(patch.marked_as_broken_by),
            );
            push_field(
                &mut set,
                asset_fields::ARCHIVE_EVENT_ID,
                patch.archive_event_id,
            );
            set.push("updated_at = ");
            set.push_bind_unseparated(Utc::now());
        }
        qb.push(" WHERE id = ").push_bind(id);
        qb.push(
            " RETURNING id, resource_type, status, external_asset_id, external_upload_id, \
             format, width, height, duration_secs, aspect_ratio, ingest_status, upload_status, \
             deleted_at, created_by, archived_by, restored_by, marked_as_broken_by, \
             archive_event_id, created_at, updated_at",
        );

        let row = qb
            .build_query_as::<AssetRow>()
            .fetch_optional(&mut *self.tx)
            .await?
            .ok_or_else(|| asset_not_found(id))?;
        Ok(row.into())
    }

    #[tracing::instrument(skip(self), fields(db.table = "assets", db.operation = "delete"))]
    async fn delete(&mut self, id: Uuid) -> Result<(), AppError> {
        let result = sqlx::query("DELETE FROM assets WHERE id = $1")
            .bind(id)
            .execute(&mut *self.tx)
            .await?;
        if result.rows_affected() == 0 {
            return Err(asset_not_found(id));
        }
        Ok(())
    }

    async fn commit(self: Box<Self>) -> Result<(), AppError> {
        self.tx.commit().await?;
        Ok(())
    }

    async fn rollback(self: Box<Self>) -> Result<(), AppError> {
        self.tx.rollback().await?;
        Ok(())
    }
}
