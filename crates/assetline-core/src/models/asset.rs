use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter, Result as FmtResult};
use std::str::FromStr;
use uuid::Uuid;

use super::audit::AuditRecord;
use crate::error::AppError;

/// Lifecycle status of an asset
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(
    feature = "sqlx",
    sqlx(type_name = "asset_status", rename_all = "snake_case")
)]
#[serde(rename_all = "snake_case")]
pub enum AssetStatus {
    UploadUrlGenerated,
    Active,
    Archived,
    Broken,
}

impl AssetStatus {
    pub const ALL: [AssetStatus; 4] = [
        AssetStatus::UploadUrlGenerated,
        AssetStatus::Active,
        AssetStatus::Archived,
        AssetStatus::Broken,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            AssetStatus::UploadUrlGenerated => "upload_url_generated",
            AssetStatus::Active => "active",
            AssetStatus::Archived => "archived",
            AssetStatus::Broken => "broken",
        }
    }

    /// Ownership changes are only valid while the asset is live.
    pub fn is_live(&self) -> bool {
        matches!(self, AssetStatus::UploadUrlGenerated | AssetStatus::Active)
    }
}

impl Display for AssetStatus {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        f.write_str(self.as_str())
    }
}

impl FromStr for AssetStatus {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        AssetStatus::ALL
            .into_iter()
            .find(|status| status.as_str() == s)
            .ok_or_else(|| AppError::InvalidArgument(format!("Invalid asset status: {}", s)))
    }
}

/// Kind of media held by the platform
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(
    feature = "sqlx",
    sqlx(type_name = "asset_resource_type", rename_all = "lowercase")
)]
#[serde(rename_all = "lowercase")]
pub enum ResourceType {
    Image,
    Video,
}

impl ResourceType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ResourceType::Image => "image",
            ResourceType::Video => "video",
        }
    }
}

impl Display for ResourceType {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        f.write_str(self.as_str())
    }
}

impl FromStr for ResourceType {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "image" => Ok(ResourceType::Image),
            "video" => Ok(ResourceType::Video),
            _ => Err(AppError::InvalidArgument(format!(
                "Invalid resource type: {}",
                s
            ))),
        }
    }
}

/// Media attributes reported incrementally by platform events.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ResourceAttributes {
    pub format: Option<String>,
    pub width: Option<i32>,
    pub height: Option<i32>,
    pub duration_secs: Option<f64>,
    pub aspect_ratio: Option<String>,
    pub ingest_status: Option<String>,
    pub upload_status: Option<String>,
}

/// Canonical lifecycle record for one media object.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Asset {
    pub id: Uuid,
    pub resource_type: ResourceType,
    pub status: AssetStatus,
    pub external_asset_id: Option<String>,
    pub external_upload_id: Option<String>,
    #[serde(flatten)]
    pub attributes: ResourceAttributes,
    pub deleted_at: Option<DateTime<Utc>>,
    pub created_by: AuditRecord,
    pub archived_by: Option<AuditRecord>,
    pub restored_by: Option<AuditRecord>,
    pub marked_as_broken_by: Option<AuditRecord>,
    pub archive_event_id: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Asset {
    pub fn asset_ref(&self) -> AssetRef {
        AssetRef {
            asset_id: self.id,
            resource_type: self.resource_type,
        }
    }

    /// Identifier the platform knows this asset by, falling back to the upload id.
    pub fn remote_id(&self) -> Option<&str> {
        self.external_asset_id
            .as_deref()
            .or(self.external_upload_id.as_deref())
    }
}

/// Insert payload for a freshly begun upload.
#[derive(Debug, Clone)]
pub struct NewAsset {
    pub id: Uuid,
    pub resource_type: ResourceType,
    pub external_asset_id: Option<String>,
    pub external_upload_id: Option<String>,
    pub created_by: AuditRecord,
    pub created_at: DateTime<Utc>,
}

impl NewAsset {
    pub fn into_asset(self) -> Asset {
        Asset {
            id: self.id,
            resource_type: self.resource_type,
            status: AssetStatus::UploadUrlGenerated,
            external_asset_id: self.external_asset_id,
            external_upload_id: self.external_upload_id,
            attributes: ResourceAttributes::default(),
            deleted_at: None,
            created_by: self.created_by,
            archived_by: None,
            restored_by: None,
            marked_as_broken_by: None,
            archive_event_id: None,
            created_at: self.created_at,
            updated_at: self.created_at,
        }
    }
}

/// What owner services receive to identify an asset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AssetRef {
    pub asset_id: Uuid,
    pub resource_type: ResourceType,
}

/// Correlation keys a platform event may carry, in resolution priority order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CorrelationKey {
    /// Internal id set by us at creation time (passthrough).
    InternalId(Uuid),
    ExternalUploadId(String),
    ExternalAssetId(String),
}

impl Display for CorrelationKey {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        match self {
            CorrelationKey::InternalId(id) => write!(f, "internal:{}", id),
            CorrelationKey::ExternalUploadId(id) => write!(f, "upload:{}", id),
            CorrelationKey::ExternalAssetId(id) => write!(f, "asset:{}", id),
        }
    }
}
