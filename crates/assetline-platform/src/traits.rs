//! Media platform abstraction trait
//!
//! Every platform backend implements [`MediaPlatform`]. The lifecycle services
//! only ever see this trait, never a vendor SDK.

use std::time::Duration;

use assetline_core::models::ResourceType;
use assetline_core::AppError;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

/// Service name carried by `AppError::ExternalService` for platform failures.
pub const PLATFORM_SERVICE: &str = "media-platform";

/// Platform operation errors
#[derive(Debug, Error)]
pub enum PlatformError {
    #[error("Remote asset not found: {0}")]
    NotFound(String),

    #[error("Platform rejected credentials")]
    Unauthorized,

    #[error("Platform returned {status}: {message}")]
    Rejected { status: u16, message: String },

    #[error("Platform request failed: {0}")]
    Transport(String),

    #[error("Unexpected platform response: {0}")]
    InvalidResponse(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),
}

/// Result type for platform operations
pub type PlatformResult<T> = Result<T, PlatformError>;

impl From<reqwest::Error> for PlatformError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            PlatformError::InvalidResponse(err.to_string())
        } else {
            PlatformError::Transport(err.to_string())
        }
    }
}

impl From<PlatformError> for AppError {
    fn from(err: PlatformError) -> Self {
        match err {
            PlatformError::NotFound(id) => {
                AppError::NotFound(format!("remote asset {} not found", id))
            }
            PlatformError::ConfigError(msg) => AppError::Internal(msg),
            other => AppError::external(PLATFORM_SERVICE, other.to_string()),
        }
    }
}

/// What the platform needs to mint a direct-upload URL.
#[derive(Debug, Clone, Serialize)]
pub struct UploadCredentialRequest {
    /// Our internal id, echoed back by the platform on every event for this upload.
    pub passthrough: Uuid,
    pub resource_type: ResourceType,
    pub folder: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cors_origin: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct UploadCredential {
    pub upload_url: String,
    pub external_upload_id: String,
    /// Some platforms assign the asset id only once ingestion starts.
    pub external_asset_id: Option<String>,
}

/// An asset as listed by the platform.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct RemoteAsset {
    pub id: String,
    #[serde(default)]
    pub resource_type: Option<ResourceType>,
    #[serde(default)]
    pub passthrough: Option<String>,
}

/// Media platform abstraction trait
#[async_trait]
pub trait MediaPlatform: Send + Sync {
    /// Mint a direct-upload URL for a new asset.
    async fn issue_upload_credential(
        &self,
        request: &UploadCredentialRequest,
    ) -> PlatformResult<UploadCredential>;

    /// Delete an asset on the platform. A missing remote asset counts as success.
    async fn delete_remote_asset(
        &self,
        external_id: &str,
        resource_type: ResourceType,
    ) -> PlatformResult<()>;

    /// Check a webhook delivery. `timestamp` is the raw header value.
    fn verify_signature(
        &self,
        payload: &[u8],
        signature: &str,
        timestamp: &str,
        validity_window: Duration,
    ) -> bool;

    /// Every asset the platform holds under `folder`.
    async fn list_assets_in_folder(&self, folder: &str) -> PlatformResult<Vec<RemoteAsset>>;

    /// Platform name for logs
    fn name(&self) -> &str;
}
