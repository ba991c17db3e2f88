//! Owner service abstraction trait

use std::fmt::{Display, Formatter, Result as FmtResult};

use assetline_core::models::{AssetRef, OwnerType};
use assetline_core::AppError;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Machine-readable status code reported by an owner service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RemoteStatusCode {
    NotFound,
    InvalidArgument,
    AlreadyExists,
    FailedPrecondition,
    PermissionDenied,
    Unavailable,
    Internal,
    #[serde(other)]
    Unknown,
}

impl RemoteStatusCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            RemoteStatusCode::NotFound => "not_found",
            RemoteStatusCode::InvalidArgument => "invalid_argument",
            RemoteStatusCode::AlreadyExists => "already_exists",
            RemoteStatusCode::FailedPrecondition => "failed_precondition",
            RemoteStatusCode::PermissionDenied => "permission_denied",
            RemoteStatusCode::Unavailable => "unavailable",
            RemoteStatusCode::Internal => "internal",
            RemoteStatusCode::Unknown => "unknown",
        }
    }

    /// Best guess when the service answered without a code in the body.
    pub fn from_http_status(status: u16) -> Self {
        match status {
            400 | 422 => RemoteStatusCode::InvalidArgument,
            401 | 403 => RemoteStatusCode::PermissionDenied,
            404 => RemoteStatusCode::NotFound,
            409 => RemoteStatusCode::AlreadyExists,
            412 => RemoteStatusCode::FailedPrecondition,
            502..=504 => RemoteStatusCode::Unavailable,
            500..=599 => RemoteStatusCode::Internal,
            _ => RemoteStatusCode::Unknown,
        }
    }
}

impl Display for RemoteStatusCode {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        f.write_str(self.as_str())
    }
}

/// Failure reported by, or while talking to, an owner service.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("owner service {owner_type} failed ({code}): {message}")]
pub struct OwnerServiceError {
    pub owner_type: String,
    pub code: RemoteStatusCode,
    pub message: String,
}

impl OwnerServiceError {
    pub fn new(
        owner_type: impl Into<String>,
        code: RemoteStatusCode,
        message: impl Into<String>,
    ) -> Self {
        Self {
            owner_type: owner_type.into(),
            code,
            message: message.into(),
        }
    }

    pub fn unavailable(owner_type: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(owner_type, RemoteStatusCode::Unavailable, message)
    }
}

/// Result type for owner service calls
pub type OwnerServiceResult<T> = Result<T, OwnerServiceError>;

impl From<OwnerServiceError> for AppError {
    fn from(err: OwnerServiceError) -> Self {
        let message = err.to_string();
        match err.code {
            RemoteStatusCode::NotFound => AppError::NotFound(message),
            RemoteStatusCode::InvalidArgument => AppError::InvalidArgument(message),
            RemoteStatusCode::AlreadyExists => AppError::AlreadyExists(message),
            RemoteStatusCode::FailedPrecondition => AppError::Conflict(message),
            RemoteStatusCode::PermissionDenied => AppError::PermissionDenied(message),
            RemoteStatusCode::Unavailable
            | RemoteStatusCode::Internal
            | RemoteStatusCode::Unknown => {
                AppError::external(format!("owner-service:{}", err.owner_type), err.message)
            }
        }
    }
}

/// Client for one owner service.
///
/// Batch calls return the number of associations the service actually changed;
/// repeating a call that already took effect is expected to succeed with 0.
#[async_trait]
pub trait OwnerServiceClient: Send + Sync {
    async fn add_batch(
        &self,
        asset: &AssetRef,
        owner_ids: &[String],
        owner_type: &OwnerType,
    ) -> OwnerServiceResult<u64>;

    async fn delete_batch(
        &self,
        asset: &AssetRef,
        owner_ids: &[String],
        owner_type: &OwnerType,
    ) -> OwnerServiceResult<u64>;

    async fn add(
        &self,
        asset: &AssetRef,
        owner_id: &str,
        owner_type: &OwnerType,
    ) -> OwnerServiceResult<()>;

    async fn delete(
        &self,
        asset: &AssetRef,
        owner_id: &str,
        owner_type: &OwnerType,
    ) -> OwnerServiceResult<()>;

    /// Drop every association the service holds for these assets.
    async fn force_delete_batch(&self, assets: &[AssetRef]) -> OwnerServiceResult<u64>;

    /// Client name for logs
    fn name(&self) -> &str;
}
