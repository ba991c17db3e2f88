use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use validator::Validate;

use super::asset::{Asset, ResourceType};
use super::audit::AuditTrailOptions;
use super::owner::Owner;

/// Admin request to start an upload and create the asset.
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct BeginUploadRequest {
    pub resource_type: ResourceType,
    #[validate(length(
        min = 1,
        max = 255,
        message = "Title must be between 1 and 255 characters"
    ))]
    pub title: Option<String>,
    #[validate(length(
        min = 1,
        max = 255,
        message = "Creator id must be between 1 and 255 characters"
    ))]
    pub creator_id: Option<String>,
    #[serde(default)]
    #[validate(length(max = 100, message = "At most 100 owners per request"))]
    pub owners: Vec<Owner>,
    /// Origin the browser upload will come from, forwarded to the platform.
    #[serde(default)]
    pub cors_origin: Option<String>,
    #[serde(skip)]
    pub audit: AuditTrailOptions,
}

impl BeginUploadRequest {
    pub fn owner_set(&self) -> BTreeSet<Owner> {
        self.owners.iter().cloned().collect()
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct BeginUploadResponse {
    pub asset: Asset,
    pub upload_url: String,
}
