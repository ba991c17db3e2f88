//! Validation modules
//!
//! Permitted field names are kept here as explicit static lists. Repositories
//! build SQL from these names only, never from caller-supplied strings.

use crate::error::AppError;

/// Column names of the canonical `assets` table that a patch may write.
pub mod asset_fields {
    pub const STATUS: &str = "status";
    pub const EXTERNAL_ASSET_ID: &str = "external_asset_id";
    pub const EXTERNAL_UPLOAD_ID: &str = "external_upload_id";
    pub const FORMAT: &str = "format";
    pub const WIDTH: &str = "width";
    pub const HEIGHT: &str = "height";
    pub const DURATION_SECS: &str = "duration_secs";
    pub const ASPECT_RATIO: &str = "aspect_ratio";
    pub const INGEST_STATUS: &str = "ingest_status";
    pub const UPLOAD_STATUS: &str = "upload_status";
    pub const DELETED_AT: &str = "deleted_at";
    pub const ARCHIVED_BY: &str = "archived_by";
    pub const RESTORED_BY: &str = "restored_by";
    pub const MARKED_AS_BROKEN_BY: &str = "marked_as_broken_by";
    pub const ARCHIVE_EVENT_ID: &str = "archive_event_id";
}

pub const PATCHABLE_ASSET_FIELDS: [&str; 15] = [
    asset_fields::STATUS,
    asset_fields::EXTERNAL_ASSET_ID,
    asset_fields::EXTERNAL_UPLOAD_ID,
    asset_fields::FORMAT,
    asset_fields::WIDTH,
    asset_fields::HEIGHT,
    asset_fields::DURATION_SECS,
    asset_fields::ASPECT_RATIO,
    asset_fields::INGEST_STATUS,
    asset_fields::UPLOAD_STATUS,
    asset_fields::DELETED_AT,
    asset_fields::ARCHIVED_BY,
    asset_fields::RESTORED_BY,
    asset_fields::MARKED_AS_BROKEN_BY,
    asset_fields::ARCHIVE_EVENT_ID,
];

/// Fields a listing may be ordered by, in `OrderField` declaration order.
pub const ORDERABLE_ASSET_FIELDS: [&str; 2] = ["created_at", "updated_at"];

pub const MAX_TITLE_LENGTH: usize = 255;

pub fn is_patchable_field(name: &str) -> bool {
    PATCHABLE_ASSET_FIELDS.contains(&name)
}

pub fn validate_title(title: &str) -> Result<(), AppError> {
    let trimmed = title.trim();
    if trimmed.is_empty() {
        return Err(AppError::InvalidArgument(
            "Title cannot be empty".to_string(),
        ));
    }
    if trimmed.chars().count() > MAX_TITLE_LENGTH {
        return Err(AppError::InvalidArgument(format!(
            "Title cannot exceed {} characters",
            MAX_TITLE_LENGTH
        )));
    }
    Ok(())
}

/// Clamp a requested page size into `[1, max]`, defaulting when absent.
pub fn normalize_page_size(requested: Option<u32>, default: u32, max: u32) -> u32 {
    match requested {
        None | Some(0) => default.min(max),
        Some(n) => n.min(max),
    }
}
