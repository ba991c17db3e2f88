//! Typed partial updates for the canonical asset record.
//!
//! Every field is a [`PatchField`], which keeps "leave alone", "set to value" and
//! "set to null" apart without relying on map-key presence.

use chrono::{DateTime, Utc};

use super::asset::{Asset, AssetStatus};
use super::audit::AuditRecord;
use crate::validation::asset_fields;

#[derive(Debug, Clone, Default, PartialEq)]
pub enum PatchField<T> {
    #[default]
    Unchanged,
    Set(T),
    Clear,
}

impl<T> PatchField<T> {
    pub fn is_unchanged(&self) -> bool {
        matches!(self, PatchField::Unchanged)
    }

    pub fn as_set(&self) -> Option<&T> {
        match self {
            PatchField::Set(v) => Some(v),
            _ => None,
        }
    }

    fn apply_nullable(self, slot: &mut Option<T>) {
        match self {
            PatchField::Unchanged => {}
            PatchField::Set(v) => *slot = Some(v),
            PatchField::Clear => *slot = None,
        }
    }
}

impl<T: PartialEq> PatchField<T> {
    /// `Set(incoming)` when it carries a value that differs from `current`,
    /// otherwise `Unchanged`. Empty incoming values never clear stored data.
    pub fn diff(current: Option<&T>, incoming: Option<T>) -> Self {
        match incoming {
            Some(v) if current != Some(&v) => PatchField::Set(v),
            _ => PatchField::Unchanged,
        }
    }
}

/// Minimal update set for one asset row.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AssetPatch {
    pub status: PatchField<AssetStatus>,
    pub external_asset_id: PatchField<String>,
    pub external_upload_id: PatchField<String>,
    pub format: PatchField<String>,
    pub width: PatchField<i32>,
    pub height: PatchField<i32>,
    pub duration_secs: PatchField<f64>,
    pub aspect_ratio: PatchField<String>,
    pub ingest_status: PatchField<String>,
    pub upload_status: PatchField<String>,
    pub deleted_at: PatchField<DateTime<Utc>>,
    pub archived_by: PatchField<AuditRecord>,
    pub restored_by: PatchField<AuditRecord>,
    pub marked_as_broken_by: PatchField<AuditRecord>,
    pub archive_event_id: PatchField<String>,
}

impl AssetPatch {
    pub fn is_empty(&self) -> bool {
        self.changed_fields().is_empty()
    }

    /// Column names touched by this patch, drawn from the static field list.
    pub fn changed_fields(&self) -> Vec<&'static str> {
        let flags = [
            (asset_fields::STATUS, self.status.is_unchanged()),
            (
                asset_fields::EXTERNAL_ASSET_ID,
                self.external_asset_id.is_unchanged(),
            ),
            (
                asset_fields::EXTERNAL_UPLOAD_ID,
                self.external_upload_id.is_unchanged(),
            ),
            (asset_fields::FORMAT, self.format.is_unchanged()),
            (asset_fields::WIDTH, self.width.is_unchanged()),
            (asset_fields::HEIGHT, self.height.is_unchanged()),
            (asset_fields::DURATION_SECS, self.duration_secs.is_unchanged()),
            (asset_fields::ASPECT_RATIO, self.aspect_ratio.is_unchanged()),
            (asset_fields::INGEST_STATUS, self.ingest_status.is_unchanged()),
            (asset_fields::UPLOAD_STATUS, self.upload_status.is_unchanged()),
            (asset_fields::DELETED_AT, self.deleted_at.is_unchanged()),
            (asset_fields::ARCHIVED_BY, self.archived_by.is_unchanged()),
            (asset_fields::RESTORED_BY, self.restored_by.is_unchanged()),
            (
                asset_fields::MARKED_AS_BROKEN_BY,
                self.marked_as_broken_by.is_unchanged(),
            ),
            (
                asset_fields::ARCHIVE_EVENT_ID,
                self.archive_event_id.is_unchanged(),
            ),
        ];
        flags
            .into_iter()
            .filter(|(_, unchanged)| !unchanged)
            .map(|(name, _)| name)
            .collect()
    }

    /// Apply to an in-memory copy; bumps `updated_at` only when something changed.
    pub fn apply_to(self, asset: &mut Asset, now: DateTime<Utc>) {
        if self.is_empty() {
            return;
        }
        if let PatchField::Set(status) = self.status {
            asset.status = status;
        }
        self.external_asset_id
            .apply_nullable(&mut asset.external_asset_id);
        self.external_upload_id
            .apply_nullable(&mut asset.external_upload_id);
        self.format.apply_nullable(&mut asset.attributes.format);
        self.width.apply_nullable(&mut asset.attributes.width);
        self.height.apply_nullable(&mut asset.attributes.height);
        self.duration_secs
            .apply_nullable(&mut asset.attributes.duration_secs);
        self.aspect_ratio
            .apply_nullable(&mut asset.attributes.aspect_ratio);
        self.ingest_status
            .apply_nullable(&mut asset.attributes.ingest_status);
        self.upload_status
            .apply_nullable(&mut asset.attributes.upload_status);
        self.deleted_at.apply_nullable(&mut asset.deleted_at);
        self.archived_by.apply_nullable(&mut asset.archived_by);
        self.restored_by.apply_nullable(&mut asset.restored_by);
        self.marked_as_broken_by
            .apply_nullable(&mut asset.marked_as_broken_by);
        self.archive_event_id
            .apply_nullable(&mut asset.archive_event_id);
        asset.updated_at = now;
    }
}
