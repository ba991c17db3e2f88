use std::sync::Arc;
use std::time::Duration;

use assetline_core::models::{
    Asset, AssetPatch, AssetStatus, AuditTrailOptions, PatchField, PlatformData,
};
use assetline_core::{AppError, LifecycleOp};
use chrono::Utc;
use serde::Serialize;
use uuid::Uuid;

use super::events::{EventKind, PlatformEvent};
use crate::lifecycle::AssetLifecycleService;

/// How far an event got through the pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum WebhookStage {
    Received,
    SignatureVerified,
    Resolved,
    Patched,
    SideEffectsApplied,
}

#[derive(Debug, Clone, Serialize)]
pub struct WebhookOutcome {
    pub event_id: String,
    pub event_type: String,
    pub stage: WebhookStage,
    pub asset_ids: Vec<Uuid>,
    pub changed_fields: Vec<&'static str>,
    /// Acknowledged without doing anything (unknown type or unknown asset).
    pub ignored: bool,
}

impl WebhookOutcome {
    fn new(event: &PlatformEvent) -> Self {
        Self {
            event_id: event.id.clone(),
            event_type: event.event_type.clone(),
            stage: WebhookStage::SignatureVerified,
            asset_ids: Vec::new(),
            changed_fields: Vec::new(),
            ignored: false,
        }
    }

    fn ignored(mut self) -> Self {
        self.ignored = true;
        self
    }
}

fn non_blank(value: &Option<String>) -> Option<String> {
    value
        .as_deref()
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

/// Minimal patch taking `current` to what `event` says. Fields the event does
/// not carry, or carries unchanged, stay out of the patch.
pub fn build_event_patch(event: &PlatformEvent, current: &Asset) -> AssetPatch {
    let kind = event.kind();
    let data = &event.data;
    let attrs = &current.attributes;

    let mut patch = AssetPatch {
        external_asset_id: PatchField::diff(
            current.external_asset_id.as_ref(),
            event.external_asset_id(),
        ),
        external_upload_id: PatchField::diff(
            current.external_upload_id.as_ref(),
            event.external_upload_id(),
        ),
        format: PatchField::diff(attrs.format.as_ref(), non_blank(&data.format)),
        width: PatchField::diff(attrs.width.as_ref(), data.width.filter(|w| *w > 0)),
        height: PatchField::diff(attrs.height.as_ref(), data.height.filter(|h| *h > 0)),
        duration_secs: PatchField::diff(
            attrs.duration_secs.as_ref(),
            data.duration.filter(|d| d.is_finite() && *d >= 0.0),
        ),
        aspect_ratio: PatchField::diff(attrs.aspect_ratio.as_ref(), non_blank(&data.aspect_ratio)),
        ..Default::default()
    };

    if kind == EventKind::UploadAssetCreated {
        patch.upload_status =
            PatchField::diff(attrs.upload_status.as_ref(), non_blank(&data.status));
    } else {
        patch.ingest_status =
            PatchField::diff(attrs.ingest_status.as_ref(), non_blank(&data.status));
    }

    match kind {
        EventKind::AssetReady if LifecycleOp::Activate.is_legal_from(current.status) => {
            patch.status = PatchField::Set(AssetStatus::Active);
        }
        EventKind::AssetErrored if LifecycleOp::MarkAsBroken.is_legal_from(current.status) => {
            let audit = AuditTrailOptions::platform_event(&event.id)
                .with_note(error_note(event).unwrap_or_else(|| "platform reported an error".to_string()));
            patch.status = PatchField::Set(AssetStatus::Broken);
            patch.marked_as_broken_by = PatchField::Set(audit.record(Utc::now()));
        }
        _ => {}
    }
    patch
}

fn error_note(event: &PlatformEvent) -> Option<String> {
    let errors = event.data.errors.as_ref()?;
    let messages = errors.get("messages").and_then(|m| m.as_array())?;
    let joined: Vec<&str> = messages.iter().filter_map(|m| m.as_str()).collect();
    (!joined.is_empty()).then(|| joined.join("; "))
}

/// Verifies, resolves, patches and applies side effects for platform webhooks.
pub struct WebhookPipeline {
    lifecycle: Arc<AssetLifecycleService>,
    validity_window: Duration,
}

impl WebhookPipeline {
    pub fn new(lifecycle: Arc<AssetLifecycleService>, validity_window: Duration) -> Self {
        Self {
            lifecycle,
            validity_window,
        }
    }

    /// Run one delivery. Success is only returned once every change is durable.
    #[tracing::instrument(skip(self, payload, signature, timestamp), fields(bytes = payload.len()))]
    pub async fn handle(
        &self,
        payload: &[u8],
        signature: Option<&str>,
        timestamp: Option<&str>,
    ) -> Result<WebhookOutcome, AppError> {
        let (Some(signature), Some(timestamp)) = (signature, timestamp) else {
            return Err(AppError::PermissionDenied(
                "missing webhook signature or timestamp".to_string(),
            ));
        };
        if !self.lifecycle.platform().verify_signature(
            payload,
            signature,
            timestamp,
            self.validity_window,
        ) {
            tracing::warn!("Rejected webhook with invalid or expired signature");
            return Err(AppError::PermissionDenied(
                "invalid or expired webhook signature".to_string(),
            ));
        }

        let event: PlatformEvent = serde_json::from_slice(payload)?;
        let kind = event.kind();
        let outcome = WebhookOutcome::new(&event);
        tracing::debug!(event_id = %event.id, event_type = %kind, "Webhook verified");

        match kind {
            EventKind::Unknown(ref raw) => {
                tracing::info!(event_id = %event.id, event_type = %raw, "Ignoring unknown webhook event");
                Ok(outcome.ignored())
            }
            EventKind::AssetDeleted => self.handle_deleted(&event, outcome).await,
            _ => self.handle_update(&event, outcome).await,
        }
    }

    async fn resolve(&self, event: &PlatformEvent) -> Result<Option<Asset>, AppError> {
        let assets = self.lifecycle.assets();
        for key in event.correlation_keys() {
            if let Some(asset) = assets.find_by_correlation(&key).await? {
                tracing::debug!(event_id = %event.id, key = %key, asset_id = %asset.id, "Webhook resolved");
                return Ok(Some(asset));
            }
        }
        Ok(None)
    }

    async fn handle_update(
        &self,
        event: &PlatformEvent,
        mut outcome: WebhookOutcome,
    ) -> Result<WebhookOutcome, AppError> {
        let Some(asset) = self.resolve(event).await? else {
            tracing::warn!(event_id = %event.id, event_type = %event.event_type, "Webhook refers to no known asset");
            return Ok(outcome.ignored());
        };
        outcome.stage = WebhookStage::Resolved;
        outcome.asset_ids.push(asset.id);

        let applied = self
            .lifecycle
            .apply_locked(asset.id, |current| Ok(build_event_patch(event, current)))
            .await?;
        outcome.changed_fields = applied.changed_fields.clone();

        if self.sync_platform_data(event, asset.id).await? {
            outcome.changed_fields.push("platform_data");
        }
        outcome.stage = WebhookStage::Patched;

        if !outcome.changed_fields.is_empty() {
            tracing::info!(
                event_id = %event.id,
                asset_id = %asset.id,
                fields = ?outcome.changed_fields,
                "Asset patched from webhook"
            );
        }

        // Re-run from stored state so a delivery that failed after commit converges.
        if applied.after.status == AssetStatus::Broken {
            self.lifecycle.release_owners(&applied.after).await?;
        }
        outcome.stage = WebhookStage::SideEffectsApplied;
        Ok(outcome)
    }

    /// Upsert bulky sub-objects, only when the event actually changes them.
    async fn sync_platform_data(
        &self,
        event: &PlatformEvent,
        asset_id: Uuid,
    ) -> Result<bool, AppError> {
        let data = &event.data;
        if data.tracks.is_none() && data.playback_ids.is_none() {
            return Ok(false);
        }

        let metadata = self.lifecycle.metadata();
        let stored = metadata.get_platform_data(asset_id).await?;
        let current = stored.clone().unwrap_or_default();
        let next = PlatformData {
            tracks: data.tracks.clone().unwrap_or_else(|| current.tracks.clone()),
            playback_ids: data
                .playback_ids
                .clone()
                .unwrap_or_else(|| current.playback_ids.clone()),
        };

        if stored.as_ref() == Some(&next) || (stored.is_none() && next.is_empty()) {
            return Ok(false);
        }
        metadata.upsert_platform_data(asset_id, &next).await?;
        Ok(true)
    }

    async fn handle_deleted(
        &self,
        event: &PlatformEvent,
        mut outcome: WebhookOutcome,
    ) -> Result<WebhookOutcome, AppError> {
        let ids = event.deleted_asset_ids();
        let mut assets = if ids.is_empty() {
            Vec::new()
        } else {
            self.lifecycle
                .assets()
                .find_by_external_asset_ids(&ids)
                .await?
        };
        if assets.is_empty() {
            if let Some(asset) = self.resolve(event).await? {
                assets.push(asset);
            }
        }
        if assets.is_empty() {
            tracing::warn!(event_id = %event.id, ids = ?ids, "Upstream deletion refers to no known asset");
            return Ok(outcome.ignored());
        }

        outcome.stage = WebhookStage::Resolved;
        outcome.asset_ids = assets.iter().map(|a| a.id).collect();

        let report = self
            .lifecycle
            .archive_from_upstream(assets, &event.id)
            .await?;
        tracing::info!(
            event_id = %event.id,
            archived = report.archived.len(),
            already_processed = report.already_processed.len(),
            metadata_purged = report.metadata_purged,
            "Upstream deletion applied"
        );
        outcome.stage = WebhookStage::SideEffectsApplied;
        Ok(outcome)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assetline_core::models::{NewAsset, ResourceType};

    fn asset(status: AssetStatus) -> Asset {
        let now = Utc::now();
        let mut asset = NewAsset {
            id: Uuid::now_v7(),
            resource_type: ResourceType::Video,
            external_asset_id: None,
            external_upload_id: Some("up_1".to_string()),
            created_by: AuditTrailOptions::admin("u1", "Ada").record(now),
            created_at: now,
        }
        .into_asset();
        asset.status = status;
        asset
    }

    fn event(body: serde_json::Value) -> PlatformEvent {
        serde_json::from_value(body).unwrap()
    }

    #[test]
    fn test_ready_event_activates_pending_asset() {
        let current = asset(AssetStatus::UploadUrlGenerated);
        let evt = event(serde_json::json!({
            "id": "e1", "type": "asset.ready",
            "data": {"id": "ext_1", "upload_id": "up_1", "status": "ready", "duration": 12.5}
        }));
        let patch = build_event_patch(&evt, &current);

        assert_eq!(patch.status, PatchField::Set(AssetStatus::Active));
        assert_eq!(patch.external_asset_id, PatchField::Set("ext_1".to_string()));
        // Upload id already stored
        assert!(patch.external_upload_id.is_unchanged());
        assert_eq!(patch.duration_secs, PatchField::Set(12.5));
        assert_eq!(patch.ingest_status, PatchField::Set("ready".to_string()));
    }

    #[test]
    fn test_patch_is_empty_once_applied() {
        let mut current = asset(AssetStatus::UploadUrlGenerated);
        let evt = event(serde_json::json!({
            "id": "e1", "type": "asset.ready",
            "data": {"id": "ext_1", "status": "ready", "width": 640, "height": 360}
        }));
        build_event_patch(&evt, &current).apply_to(&mut current, Utc::now());
        assert!(build_event_patch(&evt, &current).is_empty());
    }

    #[test]
    fn test_ready_does_not_revive_broken_asset() {
        let current = asset(AssetStatus::Broken);
        let evt = event(serde_json::json!({"id": "e1", "type": "asset.ready", "data": {}}));
        assert!(build_event_patch(&evt, &current).status.is_unchanged());
    }

    #[test]
    fn test_errored_marks_broken_with_platform_actor() {
        let current = asset(AssetStatus::Active);
        let evt = event(serde_json::json!({
            "id": "e7", "type": "asset.errored",
            "data": {"errors": {"messages": ["codec unsupported"]}}
        }));
        let patch = build_event_patch(&evt, &current);
        assert_eq!(patch.status, PatchField::Set(AssetStatus::Broken));
        let record = patch.marked_as_broken_by.as_set().unwrap();
        assert_eq!(record.actor_id, assetline_core::models::PLATFORM_ACTOR_ID);
        assert_eq!(record.note.as_deref(), Some("codec unsupported"));

        let archived = asset(AssetStatus::Archived);
        assert!(build_event_patch(&evt, &archived).status.is_unchanged());
    }

    #[test]
    fn test_upload_event_sets_upload_status() {
        let current = asset(AssetStatus::UploadUrlGenerated);
        let evt = event(serde_json::json!({
            "id": "e2", "type": "upload.asset_created",
            "data": {"id": "up_1", "asset_id": "ext_2", "status": "asset_created"}
        }));
        let patch = build_event_patch(&evt, &current);
        assert_eq!(patch.external_asset_id, PatchField::Set("ext_2".to_string()));
        assert_eq!(
            patch.upload_status,
            PatchField::Set("asset_created".to_string())
        );
        assert!(patch.ingest_status.is_unchanged());
    }
}
