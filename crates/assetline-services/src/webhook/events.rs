//! Platform webhook payloads
//!
//! The body is a JSON object discriminated by `type`. `data.id` is the platform
//! asset id for `asset.*` events and the upload id for `upload.*` events.

use std::fmt::{Display, Formatter, Result as FmtResult};

use assetline_core::models::{CorrelationKey, PlaybackId};
use chrono::{DateTime, Utc};
use serde::Deserialize;
use serde_json::Value as JsonValue;
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EventKind {
    UploadAssetCreated,
    AssetCreated,
    AssetUpdated,
    AssetReady,
    AssetErrored,
    TracksUpdated,
    AssetDeleted,
    Unknown(String),
}

impl EventKind {
    pub fn parse(raw: &str) -> Self {
        match raw {
            "upload.asset_created" => EventKind::UploadAssetCreated,
            "asset.created" => EventKind::AssetCreated,
            "asset.updated" => EventKind::AssetUpdated,
            "asset.ready" => EventKind::AssetReady,
            "asset.errored" => EventKind::AssetErrored,
            "asset.tracks_updated" => EventKind::TracksUpdated,
            "asset.deleted" => EventKind::AssetDeleted,
            other => EventKind::Unknown(other.to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            EventKind::UploadAssetCreated => "upload.asset_created",
            EventKind::AssetCreated => "asset.created",
            EventKind::AssetUpdated => "asset.updated",
            EventKind::AssetReady => "asset.ready",
            EventKind::AssetErrored => "asset.errored",
            EventKind::TracksUpdated => "asset.tracks_updated",
            EventKind::AssetDeleted => "asset.deleted",
            EventKind::Unknown(raw) => raw,
        }
    }

    fn is_upload_event(&self) -> bool {
        matches!(self, EventKind::UploadAssetCreated)
    }
}

impl Display for EventKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct EventData {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub upload_id: Option<String>,
    #[serde(default)]
    pub asset_id: Option<String>,
    /// Our internal id, echoed back from the upload credential request.
    #[serde(default)]
    pub passthrough: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub format: Option<String>,
    #[serde(default)]
    pub width: Option<i32>,
    #[serde(default)]
    pub height: Option<i32>,
    #[serde(default)]
    pub duration: Option<f64>,
    #[serde(default)]
    pub aspect_ratio: Option<String>,
    #[serde(default)]
    pub tracks: Option<Vec<JsonValue>>,
    #[serde(default)]
    pub playback_ids: Option<Vec<PlaybackId>>,
    #[serde(default)]
    pub deleted_ids: Vec<String>,
    #[serde(default)]
    pub errors: Option<JsonValue>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PlatformEvent {
    pub id: String,
    #[serde(rename = "type")]
    pub event_type: String,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub data: EventData,
}

fn present(value: &Option<String>) -> Option<String> {
    value
        .as_deref()
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

impl PlatformEvent {
    pub fn kind(&self) -> EventKind {
        EventKind::parse(&self.event_type)
    }

    /// Platform asset id carried by the event.
    pub fn external_asset_id(&self) -> Option<String> {
        if self.kind().is_upload_event() {
            present(&self.data.asset_id)
        } else {
            present(&self.data.id)
        }
    }

    /// Platform upload id carried by the event.
    pub fn external_upload_id(&self) -> Option<String> {
        if self.kind().is_upload_event() {
            present(&self.data.id)
        } else {
            present(&self.data.upload_id)
        }
    }

    /// Lookup keys, most stable first: our own passthrough id, then the upload
    /// id, then the platform asset id.
    pub fn correlation_keys(&self) -> Vec<CorrelationKey> {
        let mut keys = Vec::with_capacity(3);
        if let Some(raw) = present(&self.data.passthrough) {
            match Uuid::parse_str(&raw) {
                Ok(id) => keys.push(CorrelationKey::InternalId(id)),
                Err(_) => {
                    tracing::debug!(event_id = %self.id, passthrough = %raw, "Ignoring non-UUID passthrough")
                }
            }
        }
        if let Some(upload_id) = self.external_upload_id() {
            keys.push(CorrelationKey::ExternalUploadId(upload_id));
        }
        if let Some(asset_id) = self.external_asset_id() {
            keys.push(CorrelationKey::ExternalAssetId(asset_id));
        }
        keys
    }

    /// Platform asset ids an `asset.deleted` event refers to.
    pub fn deleted_asset_ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self
            .data
            .deleted_ids
            .iter()
            .map(|id| id.trim())
            .filter(|id| !id.is_empty())
            .map(str::to_string)
            .collect();
        if let Some(id) = present(&self.data.id) {
            ids.push(id);
        }
        ids.sort();
        ids.dedup();
        ids
    }
}
