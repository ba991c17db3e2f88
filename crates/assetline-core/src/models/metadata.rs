use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use std::collections::BTreeSet;
use uuid::Uuid;

use super::owner::Owner;

/// Associative document kept in the metadata store, one per asset.
///
/// `version` increments on every write and is used as the compare-and-swap
/// token for owner mutations.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssetMetadata {
    pub asset_id: Uuid,
    pub title: Option<String>,
    pub creator_id: Option<String>,
    pub owners: BTreeSet<Owner>,
    pub version: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl AssetMetadata {
    pub fn new(
        asset_id: Uuid,
        title: Option<String>,
        creator_id: Option<String>,
        owners: BTreeSet<Owner>,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            asset_id,
            title,
            creator_id,
            owners,
            version: 1,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn has_owners(&self) -> bool {
        !self.owners.is_empty()
    }
}

/// Playback handle issued by the platform.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlaybackId {
    pub id: String,
    #[serde(default)]
    pub policy: Option<String>,
}

/// Bulky platform sub-objects, stored apart from the lean owner document so
/// frequent owner edits do not rewrite them.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PlatformData {
    #[serde(default)]
    pub tracks: Vec<JsonValue>,
    #[serde(default)]
    pub playback_ids: Vec<PlaybackId>,
}

impl PlatformData {
    pub fn is_empty(&self) -> bool {
        self.tracks.is_empty() && self.playback_ids.is_empty()
    }
}
