use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Actor id used for transitions driven by the media platform itself.
pub const PLATFORM_ACTOR_ID: &str = "platform";
/// Actor id used by the background cleanup service.
pub const SWEEPER_ACTOR_ID: &str = "cleanup-service";

/// Options attached to every state transition.
///
/// `event_id` is the dedup key for webhook-originated transitions; admin calls
/// leave it empty.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditTrailOptions {
    pub actor_id: String,
    pub actor_name: String,
    #[serde(default)]
    pub note: Option<String>,
    #[serde(default)]
    pub event_id: Option<String>,
}

impl AuditTrailOptions {
    pub fn admin(actor_id: impl Into<String>, actor_name: impl Into<String>) -> Self {
        Self {
            actor_id: actor_id.into(),
            actor_name: actor_name.into(),
            note: None,
            event_id: None,
        }
    }

    pub fn platform_event(event_id: impl Into<String>) -> Self {
        Self {
            actor_id: PLATFORM_ACTOR_ID.to_string(),
            actor_name: "Media platform".to_string(),
            note: None,
            event_id: Some(event_id.into()),
        }
    }

    pub fn sweeper(note: impl Into<String>) -> Self {
        Self {
            actor_id: SWEEPER_ACTOR_ID.to_string(),
            actor_name: "Cleanup service".to_string(),
            note: Some(note.into()),
            event_id: None,
        }
    }

    pub fn with_note(mut self, note: impl Into<String>) -> Self {
        self.note = Some(note.into());
        self
    }

    /// Stamp these options at `at`, producing the record stored on the asset.
    pub fn record(&self, at: DateTime<Utc>) -> AuditRecord {
        AuditRecord {
            actor_id: self.actor_id.clone(),
            actor_name: self.actor_name.clone(),
            note: self.note.clone().filter(|n| !n.trim().is_empty()),
            at,
        }
    }
}

/// Who performed a transition, persisted on the asset row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditRecord {
    pub actor_id: String,
    pub actor_name: String,
    pub note: Option<String>,
    pub at: DateTime<Utc>,
}
