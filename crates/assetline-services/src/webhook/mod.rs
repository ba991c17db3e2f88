//! Platform webhook ingestion
//!
//! Deliveries are verified, resolved to an asset, turned into a minimal patch
//! and applied under the row lock. Redelivery of an already applied event is a
//! no-op, so the platform may retry freely.

mod events;
mod pipeline;

pub use events::{EventData, EventKind, PlatformEvent};
pub use pipeline::{build_event_patch, WebhookOutcome, WebhookPipeline, WebhookStage};
