//! Assetline Services Layer
//!
//! Business services of the engine: the lifecycle orchestrator that enforces the
//! asset state machine, the owner reconciler that propagates owner-set changes to
//! owner services, the webhook ingestion pipeline and the periodic cleanup sweeper.
//! Thin HTTP handling stays in assetline-api.

pub mod cleanup;
pub mod lifecycle;
pub mod reconcile;
pub mod saga;
pub mod webhook;

pub use cleanup::{CleanupReport, CleanupService, CleanupSettings};
pub use lifecycle::{AppliedPatch, AssetLifecycleService, LifecycleSettings, UpstreamDeletionReport};
pub use reconcile::{OwnerReconciler, ReconcileReport, RECONCILIATION_SERVICE};
pub use saga::{Saga, StepPolicy};
pub use webhook::{EventKind, PlatformEvent, WebhookOutcome, WebhookPipeline, WebhookStage};
