//! Assetline Platform Adapter
//!
//! This crate wraps the third-party media platform that holds the physical
//! bytes of every asset. It exposes the `MediaPlatform` trait (issue upload
//! credentials, delete remote assets, verify webhook signatures, list a
//! folder), an HTTP implementation, and the webhook signature scheme.
//!
//! # Webhook signatures
//!
//! The platform signs `"{timestamp}.{raw body}"` with HMAC-SHA256 and sends the
//! lowercase hex digest. Timestamps are unix seconds; deliveries outside the
//! configured validity window are rejected regardless of the digest.

pub mod factory;
pub mod http;
pub mod signature;
pub mod traits;

// Re-export commonly used types
pub use factory::create_platform;
pub use http::HttpMediaPlatform;
pub use signature::WebhookSigner;
pub use traits::{
    MediaPlatform, PlatformError, PlatformResult, RemoteAsset, UploadCredential,
    UploadCredentialRequest,
};
