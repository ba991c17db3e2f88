//! API constants

/// Versioned prefix for every admin and webhook route.
pub const API_PREFIX: &str = "/api/v0";

pub const ACTOR_ID_HEADER: &str = "x-actor-id";
pub const ACTOR_NAME_HEADER: &str = "x-actor-name";

pub const PLATFORM_TIMESTAMP_HEADER: &str = "x-platform-timestamp";
pub const PLATFORM_SIGNATURE_HEADER: &str = "x-platform-signature";

/// Upper bound for request bodies. Webhook payloads with track lists are the largest.
pub const MAX_BODY_BYTES: usize = 2 * 1024 * 1024;
