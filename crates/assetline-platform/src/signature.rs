//! Webhook signature verification
//!
//! Digest = hex(HMAC-SHA256(secret, "{timestamp}.{payload}")). The signature
//! header may carry several comma-separated candidates (secret rotation), each
//! optionally prefixed with `v1=`; any valid candidate passes.

use std::time::Duration;

use chrono::Utc;
use hmac::{Hmac, Mac};
use sha2::Sha256;
use subtle::ConstantTimeEq;

type HmacSha256 = Hmac<Sha256>;

const SIGNATURE_VERSION_PREFIX: &str = "v1=";

#[derive(Clone)]
pub struct WebhookSigner {
    secret: Vec<u8>,
}

impl std::fmt::Debug for WebhookSigner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WebhookSigner").finish_non_exhaustive()
    }
}

impl WebhookSigner {
    pub fn new(secret: impl AsRef<[u8]>) -> Self {
        Self {
            secret: secret.as_ref().to_vec(),
        }
    }

    fn digest(&self, timestamp: &str, payload: &[u8]) -> Option<String> {
        let mut mac = HmacSha256::new_from_slice(&self.secret).ok()?;
        mac.update(timestamp.as_bytes());
        mac.update(b".");
        mac.update(payload);
        Some(hex::encode(mac.finalize().into_bytes()))
    }

    /// Signature header value for `payload` at `timestamp` (unix seconds).
    pub fn sign(&self, payload: &[u8], timestamp: i64) -> String {
        let ts = timestamp.to_string();
        let digest = self.digest(&ts, payload).unwrap_or_default();
        format!("{SIGNATURE_VERSION_PREFIX}{digest}")
    }

    pub fn verify(
        &self,
        payload: &[u8],
        signature: &str,
        timestamp: &str,
        validity_window: Duration,
    ) -> bool {
        self.verify_at(
            payload,
            signature,
            timestamp,
            validity_window,
            Utc::now().timestamp(),
        )
    }

    /// Verify against an explicit clock.
    pub fn verify_at(
        &self,
        payload: &[u8],
        signature: &str,
        timestamp: &str,
        validity_window: Duration,
        now: i64,
    ) -> bool {
        let Ok(signed_at) = timestamp.trim().parse::<i64>() else {
            tracing::debug!("Webhook timestamp is not a unix time");
            return false;
        };
        if now.saturating_sub(signed_at).unsigned_abs() > validity_window.as_secs() {
            tracing::debug!(signed_at, now, "Webhook timestamp outside validity window");
            return false;
        }

        let Some(expected) = self.digest(timestamp.trim(), payload) else {
            return false;
        };

        signature
            .split(',')
            .map(|candidate| {
                let candidate = candidate.trim();
                candidate
                    .strip_prefix(SIGNATURE_VERSION_PREFIX)
                    .unwrap_or(candidate)
            })
            .filter(|candidate| !candidate.is_empty())
            .any(|candidate| {
                // Constant-time comparison to prevent timing attacks
                expected
                    .as_bytes()
                    .ct_eq(candidate.to_ascii_lowercase().as_bytes())
                    .into()
            })
    }
}
