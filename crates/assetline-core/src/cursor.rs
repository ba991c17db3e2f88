//! Opaque page tokens for cursor pagination.
//!
//! A token is `base64url(json payload) "." base64url(hmac-sha256)`. The payload
//! holds the ordering field, the ordering value of the last returned row and its
//! id as tiebreak. Timestamps are normalized to UTC at microsecond precision
//! before encoding so the same row always yields the same token.

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use chrono::{DateTime, SubsecRound, TimeZone, Utc};
use hmac::{Hmac, Mac};
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use std::cmp::Ordering;
use uuid::Uuid;

use crate::error::AppError;
use crate::models::{Asset, OrderField, SortDirection};

type HmacSha256 = Hmac<Sha256>;

/// Ordering value captured in a cursor.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderValue {
    Time(DateTime<Utc>),
    Int(i64),
    Text(String),
}

impl OrderValue {
    /// Canonical form for any timezone: UTC, truncated to microseconds.
    pub fn time<Tz: TimeZone>(at: DateTime<Tz>) -> Self {
        OrderValue::Time(at.with_timezone(&Utc).trunc_subsecs(6))
    }
}

/// Decoded position: everything strictly after `(value, id)` comes next.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageCursor {
    #[serde(rename = "f")]
    pub order_by: OrderField,
    #[serde(rename = "v")]
    pub value: OrderValue,
    pub id: Uuid,
}

impl PageCursor {
    pub fn new(order_by: OrderField, value: OrderValue, id: Uuid) -> Self {
        let value = match value {
            OrderValue::Time(t) => OrderValue::time(t),
            other => other,
        };
        Self {
            order_by,
            value,
            id,
        }
    }

    /// Cursor positioned at `asset` for a listing ordered by `order_by`.
    pub fn from_asset(asset: &Asset, order_by: OrderField) -> Self {
        let value = match order_by {
            OrderField::CreatedAt => OrderValue::time(asset.created_at),
            OrderField::UpdatedAt => OrderValue::time(asset.updated_at),
        };
        Self {
            order_by,
            value,
            id: asset.id,
        }
    }

    /// True when `asset` sorts strictly after this cursor in `direction`.
    pub fn admits(&self, asset: &Asset, direction: SortDirection) -> bool {
        let row = PageCursor::from_asset(asset, self.order_by);
        let ord = (&row.value, row.id).cmp(&(&self.value, self.id));
        match direction {
            SortDirection::Asc => ord == Ordering::Greater,
            SortDirection::Desc => ord == Ordering::Less,
        }
    }
}

/// Encodes and verifies page tokens with a server-side secret.
#[derive(Clone)]
pub struct CursorCodec {
    secret: Vec<u8>,
}

impl std::fmt::Debug for CursorCodec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CursorCodec").finish_non_exhaustive()
    }
}

impl CursorCodec {
    pub fn new(secret: impl AsRef<[u8]>) -> Self {
        Self {
            secret: secret.as_ref().to_vec(),
        }
    }

    fn mac(&self) -> Result<HmacSha256, AppError> {
        HmacSha256::new_from_slice(&self.secret)
            .map_err(|_| AppError::Internal("invalid cursor secret".to_string()))
    }

    pub fn encode(&self, cursor: &PageCursor) -> Result<String, AppError> {
        let payload = URL_SAFE_NO_PAD.encode(serde_json::to_vec(cursor).map_err(|e| {
            AppError::Internal(format!("failed to serialize cursor: {}", e))
        })?);
        let mut mac = self.mac()?;
        mac.update(payload.as_bytes());
        let signature = URL_SAFE_NO_PAD.encode(mac.finalize().into_bytes());
        Ok(format!("{payload}.{signature}"))
    }

    /// Decode a token. An empty token means "start from the beginning".
    pub fn decode(&self, token: &str) -> Result<Option<PageCursor>, AppError> {
        let token = token.trim();
        if token.is_empty() {
            return Ok(None);
        }

        let (payload, signature) = token
            .split_once('.')
            .ok_or_else(|| invalid("invalid page token format"))?;
        let signature = URL_SAFE_NO_PAD
            .decode(signature)
            .map_err(|_| invalid("invalid page token signature encoding"))?;

        let mut mac = self.mac()?;
        mac.update(payload.as_bytes());
        mac.verify_slice(&signature)
            .map_err(|_| invalid("invalid page token signature"))?;

        let raw = URL_SAFE_NO_PAD
            .decode(payload)
            .map_err(|_| invalid("invalid page token payload encoding"))?;
        let cursor: PageCursor =
            serde_json::from_slice(&raw).map_err(|_| invalid("invalid page token payload"))?;
        Ok(Some(cursor))
    }

    /// Decode a token that must have been issued for a listing ordered by `order_by`.
    pub fn decode_for(
        &self,
        token: Option<&str>,
        order_by: OrderField,
    ) -> Result<Option<PageCursor>, AppError> {
        let Some(cursor) = self.decode(token.unwrap_or_default())? else {
            return Ok(None);
        };
        if cursor.order_by != order_by {
            return Err(AppError::InvalidArgument(format!(
                "page token was issued for ordering by '{}', not '{}'",
                cursor.order_by, order_by
            )));
        }
        Ok(Some(cursor))
    }
}

fn invalid(msg: &str) -> AppError {
    AppError::InvalidArgument(msg.to_string())
}
