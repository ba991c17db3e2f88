//! Caller identity for the audit trail.

use assetline_core::models::AuditTrailOptions;
use assetline_core::AppError;
use axum::extract::FromRequestParts;
use axum::http::request::Parts;

use crate::constants::{ACTOR_ID_HEADER, ACTOR_NAME_HEADER};
use crate::error::HttpAppError;

const MAX_ACTOR_LEN: usize = 255;

/// Actor taken from `X-Actor-Id` (required) and `X-Actor-Name` (defaults to the id).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Actor {
    pub id: String,
    pub name: String,
}

impl Actor {
    pub fn audit(&self) -> AuditTrailOptions {
        AuditTrailOptions::admin(&self.id, &self.name)
    }
}

fn header(parts: &Parts, name: &str) -> Result<Option<String>, AppError> {
    let Some(value) = parts.headers.get(name) else {
        return Ok(None);
    };
    let value = value
        .to_str()
        .map_err(|_| AppError::InvalidArgument(format!("{} must be valid ASCII", name)))?
        .trim();
    if value.len() > MAX_ACTOR_LEN {
        return Err(AppError::InvalidArgument(format!(
            "{} exceeds {} characters",
            name, MAX_ACTOR_LEN
        )));
    }
    Ok((!value.is_empty()).then(|| value.to_string()))
}

impl<S> FromRequestParts<S> for Actor
where
    S: Send + Sync,
{
    type Rejection = HttpAppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let id = header(parts, ACTOR_ID_HEADER)?.ok_or_else(|| {
            AppError::InvalidArgument("X-Actor-Id header is required".to_string())
        })?;
        let name = header(parts, ACTOR_NAME_HEADER)?.unwrap_or_else(|| id.clone());
        Ok(Actor { id, name })
    }
}
