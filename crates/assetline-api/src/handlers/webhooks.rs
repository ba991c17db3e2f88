//! Inbound platform webhooks

use std::sync::Arc;

use axum::{
    body::Bytes,
    extract::State,
    http::{HeaderMap, StatusCode},
    response::IntoResponse,
    Json,
};
use serde::Serialize;

use crate::constants::{PLATFORM_SIGNATURE_HEADER, PLATFORM_TIMESTAMP_HEADER};
use crate::error::HttpAppError;
use crate::state::AppState;

#[derive(Debug, Serialize)]
pub struct WebhookAck {
    pub received: bool,
    pub ignored: bool,
}

/// The body is taken raw: the signature covers the exact bytes sent.
#[tracing::instrument(skip(state, headers, body), fields(body_len = body.len()))]
pub async fn platform_webhook(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<impl IntoResponse, HttpAppError> {
    let header = |name: &str| headers.get(name).and_then(|v| v.to_str().ok());

    let outcome = state
        .webhooks
        .handle(
            &body,
            header(PLATFORM_SIGNATURE_HEADER),
            header(PLATFORM_TIMESTAMP_HEADER),
        )
        .await?;

    tracing::info!(
        event_id = %outcome.event_id,
        event_type = %outcome.event_type,
        stage = ?outcome.stage,
        assets = outcome.asset_ids.len(),
        "Webhook processed"
    );

    Ok((
        StatusCode::OK,
        Json(WebhookAck {
            received: true,
            ignored: outcome.ignored,
        }),
    ))
}
