//! Owner set endpoints. Each write is reconciled with the owner services
//! before the response is sent.

use std::collections::BTreeSet;
use std::sync::Arc;

use assetline_core::models::Owner;
use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use serde::Deserialize;
use uuid::Uuid;

use super::actor::Actor;
use crate::error::{HttpAppError, ValidatedJson};
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct SetOwnersBody {
    pub owners: Vec<Owner>,
}

#[tracing::instrument(skip(state, body), fields(actor_id = %actor.id))]
pub async fn set_owners(
    actor: Actor,
    Path(id): Path<Uuid>,
    State(state): State<Arc<AppState>>,
    ValidatedJson(body): ValidatedJson<SetOwnersBody>,
) -> Result<impl IntoResponse, HttpAppError> {
    let owners: BTreeSet<Owner> = body.owners.into_iter().collect();
    let metadata = state
        .lifecycle
        .set_owners(id, owners, actor.audit())
        .await?;
    Ok(Json(metadata))
}

#[tracing::instrument(skip(state), fields(actor_id = %actor.id))]
pub async fn add_owner(
    actor: Actor,
    Path(id): Path<Uuid>,
    State(state): State<Arc<AppState>>,
    ValidatedJson(owner): ValidatedJson<Owner>,
) -> Result<impl IntoResponse, HttpAppError> {
    let metadata = state.lifecycle.add_owner(id, owner, actor.audit()).await?;
    Ok((StatusCode::CREATED, Json(metadata)))
}

#[tracing::instrument(skip(state), fields(actor_id = %actor.id))]
pub async fn remove_owner(
    actor: Actor,
    Path((id, owner_type, owner_id)): Path<(Uuid, String, String)>,
    State(state): State<Arc<AppState>>,
) -> Result<impl IntoResponse, HttpAppError> {
    let owner = Owner::parse(&owner_type, &owner_id)?;
    let metadata = state
        .lifecycle
        .remove_owner(id, owner, actor.audit())
        .await?;
    Ok(Json(metadata))
}

#[tracing::instrument(skip(state), fields(actor_id = %actor.id))]
pub async fn resync_owners(
    actor: Actor,
    Path(id): Path<Uuid>,
    State(state): State<Arc<AppState>>,
) -> Result<impl IntoResponse, HttpAppError> {
    Ok(Json(state.lifecycle.resync_owners(id).await?))
}
