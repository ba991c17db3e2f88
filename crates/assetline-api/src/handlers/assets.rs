//! Admin asset endpoints

use std::str::FromStr;
use std::sync::Arc;

use assetline_core::models::{
    AssetFilter, AssetScope, AssetStatus, BeginUploadRequest, ListAssetsRequest, OrderField,
    ResourceType, SortDirection,
};
use assetline_core::AppError;
use axum::{
    extract::{rejection::QueryRejection, Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use serde::Deserialize;
use uuid::Uuid;

use super::actor::Actor;
use crate::error::{HttpAppError, ValidatedJson};
use crate::state::AppState;

#[tracing::instrument(skip(state, request), fields(actor_id = %actor.id))]
pub async fn begin_upload(
    actor: Actor,
    State(state): State<Arc<AppState>>,
    ValidatedJson(mut request): ValidatedJson<BeginUploadRequest>,
) -> Result<impl IntoResponse, HttpAppError> {
    request.audit = actor.audit();
    let response = state.lifecycle.begin_upload(request).await?;
    Ok((StatusCode::CREATED, Json(response)))
}

#[tracing::instrument(skip(state))]
pub async fn get_asset(
    Path(id): Path<Uuid>,
    State(state): State<Arc<AppState>>,
) -> Result<impl IntoResponse, HttpAppError> {
    Ok(Json(state.lifecycle.get_asset(id).await?))
}

/// Query string of `GET /assets`. `status` takes a comma-separated list.
#[derive(Debug, Default, Deserialize)]
pub struct ListAssetsQuery {
    pub scope: Option<String>,
    pub status: Option<String>,
    pub resource_type: Option<String>,
    pub created_by: Option<String>,
    pub order_by: Option<String>,
    pub direction: Option<String>,
    pub page_size: Option<u32>,
    pub page_token: Option<String>,
}

fn parse_opt<T: FromStr<Err = AppError>>(raw: Option<&str>) -> Result<Option<T>, AppError> {
    raw.map(str::trim)
        .filter(|s| !s.is_empty())
        .map(T::from_str)
        .transpose()
}

impl TryFrom<ListAssetsQuery> for ListAssetsRequest {
    type Error = AppError;

    fn try_from(query: ListAssetsQuery) -> Result<Self, Self::Error> {
        let statuses = query
            .status
            .as_deref()
            .unwrap_or_default()
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(AssetStatus::from_str)
            .collect::<Result<Vec<_>, _>>()?;

        Ok(ListAssetsRequest {
            scope: parse_opt::<AssetScope>(query.scope.as_deref())?.unwrap_or_default(),
            filter: AssetFilter {
                statuses,
                resource_type: parse_opt::<ResourceType>(query.resource_type.as_deref())?,
                created_by: query.created_by.filter(|c| !c.trim().is_empty()),
            },
            order_by: parse_opt::<OrderField>(query.order_by.as_deref())?.unwrap_or_default(),
            direction: parse_opt::<SortDirection>(query.direction.as_deref())?
                .unwrap_or_default(),
            page_size: query.page_size,
            page_token: query.page_token,
        })
    }
}

#[tracing::instrument(skip(state, query))]
pub async fn list_assets(
    State(state): State<Arc<AppState>>,
    query: Result<Query<ListAssetsQuery>, QueryRejection>,
) -> Result<impl IntoResponse, HttpAppError> {
    let Query(query) = query?;
    let request = ListAssetsRequest::try_from(query)?;
    Ok(Json(state.lifecycle.list_assets(request).await?))
}

#[tracing::instrument(skip(state), fields(actor_id = %actor.id))]
pub async fn archive_asset(
    actor: Actor,
    Path(id): Path<Uuid>,
    State(state): State<Arc<AppState>>,
) -> Result<impl IntoResponse, HttpAppError> {
    Ok(Json(state.lifecycle.archive(id, actor.audit()).await?))
}

#[tracing::instrument(skip(state), fields(actor_id = %actor.id))]
pub async fn mark_broken(
    actor: Actor,
    Path(id): Path<Uuid>,
    State(state): State<Arc<AppState>>,
) -> Result<impl IntoResponse, HttpAppError> {
    let audit = actor.audit().with_note("marked broken by an administrator");
    Ok(Json(state.lifecycle.mark_as_broken(id, audit).await?))
}

#[tracing::instrument(skip(state), fields(actor_id = %actor.id))]
pub async fn restore_asset(
    actor: Actor,
    Path(id): Path<Uuid>,
    State(state): State<Arc<AppState>>,
) -> Result<impl IntoResponse, HttpAppError> {
    Ok(Json(state.lifecycle.restore(id, actor.audit()).await?))
}

#[tracing::instrument(skip(state), fields(actor_id = %actor.id))]
pub async fn delete_asset(
    actor: Actor,
    Path(id): Path<Uuid>,
    State(state): State<Arc<AppState>>,
) -> Result<impl IntoResponse, HttpAppError> {
    state
        .lifecycle
        .permanently_delete(id, actor.audit())
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

#[derive(Debug, Deserialize)]
pub struct TitleBody {
    pub title: Option<String>,
}

#[tracing::instrument(skip(state, body), fields(actor_id = %actor.id))]
pub async fn update_title(
    actor: Actor,
    Path(id): Path<Uuid>,
    State(state): State<Arc<AppState>>,
    ValidatedJson(body): ValidatedJson<TitleBody>,
) -> Result<impl IntoResponse, HttpAppError> {
    Ok(Json(
        state
            .lifecycle
            .update_title(id, body.title, actor.audit())
            .await?,
    ))
}

/// Run one sweep now instead of waiting for the next tick.
#[tracing::instrument(skip(state), fields(actor_id = %actor.id))]
pub async fn run_cleanup(
    actor: Actor,
    State(state): State<Arc<AppState>>,
) -> Result<impl IntoResponse, HttpAppError> {
    let cleanup = state.cleanup.as_ref().ok_or_else(|| {
        AppError::Conflict("cleanup service is not configured".to_string())
    })?;
    let report = cleanup.run_once().await;
    tracing::info!(
        actor_id = %actor.id,
        broken_archived = report.broken_archived,
        orphans_found = report.orphans_found.len(),
        "Manual cleanup finished"
    );
    Ok(Json(report))
}
