//! Route configuration and setup

use std::sync::Arc;

use assetline_core::Config;
use axum::{
    http::{HeaderValue, Method},
    routing::{delete, get, post, put},
    Router,
};
use tower_http::cors::{Any, CorsLayer};
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::trace::TraceLayer;

use crate::constants::{API_PREFIX, MAX_BODY_BYTES};
use crate::handlers;
use crate::state::AppState;

/// Routes plus CORS, tracing and the body limit.
pub fn setup_routes(config: &Config, state: AppState) -> Result<Router, anyhow::Error> {
    let cors = setup_cors(config);

    Ok(router(state)
        .layer(RequestBodyLimitLayer::new(MAX_BODY_BYTES))
        .layer(cors)
        .layer(TraceLayer::new_for_http()))
}

/// Bare application routes, also used by the router tests.
pub fn router(state: AppState) -> Router {
    let assets = Router::new()
        .route(
            "/",
            post(handlers::assets::begin_upload).get(handlers::assets::list_assets),
        )
        .route(
            "/{id}",
            get(handlers::assets::get_asset).delete(handlers::assets::delete_asset),
        )
        .route("/{id}/archive", post(handlers::assets::archive_asset))
        .route("/{id}/mark-broken", post(handlers::assets::mark_broken))
        .route("/{id}/restore", post(handlers::assets::restore_asset))
        .route("/{id}/title", put(handlers::assets::update_title))
        .route(
            "/{id}/owners",
            put(handlers::owners::set_owners).post(handlers::owners::add_owner),
        )
        .route("/{id}/owners/resync", post(handlers::owners::resync_owners))
        .route(
            "/{id}/owners/{owner_type}/{owner_id}",
            delete(handlers::owners::remove_owner),
        );

    Router::new()
        .route("/health", get(handlers::health::health_check))
        .nest(&format!("{}/assets", API_PREFIX), assets)
        .route(
            &format!("{}/webhooks/platform", API_PREFIX),
            post(handlers::webhooks::platform_webhook),
        )
        .route(
            &format!("{}/maintenance/cleanup", API_PREFIX),
            post(handlers::assets::run_cleanup),
        )
        .with_state(Arc::new(state))
}

fn setup_cors(config: &Config) -> CorsLayer {
    let methods = [
        Method::GET,
        Method::POST,
        Method::PUT,
        Method::DELETE,
        Method::OPTIONS,
    ];
    if config.cors_origins().iter().any(|o| o == "*") {
        tracing::warn!("CORS configured to allow all origins - not recommended for production");
        CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(methods)
            .allow_headers(Any)
    } else {
        let origins: Vec<HeaderValue> = config
            .cors_origins()
            .iter()
            .filter_map(|o| match o.parse() {
                Ok(origin) => Some(origin),
                Err(_) => {
                    tracing::warn!(origin = %o, "Ignoring invalid CORS origin");
                    None
                }
            })
            .collect();
        CorsLayer::new()
            .allow_origin(origins)
            .allow_methods(methods)
            .allow_headers(Any)
    }
}
