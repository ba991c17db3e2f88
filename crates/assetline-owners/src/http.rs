//! HTTP owner service client
//!
//! Endpoints (relative to the owner service base URL):
//!
//! - `POST   /associations/batch`         add many owners of one type
//! - `POST   /associations/batch-delete`  remove many owners of one type
//! - `POST   /associations`               add one owner
//! - `DELETE /associations`               remove one owner (query parameters)
//! - `POST   /associations/force-delete`  drop everything held for some assets
//!
//! Failures answer with `{"code": "...", "message": "..."}`; when the body has no
//! code the HTTP status decides.

use std::fmt::{Debug, Formatter, Result as FmtResult};
use std::time::Duration;

use anyhow::Context;
use assetline_core::models::{AssetRef, OwnerType};
use async_trait::async_trait;
use reqwest::{Client, Response};
use serde::{Deserialize, Serialize};

use crate::traits::{OwnerServiceClient, OwnerServiceError, OwnerServiceResult, RemoteStatusCode};

#[derive(Debug, Serialize)]
struct BatchRequest<'a> {
    asset_id: String,
    resource_type: &'a str,
    owner_type: &'a str,
    owner_ids: &'a [String],
}

#[derive(Debug, Serialize)]
struct SingleRequest<'a> {
    asset_id: String,
    resource_type: &'a str,
    owner_type: &'a str,
    owner_id: &'a str,
}

#[derive(Debug, Serialize)]
struct ForceDeleteRequest<'a> {
    assets: &'a [AssetRef],
}

#[derive(Debug, Deserialize)]
struct AffectedResponse {
    #[serde(default)]
    affected: u64,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    code: Option<RemoteStatusCode>,
    message: Option<String>,
}

pub struct HttpOwnerServiceClient {
    owner_type: OwnerType,
    base_url: String,
    http_client: Client,
}

impl Debug for HttpOwnerServiceClient {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        f.debug_struct("HttpOwnerServiceClient")
            .field("owner_type", &self.owner_type)
            .field("base_url", &self.base_url)
            .finish_non_exhaustive()
    }
}

impl HttpOwnerServiceClient {
    pub fn new(
        owner_type: OwnerType,
        base_url: impl Into<String>,
        timeout: Duration,
    ) -> anyhow::Result<Self> {
        let http_client = Client::builder()
            .timeout(timeout)
            .build()
            .context("Failed to create HTTP client for owner service")?;

        Ok(Self {
            owner_type,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            http_client,
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    fn transport_error(&self, err: reqwest::Error) -> OwnerServiceError {
        OwnerServiceError::unavailable(self.owner_type.as_str(), err.to_string())
    }

    async fn error_from(&self, response: Response) -> OwnerServiceError {
        let status = response.status();
        let text = response
            .text()
            .await
            .unwrap_or_else(|_| "Unknown error".to_string());

        let (code, message) = match serde_json::from_str::<ErrorBody>(&text) {
            Ok(body) => (
                body.code
                    .unwrap_or_else(|| RemoteStatusCode::from_http_status(status.as_u16())),
                body.message.unwrap_or(text),
            ),
            Err(_) => (RemoteStatusCode::from_http_status(status.as_u16()), text),
        };
        OwnerServiceError::new(
            self.owner_type.as_str(),
            code,
            format!("HTTP {}: {}", status.as_u16(), message),
        )
    }

    async fn post_for_count<T: Serialize + ?Sized>(
        &self,
        path: &str,
        body: &T,
    ) -> OwnerServiceResult<u64> {
        let response = self
            .http_client
            .post(self.url(path))
            .json(body)
            .send()
            .await
            .map_err(|e| self.transport_error(e))?;

        if !response.status().is_success() {
            return Err(self.error_from(response).await);
        }

        let body: AffectedResponse = response.json().await.map_err(|e| {
            OwnerServiceError::new(
                self.owner_type.as_str(),
                RemoteStatusCode::Internal,
                format!("unexpected response: {}", e),
            )
        })?;
        Ok(body.affected)
    }
}

#[async_trait]
impl OwnerServiceClient for HttpOwnerServiceClient {
    #[tracing::instrument(skip(self, owner_ids), fields(asset_id = %asset.asset_id, owner_type = %owner_type, count = owner_ids.len()))]
    async fn add_batch(
        &self,
        asset: &AssetRef,
        owner_ids: &[String],
        owner_type: &OwnerType,
    ) -> OwnerServiceResult<u64> {
        self.post_for_count(
            "/associations/batch",
            &BatchRequest {
                asset_id: asset.asset_id.to_string(),
                resource_type: asset.resource_type.as_str(),
                owner_type: owner_type.as_str(),
                owner_ids,
            },
        )
        .await
    }

    #[tracing::instrument(skip(self, owner_ids), fields(asset_id = %asset.asset_id, owner_type = %owner_type, count = owner_ids.len()))]
    async fn delete_batch(
        &self,
        asset: &AssetRef,
        owner_ids: &[String],
        owner_type: &OwnerType,
    ) -> OwnerServiceResult<u64> {
        self.post_for_count(
            "/associations/batch-delete",
            &BatchRequest {
                asset_id: asset.asset_id.to_string(),
                resource_type: asset.resource_type.as_str(),
                owner_type: owner_type.as_str(),
                owner_ids,
            },
        )
        .await
    }

    #[tracing::instrument(skip(self), fields(asset_id = %asset.asset_id, owner_type = %owner_type))]
    async fn add(
        &self,
        asset: &AssetRef,
        owner_id: &str,
        owner_type: &OwnerType,
    ) -> OwnerServiceResult<()> {
        let response = self
            .http_client
            .post(self.url("/associations"))
            .json(&SingleRequest {
                asset_id: asset.asset_id.to_string(),
                resource_type: asset.resource_type.as_str(),
                owner_type: owner_type.as_str(),
                owner_id,
            })
            .send()
            .await
            .map_err(|e| self.transport_error(e))?;

        if !response.status().is_success() {
            return Err(self.error_from(response).await);
        }
        Ok(())
    }

    #[tracing::instrument(skip(self), fields(asset_id = %asset.asset_id, owner_type = %owner_type))]
    async fn delete(
        &self,
        asset: &AssetRef,
        owner_id: &str,
        owner_type: &OwnerType,
    ) -> OwnerServiceResult<()> {
        let asset_id = asset.asset_id.to_string();
        let response = self
            .http_client
            .delete(self.url("/associations"))
            .query(&[
                ("asset_id", asset_id.as_str()),
                ("owner_type", owner_type.as_str()),
                ("owner_id", owner_id),
            ])
            .send()
            .await
            .map_err(|e| self.transport_error(e))?;

        if !response.status().is_success() {
            return Err(self.error_from(response).await);
        }
        Ok(())
    }

    #[tracing::instrument(skip(self, assets), fields(count = assets.len()))]
    async fn force_delete_batch(&self, assets: &[AssetRef]) -> OwnerServiceResult<u64> {
        if assets.is_empty() {
            return Ok(0);
        }
        self.post_for_count("/associations/force-delete", &ForceDeleteRequest { assets })
            .await
    }

    fn name(&self) -> &str {
        self.owner_type.as_str()
    }
}
