//! HTTP media platform client
//!
//! Endpoints (relative to the configured base URL, bearer-authenticated):
//!
//! - `POST   /uploads`               mint a direct-upload URL
//! - `DELETE /assets/{id}`           delete a remote asset
//! - `GET    /assets?folder=&cursor=` page through a folder

use std::fmt::{Debug, Formatter, Result as FmtResult};
use std::time::Duration;

use anyhow::Context;
use assetline_core::models::ResourceType;
use async_trait::async_trait;
use reqwest::{Client, Response, StatusCode};
use serde::Deserialize;

use crate::signature::WebhookSigner;
use crate::traits::{
    MediaPlatform, PlatformError, PlatformResult, RemoteAsset, UploadCredential,
    UploadCredentialRequest,
};

const REQUEST_TIMEOUT_SECS: u64 = 30;
/// Hard stop for folder listing so a misbehaving cursor cannot loop forever.
const MAX_LIST_PAGES: usize = 1000;

#[derive(Debug, Deserialize)]
struct Envelope<T> {
    data: T,
}

#[derive(Debug, Deserialize)]
struct UploadResponse {
    id: String,
    url: String,
    #[serde(default)]
    asset_id: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ListResponse {
    data: Vec<RemoteAsset>,
    #[serde(default)]
    next_cursor: Option<String>,
}

pub struct HttpMediaPlatform {
    base_url: String,
    api_key: String,
    signer: WebhookSigner,
    http_client: Client,
}

impl Debug for HttpMediaPlatform {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        f.debug_struct("HttpMediaPlatform")
            .field("base_url", &self.base_url)
            .finish_non_exhaustive()
    }
}

impl HttpMediaPlatform {
    pub fn new(
        base_url: impl Into<String>,
        api_key: impl Into<String>,
        webhook_secret: impl AsRef<[u8]>,
    ) -> anyhow::Result<Self> {
        let http_client = Client::builder()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()
            .context("Failed to create HTTP client for media platform")?;

        Ok(Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key: api_key.into(),
            signer: WebhookSigner::new(webhook_secret),
            http_client,
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    async fn error_from(response: Response) -> PlatformError {
        let status = response.status();
        let message = response
            .text()
            .await
            .unwrap_or_else(|_| "Unknown error".to_string());
        match status {
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => PlatformError::Unauthorized,
            _ => PlatformError::Rejected {
                status: status.as_u16(),
                message,
            },
        }
    }
}

#[async_trait]
impl MediaPlatform for HttpMediaPlatform {
    #[tracing::instrument(skip(self, request), fields(asset_id = %request.passthrough, resource_type = %request.resource_type))]
    async fn issue_upload_credential(
        &self,
        request: &UploadCredentialRequest,
    ) -> PlatformResult<UploadCredential> {
        let response = self
            .http_client
            .post(self.url("/uploads"))
            .bearer_auth(&self.api_key)
            .json(request)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(Self::error_from(response).await);
        }

        let body: Envelope<UploadResponse> = response.json().await?;
        tracing::debug!(external_upload_id = %body.data.id, "Upload credential issued");
        Ok(UploadCredential {
            upload_url: body.data.url,
            external_upload_id: body.data.id,
            external_asset_id: body.data.asset_id,
        })
    }

    #[tracing::instrument(skip(self))]
    async fn delete_remote_asset(
        &self,
        external_id: &str,
        resource_type: ResourceType,
    ) -> PlatformResult<()> {
        if external_id.trim().is_empty() {
            return Err(PlatformError::ConfigError(
                "cannot delete a remote asset without an id".to_string(),
            ));
        }

        let response = self
            .http_client
            .delete(self.url(&format!("/assets/{}", external_id)))
            .query(&[("resource_type", resource_type.as_str())])
            .bearer_auth(&self.api_key)
            .send()
            .await?;

        match response.status() {
            status if status.is_success() => Ok(()),
            StatusCode::NOT_FOUND => {
                tracing::debug!(external_id, "Remote asset already gone");
                Ok(())
            }
            _ => Err(Self::error_from(response).await),
        }
    }

    fn verify_signature(
        &self,
        payload: &[u8],
        signature: &str,
        timestamp: &str,
        validity_window: Duration,
    ) -> bool {
        self.signer
            .verify(payload, signature, timestamp, validity_window)
    }

    #[tracing::instrument(skip(self))]
    async fn list_assets_in_folder(&self, folder: &str) -> PlatformResult<Vec<RemoteAsset>> {
        let mut assets = Vec::new();
        let mut cursor: Option<String> = None;

        for _ in 0..MAX_LIST_PAGES {
            let mut query = vec![("folder", folder.to_string())];
            if let Some(c) = &cursor {
                query.push(("cursor", c.clone()));
            }

            let response = self
                .http_client
                .get(self.url("/assets"))
                .query(&query)
                .bearer_auth(&self.api_key)
                .send()
                .await?;
            if !response.status().is_success() {
                return Err(Self::error_from(response).await);
            }

            let page: ListResponse = response.json().await?;
            assets.extend(page.data);
            match page.next_cursor.filter(|c| !c.is_empty()) {
                Some(next) => cursor = Some(next),
                None => return Ok(assets),
            }
        }

        Err(PlatformError::InvalidResponse(format!(
            "folder listing did not finish after {} pages",
            MAX_LIST_PAGES
        )))
    }

    fn name(&self) -> &str {
        "http"
    }
}
