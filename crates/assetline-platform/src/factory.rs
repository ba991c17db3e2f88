use std::sync::Arc;

use assetline_core::Config;

use crate::{HttpMediaPlatform, MediaPlatform, PlatformError, PlatformResult};

/// Create the media platform adapter based on configuration
pub fn create_platform(config: &Config) -> PlatformResult<Arc<dyn MediaPlatform>> {
    let platform = &config.platform;

    if !(platform.api_url.starts_with("http://") || platform.api_url.starts_with("https://")) {
        return Err(PlatformError::ConfigError(
            "PLATFORM_API_URL must be an http(s) URL".to_string(),
        ));
    }
    if platform.api_key.trim().is_empty() {
        return Err(PlatformError::ConfigError(
            "PLATFORM_API_KEY not configured".to_string(),
        ));
    }

    let client = HttpMediaPlatform::new(
        platform.api_url.clone(),
        platform.api_key.clone(),
        platform.webhook_secret.as_bytes(),
    )
    .map_err(|e| PlatformError::ConfigError(e.to_string()))?;

    tracing::info!(base_url = %platform.api_url, "Media platform adapter configured");
    Ok(Arc::new(client))
}
