use std::sync::Arc;

use assetline_core::Config;

use crate::{HttpOwnerServiceClient, OwnerClientRegistry};

/// Build the owner routing table from `OWNER_SERVICES`.
pub async fn create_owner_registry(config: &Config) -> anyhow::Result<OwnerClientRegistry> {
    let registry = OwnerClientRegistry::new();

    for endpoint in &config.owner_services {
        let client = HttpOwnerServiceClient::new(
            endpoint.owner_type.clone(),
            endpoint.base_url.clone(),
            config.owner_service_timeout(),
        )?;
        registry
            .register(endpoint.owner_type.clone(), Arc::new(client))
            .await;
        tracing::info!(
            owner_type = %endpoint.owner_type,
            base_url = %endpoint.base_url,
            "Owner service configured"
        );
    }

    if registry.is_empty().await {
        tracing::warn!("No owner services configured; owner changes will fail reconciliation");
    }

    Ok(registry)
}
