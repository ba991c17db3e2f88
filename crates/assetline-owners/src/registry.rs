//! Registry routing owner types to their owner service client

use anyhow::{Context, Result};
use assetline_core::models::OwnerType;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::traits::OwnerServiceClient;

/// Owner type to client routing table.
///
/// Cloning is cheap and every clone sees the same table. Registration normally
/// happens once at startup; lookups run concurrently afterwards.
#[derive(Clone)]
pub struct OwnerClientRegistry {
    clients: Arc<RwLock<HashMap<OwnerType, Arc<dyn OwnerServiceClient>>>>,
}

impl OwnerClientRegistry {
    pub fn new() -> Self {
        Self {
            clients: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// Route `owner_type` to `client`, replacing any previous route.
    pub async fn register(&self, owner_type: OwnerType, client: Arc<dyn OwnerServiceClient>) {
        tracing::debug!(owner_type = %owner_type, client = client.name(), "Registering owner service");
        let mut clients = self.clients.write().await;
        clients.insert(owner_type, client);
    }

    pub async fn get(&self, owner_type: &OwnerType) -> Result<Arc<dyn OwnerServiceClient>> {
        let clients = self.clients.read().await;

        clients
            .get(owner_type)
            .cloned()
            .with_context(|| format!("No owner service registered for type '{}'", owner_type))
    }

    pub async fn contains(&self, owner_type: &OwnerType) -> bool {
        self.clients.read().await.contains_key(owner_type)
    }

    /// Every registered route, sorted by owner type.
    pub async fn all(&self) -> Vec<(OwnerType, Arc<dyn OwnerServiceClient>)> {
        let clients = self.clients.read().await;
        let mut routes: Vec<_> = clients
            .iter()
            .map(|(owner_type, client)| (owner_type.clone(), client.clone()))
            .collect();
        routes.sort_by(|a, b| a.0.cmp(&b.0));
        routes
    }

    pub async fn len(&self) -> usize {
        self.clients.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.clients.read().await.is_empty()
    }
}

impl Default for OwnerClientRegistry {
    fn default() -> Self {
        Self::new()
    }
}
