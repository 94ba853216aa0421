//! Per-region client cache
//!
//! Sweepers fan out across regions; each region's client is created once and
//! shared. Creation goes through an injected factory so tests can count calls
//! without touching AWS.

use super::context::AwsContext;
use crate::config::SweeperConfig;
use anyhow::Context;
use futures::FutureExt;
use futures::future::BoxFuture;
use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::debug;

type Factory<C> = Arc<dyn Fn(String) -> BoxFuture<'static, anyhow::Result<C>> + Send + Sync>;

/// Lazily created, shared clients keyed by region.
///
/// Initialization is serialized, so the factory runs at most once per region
/// as long as it succeeds. A failed creation is not cached and the next
/// [`get`](RegionalClients::get) tries again.
pub struct RegionalClients<C> {
    factory: Factory<C>,
    clients: Mutex<HashMap<String, Arc<C>>>,
}

impl<C: Send + Sync + 'static> RegionalClients<C> {
    pub fn new<F, Fut>(factory: F) -> Self
    where
        F: Fn(String) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = anyhow::Result<C>> + Send + 'static,
    {
        Self {
            factory: Arc::new(move |region| factory(region).boxed()),
            clients: Mutex::new(HashMap::new()),
        }
    }

    /// Client for `region`, creating it on first use.
    pub async fn get(&self, region: &str) -> anyhow::Result<Arc<C>> {
        let mut clients = self.clients.lock().await;
        if let Some(client) = clients.get(region) {
            return Ok(Arc::clone(client));
        }

        debug!(region, "Creating regional client");
        let client = (self.factory)(region.to_string())
            .await
            .with_context(|| format!("Failed to create client for region {region}"))?;
        let client = Arc::new(client);
        clients.insert(region.to_string(), Arc::clone(&client));
        Ok(client)
    }

    /// Regions with a cached client
    pub async fn regions(&self) -> Vec<String> {
        let mut regions: Vec<_> = self.clients.lock().await.keys().cloned().collect();
        regions.sort();
        regions
    }
}

impl<C> std::fmt::Debug for RegionalClients<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RegionalClients").finish_non_exhaustive()
    }
}

/// Cache of [`AwsContext`]s loaded with `config`.
pub fn aws_regional_clients(config: SweeperConfig) -> RegionalClients<AwsContext> {
    RegionalClients::new(move |region: String| {
        let config = config.clone();
        async move { Ok(AwsContext::new(&region, &config).await) }
    })
}
