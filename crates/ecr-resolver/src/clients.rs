//! Lazily built per-region API clients.
//!
//! ECR endpoints are regional, so the resolver keeps one client per region
//! and builds it the first time the region is referenced. Construction is
//! serialized per region: concurrent first requests for the same region all
//! receive the single client built by whichever request got there first,
//! while other regions proceed independently.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::sync::OnceCell;

use crate::api::{ApiResult, EcrApi};
use crate::error::{ResolverError, Result};

/// Builds an API client bound to one region.
#[async_trait]
pub trait ClientFactory: Send + Sync {
    /// Creates a client for `region`.
    async fn client_for(&self, region: &str) -> ApiResult<Arc<dyn EcrApi>>;
}

type ClientCell = Arc<OnceCell<Arc<dyn EcrApi>>>;

/// Region name to client map, populated on demand.
pub struct ClientRegistry {
    factory: Arc<dyn ClientFactory>,
    clients: Mutex<HashMap<String, ClientCell>>,
}

impl ClientRegistry {
    /// Creates an empty registry backed by `factory`.
    #[must_use]
    pub fn new(factory: Arc<dyn ClientFactory>) -> Self {
        Self {
            factory,
            clients: Mutex::new(HashMap::new()),
        }
    }

    /// Seeds `region` with an existing client.
    ///
    /// Returns false and keeps the current client if the region already has
    /// one or is building one.
    pub fn insert(&self, region: impl Into<String>, client: Arc<dyn EcrApi>) -> bool {
        let cell = Arc::clone(self.clients.lock().entry(region.into()).or_default());
        cell.set(client).is_ok()
    }

    /// Returns the client for `region`, building it on first use.
    ///
    /// # Errors
    ///
    /// Returns [`ResolverError::Remote`] with the factory's error if the
    /// client cannot be built. A failed build is retried on the next call.
    pub async fn client_for(&self, region: &str) -> Result<Arc<dyn EcrApi>> {
        let cell = Arc::clone(self.clients.lock().entry(region.to_string()).or_default());

        let client = cell
            .get_or_try_init(|| async {
                tracing::debug!(region, "Building ECR client");
                self.factory.client_for(region).await
            })
            .await
            .map_err(ResolverError::Remote)?;

        Ok(Arc::clone(client))
    }

    /// Returns the number of regions with a built client.
    #[must_use]
    pub fn len(&self) -> usize {
        self.clients
            .lock()
            .values()
            .filter(|cell| cell.initialized())
            .count()
    }

    /// Returns true if no client has been built yet.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl std::fmt::Debug for ClientRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let regions: Vec<String> = self.clients.lock().keys().cloned().collect();
        f.debug_struct("ClientRegistry")
            .field("regions", &regions)
            .finish_non_exhaustive()
    }
}
