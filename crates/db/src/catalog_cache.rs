use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::RwLock;

use mercabot_core::Product;

use crate::repositories::{ProductRepository, RepositoryError};

/// TTL read cache over the sellable product listing. Administrative writes
/// invalidate it so catalog edits are visible on the next turn.
pub struct CatalogCache {
    repository: Arc<dyn ProductRepository>,
    ttl: Duration,
    state: RwLock<Option<CachedListing>>,
}

struct CachedListing {
    fetched_at: Instant,
    products: Arc<Vec<Product>>,
}

impl CatalogCache {
    pub fn new(repository: Arc<dyn ProductRepository>, ttl: Duration) -> Self {
        Self { repository, ttl, state: RwLock::new(None) }
    }

    pub async fn sellable(&self) -> Result<Arc<Vec<Product>>, RepositoryError> {
        {
            let state = self.state.read().await;
            if let Some(cached) = state.as_ref() {
                if cached.fetched_at.elapsed() < self.ttl {
                    return Ok(Arc::clone(&cached.products));
                }
            }
        }

        let products = Arc::new(self.repository.list_sellable().await?);
        let mut state = self.state.write().await;
        *state = Some(CachedListing { fetched_at: Instant::now(), products: Arc::clone(&products) });
        Ok(products)
    }

    pub async fn invalidate(&self) {
        let mut state = self.state.write().await;
        *state = None;
    }
}
