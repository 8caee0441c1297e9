//! Price discovery: what can I buy with this budget?
//!
//! A discovery is a live view. The initial result is computed up front, then a
//! background task re-runs the query whenever the catalog revision moves and
//! publishes the full, freshly sorted result. Dropping or unsubscribing the
//! handle stops the task.

use std::sync::Arc;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::error::{Error, Result};
use crate::models::{CategoryFilter, MarketProduct};
use crate::store::{CatalogStore, ProductQuery};

/// Runs budget/category lookups against a catalog
#[derive(Clone)]
pub struct PriceDiscovery {
    store: Arc<dyn CatalogStore>,
}

impl PriceDiscovery {
    pub fn new(store: Arc<dyn CatalogStore>) -> Self {
        Self { store }
    }

    /// Translate a budget into a query; `None` means nothing can match
    pub fn query_for(budget: f64, category: CategoryFilter) -> Option<ProductQuery> {
        if budget.is_nan() || budget <= 0.0 {
            return None;
        }
        // Prices are whole units, so anything up to floor(budget) fits
        let max_price = budget.floor() as i64;
        if max_price <= 0 {
            return None;
        }
        Some(ProductQuery {
            max_price,
            category,
        })
    }

    /// One-shot lookup, most expensive affordable item first
    pub async fn search(&self, budget: f64, category: CategoryFilter) -> Result<Vec<MarketProduct>> {
        match Self::query_for(budget, category) {
            Some(query) => run_query(self.store.clone(), query).await,
            None => Ok(Vec::new()),
        }
    }

    /// Subscribe to the products affordable under `budget`
    ///
    /// A budget of zero or less yields an empty, already-finished subscription
    /// without touching the store.
    pub async fn discover(
        &self,
        budget: f64,
        category: CategoryFilter,
    ) -> Result<DiscoverySubscription> {
        let Some(query) = Self::query_for(budget, category) else {
            debug!(budget, "Non-positive budget, nothing to discover");
            return Ok(DiscoverySubscription::empty());
        };

        // Subscribe before the first read so no write can slip in between
        let mut revisions = self.store.watch();
        revisions.borrow_and_update();

        let initial = run_query(self.store.clone(), query).await?;
        let (tx, rx) = watch::channel(initial);

        let store = self.store.clone();
        let task = tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = tx.closed() => break,
                    changed = revisions.changed() => {
                        if changed.is_err() {
                            break;
                        }
                        revisions.borrow_and_update();
                        match run_query(store.clone(), query).await {
                            Ok(products) => {
                                if tx.send(products).is_err() {
                                    break;
                                }
                            }
                            Err(e) => warn!(error = %e, "Price discovery refresh failed"),
                        }
                    }
                }
            }
            debug!(max_price = query.max_price, category = %query.category, "Discovery stopped");
        });

        Ok(DiscoverySubscription {
            rx,
            task: Some(task),
        })
    }
}

async fn run_query(store: Arc<dyn CatalogStore>, query: ProductQuery) -> Result<Vec<MarketProduct>> {
    tokio::task::spawn_blocking(move || store.query_products(&query))
        .await
        .map_err(|e| Error::InvalidData(format!("Catalog query task failed: {}", e)))?
}

/// Handle to a live discovery result
pub struct DiscoverySubscription {
    rx: watch::Receiver<Vec<MarketProduct>>,
    task: Option<JoinHandle<()>>,
}

impl DiscoverySubscription {
    fn empty() -> Self {
        let (_, rx) = watch::channel(Vec::new());
        Self { rx, task: None }
    }

    /// Latest delivered result
    pub fn current(&self) -> Vec<MarketProduct> {
        self.rx.borrow().clone()
    }

    /// Wait for the next result; `None` once no more updates can arrive
    pub async fn changed(&mut self) -> Option<Vec<MarketProduct>> {
        self.rx.changed().await.ok()?;
        Some(self.rx.borrow_and_update().clone())
    }

    /// Whether updates are still being delivered
    pub fn is_live(&self) -> bool {
        self.task.as_ref().is_some_and(|t| !t.is_finished())
    }

    /// Stop receiving updates
    pub fn unsubscribe(mut self) {
        self.stop();
    }

    fn stop(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}

impl Drop for DiscoverySubscription {
    fn drop(&mut self) {
        self.stop();
    }
}

/// A discovery whose budget and category can change over time
///
/// Changing the parameters tears down the previous subscription before the
/// new one starts, so results for old parameters are never delivered after
/// the change.
pub struct DiscoveryFeed {
    discovery: PriceDiscovery,
    current: Option<DiscoverySubscription>,
}

impl DiscoveryFeed {
    pub fn new(discovery: PriceDiscovery) -> Self {
        Self {
            discovery,
            current: None,
        }
    }

    /// Switch to new parameters and return the initial result for them
    pub async fn set_params(
        &mut self,
        budget: f64,
        category: CategoryFilter,
    ) -> Result<Vec<MarketProduct>> {
        if let Some(old) = self.current.take() {
            old.unsubscribe();
        }
        let subscription = self.discovery.discover(budget, category).await?;
        let initial = subscription.current();
        self.current = Some(subscription);
        Ok(initial)
    }

    /// Next update for the current parameters
    pub async fn next(&mut self) -> Option<Vec<MarketProduct>> {
        self.current.as_mut()?.changed().await
    }

    pub fn close(&mut self) {
        self.current = None;
    }
}
