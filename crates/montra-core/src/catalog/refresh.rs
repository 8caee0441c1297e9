//! Catalog refresh job
//!
//! Walks every catalog product that has a page URL, loads the page, and
//! records the price the strategy chain finds. A product whose page fails or
//! yields no price is logged and left exactly as stored; one bad page never
//! stops the batch. The browser session is closed on every exit path.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, error, info, warn};

use super::browser::{Browser, BrowserLauncher, BrowserSession};
use super::grid::parse_grid;
use super::strategies::{PriceHit, PriceResolver};
use crate::config::{GridSource, SeedProduct};
use crate::error::{Error, Result};
use crate::models::{now_iso, MarketProduct};
use crate::store::{CatalogStore, ProductUpsert};

/// Cooperative stop signal checked between products
#[derive(Debug, Clone, Default)]
pub struct CancellationFlag(Arc<AtomicBool>);

impl CancellationFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// A product the run could not price
#[derive(Debug, Clone, PartialEq)]
pub struct RefreshMiss {
    pub product_id: String,
    pub reason: String,
}

impl RefreshMiss {
    fn new(product_id: &str, error: &Error) -> Self {
        let reason = match error {
            Error::ScrapeMiss { reason, .. } => reason.clone(),
            other => other.to_string(),
        };
        Self {
            product_id: product_id.to_string(),
            reason,
        }
    }
}

/// Outcome of one refresh run
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RefreshReport {
    /// Products whose price changed
    pub updated: usize,
    /// Products re-scraped at the same price (timestamp still refreshed)
    pub unchanged: usize,
    /// Products without a page URL
    pub skipped: usize,
    pub missed: Vec<RefreshMiss>,
    pub cancelled: bool,
}

impl RefreshReport {
    pub fn attempted(&self) -> usize {
        self.updated + self.unchanged + self.missed.len()
    }
}

/// Outcome of rebuilding the catalog from seeds
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ReseedReport {
    /// Seeds priced from their live page
    pub scraped: usize,
    /// Seeds stored at their configured fallback price
    pub fallback: usize,
}

/// Scrapes product pages and writes fresh prices into the catalog
pub struct CatalogRefreshJob {
    store: Arc<dyn CatalogStore>,
    launcher: Arc<dyn BrowserLauncher>,
    resolver: PriceResolver,
    page_timeout: Duration,
}

impl CatalogRefreshJob {
    pub fn new(
        store: Arc<dyn CatalogStore>,
        launcher: Arc<dyn BrowserLauncher>,
        resolver: PriceResolver,
        page_timeout: Duration,
    ) -> Self {
        Self {
            store,
            launcher,
            resolver,
            page_timeout,
        }
    }

    /// Refresh every product with a page URL
    ///
    /// Fails only when the catalog cannot be read or the browser cannot be
    /// started. Per-product failures are reported in `missed`.
    pub async fn run(&self, cancel: &CancellationFlag) -> Result<RefreshReport> {
        let products = self.store.list_products()?;
        info!(products = products.len(), "Catalog refresh started");

        let browser = BrowserSession::launch(self.launcher.as_ref()).await?;
        let report = self.refresh_all(&*browser, &products, cancel).await;
        browser.close().await;

        info!(
            updated = report.updated,
            unchanged = report.unchanged,
            missed = report.missed.len(),
            cancelled = report.cancelled,
            "Catalog refresh finished"
        );
        Ok(report)
    }

    async fn refresh_all(
        &self,
        browser: &dyn Browser,
        products: &[MarketProduct],
        cancel: &CancellationFlag,
    ) -> RefreshReport {
        let mut report = RefreshReport::default();

        for product in products {
            if cancel.is_cancelled() {
                info!("Catalog refresh cancelled");
                report.cancelled = true;
                break;
            }

            let Some(url) = product.product_url.as_deref() else {
                debug!(product = %product.id, "No product page, skipping");
                report.skipped += 1;
                continue;
            };

            let hit = match self.price_product(browser, &product.id, url).await {
                Ok(hit) => hit,
                Err(e) => {
                    warn!(url, error = %e, "Leaving stored price unchanged");
                    report.missed.push(RefreshMiss::new(&product.id, &e));
                    continue;
                }
            };

            match self.store.record_price(&product.id, hit.price, &now_iso()) {
                Ok(()) => {
                    debug!(
                        product = %product.id,
                        price = hit.price,
                        strategy = hit.strategy.as_str(),
                        "Price recorded"
                    );
                    if hit.price == product.price {
                        report.unchanged += 1;
                    } else {
                        report.updated += 1;
                    }
                }
                Err(e) => {
                    error!(product = %product.id, error = %e, "Failed to record price");
                    report.missed.push(RefreshMiss::new(&product.id, &e));
                }
            }
        }

        report
    }

    /// Price one catalog product; any failure becomes `Error::ScrapeMiss`
    async fn price_product(&self, browser: &dyn Browser, product_id: &str, url: &str) -> Result<PriceHit> {
        let miss = |reason: String| Error::ScrapeMiss {
            product: product_id.to_string(),
            reason,
        };
        match self.scrape(browser, url).await {
            Ok(Some(hit)) => Ok(hit),
            Ok(None) => Err(miss("no price found on page".to_string())),
            Err(e) => Err(miss(e.to_string())),
        }
    }

    /// Load one page and run the strategy chain over it
    async fn scrape(&self, browser: &dyn Browser, url: &str) -> Result<Option<PriceHit>> {
        let markup = self.load(browser, url).await?;
        Ok(self.resolver.resolve(&markup).await)
    }

    /// Open a page, read its markup, and close the page whatever happened
    async fn load(&self, browser: &dyn Browser, url: &str) -> Result<String> {
        let mut page = browser.new_page().await?;
        let loaded = match page.goto(url, self.page_timeout).await {
            Ok(()) => page.content().await,
            Err(e) => Err(e),
        };
        if let Err(e) = page.close().await {
            debug!(url, error = %e, "Failed to close page");
        }
        loaded
    }

    /// Rebuild the whole catalog from seed products
    ///
    /// Each seed is priced from its page when possible and from its configured
    /// price otherwise. The old catalog is replaced in a single write.
    pub async fn reseed(&self, seeds: &[SeedProduct], cancel: &CancellationFlag) -> Result<ReseedReport> {
        let browser = BrowserSession::launch(self.launcher.as_ref()).await?;
        let priced = self.price_seeds(&*browser, seeds, cancel).await;
        browser.close().await;

        let (products, report) = priced?;
        self.store.replace_catalog(&products)?;
        info!(
            products = products.len(),
            scraped = report.scraped,
            fallback = report.fallback,
            "Catalog reseeded"
        );
        Ok(report)
    }

    async fn price_seeds(
        &self,
        browser: &dyn Browser,
        seeds: &[SeedProduct],
        cancel: &CancellationFlag,
    ) -> Result<(Vec<MarketProduct>, ReseedReport)> {
        let mut report = ReseedReport::default();
        let mut products = Vec::with_capacity(seeds.len());

        for seed in seeds {
            if cancel.is_cancelled() {
                return Err(Error::InvalidData("Reseed cancelled".into()));
            }

            let live = match seed.product_url.as_deref() {
                Some(url) => match self.scrape(browser, url).await {
                    Ok(hit) => hit,
                    Err(e) => {
                        warn!(product = %seed.name, url, error = %e, "Seed page failed, using fallback price");
                        None
                    }
                },
                None => None,
            };

            let price = match live {
                Some(hit) => {
                    report.scraped += 1;
                    hit.price
                }
                None => {
                    report.fallback += 1;
                    seed.price
                }
            };
            products.push(seed.to_product(price));
        }

        Ok((products, report))
    }

    /// Import every card on a category listing page in one batch write
    pub async fn import_grid(&self, source: &GridSource) -> Result<usize> {
        let browser = BrowserSession::launch(self.launcher.as_ref()).await?;
        let markup = self.load(&*browser, &source.url).await;
        browser.close().await;

        let cards = parse_grid(&markup?, source, &source.url)?;
        if cards.is_empty() {
            warn!(url = %source.url, "No product cards found on listing page");
            return Ok(0);
        }

        let stamp = now_iso();
        let upserts: Vec<ProductUpsert> = cards
            .iter()
            .map(|card| card.to_upsert(source.category, &stamp))
            .collect();
        let written = self.store.upsert_products(&upserts)?;
        info!(url = %source.url, written, "Listing page imported");
        Ok(written)
    }
}
