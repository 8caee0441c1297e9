//! Price discovery and catalog command implementations

use std::sync::Arc;

use anyhow::{Context, Result};
use montra_core::ai::{AIClient, ProductExtractor};
use montra_core::catalog::{
    start_refresh_scheduler, BrowserLauncher, CancellationFlag, CatalogRefreshJob,
    HttpBrowserLauncher, PriceResolver, RefreshReport, RefreshScheduleConfig,
};
use montra_core::fmt::{currency, DEFAULT_CURRENCY};
use montra_core::models::{CategoryFilter, MarketProduct};
use montra_core::store::CatalogStore;
use montra_core::{CatalogConfig, Database, PriceDiscovery};
use tracing::info;

use super::{shared_prompts, truncate};

/// Build the refresh job, using the model as the last price strategy when available
pub fn build_refresh_job(
    db: &Database,
    ai: Option<&AIClient>,
    config: &CatalogConfig,
    launcher: Arc<dyn BrowserLauncher>,
) -> Result<CatalogRefreshJob> {
    let mut resolver = PriceResolver::from_config(&config.refresh.price_selectors)
        .context("Invalid price selectors in catalog config")?;
    if let Some(client) = ai {
        resolver = resolver.with_ai(ProductExtractor::new(client.clone(), shared_prompts()));
    }
    Ok(CatalogRefreshJob::new(
        Arc::new(db.clone()),
        launcher,
        resolver,
        config.refresh.page_timeout,
    ))
}

fn http_launcher(config: &CatalogConfig) -> Arc<dyn BrowserLauncher> {
    Arc::new(HttpBrowserLauncher::new(&config.refresh.user_agent))
}

fn print_products(products: &[MarketProduct]) {
    for p in products {
        println!(
            "   {:>14}  {:<9} {}",
            currency(p.price as f64, DEFAULT_CURRENCY),
            p.category.as_str(),
            truncate(&p.name, 50)
        );
    }
}

fn parse_category(category: &str) -> Result<CategoryFilter> {
    category.parse().map_err(anyhow::Error::msg)
}

pub async fn cmd_discover(db: &Database, budget: f64, category: &str) -> Result<()> {
    let filter = parse_category(category)?;
    let discovery = PriceDiscovery::new(Arc::new(db.clone()));
    let products = discovery.search(budget, filter).await?;

    println!();
    println!(
        "🛍️  Within {} ({})",
        currency(budget.max(0.0), DEFAULT_CURRENCY),
        filter
    );
    if products.is_empty() {
        println!("   Nothing in the catalog fits this budget.");
        return Ok(());
    }
    print_products(&products);
    Ok(())
}

/// Print the affordable list and reprint it whenever catalog prices change
pub async fn cmd_discover_watch(
    db: &Database,
    ai: Option<&AIClient>,
    config: &CatalogConfig,
    budget: f64,
    category: &str,
    refresh_every_hours: Option<u64>,
) -> Result<()> {
    let filter = parse_category(category)?;
    let discovery = PriceDiscovery::new(Arc::new(db.clone()));
    let mut subscription = discovery.discover(budget, filter).await?;

    let cancel = CancellationFlag::new();
    let scheduler = match refresh_every_hours {
        Some(hours) if hours > 0 => {
            let job = build_refresh_job(db, ai, config, http_launcher(config))?;
            let schedule = RefreshScheduleConfig {
                interval_hours: hours,
                run_on_start: true,
            };
            Some(start_refresh_scheduler(Arc::new(job), schedule, cancel.clone()))
        }
        _ => None,
    };

    println!("🛍️  Watching {} within {} (Ctrl-C to stop)", filter, currency(budget.max(0.0), DEFAULT_CURRENCY));
    print_products(&subscription.current());

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => break,
            update = subscription.changed() => match update {
                Some(products) => {
                    println!();
                    println!("🔄 Prices changed: {} products fit", products.len());
                    print_products(&products);
                }
                None => break,
            },
        }
    }

    subscription.unsubscribe();
    cancel.cancel();
    if let Some(handle) = scheduler {
        handle.abort();
    }
    Ok(())
}

pub fn cmd_catalog_list(db: &Database) -> Result<()> {
    let products = db.list_products()?;
    if products.is_empty() {
        println!("The catalog is empty. Seed it with: montra catalog reseed");
        return Ok(());
    }

    println!();
    println!("🏷️  Market Catalog ({} products)", products.len());
    println!("   ─────────────────────────────────────────────────────────────");
    for p in &products {
        println!(
            "   {:>14}  {:<9} {:<40} {}",
            currency(p.price as f64, DEFAULT_CURRENCY),
            p.category.as_str(),
            truncate(&p.name, 40),
            p.last_updated
        );
    }
    Ok(())
}

fn print_report(report: &RefreshReport) {
    println!(
        "✅ {} updated, {} unchanged, {} missed, {} without a page",
        report.updated,
        report.unchanged,
        report.missed.len(),
        report.skipped
    );
    for miss in &report.missed {
        println!("   ⚠️  {}: {}", miss.product_id, miss.reason);
    }
    if report.cancelled {
        println!("   (stopped early)");
    }
}

pub async fn cmd_catalog_refresh(
    db: &Database,
    ai: Option<&AIClient>,
    config: &CatalogConfig,
) -> Result<()> {
    cmd_catalog_refresh_with(db, ai, config, http_launcher(config)).await
}

pub async fn cmd_catalog_refresh_with(
    db: &Database,
    ai: Option<&AIClient>,
    config: &CatalogConfig,
    launcher: Arc<dyn BrowserLauncher>,
) -> Result<()> {
    let job = build_refresh_job(db, ai, config, launcher)?;
    println!("🔄 Refreshing catalog prices...");

    let cancel = CancellationFlag::new();
    let stopper = cancel.clone();
    let ctrl_c = tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Stopping after the current product");
            stopper.cancel();
        }
    });

    let report = job.run(&cancel).await;
    ctrl_c.abort();
    print_report(&report.context("Catalog refresh failed")?);
    Ok(())
}

pub async fn cmd_catalog_reseed(
    db: &Database,
    ai: Option<&AIClient>,
    config: &CatalogConfig,
    from_grid: bool,
) -> Result<()> {
    cmd_catalog_reseed_with(db, ai, config, from_grid, http_launcher(config)).await
}

pub async fn cmd_catalog_reseed_with(
    db: &Database,
    ai: Option<&AIClient>,
    config: &CatalogConfig,
    from_grid: bool,
    launcher: Arc<dyn BrowserLauncher>,
) -> Result<()> {
    let job = build_refresh_job(db, ai, config, launcher)?;

    if from_grid {
        if config.grid.is_empty() {
            anyhow::bail!("No [[grid]] listing pages configured in the catalog");
        }
        let mut total = 0;
        for source in &config.grid {
            println!("📥 Importing {}...", source.url);
            match job.import_grid(source).await {
                Ok(written) => {
                    println!("   {} products", written);
                    total += written;
                }
                Err(e) => println!("   ⚠️  {}", e),
            }
        }
        println!("✅ Imported {} products", total);
        return Ok(());
    }

    println!("🌱 Reseeding {} products...", config.products.len());
    let report = job
        .reseed(&config.products, &CancellationFlag::new())
        .await
        .context("Catalog reseed failed")?;
    println!(
        "✅ {} priced live, {} at their configured price",
        report.scraped, report.fallback
    );
    Ok(())
}

pub async fn cmd_catalog_schedule(
    db: &Database,
    ai: Option<&AIClient>,
    config: &CatalogConfig,
    every_hours: u64,
    now: bool,
) -> Result<()> {
    if every_hours == 0 {
        anyhow::bail!("--every-hours must be at least 1");
    }
    let job = build_refresh_job(db, ai, config, http_launcher(config))?;
    let cancel = CancellationFlag::new();
    let schedule = RefreshScheduleConfig {
        interval_hours: every_hours,
        run_on_start: now,
    };

    let handle = start_refresh_scheduler(Arc::new(job), schedule, cancel.clone());
    println!("⏰ Refreshing every {} hours (Ctrl-C to stop)", every_hours);

    tokio::signal::ctrl_c()
        .await
        .context("Failed to listen for Ctrl-C")?;
    cancel.cancel();
    handle.abort();
    println!("Stopped.");
    Ok(())
}
