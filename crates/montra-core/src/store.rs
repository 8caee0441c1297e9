//! Market catalog storage seam
//!
//! The price discovery filter and the refresh job only talk to the catalog
//! through [`CatalogStore`]. SQLite ([`crate::db::Database`]) is the real
//! implementation; [`MemoryCatalog`] backs tests.
//!
//! Every committed write bumps a revision on a watch channel. Subscribers
//! re-query on a bump, so each delivery is a full, consistent result set.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::RwLock;

use tokio::sync::watch;

use crate::error::{Error, Result};
use crate::models::{CategoryFilter, MarketProduct, ProductCategory};

/// Budget and category predicate for a catalog lookup
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProductQuery {
    /// Inclusive price ceiling in whole currency units
    pub max_price: i64,
    pub category: CategoryFilter,
}

/// A merge write: optional fields left `None` keep their stored value
#[derive(Debug, Clone, PartialEq)]
pub struct ProductUpsert {
    pub id: String,
    pub name: String,
    pub price: i64,
    pub category: ProductCategory,
    pub image_url: Option<String>,
    pub product_url: Option<String>,
    pub last_updated: String,
}

impl From<&MarketProduct> for ProductUpsert {
    fn from(p: &MarketProduct) -> Self {
        Self {
            id: p.id.clone(),
            name: p.name.clone(),
            price: p.price,
            category: p.category,
            image_url: p.image_url.clone(),
            product_url: p.product_url.clone(),
            last_updated: p.last_updated.clone(),
        }
    }
}

/// Storage operations the catalog features depend on
pub trait CatalogStore: Send + Sync {
    /// Products at or under the ceiling, most expensive first
    fn query_products(&self, query: &ProductQuery) -> Result<Vec<MarketProduct>>;

    /// Every product, most expensive first
    fn list_products(&self) -> Result<Vec<MarketProduct>>;

    fn get_product(&self, id: &str) -> Result<Option<MarketProduct>>;

    /// Merge-insert products in one batch; returns the number written
    fn upsert_products(&self, products: &[ProductUpsert]) -> Result<usize>;

    /// Set price and lastUpdated only, leaving every other field as stored
    fn record_price(&self, id: &str, price: i64, last_updated: &str) -> Result<()>;

    /// Delete everything and insert `products`, visible as one change
    fn replace_catalog(&self, products: &[MarketProduct]) -> Result<()>;

    /// Revision counter bumped after every committed write
    fn watch(&self) -> watch::Receiver<u64>;
}

/// Filter and order products the way `query_products` must
pub fn apply_query(products: impl IntoIterator<Item = MarketProduct>, query: &ProductQuery) -> Vec<MarketProduct> {
    let mut matched: Vec<MarketProduct> = products
        .into_iter()
        .filter(|p| p.price <= query.max_price && query.category.matches(p.category))
        .collect();
    sort_by_price_desc(&mut matched);
    matched
}

pub(crate) fn sort_by_price_desc(products: &mut [MarketProduct]) {
    products.sort_by(|a, b| b.price.cmp(&a.price).then_with(|| a.id.cmp(&b.id)));
}

pub(crate) fn check_product(id: &str, price: i64) -> Result<()> {
    if id.trim().is_empty() {
        return Err(Error::InvalidData(format!(
            "Refusing to store a product with an empty id (price {})",
            price
        )));
    }
    if price <= 0 {
        return Err(Error::InvalidData(format!(
            "Refusing to store non-positive price {} for {}",
            price, id
        )));
    }
    Ok(())
}

/// In-memory catalog
pub struct MemoryCatalog {
    products: RwLock<BTreeMap<String, MarketProduct>>,
    changes: watch::Sender<u64>,
    queries: AtomicUsize,
}

impl Default for MemoryCatalog {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryCatalog {
    pub fn new() -> Self {
        let (changes, _) = watch::channel(0);
        Self {
            products: RwLock::new(BTreeMap::new()),
            changes,
            queries: AtomicUsize::new(0),
        }
    }

    pub fn with_products(products: Vec<MarketProduct>) -> Self {
        let catalog = Self::new();
        if let Ok(mut map) = catalog.products.write() {
            for p in products {
                map.insert(p.id.clone(), p);
            }
        }
        catalog
    }

    /// Number of `query_products` calls served
    pub fn query_count(&self) -> usize {
        self.queries.load(Ordering::SeqCst)
    }

    fn bump(&self) {
        self.changes.send_modify(|rev| *rev += 1);
    }

    fn lock_err() -> Error {
        Error::InvalidData("Catalog lock poisoned".into())
    }
}

impl CatalogStore for MemoryCatalog {
    fn query_products(&self, query: &ProductQuery) -> Result<Vec<MarketProduct>> {
        self.queries.fetch_add(1, Ordering::SeqCst);
        let map = self.products.read().map_err(|_| Self::lock_err())?;
        Ok(apply_query(map.values().cloned(), query))
    }

    fn list_products(&self) -> Result<Vec<MarketProduct>> {
        let map = self.products.read().map_err(|_| Self::lock_err())?;
        let mut all: Vec<MarketProduct> = map.values().cloned().collect();
        sort_by_price_desc(&mut all);
        Ok(all)
    }

    fn get_product(&self, id: &str) -> Result<Option<MarketProduct>> {
        let map = self.products.read().map_err(|_| Self::lock_err())?;
        Ok(map.get(id).cloned())
    }

    fn upsert_products(&self, products: &[ProductUpsert]) -> Result<usize> {
        for p in products {
            check_product(&p.id, p.price)?;
        }
        {
            let mut map = self.products.write().map_err(|_| Self::lock_err())?;
            for p in products {
                let existing = map.get(&p.id);
                let merged = MarketProduct {
                    id: p.id.clone(),
                    name: p.name.clone(),
                    price: p.price,
                    category: p.category,
                    image_url: p
                        .image_url
                        .clone()
                        .or_else(|| existing.and_then(|e| e.image_url.clone())),
                    product_url: p
                        .product_url
                        .clone()
                        .or_else(|| existing.and_then(|e| e.product_url.clone())),
                    last_updated: p.last_updated.clone(),
                };
                map.insert(p.id.clone(), merged);
            }
        }
        if !products.is_empty() {
            self.bump();
        }
        Ok(products.len())
    }

    fn record_price(&self, id: &str, price: i64, last_updated: &str) -> Result<()> {
        check_product(id, price)?;
        {
            let mut map = self.products.write().map_err(|_| Self::lock_err())?;
            let product = map
                .get_mut(id)
                .ok_or_else(|| Error::NotFound(format!("product {}", id)))?;
            product.price = price;
            product.last_updated = last_updated.to_string();
        }
        self.bump();
        Ok(())
    }

    fn replace_catalog(&self, products: &[MarketProduct]) -> Result<()> {
        for p in products {
            check_product(&p.id, p.price)?;
        }
        {
            let mut map = self.products.write().map_err(|_| Self::lock_err())?;
            map.clear();
            for p in products {
                map.insert(p.id.clone(), p.clone());
            }
        }
        self.bump();
        Ok(())
    }

    fn watch(&self) -> watch::Receiver<u64> {
        self.changes.subscribe()
    }
}
