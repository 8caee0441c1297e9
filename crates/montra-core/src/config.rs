//! Runtime configuration
//!
//! AI settings come from the environment (the API key is a secret injected at
//! process start). The market catalog is a TOML file with a two-layer
//! resolution: an explicit path if given, otherwise the embedded default.

use std::fs;
use std::path::Path;
use std::time::Duration;

use serde::Deserialize;

use crate::error::{Error, Result};
use crate::models::{MarketProduct, ProductCategory};

/// Embedded default catalog (compiled into binary)
const DEFAULT_CATALOG: &str = include_str!("../../../config/catalog.toml");

pub const DEFAULT_AI_HOST: &str = "https://api.groq.com/openai";
pub const DEFAULT_TEXT_MODEL: &str = "llama-3.3-70b-versatile";
pub const DEFAULT_VISION_MODEL: &str = "llama-3.2-11b-vision-preview";
const DEFAULT_AI_TIMEOUT_SECS: u64 = 60;
const DEFAULT_PAGE_TIMEOUT_SECS: u64 = 45;
const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (Linux; Android 10; K) AppleWebKit/537.36 \
     (KHTML, like Gecko) Chrome/114.0.0.0 Mobile Safari/537.36";

/// Settings for the hosted completion endpoint
#[derive(Debug, Clone, PartialEq)]
pub struct AiSettings {
    pub api_key: String,
    pub host: String,
    pub text_model: String,
    pub vision_model: String,
    pub timeout: Duration,
}

impl AiSettings {
    /// Settings with defaults for everything but the key
    pub fn new(api_key: &str) -> Self {
        Self {
            api_key: api_key.to_string(),
            host: DEFAULT_AI_HOST.to_string(),
            text_model: DEFAULT_TEXT_MODEL.to_string(),
            vision_model: DEFAULT_VISION_MODEL.to_string(),
            timeout: Duration::from_secs(DEFAULT_AI_TIMEOUT_SECS),
        }
    }

    /// Read settings from the environment
    ///
    /// Required: `GROQ_API_KEY` or `MONTRA_AI_API_KEY`
    /// Optional: `MONTRA_AI_HOST`, `MONTRA_TEXT_MODEL`, `MONTRA_VISION_MODEL`,
    /// `MONTRA_AI_TIMEOUT_SECS`
    ///
    /// Returns None without a key.
    pub fn from_env() -> Option<Self> {
        let api_key = non_empty_env("GROQ_API_KEY").or_else(|| non_empty_env("MONTRA_AI_API_KEY"))?;
        let mut settings = Self::new(&api_key);

        if let Some(host) = non_empty_env("MONTRA_AI_HOST") {
            settings.host = host;
        }
        if let Some(model) = non_empty_env("MONTRA_TEXT_MODEL") {
            settings.text_model = model;
        }
        if let Some(model) = non_empty_env("MONTRA_VISION_MODEL") {
            settings.vision_model = model;
        }
        if let Some(secs) = non_empty_env("MONTRA_AI_TIMEOUT_SECS") {
            match secs.parse::<u64>() {
                Ok(secs) if secs > 0 => settings.timeout = Duration::from_secs(secs),
                _ => tracing::warn!(value = %secs, "Ignoring invalid MONTRA_AI_TIMEOUT_SECS"),
            }
        }

        Some(settings)
    }
}

fn non_empty_env(name: &str) -> Option<String> {
    std::env::var(name)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// Settings for fetching product pages
#[derive(Debug, Clone, PartialEq)]
pub struct RefreshSettings {
    pub page_timeout: Duration,
    pub user_agent: String,
    /// CSS selectors for the price text node, tried in order
    pub price_selectors: Vec<String>,
}

impl Default for RefreshSettings {
    fn default() -> Self {
        Self {
            page_timeout: Duration::from_secs(DEFAULT_PAGE_TIMEOUT_SECS),
            user_agent: DEFAULT_USER_AGENT.to_string(),
            price_selectors: vec![
                ".summary-price".to_string(),
                ".price-box".to_string(),
                ".price".to_string(),
            ],
        }
    }
}

/// A product the catalog is bootstrapped with
#[derive(Debug, Clone, PartialEq)]
pub struct SeedProduct {
    pub name: String,
    /// Fallback price when the product page yields nothing
    pub price: i64,
    pub category: ProductCategory,
    pub product_url: Option<String>,
    pub image_url: Option<String>,
}

impl SeedProduct {
    /// Catalog entry carrying the given price
    pub fn to_product(&self, price: i64) -> MarketProduct {
        let mut product = MarketProduct::new(&self.name, price, self.category);
        product.product_url = self.product_url.clone();
        product.image_url = self.image_url.clone();
        product
    }
}

/// A category listing page to import products from
#[derive(Debug, Clone, PartialEq)]
pub struct GridSource {
    pub url: String,
    pub category: ProductCategory,
    pub card_selector: String,
    pub name_selector: String,
    pub price_selector: String,
    pub link_selector: String,
}

/// Market catalog configuration
#[derive(Debug, Clone, PartialEq, Default)]
pub struct CatalogConfig {
    pub refresh: RefreshSettings,
    pub products: Vec<SeedProduct>,
    pub grid: Vec<GridSource>,
}

impl CatalogConfig {
    /// The catalog compiled into the binary
    pub fn embedded() -> Result<Self> {
        Self::parse(DEFAULT_CATALOG)
    }

    /// Load from a file, or the embedded default when no path is given
    pub fn load(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(path) => {
                let content = fs::read_to_string(path).map_err(|e| {
                    Error::Config(format!("Failed to read {}: {}", path.display(), e))
                })?;
                Self::parse(&content)
            }
            None => Self::embedded(),
        }
    }

    /// Parse catalog TOML
    pub fn parse(content: &str) -> Result<Self> {
        let raw: RawCatalog = toml::from_str(content)
            .map_err(|e| Error::Config(format!("Invalid catalog TOML: {}", e)))?;

        let mut config = CatalogConfig::default();

        if let Some(refresh) = raw.refresh {
            if let Some(secs) = refresh.page_timeout_secs {
                config.refresh.page_timeout = Duration::from_secs(secs);
            }
            if let Some(agent) = refresh.user_agent {
                config.refresh.user_agent = agent;
            }
            if let Some(selectors) = refresh.price_selectors {
                config.refresh.price_selectors = selectors;
            }
        }

        for product in raw.products {
            if product.price <= 0 {
                return Err(Error::Config(format!(
                    "Seed product {} must have a positive price",
                    product.name
                )));
            }
            config.products.push(SeedProduct {
                category: parse_category(&product.category)?,
                name: product.name,
                price: product.price,
                product_url: product.product_url,
                image_url: product.image_url,
            });
        }

        for grid in raw.grid {
            config.grid.push(GridSource {
                category: parse_category(&grid.category)?,
                url: grid.url,
                card_selector: grid
                    .card_selector
                    .unwrap_or_else(|| ".productBox, .product-item, [data-product-id]".into()),
                name_selector: grid
                    .name_selector
                    .unwrap_or_else(|| ".p-title, .product-name, h3".into()),
                price_selector: grid
                    .price_selector
                    .unwrap_or_else(|| ".price-box, .price, .summary-price".into()),
                link_selector: grid.link_selector.unwrap_or_else(|| "a".into()),
            });
        }

        Ok(config)
    }
}

fn parse_category(value: &str) -> Result<ProductCategory> {
    value.parse().map_err(Error::Config)
}

#[derive(Debug, Deserialize)]
struct RawCatalog {
    refresh: Option<RawRefresh>,
    #[serde(default)]
    products: Vec<RawProduct>,
    #[serde(default)]
    grid: Vec<RawGrid>,
}

#[derive(Debug, Deserialize)]
struct RawRefresh {
    page_timeout_secs: Option<u64>,
    user_agent: Option<String>,
    price_selectors: Option<Vec<String>>,
}

#[derive(Debug, Deserialize)]
struct RawProduct {
    name: String,
    price: i64,
    category: String,
    product_url: Option<String>,
    image_url: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RawGrid {
    url: String,
    category: String,
    card_selector: Option<String>,
    name_selector: Option<String>,
    price_selector: Option<String>,
    link_selector: Option<String>,
}
