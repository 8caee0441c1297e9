//! Category listing page import
//!
//! A listing page shows many product cards. Each card with a readable name
//! and a positive price becomes a catalog entry keyed by its name slug.

use reqwest::Url;
use scraper::{ElementRef, Html, Selector};
use tracing::debug;

use super::strategies::parse_price_text;
use crate::config::GridSource;
use crate::error::{Error, Result};
use crate::models::{product_slug, ProductCategory};
use crate::store::ProductUpsert;

/// One product card read from a listing page
#[derive(Debug, Clone, PartialEq)]
pub struct GridCard {
    pub name: String,
    pub price: i64,
    pub product_url: Option<String>,
    pub image_url: Option<String>,
}

impl GridCard {
    pub fn id(&self) -> String {
        product_slug(&self.name)
    }

    pub fn to_upsert(&self, category: ProductCategory, last_updated: &str) -> ProductUpsert {
        ProductUpsert {
            id: self.id(),
            name: self.name.clone(),
            price: self.price,
            category,
            image_url: self.image_url.clone(),
            product_url: self.product_url.clone(),
            last_updated: last_updated.to_string(),
        }
    }
}

struct GridSelectors {
    card: Selector,
    name: Selector,
    price: Selector,
    link: Selector,
    image: Selector,
}

impl GridSelectors {
    fn compile(source: &GridSource) -> Result<Self> {
        Ok(Self {
            card: selector(&source.card_selector)?,
            name: selector(&source.name_selector)?,
            price: selector(&source.price_selector)?,
            link: selector(&source.link_selector)?,
            image: selector("img")?,
        })
    }
}

fn selector(raw: &str) -> Result<Selector> {
    Selector::parse(raw).map_err(|e| Error::Config(format!("Invalid CSS selector {:?}: {:?}", raw, e)))
}

fn text_of(el: ElementRef<'_>) -> String {
    el.text()
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}

fn absolute(base: Option<&Url>, href: &str) -> Option<String> {
    let href = href.trim();
    if href.is_empty() || href.starts_with("data:") {
        return None;
    }
    match base {
        Some(base) => base.join(href).ok().map(|u| u.to_string()),
        None => Url::parse(href).ok().map(|u| u.to_string()),
    }
}

/// Read product cards from listing markup
///
/// Cards without a usable name or without a positive price are skipped. Relative
/// links and images resolve against `page_url`. Lazy-loaded images are read
/// from `data-src` when `src` is a placeholder.
pub fn parse_grid(markup: &str, source: &GridSource, page_url: &str) -> Result<Vec<GridCard>> {
    let selectors = GridSelectors::compile(source)?;
    let base = Url::parse(page_url).ok();
    let document = Html::parse_document(markup);

    let mut cards = Vec::new();
    for card in document.select(&selectors.card) {
        let Some(name) = card.select(&selectors.name).map(text_of).find(|n| !n.is_empty()) else {
            continue;
        };
        if product_slug(&name).is_empty() {
            debug!(name = %name, "Card name has no letters or digits, skipping");
            continue;
        }
        let Some(price) = card
            .select(&selectors.price)
            .find_map(|el| parse_price_text(&text_of(el)))
        else {
            continue;
        };

        let product_url = card
            .select(&selectors.link)
            .find_map(|a| a.value().attr("href"))
            .or_else(|| card.value().attr("href"))
            .and_then(|href| absolute(base.as_ref(), href));

        let image_url = card.select(&selectors.image).find_map(|img| {
            let value = img.value();
            value
                .attr("data-src")
                .and_then(|src| absolute(base.as_ref(), src))
                .or_else(|| value.attr("src").and_then(|src| absolute(base.as_ref(), src)))
        });

        cards.push(GridCard {
            name,
            price,
            product_url,
            image_url,
        });
    }

    // A listing can repeat a product; keep the first card per id
    let mut seen = std::collections::HashSet::new();
    cards.retain(|c| seen.insert(c.id()));
    Ok(cards)
}
