//! Price extraction strategies
//!
//! Each strategy is a pure function from page markup to an optional price.
//! [`PriceResolver`] tries them in a fixed order (metadata tag, CSS text,
//! then the model when one is configured) and stops at the first hit.

use std::sync::OnceLock;

use regex::Regex;
use scraper::{Html, Selector};
use tracing::debug;

use crate::ai::{Extractor as _, ProductExtractor};
use crate::error::{Error, Result};

/// Structured price metadata, most specific first
const META_PRICE_SELECTORS: &[&str] = &[
    r#"meta[property="product:price:amount"]"#,
    r#"meta[property="og:price:amount"]"#,
    r#"meta[itemprop="price"]"#,
];

/// Which strategy produced a price
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PriceStrategy {
    MetaTag,
    CssSelector,
    Ai,
}

impl PriceStrategy {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::MetaTag => "meta_tag",
            Self::CssSelector => "css_selector",
            Self::Ai => "ai",
        }
    }
}

/// A positive whole-unit price and where it came from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PriceHit {
    pub price: i64,
    pub strategy: PriceStrategy,
}

fn price_token_regex() -> &'static Regex {
    static TOKEN: OnceLock<Regex> = OnceLock::new();
    TOKEN.get_or_init(|| Regex::new(r"\d[\d,]*").expect("valid price regex"))
}

/// First price-looking number in display text ("Rs. 44,999" -> 44999)
pub fn parse_price_text(text: &str) -> Option<i64> {
    let token = price_token_regex().find(text)?;
    let digits: String = token.as_str().chars().filter(|c| c.is_ascii_digit()).collect();
    digits.parse::<i64>().ok().filter(|p| *p > 0)
}

/// Price from a metadata `content` value; fractional units are dropped
pub fn parse_meta_content(content: &str) -> Option<i64> {
    let whole = content.trim().split('.').next().unwrap_or_default();
    let digits: String = whole.chars().filter(|c| c.is_ascii_digit()).collect();
    digits.parse::<i64>().ok().filter(|p| *p > 0)
}

/// Strategy A: structured price metadata
pub fn meta_tag_price(markup: &str) -> Option<i64> {
    meta_tag_price_in(&Html::parse_document(markup))
}

fn meta_tag_price_in(document: &Html) -> Option<i64> {
    META_PRICE_SELECTORS.iter().find_map(|raw| {
        let selector = Selector::parse(raw).ok()?;
        document
            .select(&selector)
            .filter_map(|el| el.value().attr("content"))
            .find_map(parse_meta_content)
    })
}

/// Strategy B: text of the site's price node
pub fn css_text_price(markup: &str, selectors: &[Selector]) -> Option<i64> {
    css_text_price_in(&Html::parse_document(markup), selectors)
}

fn css_text_price_in(document: &Html, selectors: &[Selector]) -> Option<i64> {
    selectors.iter().find_map(|selector| {
        document.select(selector).find_map(|el| {
            let text = el.text().collect::<Vec<_>>().join(" ");
            parse_price_text(&text)
        })
    })
}

/// Compile CSS selectors from configuration
pub fn compile_selectors(raw: &[String]) -> Result<Vec<Selector>> {
    raw.iter()
        .map(|s| {
            Selector::parse(s)
                .map_err(|e| Error::Config(format!("Invalid CSS selector {:?}: {:?}", s, e)))
        })
        .collect()
}

/// Ordered strategy list
#[derive(Clone)]
pub struct PriceResolver {
    selectors: Vec<Selector>,
    ai: Option<ProductExtractor>,
}

impl PriceResolver {
    pub fn new(selectors: Vec<Selector>) -> Self {
        Self {
            selectors,
            ai: None,
        }
    }

    pub fn from_config(raw_selectors: &[String]) -> Result<Self> {
        Ok(Self::new(compile_selectors(raw_selectors)?))
    }

    /// Use the product extractor as the last strategy
    pub fn with_ai(mut self, extractor: ProductExtractor) -> Self {
        self.ai = Some(extractor);
        self
    }

    pub fn has_ai(&self) -> bool {
        self.ai.is_some()
    }

    /// Try each strategy in order; `None` when none yields a positive price
    pub async fn resolve(&self, markup: &str) -> Option<PriceHit> {
        if let Some(hit) = self.resolve_static(markup) {
            return Some(hit);
        }

        let extractor = self.ai.as_ref()?;
        match extractor.extract(markup).await {
            Ok(candidate) => candidate
                .price
                .filter(|p| p.is_finite() && *p >= 1.0)
                .map(|p| PriceHit {
                    price: p.trunc() as i64,
                    strategy: PriceStrategy::Ai,
                }),
            Err(e) => {
                debug!(error = %e, "AI price strategy failed");
                None
            }
        }
    }

    /// The markup-only strategies
    pub fn resolve_static(&self, markup: &str) -> Option<PriceHit> {
        // The parsed document is not Send, so it never lives across an await
        let document = Html::parse_document(markup);
        if let Some(price) = meta_tag_price_in(&document) {
            return Some(PriceHit {
                price,
                strategy: PriceStrategy::MetaTag,
            });
        }
        css_text_price_in(&document, &self.selectors).map(|price| PriceHit {
            price,
            strategy: PriceStrategy::CssSelector,
        })
    }
}
