//! Domain models for Montra

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Placeholder image used when a product page has no usable image
pub const PLACEHOLDER_IMAGE: &str = "https://placehold.co/400";

/// Number of transactions included in a financial snapshot
pub const SNAPSHOT_RECENT_LIMIT: usize = 10;

/// Direction of a ledger entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum TransactionType {
    Income,
    #[default]
    Expense,
}

impl TransactionType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Income => "income",
            Self::Expense => "expense",
        }
    }
}

impl std::str::FromStr for TransactionType {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "income" => Ok(Self::Income),
            "expense" => Ok(Self::Expense),
            _ => Err(format!("Unknown transaction type: {}", s)),
        }
    }
}

impl std::fmt::Display for TransactionType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A transaction extracted from free text, after validation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParsedTransaction {
    pub title: String,
    pub amount: f64,
    #[serde(rename = "type")]
    pub kind: TransactionType,
}

/// A receipt extracted from a photo, after validation
///
/// `date` is whatever the model read off the receipt; it is not parsed here.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParsedReceipt {
    pub title: String,
    pub amount: f64,
    pub date: Option<String>,
    #[serde(rename = "type")]
    pub kind: TransactionType,
}

/// A product extracted from a page's HTML, after validation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParsedProduct {
    pub name: String,
    pub price: f64,
    pub image: String,
}

/// A stored ledger entry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transaction {
    pub id: i64,
    pub uid: String,
    pub title: String,
    pub amount: f64,
    #[serde(rename = "type")]
    pub kind: TransactionType,
    pub category: Option<String>,
    pub date: DateTime<Utc>,
}

/// A validated ledger entry ready to insert
#[derive(Debug, Clone, PartialEq)]
pub struct NewTransaction {
    pub uid: String,
    pub title: String,
    pub amount: f64,
    pub kind: TransactionType,
    pub category: Option<String>,
    pub date: DateTime<Utc>,
}

/// A savings goal seeded from a product
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SavingsGoal {
    pub id: i64,
    pub uid: String,
    pub name: String,
    pub price: f64,
    pub image: String,
    pub target_amount: f64,
    pub saved_amount: f64,
    pub created_at: DateTime<Utc>,
}

/// A savings goal ready to insert
#[derive(Debug, Clone, PartialEq)]
pub struct NewSavingsGoal {
    pub uid: String,
    pub name: String,
    pub price: f64,
    pub image: String,
    pub target_amount: f64,
    pub saved_amount: f64,
    pub created_at: DateTime<Utc>,
}

impl NewSavingsGoal {
    /// Seed a goal from an extracted product: target is the price, nothing saved yet
    pub fn from_product(uid: &str, product: &ParsedProduct) -> Self {
        Self {
            uid: uid.to_string(),
            name: product.name.clone(),
            price: product.price,
            image: product.image.clone(),
            target_amount: product.price,
            saved_amount: 0.0,
            created_at: Utc::now(),
        }
    }
}

/// Market product categories
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ProductCategory {
    Mobile,
    Laptop,
    Audio,
    Tablet,
    Wearable,
    Accessory,
}

impl ProductCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Mobile => "Mobile",
            Self::Laptop => "Laptop",
            Self::Audio => "Audio",
            Self::Tablet => "Tablet",
            Self::Wearable => "Wearable",
            Self::Accessory => "Accessory",
        }
    }

    pub fn all() -> &'static [ProductCategory] {
        &[
            Self::Mobile,
            Self::Laptop,
            Self::Audio,
            Self::Tablet,
            Self::Wearable,
            Self::Accessory,
        ]
    }
}

impl std::str::FromStr for ProductCategory {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "mobile" | "mobiles" | "phone" => Ok(Self::Mobile),
            "laptop" | "laptops" => Ok(Self::Laptop),
            "audio" | "earbuds" | "wireless-earbuds" => Ok(Self::Audio),
            "tablet" | "tablets" => Ok(Self::Tablet),
            "wearable" | "wearables" | "smart-watches" => Ok(Self::Wearable),
            "accessory" | "accessories" => Ok(Self::Accessory),
            _ => Err(format!("Unknown product category: {}", s)),
        }
    }
}

impl std::fmt::Display for ProductCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Category predicate for price discovery; `All` omits the predicate
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CategoryFilter {
    #[default]
    All,
    Only(ProductCategory),
}

impl CategoryFilter {
    pub fn matches(&self, category: ProductCategory) -> bool {
        match self {
            Self::All => true,
            Self::Only(c) => *c == category,
        }
    }
}

impl std::str::FromStr for CategoryFilter {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        if s.trim().eq_ignore_ascii_case("all") {
            Ok(Self::All)
        } else {
            s.parse().map(Self::Only)
        }
    }
}

impl std::fmt::Display for CategoryFilter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::All => write!(f, "All"),
            Self::Only(c) => write!(f, "{}", c),
        }
    }
}

/// A catalog entry whose price is kept current by the refresh job
///
/// `price` is whole currency units and is never zero for a stored product.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MarketProduct {
    pub id: String,
    pub name: String,
    pub price: i64,
    pub category: ProductCategory,
    pub image_url: Option<String>,
    pub product_url: Option<String>,
    pub last_updated: String,
}

impl MarketProduct {
    /// Build a product with a slug id and a fresh timestamp
    pub fn new(name: &str, price: i64, category: ProductCategory) -> Self {
        Self {
            id: product_slug(name),
            name: name.to_string(),
            price,
            category,
            image_url: None,
            product_url: None,
            last_updated: now_iso(),
        }
    }
}

/// Canonical catalog id derived from a product name ("iPhone 15 Pro" -> "iphone-15-pro")
///
/// Letters and digits of any script are kept and `+` becomes "plus". A name
/// with neither yields an empty id, which the catalog refuses to store.
pub fn product_slug(name: &str) -> String {
    let mut slug = String::with_capacity(name.len());
    for c in name.trim().to_lowercase().chars() {
        if c.is_alphanumeric() {
            slug.push(c);
            continue;
        }
        if !slug.is_empty() && !slug.ends_with('-') {
            slug.push('-');
        }
        if c == '+' {
            slug.push_str("plus-");
        }
    }
    slug.trim_matches('-').to_string()
}

/// Current time as an RFC 3339 / ISO-8601 string
pub fn now_iso() -> String {
    Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Millis, true)
}

/// Who wrote a chat message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Sender {
    User,
    Ai,
}

/// One message in an assistant conversation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub id: String,
    pub text: String,
    pub sender: Sender,
    pub timestamp: DateTime<Utc>,
}

/// Balance and most recent transactions, derived from the full ledger
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FinancialSnapshot {
    pub balance: f64,
    pub recent_transactions: Vec<Transaction>,
}

impl FinancialSnapshot {
    /// Project a snapshot from every transaction a user has
    pub fn from_transactions(transactions: &[Transaction]) -> Self {
        let balance = transactions.iter().fold(0.0, |acc, tx| match tx.kind {
            TransactionType::Income => acc + tx.amount,
            TransactionType::Expense => acc - tx.amount,
        });

        let mut recent = transactions.to_vec();
        recent.sort_by(|a, b| b.date.cmp(&a.date));
        recent.truncate(SNAPSHOT_RECENT_LIMIT);

        Self {
            balance,
            recent_transactions: recent,
        }
    }
}
