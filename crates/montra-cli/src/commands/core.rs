//! Core command implementations and shared utilities
//!
//! This module contains:
//! - `open_db` - Shared utility to open the database
//! - `load_catalog` - Catalog config from a file or the built-in default
//! - `shared_prompts` - Prompt library handle for extractors and the assistant
//! - `cmd_init` - Initialize the database and seed the catalog
//! - `cmd_status` - Show what is configured

use std::path::Path;
use std::sync::{Arc, RwLock};

use anyhow::{Context, Result};
use montra_core::ai::{AIClient, CompletionBackend, ModelKind};
use montra_core::prompts::PromptLibrary;
use montra_core::store::CatalogStore;
use montra_core::{CatalogConfig, Database, Error};

pub fn open_db(db_path: &Path) -> Result<Database> {
    let path_str = db_path
        .to_str()
        .with_context(|| format!("Database path is not valid UTF-8: {}", db_path.display()))?;
    Database::new(path_str).context("Failed to open database")
}

pub fn load_catalog(path: Option<&Path>) -> Result<CatalogConfig> {
    CatalogConfig::load(path).context("Failed to load catalog config")
}

pub fn shared_prompts() -> Arc<RwLock<PromptLibrary>> {
    Arc::new(RwLock::new(PromptLibrary::new()))
}

/// The client, or the error every AI command reports without one
pub fn require_ai(ai: Option<&AIClient>) -> Result<&AIClient> {
    ai.ok_or_else(|| anyhow::Error::msg(Error::AiUnavailable.user_message()))
        .context("Set GROQ_API_KEY (or AI_BACKEND=mock) to enable AI features")
}

pub fn cmd_init(db_path: &Path, config: &CatalogConfig) -> Result<()> {
    println!("🔧 Initializing database at {}...", db_path.display());

    let db = open_db(db_path)?;

    if db.list_products()?.is_empty() {
        let products: Vec<_> = config.products.iter().map(|s| s.to_product(s.price)).collect();
        db.replace_catalog(&products)
            .context("Failed to seed market catalog")?;
        println!("   Seeded {} catalog products", products.len());
    } else {
        println!("   Market catalog already present, left as is");
    }

    println!("✅ Database initialized successfully!");
    println!();
    println!("Next steps:");
    println!("  1. Add an expense: montra parse \"Lunch 1500\" --save");
    println!("  2. Refresh prices: montra catalog refresh");
    println!("  3. Find a phone:   montra discover --budget 45000 --category mobile");

    Ok(())
}

pub async fn cmd_status(db: &Database, ai: Option<&AIClient>) -> Result<()> {
    let products = db.list_products()?;
    let newest = products.iter().map(|p| p.last_updated.as_str()).max();

    println!("📊 Montra Status");
    println!();
    println!("Database:        {}", db.path());
    println!("Catalog:         {} products", products.len());
    if let Some(ts) = newest {
        println!("Last price:      {}", ts);
    }
    println!();

    match ai {
        Some(client) => {
            let healthy = client.health_check().await;
            println!("AI backend:      {}", client.backend_name());
            println!("Host:            {}", client.host());
            println!("Text model:      {}", client.model(ModelKind::Text));
            println!("Vision model:    {}", client.model(ModelKind::Vision));
            println!(
                "Reachable:       {}",
                if healthy { "yes" } else { "no" }
            );
        }
        None => {
            println!("AI backend:      not configured");
            println!("                 Set GROQ_API_KEY to enable note parsing, receipts and chat.");
        }
    }

    Ok(())
}
