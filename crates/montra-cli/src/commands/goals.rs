//! Savings goal command implementations

use anyhow::{Context, Result};
use montra_core::ai::{AIClient, ProductExtractor};
use montra_core::catalog::{fetch_markup, BrowserLauncher, HttpBrowserLauncher};
use montra_core::fmt::{currency, DEFAULT_CURRENCY};
use montra_core::models::NewSavingsGoal;
use montra_core::{CatalogConfig, Database};

use super::{require_ai, shared_prompts, truncate};

/// Create a savings goal from a product page
pub async fn cmd_goal_add(
    db: &Database,
    uid: &str,
    ai: Option<&AIClient>,
    config: &CatalogConfig,
    url: &str,
) -> Result<()> {
    let launcher = HttpBrowserLauncher::new(&config.refresh.user_agent);
    cmd_goal_add_with(db, uid, ai, &launcher, config, url).await
}

pub async fn cmd_goal_add_with(
    db: &Database,
    uid: &str,
    ai: Option<&AIClient>,
    launcher: &dyn BrowserLauncher,
    config: &CatalogConfig,
    url: &str,
) -> Result<()> {
    let client = require_ai(ai)?;
    if !(url.starts_with("http://") || url.starts_with("https://")) {
        anyhow::bail!("Not a web address: {}", url);
    }

    println!("🔗 Fetching {}...", truncate(url, 70));
    let markup = fetch_markup(launcher, url, config.refresh.page_timeout)
        .await
        .with_context(|| format!("Failed to load {}", url))?;

    let extractor = ProductExtractor::new(client.clone(), shared_prompts());
    let product = extractor.parse(&markup).await.map_err(|e| {
        let message = e.user_message();
        anyhow::Error::new(e).context(message)
    })?;

    let goal = NewSavingsGoal::from_product(uid, &product);
    let id = db
        .insert_savings_goal(&goal)
        .context("Failed to save savings goal")?;

    println!("🎯 Goal #{}: {}", id, goal.name);
    println!("   Target: {}", currency(goal.target_amount, DEFAULT_CURRENCY));
    println!("   Image:  {}", goal.image);
    Ok(())
}

pub fn cmd_goal_list(db: &Database, uid: &str) -> Result<()> {
    let goals = db.list_savings_goals(uid)?;

    if goals.is_empty() {
        println!("No savings goals yet. Create one from a product page:");
        println!("  montra goal add https://priceoye.pk/...");
        return Ok(());
    }

    println!();
    println!("🎯 Savings Goals");
    println!("   ─────────────────────────────────────────────────────────────");
    for goal in goals {
        let progress = if goal.target_amount > 0.0 {
            (goal.saved_amount / goal.target_amount * 100.0).min(100.0)
        } else {
            0.0
        };
        println!(
            "   [{}] {:<40} {:>14}  {:>5.1}%",
            goal.id,
            truncate(&goal.name, 40),
            currency(goal.target_amount, DEFAULT_CURRENCY),
            progress
        );
    }
    Ok(())
}
