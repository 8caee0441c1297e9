//! Montra CLI - AI-assisted expense tracking and price discovery
//!
//! Usage:
//!   montra init                          Initialize database and seed the catalog
//!   montra parse "Lunch $15" --save      Turn a note into a transaction
//!   montra receipt photo.jpg --save      Read a receipt photo
//!   montra discover --budget 45000       What can I buy?
//!   montra catalog refresh               Re-scrape catalog prices
//!   montra chat                          Ask the assistant

mod cli;
mod commands;

#[cfg(test)]
mod tests;

use anyhow::Result;
use clap::Parser;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use cli::*;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Priority: RUST_LOG env var > --verbose flag > default (info)
    let filter = if std::env::var("RUST_LOG").is_ok() {
        EnvFilter::from_default_env()
    } else if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("info")
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_target(false).compact())
        .init();

    let ai = montra_core::AIClient::from_env();
    let uid = cli.uid.as_str();

    match cli.command {
        Commands::Init => {
            let config = commands::load_catalog(cli.catalog.as_deref())?;
            commands::cmd_init(&cli.db, &config)
        }
        Commands::Status => {
            let db = commands::open_db(&cli.db)?;
            commands::cmd_status(&db, ai.as_ref()).await
        }
        Commands::Add {
            title,
            amount,
            kind,
            category,
            date,
        } => {
            let db = commands::open_db(&cli.db)?;
            commands::cmd_add(&db, uid, &title, amount, &kind, category, date.as_deref())
        }
        Commands::Parse { text, save } => {
            let db = commands::open_db(&cli.db)?;
            commands::cmd_parse(&db, uid, ai.as_ref(), &text, save).await
        }
        Commands::Receipt { file, save } => {
            let db = commands::open_db(&cli.db)?;
            commands::cmd_receipt(&db, uid, ai.as_ref(), &file, save).await
        }
        Commands::Transactions { limit } => {
            let db = commands::open_db(&cli.db)?;
            commands::cmd_transactions_list(&db, uid, limit)
        }
        Commands::Snapshot => {
            let db = commands::open_db(&cli.db)?;
            commands::cmd_snapshot(&db, uid)
        }
        Commands::Goal { action } => {
            let db = commands::open_db(&cli.db)?;
            match action {
                GoalAction::Add { url } => {
                    let config = commands::load_catalog(cli.catalog.as_deref())?;
                    commands::cmd_goal_add(&db, uid, ai.as_ref(), &config, &url).await
                }
                GoalAction::List => commands::cmd_goal_list(&db, uid),
            }
        }
        Commands::Discover {
            budget,
            category,
            watch,
            refresh_every_hours,
        } => {
            let db = commands::open_db(&cli.db)?;
            if watch {
                let config = commands::load_catalog(cli.catalog.as_deref())?;
                commands::cmd_discover_watch(
                    &db,
                    ai.as_ref(),
                    &config,
                    budget,
                    &category,
                    refresh_every_hours,
                )
                .await
            } else {
                commands::cmd_discover(&db, budget, &category).await
            }
        }
        Commands::Catalog { action } => {
            let db = commands::open_db(&cli.db)?;
            let config = commands::load_catalog(cli.catalog.as_deref())?;
            match action {
                CatalogAction::List => commands::cmd_catalog_list(&db),
                CatalogAction::Refresh => {
                    commands::cmd_catalog_refresh(&db, ai.as_ref(), &config).await
                }
                CatalogAction::Reseed { from_grid } => {
                    commands::cmd_catalog_reseed(&db, ai.as_ref(), &config, from_grid).await
                }
                CatalogAction::Schedule { every_hours, now } => {
                    commands::cmd_catalog_schedule(&db, ai.as_ref(), &config, every_hours, now)
                        .await
                }
            }
        }
        Commands::Chat => {
            let db = commands::open_db(&cli.db)?;
            let stdin = tokio::io::BufReader::new(tokio::io::stdin());
            commands::cmd_chat(&db, uid, ai.as_ref(), stdin).await
        }
        Commands::Prompts { action } => match action {
            PromptsAction::List => commands::cmd_prompts_list(),
            PromptsAction::Show { id } => commands::cmd_prompts_show(&id),
            PromptsAction::Path => commands::cmd_prompts_path(),
        },
    }
}
