//! CLI argument definitions using clap
//!
//! This module contains all the clap structs and enums for parsing CLI arguments.
//! The actual command implementations are in the `commands` module.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// Montra - Track expenses and find what your budget can buy
#[derive(Parser)]
#[command(name = "montra")]
#[command(about = "AI-assisted expense tracking and price discovery", long_about = None)]
#[command(version)]
pub struct Cli {
    /// Database path
    #[arg(long, default_value = "montra.db", global = true)]
    pub db: PathBuf,

    /// User whose ledger the command works on
    #[arg(long, default_value = "local", global = true)]
    pub uid: String,

    /// Catalog TOML (defaults to the built-in catalog)
    #[arg(long, global = true)]
    pub catalog: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Initialize the database and seed the market catalog
    Init,

    /// Show database, catalog and AI backend status
    Status,

    /// Add a transaction by hand
    Add {
        /// What the money was for
        title: String,

        /// Positive amount
        amount: f64,

        /// income or expense
        #[arg(short = 't', long = "type", default_value = "expense")]
        kind: String,

        /// Optional category label
        #[arg(short, long)]
        category: Option<String>,

        /// Date of the transaction (YYYY-MM-DD, defaults to now)
        #[arg(short, long)]
        date: Option<String>,
    },

    /// Turn a free-text note into a transaction ("Lunch $15")
    Parse {
        /// The note
        text: String,

        /// Save the result instead of only showing it
        #[arg(long)]
        save: bool,
    },

    /// Read a receipt photo into a transaction
    Receipt {
        /// Image file (jpg, png, webp)
        file: PathBuf,

        /// Save the result instead of only showing it
        #[arg(long)]
        save: bool,
    },

    /// List recent transactions
    Transactions {
        /// Maximum number to show
        #[arg(short, long, default_value = "20")]
        limit: i64,
    },

    /// Show balance and recent activity
    Snapshot,

    /// Savings goals
    Goal {
        #[command(subcommand)]
        action: GoalAction,
    },

    /// Find products that fit a budget
    Discover {
        /// Budget in whole currency units
        #[arg(short, long)]
        budget: f64,

        /// Category (mobile, laptop, audio, tablet, wearable, accessory, all)
        #[arg(short, long, default_value = "all")]
        category: String,

        /// Keep printing the list as catalog prices change
        #[arg(short, long)]
        watch: bool,

        /// With --watch, also refresh catalog prices every N hours in this process
        #[arg(long)]
        refresh_every_hours: Option<u64>,
    },

    /// Market catalog maintenance
    Catalog {
        #[command(subcommand)]
        action: CatalogAction,
    },

    /// Chat with the assistant about your finances
    Chat,

    /// Prompt library management
    Prompts {
        #[command(subcommand)]
        action: PromptsAction,
    },
}

#[derive(Subcommand)]
pub enum GoalAction {
    /// Create a goal from a product page URL
    Add {
        /// Product page URL
        url: String,
    },
    /// List savings goals
    List,
}

#[derive(Subcommand)]
pub enum CatalogAction {
    /// List catalog products, most expensive first
    List,

    /// Re-scrape prices for every product with a page URL
    Refresh,

    /// Rebuild the catalog from the seed list
    Reseed {
        /// Import from the configured category listing pages instead
        #[arg(long)]
        from_grid: bool,
    },

    /// Refresh prices on a fixed interval until interrupted
    Schedule {
        /// Interval in hours
        #[arg(long, default_value = "24")]
        every_hours: u64,

        /// Run once immediately instead of waiting a full interval
        #[arg(long)]
        now: bool,
    },
}

#[derive(Subcommand)]
pub enum PromptsAction {
    /// List prompts and override status
    List,
    /// Show a prompt's content
    Show {
        /// Prompt ID (e.g. parse_receipt)
        id: String,
    },
    /// Print the override directory path
    Path,
}
