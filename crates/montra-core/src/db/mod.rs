//! Database access layer with connection pooling and migrations
//!
//! This module is organized by collection:
//! - `transactions` - Ledger entries
//! - `products` - Market catalog (implements [`crate::store::CatalogStore`])
//! - `goals` - Savings goals

use std::sync::{Arc, Mutex, Weak};
use std::time::Duration;

use chrono::{DateTime, Utc};
use r2d2::{Pool, PooledConnection};
use r2d2_sqlite::SqliteConnectionManager;
use rusqlite::Connection;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::error::{Error, Result};

mod goals;
mod products;
mod transactions;

#[cfg(test)]
mod tests;

pub type DbPool = Pool<SqliteConnectionManager>;
pub type DbConn = PooledConnection<SqliteConnectionManager>;

/// How often the catalog watcher looks for commits made by other connections
const EXTERNAL_WRITE_POLL: Duration = Duration::from_millis(250);

/// Parse a stored RFC 3339 timestamp
pub(crate) fn parse_datetime(s: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .or_else(|_| {
            // SQLite CURRENT_TIMESTAMP format
            chrono::NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S").map(|dt| dt.and_utc())
        })
        .unwrap_or_else(|_| Utc::now())
}

/// Bump the revision whenever `PRAGMA data_version` moves
///
/// SQLite changes a connection's data version when another connection
/// commits, so this catches writers outside this process. Stops once every
/// `Database` handle sharing the channel is gone.
async fn poll_data_version(conn: Connection, mut last_version: i64, changes: Weak<watch::Sender<u64>>) {
    let conn = Arc::new(Mutex::new(conn));
    let mut ticker = tokio::time::interval(EXTERNAL_WRITE_POLL);

    loop {
        ticker.tick().await;
        let Some(changes) = changes.upgrade() else {
            break;
        };

        let conn = conn.clone();
        let version = tokio::task::spawn_blocking(move || -> Result<i64> {
            let conn = conn
                .lock()
                .map_err(|_| Error::InvalidData("Catalog watch connection poisoned".into()))?;
            Ok(conn.query_row("PRAGMA data_version", [], |row| row.get(0))?)
        })
        .await;

        match version {
            Ok(Ok(version)) => {
                if version != last_version {
                    debug!(version, "External catalog write detected");
                    changes.send_modify(|rev| *rev += 1);
                    last_version = version;
                }
            }
            Ok(Err(e)) => warn!(error = %e, "Failed to read database data version"),
            Err(e) => {
                warn!(error = %e, "Catalog watch task failed");
                break;
            }
        }
    }
    debug!("Stopped watching for external catalog writes");
}

/// Database wrapper with connection pooling
#[derive(Clone)]
pub struct Database {
    pool: DbPool,
    db_path: String,
    /// Catalog revision, bumped after every committed product write
    changes: Arc<watch::Sender<u64>>,
    /// Background task that bumps `changes` on commits from other connections
    external_writes: Arc<Mutex<Option<JoinHandle<()>>>>,
}

impl Database {
    /// Open (or create) a database file and run migrations
    pub fn new(path: &str) -> Result<Self> {
        let manager = SqliteConnectionManager::file(path).with_init(|conn| {
            conn.execute_batch("PRAGMA foreign_keys = ON; PRAGMA busy_timeout = 5000;")
        });
        let pool = Pool::builder().max_size(10).build(manager)?;
        let (changes, _) = watch::channel(0);

        let db = Self {
            pool,
            db_path: path.to_string(),
            changes: Arc::new(changes),
            external_writes: Arc::new(Mutex::new(None)),
        };
        db.run_migrations()?;
        debug!(path, "Database opened");
        Ok(db)
    }

    /// Get the path to the database file
    pub fn path(&self) -> &str {
        &self.db_path
    }

    /// Create a throwaway database (for testing)
    ///
    /// Uses a temporary file rather than `:memory:` so every pooled
    /// connection sees the same data.
    pub fn in_memory() -> Result<Self> {
        use std::sync::atomic::{AtomicU64, Ordering};
        static COUNTER: AtomicU64 = AtomicU64::new(0);

        let id = COUNTER.fetch_add(1, Ordering::SeqCst);
        let path = std::env::temp_dir().join(format!(
            "montra_test_{}_{}.db",
            std::process::id(),
            id
        ));

        let _ = std::fs::remove_file(&path);

        Self::new(&path.to_string_lossy())
    }

    /// Get a connection from the pool
    pub fn conn(&self) -> Result<DbConn> {
        Ok(self.pool.get()?)
    }

    /// Signal catalog subscribers that a write committed
    fn notify_catalog_changed(&self) {
        self.changes.send_modify(|rev| *rev += 1);
    }

    /// Subscribe to catalog revisions
    ///
    /// Inside a tokio runtime this also starts watching the database file, so
    /// commits from other processes or handles bump the revision too.
    pub(crate) fn subscribe_catalog(&self) -> watch::Receiver<u64> {
        let rx = self.changes.subscribe();
        self.watch_external_writes();
        rx
    }

    fn watch_external_writes(&self) {
        let Ok(runtime) = tokio::runtime::Handle::try_current() else {
            return;
        };
        let Ok(mut task) = self.external_writes.lock() else {
            return;
        };
        if task.as_ref().is_some_and(|t| !t.is_finished()) {
            return;
        }

        // Read the starting version now so a commit right after subscribing still counts
        let opened = Connection::open(&self.db_path).and_then(|conn| {
            let version: i64 = conn.query_row("PRAGMA data_version", [], |row| row.get(0))?;
            Ok((conn, version))
        });
        match opened {
            Ok((conn, version)) => {
                debug!(path = %self.db_path, "Watching for external catalog writes");
                *task = Some(runtime.spawn(poll_data_version(
                    conn,
                    version,
                    Arc::downgrade(&self.changes),
                )));
            }
            Err(e) => warn!(error = %e, "Cannot watch for external catalog writes"),
        }
    }

    /// Run database migrations
    fn run_migrations(&self) -> Result<()> {
        let conn = self.conn()?;

        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS transactions (
                id INTEGER PRIMARY KEY,
                uid TEXT NOT NULL,
                title TEXT NOT NULL,
                amount REAL NOT NULL CHECK (amount > 0),
                type TEXT NOT NULL CHECK (type IN ('income', 'expense')),
                category TEXT,
                date TEXT NOT NULL,
                created_at DATETIME DEFAULT CURRENT_TIMESTAMP
            );

            CREATE INDEX IF NOT EXISTS idx_transactions_uid_date
                ON transactions(uid, date DESC);

            -- Market catalog; id is the name-derived slug
            CREATE TABLE IF NOT EXISTS market_products (
                id TEXT PRIMARY KEY,
                name TEXT NOT NULL,
                price INTEGER NOT NULL CHECK (price > 0),
                category TEXT NOT NULL,
                image_url TEXT,
                product_url TEXT,
                last_updated TEXT NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_market_products_price
                ON market_products(price DESC);
            CREATE INDEX IF NOT EXISTS idx_market_products_category
                ON market_products(category, price DESC);

            CREATE TABLE IF NOT EXISTS savings_goals (
                id INTEGER PRIMARY KEY,
                uid TEXT NOT NULL,
                name TEXT NOT NULL,
                price REAL NOT NULL,
                image TEXT NOT NULL,
                target_amount REAL NOT NULL,
                saved_amount REAL NOT NULL DEFAULT 0,
                created_at TEXT NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_savings_goals_uid
                ON savings_goals(uid);
            "#,
        )?;

        debug!("Database migrations complete");
        Ok(())
    }
}
