//! Market catalog maintenance
//!
//! - `strategies` - Price extraction from product page markup
//! - `browser` - Page loading seam
//! - `grid` - Listing page import
//! - `refresh` - The refresh job
//! - `scheduler` - Periodic refresh

pub mod browser;
pub mod grid;
pub mod refresh;
pub mod scheduler;
pub mod strategies;

pub use browser::{fetch_markup, Browser, BrowserLauncher, BrowserSession, HttpBrowserLauncher, Page};
pub use grid::{parse_grid, GridCard};
pub use refresh::{CancellationFlag, CatalogRefreshJob, RefreshMiss, RefreshReport, ReseedReport};
pub use scheduler::{start_refresh_scheduler, RefreshScheduleConfig};
pub use strategies::{PriceHit, PriceResolver, PriceStrategy};
