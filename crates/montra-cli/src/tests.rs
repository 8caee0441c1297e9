//! CLI command tests
//!
//! This module contains all tests for the CLI commands.

use std::io::Cursor;
use std::sync::Arc;

use montra_core::ai::{AIClient, MockBackend, MockReply};
use montra_core::catalog::HttpBrowserLauncher;
use montra_core::models::TransactionType;
use montra_core::store::CatalogStore;
use montra_core::test_utils::MockSiteServer;
use montra_core::{CatalogConfig, Database};
use tempfile::TempDir;

use crate::commands::{self, truncate};

fn setup_test_db() -> Database {
    Database::in_memory().unwrap()
}

fn mock_ai() -> (AIClient, MockBackend) {
    let backend = MockBackend::new();
    (AIClient::Mock(backend.clone()), backend)
}

/// Catalog whose product pages live on the mock site
fn site_catalog(site: &MockSiteServer) -> CatalogConfig {
    CatalogConfig::parse(&format!(
        r#"
        [refresh]
        page_timeout_secs = 5

        [[products]]
        name = "Itel Super S26 Ultra"
        price = 44999
        category = "mobile"
        product_url = "{itel}"

        [[products]]
        name = "Tecno Spark Go 1"
        price = 39999
        category = "mobile"
        product_url = "{tecno}"

        [[grid]]
        url = "{grid}"
        category = "mobile"
        card_selector = ".productBox"
        name_selector = ".p-title"
        price_selector = ".price-box"
        "#,
        itel = site.url("/mobiles/itel"),
        tecno = site.url("/mobiles/tecno"),
        grid = site.url("/mobiles"),
    ))
    .unwrap()
}

async fn site() -> MockSiteServer {
    MockSiteServer::start(vec![
        (
            "/mobiles/itel",
            r#"<html><head><meta property="product:price:amount" content="42999.00"/></head></html>"#,
        ),
        ("/mobiles/tecno", "<html><body>Temporarily unavailable</body></html>"),
        (
            "/mobiles",
            r#"<div class="productBox"><a href="/mobiles/vivo"><div class="p-title">Vivo Y04</div></a>
               <div class="price-box">Rs 26,999</div></div>"#,
        ),
        ("/goal/buds", "<html><h1>Redmi Buds 4 Active</h1></html>"),
    ])
    .await
}

// ========== Transaction Command Tests ==========

#[test]
fn test_cmd_add_manual_entry() {
    let db = setup_test_db();
    commands::cmd_add(&db, "u1", " Lunch ", 1500.0, "expense", None, Some("2024-03-12")).unwrap();

    let txs = db.list_transactions("u1").unwrap();
    assert_eq!(txs.len(), 1);
    assert_eq!(txs[0].title, "Lunch");
    assert_eq!(txs[0].date.format("%Y-%m-%d").to_string(), "2024-03-12");
}

#[test]
fn test_cmd_add_rejects_invalid_input() {
    let db = setup_test_db();
    assert!(commands::cmd_add(&db, "u1", "   ", 10.0, "expense", None, None).is_err());
    assert!(commands::cmd_add(&db, "u1", "Lunch", 0.0, "expense", None, None).is_err());
    assert!(commands::cmd_add(&db, "u1", "Lunch", 10.0, "gift", None, None).is_err());
    assert!(commands::cmd_add(&db, "u1", "Lunch", 10.0, "expense", None, Some("someday")).is_err());
    assert!(db.list_transactions("u1").unwrap().is_empty());
}

#[tokio::test]
async fn test_cmd_parse_saves_extracted_transaction() {
    let db = setup_test_db();
    let (ai, backend) = mock_ai();

    commands::cmd_parse(&db, "u1", Some(&ai), "Salary 50000", true)
        .await
        .unwrap();

    let txs = db.list_transactions("u1").unwrap();
    assert_eq!(txs.len(), 1);
    assert_eq!(txs[0].title, "Salary");
    assert_eq!(txs[0].amount, 50000.0);
    assert_eq!(txs[0].kind, TransactionType::Income);
    assert_eq!(backend.call_count(), 1);
}

#[tokio::test]
async fn test_cmd_parse_without_save_writes_nothing() {
    let db = setup_test_db();
    let (ai, _) = mock_ai();
    commands::cmd_parse(&db, "u1", Some(&ai), "Lunch $15", false)
        .await
        .unwrap();
    assert!(db.list_transactions("u1").unwrap().is_empty());
}

#[tokio::test]
async fn test_cmd_parse_failures_save_nothing() {
    let db = setup_test_db();
    let (ai, backend) = mock_ai();

    backend.reply_with("Sure! Here is your transaction.");
    assert!(commands::cmd_parse(&db, "u1", Some(&ai), "Lunch $15", true)
        .await
        .is_err());

    backend.reply_with(r#"{"title": "Lunch", "type": "expense"}"#);
    assert!(commands::cmd_parse(&db, "u1", Some(&ai), "Lunch", true)
        .await
        .is_err());

    backend.push_reply(MockReply::Fail(503));
    assert!(commands::cmd_parse(&db, "u1", Some(&ai), "Lunch $15", true)
        .await
        .is_err());

    assert!(db.list_transactions("u1").unwrap().is_empty());
}

#[tokio::test]
async fn test_ai_commands_need_a_client() {
    let db = setup_test_db();
    let err = commands::cmd_parse(&db, "u1", None, "Lunch $15", true)
        .await
        .unwrap_err();
    assert!(format!("{:#}", err).contains("unavailable"));
}

#[tokio::test]
async fn test_cmd_receipt_threads_date() {
    let db = setup_test_db();
    let (ai, backend) = mock_ai();
    let dir = TempDir::new().unwrap();
    let photo = dir.path().join("receipt.png");
    std::fs::write(&photo, [0x89, b'P', b'N', b'G']).unwrap();

    commands::cmd_receipt(&db, "u1", Some(&ai), &photo, true)
        .await
        .unwrap();

    let txs = db.list_transactions("u1").unwrap();
    assert_eq!(txs.len(), 1);
    assert_eq!(txs[0].title, "Imtiaz Super Market");
    assert_eq!(txs[0].kind, TransactionType::Expense);
    assert_eq!(txs[0].date.format("%Y-%m-%d").to_string(), "2024-03-12");

    let request = &backend.requests()[0];
    assert_eq!(request.image.as_ref().unwrap().mime_type, "image/png");
}

#[tokio::test]
async fn test_cmd_receipt_missing_file() {
    let db = setup_test_db();
    let (ai, backend) = mock_ai();
    let result = commands::cmd_receipt(&db, "u1", Some(&ai), "/no/such/receipt.jpg".as_ref(), true).await;
    assert!(result.is_err());
    assert_eq!(backend.call_count(), 0);
}

#[test]
fn test_cmd_transactions_list_and_snapshot() {
    let db = setup_test_db();
    assert!(commands::cmd_transactions_list(&db, "u1", 20).is_ok());
    assert!(commands::cmd_snapshot(&db, "u1").is_ok());

    commands::cmd_add(&db, "u1", "Salary", 15000.0, "income", None, None).unwrap();
    commands::cmd_add(&db, "u1", "Rent", 3000.0, "expense", Some("Housing".into()), None).unwrap();
    assert!(commands::cmd_transactions_list(&db, "u1", 20).is_ok());
    assert!(commands::cmd_snapshot(&db, "u1").is_ok());
    assert_eq!(db.financial_snapshot("u1").unwrap().balance, 12000.0);
}

// ========== Catalog Command Tests ==========

#[test]
fn test_cmd_init_seeds_catalog_once() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("montra.db");
    let config = CatalogConfig::embedded().unwrap();

    commands::cmd_init(&path, &config).unwrap();
    let db = commands::open_db(&path).unwrap();
    assert_eq!(db.list_products().unwrap().len(), config.products.len());

    // A second init keeps refreshed prices
    db.record_price("itel-super-s26-ultra", 41000, "2024-03-12T00:00:00.000Z")
        .unwrap();
    commands::cmd_init(&path, &config).unwrap();
    let itel = db.get_product("itel-super-s26-ultra").unwrap().unwrap();
    assert_eq!(itel.price, 41000);
}

#[tokio::test]
async fn test_cmd_catalog_refresh_records_hits_only() {
    let site = site().await;
    let db = setup_test_db();
    let config = site_catalog(&site);
    let products: Vec<_> = config.products.iter().map(|s| s.to_product(s.price)).collect();
    db.replace_catalog(&products).unwrap();
    let before = db.get_product("tecno-spark-go-1").unwrap().unwrap();

    commands::cmd_catalog_refresh_with(&db, None, &config, Arc::new(HttpBrowserLauncher::new("test")))
        .await
        .unwrap();

    assert_eq!(db.get_product("itel-super-s26-ultra").unwrap().unwrap().price, 42999);
    // A page without a price leaves the entry exactly as it was
    assert_eq!(db.get_product("tecno-spark-go-1").unwrap().unwrap(), before);
}

#[tokio::test]
async fn test_cmd_catalog_reseed_and_grid_import() {
    let site = site().await;
    let db = setup_test_db();
    let config = site_catalog(&site);
    let launcher = Arc::new(HttpBrowserLauncher::new("test"));

    commands::cmd_catalog_reseed_with(&db, None, &config, false, launcher.clone())
        .await
        .unwrap();
    let prices: Vec<i64> = db.list_products().unwrap().iter().map(|p| p.price).collect();
    assert_eq!(prices, vec![42999, 39999]);

    commands::cmd_catalog_reseed_with(&db, None, &config, true, launcher)
        .await
        .unwrap();
    let vivo = db.get_product("vivo-y04").unwrap().unwrap();
    assert_eq!(vivo.price, 26999);
    assert_eq!(vivo.product_url, Some(site.url("/mobiles/vivo")));
    assert!(commands::cmd_catalog_list(&db).is_ok());
}

#[tokio::test]
async fn test_cmd_discover() {
    let db = setup_test_db();
    let config = CatalogConfig::embedded().unwrap();
    let products: Vec<_> = config.products.iter().map(|s| s.to_product(s.price)).collect();
    db.replace_catalog(&products).unwrap();

    assert!(commands::cmd_discover(&db, 45000.0, "mobile").await.is_ok());
    assert!(commands::cmd_discover(&db, 0.0, "all").await.is_ok());
    assert!(commands::cmd_discover(&db, 45000.0, "boats").await.is_err());
}

// ========== Goal Command Tests ==========

#[tokio::test]
async fn test_cmd_goal_add_from_page() {
    let site = site().await;
    let db = setup_test_db();
    let (ai, backend) = mock_ai();
    backend.reply_with(r#"{"name": "Redmi Buds 4 Active", "price": "4,500", "image": null}"#);
    let config = site_catalog(&site);
    let launcher = HttpBrowserLauncher::new("test");

    commands::cmd_goal_add_with(&db, "u1", Some(&ai), &launcher, &config, &site.url("/goal/buds"))
        .await
        .unwrap();

    let goals = db.list_savings_goals("u1").unwrap();
    assert_eq!(goals.len(), 1);
    assert_eq!(goals[0].name, "Redmi Buds 4 Active");
    assert_eq!(goals[0].target_amount, 4500.0);
    assert_eq!(goals[0].image, "https://placehold.co/400");
    assert!(commands::cmd_goal_list(&db, "u1").is_ok());
}

#[tokio::test]
async fn test_cmd_goal_add_rejects_bad_input() {
    let site = site().await;
    let db = setup_test_db();
    let (ai, backend) = mock_ai();
    let config = site_catalog(&site);
    let launcher = HttpBrowserLauncher::new("test");

    assert!(
        commands::cmd_goal_add_with(&db, "u1", Some(&ai), &launcher, &config, "not a url")
            .await
            .is_err()
    );
    assert!(commands::cmd_goal_add_with(
        &db,
        "u1",
        Some(&ai),
        &launcher,
        &config,
        &site.url("/missing")
    )
    .await
    .is_err());
    assert_eq!(backend.call_count(), 0);

    backend.reply_with(r#"{"name": "Mystery item", "price": null}"#);
    assert!(commands::cmd_goal_add_with(
        &db,
        "u1",
        Some(&ai),
        &launcher,
        &config,
        &site.url("/goal/buds")
    )
    .await
    .is_err());
    assert!(db.list_savings_goals("u1").unwrap().is_empty());
}

// ========== Chat Command Tests ==========

#[tokio::test]
async fn test_cmd_chat_grounds_every_turn() {
    let db = setup_test_db();
    commands::cmd_add(&db, "u1", "Salary", 12000.0, "income", None, None).unwrap();
    let (ai, backend) = mock_ai();

    let input = Cursor::new("What's my balance?\n\n1\nexit\nnever sent\n");
    commands::cmd_chat(&db, "u1", Some(&ai), input).await.unwrap();

    let requests = backend.requests();
    assert_eq!(requests.len(), 2);
    assert!(requests[0]
        .system_prompt
        .as_deref()
        .unwrap()
        .contains("PKR 12,000"));
    assert_eq!(
        requests[1].messages.last().unwrap().content,
        "Analyze spending"
    );
}

// ========== Prompts and Helpers ==========

#[test]
fn test_cmd_prompts() {
    assert!(commands::cmd_prompts_list().is_ok());
    assert!(commands::cmd_prompts_show("assistant").is_ok());
    assert!(commands::cmd_prompts_show("nope").is_ok());
}

#[test]
fn test_truncate() {
    assert_eq!(truncate("short", 10), "short");
    assert_eq!(truncate("Itel Super S26 Ultra", 10), "Itel Su...");
    assert_eq!(truncate("قیمت موبائل فون", 6), "قیم...");
}
