//! Database tests

use chrono::{Duration, TimeZone, Utc};

use super::*;
use crate::models::*;
use crate::store::{CatalogStore, ProductQuery, ProductUpsert};

fn new_tx(uid: &str, title: &str, amount: f64, kind: TransactionType, day: u32) -> NewTransaction {
    NewTransaction {
        uid: uid.to_string(),
        title: title.to_string(),
        amount,
        kind,
        category: None,
        date: Utc.with_ymd_and_hms(2024, 6, day, 9, 0, 0).unwrap(),
    }
}

fn seed_catalog(db: &Database) {
    let mut itel = MarketProduct::new("Itel Super S26 Ultra", 44999, ProductCategory::Mobile);
    itel.product_url = Some("https://priceoye.pk/mobiles/itel/itel-super-s26-ultra".into());
    db.replace_catalog(&[
        itel,
        MarketProduct::new("Tecno Spark Go 1", 39999, ProductCategory::Mobile),
        MarketProduct::new("Lenovo ThinkPad E14 Gen 4 Ryzen 5 DOS", 48000, ProductCategory::Laptop),
        MarketProduct::new("Redmi Buds 4 Active", 4500, ProductCategory::Audio),
    ])
    .unwrap();
}

#[test]
fn test_in_memory_db() {
    let db = Database::in_memory().unwrap();
    assert!(db.list_transactions("u1").unwrap().is_empty());
    assert!(db.list_products().unwrap().is_empty());
    assert!(db.list_savings_goals("u1").unwrap().is_empty());
}

#[test]
fn test_transactions_roundtrip_newest_first() {
    let db = Database::in_memory().unwrap();
    db.insert_transaction(&new_tx("u1", "Salary", 50000.0, TransactionType::Income, 1))
        .unwrap();
    db.insert_transaction(&new_tx("u1", "Lunch", 15.0, TransactionType::Expense, 3))
        .unwrap();
    db.insert_transaction(&new_tx("u2", "Other user", 99.0, TransactionType::Expense, 2))
        .unwrap();

    let txs = db.list_transactions("u1").unwrap();
    assert_eq!(txs.len(), 2);
    assert_eq!(txs[0].title, "Lunch");
    assert_eq!(txs[0].kind, TransactionType::Expense);
    assert_eq!(txs[1].date, Utc.with_ymd_and_hms(2024, 6, 1, 9, 0, 0).unwrap());

    let recent = db.list_recent_transactions("u1", 1).unwrap();
    assert_eq!(recent.len(), 1);
}

#[test]
fn test_financial_snapshot_from_ledger() {
    let db = Database::in_memory().unwrap();
    db.insert_transaction(&new_tx("u1", "Salary", 15000.0, TransactionType::Income, 1))
        .unwrap();
    db.insert_transaction(&new_tx("u1", "Rent", 3000.0, TransactionType::Expense, 2))
        .unwrap();
    for day in 3..15 {
        db.insert_transaction(&new_tx("u1", "Tea", 50.0, TransactionType::Expense, day))
            .unwrap();
    }

    let snapshot = db.financial_snapshot("u1").unwrap();
    assert_eq!(snapshot.balance, 15000.0 - 3000.0 - 12.0 * 50.0);
    assert_eq!(snapshot.recent_transactions.len(), SNAPSHOT_RECENT_LIMIT);
    assert_eq!(
        snapshot.recent_transactions[0].date,
        Utc.with_ymd_and_hms(2024, 6, 14, 9, 0, 0).unwrap()
    );
    assert!(db.financial_snapshot("nobody").unwrap().recent_transactions.is_empty());
}

#[test]
fn test_schema_rejects_non_positive_amount() {
    let db = Database::in_memory().unwrap();
    let result = db.insert_transaction(&new_tx("u1", "Bad", 0.0, TransactionType::Expense, 1));
    assert!(result.is_err());
}

#[test]
fn test_savings_goal_roundtrip() {
    let db = Database::in_memory().unwrap();
    let product = ParsedProduct {
        name: "Tecno Spark Go 1".to_string(),
        price: 39999.0,
        image: PLACEHOLDER_IMAGE.to_string(),
    };
    let goal = NewSavingsGoal::from_product("u1", &product);
    let id = db.insert_savings_goal(&goal).unwrap();
    assert!(id > 0);

    let goals = db.list_savings_goals("u1").unwrap();
    assert_eq!(goals.len(), 1);
    assert_eq!(goals[0].name, "Tecno Spark Go 1");
    assert_eq!(goals[0].target_amount, 39999.0);
    assert_eq!(goals[0].saved_amount, 0.0);
    assert_eq!(goals[0].image, PLACEHOLDER_IMAGE);
}

#[test]
fn test_query_products_budget_category_order() {
    let db = Database::in_memory().unwrap();
    seed_catalog(&db);

    let mobiles = db
        .query_products(&ProductQuery {
            max_price: 50000,
            category: CategoryFilter::Only(ProductCategory::Mobile),
        })
        .unwrap();
    let prices: Vec<i64> = mobiles.iter().map(|p| p.price).collect();
    assert_eq!(prices, vec![44999, 39999]);

    let all = db
        .query_products(&ProductQuery {
            max_price: 45000,
            category: CategoryFilter::All,
        })
        .unwrap();
    let prices: Vec<i64> = all.iter().map(|p| p.price).collect();
    assert_eq!(prices, vec![44999, 39999, 4500]);
}

#[test]
fn test_record_price_preserves_other_fields() {
    let db = Database::in_memory().unwrap();
    seed_catalog(&db);

    db.record_price("itel-super-s26-ultra", 43999, "2024-07-01T00:00:00.000Z")
        .unwrap();
    let itel = db.get_product("itel-super-s26-ultra").unwrap().unwrap();
    assert_eq!(itel.price, 43999);
    assert_eq!(itel.last_updated, "2024-07-01T00:00:00.000Z");
    assert!(itel.product_url.is_some());
    assert_eq!(itel.name, "Itel Super S26 Ultra");

    assert!(db.record_price("itel-super-s26-ultra", 0, "x").is_err());
    assert_eq!(db.get_product("itel-super-s26-ultra").unwrap().unwrap().price, 43999);
    assert!(db.record_price("unknown", 10, "x").is_err());
}

#[test]
fn test_upsert_merges_and_inserts() {
    let db = Database::in_memory().unwrap();
    seed_catalog(&db);

    let mut update = ProductUpsert::from(&MarketProduct::new(
        "Itel Super S26 Ultra",
        42000,
        ProductCategory::Mobile,
    ));
    update.product_url = None;
    let new = ProductUpsert::from(&MarketProduct::new(
        "Infinix Hot 40",
        36999,
        ProductCategory::Mobile,
    ));

    assert_eq!(db.upsert_products(&[update, new]).unwrap(), 2);
    let itel = db.get_product("itel-super-s26-ultra").unwrap().unwrap();
    assert_eq!(itel.price, 42000);
    // Absent optional field keeps the stored value
    assert!(itel.product_url.is_some());
    assert!(db.get_product("infinix-hot-40").unwrap().is_some());
    assert_eq!(db.list_products().unwrap().len(), 5);
}

#[test]
fn test_replace_catalog_is_all_or_nothing() {
    let db = Database::in_memory().unwrap();
    seed_catalog(&db);

    let good = MarketProduct::new("New Phone", 10000, ProductCategory::Mobile);
    let mut bad = MarketProduct::new("Broken", 1, ProductCategory::Mobile);
    bad.price = 0;
    assert!(db.replace_catalog(&[good, bad]).is_err());
    // Old catalog untouched
    assert_eq!(db.list_products().unwrap().len(), 4);
}

#[test]
fn test_writes_bump_watch_revision() {
    let db = Database::in_memory().unwrap();
    let rx = db.watch();
    let start = *rx.borrow();

    seed_catalog(&db);
    db.record_price("tecno-spark-go-1", 38999, "now").unwrap();
    assert_eq!(*rx.borrow(), start + 2);

    // Clones share the channel
    let clone = db.clone();
    clone.record_price("tecno-spark-go-1", 37999, "now").unwrap();
    assert_eq!(*rx.borrow(), start + 3);
}

#[tokio::test]
async fn test_watch_sees_writes_from_another_handle() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("montra.db");
    let path = path.to_string_lossy();

    let reader = Database::new(&path).unwrap();
    seed_catalog(&reader);
    let mut rx = reader.watch();
    rx.borrow_and_update();

    // A separate handle has its own pool and channel, like another process
    let writer = Database::new(&path).unwrap();
    writer.record_price("tecno-spark-go-1", 35000, "now").unwrap();

    tokio::time::timeout(std::time::Duration::from_secs(5), rx.changed())
        .await
        .expect("external write not observed")
        .unwrap();
    let tecno = reader.get_product("tecno-spark-go-1").unwrap().unwrap();
    assert_eq!(tecno.price, 35000);
}

#[test]
fn test_parse_datetime_formats() {
    let expected = Utc.with_ymd_and_hms(2024, 3, 12, 10, 30, 0).unwrap();
    assert_eq!(parse_datetime("2024-03-12T10:30:00+00:00"), expected);
    assert_eq!(parse_datetime("2024-03-12 10:30:00"), expected);
    let fallback = parse_datetime("garbage");
    assert!(Utc::now() - fallback < Duration::minutes(1));
}
