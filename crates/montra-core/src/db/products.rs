//! Market catalog operations

use rusqlite::{params, OptionalExtension, Row};
use tokio::sync::watch;

use super::Database;
use crate::error::{Error, Result};
use crate::models::{CategoryFilter, MarketProduct, ProductCategory};
use crate::store::{check_product, CatalogStore, ProductQuery, ProductUpsert};

const PRODUCT_COLUMNS: &str =
    "id, name, price, category, image_url, product_url, last_updated";

fn product_from_row(row: &Row) -> rusqlite::Result<MarketProduct> {
    let category: String = row.get(3)?;
    let category: ProductCategory = category.parse().map_err(|e: String| {
        rusqlite::Error::FromSqlConversionFailure(
            3,
            rusqlite::types::Type::Text,
            Box::new(Error::InvalidData(e)),
        )
    })?;
    Ok(MarketProduct {
        id: row.get(0)?,
        name: row.get(1)?,
        price: row.get(2)?,
        category,
        image_url: row.get(4)?,
        product_url: row.get(5)?,
        last_updated: row.get(6)?,
    })
}

impl CatalogStore for Database {
    fn query_products(&self, query: &ProductQuery) -> Result<Vec<MarketProduct>> {
        let conn = self.conn()?;
        let products = match query.category {
            CategoryFilter::All => {
                let mut stmt = conn.prepare(&format!(
                    "SELECT {PRODUCT_COLUMNS} FROM market_products \
                     WHERE price <= ? ORDER BY price DESC, id ASC"
                ))?;
                let rows = stmt.query_map(params![query.max_price], product_from_row)?;
                rows.collect::<rusqlite::Result<Vec<_>>>()?
            }
            CategoryFilter::Only(category) => {
                let mut stmt = conn.prepare(&format!(
                    "SELECT {PRODUCT_COLUMNS} FROM market_products \
                     WHERE price <= ? AND category = ? ORDER BY price DESC, id ASC"
                ))?;
                let rows = stmt.query_map(
                    params![query.max_price, category.as_str()],
                    product_from_row,
                )?;
                rows.collect::<rusqlite::Result<Vec<_>>>()?
            }
        };
        Ok(products)
    }

    fn list_products(&self) -> Result<Vec<MarketProduct>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {PRODUCT_COLUMNS} FROM market_products ORDER BY price DESC, id ASC"
        ))?;
        let products = stmt
            .query_map([], product_from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(products)
    }

    fn get_product(&self, id: &str) -> Result<Option<MarketProduct>> {
        let conn = self.conn()?;
        let product = conn
            .query_row(
                &format!("SELECT {PRODUCT_COLUMNS} FROM market_products WHERE id = ?"),
                params![id],
                product_from_row,
            )
            .optional()?;
        Ok(product)
    }

    fn upsert_products(&self, products: &[ProductUpsert]) -> Result<usize> {
        for p in products {
            check_product(&p.id, p.price)?;
        }
        if products.is_empty() {
            return Ok(0);
        }

        let mut conn = self.conn()?;
        let tx = conn.transaction()?;
        {
            let mut stmt = tx.prepare(
                r#"
                INSERT INTO market_products (id, name, price, category, image_url, product_url, last_updated)
                VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
                ON CONFLICT(id) DO UPDATE SET
                    name = excluded.name,
                    price = excluded.price,
                    category = excluded.category,
                    image_url = COALESCE(excluded.image_url, market_products.image_url),
                    product_url = COALESCE(excluded.product_url, market_products.product_url),
                    last_updated = excluded.last_updated
                "#,
            )?;
            for p in products {
                stmt.execute(params![
                    p.id,
                    p.name,
                    p.price,
                    p.category.as_str(),
                    p.image_url,
                    p.product_url,
                    p.last_updated,
                ])?;
            }
        }
        tx.commit()?;

        self.notify_catalog_changed();
        Ok(products.len())
    }

    fn record_price(&self, id: &str, price: i64, last_updated: &str) -> Result<()> {
        check_product(id, price)?;
        let conn = self.conn()?;
        let updated = conn.execute(
            "UPDATE market_products SET price = ?, last_updated = ? WHERE id = ?",
            params![price, last_updated, id],
        )?;
        if updated == 0 {
            return Err(Error::NotFound(format!("product {}", id)));
        }

        self.notify_catalog_changed();
        Ok(())
    }

    fn replace_catalog(&self, products: &[MarketProduct]) -> Result<()> {
        for p in products {
            check_product(&p.id, p.price)?;
        }

        let mut conn = self.conn()?;
        let tx = conn.transaction()?;
        tx.execute("DELETE FROM market_products", [])?;
        {
            let mut stmt = tx.prepare(
                r#"
                INSERT OR REPLACE INTO market_products (id, name, price, category, image_url, product_url, last_updated)
                VALUES (?, ?, ?, ?, ?, ?, ?)
                "#,
            )?;
            for p in products {
                stmt.execute(params![
                    p.id,
                    p.name,
                    p.price,
                    p.category.as_str(),
                    p.image_url,
                    p.product_url,
                    p.last_updated,
                ])?;
            }
        }
        tx.commit()?;

        self.notify_catalog_changed();
        Ok(())
    }

    fn watch(&self) -> watch::Receiver<u64> {
        self.subscribe_catalog()
    }
}
