//! Ledger operations

use rusqlite::params;

use super::{parse_datetime, Database};
use crate::error::{Error, Result};
use crate::models::{FinancialSnapshot, NewTransaction, Transaction, TransactionType};

impl Database {
    /// Insert a validated transaction, returning its id
    pub fn insert_transaction(&self, tx: &NewTransaction) -> Result<i64> {
        let conn = self.conn()?;

        conn.execute(
            r#"
            INSERT INTO transactions (uid, title, amount, type, category, date)
            VALUES (?, ?, ?, ?, ?, ?)
            "#,
            params![
                tx.uid,
                tx.title,
                tx.amount,
                tx.kind.as_str(),
                tx.category,
                tx.date.to_rfc3339(),
            ],
        )?;

        Ok(conn.last_insert_rowid())
    }

    /// All transactions of a user, newest first
    pub fn list_transactions(&self, uid: &str) -> Result<Vec<Transaction>> {
        self.list_recent_transactions(uid, i64::MAX)
    }

    /// Balance and recent activity, recomputed from the whole ledger
    pub fn financial_snapshot(&self, uid: &str) -> Result<FinancialSnapshot> {
        Ok(FinancialSnapshot::from_transactions(&self.list_transactions(uid)?))
    }

    /// Up to `limit` transactions of a user, newest first
    pub fn list_recent_transactions(&self, uid: &str, limit: i64) -> Result<Vec<Transaction>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(
            r#"
            SELECT id, uid, title, amount, type, category, date
            FROM transactions
            WHERE uid = ?
            ORDER BY date DESC, id DESC
            LIMIT ?
            "#,
        )?;

        let rows = stmt.query_map(params![uid, limit], |row| {
            Ok((
                row.get::<_, i64>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, String>(2)?,
                row.get::<_, f64>(3)?,
                row.get::<_, String>(4)?,
                row.get::<_, Option<String>>(5)?,
                row.get::<_, String>(6)?,
            ))
        })?;

        let mut transactions = Vec::new();
        for row in rows {
            let (id, uid, title, amount, kind, category, date) = row?;
            let kind: TransactionType = kind.parse().map_err(Error::InvalidData)?;
            transactions.push(Transaction {
                id,
                uid,
                title,
                amount,
                kind,
                category,
                date: parse_datetime(&date),
            });
        }
        Ok(transactions)
    }
}
