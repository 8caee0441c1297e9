//! Savings goal operations

use rusqlite::params;

use super::{parse_datetime, Database};
use crate::error::Result;
use crate::models::{NewSavingsGoal, SavingsGoal};

impl Database {
    /// Insert a savings goal, returning its id
    pub fn insert_savings_goal(&self, goal: &NewSavingsGoal) -> Result<i64> {
        let conn = self.conn()?;

        conn.execute(
            r#"
            INSERT INTO savings_goals (uid, name, price, image, target_amount, saved_amount, created_at)
            VALUES (?, ?, ?, ?, ?, ?, ?)
            "#,
            params![
                goal.uid,
                goal.name,
                goal.price,
                goal.image,
                goal.target_amount,
                goal.saved_amount,
                goal.created_at.to_rfc3339(),
            ],
        )?;

        Ok(conn.last_insert_rowid())
    }

    /// Savings goals of a user, newest first
    pub fn list_savings_goals(&self, uid: &str) -> Result<Vec<SavingsGoal>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(
            r#"
            SELECT id, uid, name, price, image, target_amount, saved_amount, created_at
            FROM savings_goals
            WHERE uid = ?
            ORDER BY created_at DESC, id DESC
            "#,
        )?;

        let goals = stmt
            .query_map(params![uid], |row| {
                let created_at: String = row.get(7)?;
                Ok(SavingsGoal {
                    id: row.get(0)?,
                    uid: row.get(1)?,
                    name: row.get(2)?,
                    price: row.get(3)?,
                    image: row.get(4)?,
                    target_amount: row.get(5)?,
                    saved_amount: row.get(6)?,
                    created_at: parse_datetime(&created_at),
                })
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        Ok(goals)
    }
}
