use super::WarehouseStore;
use crate::{
    calendar,
    error::{GenError, GenResult},
    source::{SourceReader, SubscriptionSnapshot, UserAttributes, UserRow},
};
use chrono::NaiveDate;
use rusqlite::{params, types::FromSql, Row};

fn required_date(table: &str, row_id: &str, column: &str, text: &str) -> GenResult<NaiveDate> {
    calendar::parse_date(text)
        .ok_or_else(|| GenError::malformed(table, row_id, format!("{column}={text:?} is not a date")))
}

fn optional_date(
    table: &str,
    row_id: &str,
    column: &str,
    text: Option<String>,
) -> GenResult<Option<NaiveDate>> {
    match text.as_deref().map(str::trim) {
        None | Some("") => Ok(None),
        Some(t) => required_date(table, row_id, column, t).map(Some),
    }
}

/// Read one column, reporting a type mismatch against its row.
fn column<T: FromSql>(row: &Row<'_>, idx: usize, name: &str, table: &str, row_id: &str) -> GenResult<T> {
    row.get(idx)
        .map_err(|e| GenError::malformed(table, row_id, format!("{name}: {e}")))
}

impl SourceReader for WarehouseStore {
    fn users(&self) -> GenResult<Vec<UserRow>> {
        const TABLE: &str = "raw_users";
        let mut stmt = self
            .conn
            .prepare("SELECT user_id, created_at FROM raw_users ORDER BY user_id")?;
        let mut rows = stmt.query([])?;
        let mut out = Vec::new();
        while let Some(row) = rows.next()? {
            let user_id: String = row.get(0)?;
            let created_at: String = column(row, 1, "created_at", TABLE, &user_id)?;
            let signup_date = required_date(TABLE, &user_id, "created_at", &created_at)?;
            out.push(UserRow {
                user_id,
                signup_date,
            });
        }
        Ok(out)
    }

    fn user_attributes(&self) -> GenResult<Vec<UserAttributes>> {
        const TABLE: &str = "raw_user_attributes";
        let mut stmt = self.conn.prepare(
            "SELECT user_id, usage_score, nps_score, base_mrr
             FROM raw_user_attributes ORDER BY user_id",
        )?;
        let mut rows = stmt.query([])?;
        let mut out = Vec::new();
        while let Some(row) = rows.next()? {
            let user_id: String = row.get(0)?;
            out.push(UserAttributes {
                usage_score: column(row, 1, "usage_score", TABLE, &user_id)?,
                nps_score: column(row, 2, "nps_score", TABLE, &user_id)?,
                base_mrr: column(row, 3, "base_mrr", TABLE, &user_id)?,
                user_id,
            });
        }
        Ok(out)
    }

    fn subscriptions(&self) -> GenResult<Vec<SubscriptionSnapshot>> {
        const TABLE: &str = "raw_subscriptions";
        let mut stmt = self.conn.prepare(
            "SELECT s.subscription_id, s.user_id, s.plan_id, s.start_at, s.end_at,
                    s.status, p.price_usd
             FROM raw_subscriptions s
             JOIN raw_plans p ON p.plan_id = s.plan_id
             ORDER BY s.subscription_id",
        )?;
        let mut rows = stmt.query([])?;
        let mut out = Vec::new();
        while let Some(row) = rows.next()? {
            let id: String = row.get(0)?;
            let start_at: String = column(row, 3, "start_at", TABLE, &id)?;
            let end_at: Option<String> = column(row, 4, "end_at", TABLE, &id)?;
            out.push(SubscriptionSnapshot {
                user_id: column(row, 1, "user_id", TABLE, &id)?,
                plan_id: column(row, 2, "plan_id", TABLE, &id)?,
                start_date: required_date(TABLE, &id, "start_at", &start_at)?,
                end_date: optional_date(TABLE, &id, "end_at", end_at)?,
                status: column(row, 5, "status", TABLE, &id)?,
                monthly_price: column(row, 6, "price_usd", TABLE, &id)?,
                subscription_id: id,
            });
        }
        Ok(out)
    }
}

impl WarehouseStore {
    // ── Upstream seed rows ─────────────────────────────────────
    // The seed loader owns these tables; these helpers exist for tests
    // and local fixtures.

    pub fn insert_user(&self, user_id: &str, created_at: &str) -> GenResult<()> {
        self.conn.execute(
            "INSERT INTO raw_users (user_id, created_at) VALUES (?1, ?2)",
            params![user_id, created_at],
        )?;
        Ok(())
    }

    pub fn upsert_user_attributes(&self, attrs: &UserAttributes) -> GenResult<()> {
        self.conn.execute(
            "INSERT INTO raw_user_attributes (user_id, usage_score, nps_score, base_mrr)
             VALUES (?1, ?2, ?3, ?4)
             ON CONFLICT(user_id) DO UPDATE SET
                usage_score = excluded.usage_score,
                nps_score   = excluded.nps_score,
                base_mrr    = excluded.base_mrr",
            params![attrs.user_id, attrs.usage_score, attrs.nps_score, attrs.base_mrr],
        )?;
        Ok(())
    }

    pub fn insert_plan(&self, plan_id: &str, plan_name: &str, price_usd: f64) -> GenResult<()> {
        self.conn.execute(
            "INSERT INTO raw_plans (plan_id, plan_name, price_usd) VALUES (?1, ?2, ?3)",
            params![plan_id, plan_name, price_usd],
        )?;
        Ok(())
    }

    /// Insert a subscription. Its price comes from `raw_plans`, so
    /// `monthly_price` is ignored here.
    pub fn insert_subscription(&self, sub: &SubscriptionSnapshot) -> GenResult<()> {
        self.conn.execute(
            "INSERT INTO raw_subscriptions
                (subscription_id, user_id, plan_id, start_at, end_at, status)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                sub.subscription_id,
                sub.user_id,
                sub.plan_id,
                calendar::format_date(sub.start_date),
                sub.end_date.map(calendar::format_date),
                sub.status,
            ],
        )?;
        Ok(())
    }
}
