//! Read-back queries over the generated tables, for verification and
//! the runner's summary.

use super::{checked_ident, WarehouseStore};
use crate::{
    calendar,
    error::{GenError, GenResult},
    event_series::{EventProperties, GeneratedEvent},
    invoice_series::{GeneratedInvoice, InvoiceOutcome},
    sink::TableRef,
    ticket_series::GeneratedTicket,
    types::Timestamp,
};
use rusqlite::params;

fn ts(table: &str, row_id: &str, column: &str, text: &str) -> GenResult<Timestamp> {
    calendar::parse_timestamp(text).ok_or_else(|| {
        GenError::malformed(table, row_id, format!("{column}={text:?} is not a timestamp"))
    })
}

fn opt_ts(table: &str, row_id: &str, column: &str, text: Option<String>) -> GenResult<Option<Timestamp>> {
    text.map(|t| ts(table, row_id, column, &t)).transpose()
}

impl WarehouseStore {
    pub fn count_rows(&self, table: TableRef) -> GenResult<i64> {
        let sql = format!(
            "SELECT COUNT(*) FROM {}.{}",
            checked_ident(table.schema)?,
            checked_ident(table.table)?
        );
        let n: i64 = self.conn.query_row(&sql, [], |row| row.get(0))?;
        Ok(n)
    }

    pub fn events_for_user(&self, user_id: &str) -> GenResult<Vec<GeneratedEvent>> {
        let mut stmt = self.conn.prepare(
            "SELECT event_id, user_id, event_time, event_name, properties_json
             FROM raw_events WHERE user_id = ?1
             ORDER BY event_time ASC, event_id ASC",
        )?;
        let raw = stmt
            .query_map(params![user_id], |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, String>(2)?,
                    row.get::<_, String>(3)?,
                    row.get::<_, Option<String>>(4)?,
                ))
            })?
            .collect::<Result<Vec<_>, _>>()?;

        raw.into_iter()
            .map(|(event_id, user_id, event_time, event_name, props)| {
                let props = props.ok_or_else(|| {
                    GenError::malformed("raw_events", &event_id, "properties_json is null")
                })?;
                let properties: EventProperties = serde_json::from_str(&props)?;
                Ok(GeneratedEvent {
                    event_time: ts("raw_events", &event_id, "event_time", &event_time)?,
                    event_id,
                    user_id,
                    event_name,
                    properties,
                })
            })
            .collect()
    }

    pub fn invoices_for_subscription(&self, subscription_id: &str) -> GenResult<Vec<GeneratedInvoice>> {
        let mut stmt = self.conn.prepare(
            "SELECT invoice_id, subscription_id, amount_usd, issued_at,
                    paid_at, failed_at, failure_reason
             FROM raw_invoices WHERE subscription_id = ?1
             ORDER BY issued_at ASC",
        )?;
        let raw = stmt
            .query_map(params![subscription_id], |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, f64>(2)?,
                    row.get::<_, String>(3)?,
                    row.get::<_, Option<String>>(4)?,
                    row.get::<_, Option<String>>(5)?,
                    row.get::<_, Option<String>>(6)?,
                ))
            })?
            .collect::<Result<Vec<_>, _>>()?;

        let table = "raw_invoices";
        raw.into_iter()
            .map(|(invoice_id, subscription_id, amount, issued_at, paid_at, failed_at, reason)| {
                let paid_at = opt_ts(table, &invoice_id, "paid_at", paid_at)?;
                let failed_at = opt_ts(table, &invoice_id, "failed_at", failed_at)?;
                let outcome = match (paid_at, failed_at, reason) {
                    (Some(paid_at), None, None) => InvoiceOutcome::Paid { paid_at },
                    (None, Some(failed_at), Some(reason)) => InvoiceOutcome::Failed { failed_at, reason },
                    _ => {
                        return Err(GenError::malformed(
                            table,
                            &invoice_id,
                            "expected exactly one of paid_at / failed_at+failure_reason",
                        ))
                    }
                };
                Ok(GeneratedInvoice {
                    issued_at: ts(table, &invoice_id, "issued_at", &issued_at)?,
                    invoice_id,
                    subscription_id,
                    amount,
                    outcome,
                })
            })
            .collect()
    }

    pub fn tickets_for_user(&self, user_id: &str) -> GenResult<Vec<GeneratedTicket>> {
        let mut stmt = self.conn.prepare(
            "SELECT ticket_id, user_id, created_at, category, resolved_at, csat
             FROM raw_tickets WHERE user_id = ?1
             ORDER BY created_at ASC",
        )?;
        let raw = stmt
            .query_map(params![user_id], |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, String>(2)?,
                    row.get::<_, Option<String>>(3)?,
                    row.get::<_, Option<String>>(4)?,
                    row.get::<_, Option<i64>>(5)?,
                ))
            })?
            .collect::<Result<Vec<_>, _>>()?;

        let table = "raw_tickets";
        raw.into_iter()
            .map(|(ticket_id, user_id, created_at, category, resolved_at, csat)| {
                let resolved_at = opt_ts(table, &ticket_id, "resolved_at", resolved_at)?
                    .ok_or_else(|| GenError::malformed(table, &ticket_id, "resolved_at is null"))?;
                let csat = csat
                    .and_then(|c| u8::try_from(c).ok())
                    .ok_or_else(|| GenError::malformed(table, &ticket_id, "csat missing or out of range"))?;
                Ok(GeneratedTicket {
                    created_at: ts(table, &ticket_id, "created_at", &created_at)?,
                    category: category.unwrap_or_default(),
                    ticket_id,
                    user_id,
                    resolved_at,
                    csat,
                })
            })
            .collect()
    }
}
