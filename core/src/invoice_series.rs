//! Monthly invoices per subscription.
//!
//! One invoice per subscription per calendar month, keyed
//! `inv_<subscription>_<YYYYMM>`, so repeated generation over the same
//! month can never produce a second row for it.

use crate::{
    calendar::{self, Window},
    config::{AttributeDefaults, InvoiceModel},
    error::GenResult,
    rng::GenRng,
    sink::{self, SinkRow, TableRef, INVOICES_TABLE},
    source::{SubscriptionSnapshot, UserSnapshot},
    types::{SubscriptionId, Timestamp},
};
use chrono::{Duration, NaiveDate};
use rusqlite::types::Value;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Exactly one of paid/failed is set; a failure always carries a reason.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum InvoiceOutcome {
    Paid { paid_at: Timestamp },
    Failed { failed_at: Timestamp, reason: String },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeneratedInvoice {
    pub invoice_id: String,
    pub subscription_id: SubscriptionId,
    pub amount: f64,
    pub issued_at: Timestamp,
    pub outcome: InvoiceOutcome,
}

impl GeneratedInvoice {
    pub fn make_id(subscription_id: &str, month_start: NaiveDate) -> String {
        format!("inv_{subscription_id}_{}", calendar::month_stamp(month_start))
    }

    pub fn paid_at(&self) -> Option<Timestamp> {
        match &self.outcome {
            InvoiceOutcome::Paid { paid_at } => Some(*paid_at),
            InvoiceOutcome::Failed { .. } => None,
        }
    }

    pub fn failed_at(&self) -> Option<Timestamp> {
        match &self.outcome {
            InvoiceOutcome::Failed { failed_at, .. } => Some(*failed_at),
            InvoiceOutcome::Paid { .. } => None,
        }
    }

    pub fn failure_reason(&self) -> Option<&str> {
        match &self.outcome {
            InvoiceOutcome::Failed { reason, .. } => Some(reason.as_str()),
            InvoiceOutcome::Paid { .. } => None,
        }
    }

    pub fn is_failed(&self) -> bool {
        matches!(self.outcome, InvoiceOutcome::Failed { .. })
    }
}

impl SinkRow for GeneratedInvoice {
    const TABLE: TableRef = INVOICES_TABLE;
    const COLUMNS: &'static [&'static str] = &[
        "invoice_id",
        "subscription_id",
        "amount_usd",
        "issued_at",
        "paid_at",
        "failed_at",
        "failure_reason",
    ];
    const PRIMARY_KEY: &'static [&'static str] = &["invoice_id"];

    fn values(&self) -> GenResult<Vec<Value>> {
        Ok(vec![
            sink::text(&self.invoice_id),
            sink::text(&self.subscription_id),
            Value::Real(self.amount),
            sink::timestamp(self.issued_at),
            sink::opt_timestamp(self.paid_at()),
            sink::opt_timestamp(self.failed_at()),
            sink::opt_text(self.failure_reason()),
        ])
    }
}

/// Probability that an invoice fails, rising as usage or NPS drop.
pub fn failure_probability(usage_score: f64, nps_score: f64, model: &InvoiceModel) -> f64 {
    let p = model.failure_base
        + (model.usage_pivot - usage_score).max(0.0) / model.usage_divisor
        + (model.nps_pivot - nps_score).max(0.0) / model.nps_divisor;
    p.min(model.failure_cap)
}

/// Generate invoices subscription-major, then month.
///
/// `invoice_start` is the window start after the mid-month rule has been
/// applied (see `calendar::invoice_window_start`). Subscriptions of users
/// missing from `users` are billed with the attribute defaults.
pub fn generate_invoices(
    subscriptions: &[SubscriptionSnapshot],
    users: &[UserSnapshot],
    window: &Window,
    invoice_start: NaiveDate,
    model: &InvoiceModel,
    defaults: &AttributeDefaults,
    rng: &mut GenRng,
) -> Vec<GeneratedInvoice> {
    let lookup: HashMap<&str, &UserSnapshot> =
        users.iter().map(|u| (u.user_id.as_str(), u)).collect();

    let mut out = Vec::new();
    for sub in subscriptions {
        let from = sub.start_date.max(invoice_start);
        let to = sub.end_date.unwrap_or(window.end).min(window.end);
        if from > to {
            continue;
        }

        let (usage, nps) = lookup
            .get(sub.user_id.as_str())
            .map(|u| (u.usage_score, u.nps_score))
            .unwrap_or((defaults.usage_score, defaults.nps_score));
        let p_fail = failure_probability(usage, nps, model);

        for month_start in calendar::month_starts_between(from, to) {
            let issued_at = calendar::at_hour(month_start, model.issue_hour);
            let outcome = if rng.chance(p_fail) {
                let hours = rng.randint(model.failed_delay_hours.min, model.failed_delay_hours.max);
                InvoiceOutcome::Failed {
                    failed_at: issued_at + Duration::hours(hours),
                    reason: rng.choice(&model.failure_reasons).clone(),
                }
            } else {
                let hours = rng.randint(model.paid_delay_hours.min, model.paid_delay_hours.max);
                InvoiceOutcome::Paid {
                    paid_at: issued_at + Duration::hours(hours),
                }
            };
            out.push(GeneratedInvoice {
                invoice_id: GeneratedInvoice::make_id(&sub.subscription_id, month_start),
                subscription_id: sub.subscription_id.clone(),
                amount: sub.monthly_price,
                issued_at,
                outcome,
            });
        }
    }
    log::debug!(
        "invoices: {} rows for {} subscriptions from {invoice_start}",
        out.len(),
        subscriptions.len()
    );
    out
}
