//! The synthetic series generator.
//!
//! DRAW ORDER (fixed, documented, never reordered):
//!   1. Sampling  seeded uniform sample of users, without replacement
//!   2. Events    day-major, then user
//!   3. Invoices  subscription-major, then month
//!   4. Tickets   day-major, then user
//!
//! RULES:
//!   - One GenRng per call, seeded once, threaded through every draw.
//!   - Same (seed, users, subscriptions, window, sample size) gives
//!     row-for-row identical output.
//!   - The generator never touches storage; it returns owned row sets.

use crate::{
    calendar::{self, Window},
    config::ModelConfig,
    event_series::{self, GeneratedEvent},
    invoice_series::{self, GeneratedInvoice},
    rng::GenRng,
    source::{SubscriptionSnapshot, UserSnapshot},
    ticket_series::{self, GeneratedTicket},
};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

#[derive(Debug, Clone)]
pub struct GenerationInput<'a> {
    pub users: &'a [UserSnapshot],
    pub subscriptions: &'a [SubscriptionSnapshot],
    pub window: Window,
    /// A prior watermark existed; enables the mid-month invoice rule.
    pub incremental: bool,
    pub seed: u64,
    /// 0 uses every user.
    pub sample_size: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeneratedBatch {
    pub events: Vec<GeneratedEvent>,
    pub invoices: Vec<GeneratedInvoice>,
    pub tickets: Vec<GeneratedTicket>,
    pub sampled_users: usize,
    /// Invoice window start after the mid-month rule.
    pub invoice_start: NaiveDate,
}

pub struct SeriesGenerator {
    model: ModelConfig,
}

impl SeriesGenerator {
    pub fn new(model: ModelConfig) -> Self {
        Self { model }
    }

    pub fn model(&self) -> &ModelConfig {
        &self.model
    }

    pub fn generate(&self, input: &GenerationInput<'_>) -> GeneratedBatch {
        let mut rng = GenRng::new(input.seed);

        let (users, subscriptions) =
            sample_population(input.users, input.subscriptions, input.sample_size, &mut rng);

        let invoice_start = calendar::invoice_window_start(input.window.start, input.incremental);
        if invoice_start != input.window.start {
            log::info!(
                "invoice window moved from {} to {invoice_start} (month already billed)",
                input.window.start
            );
        }

        let events =
            event_series::generate_events(&users, &input.window, &self.model.events, &mut rng);
        let invoices = invoice_series::generate_invoices(
            &subscriptions,
            &users,
            &input.window,
            invoice_start,
            &self.model.invoices,
            &self.model.defaults,
            &mut rng,
        );
        let tickets =
            ticket_series::generate_tickets(&users, &input.window, &self.model.tickets, &mut rng);

        GeneratedBatch {
            events,
            invoices,
            tickets,
            sampled_users: users.len(),
            invoice_start,
        }
    }
}

/// Restrict users (and their subscriptions) to a seeded sample.
///
/// Sampling happens only when `0 < sample_size < users.len()`; otherwise
/// both inputs are returned whole and no draws are consumed.
pub fn sample_population(
    users: &[UserSnapshot],
    subscriptions: &[SubscriptionSnapshot],
    sample_size: usize,
    rng: &mut GenRng,
) -> (Vec<UserSnapshot>, Vec<SubscriptionSnapshot>) {
    if sample_size == 0 || sample_size >= users.len() {
        return (users.to_vec(), subscriptions.to_vec());
    }

    let sampled: Vec<UserSnapshot> = rng
        .sample_indices(users.len(), sample_size)
        .into_iter()
        .map(|i| users[i].clone())
        .collect();
    let keep: HashSet<&str> = sampled.iter().map(|u| u.user_id.as_str()).collect();
    let subs = subscriptions
        .iter()
        .filter(|s| keep.contains(s.user_id.as_str()))
        .cloned()
        .collect();
    log::debug!("sampled {} of {} users", sampled.len(), users.len());
    (sampled, subs)
}
