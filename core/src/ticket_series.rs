//! Support tickets: one Bernoulli trial per user-day.
//!
//! Draw order on occurrence: created minute, resolution delay, CSAT
//! jitter, then category.

use crate::{
    calendar::{self, Window, MINUTES_PER_DAY},
    config::TicketModel,
    error::GenResult,
    rng::GenRng,
    sink::{self, SinkRow, TableRef, TICKETS_TABLE},
    source::UserSnapshot,
    types::{Timestamp, UserId},
};
use chrono::Duration;
use rusqlite::types::Value;
use serde::{Deserialize, Serialize};

pub const CSAT_MIN: i64 = 1;
pub const CSAT_MAX: i64 = 5;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeneratedTicket {
    pub ticket_id: String,
    pub user_id: UserId,
    pub created_at: Timestamp,
    pub category: String,
    pub resolved_at: Timestamp,
    pub csat: u8,
}

impl GeneratedTicket {
    pub fn make_id(user_id: &str, created_at: Timestamp) -> String {
        format!("tkt_{user_id}_{}", calendar::minute_stamp(created_at))
    }
}

impl SinkRow for GeneratedTicket {
    const TABLE: TableRef = TICKETS_TABLE;
    const COLUMNS: &'static [&'static str] = &[
        "ticket_id",
        "user_id",
        "created_at",
        "category",
        "resolved_at",
        "csat",
    ];
    const PRIMARY_KEY: &'static [&'static str] = &["ticket_id"];

    fn values(&self) -> GenResult<Vec<Value>> {
        Ok(vec![
            sink::text(&self.ticket_id),
            sink::text(&self.user_id),
            sink::timestamp(self.created_at),
            sink::text(&self.category),
            sink::timestamp(self.resolved_at),
            Value::Integer(self.csat as i64),
        ])
    }
}

/// Daily probability of a ticket, rising as usage or NPS drop.
pub fn ticket_probability(usage_score: f64, nps_score: f64, model: &TicketModel) -> f64 {
    let p = model.base_rate
        + (model.usage_pivot - usage_score).max(0.0) / model.usage_divisor
        + (model.nps_pivot - nps_score).max(0.0) / model.nps_divisor;
    p.min(model.rate_cap)
}

/// `clamp(round(nps/2 + jitter), 1, 5)`; halves round to even.
pub fn csat_score(nps_score: f64, jitter: i64) -> u8 {
    let raw = (nps_score / 2.0 + jitter as f64).round_ties_even() as i64;
    raw.clamp(CSAT_MIN, CSAT_MAX) as u8
}

/// Generate tickets day-major, then user.
pub fn generate_tickets(
    users: &[UserSnapshot],
    window: &Window,
    model: &TicketModel,
    rng: &mut GenRng,
) -> Vec<GeneratedTicket> {
    let mut out = Vec::new();
    for day in window.days() {
        for user in users {
            let p = ticket_probability(user.usage_score, user.nps_score, model);
            if !rng.chance(p) {
                continue;
            }
            let created_at = calendar::at_minute(day, rng.randint(0, MINUTES_PER_DAY - 1));
            let resolve_hours = rng.randint(model.resolve_hours.min, model.resolve_hours.max);
            let csat = csat_score(user.nps_score, *rng.choice(&model.csat_jitter));
            let category = rng.choice(&model.categories).clone();
            out.push(GeneratedTicket {
                ticket_id: GeneratedTicket::make_id(&user.user_id, created_at),
                user_id: user.user_id.clone(),
                created_at,
                category,
                resolved_at: created_at + Duration::hours(resolve_hours),
                csat,
            });
        }
    }
    log::debug!("tickets: {} rows over {} days", out.len(), window.day_count());
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn probability_floor_and_cap() {
        let m = TicketModel::default();
        assert!((ticket_probability(90.0, 9.0, &m) - 0.002).abs() < 1e-12);
        // 0.002 + 30/20000 + 4/5000 = 0.0043
        assert!((ticket_probability(10.0, 2.0, &m) - 0.0043).abs() < 1e-12);
        // everything maxed out still caps at 0.02
        let mut loud = m.clone();
        loud.base_rate = 0.5;
        assert!((ticket_probability(0.0, 0.0, &loud) - 0.02).abs() < 1e-12);
    }

    #[test]
    fn csat_clamps_into_one_to_five() {
        assert_eq!(csat_score(0.0, -1), 1);
        assert_eq!(csat_score(10.0, 1), 5);
        assert_eq!(csat_score(7.0, 0), 4); // 3.5 -> 4
        assert_eq!(csat_score(6.0, -1), 2);
    }

    #[test]
    fn csat_halves_round_to_even() {
        assert_eq!(csat_score(5.0, 0), 2, "2.5 rounds down to 2");
        assert_eq!(csat_score(9.0, 0), 4, "4.5 rounds down to 4");
        assert_eq!(csat_score(3.0, 0), 2, "1.5 rounds up to 2");
        assert_eq!(csat_score(5.0, 1), 4, "3.5 rounds up to 4");
        assert_eq!(csat_score(1.0, 0), 1, "0.5 rounds to 0, then clamps to 1");
    }
}
