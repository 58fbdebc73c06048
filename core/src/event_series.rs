//! Daily product-usage events.
//!
//! Each user-day draws a capped, usage-weighted event count. This is
//! deliberately not a Poisson process: the count is
//! `min(cap, floor(u * λ * multiplier))` with one uniform draw `u`, and
//! that exact shape is what keeps seeded runs reproducible.

use crate::{
    calendar::{self, Window, MINUTES_PER_DAY},
    config::EventModel,
    error::GenResult,
    rng::GenRng,
    sink::{self, SinkRow, TableRef, EVENTS_TABLE},
    source::UserSnapshot,
    types::{Timestamp, UserId},
};
use rusqlite::types::Value;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventProperties {
    pub source: String,
    pub usage_score: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub feature: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeneratedEvent {
    pub event_id: String,
    pub user_id: UserId,
    pub event_time: Timestamp,
    pub event_name: String,
    pub properties: EventProperties,
}

impl GeneratedEvent {
    /// `evt_<user>_<YYYYMMDDHHMM>_<name>_<seq>`; `seq` is the event's index
    /// within its user-day, so one user-day never repeats an id.
    pub fn make_id(user_id: &str, event_time: Timestamp, event_name: &str, seq: usize) -> String {
        format!(
            "evt_{user_id}_{}_{event_name}_{seq}",
            calendar::minute_stamp(event_time)
        )
    }
}

impl SinkRow for GeneratedEvent {
    const TABLE: TableRef = EVENTS_TABLE;
    const COLUMNS: &'static [&'static str] =
        &["event_id", "user_id", "event_time", "event_name", "properties_json"];
    const PRIMARY_KEY: &'static [&'static str] = &["event_id"];

    fn values(&self) -> GenResult<Vec<Value>> {
        Ok(vec![
            sink::text(&self.event_id),
            sink::text(&self.user_id),
            sink::timestamp(self.event_time),
            sink::text(&self.event_name),
            Value::Text(serde_json::to_string(&self.properties)?),
        ])
    }
}

/// λ: expected events per day for a usage score in [0, 100].
pub fn expected_daily_events(usage_score: f64, model: &EventModel) -> f64 {
    model.base_rate + (usage_score / 100.0) * model.usage_span
}

/// Event count for one user-day given the day's uniform draw.
pub fn daily_event_count(uniform: f64, usage_score: f64, model: &EventModel) -> usize {
    let raw = (uniform * expected_daily_events(usage_score, model) * model.draw_multiplier).floor();
    (raw.max(0.0) as usize).min(model.max_per_day)
}

/// Generate events day-major, then user, consuming draws in that order.
pub fn generate_events(
    users: &[UserSnapshot],
    window: &Window,
    model: &EventModel,
    rng: &mut GenRng,
) -> Vec<GeneratedEvent> {
    let mut out = Vec::new();
    for day in window.days() {
        for user in users {
            let n = daily_event_count(rng.next_f64(), user.usage_score, model);
            for seq in 0..n {
                let event_time = calendar::at_minute(day, rng.randint(0, MINUTES_PER_DAY - 1));
                let event_name = rng.choice(&model.event_names).clone();
                let feature = if event_name == model.feature_event {
                    Some(rng.choice(&model.features).clone())
                } else {
                    None
                };
                out.push(GeneratedEvent {
                    event_id: GeneratedEvent::make_id(&user.user_id, event_time, &event_name, seq),
                    user_id: user.user_id.clone(),
                    event_time,
                    properties: EventProperties {
                        source: model.source_tag.clone(),
                        usage_score: user.usage_score.round_ties_even() as i64,
                        feature,
                    },
                    event_name,
                });
            }
        }
    }
    log::debug!("events: {} rows over {} days", out.len(), window.day_count());
    out
}
