//! Tunable constants of the probability models.
//!
//! The models are heuristics, not a calibrated simulator. Defaults are the
//! production values; a JSON file may override any subset of them.

use crate::error::{GenError, GenResult};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelConfig {
    pub defaults: AttributeDefaults,
    pub events: EventModel,
    pub invoices: InvoiceModel,
    pub tickets: TicketModel,
}

/// Values used for users with no latent-attribute row.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AttributeDefaults {
    pub usage_score: f64,
    pub nps_score: f64,
    pub base_mrr: f64,
}

impl Default for AttributeDefaults {
    fn default() -> Self {
        Self {
            usage_score: 50.0,
            nps_score: 7.0,
            base_mrr: 0.0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct HourRange {
    pub min: i64,
    pub max: i64,
}

impl HourRange {
    pub const fn new(min: i64, max: i64) -> Self {
        Self { min, max }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EventModel {
    /// Expected events/day at usage 0.
    pub base_rate: f64,
    /// Added to the base rate at usage 100.
    pub usage_span: f64,
    pub draw_multiplier: f64,
    pub max_per_day: usize,
    pub event_names: Vec<String>,
    /// Event name that carries a `feature` property.
    pub feature_event: String,
    pub features: Vec<String>,
    pub source_tag: String,
}

impl Default for EventModel {
    fn default() -> Self {
        Self {
            base_rate: 0.2,
            usage_span: 3.8,
            draw_multiplier: 2.0,
            max_per_day: 6,
            event_names: strings(&[
                "login",
                "feature_used",
                "dashboard_view",
                "export_report",
                "settings_update",
            ]),
            feature_event: "feature_used".into(),
            features: strings(&["automation", "crm_sync", "analytics", "billing", "alerts"]),
            source_tag: "sim".into(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct InvoiceModel {
    pub issue_hour: u32,
    pub failure_base: f64,
    pub usage_pivot: f64,
    pub usage_divisor: f64,
    pub nps_pivot: f64,
    pub nps_divisor: f64,
    pub failure_cap: f64,
    pub paid_delay_hours: HourRange,
    pub failed_delay_hours: HourRange,
    pub failure_reasons: Vec<String>,
}

impl Default for InvoiceModel {
    fn default() -> Self {
        Self {
            issue_hour: 9,
            failure_base: 0.05,
            usage_pivot: 50.0,
            usage_divisor: 200.0,
            nps_pivot: 7.0,
            nps_divisor: 20.0,
            failure_cap: 0.35,
            paid_delay_hours: HourRange::new(1, 24),
            failed_delay_hours: HourRange::new(2, 48),
            failure_reasons: strings(&["expired_card", "insufficient_funds", "bank_declined"]),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TicketModel {
    pub base_rate: f64,
    pub usage_pivot: f64,
    pub usage_divisor: f64,
    pub nps_pivot: f64,
    pub nps_divisor: f64,
    pub rate_cap: f64,
    pub resolve_hours: HourRange,
    pub categories: Vec<String>,
    /// Offsets added to nps/2 before rounding; duplicates weight the draw.
    pub csat_jitter: Vec<i64>,
}

impl Default for TicketModel {
    fn default() -> Self {
        Self {
            base_rate: 0.002,
            usage_pivot: 40.0,
            usage_divisor: 20_000.0,
            nps_pivot: 6.0,
            nps_divisor: 5_000.0,
            rate_cap: 0.02,
            resolve_hours: HourRange::new(2, 72),
            categories: strings(&["billing", "bug", "how_to", "performance"]),
            csat_jitter: vec![-1, 0, 0, 1],
        }
    }
}

impl ModelConfig {
    /// Load overrides from a JSON file. Missing fields keep their defaults.
    pub fn load(path: &str) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| anyhow::anyhow!("Cannot read {path}: {e}"))?;
        let config: ModelConfig = serde_json::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> GenResult<()> {
        let e = &self.events;
        non_empty("events.event_names", &e.event_names)?;
        non_empty("events.features", &e.features)?;
        non_empty("invoices.failure_reasons", &self.invoices.failure_reasons)?;
        non_empty("tickets.categories", &self.tickets.categories)?;
        if self.tickets.csat_jitter.is_empty() {
            return Err(GenError::InvalidConfig("tickets.csat_jitter is empty".into()));
        }
        if e.base_rate < 0.0 || e.usage_span < 0.0 || e.draw_multiplier < 0.0 {
            return Err(GenError::InvalidConfig("event rates must be non-negative".into()));
        }
        if self.invoices.issue_hour > 23 {
            return Err(GenError::InvalidConfig(format!(
                "invoices.issue_hour {} is not an hour of day",
                self.invoices.issue_hour
            )));
        }
        probability("invoices.failure_base", self.invoices.failure_base)?;
        probability("invoices.failure_cap", self.invoices.failure_cap)?;
        probability("tickets.base_rate", self.tickets.base_rate)?;
        probability("tickets.rate_cap", self.tickets.rate_cap)?;
        hours("invoices.paid_delay_hours", self.invoices.paid_delay_hours)?;
        hours("invoices.failed_delay_hours", self.invoices.failed_delay_hours)?;
        hours("tickets.resolve_hours", self.tickets.resolve_hours)?;
        for (name, divisor) in [
            ("invoices.usage_divisor", self.invoices.usage_divisor),
            ("invoices.nps_divisor", self.invoices.nps_divisor),
            ("tickets.usage_divisor", self.tickets.usage_divisor),
            ("tickets.nps_divisor", self.tickets.nps_divisor),
        ] {
            if divisor <= 0.0 {
                return Err(GenError::InvalidConfig(format!("{name} must be > 0")));
            }
        }
        Ok(())
    }
}

fn strings(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}

fn non_empty(name: &str, items: &[String]) -> GenResult<()> {
    if items.is_empty() {
        return Err(GenError::InvalidConfig(format!("{name} is empty")));
    }
    Ok(())
}

fn probability(name: &str, p: f64) -> GenResult<()> {
    if !(0.0..=1.0).contains(&p) {
        return Err(GenError::InvalidConfig(format!("{name}={p} outside [0, 1]")));
    }
    Ok(())
}

fn hours(name: &str, range: HourRange) -> GenResult<()> {
    if range.min < 0 || range.min > range.max {
        return Err(GenError::InvalidConfig(format!(
            "{name} [{}, {}] is not a valid range",
            range.min, range.max
        )));
    }
    Ok(())
}
