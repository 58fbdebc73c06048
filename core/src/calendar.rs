//! Calendar helpers: generation windows, day and month iteration,
//! and the text encodings used by the warehouse columns.

use crate::types::Timestamp;
use chrono::{Datelike, Duration, NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};

pub const DATE_FORMAT: &str = "%Y-%m-%d";
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";
/// Watermarks keep sub-second precision so consecutive runs stay ordered.
pub const PRECISE_TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.f";

pub const MINUTES_PER_DAY: i64 = 1440;

/// Inclusive `[start, end]` range of calendar days covered by one run.
///
/// A window whose start lies after its end is empty; generating over it
/// yields no rows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Window {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl Window {
    pub fn new(start: NaiveDate, end: NaiveDate) -> Self {
        Self { start, end }
    }

    pub fn is_empty(&self) -> bool {
        self.start > self.end
    }

    pub fn day_count(&self) -> i64 {
        if self.is_empty() {
            0
        } else {
            (self.end - self.start).num_days() + 1
        }
    }

    pub fn days(&self) -> impl Iterator<Item = NaiveDate> {
        date_range(self.start, self.end)
    }
}

impl std::fmt::Display for Window {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{} .. {}]", self.start, self.end)
    }
}

/// Every day from `start` to `end`, inclusive.
pub fn date_range(start: NaiveDate, end: NaiveDate) -> impl Iterator<Item = NaiveDate> {
    start.iter_days().take_while(move |d| *d <= end)
}

pub fn first_of_month(day: NaiveDate) -> NaiveDate {
    day - Duration::days(day.day0() as i64)
}

pub fn next_month_start(day: NaiveDate) -> NaiveDate {
    first_of_month(first_of_month(day) + Duration::days(32))
}

/// First day of every month touched by `[start, end]`.
///
/// The month containing `start` is included even when `start` falls
/// mid-month.
pub fn month_starts_between(start: NaiveDate, end: NaiveDate) -> Vec<NaiveDate> {
    let mut out = Vec::new();
    let mut current = first_of_month(start);
    let last = first_of_month(end);
    while current <= last {
        out.push(current);
        current = next_month_start(current);
    }
    out
}

/// Start of the invoice window for a run.
///
/// An incremental run whose window opens mid-month has already billed
/// that month, so invoicing resumes at the next month start. First-ever
/// and rebuild runs use the window start as-is.
pub fn invoice_window_start(window_start: NaiveDate, incremental: bool) -> NaiveDate {
    if incremental && window_start.day() != 1 {
        next_month_start(window_start)
    } else {
        window_start
    }
}

pub fn start_of_day(day: NaiveDate) -> NaiveDateTime {
    day.and_hms_opt(0, 0, 0).expect("midnight is always a valid time")
}

pub fn at_minute(day: NaiveDate, minute_of_day: i64) -> NaiveDateTime {
    start_of_day(day) + Duration::minutes(minute_of_day)
}

pub fn at_hour(day: NaiveDate, hour: u32) -> NaiveDateTime {
    start_of_day(day) + Duration::hours(hour as i64)
}

/// `YYYYMMDDHHMM`, the minute stamp embedded in event and ticket ids.
pub fn minute_stamp(ts: Timestamp) -> String {
    ts.format("%Y%m%d%H%M").to_string()
}

/// `YYYYMM`, the billing-month stamp embedded in invoice ids.
pub fn month_stamp(day: NaiveDate) -> String {
    day.format("%Y%m").to_string()
}

pub fn format_date(day: NaiveDate) -> String {
    day.format(DATE_FORMAT).to_string()
}

pub fn format_timestamp(ts: Timestamp) -> String {
    ts.format(TIMESTAMP_FORMAT).to_string()
}

pub fn format_precise(ts: Timestamp) -> String {
    ts.format(PRECISE_TIMESTAMP_FORMAT).to_string()
}

/// Parse a timestamp column. Accepts a space or `T` separator, optional
/// fractional seconds, and bare dates (read as midnight).
pub fn parse_timestamp(text: &str) -> Option<Timestamp> {
    let text = text.trim();
    NaiveDateTime::parse_from_str(text, PRECISE_TIMESTAMP_FORMAT)
        .or_else(|_| NaiveDateTime::parse_from_str(text, "%Y-%m-%dT%H:%M:%S%.f"))
        .ok()
        .or_else(|| {
            NaiveDate::parse_from_str(text, DATE_FORMAT)
                .ok()
                .map(start_of_day)
        })
}

/// Parse a date column. Timestamps are truncated to their date.
pub fn parse_date(text: &str) -> Option<NaiveDate> {
    let text = text.trim();
    match NaiveDate::parse_from_str(text, DATE_FORMAT) {
        Ok(d) => Some(d),
        Err(_) if text.len() > 10 => parse_timestamp(text).map(|ts| ts.date()),
        Err(_) => None,
    }
}
