//! Incremental synthetic-series generator for the SaaS analytics warehouse.
//!
//! One run reads the upstream user and subscription sources, synthesizes
//! usage events, invoices and support tickets for the window that is new
//! since the pipeline's watermark, appends them with conflict-skip writes,
//! and only then advances the watermark.

pub mod calendar;
pub mod clock;
pub mod config;
pub mod controller;
pub mod error;
pub mod event_series;
pub mod generator;
pub mod invoice_series;
pub mod rng;
pub mod run_log;
pub mod sink;
pub mod source;
pub mod store;
pub mod ticket_series;
pub mod types;
pub mod watermark;
pub mod writer;
