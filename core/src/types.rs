//! Shared primitive types used across the generator.

/// Naive local wall-clock time, matching the warehouse timestamp columns.
pub type Timestamp = chrono::NaiveDateTime;

pub type UserId = String;

pub type SubscriptionId = String;

/// Name of a generation pipeline; the watermark key.
pub type PipelineName = String;

/// Pipeline name used when the caller does not pick one.
pub const DEFAULT_PIPELINE: &str = "generate";
