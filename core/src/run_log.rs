//! Audit trail of generation runs.
//!
//! Purely descriptive: window resolution reads the watermark, never this log.

use crate::{
    calendar::Window,
    controller::{GenerateRequest, GenerateSummary, SinkCounts},
    types::{PipelineName, Timestamp},
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    Succeeded,
    Failed,
}

impl RunStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Succeeded => "succeeded",
            Self::Failed => "failed",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "succeeded" => Some(Self::Succeeded),
            "failed" => Some(Self::Failed),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunRecord {
    pub run_id: String,
    pub pipeline: PipelineName,
    pub started_at: Timestamp,
    pub finished_at: Timestamp,
    pub window: Option<Window>,
    pub seed: u64,
    pub sample_size: usize,
    pub force_rebuild: bool,
    pub status: RunStatus,
    pub inserted: SinkCounts,
    pub error: Option<String>,
}

impl RunRecord {
    pub fn new_run_id() -> String {
        Uuid::new_v4().to_string()
    }

    pub fn succeeded(
        pipeline: &str,
        request: &GenerateRequest,
        started_at: Timestamp,
        finished_at: Timestamp,
        summary: &GenerateSummary,
    ) -> Self {
        Self {
            run_id: Self::new_run_id(),
            pipeline: pipeline.to_string(),
            started_at,
            finished_at,
            window: Some(summary.window),
            seed: request.seed,
            sample_size: request.sample_size,
            force_rebuild: request.force_rebuild,
            status: RunStatus::Succeeded,
            inserted: summary.inserted,
            error: None,
        }
    }

    pub fn failed(
        pipeline: &str,
        request: &GenerateRequest,
        started_at: Timestamp,
        finished_at: Timestamp,
        error: &dyn std::fmt::Display,
    ) -> Self {
        Self {
            run_id: Self::new_run_id(),
            pipeline: pipeline.to_string(),
            started_at,
            finished_at,
            window: None,
            seed: request.seed,
            sample_size: request.sample_size,
            force_rebuild: request.force_rebuild,
            status: RunStatus::Failed,
            inserted: SinkCounts::default(),
            error: Some(error.to_string()),
        }
    }
}
