//! Per-pipeline watermark: the last instant a generation run committed.
//!
//! Injected into the controller rather than held globally, so runs can be
//! driven against the SQLite store or the in-memory fake below.

use crate::{error::GenResult, types::Timestamp};
use std::{cell::RefCell, collections::HashMap};

pub trait WatermarkStore {
    /// `None` means the pipeline has never completed a run.
    fn get_last_run(&self, pipeline: &str) -> GenResult<Option<Timestamp>>;

    /// Insert or overwrite the pipeline's watermark in a single write.
    fn set_last_run(&self, pipeline: &str, at: Timestamp) -> GenResult<()>;

    /// Forget the pipeline's watermark. Only a forced rebuild does this.
    fn clear(&self, pipeline: &str) -> GenResult<()>;
}

#[derive(Debug, Default)]
pub struct MemoryWatermarkStore {
    marks: RefCell<HashMap<String, Timestamp>>,
}

impl MemoryWatermarkStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl WatermarkStore for MemoryWatermarkStore {
    fn get_last_run(&self, pipeline: &str) -> GenResult<Option<Timestamp>> {
        Ok(self.marks.borrow().get(pipeline).copied())
    }

    fn set_last_run(&self, pipeline: &str, at: Timestamp) -> GenResult<()> {
        self.marks.borrow_mut().insert(pipeline.to_string(), at);
        Ok(())
    }

    fn clear(&self, pipeline: &str) -> GenResult<()> {
        self.marks.borrow_mut().remove(pipeline);
        Ok(())
    }
}
