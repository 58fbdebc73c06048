//! The run controller: one incremental generation run, end to end.
//!
//! STATE ORDER (fixed):
//!   IDLE
//!     -> FORCE_REBUILD        (only when requested: truncate sinks, clear watermark)
//!     -> RESOLVING_WINDOW
//!     -> READING_SOURCES
//!     -> GENERATING
//!     -> WRITING              (events, invoices, tickets)
//!     -> ADVANCING_WATERMARK
//!     -> DONE
//!
//! RULES:
//!   - The watermark moves only after all three writes succeed, and never
//!     backwards: a clock behind it yields an empty window.
//!   - A failed run leaves the watermark untouched; the next run retries
//!     the same window and relies on conflict-skip writes.
//!   - At most one run per pipeline may be in flight. Callers serialize.

use crate::{
    calendar::Window,
    clock::Clock,
    config::ModelConfig,
    error::GenResult,
    generator::{GenerationInput, SeriesGenerator},
    sink::{ConflictSkipSink, GENERATED_TABLES},
    source::{self, SourceReader},
    types::{PipelineName, Timestamp},
    watermark::WatermarkStore,
    writer::ConflictSafeWriter,
};
use chrono::{Duration, NaiveDate};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunState {
    Idle,
    ForceRebuild,
    ResolvingWindow,
    ReadingSources,
    Generating,
    Writing,
    AdvancingWatermark,
    Done,
}

/// The generation invocation surface.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerateRequest {
    pub lookback_days: u32,
    /// 0 uses every user.
    pub sample_size: usize,
    pub seed: u64,
    pub force_rebuild: bool,
}

impl Default for GenerateRequest {
    fn default() -> Self {
        Self {
            lookback_days: 7,
            sample_size: 5000,
            seed: 42,
            force_rebuild: false,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SinkCounts {
    pub events: usize,
    pub invoices: usize,
    pub tickets: usize,
}

impl SinkCounts {
    pub fn total(&self) -> usize {
        self.events + self.invoices + self.tickets
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenerateSummary {
    pub window: Window,
    pub incremental: bool,
    pub invoice_start: NaiveDate,
    pub sampled_users: usize,
    pub generated: SinkCounts,
    pub inserted: SinkCounts,
    /// The instant stamped as the new watermark; `None` for replays.
    pub watermark: Option<Timestamp>,
}

impl GenerateSummary {
    pub fn events_inserted(&self) -> usize {
        self.inserted.events
    }

    pub fn invoices_inserted(&self) -> usize {
        self.inserted.invoices
    }

    pub fn tickets_inserted(&self) -> usize {
        self.inserted.tickets
    }
}

/// Window for the next run: the full lookback on a first-ever run,
/// otherwise the day after the watermark through today.
pub fn resolve_window(last_run: Option<Timestamp>, now: Timestamp, lookback_days: u32) -> Window {
    let start = match last_run {
        None => (now - Duration::days(lookback_days as i64)).date(),
        Some(prev) => prev.date() + Duration::days(1),
    };
    Window::new(start, now.date())
}

pub struct RunController<'a> {
    pipeline: PipelineName,
    watermarks: &'a dyn WatermarkStore,
    source: &'a dyn SourceReader,
    sink: &'a dyn ConflictSkipSink,
    clock: &'a dyn Clock,
    generator: SeriesGenerator,
    writer: ConflictSafeWriter,
    state: RunState,
}

impl<'a> RunController<'a> {
    pub fn new(
        pipeline: &str,
        watermarks: &'a dyn WatermarkStore,
        source: &'a dyn SourceReader,
        sink: &'a dyn ConflictSkipSink,
        clock: &'a dyn Clock,
    ) -> Self {
        Self {
            pipeline: pipeline.to_string(),
            watermarks,
            source,
            sink,
            clock,
            generator: SeriesGenerator::new(ModelConfig::default()),
            writer: ConflictSafeWriter::default(),
            state: RunState::Idle,
        }
    }

    pub fn with_model(mut self, model: ModelConfig) -> GenResult<Self> {
        model.validate()?;
        self.generator = SeriesGenerator::new(model);
        Ok(self)
    }

    pub fn with_writer(mut self, writer: ConflictSafeWriter) -> Self {
        self.writer = writer;
        self
    }

    pub fn pipeline(&self) -> &str {
        &self.pipeline
    }

    /// Last state reached. After a failure this is the failing stage.
    pub fn state(&self) -> RunState {
        self.state
    }

    /// Run one incremental generation and advance the watermark.
    pub fn generate(&mut self, request: &GenerateRequest) -> GenResult<GenerateSummary> {
        self.enter(RunState::Idle);
        let now = self.clock.now();

        let last_run = if request.force_rebuild {
            self.enter(RunState::ForceRebuild);
            self.sink.truncate(&GENERATED_TABLES)?;
            self.watermarks.clear(&self.pipeline)?;
            None
        } else {
            self.watermarks.get_last_run(&self.pipeline)?
        };

        self.enter(RunState::ResolvingWindow);
        if let Some(previous) = last_run.filter(|previous| now < *previous) {
            log::warn!(
                "pipeline={} clock {now} is behind watermark {previous}; watermark stays put",
                self.pipeline
            );
        }
        let window = resolve_window(last_run, now, request.lookback_days);
        if window.is_empty() {
            log::warn!(
                "pipeline={} window {window} is empty; nothing new since {:?}",
                self.pipeline,
                last_run
            );
        }

        let mut summary = self.run_window(
            window,
            last_run.is_some(),
            request.seed,
            request.sample_size,
        )?;

        self.enter(RunState::AdvancingWatermark);
        let watermark = last_run.map_or(now, |previous| previous.max(now));
        if Some(watermark) != last_run {
            self.watermarks.set_last_run(&self.pipeline, watermark)?;
        }
        summary.watermark = Some(watermark);

        self.enter(RunState::Done);
        log::info!(
            "pipeline={} window {} inserted events={} invoices={} tickets={}",
            self.pipeline,
            summary.window,
            summary.inserted.events,
            summary.inserted.invoices,
            summary.inserted.tickets
        );
        Ok(summary)
    }

    /// Regenerate an explicit window without reading or moving the
    /// watermark. Rows already present are skipped, so replaying a
    /// committed window inserts nothing.
    pub fn replay_window(
        &mut self,
        window: Window,
        incremental: bool,
        seed: u64,
        sample_size: usize,
    ) -> GenResult<GenerateSummary> {
        self.enter(RunState::Idle);
        let summary = self.run_window(window, incremental, seed, sample_size)?;
        self.enter(RunState::Done);
        Ok(summary)
    }

    fn run_window(
        &mut self,
        window: Window,
        incremental: bool,
        seed: u64,
        sample_size: usize,
    ) -> GenResult<GenerateSummary> {
        self.enter(RunState::ReadingSources);
        let snapshot = source::read_snapshot(self.source, &self.generator.model().defaults)?;

        self.enter(RunState::Generating);
        let batch = self.generator.generate(&GenerationInput {
            users: &snapshot.users,
            subscriptions: &snapshot.subscriptions,
            window,
            incremental,
            seed,
            sample_size,
        });
        let generated = SinkCounts {
            events: batch.events.len(),
            invoices: batch.invoices.len(),
            tickets: batch.tickets.len(),
        };

        self.enter(RunState::Writing);
        let inserted = SinkCounts {
            events: self.writer.write(self.sink, &batch.events)?,
            invoices: self.writer.write(self.sink, &batch.invoices)?,
            tickets: self.writer.write(self.sink, &batch.tickets)?,
        };

        Ok(GenerateSummary {
            window,
            incremental,
            invoice_start: batch.invoice_start,
            sampled_users: batch.sampled_users,
            generated,
            inserted,
            watermark: None,
        })
    }

    fn enter(&mut self, state: RunState) {
        log::info!("pipeline={} {:?} -> {:?}", self.pipeline, self.state, state);
        self.state = state;
    }
}
