use super::WarehouseStore;
use crate::{
    calendar::{self, Window},
    controller::SinkCounts,
    error::{GenError, GenResult},
    run_log::{RunRecord, RunStatus},
};
use rusqlite::params;

impl WarehouseStore {
    // ── Run history ────────────────────────────────────────────

    pub fn record_run(&self, run: &RunRecord) -> GenResult<()> {
        self.conn.execute(
            "INSERT INTO generation_run (
                run_id, pipeline, started_at, finished_at, window_start, window_end,
                seed, sample_size, force_rebuild, status,
                events_inserted, invoices_inserted, tickets_inserted, error
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14)",
            params![
                run.run_id,
                run.pipeline,
                calendar::format_precise(run.started_at),
                calendar::format_precise(run.finished_at),
                run.window.map(|w| calendar::format_date(w.start)),
                run.window.map(|w| calendar::format_date(w.end)),
                run.seed as i64,
                run.sample_size as i64,
                if run.force_rebuild { 1 } else { 0 },
                run.status.as_str(),
                run.inserted.events as i64,
                run.inserted.invoices as i64,
                run.inserted.tickets as i64,
                run.error,
            ],
        )?;
        Ok(())
    }

    /// Runs for a pipeline, oldest first.
    pub fn runs_for_pipeline(&self, pipeline: &str) -> GenResult<Vec<RunRecord>> {
        let mut stmt = self.conn.prepare(
            "SELECT run_id, pipeline, started_at, finished_at, window_start, window_end,
                    seed, sample_size, force_rebuild, status,
                    events_inserted, invoices_inserted, tickets_inserted, error
             FROM generation_run WHERE pipeline = ?1
             ORDER BY started_at ASC, rowid ASC",
        )?;
        type RawRun = (
            String,
            String,
            String,
            String,
            Option<String>,
            Option<String>,
            i64,
            i64,
            i64,
            String,
            (i64, i64, i64),
            Option<String>,
        );
        let raw: Vec<RawRun> = stmt
            .query_map(params![pipeline], |row| {
                Ok((
                    row.get(0)?,
                    row.get(1)?,
                    row.get(2)?,
                    row.get(3)?,
                    row.get(4)?,
                    row.get(5)?,
                    row.get(6)?,
                    row.get(7)?,
                    row.get(8)?,
                    row.get(9)?,
                    (row.get(10)?, row.get(11)?, row.get(12)?),
                    row.get(13)?,
                ))
            })?
            .collect::<Result<Vec<_>, _>>()?;

        let table = "generation_run";
        raw.into_iter()
            .map(|r| {
                let (run_id, pipeline, started, finished, w_start, w_end) = (r.0, r.1, r.2, r.3, r.4, r.5);
                let bad = |detail: String| GenError::malformed(table, &run_id, detail);
                let started_at = calendar::parse_timestamp(&started)
                    .ok_or_else(|| bad(format!("started_at={started:?}")))?;
                let finished_at = calendar::parse_timestamp(&finished)
                    .ok_or_else(|| bad(format!("finished_at={finished:?}")))?;
                let window = match (w_start.as_deref(), w_end.as_deref()) {
                    (Some(s), Some(e)) => Some(Window::new(
                        calendar::parse_date(s).ok_or_else(|| bad(format!("window_start={s:?}")))?,
                        calendar::parse_date(e).ok_or_else(|| bad(format!("window_end={e:?}")))?,
                    )),
                    _ => None,
                };
                let status =
                    RunStatus::parse(&r.9).ok_or_else(|| bad(format!("status={:?}", r.9)))?;
                let (events, invoices, tickets) = r.10;
                Ok(RunRecord {
                    run_id: run_id.clone(),
                    pipeline,
                    started_at,
                    finished_at,
                    window,
                    seed: r.6 as u64,
                    sample_size: r.7 as usize,
                    force_rebuild: r.8 != 0,
                    status,
                    inserted: SinkCounts {
                        events: events as usize,
                        invoices: invoices as usize,
                        tickets: tickets as usize,
                    },
                    error: r.11,
                })
            })
            .collect()
    }
}
