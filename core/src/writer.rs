//! Conflict-safe, chunked persistence of generated row sets.
//!
//! Each chunk is one atomic insert against the sink. A failing chunk
//! aborts the write, but chunks committed before it stay committed:
//! this is batch-append, not a single transaction. Re-running the same
//! window is safe because existing primary keys are skipped.

use crate::{
    error::{GenError, GenResult},
    sink::{ConflictSkipSink, SinkRow, TableRef},
};
use rusqlite::types::Value;

pub const DEFAULT_CHUNK_SIZE: usize = 5000;

#[derive(Debug, Clone, Copy)]
pub struct ConflictSafeWriter {
    chunk_size: usize,
}

impl Default for ConflictSafeWriter {
    fn default() -> Self {
        Self {
            chunk_size: DEFAULT_CHUNK_SIZE,
        }
    }
}

impl ConflictSafeWriter {
    pub fn new(chunk_size: usize) -> GenResult<Self> {
        if chunk_size == 0 {
            return Err(GenError::InvalidConfig("chunk_size must be > 0".into()));
        }
        Ok(Self { chunk_size })
    }

    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    /// Persist typed rows to their declared table. Returns rows inserted.
    pub fn write<R: SinkRow>(&self, sink: &dyn ConflictSkipSink, rows: &[R]) -> GenResult<usize> {
        let mut inserted = 0;
        for (i, chunk) in rows.chunks(self.chunk_size).enumerate() {
            let values = chunk
                .iter()
                .map(R::values)
                .collect::<GenResult<Vec<_>>>()?;
            inserted += self.write_chunk(sink, R::TABLE, R::COLUMNS, R::PRIMARY_KEY, i, &values)?;
        }
        log::info!("{}: inserted {inserted} of {} rows", R::TABLE, rows.len());
        Ok(inserted)
    }

    /// Untyped form: persist pre-projected rows to an explicit table.
    pub fn write_values(
        &self,
        sink: &dyn ConflictSkipSink,
        table: TableRef,
        columns: &[&str],
        primary_key: &[&str],
        rows: &[Vec<Value>],
    ) -> GenResult<usize> {
        let mut inserted = 0;
        for (i, chunk) in rows.chunks(self.chunk_size).enumerate() {
            inserted += self.write_chunk(sink, table, columns, primary_key, i, chunk)?;
        }
        log::info!("{table}: inserted {inserted} of {} rows", rows.len());
        Ok(inserted)
    }

    fn write_chunk(
        &self,
        sink: &dyn ConflictSkipSink,
        table: TableRef,
        columns: &[&str],
        primary_key: &[&str],
        index: usize,
        chunk: &[Vec<Value>],
    ) -> GenResult<usize> {
        let inserted = sink.insert_ignoring_duplicates(table, columns, primary_key, chunk)?;
        log::debug!(
            "{table}: chunk {index} inserted {inserted}/{} (skipped {})",
            chunk.len(),
            chunk.len().saturating_sub(inserted)
        );
        Ok(inserted)
    }
}
