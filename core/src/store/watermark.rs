use super::WarehouseStore;
use crate::{
    calendar,
    error::{GenError, GenResult},
    types::Timestamp,
    watermark::WatermarkStore,
};
use rusqlite::{params, OptionalExtension};

impl WatermarkStore for WarehouseStore {
    fn get_last_run(&self, pipeline: &str) -> GenResult<Option<Timestamp>> {
        let raw: Option<String> = self
            .conn
            .query_row(
                "SELECT last_run_at FROM raw_etl_run_log WHERE pipeline = ?1",
                params![pipeline],
                |row| row.get(0),
            )
            .optional()?;
        raw.map(|text| {
            calendar::parse_timestamp(&text).ok_or_else(|| {
                GenError::malformed(
                    "raw_etl_run_log",
                    pipeline,
                    format!("unparseable last_run_at {text:?}"),
                )
            })
        })
        .transpose()
    }

    fn set_last_run(&self, pipeline: &str, at: Timestamp) -> GenResult<()> {
        self.conn.execute(
            "INSERT INTO raw_etl_run_log (pipeline, last_run_at) VALUES (?1, ?2)
             ON CONFLICT(pipeline) DO UPDATE SET last_run_at = excluded.last_run_at",
            params![pipeline, calendar::format_precise(at)],
        )?;
        Ok(())
    }

    fn clear(&self, pipeline: &str) -> GenResult<()> {
        self.conn.execute(
            "DELETE FROM raw_etl_run_log WHERE pipeline = ?1",
            params![pipeline],
        )?;
        Ok(())
    }
}
