//! SQLite persistence layer.
//!
//! RULE: Only the store talks to the database.
//! The controller and generator reach it through the WatermarkStore,
//! SourceReader and ConflictSkipSink traits; they never execute SQL.

mod inspect;
mod run_log;
mod sink;
mod source;
mod watermark;

use crate::error::{GenError, GenResult};
use rusqlite::Connection;

pub struct WarehouseStore {
    conn: Connection,
}

impl WarehouseStore {
    pub fn open(path: &str) -> GenResult<Self> {
        let conn = Connection::open_with_flags(
            path,
            rusqlite::OpenFlags::SQLITE_OPEN_READ_WRITE
                | rusqlite::OpenFlags::SQLITE_OPEN_CREATE
                | rusqlite::OpenFlags::SQLITE_OPEN_URI,
        )?;
        // WAL mode only for real files (shared-memory and :memory: ignore it).
        let _ = conn.execute_batch("PRAGMA journal_mode=WAL;");
        conn.execute_batch("PRAGMA foreign_keys=ON;")?;
        Ok(Self { conn })
    }

    /// Open an in-memory database (used in tests).
    pub fn in_memory() -> GenResult<Self> {
        let conn = Connection::open(":memory:")?;
        conn.execute_batch("PRAGMA foreign_keys=ON;")?;
        Ok(Self { conn })
    }

    /// Apply all schema migrations in order. Safe to call repeatedly.
    pub fn migrate(&self) -> GenResult<()> {
        self.conn
            .execute_batch(include_str!("../../../migrations/001_raw_sources.sql"))?;
        self.conn
            .execute_batch(include_str!("../../../migrations/002_generated_series.sql"))?;
        self.conn
            .execute_batch(include_str!("../../../migrations/003_run_log.sql"))?;
        Ok(())
    }
}

/// Identifiers are interpolated into SQL, so only plain names pass.
fn checked_ident(name: &str) -> GenResult<&str> {
    let ok = !name.is_empty()
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_')
        && !name.starts_with(|c: char| c.is_ascii_digit());
    if ok {
        Ok(name)
    } else {
        Err(GenError::InvalidConfig(format!("not a plain SQL identifier: {name:?}")))
    }
}
