//! Append-only sinks and the conflict-skip insert capability.
//!
//! RULE: a sink never updates an existing row. A row whose primary key
//! is already present is skipped silently and simply not counted.

use crate::{
    calendar,
    error::{GenError, GenResult},
    types::Timestamp,
};
use rusqlite::types::Value;
use std::{
    cell::{Cell, RefCell},
    collections::{BTreeMap, HashMap},
};

/// A `schema.table` target. SQLite's `main` schema stands in for the
/// warehouse's `raw` schema.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TableRef {
    pub schema: &'static str,
    pub table: &'static str,
}

impl TableRef {
    pub const fn main(table: &'static str) -> Self {
        Self {
            schema: "main",
            table,
        }
    }
}

impl std::fmt::Display for TableRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}.{}", self.schema, self.table)
    }
}

pub const EVENTS_TABLE: TableRef = TableRef::main("raw_events");
pub const INVOICES_TABLE: TableRef = TableRef::main("raw_invoices");
pub const TICKETS_TABLE: TableRef = TableRef::main("raw_tickets");

/// The three generated sinks, cleared together on a forced rebuild.
pub const GENERATED_TABLES: [TableRef; 3] = [EVENTS_TABLE, INVOICES_TABLE, TICKETS_TABLE];

/// A generated row that knows where and how it is persisted.
pub trait SinkRow {
    const TABLE: TableRef;
    const COLUMNS: &'static [&'static str];
    const PRIMARY_KEY: &'static [&'static str];

    /// Column values in `COLUMNS` order.
    fn values(&self) -> GenResult<Vec<Value>>;
}

/// Bulk insert that ignores rows whose primary key already exists.
pub trait ConflictSkipSink {
    /// Insert `rows` atomically; returns how many were actually inserted.
    fn insert_ignoring_duplicates(
        &self,
        table: TableRef,
        columns: &[&str],
        primary_key: &[&str],
        rows: &[Vec<Value>],
    ) -> GenResult<usize>;

    fn truncate(&self, tables: &[TableRef]) -> GenResult<()>;
}

// ── Value normalization ────────────────────────────────────────

pub fn text(s: &str) -> Value {
    if s.is_empty() {
        Value::Null
    } else {
        Value::Text(s.to_string())
    }
}

pub fn opt_text(s: Option<&str>) -> Value {
    s.map(text).unwrap_or(Value::Null)
}

pub fn timestamp(ts: Timestamp) -> Value {
    Value::Text(calendar::format_timestamp(ts))
}

pub fn opt_timestamp(ts: Option<Timestamp>) -> Value {
    ts.map(timestamp).unwrap_or(Value::Null)
}

// ── In-memory sink ─────────────────────────────────────────────

/// In-process sink tracking rows by primary key. Can be told to fail a
/// specific insert call to exercise partial-write behaviour.
#[derive(Debug, Default)]
pub struct MemorySink {
    tables: RefCell<HashMap<TableRef, BTreeMap<String, Vec<Value>>>>,
    calls: Cell<usize>,
    fail_on_call: Cell<Option<usize>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make the `n`-th insert call (1-based, counted from now on) fail
    /// without writing anything.
    pub fn fail_on_call(&self, n: usize) {
        self.fail_on_call.set(Some(self.calls.get() + n));
    }

    pub fn insert_calls(&self) -> usize {
        self.calls.get()
    }

    pub fn row_count(&self, table: TableRef) -> usize {
        self.tables.borrow().get(&table).map_or(0, BTreeMap::len)
    }
}

fn key_part(v: &Value) -> String {
    match v {
        Value::Null => String::new(),
        Value::Integer(i) => i.to_string(),
        Value::Real(r) => r.to_string(),
        Value::Text(t) => t.clone(),
        Value::Blob(b) => format!("{b:?}"),
    }
}

impl ConflictSkipSink for MemorySink {
    fn insert_ignoring_duplicates(
        &self,
        table: TableRef,
        columns: &[&str],
        primary_key: &[&str],
        rows: &[Vec<Value>],
    ) -> GenResult<usize> {
        let call = self.calls.get() + 1;
        self.calls.set(call);
        if self.fail_on_call.get() == Some(call) {
            return Err(anyhow::anyhow!("injected failure writing {table} (call {call})").into());
        }

        let key_idx = primary_key
            .iter()
            .map(|k| {
                columns.iter().position(|c| c == k).ok_or_else(|| {
                    GenError::InvalidConfig(format!("{table}: key column {k} not in columns"))
                })
            })
            .collect::<GenResult<Vec<_>>>()?;

        if let Some(bad) = rows.iter().find(|r| r.len() != columns.len()) {
            return Err(GenError::InvalidConfig(format!(
                "{table}: row has {} values for {} columns",
                bad.len(),
                columns.len()
            )));
        }

        let mut tables = self.tables.borrow_mut();
        let stored = tables.entry(table).or_default();
        let mut inserted = 0;
        for row in rows {
            let key = key_idx
                .iter()
                .map(|&i| key_part(&row[i]))
                .collect::<Vec<_>>()
                .join("\u{1f}");
            if !stored.contains_key(&key) {
                stored.insert(key, row.clone());
                inserted += 1;
            }
        }
        Ok(inserted)
    }

    fn truncate(&self, tables: &[TableRef]) -> GenResult<()> {
        let mut stored = self.tables.borrow_mut();
        for t in tables {
            stored.remove(t);
        }
        Ok(())
    }
}
