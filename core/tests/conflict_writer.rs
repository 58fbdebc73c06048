use chrono::{NaiveDate, NaiveDateTime};
use rusqlite::types::Value;
use synthgen_core::{
    error::{GenError, GenResult},
    event_series::{EventProperties, GeneratedEvent},
    invoice_series::{GeneratedInvoice, InvoiceOutcome},
    sink::{self, ConflictSkipSink, MemorySink, SinkRow, TableRef, EVENTS_TABLE, INVOICES_TABLE, TICKETS_TABLE},
    store::WarehouseStore,
    ticket_series::GeneratedTicket,
    writer::ConflictSafeWriter,
};

// ── Helpers ──────────────────────────────────────────────────────────────────

fn at(d: u32, h: u32, m: u32) -> NaiveDateTime {
    NaiveDate::from_ymd_opt(2024, 3, d)
        .and_then(|day| day.and_hms_opt(h, m, 0))
        .expect("valid timestamp")
}

fn events(n: usize) -> Vec<GeneratedEvent> {
    (0..n)
        .map(|i| {
            let event_time = at(1 + (i % 28) as u32, (i % 24) as u32, (i % 60) as u32);
            GeneratedEvent {
                event_id: GeneratedEvent::make_id("u1", event_time, "login", i),
                user_id: "u1".into(),
                event_time,
                event_name: "login".into(),
                properties: EventProperties {
                    source: "sim".into(),
                    usage_score: 50,
                    feature: None,
                },
            }
        })
        .collect()
}

fn store() -> WarehouseStore {
    let store = WarehouseStore::in_memory().expect("in-memory store");
    store.migrate().expect("migration");
    store
}

// ── Chunking ─────────────────────────────────────────────────────────────────

#[test]
fn rows_are_split_into_chunks() {
    let sink = MemorySink::new();
    let writer = ConflictSafeWriter::new(10).unwrap();

    let inserted = writer.write(&sink, &events(25)).unwrap();

    assert_eq!(inserted, 25);
    assert_eq!(sink.insert_calls(), 3, "25 rows at chunk size 10 is 3 calls");
    assert_eq!(sink.row_count(EVENTS_TABLE), 25);
}

#[test]
fn empty_input_makes_no_calls() {
    let sink = MemorySink::new();
    let writer = ConflictSafeWriter::default();

    let inserted = writer.write::<GeneratedEvent>(&sink, &[]).unwrap();

    assert_eq!(inserted, 0);
    assert_eq!(sink.insert_calls(), 0);
}

#[test]
fn zero_chunk_size_is_rejected() {
    assert!(matches!(
        ConflictSafeWriter::new(0),
        Err(GenError::InvalidConfig(_))
    ));
}

// ── Conflict skipping ────────────────────────────────────────────────────────

#[test]
fn rewriting_the_same_rows_inserts_nothing() {
    let sink = MemorySink::new();
    let writer = ConflictSafeWriter::new(7).unwrap();
    let rows = events(20);

    assert_eq!(writer.write(&sink, &rows).unwrap(), 20);
    assert_eq!(writer.write(&sink, &rows).unwrap(), 0, "duplicates must be skipped");
    assert_eq!(sink.row_count(EVENTS_TABLE), 20);
}

#[test]
fn overlapping_batches_count_only_new_rows() {
    let store = store();
    let writer = ConflictSafeWriter::new(4).unwrap();
    let rows = events(12);

    assert_eq!(writer.write(&store, &rows[..8]).unwrap(), 8);
    assert_eq!(writer.write(&store, &rows[4..]).unwrap(), 4, "rows 4..8 already present");
    assert_eq!(store.count_rows(EVENTS_TABLE).unwrap(), 12);
}

#[test]
fn duplicates_within_one_chunk_are_skipped() {
    let store = store();
    let writer = ConflictSafeWriter::default();
    let mut rows = events(3);
    rows.push(rows[0].clone());

    assert_eq!(writer.write(&store, &rows).unwrap(), 3);
}

/// A sink that reports more affected rows than it was handed.
struct OverReportingSink;

impl ConflictSkipSink for OverReportingSink {
    fn insert_ignoring_duplicates(
        &self,
        _table: TableRef,
        _columns: &[&str],
        _primary_key: &[&str],
        rows: &[Vec<Value>],
    ) -> GenResult<usize> {
        Ok(rows.len() + 2)
    }

    fn truncate(&self, _tables: &[TableRef]) -> GenResult<()> {
        Ok(())
    }
}

#[test]
fn over_reported_chunk_count_does_not_underflow_skipped() {
    // The skipped count is only computed when debug logging is on.
    let _ = env_logger::builder()
        .is_test(true)
        .filter_level(log::LevelFilter::Debug)
        .try_init();
    let writer = ConflictSafeWriter::new(4).unwrap();

    let inserted = writer.write(&OverReportingSink, &events(6)).unwrap();

    assert_eq!(inserted, 10, "the sink's own counts are summed as reported");
}

// ── Partial failure ──────────────────────────────────────────────────────────

/// Chunks commit independently: a failure on the third chunk keeps the
/// first two, and a retry fills in only the missing rows.
#[test]
fn failed_chunk_keeps_earlier_chunks() {
    let sink = MemorySink::new();
    let writer = ConflictSafeWriter::new(5).unwrap();
    let rows = events(20);

    sink.fail_on_call(3);
    let err = writer.write(&sink, &rows);
    assert!(err.is_err(), "third chunk was told to fail");
    assert_eq!(sink.row_count(EVENTS_TABLE), 10, "two committed chunks survive");

    let retried = writer.write(&sink, &rows).unwrap();
    assert_eq!(retried, 10, "retry inserts only what the failed run missed");
    assert_eq!(sink.row_count(EVENTS_TABLE), 20);
}

#[test]
fn sqlite_chunk_with_bad_row_rolls_back_whole_chunk() {
    let store = store();
    let writer = ConflictSafeWriter::new(3).unwrap();
    let good = |id: &str| {
        vec![
            sink::text(id),
            sink::text("u1"),
            sink::timestamp(at(1, 0, 0)),
            sink::text("login"),
            Value::Null,
        ]
    };
    let mut rows = vec![good("e1"), good("e2"), good("e3"), good("e4")];
    // Second chunk: valid row followed by a NOT NULL violation.
    rows.push(vec![
        sink::text("e5"),
        Value::Null,
        sink::timestamp(at(1, 0, 0)),
        sink::text("login"),
        Value::Null,
    ]);

    let result = writer.write_values(
        &store,
        EVENTS_TABLE,
        GeneratedEvent::COLUMNS,
        GeneratedEvent::PRIMARY_KEY,
        &rows,
    );

    assert!(matches!(result, Err(GenError::Database(_))), "got {result:?}");
    assert_eq!(
        store.count_rows(EVENTS_TABLE).unwrap(),
        3,
        "first chunk committed, failing chunk rolled back (e4 absent)"
    );
}

// ── NULL normalisation ───────────────────────────────────────────────────────

#[test]
fn empty_text_becomes_null() {
    assert_eq!(sink::text(""), Value::Null);
    assert_eq!(sink::opt_text(None), Value::Null);
    assert_eq!(sink::opt_text(Some("")), Value::Null);
    assert_eq!(sink::text("x"), Value::Text("x".into()));
}

#[test]
fn invoice_outcome_columns_are_null_when_absent() {
    let issued_at = at(1, 9, 0);
    let paid = GeneratedInvoice {
        invoice_id: GeneratedInvoice::make_id("sub_u1", issued_at.date()),
        subscription_id: "sub_u1".into(),
        amount: 99.0,
        issued_at,
        outcome: InvoiceOutcome::Paid {
            paid_at: at(1, 15, 0),
        },
    };
    let values = paid.values().unwrap();
    let col = |name: &str| {
        let i = GeneratedInvoice::COLUMNS
            .iter()
            .position(|c| *c == name)
            .expect("column exists");
        values[i].clone()
    };
    assert_eq!(col("failed_at"), Value::Null);
    assert_eq!(col("failure_reason"), Value::Null);
    assert!(matches!(col("paid_at"), Value::Text(_)));

    let store = store();
    ConflictSafeWriter::default().write(&store, &[paid.clone()]).unwrap();
    let back = store.invoices_for_subscription("sub_u1").unwrap();
    assert_eq!(back, vec![paid], "stored NULLs read back as a paid invoice");
}

#[test]
fn all_three_series_land_in_their_tables() {
    let store = store();
    let writer = ConflictSafeWriter::default();
    let ticket = GeneratedTicket {
        ticket_id: GeneratedTicket::make_id("u1", at(2, 11, 5)),
        user_id: "u1".into(),
        created_at: at(2, 11, 5),
        category: "billing".into(),
        resolved_at: at(3, 1, 5),
        csat: 4,
    };

    writer.write(&store, &events(5)).unwrap();
    writer.write(&store, &[ticket.clone()]).unwrap();

    assert_eq!(store.count_rows(EVENTS_TABLE).unwrap(), 5);
    assert_eq!(store.count_rows(INVOICES_TABLE).unwrap(), 0);
    assert_eq!(store.count_rows(TICKETS_TABLE).unwrap(), 1);
    assert_eq!(store.tickets_for_user("u1").unwrap(), vec![ticket]);
}
