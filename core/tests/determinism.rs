//! Same seed, same inputs, same rows. Always.
//!
//! Two generators fed the same seed and snapshot must produce
//! row-for-row identical batches, and the rows that land in the
//! warehouse must match too. Any divergence here is a blocker.

use chrono::NaiveDate;
use synthgen_core::{
    calendar::Window,
    clock::FixedClock,
    config::ModelConfig,
    controller::{GenerateRequest, RunController},
    generator::{GeneratedBatch, GenerationInput, SeriesGenerator},
    source::{self, SourceSnapshot, StaticSource},
    store::WarehouseStore,
    watermark::MemoryWatermarkStore,
};

// ── Helpers ──────────────────────────────────────────────────────────────────

fn day(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).expect("valid date")
}

fn population(n: usize) -> StaticSource {
    let mut src = StaticSource::new();
    for i in 0..n {
        let id = format!("u{i:03}");
        let usage = (i * 37 % 101) as f64;
        let nps = (i * 7 % 11) as f64;
        src = src
            .with_user(&id, day(2023, 1, 1), usage, nps)
            .with_subscription(&id, day(2023, 6, 15), 49.0 + i as f64);
    }
    src
}

fn snapshot(src: &StaticSource) -> SourceSnapshot {
    source::read_snapshot(src, &ModelConfig::default().defaults).expect("read snapshot")
}

fn generate(snap: &SourceSnapshot, seed: u64, sample_size: usize) -> GeneratedBatch {
    SeriesGenerator::new(ModelConfig::default()).generate(&GenerationInput {
        users: &snap.users,
        subscriptions: &snap.subscriptions,
        window: Window::new(day(2024, 1, 1), day(2024, 3, 31)),
        incremental: false,
        seed,
        sample_size,
    })
}

// ── Tests ────────────────────────────────────────────────────────────────────

#[test]
fn same_seed_produces_identical_batches() {
    const SEED: u64 = 0xDEAD_BEEF_CAFE_1234;
    let snap = snapshot(&population(40));

    let a = generate(&snap, SEED, 0);
    let b = generate(&snap, SEED, 0);

    assert!(!a.events.is_empty(), "a 91-day window over 40 users must produce events");
    assert_eq!(a.events.len(), b.events.len(), "event counts differ");
    for (i, (x, y)) in a.events.iter().zip(&b.events).enumerate() {
        assert_eq!(x, y, "events diverged at row {i}");
    }
    assert_eq!(a.invoices, b.invoices, "invoices diverged");
    assert_eq!(a.tickets, b.tickets, "tickets diverged");
}

#[test]
fn different_seeds_produce_different_batches() {
    let snap = snapshot(&population(40));

    let a = generate(&snap, 42, 0);
    let b = generate(&snap, 99, 0);

    assert_ne!(a.events, b.events, "different seeds produced identical events; seed unused");
}

#[test]
fn sampling_is_seeded() {
    let snap = snapshot(&population(60));

    let a = generate(&snap, 7, 15);
    let b = generate(&snap, 7, 15);
    let c = generate(&snap, 8, 15);

    assert_eq!(a.sampled_users, 15);
    let users = |batch: &GeneratedBatch| {
        let mut ids: Vec<String> = batch.invoices.iter().map(|i| i.subscription_id.clone()).collect();
        ids.dedup();
        ids
    };
    assert_eq!(users(&a), users(&b), "same seed must sample the same users");
    assert_eq!(users(&a).len(), 15, "only sampled users are billed");
    assert_ne!(users(&a), users(&c), "a different seed should pick a different sample");
}

#[test]
fn stored_rows_match_across_independent_warehouses() {
    let src = population(12);
    let now = NaiveDate::from_ymd_opt(2024, 2, 10)
        .and_then(|d| d.and_hms_opt(6, 0, 0))
        .expect("valid timestamp");

    let run = |store: &WarehouseStore| {
        let watermarks = MemoryWatermarkStore::new();
        let clock = FixedClock::new(now);
        let mut controller = RunController::new("generate", &watermarks, &src, store, &clock);
        controller
            .generate(&GenerateRequest {
                lookback_days: 30,
                sample_size: 0,
                seed: 2024,
                force_rebuild: false,
            })
            .expect("generate")
    };

    let store_a = WarehouseStore::in_memory().expect("store a");
    store_a.migrate().expect("migrate a");
    let store_b = WarehouseStore::in_memory().expect("store b");
    store_b.migrate().expect("migrate b");

    let summary_a = run(&store_a);
    let summary_b = run(&store_b);
    assert_eq!(summary_a.inserted, summary_b.inserted);

    for i in 0..12 {
        let user = format!("u{i:03}");
        assert_eq!(
            store_a.events_for_user(&user).expect("events a"),
            store_b.events_for_user(&user).expect("events b"),
            "stored events diverged for {user}"
        );
        assert_eq!(
            store_a.tickets_for_user(&user).expect("tickets a"),
            store_b.tickets_for_user(&user).expect("tickets b"),
            "stored tickets diverged for {user}"
        );
        let sub = format!("sub_{user}");
        assert_eq!(
            store_a.invoices_for_subscription(&sub).expect("invoices a"),
            store_b.invoices_for_subscription(&sub).expect("invoices b"),
            "stored invoices diverged for {sub}"
        );
    }
}
