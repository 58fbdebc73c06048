//! Latent attributes drive the series. An engaged promoter and a
//! disengaged detractor, simulated over a year across many seeds, must
//! separate clearly on every rate. Margins are deliberately wide.

use chrono::NaiveDate;
use synthgen_core::{
    calendar::Window,
    config::ModelConfig,
    generator::{GenerationInput, SeriesGenerator},
    source::{self, StaticSource},
};

const SEEDS: u64 = 100;

struct Totals {
    events: [usize; 2],
    tickets: [usize; 2],
    invoices: [usize; 2],
    failed: [usize; 2],
}

fn day(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).expect("valid date")
}

fn simulate() -> Totals {
    let _ = env_logger::builder().is_test(true).try_init();

    let src = StaticSource::new()
        .with_user("happy", day(2022, 1, 1), 90.0, 9.0)
        .with_subscription("happy", day(2022, 1, 1), 99.0)
        .with_user("unhappy", day(2022, 1, 1), 10.0, 2.0)
        .with_subscription("unhappy", day(2022, 1, 1), 99.0);
    let snap = source::read_snapshot(&src, &ModelConfig::default().defaults).expect("snapshot");
    let generator = SeriesGenerator::new(ModelConfig::default());
    let slot = |user: &str| usize::from(user.ends_with("unhappy"));

    let mut totals = Totals {
        events: [0; 2],
        tickets: [0; 2],
        invoices: [0; 2],
        failed: [0; 2],
    };
    for seed in 0..SEEDS {
        let batch = generator.generate(&GenerationInput {
            users: &snap.users,
            subscriptions: &snap.subscriptions,
            window: Window::new(day(2023, 1, 1), day(2023, 12, 31)),
            incremental: false,
            seed,
            sample_size: 0,
        });
        for e in &batch.events {
            totals.events[slot(&e.user_id)] += 1;
        }
        for t in &batch.tickets {
            totals.tickets[slot(&t.user_id)] += 1;
        }
        for inv in &batch.invoices {
            let s = slot(&inv.subscription_id);
            totals.invoices[s] += 1;
            if inv.is_failed() {
                totals.failed[s] += 1;
            }
        }
    }
    totals
}

#[test]
fn latent_attributes_separate_the_series() {
    let t = simulate();
    let [happy, unhappy] = [0, 1];

    // Expected events/day: 3.62 vs 0.58.
    assert!(
        t.events[happy] > 3 * t.events[unhappy],
        "events: happy={} unhappy={}",
        t.events[happy],
        t.events[unhappy]
    );

    // Daily ticket probability: 0.0020 vs 0.0043.
    assert!(
        t.tickets[unhappy] as f64 > 1.5 * t.tickets[happy] as f64,
        "tickets: happy={} unhappy={}",
        t.tickets[happy],
        t.tickets[unhappy]
    );

    // Twelve invoices a year each; failure probability 0.05 vs the 0.35 cap.
    assert_eq!(t.invoices, [12 * SEEDS as usize; 2]);
    let rate = |s: usize| t.failed[s] as f64 / t.invoices[s] as f64;
    assert!(rate(happy) < 0.10, "happy failure rate {:.3}", rate(happy));
    assert!(
        (0.25..0.45).contains(&rate(unhappy)),
        "unhappy failure rate {:.3}",
        rate(unhappy)
    );
}
