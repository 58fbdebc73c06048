//! synthgen-runner: headless incremental generation runner.
//!
//! Usage:
//!   synthgen-runner --db warehouse.db --lookback-days 30 --seed 42
//!   synthgen-runner --db warehouse.db --force-rebuild --sample 0
//!   synthgen-runner --db warehouse.db --summary-only
//!
//! Every flag falls back to a `SYNTHGEN_*` environment variable, then to
//! the built-in default.

use anyhow::Result;
use std::env;
use synthgen_core::{
    clock::{Clock, SystemClock},
    config::ModelConfig,
    controller::{GenerateRequest, GenerateSummary, RunController},
    run_log::RunRecord,
    sink::GENERATED_TABLES,
    store::WarehouseStore,
    types::DEFAULT_PIPELINE,
    writer::{ConflictSafeWriter, DEFAULT_CHUNK_SIZE},
};

#[derive(serde::Serialize)]
struct JsonReport<'a> {
    run_id: &'a str,
    elapsed_ms: i64,
    summary: &'a GenerateSummary,
    table_counts: serde_json::Map<String, serde_json::Value>,
}

#[derive(Debug, Clone)]
struct RunnerConfig {
    db: String,
    pipeline: String,
    model_config: Option<String>,
    chunk_size: usize,
    summary_only: bool,
    json: bool,
    request: GenerateRequest,
}

impl RunnerConfig {
    fn from_args(args: &[String]) -> Self {
        let defaults = GenerateRequest::default();
        Self {
            db: parse_arg(args, "--db", "SYNTHGEN_DB", "synthgen.db".to_string()),
            pipeline: parse_arg(args, "--pipeline", "SYNTHGEN_PIPELINE", DEFAULT_PIPELINE.to_string()),
            model_config: parse_opt(args, "--model-config", "SYNTHGEN_MODEL_CONFIG"),
            chunk_size: parse_arg(args, "--chunk-size", "SYNTHGEN_CHUNK_SIZE", DEFAULT_CHUNK_SIZE),
            summary_only: parse_flag(args, "--summary-only", "SYNTHGEN_SUMMARY_ONLY"),
            json: parse_flag(args, "--json", "SYNTHGEN_JSON"),
            request: GenerateRequest {
                lookback_days: parse_arg(
                    args,
                    "--lookback-days",
                    "SYNTHGEN_LOOKBACK_DAYS",
                    defaults.lookback_days,
                ),
                sample_size: parse_arg(args, "--sample", "SYNTHGEN_SAMPLE", defaults.sample_size),
                seed: parse_arg(args, "--seed", "SYNTHGEN_SEED", defaults.seed),
                force_rebuild: parse_flag(args, "--force-rebuild", "SYNTHGEN_FORCE_REBUILD"),
            },
        }
    }
}

fn main() -> Result<()> {
    env_logger::init();

    let args: Vec<String> = env::args().collect();
    let config = RunnerConfig::from_args(&args);

    if !config.json {
        println!("synthgen-runner");
        println!("  db:            {}", config.db);
        println!("  pipeline:      {}", config.pipeline);
        println!("  lookback days: {}", config.request.lookback_days);
        println!("  sample:        {}", config.request.sample_size);
        println!("  seed:          {}", config.request.seed);
        println!("  force rebuild: {}", config.request.force_rebuild);
        println!();
    }

    let store = WarehouseStore::open(&config.db)?;
    store.migrate()?;

    if config.summary_only {
        let counts = table_counts(&store)?;
        if config.json {
            println!("{}", serde_json::to_string_pretty(&counts)?);
        } else {
            print_table_counts(&counts);
        }
        return Ok(());
    }

    let model = match &config.model_config {
        Some(path) => ModelConfig::load(path)?,
        None => ModelConfig::default(),
    };
    let clock = SystemClock;
    let mut controller = RunController::new(&config.pipeline, &store, &store, &store, &clock)
        .with_model(model)?
        .with_writer(ConflictSafeWriter::new(config.chunk_size)?);

    let started_at = clock.now();
    let outcome = controller.generate(&config.request);
    let finished_at = clock.now();
    let elapsed: chrono::Duration = finished_at - started_at;

    let record = match &outcome {
        Ok(summary) => RunRecord::succeeded(
            &config.pipeline,
            &config.request,
            started_at,
            finished_at,
            summary,
        ),
        Err(e) => RunRecord::failed(&config.pipeline, &config.request, started_at, finished_at, e),
    };
    // History is best-effort; a failed audit insert must not mask the run result.
    if let Err(e) = store.record_run(&record) {
        log::error!("could not record run {}: {e}", record.run_id);
    }

    match outcome {
        Ok(summary) => {
            let counts = table_counts(&store)?;
            if config.json {
                let report = JsonReport {
                    run_id: &record.run_id,
                    elapsed_ms: elapsed.num_milliseconds(),
                    summary: &summary,
                    table_counts: counts,
                };
                println!("{}", serde_json::to_string_pretty(&report)?);
            } else {
                print_summary(&record.run_id, elapsed, &summary);
                print_table_counts(&counts);
            }
            Ok(())
        }
        Err(e) => {
            log::error!(
                "pipeline={} failed in state {:?}: {e}",
                config.pipeline,
                controller.state()
            );
            Err(e.into())
        }
    }
}

fn print_summary(run_id: &str, elapsed: chrono::Duration, summary: &GenerateSummary) {
    println!("=== RUN SUMMARY ===");
    println!("  run_id:         {run_id}");
    println!("  elapsed:        {} ms", elapsed.num_milliseconds());
    println!("  window:         {}", summary.window);
    println!("  incremental:    {}", summary.incremental);
    println!("  invoices from:  {}", summary.invoice_start);
    println!("  sampled users:  {}", summary.sampled_users);
    println!(
        "  events:         {} generated, {} inserted",
        summary.generated.events, summary.inserted.events
    );
    println!(
        "  invoices:       {} generated, {} inserted",
        summary.generated.invoices, summary.inserted.invoices
    );
    println!(
        "  tickets:        {} generated, {} inserted",
        summary.generated.tickets, summary.inserted.tickets
    );
    if let Some(at) = summary.watermark {
        println!("  watermark:      {at}");
    }
    println!();
}

fn table_counts(store: &WarehouseStore) -> Result<serde_json::Map<String, serde_json::Value>> {
    let mut counts = serde_json::Map::new();
    for table in GENERATED_TABLES {
        counts.insert(table.to_string(), store.count_rows(table)?.into());
    }
    Ok(counts)
}

fn print_table_counts(counts: &serde_json::Map<String, serde_json::Value>) {
    println!("=== TABLE COUNTS ===");
    for (table, n) in counts {
        println!("  {table:<22} {n}");
    }
}

fn parse_arg<T: std::str::FromStr>(args: &[String], flag: &str, env_key: &str, default: T) -> T {
    args.windows(2)
        .find(|w| w[0] == flag)
        .map(|w| w[1].clone())
        .or_else(|| env::var(env_key).ok())
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

fn parse_opt(args: &[String], flag: &str, env_key: &str) -> Option<String> {
    args.windows(2)
        .find(|w| w[0] == flag)
        .map(|w| w[1].clone())
        .or_else(|| env::var(env_key).ok())
}

fn parse_flag(args: &[String], flag: &str, env_key: &str) -> bool {
    args.iter().any(|a| a == flag)
        || env::var(env_key)
            .map(|v| matches!(v.as_str(), "1" | "true" | "yes"))
            .unwrap_or(false)
}
