//! crt - campaign runtime engine
//!
//! CLI entry point for running simulated campaigns and inspecting config.

use std::fs;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use clap::Parser;
use eyre::{Context, Result};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::Serialize;
use serde_json::{Value, json};
use tracing::{info, warn};

use campaign_runtime::cli::{Cli, Command, OutputFormat, get_log_path};
use campaign_runtime::collaborators::{MemoryEventSink, MemoryStore};
use campaign_runtime::config::Config;
use campaign_runtime::domain::{Campaign, Operation, OperationStatus, OperationType, PlacementRecord, RuntimeStatus};
use campaign_runtime::metrics::RuntimeMetricsSnapshot;
use campaign_runtime::scheduler::{RuntimeConfigOverrides, Scheduler};

fn setup_logging(verbose: bool) -> Result<()> {
    let log_path = get_log_path();
    let log_dir = log_path.parent().map(PathBuf::from).unwrap_or_else(|| PathBuf::from("."));

    fs::create_dir_all(&log_dir).context("Failed to create log directory")?;

    // Write to log file, not stdout/stderr
    let level = if verbose { tracing::Level::DEBUG } else { tracing::Level::INFO };
    let log_file = fs::File::create(&log_path).context("Failed to create log file")?;

    tracing_subscriber::fmt()
        .with_writer(log_file)
        .with_ansi(false)
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env().add_directive(level.into()))
        .init();

    info!("Logging initialized (verbose: {})", verbose);
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    setup_logging(cli.verbose).context("Failed to setup logging")?;

    let config = Config::load(cli.config.as_ref()).context("Failed to load configuration")?;
    config.validate()?;

    info!(
        batch_size = config.runtime.batch_size,
        tick_interval_ms = config.runtime.tick_interval_ms,
        "crt loaded config"
    );

    match cli.command {
        Some(Command::Simulate {
            campaign,
            operations,
            duration_secs,
            batch_size,
            seed,
            format,
        }) => {
            let mut sim = config.simulation.clone();
            if let Some(campaign) = campaign {
                sim.campaign_id = campaign;
            }
            if let Some(operations) = operations {
                sim.operations = operations;
            }
            if let Some(duration_secs) = duration_secs {
                sim.duration_secs = duration_secs;
            }
            if seed.is_some() {
                sim.seed = seed;
            }
            let overrides = RuntimeConfigOverrides {
                batch_size,
                ..Default::default()
            };
            cmd_simulate(&config, &sim, overrides, format).await
        }
        Some(Command::Config) => cmd_config(&config),
        None => {
            use clap::CommandFactory;
            Cli::command().print_help()?;
            println!();
            Ok(())
        }
    }
}

/// Print the effective configuration
fn cmd_config(config: &Config) -> Result<()> {
    let yaml = serde_yaml::to_string(config).context("Failed to serialize config")?;
    print!("{}", yaml);
    Ok(())
}

#[derive(Debug, Serialize)]
struct SimulationReport {
    campaign_id: String,
    status: RuntimeStatus,
    enqueued: usize,
    completed: usize,
    failed: usize,
    still_queued: usize,
    placements: usize,
    latest_metrics: Option<RuntimeMetricsSnapshot>,
    history: Vec<Operation>,
}

/// Run one simulated campaign until the duration elapses or ctrl-c
async fn cmd_simulate(
    config: &Config,
    sim: &campaign_runtime::config::SimulationConfig,
    overrides: RuntimeConfigOverrides,
    format: OutputFormat,
) -> Result<()> {
    let store = Arc::new(MemoryStore::new());
    let events = Arc::new(MemoryEventSink::new());
    let scheduler = Scheduler::simulated(store.clone(), events.clone(), config.runtime.clone(), sim.seed);

    let mut rng = match sim.seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_os_rng(),
    };

    // Existing placements give verify/update/remove/cleanup something to act on
    let mut placement_ids = Vec::new();
    for i in 0..5 {
        let mut record = PlacementRecord::new(
            sim.campaign_id.clone(),
            format!("https://example.com/landing/{}", i),
            format!("blog{}.example.org", i),
            "example anchor",
            45,
            70,
        );
        record.id = format!("seed-{}", i);
        record.updated_at = Utc::now() - chrono::Duration::days(rng.random_range(0..90));
        placement_ids.push(record.id.clone());
        store.seed_placement(record).context("Failed to seed placement")?;
    }

    let campaign = Campaign::new(sim.campaign_id.clone(), sim.user_id.clone(), "Simulated campaign");
    scheduler
        .start_runtime(campaign, Some(overrides))
        .await
        .context("Failed to start runtime")?;

    let mut enqueued = 0;
    for _ in 0..sim.operations {
        let op_type = OperationType::ALL[rng.random_range(0..OperationType::ALL.len())];
        let placement_id = &placement_ids[rng.random_range(0..placement_ids.len())];
        let payload = simulated_payload(op_type, placement_id, &mut rng);
        let priority = rng.random_range(0..=sim.max_priority.max(0));
        match scheduler
            .enqueue_operation(&sim.campaign_id, op_type, payload, priority, None)
            .await
        {
            Ok(_) => enqueued += 1,
            Err(e) => warn!(error = %e, "Failed to enqueue simulated operation"),
        }
    }
    info!(enqueued, campaign_id = %sim.campaign_id, "Simulation running");
    if format == OutputFormat::Text {
        println!(
            "Running campaign '{}' with {} operations for {}s (Ctrl+C to stop early)...",
            sim.campaign_id, enqueued, sim.duration_secs
        );
    }

    tokio::select! {
        _ = tokio::time::sleep(Duration::from_secs(sim.duration_secs)) => {
            info!("Simulation duration elapsed");
        }
        result = tokio::signal::ctrl_c() => {
            result.context("Failed to listen for ctrl-c")?;
            warn!("Ctrl+C received");
        }
    }

    // Final sample before teardown so the report reflects the last completions
    let latest_metrics = scheduler.sample_metrics(&sim.campaign_id).await;
    let still_queued = scheduler.get_queue(&sim.campaign_id).await.len();
    scheduler.stop_all().await;

    let history = scheduler.get_history(&sim.campaign_id).await;
    let report = SimulationReport {
        campaign_id: sim.campaign_id.clone(),
        status: scheduler.status(&sim.campaign_id).await,
        enqueued,
        completed: history.iter().filter(|op| op.status == OperationStatus::Completed).count(),
        failed: history.iter().filter(|op| op.status == OperationStatus::Failed).count(),
        still_queued,
        placements: store.placements(&sim.campaign_id).len(),
        latest_metrics,
        history,
    };
    scheduler.cleanup(&sim.campaign_id).await;

    print_report(&report, format)
}

fn simulated_payload(op_type: OperationType, placement_id: &str, rng: &mut StdRng) -> Value {
    match op_type {
        OperationType::CreatePlacement => {
            let n: u32 = rng.random_range(0..1000);
            json!({
                "target_url": format!("https://example.com/page/{}", n),
                "source_domain": format!("site{}.example.net", n),
                "anchor_text": "read more",
            })
        }
        OperationType::RemovePlacement => json!({ "placement_id": placement_id, "reason": "simulated" }),
        OperationType::UpdatePlacement => json!({
            "placement_id": placement_id,
            "fields": { "anchor_text": "updated anchor" },
        }),
        OperationType::VerifyPlacement => json!({ "placement_id": placement_id }),
        OperationType::CleanupDeadLinks => json!({ "older_than_days": 30 }),
    }
}

fn print_report(report: &SimulationReport, format: OutputFormat) -> Result<()> {
    match format {
        OutputFormat::Json => {
            let json = serde_json::to_string_pretty(report).context("Failed to serialize report")?;
            println!("{}", json);
        }
        OutputFormat::Text => {
            println!("Campaign:     {} ({})", report.campaign_id, report.status);
            println!("Enqueued:     {}", report.enqueued);
            println!("Completed:    {}", report.completed);
            println!("Failed:       {}", report.failed);
            println!("Still queued: {}", report.still_queued);
            println!("Placements:   {}", report.placements);
            if let Some(metrics) = &report.latest_metrics {
                println!(
                    "Metrics:      {:.1} ops/min, {:.1}% success, {:.0}ms avg",
                    metrics.operations_per_minute, metrics.success_rate, metrics.average_duration_ms
                );
            }
            println!();
            for op in &report.history {
                let detail = op.error.as_deref().unwrap_or("");
                println!(
                    "  {:<20} {:<10} p={:<3} retries={} {}",
                    op.op_type.to_string(),
                    op.status.to_string(),
                    op.priority,
                    op.retry_count,
                    detail
                );
            }
        }
    }
    Ok(())
}
