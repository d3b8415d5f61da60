//! RentEscrow Simulator
//!
//! Runs scripted scenarios or a randomized workload against an in-memory
//! registry and reports what happened.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use rentescrow_common::Amount;
use rentescrow_registry::events::run_event_pump;
use rentescrow_registry::{LogFormat, LoggingHandler, RegistryConfig};

mod controller;
mod metrics;
mod party;
mod scenario;

use controller::SimulationController;
use scenario::Scenario;

/// Tenant funding for scripted scenarios; balance assertions rely on it.
const SCENARIO_FUNDING: u64 = 10_000;
/// Tenant funding for randomized runs.
const LOAD_FUNDING: u64 = 1_000_000;

/// RentEscrow Simulator CLI
#[derive(Parser, Debug)]
#[command(name = "simulator")]
#[command(about = "RentEscrow scenario runner and load simulator")]
struct Args {
    /// Built-in scenario name or path to a JSON scenario file
    #[arg(short, long)]
    scenario: Option<String>,

    /// Operations to run in randomized mode
    #[arg(short, long, default_value = "200")]
    rounds: usize,

    /// Random seed for reproducibility
    #[arg(long)]
    seed: Option<u64>,

    /// Number of simulated owners
    #[arg(long, default_value = "3")]
    owners: usize,

    /// Number of simulated tenants
    #[arg(long, default_value = "5")]
    tenants: usize,

    /// Write the final registry snapshot to this file
    #[arg(long)]
    snapshot_out: Option<PathBuf>,

    /// Print registry metrics in Prometheus format
    #[arg(long)]
    metrics: bool,
}

fn init_tracing(config: &RegistryConfig) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log_level));
    let subscriber = tracing_subscriber::registry().with(filter);

    match config.log_format {
        LogFormat::Json => subscriber.with(tracing_subscriber::fmt::layer().json()).init(),
        LogFormat::Pretty => subscriber.with(tracing_subscriber::fmt::layer()).init(),
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = RegistryConfig::from_env();
    init_tracing(&config);

    let args = Args::parse();

    info!("Starting RentEscrow Simulator");
    info!(admin = %config.admin, owners = args.owners, tenants = args.tenants, "Configuration loaded");

    let funding = if args.scenario.is_some() {
        SCENARIO_FUNDING
    } else {
        LOAD_FUNDING
    };
    let mut controller = SimulationController::new(
        config,
        args.owners,
        args.tenants,
        args.seed,
        Amount::from(funding),
    )?;

    let pump = tokio::spawn(run_event_pump(
        controller.registry().subscribe(),
        Arc::new(LoggingHandler),
    ));

    let outcome = match &args.scenario {
        Some(name) => Scenario::load(name).and_then(|s| controller.run_scenario(&s)),
        None => controller.run_random(args.rounds),
    };

    if let Err(e) = &outcome {
        error!(error = %format!("{:#}", e), "Simulation failed");
    }

    let metrics = controller.metrics().clone();
    info!("Simulation complete");
    info!("Operations: {}", metrics.operations_total);
    info!("Succeeded: {}", metrics.operations_succeeded);
    info!("Failed: {}", metrics.operations_failed());
    info!("Success rate: {:.1}%", metrics.success_rate() * 100.0);
    info!("Rent forwarded: {}", metrics.rent_volume);
    info!("Deposits returned: {}", metrics.deposits_returned);
    info!("Escrow outstanding: {}", controller.registry().total_escrowed());
    info!("Ledger consistent: {}", controller.ledger().verify_integrity());

    if let Some(path) = &args.snapshot_out {
        let snapshot = controller.registry().snapshot();
        let json = serde_json::to_string_pretty(&snapshot)?;
        std::fs::write(path, json).with_context(|| format!("writing snapshot to {}", path.display()))?;
        info!(path = %path.display(), "Snapshot written");
    }

    if args.metrics {
        println!("{}", controller.registry().metrics().to_prometheus());
        println!("{}", serde_json::to_string_pretty(&metrics)?);
    }

    // Dropping the registry closes the event channel and ends the pump.
    drop(controller);
    let handled = pump.await?;
    info!(events = handled, "Event pump drained");

    outcome
}
