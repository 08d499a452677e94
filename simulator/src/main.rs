//! Innkeep Simulator
//!
//! Races concurrent reservations against the coordinator and checks that no
//! room is ever double-booked.

use std::time::Duration;

use clap::Parser;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use innkeep_coordinator::{CoordinatorConfig, ReservationCoordinator, RetryPolicy};
use innkeep_store::{MemoryStore, PgReservationStore, ReservationStore};

mod controller;
mod metrics;
mod scenario;

use controller::SimulationController;
use scenario::Scenario;

/// Innkeep Simulator CLI
#[derive(Parser, Debug)]
#[command(name = "simulator")]
#[command(about = "Innkeep contention simulator")]
struct Args {
    /// Scenario name or path to a JSON scenario file
    #[arg(short, long)]
    scenario: Option<String>,

    /// List built-in scenarios and exit
    #[arg(long)]
    list: bool,

    /// Run against PostgreSQL instead of the in-memory store
    #[arg(long)]
    database_url: Option<String>,

    /// Rooms to create for continuous mode
    #[arg(short, long, default_value = "3")]
    rooms: usize,

    /// Concurrent workers in continuous mode
    #[arg(short, long, default_value = "8")]
    workers: usize,

    /// Continuous mode duration in seconds
    #[arg(long, default_value = "10")]
    duration: u64,

    /// Pool size
    #[arg(long)]
    max_connections: Option<u32>,

    /// Row lock timeout in milliseconds
    #[arg(long)]
    lock_timeout_ms: Option<u64>,

    /// Random seed for reproducibility
    #[arg(long)]
    seed: Option<u64>,

    /// Print coordinator metrics in Prometheus format at the end
    #[arg(long)]
    prometheus: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let args = Args::parse();

    if args.list {
        for name in Scenario::names() {
            println!("{name}");
        }
        return Ok(());
    }

    let mut config = CoordinatorConfig::from_env();
    if let Some(url) = args.database_url.clone() {
        config.store.database_url = url;
    }
    if let Some(max) = args.max_connections {
        config.store.max_connections = max;
    }
    if let Some(ms) = args.lock_timeout_ms {
        config.store.lock_timeout = Duration::from_millis(ms);
    }
    config
        .validate()
        .map_err(|e| anyhow::anyhow!("Configuration error: {}", e))?;

    let retry = RetryPolicy::new(&config.retry);

    info!("Starting Innkeep Simulator");

    if args.database_url.is_some() {
        info!("Store: PostgreSQL");
        let store = PgReservationStore::connect(&config.store).await?;
        store.migrate().await?;
        let controller =
            SimulationController::new(ReservationCoordinator::new(store), None, retry, args.seed);
        drive(&controller, &args).await
    } else {
        info!("Store: in-memory, {} connections", config.store.max_connections);
        let store = MemoryStore::new(&config.store);
        let controller = SimulationController::new(
            ReservationCoordinator::new(store.clone()),
            Some(store),
            retry,
            args.seed,
        );
        drive(&controller, &args).await
    }
}

async fn drive<S: ReservationStore + 'static>(
    controller: &SimulationController<S>,
    args: &Args,
) -> anyhow::Result<()> {
    if let Some(scenario_name) = &args.scenario {
        info!("Running scenario: {}", scenario_name);

        let scenario = Scenario::load(scenario_name)?;
        controller.run_scenario(scenario).await?;
    } else {
        controller.initialize(args.rooms).await?;
        controller
            .run(args.workers, Duration::from_secs(args.duration))
            .await?;
    }

    // Print metrics
    let metrics = controller.get_metrics().await;
    info!("Simulation complete");
    info!("Total reservations: {}", metrics.total_reservations);
    info!("Confirmed: {}", metrics.confirmed);
    info!("Conflicted: {}", metrics.conflicted);
    info!("Timed out: {}", metrics.timed_out);
    info!("Failed: {}", metrics.failed);
    info!("Cancellations: {}", metrics.cancellations);
    info!(
        "Confirmation rate: {:.1}%",
        metrics.confirmation_rate() * 100.0
    );
    info!("Average latency: {}ms", metrics.average_latency_ms());
    info!("p99 latency: {}ms", metrics.p99_latency_ms());

    if args.prometheus {
        print!("{}", controller.coordinator().metrics().to_prometheus());
    }

    Ok(())
}
