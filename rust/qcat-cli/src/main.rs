//! Command-line entry point for the automation core.
//!
//! Wires the concrete collaborators (mock database, simulated exchange
//! client, Prometheus metrics sink) into [`qcat_automation::scheduler::AutomationScheduler`]
//! and [`qcat_automation::executor::RealtimeExecutor`], registers the fixed
//! task catalog, and runs both engines until interrupted.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::{Parser, Subcommand};
use qcat_automation::db::{Database, MockDatabase};
use qcat_automation::exchange::{ExchangeClient, SimulatedExchangeClient};
use qcat_automation::executor::{ExecutorConfig, RealtimeExecutor};
use qcat_automation::scheduler::{AutomationScheduler, SchedulerConfig};
use qcat_automation::{bootstrap, AutomationError};
use qcat_config::load_config;
use qcat_otel::{MetricsSink, NoopSink, PrometheusSink};
use tracing::{error, info};

#[derive(Parser)]
#[command(name = "qcat-automation")]
#[command(about = "QCAT automation core: task scheduler and realtime execution engine")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Path to the TOML config file. Defaults to $QCAT_CONFIG or ./qcat.toml.
    #[arg(long, global = true)]
    config: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the scheduler and execution engine, enable the fixed task
    /// catalog, and run until interrupted.
    Run {
        /// Run with a Prometheus metrics sink instead of the no-op sink.
        #[arg(long)]
        prometheus: bool,
    },
    /// Load and print the effective configuration, then exit.
    PrintConfig,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    qcat_otel::init_tracing();
    let cli = Cli::parse();

    let config_path = cli.config.unwrap_or_else(qcat_config::default_config_path);
    let config = load_config(Some(&config_path)).unwrap_or_else(|e| {
        error!(error = %e, path = %config_path.display(), "failed to load configuration, using defaults");
        qcat_config::AutomationConfig::default()
    });

    match cli.command {
        Commands::PrintConfig => {
            println!("{config:#?}");
            Ok(())
        }
        Commands::Run { prometheus } => run(config, prometheus).await,
    }
}

async fn run(config: qcat_config::AutomationConfig, prometheus: bool) -> anyhow::Result<()> {
    let metrics: Arc<dyn MetricsSink> = if prometheus {
        Arc::new(PrometheusSink::new())
    } else {
        Arc::new(NoopSink)
    };

    let db: Arc<dyn Database> = MockDatabase::shared();
    let exchange: Arc<dyn ExchangeClient> = Arc::new(SimulatedExchangeClient);

    let executor = RealtimeExecutor::new(
        metrics.clone(),
        ExecutorConfig {
            worker_count: config.executor.worker_count,
            action_queue_capacity: config.executor.action_queue_capacity,
            queue_alert_threshold: config.executor.queue_alert_threshold,
        },
    );

    let scheduler = Arc::new(AutomationScheduler::new(
        db,
        metrics,
        executor.clone(),
        exchange,
        SchedulerConfig {
            worker_count: config.scheduler.worker_count,
            task_queue_capacity: config.scheduler.task_queue_capacity,
            tick_interval: std::time::Duration::from_secs(config.scheduler.tick_interval_secs),
        },
    ));

    for task in bootstrap::default_tasks() {
        let id = task.id.clone();
        scheduler.register_task(task);
        scheduler
            .toggle_task(&id, true)
            .with_context(|| format!("enabling catalog task {id}"))?;
    }

    executor.start().await.context("starting realtime executor")?;
    scheduler.start().await.context("starting automation scheduler")?;
    info!(app = %config.app.name, context = %config.app.context, "qcat automation core running");

    tokio::signal::ctrl_c().await.context("waiting for shutdown signal")?;
    info!("shutdown signal received, stopping engines");

    if let Err(e) = scheduler.stop().await {
        if !matches!(e, AutomationError::NotRunning) {
            error!(error = %e, "error stopping scheduler");
        }
    }
    if let Err(e) = executor.stop().await {
        if !matches!(e, AutomationError::NotRunning) {
            error!(error = %e, "error stopping executor");
        }
    }

    Ok(())
}
