//! Invocation guard (v1)
//!
//! Runs the endpoint selector and health monitor against a configured set of
//! endpoints and reports which one would be chosen.
//!
//! # Architecture Overview
//!
//! ```text
//!                ┌──────────────────────────────────────────────────────┐
//!                │                  INVOCATION GUARD                     │
//!                │                                                       │
//!   Caller ──────┼─▶ selection ──▶ recovery ──▶ resilience ──▶ operation ┼──▶ Endpoint
//!                │   (select_best)  (manager)   (retry → breaker)        │
//!                │        ▲                                    │         │
//!                │        └────────── record_outcome ◀─────────┘         │
//!                │                                                       │
//!                │   health (periodic probes → record_outcome)           │
//!                │   config · observability (logging, metrics)           │
//!                └──────────────────────────────────────────────────────┘
//! ```

use std::collections::HashSet;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use tokio_util::sync::CancellationToken;

use invocation_guard::config::{load_config, GuardConfig};
use invocation_guard::health::{HealthMonitor, HttpProbe};
use invocation_guard::observability::{logging, metrics};
use invocation_guard::{RecoveryManager, Selector};

#[derive(Parser)]
#[command(name = "invocation-guard")]
#[command(about = "Health-scored endpoint selection with circuit breaking and retries", long_about = None)]
struct Cli {
    /// Path to a TOML configuration file. Defaults apply when omitted.
    #[arg(short, long)]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => load_config(path)?,
        None => GuardConfig::default(),
    };

    logging::init_logging(&config.observability.log_level)?;
    tracing::info!("invocation-guard v{} starting", env!("CARGO_PKG_VERSION"));

    if config.observability.metrics_enabled {
        match config.observability.metrics_address.parse() {
            Ok(addr) => metrics::init_metrics(addr)?,
            Err(_) => tracing::error!(
                metrics_address = %config.observability.metrics_address,
                "Failed to parse metrics address"
            ),
        }
    }

    let selector = Arc::new(Selector::from_config(&config));
    let manager = RecoveryManager::from_config(&config);
    tracing::info!(
        endpoints = selector.len(),
        breakers = config.breakers.len(),
        retry_policies = config.retry_policies.len(),
        "Registries ready"
    );

    let shutdown = CancellationToken::new();
    let monitor = HealthMonitor::new(
        selector.clone(),
        config.health_check.clone(),
        Arc::new(HttpProbe::from_config(&config.endpoints)),
    );
    let monitor_task = tokio::spawn(monitor.run(shutdown.clone()));

    let report_every = Duration::from_secs(config.health_check.interval_secs.max(1));
    let mut ticker = tokio::time::interval(report_every);

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                match selector.select_best(&HashSet::new()) {
                    Some(endpoint) => tracing::info!(
                        endpoint = %endpoint.id(),
                        score = endpoint.health_score(),
                        "Best endpoint"
                    ),
                    None => tracing::warn!("No endpoint available"),
                }
                for stats in selector.stats() {
                    tracing::info!(
                        endpoint = %stats.id,
                        status = ?stats.status,
                        health_score = stats.health_score,
                        total_requests = stats.total_requests,
                        success_rate = stats.success_rate,
                        "Endpoint stats"
                    );
                }
                let health = manager.get_system_health();
                tracing::info!(
                    total_errors = health.total_errors,
                    open_breakers = health.circuit_breakers_open,
                    "System health"
                );
            }
            _ = tokio::signal::ctrl_c() => {
                tracing::info!("Shutdown signal received");
                break;
            }
        }
    }

    shutdown.cancel();
    monitor_task.await?;

    tracing::info!("Shutdown complete");
    Ok(())
}
