//! skyliftd — the skylift daemon.
//!
//! Single binary that assembles the deployment service:
//! - Configuration (TOML file plus flag overrides)
//! - Rate limiter and metrics registry
//! - Bounded deploy queue + worker pool
//! - Script executor
//! - REST API with graceful shutdown
//!
//! # Usage
//!
//! ```text
//! skyliftd serve --config /etc/skylift/config.toml --port 8080
//! ```

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::{Parser, Subcommand};
use tracing::{debug, info};

use skylift_api::{ApiState, build_router};
use skylift_core::ServiceConfig;
use skylift_deploy::{ScriptExecutor, SiteCatalog};
use skylift_gate::RateLimiter;
use skylift_metrics::MetricsRegistry;
use skylift_queue::{ShutdownCoordinator, WorkerPool, deploy_queue};

#[derive(Parser)]
#[command(name = "skyliftd", about = "skylift deployment daemon")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run the deployment service.
    Serve {
        /// Path to the TOML configuration file.
        #[arg(long)]
        config: Option<PathBuf>,

        /// Override the configured listen port.
        #[arg(long)]
        port: Option<u16>,

        /// Override the configured listen host.
        #[arg(long)]
        host: Option<String>,

        /// Override the configured worker count.
        #[arg(long)]
        workers: Option<usize>,

        /// Override the configured queue capacity.
        #[arg(long)]
        queue_size: Option<usize>,

        /// Override the configured drain budget in seconds.
        #[arg(long)]
        shutdown_timeout: Option<u64>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing.
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,skyliftd=debug,skylift_deploy=debug".parse().unwrap()),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Command::Serve {
            config,
            port,
            host,
            workers,
            queue_size,
            shutdown_timeout,
        } => {
            let mut service_config = match &config {
                Some(path) => ServiceConfig::from_file(path)?,
                None => ServiceConfig::default(),
            };
            if let Some(port) = port {
                service_config.server.port = port;
            }
            if let Some(host) = host {
                service_config.server.host = host;
            }
            if let Some(workers) = workers {
                service_config.deploy.worker_pool_size = workers;
            }
            if let Some(queue_size) = queue_size {
                service_config.deploy.queue_size = queue_size;
            }
            if let Some(secs) = shutdown_timeout {
                service_config.server.shutdown_timeout_secs = secs;
            }
            // Overrides included: a zero queue or pool must fail here,
            // not panic mid-assembly.
            service_config.validate()?;
            serve(service_config).await
        }
    }
}

async fn serve(config: ServiceConfig) -> anyhow::Result<()> {
    info!("skylift daemon starting");

    let config = Arc::new(config);

    // ── Initialize subsystems ──────────────────────────────────

    let metrics = Arc::new(MetricsRegistry::new());

    let gate = Arc::new(RateLimiter::new(
        config.admission.limit,
        config.admission.window(),
    ));
    info!(
        limit = config.admission.limit,
        window_secs = config.admission.window_secs,
        "rate limiter initialized"
    );

    // The per-check prune only touches active keys; this drops clients
    // that went quiet so the key map stays bounded.
    let sweeper = start_gate_sweeper(Arc::clone(&gate), config.admission.window());

    let (queue, jobs) = deploy_queue(config.deploy.queue_size);
    info!(capacity = config.deploy.queue_size, "deploy queue created");

    let executor = Arc::new(ScriptExecutor::new(config.deploy.clone()));
    let pool = WorkerPool::start(
        config.deploy.worker_pool_size,
        jobs,
        executor,
        Arc::clone(&metrics),
    );
    info!(workers = config.deploy.worker_pool_size, "worker pool started");

    let coordinator = ShutdownCoordinator::new(
        queue.clone(),
        pool,
        Arc::clone(&metrics),
        config.server.shutdown_timeout(),
    );

    let catalog = SiteCatalog::new(
        config.deploy.sites_dir.clone(),
        config.deploy.base_domain.clone(),
    );

    // ── Start API server ───────────────────────────────────────

    let state = ApiState {
        config: Arc::clone(&config),
        gate,
        metrics,
        queue,
        catalog,
    };
    let router = build_router(state);

    let addr = config.bind_addr();
    info!(%addr, "API server starting");

    let listener = tokio::net::TcpListener::bind(&addr).await?;

    // Stop taking connections on a signal; drain the pipeline after.
    let server = axum::serve(
        listener,
        router.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(async move {
        wait_for_shutdown_signal()
            .await
            .expect("failed to install signal handlers");
        info!("shutdown signal received");
    });

    server.await?;
    sweeper.abort();

    if let Some(report) = coordinator.shutdown().await {
        info!(
            workers_finished = report.workers_finished,
            workers_abandoned = report.workers_abandoned,
            items_abandoned = report.items_abandoned,
            "skylift daemon stopped"
        );
    }
    Ok(())
}

/// Periodically drop rate-limiter clients whose history has fully aged
/// out. Runs for the life of the server; aborted once it stops.
fn start_gate_sweeper(gate: Arc<RateLimiter>, every: Duration) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        loop {
            tokio::time::sleep(every).await;
            let swept = gate.sweep_idle();
            if swept > 0 {
                debug!(
                    swept,
                    remaining = gate.tracked_clients(),
                    "idle rate limit clients dropped"
                );
            }
        }
    })
}

/// Completes when SIGINT, SIGTERM, or SIGHUP arrives.
#[cfg(unix)]
async fn wait_for_shutdown_signal() -> std::io::Result<()> {
    use tokio::signal::unix::{SignalKind, signal};

    let mut sigint = signal(SignalKind::interrupt())?;
    let mut sigterm = signal(SignalKind::terminate())?;
    let mut sighup = signal(SignalKind::hangup())?;

    tokio::select! {
        _ = tokio::signal::ctrl_c() => {},
        _ = sigint.recv() => {},
        _ = sigterm.recv() => {},
        _ = sighup.recv() => {},
    }
    Ok(())
}

#[cfg(not(unix))]
async fn wait_for_shutdown_signal() -> std::io::Result<()> {
    tokio::signal::ctrl_c().await
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Instant;

    #[tokio::test]
    async fn gate_sweeper_drops_idle_clients() {
        let gate = Arc::new(RateLimiter::new(5, Duration::from_millis(1)));
        assert!(gate.allow("10.0.0.1"));
        assert!(gate.allow("10.0.0.2"));
        assert_eq!(gate.tracked_clients(), 2);

        let sweeper = start_gate_sweeper(Arc::clone(&gate), Duration::from_millis(5));

        let deadline = Instant::now() + Duration::from_secs(2);
        while gate.tracked_clients() > 0 {
            assert!(
                Instant::now() < deadline,
                "sweeper never dropped the idle clients"
            );
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        sweeper.abort();
    }
}
