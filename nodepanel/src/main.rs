use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use clap::Parser;
use sqlx::postgres::PgPoolOptions;
use tracing::{error, info};

use nodepanel_core::{logging, Config};
use nodepanel_fleet::remote::UnconfiguredSshChannel;
use nodepanel_fleet::FleetServices;

#[derive(Parser)]
#[command(name = "nodepanel", about = "Fleet control plane for hosting nodes")]
struct Cli {
    /// Path to the configuration file (defaults to ./config.yaml when present)
    #[arg(short, long)]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // 1. Load configuration
    let config = Config::load(cli.config.as_deref())?;

    // 2. Validate configuration (fail fast on misconfigurations)
    if let Err(errors) = config.validate() {
        for e in &errors {
            eprintln!("Config validation error: {e}");
        }
        return Err(anyhow::anyhow!(
            "Configuration validation failed with {} error(s)",
            errors.len()
        ));
    }

    // 3. Initialize logging
    logging::init_logging(&config.logging)?;
    let host = hostname::get()
        .ok()
        .and_then(|h| h.into_string().ok())
        .unwrap_or_else(|| "unknown".to_string());
    info!(host, "Node panel starting...");

    // 4. Initialize database
    let pool = PgPoolOptions::new()
        .max_connections(config.database.max_connections)
        .min_connections(config.database.min_connections)
        .acquire_timeout(Duration::from_secs(config.database.connect_timeout_seconds))
        .idle_timeout(Duration::from_secs(config.database.idle_timeout_seconds))
        .connect(&config.database.url)
        .await?;

    // 5. Run migrations
    info!("Running database migrations...");
    sqlx::migrate!("../migrations").run(&pool).await.map_err(|e| {
        error!("Failed to run migrations: {}", e);
        anyhow::anyhow!("Migration failed: {e}")
    })?;
    info!("Migrations completed");

    // 6. Wire and start the fleet services. The SSH backend is injected
    // here; without one, SSH-transport nodes fail probes with a clear
    // precondition error instead of hanging.
    let services = FleetServices::new(pool, &config, Arc::new(UnconfiguredSshChannel));
    let handles = services.start_all();
    info!(
        health_interval = config.health.interval_seconds,
        resource_interval = config.resources.interval_seconds,
        failover_interval = config.failover.interval_seconds,
        discovery_enabled = config.discovery.enabled,
        "Fleet control loops started"
    );

    // 7. Run until interrupted
    tokio::signal::ctrl_c().await?;
    info!("Shutdown signal received, stopping control loops...");
    services.shutdown_all();
    for handle in handles {
        if let Err(e) = handle.await {
            error!("Control loop ended abnormally: {}", e);
        }
    }
    info!("Node panel stopped");

    Ok(())
}
