//! # Jobdesk Entry Point
//!
//! `jobdesk serve` (default) migrates, seeds the cron registry and serves the
//! admin API until SIGINT/SIGTERM. `migrate` and `seed` run a single step.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use jobdesk::{
    config::{AppConfig, ConfigLoader},
    db, seeds,
    server::run_server,
    telemetry,
};
use migration::{Migrator, MigratorTrait};
use sea_orm::DatabaseConnection;
use tokio_util::sync::CancellationToken;

#[derive(Debug, Parser)]
#[command(name = "jobdesk", version, about = "Admin control plane for background jobs")]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Apply migrations, seed cron entries and serve the HTTP API
    Serve,
    /// Apply pending migrations and exit
    Migrate,
    /// Register cron entries from JOBDESK_CRON_ENTRIES_PATH and exit
    Seed,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = ConfigLoader::new()
        .load()
        .context("loading configuration")?;
    telemetry::init_tracing(&config).context("initializing telemetry")?;

    tracing::info!(profile = %config.profile, "Loaded configuration");
    if let Ok(redacted_json) = config.redacted_json() {
        tracing::debug!(configuration = %redacted_json, "Effective configuration");
    }

    let db = db::init_pool(&config)
        .await
        .context("initializing database connection pool")?;

    match cli.command.unwrap_or(Command::Serve) {
        Command::Migrate => migrate(&db).await,
        Command::Seed => seed(&db, &config).await,
        Command::Serve => {
            migrate(&db).await?;
            seed(&db, &config).await?;

            let shutdown = CancellationToken::new();
            tokio::spawn(cancel_on_signal(shutdown.clone()));
            run_server(config, db, shutdown).await
        }
    }
}

async fn migrate(db: &DatabaseConnection) -> Result<()> {
    Migrator::up(db, None)
        .await
        .context("applying migrations")?;
    tracing::info!("Migrations applied");
    Ok(())
}

async fn seed(db: &DatabaseConnection, config: &AppConfig) -> Result<()> {
    let Some(path) = config.cron_entries_path.as_deref() else {
        tracing::info!("JOBDESK_CRON_ENTRIES_PATH not set; skipping cron entry seeding");
        return Ok(());
    };
    let report = seeds::seed_cron_entries_from_file(db, path).await?;
    tracing::info!(
        inserted = report.inserted,
        skipped = report.skipped,
        "Cron entries seeded"
    );
    Ok(())
}

async fn cancel_on_signal(shutdown: CancellationToken) {
    let ctrl_c = async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %err, "Failed to listen for ctrl-c");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(err) => {
                tracing::error!(error = %err, "Failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }

    tracing::info!("Shutdown signal received");
    shutdown.cancel();
}
