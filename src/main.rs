//! # Channels API Main Entry Point
//!
//! This is the main entry point for the Channels API service.

use std::sync::Arc;

use channels::{config::ConfigLoader, db, server::run_server, telemetry};
use migration::{Migrator, MigratorTrait};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load configuration from layered env files and variables
    let config = ConfigLoader::new().load()?;
    config.validate()?;

    telemetry::init_tracing(&config)?;

    tracing::info!(profile = %config.profile, "Loaded configuration");
    if let Ok(redacted_json) = config.redacted_json() {
        tracing::debug!("Configuration: {}", redacted_json);
    }

    let db = db::init_pool(&config).await?;
    Migrator::up(&db, None).await?;

    run_server(Arc::new(config), db).await
}
