use dotenvy::dotenv;
use farewatch::app::FareWatch;
use farewatch::errors::Result;
use farewatch::config;
use farewatch::provider::AmadeusClient;
use std::sync::Arc;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    // 1. Initialize tracing (as early as possible)
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    // 2. Load .env file (non-fatal, env vars can be set externally)
    dotenv().ok();
    info!("Attempted to load .env file.");

    // 3. Load the application configuration
    let app_config = config::load_app_configuration()
        .inspect_err(|e| error!("Critical error loading configuration: {}", e))?;
    info!("Successfully processed application configuration.");

    // 4. Initialize database. Failure here is fatal: the scheduler must not
    //    be armed against a store it cannot reach.
    let db = config::init_db(&app_config.database_url)
        .await
        .inspect(|_| info!("Database initialized successfully."))
        .inspect_err(|e| error!("Failed to initialize database: {}", e))?;

    // 5. Build the provider client and the service facade
    let provider = Arc::new(AmadeusClient::new(
        &app_config.amadeus_base_url,
        app_config.amadeus_api_key.clone(),
        app_config.amadeus_api_secret.clone(),
    )?);
    let app = FareWatch::new(db, provider, app_config.scheduler_mode);

    // 6. Arm the scheduler and run until interrupted
    app.scheduler().start();
    let status = app.scheduler_status();
    info!(
        "farewatch running; price checks {} (mode {:?})",
        status.cadence, status.mode
    );

    tokio::signal::ctrl_c().await.map_err(|e| {
        error!("Failed to listen for shutdown signal: {}", e);
        farewatch::errors::Error::Io(e)
    })?;
    info!("Shutdown signal received, disarming scheduler.");
    app.scheduler().stop();

    Ok(())
}
