//! Configuration and database bootstrap.
//!
//! All configuration comes from the environment (with `.env` support via
//! `dotenvy` in `main`). Provider credentials are required; everything else
//! falls back to sensible defaults. Table creation uses SeaORM's
//! `Schema::create_table_from_entity` so the SQLite schema always matches the
//! entity definitions without hand-written SQL.

use crate::entities::{
    MonitoringJob, MonitoringJobColumn, PriceAlert, PriceAlertColumn, PriceHistory,
    PriceHistoryColumn,
};
use crate::errors::{Error, Result};
use crate::scheduler::SchedulerMode;
use sea_orm::sea_query::{Index, IndexCreateStatement};
use sea_orm::{ConnectionTrait, Database, DatabaseConnection, Schema};
use std::env;
use tracing::{debug, info};

/// Default local database when `DATABASE_URL` is unset. `mode=rwc` lets
/// SQLite create the file on first run.
const DEFAULT_DATABASE_URL: &str = "sqlite://data/farewatch.sqlite?mode=rwc";

/// Default Amadeus API root (their self-service test environment).
const DEFAULT_AMADEUS_BASE_URL: &str = "https://test.api.amadeus.com";

/// Process-wide application configuration, loaded once at startup.
#[derive(Debug, Clone)]
pub struct AppConfig {
    /// SeaORM connection string
    pub database_url: String,
    /// Amadeus API root URL
    pub amadeus_base_url: String,
    /// Amadeus OAuth2 client id
    pub amadeus_api_key: String,
    /// Amadeus OAuth2 client secret
    pub amadeus_api_secret: String,
    /// Initial scheduler cadence
    pub scheduler_mode: SchedulerMode,
}

/// Loads configuration from the environment.
///
/// `AMADEUS_API_KEY` and `AMADEUS_API_SECRET` are required; `DATABASE_URL`,
/// `AMADEUS_BASE_URL` and `SCHEDULER_MODE` have defaults.
pub fn load_app_configuration() -> Result<AppConfig> {
    let database_url =
        env::var("DATABASE_URL").unwrap_or_else(|_| DEFAULT_DATABASE_URL.to_string());
    let amadeus_base_url =
        env::var("AMADEUS_BASE_URL").unwrap_or_else(|_| DEFAULT_AMADEUS_BASE_URL.to_string());
    let amadeus_api_key = env::var("AMADEUS_API_KEY").map_err(|_| Error::Config {
        message: "AMADEUS_API_KEY is not set".to_string(),
    })?;
    let amadeus_api_secret = env::var("AMADEUS_API_SECRET").map_err(|_| Error::Config {
        message: "AMADEUS_API_SECRET is not set".to_string(),
    })?;
    let scheduler_mode = env::var("SCHEDULER_MODE")
        .map(|raw| raw.parse::<SchedulerMode>())
        .unwrap_or(Ok(SchedulerMode::Production))?;

    debug!(
        "Configuration loaded (db: {}, provider: {})",
        database_url, amadeus_base_url
    );
    Ok(AppConfig {
        database_url,
        amadeus_base_url,
        amadeus_api_key,
        amadeus_api_secret,
        scheduler_mode,
    })
}

/// Opens the database connection and ensures all tables exist.
///
/// Failure here is fatal to startup: the scheduler must never be armed
/// against a store it cannot reach.
pub async fn init_db(database_url: &str) -> Result<DatabaseConnection> {
    debug!("Connecting to database: {}", database_url);
    let db = Database::connect(database_url).await?;
    info!("Database connection opened. Ensuring tables are created...");
    create_tables(&db).await?;
    Ok(db)
}

/// Creates all tables from the entity definitions. Idempotent across runs
/// thanks to `if_not_exists`.
pub async fn create_tables(db: &DatabaseConnection) -> Result<()> {
    let builder = db.get_database_backend();
    let schema = Schema::new(builder);

    let mut job_table = schema.create_table_from_entity(MonitoringJob);
    let mut history_table = schema.create_table_from_entity(PriceHistory);
    let mut alert_table = schema.create_table_from_entity(PriceAlert);

    db.execute(builder.build(job_table.if_not_exists())).await?;
    db.execute(builder.build(history_table.if_not_exists()))
        .await?;
    db.execute(builder.build(alert_table.if_not_exists())).await?;

    for index in secondary_indexes() {
        db.execute(builder.build(&index)).await?;
    }

    Ok(())
}

/// Secondary indexes backing the hot read paths: active-job staleness
/// ordering, per-job history and alert scans, route lookups and alert
/// recency.
fn secondary_indexes() -> Vec<IndexCreateStatement> {
    vec![
        Index::create()
            .name("idx_monitoring_jobs_active_stale")
            .table(MonitoringJob)
            .col(MonitoringJobColumn::IsActive)
            .col(MonitoringJobColumn::LastCheckedAt)
            .if_not_exists()
            .to_owned(),
        Index::create()
            .name("idx_monitoring_jobs_route")
            .table(MonitoringJob)
            .col(MonitoringJobColumn::Origin)
            .col(MonitoringJobColumn::Destination)
            .col(MonitoringJobColumn::DepartureDate)
            .if_not_exists()
            .to_owned(),
        Index::create()
            .name("idx_price_history_job_recorded")
            .table(PriceHistory)
            .col(PriceHistoryColumn::MonitoringJobId)
            .col(PriceHistoryColumn::RecordedAt)
            .if_not_exists()
            .to_owned(),
        Index::create()
            .name("idx_price_history_travel_airline")
            .table(PriceHistory)
            .col(PriceHistoryColumn::TravelDate)
            .col(PriceHistoryColumn::AirlineCode)
            .if_not_exists()
            .to_owned(),
        Index::create()
            .name("idx_price_alerts_job_read")
            .table(PriceAlert)
            .col(PriceAlertColumn::MonitoringJobId)
            .col(PriceAlertColumn::IsRead)
            .if_not_exists()
            .to_owned(),
        Index::create()
            .name("idx_price_alerts_created")
            .table(PriceAlert)
            .col(PriceAlertColumn::CreatedAt)
            .if_not_exists()
            .to_owned(),
    ]
}
