//! Monitoring job registry - CRUD and lifecycle over price-watch jobs.
//!
//! Jobs own their history and alerts: deleting a job cascades to both inside
//! one transaction. Deactivated jobs drop out of scheduler sweeps but remain
//! readable. `get_active_jobs` orders by staleness (never-checked first),
//! which is the scheduler's fairness mechanism.

use crate::{
    core::{alerts, ledger},
    entities::{MonitoringJob, PriceAlert, PriceHistory, monitoring_job, price_alert, price_history},
    errors::{Error, Result},
    provider::TravelClass,
};
use chrono::NaiveDate;
use sea_orm::{QueryOrder, Set, TransactionTrait, prelude::*};
use tracing::{debug, info};
use uuid::Uuid;

/// How many history rows the bounded job-detail read returns.
const DETAIL_HISTORY_LIMIT: u64 = 100;

/// How many alerts the bounded job-detail read returns.
const DETAIL_ALERT_LIMIT: u64 = 20;

/// Default re-check cadence baked into every job at creation.
const DEFAULT_CHECK_INTERVAL_HOURS: i32 = 6;

/// Parameters for registering a new price-watch job.
#[derive(Debug, Clone)]
pub struct NewJob {
    /// Origin airport IATA code (any case, trimmed and uppercased on create)
    pub origin: String,
    /// Destination airport IATA code
    pub destination: String,
    /// Outbound travel date
    pub departure_date: NaiveDate,
    /// Return travel date for round trips
    pub return_date: Option<NaiveDate>,
    /// Adult passenger count (1-9)
    pub adults: i32,
    /// Cabin class
    pub travel_class: TravelClass,
    /// Optional restriction to these airline codes
    pub airlines: Option<Vec<String>>,
}

/// A job together with its bounded recent history and alerts.
#[derive(Debug, Clone)]
pub struct JobDetail {
    /// The job itself
    pub job: monitoring_job::Model,
    /// Latest history rows, newest first, capped at [`DETAIL_HISTORY_LIMIT`]
    pub history: Vec<price_history::Model>,
    /// Latest alerts, newest first, capped at [`DETAIL_ALERT_LIMIT`]
    pub alerts: Vec<price_alert::Model>,
}

fn normalize_airport_code(raw: &str, role: &str) -> Result<String> {
    let code = raw.trim().to_uppercase();
    if code.len() != 3 || !code.chars().all(|c| c.is_ascii_alphabetic()) {
        return Err(Error::InvalidRoute {
            message: format!("{role} must be a 3-letter airport code, got {raw:?}"),
        });
    }
    Ok(code)
}

/// Registers a new price-watch job.
///
/// Airport codes are uppercased, the airline restriction is serialized to
/// JSON, and the job starts active with the fixed default check interval.
/// The id is an opaque UUID assigned here.
pub async fn create_job(db: &DatabaseConnection, new: NewJob) -> Result<monitoring_job::Model> {
    let origin = normalize_airport_code(&new.origin, "origin")?;
    let destination = normalize_airport_code(&new.destination, "destination")?;
    if origin == destination {
        return Err(Error::InvalidRoute {
            message: format!("origin and destination are both {origin}"),
        });
    }
    if !(1..=9).contains(&new.adults) {
        return Err(Error::InvalidPassengerCount { adults: new.adults });
    }

    let airlines = match &new.airlines {
        Some(codes) if !codes.is_empty() => Some(serde_json::to_string(codes)?),
        _ => None,
    };

    let now = chrono::Utc::now();
    let job = monitoring_job::ActiveModel {
        id: Set(Uuid::new_v4().to_string()),
        origin: Set(origin.clone()),
        destination: Set(destination.clone()),
        departure_date: Set(new.departure_date),
        return_date: Set(new.return_date),
        adults: Set(new.adults),
        travel_class: Set(new.travel_class.as_str().to_string()),
        airlines: Set(airlines),
        is_active: Set(true),
        check_interval_hours: Set(DEFAULT_CHECK_INTERVAL_HOURS),
        last_checked_at: Set(None),
        created_at: Set(now),
        updated_at: Set(now),
    };

    let created = job.insert(db).await?;
    info!(
        "Created monitoring job {} for {} -> {} on {}",
        created.id, origin, destination, created.departure_date
    );
    Ok(created)
}

/// Active jobs ordered by staleness: never-checked jobs first (NULL sorts
/// first on ascending order), then oldest `last_checked_at`.
pub async fn get_active_jobs(db: &DatabaseConnection) -> Result<Vec<monitoring_job::Model>> {
    MonitoringJob::find()
        .filter(monitoring_job::Column::IsActive.eq(true))
        .order_by_asc(monitoring_job::Column::LastCheckedAt)
        .all(db)
        .await
        .map_err(Into::into)
}

/// All jobs, newest first, optionally restricted to active ones.
pub async fn list_jobs(
    db: &DatabaseConnection,
    active_only: bool,
) -> Result<Vec<monitoring_job::Model>> {
    let mut query = MonitoringJob::find();
    if active_only {
        query = query.filter(monitoring_job::Column::IsActive.eq(true));
    }
    query
        .order_by_desc(monitoring_job::Column::CreatedAt)
        .all(db)
        .await
        .map_err(Into::into)
}

/// Fetches a job by id, or the typed not-found error.
pub async fn get_job(db: &DatabaseConnection, job_id: &str) -> Result<monitoring_job::Model> {
    MonitoringJob::find_by_id(job_id)
        .one(db)
        .await?
        .ok_or_else(|| Error::JobNotFound {
            id: job_id.to_string(),
        })
}

/// Fetches a job together with its latest history and alerts (both bounded,
/// newest first).
pub async fn get_job_detail(db: &DatabaseConnection, job_id: &str) -> Result<JobDetail> {
    let job = get_job(db, job_id).await?;
    let history = ledger::get_recent_history(db, job_id, DETAIL_HISTORY_LIMIT).await?;
    let job_alerts = alerts::get_recent_alerts(db, job_id, DETAIL_ALERT_LIMIT).await?;
    Ok(JobDetail {
        job,
        history,
        alerts: job_alerts,
    })
}

/// Deactivates a job: the scheduler stops checking it, but its history and
/// alerts stay readable.
pub async fn deactivate_job(db: &DatabaseConnection, job_id: &str) -> Result<monitoring_job::Model> {
    let job = get_job(db, job_id).await?;

    let mut active: monitoring_job::ActiveModel = job.into();
    active.is_active = Set(false);
    active.updated_at = Set(chrono::Utc::now());
    let updated = active.update(db).await?;
    info!("Deactivated monitoring job {}", job_id);
    Ok(updated)
}

/// Deletes a job and cascades to its history and alerts.
///
/// All three deletions run inside one transaction: either everything is
/// removed or nothing is.
pub async fn delete_job(db: &DatabaseConnection, job_id: &str) -> Result<()> {
    // Existence check up front so callers get the typed not-found error.
    get_job(db, job_id).await?;

    let txn = db.begin().await?;

    PriceHistory::delete_many()
        .filter(price_history::Column::MonitoringJobId.eq(job_id))
        .exec(&txn)
        .await?;
    PriceAlert::delete_many()
        .filter(price_alert::Column::MonitoringJobId.eq(job_id))
        .exec(&txn)
        .await?;
    MonitoringJob::delete_by_id(job_id).exec(&txn).await?;

    txn.commit().await?;
    info!("Deleted monitoring job {} with its history and alerts", job_id);
    Ok(())
}

/// Stamps `last_checked_at` (and `updated_at`) with the current time after a
/// completed check.
pub async fn touch_last_checked(
    db: &DatabaseConnection,
    job_id: &str,
) -> Result<monitoring_job::Model> {
    let job = get_job(db, job_id).await?;
    let now = chrono::Utc::now();

    let mut active: monitoring_job::ActiveModel = job.into();
    active.last_checked_at = Set(Some(now));
    active.updated_at = Set(now);
    let updated = active.update(db).await?;
    debug!("Touched last_checked_at for job {}", job_id);
    Ok(updated)
}
