//! Drop detector and price-alert operations.
//!
//! The detector compares each tracked flight's first observed price against
//! its most recent one, and raises a `PRICE_DROP` alert when the cumulative
//! drop reaches the threshold. Comparing first-vs-latest (not
//! previous-vs-latest) means a price that drops and partially rebounds keeps
//! its standing alert until a new drop against the original crosses the
//! threshold with a different latest value.

use crate::{
    core::ledger,
    entities::{PriceAlert, price_alert, price_history},
    errors::{Error, Result},
};
use sea_orm::{QueryOrder, QuerySelect, Set, prelude::*};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

/// Minimum cumulative drop, in percent of the first observed price, that
/// raises an alert.
const DROP_THRESHOLD_PERCENT: f64 = 10.0;

/// Descriptive snapshot of one flight, serialized into
/// `price_alert::Model::flight_details` at alert time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FlightDetails {
    /// Provider-assigned offer identifier
    pub flight_id: String,
    /// Carrier display name
    pub airline: String,
    /// Carrier IATA code
    pub airline_code: String,
    /// Flight number
    pub flight_number: String,
    /// Outbound departure timestamp
    pub departure_time: chrono::DateTime<chrono::Utc>,
    /// Outbound arrival timestamp
    pub arrival_time: chrono::DateTime<chrono::Utc>,
    /// Human-readable duration
    pub duration: String,
    /// Stops on the outbound itinerary
    pub stops: i32,
    /// Observed price at alert time
    pub price: f64,
    /// ISO currency code
    pub currency: String,
}

impl From<&price_history::Model> for FlightDetails {
    fn from(row: &price_history::Model) -> Self {
        Self {
            flight_id: row.flight_id.clone(),
            airline: row.airline.clone(),
            airline_code: row.airline_code.clone(),
            flight_number: row.flight_number.clone(),
            departure_time: row.departure_time,
            arrival_time: row.arrival_time,
            duration: row.duration.clone(),
            stops: row.stops,
            price: row.price,
            currency: row.currency.clone(),
        }
    }
}

/// Scans a job's full price history for qualifying drops and inserts the
/// missing alerts.
///
/// Rows are grouped by `flight_id` (the provider-assigned offer id is the
/// continuity key across check runs). For each flight seen at least twice,
/// the percent change from first to latest observed price is computed; at or
/// above [`DROP_THRESHOLD_PERCENT`] an alert is created unless one already
/// exists for the exact `(job, old_price, new_price)` triple. A failure on
/// one flight is logged and never prevents evaluation of the others.
///
/// Returns the alerts created by this invocation.
pub async fn check_for_price_drops(
    db: &DatabaseConnection,
    job_id: &str,
) -> Result<Vec<price_alert::Model>> {
    let history = ledger::get_history(db, job_id).await?;
    if history.len() < 2 {
        debug!(
            "Job {} has {} history rows, nothing to compare",
            job_id,
            history.len()
        );
        return Ok(Vec::new());
    }

    // Group rows by flight id, preserving first-seen order for determinism.
    let mut groups: Vec<(&str, Vec<&price_history::Model>)> = Vec::new();
    for row in &history {
        match groups.iter_mut().find(|(id, _)| *id == row.flight_id) {
            Some((_, rows)) => rows.push(row),
            None => groups.push((row.flight_id.as_str(), vec![row])),
        }
    }

    let mut created = Vec::new();
    for (flight_id, rows) in groups {
        if rows.len() < 2 {
            continue;
        }
        // get_history orders ascending, so first/last are earliest/latest.
        let first = rows[0];
        let latest = rows[rows.len() - 1];

        if first.price <= 0.0 {
            warn!(
                "Job {} flight {} has non-positive first price {}, skipping group",
                job_id, flight_id, first.price
            );
            continue;
        }

        // Multiply before dividing so round decimal drops (100 -> 90) land
        // exactly on the threshold instead of a hair above it.
        let percent_change = (first.price - latest.price) * 100.0 / first.price;
        if percent_change < DROP_THRESHOLD_PERCENT {
            continue;
        }

        match create_alert_if_missing(db, job_id, first.price, latest.price, percent_change, latest)
            .await
        {
            Ok(Some(alert)) => {
                info!(
                    "Price drop alert for job {} flight {}: {} -> {} ({:.1}%)",
                    job_id, flight_id, first.price, latest.price, percent_change
                );
                created.push(alert);
            }
            Ok(None) => {
                debug!(
                    "Alert already exists for job {} drop {} -> {}",
                    job_id, first.price, latest.price
                );
            }
            Err(e) => {
                // One flight's failure must not abort the remaining groups.
                warn!(
                    "Failed to record alert for job {} flight {}: {}",
                    job_id, flight_id, e
                );
            }
        }
    }

    Ok(created)
}

/// Inserts a `PRICE_DROP` alert unless one already exists for the exact
/// `(job, old_price, new_price)` triple. Returns `None` on the duplicate.
async fn create_alert_if_missing(
    db: &DatabaseConnection,
    job_id: &str,
    old_price: f64,
    new_price: f64,
    percent_change: f64,
    latest: &price_history::Model,
) -> Result<Option<price_alert::Model>> {
    let existing = PriceAlert::find()
        .filter(price_alert::Column::MonitoringJobId.eq(job_id))
        .filter(price_alert::Column::OldPrice.eq(old_price))
        .filter(price_alert::Column::NewPrice.eq(new_price))
        .one(db)
        .await?;
    if existing.is_some() {
        return Ok(None);
    }

    let details = FlightDetails::from(latest);
    let alert = price_alert::ActiveModel {
        monitoring_job_id: Set(job_id.to_string()),
        alert_type: Set("PRICE_DROP".to_string()),
        old_price: Set(old_price),
        new_price: Set(new_price),
        // Sign convention: negative percentage denotes a drop.
        percentage_change: Set(-percent_change),
        flight_details: Set(serde_json::to_string(&details)?),
        is_read: Set(false),
        created_at: Set(chrono::Utc::now()),
        ..Default::default()
    };
    Ok(Some(alert.insert(db).await?))
}

/// Lists alerts, newest first, optionally restricted to one job and/or to
/// unread alerts only.
pub async fn list_alerts(
    db: &DatabaseConnection,
    job_id: Option<&str>,
    unread_only: bool,
) -> Result<Vec<price_alert::Model>> {
    let mut query = PriceAlert::find();
    if let Some(job_id) = job_id {
        query = query.filter(price_alert::Column::MonitoringJobId.eq(job_id));
    }
    if unread_only {
        query = query.filter(price_alert::Column::IsRead.eq(false));
    }
    query
        .order_by_desc(price_alert::Column::CreatedAt)
        .order_by_desc(price_alert::Column::Id)
        .all(db)
        .await
        .map_err(Into::into)
}

/// Most recent `limit` alerts for a job, newest first. Used by the bounded
/// job-detail read.
pub async fn get_recent_alerts(
    db: &DatabaseConnection,
    job_id: &str,
    limit: u64,
) -> Result<Vec<price_alert::Model>> {
    PriceAlert::find()
        .filter(price_alert::Column::MonitoringJobId.eq(job_id))
        .order_by_desc(price_alert::Column::CreatedAt)
        .order_by_desc(price_alert::Column::Id)
        .limit(limit)
        .all(db)
        .await
        .map_err(Into::into)
}

/// Marks an alert as read. Unknown ids return the typed not-found error.
pub async fn mark_alert_read(db: &DatabaseConnection, alert_id: i64) -> Result<price_alert::Model> {
    let alert = PriceAlert::find_by_id(alert_id)
        .one(db)
        .await?
        .ok_or(Error::AlertNotFound { id: alert_id })?;

    let mut active: price_alert::ActiveModel = alert.into();
    active.is_read = Set(true);
    active.update(db).await.map_err(Into::into)
}
