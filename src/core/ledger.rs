//! Price history ledger - append-only record of observed flight prices.
//!
//! One check run writes at most the 3 cheapest observed flights, every row
//! sharing a single `recorded_at`. The ledger is deliberately not an archive
//! of every query result; it is the minimal trail drop detection and trend
//! charting need. Rows are never rewritten; they disappear only when the
//! owning job is deleted.

use crate::{
    entities::{PriceHistory, price_history},
    errors::Result,
    provider::Flight,
};
use sea_orm::{QueryOrder, QuerySelect, Set, TransactionTrait, prelude::*};
use tracing::{debug, warn};

/// How many flights from each snapshot are persisted.
const RETAINED_PER_SNAPSHOT: usize = 3;

/// Records one check's observations for a job, keeping only the cheapest
/// [`RETAINED_PER_SNAPSHOT`] flights (stable sort by price ascending, ties
/// kept in original order).
///
/// All inserted rows share one `recorded_at`/`booking_date`, derived once at
/// call time, and the insert is transactional: either every retained row is
/// committed or none is. Flights with non-positive or non-finite prices are
/// rejected here so the drop detector can never divide by zero downstream.
/// An empty snapshot is a logged no-op, not an error.
///
/// Returns the number of rows written.
pub async fn record_snapshot(
    db: &DatabaseConnection,
    job_id: &str,
    flights: &[Flight],
) -> Result<usize> {
    if flights.is_empty() {
        debug!("No flights to record for job {}", job_id);
        return Ok(0);
    }

    let mut valid: Vec<&Flight> = flights
        .iter()
        .filter(|flight| {
            let ok = flight.price.is_finite() && flight.price > 0.0;
            if !ok {
                warn!(
                    "Rejecting flight {} with invalid price {} for job {}",
                    flight.id, flight.price, job_id
                );
            }
            ok
        })
        .collect();
    valid.sort_by(|a, b| a.price.total_cmp(&b.price));
    valid.truncate(RETAINED_PER_SNAPSHOT);

    if valid.is_empty() {
        debug!("No valid-priced flights to record for job {}", job_id);
        return Ok(0);
    }

    let recorded_at = chrono::Utc::now();
    let booking_date = recorded_at.date_naive();

    let txn = db.begin().await?;
    for flight in &valid {
        let entry = price_history::ActiveModel {
            monitoring_job_id: Set(job_id.to_string()),
            flight_id: Set(flight.id.clone()),
            airline: Set(flight.airline.clone()),
            airline_code: Set(flight.airline_code.clone()),
            flight_number: Set(flight.flight_number.clone()),
            departure_time: Set(flight.departure_time),
            arrival_time: Set(flight.arrival_time),
            duration: Set(flight.duration.clone()),
            stops: Set(flight.stops),
            price: Set(flight.price),
            currency: Set(flight.currency.clone()),
            recorded_at: Set(recorded_at),
            booking_date: Set(booking_date),
            travel_date: Set(flight.departure_time.date_naive()),
            ..Default::default()
        };
        entry.insert(&txn).await?;
    }
    txn.commit().await?;

    debug!(
        "Recorded {} price observations for job {}",
        valid.len(),
        job_id
    );
    Ok(valid.len())
}

/// Full history for a job, ascending by `recorded_at` (insertion order within
/// a snapshot is preserved through the id tiebreak).
pub async fn get_history(
    db: &DatabaseConnection,
    job_id: &str,
) -> Result<Vec<price_history::Model>> {
    PriceHistory::find()
        .filter(price_history::Column::MonitoringJobId.eq(job_id))
        .order_by_asc(price_history::Column::RecordedAt)
        .order_by_asc(price_history::Column::Id)
        .all(db)
        .await
        .map_err(Into::into)
}

/// Most recent `limit` history rows for a job, newest first. Used by the
/// bounded job-detail read.
pub async fn get_recent_history(
    db: &DatabaseConnection,
    job_id: &str,
    limit: u64,
) -> Result<Vec<price_history::Model>> {
    PriceHistory::find()
        .filter(price_history::Column::MonitoringJobId.eq(job_id))
        .order_by_desc(price_history::Column::RecordedAt)
        .order_by_desc(price_history::Column::Id)
        .limit(limit)
        .all(db)
        .await
        .map_err(Into::into)
}
