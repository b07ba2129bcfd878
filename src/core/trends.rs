//! Trend aggregator - reshapes the ledger into a chartable time series.
//!
//! One point per distinct `recorded_at` in the ledger, carrying the (up to 3)
//! observations made at that instant, cheapest first. This is a reshape, not
//! a rollup: no averaging or other statistics happen here.

use crate::{core::ledger, errors::Result, entities::price_history};
use chrono::{DateTime, Utc};
use sea_orm::DatabaseConnection;
use serde::Serialize;

/// One flight observation inside a trend point.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TrendFlight {
    /// Provider-assigned offer identifier
    pub flight_id: String,
    /// Carrier display name
    pub airline: String,
    /// Flight number
    pub flight_number: String,
    /// Observed price
    pub price: f64,
    /// ISO currency code
    pub currency: String,
}

impl From<&price_history::Model> for TrendFlight {
    fn from(row: &price_history::Model) -> Self {
        Self {
            flight_id: row.flight_id.clone(),
            airline: row.airline.clone(),
            flight_number: row.flight_number.clone(),
            price: row.price,
            currency: row.currency.clone(),
        }
    }
}

/// All observations sharing one `recorded_at`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TrendPoint {
    /// The shared observation timestamp
    pub recorded_at: DateTime<Utc>,
    /// Observations at that instant, cheapest first
    pub flights: Vec<TrendFlight>,
}

/// Builds the price-trend series for a job.
///
/// Ledger rows arrive ascending by `recorded_at`, so points fall out of a
/// single consecutive-grouping pass; within each point flights are re-sorted
/// cheapest first.
pub async fn get_trends(db: &DatabaseConnection, job_id: &str) -> Result<Vec<TrendPoint>> {
    let history = ledger::get_history(db, job_id).await?;

    let mut points: Vec<TrendPoint> = Vec::new();
    for row in &history {
        match points.last_mut() {
            Some(point) if point.recorded_at == row.recorded_at => {
                point.flights.push(TrendFlight::from(row));
            }
            _ => points.push(TrendPoint {
                recorded_at: row.recorded_at,
                flights: vec![TrendFlight::from(row)],
            }),
        }
    }

    for point in &mut points {
        point.flights.sort_by(|a, b| a.price.total_cmp(&b.price));
    }
    Ok(points)
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    #![allow(clippy::float_cmp)]
    use super::*;
    use crate::core::ledger::record_snapshot;
    use crate::test_utils::{create_test_job, make_flight, setup_test_db};

    #[tokio::test]
    async fn one_point_per_snapshot_cheapest_first() -> Result<()> {
        let db = setup_test_db().await?;
        let job = create_test_job(&db, "SFO", "CDG").await?;

        record_snapshot(
            &db,
            &job.id,
            &[
                make_flight("F2", 455.0),
                make_flight("F1", 420.0),
                make_flight("F3", 500.0),
            ],
        )
        .await?;
        record_snapshot(
            &db,
            &job.id,
            &[make_flight("F1", 378.0), make_flight("F2", 460.0)],
        )
        .await?;

        let trends = get_trends(&db, &job.id).await?;
        assert_eq!(trends.len(), 2);

        assert_eq!(trends[0].flights.len(), 3);
        let first_prices: Vec<f64> = trends[0].flights.iter().map(|f| f.price).collect();
        assert_eq!(first_prices, vec![420.0, 455.0, 500.0]);

        assert_eq!(trends[1].flights.len(), 2);
        assert_eq!(trends[1].flights[0].flight_id, "F1");
        assert_eq!(trends[1].flights[0].price, 378.0);

        // Points are ordered by observation time.
        assert!(trends[0].recorded_at <= trends[1].recorded_at);
        Ok(())
    }

    #[tokio::test]
    async fn empty_ledger_yields_empty_series() -> Result<()> {
        let db = setup_test_db().await?;
        let job = create_test_job(&db, "SFO", "CDG").await?;
        assert!(get_trends(&db, &job.id).await?.is_empty());
        Ok(())
    }
}
