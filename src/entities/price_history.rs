//! Price history entity - One observed price for one flight at one instant.
//!
//! Rows are append-only: a check run only ever inserts, and every row written
//! by the same run shares a single `recorded_at`. Rows are removed only as a
//! cascade of deleting the owning job.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Price history database model
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "price_history")]
pub struct Model {
    /// Unique identifier for the observation
    #[sea_orm(primary_key)]
    pub id: i64,
    /// ID of the monitoring job this observation belongs to
    pub monitoring_job_id: String,
    /// Provider-assigned offer identifier, the continuity key across checks
    pub flight_id: String,
    /// Carrier display name (e.g. "Air France")
    pub airline: String,
    /// Carrier IATA code (e.g. "AF")
    pub airline_code: String,
    /// Flight number of the first outbound segment
    pub flight_number: String,
    /// Departure timestamp of the outbound itinerary
    pub departure_time: DateTimeUtc,
    /// Arrival timestamp of the outbound itinerary
    pub arrival_time: DateTimeUtc,
    /// Human-readable total duration (e.g. "11h 30m")
    pub duration: String,
    /// Number of stops on the outbound itinerary
    pub stops: i32,
    /// Observed total price
    pub price: f64,
    /// ISO currency code of the price
    pub currency: String,
    /// When this observation was made
    pub recorded_at: DateTimeUtc,
    /// Calendar date of the check, derived from `recorded_at`
    pub booking_date: Date,
    /// Calendar date of travel, derived from the flight's departure
    pub travel_date: Date,
}

/// Defines relationships between price history and other entities
#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    /// Each observation belongs to one monitoring job
    #[sea_orm(
        belongs_to = "super::monitoring_job::Entity",
        from = "Column::MonitoringJobId",
        to = "super::monitoring_job::Column::Id"
    )]
    MonitoringJob,
}

impl Related<super::monitoring_job::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::MonitoringJob.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
