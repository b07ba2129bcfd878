//! Monitoring job entity - Represents one persisted price-watch request.
//!
//! Each job describes a route (origin, destination, dates, passengers, travel
//! class, optional airline restriction) plus the lifecycle fields the scheduler
//! drives: `is_active`, `check_interval_hours` and `last_checked_at`. Inactive
//! jobs are excluded from sweeps but retained for historical reads.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Monitoring job database model
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "monitoring_jobs")]
pub struct Model {
    /// Opaque unique identifier, a UUID assigned at creation
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,
    /// Origin airport IATA code, stored uppercased (e.g. "SFO")
    pub origin: String,
    /// Destination airport IATA code, stored uppercased (e.g. "CDG")
    pub destination: String,
    /// Outbound travel date
    pub departure_date: Date,
    /// Return travel date, None for one-way watches
    pub return_date: Option<Date>,
    /// Number of adult passengers (1-9)
    pub adults: i32,
    /// Cabin class: `"ECONOMY"`, `"PREMIUM_ECONOMY"`, `"BUSINESS"` or `"FIRST"`
    pub travel_class: String,
    /// Optional JSON array of airline codes restricting the search
    pub airlines: Option<String>,
    /// Whether the scheduler still checks this job
    pub is_active: bool,
    /// Re-check cadence in hours, fixed at creation
    pub check_interval_hours: i32,
    /// When the scheduler last completed a check for this job, None if never
    pub last_checked_at: Option<DateTimeUtc>,
    /// When the job was created
    pub created_at: DateTimeUtc,
    /// When the job was last modified
    pub updated_at: DateTimeUtc,
}

/// Defines relationships between monitoring jobs and other entities
#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    /// One job has many price-history observations
    #[sea_orm(has_many = "super::price_history::Entity")]
    PriceHistory,
    /// One job has many price alerts
    #[sea_orm(has_many = "super::price_alert::Entity")]
    PriceAlerts,
}

impl Related<super::price_history::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::PriceHistory.def()
    }
}

impl Related<super::price_alert::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::PriceAlerts.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
