//! Price alert entity - One detected price drop for one flight within a job.
//!
//! At most one alert exists per `(job, old_price, new_price)` triple; the drop
//! detector checks for an existing row before inserting so identical drops are
//! not re-alerted on every scheduler tick. Alerts are mutated only by marking
//! them read.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Price alert database model
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "price_alerts")]
pub struct Model {
    /// Unique identifier for the alert
    #[sea_orm(primary_key)]
    pub id: i64,
    /// ID of the monitoring job this alert belongs to
    pub monitoring_job_id: String,
    /// Alert kind, currently always `"PRICE_DROP"`
    pub alert_type: String,
    /// First observed price for the flight
    pub old_price: f64,
    /// Most recently observed price for the flight
    pub new_price: f64,
    /// Signed percentage change; negative denotes a drop
    pub percentage_change: f64,
    /// JSON snapshot of the flight's descriptive fields at alert time
    pub flight_details: String,
    /// Whether the user has acknowledged the alert
    pub is_read: bool,
    /// When the alert was created
    pub created_at: DateTimeUtc,
}

/// Defines relationships between price alerts and other entities
#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    /// Each alert belongs to one monitoring job
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
