//! Entity module - Contains all SeaORM entity definitions for the database.
//! These entities represent the database tables and their relationships.
//! Each entity has a Model struct for data and an Entity struct for operations.

pub mod monitoring_job;
pub mod price_alert;
pub mod price_history;

// Re-export specific types to avoid conflicts
pub use monitoring_job::{
    Column as MonitoringJobColumn, Entity as MonitoringJob, Model as MonitoringJobModel,
};
pub use price_alert::{Column as PriceAlertColumn, Entity as PriceAlert, Model as PriceAlertModel};
pub use price_history::{
    Column as PriceHistoryColumn, Entity as PriceHistory, Model as PriceHistoryModel,
};
