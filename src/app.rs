//! Service facade wiring the core together.
//!
//! One [`FareWatch`] instance is constructed at process start and passed by
//! reference wherever the operations are needed; it bundles the store, the
//! flight-search provider, the single-search cache and the scheduler. This is
//! the whole externally consumed surface; an HTTP layer would be a thin map
//! over these methods.

use crate::{
    core::{alerts, jobs, ledger, trends},
    entities::{monitoring_job, price_alert, price_history},
    errors::Result,
    provider::{Flight, FlightSearchProvider, SearchCriteria},
    scheduler::{CheckOutcome, Scheduler, SchedulerMode, SchedulerStatus, SweepOutcome},
    search::{self, SearchCache},
};
use sea_orm::DatabaseConnection;
use std::sync::Arc;
use tracing::{info, warn};

/// Long-lived application services, constructed once per process.
pub struct FareWatch {
    db: DatabaseConnection,
    provider: Arc<dyn FlightSearchProvider>,
    search_cache: SearchCache,
    scheduler: Scheduler,
}

impl FareWatch {
    /// Wires the services together. The scheduler starts disarmed; call
    /// [`FareWatch::scheduler`]`.start()` to arm it.
    #[must_use]
    pub fn new(
        db: DatabaseConnection,
        provider: Arc<dyn FlightSearchProvider>,
        mode: SchedulerMode,
    ) -> Self {
        let scheduler = Scheduler::new(db.clone(), Arc::clone(&provider), mode);
        Self {
            db,
            provider,
            search_cache: SearchCache::default(),
            scheduler,
        }
    }

    /// The scheduler, for arming/disarming at process start and stop.
    #[must_use]
    pub fn scheduler(&self) -> &Scheduler {
        &self.scheduler
    }

    /// One-off offer search through the TTL response cache.
    pub async fn search(&self, criteria: &SearchCriteria) -> Result<Vec<Flight>> {
        search::cached_search(self.provider.as_ref(), &self.search_cache, criteria).await
    }

    /// Offer search fanned out over ±`days` departure dates, de-duplicated.
    pub async fn search_flexible(
        &self,
        criteria: &SearchCriteria,
        days: i64,
    ) -> Result<Vec<Flight>> {
        search::flexible_search(self.provider.as_ref(), &self.search_cache, criteria, days).await
    }

    /// Registers a price-watch job and kicks off a best-effort first check in
    /// the background. Creation succeeds regardless of that first check; a
    /// failed or skipped check is simply covered by the next sweep.
    pub async fn create_job(&self, new: jobs::NewJob) -> Result<monitoring_job::Model> {
        let job = jobs::create_job(&self.db, new).await?;

        let scheduler = self.scheduler.clone();
        let job_id = job.id.clone();
        tokio::spawn(async move {
            match scheduler.check_job_now(&job_id).await {
                Ok(CheckOutcome::Checked { .. }) => {
                    info!("Initial check completed for new job {}", job_id);
                }
                Ok(CheckOutcome::Skipped) => {
                    info!(
                        "Initial check for new job {} deferred to the next sweep",
                        job_id
                    );
                }
                Err(e) => {
                    warn!("Initial check failed for new job {}: {}", job_id, e);
                }
            }
        });

        Ok(job)
    }

    /// All jobs, newest first, optionally only active ones.
    pub async fn list_jobs(&self, active_only: bool) -> Result<Vec<monitoring_job::Model>> {
        jobs::list_jobs(&self.db, active_only).await
    }

    /// One job with its bounded recent history and alerts.
    pub async fn get_job(&self, job_id: &str) -> Result<jobs::JobDetail> {
        jobs::get_job_detail(&self.db, job_id).await
    }

    /// Stops checking a job without deleting its data.
    pub async fn deactivate_job(&self, job_id: &str) -> Result<monitoring_job::Model> {
        jobs::deactivate_job(&self.db, job_id).await
    }

    /// Deletes a job and everything recorded for it.
    pub async fn delete_job(&self, job_id: &str) -> Result<()> {
        jobs::delete_job(&self.db, job_id).await
    }

    /// Full price history for a job, oldest first.
    pub async fn get_history(&self, job_id: &str) -> Result<Vec<price_history::Model>> {
        ledger::get_history(&self.db, job_id).await
    }

    /// Alerts, newest first, with optional job and unread filters.
    pub async fn list_alerts(
        &self,
        job_id: Option<&str>,
        unread_only: bool,
    ) -> Result<Vec<price_alert::Model>> {
        alerts::list_alerts(&self.db, job_id, unread_only).await
    }

    /// Acknowledges an alert.
    pub async fn mark_alert_read(&self, alert_id: i64) -> Result<price_alert::Model> {
        alerts::mark_alert_read(&self.db, alert_id).await
    }

    /// Price-trend series for a job.
    pub async fn get_trends(&self, job_id: &str) -> Result<Vec<trends::TrendPoint>> {
        trends::get_trends(&self.db, job_id).await
    }

    /// Forces an immediate check of one job (shares the sweep lock).
    pub async fn trigger_check(&self, job_id: &str) -> Result<CheckOutcome> {
        self.scheduler.check_job_now(job_id).await
    }

    /// Forces an immediate full sweep (skipped if one is already running).
    pub async fn trigger_sweep(&self) -> Result<SweepOutcome> {
        self.scheduler.trigger_sweep().await
    }

    /// Switches the scheduler cadence; returns whether it changed.
    pub fn set_scheduler_mode(&self, mode: SchedulerMode) -> bool {
        self.scheduler.set_mode(mode)
    }

    /// Scheduler state snapshot.
    #[must_use]
    pub fn scheduler_status(&self) -> SchedulerStatus {
        self.scheduler.status()
    }
}
