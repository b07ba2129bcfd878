//! Shared test utilities for farewatch.
//!
//! Provides the in-memory database setup, factories for jobs and normalized
//! flights with sensible defaults, and two mock providers: one scripted
//! (queued responses, criteria log) and one slow (for exercising the sweep
//! lock).

#![allow(clippy::unwrap_used)]

use crate::{
    config,
    core::jobs::{self, NewJob},
    entities::monitoring_job,
    errors::Result,
    provider::{Flight, FlightSearchProvider, SearchCriteria, TravelClass},
};
use async_trait::async_trait;
use chrono::{DateTime, Duration as ChronoDuration, NaiveDate, TimeZone, Utc};
use sea_orm::{DatabaseConnection, Set, prelude::*};
use std::collections::VecDeque;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

/// Creates an in-memory `SQLite` database with all tables initialized.
/// This is the standard setup for all integration tests.
pub async fn setup_test_db() -> Result<DatabaseConnection> {
    // Under `start_paused` tokio tests, SQLite work runs on sqlx's dedicated
    // worker thread, so whenever the test runtime parks the paused clock
    // auto-advances to the nearest pending timer. sqlx's pool owns timers
    // (acquire timeout, idle/lifetime reaper) and returns connections via a
    // spawned task that itself waits on the worker thread, so a park with a
    // pool timer pending jumps the clock by the whole timeout. Two defenses:
    // the pool is built with no reaper, no ping-on-acquire, and an
    // effectively unbounded acquire timeout; and a detached "pacemaker" task
    // sleeps in 1ms steps so auto-advance only ever moves 1ms per park —
    // pool timers can never fire and paused-clock elapsed-time measurements
    // are inflated by milliseconds at most, while real test sleeps still
    // complete (in 1ms increments).
    tokio::spawn(async {
        loop {
            // The yields give the worker thread real time to respond within a
            // single 1ms virtual step, keeping the drift per DB round trip to
            // about a millisecond.
            for _ in 0..25 {
                tokio::task::yield_now().await;
            }
            tokio::time::sleep(Duration::from_millis(1)).await;
        }
    });
    let pool = sea_orm::sqlx::pool::PoolOptions::new()
        .max_connections(1)
        .idle_timeout(None)
        .max_lifetime(None)
        .acquire_timeout(Duration::from_secs(30 * 86400))
        .test_before_acquire(false)
        .connect("sqlite::memory:")
        .await
        .map_err(|e| sea_orm::DbErr::Conn(sea_orm::RuntimeErr::SqlxError(e)))?;
    let db = sea_orm::SqlxSqliteConnector::from_sqlx_sqlite_pool(pool);
    config::create_tables(&db).await?;
    Ok(db)
}

/// Default departure date used by the factories.
pub fn test_departure_date() -> NaiveDate {
    NaiveDate::from_ymd_opt(2026, 9, 1).unwrap()
}

/// Creates a test job with sensible defaults: one adult, economy, one-way on
/// the default departure date, no airline restriction.
pub async fn create_test_job(
    db: &DatabaseConnection,
    origin: &str,
    destination: &str,
) -> Result<monitoring_job::Model> {
    jobs::create_job(
        db,
        NewJob {
            origin: origin.to_string(),
            destination: destination.to_string(),
            departure_date: test_departure_date(),
            return_date: None,
            adults: 1,
            travel_class: TravelClass::Economy,
            airlines: None,
        },
    )
    .await
}

/// Creates a test job and pins its `last_checked_at`, for staleness-ordering
/// scenarios.
pub async fn create_custom_job(
    db: &DatabaseConnection,
    origin: &str,
    destination: &str,
    last_checked_at: Option<DateTime<Utc>>,
) -> Result<monitoring_job::Model> {
    let job = create_test_job(db, origin, destination).await?;
    let mut active: monitoring_job::ActiveModel = job.into();
    active.last_checked_at = Set(last_checked_at);
    active.update(db).await.map_err(Into::into)
}

/// Builds a normalized flight with the given offer id and price; everything
/// else is a fixed plausible Air France itinerary.
pub fn make_flight(id: &str, price: f64) -> Flight {
    let departure_time = Utc.with_ymd_and_hms(2026, 9, 1, 10, 30, 0).unwrap();
    Flight {
        id: id.to_string(),
        airline: "Air France".to_string(),
        airline_code: "AF".to_string(),
        flight_number: "AF83".to_string(),
        departure_time,
        arrival_time: departure_time + ChronoDuration::minutes(11 * 60 + 30),
        duration: "11h 30m".to_string(),
        stops: 1,
        price,
        currency: "USD".to_string(),
    }
}

/// Builds default search criteria for a route.
pub fn test_criteria(origin: &str, destination: &str) -> SearchCriteria {
    SearchCriteria {
        origin: origin.to_string(),
        destination: destination.to_string(),
        departure_date: test_departure_date(),
        return_date: None,
        adults: 1,
        travel_class: TravelClass::Economy,
        airlines: None,
    }
}

/// Mock provider fed from a queue of responses, logging every criteria it
/// was called with. When the queue runs dry it serves the repeating template
/// (if configured) or an empty result.
pub struct ScriptedProvider {
    responses: Mutex<VecDeque<Result<Vec<Flight>>>>,
    repeating: Option<Vec<Flight>>,
    calls: AtomicUsize,
    criteria_log: Mutex<Vec<SearchCriteria>>,
    call_instants: Mutex<Vec<tokio::time::Instant>>,
}

impl ScriptedProvider {
    /// Serves the queued responses in order, then empty results.
    pub fn new(responses: Vec<Result<Vec<Flight>>>) -> Self {
        Self {
            responses: Mutex::new(responses.into_iter().collect()),
            repeating: None,
            calls: AtomicUsize::new(0),
            criteria_log: Mutex::new(Vec::new()),
            call_instants: Mutex::new(Vec::new()),
        }
    }

    /// Serves the same flights on every call.
    pub fn repeating(flights: Vec<Flight>) -> Self {
        Self {
            responses: Mutex::new(VecDeque::new()),
            repeating: Some(flights),
            calls: AtomicUsize::new(0),
            criteria_log: Mutex::new(Vec::new()),
            call_instants: Mutex::new(Vec::new()),
        }
    }

    /// How many times `search` was called.
    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Origins of every search, in call order.
    pub fn searched_origins(&self) -> Vec<String> {
        self.criteria_log
            .lock()
            .unwrap()
            .iter()
            .map(|c| c.origin.clone())
            .collect()
    }

    /// Departure dates of every search, in call order.
    pub fn searched_departure_dates(&self) -> Vec<NaiveDate> {
        self.criteria_log
            .lock()
            .unwrap()
            .iter()
            .map(|c| c.departure_date)
            .collect()
    }

    /// Tokio-clock timestamps of every search, in call order. Meaningful
    /// under a paused test clock, where gaps come only from explicit sleeps.
    pub fn call_instants(&self) -> Vec<tokio::time::Instant> {
        self.call_instants.lock().unwrap().clone()
    }
}

#[async_trait]
impl FlightSearchProvider for ScriptedProvider {
    async fn search(&self, criteria: &SearchCriteria) -> Result<Vec<Flight>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.criteria_log.lock().unwrap().push(criteria.clone());
        self.call_instants
            .lock()
            .unwrap()
            .push(tokio::time::Instant::now());

        if let Some(response) = self.responses.lock().unwrap().pop_front() {
            return response;
        }
        Ok(self.repeating.clone().unwrap_or_default())
    }
}

/// Mock provider that sleeps before answering, for holding the sweep lock
/// open in mutual-exclusion tests.
pub struct SlowProvider {
    delay: Duration,
}

impl SlowProvider {
    /// Sleeps `delay` on every search, then returns no offers.
    pub fn new(delay: Duration) -> Self {
        Self { delay }
    }
}

#[async_trait]
impl FlightSearchProvider for SlowProvider {
    async fn search(&self, _criteria: &SearchCriteria) -> Result<Vec<Flight>> {
        tokio::time::sleep(self.delay).await;
        Ok(Vec::new())
    }
}
