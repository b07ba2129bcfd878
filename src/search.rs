//! Single-search response cache and flexible-date fan-out.
//!
//! Secondary helpers in front of the provider: a TTL cache so repeated user
//! searches within a few minutes do not burn provider quota, and a ±N-day
//! fan-out that runs one search per candidate date and de-duplicates the
//! combined offers. The monitoring core itself always talks to the provider
//! directly; only the user-facing search path goes through here.

use crate::{
    errors::Result,
    provider::{Flight, FlightSearchProvider, SearchCriteria},
};
use chrono::Duration as ChronoDuration;
use std::collections::HashMap;
use std::time::{Duration, Instant};
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

/// How long one cached search result stays fresh.
const DEFAULT_TTL: Duration = Duration::from_secs(600);

/// Upper bound on the flexible-search day offset.
const MAX_FLEX_DAYS: i64 = 3;

struct CacheEntry {
    flights: Vec<Flight>,
    stored_at: Instant,
}

/// TTL cache over normalized search results, keyed by the canonical criteria
/// string. Entries expire lazily on read.
pub struct SearchCache {
    entries: RwLock<HashMap<String, CacheEntry>>,
    ttl: Duration,
}

impl Default for SearchCache {
    fn default() -> Self {
        Self::new(DEFAULT_TTL)
    }
}

impl SearchCache {
    /// Builds a cache with the given entry lifetime.
    #[must_use]
    pub fn new(ttl: Duration) -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
            ttl,
        }
    }

    /// Returns the cached flights for `key` if still fresh; expired entries
    /// are removed on the way out.
    pub async fn get(&self, key: &str) -> Option<Vec<Flight>> {
        {
            let entries = self.entries.read().await;
            match entries.get(key) {
                Some(entry) if entry.stored_at.elapsed() < self.ttl => {
                    return Some(entry.flights.clone());
                }
                Some(_) => {}
                None => return None,
            }
        }
        // Entry exists but is stale; drop it under the write lock.
        self.entries.write().await.remove(key);
        None
    }

    /// Stores (or overwrites) a search result.
    pub async fn insert(&self, key: String, flights: Vec<Flight>) {
        let mut entries = self.entries.write().await;
        entries.insert(
            key,
            CacheEntry {
                flights,
                stored_at: Instant::now(),
            },
        );
    }
}

/// Runs one search through the cache: a fresh hit skips the provider
/// entirely, a miss is fetched and stored.
pub async fn cached_search(
    provider: &dyn FlightSearchProvider,
    cache: &SearchCache,
    criteria: &SearchCriteria,
) -> Result<Vec<Flight>> {
    let key = criteria.cache_key();
    if let Some(hit) = cache.get(&key).await {
        debug!("Search cache hit for {}", key);
        return Ok(hit);
    }

    let flights = provider.search(criteria).await?;
    cache.insert(key, flights.clone()).await;
    Ok(flights)
}

/// Searches a window of ±`days` around the requested departure date and
/// merges the results.
///
/// Each candidate date goes through [`cached_search`] sequentially, so a
/// fan-out shares entries with plain searches and a repeated fan-out costs no
/// provider quota. A failing date is logged and skipped rather than failing
/// the whole fan-out. Offers sharing a flight id keep only their cheapest
/// observation, and the merged list comes back price-ascending. `days` is
/// clamped to ±[`MAX_FLEX_DAYS`].
pub async fn flexible_search(
    provider: &dyn FlightSearchProvider,
    cache: &SearchCache,
    criteria: &SearchCriteria,
    days: i64,
) -> Result<Vec<Flight>> {
    let days = days.clamp(0, MAX_FLEX_DAYS);
    let mut merged: HashMap<String, Flight> = HashMap::new();
    let mut failed_dates = 0u32;

    for offset in -days..=days {
        let mut shifted = criteria.clone();
        shifted.departure_date = criteria.departure_date + ChronoDuration::days(offset);
        if let Some(return_date) = criteria.return_date {
            shifted.return_date = Some(return_date + ChronoDuration::days(offset));
        }

        match cached_search(provider, cache, &shifted).await {
            Ok(flights) => {
                for flight in flights {
                    let keep = merged
                        .get(&flight.id)
                        .map_or(true, |existing| flight.price < existing.price);
                    if keep {
                        merged.insert(flight.id.clone(), flight);
                    }
                }
            }
            Err(e) => {
                failed_dates += 1;
                warn!(
                    "Flexible search failed for {} on {}: {}",
                    criteria.origin, shifted.departure_date, e
                );
            }
        }
    }

    let mut flights: Vec<Flight> = merged.into_values().collect();
    flights.sort_by(|a, b| a.price.total_cmp(&b.price));
    info!(
        "Flexible search {} -> {} over ±{} days: {} unique offers ({} dates failed)",
        criteria.origin,
        criteria.destination,
        days,
        flights.len(),
        failed_dates
    );
    Ok(flights)
}
