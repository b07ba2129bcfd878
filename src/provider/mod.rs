//! Flight-search provider seam.
//!
//! The monitoring core never talks HTTP directly; it consumes the
//! [`FlightSearchProvider`] trait, which yields normalized [`Flight`] records
//! sorted by price ascending. The production implementation is the Amadeus
//! client in [`amadeus`]; tests substitute scripted providers.

pub mod amadeus;

use crate::errors::{Error, Result};
use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

pub use amadeus::AmadeusClient;

/// Cabin class accepted by the search provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TravelClass {
    /// Economy cabin (the default)
    #[default]
    Economy,
    /// Premium economy cabin
    PremiumEconomy,
    /// Business cabin
    Business,
    /// First-class cabin
    First,
}

impl TravelClass {
    /// Wire/storage representation, matching the provider's enum values.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Economy => "ECONOMY",
            Self::PremiumEconomy => "PREMIUM_ECONOMY",
            Self::Business => "BUSINESS",
            Self::First => "FIRST",
        }
    }
}

impl fmt::Display for TravelClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TravelClass {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_uppercase().as_str() {
            "" | "ECONOMY" => Ok(Self::Economy),
            "PREMIUM_ECONOMY" => Ok(Self::PremiumEconomy),
            "BUSINESS" => Ok(Self::Business),
            "FIRST" => Ok(Self::First),
            other => Err(Error::Config {
                message: format!("Unknown travel class: {other}"),
            }),
        }
    }
}

/// One normalized flight offer as the monitoring core sees it.
///
/// `id` is the provider-assigned offer identifier and doubles as the
/// continuity key the drop detector groups on across check runs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Flight {
    /// Provider-assigned offer identifier
    pub id: String,
    /// Carrier display name
    pub airline: String,
    /// Carrier IATA code
    pub airline_code: String,
    /// Flight number of the first outbound segment
    pub flight_number: String,
    /// Outbound departure timestamp
    pub departure_time: DateTime<Utc>,
    /// Outbound arrival timestamp
    pub arrival_time: DateTime<Utc>,
    /// Human-readable outbound duration, e.g. "11h 30m"
    pub duration: String,
    /// Stops on the outbound itinerary
    pub stops: i32,
    /// Total offer price
    pub price: f64,
    /// ISO currency code
    pub currency: String,
}

/// Parameters for one provider search call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchCriteria {
    /// Origin airport IATA code, uppercased
    pub origin: String,
    /// Destination airport IATA code, uppercased
    pub destination: String,
    /// Outbound travel date
    pub departure_date: NaiveDate,
    /// Return travel date for round trips
    pub return_date: Option<NaiveDate>,
    /// Adult passenger count (1-9)
    pub adults: i32,
    /// Cabin class
    pub travel_class: TravelClass,
    /// Optional restriction to these airline codes
    pub airlines: Option<Vec<String>>,
}

impl SearchCriteria {
    /// Canonical key for the single-search response cache: every field that
    /// changes the provider result participates.
    #[must_use]
    pub fn cache_key(&self) -> String {
        let return_date = self
            .return_date
            .map_or_else(String::new, |d| d.to_string());
        let airlines = self
            .airlines
            .as_ref()
            .map_or_else(String::new, |codes| codes.join(","));
        format!(
            "{}:{}:{}:{}:{}:{}:{}",
            self.origin,
            self.destination,
            self.departure_date,
            return_date,
            self.adults,
            self.travel_class,
            airlines
        )
    }
}

/// External flight-search collaborator.
///
/// Implementations own authentication, transport and normalization; the
/// returned offers are always sorted by price ascending.
#[async_trait]
pub trait FlightSearchProvider: Send + Sync {
    /// Searches flight offers for the given criteria.
    async fn search(&self, criteria: &SearchCriteria) -> Result<Vec<Flight>>;
}
