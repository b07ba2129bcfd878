//! Amadeus flight-offers client.
//!
//! Implements the OAuth2 client-credentials flow with a cached bearer token
//! (refreshed 60 seconds before its advertised expiry), one retry on an
//! auth-rejected search, and a distinct rate-limit error so callers can back
//! off instead of hammering the API. Raw offers are normalized into [`Flight`]
//! records sorted by price ascending before they leave this module.

use super::{Flight, FlightSearchProvider, SearchCriteria};
use crate::errors::{Error, Result};
use async_trait::async_trait;
use chrono::NaiveDateTime;
use reqwest::StatusCode;
use serde::Deserialize;
use std::collections::HashMap;
use std::time::{Duration, Instant};
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

/// Refresh the token this long before the provider says it expires.
const TOKEN_EXPIRY_BUFFER: Duration = Duration::from_secs(60);

/// Bound on any single provider request so a hung upstream cannot stall a
/// scheduler sweep indefinitely.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Cap on offers requested per search; the ledger keeps only the cheapest 3.
const MAX_OFFERS: u32 = 20;

#[derive(Debug, Clone)]
struct CachedToken {
    access_token: String,
    expires_at: Instant,
}

/// Amadeus API client with token caching.
pub struct AmadeusClient {
    http: reqwest::Client,
    base_url: String,
    api_key: String,
    api_secret: String,
    token: RwLock<Option<CachedToken>>,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    expires_in: u64,
}

#[derive(Debug, Deserialize)]
pub(crate) struct RawSearchResponse {
    #[serde(default)]
    pub data: Vec<RawOffer>,
    #[serde(default)]
    pub dictionaries: Option<RawDictionaries>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct RawDictionaries {
    #[serde(default)]
    pub carriers: HashMap<String, String>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct RawOffer {
    pub id: String,
    pub itineraries: Vec<RawItinerary>,
    pub price: RawPrice,
}

#[derive(Debug, Deserialize)]
pub(crate) struct RawItinerary {
    #[serde(default)]
    pub duration: String,
    pub segments: Vec<RawSegment>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct RawSegment {
    pub departure: RawEndpoint,
    pub arrival: RawEndpoint,
    pub carrier_code: String,
    pub number: String,
}

#[derive(Debug, Deserialize)]
pub(crate) struct RawEndpoint {
    pub at: String,
}

#[derive(Debug, Deserialize)]
pub(crate) struct RawPrice {
    pub total: String,
    pub currency: String,
}

impl AmadeusClient {
    /// Builds a client against the given API root (e.g.
    /// `https://test.api.amadeus.com`) with a bounded request timeout.
    pub fn new(base_url: &str, api_key: String, api_secret: String) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()?;
        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key,
            api_secret,
            token: RwLock::new(None),
        })
    }

    /// Returns a valid bearer token, fetching a fresh one when the cache is
    /// empty or inside the early-expiry buffer.
    async fn authenticate(&self) -> Result<String> {
        if let Some(cached) = self.token.read().await.as_ref() {
            if cached.expires_at > Instant::now() {
                return Ok(cached.access_token.clone());
            }
        }

        debug!("Fetching new Amadeus access token");
        let response = self
            .http
            .post(format!("{}/v1/security/oauth2/token", self.base_url))
            .form(&[
                ("grant_type", "client_credentials"),
                ("client_id", self.api_key.as_str()),
                ("client_secret", self.api_secret.as_str()),
            ])
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(Error::Auth {
                message: format!("token endpoint returned {status}: {body}"),
            });
        }

        let token: TokenResponse = response.json().await?;
        let lifetime = Duration::from_secs(token.expires_in)
            .saturating_sub(TOKEN_EXPIRY_BUFFER);
        let cached = CachedToken {
            access_token: token.access_token.clone(),
            expires_at: Instant::now() + lifetime,
        };
        *self.token.write().await = Some(cached);
        info!("Amadeus access token refreshed (lifetime {}s)", token.expires_in);
        Ok(token.access_token)
    }

    async fn search_once(&self, criteria: &SearchCriteria, token: &str) -> Result<reqwest::Response> {
        let mut query: Vec<(&str, String)> = vec![
            ("originLocationCode", criteria.origin.clone()),
            ("destinationLocationCode", criteria.destination.clone()),
            ("departureDate", criteria.departure_date.to_string()),
            ("adults", criteria.adults.to_string()),
            ("travelClass", criteria.travel_class.to_string()),
            ("max", MAX_OFFERS.to_string()),
        ];
        if let Some(return_date) = criteria.return_date {
            query.push(("returnDate", return_date.to_string()));
        }
        if let Some(airlines) = &criteria.airlines {
            if !airlines.is_empty() {
                query.push(("includedAirlineCodes", airlines.join(",")));
            }
        }

        self.http
            .get(format!("{}/v2/shopping/flight-offers", self.base_url))
            .bearer_auth(token)
            .query(&query)
            .send()
            .await
            .map_err(Into::into)
    }
}

#[async_trait]
impl FlightSearchProvider for AmadeusClient {
    async fn search(&self, criteria: &SearchCriteria) -> Result<Vec<Flight>> {
        let token = self.authenticate().await?;
        let mut response = self.search_once(criteria, &token).await?;

        // An expired-despite-the-buffer token gets exactly one refresh + retry.
        if response.status() == StatusCode::UNAUTHORIZED {
            warn!("Amadeus rejected cached token, refreshing and retrying once");
            *self.token.write().await = None;
            let fresh = self.authenticate().await?;
            response = self.search_once(criteria, &fresh).await?;
        }

        match response.status() {
            StatusCode::TOO_MANY_REQUESTS => Err(Error::RateLimited),
            status if !status.is_success() => {
                let body = response.text().await.unwrap_or_default();
                Err(Error::Provider {
                    message: format!("flight-offers search returned {status}: {body}"),
                })
            }
            _ => {
                let raw: RawSearchResponse = response.json().await?;
                Ok(normalize_offers(raw))
            }
        }
    }
}

/// Converts a raw provider response into normalized [`Flight`] records,
/// sorted by price ascending. Offers that cannot be interpreted (missing
/// itinerary or segments, unparseable price or timestamps) are skipped with a
/// warning rather than failing the whole search.
pub(crate) fn normalize_offers(raw: RawSearchResponse) -> Vec<Flight> {
    let carriers = raw
        .dictionaries
        .map(|d| d.carriers)
        .unwrap_or_default();

    let mut flights: Vec<Flight> = raw
        .data
        .into_iter()
        .filter_map(|offer| normalize_offer(offer, &carriers))
        .collect();
    flights.sort_by(|a, b| a.price.total_cmp(&b.price));
    flights
}

fn normalize_offer(offer: RawOffer, carriers: &HashMap<String, String>) -> Option<Flight> {
    let Some(outbound) = offer.itineraries.first() else {
        warn!("Offer {} has no itineraries, skipping", offer.id);
        return None;
    };
    let (Some(first_segment), Some(last_segment)) =
        (outbound.segments.first(), outbound.segments.last())
    else {
        warn!("Offer {} has no segments, skipping", offer.id);
        return None;
    };

    let Ok(price) = offer.price.total.parse::<f64>() else {
        warn!(
            "Offer {} has unparseable price {:?}, skipping",
            offer.id, offer.price.total
        );
        return None;
    };

    let departure_time = parse_provider_timestamp(&first_segment.departure.at)?;
    let arrival_time = parse_provider_timestamp(&last_segment.arrival.at)?;

    let airline_code = first_segment.carrier_code.clone();
    let airline = carriers
        .get(&airline_code)
        .cloned()
        .unwrap_or_else(|| airline_code.clone());

    Some(Flight {
        id: offer.id,
        airline,
        flight_number: format!("{}{}", airline_code, first_segment.number),
        airline_code,
        departure_time,
        arrival_time,
        duration: format_iso_duration(&outbound.duration),
        stops: i32::try_from(outbound.segments.len()).unwrap_or(1) - 1,
        price,
        currency: offer.price.currency,
    })
}

/// Provider timestamps come without an offset (`2026-09-01T10:30:00`); they
/// are stored as-is on the UTC axis.
fn parse_provider_timestamp(value: &str) -> Option<chrono::DateTime<chrono::Utc>> {
    match NaiveDateTime::parse_from_str(value, "%Y-%m-%dT%H:%M:%S") {
        Ok(naive) => Some(naive.and_utc()),
        Err(_) => {
            warn!("Unparseable provider timestamp {:?}, skipping offer", value);
            None
        }
    }
}

/// Renders an ISO-8601 duration like `PT11H30M` as `"11h 30m"`.
/// Unrecognized input is passed through unchanged.
pub(crate) fn format_iso_duration(iso: &str) -> String {
    let Some(rest) = iso.strip_prefix("PT") else {
        return iso.to_string();
    };
    let mut hours = None;
    let mut minutes = None;
    let mut digits = String::new();
    for ch in rest.chars() {
        if ch.is_ascii_digit() {
            digits.push(ch);
        } else if ch == 'H' {
            hours = digits.parse::<u32>().ok();
            digits.clear();
        } else if ch == 'M' {
            minutes = digits.parse::<u32>().ok();
            digits.clear();
        } else {
            return iso.to_string();
        }
    }

    match (hours, minutes) {
        (Some(h), Some(m)) => format!("{h}h {m}m"),
        (Some(h), None) => format!("{h}h"),
        (None, Some(m)) => format!("{m}m"),
        (None, None) => iso.to_string(),
    }
}
