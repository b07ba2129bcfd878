//! Unified error types and result handling for the whole crate.
//!
//! Provider failures keep their taxonomy (auth, rate-limit, other) so callers
//! can decide whether a retry makes sense; not-found conditions carry the id
//! that missed so the API boundary can map them to a 404-equivalent.

use thiserror::Error;

/// All errors produced by farewatch.
#[derive(Debug, Error)]
pub enum Error {
    /// Bad or missing configuration value.
    #[error("Configuration error: {message}")]
    Config {
        /// What was wrong with the configuration
        message: String,
    },

    /// Any failure surfaced by the persistent store.
    #[error("Database error: {0}")]
    Database(#[from] sea_orm::DbErr),

    /// No monitoring job with the given id.
    #[error("Monitoring job not found: {id}")]
    JobNotFound {
        /// The job id that was looked up
        id: String,
    },

    /// No price alert with the given id.
    #[error("Price alert not found: {id}")]
    AlertNotFound {
        /// The alert id that was looked up
        id: i64,
    },

    /// Route validation failure (bad airport codes, origin == destination).
    #[error("Invalid route: {message}")]
    InvalidRoute {
        /// What made the route invalid
        message: String,
    },

    /// Passenger count outside the provider's accepted 1..=9 range.
    #[error("Invalid passenger count: {adults} (must be 1-9)")]
    InvalidPassengerCount {
        /// The rejected adult count
        adults: i32,
    },

    /// Authentication against the flight-search provider failed.
    #[error("Provider authentication failed: {message}")]
    Auth {
        /// Provider-supplied failure detail
        message: String,
    },

    /// The flight-search provider rejected the call for rate-limiting.
    /// Surfaced distinctly so callers can choose not to retry immediately.
    #[error("Provider rate limit exceeded")]
    RateLimited,

    /// Any other provider-side failure (4xx/5xx, malformed payload).
    #[error("Provider error: {message}")]
    Provider {
        /// Provider-supplied failure detail
        message: String,
    },

    /// Transport-level HTTP failure, including timeouts.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// JSON (de)serialization failure for stored or provider payloads.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Environment variable lookup failure.
    #[error("Environment variable error: {0}")]
    EnvVar(#[from] std::env::VarError),

    /// I/O failure (e.g. while waiting on the shutdown signal).
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Convenience `Result` type used throughout the crate.
pub type Result<T> = std::result::Result<T, Error>;
