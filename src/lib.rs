//! farewatch - a flight price-watch service
//!
//! This crate searches flight offers through an Amadeus-style GDS API and
//! monitors registered routes on a schedule: each sweep re-queries the route,
//! appends the cheapest observed offers to an append-only price-history
//! ledger, and raises an alert once a tracked flight's latest price falls at
//! least 10% below its first observed price.

// Deny the most critical lints that could lead to bugs or security issues
#![deny(
    // Security and correctness
    unsafe_code,
    unsafe_op_in_unsafe_fn,

    // Code quality - things that are almost always bugs
    unreachable_code,
    unreachable_patterns,
    unused_must_use,

    // Documentation - broken links are bugs
    rustdoc::broken_intra_doc_links,
    rustdoc::private_intra_doc_links,
)]
// Warn on things that should be fixed but aren't necessarily bugs
#![warn(
    missing_docs,

    // Clippy categories for overall code quality
    clippy::all,
    clippy::pedantic,

    // Performance
    clippy::inefficient_to_string,
    clippy::needless_pass_by_value,

    // Correctness
    clippy::clone_on_ref_ptr,
    clippy::dbg_macro,
    clippy::float_cmp,
    clippy::panic,
    clippy::todo,
    clippy::unimplemented,
    clippy::unwrap_used,
    clippy::expect_used,

    // Style consistency
    clippy::enum_glob_use,
    clippy::semicolon_if_nothing_returned,
    clippy::wildcard_imports,

    // Future compatibility
    future_incompatible,
    rust_2018_idioms,
)]
// Allow some pedantic lints that are too noisy or not applicable
#![allow(
    clippy::module_name_repetitions,  // Common pattern in Rust
    clippy::missing_errors_doc,        // Will add gradually
    clippy::missing_panics_doc,        // Will add gradually
)]

/// Service facade bundling the store, provider, cache and scheduler
pub mod app;
/// Environment-based configuration and database bootstrap
pub mod config;
/// Core business logic - jobs, ledger, drop detection, trends
pub mod core;
/// SeaORM entity definitions for database tables
pub mod entities;
/// Unified error types and result handling
pub mod errors;
/// Flight-search provider seam and the Amadeus client
pub mod provider;
/// Periodic price-check scheduler
pub mod scheduler;
/// Single-search TTL cache and flexible-date fan-out
pub mod search;

#[cfg(test)]
pub mod test_utils;
