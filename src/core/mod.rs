//! Core business logic - framework-agnostic monitoring operations.
//!
//! Each submodule owns one subsystem: the job registry, the append-only
//! price-history ledger, the drop detector with its alerts, and the trend
//! aggregator. All functions are async, take the database connection first
//! and return the crate-wide `Result`.

pub mod alerts;
pub mod jobs;
pub mod ledger;
pub mod trends;
