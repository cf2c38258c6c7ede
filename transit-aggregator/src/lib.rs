//! Transport data aggregator.
//!
//! Imports heterogeneous transit feeds into one canonical model, folds
//! live updates over the schedule, and serves cached read-side queries.

pub mod config;
pub mod dataset;
pub mod domain;
pub mod events;
pub mod import;
pub mod query;
pub mod realtime;
pub mod resolve;
pub mod store;
