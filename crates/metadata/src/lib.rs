//! Postgres metadata store for the network metrics processor.
//!
//! Teams and apps are owned by the dashboard backend and only read here.
//! `network_metrics_reporting` holds the per-app watermarks.

pub mod client;
pub mod config;
pub mod health;
pub mod schema;
pub mod store;

pub use client::*;
pub use config::*;
