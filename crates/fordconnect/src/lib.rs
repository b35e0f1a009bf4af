//! `fordconnect` - Polls a FordPass Connect vehicle and reports what changed
//!
//! This library compares successive vehicle status snapshots, accounts for
//! completed trips, and talks to the FordPass, geocod.io, USGS elevation and
//! ABRP services.

#![warn(missing_docs)]
#![warn(missing_debug_implementations)]
#![deny(unsafe_code)]

pub mod abrp;
pub mod cli;
pub mod client;
pub mod config;
pub mod diff;
pub mod elevation;
pub mod error;
pub mod geocode;
pub mod journeys;
pub mod logging;
pub mod monitor;
pub mod retry;
pub mod snapshot;
pub mod trip;
pub mod units;

#[cfg(test)]
mod test_server;

pub use client::{FordPassClient, VehicleApi};
pub use config::Config;
pub use diff::{diff, DiffSet, DiffValue, Field};
pub use error::{Error, Result};
pub use logging::init_logging;
pub use monitor::{Monitor, MonitorConfig};
pub use retry::RetryPolicy;
pub use snapshot::StatusSnapshot;
pub use trip::{TripAccountant, TripSummary, TripTracker, TripWindow};
pub use units::UnitSystem;
