//! The status polling loop.
//!
//! A [`Monitor`] owns the clients and the only state carried between polls:
//! the previous snapshot and the trip tracker.

use std::time::Duration;

use tracing::{debug, info, warn};

use crate::abrp::TelemetrySink;
use crate::client::VehicleApi;
use crate::config::Config;
use crate::diff::{diff, DiffSet, Field};
use crate::elevation::ElevationLookup;
use crate::error::Result;
use crate::geocode::Geocoder;
use crate::retry::RetryPolicy;
use crate::snapshot::StatusSnapshot;
use crate::trip::{TripAccountant, TripSummary, TripTracker};
use crate::units::UnitSystem;

/// Settings for the polling loop.
#[derive(Debug, Clone, PartialEq)]
pub struct MonitorConfig {
    /// Sleep between polls.
    pub poll_interval: Duration,
    /// Polls after the first one. 0 runs until interrupted.
    pub iterations: u32,
    /// Display units.
    pub units: UnitSystem,
    /// Usable battery capacity in kWh.
    pub battery_capacity_kwh: f64,
    /// Retry policy for status fetches.
    pub retry: RetryPolicy,
    /// Name used in log lines.
    pub vehicle_name: String,
}

impl MonitorConfig {
    /// Take the loop settings from the application configuration.
    #[must_use]
    pub fn from_config(config: &Config) -> Self {
        let fc = &config.fordconnect;
        Self {
            poll_interval: config.poll_interval(),
            iterations: fc.iterations,
            units: fc.units,
            battery_capacity_kwh: fc.battery_capacity_kwh,
            retry: fc.retry,
            vehicle_name: config.vehicle_name(),
        }
    }
}

/// What a single poll found.
#[derive(Debug, Clone, PartialEq)]
pub enum PollOutcome {
    /// First snapshot; nothing to compare against.
    Initial,
    /// `lastModifiedDate` did not advance.
    Unchanged,
    /// The vehicle reported new data.
    Updated {
        /// Fields that changed.
        changes: DiffSet,
        /// Summary of the trip this update closed, if any.
        trip: Option<TripSummary>,
    },
    /// The fetch failed with a non-fatal error.
    Skipped,
}

/// Polls the vehicle and reports what changed.
pub struct Monitor {
    vehicle: Box<dyn VehicleApi>,
    geocoder: Option<Box<dyn Geocoder>>,
    elevation: Option<Box<dyn ElevationLookup>>,
    telemetry: Option<Box<dyn TelemetrySink>>,
    config: MonitorConfig,
    tracker: TripTracker,
    accountant: TripAccountant,
    previous: Option<StatusSnapshot>,
}

impl std::fmt::Debug for Monitor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Monitor")
            .field("config", &self.config)
            .field("geocoder", &self.geocoder.is_some())
            .field("elevation", &self.elevation.is_some())
            .field("telemetry", &self.telemetry.is_some())
            .field("tracker", &self.tracker)
            .field("has_previous", &self.previous.is_some())
            .finish_non_exhaustive()
    }
}

impl Monitor {
    /// Create a monitor polling `vehicle`.
    #[must_use]
    pub fn new(vehicle: Box<dyn VehicleApi>, config: MonitorConfig) -> Self {
        let accountant = TripAccountant::new(config.battery_capacity_kwh, config.units);
        Self {
            vehicle,
            geocoder: None,
            elevation: None,
            telemetry: None,
            config,
            tracker: TripTracker::new(),
            accountant,
            previous: None,
        }
    }

    /// Reverse geocode position changes.
    #[must_use]
    pub fn with_geocoder(mut self, geocoder: Box<dyn Geocoder>) -> Self {
        self.geocoder = Some(geocoder);
        self
    }

    /// Include the elevation change in trip summaries.
    #[must_use]
    pub fn with_elevation(mut self, elevation: Box<dyn ElevationLookup>) -> Self {
        self.elevation = Some(elevation);
        self
    }

    /// Post every update to `telemetry`.
    #[must_use]
    pub fn with_telemetry(mut self, telemetry: Box<dyn TelemetrySink>) -> Self {
        self.telemetry = Some(telemetry);
        self
    }

    /// Poll until the configured number of passes is done or Ctrl-C.
    ///
    /// # Errors
    ///
    /// Returns the connection error once the retry policy gives up.
    pub async fn run(&mut self) -> Result<()> {
        info!("Monitoring {}", self.config.vehicle_name);
        self.poll_once().await?;

        let mut passes = 0u32;
        loop {
            if self.config.iterations > 0 && passes >= self.config.iterations {
                info!("Completed {passes} passes");
                break;
            }
            tokio::select! {
                () = tokio::time::sleep(self.config.poll_interval) => {}
                _ = tokio::signal::ctrl_c() => {
                    info!("Interrupted, stopping");
                    break;
                }
            }
            passes += 1;
            self.poll_once().await?;
        }
        Ok(())
    }

    /// Fetch the status once and process it.
    ///
    /// # Errors
    ///
    /// Returns the connection error once the retry policy gives up. Other
    /// failures are logged and reported as [`PollOutcome::Skipped`].
    pub async fn poll_once(&mut self) -> Result<PollOutcome> {
        let vehicle = &*self.vehicle;
        let current = match self.config.retry.run("status", || vehicle.status()).await {
            Ok(status) => status,
            Err(e) if e.is_connection() => return Err(e),
            Err(_) => return Ok(PollOutcome::Skipped),
        };

        let Some(previous) = self.previous.take() else {
            info!(
                "{}",
                status_summary(&current, self.config.units, &self.config.vehicle_name)
            );
            self.tracker.observe(&current);
            self.previous = Some(current);
            return Ok(PollOutcome::Initial);
        };

        if !is_newer(&previous, &current) {
            debug!("No update since {:?}", previous.last_modified_date);
            self.previous = Some(previous);
            return Ok(PollOutcome::Unchanged);
        }

        info!(
            "Update detected at {}",
            current.last_modified_date.as_deref().unwrap_or("?")
        );
        let changes = diff(&previous, &current, self.config.units);
        if !changes.is_empty() {
            info!("Changed: {changes}");
        }

        let trip = match self.tracker.observe(&current) {
            Some(window) => match self
                .accountant
                .account(&window, self.elevation.as_deref())
                .await
            {
                Ok(summary) => {
                    info!("Trip summary: {summary}");
                    Some(summary)
                }
                Err(e) => {
                    warn!("Trip accounting failed: {e}");
                    None
                }
            },
            None => None,
        };

        if changes.contains(Field::Gps) {
            self.report_location(&current).await;
        }
        if let Some(telemetry) = &self.telemetry {
            if let Err(e) = telemetry.post(&current).await {
                debug!("Telemetry not sent: {e}");
            }
        }

        self.previous = Some(current);
        Ok(PollOutcome::Updated { changes, trip })
    }

    async fn report_location(&self, status: &StatusSnapshot) {
        let (Some(geocoder), Some((latitude, longitude))) = (&self.geocoder, status.position())
        else {
            return;
        };
        match geocoder.reverse(latitude, longitude).await {
            Ok(address) => info!("Vehicle location: {}", address.street_town()),
            Err(e) => warn!("Reverse geocoding failed: {e}"),
        }
    }
}

/// Whether `current` was modified after `previous`.
fn is_newer(previous: &StatusSnapshot, current: &StatusSnapshot) -> bool {
    match (previous.last_modified(), current.last_modified()) {
        (Ok(before), Ok(after)) => after > before,
        (Err(_), Ok(_)) => true,
        (_, Err(e)) => {
            warn!("Ignoring status update: {e}");
            false
        }
    }
}

/// One line describing the vehicle state.
#[must_use]
pub fn status_summary(status: &StatusSnapshot, units: UnitSystem, name: &str) -> String {
    let labels = units.labels();
    let or_unknown = |v: Option<String>| v.unwrap_or_else(|| "?".to_string());
    format!(
        "{name}: {}% charged, {} {} range, odometer {} {}, ignition {}, {}",
        or_unknown(status.battery_fill_level().map(|v| format!("{v:.0}"))),
        or_unknown(status.range_km().map(|v| format!("{:.1}", units.distance_km(v)))),
        labels.distance,
        or_unknown(status.odometer_km().map(|v| format!("{:.1}", units.distance_km(v)))),
        labels.distance,
        status.ignition().unwrap_or("?"),
        status
            .lock_status
            .as_ref()
            .and_then(|r| r.value.as_deref())
            .unwrap_or("?"),
    )
}
