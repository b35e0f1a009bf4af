//! FordPass journey history and its report.
//!
//! Journeys come from the `journey-info` endpoints. Distances are in meters
//! and speeds in m/s; timestamps are epoch seconds.

use chrono::{DateTime, Local};
use serde::Deserialize;
use tracing::warn;

use crate::elevation::ElevationLookup;
use crate::geocode::Geocoder;
use crate::snapshot::Number;
use crate::units::UnitSystem;

/// One end of a journey.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
pub struct Waypoint {
    /// Epoch seconds.
    pub timestamp: i64,
    /// Latitude.
    pub latitude: Number,
    /// Longitude.
    pub longitude: Number,
}

impl Waypoint {
    /// (latitude, longitude).
    #[must_use]
    pub fn position(&self) -> (f64, f64) {
        (self.latitude.0, self.longitude.0)
    }
}

/// A journey as listed by the journeys endpoint.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Journey {
    /// Journey identifier.
    #[serde(rename = "journeyID")]
    pub journey_id: String,
    /// Where and when it started.
    pub start: Waypoint,
    /// Where and when it ended.
    pub end: Waypoint,
    /// Distance in meters.
    #[serde(default)]
    pub distance: Number,
    /// Average speed in m/s.
    #[serde(default)]
    pub avg_speed: Number,
}

#[allow(missing_docs)]
#[derive(Debug, Clone, Copy, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct JourneySummary {
    pub distance: Number,
    pub avg_speed: Number,
}

/// A position logged during a journey.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
pub struct Location {
    /// Epoch seconds.
    pub timestamp: i64,
    /// Latitude.
    pub latitude: Number,
    /// Longitude.
    pub longitude: Number,
    /// Speed in m/s.
    #[serde(default)]
    pub speed: Number,
}

/// Something that happened during a journey, e.g. hard braking.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct JourneyEvent {
    /// Epoch seconds.
    pub timestamp: i64,
    /// Latitude.
    pub latitude: Number,
    /// Longitude.
    pub longitude: Number,
    /// What happened.
    #[serde(default)]
    pub description: String,
}

/// Full detail for one journey.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct JourneyDetails {
    /// Distance and speed.
    #[serde(default)]
    pub summary: JourneySummary,
    /// Where and when it started.
    pub start: Waypoint,
    /// Where and when it ended.
    pub end: Waypoint,
    /// Logged positions.
    #[serde(default)]
    pub locations: Vec<Location>,
    /// Logged events.
    #[serde(default)]
    pub events: Vec<JourneyEvent>,
}

/// The journey that started last.
#[must_use]
pub fn most_recent(journeys: &[Journey]) -> Option<&Journey> {
    journeys.iter().max_by_key(|j| j.start.timestamp)
}

/// `H hour(s), M minute(s) and S second(s)`.
#[must_use]
pub fn format_duration(seconds: i64) -> String {
    let seconds = seconds.max(0);
    let (hours, rest) = (seconds / 3600, seconds % 3600);
    let (minutes, seconds) = (rest / 60, rest % 60);
    format!("{hours} hour(s), {minutes} minute(s) and {seconds} second(s)")
}

fn local_time(timestamp: i64) -> String {
    DateTime::from_timestamp(timestamp, 0).map_or_else(
        || timestamp.to_string(),
        |t| {
            t.with_timezone(&Local)
                .format("%Y-%m-%d %H:%M:%S")
                .to_string()
        },
    )
}

fn coordinates((latitude, longitude): (f64, f64)) -> String {
    format!("({latitude:.3}, {longitude:.3})")
}

/// What to include in a report.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[allow(clippy::struct_excessive_bools)]
pub struct ReportOptions {
    /// Reverse geocode the endpoints.
    pub addresses: bool,
    /// Look up the elevation change.
    pub elevation: bool,
    /// List logged locations.
    pub locations: bool,
    /// List logged events.
    pub events: bool,
}

/// Renders journeys as log lines.
pub struct JourneyReporter<'a> {
    units: UnitSystem,
    geocoder: Option<&'a dyn Geocoder>,
    elevation: Option<&'a dyn ElevationLookup>,
}

impl std::fmt::Debug for JourneyReporter<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JourneyReporter")
            .field("units", &self.units)
            .field("geocoder", &self.geocoder.is_some())
            .field("elevation", &self.elevation.is_some())
            .finish()
    }
}

impl<'a> JourneyReporter<'a> {
    /// Report in `units` without any lookups.
    #[must_use]
    pub fn new(units: UnitSystem) -> Self {
        Self {
            units,
            geocoder: None,
            elevation: None,
        }
    }

    /// Use `geocoder` for addresses.
    #[must_use]
    pub fn with_geocoder(mut self, geocoder: &'a dyn Geocoder) -> Self {
        self.geocoder = Some(geocoder);
        self
    }

    /// Use `elevation` for the elevation change.
    #[must_use]
    pub fn with_elevation(mut self, elevation: &'a dyn ElevationLookup) -> Self {
        self.elevation = Some(elevation);
        self
    }

    /// One-line summary of a listed journey.
    #[must_use]
    pub fn summary_line(&self, journey: &Journey) -> String {
        let labels = self.units.labels();
        format!(
            "Journey {} on {}: {}, {:.2} {}, {:.2} {} average",
            journey.journey_id,
            local_time(journey.start.timestamp),
            format_duration(journey.end.timestamp - journey.start.timestamp),
            self.units.distance(journey.distance.0),
            labels.distance,
            self.units.speed(journey.avg_speed.0),
            labels.speed,
        )
    }

    /// Full report of one journey.
    pub async fn detail_lines(
        &self,
        id: &str,
        details: &JourneyDetails,
        options: ReportOptions,
    ) -> Vec<String> {
        let labels = self.units.labels();
        let mut lines = vec![format!(
            "Journey {id} started {}",
            local_time(details.start.timestamp)
        )];

        let mut stats = format!(
            "Duration: {}, Distance: {:.2} {}, Average Speed: {:.2} {}",
            format_duration(details.end.timestamp - details.start.timestamp),
            self.units.distance(details.summary.distance.0),
            labels.distance,
            self.units.speed(details.summary.avg_speed.0),
            labels.speed,
        );
        if options.elevation {
            if let Some(delta) = self
                .elevation_change(details.start.position(), details.end.position())
                .await
            {
                stats.push_str(&format!(
                    ", Elevation change: {:.0} {}",
                    self.units.elevation(delta),
                    labels.elevation
                ));
            }
        }
        lines.push(stats);

        let (from, to) = if options.addresses {
            (
                self.place(details.start.position()).await,
                self.place(details.end.position()).await,
            )
        } else {
            (
                coordinates(details.start.position()),
                coordinates(details.end.position()),
            )
        };
        lines.push(format!("From {from} to {to}"));

        if options.locations {
            for location in &details.locations {
                lines.push(format!(
                    "  {} {} {:.1} {}",
                    local_time(location.timestamp),
                    coordinates((location.latitude.0, location.longitude.0)),
                    self.units.speed(location.speed.0),
                    labels.speed,
                ));
            }
        }
        if options.events {
            for event in &details.events {
                lines.push(format!(
                    "  {} {} {}",
                    local_time(event.timestamp),
                    coordinates((event.latitude.0, event.longitude.0)),
                    event.description,
                ));
            }
        }
        lines
    }

    async fn place(&self, position: (f64, f64)) -> String {
        let Some(geocoder) = self.geocoder else {
            return coordinates(position);
        };
        match geocoder.reverse(position.0, position.1).await {
            Ok(address) => address.street_town(),
            Err(e) => {
                warn!("Reverse geocoding failed: {e}");
                coordinates(position)
            }
        }
    }

    async fn elevation_change(&self, from: (f64, f64), to: (f64, f64)) -> Option<f64> {
        let lookup = self.elevation?;
        let result = async {
            let start = lookup.elevation_m(from.0, from.1).await?;
            let end = lookup.elevation_m(to.0, to.1).await?;
            Ok::<f64, crate::error::Error>(end - start)
        }
        .await;
        match result {
            Ok(delta) => Some(delta),
            Err(e) => {
                warn!("Elevation lookup failed: {e}");
                None
            }
        }
    }
}
