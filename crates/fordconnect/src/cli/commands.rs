//! CLI command definitions.
//!
//! This module defines the structure of all CLI subcommands.

use std::path::PathBuf;

use clap::{Args, Subcommand};

/// Longest journey lookback accepted on the command line.
pub const MAX_LOOKBACK_DAYS: i64 = 3650;

/// Monitor command arguments.
#[derive(Debug, Args)]
pub struct MonitorCommand {
    /// Stop after this many polls (0 runs until interrupted)
    #[arg(short = 'n', long)]
    pub iterations: Option<u32>,

    /// Seconds between polls
    #[arg(short, long)]
    pub interval: Option<u64>,
}

/// Journeys command arguments.
#[derive(Debug, Args)]
#[allow(clippy::struct_excessive_bools)]
pub struct JourneysCommand {
    /// How many days back to look (1 to 3650)
    #[arg(
        short,
        long,
        default_value = "2",
        value_parser = clap::value_parser!(u32).range(1..=MAX_LOOKBACK_DAYS)
    )]
    pub days: u32,

    /// List every journey instead of detailing the most recent one
    #[arg(short, long)]
    pub all: bool,

    /// Reverse geocode the start and end positions
    #[arg(long)]
    pub addresses: bool,

    /// Look up the elevation change
    #[arg(long)]
    pub elevation: bool,

    /// List the logged locations
    #[arg(long)]
    pub locations: bool,

    /// List the logged events
    #[arg(long)]
    pub events: bool,
}

/// Elevation command arguments.
#[derive(Debug, Args)]
pub struct ElevationCommand {
    /// Latitude in decimal degrees
    #[arg(allow_hyphen_values = true)]
    pub latitude: f64,

    /// Longitude in decimal degrees
    #[arg(allow_hyphen_values = true)]
    pub longitude: f64,
}

/// Configuration commands.
#[derive(Debug, Subcommand)]
pub enum ConfigCommand {
    /// Show current configuration
    Show {
        /// Output as JSON
        #[arg(short, long)]
        json: bool,
    },

    /// Show configuration file path
    Path,

    /// Validate configuration file
    Validate {
        /// Path to config file to validate
        #[arg(short, long)]
        file: Option<PathBuf>,
    },
}
