//! Command-line interface for fordconnect.

mod commands;

use std::path::PathBuf;

use clap::{Parser, Subcommand};

pub use commands::{ConfigCommand, ElevationCommand, JourneysCommand, MonitorCommand};

/// fordconnect - Watch a FordPass Connect vehicle
///
/// Polls the vehicle status, logs what changed and summarizes each trip.
#[derive(Debug, Parser)]
#[command(name = "fordconnect")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Path to custom configuration file
    #[arg(short, long, global = true, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Increase verbosity (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress all output except errors
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// The command to execute
    #[command(subcommand)]
    pub command: Command,
}

/// Available commands.
#[derive(Debug, Subcommand)]
pub enum Command {
    /// Poll the vehicle and log changes and trips
    Monitor(MonitorCommand),

    /// Show recent journeys
    Journeys(JourneysCommand),

    /// Show recent charging sessions
    Chargelogs,

    /// Show recent trip logs
    Triplogs,

    /// Show the charge port state
    Plugstatus,

    /// Look up the elevation of a position
    Elevation(ElevationCommand),

    /// View configuration
    #[command(subcommand)]
    Config(ConfigCommand),
}

impl Cli {
    /// Get the verbosity level based on flags.
    #[must_use]
    pub fn verbosity(&self) -> crate::logging::Verbosity {
        if self.quiet {
            crate::logging::Verbosity::Quiet
        } else {
            match self.verbose {
                0 => crate::logging::Verbosity::Normal,
                1 => crate::logging::Verbosity::Verbose,
                _ => crate::logging::Verbosity::Trace,
            }
        }
    }
}
