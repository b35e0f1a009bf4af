//! `fordconnect` - CLI for watching a FordPass Connect vehicle
//!
//! This binary runs the status monitor and the one-shot report commands.

#![warn(missing_debug_implementations)]
#![deny(unsafe_code)]

use std::process::ExitCode;
use std::time::Duration;

use chrono::Utc;
use clap::Parser;
use tracing::{error, info, warn};

use fordconnect::abrp::AbrpClient;
use fordconnect::cli::{
    Cli, Command, ConfigCommand, ElevationCommand, JourneysCommand, MonitorCommand,
};
use fordconnect::elevation::{ElevationLookup, UsgsElevation};
use fordconnect::geocode::GeocodioClient;
use fordconnect::journeys::{most_recent, JourneyReporter, ReportOptions};
use fordconnect::logging::Verbosity;
use fordconnect::{init_logging, Config, FordPassClient, Monitor, MonitorConfig, VehicleApi};

/// Timeout for every HTTP request.
const HTTP_TIMEOUT: Duration = Duration::from_secs(30);

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let loaded = Config::load_from(cli.config.clone());
    let log_dir = loaded.as_ref().ok().and_then(|c| c.log.directory.clone());
    start_logging(cli.verbosity(), log_dir.as_deref());

    let result = match cli.command {
        Command::Config(cmd) => handle_config(loaded, cmd),
        command => match loaded {
            Ok(config) => run_command(&config, command).await,
            Err(e) => Err(e.into()),
        },
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{e:#}");
            ExitCode::FAILURE
        }
    }
}

fn start_logging(verbosity: Verbosity, log_dir: Option<&std::path::Path>) {
    if let Err(e) = init_logging(verbosity, log_dir) {
        // the subscriber is not installed yet, fall back to the console
        let _ = init_logging(verbosity, None);
        warn!("Log file disabled: {e}");
    }
}

fn http_client() -> anyhow::Result<reqwest::Client> {
    Ok(reqwest::Client::builder().timeout(HTTP_TIMEOUT).build()?)
}

async fn run_command(config: &Config, command: Command) -> anyhow::Result<()> {
    match command {
        Command::Monitor(cmd) => handle_monitor(config, &cmd).await,
        Command::Journeys(cmd) => handle_journeys(config, &cmd).await,
        Command::Chargelogs => {
            let client = vehicle(config)?;
            show_raw(config, "chargelogs", || client.chargelogs()).await
        }
        Command::Triplogs => {
            let client = vehicle(config)?;
            show_raw(config, "triplogs", || client.triplogs()).await
        }
        Command::Plugstatus => {
            let client = vehicle(config)?;
            show_raw(config, "plugstatus", || client.plugstatus()).await
        }
        Command::Elevation(cmd) => handle_elevation(config, &cmd).await,
        Command::Config(cmd) => handle_config(Ok(config.clone()), cmd),
    }
}

fn vehicle(config: &Config) -> anyhow::Result<FordPassClient> {
    Ok(FordPassClient::new(http_client()?, config.credentials()?))
}

async fn show_raw<F, Fut>(config: &Config, what: &str, fetch: F) -> anyhow::Result<()>
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = fordconnect::Result<serde_json::Value>>,
{
    let value = config.fordconnect.retry.run(what, fetch).await?;
    info!("{what}: {}", serde_json::to_string_pretty(&value)?);
    Ok(())
}

async fn handle_monitor(config: &Config, cmd: &MonitorCommand) -> anyhow::Result<()> {
    let credentials = config.credentials()?;
    let http = http_client()?;

    let mut settings = MonitorConfig::from_config(config);
    if let Some(iterations) = cmd.iterations {
        settings.iterations = iterations;
    }
    if let Some(interval) = cmd.interval {
        settings.poll_interval = Duration::from_secs(interval.max(1));
    }

    let mut monitor = Monitor::new(
        Box::new(FordPassClient::new(http.clone(), credentials)),
        settings,
    )
    .with_elevation(Box::new(UsgsElevation::new(http.clone())));

    if config.geocodio.enable {
        if let Some(key) = &config.geocodio.api_key {
            monitor = monitor.with_geocoder(Box::new(GeocodioClient::new(http.clone(), key)));
        }
    }
    if config.abrp.enable {
        if let (Some(api_key), Some(token)) = (&config.abrp.api_key, &config.abrp.token) {
            monitor = monitor.with_telemetry(Box::new(AbrpClient::new(http, api_key, token)));
        }
    }

    monitor.run().await?;
    Ok(())
}

async fn handle_journeys(config: &Config, cmd: &JourneysCommand) -> anyhow::Result<()> {
    let http = http_client()?;
    let client = FordPassClient::new(http.clone(), config.credentials()?);
    let retry = config.fordconnect.retry;

    let end = Utc::now();
    let start = chrono::Duration::try_days(i64::from(cmd.days))
        .and_then(|lookback| end.checked_sub_signed(lookback))
        .ok_or_else(|| anyhow::anyhow!("Lookback of {} days is out of range", cmd.days))?;
    let journeys = retry.run("journeys", || client.journeys(start, end)).await?;
    let Some(latest) = most_recent(&journeys) else {
        info!("No journeys in the last {} day(s)", cmd.days);
        return Ok(());
    };

    let geocoder = match (&config.geocodio.api_key, config.geocodio.enable) {
        (Some(key), true) => Some(GeocodioClient::new(http.clone(), key)),
        _ => None,
    };
    if cmd.addresses && geocoder.is_none() {
        warn!("geocod.io is not enabled, showing coordinates");
    }
    let elevation = UsgsElevation::new(http);

    let mut reporter =
        JourneyReporter::new(config.fordconnect.units).with_elevation(&elevation);
    if let Some(geocoder) = &geocoder {
        reporter = reporter.with_geocoder(geocoder);
    }

    if cmd.all {
        info!("{} journey(s) in the last {} day(s)", journeys.len(), cmd.days);
        for journey in &journeys {
            info!("{}", reporter.summary_line(journey));
        }
        return Ok(());
    }

    let details = retry
        .run("journey details", || client.journey_details(&latest.journey_id))
        .await?;
    let options = ReportOptions {
        addresses: cmd.addresses,
        elevation: cmd.elevation,
        locations: cmd.locations,
        events: cmd.events,
    };
    for line in reporter
        .detail_lines(&latest.journey_id, &details, options)
        .await
    {
        info!("{line}");
    }
    Ok(())
}

async fn handle_elevation(config: &Config, cmd: &ElevationCommand) -> anyhow::Result<()> {
    let units = config.fordconnect.units;
    let meters = UsgsElevation::new(http_client()?)
        .elevation_m(cmd.latitude, cmd.longitude)
        .await?;
    info!(
        "Elevation at ({:.3}, {:.3}) is {:.0} {}",
        cmd.latitude,
        cmd.longitude,
        units.elevation(meters),
        units.labels().elevation
    );
    Ok(())
}

fn handle_config(loaded: fordconnect::Result<Config>, cmd: ConfigCommand) -> anyhow::Result<()> {
    match cmd {
        ConfigCommand::Show { json } => {
            let config = loaded?;
            if json {
                println!("{}", serde_json::to_string_pretty(&config)?);
            } else {
                let fc = &config.fordconnect;
                println!("Current Configuration");
                println!("=====================");
                println!();
                println!("[Vehicle]");
                println!("  Name:               {}", config.vehicle_name());
                println!(
                    "  Username:           {}",
                    fc.vehicle.username.as_deref().unwrap_or("(not set)")
                );
                println!("  Battery (kWh):      {}", fc.battery_capacity_kwh);
                println!();
                println!("[Polling]");
                println!("  Units:              {}", fc.units);
                println!("  Interval (s):       {}", fc.poll_interval_secs);
                println!("  Iterations:         {}", fc.iterations);
                println!("  Retry attempts:     {}", fc.retry.max_attempts);
                println!();
                println!("[Integrations]");
                println!("  geocod.io:          {}", config.geocodio.enable);
                println!("  ABRP:               {}", config.abrp.enable);
                println!(
                    "  Log directory:      {}",
                    config
                        .log
                        .directory
                        .as_ref()
                        .map_or_else(|| "(console only)".to_string(), |d| d.display().to_string())
                );
            }
        }
        ConfigCommand::Path => {
            println!("{}", Config::default_config_path().display());
        }
        ConfigCommand::Validate { file } => {
            let path = file.unwrap_or_else(Config::default_config_path);
            println!("Validating configuration: {}", path.display());
            match Config::load_from(Some(path)).and_then(|c| c.credentials().map(|_| ())) {
                Ok(()) => println!("Configuration is valid."),
                Err(e) => println!("Configuration error: {e}"),
            }
        }
    }
    Ok(())
}
