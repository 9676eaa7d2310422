use std::path::PathBuf;

use anyhow::Context;
use clap::{Parser, Subcommand};
use inquire::{Password, Select, Text};
use tracing::warn;
use weather_station_core::{
    PluginConfig, REFRESH_INTERVAL, ReqwestFetch, SystemClock,
    config::{PROP_API_KEY, PROP_CITY, PROP_CITY_ID, PROP_STATE},
    runtime,
};

use crate::console::ConsoleRegistry;

const REQUEST_TIMEOUT: std::time::Duration = std::time::Duration::from_secs(30);

/// Top-level CLI struct.
#[derive(Debug, Parser)]
#[command(name = "weather-station", version, about = "OpenWeatherMap weather station")]
pub struct Cli {
    /// Path to the configuration file; defaults to the platform config directory.
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Log at debug level unless RUST_LOG is set.
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Interactively set the API key and station location.
    Configure,

    /// Poll OpenWeatherMap and print device updates until Ctrl+C.
    Run {
        /// Additional OpenWeatherMap city ids to add as stations.
        #[arg(long = "add", value_name = "CITY_ID")]
        add: Vec<String>,
    },
}

const BY_CITY_ID: &str = "OpenWeatherMap city id";
const BY_CITY_STATE: &str = "City and state";

impl Cli {
    pub async fn run(self) -> anyhow::Result<()> {
        let path = match self.config {
            Some(path) => path,
            None => PluginConfig::config_file_path()?,
        };

        match self.command {
            Command::Configure => configure(&path),
            Command::Run { add } => run(&path, add).await,
        }
    }
}

fn configure(path: &std::path::Path) -> anyhow::Result<()> {
    let mut config = PluginConfig::load_from(path)?;

    let api_key = Password::new("OpenWeatherMap API key (leave empty for none):")
        .without_confirmation()
        .prompt()
        .context("Failed to read API key")?;
    if api_key.trim().is_empty() {
        config.remove(PROP_API_KEY);
    } else {
        config.set(PROP_API_KEY, api_key.trim());
    }

    let by = Select::new("Locate the station by:", vec![BY_CITY_ID, BY_CITY_STATE])
        .prompt()
        .context("Failed to read location kind")?;

    if by == BY_CITY_ID {
        let city_id = Text::new("City id:").prompt().context("Failed to read city id")?;
        config.set(PROP_CITY_ID, city_id.trim());
        config.remove(PROP_CITY);
        config.remove(PROP_STATE);
    } else {
        let city = Text::new("City:").prompt().context("Failed to read city")?;
        let state = Text::new("State:").prompt().context("Failed to read state")?;
        config.set(PROP_CITY, city.trim());
        config.set(PROP_STATE, state.trim());
        config.remove(PROP_CITY_ID);
    }

    config.save_to(path)?;
    println!("Configuration saved to {}", path.display());
    Ok(())
}

async fn run(path: &std::path::Path, add: Vec<String>) -> anyhow::Result<()> {
    let config = PluginConfig::load_from(path)?;
    let fetch = ReqwestFetch::with_timeout(REQUEST_TIMEOUT)
        .context("Failed to build HTTP client")?;

    let handle = runtime::start(
        ConsoleRegistry::default(),
        fetch,
        SystemClock,
        config,
        REFRESH_INTERVAL,
    );

    for city_id in add {
        if let Err(e) = handle.add_location(&city_id).await {
            warn!(%city_id, error = %e, "could not add station");
        }
    }

    println!("Status: {}", handle.status().await?);
    println!("Press Ctrl+C to stop.");

    tokio::signal::ctrl_c().await.context("Failed to listen for Ctrl+C")?;

    let plugin = handle.shutdown().await?;
    println!(
        "Stopped with {} station(s).",
        plugin.registry().inner().device_count()
    );
    Ok(())
}
