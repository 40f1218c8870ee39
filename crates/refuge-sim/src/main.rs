//! # Refuge
//!
//! Runs one escort scenario headlessly and logs the outcome.

#![warn(missing_docs)]
#![warn(clippy::all)]
#![deny(clippy::unwrap_used)]

use anyhow::{Context, Result};
use tracing::info;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use refuge_sim::{Scenario, SimConfig, Simulation};

/// Main entry point.
fn main() -> Result<()> {
    let config_path = SimConfig::path_from_args(std::env::args());
    let mut config = SimConfig::load_from(&config_path);
    config.validate();

    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(EnvFilter::from_default_env().add_directive(config.log_filter.parse()?))
        .init();

    info!("Refuge starting...");
    info!("Version: {}", env!("CARGO_PKG_VERSION"));
    info!("Config: {}", config_path.display());

    let scenario = match &config.scenario {
        Some(path) => Scenario::load(path)
            .with_context(|| format!("loading scenario {}", path.display()))?,
        None => {
            info!("No scenario configured, using built-in scenario");
            Scenario::default()
        },
    };

    let summary = Simulation::new(&config, scenario)
        .context("building simulation")?
        .run();

    info!(
        "Girl {} at {:?} ({:?}), player {}, kills {}",
        if summary.girl_alive { "alive" } else { "dead" },
        summary.girl_position,
        summary.girl_mode,
        if summary.player_alive { "alive" } else { "dead" },
        summary.player_kills
    );
    info!("Refuge shutdown complete");
    Ok(())
}
