//! # Refuge Sim
//!
//! Headless driver for the Refuge escort simulation: configuration, RON
//! scenarios and a fixed-step runner.

#![warn(missing_docs)]
#![warn(clippy::all)]
#![deny(clippy::unwrap_used)]

pub mod config;
pub mod scenario;
pub mod sim;

pub use config::{SimConfig, CONFIG_FILE};
pub use scenario::{Scenario, ScenarioError, ScenarioResult};
pub use sim::{SimSummary, Simulation};
