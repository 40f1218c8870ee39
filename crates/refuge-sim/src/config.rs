//! Simulation configuration.
//!
//! Provides run length, timestep, scenario selection, logging and NPC
//! behavior parameters. Configuration can be loaded from and saved to a
//! TOML file.

use serde::{Deserialize, Serialize};
use std::fs;
use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};
use tracing::{info, warn};

use refuge_gameplay::BehaviorConfig;

/// Configuration file name.
pub const CONFIG_FILE: &str = "refuge.toml";

/// Simulation configuration parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimConfig {
    /// Number of frames to run
    pub frames: u64,
    /// Seconds per frame
    pub fixed_dt: f32,
    /// RON scenario file (None = built-in scenario)
    pub scenario: Option<PathBuf>,
    /// Tracing filter directive
    pub log_filter: String,
    /// Escort behavior parameters
    pub behavior: BehaviorConfig,
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            frames: 600,
            fixed_dt: 1.0 / 60.0,
            scenario: None,
            log_filter: "refuge=info".to_string(),
            behavior: BehaviorConfig::default(),
        }
    }
}

impl SimConfig {
    /// Path given as the first CLI argument, or [`CONFIG_FILE`].
    #[must_use]
    pub fn path_from_args<I: IntoIterator<Item = String>>(args: I) -> PathBuf {
        args.into_iter()
            .nth(1)
            .map_or_else(|| PathBuf::from(CONFIG_FILE), PathBuf::from)
    }

    /// Load configuration from a specific path.
    /// Returns default config if file doesn't exist or is invalid.
    pub fn load_from<P: AsRef<Path>>(path: P) -> Self {
        let path = path.as_ref();

        if !path.exists() {
            info!("Config file not found, using defaults");
            return Self::default();
        }

        match fs::File::open(path) {
            Ok(mut file) => {
                let mut contents = String::new();
                if let Err(e) = file.read_to_string(&mut contents) {
                    warn!("Failed to read config file: {e}");
                    return Self::default();
                }

                match toml::from_str(&contents) {
                    Ok(config) => {
                        info!("Loaded config from {}", path.display());
                        config
                    },
                    Err(e) => {
                        warn!("Failed to parse config file: {e}");
                        Self::default()
                    },
                }
            },
            Err(e) => {
                warn!("Failed to open config file: {e}");
                Self::default()
            },
        }
    }

    /// Save configuration to a specific path.
    pub fn save_to<P: AsRef<Path>>(&self, path: P) -> io::Result<()> {
        let path = path.as_ref();

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        let contents = toml::to_string_pretty(self)
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;

        let mut file = fs::File::create(path)?;
        file.write_all(contents.as_bytes())?;

        info!("Saved config to {}", path.display());
        Ok(())
    }

    /// Validate and clamp configuration values to sensible ranges.
    pub fn validate(&mut self) {
        self.frames = self.frames.clamp(1, 1_000_000);
        if !self.fixed_dt.is_finite() {
            self.fixed_dt = Self::default().fixed_dt;
        }
        self.fixed_dt = self.fixed_dt.clamp(0.001, 0.25);
        if self.log_filter.trim().is_empty() {
            self.log_filter = Self::default().log_filter;
        }
        self.behavior.validate();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_default_config() {
        let config = SimConfig::default();
        assert_eq!(config.frames, 600);
        assert!((config.fixed_dt - 1.0 / 60.0).abs() < 1e-6);
        assert!(config.scenario.is_none());
        assert_eq!(config.behavior.detection_range, 15.0);
    }

    #[test]
    fn test_config_validation() {
        let mut config = SimConfig {
            frames: 0,
            fixed_dt: 5.0,
            log_filter: "  ".to_string(),
            ..SimConfig::default()
        };
        config.behavior.flee_speed = -3.0;

        config.validate();

        assert_eq!(config.frames, 1);
        assert_eq!(config.fixed_dt, 0.25);
        assert_eq!(config.log_filter, "refuge=info");
        assert_eq!(config.behavior.flee_speed, 2.0);
    }

    #[test]
    fn test_config_save_load() {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let config_path = temp_dir.path().join("test_config.toml");

        let mut config = SimConfig::default();
        config.frames = 1200;
        config.scenario = Some(PathBuf::from("scenarios/ambush.ron"));
        config.behavior.seed = Some(12345);
        config.behavior.walk_speed = 1.5;

        config.save_to(&config_path).expect("Failed to save config");

        let loaded = SimConfig::load_from(&config_path);
        assert_eq!(loaded, config);
    }

    #[test]
    fn test_config_partial_file_uses_defaults() {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let config_path = temp_dir.path().join("refuge.toml");
        fs::write(&config_path, "frames = 30\n\n[behavior]\nflee_speed = 4.0\n")
            .expect("Failed to write config");

        let config = SimConfig::load_from(&config_path);
        assert_eq!(config.frames, 30);
        assert_eq!(config.behavior.flee_speed, 4.0);
        assert_eq!(config.behavior.walk_speed, 1.0);
        assert_eq!(config.log_filter, "refuge=info");
    }

    #[test]
    fn test_config_load_missing_file() {
        let config = SimConfig::load_from("/nonexistent/path/refuge.toml");
        assert_eq!(config, SimConfig::default());
    }

    #[test]
    fn test_config_load_invalid_file() {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let config_path = temp_dir.path().join("broken.toml");
        fs::write(&config_path, "frames = \"lots\"").expect("Failed to write config");

        assert_eq!(SimConfig::load_from(&config_path), SimConfig::default());
    }

    #[test]
    fn test_path_from_args() {
        let args = vec!["refuge".to_string(), "custom.toml".to_string()];
        assert_eq!(SimConfig::path_from_args(args), PathBuf::from("custom.toml"));
        assert_eq!(
            SimConfig::path_from_args(vec!["refuge".to_string()]),
            PathBuf::from(CONFIG_FILE)
        );
    }

    #[test]
    fn test_config_toml_serialization() {
        let config = SimConfig::default();
        let toml_str = toml::to_string_pretty(&config).expect("Failed to serialize");

        assert!(toml_str.contains("frames"));
        assert!(toml_str.contains("[behavior]"));
        assert!(toml_str.contains("clip_asset"));
    }
}
