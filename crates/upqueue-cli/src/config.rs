//! Configuration system for the upqueue CLI.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use upqueue_core::SessionConfig;

/// upqueue configuration
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    /// Upload session options
    #[serde(default)]
    pub session: SessionConfig,
    /// Simulated transport options
    #[serde(default)]
    pub simulation: SimulationConfig,
    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Simulated transport configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimulationConfig {
    /// Bytes "sent" per tick
    #[serde(default = "default_chunk_size")]
    pub chunk_size: u64,
    /// Milliseconds between progress ticks
    #[serde(default = "default_tick_ms")]
    pub tick_ms: u64,
    /// Probability that an attempt fails (0.0 - 1.0)
    #[serde(default)]
    pub failure_rate: f64,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level
    #[serde(default = "default_log_level")]
    pub level: String,
}

// Default values

fn default_chunk_size() -> u64 {
    64 * 1024 // 64 KB
}

fn default_tick_ms() -> u64 {
    50
}

fn default_log_level() -> String {
    "warn".to_string()
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            chunk_size: default_chunk_size(),
            tick_ms: default_tick_ms(),
            failure_rate: 0.0,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

impl Config {
    /// Load configuration from file
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn load<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let contents = fs::read_to_string(path)?;
        let config: Self = toml::from_str(&contents)?;
        Ok(config)
    }

    /// Save configuration to file
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be written.
    pub fn save<P: AsRef<Path>>(&self, path: P) -> anyhow::Result<()> {
        let contents = toml::to_string_pretty(self)?;

        // Create parent directory if it doesn't exist
        if let Some(parent) = path.as_ref().parent() {
            fs::create_dir_all(parent)?;
        }

        fs::write(path, contents)?;
        Ok(())
    }

    /// Get default config path
    #[must_use]
    pub fn default_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("/tmp"))
            .join("upqueue/config.toml")
    }

    /// Load config from `path` if it exists, defaults otherwise
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be read or parsed.
    pub fn load_or_default<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        if path.as_ref().exists() {
            Self::load(path)
        } else {
            Ok(Self::default())
        }
    }

    /// Validate configuration
    ///
    /// # Errors
    ///
    /// Returns an error if configuration is invalid.
    pub fn validate(&self) -> anyhow::Result<()> {
        self.session.validate()?;

        if !(0.0..=1.0).contains(&self.simulation.failure_rate) {
            anyhow::bail!(
                "Failure rate must be between 0.0 and 1.0, got {}",
                self.simulation.failure_rate
            );
        }

        if self.simulation.chunk_size == 0 {
            anyhow::bail!("Chunk size must be at least 1 byte");
        }

        if self.simulation.tick_ms > 10_000 {
            anyhow::bail!("Tick interval must be at most 10000 ms");
        }

        let valid_log_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_log_levels.contains(&self.logging.level.to_lowercase().as_str()) {
            anyhow::bail!(
                "Invalid log level: {}. Must be one of: {}",
                self.logging.level,
                valid_log_levels.join(", ")
            );
        }

        Ok(())
    }
}
