//! Harness configuration using Figment
//!
//! Configuration is loaded from:
//! 1. a TOML file (optional; defaults apply when it is missing)
//! 2. Environment variables (prefixed with `COEX_BENCH_`, nested keys separated by `__`)
//!
//! # Example
//! ```no_run
//! use coex_bench::config::HarnessConfig;
//!
//! let config = HarnessConfig::load_from("config/coex_bench.toml")?;
//! config.validate()?;
//! println!("Serial port: {}", config.serial.port);
//! # Ok::<(), coex_bench::error::HarnessError>(())
//! ```
//!
//! ```toml
//! project_dir = "firmware/coex"
//! log_level = "debug"
//!
//! [serial]
//! port = "/dev/ttyACM0"
//!
//! [timeouts]
//! complete_secs = 180
//!
//! [report]
//! results_file = "test_results.json"
//! ```

use crate::error::{AppResult, HarnessError};
use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Default configuration file, relative to the working directory.
pub const DEFAULT_CONFIG_PATH: &str = "config/coex_bench.toml";

/// Prefix of environment variable overrides.
pub const ENV_PREFIX: &str = "COEX_BENCH_";

const VALID_LOG_LEVELS: [&str; 5] = ["trace", "debug", "info", "warn", "error"];

/// Top-level harness configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HarnessConfig {
    /// Directory holding `sdkconfig.<profile>` files and `build_<profile>` directories
    #[serde(default = "default_project_dir")]
    pub project_dir: PathBuf,
    /// Logging level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub log_level: String,
    /// Device console settings
    #[serde(default)]
    pub serial: SerialConfig,
    /// Device wait limits
    #[serde(default)]
    pub timeouts: TimeoutConfig,
    /// Console lines that bracket a test run
    #[serde(default)]
    pub markers: MarkerConfig,
    /// Report output
    #[serde(default)]
    pub report: ReportConfig,
}

/// Serial console configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SerialConfig {
    /// Serial device path (e.g. "/dev/ttyUSB0", "COM3")
    #[serde(default = "default_port")]
    pub port: String,
    /// Console baud rate
    #[serde(default = "default_baud_rate")]
    pub baud_rate: u32,
}

/// Timeouts, in seconds
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimeoutConfig {
    /// Wait for the start marker
    #[serde(default = "default_start_secs")]
    pub start_secs: u64,
    /// Wait for the completion marker
    #[serde(default = "default_complete_secs")]
    pub complete_secs: u64,
    /// Watchdog over a whole profile run
    #[serde(default = "default_profile_secs")]
    pub profile_secs: u64,
}

/// Console markers
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MarkerConfig {
    /// Line printed when the suite starts
    #[serde(default = "default_start_marker")]
    pub start: String,
    /// Line printed after the summary
    #[serde(default = "default_complete_marker")]
    pub complete: String,
}

/// Report configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ReportConfig {
    /// JSON file written at the end of the run, if set
    #[serde(default)]
    pub results_file: Option<PathBuf>,
}

// Default value functions
fn default_project_dir() -> PathBuf {
    PathBuf::from(".")
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_port() -> String {
    "/dev/ttyUSB0".to_string()
}

fn default_baud_rate() -> u32 {
    115_200
}

fn default_start_secs() -> u64 {
    60
}

fn default_complete_secs() -> u64 {
    240
}

fn default_profile_secs() -> u64 {
    300
}

fn default_start_marker() -> String {
    "Starting speed test suite".to_string()
}

fn default_complete_marker() -> String {
    "Test suite complete.".to_string()
}

impl Default for HarnessConfig {
    fn default() -> Self {
        Self {
            project_dir: default_project_dir(),
            log_level: default_log_level(),
            serial: SerialConfig::default(),
            timeouts: TimeoutConfig::default(),
            markers: MarkerConfig::default(),
            report: ReportConfig::default(),
        }
    }
}

impl Default for SerialConfig {
    fn default() -> Self {
        Self {
            port: default_port(),
            baud_rate: default_baud_rate(),
        }
    }
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            start_secs: default_start_secs(),
            complete_secs: default_complete_secs(),
            profile_secs: default_profile_secs(),
        }
    }
}

impl Default for MarkerConfig {
    fn default() -> Self {
        Self {
            start: default_start_marker(),
            complete: default_complete_marker(),
        }
    }
}

impl TimeoutConfig {
    /// Start-marker wait as a [`Duration`].
    pub fn start(&self) -> Duration {
        Duration::from_secs(self.start_secs)
    }

    /// Completion-marker wait as a [`Duration`].
    pub fn complete(&self) -> Duration {
        Duration::from_secs(self.complete_secs)
    }

    /// Whole-profile watchdog as a [`Duration`].
    pub fn profile(&self) -> Duration {
        Duration::from_secs(self.profile_secs)
    }
}

impl HarnessConfig {
    /// Load configuration from a specific file path plus environment overrides
    ///
    /// A missing file is not an error; defaults fill in every field.
    /// Example override: `COEX_BENCH_SERIAL__PORT=/dev/ttyACM0`
    pub fn load_from<P: AsRef<Path>>(path: P) -> AppResult<Self> {
        Self::figment(path.as_ref()).extract().map_err(HarnessError::from)
    }

    /// The provider stack used by [`HarnessConfig::load_from`].
    pub fn figment(path: &Path) -> Figment {
        Figment::from(Serialized::defaults(HarnessConfig::default()))
            .merge(Toml::file(path))
            .merge(Env::prefixed(ENV_PREFIX).split("__"))
    }

    /// Validate configuration after loading
    pub fn validate(&self) -> AppResult<()> {
        if !VALID_LOG_LEVELS.contains(&self.log_level.to_lowercase().as_str()) {
            return Err(HarnessError::Configuration(format!(
                "Invalid log_level '{}'. Must be one of: {}",
                self.log_level,
                VALID_LOG_LEVELS.join(", ")
            )));
        }

        if self.serial.baud_rate == 0 {
            return Err(HarnessError::Configuration(
                "serial.baud_rate must be greater than 0".to_string(),
            ));
        }

        let timeouts = &self.timeouts;
        if timeouts.start_secs == 0 || timeouts.complete_secs == 0 || timeouts.profile_secs == 0 {
            return Err(HarnessError::Configuration(
                "timeouts must be greater than 0".to_string(),
            ));
        }
        if timeouts.complete_secs > timeouts.profile_secs {
            return Err(HarnessError::Configuration(format!(
                "timeouts.complete_secs ({}) exceeds timeouts.profile_secs ({})",
                timeouts.complete_secs, timeouts.profile_secs
            )));
        }

        if self.markers.start.is_empty() || self.markers.complete.is_empty() {
            return Err(HarnessError::Configuration(
                "markers must not be empty".to_string(),
            ));
        }

        Ok(())
    }
}
