//! Engine configuration
//!
//! Loaded from TOML; every field has a default, so an empty document is a
//! valid configuration.
//!
//! ```toml
//! harmonic_freq_threshold = 300000000
//! frequency_offset = 5000
//! drive_strength = "auto"
//! sample_timeout_ms = 100
//! ```

use std::path::Path;
use std::time::Duration;

use anyhow::Context;
use serde::{Deserialize, Serialize};

use crate::constants::DEFAULT_HARMONIC_THRESHOLD;
use crate::error::ConfigError;
use crate::sweep::DriveStrength;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct EngineConfig {
    /// Frequencies above this run the source on a harmonic (Hz)
    pub harmonic_freq_threshold: u32,

    /// IF offset between the RF and LO outputs (Hz)
    pub frequency_offset: i32,

    pub drive_strength: DriveStrength,

    /// Bounded wait for one synchronous detection
    pub sample_timeout_ms: u64,

    /// Settling time before each sweep starts
    pub pre_sweep_settle_ms: u64,

    /// Re-interpolate the last saved calibration when the range is edited
    pub cal_auto_interpolate: bool,

    /// Sleep of the worker loop while sweeping is paused
    pub idle_poll_ms: u64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            harmonic_freq_threshold: DEFAULT_HARMONIC_THRESHOLD,
            frequency_offset: 5000,
            drive_strength: DriveStrength::Auto,
            sample_timeout_ms: 100,
            pre_sweep_settle_ms: 10,
            cal_auto_interpolate: true,
            idle_poll_ms: 5,
        }
    }
}

impl EngineConfig {
    pub fn from_toml_str(s: &str) -> Result<Self, ConfigError> {
        let config: EngineConfig =
            toml::from_str(s).map_err(|e| ConfigError::Parse(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_file<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        Self::from_toml_str(&contents)
            .with_context(|| format!("Failed to parse config file {}", path.display()))
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.harmonic_freq_threshold == 0 {
            return Err(ConfigError::Parse(
                "harmonic_freq_threshold must be non-zero".to_string(),
            ));
        }
        Ok(())
    }

    #[inline]
    pub fn sample_timeout(&self) -> Duration {
        Duration::from_millis(self.sample_timeout_ms)
    }

    #[inline]
    pub fn pre_sweep_settle(&self) -> Duration {
        Duration::from_millis(self.pre_sweep_settle_ms)
    }

    #[inline]
    pub fn idle_poll(&self) -> Duration {
        Duration::from_millis(self.idle_poll_ms)
    }
}
