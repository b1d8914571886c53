//! Simulator configuration.

use std::time::Duration;

use config::{Config, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};

use super::MAX_LEAP_TARGET;

/// Simulation parameters that rarely change between runs.
///
/// | Field         | Unit        | Description                                   | Default      |
/// |---------------|-------------|-----------------------------------------------|--------------|
/// | leap_target   | s (epoch)   | Instant at which the leap second is inserted  | 1435708800   |
/// | precision     | log2 s      | Precision advertised in the SHM record        | -30          |
/// | shm_base_key  | SysV key    | Key of SHM unit 0; unit N uses base + N       | 0x4e545030   |
/// | interval_ms   | ms          | Delay between published samples              | 1000         |
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SimConfig {
    #[serde(default = "SimConfig::default_leap_target")]
    pub leap_target: i64,
    #[serde(default = "SimConfig::default_precision")]
    pub precision: i32,
    #[serde(default = "SimConfig::default_shm_base_key")]
    pub shm_base_key: i32,
    #[serde(default = "SimConfig::default_interval_ms")]
    pub interval_ms: u64,
}

impl SimConfig {
    /// Load config from a TOML file. Supports:
    /// - Files with a `[leapsim]` section; when present, only that section is read
    /// - Flat files with the keys at root
    ///
    /// `LEAPSIM_*` environment variables (e.g. `LEAPSIM_LEAP_TARGET`) override file values.
    pub fn from_file(config_file: &str) -> Result<Self, ConfigError> {
        Self::build(Some(config_file))
    }

    /// Like [`SimConfig::from_file`], but uses `CONFIG_FILE` when no path is
    /// given and built-in defaults when neither is present.
    pub fn load(config_file: Option<&str>) -> Result<Self, ConfigError> {
        match config_file {
            Some(path) => Self::from_file(path),
            None => match std::env::var("CONFIG_FILE") {
                Ok(path) => Self::from_file(&path),
                Err(_) => Self::build(None),
            },
        }
    }

    fn build(config_file: Option<&str>) -> Result<Self, ConfigError> {
        let mut config = match config_file {
            Some(path) => Self::read_file(path)?,
            None => Self::default(),
        };
        let overrides: EnvOverrides = Config::builder()
            .add_source(Environment::with_prefix("LEAPSIM").try_parsing(true))
            .build()?
            .try_deserialize()?;
        overrides.apply(&mut config);
        config.validate()?;
        Ok(config)
    }

    fn read_file(config_file: &str) -> Result<Self, ConfigError> {
        let file = Config::builder().add_source(File::with_name(config_file)).build()?;
        if file.get_table("leapsim").is_ok() {
            file.get("leapsim")
        } else {
            file.try_deserialize()
        }
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if !(0..=MAX_LEAP_TARGET).contains(&self.leap_target) {
            return Err(ConfigError::Message(format!(
                "leap_target {} out of range 0..={MAX_LEAP_TARGET}",
                self.leap_target
            )));
        }
        if self.interval_ms == 0 {
            return Err(ConfigError::Message("interval_ms must be positive".into()));
        }
        Ok(())
    }

    pub fn interval(&self) -> Duration {
        Duration::from_millis(self.interval_ms)
    }

    /// SysV key of the given SHM unit.
    pub fn shm_key(&self, unit: u32) -> libc::key_t {
        self.shm_base_key.wrapping_add(unit as i32)
    }

    fn default_leap_target() -> i64 {
        1_435_708_800 // 1 Jul 2015 00:00:00 UTC
    }
    fn default_precision() -> i32 {
        -30 // ~1 ns
    }
    fn default_shm_base_key() -> i32 {
        0x4e54_5030 // "NTP0"
    }
    fn default_interval_ms() -> u64 {
        1000
    }
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            leap_target: Self::default_leap_target(),
            precision: Self::default_precision(),
            shm_base_key: Self::default_shm_base_key(),
            interval_ms: Self::default_interval_ms(),
        }
    }
}

/// Values taken from `LEAPSIM_*` environment variables.
#[derive(Debug, Default, Deserialize)]
struct EnvOverrides {
    leap_target: Option<i64>,
    precision: Option<i32>,
    shm_base_key: Option<i32>,
    interval_ms: Option<u64>,
}

impl EnvOverrides {
    fn apply(self, config: &mut SimConfig) {
        if let Some(leap_target) = self.leap_target {
            config.leap_target = leap_target;
        }
        if let Some(precision) = self.precision {
            config.precision = precision;
        }
        if let Some(shm_base_key) = self.shm_base_key {
            config.shm_base_key = shm_base_key;
        }
        if let Some(interval_ms) = self.interval_ms {
            config.interval_ms = interval_ms;
        }
    }
}
