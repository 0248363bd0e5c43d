use std::fs::File;
use std::io::BufReader;
use std::io::ErrorKind;
use std::io::Read;
use std::path::Path;
use std::time::Duration;

use serde::Deserialize;
use thiserror::Error;

use crate::coordinates::AxisPolicy;
use crate::coordinates::CoordinateRange;
use crate::engine::EngineSettings;
use crate::parameters::DEFAULT_NOISE_MAX;
use crate::schema::DisplaySize;

pub const CONFIG_PATH: &str = "config.toml";

#[derive(Clone, Debug, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct Config {
    pub surface: SurfaceConfig,
    pub axis: AxisPolicy,
    pub engine: EngineConfig,
}

#[derive(Clone, Copy, Debug, PartialEq, Deserialize)]
#[serde(default)]
pub struct SurfaceConfig {
    pub width: f64,
    pub height: f64,
    pub padding: f64,
}

impl Default for SurfaceConfig {
    fn default() -> Self {
        Self {
            width: 360.0,
            height: 300.0,
            padding: 10.0,
        }
    }
}

impl SurfaceConfig {
    pub fn size(&self) -> DisplaySize {
        DisplaySize::new(self.width, self.height)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub throttle_ms: u64,
    pub base_tick_hz: f64,
    pub noise_max: f64,
    pub data_range: CoordinateRange,
    pub seed: Option<u64>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            throttle_ms: 50,
            base_tick_hz: 30.0,
            noise_max: DEFAULT_NOISE_MAX,
            data_range: CoordinateRange::default(),
            seed: None,
        }
    }
}

impl EngineConfig {
    pub fn settings(&self) -> EngineSettings {
        EngineSettings {
            throttle_interval: Duration::from_millis(self.throttle_ms),
            base_tick_hz: self.base_tick_hz,
            noise_max: self.noise_max,
            data_range: self.data_range,
            seed: self.seed,
        }
    }
}

impl Config {
    pub fn load(path: impl AsRef<Path>) -> Result<Config, ConfigLoadError> {
        let mut s = String::new();
        BufReader::new(File::open(path)?).read_to_string(&mut s)?;
        Ok(toml::from_str(&s)?)
    }

    /// Like [`Config::load`], but a missing file yields the defaults.
    pub fn load_or_default(path: impl AsRef<Path>) -> Result<Config, ConfigLoadError> {
        match Self::load(path) {
            Err(ConfigLoadError::IOError(e)) if e.kind() == ErrorKind::NotFound => {
                log::info!("No config file found, using defaults");
                Ok(Config::default())
            }
            res => res,
        }
    }
}

#[derive(Debug, Error)]
pub enum ConfigLoadError {
    #[error("{0}")]
    IOError(#[from] std::io::Error),
    #[error("{0}")]
    IllegalConfigEntry(#[from] toml::de::Error),
}

#[cfg(test)]
mod test {
    use super::Config;
    use super::ConfigLoadError;
    use crate::coordinates::AxisPolicy;
    use crate::coordinates::CoordinateRange;

    #[test]
    fn empty_file_gives_defaults() {
        let config: Config = toml::from_str("").unwrap();
        assert_eq!(config, Config::default());
        assert_eq!(config.engine.throttle_ms, 50);
        assert_eq!(config.surface.padding, 10.0);
        assert_eq!(config.axis, AxisPolicy::Fixed(CoordinateRange::new(-5.0, 5.0)));
    }

    #[test]
    fn partial_file() {
        let config: Config = toml::from_str(
            r#"
            [surface]
            padding = 40.0

            [axis]
            policy = "fit-data"

            [engine]
            noise_max = 5.0
            seed = 7
            "#,
        )
        .unwrap();
        assert_eq!(config.surface.padding, 40.0);
        assert_eq!(config.surface.width, 360.0);
        assert_eq!(config.axis, AxisPolicy::FitData);
        assert_eq!(config.engine.noise_max, 5.0);
        assert_eq!(config.engine.seed, Some(7));
    }

    #[test]
    fn fixed_axis_range() {
        let config: Config = toml::from_str(
            r#"
            [axis]
            policy = "fixed"
            min = -10.0
            max = 10.0
            "#,
        )
        .unwrap();
        assert_eq!(config.axis, AxisPolicy::Fixed(CoordinateRange::new(-10.0, 10.0)));
    }

    #[test]
    fn missing_file() {
        let path = "this/config/does/not/exist.toml";
        assert!(matches!(Config::load(path), Err(ConfigLoadError::IOError(_))));
        assert_eq!(Config::load_or_default(path).unwrap(), Config::default());
    }
}
