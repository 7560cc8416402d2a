use crate::gpio::{PinId, DEFAULT_GPIO_ROOT};
use crate::motor::{MotorPins, DEFAULT_CCW_PIN, DEFAULT_CW_PIN};
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {}: {source}", .path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config file {}: {source}", .path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("cw_pin and ccw_pin must differ (both are {0})")]
    SharedPin(PinId),
}

/// Where the GPIO tree lives and which lines drive the motor.
///
/// Every key is optional in the TOML file:
///
/// ```toml
/// gpio_root = "/sys/class/gpio"
/// cw_pin = 17
/// ccw_pin = 27
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct MotorConfig {
    pub gpio_root: PathBuf,
    pub cw_pin: PinId,
    pub ccw_pin: PinId,
}

impl Default for MotorConfig {
    fn default() -> Self {
        Self {
            gpio_root: PathBuf::from(DEFAULT_GPIO_ROOT),
            cw_pin: DEFAULT_CW_PIN,
            ccw_pin: DEFAULT_CCW_PIN,
        }
    }
}

impl MotorConfig {
    /// Load and validate a TOML config file
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let config: Self = toml::from_str(&text).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.cw_pin == self.ccw_pin {
            return Err(ConfigError::SharedPin(self.cw_pin));
        }
        Ok(())
    }

    pub fn pins(&self) -> MotorPins {
        MotorPins {
            cw: self.cw_pin,
            ccw: self.ccw_pin,
        }
    }
}
