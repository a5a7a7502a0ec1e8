//! Fully-resolved sweep configuration, as loaded from JSON.
//!
//! The value mirrors the configuration dictionary used by the measurement scripts:
//!
//! ```json
//! {
//!   "devices": ["A", "B"],
//!   "shape": 10,
//!   "input_signal": { "input_signal_type": "sawtooth", "direction": "up" },
//!   "driver": {
//!     "sampling_frequency": 1000.0,
//!     "instruments_setup": {
//!       "A": {
//!         "activation_channel_mask": [1, 0, 1, 0, 0, 0, 0],
//!         "activation_voltage_ranges": [[1.0, -1.0], null, [0.5, -0.5], null, null, null, null]
//!       },
//!       "B": {
//!         "activation_channel_mask": [0, 1, 0, 0, 0, 0, 0],
//!         "activation_voltage_ranges": [null, [1.2, -0.7], null, null, null, null, null]
//!       }
//!     }
//!   }
//! }
//! ```
//!
//! Signal type and direction stay strings here and are parsed by [`SweepConfig::settings`].
use std::collections::HashMap;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::device::Device;
use crate::error::*;
use crate::sweep::SweepSettings;
use crate::waveform::{Direction, SignalType};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SweepConfig {
    /// Device names, in sweep order.
    pub devices: Vec<String>,
    /// Samples per waveform.
    pub shape: usize,
    pub input_signal: InputSignalConfig,
    pub driver: DriverConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InputSignalConfig {
    pub input_signal_type: String,
    #[serde(default = "InputSignalConfig::default_direction")]
    pub direction: String,
    /// Informational only: the sweep duration follows from `shape` and the sampling frequency.
    #[serde(default)]
    pub time_in_seconds: Option<f64>,
}

impl InputSignalConfig {
    fn default_direction() -> String {
        "up".to_string()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DriverConfig {
    pub sampling_frequency: f64,
    pub instruments_setup: HashMap<String, DeviceSetup>,
    #[serde(default)]
    pub simulation: SimulationConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeviceSetup {
    pub activation_channel_mask: Vec<u8>,
    pub activation_voltage_ranges: Vec<Option<[f64; 2]>>,
}

/// Parameters of the simulated device under test.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimulationConfig {
    /// Resistance in ohms.
    #[serde(default = "SimulationConfig::default_resistance")]
    pub resistance: f64,
}

impl SimulationConfig {
    const fn default_resistance() -> f64 {
        1e6
    }
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            resistance: Self::default_resistance(),
        }
    }
}

impl SweepConfig {
    pub fn from_json_str(text: &str) -> SweepResult<Self> {
        serde_json::from_str(text)
            .map_err(|e| SweepError::config(format!("Malformed sweep configuration: {}", e)))
    }

    pub fn from_json_file(path: impl AsRef<Path>) -> SweepResult<Self> {
        let text = std::fs::read_to_string(path.as_ref())?;
        Self::from_json_str(&text)
    }

    /// Parses the shared sweep settings.
    pub fn settings(&self) -> SweepResult<SweepSettings> {
        Ok(SweepSettings {
            shape: self.shape,
            signal_type: self.input_signal.input_signal_type.parse::<SignalType>()?,
            direction: self.input_signal.direction.parse::<Direction>()?,
            samp_rate: self.driver.sampling_frequency,
        })
    }

    /// Builds the devices in `devices` order from the per-device setup table.
    pub fn build_devices(&self) -> SweepResult<Vec<Device>> {
        for name in self.driver.instruments_setup.keys() {
            if !self.devices.contains(name) {
                log::warn!("Ignoring instrument setup of unlisted device {}", name);
            }
        }
        self.devices
            .iter()
            .map(|name| {
                let setup = self.driver.instruments_setup.get(name).ok_or_else(|| {
                    SweepError::config(format!("Device {} has no instruments_setup entry", name))
                })?;
                Device::from_setup(
                    name,
                    &setup.activation_channel_mask,
                    &setup.activation_voltage_ranges,
                )
            })
            .collect()
    }
}
