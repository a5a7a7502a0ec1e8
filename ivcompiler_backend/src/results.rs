//! Append-only store of the stimulus and response waveforms of a sweep run.
//!
//! Both mappings are keyed by experiment label (`IV1` to `IV7`), then by device name. A device is
//! only attributed under the experiments its mask selects.
use indexmap::IndexMap;
use ndarray::{Array1, ArrayView1};
use serde_json::{json, Value};

use crate::error::*;

pub type WaveformTable = IndexMap<String, IndexMap<String, Array1<f64>>>;

#[derive(Clone, Debug, Default, PartialEq)]
pub struct SweepResults {
    inputs: WaveformTable,
    outputs: WaveformTable,
}

impl SweepResults {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records the active stimulus and the measured response of `device` in experiment `label`.
    ///
    /// # Errors
    /// [`SweepError::InvalidConfiguration`] if the pair was already recorded, or
    /// [`SweepError::LengthInvariantViolation`] if stimulus and response lengths differ.
    pub fn record(
        &mut self,
        label: &str,
        device: &str,
        input: Array1<f64>,
        output: Array1<f64>,
    ) -> SweepResult<()> {
        if input.len() != output.len() {
            return Err(SweepError::LengthInvariantViolation {
                expected: input.len(),
                actual: output.len(),
            });
        }
        if self.input(label, device).is_some() {
            return Err(SweepError::config(format!(
                "Device {} already has results for {}",
                device, label
            )));
        }
        self.inputs
            .entry(label.to_string())
            .or_default()
            .insert(device.to_string(), input);
        self.outputs
            .entry(label.to_string())
            .or_default()
            .insert(device.to_string(), output);
        Ok(())
    }

    pub fn inputs(&self) -> &WaveformTable {
        &self.inputs
    }

    pub fn outputs(&self) -> &WaveformTable {
        &self.outputs
    }

    pub fn input(&self, label: &str, device: &str) -> Option<ArrayView1<f64>> {
        self.inputs
            .get(label)
            .and_then(|devs| devs.get(device))
            .map(|arr| arr.view())
    }

    pub fn output(&self, label: &str, device: &str) -> Option<ArrayView1<f64>> {
        self.outputs
            .get(label)
            .and_then(|devs| devs.get(device))
            .map(|arr| arr.view())
    }

    /// Labels of the experiments `device` was recorded under, in run order.
    pub fn experiments_for_device(&self, device: &str) -> Vec<&str> {
        self.outputs
            .iter()
            .filter(|(_, devs)| devs.contains_key(device))
            .map(|(label, _)| label.as_str())
            .collect()
    }

    /// `{"inputs": {label: {device: [...]}}, "outputs": {...}}`
    pub fn to_json(&self) -> Value {
        json!({
            "inputs": table_to_json(&self.inputs),
            "outputs": table_to_json(&self.outputs),
        })
    }
}

fn table_to_json(table: &WaveformTable) -> Value {
    let mut labels = serde_json::Map::new();
    for (label, devs) in table {
        let mut devices = serde_json::Map::new();
        for (name, wave) in devs {
            devices.insert(name.clone(), json!(wave.to_vec()));
        }
        labels.insert(label.clone(), Value::Object(devices));
    }
    Value::Object(labels)
}
