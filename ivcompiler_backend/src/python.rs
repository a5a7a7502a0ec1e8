//! Python bindings, enabled with the `python` feature.
//!
//! Exposes the two synthesizers and an [`IvSweep`] class to inspect compiled stimulus arrays
//! without any driver. Errors surface as `ValueError` (configuration) or `RuntimeError`.
use numpy::{IntoPyArray, PyArray1, PyArray2};
use pyo3::prelude::*;
use pyo3::types::PyDict;

use crate::device::*;
use crate::error::*;
use crate::results::WaveformTable;
use crate::sweep::*;
use crate::utils::parse_experiment_label;
use crate::waveform::*;

#[pyfunction]
#[pyo3(name = "generate_sawtooth", signature = (input_range, n_points, direction = "up"))]
pub fn py_generate_sawtooth<'py>(
    py: Python<'py>,
    input_range: (f64, f64),
    n_points: usize,
    direction: &str,
) -> PyResult<&'py PyArray1<f64>> {
    let direction = direction.parse::<Direction>()?;
    Ok(generate_sawtooth(input_range.into(), n_points, direction)?.into_pyarray(py))
}

#[pyfunction]
#[pyo3(name = "generate_sinewave", signature = (n_points, sample_frequency, amplitude, phase = 0.0))]
pub fn py_generate_sinewave<'py>(
    py: Python<'py>,
    n_points: usize,
    sample_frequency: f64,
    amplitude: f64,
    phase: f64,
) -> PyResult<&'py PyArray1<f64>> {
    Ok(generate_sinewave(n_points, sample_frequency, amplitude, phase)?.into_pyarray(py))
}

/// Converts `[[v0, v1] | None, ...]` as received from Python.
pub fn ranges_from_py(
    name: &str,
    ranges: Vec<Option<Vec<f64>>>,
) -> SweepResult<Vec<Option<[f64; 2]>>> {
    ranges
        .into_iter()
        .map(|pair| match pair.as_deref() {
            None => Ok(None),
            Some([v0, v1]) => Ok(Some([*v0, *v1])),
            Some(other) => Err(SweepError::config(format!(
                "Device {} has voltage range {:?}, expected [v0, v1]",
                name, other
            ))),
        })
        .collect()
}

/// `{label: {device: ndarray}}` as nested Python dictionaries.
pub fn table_to_pydict<'py>(py: Python<'py>, table: &WaveformTable) -> PyResult<&'py PyDict> {
    let labels = PyDict::new(py);
    for (label, devs) in table {
        let devices = PyDict::new(py);
        for (name, wave) in devs {
            devices.set_item(name, wave.clone().into_pyarray(py))?;
        }
        labels.set_item(label, devices)?;
    }
    Ok(labels)
}

/// Replays the compile step from the initial state up to experiment `label`.
pub fn compile_label<S: BaseSweep>(sweep: &S, label: &str) -> SweepResult<CompiledExperiment> {
    let target = parse_experiment_label(label)?;
    let mut state = sweep.initial_state();
    loop {
        let (next, compiled) = sweep.compile_experiment(state)?;
        if compiled.exp_idx() == target {
            return Ok(compiled);
        }
        state = next;
    }
}

#[pyclass(name = "IvSweep")]
pub struct IvSweep {
    sweep: Sweep,
}

#[pymethods]
impl IvSweep {
    #[new]
    #[pyo3(signature = (shape, input_signal_type = "sawtooth", direction = "up", sampling_frequency = 1000.0))]
    fn new(
        shape: usize,
        input_signal_type: &str,
        direction: &str,
        sampling_frequency: f64,
    ) -> PyResult<Self> {
        Ok(Self {
            sweep: Sweep::new(SweepSettings {
                shape,
                signal_type: input_signal_type.parse::<SignalType>()?,
                direction: direction.parse::<Direction>()?,
                samp_rate: sampling_frequency,
            }),
        })
    }

    /// Builds a sweep from a JSON configuration string.
    #[staticmethod]
    fn from_json(text: &str) -> PyResult<Self> {
        let config = crate::config::SweepConfig::from_json_str(text)?;
        Ok(Self {
            sweep: Sweep::from_config(&config)?,
        })
    }

    fn add_device(
        &mut self,
        name: &str,
        activation_channel_mask: Vec<u8>,
        activation_voltage_ranges: Vec<Option<Vec<f64>>>,
    ) -> PyResult<()> {
        let ranges = ranges_from_py(name, activation_voltage_ranges)?;
        let dev = Device::from_setup(name, &activation_channel_mask, &ranges)?;
        Ok(self.sweep.add_device(dev)?)
    }

    fn device_names(&self) -> Vec<String> {
        self.sweep.device_names().into_iter().map(String::from).collect()
    }

    fn total_channels(&self) -> usize {
        self.sweep.total_channels()
    }

    fn devices_in_experiment(&self, label: &str) -> PyResult<Vec<String>> {
        let exp_idx = parse_experiment_label(label)?;
        Ok(self
            .sweep
            .devices_in_experiment(exp_idx)
            .into_iter()
            .map(String::from)
            .collect())
    }

    fn validate(&self) -> PyResult<()> {
        Ok(self.sweep.validate()?)
    }

    /// Composite `(time, channel)` stimulus of experiment `label`, e.g. `"IV3"`.
    fn input_array<'py>(&self, py: Python<'py>, label: &str) -> PyResult<&'py PyArray2<f64>> {
        let compiled = compile_label(&self.sweep, label)?;
        Ok(compiled.stimulus().clone().into_pyarray(py))
    }

    /// Active stimulus of every participant of experiment `label`.
    fn inputs<'py>(&self, py: Python<'py>, label: &str) -> PyResult<&'py PyDict> {
        let compiled = compile_label(&self.sweep, label)?;
        let dict = PyDict::new(py);
        for (name, wave) in compiled.inputs() {
            dict.set_item(name, wave.into_pyarray(py))?;
        }
        Ok(dict)
    }

    fn __repr__(&self) -> String {
        let settings = self.sweep.settings();
        format!(
            "IvSweep(shape={}, signal_type={}, direction={}, devices={:?})",
            settings.shape,
            settings.signal_type,
            settings.direction,
            self.sweep.device_names()
        )
    }
}
