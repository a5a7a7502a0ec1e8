use pyo3::prelude::*;
use pyo3::types::PyDict;

use ivcompiler_backend::python::{ranges_from_py, table_to_pydict};
use ivcompiler_backend::*;

use crate::driver::SimulatedDriver;
use crate::measurement::IvMeasurement;

/// Python face of [`IvMeasurement`]. Hardware drivers live on the Python side, so only the
/// simulated driver can be run from here.
#[pyclass(name = "IvMeasurement")]
pub struct PyIvMeasurement {
    measurement: IvMeasurement,
}

#[pymethods]
impl PyIvMeasurement {
    #[new]
    #[pyo3(signature = (shape, input_signal_type = "sawtooth", direction = "up", sampling_frequency = 1000.0))]
    fn new(
        shape: usize,
        input_signal_type: &str,
        direction: &str,
        sampling_frequency: f64,
    ) -> PyResult<Self> {
        Ok(Self {
            measurement: IvMeasurement::new(SweepSettings {
                shape,
                signal_type: input_signal_type.parse::<SignalType>()?,
                direction: direction.parse::<Direction>()?,
                samp_rate: sampling_frequency,
            }),
        })
    }

    #[staticmethod]
    fn from_json(text: &str) -> PyResult<Self> {
        let config = SweepConfig::from_json_str(text)?;
        Ok(Self {
            measurement: IvMeasurement::from_config(&config)?,
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
        Ok(self.measurement.add_device(dev)?)
    }

    /// Runs the sweep against a resistor of `resistance` ohms; returns `(inputs, outputs)`.
    #[pyo3(signature = (resistance = 1e6))]
    fn run_simulated<'py>(
        &self,
        py: Python<'py>,
        resistance: f64,
    ) -> PyResult<(&'py PyDict, &'py PyDict)> {
        let run = self.measurement.run_test(SimulatedDriver::new(resistance)?)?;
        Ok((
            table_to_pydict(py, run.results.inputs())?,
            table_to_pydict(py, run.results.outputs())?,
        ))
    }
}
