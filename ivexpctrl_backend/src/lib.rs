//! Runs IV sweeps compiled by `ivcompiler_backend` against a measurement driver.
//!
//! - [`driver`]: the [`MeasurementDriver`] trait and the resistive [`SimulatedDriver`].
//! - [`session`]: [`DriverSession`], closing the driver exactly once.
//! - [`measurement`]: [`IvMeasurement`], the seven-experiment run loop.

pub mod driver;
pub mod measurement;
pub mod session;

#[cfg(feature = "python")]
pub mod python;

pub use crate::driver::*;
pub use crate::measurement::*;
pub use crate::session::*;

#[cfg(feature = "python")]
use pyo3::prelude::*;

#[cfg(feature = "python")]
#[pymodule]
fn ivexpctrl_backend(_py: Python, m: &PyModule) -> PyResult<()> {
    m.add_class::<python::PyIvMeasurement>()?;
    Ok(())
}
