//! # ivcompiler_backend
//!
//! Waveform synthesis and sweep compilation for multi-electrode current-voltage (IV)
//! characterization. A sweep runs seven canonical experiments (`IV1` to `IV7`); per-device
//! activation masks decide which device's electrode is stimulated in which experiment.
//!
//! ## Main Structures
//!
//! - [`waveform`]: the sawtooth and sine synthesizers, plus the [`Waveform`] instruction.
//! - [`device`]: [`Device`] and its [`ActivationMask`].
//! - [`sweep`]: the [`BaseSweep`] trait and its per-experiment compile step, [`Sweep`].
//! - [`state`]: [`SweepState`], the counters threaded through the compile step.
//! - [`results`]: [`SweepResults`], the store of recorded stimulus and response waveforms.
//! - [`config`]: [`SweepConfig`], the JSON-deserializable sweep configuration.
//!
//! This crate never talks to hardware; `ivexpctrl_backend` runs compiled experiments against a
//! measurement driver.

pub mod config;
pub mod device;
pub mod error;
pub mod results;
pub mod state;
pub mod sweep;
pub mod utils;
pub mod waveform;

#[cfg(feature = "python")]
pub mod python;

pub use config::*;
pub use device::*;
pub use error::*;
pub use results::*;
pub use state::*;
pub use sweep::*;
pub use utils::*;
pub use waveform::*;

#[cfg(feature = "python")]
use pyo3::prelude::*;

#[cfg(feature = "python")]
#[pymodule]
fn ivcompiler_backend(_py: Python, m: &PyModule) -> PyResult<()> {
    m.add_function(wrap_pyfunction!(python::py_generate_sawtooth, m)?)?;
    m.add_function(wrap_pyfunction!(python::py_generate_sinewave, m)?)?;
    m.add_class::<python::IvSweep>()?;
    Ok(())
}
