//! Error type shared by the compiler and the experiment-control crates.
//!
//! Every fallible operation returns [`SweepResult`]. Configuration problems are reported before any
//! driver call is made, driver problems abort the run.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum SweepError {
    /// Unknown signal type or direction, degenerate voltage range, malformed mask or device table.
    #[error("invalid configuration: {0}")]
    InvalidConfiguration(String),
    /// A synthesized waveform (or the buffer row receiving it) has the wrong number of samples.
    #[error("waveform length mismatch: expected {expected} samples, got {actual}")]
    LengthInvariantViolation { expected: usize, actual: usize },
    /// Any error raised by the measurement driver, including contract violations.
    #[error("driver failure: {0}")]
    DriverFailure(String),
    /// The compile step was asked for an experiment past the last one.
    #[error("sweep state exhausted: experiment index {index} is past the last experiment")]
    StateExhausted { index: usize },
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),
}

impl SweepError {
    pub fn config(msg: impl Into<String>) -> Self {
        SweepError::InvalidConfiguration(msg.into())
    }

    pub fn driver(msg: impl Into<String>) -> Self {
        SweepError::DriverFailure(msg.into())
    }
}

pub type SweepResult<T> = Result<T, SweepError>;

#[cfg(feature = "python")]
impl From<SweepError> for pyo3::PyErr {
    fn from(err: SweepError) -> pyo3::PyErr {
        match err {
            SweepError::InvalidConfiguration(_) => {
                pyo3::exceptions::PyValueError::new_err(err.to_string())
            }
            _ => pyo3::exceptions::PyRuntimeError::new_err(err.to_string()),
        }
    }
}
