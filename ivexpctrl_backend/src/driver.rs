//! The measurement driver boundary.
//!
//! A [`MeasurementDriver`] applies a composite stimulus to the instruments and returns what they
//! measured. Both arrays are laid out `(time, channel)`; channel `c` of the response belongs to
//! channel `c` of the stimulus. Calls block until the instruments are done.
//!
//! [`SimulatedDriver`] stands in for the hardware: every channel sees the same resistor.

use ndarray::{Array2, ArrayView2};

use ivcompiler_backend::*;

pub trait MeasurementDriver {
    /// Applies `stimulus` (volts, `(time, channel)`) and returns the response of the same shape.
    fn forward(&mut self, stimulus: ArrayView2<f64>) -> SweepResult<Array2<f64>>;

    /// Releases the instruments. Called exactly once per run by [`crate::session::DriverSession`].
    fn close(&mut self) -> SweepResult<()>;
}

/// Resistive device under test: `I = V / R`, reported in nA.
#[derive(Debug)]
pub struct SimulatedDriver {
    resistance: f64,
    num_calls: usize,
    closed: bool,
}

impl SimulatedDriver {
    /// # Errors
    /// [`SweepError::InvalidConfiguration`] unless `resistance` (ohms) is positive and finite.
    ///
    /// # Example
    /// ```
    /// use ndarray::array;
    /// use ivexpctrl_backend::*;
    ///
    /// let mut driver = SimulatedDriver::new(1e6).unwrap();
    /// let current = driver.forward(array![[1.0], [-0.5]].view()).unwrap();
    /// assert_eq!(current, array![[1000.0], [-500.0]]); // nA
    /// ```
    pub fn new(resistance: f64) -> SweepResult<Self> {
        if !(resistance.is_finite() && resistance > 0.0) {
            return Err(SweepError::config(format!(
                "Simulated resistance must be positive, got {} ohm",
                resistance
            )));
        }
        Ok(Self {
            resistance,
            num_calls: 0,
            closed: false,
        })
    }

    pub fn resistance(&self) -> f64 {
        self.resistance
    }

    pub fn num_calls(&self) -> usize {
        self.num_calls
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }
}

impl MeasurementDriver for SimulatedDriver {
    fn forward(&mut self, stimulus: ArrayView2<f64>) -> SweepResult<Array2<f64>> {
        if self.closed {
            return Err(SweepError::driver("Simulated driver used after close"));
        }
        self.num_calls += 1;
        log::debug!(
            "Simulated driver call {}: {} samples x {} channels",
            self.num_calls,
            stimulus.nrows(),
            stimulus.ncols()
        );
        // A -> nA
        let scale = 1e9 / self.resistance;
        Ok(stimulus.mapv(|v| v * scale))
    }

    fn close(&mut self) -> SweepResult<()> {
        if self.closed {
            return Err(SweepError::driver("Simulated driver closed twice"));
        }
        self.closed = true;
        Ok(())
    }
}
