//! Scoped ownership of a measurement driver.
//!
//! A [`DriverSession`] owns the driver for the length of a run and guarantees that
//! [`MeasurementDriver::close`] is called exactly once:
//!
//! - on success, through [`DriverSession::close`], whose error is returned to the caller;
//! - on any early return, through `Drop`. The close error is then only logged, the error that
//!   aborted the run is the one reported.

use ndarray::{Array2, ArrayView2};

use ivcompiler_backend::*;

use crate::driver::MeasurementDriver;

pub struct DriverSession<D: MeasurementDriver> {
    driver: Option<D>,
}

impl<D: MeasurementDriver> DriverSession<D> {
    pub fn open(driver: D) -> Self {
        Self {
            driver: Some(driver),
        }
    }

    /// Forwards `stimulus` and checks the response has the stimulus' shape.
    pub fn forward(&mut self, stimulus: ArrayView2<f64>) -> SweepResult<Array2<f64>> {
        let driver = self
            .driver
            .as_mut()
            .ok_or_else(|| SweepError::driver("Driver session already closed"))?;
        let response = driver.forward(stimulus)?;
        if response.dim() != stimulus.dim() {
            return Err(SweepError::driver(format!(
                "Driver returned a {:?} response to a {:?} stimulus",
                response.dim(),
                stimulus.dim()
            )));
        }
        Ok(response)
    }

    pub fn close(mut self) -> SweepResult<()> {
        match self.driver.take() {
            Some(mut driver) => driver.close(),
            None => Ok(()),
        }
    }
}

impl<D: MeasurementDriver> Drop for DriverSession<D> {
    fn drop(&mut self) {
        if let Some(mut driver) = self.driver.take() {
            if let Err(err) = driver.close() {
                log::warn!("Failed to close measurement driver after an aborted run: {}", err);
            }
        }
    }
}
