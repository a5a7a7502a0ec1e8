//! # Running IV sweeps with the `measurement` module
//!
//! [`IvMeasurement`] extends the compile step of [`ivcompiler_backend::BaseSweep`] with a driver:
//! every compiled experiment is submitted to a [`MeasurementDriver`], and the response is split
//! back per participating device into a [`SweepResults`] store.
//!
//! ## How to Use:
//!
//! 1. **Initialization:** build the measurement from a [`SweepConfig`] with
//!    [`IvMeasurement::from_config`], or from [`SweepSettings`] plus
//!    [`BaseSweep::add_device`] calls.
//! 2. **Run:** call [`IvMeasurement::run_test`] with a driver. The run is fully sequential:
//!    each experiment is compiled, measured and recorded before the next one starts.
//! 3. **Results:** [`SweepRun::results`] maps experiment label to device name to the recorded
//!    waveforms, [`SweepRun::state`] holds the final counters.
//!
//! ## Failure behavior
//!
//! Configuration is validated before the driver sees any stimulus. Any error aborts the run; the
//! driver is closed exactly once either way (see [`crate::session`]).

use indexmap::IndexMap;

use ivcompiler_backend::*;

use crate::driver::MeasurementDriver;
use crate::session::DriverSession;

/// Outcome of a complete sweep run.
#[derive(Clone, Debug)]
pub struct SweepRun {
    pub results: SweepResults,
    pub state: SweepState,
}

/// A sweep plan that runs itself against a [`MeasurementDriver`].
///
/// **Refer to the [`BaseSweep`] trait for device management and compile behavior.**
#[derive(Clone, Debug)]
pub struct IvMeasurement {
    devices: IndexMap<String, Device>,
    settings: SweepSettings,
}

ivcompiler_backend::impl_sweep_fields!(IvMeasurement);

impl IvMeasurement {
    pub fn new(settings: SweepSettings) -> Self {
        Self {
            devices: IndexMap::new(),
            settings,
        }
    }

    pub fn from_config(config: &SweepConfig) -> SweepResult<Self> {
        let mut measurement = IvMeasurement::new(config.settings()?);
        for dev in config.build_devices()? {
            measurement.add_device(dev)?;
        }
        Ok(measurement)
    }

    /// Runs the seven experiments against `driver`, which is closed when the run ends.
    ///
    /// # Errors
    /// - [`SweepError::InvalidConfiguration`] (and friends) from [`BaseSweep::validate`], before
    ///   any driver call.
    /// - [`SweepError::DriverFailure`] from the driver, including a response of the wrong shape
    ///   or a failing close.
    ///
    /// # Example
    /// ```
    /// use ivcompiler_backend::*;
    /// use ivexpctrl_backend::*;
    ///
    /// let mut measurement = IvMeasurement::new(SweepSettings {
    ///     shape: 10,
    ///     signal_type: SignalType::Sawtooth,
    ///     direction: Direction::Up,
    ///     samp_rate: 1000.0,
    /// });
    /// let mut ranges = vec![None; NUM_EXPERIMENTS];
    /// ranges[1] = Some([1.2, -0.7]);
    /// measurement
    ///     .add_device(Device::from_setup("B", &[0, 1, 0, 0, 0, 0, 0], &ranges).unwrap())
    ///     .unwrap();
    ///
    /// let run = measurement.run_test(SimulatedDriver::new(1e6).unwrap()).unwrap();
    /// assert_eq!(run.results.experiments_for_device("B"), vec!["IV2"]);
    /// assert_eq!(run.state.all(), NUM_EXPERIMENTS);
    /// ```
    pub fn run_test<D: MeasurementDriver>(&self, driver: D) -> SweepResult<SweepRun> {
        let mut session = DriverSession::open(driver);
        self.validate()?;

        let mut timer = TickTimer::new();
        let mut results = SweepResults::new();
        let mut state = self.initial_state();
        while !state.is_finished() {
            let (next, compiled) = self.compile_experiment(state)?;
            log::info!(
                "Running {} with devices {:?}",
                compiled.label(),
                compiled.participants()
            );
            let response = session.forward(compiled.stimulus().view())?;
            let mut outputs = compiled.split_response(response.view())?;
            for (name, input) in compiled.inputs() {
                let output = outputs.shift_remove(&name).ok_or_else(|| {
                    SweepError::driver(format!(
                        "No response recorded for device {} in {}",
                        name,
                        compiled.label()
                    ))
                })?;
                results.record(compiled.label(), &name, input, output)?;
            }
            timer.tick_log(&format!("{} measured", compiled.label()));
            state = next;
        }
        session.close()?;
        log::info!("Sweep finished: {} experiments", state.all());
        Ok(SweepRun { results, state })
    }
}
