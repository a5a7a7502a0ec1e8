//! The sweep module compiles the seven canonical IV experiments into driver-ready stimulus arrays.
//!
//! ## Overview
//!
//! At the heart of this module lies the [`BaseSweep`] trait. Implementors only supply field
//! accessors (the ordered device collection and the shared [`SweepSettings`]); the trait's default
//! methods implement device management, fail-fast validation and the per-experiment compile step.
//! [`Sweep`] is the plain implementor used by this crate; the experiment-control crate implements
//! the same trait for its hardware-facing measurement struct.
//!
//! ## The per-experiment compile step
//!
//! [`BaseSweep::compile_experiment`] consumes a [`SweepState`] and returns the advanced state
//! together with a [`CompiledExperiment`]:
//!
//! 1. every device gets a zero buffer with one row per 1-bit of its mask (static for the run);
//! 2. a device active in the experiment writes its waveform into the row given by its cursor,
//!    then the cursor advances;
//! 3. a masked-out device contributes only zero rows and is not a participant;
//! 4. the buffers are stacked in device order and transposed to `(time, channel)`;
//! 5. the global counter advances exactly once.
//!
//! Participants remember their absolute stimulus column, which is how
//! [`CompiledExperiment::split_response`] slices the driver response back per device.

use indexmap::IndexMap;
use ndarray::{s, Array1, Array2, ArrayView2, ArrayViewMut1};

use crate::config::SweepConfig;
use crate::device::*;
use crate::error::*;
use crate::state::SweepState;
use crate::utils::experiment_label;
use crate::waveform::*;

/// Parameters shared by every device and experiment of a sweep.
#[derive(Clone, Debug, PartialEq)]
pub struct SweepSettings {
    /// Number of time samples per waveform.
    pub shape: usize,
    pub signal_type: SignalType,
    /// Only used by the sawtooth synthesizer.
    pub direction: Direction,
    /// Sample frequency of the driver, in Hz. Only used by the sine synthesizer.
    pub samp_rate: f64,
}

/// Location of a participating device's active channel.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Participant {
    /// Row inside the device's own stimulus buffer.
    pub row: usize,
    /// Column inside the composite `(time, channel)` stimulus array.
    pub column: usize,
}

/// Result of compiling one experiment: per-device buffers, participants and the driver input.
#[derive(Clone, Debug)]
pub struct CompiledExperiment {
    exp_idx: usize,
    label: String,
    buffers: IndexMap<String, Array2<f64>>,
    participants: IndexMap<String, Participant>,
    stimulus: Array2<f64>,
}

impl CompiledExperiment {
    pub fn exp_idx(&self) -> usize {
        self.exp_idx
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    /// Per-device stimulus buffers of shape `(channels, samples)`, in device order.
    pub fn buffers(&self) -> &IndexMap<String, Array2<f64>> {
        &self.buffers
    }

    /// Devices active in this experiment, in device order.
    pub fn participants(&self) -> Vec<&str> {
        self.participants.keys().map(|name| name.as_str()).collect()
    }

    pub fn participant(&self, name: &str) -> Option<&Participant> {
        self.participants.get(name)
    }

    /// Composite driver input of shape `(time, channel)`.
    pub fn stimulus(&self) -> &Array2<f64> {
        &self.stimulus
    }

    pub fn num_samples(&self) -> usize {
        self.stimulus.nrows()
    }

    pub fn num_channels(&self) -> usize {
        self.stimulus.ncols()
    }

    /// Active stimulus waveform of every participant.
    pub fn inputs(&self) -> IndexMap<String, Array1<f64>> {
        self.participants
            .iter()
            .map(|(name, p)| (name.clone(), self.stimulus.column(p.column).to_owned()))
            .collect()
    }

    /// Slices a driver response back per participant.
    ///
    /// The response must have the stimulus' `(time, channel)` shape; channel `c` of the response
    /// belongs to channel `c` of the stimulus.
    ///
    /// # Errors
    /// [`SweepError::DriverFailure`] if the response shape does not match the stimulus.
    pub fn split_response(
        &self,
        response: ArrayView2<f64>,
    ) -> SweepResult<IndexMap<String, Array1<f64>>> {
        if response.dim() != self.stimulus.dim() {
            return Err(SweepError::driver(format!(
                "Response to {} has shape {:?}, expected {:?} (time, channel)",
                self.label,
                response.dim(),
                self.stimulus.dim()
            )));
        }
        Ok(self
            .participants
            .iter()
            .map(|(name, p)| (name.clone(), response.column(p.column).to_owned()))
            .collect())
    }
}

/// This trait defines the behavior of sweep plans through default trait implementations.
///
/// Trait methods are classified into the following categories:
/// 1. Field methods supplied by implementors: [`devices`], [`devices_`], [`settings`]
/// 2. Device management: [`add_device`], [`dev`], [`device_names`], [`total_channels`]
/// 3. Planning queries: [`devices_in_experiment`], [`initial_state`], [`waveform`],
///    [`write_input_wfrm`], [`gen_input_wfrm`], [`validate`]
/// 4. Compilation: [`compile_experiment`], [`compile_all`]
///
/// [`devices`]: BaseSweep::devices
/// [`devices_`]: BaseSweep::devices_
/// [`settings`]: BaseSweep::settings
/// [`add_device`]: BaseSweep::add_device
/// [`dev`]: BaseSweep::dev
/// [`device_names`]: BaseSweep::device_names
/// [`total_channels`]: BaseSweep::total_channels
/// [`devices_in_experiment`]: BaseSweep::devices_in_experiment
/// [`initial_state`]: BaseSweep::initial_state
/// [`waveform`]: BaseSweep::waveform
/// [`write_input_wfrm`]: BaseSweep::write_input_wfrm
/// [`gen_input_wfrm`]: BaseSweep::gen_input_wfrm
/// [`validate`]: BaseSweep::validate
/// [`compile_experiment`]: BaseSweep::compile_experiment
/// [`compile_all`]: BaseSweep::compile_all
pub trait BaseSweep {
    // FIELD methods
    fn devices(&self) -> &IndexMap<String, Device>;
    fn devices_(&mut self) -> &mut IndexMap<String, Device>;
    fn settings(&self) -> &SweepSettings;

    /// Registers a device. Device order is registration order.
    ///
    /// # Errors
    /// [`SweepError::InvalidConfiguration`] if a device with the same name is already registered.
    fn add_device(&mut self, dev: Device) -> SweepResult<()> {
        if self.devices().contains_key(dev.name()) {
            return Err(SweepError::config(format!(
                "Device {} already registered. Registered devices are {:?}",
                dev.name(),
                self.devices().keys().collect::<Vec<_>>()
            )));
        }
        self.devices_().insert(dev.name().to_string(), dev);
        Ok(())
    }

    /// Shortcut to borrow device instance by name
    fn dev(&self, name: &str) -> SweepResult<&Device> {
        self.devices().get(name).ok_or_else(|| {
            SweepError::config(format!(
                "There is no device {} registered. Registered devices are {:?}",
                name,
                self.devices().keys().collect::<Vec<_>>()
            ))
        })
    }

    fn device_names(&self) -> Vec<&str> {
        self.devices().keys().map(|name| name.as_str()).collect()
    }

    /// Number of columns of every composite stimulus array.
    fn total_channels(&self) -> usize {
        self.devices().values().map(|dev| dev.num_channels()).sum()
    }

    /// Devices whose electrode is stimulated in experiment `exp_idx`, in device order.
    fn devices_in_experiment(&self, exp_idx: usize) -> Vec<&str> {
        self.devices()
            .values()
            .filter(|dev| dev.mask().is_active(exp_idx))
            .map(|dev| dev.name())
            .collect()
    }

    fn initial_state(&self) -> SweepState {
        SweepState::new(self.device_names())
    }

    /// Waveform description for an electrode swept through `range`.
    ///
    /// Sine waveforms use `range.v1` as amplitude.
    fn waveform(&self, range: VoltageRange) -> Waveform {
        let settings = self.settings();
        match settings.signal_type {
            SignalType::Sawtooth => Waveform::new_sawtooth(range, settings.direction),
            SignalType::Sine => Waveform::new_sine(range.v1, None, settings.samp_rate),
        }
    }

    /// Writes the stimulus of an electrode swept through `range` into a buffer row.
    ///
    /// Sine stimuli get their last sample zeroed so the electrode is back at rest when the
    /// experiment ends.
    fn write_input_wfrm(
        &self,
        range: VoltageRange,
        row: &mut ArrayViewMut1<f64>,
    ) -> SweepResult<()> {
        self.waveform(range).eval_inplace(row)?;
        if self.settings().signal_type == SignalType::Sine {
            if let Some(last) = row.iter_mut().last() {
                *last = 0.0;
            }
        }
        Ok(())
    }

    /// Synthesizes the stimulus of an electrode swept through `range`, see [`write_input_wfrm`].
    ///
    /// [`write_input_wfrm`]: BaseSweep::write_input_wfrm
    fn gen_input_wfrm(&self, range: VoltageRange) -> SweepResult<Array1<f64>> {
        let mut wave = Array1::zeros(self.settings().shape);
        self.write_input_wfrm(range, &mut wave.view_mut())?;
        Ok(wave)
    }

    /// Checks everything that can be checked before a driver is touched.
    ///
    /// Besides the shared settings, every (device, experiment) waveform is synthesized once, so
    /// degenerate ranges surface here rather than in the middle of a run.
    fn validate(&self) -> SweepResult<()> {
        let settings = self.settings();
        if self.devices().is_empty() {
            return Err(SweepError::config("Sweep has no devices"));
        }
        if settings.shape == 0 {
            return Err(SweepError::config("Sweep shape (samples per waveform) must be > 0"));
        }
        if settings.signal_type == SignalType::Sine
            && !(settings.samp_rate.is_finite() && settings.samp_rate > 0.0)
        {
            return Err(SweepError::config(format!(
                "Sine sweeps require a positive sampling frequency, got {}",
                settings.samp_rate
            )));
        }
        if self.total_channels() == 0 {
            return Err(SweepError::config(format!(
                "No device is active in any experiment. Devices are {:?}",
                self.device_names()
            )));
        }
        for dev in self.devices().values() {
            for exp_idx in dev.mask().active_positions() {
                let range = dev.range(exp_idx)?;
                self.gen_input_wfrm(range).map_err(|err| match err {
                    SweepError::InvalidConfiguration(msg) => SweepError::config(format!(
                        "Device {} in {}: {}",
                        dev.name(),
                        experiment_label(exp_idx),
                        msg
                    )),
                    other => other,
                })?;
            }
        }
        Ok(())
    }

    /// Compiles the experiment at position `state.all()` and returns the advanced state.
    ///
    /// # Errors
    /// - [`SweepError::StateExhausted`] if all experiments were already compiled.
    /// - [`SweepError::InvalidConfiguration`] if `state` does not belong to this sweep or a
    ///   waveform cannot be synthesized.
    ///
    /// # Example
    /// ```
    /// use ivcompiler_backend::*;
    ///
    /// let mut sweep = Sweep::new(SweepSettings {
    ///     shape: 10,
    ///     signal_type: SignalType::Sawtooth,
    ///     direction: Direction::Up,
    ///     samp_rate: 1000.0,
    /// });
    /// let mut ranges = vec![None; NUM_EXPERIMENTS];
    /// ranges[0] = Some([1.0, -1.0]);
    /// ranges[2] = Some([0.5, -0.5]);
    /// sweep.add_device(Device::from_setup("A", &[1, 0, 1, 0, 0, 0, 0], &ranges).unwrap()).unwrap();
    ///
    /// let (state, iv1) = sweep.compile_experiment(sweep.initial_state()).unwrap();
    /// assert_eq!(iv1.label(), "IV1");
    /// assert_eq!(iv1.stimulus().dim(), (10, 2)); // (time, channel)
    /// assert_eq!(state.all(), 1);
    /// assert_eq!(state.device_index("A").unwrap(), 1);
    /// ```
    fn compile_experiment(
        &self,
        mut state: SweepState,
    ) -> SweepResult<(SweepState, CompiledExperiment)> {
        let exp_idx = state.all();
        if state.is_finished() {
            return Err(SweepError::StateExhausted { index: exp_idx });
        }
        let shape = self.settings().shape;

        let mut buffers: IndexMap<String, Array2<f64>> = IndexMap::new();
        let mut participants: IndexMap<String, Participant> = IndexMap::new();
        let mut offset = 0;
        for dev in self.devices().values() {
            let mut buffer = Array2::zeros((dev.num_channels(), shape));
            if dev.mask().is_active(exp_idx) {
                let row = state.device_index(dev.name())?;
                if dev.mask().active_rank(exp_idx) != Some(row) {
                    return Err(SweepError::config(format!(
                        "Sweep state cursor {} of device {} does not match mask {} in {}",
                        row,
                        dev.name(),
                        dev.mask(),
                        experiment_label(exp_idx)
                    )));
                }
                self.write_input_wfrm(dev.range(exp_idx)?, &mut buffer.row_mut(row))?;
                participants.insert(
                    dev.name().to_string(),
                    Participant {
                        row,
                        column: offset + row,
                    },
                );
                state.advance_device(dev.name())?;
            }
            offset += buffer.nrows();
            buffers.insert(dev.name().to_string(), buffer);
        }

        // Stack device buffers row-wise (channel, time), then hand out (time, channel)
        let mut inputs: Array2<f64> = Array2::zeros((offset, shape));
        let mut start = 0;
        for buffer in buffers.values() {
            let rows = buffer.nrows();
            inputs.slice_mut(s![start..start + rows, ..]).assign(buffer);
            start += rows;
        }
        let stimulus = inputs.reversed_axes().as_standard_layout().into_owned();
        state.advance_all()?;

        log::debug!(
            "Compiled {} with {} channels, participants {:?}",
            experiment_label(exp_idx),
            stimulus.ncols(),
            participants.keys().collect::<Vec<_>>()
        );
        Ok((
            state,
            CompiledExperiment {
                exp_idx,
                label: experiment_label(exp_idx),
                buffers,
                participants,
                stimulus,
            },
        ))
    }

    /// Compiles all experiments from the initial state, without any driver.
    fn compile_all(&self) -> SweepResult<(SweepState, Vec<CompiledExperiment>)> {
        let mut state = self.initial_state();
        let mut compiled = Vec::with_capacity(NUM_EXPERIMENTS);
        while !state.is_finished() {
            let (next, exp) = self.compile_experiment(state)?;
            compiled.push(exp);
            state = next;
        }
        Ok((state, compiled))
    }
}

/// Plain sweep plan: an ordered device collection plus shared settings.
#[derive(Clone, Debug)]
pub struct Sweep {
    devices: IndexMap<String, Device>,
    settings: SweepSettings,
}

impl Sweep {
    pub fn new(settings: SweepSettings) -> Self {
        Self {
            devices: IndexMap::new(),
            settings,
        }
    }

    /// Builds a sweep from a configuration value. Devices follow the configured device list order.
    pub fn from_config(config: &SweepConfig) -> SweepResult<Self> {
        let mut sweep = Sweep::new(config.settings()?);
        for dev in config.build_devices()? {
            sweep.add_device(dev)?;
        }
        Ok(sweep)
    }
}

/// Implements the [`BaseSweep`] field methods for a struct with `devices` and `settings` fields.
///
/// Usage:
/// ```rust
/// use indexmap::IndexMap;
/// use ivcompiler_backend::*;
///
/// struct CalibrationSweep {
///     devices: IndexMap<String, Device>,
///     settings: SweepSettings,
///     reference_resistance: f64,
/// }
/// ivcompiler_backend::impl_sweep_fields!(CalibrationSweep);
/// ```
#[macro_export]
macro_rules! impl_sweep_fields {
    ($sweep_type: ty) => {
        impl $crate::sweep::BaseSweep for $sweep_type {
            fn devices(&self) -> &indexmap::IndexMap<String, $crate::device::Device> {
                &self.devices
            }
            fn devices_(&mut self) -> &mut indexmap::IndexMap<String, $crate::device::Device> {
                &mut self.devices
            }
            fn settings(&self) -> &$crate::sweep::SweepSettings {
                &self.settings
            }
        }
    };
}

impl_sweep_fields!(Sweep);
