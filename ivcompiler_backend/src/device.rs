//! Implements the per-device view of an IV sweep: the activation mask and the voltage ranges.
//!
//! ## Device
//! Every [`Device`] corresponds to one device under test (one electrode array) identified by name.
//! It owns an [`ActivationMask`] with one flag per canonical experiment and, for every experiment
//! its mask selects, the [`VoltageRange`] the active electrode is swept through.
//!
//! ### Stimulus buffer layout
//! A device contributes one stimulus row per 1-bit of its mask, for the whole run. In experiment
//! `e` the only non-zero row (if any) is row [`ActivationMask::active_rank`]`(e)`, i.e. the
//! number of experiments before `e` the device already took part in.

use std::fmt;

use crate::error::*;
use crate::waveform::VoltageRange;

/// Number of canonical IV experiments in a sweep (`IV1` to `IV7`).
pub const NUM_EXPERIMENTS: usize = 7;

/// Per-device selection of the experiments in which its electrode is stimulated.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ActivationMask {
    flags: [bool; NUM_EXPERIMENTS],
}

impl ActivationMask {
    pub fn new(flags: [bool; NUM_EXPERIMENTS]) -> Self {
        Self { flags }
    }

    /// Builds a mask from `0`/`1` flags as they appear in configuration.
    ///
    /// # Errors
    /// [`SweepError::InvalidConfiguration`] if there are not exactly [`NUM_EXPERIMENTS`] flags
    /// or a flag is neither `0` nor `1`.
    ///
    /// # Example
    /// ```
    /// use ivcompiler_backend::device::*;
    ///
    /// let mask = ActivationMask::from_flags(&[1, 0, 1, 0, 0, 0, 0]).unwrap();
    /// assert_eq!(mask.count_active(), 2);
    /// assert_eq!(mask.active_rank(2), Some(1));
    /// assert_eq!(mask.active_rank(1), None);
    ///
    /// assert!(ActivationMask::from_flags(&[1, 0, 1]).is_err());
    /// ```
    pub fn from_flags(flags: &[u8]) -> SweepResult<Self> {
        if flags.len() != NUM_EXPERIMENTS {
            return Err(SweepError::config(format!(
                "Activation mask {:?} has {} entries, expected {}",
                flags,
                flags.len(),
                NUM_EXPERIMENTS
            )));
        }
        let mut mask = [false; NUM_EXPERIMENTS];
        for (pos, &flag) in flags.iter().enumerate() {
            mask[pos] = match flag {
                0 => false,
                1 => true,
                other => {
                    return Err(SweepError::config(format!(
                        "Activation mask {:?} has flag {} at position {}, expected 0 or 1",
                        flags, other, pos
                    )))
                }
            };
        }
        Ok(Self::new(mask))
    }

    /// Whether the electrode takes part in the experiment at position `exp_idx` (0-based).
    pub fn is_active(&self, exp_idx: usize) -> bool {
        self.flags.get(exp_idx).copied().unwrap_or(false)
    }

    /// Number of experiments the electrode takes part in, i.e. the static stimulus row count.
    pub fn count_active(&self) -> usize {
        self.flags.iter().filter(|&&flag| flag).count()
    }

    /// Buffer row used in experiment `exp_idx`: the number of active experiments before it.
    /// `None` if the device is masked out of that experiment.
    pub fn active_rank(&self, exp_idx: usize) -> Option<usize> {
        if !self.is_active(exp_idx) {
            return None;
        }
        Some(self.flags[..exp_idx].iter().filter(|&&flag| flag).count())
    }

    pub fn active_positions(&self) -> impl Iterator<Item = usize> + '_ {
        self.flags
            .iter()
            .enumerate()
            .filter(|(_, flag)| **flag)
            .map(|(pos, _)| pos)
    }

    pub fn to_flags(&self) -> Vec<u8> {
        self.flags.iter().map(|&flag| flag as u8).collect()
    }
}
impl fmt::Display for ActivationMask {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{:?}", self.to_flags())
    }
}

/// A device under test: name, activation mask and per-experiment voltage ranges.
#[derive(Clone, Debug, PartialEq)]
pub struct Device {
    name: String,
    mask: ActivationMask,
    ranges: [Option<VoltageRange>; NUM_EXPERIMENTS],
}

impl Device {
    /// Constructs a device, checking that every experiment selected by `mask` has a voltage range.
    ///
    /// Ranges at masked-out positions are kept but never used.
    ///
    /// # Example
    /// ```
    /// use ivcompiler_backend::device::*;
    /// use ivcompiler_backend::waveform::VoltageRange;
    ///
    /// let mask = ActivationMask::from_flags(&[0, 1, 0, 0, 0, 0, 0]).unwrap();
    /// let mut ranges = [None; NUM_EXPERIMENTS];
    /// ranges[1] = Some(VoltageRange::new(1.2, -0.7));
    /// let dev = Device::new("B", mask, ranges).unwrap();
    /// assert_eq!(dev.range(1).unwrap(), VoltageRange::new(1.2, -0.7));
    ///
    /// // Masked-in experiment without a range
    /// assert!(Device::new("B", mask, [None; NUM_EXPERIMENTS]).is_err());
    /// ```
    pub fn new(
        name: &str,
        mask: ActivationMask,
        ranges: [Option<VoltageRange>; NUM_EXPERIMENTS],
    ) -> SweepResult<Self> {
        if name.is_empty() {
            return Err(SweepError::config("Device name must not be empty"));
        }
        for pos in mask.active_positions() {
            if ranges[pos].is_none() {
                return Err(SweepError::config(format!(
                    "Device {} is active in experiment IV{} but has no voltage range for it",
                    name,
                    pos + 1
                )));
            }
        }
        Ok(Self {
            name: name.to_string(),
            mask,
            ranges,
        })
    }

    /// Constructs a device from configuration-style flags and `[v0, v1]` pairs.
    ///
    /// `ranges` must have one entry per experiment; entries of masked-out experiments may be `None`.
    pub fn from_setup(name: &str, mask: &[u8], ranges: &[Option<[f64; 2]>]) -> SweepResult<Self> {
        let mask = ActivationMask::from_flags(mask)?;
        if ranges.len() != NUM_EXPERIMENTS {
            return Err(SweepError::config(format!(
                "Device {} has {} activation voltage ranges, expected {}",
                name,
                ranges.len(),
                NUM_EXPERIMENTS
            )));
        }
        let mut range_arr = [None; NUM_EXPERIMENTS];
        for (slot, pair) in range_arr.iter_mut().zip(ranges.iter()) {
            *slot = pair.map(VoltageRange::from);
        }
        Device::new(name, mask, range_arr)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn mask(&self) -> &ActivationMask {
        &self.mask
    }

    /// Number of stimulus rows (channels) this device contributes to every experiment.
    pub fn num_channels(&self) -> usize {
        self.mask.count_active()
    }

    /// Voltage range of experiment `exp_idx`. Errors if the device is masked out of it.
    pub fn range(&self, exp_idx: usize) -> SweepResult<VoltageRange> {
        if !self.mask.is_active(exp_idx) {
            return Err(SweepError::config(format!(
                "Device {} is masked out of experiment IV{}",
                self.name,
                exp_idx + 1
            )));
        }
        self.ranges
            .get(exp_idx)
            .copied()
            .flatten()
            .ok_or_else(|| {
                SweepError::config(format!(
                    "Device {} has no voltage range for experiment IV{}",
                    self.name,
                    exp_idx + 1
                ))
            })
    }
}
