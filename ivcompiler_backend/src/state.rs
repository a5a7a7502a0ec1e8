//! Progress counters of a running sweep.
//!
//! [`SweepState`] holds the shared `"all"` experiment counter and one row cursor per device.
//! It is an owned value: [`crate::sweep::BaseSweep::compile_experiment`] takes it by value and
//! returns the advanced state, so there is exactly one place where counters move.
//!
//! Invariants over a run:
//! - `all` grows by exactly one per compiled experiment and ends at [`NUM_EXPERIMENTS`].
//! - a device cursor grows by one per experiment the device is active in, so at the end it equals
//!   the number of 1-bits in the device's mask.

use indexmap::IndexMap;

use crate::device::NUM_EXPERIMENTS;
use crate::error::*;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SweepState {
    all: usize,
    per_device: IndexMap<String, usize>,
}

impl SweepState {
    /// Initial state: every counter at zero.
    pub fn new<'a>(device_names: impl IntoIterator<Item = &'a str>) -> Self {
        Self {
            all: 0,
            per_device: device_names
                .into_iter()
                .map(|name| (name.to_string(), 0))
                .collect(),
        }
    }

    /// 0-based position of the next experiment to compile.
    pub fn all(&self) -> usize {
        self.all
    }

    pub fn is_finished(&self) -> bool {
        self.all >= NUM_EXPERIMENTS
    }

    /// Row cursor of a device: the buffer row its next active experiment writes to.
    pub fn device_index(&self, name: &str) -> SweepResult<usize> {
        self.per_device.get(name).copied().ok_or_else(|| {
            SweepError::config(format!(
                "Device {} is not tracked by the sweep state. Tracked devices are {:?}",
                name,
                self.per_device.keys().collect::<Vec<_>>()
            ))
        })
    }

    pub fn device_indices(&self) -> &IndexMap<String, usize> {
        &self.per_device
    }

    pub(crate) fn advance_device(&mut self, name: &str) -> SweepResult<()> {
        let cursor = self.device_index(name)?;
        // Existing key: keeps its position in the map
        self.per_device.insert(name.to_string(), cursor + 1);
        Ok(())
    }

    pub(crate) fn advance_all(&mut self) -> SweepResult<()> {
        if self.is_finished() {
            return Err(SweepError::StateExhausted { index: self.all });
        }
        self.all += 1;
        Ok(())
    }
}

#[cfg(test)]
mod test {
    use crate::error::*;
    use crate::state::*;

    #[test]
    fn starts_at_zero() {
        let state = SweepState::new(["A", "B"]);
        assert_eq!(state.all(), 0);
        assert_eq!(state.device_index("A").unwrap(), 0);
        assert_eq!(state.device_index("B").unwrap(), 0);
        assert!(state.device_index("C").is_err());
        assert!(!state.is_finished());
    }

    #[test]
    fn global_counter_stops_after_last_experiment() {
        let mut state = SweepState::new(["A"]);
        for _ in 0..NUM_EXPERIMENTS {
            state.advance_all().unwrap();
        }
        assert!(state.is_finished());
        assert!(matches!(
            state.advance_all().unwrap_err(),
            SweepError::StateExhausted { index: 7 }
        ));
    }

    #[test]
    fn device_cursor_advances_independently() {
        let mut state = SweepState::new(["A", "B"]);
        state.advance_device("B").unwrap();
        state.advance_device("B").unwrap();
        assert_eq!(state.device_index("A").unwrap(), 0);
        assert_eq!(state.device_index("B").unwrap(), 2);
        assert!(state.advance_device("C").is_err());
    }
}
