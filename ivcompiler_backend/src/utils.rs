// Small helpers shared by the compiler and the experiment-control crates
use std::time::Instant;

use once_cell::sync::OnceCell;
use regex::Regex;

use crate::device::NUM_EXPERIMENTS;
use crate::error::*;

/// Label of the experiment at 0-based position `exp_idx`, e.g. `IV1` for 0.
pub fn experiment_label(exp_idx: usize) -> String {
    format!("IV{}", exp_idx + 1)
}

/// All experiment labels in sweep order.
pub fn experiment_labels() -> Vec<String> {
    (0..NUM_EXPERIMENTS).map(experiment_label).collect()
}

/// Parses an experiment label (`IV1` to `IV7`) back to its 0-based position.
///
/// ```
/// use ivcompiler_backend::utils::*;
///
/// assert_eq!(parse_experiment_label("IV3").unwrap(), 2);
/// assert!(parse_experiment_label("IV8").is_err());
/// ```
pub fn parse_experiment_label(label: &str) -> SweepResult<usize> {
    static LABEL_RE: OnceCell<Regex> = OnceCell::new();
    let re = LABEL_RE.get_or_try_init(|| {
        Regex::new(r"^IV(\d+)$").map_err(|e| SweepError::config(e.to_string()))
    })?;
    let number = re
        .captures(label)
        .and_then(|caps| caps[1].parse::<usize>().ok())
        .filter(|&n| (1..=NUM_EXPERIMENTS).contains(&n))
        .ok_or_else(|| {
            SweepError::config(format!(
                "Expecting experiment labels of format 'IV(1-{})' yet received {}",
                NUM_EXPERIMENTS, label
            ))
        })?;
    Ok(number - 1)
}

// Utility class for time-tracking
pub struct TickTimer {
    last: Instant,
}

impl TickTimer {
    pub fn new() -> Self {
        Self {
            last: Instant::now(),
        }
    }

    /// Milliseconds since construction or the previous tick.
    pub fn tick(&mut self) -> f64 {
        let now = Instant::now();
        let diff = now.duration_since(self.last).as_secs_f64() * 1e3;
        self.last = now;
        diff
    }

    pub fn tick_log(&mut self, msg: &str) -> f64 {
        let diff = self.tick();
        log::debug!("{}: {:.3} ms", msg, diff);
        diff
    }
}

impl Default for TickTimer {
    fn default() -> Self {
        Self::new()
    }
}
