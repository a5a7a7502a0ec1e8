//! Provides the stimulus waveform synthesizers used by IV sweeps.
//!
//! ## Main Structures and Enumerations:
//!
//! - [`Direction`]: sweep direction of the piecewise-linear waveform (`"up"` or `"down"`).
//!
//! - [`SignalType`]: which synthesizer an IV sweep uses (`"sawtooth"` or `"sine"`).
//!
//! - [`VoltageRange`]: the `(v0, v1)` pair an electrode is swept through.
//!
//! - [`Waveform`]: a single channel's stimulus description. It can be evaluated into a fresh array
//!   or in-place into a buffer row.
//!
//! ## Synthesizers:
//!
//! - [`generate_sawtooth`]: three connected linear ramps `0 -> v0 -> v1 -> 0` (mirrored for
//!   [`Direction::Down`]), with the ramp lengths chosen so the voltage step stays roughly constant.
//!
//! - [`generate_sinewave`]: exactly one sine period over the requested number of samples.
//!
//! Both synthesizers are pure: identical arguments give bit-identical output.

use std::f64::consts::PI;
use std::fmt;
use std::str::FromStr;

use ndarray::{Array1, ArrayViewMut1};

use crate::error::*;

/// Absorbs floating-point error when truncating proportional ramp lengths,
/// e.g. `2.9999999999` samples is treated as 3.
const ROUNDING_SLACK: f64 = 1e-9;

/// Direction of the piecewise-linear sweep.
///
/// - `Up`: `0 -> v0 -> v1 -> 0`
/// - `Down`: `0 -> v1 -> v0 -> 0`
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Direction {
    Up,
    Down,
}
impl FromStr for Direction {
    type Err = SweepError;

    fn from_str(s: &str) -> SweepResult<Self> {
        match s {
            "up" => Ok(Direction::Up),
            "down" => Ok(Direction::Down),
            other => Err(SweepError::config(format!(
                "Unrecognized sweep direction '{}', expected 'up' or 'down'",
                other
            ))),
        }
    }
}
impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(
            f,
            "{}",
            match self {
                Direction::Up => "up",
                Direction::Down => "down",
            }
        )
    }
}

/// Synthesizer selected for an IV sweep.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SignalType {
    Sawtooth,
    Sine,
}
impl FromStr for SignalType {
    type Err = SweepError;

    fn from_str(s: &str) -> SweepResult<Self> {
        match s {
            "sawtooth" => Ok(SignalType::Sawtooth),
            "sine" => Ok(SignalType::Sine),
            other => Err(SweepError::config(format!(
                "Unrecognized input signal type '{}', expected 'sawtooth' or 'sine'",
                other
            ))),
        }
    }
}
impl fmt::Display for SignalType {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(
            f,
            "{}",
            match self {
                SignalType::Sawtooth => "sawtooth",
                SignalType::Sine => "sine",
            }
        )
    }
}

/// Voltage pair `(v0, v1)` swept by one electrode in one experiment.
///
/// The ordering of the two values does not encode the ramp direction, [`Direction`] does.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct VoltageRange {
    pub v0: f64,
    pub v1: f64,
}
impl VoltageRange {
    pub fn new(v0: f64, v1: f64) -> Self {
        Self { v0, v1 }
    }

    /// A range with equal endpoints cannot be swept by the piecewise-linear synthesizer.
    pub fn is_degenerate(&self) -> bool {
        self.v0 == self.v1
    }
}
impl From<[f64; 2]> for VoltageRange {
    fn from(pair: [f64; 2]) -> Self {
        VoltageRange::new(pair[0], pair[1])
    }
}
impl From<(f64, f64)> for VoltageRange {
    fn from(pair: (f64, f64)) -> Self {
        VoltageRange::new(pair.0, pair.1)
    }
}
impl fmt::Display for VoltageRange {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "({} V, {} V)", self.v0, self.v1)
    }
}

/// Linear ramp of `n` samples from `from` to `to`, both endpoints included.
///
/// The last sample is pinned to `to` so ramps meet (and return to rest) exactly.
fn ramp(from: f64, to: f64, n: usize) -> Array1<f64> {
    let mut seg = Array1::linspace(from, to, n);
    if n > 1 {
        seg[n - 1] = to;
    }
    seg
}

/// Ramp back to rest. A single-sample closing ramp can only hold one point: the rest level.
fn closing_ramp(from: f64, n: usize) -> Array1<f64> {
    if n == 1 {
        Array1::zeros(1)
    } else {
        ramp(from, 0.0, n)
    }
}

/// Splits `budget` samples between the opening (`0 -> start`) and closing (`end -> 0`) ramps.
///
/// Each ramp gets a share proportional to the voltage it covers, truncated. For ranges straddling
/// zero this is `half * |v| / |v0 - v1|`. Ramps towards a non-zero endpoint keep at least one sample.
/// The sum is `budget` or `budget - 1`.
fn outer_ramp_lengths(budget: usize, start: f64, end: f64) -> (usize, usize) {
    let span = start.abs() + end.abs();
    let share = |v: f64| (budget as f64 * v.abs() / span + ROUNDING_SLACK).floor() as usize;

    let mut opening = share(start);
    let mut closing = share(end);
    if start != 0.0 {
        opening = opening.max(1);
    }
    if end != 0.0 {
        closing = closing.max(1);
    }
    while opening + closing > budget {
        if opening > closing {
            opening -= 1;
        } else {
            closing -= 1;
        }
    }
    (opening, closing)
}

/// Shortest sawtooth that can rest at both ends: a pinned two-sample middle ramp `[start, end]`
/// plus one rest sample on each side.
pub const MIN_SAWTOOTH_POINTS: usize = 4;

/// Generates the piecewise-linear ("sawtooth") IV sweep waveform.
///
/// The waveform consists of three linear ramps: `0 -> v0`, `v0 -> v1` and `v1 -> 0` for
/// [`Direction::Up`], or `0 -> v1`, `v1 -> v0` and `v0 -> 0` for [`Direction::Down`].
/// The middle ramp receives exactly `n_points / 2` samples, the outer ramps share the rest in
/// proportion to the voltage they cover. When truncation leaves the waveform one sample short,
/// a single trailing zero is appended.
///
/// # Errors
///
/// - [`SweepError::InvalidConfiguration`] when `n_points < MIN_SAWTOOTH_POINTS`, when the range
///   is degenerate (`v0 == v1`) or contains non-finite values.
/// - [`SweepError::LengthInvariantViolation`] if the ramps miss `n_points` by more than one sample.
///
/// # Examples
///
/// ```
/// use ivcompiler_backend::waveform::*;
///
/// let wave = generate_sawtooth(VoltageRange::new(1.0, -1.0), 10, Direction::Up).unwrap();
/// assert_eq!(wave.len(), 10);
/// assert_eq!(wave.to_vec(), vec![0.0, 1.0, 1.0, 0.5, 0.0, -0.5, -1.0, -1.0, 0.0, 0.0]);
///
/// // Degenerate ranges are rejected instead of producing NaN
/// assert!(generate_sawtooth(VoltageRange::new(0.5, 0.5), 10, Direction::Up).is_err());
/// // Too short to rest at both ends and still cover the range
/// assert!(generate_sawtooth(VoltageRange::new(1.0, -1.0), 3, Direction::Up).is_err());
/// ```
pub fn generate_sawtooth(
    input_range: VoltageRange,
    n_points: usize,
    direction: Direction,
) -> SweepResult<Array1<f64>> {
    if n_points < MIN_SAWTOOTH_POINTS {
        return Err(SweepError::config(format!(
            "Sawtooth waveform requires n_points >= {}, got {}",
            MIN_SAWTOOTH_POINTS, n_points
        )));
    }
    if !input_range.v0.is_finite() || !input_range.v1.is_finite() {
        return Err(SweepError::config(format!(
            "Voltage range {} contains non-finite values",
            input_range
        )));
    }
    if input_range.is_degenerate() {
        return Err(SweepError::config(format!(
            "Voltage range {} has equal endpoints and cannot be swept",
            input_range
        )));
    }

    let (start, end) = match direction {
        Direction::Up => (input_range.v0, input_range.v1),
        Direction::Down => (input_range.v1, input_range.v0),
    };
    let middle = n_points / 2;
    let (opening, closing) = outer_ramp_lengths(n_points - middle, start, end);

    let mut samples: Vec<f64> = Vec::with_capacity(n_points);
    samples.extend(ramp(0.0, start, opening).iter());
    samples.extend(ramp(start, end, middle).iter());
    samples.extend(closing_ramp(end, closing).iter());

    // Truncation may leave us one sample short: close with an extra rest sample
    if samples.len() + 1 == n_points {
        samples.push(0.0);
    }
    if samples.len() != n_points {
        return Err(SweepError::LengthInvariantViolation {
            expected: n_points,
            actual: samples.len(),
        });
    }
    Ok(Array1::from(samples))
}

/// Generates exactly one period of a sine wave sampled at `samp_rate`.
///
/// The per-call frequency is `samp_rate / n_points`, the time values are `i / samp_rate` for
/// `i in 0..n_points` (evenly spaced in `[0, 1/f)`), and the output is
/// `amplitude * sin(2*pi*f*t + phase)`.
///
/// # Examples
///
/// ```
/// use ivcompiler_backend::waveform::*;
///
/// let wave = generate_sinewave(100, 1000.0, 2.0, 0.0).unwrap();
/// assert_eq!(wave.len(), 100);
/// assert_eq!(wave[0], 0.0);
/// assert!((wave[25] - 2.0).abs() < 1e-12);
/// ```
pub fn generate_sinewave(
    n_points: usize,
    samp_rate: f64,
    amplitude: f64,
    phase: f64,
) -> SweepResult<Array1<f64>> {
    if n_points == 0 {
        return Err(SweepError::config("Sine waveform requires n_points > 0"));
    }
    if !(samp_rate.is_finite() && samp_rate > 0.0) {
        return Err(SweepError::config(format!(
            "Sine waveform requires a positive sample frequency, got {}",
            samp_rate
        )));
    }
    let freq = samp_rate / n_points as f64;
    let mut wave = Array1::from_shape_fn(n_points, |i| i as f64 / samp_rate);
    wave.map_inplace(|t| *t = (2.0 * PI * freq * (*t) + phase).sin() * amplitude);
    Ok(wave)
}

/// Stimulus description of a single channel.
///
/// - `Sawtooth`: evaluated with [`generate_sawtooth`]
/// - `Sine`: evaluated with [`generate_sinewave`]
#[derive(Clone, Debug, PartialEq)]
pub enum Waveform {
    Sawtooth {
        range: VoltageRange,
        direction: Direction,
    },
    Sine {
        amplitude: f64,
        phase: f64,
        samp_rate: f64,
    },
}
impl Waveform {
    pub fn new_sawtooth(range: VoltageRange, direction: Direction) -> Self {
        Waveform::Sawtooth { range, direction }
    }

    /// Constructs a sine waveform; `phase` defaults to `0.0`.
    pub fn new_sine(amplitude: f64, phase: Option<f64>, samp_rate: f64) -> Self {
        Waveform::Sine {
            amplitude,
            phase: phase.unwrap_or(0.0),
            samp_rate,
        }
    }

    /// Synthesizes `n_points` samples of this waveform.
    pub fn eval(&self, n_points: usize) -> SweepResult<Array1<f64>> {
        match *self {
            Waveform::Sawtooth { range, direction } => {
                generate_sawtooth(range, n_points, direction)
            }
            Waveform::Sine {
                amplitude,
                phase,
                samp_rate,
            } => generate_sinewave(n_points, samp_rate, amplitude, phase),
        }
    }

    /// Evaluates the waveform over the full length of `buffer` and writes it in place.
    ///
    /// # Examples
    ///
    /// ```
    /// use ndarray::Array2;
    /// use ivcompiler_backend::waveform::*;
    ///
    /// let mut buffer = Array2::<f64>::zeros((2, 8));
    /// let wfrm = Waveform::new_sawtooth(VoltageRange::new(-0.5, 0.5), Direction::Up);
    /// wfrm.eval_inplace(&mut buffer.row_mut(1)).unwrap();
    /// assert!(buffer.row(0).iter().all(|&v| v == 0.0));
    /// assert_eq!(buffer[[1, 0]], 0.0);
    /// ```
    pub fn eval_inplace(&self, buffer: &mut ArrayViewMut1<f64>) -> SweepResult<()> {
        let wave = self.eval(buffer.len())?;
        if wave.len() != buffer.len() {
            return Err(SweepError::LengthInvariantViolation {
                expected: buffer.len(),
                actual: wave.len(),
            });
        }
        buffer.assign(&wave);
        Ok(())
    }
}
impl fmt::Display for Waveform {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Waveform::Sawtooth { range, direction } => {
                write!(f, "[SAWTOOTH, {{range: {}, direction: {}}}]", range, direction)
            }
            Waveform::Sine {
                amplitude,
                phase,
                samp_rate,
            } => write!(
                f,
                "[SINE, {{amplitude: {}, phase: {}, samp_rate: {}}}]",
                amplitude, phase, samp_rate
            ),
        }
    }
}
