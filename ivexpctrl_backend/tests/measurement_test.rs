use std::cell::Cell;
use std::rc::Rc;

use maplit::hashmap;
use ndarray::{Array2, ArrayView2, Axis};

use ivcompiler_backend::*;
use ivexpctrl_backend::*;

/// Scripted driver: scales every channel by its column number plus one, can fail on a given call.
struct ScriptedDriver {
    calls: Rc<Cell<usize>>,
    closes: Rc<Cell<usize>>,
    fail_on_call: Option<usize>,
    fail_close: bool,
}

impl ScriptedDriver {
    fn new(calls: &Rc<Cell<usize>>, closes: &Rc<Cell<usize>>) -> Self {
        Self {
            calls: calls.clone(),
            closes: closes.clone(),
            fail_on_call: None,
            fail_close: false,
        }
    }
}

impl MeasurementDriver for ScriptedDriver {
    fn forward(&mut self, stimulus: ArrayView2<f64>) -> SweepResult<Array2<f64>> {
        let call = self.calls.get();
        self.calls.set(call + 1);
        if self.fail_on_call == Some(call) {
            return Err(SweepError::driver("instrument timed out"));
        }
        let mut response = stimulus.to_owned();
        for (col, mut column) in response.axis_iter_mut(Axis(1)).enumerate() {
            column.mapv_inplace(|v| v * (col + 1) as f64);
        }
        Ok(response)
    }

    fn close(&mut self) -> SweepResult<()> {
        self.closes.set(self.closes.get() + 1);
        if self.fail_close {
            Err(SweepError::driver("instrument did not release"))
        } else {
            Ok(())
        }
    }
}

fn measurement() -> IvMeasurement {
    let setups = hashmap! {
        "A" => ([1u8, 0, 1, 0, 0, 0, 0], [Some([1.0, -1.0]), None, Some([0.5, -0.5]), None, None, None, None]),
        "B" => ([0u8, 1, 0, 0, 0, 0, 0], [None, Some([1.2, -0.7]), None, None, None, None, None]),
    };
    let mut measurement = IvMeasurement::new(SweepSettings {
        shape: 10,
        signal_type: SignalType::Sawtooth,
        direction: Direction::Up,
        samp_rate: 1000.0,
    });
    for name in ["A", "B"] {
        let (mask, ranges) = &setups[name];
        measurement
            .add_device(Device::from_setup(name, mask, ranges).unwrap())
            .unwrap();
    }
    measurement
}

#[test]
fn responses_are_attributed_by_column() {
    let calls = Rc::new(Cell::new(0));
    let closes = Rc::new(Cell::new(0));
    let run = measurement()
        .run_test(ScriptedDriver::new(&calls, &closes))
        .unwrap();
    assert_eq!(calls.get(), NUM_EXPERIMENTS);
    assert_eq!(closes.get(), 1);

    // Columns: A rows 0 and 1, then B row 0. Column c is scaled by c + 1.
    let results = &run.results;
    let a_iv1 = results.input("IV1", "A").unwrap();
    assert_eq!(results.output("IV1", "A").unwrap(), a_iv1.mapv(|v| v * 1.0));
    let a_iv3 = results.input("IV3", "A").unwrap();
    assert_eq!(results.output("IV3", "A").unwrap(), a_iv3.mapv(|v| v * 2.0));
    let b_iv2 = results.input("IV2", "B").unwrap();
    assert_eq!(results.output("IV2", "B").unwrap(), b_iv2.mapv(|v| v * 3.0));

    assert_eq!(results.experiments_for_device("A"), vec!["IV1", "IV3"]);
    assert_eq!(results.experiments_for_device("B"), vec!["IV2"]);
    for label in ["IV4", "IV5", "IV6", "IV7"] {
        assert!(results.output(label, "A").is_none());
        assert!(results.output(label, "B").is_none());
    }
    assert_eq!(run.state.device_index("A").unwrap(), 2);
    assert_eq!(run.state.device_index("B").unwrap(), 1);
}

#[test]
fn driver_failure_aborts_and_closes_once() {
    let calls = Rc::new(Cell::new(0));
    let closes = Rc::new(Cell::new(0));
    let mut driver = ScriptedDriver::new(&calls, &closes);
    driver.fail_on_call = Some(2);
    let err = measurement().run_test(driver).unwrap_err();
    assert!(matches!(err, SweepError::DriverFailure(ref msg) if msg == "instrument timed out"));
    // No retry and no further experiment
    assert_eq!(calls.get(), 3);
    assert_eq!(closes.get(), 1);
}

#[test]
fn close_failure_after_abort_keeps_original_error() {
    let calls = Rc::new(Cell::new(0));
    let closes = Rc::new(Cell::new(0));
    let mut driver = ScriptedDriver::new(&calls, &closes);
    driver.fail_on_call = Some(0);
    driver.fail_close = true;
    let err = measurement().run_test(driver).unwrap_err();
    assert!(matches!(err, SweepError::DriverFailure(ref msg) if msg == "instrument timed out"));
    assert_eq!(closes.get(), 1);
}

#[test]
fn close_failure_after_success_is_reported() {
    let calls = Rc::new(Cell::new(0));
    let closes = Rc::new(Cell::new(0));
    let mut driver = ScriptedDriver::new(&calls, &closes);
    driver.fail_close = true;
    let err = measurement().run_test(driver).unwrap_err();
    assert!(matches!(err, SweepError::DriverFailure(ref msg) if msg == "instrument did not release"));
    assert_eq!(calls.get(), NUM_EXPERIMENTS);
    assert_eq!(closes.get(), 1);
}

#[test]
fn invalid_configuration_never_reaches_the_driver() {
    let calls = Rc::new(Cell::new(0));
    let closes = Rc::new(Cell::new(0));
    let mut measurement = IvMeasurement::new(SweepSettings {
        shape: 10,
        signal_type: SignalType::Sawtooth,
        direction: Direction::Up,
        samp_rate: 1000.0,
    });
    let mut ranges = vec![None; NUM_EXPERIMENTS];
    ranges[3] = Some([0.4, 0.4]);
    measurement
        .add_device(Device::from_setup("C", &[0, 0, 0, 1, 0, 0, 0], &ranges).unwrap())
        .unwrap();
    let err = measurement
        .run_test(ScriptedDriver::new(&calls, &closes))
        .unwrap_err();
    assert!(matches!(err, SweepError::InvalidConfiguration(_)));
    assert_eq!(calls.get(), 0);
    assert_eq!(closes.get(), 1);
}

/// Returns one sample too few.
struct TruncatingDriver;

impl MeasurementDriver for TruncatingDriver {
    fn forward(&mut self, stimulus: ArrayView2<f64>) -> SweepResult<Array2<f64>> {
        Ok(Array2::zeros((stimulus.nrows() - 1, stimulus.ncols())))
    }
    fn close(&mut self) -> SweepResult<()> {
        Ok(())
    }
}

#[test]
fn response_shape_mismatch_is_a_driver_failure() {
    let err = measurement().run_test(TruncatingDriver).unwrap_err();
    assert!(matches!(err, SweepError::DriverFailure(_)));
}

#[test]
fn simulated_run_from_config() {
    let config = SweepConfig::from_json_str(
        r#"{
            "devices": ["A"],
            "shape": 8,
            "input_signal": {"input_signal_type": "sine", "direction": "up"},
            "driver": {
                "sampling_frequency": 800.0,
                "instruments_setup": {
                    "A": {
                        "activation_channel_mask": [1, 1, 1, 1, 1, 1, 1],
                        "activation_voltage_ranges": [[0, 1], [0, 1], [0, 1], [0, 1], [0, 1], [0, 1], [0, 2]]
                    }
                },
                "simulation": {"resistance": 1000.0}
            }
        }"#,
    )
    .unwrap();
    let measurement = IvMeasurement::from_config(&config).unwrap();
    let driver = SimulatedDriver::new(config.driver.simulation.resistance).unwrap();
    let run = measurement.run_test(driver).unwrap();

    let input = run.results.input("IV7", "A").unwrap();
    let output = run.results.output("IV7", "A").unwrap();
    // Quarter period of a 2 V sine through 1 kOhm: 2 mA
    assert!((input[2] - 2.0).abs() < 1e-12);
    assert!((output[2] - 2e6).abs() < 1e-3);
    assert_eq!(input[7], 0.0);
    assert_eq!(output[7], 0.0);
    let exported = run.results.to_json();
    assert_eq!(exported["outputs"]["IV1"]["A"].as_array().unwrap().len(), 8);
}
