use ivcompiler_backend::*;
use maplit::hashmap;

fn sawtooth_settings(shape: usize) -> SweepSettings {
    SweepSettings {
        shape,
        signal_type: SignalType::Sawtooth,
        direction: Direction::Up,
        samp_rate: 1000.0,
    }
}

fn two_device_sweep() -> Sweep {
    let mut sweep = Sweep::new(sawtooth_settings(10));
    let mut a_ranges = vec![None; NUM_EXPERIMENTS];
    a_ranges[0] = Some([1.0, -1.0]);
    a_ranges[2] = Some([0.5, -0.5]);
    let mut b_ranges = vec![None; NUM_EXPERIMENTS];
    b_ranges[1] = Some([1.2, -0.7]);
    sweep
        .add_device(Device::from_setup("A", &[1, 0, 1, 0, 0, 0, 0], &a_ranges).unwrap())
        .unwrap();
    sweep
        .add_device(Device::from_setup("B", &[0, 1, 0, 0, 0, 0, 0], &b_ranges).unwrap())
        .unwrap();
    sweep
}

#[test]
fn masks_select_participants_per_experiment() {
    let sweep = two_device_sweep();
    sweep.validate().unwrap();
    assert_eq!(sweep.total_channels(), 3);

    let (state, compiled) = sweep.compile_all().unwrap();
    let participants: Vec<Vec<&str>> = compiled.iter().map(|exp| exp.participants()).collect();
    assert_eq!(participants[0], vec!["A"]);
    assert_eq!(participants[1], vec!["B"]);
    assert_eq!(participants[2], vec!["A"]);
    for exp in &compiled[3..] {
        assert!(exp.participants().is_empty(), "{}", exp.label());
    }
    for (exp_idx, exp) in compiled.iter().enumerate() {
        assert_eq!(sweep.devices_in_experiment(exp_idx), exp.participants());
        assert_eq!(exp.stimulus().dim(), (10, 3));
    }

    // A's IV3 waveform sits in A's second row, i.e. column 1
    let iv3 = &compiled[2];
    assert_eq!(iv3.label(), "IV3");
    let expected = generate_sawtooth(VoltageRange::new(0.5, -0.5), 10, Direction::Up).unwrap();
    assert_eq!(iv3.stimulus().column(1).to_owned(), expected);
    assert!(iv3.stimulus().column(0).iter().all(|&v| v == 0.0));
    assert!(iv3.stimulus().column(2).iter().all(|&v| v == 0.0));

    assert_eq!(state.all(), NUM_EXPERIMENTS);
    assert_eq!(state.device_index("A").unwrap(), 2);
    assert_eq!(state.device_index("B").unwrap(), 1);
}

#[test]
fn all_ones_mask_produces_seven_waveforms() {
    let mut sweep = Sweep::new(sawtooth_settings(10));
    let ranges = vec![Some([1.0, -1.0]); NUM_EXPERIMENTS];
    sweep
        .add_device(Device::from_setup("A", &[1; NUM_EXPERIMENTS], &ranges).unwrap())
        .unwrap();
    sweep.validate().unwrap();

    let (state, compiled) = sweep.compile_all().unwrap();
    assert_eq!(compiled.len(), NUM_EXPERIMENTS);
    let labels: Vec<&str> = compiled.iter().map(|exp| exp.label()).collect();
    assert_eq!(labels, experiment_labels());
    for (exp_idx, exp) in compiled.iter().enumerate() {
        let wave = &exp.inputs()["A"];
        assert_eq!(wave.len(), 10);
        assert_eq!(wave[0], 0.0);
        assert_eq!(wave[9], 0.0);
        assert_eq!(exp.participant("A").unwrap().column, exp_idx);
    }
    assert_eq!(state.device_index("A").unwrap(), NUM_EXPERIMENTS);
}

#[test]
fn echoed_response_splits_back_to_inputs() {
    let sweep = two_device_sweep();
    let mut results = SweepResults::new();
    let mut state = sweep.initial_state();
    while !state.is_finished() {
        let (next, exp) = sweep.compile_experiment(state).unwrap();
        let response = exp.stimulus().mapv(|v| 2.0 * v);
        let outputs = exp.split_response(response.view()).unwrap();
        for (name, input) in exp.inputs() {
            results
                .record(exp.label(), &name, input, outputs[&name].clone())
                .unwrap();
        }
        state = next;
    }
    assert_eq!(results.experiments_for_device("A"), vec!["IV1", "IV3"]);
    assert_eq!(results.experiments_for_device("B"), vec!["IV2"]);
    let input = results.input("IV2", "B").unwrap();
    let output = results.output("IV2", "B").unwrap();
    assert_eq!(output.to_owned(), input.mapv(|v| 2.0 * v));
    assert!(results.output("IV4", "A").is_none());
}

#[test]
fn sine_sweep_ends_every_waveform_at_rest() {
    let mut sweep = Sweep::new(SweepSettings {
        shape: 64,
        signal_type: SignalType::Sine,
        direction: Direction::Down,
        samp_rate: 6400.0,
    });
    let ranges = vec![Some([0.0, 0.8]); NUM_EXPERIMENTS];
    sweep
        .add_device(Device::from_setup("A", &[1, 1, 0, 0, 0, 0, 1], &ranges).unwrap())
        .unwrap();
    sweep.validate().unwrap();
    let (_state, compiled) = sweep.compile_all().unwrap();
    for exp in compiled.iter().filter(|exp| !exp.participants().is_empty()) {
        let wave = &exp.inputs()["A"];
        assert_eq!(wave[63], 0.0);
        assert!((wave[16] - 0.8).abs() < 1e-12);
    }
}

#[test]
fn invalid_configurations_fail_before_compiling() {
    let setups = hashmap! {
        "short mask" => (vec![1u8, 0, 1], vec![Some([1.0, -1.0]); NUM_EXPERIMENTS]),
        "bad flag" => (vec![1u8, 0, 3, 0, 0, 0, 0], vec![Some([1.0, -1.0]); NUM_EXPERIMENTS]),
        "missing range" => (vec![1u8, 1, 0, 0, 0, 0, 0], vec![Some([1.0, -1.0]), None, None, None, None, None, None]),
        "six ranges" => (vec![1u8, 0, 0, 0, 0, 0, 0], vec![Some([1.0, -1.0]); 6]),
    };
    for (case, (mask, ranges)) in setups {
        assert!(
            matches!(
                Device::from_setup("A", &mask, &ranges),
                Err(SweepError::InvalidConfiguration(_))
            ),
            "{}",
            case
        );
    }

    let mut sweep = Sweep::new(sawtooth_settings(0));
    let ranges = vec![Some([1.0, -1.0]); NUM_EXPERIMENTS];
    sweep
        .add_device(Device::from_setup("A", &[1, 0, 0, 0, 0, 0, 0], &ranges).unwrap())
        .unwrap();
    assert!(matches!(
        sweep.validate(),
        Err(SweepError::InvalidConfiguration(_))
    ));
}

#[test]
fn sweep_from_json_config() {
    let config = SweepConfig::from_json_str(
        r#"{
            "devices": ["A", "B"],
            "shape": 10,
            "input_signal": {"input_signal_type": "sawtooth", "direction": "up"},
            "driver": {
                "sampling_frequency": 1000.0,
                "instruments_setup": {
                    "A": {
                        "activation_channel_mask": [1, 0, 1, 0, 0, 0, 0],
                        "activation_voltage_ranges": [[1.0, -1.0], null, [0.5, -0.5], null, null, null, null]
                    },
                    "B": {
                        "activation_channel_mask": [0, 1, 0, 0, 0, 0, 0],
                        "activation_voltage_ranges": [null, [1.2, -0.7], null, null, null, null, null]
                    }
                }
            }
        }"#,
    )
    .unwrap();
    let from_config = Sweep::from_config(&config).unwrap();
    let by_hand = two_device_sweep();
    assert_eq!(from_config.device_names(), by_hand.device_names());
    assert_eq!(from_config.settings(), by_hand.settings());

    let (_, a) = from_config.compile_all().unwrap();
    let (_, b) = by_hand.compile_all().unwrap();
    for (left, right) in a.iter().zip(b.iter()) {
        assert_eq!(left.stimulus(), right.stimulus());
    }
}
