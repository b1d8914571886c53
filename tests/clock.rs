use leapsim::clock::{SimConfig, SimulationState, TimeSimulator, Timestamp};
use std::path::PathBuf;
use std::time::Duration;

const LEAP: i64 = 1_435_708_800;

fn tests_data_dir() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("tests/data")
}

fn ts(seconds: i64, nanos: u32) -> Timestamp {
    Timestamp::new(seconds, nanos)
}

#[test]
fn offset_is_computed_on_first_tick_only() {
    let simulator = TimeSimulator::new(LEAP, 30);
    let mut state = SimulationState::new();
    assert_eq!(state.accumulated_offset(), None);

    // Reference clock: seconds since boot.
    let start = 5_000;
    simulator.tick(&mut state, ts(start, 0), ts(LEAP - 30, 0));
    let expected = LEAP - 30 - start;
    assert_eq!(state.accumulated_offset(), Some(expected));

    for i in 1..20 {
        simulator.tick(&mut state, ts(start + i, 250_000_000), ts(LEAP - 30 + i, 0));
        assert_eq!(state.accumulated_offset(), Some(expected));
        assert!(state.leap_pending());
    }
}

#[test]
fn offset_of_zero_is_still_initialized() {
    // Reference already reads exactly lead seconds before the leap.
    let simulator = TimeSimulator::new(LEAP, 10);
    let mut state = SimulationState::new();
    simulator.tick(&mut state, ts(LEAP - 10, 0), ts(LEAP - 10, 0));
    assert_eq!(state.accumulated_offset(), Some(0));

    // A later tick must not recompute it from the new reading.
    simulator.tick(&mut state, ts(LEAP - 7, 0), ts(LEAP - 7, 0));
    assert_eq!(state.accumulated_offset(), Some(0));
}

#[test]
fn leap_second_is_inserted_exactly_once() {
    let simulator = TimeSimulator::new(LEAP, 5);
    let mut state = SimulationState::new();
    let start = 100;
    simulator.tick(&mut state, ts(start, 0), ts(0, 0));
    let initial = state.accumulated_offset().unwrap();

    let mut transitions = 0;
    let mut was_pending = state.leap_pending();
    for i in 1..100 {
        simulator.tick(&mut state, ts(start + i, 0), ts(0, 0));
        if was_pending && !state.leap_pending() {
            transitions += 1;
        }
        assert!(was_pending || !state.leap_pending(), "leap became pending again");
        was_pending = state.leap_pending();
    }
    assert_eq!(transitions, 1);
    assert_eq!(state.accumulated_offset(), Some(initial - 1));
}

#[test]
fn leap_flag_is_reported_on_transition_tick() {
    let simulator = TimeSimulator::new(LEAP, 2);
    let mut state = SimulationState::new();

    let flags: Vec<(bool, i64)> = (0..5)
        .map(|i| {
            let sample = simulator.tick(&mut state, ts(i, 0), ts(LEAP - 2 + i, 0));
            (sample.leap_pending, sample.simulated.seconds)
        })
        .collect();

    assert_eq!(
        flags,
        vec![
            (true, LEAP - 2),
            (true, LEAP - 1),
            // Reaches the target: leap still announced, second inserted.
            (true, LEAP - 1),
            (false, LEAP),
            (false, LEAP + 1),
        ]
    );
}

#[test]
fn end_to_end_offset_shifts_by_one_second() {
    let simulator = TimeSimulator::new(LEAP, 10);
    let mut state = SimulationState::new();

    // Both clocks start at leap_target - 10 and advance together.
    let start = LEAP - 10;
    let first = simulator.tick(&mut state, ts(start, 400_000_000), ts(start, 400_000_000));
    assert!(first.leap_pending);
    assert!(first.offset.abs() < 1e-9);

    let mut samples = vec![first];
    for i in 1..=12 {
        samples.push(simulator.tick(
            &mut state,
            ts(start + i, 400_000_000),
            ts(start + i, 400_000_000),
        ));
    }

    // Tick 10 is where reference + offset reaches the target.
    for sample in &samples[..10] {
        assert!(sample.leap_pending);
        assert!(sample.offset.abs() < 1e-9);
    }
    assert!(samples[10].leap_pending);
    assert!((samples[10].offset + 1.0).abs() < 1e-9);
    for sample in &samples[11..] {
        assert!(!sample.leap_pending);
        assert!((sample.offset + 1.0).abs() < 1e-9);
    }
}

#[test]
fn sub_second_part_is_passed_through() {
    let simulator = TimeSimulator::new(LEAP, 100);
    let mut state = SimulationState::new();
    let sample = simulator.tick(&mut state, ts(42, 987_654_321), ts(LEAP - 100, 987_654_000));
    assert_eq!(sample.simulated, ts(LEAP - 100, 987_654_321));
    assert!((sample.offset - 321e-9).abs() < 1e-12);
}

#[test]
fn backward_reference_is_trusted() {
    let simulator = TimeSimulator::new(LEAP, 1);
    let mut state = SimulationState::new();
    simulator.tick(&mut state, ts(10, 0), ts(0, 0));
    let sample = simulator.tick(&mut state, ts(9, 0), ts(0, 0));
    assert_eq!(sample.simulated.seconds, LEAP - 2);
    assert!(state.leap_pending());
}

#[test]
fn config_defaults() {
    let config = SimConfig::default();
    assert_eq!(config.leap_target, LEAP);
    assert_eq!(config.precision, -30);
    assert_eq!(config.shm_base_key, 0x4e545030);
    assert_eq!(config.interval(), Duration::from_secs(1));
    assert_eq!(config.shm_key(2), 0x4e545032);
}

#[test]
fn config_from_file_with_section() {
    let path = tests_data_dir().join("leapsim-config.toml");
    let config = SimConfig::from_file(path.to_str().unwrap()).expect("load config");
    assert_eq!(config.leap_target, 1_483_228_800);
    assert_eq!(config.precision, -20);
    assert_eq!(config.shm_base_key, 0x4e545030);
    assert_eq!(config.interval(), Duration::from_millis(250));
}

#[test]
fn config_from_flat_file() {
    let path = tests_data_dir().join("flat-config.toml");
    let config = SimConfig::load(Some(path.to_str().unwrap())).expect("load config");
    assert_eq!(config.shm_base_key, 1000);
    assert_eq!(config.shm_key(1), 1001);
    assert_eq!(config.leap_target, LEAP);
}

#[test]
fn missing_config_file_is_an_error() {
    let path = tests_data_dir().join("does-not-exist.toml");
    assert!(SimConfig::from_file(path.to_str().unwrap()).is_err());
}

#[test]
fn bad_value_in_section_is_an_error() {
    let path = tests_data_dir().join("bad-section.toml");
    assert!(SimConfig::from_file(path.to_str().unwrap()).is_err());
}

#[test]
fn leap_target_out_of_range_is_an_error() {
    let path = tests_data_dir().join("out-of-range.toml");
    assert!(SimConfig::load(Some(path.to_str().unwrap())).is_err());
}
