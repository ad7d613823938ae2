use std::sync::atomic::AtomicBool;

use yag_core::{Event, Field, LaserCore, POLL_ORDER, Subject};
use yag_hardware::SimulatedLaser;
use yag_traits::ManualClock;

#[test]
fn one_failing_read_does_not_stop_the_cycle() {
    let sim = SimulatedLaser::new().timeout_on("V");
    let handle = sim.handle();
    let mut core = LaserCore::new(sim, ManualClock::new());
    core.connect("SIM").unwrap();

    let report = core.poll_cycle(&AtomicBool::new(false));

    assert_eq!(report.failed, vec![Field::FlashlampVoltage]);
    assert_eq!(report.ok, POLL_ORDER.len() - 1);
    assert!(!report.interrupted);
    assert_eq!(handle.sent().len(), POLL_ORDER.len());

    let state = core.state();
    assert_eq!(state.stale_fields(), vec![Field::FlashlampVoltage]);
    assert_eq!(state.flashlamp_frequency_hz.fresh().copied(), Some(10.0));
    assert_eq!(state.flashlamp_energy_j.fresh().copied(), Some(14.0));
    assert_eq!(state.serial_number.fresh().map(String::as_str), Some("184"));
}

#[test]
fn cycle_reads_fields_in_poll_order() {
    let sim = SimulatedLaser::new();
    let handle = sim.handle();
    let mut core = LaserCore::new(sim, ManualClock::new());
    core.connect("SIM").unwrap();

    core.poll_cycle(&AtomicBool::new(false));

    let expected: Vec<&str> = POLL_ORDER.iter().map(|f| f.query()).collect();
    assert_eq!(handle.sent(), expected);
}

#[test]
fn every_read_is_reported_to_the_observer() {
    let (tx, rx) = crossbeam_channel::unbounded::<Event>();
    let mut core = LaserCore::new(SimulatedLaser::new().timeout_on("IF"), ManualClock::new())
        .with_observer(yag_core::ChannelObserver(tx));
    core.connect("SIM").unwrap();

    core.poll_cycle(&AtomicBool::new(false));

    let events: Vec<Event> = rx.try_iter().collect();
    assert_eq!(events.len(), POLL_ORDER.len());
    let failed: Vec<_> = events.iter().filter(|e| e.outcome.is_err()).collect();
    assert_eq!(failed.len(), 1);
    assert_eq!(
        failed[0].subject,
        Subject::Field(Field::FlashlampInterlock)
    );
}

#[test]
fn shutdown_flag_interrupts_before_any_read() {
    let sim = SimulatedLaser::new();
    let handle = sim.handle();
    let mut core = LaserCore::new(sim, ManualClock::new());
    core.connect("SIM").unwrap();

    let report = core.poll_cycle(&AtomicBool::new(true));

    assert!(report.interrupted);
    assert_eq!(report.ok, 0);
    assert!(handle.sent().is_empty());
}
