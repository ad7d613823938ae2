use std::time::Duration;

use rstest::rstest;
use yag_core::mocks::RecordingTransport;
use yag_core::{
    FlashlampMode, Intent, LaserCore, LaserPhase, Payload, SequenceCfg, SequenceFault,
    ShutterPolicy, ShutterState, Step, Subsystem, YagError,
};
use yag_hardware::{SimHandle, SimState, SimulatedLaser};
use yag_traits::ManualClock;

type SimCore = LaserCore<RecordingTransport<SimulatedLaser>, ManualClock>;

fn connect(sim: SimulatedLaser) -> (SimCore, SimHandle) {
    let handle = sim.handle();
    let mut core = LaserCore::new(RecordingTransport::new(sim), ManualClock::new());
    core.connect("SIM").unwrap();
    (core, handle)
}

fn writes_and_actions(log: &[String]) -> Vec<&str> {
    const QUERIES: [&str; 3] = ["R", "QS", "WOR"];
    log.iter()
        .map(String::as_str)
        .filter(|c| !QUERIES.contains(c))
        .collect()
}

#[test]
fn activation_opens_the_shutter_first_and_fires_last() {
    let (mut core, sim) = connect(SimulatedLaser::new());
    let log = core.transport().log();
    let clock = core.clock().clone();

    assert_eq!(core.activate_yag().unwrap(), LaserPhase::Active);

    let sent = log.commands();
    assert_eq!(writes_and_actions(&sent), ["R1", "QSP1", "QSR1", "A"]);
    // head state is read before the first command
    assert_eq!(&sent[..3], ["R", "QS", "WOR"]);
    assert_eq!(&sent[3..7], ["R1", "QSP1", "QSR1", "A"]);
    // three settles plus the Q-switch settle, before verification
    assert_eq!(clock.slept(), Duration::from_millis(200));

    let s = sim.snapshot();
    assert!(s.shutter_open && s.qswitch_running && s.flashlamp_mode == 2);
    assert_eq!(core.phase(), &LaserPhase::Active);
}

#[test]
fn activating_while_active_does_no_io() {
    let (mut core, _) = connect(SimulatedLaser::new());
    core.activate_yag().unwrap();
    let log = core.transport().log();
    log.clear();

    assert_eq!(core.activate_yag().unwrap(), LaserPhase::Active);
    assert!(log.is_empty(), "sent: {:?}", log.commands());
}

fn lasing_head() -> SimulatedLaser {
    SimulatedLaser::with_state(SimState {
        shutter_open: true,
        qswitch_powered: true,
        qswitch_running: true,
        flashlamp_mode: 2,
        ..SimState::default()
    })
}

#[test]
fn activating_a_head_that_is_already_lasing_only_reads() {
    let (mut core, _) = connect(lasing_head());
    assert_eq!(core.phase(), &LaserPhase::Unknown);
    let log = core.transport().log();

    assert_eq!(core.activate_yag().unwrap(), LaserPhase::Active);

    assert_eq!(log.commands(), ["R", "QS", "WOR"]);
    assert_eq!(core.phase(), &LaserPhase::Active);
}

#[test]
fn deactivating_a_resting_head_only_reads() {
    let (mut core, _) = connect(SimulatedLaser::new());
    let log = core.transport().log();

    assert_eq!(core.deactivate_yag().unwrap(), LaserPhase::Deactivated);

    assert_eq!(log.commands(), ["R", "QS", "WOR"]);
}

#[test]
fn unreadable_head_state_still_runs_the_sequence() {
    let (mut core, _) = connect(SimulatedLaser::new().timeout_on("QS"));
    let log = core.transport().log();

    // verification cannot read the Q-switch either
    let err = core.activate_yag().unwrap_err();

    assert_eq!(writes_and_actions(&log.commands()), ["R1", "QSP1", "QSR1", "A"]);
    assert!(matches!(
        err,
        YagError::Sequence(SequenceFault::Verify {
            subsystem: Subsystem::Qswitch,
            ..
        })
    ));
}

#[test]
fn deactivation_stops_the_flashlamp_first_and_closes_the_shutter_last() {
    let (mut core, sim) = connect(SimulatedLaser::new());
    core.activate_yag().unwrap();
    let log = core.transport().log();
    log.clear();

    assert_eq!(core.deactivate_yag().unwrap(), LaserPhase::Deactivated);

    assert_eq!(
        writes_and_actions(&log.commands()),
        ["S", "QSR0", "QSP0", "R0"]
    );
    let s = sim.snapshot();
    assert!(!s.shutter_open && !s.qswitch_powered && s.flashlamp_mode == 0);
}

#[test]
fn leave_open_policy_skips_the_shutter_on_deactivation() {
    let (core, sim) = connect(SimulatedLaser::new());
    let mut core = core.with_sequence(SequenceCfg {
        shutter_policy: ShutterPolicy::LeaveOpen,
    });
    core.activate_yag().unwrap();
    let log = core.transport().log();
    log.clear();

    assert_eq!(core.deactivate_yag().unwrap(), LaserPhase::Deactivated);

    assert_eq!(writes_and_actions(&log.commands()), ["S", "QSR0", "QSP0"]);
    assert!(sim.snapshot().shutter_open);
}

#[test]
fn flashlamp_timeout_faults_with_shutter_and_qswitch_left_on() {
    let (mut core, sim) = connect(SimulatedLaser::new().timeout_on("A"));

    let err = core.activate_yag().unwrap_err();

    let YagError::Sequence(fault) = err else {
        panic!("expected a sequence fault, got {err:?}");
    };
    assert_eq!(fault.subsystem(), Some(Subsystem::Flashlamp));
    assert!(matches!(
        fault,
        SequenceFault::Step {
            step: Step::FlashlampActivate,
            ..
        }
    ));
    assert!(matches!(core.phase(), LaserPhase::Faulted(_)));
    assert!(core.state().flashlamp_mode.is_stale());

    // no automatic rollback
    let s = sim.snapshot();
    assert!(s.shutter_open);
    assert!(s.qswitch_running);
    assert_eq!(s.flashlamp_mode, 0);

    // the model mirrors what the completed steps left behind
    let state = core.state();
    assert_eq!(state.shutter.fresh(), Some(&ShutterState::Open));
    assert_eq!(state.qswitch_status.fresh(), Some(&true));
}

#[rstest]
#[case("QSR0", Step::QswitchStop, Some(FlashlampMode::Stop), Some(true))]
#[case("QSP0", Step::QswitchPowerOff, Some(FlashlampMode::Stop), Some(false))]
#[case("R0", Step::CloseShutter, Some(FlashlampMode::Stop), Some(false))]
fn partial_deactivation_leaves_the_model_matching_the_head(
    #[case] stuck: &str,
    #[case] failed: Step,
    #[case] mode: Option<FlashlampMode>,
    #[case] qswitch: Option<bool>,
) {
    let (mut core, sim) = connect(SimulatedLaser::new());
    core.activate_yag().unwrap();
    sim.update(|s| s.timeout_on.push(stuck.to_string()));

    let err = core.deactivate_yag().unwrap_err();

    assert!(matches!(
        err,
        YagError::Sequence(SequenceFault::Step { step, .. }) if step == failed
    ));
    let state = core.state();
    assert_eq!(state.flashlamp_mode.fresh().copied(), mode);
    if failed.subsystem() == Subsystem::Qswitch {
        assert!(state.qswitch_status.is_stale());
        assert_eq!(state.qswitch_status.value().copied(), qswitch);
    } else {
        assert_eq!(state.qswitch_status.fresh().copied(), qswitch);
    }
    if failed == Step::CloseShutter {
        assert!(state.shutter.is_stale());
    } else {
        assert_eq!(state.shutter.fresh(), Some(&ShutterState::Open));
    }
    let head = sim.snapshot();
    assert_eq!(head.flashlamp_mode, 0);
    assert!(head.shutter_open);
}

#[test]
fn faulted_laser_must_be_deactivated_before_activating_again() {
    let (mut core, sim) = connect(SimulatedLaser::new().timeout_on("A"));
    core.activate_yag().unwrap_err();
    let before = sim.sent().len();

    let err = core.activate_yag().unwrap_err();
    assert!(matches!(
        err,
        YagError::Sequence(SequenceFault::RequiresDeactivate)
    ));
    assert_eq!(sim.sent().len(), before);

    assert_eq!(core.deactivate_yag().unwrap(), LaserPhase::Deactivated);
    sim.update(|s| s.timeout_on.clear());
    assert_eq!(core.activate_yag().unwrap(), LaserPhase::Active);
}

#[test]
fn verification_mismatch_names_the_subsystem() {
    // Status word unreadable once the lamp is firing.
    let (mut core, _) = connect(SimulatedLaser::new().reject_on("WOR"));

    let err = core.activate_yag().unwrap_err();

    let YagError::Sequence(SequenceFault::Verify { subsystem, .. }) = err else {
        panic!("expected a verification fault, got {err:?}");
    };
    assert_eq!(subsystem, Subsystem::Flashlamp);
}

#[rstest]
#[case(0, LaserPhase::Active)]
#[case(2, LaserPhase::Deactivated)]
fn toggle_yag_follows_the_flashlamp_mode(#[case] mode: u8, #[case] want: LaserPhase) {
    let (mut core, sim) = connect(SimulatedLaser::new());
    if mode != 0 {
        core.activate_yag().unwrap();
    }
    assert_eq!(sim.snapshot().flashlamp_mode, mode);

    let payload = core.handle(Intent::ToggleYag).unwrap();

    assert_eq!(payload, Payload::Phase(want.clone()));
    assert_eq!(core.phase(), &want);
}

#[test]
fn polling_a_deactivated_head_reconciles_the_phase() {
    let (mut core, _) = connect(SimulatedLaser::new());
    assert_eq!(core.phase(), &LaserPhase::Unknown);

    core.poll_cycle(&std::sync::atomic::AtomicBool::new(false));

    assert_eq!(core.phase(), &LaserPhase::Deactivated);
}
