use std::io;

use rstest::rstest;
use yag_core::mocks::{FnTransport, RecordingTransport};
use yag_core::{
    Field, FlashlampInterlock, Intent, LaserCore, QswitchMode, Reading, Setting, Trigger,
    TransportError, YagError, render,
    types::{FlashlampMode, ShutterState},
};
use yag_hardware::{SimHandle, SimulatedLaser};
use yag_traits::ManualClock;

fn sim_core() -> (
    LaserCore<RecordingTransport<SimulatedLaser>, ManualClock>,
    SimHandle,
) {
    let sim = SimulatedLaser::new();
    let handle = sim.handle();
    let mut core = LaserCore::new(RecordingTransport::new(sim), ManualClock::new());
    core.connect("SIM").unwrap();
    (core, handle)
}

#[test]
fn out_of_range_write_is_refused_before_any_io() {
    let (mut core, _) = sim_core();
    let log = core.transport().log();

    let err = core.write(Setting::FlashlampVoltage(2000)).unwrap_err();

    match err {
        YagError::Validation(v) => {
            assert_eq!(v.param, "flashlamp_voltage_v");
            assert_eq!(v.min, 500.0);
            assert_eq!(v.max, 1800.0);
        }
        other => panic!("expected validation error, got {other:?}"),
    }
    assert!(log.is_empty(), "sent: {:?}", log.commands());
}

#[rstest]
#[case(Setting::FlashlampFrequency(0.5))]
#[case(Setting::FlashlampFrequency(100.0))]
#[case(Setting::FlashlampFrequency(f64::NAN))]
#[case(Setting::FlashlampVoltage(499))]
#[case(Setting::FlashlampEnergy(6.9))]
#[case(Setting::FlashlampEnergy(23.5))]
#[case(Setting::FlashlampCapacitance(26.9))]
#[case(Setting::FlashlampCapacitance(33.5))]
#[case(Setting::QswitchDelay(9))]
#[case(Setting::QswitchDelay(1000))]
#[case(Setting::QswitchDivider(0))]
#[case(Setting::QswitchDivider(100))]
#[case(Setting::QswitchBurst(0))]
#[case(Setting::QswitchBurst(1000))]
fn every_bounded_setting_is_checked_before_io(#[case] setting: Setting) {
    let (mut core, sim) = sim_core();
    let log = core.transport().log();
    let before = sim.snapshot();

    let err = core.write(setting).unwrap_err();

    let YagError::Validation(v) = err else {
        panic!("expected validation error, got {err:?}");
    };
    assert_eq!(v.param, setting.field().name());
    assert!(log.is_empty(), "sent: {:?}", log.commands());
    assert!(!core.state().is_stale(setting.field()));
    let after = sim.snapshot();
    assert_eq!(after.frequency_hz, before.frequency_hz);
    assert_eq!(after.qswitch_burst, before.qswitch_burst);
}

#[rstest]
#[case(Setting::Pump(false), "P0")]
#[case(Setting::Pump(true), "P1")]
#[case(Setting::Shutter(ShutterState::Open), "R1")]
#[case(Setting::Shutter(ShutterState::Closed), "R0")]
#[case(Setting::FlashlampTrigger(Trigger::External), "LPM1")]
#[case(Setting::FlashlampTrigger(Trigger::Internal), "LPM0")]
#[case(Setting::QswitchMode(QswitchMode::Burst), "QSM1")]
#[case(Setting::QswitchMode(QswitchMode::External), "QSM2")]
#[case(Setting::QswitchMode(QswitchMode::Auto), "QSM0")]
fn enum_and_flag_writes_echo_and_read_back(#[case] setting: Setting, #[case] command: &str) {
    let (mut core, _) = sim_core();
    let log = core.transport().log();
    let field = setting.field();

    let r = core.write(setting).unwrap();

    assert_eq!(r, setting.expected_reading());
    assert_eq!(log.commands(), [command, field.query()]);
    assert!(!core.state().is_stale(field));
    assert_eq!(
        core.state().display(field),
        Some(setting.expected_reading().to_string())
    );
}

#[test]
fn write_reads_back_the_applied_value() {
    let (mut core, sim) = sim_core();
    let log = core.transport().log();

    let r = core.write(Setting::FlashlampFrequency(12.5)).unwrap();

    assert_eq!(r, Reading::FlashlampFrequency(12.5));
    assert_eq!(log.commands(), ["F12.50", "F"]);
    assert_eq!(sim.snapshot().frequency_hz, 12.5);
    assert_eq!(
        core.state().flashlamp_frequency_hz.fresh().copied(),
        Some(12.5)
    );
}

#[test]
fn io_error_keeps_the_last_value_and_marks_it_stale() {
    let mut fail = false;
    let transport = FnTransport::new(move |cmd: &str| {
        assert_eq!(cmd, "V");
        if fail {
            return Err(io::Error::other("framing error").into());
        }
        fail = true;
        Ok("volt. 1200 V".to_string())
    });
    let mut core = LaserCore::new(transport, ManualClock::new());
    core.connect("SIM").unwrap();

    assert_eq!(
        core.read(Field::FlashlampVoltage).unwrap(),
        Reading::FlashlampVoltage(1200)
    );
    let err = core.read(Field::FlashlampVoltage).unwrap_err();

    assert!(matches!(err, YagError::Transport(TransportError::Io(_))));
    let voltage = &core.state().flashlamp_voltage_v;
    assert!(voltage.is_stale());
    assert_eq!(voltage.value().copied(), Some(1200));
    assert_eq!(core.state().stale_fields(), vec![Field::FlashlampVoltage]);
}

#[rstest]
#[case(Reading::FlashlampFrequency(10.0))]
#[case(Reading::FlashlampEnergy(14.0))]
#[case(Reading::QswitchDelay(150))]
#[case(Reading::Pump(true))]
#[case(Reading::Shutter(ShutterState::Open))]
#[case(Reading::QswitchStatus(true))]
#[case(Reading::QswitchMode(QswitchMode::Burst))]
#[case(Reading::FlashlampInterlock(FlashlampInterlock::WATER_FLOW))]
#[case(Reading::SerialNumber("184".into()))]
fn io_error_on_any_field_keeps_its_last_value(#[case] reading: Reading) {
    let field = reading.field();
    let reply = render(&reading);
    let mut fail = false;
    let transport = FnTransport::new(move |_: &str| {
        if fail {
            return Err(io::Error::other("framing error").into());
        }
        fail = true;
        Ok(reply.clone())
    });
    let mut core = LaserCore::new(transport, ManualClock::new());
    core.connect("SIM").unwrap();
    assert_eq!(core.read(field).unwrap(), reading);
    let shown = core.state().display(field);

    let err = core.read(field).unwrap_err();

    assert!(matches!(err, YagError::Transport(TransportError::Io(_))));
    assert!(core.state().is_stale(field));
    assert_eq!(core.state().display(field), shown);
    assert_eq!(core.state().stale_fields(), vec![field]);
}

#[test]
fn rejected_write_marks_the_field_stale() {
    let sim = SimulatedLaser::new().reject_on("V0900");
    let mut core = LaserCore::new(sim, ManualClock::new());
    core.connect("SIM").unwrap();
    core.read(Field::FlashlampVoltage).unwrap();

    let err = core.write(Setting::FlashlampVoltage(900)).unwrap_err();

    assert!(matches!(err, YagError::Protocol(_)));
    assert!(core.state().is_stale(Field::FlashlampVoltage));
    assert_eq!(core.state().flashlamp_voltage_v.value().copied(), Some(1200));
}

#[test]
fn toggle_flashlamp_from_stop_sends_activate() {
    let (mut core, sim) = sim_core();
    let log = core.transport().log();

    let r = core.toggle_flashlamp().unwrap();

    assert_eq!(r, Reading::FlashlampMode(FlashlampMode::Start));
    assert_eq!(log.commands(), ["WOR", "A", "WOR"]);
    assert_eq!(sim.snapshot().flashlamp_mode, 2);
}

#[test]
fn toggle_flashlamp_gives_up_when_mode_is_unreadable() {
    let sim = SimulatedLaser::new().timeout_on("WOR");
    let handle = sim.handle();
    let mut core = LaserCore::new(sim, ManualClock::new());
    core.connect("SIM").unwrap();

    let err = core.toggle_flashlamp().unwrap_err();

    assert!(matches!(err, YagError::Transport(TransportError::Timeout)));
    assert_eq!(handle.sent(), ["WOR"]);
}

#[test]
fn toggle_shutter_and_pump_flip_the_current_value() {
    let (mut core, sim) = sim_core();

    assert_eq!(
        core.toggle_shutter().unwrap(),
        Reading::Shutter(ShutterState::Open)
    );
    assert_eq!(core.toggle_pump().unwrap(), Reading::Pump(false));

    let s = sim.snapshot();
    assert!(s.shutter_open);
    assert!(!s.pump);
}

#[test]
fn toggle_qswitch_powers_and_starts_with_a_settle_between() {
    let (mut core, sim) = sim_core();
    let log = core.transport().log();
    let clock = core.clock().clone();

    assert_eq!(core.toggle_qswitch().unwrap(), Reading::QswitchStatus(true));
    assert_eq!(log.commands(), ["QS", "QSP1", "QSR1", "QS"]);
    assert_eq!(clock.slept(), std::time::Duration::from_millis(50));

    log.clear();
    assert_eq!(core.toggle_qswitch().unwrap(), Reading::QswitchStatus(false));
    assert_eq!(log.commands(), ["QS", "QSR0", "QSP0", "QS"]);
    assert!(!sim.snapshot().qswitch_powered);
}

#[test]
fn user_counters_reset_to_zero() {
    let (mut core, sim) = sim_core();

    assert_eq!(
        core.reset_flashlamp_user_counter().unwrap(),
        Reading::FlashlampUserCounter(0)
    );
    assert_eq!(
        core.reset_qswitch_user_counter().unwrap(),
        Reading::QswitchUserCounter(0)
    );
    assert_eq!(sim.snapshot().flashlamp_counter, 125_000);
}

#[test]
fn custom_command_returns_the_reply_untouched() {
    let (mut core, _) = sim_core();
    let payload = core.handle(Intent::Custom("SN".into())).unwrap();
    assert_eq!(payload, yag_core::Payload::Raw("SN 184".into()));
    assert_eq!(
        core.custom("NOPE").unwrap(),
        "?",
        "firmware refusals pass through as text"
    );
}

#[test]
fn handle_emits_one_command_event() {
    let (tx, rx) = crossbeam_channel::unbounded();
    let sim = SimulatedLaser::new();
    let mut core = LaserCore::new(sim, ManualClock::new())
        .with_observer(yag_core::ChannelObserver(tx));
    core.connect("SIM").unwrap();

    core.handle(Intent::Set(Setting::QswitchDelay(200))).unwrap();

    let events: Vec<_> = rx.try_iter().collect();
    assert_eq!(events.len(), 1);
    assert_eq!(
        events[0].subject,
        yag_core::Subject::Command(yag_core::CommandKind::Set(Field::QswitchDelay))
    );
    assert_eq!(
        events[0].outcome,
        Ok(yag_core::Payload::Reading(Reading::QswitchDelay(200)))
    );
}
