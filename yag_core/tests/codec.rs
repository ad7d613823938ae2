use proptest::prelude::*;
use rstest::rstest;
use yag_core::{
    Decoded, Field, Operation, ProtocolError, Reading, Setting, decode, encode, parse_command,
    parse_reading, render,
};

fn write_round_trips(setting: Setting) {
    let s = setting.validate().expect("in bounds");
    let cmd = encode(&Operation::Write(s));
    assert_eq!(parse_command(&cmd).unwrap(), Operation::Write(s), "{cmd}");

    let echo = render(&s.expected_reading());
    let decoded = decode(&Operation::Write(s), &echo).unwrap();
    assert_eq!(decoded, Decoded::Reading(s.expected_reading()), "{echo}");
}

#[rstest]
#[case(Setting::FlashlampFrequency(1.0))]
#[case(Setting::FlashlampFrequency(99.99))]
#[case(Setting::FlashlampVoltage(500))]
#[case(Setting::FlashlampVoltage(1800))]
#[case(Setting::FlashlampEnergy(7.0))]
#[case(Setting::FlashlampEnergy(23.0))]
#[case(Setting::FlashlampCapacitance(27.0))]
#[case(Setting::FlashlampCapacitance(33.0))]
#[case(Setting::QswitchDelay(10))]
#[case(Setting::QswitchDelay(999))]
#[case(Setting::QswitchDivider(1))]
#[case(Setting::QswitchDivider(99))]
#[case(Setting::QswitchBurst(1))]
#[case(Setting::QswitchBurst(999))]
fn writes_at_the_bounds_round_trip(#[case] setting: Setting) {
    write_round_trips(setting);
}

#[rstest]
#[case(Setting::FlashlampFrequency(0.99))]
#[case(Setting::FlashlampFrequency(100.0))]
#[case(Setting::FlashlampVoltage(499))]
#[case(Setting::FlashlampVoltage(1801))]
#[case(Setting::FlashlampEnergy(6.9))]
#[case(Setting::FlashlampCapacitance(33.1))]
#[case(Setting::QswitchDelay(9))]
#[case(Setting::QswitchDivider(0))]
#[case(Setting::QswitchBurst(1000))]
#[case(Setting::FlashlampFrequency(f64::NAN))]
fn writes_outside_the_bounds_are_refused(#[case] setting: Setting) {
    let err = setting.validate().unwrap_err();
    assert_eq!(err.param, setting.field().name());
}

#[test]
fn frequency_is_quantized_before_encoding() {
    let s = Setting::FlashlampFrequency(12.346).validate().unwrap();
    assert_eq!(encode(&Operation::Write(s)), "F12.35");
}

#[test]
fn out_of_range_reply_is_a_device_anomaly() {
    let err = parse_reading(Field::FlashlampVoltage, "volt. 2500 V").unwrap_err();
    assert!(matches!(
        err,
        ProtocolError::OutOfRange {
            field: Field::FlashlampVoltage,
            ..
        }
    ));
}

#[test]
fn rejected_command_surfaces_the_raw_reply() {
    let err = decode(&Operation::Read(Field::FlashlampEnergy), "?").unwrap_err();
    assert_eq!(
        err,
        ProtocolError::Rejected {
            command: "E".into(),
            raw: "?".into()
        }
    );
}

#[test]
fn status_word_yields_both_mode_and_simmer() {
    assert_eq!(
        parse_reading(Field::FlashlampMode, "status 2 1").unwrap(),
        Reading::FlashlampMode(yag_core::FlashlampMode::Start)
    );
    assert_eq!(
        parse_reading(Field::Simmer, "status 2 1").unwrap(),
        Reading::Simmer(true)
    );
}

proptest! {
    #[test]
    fn frequency_round_trips_inside_bounds(k in 100u32..=9999) {
        write_round_trips(Setting::FlashlampFrequency(f64::from(k) / 100.0));
    }

    #[test]
    fn energy_round_trips_inside_bounds(k in 70u32..=230) {
        write_round_trips(Setting::FlashlampEnergy(f64::from(k) / 10.0));
    }

    #[test]
    fn voltage_round_trips_inside_bounds(v in 500u32..=1800) {
        write_round_trips(Setting::FlashlampVoltage(v));
    }

    #[test]
    fn delay_outside_bounds_never_validates(v in prop_oneof![0u32..10, 1000u32..100_000]) {
        prop_assert!(Setting::QswitchDelay(v).validate().is_err());
    }

    #[test]
    fn decode_never_panics_on_arbitrary_replies(raw in ".{0,40}") {
        for field in Field::ALL {
            let _ = decode(&Operation::Read(field), &raw);
        }
    }
}
