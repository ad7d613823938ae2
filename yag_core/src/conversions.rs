//! Bridges from `yag_config` types to the core's runtime types.

use crate::codec::Setting;
use crate::config::{PollCfg, SequenceCfg, TimingCfg};
use crate::sequence::ShutterPolicy;
use crate::types::{QswitchMode, ShutterState, Trigger};
use crate::util::secs_f64_to_duration;
use std::time::Duration;

// ── Timing ───────────────────────────────────────────────────────────────────

impl From<&yag_config::Timing> for TimingCfg {
    fn from(c: &yag_config::Timing) -> Self {
        Self {
            settle: Duration::from_millis(c.settle_ms),
            qswitch_settle: Duration::from_millis(c.qswitch_settle_ms),
            idle: Duration::from_millis(c.idle_ms),
        }
    }
}

// ── Sequence ─────────────────────────────────────────────────────────────────

impl From<yag_config::DeactivateShutter> for ShutterPolicy {
    fn from(c: yag_config::DeactivateShutter) -> Self {
        match c {
            yag_config::DeactivateShutter::Close => ShutterPolicy::Close,
            yag_config::DeactivateShutter::LeaveOpen => ShutterPolicy::LeaveOpen,
        }
    }
}

impl From<&yag_config::SequenceSection> for SequenceCfg {
    fn from(c: &yag_config::SequenceSection) -> Self {
        Self {
            shutter_policy: c.deactivate_shutter.into(),
        }
    }
}

// ── Poll ─────────────────────────────────────────────────────────────────────

impl TryFrom<&yag_config::Settings> for PollCfg {
    type Error = eyre::Report;
    fn try_from(s: &yag_config::Settings) -> Result<Self, Self::Error> {
        Ok(match s.get_float("loop_cycle_seconds")? {
            Some(secs) => Self {
                interval: secs_f64_to_duration(secs),
            },
            None => Self::default(),
        })
    }
}

// ── Settings ─────────────────────────────────────────────────────────────────

/// Settings keys holding initial laser parameters, in the order they are applied.
pub const INITIAL_KEYS: [&str; 9] = [
    "flashlamp_trigger",
    "flashlamp_frequency_Hz",
    "flashlamp_voltage_V",
    "flashlamp_energy_J",
    "flashlamp_capacitance_uF",
    "qswitch_mode",
    "qswitch_delay_us",
    "qswitch_freq_divider",
    "qswitch_burst_pulses",
];

/// Parse `value` for the parameter named `key`.
///
/// Accepts the settings-store key names (`flashlamp_frequency_Hz`) and short
/// aliases (`frequency`). Bounds are not checked here.
pub fn parse_setting(key: &str, value: &str) -> eyre::Result<Setting> {
    let v = value.trim();
    let num = |what: &str| eyre::eyre!("{key}: expected {what}, got {v:?}");
    let int = || v.parse::<u32>().map_err(|_| num("an integer"));
    let float = || v.parse::<f64>().map_err(|_| num("a number"));
    let flag = || match v.to_ascii_lowercase().as_str() {
        "1" | "on" | "true" | "yes" => Ok(true),
        "0" | "off" | "false" | "no" => Ok(false),
        _ => Err(num("on or off")),
    };
    Ok(match key.trim().to_ascii_lowercase().as_str() {
        "pump" => Setting::Pump(flag()?),
        "shutter" => Setting::Shutter(match v.to_ascii_lowercase().as_str() {
            "open" | "1" | "on" => ShutterState::Open,
            "closed" | "close" | "0" | "off" => ShutterState::Closed,
            _ => return Err(num("open or closed")),
        }),
        "flashlamp_trigger" | "trigger" => Setting::FlashlampTrigger(
            Trigger::from_name(v).ok_or_else(|| num("internal or external"))?,
        ),
        "flashlamp_frequency_hz" | "frequency" => Setting::FlashlampFrequency(float()?),
        "flashlamp_voltage_v" | "voltage" => Setting::FlashlampVoltage(int()?),
        "flashlamp_energy_j" | "energy" => Setting::FlashlampEnergy(float()?),
        "flashlamp_capacitance_uf" | "capacitance" => Setting::FlashlampCapacitance(float()?),
        "qswitch_mode" | "mode" => Setting::QswitchMode(
            QswitchMode::from_name(v).ok_or_else(|| num("auto, burst or external"))?,
        ),
        "qswitch_delay_us" | "delay" => Setting::QswitchDelay(int()?),
        "qswitch_freq_divider" | "qswitch_frequency_divider" | "divider" => {
            Setting::QswitchDivider(int()?)
        }
        "qswitch_burst_pulses" | "burst" => Setting::QswitchBurst(int()?),
        other => eyre::bail!("unknown parameter {other:?}"),
    })
}

/// Initial parameters present in the settings store, bounds-checked.
pub fn initial_settings(s: &yag_config::Settings) -> eyre::Result<Vec<Setting>> {
    let mut out = Vec::new();
    for key in INITIAL_KEYS {
        let Some(raw) = s.get_string(key)? else {
            continue;
        };
        let setting = parse_setting(key, &raw)?.validate()?;
        out.push(setting);
    }
    Ok(out)
}
