//! Big Sky ASCII command set.
//!
//! Commands are short mnemonics (`F`, `QSM1`, `A`); the transport adds the
//! line terminator. Replies have the shape `<label> <payload>[ <unit>]` and a
//! write is echoed exactly like the reply to the matching query, so one
//! parser serves both. The firmware answers anything it refuses with `?`
//! (older heads send `ERR...`).
//!
//! `encode` is total over [`Operation`]. `decode` never clamps: a value
//! outside a field's bounds is a device anomaly and comes back as
//! [`ProtocolError::OutOfRange`]; an enum code outside the canonical set is
//! [`ProtocolError::Malformed`].
use std::fmt;

use crate::error::{ProtocolError, ValidationError};
use crate::types::{
    FlashlampInterlock, FlashlampMode, QswitchInterlock, QswitchMode, ShutterState, Trigger,
};
use crate::util::round_to;

/// Every readable property of the head.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Field {
    SerialNumber,
    Pump,
    CoolingTemperature,
    Shutter,
    FlashlampMode,
    Simmer,
    FlashlampTrigger,
    FlashlampFrequency,
    FlashlampVoltage,
    FlashlampEnergy,
    FlashlampCapacitance,
    FlashlampCounter,
    FlashlampUserCounter,
    FlashlampInterlock,
    QswitchStatus,
    QswitchMode,
    QswitchDelay,
    QswitchDivider,
    QswitchBurst,
    QswitchCounter,
    QswitchUserCounter,
    QswitchInterlock,
}

/// Numeric range and precision of a bounded field.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Bounds {
    pub min: f64,
    pub max: f64,
    pub decimals: u32,
}

impl Bounds {
    const fn new(min: f64, max: f64, decimals: u32) -> Self {
        Self { min, max, decimals }
    }

    pub fn contains(&self, v: f64) -> bool {
        v >= self.min && v <= self.max
    }
}

impl Field {
    /// All fields in poll order.
    pub const ALL: [Field; 22] = [
        Field::SerialNumber,
        Field::Pump,
        Field::CoolingTemperature,
        Field::Shutter,
        Field::FlashlampMode,
        Field::Simmer,
        Field::FlashlampTrigger,
        Field::FlashlampFrequency,
        Field::FlashlampVoltage,
        Field::FlashlampEnergy,
        Field::FlashlampCapacitance,
        Field::FlashlampCounter,
        Field::FlashlampUserCounter,
        Field::FlashlampInterlock,
        Field::QswitchStatus,
        Field::QswitchMode,
        Field::QswitchDelay,
        Field::QswitchDivider,
        Field::QswitchBurst,
        Field::QswitchCounter,
        Field::QswitchUserCounter,
        Field::QswitchInterlock,
    ];

    /// Query mnemonic.
    pub const fn query(self) -> &'static str {
        match self {
            Field::SerialNumber => "SN",
            Field::Pump => "P",
            Field::CoolingTemperature => "CG",
            Field::Shutter => "R",
            Field::FlashlampMode | Field::Simmer => "WOR",
            Field::FlashlampTrigger => "LPM",
            Field::FlashlampFrequency => "F",
            Field::FlashlampVoltage => "V",
            Field::FlashlampEnergy => "E",
            Field::FlashlampCapacitance => "C",
            Field::FlashlampCounter => "CPT",
            Field::FlashlampUserCounter => "UC",
            Field::FlashlampInterlock => "IF",
            Field::QswitchStatus => "QS",
            Field::QswitchMode => "QSM",
            Field::QswitchDelay => "W",
            Field::QswitchDivider => "QSF",
            Field::QswitchBurst => "B",
            Field::QswitchCounter => "QSC",
            Field::QswitchUserCounter => "QSU",
            Field::QswitchInterlock => "IQ",
        }
    }

    /// Label that prefixes the reply.
    pub const fn label(self) -> &'static str {
        match self {
            Field::SerialNumber => "SN",
            Field::Pump => "pump",
            Field::CoolingTemperature => "temp. CG",
            Field::Shutter => "shutter",
            Field::FlashlampMode | Field::Simmer => "status",
            Field::FlashlampTrigger => "trig.",
            Field::FlashlampFrequency => "freq.",
            Field::FlashlampVoltage => "volt.",
            Field::FlashlampEnergy => "ener.",
            Field::FlashlampCapacitance => "capa.",
            Field::FlashlampCounter => "cpt.",
            Field::FlashlampUserCounter => "user cpt.",
            Field::FlashlampInterlock => "interlock",
            Field::QswitchStatus => "qs.",
            Field::QswitchMode => "qs mode",
            Field::QswitchDelay => "delay",
            Field::QswitchDivider => "f div.",
            Field::QswitchBurst => "burst",
            Field::QswitchCounter => "qs cpt.",
            Field::QswitchUserCounter => "qs user cpt.",
            Field::QswitchInterlock => "qs intlk",
        }
    }

    /// Unit suffix of the reply, if any.
    pub const fn unit(self) -> Option<&'static str> {
        match self {
            Field::CoolingTemperature => Some("C"),
            Field::FlashlampFrequency => Some("Hz"),
            Field::FlashlampVoltage => Some("V"),
            Field::FlashlampEnergy => Some("J"),
            Field::FlashlampCapacitance => Some("uF"),
            Field::QswitchDelay => Some("us"),
            _ => None,
        }
    }

    pub const fn bounds(self) -> Option<Bounds> {
        match self {
            Field::FlashlampFrequency => Some(Bounds::new(1.0, 99.99, 2)),
            Field::FlashlampVoltage => Some(Bounds::new(500.0, 1800.0, 0)),
            Field::FlashlampEnergy => Some(Bounds::new(7.0, 23.0, 1)),
            Field::FlashlampCapacitance => Some(Bounds::new(27.0, 33.0, 1)),
            Field::QswitchDelay => Some(Bounds::new(10.0, 999.0, 0)),
            Field::QswitchDivider => Some(Bounds::new(1.0, 99.0, 0)),
            Field::QswitchBurst => Some(Bounds::new(1.0, 999.0, 0)),
            _ => None,
        }
    }

    /// snake_case name used in logs, events and recordings.
    pub const fn name(self) -> &'static str {
        match self {
            Field::SerialNumber => "serial_number",
            Field::Pump => "pump",
            Field::CoolingTemperature => "temperature_cooling_group_c",
            Field::Shutter => "shutter",
            Field::FlashlampMode => "flashlamp_mode",
            Field::Simmer => "simmer",
            Field::FlashlampTrigger => "flashlamp_trigger",
            Field::FlashlampFrequency => "flashlamp_frequency_hz",
            Field::FlashlampVoltage => "flashlamp_voltage_v",
            Field::FlashlampEnergy => "flashlamp_energy_j",
            Field::FlashlampCapacitance => "flashlamp_capacitance_uf",
            Field::FlashlampCounter => "flashlamp_counter",
            Field::FlashlampUserCounter => "flashlamp_user_counter",
            Field::FlashlampInterlock => "flashlamp_interlock",
            Field::QswitchStatus => "qswitch_status",
            Field::QswitchMode => "qswitch_mode",
            Field::QswitchDelay => "qswitch_delay_us",
            Field::QswitchDivider => "qswitch_frequency_divider",
            Field::QswitchBurst => "qswitch_burst_pulses",
            Field::QswitchCounter => "qswitch_counter",
            Field::QswitchUserCounter => "qswitch_user_counter",
            Field::QswitchInterlock => "qswitch_interlock",
        }
    }
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A typed value read from the head.
#[derive(Debug, Clone, PartialEq)]
pub enum Reading {
    SerialNumber(String),
    Pump(bool),
    CoolingTemperature(f64),
    Shutter(ShutterState),
    FlashlampMode(FlashlampMode),
    Simmer(bool),
    FlashlampTrigger(Trigger),
    FlashlampFrequency(f64),
    FlashlampVoltage(u32),
    FlashlampEnergy(f64),
    FlashlampCapacitance(f64),
    FlashlampCounter(u64),
    FlashlampUserCounter(u64),
    FlashlampInterlock(FlashlampInterlock),
    QswitchStatus(bool),
    QswitchMode(QswitchMode),
    QswitchDelay(u32),
    QswitchDivider(u32),
    QswitchBurst(u32),
    QswitchCounter(u64),
    QswitchUserCounter(u64),
    QswitchInterlock(QswitchInterlock),
}

impl Reading {
    pub fn field(&self) -> Field {
        match self {
            Reading::SerialNumber(_) => Field::SerialNumber,
            Reading::Pump(_) => Field::Pump,
            Reading::CoolingTemperature(_) => Field::CoolingTemperature,
            Reading::Shutter(_) => Field::Shutter,
            Reading::FlashlampMode(_) => Field::FlashlampMode,
            Reading::Simmer(_) => Field::Simmer,
            Reading::FlashlampTrigger(_) => Field::FlashlampTrigger,
            Reading::FlashlampFrequency(_) => Field::FlashlampFrequency,
            Reading::FlashlampVoltage(_) => Field::FlashlampVoltage,
            Reading::FlashlampEnergy(_) => Field::FlashlampEnergy,
            Reading::FlashlampCapacitance(_) => Field::FlashlampCapacitance,
            Reading::FlashlampCounter(_) => Field::FlashlampCounter,
            Reading::FlashlampUserCounter(_) => Field::FlashlampUserCounter,
            Reading::FlashlampInterlock(_) => Field::FlashlampInterlock,
            Reading::QswitchStatus(_) => Field::QswitchStatus,
            Reading::QswitchMode(_) => Field::QswitchMode,
            Reading::QswitchDelay(_) => Field::QswitchDelay,
            Reading::QswitchDivider(_) => Field::QswitchDivider,
            Reading::QswitchBurst(_) => Field::QswitchBurst,
            Reading::QswitchCounter(_) => Field::QswitchCounter,
            Reading::QswitchUserCounter(_) => Field::QswitchUserCounter,
            Reading::QswitchInterlock(_) => Field::QswitchInterlock,
        }
    }

    /// On/off value of pump, simmer and Q-switch status readings.
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Reading::Pump(b) | Reading::Simmer(b) | Reading::QswitchStatus(b) => Some(*b),
            _ => None,
        }
    }
}

impl fmt::Display for Reading {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let on_off = |b: bool| if b { "ON" } else { "OFF" };
        match self {
            Reading::SerialNumber(s) => f.write_str(s),
            Reading::Pump(b) | Reading::Simmer(b) | Reading::QswitchStatus(b) => {
                f.write_str(on_off(*b))
            }
            Reading::CoolingTemperature(t) => write!(f, "{t:.1} C"),
            Reading::Shutter(s) => write!(f, "{s}"),
            Reading::FlashlampMode(m) => write!(f, "{m}"),
            Reading::FlashlampTrigger(t) => write!(f, "{t}"),
            Reading::FlashlampFrequency(v) => write!(f, "{v:.2} Hz"),
            Reading::FlashlampVoltage(v) => write!(f, "{v} V"),
            Reading::FlashlampEnergy(v) => write!(f, "{v:.1} J"),
            Reading::FlashlampCapacitance(v) => write!(f, "{v:.1} uF"),
            Reading::FlashlampCounter(n)
            | Reading::FlashlampUserCounter(n)
            | Reading::QswitchCounter(n)
            | Reading::QswitchUserCounter(n) => write!(f, "{n}"),
            Reading::FlashlampInterlock(il) => write!(f, "{il}"),
            Reading::QswitchMode(m) => write!(f, "{m}"),
            Reading::QswitchDelay(v) => write!(f, "{v} us"),
            Reading::QswitchDivider(v) | Reading::QswitchBurst(v) => write!(f, "{v}"),
            Reading::QswitchInterlock(il) => write!(f, "{il}"),
        }
    }
}

/// A value to write to a settable field.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Setting {
    Pump(bool),
    Shutter(ShutterState),
    FlashlampTrigger(Trigger),
    FlashlampFrequency(f64),
    FlashlampVoltage(u32),
    FlashlampEnergy(f64),
    FlashlampCapacitance(f64),
    QswitchMode(QswitchMode),
    QswitchDelay(u32),
    QswitchDivider(u32),
    QswitchBurst(u32),
}

impl Setting {
    /// Field the head echoes and that is read back after the write.
    pub const fn field(&self) -> Field {
        match self {
            Setting::Pump(_) => Field::Pump,
            Setting::Shutter(_) => Field::Shutter,
            Setting::FlashlampTrigger(_) => Field::FlashlampTrigger,
            Setting::FlashlampFrequency(_) => Field::FlashlampFrequency,
            Setting::FlashlampVoltage(_) => Field::FlashlampVoltage,
            Setting::FlashlampEnergy(_) => Field::FlashlampEnergy,
            Setting::FlashlampCapacitance(_) => Field::FlashlampCapacitance,
            Setting::QswitchMode(_) => Field::QswitchMode,
            Setting::QswitchDelay(_) => Field::QswitchDelay,
            Setting::QswitchDivider(_) => Field::QswitchDivider,
            Setting::QswitchBurst(_) => Field::QswitchBurst,
        }
    }

    /// Check bounds and quantize to the field's precision.
    ///
    /// Returns the value that will go on the wire. NaN and infinities are
    /// rejected; nothing is clamped.
    pub fn validate(&self) -> Result<Setting, ValidationError> {
        let field = self.field();
        Ok(match *self {
            Setting::FlashlampFrequency(v) => Setting::FlashlampFrequency(check_f64(field, v)?),
            Setting::FlashlampEnergy(v) => Setting::FlashlampEnergy(check_f64(field, v)?),
            Setting::FlashlampCapacitance(v) => Setting::FlashlampCapacitance(check_f64(field, v)?),
            Setting::FlashlampVoltage(v) => Setting::FlashlampVoltage(check_u32(field, v)?),
            Setting::QswitchDelay(v) => Setting::QswitchDelay(check_u32(field, v)?),
            Setting::QswitchDivider(v) => Setting::QswitchDivider(check_u32(field, v)?),
            Setting::QswitchBurst(v) => Setting::QswitchBurst(check_u32(field, v)?),
            other => other,
        })
    }

    /// The echo the head should produce once this setting is applied.
    pub fn expected_reading(&self) -> Reading {
        match *self {
            Setting::Pump(b) => Reading::Pump(b),
            Setting::Shutter(s) => Reading::Shutter(s),
            Setting::FlashlampTrigger(t) => Reading::FlashlampTrigger(t),
            Setting::FlashlampFrequency(v) => Reading::FlashlampFrequency(v),
            Setting::FlashlampVoltage(v) => Reading::FlashlampVoltage(v),
            Setting::FlashlampEnergy(v) => Reading::FlashlampEnergy(v),
            Setting::FlashlampCapacitance(v) => Reading::FlashlampCapacitance(v),
            Setting::QswitchMode(m) => Reading::QswitchMode(m),
            Setting::QswitchDelay(v) => Reading::QswitchDelay(v),
            Setting::QswitchDivider(v) => Reading::QswitchDivider(v),
            Setting::QswitchBurst(v) => Reading::QswitchBurst(v),
        }
    }
}

fn check_f64(field: Field, v: f64) -> Result<f64, ValidationError> {
    let Some(b) = field.bounds() else {
        return Ok(v);
    };
    let err = || ValidationError {
        param: field.name(),
        value: v,
        min: b.min,
        max: b.max,
    };
    if !v.is_finite() {
        return Err(err());
    }
    let q = round_to(v, b.decimals);
    if b.contains(q) { Ok(q) } else { Err(err()) }
}

fn check_u32(field: Field, v: u32) -> Result<u32, ValidationError> {
    match field.bounds() {
        Some(b) if !b.contains(f64::from(v)) => Err(ValidationError {
            param: field.name(),
            value: f64::from(v),
            min: b.min,
            max: b.max,
        }),
        _ => Ok(v),
    }
}

/// Commands without a value of their own.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Action {
    FlashlampActivate,
    FlashlampStop,
    Simmer,
    QswitchPowerOn,
    QswitchPowerOff,
    QswitchStart,
    QswitchStop,
    ResetFlashlampUserCounter,
    ResetQswitchUserCounter,
}

impl Action {
    pub const fn command(self) -> &'static str {
        match self {
            Action::FlashlampActivate => "A",
            Action::FlashlampStop => "S",
            Action::Simmer => "M",
            Action::QswitchPowerOn => "QSP1",
            Action::QswitchPowerOff => "QSP0",
            Action::QswitchStart => "QSR1",
            Action::QswitchStop => "QSR0",
            Action::ResetFlashlampUserCounter => "UC0",
            Action::ResetQswitchUserCounter => "QSU0",
        }
    }
}

/// The closed set of things the codec can put on the wire.
#[derive(Debug, Clone, PartialEq)]
pub enum Operation {
    Read(Field),
    Write(Setting),
    Action(Action),
    /// Sent verbatim, reply passed through undecoded.
    Custom(String),
}

#[derive(Debug, Clone, PartialEq)]
pub enum Decoded {
    Reading(Reading),
    Ack,
    Raw(String),
}

pub fn encode(op: &Operation) -> String {
    match op {
        Operation::Read(field) => field.query().to_string(),
        Operation::Write(setting) => encode_write(setting),
        Operation::Action(action) => action.command().to_string(),
        Operation::Custom(raw) => raw.clone(),
    }
}

fn encode_write(setting: &Setting) -> String {
    match *setting {
        Setting::Pump(on) => format!("P{}", u8::from(on)),
        Setting::Shutter(s) => format!("R{}", u8::from(s == ShutterState::Open)),
        Setting::FlashlampTrigger(t) => format!("LPM{}", t.code()),
        Setting::FlashlampFrequency(v) => format!("F{v:05.2}"),
        Setting::FlashlampVoltage(v) => format!("V{v:04}"),
        Setting::FlashlampEnergy(v) => format!("E{v:04.1}"),
        Setting::FlashlampCapacitance(v) => format!("C{v:04.1}"),
        Setting::QswitchMode(m) => format!("QSM{}", m.code()),
        Setting::QswitchDelay(v) => format!("W{v:03}"),
        Setting::QswitchDivider(v) => format!("QSF{v:02}"),
        Setting::QswitchBurst(v) => format!("B{v:03}"),
    }
}

/// Map a raw mnemonic back to the operation it encodes.
///
/// Unknown mnemonics are [`ProtocolError::Unsupported`].
pub fn parse_command(command: &str) -> Result<Operation, ProtocolError> {
    let command = command.trim();
    // "WOR" maps to the flashlamp mode half of the status word.
    if let Some(field) = Field::ALL.iter().copied().find(|f| f.query() == command) {
        return Ok(Operation::Read(field));
    }
    const ACTIONS: [Action; 9] = [
        Action::FlashlampActivate,
        Action::FlashlampStop,
        Action::Simmer,
        Action::QswitchPowerOn,
        Action::QswitchPowerOff,
        Action::QswitchStart,
        Action::QswitchStop,
        Action::ResetFlashlampUserCounter,
        Action::ResetQswitchUserCounter,
    ];
    if let Some(action) = ACTIONS.iter().copied().find(|a| a.command() == command) {
        return Ok(Operation::Action(action));
    }
    let unsupported = || ProtocolError::Unsupported {
        command: command.to_string(),
    };
    const PREFIXES: [&str; 11] = ["QSM", "QSF", "LPM", "P", "R", "F", "V", "E", "C", "W", "B"];
    let prefix = PREFIXES
        .iter()
        .copied()
        .find(|p| command.len() > p.len() && command.starts_with(p))
        .ok_or_else(unsupported)?;
    let arg = &command[prefix.len()..];
    let int = || arg.parse::<u32>().map_err(|_| unsupported());
    let float = || arg.parse::<f64>().map_err(|_| unsupported());
    let flag = || match arg {
        "0" => Ok(false),
        "1" => Ok(true),
        _ => Err(unsupported()),
    };
    let setting = match prefix {
        "P" => Setting::Pump(flag()?),
        "R" => Setting::Shutter(if flag()? {
            ShutterState::Open
        } else {
            ShutterState::Closed
        }),
        "LPM" => Setting::FlashlampTrigger(
            u8::try_from(int()?)
                .ok()
                .and_then(Trigger::from_code)
                .ok_or_else(unsupported)?,
        ),
        "QSM" => Setting::QswitchMode(
            u8::try_from(int()?)
                .ok()
                .and_then(QswitchMode::from_code)
                .ok_or_else(unsupported)?,
        ),
        "F" => Setting::FlashlampFrequency(float()?),
        "V" => Setting::FlashlampVoltage(int()?),
        "E" => Setting::FlashlampEnergy(float()?),
        "C" => Setting::FlashlampCapacitance(float()?),
        "W" => Setting::QswitchDelay(int()?),
        "QSF" => Setting::QswitchDivider(int()?),
        _ => Setting::QswitchBurst(int()?),
    };
    Ok(Operation::Write(setting))
}

fn is_error_marker(raw: &str) -> bool {
    raw.starts_with('?') || raw.starts_with("ERR")
}

pub fn decode(op: &Operation, raw: &str) -> Result<Decoded, ProtocolError> {
    if let Operation::Custom(_) = op {
        return Ok(Decoded::Raw(raw.to_string()));
    }
    let reply = raw.trim();
    if is_error_marker(reply) {
        return Err(ProtocolError::Rejected {
            command: encode(op),
            raw: reply.to_string(),
        });
    }
    match op {
        Operation::Read(field) => parse_reading(*field, reply).map(Decoded::Reading),
        Operation::Write(setting) => parse_reading(setting.field(), reply).map(Decoded::Reading),
        Operation::Action(_) | Operation::Custom(_) => Ok(Decoded::Ack),
    }
}

/// Parse a reply (or write echo) for `field`.
pub fn parse_reading(field: Field, reply: &str) -> Result<Reading, ProtocolError> {
    let malformed = || ProtocolError::Malformed {
        command: field.query().to_string(),
        raw: reply.to_string(),
    };
    let out_of_range = || ProtocolError::OutOfRange {
        field,
        raw: reply.to_string(),
    };

    let payload = reply
        .strip_prefix(field.label())
        .and_then(|rest| rest.strip_prefix(' '))
        .ok_or_else(malformed)?;
    let value = match field.unit() {
        Some(unit) => payload
            .strip_suffix(unit)
            .and_then(|rest| rest.strip_suffix(' '))
            .ok_or_else(malformed)?,
        None => payload,
    }
    .trim();
    if value.is_empty() {
        return Err(malformed());
    }

    let flag = |s: &str| match s {
        "0" => Ok(false),
        "1" => Ok(true),
        _ => Err(malformed()),
    };
    let int = |s: &str| s.parse::<u64>().map_err(|_| malformed());
    let bounded_u32 = |s: &str| -> Result<u32, ProtocolError> {
        let v = int(s)?;
        let b = field.bounds().ok_or_else(malformed)?;
        match u32::try_from(v) {
            Ok(v) if b.contains(f64::from(v)) => Ok(v),
            _ => Err(out_of_range()),
        }
    };
    let float = |s: &str| match s.parse::<f64>() {
        Ok(v) if v.is_finite() => Ok(v),
        _ => Err(malformed()),
    };
    let bounded_f64 = |s: &str| -> Result<f64, ProtocolError> {
        let v = float(s)?;
        let b = field.bounds().ok_or_else(malformed)?;
        if b.contains(v) { Ok(v) } else { Err(out_of_range()) }
    };
    let code = |s: &str| s.parse::<u8>().map_err(|_| malformed());
    let hex4 = |s: &str| {
        if s.len() == 4 {
            u16::from_str_radix(s, 16).map_err(|_| malformed())
        } else {
            Err(malformed())
        }
    };
    let status_word = |s: &str| -> Result<(u8, bool), ProtocolError> {
        let mut parts = s.split_whitespace();
        match (parts.next(), parts.next(), parts.next()) {
            (Some(mode), Some(simmer), None) => Ok((code(mode)?, flag(simmer)?)),
            _ => Err(malformed()),
        }
    };

    Ok(match field {
        Field::SerialNumber => Reading::SerialNumber(value.to_string()),
        Field::Pump => Reading::Pump(flag(value)?),
        Field::CoolingTemperature => Reading::CoolingTemperature(float(value)?),
        Field::Shutter => Reading::Shutter(match value {
            "open" => ShutterState::Open,
            "closed" => ShutterState::Closed,
            _ => return Err(malformed()),
        }),
        Field::FlashlampMode => {
            let (mode, _) = status_word(value)?;
            Reading::FlashlampMode(FlashlampMode::from_code(mode).ok_or_else(malformed)?)
        }
        Field::Simmer => {
            let (mode, simmer) = status_word(value)?;
            FlashlampMode::from_code(mode).ok_or_else(malformed)?;
            Reading::Simmer(simmer)
        }
        Field::FlashlampTrigger => {
            Reading::FlashlampTrigger(Trigger::from_code(code(value)?).ok_or_else(malformed)?)
        }
        Field::FlashlampFrequency => Reading::FlashlampFrequency(bounded_f64(value)?),
        Field::FlashlampVoltage => Reading::FlashlampVoltage(bounded_u32(value)?),
        Field::FlashlampEnergy => Reading::FlashlampEnergy(bounded_f64(value)?),
        Field::FlashlampCapacitance => Reading::FlashlampCapacitance(bounded_f64(value)?),
        Field::FlashlampCounter => Reading::FlashlampCounter(int(value)?),
        Field::FlashlampUserCounter => Reading::FlashlampUserCounter(int(value)?),
        Field::FlashlampInterlock => Reading::FlashlampInterlock(
            FlashlampInterlock::from_bits(hex4(value)?).ok_or_else(out_of_range)?,
        ),
        Field::QswitchStatus => Reading::QswitchStatus(flag(value)?),
        Field::QswitchMode => {
            Reading::QswitchMode(QswitchMode::from_code(code(value)?).ok_or_else(malformed)?)
        }
        Field::QswitchDelay => Reading::QswitchDelay(bounded_u32(value)?),
        Field::QswitchDivider => Reading::QswitchDivider(bounded_u32(value)?),
        Field::QswitchBurst => Reading::QswitchBurst(bounded_u32(value)?),
        Field::QswitchCounter => Reading::QswitchCounter(int(value)?),
        Field::QswitchUserCounter => Reading::QswitchUserCounter(int(value)?),
        Field::QswitchInterlock => Reading::QswitchInterlock(
            QswitchInterlock::from_bits(hex4(value)?).ok_or_else(out_of_range)?,
        ),
    })
}

/// Device-side reply text for a reading.
///
/// The status word carries both the flashlamp mode and simmer; rendering
/// one of them reports the other half as zero.
pub fn render(reading: &Reading) -> String {
    let field = reading.field();
    let payload = match reading {
        Reading::SerialNumber(s) => s.clone(),
        Reading::Pump(b) | Reading::QswitchStatus(b) => u8::from(*b).to_string(),
        Reading::CoolingTemperature(v) => format!("{v:.1}"),
        Reading::Shutter(s) => match s {
            ShutterState::Open => "open".to_string(),
            ShutterState::Closed => "closed".to_string(),
        },
        Reading::FlashlampMode(m) => format!("{} 0", m.code()),
        Reading::Simmer(b) => format!("0 {}", u8::from(*b)),
        Reading::FlashlampTrigger(t) => t.code().to_string(),
        Reading::FlashlampFrequency(v) => format!("{v:.2}"),
        Reading::FlashlampEnergy(v) | Reading::FlashlampCapacitance(v) => format!("{v:.1}"),
        Reading::FlashlampVoltage(v)
        | Reading::QswitchDelay(v)
        | Reading::QswitchDivider(v)
        | Reading::QswitchBurst(v) => v.to_string(),
        Reading::FlashlampCounter(n)
        | Reading::FlashlampUserCounter(n)
        | Reading::QswitchCounter(n)
        | Reading::QswitchUserCounter(n) => n.to_string(),
        Reading::FlashlampInterlock(il) => format!("{:04X}", il.bits()),
        Reading::QswitchMode(m) => m.code().to_string(),
        Reading::QswitchInterlock(il) => format!("{:04X}", il.bits()),
    };
    match field.unit() {
        Some(unit) => format!("{} {payload} {unit}", field.label()),
        None => format!("{} {payload}", field.label()),
    }
}
