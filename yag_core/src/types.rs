//! Typed values reported by the laser head.
use std::fmt;

use bitflags::bitflags;

/// Flashlamp driver mode from the status word.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FlashlampMode {
    Stop,
    Single,
    Start,
}

impl FlashlampMode {
    pub const fn code(self) -> u8 {
        match self {
            Self::Stop => 0,
            Self::Single => 1,
            Self::Start => 2,
        }
    }

    pub const fn from_code(code: u8) -> Option<Self> {
        match code {
            0 => Some(Self::Stop),
            1 => Some(Self::Single),
            2 => Some(Self::Start),
            _ => None,
        }
    }

    /// START and SINGLE both mean the lamp is firing.
    pub const fn is_firing(self) -> bool {
        matches!(self, Self::Start | Self::Single)
    }
}

impl fmt::Display for FlashlampMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Stop => "STOP",
            Self::Single => "SINGLE",
            Self::Start => "START",
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Trigger {
    Internal,
    External,
}

impl Trigger {
    pub const fn code(self) -> u8 {
        match self {
            Self::Internal => 0,
            Self::External => 1,
        }
    }

    pub const fn from_code(code: u8) -> Option<Self> {
        match code {
            0 => Some(Self::Internal),
            1 => Some(Self::External),
            _ => None,
        }
    }

    /// Case-insensitive "internal" / "external".
    pub fn from_name(name: &str) -> Option<Self> {
        match name.trim().to_ascii_lowercase().as_str() {
            "internal" => Some(Self::Internal),
            "external" => Some(Self::External),
            _ => None,
        }
    }
}

impl fmt::Display for Trigger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Internal => "INTERNAL",
            Self::External => "EXTERNAL",
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum QswitchMode {
    Auto,
    Burst,
    External,
}

impl QswitchMode {
    pub const fn code(self) -> u8 {
        match self {
            Self::Auto => 0,
            Self::Burst => 1,
            Self::External => 2,
        }
    }

    pub const fn from_code(code: u8) -> Option<Self> {
        match code {
            0 => Some(Self::Auto),
            1 => Some(Self::Burst),
            2 => Some(Self::External),
            _ => None,
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        match name.trim().to_ascii_lowercase().as_str() {
            "auto" => Some(Self::Auto),
            "burst" => Some(Self::Burst),
            "external" => Some(Self::External),
            _ => None,
        }
    }
}

impl fmt::Display for QswitchMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Auto => "AUTO",
            Self::Burst => "BURST",
            Self::External => "EXTERNAL",
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ShutterState {
    Closed,
    Open,
}

impl ShutterState {
    pub const fn toggled(self) -> Self {
        match self {
            Self::Closed => Self::Open,
            Self::Open => Self::Closed,
        }
    }
}

impl fmt::Display for ShutterState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Closed => "CLOSED",
            Self::Open => "OPEN",
        })
    }
}

bitflags! {
    /// Flashlamp interlocks; a set bit means the precondition FAILED.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct FlashlampInterlock: u16 {
        const WATER_FLOW = 1 << 0;
        const WATER_LEVEL = 1 << 1;
        const LAMP_HEAD_CONN = 1 << 2;
        const AUXILIARY_CONN = 1 << 3;
        const EXT_INTERLOCK = 1 << 4;
        const COVER_OPEN = 1 << 5;
        const CAPACITOR_LOAD_FAIL = 1 << 6;
        const SIMMER_FAIL = 1 << 7;
        const WATER_TEMP = 1 << 8;
    }
}

bitflags! {
    /// Q-switch interlocks; a set bit means the precondition FAILED.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct QswitchInterlock: u16 {
        const EMISSION_INHIBITED = 1 << 0;
        const WATER_TEMP = 1 << 1;
        const SHUTTER_CLOSED = 1 << 2;
    }
}

/// `WATER_FLOW|COVER_OPEN`, or `OK` when nothing failed.
pub(crate) fn describe_flags<I>(names: I) -> String
where
    I: Iterator<Item = &'static str>,
{
    let joined = names.collect::<Vec<_>>().join("|");
    if joined.is_empty() {
        "OK".to_string()
    } else {
        joined
    }
}

impl fmt::Display for FlashlampInterlock {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&describe_flags(self.iter_names().map(|(n, _)| n)))
    }
}

impl fmt::Display for QswitchInterlock {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&describe_flags(self.iter_names().map(|(n, _)| n)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flashlamp_mode_codes_are_canonical() {
        for m in [FlashlampMode::Stop, FlashlampMode::Single, FlashlampMode::Start] {
            assert_eq!(FlashlampMode::from_code(m.code()), Some(m));
        }
        assert_eq!(FlashlampMode::from_code(3), None);
        assert!(FlashlampMode::Single.is_firing());
        assert!(!FlashlampMode::Stop.is_firing());
    }

    #[test]
    fn interlocks_display_failed_bits() {
        let il = FlashlampInterlock::WATER_FLOW | FlashlampInterlock::COVER_OPEN;
        assert_eq!(il.to_string(), "WATER_FLOW|COVER_OPEN");
        assert_eq!(QswitchInterlock::empty().to_string(), "OK");
    }
}
