#![cfg_attr(all(not(debug_assertions), not(test)), deny(warnings))]
#![cfg_attr(
    all(not(debug_assertions), not(test)),
    deny(clippy::all, clippy::pedantic, clippy::nursery)
)]
#![allow(clippy::module_name_repetitions, clippy::missing_errors_doc)]
//! Config schema and settings store for the YAG controller.
//!
//! - `Config` and its sections are deserialized from TOML and validated.
//! - `[setting]` is kept as a flat key/value `Settings` store; the core reads
//!   the poll interval and initial laser parameters from it by key.
use std::collections::BTreeMap;

use serde::Deserialize;

/// Serial link parameters.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct Connection {
    /// Serial device path, e.g. "/dev/ttyUSB0" or "COM3"
    pub port: String,
    pub baud_rate: u32,
    /// Reply deadline per command (ms)
    pub timeout_ms: u64,
}

impl Default for Connection {
    fn default() -> Self {
        Self {
            port: "/dev/ttyUSB0".to_string(),
            baud_rate: 9600,
            timeout_ms: 500,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct Timing {
    /// Pause between the sub-steps of activate/deactivate (ms)
    pub settle_ms: u64,
    /// Pause between Q-switch start/stop and power on/off (ms)
    pub qswitch_settle_ms: u64,
    /// Worker wait when no intent is pending (ms)
    pub idle_ms: u64,
}

impl Default for Timing {
    fn default() -> Self {
        Self {
            settle_ms: 50,
            qswitch_settle_ms: 50,
            idle_ms: 50,
        }
    }
}

/// What deactivation does with the safety shutter.
#[derive(Debug, Deserialize, Clone, Copy, Default, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub enum DeactivateShutter {
    #[default]
    Close,
    LeaveOpen,
}

#[derive(Debug, Deserialize, Default)]
#[serde(default)]
pub struct SequenceSection {
    pub deactivate_shutter: DeactivateShutter,
}

#[derive(Debug, Deserialize, Default)]
#[serde(default)]
pub struct Logging {
    pub file: Option<String>,  // path to .log (JSON lines)
    pub level: Option<String>, // "info","debug"
    /// Log rotation policy: "never" | "daily" | "hourly" (default: never)
    pub rotation: Option<String>,
}

/// Flat key/value settings store (`[setting]` table).
///
/// Values are kept as raw TOML values and converted on access, so the same
/// key may be written as `10`, `10.0` or `"10"`.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(transparent)]
pub struct Settings(BTreeMap<String, toml::Value>);

impl Settings {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<toml::Value>) {
        self.0.insert(key.into(), value.into());
    }

    pub fn contains(&self, key: &str) -> bool {
        self.0.contains_key(key)
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }

    /// Integer value of `key`; `Ok(None)` when the key is absent.
    pub fn get_int(&self, key: &str) -> eyre::Result<Option<i64>> {
        let Some(v) = self.0.get(key) else {
            return Ok(None);
        };
        let n = match v {
            toml::Value::Integer(i) => *i,
            toml::Value::Float(f) if f.fract() == 0.0 && f.is_finite() => *f as i64,
            toml::Value::String(s) => s
                .trim()
                .parse::<i64>()
                .map_err(|_| eyre::eyre!("setting.{key} must be an integer, got {s:?}"))?,
            other => eyre::bail!("setting.{key} must be an integer, got {other}"),
        };
        Ok(Some(n))
    }

    /// Float value of `key`; integers are widened.
    pub fn get_float(&self, key: &str) -> eyre::Result<Option<f64>> {
        let Some(v) = self.0.get(key) else {
            return Ok(None);
        };
        let x = match v {
            toml::Value::Float(f) => *f,
            toml::Value::Integer(i) => *i as f64,
            toml::Value::String(s) => s
                .trim()
                .parse::<f64>()
                .map_err(|_| eyre::eyre!("setting.{key} must be a number, got {s:?}"))?,
            other => eyre::bail!("setting.{key} must be a number, got {other}"),
        };
        Ok(Some(x))
    }

    pub fn get_string(&self, key: &str) -> eyre::Result<Option<String>> {
        match self.0.get(key) {
            None => Ok(None),
            Some(toml::Value::String(s)) => Ok(Some(s.clone())),
            Some(toml::Value::Integer(i)) => Ok(Some(i.to_string())),
            Some(toml::Value::Float(f)) => Ok(Some(f.to_string())),
            Some(toml::Value::Boolean(b)) => Ok(Some(b.to_string())),
            Some(other) => eyre::bail!("setting.{key} must be a scalar, got {other}"),
        }
    }

    /// Boolean value of `key`. Strings accept true/false, yes/no, on/off, 1/0.
    pub fn get_bool(&self, key: &str) -> eyre::Result<Option<bool>> {
        let Some(v) = self.0.get(key) else {
            return Ok(None);
        };
        let b = match v {
            toml::Value::Boolean(b) => *b,
            toml::Value::Integer(0) => false,
            toml::Value::Integer(1) => true,
            toml::Value::String(s) => match s.trim().to_ascii_lowercase().as_str() {
                "true" | "yes" | "on" | "1" => true,
                "false" | "no" | "off" | "0" => false,
                _ => eyre::bail!("setting.{key} must be a boolean, got {s:?}"),
            },
            other => eyre::bail!("setting.{key} must be a boolean, got {other}"),
        };
        Ok(Some(b))
    }
}

/// Keys holding integer parameters.
const INT_KEYS: [&str; 4] = [
    "flashlamp_voltage_V",
    "qswitch_delay_us",
    "qswitch_freq_divider",
    "qswitch_burst_pulses",
];
/// Keys holding float parameters.
const FLOAT_KEYS: [&str; 4] = [
    "flashlamp_frequency_Hz",
    "flashlamp_energy_J",
    "flashlamp_capacitance_uF",
    "loop_cycle_seconds",
];

#[derive(Debug, Deserialize, Default)]
#[serde(default)]
pub struct Config {
    pub connection: Connection,
    pub timing: Timing,
    pub sequence: SequenceSection,
    pub logging: Logging,
    /// Flat settings store, keys as written in the file
    pub setting: Settings,
}

pub fn load_toml(s: &str) -> Result<Config, toml::de::Error> {
    toml::from_str::<Config>(s)
}

impl Config {
    pub fn validate(&self) -> eyre::Result<()> {
        // Connection
        if self.connection.port.trim().is_empty() {
            eyre::bail!("connection.port must not be empty");
        }
        if self.connection.baud_rate == 0 {
            eyre::bail!("connection.baud_rate must be > 0");
        }
        if self.connection.timeout_ms == 0 {
            eyre::bail!("connection.timeout_ms must be >= 1");
        }
        if self.connection.timeout_ms > 60_000 {
            eyre::bail!("connection.timeout_ms is unreasonably large (>60s)");
        }

        // Timing
        if self.timing.settle_ms > 10_000 {
            eyre::bail!("timing.settle_ms is unreasonably large (>10s)");
        }
        if self.timing.qswitch_settle_ms > 10_000 {
            eyre::bail!("timing.qswitch_settle_ms is unreasonably large (>10s)");
        }
        if self.timing.idle_ms == 0 || self.timing.idle_ms > 1_000 {
            eyre::bail!("timing.idle_ms must be in [1, 1000]");
        }

        // Logging
        if let Some(rot) = self.logging.rotation.as_deref()
            && !matches!(rot, "never" | "daily" | "hourly")
        {
            eyre::bail!("logging.rotation must be one of never, daily, hourly (got {rot:?})");
        }

        // Settings: type checks only, parameter bounds belong to the laser model
        for key in INT_KEYS {
            self.setting.get_int(key)?;
        }
        for key in FLOAT_KEYS {
            self.setting.get_float(key)?;
        }
        self.setting.get_bool("apply_on_connect")?;
        if let Some(s) = self.setting.get_float("loop_cycle_seconds")?
            && !(s.is_finite() && s >= 0.0)
        {
            eyre::bail!("setting.loop_cycle_seconds must be >= 0");
        }
        if let Some(t) = self.setting.get_string("flashlamp_trigger")?
            && !matches!(t.to_ascii_lowercase().as_str(), "internal" | "external")
        {
            eyre::bail!("setting.flashlamp_trigger must be internal or external (got {t:?})");
        }
        if let Some(m) = self.setting.get_string("qswitch_mode")?
            && !matches!(m.to_ascii_lowercase().as_str(), "auto" | "burst" | "external")
        {
            eyre::bail!("setting.qswitch_mode must be auto, burst or external (got {m:?})");
        }

        Ok(())
    }
}
