//! In-memory emulation of the Big Sky laser firmware.
//!
//! Replies follow the firmware's `<label> <payload>[ <unit>]` format, writes
//! are echoed in query format and anything the firmware refuses is answered
//! with `?`. Commands listed in `timeout_on` never get a reply, which lets
//! tests and the CLI exercise the timeout paths without a serial cable.
use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use yag_traits::Transport;

use crate::error::HwError;

const REJECT: &str = "?";
/// Commands kept in `SimState::log`; older entries are dropped.
pub const LOG_CAPACITY: usize = 4096;

/// Flashlamp interlock bit: water flow (set while the pump is off).
pub const FL_INTLK_WATER_FLOW: u16 = 1 << 0;
/// Q-switch interlock bit: shutter closed.
pub const QS_INTLK_SHUTTER_CLOSED: u16 = 1 << 2;

#[derive(Debug, Clone)]
pub struct SimState {
    pub open_port: Option<String>,
    pub serial_number: String,
    pub temperature_c: f64,
    pub pump: bool,
    pub shutter_open: bool,
    /// 0 = stop, 1 = single, 2 = start
    pub flashlamp_mode: u8,
    pub simmer: bool,
    pub trigger_external: bool,
    pub frequency_hz: f64,
    pub voltage_v: u32,
    pub energy_j: f64,
    pub capacitance_uf: f64,
    pub flashlamp_counter: u64,
    pub flashlamp_user_counter: u64,
    /// Extra flashlamp interlock bits forced on top of the derived ones.
    pub flashlamp_faults: u16,
    pub qswitch_powered: bool,
    pub qswitch_running: bool,
    /// 0 = auto, 1 = burst, 2 = external
    pub qswitch_mode: u8,
    pub qswitch_delay_us: u32,
    pub qswitch_divider: u32,
    pub qswitch_burst: u32,
    pub qswitch_counter: u64,
    pub qswitch_user_counter: u64,
    /// Commands that are swallowed without a reply.
    pub timeout_on: Vec<String>,
    /// Commands answered with the firmware error marker.
    pub reject_on: Vec<String>,
    /// Most recent commands received, oldest first, at most `LOG_CAPACITY`.
    pub log: VecDeque<String>,
}

impl Default for SimState {
    fn default() -> Self {
        Self {
            open_port: None,
            serial_number: "184".to_string(),
            temperature_c: 24.5,
            pump: true,
            shutter_open: false,
            flashlamp_mode: 0,
            simmer: false,
            trigger_external: false,
            frequency_hz: 10.0,
            voltage_v: 1200,
            energy_j: 14.0,
            capacitance_uf: 30.0,
            flashlamp_counter: 125_000,
            flashlamp_user_counter: 340,
            flashlamp_faults: 0,
            qswitch_powered: false,
            qswitch_running: false,
            qswitch_mode: 0,
            qswitch_delay_us: 150,
            qswitch_divider: 1,
            qswitch_burst: 10,
            qswitch_counter: 98_000,
            qswitch_user_counter: 120,
            timeout_on: Vec::new(),
            reject_on: Vec::new(),
            log: VecDeque::new(),
        }
    }
}

impl SimState {
    fn flashlamp_interlock(&self) -> u16 {
        let mut bits = self.flashlamp_faults;
        if !self.pump {
            bits |= FL_INTLK_WATER_FLOW;
        }
        bits
    }

    fn qswitch_interlock(&self) -> u16 {
        if self.shutter_open {
            0
        } else {
            QS_INTLK_SHUTTER_CLOSED
        }
    }

    fn firing(&self) -> bool {
        self.flashlamp_mode != 0
    }

    fn reply(&self, query: &str) -> Option<String> {
        let r = match query {
            "SN" => format!("SN {}", self.serial_number),
            "CG" => format!("temp. CG {:.1} C", self.temperature_c),
            "P" => format!("pump {}", u8::from(self.pump)),
            "R" => format!(
                "shutter {}",
                if self.shutter_open { "open" } else { "closed" }
            ),
            "WOR" => format!("status {} {}", self.flashlamp_mode, u8::from(self.simmer)),
            "LPM" => format!("trig. {}", u8::from(self.trigger_external)),
            "F" => format!("freq. {:.2} Hz", self.frequency_hz),
            "V" => format!("volt. {} V", self.voltage_v),
            "E" => format!("ener. {:.1} J", self.energy_j),
            "C" => format!("capa. {:.1} uF", self.capacitance_uf),
            "CPT" => format!("cpt. {}", self.flashlamp_counter),
            "UC" => format!("user cpt. {}", self.flashlamp_user_counter),
            "IF" => format!("interlock {:04X}", self.flashlamp_interlock()),
            "QS" => format!("qs. {}", u8::from(self.qswitch_running)),
            "QSM" => format!("qs mode {}", self.qswitch_mode),
            "W" => format!("delay {} us", self.qswitch_delay_us),
            "QSF" => format!("f div. {}", self.qswitch_divider),
            "B" => format!("burst {}", self.qswitch_burst),
            "QSC" => format!("qs cpt. {}", self.qswitch_counter),
            "QSU" => format!("qs user cpt. {}", self.qswitch_user_counter),
            "IQ" => format!("qs intlk {:04X}", self.qswitch_interlock()),
            _ => return None,
        };
        Some(r)
    }

    /// Run one command against the emulated firmware; `None` means rejected.
    fn execute(&mut self, command: &str) -> Option<String> {
        if let Some(r) = self.reply(command) {
            return Some(r);
        }
        match command {
            "A" => {
                if !self.pump || self.flashlamp_interlock() != 0 {
                    return None;
                }
                self.flashlamp_mode = 2;
                return Some("A".to_string());
            }
            "S" => {
                self.flashlamp_mode = 0;
                return Some("S".to_string());
            }
            "M" => {
                self.simmer = true;
                return Some("M".to_string());
            }
            "QSP1" => {
                self.qswitch_powered = true;
                return Some("QSP1".to_string());
            }
            "QSP0" => {
                self.qswitch_powered = false;
                self.qswitch_running = false;
                return Some("QSP0".to_string());
            }
            "QSR1" => {
                if !self.qswitch_powered {
                    return None;
                }
                self.qswitch_running = true;
                return Some("QSR1".to_string());
            }
            "QSR0" => {
                self.qswitch_running = false;
                return Some("QSR0".to_string());
            }
            "UC0" => {
                self.flashlamp_user_counter = 0;
                return self.reply("UC");
            }
            "QSU0" => {
                self.qswitch_user_counter = 0;
                return self.reply("QSU");
            }
            _ => {}
        }

        // Parameter writes: longest prefixes first so "QSM1" never reads as "Q" + "SM1".
        const WRITES: [&str; 11] = ["QSM", "QSF", "LPM", "P", "R", "F", "V", "E", "C", "W", "B"];
        let prefix = WRITES.iter().find(|p| {
            command.len() > p.len()
                && command.starts_with(**p)
                && command[p.len()..].bytes().all(|b| b.is_ascii_digit() || b == b'.')
        })?;
        let arg = &command[prefix.len()..];
        match *prefix {
            "P" => self.pump = parse_flag(arg)?,
            "R" => self.shutter_open = parse_flag(arg)?,
            "LPM" => self.trigger_external = parse_flag(arg)?,
            "QSM" => self.qswitch_mode = parse_in(arg, 0, 2)?,
            "F" => self.frequency_hz = parse_f64_in(arg, 1.0, 99.99)?,
            "V" => self.voltage_v = parse_in(arg, 500, 1800)?,
            "E" => self.energy_j = parse_f64_in(arg, 7.0, 23.0)?,
            "C" => self.capacitance_uf = parse_f64_in(arg, 27.0, 33.0)?,
            "W" => self.qswitch_delay_us = parse_in(arg, 10, 999)?,
            "QSF" => self.qswitch_divider = parse_in(arg, 1, 99)?,
            "B" => self.qswitch_burst = parse_in(arg, 1, 999)?,
            _ => return None,
        }
        let query = match *prefix {
            "P" => "P",
            "R" => "R",
            "LPM" => "LPM",
            "QSM" => "QSM",
            "F" => "F",
            "V" => "V",
            "E" => "E",
            "C" => "C",
            "W" => "W",
            "QSF" => "QSF",
            _ => "B",
        };
        self.reply(query)
    }

    fn tick_counters(&mut self) {
        if self.firing() {
            self.flashlamp_counter += 1;
            self.flashlamp_user_counter += 1;
            if self.qswitch_running {
                self.qswitch_counter += 1;
                self.qswitch_user_counter += 1;
            }
        }
    }
}

fn parse_flag(arg: &str) -> Option<bool> {
    match arg {
        "0" => Some(false),
        "1" => Some(true),
        _ => None,
    }
}

fn parse_in<T>(arg: &str, min: T, max: T) -> Option<T>
where
    T: std::str::FromStr + PartialOrd,
{
    let v: T = arg.parse().ok()?;
    (v >= min && v <= max).then_some(v)
}

fn parse_f64_in(arg: &str, min: f64, max: f64) -> Option<f64> {
    let v: f64 = arg.parse().ok()?;
    (v.is_finite() && v >= min && v <= max).then_some(v)
}

/// Shared view of a simulator's state for tests and the CLI.
#[derive(Debug, Clone)]
pub struct SimHandle(Arc<Mutex<SimState>>);

impl SimHandle {
    fn lock(&self) -> MutexGuard<'_, SimState> {
        self.0.lock().unwrap_or_else(|p| p.into_inner())
    }

    pub fn snapshot(&self) -> SimState {
        self.lock().clone()
    }

    pub fn update(&self, f: impl FnOnce(&mut SimState)) {
        f(&mut self.lock());
    }

    /// Commands received so far, in order.
    pub fn sent(&self) -> Vec<String> {
        self.lock().log.iter().cloned().collect()
    }
}

/// Simulated laser head implementing `Transport`.
#[derive(Debug)]
pub struct SimulatedLaser {
    state: Arc<Mutex<SimState>>,
    latency: Duration,
}

impl Default for SimulatedLaser {
    fn default() -> Self {
        Self::new()
    }
}

impl SimulatedLaser {
    pub fn new() -> Self {
        Self::with_state(SimState::default())
    }

    pub fn with_state(state: SimState) -> Self {
        Self {
            state: Arc::new(Mutex::new(state)),
            latency: Duration::ZERO,
        }
    }

    /// Delay every reply by `latency` to mimic the 9600 baud round trip.
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    /// Never answer `command`; the caller sees `HwError::Timeout`.
    pub fn timeout_on(self, command: impl Into<String>) -> Self {
        self.handle().update(|s| s.timeout_on.push(command.into()));
        self
    }

    /// Answer `command` with the firmware error marker.
    pub fn reject_on(self, command: impl Into<String>) -> Self {
        self.handle().update(|s| s.reject_on.push(command.into()));
        self
    }

    pub fn handle(&self) -> SimHandle {
        SimHandle(self.state.clone())
    }
}

impl Transport for SimulatedLaser {
    fn open(&mut self, port: &str) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        self.handle().update(|s| s.open_port = Some(port.to_string()));
        tracing::debug!(port, "simulated laser connected");
        Ok(())
    }

    fn close(&mut self) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        self.handle().update(|s| s.open_port = None);
        Ok(())
    }

    fn send(&mut self, command: &str) -> Result<String, Box<dyn std::error::Error + Send + Sync>> {
        if !self.latency.is_zero() {
            std::thread::sleep(self.latency);
        }
        let handle = self.handle();
        let mut st = handle.lock();
        if st.open_port.is_none() {
            return Err(Box::new(HwError::NotOpen));
        }
        if st.log.len() == LOG_CAPACITY {
            st.log.pop_front();
        }
        st.log.push_back(command.to_string());
        if st.timeout_on.iter().any(|c| c == command) {
            return Err(Box::new(HwError::Timeout));
        }
        if st.reject_on.iter().any(|c| c == command) {
            return Ok(REJECT.to_string());
        }
        st.tick_counters();
        Ok(st.execute(command).unwrap_or_else(|| REJECT.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn open_sim() -> SimulatedLaser {
        let mut sim = SimulatedLaser::new();
        sim.open("SIM").unwrap();
        sim
    }

    #[test]
    fn queries_use_firmware_reply_format() {
        let mut sim = open_sim();
        assert_eq!(sim.send("F").unwrap(), "freq. 10.00 Hz");
        assert_eq!(sim.send("R").unwrap(), "shutter closed");
        assert_eq!(sim.send("WOR").unwrap(), "status 0 0");
        assert_eq!(sim.send("IQ").unwrap(), "qs intlk 0004");
    }

    #[test]
    fn writes_echo_in_query_format() {
        let mut sim = open_sim();
        assert_eq!(sim.send("F12.50").unwrap(), "freq. 12.50 Hz");
        assert_eq!(sim.send("V0900").unwrap(), "volt. 900 V");
        assert_eq!(sim.send("QSM1").unwrap(), "qs mode 1");
        assert_eq!(sim.send("R1").unwrap(), "shutter open");
    }

    #[test]
    fn out_of_range_and_unknown_commands_are_rejected() {
        let mut sim = open_sim();
        assert_eq!(sim.send("V2000").unwrap(), "?");
        assert_eq!(sim.send("XYZ").unwrap(), "?");
        assert_eq!(sim.handle().snapshot().voltage_v, 1200);
    }

    #[test]
    fn qswitch_needs_power_before_start() {
        let mut sim = open_sim();
        assert_eq!(sim.send("QSR1").unwrap(), "?");
        sim.send("QSP1").unwrap();
        sim.send("QSR1").unwrap();
        assert_eq!(sim.send("QS").unwrap(), "qs. 1");
    }

    #[test]
    fn flashlamp_refuses_to_fire_without_water() {
        let mut sim = open_sim();
        sim.send("P0").unwrap();
        assert_eq!(sim.send("A").unwrap(), "?");
        assert_eq!(sim.send("IF").unwrap(), "interlock 0001");
    }

    #[test]
    fn injected_timeout_surfaces_as_hw_timeout() {
        let mut sim = SimulatedLaser::new().timeout_on("A");
        sim.open("SIM").unwrap();
        let err = sim.send("A").unwrap_err();
        assert!(matches!(err.downcast_ref::<HwError>(), Some(HwError::Timeout)));
    }

    #[test]
    fn command_log_keeps_only_the_latest_entries() {
        let mut sim = open_sim();
        for _ in 0..LOG_CAPACITY {
            sim.send("F").unwrap();
        }
        sim.send("SN").unwrap();
        let sent = sim.handle().sent();
        assert_eq!(sent.len(), LOG_CAPACITY);
        assert_eq!(sent.last().map(String::as_str), Some("SN"));
    }

    #[test]
    fn closed_port_refuses_traffic() {
        let mut sim = SimulatedLaser::new();
        let err = sim.send("SN").unwrap_err();
        assert!(matches!(err.downcast_ref::<HwError>(), Some(HwError::NotOpen)));
    }
}
