//! Last known device state.
//!
//! Each field is `Tracked`: never read, fresh, or stale. A failed read keeps
//! the previous value and only marks it stale. The model is a passive store;
//! it enforces no relation between fields.
use crate::codec::{Field, Reading};
use crate::error::YagError;
use crate::sequence::{LaserPhase, ShutterPolicy};
use crate::types::{
    FlashlampInterlock, FlashlampMode, QswitchInterlock, QswitchMode, ShutterState, Trigger,
};

#[derive(Debug, Clone, PartialEq)]
pub enum Tracked<T> {
    /// Not read since connect.
    Unknown,
    Fresh(T),
    Stale { last: Option<T>, error: String },
}

impl<T> Default for Tracked<T> {
    fn default() -> Self {
        Self::Unknown
    }
}

impl<T> Tracked<T> {
    /// Last known value, fresh or stale.
    pub fn value(&self) -> Option<&T> {
        match self {
            Self::Fresh(v) => Some(v),
            Self::Stale { last, .. } => last.as_ref(),
            Self::Unknown => None,
        }
    }

    pub fn fresh(&self) -> Option<&T> {
        match self {
            Self::Fresh(v) => Some(v),
            _ => None,
        }
    }

    pub fn is_stale(&self) -> bool {
        matches!(self, Self::Stale { .. })
    }

    pub fn error(&self) -> Option<&str> {
        match self {
            Self::Stale { error, .. } => Some(error),
            _ => None,
        }
    }

    fn update(&mut self, v: T) {
        *self = Self::Fresh(v);
    }

    fn mark_stale(&mut self, error: String) {
        let last = match std::mem::take(self) {
            Self::Fresh(v) => Some(v),
            Self::Stale { last, .. } => last,
            Self::Unknown => None,
        };
        *self = Self::Stale { last, error };
    }
}

/// Snapshot of everything known about one connected head.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct DeviceState {
    pub serial_number: Tracked<String>,
    pub pump: Tracked<bool>,
    pub temperature_cooling_group_c: Tracked<f64>,
    pub shutter: Tracked<ShutterState>,
    pub flashlamp_mode: Tracked<FlashlampMode>,
    pub simmer: Tracked<bool>,
    pub flashlamp_trigger: Tracked<Trigger>,
    pub flashlamp_frequency_hz: Tracked<f64>,
    pub flashlamp_voltage_v: Tracked<u32>,
    pub flashlamp_energy_j: Tracked<f64>,
    pub flashlamp_capacitance_uf: Tracked<f64>,
    pub flashlamp_counter: Tracked<u64>,
    pub flashlamp_user_counter: Tracked<u64>,
    pub flashlamp_interlock: Tracked<FlashlampInterlock>,
    pub qswitch_status: Tracked<bool>,
    pub qswitch_mode: Tracked<QswitchMode>,
    pub qswitch_delay_us: Tracked<u32>,
    pub qswitch_frequency_divider: Tracked<u32>,
    pub qswitch_burst_pulses: Tracked<u32>,
    pub qswitch_counter: Tracked<u64>,
    pub qswitch_user_counter: Tracked<u64>,
    pub qswitch_interlock: Tracked<QswitchInterlock>,
}

impl DeviceState {
    /// Stable phase implied by fresh shutter, Q-switch and flashlamp values.
    ///
    /// `None` while any of the three is not fresh. A fresh combination that is
    /// neither fully active nor fully deactivated maps to `Unknown`.
    pub fn phase(&self, policy: ShutterPolicy) -> Option<LaserPhase> {
        let shutter = *self.shutter.fresh()?;
        let qswitch = *self.qswitch_status.fresh()?;
        let mode = *self.flashlamp_mode.fresh()?;
        let phase = if shutter == ShutterState::Open && qswitch && mode.is_firing() {
            LaserPhase::Active
        } else if mode == FlashlampMode::Stop && !qswitch && shutter == policy.resting_shutter() {
            LaserPhase::Deactivated
        } else {
            LaserPhase::Unknown
        };
        Some(phase)
    }

    /// Fields currently marked stale.
    pub fn stale_fields(&self) -> Vec<Field> {
        Field::ALL
            .into_iter()
            .filter(|f| self.is_stale(*f))
            .collect()
    }

    /// Rendered value of `field`, `None` when it was never read.
    pub fn display(&self, field: Field) -> Option<String> {
        fn show<T: ToString>(t: &Tracked<T>) -> Option<String> {
            t.value().map(ToString::to_string)
        }
        match field {
            Field::SerialNumber => show(&self.serial_number),
            Field::Pump => self.pump.value().map(|v| on_off(*v)),
            Field::CoolingTemperature => self
                .temperature_cooling_group_c
                .value()
                .map(|v| format!("{v:.1} C")),
            Field::Shutter => show(&self.shutter),
            Field::FlashlampMode => show(&self.flashlamp_mode),
            Field::Simmer => self.simmer.value().map(|v| on_off(*v)),
            Field::FlashlampTrigger => show(&self.flashlamp_trigger),
            Field::FlashlampFrequency => self
                .flashlamp_frequency_hz
                .value()
                .map(|v| format!("{v:.2} Hz")),
            Field::FlashlampVoltage => self.flashlamp_voltage_v.value().map(|v| format!("{v} V")),
            Field::FlashlampEnergy => self.flashlamp_energy_j.value().map(|v| format!("{v:.1} J")),
            Field::FlashlampCapacitance => self
                .flashlamp_capacitance_uf
                .value()
                .map(|v| format!("{v:.1} uF")),
            Field::FlashlampCounter => show(&self.flashlamp_counter),
            Field::FlashlampUserCounter => show(&self.flashlamp_user_counter),
            Field::FlashlampInterlock => show(&self.flashlamp_interlock),
            Field::QswitchStatus => self.qswitch_status.value().map(|v| on_off(*v)),
            Field::QswitchMode => show(&self.qswitch_mode),
            Field::QswitchDelay => self.qswitch_delay_us.value().map(|v| format!("{v} us")),
            Field::QswitchDivider => show(&self.qswitch_frequency_divider),
            Field::QswitchBurst => show(&self.qswitch_burst_pulses),
            Field::QswitchCounter => show(&self.qswitch_counter),
            Field::QswitchUserCounter => show(&self.qswitch_user_counter),
            Field::QswitchInterlock => show(&self.qswitch_interlock),
        }
    }

    pub fn is_stale(&self, field: Field) -> bool {
        match field {
            Field::SerialNumber => self.serial_number.is_stale(),
            Field::Pump => self.pump.is_stale(),
            Field::CoolingTemperature => self.temperature_cooling_group_c.is_stale(),
            Field::Shutter => self.shutter.is_stale(),
            Field::FlashlampMode => self.flashlamp_mode.is_stale(),
            Field::Simmer => self.simmer.is_stale(),
            Field::FlashlampTrigger => self.flashlamp_trigger.is_stale(),
            Field::FlashlampFrequency => self.flashlamp_frequency_hz.is_stale(),
            Field::FlashlampVoltage => self.flashlamp_voltage_v.is_stale(),
            Field::FlashlampEnergy => self.flashlamp_energy_j.is_stale(),
            Field::FlashlampCapacitance => self.flashlamp_capacitance_uf.is_stale(),
            Field::FlashlampCounter => self.flashlamp_counter.is_stale(),
            Field::FlashlampUserCounter => self.flashlamp_user_counter.is_stale(),
            Field::FlashlampInterlock => self.flashlamp_interlock.is_stale(),
            Field::QswitchStatus => self.qswitch_status.is_stale(),
            Field::QswitchMode => self.qswitch_mode.is_stale(),
            Field::QswitchDelay => self.qswitch_delay_us.is_stale(),
            Field::QswitchDivider => self.qswitch_frequency_divider.is_stale(),
            Field::QswitchBurst => self.qswitch_burst_pulses.is_stale(),
            Field::QswitchCounter => self.qswitch_counter.is_stale(),
            Field::QswitchUserCounter => self.qswitch_user_counter.is_stale(),
            Field::QswitchInterlock => self.qswitch_interlock.is_stale(),
        }
    }
}

fn on_off(b: bool) -> String {
    let s = if b { "ON" } else { "OFF" };
    s.to_string()
}

/// Owner of the `DeviceState` for one connection.
#[derive(Debug, Default)]
pub struct DeviceModel {
    state: DeviceState,
}

impl DeviceModel {
    pub fn new() -> Self {
        Self::default()
    }

    /// Apply the outcome of one read. Each call is atomic with respect to
    /// `snapshot`.
    pub fn apply(&mut self, field: Field, outcome: &Result<Reading, YagError>) {
        match outcome {
            Ok(reading) => {
                debug_assert_eq!(reading.field(), field);
                self.store(reading.clone());
            }
            Err(e) => self.mark_stale(field, e),
        }
    }

    pub fn store(&mut self, reading: Reading) {
        let s = &mut self.state;
        match reading {
            Reading::SerialNumber(v) => s.serial_number.update(v),
            Reading::Pump(v) => s.pump.update(v),
            Reading::CoolingTemperature(v) => s.temperature_cooling_group_c.update(v),
            Reading::Shutter(v) => s.shutter.update(v),
            Reading::FlashlampMode(v) => s.flashlamp_mode.update(v),
            Reading::Simmer(v) => s.simmer.update(v),
            Reading::FlashlampTrigger(v) => s.flashlamp_trigger.update(v),
            Reading::FlashlampFrequency(v) => s.flashlamp_frequency_hz.update(v),
            Reading::FlashlampVoltage(v) => s.flashlamp_voltage_v.update(v),
            Reading::FlashlampEnergy(v) => s.flashlamp_energy_j.update(v),
            Reading::FlashlampCapacitance(v) => s.flashlamp_capacitance_uf.update(v),
            Reading::FlashlampCounter(v) => s.flashlamp_counter.update(v),
            Reading::FlashlampUserCounter(v) => s.flashlamp_user_counter.update(v),
            Reading::FlashlampInterlock(v) => s.flashlamp_interlock.update(v),
            Reading::QswitchStatus(v) => s.qswitch_status.update(v),
            Reading::QswitchMode(v) => s.qswitch_mode.update(v),
            Reading::QswitchDelay(v) => s.qswitch_delay_us.update(v),
            Reading::QswitchDivider(v) => s.qswitch_frequency_divider.update(v),
            Reading::QswitchBurst(v) => s.qswitch_burst_pulses.update(v),
            Reading::QswitchCounter(v) => s.qswitch_counter.update(v),
            Reading::QswitchUserCounter(v) => s.qswitch_user_counter.update(v),
            Reading::QswitchInterlock(v) => s.qswitch_interlock.update(v),
        }
    }

    pub fn mark_stale(&mut self, field: Field, error: &YagError) {
        let e = error.to_string();
        let s = &mut self.state;
        match field {
            Field::SerialNumber => s.serial_number.mark_stale(e),
            Field::Pump => s.pump.mark_stale(e),
            Field::CoolingTemperature => s.temperature_cooling_group_c.mark_stale(e),
            Field::Shutter => s.shutter.mark_stale(e),
            Field::FlashlampMode => s.flashlamp_mode.mark_stale(e),
            Field::Simmer => s.simmer.mark_stale(e),
            Field::FlashlampTrigger => s.flashlamp_trigger.mark_stale(e),
            Field::FlashlampFrequency => s.flashlamp_frequency_hz.mark_stale(e),
            Field::FlashlampVoltage => s.flashlamp_voltage_v.mark_stale(e),
            Field::FlashlampEnergy => s.flashlamp_energy_j.mark_stale(e),
            Field::FlashlampCapacitance => s.flashlamp_capacitance_uf.mark_stale(e),
            Field::FlashlampCounter => s.flashlamp_counter.mark_stale(e),
            Field::FlashlampUserCounter => s.flashlamp_user_counter.mark_stale(e),
            Field::FlashlampInterlock => s.flashlamp_interlock.mark_stale(e),
            Field::QswitchStatus => s.qswitch_status.mark_stale(e),
            Field::QswitchMode => s.qswitch_mode.mark_stale(e),
            Field::QswitchDelay => s.qswitch_delay_us.mark_stale(e),
            Field::QswitchDivider => s.qswitch_frequency_divider.mark_stale(e),
            Field::QswitchBurst => s.qswitch_burst_pulses.mark_stale(e),
            Field::QswitchCounter => s.qswitch_counter.mark_stale(e),
            Field::QswitchUserCounter => s.qswitch_user_counter.mark_stale(e),
            Field::QswitchInterlock => s.qswitch_interlock.mark_stale(e),
        }
    }

    pub fn state(&self) -> &DeviceState {
        &self.state
    }

    pub fn snapshot(&self) -> DeviceState {
        self.state.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::TransportError;

    #[test]
    fn failed_read_keeps_last_value() {
        let mut m = DeviceModel::new();
        m.apply(Field::FlashlampVoltage, &Ok(Reading::FlashlampVoltage(1200)));
        m.apply(
            Field::FlashlampVoltage,
            &Err(YagError::Transport(TransportError::Timeout)),
        );
        let s = m.snapshot();
        assert_eq!(s.flashlamp_voltage_v.value(), Some(&1200));
        assert!(s.flashlamp_voltage_v.is_stale());
        assert!(s.flashlamp_voltage_v.fresh().is_none());
        assert!(s.flashlamp_voltage_v.error().unwrap().contains("timeout"));
    }

    #[test]
    fn failure_before_any_read_has_no_value() {
        let mut m = DeviceModel::new();
        m.mark_stale(Field::Pump, &YagError::Transport(TransportError::Timeout));
        assert_eq!(m.state().pump.value(), None);
        assert_eq!(m.state().stale_fields(), vec![Field::Pump]);
    }

    #[test]
    fn good_read_clears_stale() {
        let mut m = DeviceModel::new();
        m.mark_stale(Field::Pump, &YagError::Transport(TransportError::Timeout));
        m.store(Reading::Pump(false));
        assert_eq!(m.state().pump, Tracked::Fresh(false));
    }

    #[test]
    fn phase_follows_policy() {
        let mut m = DeviceModel::new();
        assert_eq!(m.state().phase(ShutterPolicy::Close), None);
        m.store(Reading::Shutter(ShutterState::Closed));
        m.store(Reading::QswitchStatus(false));
        m.store(Reading::FlashlampMode(FlashlampMode::Stop));
        assert_eq!(m.state().phase(ShutterPolicy::Close), Some(LaserPhase::Deactivated));
        assert_eq!(m.state().phase(ShutterPolicy::LeaveOpen), Some(LaserPhase::Unknown));

        m.store(Reading::Shutter(ShutterState::Open));
        m.store(Reading::QswitchStatus(true));
        m.store(Reading::FlashlampMode(FlashlampMode::Single));
        assert_eq!(m.state().phase(ShutterPolicy::Close), Some(LaserPhase::Active));
    }
}
