//! Safety-ordered activation and deactivation.
//!
//! Activation: open shutter, power and start the Q-switch, fire the
//! flashlamp. Deactivation runs the reverse. Each step waits a settle delay
//! before the next one; the end state is verified by reading the three
//! subsystems back. The first failing step aborts into `Faulted` with no
//! rollback, and only a deactivation leaves `Faulted`.
use std::fmt;

use tracing::{info, warn};
use yag_traits::{Clock, Transport};

use crate::codec::{Action, Decoded, Field, Operation, Reading, Setting};
use crate::device::LaserCore;
use crate::error::{SequenceFault, YagError, YagResult};
use crate::types::{FlashlampMode, ShutterState};

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum LaserPhase {
    /// Nothing observed yet, or an intermediate combination seen outside a sequence.
    #[default]
    Unknown,
    Deactivated,
    Activating,
    Active,
    Deactivating,
    Faulted(SequenceFault),
}

impl fmt::Display for LaserPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unknown => f.write_str("unknown"),
            Self::Deactivated => f.write_str("deactivated"),
            Self::Activating => f.write_str("activating"),
            Self::Active => f.write_str("active"),
            Self::Deactivating => f.write_str("deactivating"),
            Self::Faulted(fault) => write!(f, "faulted ({fault})"),
        }
    }
}

/// What deactivation does with the safety shutter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ShutterPolicy {
    /// Close it as the last step and verify it closed.
    #[default]
    Close,
    /// Leave it open; verification expects it open.
    LeaveOpen,
}

impl ShutterPolicy {
    pub const fn resting_shutter(self) -> ShutterState {
        match self {
            Self::Close => ShutterState::Closed,
            Self::LeaveOpen => ShutterState::Open,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Subsystem {
    Shutter,
    Qswitch,
    Flashlamp,
}

impl fmt::Display for Subsystem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Shutter => "shutter",
            Self::Qswitch => "Q-switch",
            Self::Flashlamp => "flashlamp",
        })
    }
}

/// One wire step of a sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Step {
    OpenShutter,
    QswitchPowerOn,
    QswitchStart,
    FlashlampActivate,
    FlashlampStop,
    QswitchStop,
    QswitchPowerOff,
    CloseShutter,
}

impl Step {
    pub const fn subsystem(self) -> Subsystem {
        match self {
            Self::OpenShutter | Self::CloseShutter => Subsystem::Shutter,
            Self::QswitchPowerOn
            | Self::QswitchStart
            | Self::QswitchStop
            | Self::QswitchPowerOff => Subsystem::Qswitch,
            Self::FlashlampActivate | Self::FlashlampStop => Subsystem::Flashlamp,
        }
    }

    fn operation(self) -> Operation {
        match self {
            Self::OpenShutter => Operation::Write(Setting::Shutter(ShutterState::Open)),
            Self::CloseShutter => Operation::Write(Setting::Shutter(ShutterState::Closed)),
            Self::QswitchPowerOn => Operation::Action(Action::QswitchPowerOn),
            Self::QswitchStart => Operation::Action(Action::QswitchStart),
            Self::QswitchStop => Operation::Action(Action::QswitchStop),
            Self::QswitchPowerOff => Operation::Action(Action::QswitchPowerOff),
            Self::FlashlampActivate => Operation::Action(Action::FlashlampActivate),
            Self::FlashlampStop => Operation::Action(Action::FlashlampStop),
        }
    }

    /// State an acknowledged action leaves behind. Shutter writes are echoed
    /// and Q-switch power has no model field.
    fn implied(self) -> Option<Reading> {
        match self {
            Self::QswitchStart => Some(Reading::QswitchStatus(true)),
            Self::QswitchStop => Some(Reading::QswitchStatus(false)),
            Self::FlashlampActivate => Some(Reading::FlashlampMode(FlashlampMode::Start)),
            Self::FlashlampStop => Some(Reading::FlashlampMode(FlashlampMode::Stop)),
            Self::OpenShutter
            | Self::CloseShutter
            | Self::QswitchPowerOn
            | Self::QswitchPowerOff => None,
        }
    }

    /// Model field the step affects.
    fn field(self) -> Field {
        match self.subsystem() {
            Subsystem::Shutter => Field::Shutter,
            Subsystem::Qswitch => Field::QswitchStatus,
            Subsystem::Flashlamp => Field::FlashlampMode,
        }
    }
}

impl fmt::Display for Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::OpenShutter => "open shutter",
            Self::QswitchPowerOn => "Q-switch power on",
            Self::QswitchStart => "Q-switch start",
            Self::FlashlampActivate => "flashlamp activate",
            Self::FlashlampStop => "flashlamp stop",
            Self::QswitchStop => "Q-switch stop",
            Self::QswitchPowerOff => "Q-switch power off",
            Self::CloseShutter => "close shutter",
        })
    }
}

/// Expected end state of one subsystem.
#[derive(Debug, Clone, Copy)]
enum Expect {
    Shutter(ShutterState),
    Qswitch(bool),
    Firing(bool),
}

impl<T: Transport, C: Clock> LaserCore<T, C> {
    /// Bring the laser to `Active`. No-op when already active.
    pub fn activate_yag(&mut self) -> YagResult<LaserPhase> {
        self.observe_if_unknown();
        match &self.phase {
            LaserPhase::Active => return Ok(LaserPhase::Active),
            LaserPhase::Faulted(_) => {
                warn!("activation refused while faulted");
                return Err(SequenceFault::RequiresDeactivate.into());
            }
            _ => {}
        }
        info!("activation started");
        self.phase = LaserPhase::Activating;
        let outcome = self.run_activation();
        self.finish(outcome, LaserPhase::Active)
    }

    /// Bring the laser to `Deactivated`. No-op when already deactivated;
    /// the only way out of `Faulted`.
    pub fn deactivate_yag(&mut self) -> YagResult<LaserPhase> {
        self.observe_if_unknown();
        if self.phase == LaserPhase::Deactivated {
            return Ok(LaserPhase::Deactivated);
        }
        info!(policy = ?self.sequence.shutter_policy, "deactivation started");
        self.phase = LaserPhase::Deactivating;
        let outcome = self.run_deactivation();
        self.finish(outcome, LaserPhase::Deactivated)
    }

    /// Deactivate when the flashlamp is firing, activate otherwise.
    pub fn toggle_yag(&mut self) -> YagResult<LaserPhase> {
        if self.read_flashlamp_mode()?.is_firing() {
            self.deactivate_yag()
        } else {
            self.activate_yag()
        }
    }

    /// Read the three sequenced subsystems so a head already in the target
    /// state is recognised before any command is sent. Read failures leave
    /// the phase `Unknown` and the sequence runs.
    fn observe_if_unknown(&mut self) {
        if self.phase != LaserPhase::Unknown {
            return;
        }
        for field in [Field::Shutter, Field::QswitchStatus, Field::FlashlampMode] {
            // failures are logged and recorded in the model by `read`
            let _ = self.read(field);
        }
        self.reconcile_phase();
    }

    fn run_activation(&mut self) -> Result<(), SequenceFault> {
        self.step(Step::OpenShutter)?;
        self.settle();
        self.step(Step::QswitchPowerOn)?;
        self.clock.sleep(self.timing.qswitch_settle);
        self.step(Step::QswitchStart)?;
        self.settle();
        self.step(Step::FlashlampActivate)?;
        self.settle();
        self.verify(&[
            Expect::Shutter(ShutterState::Open),
            Expect::Qswitch(true),
            Expect::Firing(true),
        ])
    }

    fn run_deactivation(&mut self) -> Result<(), SequenceFault> {
        self.step(Step::FlashlampStop)?;
        self.settle();
        self.step(Step::QswitchStop)?;
        self.clock.sleep(self.timing.qswitch_settle);
        self.step(Step::QswitchPowerOff)?;
        self.settle();
        let policy = self.sequence.shutter_policy;
        if policy == ShutterPolicy::Close {
            self.step(Step::CloseShutter)?;
            self.settle();
        }
        self.verify(&[
            Expect::Firing(false),
            Expect::Qswitch(false),
            Expect::Shutter(policy.resting_shutter()),
        ])
    }

    fn settle(&self) {
        self.clock.sleep(self.timing.settle);
    }

    fn step(&mut self, step: Step) -> Result<(), SequenceFault> {
        match self.exchange(&step.operation()) {
            Ok(Decoded::Reading(r)) => {
                self.model.store(r);
                Ok(())
            }
            Ok(_) => {
                if let Some(r) = step.implied() {
                    self.model.store(r);
                }
                Ok(())
            }
            Err(e) => {
                warn!(step = %step, error = %e, "sequence step failed");
                self.model.mark_stale(step.field(), &e);
                Err(SequenceFault::Step {
                    step,
                    error: e.to_string(),
                })
            }
        }
    }

    fn verify(&mut self, expectations: &[Expect]) -> Result<(), SequenceFault> {
        for &expect in expectations {
            let (subsystem, expected, observed) = match expect {
                Expect::Shutter(want) => (
                    Subsystem::Shutter,
                    want.to_string(),
                    self.read_shutter().map(|s| (s == want, s.to_string())),
                ),
                Expect::Qswitch(want) => (
                    Subsystem::Qswitch,
                    on_off(want),
                    self.read_bool(Field::QswitchStatus)
                        .map(|b| (b == want, on_off(b))),
                ),
                Expect::Firing(want) => (
                    Subsystem::Flashlamp,
                    if want { "firing" } else { "STOP" }.to_string(),
                    self.read_flashlamp_mode()
                        .map(|m| (m.is_firing() == want, m.to_string())),
                ),
            };
            let observed = match observed {
                Ok((true, _)) => continue,
                Ok((false, seen)) => seen,
                Err(e) => format!("unreadable ({e})"),
            };
            return Err(SequenceFault::Verify {
                subsystem,
                expected,
                observed,
            });
        }
        Ok(())
    }

    fn finish(
        &mut self,
        outcome: Result<(), SequenceFault>,
        target: LaserPhase,
    ) -> YagResult<LaserPhase> {
        match outcome {
            Ok(()) => {
                info!(phase = %target, "sequence complete");
                self.phase = target.clone();
                Ok(target)
            }
            Err(fault) => {
                warn!(fault = %fault, "sequence faulted");
                self.phase = LaserPhase::Faulted(fault.clone());
                Err(YagError::Sequence(fault))
            }
        }
    }
}

fn on_off(b: bool) -> String {
    let s = if b { "ON" } else { "OFF" };
    s.to_string()
}
