//! Operator intents and their execution against a `LaserCore`.
use tracing::debug;
use yag_traits::{Clock, Transport};

use crate::codec::{Action, Field, Reading, Setting};
use crate::device::LaserCore;
use crate::error::{ValidationError, YagResult};
use crate::event::{CommandKind, Payload, Subject};

/// One queued operator request.
#[derive(Debug, Clone, PartialEq)]
pub enum Intent {
    TogglePump,
    ToggleShutter,
    ToggleFlashlamp,
    ToggleSimmer,
    ToggleQswitch,
    Set(Setting),
    ResetFlashlampUserCounter,
    ResetQswitchUserCounter,
    /// Raw command, reply returned undecoded.
    Custom(String),
    ActivateYag,
    DeactivateYag,
    ToggleYag,
}

impl Intent {
    pub fn kind(&self) -> CommandKind {
        match self {
            Intent::TogglePump => CommandKind::TogglePump,
            Intent::ToggleShutter => CommandKind::ToggleShutter,
            Intent::ToggleFlashlamp => CommandKind::ToggleFlashlamp,
            Intent::ToggleSimmer => CommandKind::ToggleSimmer,
            Intent::ToggleQswitch => CommandKind::ToggleQswitch,
            Intent::Set(s) => CommandKind::Set(s.field()),
            Intent::ResetFlashlampUserCounter => CommandKind::ResetFlashlampUserCounter,
            Intent::ResetQswitchUserCounter => CommandKind::ResetQswitchUserCounter,
            Intent::Custom(_) => CommandKind::Custom,
            Intent::ActivateYag => CommandKind::ActivateYag,
            Intent::DeactivateYag => CommandKind::DeactivateYag,
            Intent::ToggleYag => CommandKind::ToggleYag,
        }
    }

    /// Bounds check for `Set`, done before the intent is queued.
    pub fn validate(&self) -> Result<(), ValidationError> {
        match self {
            Intent::Set(s) => s.validate().map(|_| ()),
            _ => Ok(()),
        }
    }
}

impl<T: Transport, C: Clock> LaserCore<T, C> {
    /// Execute one intent, report it to the observer and reconcile the phase.
    pub fn handle(&mut self, intent: Intent) -> YagResult<Payload> {
        let kind = intent.kind();
        debug!(?kind, "handling intent");
        let result = match intent {
            Intent::TogglePump => self.toggle_pump().map(Payload::Reading),
            Intent::ToggleShutter => self.toggle_shutter().map(Payload::Reading),
            Intent::ToggleFlashlamp => self.toggle_flashlamp().map(Payload::Reading),
            Intent::ToggleSimmer => self.toggle_simmer().map(Payload::Reading),
            Intent::ToggleQswitch => self.toggle_qswitch().map(Payload::Reading),
            Intent::Set(s) => self.write(s).map(Payload::Reading),
            Intent::ResetFlashlampUserCounter => {
                self.reset_flashlamp_user_counter().map(Payload::Reading)
            }
            Intent::ResetQswitchUserCounter => {
                self.reset_qswitch_user_counter().map(Payload::Reading)
            }
            Intent::Custom(raw) => self.custom(&raw).map(Payload::Raw),
            Intent::ActivateYag => self.activate_yag().map(Payload::Phase),
            Intent::DeactivateYag => self.deactivate_yag().map(Payload::Phase),
            Intent::ToggleYag => self.toggle_yag().map(Payload::Phase),
        };
        self.reconcile_phase();
        let outcome = match &result {
            Ok(payload) => Ok(payload.clone()),
            Err(e) => Err(e.to_string()),
        };
        self.emit(Subject::Command(kind), outcome);
        result
    }

    pub fn toggle_pump(&mut self) -> YagResult<Reading> {
        let on = self.read_bool(Field::Pump)?;
        self.write(Setting::Pump(!on))
    }

    pub fn toggle_shutter(&mut self) -> YagResult<Reading> {
        let shutter = self.read_shutter()?;
        self.write(Setting::Shutter(shutter.toggled()))
    }

    /// START/SINGLE stop the lamp, STOP activates it. An unreadable status
    /// word is returned as-is and nothing is sent.
    pub fn toggle_flashlamp(&mut self) -> YagResult<Reading> {
        let mode = self.read_flashlamp_mode()?;
        let action = if mode.is_firing() {
            Action::FlashlampStop
        } else {
            Action::FlashlampActivate
        };
        self.act_on(Field::FlashlampMode, action)?;
        self.read(Field::FlashlampMode)
    }

    pub fn toggle_simmer(&mut self) -> YagResult<Reading> {
        self.act_on(Field::Simmer, Action::Simmer)?;
        self.read(Field::Simmer)
    }

    /// Running: stop, settle, power off. Stopped: power on, settle, start.
    pub fn toggle_qswitch(&mut self) -> YagResult<Reading> {
        let running = self.read_bool(Field::QswitchStatus)?;
        let (first, second) = if running {
            (Action::QswitchStop, Action::QswitchPowerOff)
        } else {
            (Action::QswitchPowerOn, Action::QswitchStart)
        };
        self.act_on(Field::QswitchStatus, first)?;
        self.clock.sleep(self.timing.qswitch_settle);
        self.act_on(Field::QswitchStatus, second)?;
        self.read(Field::QswitchStatus)
    }

    pub fn reset_flashlamp_user_counter(&mut self) -> YagResult<Reading> {
        self.act_on(Field::FlashlampUserCounter, Action::ResetFlashlampUserCounter)?;
        self.read(Field::FlashlampUserCounter)
    }

    pub fn reset_qswitch_user_counter(&mut self) -> YagResult<Reading> {
        self.act_on(Field::QswitchUserCounter, Action::ResetQswitchUserCounter)?;
        self.read(Field::QswitchUserCounter)
    }
}
