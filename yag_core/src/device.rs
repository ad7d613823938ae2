//! `LaserCore`: one connection to one laser head.
//!
//! Owns the transport, the clock and the device model. Every wire exchange
//! goes through `exchange`, which encodes, sends, logs and decodes. Reads
//! record their outcome in the model; writes are validated before any I/O
//! and followed by a read-back of the authoritative value.
use tracing::{debug, info, warn};
use yag_traits::{Clock, Transport};

use crate::codec::{Action, Decoded, Field, Operation, Reading, Setting, decode, encode, render};
use crate::config::{SequenceCfg, TimingCfg};
use crate::error::{ProtocolError, TransportError, YagError, YagResult};
use crate::event::{Event, NoopObserver, Observer, Payload, Subject};
use crate::hw_error::map_transport_error;
use crate::sequence::LaserPhase;
use crate::state::{DeviceModel, DeviceState};
use crate::types::{FlashlampMode, ShutterState};

pub struct LaserCore<T, C> {
    pub(crate) transport: T,
    pub(crate) clock: C,
    pub(crate) model: DeviceModel,
    pub(crate) observer: Box<dyn Observer>,
    pub(crate) timing: TimingCfg,
    pub(crate) sequence: SequenceCfg,
    pub(crate) phase: LaserPhase,
}

impl<T, C> core::fmt::Debug for LaserCore<T, C> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("LaserCore")
            .field("phase", &self.phase)
            .field("timing", &self.timing)
            .field("sequence", &self.sequence)
            .finish_non_exhaustive()
    }
}

impl<T: Transport, C: Clock> LaserCore<T, C> {
    pub fn new(transport: T, clock: C) -> Self {
        Self {
            transport,
            clock,
            model: DeviceModel::new(),
            observer: Box::new(NoopObserver),
            timing: TimingCfg::default(),
            sequence: SequenceCfg::default(),
            phase: LaserPhase::Unknown,
        }
    }

    pub fn with_timing(mut self, timing: TimingCfg) -> Self {
        self.timing = timing;
        self
    }

    pub fn with_sequence(mut self, sequence: SequenceCfg) -> Self {
        self.sequence = sequence;
        self
    }

    pub fn with_observer(mut self, observer: impl Observer + 'static) -> Self {
        self.observer = Box::new(observer);
        self
    }

    /// Open `port` and start from an empty model.
    pub fn connect(&mut self, port: &str) -> YagResult<()> {
        self.transport
            .open(port)
            .map_err(|e| TransportError::Disconnected(e.to_string()))?;
        self.model = DeviceModel::new();
        self.phase = LaserPhase::Unknown;
        info!(port, "laser connected");
        Ok(())
    }

    /// Close the transport. Errors are logged, not returned.
    pub fn disconnect(&mut self) {
        match self.transport.close() {
            Ok(()) => info!("laser disconnected"),
            Err(e) => warn!(error = %e, "closing transport failed"),
        }
    }

    pub fn state(&self) -> &DeviceState {
        self.model.state()
    }

    pub fn snapshot(&self) -> DeviceState {
        self.model.snapshot()
    }

    pub fn phase(&self) -> &LaserPhase {
        &self.phase
    }

    pub fn clock(&self) -> &C {
        &self.clock
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub(crate) fn exchange(&mut self, op: &Operation) -> YagResult<Decoded> {
        let command = encode(op);
        let raw = self.transport.send(&command).map_err(|e| {
            let err = map_transport_error(&*e);
            warn!(command = %command, error = %err, "exchange failed");
            err
        })?;
        debug!(command = %command, response = %raw, "exchange");
        Ok(decode(op, &raw)?)
    }

    /// Read one field and record the outcome in the model.
    pub fn read(&mut self, field: Field) -> YagResult<Reading> {
        let outcome = self
            .exchange(&Operation::Read(field))
            .and_then(|d| expect_reading(field, d));
        self.model.apply(field, &outcome);
        if let Err(e) = &outcome {
            warn!(field = %field, error = %e, "field marked stale");
        }
        outcome
    }

    /// Validate, write, then read back the value the head actually applied.
    pub fn write(&mut self, setting: Setting) -> YagResult<Reading> {
        let setting = setting.validate()?;
        let field = setting.field();
        let echoed = self
            .exchange(&Operation::Write(setting))
            .and_then(|d| expect_reading(field, d));
        if let Err(e) = echoed {
            warn!(field = %field, error = %e, "write failed");
            self.model.mark_stale(field, &e);
            return Err(e);
        }
        self.read(field)
    }

    pub fn action(&mut self, action: Action) -> YagResult<()> {
        self.exchange(&Operation::Action(action)).map(|_| ())
    }

    /// Send `raw` verbatim and return the reply untouched.
    pub fn custom(&mut self, raw: &str) -> YagResult<String> {
        let reply = self
            .transport
            .send(raw)
            .map_err(|e| map_transport_error(&*e))?;
        debug!(command = raw, response = %reply, "custom exchange");
        Ok(reply)
    }

    /// Run `action`; on failure mark `field` stale.
    pub(crate) fn act_on(&mut self, field: Field, action: Action) -> YagResult<()> {
        let r = self.action(action);
        if let Err(e) = &r {
            warn!(field = %field, command = action.command(), error = %e, "command failed");
            self.model.mark_stale(field, e);
        }
        r
    }

    pub(crate) fn read_bool(&mut self, field: Field) -> YagResult<bool> {
        let r = self.read(field)?;
        r.as_bool().ok_or_else(|| unexpected(field, &r))
    }

    pub(crate) fn read_shutter(&mut self) -> YagResult<ShutterState> {
        match self.read(Field::Shutter)? {
            Reading::Shutter(s) => Ok(s),
            other => Err(unexpected(Field::Shutter, &other)),
        }
    }

    pub(crate) fn read_flashlamp_mode(&mut self) -> YagResult<FlashlampMode> {
        match self.read(Field::FlashlampMode)? {
            Reading::FlashlampMode(m) => Ok(m),
            other => Err(unexpected(Field::FlashlampMode, &other)),
        }
    }

    pub(crate) fn emit(&mut self, subject: Subject, outcome: Result<Payload, String>) {
        self.observer.notify(&Event { subject, outcome });
    }

    /// Re-derive the phase from the model unless a sequence owns it.
    pub(crate) fn reconcile_phase(&mut self) {
        if matches!(
            self.phase,
            LaserPhase::Faulted(_) | LaserPhase::Activating | LaserPhase::Deactivating
        ) {
            return;
        }
        let Some(observed) = self.model.state().phase(self.sequence.shutter_policy) else {
            return;
        };
        if observed != self.phase {
            info!(from = ?self.phase, to = ?observed, "laser phase reconciled");
            self.phase = observed;
        }
    }
}

fn expect_reading(field: Field, decoded: Decoded) -> YagResult<Reading> {
    match decoded {
        Decoded::Reading(r) if r.field() == field => Ok(r),
        Decoded::Reading(r) => Err(unexpected(field, &r)),
        Decoded::Ack | Decoded::Raw(_) => Err(YagError::Protocol(ProtocolError::Malformed {
            command: field.query().to_string(),
            raw: String::new(),
        })),
    }
}

fn unexpected(field: Field, reading: &Reading) -> YagError {
    YagError::Protocol(ProtocolError::Malformed {
        command: field.query().to_string(),
        raw: render(reading),
    })
}
