//! Observer events emitted for every completed command and poll read.
use crossbeam_channel as xch;

use crate::codec::{Field, Reading};
use crate::sequence::LaserPhase;

/// Operator-level command that produced an event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CommandKind {
    TogglePump,
    ToggleShutter,
    ToggleFlashlamp,
    ToggleSimmer,
    ToggleQswitch,
    Set(Field),
    ResetFlashlampUserCounter,
    ResetQswitchUserCounter,
    Custom,
    ActivateYag,
    DeactivateYag,
    ToggleYag,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Subject {
    Field(Field),
    Command(CommandKind),
}

#[derive(Debug, Clone, PartialEq)]
pub enum Payload {
    Reading(Reading),
    /// Undecoded reply to a custom command.
    Raw(String),
    Phase(LaserPhase),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Event {
    pub subject: Subject,
    /// Error side carries the rendered error text.
    pub outcome: Result<Payload, String>,
}

pub trait Observer: Send {
    fn notify(&mut self, event: &Event);
}

impl<F> Observer for F
where
    F: FnMut(&Event) + Send,
{
    fn notify(&mut self, event: &Event) {
        self(event);
    }
}

/// Drops every event.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopObserver;

impl Observer for NoopObserver {
    fn notify(&mut self, _event: &Event) {}
}

/// Forwards events over a channel. A full or disconnected channel drops the
/// event; the worker never blocks on a slow consumer.
#[derive(Debug, Clone)]
pub struct ChannelObserver(pub xch::Sender<Event>);

impl Observer for ChannelObserver {
    fn notify(&mut self, event: &Event) {
        if self.0.try_send(event.clone()).is_err() {
            tracing::trace!(subject = ?event.subject, "event dropped");
        }
    }
}
