use thiserror::Error;

use crate::codec::Field;
use crate::sequence::{Step, Subsystem};

/// Transport-level failure. Recoverable: the affected field goes stale.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TransportError {
    #[error("timeout waiting for the laser to reply")]
    Timeout,
    #[error("laser disconnected: {0}")]
    Disconnected(String),
    #[error("transport i/o error: {0}")]
    Io(String),
}

/// Reply did not match what the codec expects for the command.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ProtocolError {
    #[error("malformed reply to {command:?}: {raw:?}")]
    Malformed { command: String, raw: String },
    #[error("{field} reported {raw:?}, outside its valid range")]
    OutOfRange { field: Field, raw: String },
    #[error("unsupported command {command:?}")]
    Unsupported { command: String },
    #[error("laser rejected {command:?} with {raw:?}")]
    Rejected { command: String, raw: String },
}

/// Write refused before any I/O.
#[derive(Debug, Error, Clone, PartialEq)]
#[error("{param} = {value} is outside [{min}, {max}]")]
pub struct ValidationError {
    pub param: &'static str,
    pub value: f64,
    pub min: f64,
    pub max: f64,
}

/// Compound activate/deactivate failure. Cleared only by deactivation.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SequenceFault {
    #[error("{step} failed: {error}")]
    Step { step: Step, error: String },
    #[error("{subsystem} verification failed: expected {expected}, observed {observed}")]
    Verify {
        subsystem: Subsystem,
        expected: String,
        observed: String,
    },
    #[error("laser is faulted; deactivate it before activating again")]
    RequiresDeactivate,
}

impl SequenceFault {
    /// Subsystem that failed, if the fault names one.
    pub fn subsystem(&self) -> Option<Subsystem> {
        match self {
            Self::Step { step, .. } => Some(step.subsystem()),
            Self::Verify { subsystem, .. } => Some(*subsystem),
            Self::RequiresDeactivate => None,
        }
    }
}

#[derive(Debug, Error, Clone, PartialEq)]
pub enum YagError {
    #[error(transparent)]
    Transport(#[from] TransportError),
    #[error(transparent)]
    Protocol(#[from] ProtocolError),
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error(transparent)]
    Sequence(#[from] SequenceFault),
    #[error("laser worker has stopped")]
    WorkerStopped,
}

#[derive(Debug, Error, Clone)]
pub enum BuildError {
    #[error("missing transport")]
    MissingTransport,
    #[error("missing port")]
    MissingPort,
    #[error("invalid config: {0}")]
    InvalidConfig(String),
    #[error("could not open {port}: {reason}")]
    Connect { port: String, reason: String },
}

pub type YagResult<T> = std::result::Result<T, YagError>;
pub type Result<T> = eyre::Result<T>;
pub use eyre::Report;
