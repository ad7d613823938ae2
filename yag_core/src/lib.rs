#![cfg_attr(all(not(debug_assertions), not(test)), deny(warnings))]
#![cfg_attr(
    all(not(debug_assertions), not(test)),
    deny(clippy::all, clippy::pedantic, clippy::nursery)
)]
#![allow(clippy::module_name_repetitions, clippy::missing_errors_doc)]
#![cfg_attr(not(test), deny(clippy::unwrap_used, clippy::expect_used))]
//! Control core for a Nd:YAG laser head on a half-duplex serial link.
//!
//! This crate is hardware-agnostic. Every exchange with the head goes through
//! `yag_traits::Transport`, and every delay through `yag_traits::Clock`.
//!
//! ## Architecture
//!
//! - **Codec**: ASCII command encoding and reply parsing (`codec` module)
//! - **State**: last known value of every field, with staleness (`state` module)
//! - **Device**: `LaserCore`, the single owner of the transport (`device` module)
//! - **Dispatch**: operator intents and toggles (`dispatch` module)
//! - **Sequence**: ordered activate/deactivate with verification (`sequence` module)
//! - **Poll**: periodic refresh of every field (`poll` module)
//! - **Worker**: background thread serialising intents and polls (`worker` module)
//!
//! The head is never addressed by two exchanges at once: only the worker
//! thread holds the transport.

pub mod builder;
pub mod codec;
pub mod config;
pub mod conversions;
pub mod device;
pub mod dispatch;
pub mod error;
pub mod event;
pub mod hw_error;
pub mod mocks;
pub mod poll;
pub mod sequence;
pub mod state;
pub mod types;
pub mod util;
pub mod worker;

pub use builder::{DynLaser, LaserBuilder};
pub use codec::{
    Action, Bounds, Decoded, Field, Operation, Reading, Setting, decode, encode, parse_command,
    parse_reading, render,
};
pub use config::{PollCfg, SequenceCfg, TimingCfg};
pub use device::LaserCore;
pub use dispatch::Intent;
pub use error::{
    BuildError, ProtocolError, Report, Result, SequenceFault, TransportError, ValidationError,
    YagError, YagResult,
};
pub use event::{ChannelObserver, CommandKind, Event, NoopObserver, Observer, Payload, Subject};
pub use poll::{POLL_ORDER, PollReport, PollScheduler};
pub use sequence::{LaserPhase, ShutterPolicy, Step, Subsystem};
pub use state::{DeviceModel, DeviceState, Tracked};
pub use types::{
    FlashlampInterlock, FlashlampMode, QswitchInterlock, QswitchMode, ShutterState, Trigger,
};
pub use worker::{WorkerHandle, start};
