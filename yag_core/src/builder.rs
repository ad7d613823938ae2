//! Builder that assembles a boxed `LaserCore` from parts or from a `Config`.
//!
//! `build()` returns a connected core for one-shot use; `spawn()` also starts
//! the worker thread.
use std::sync::Arc;

use yag_traits::{Clock, MonotonicClock, Transport};

use crate::codec::Setting;
use crate::config::{PollCfg, SequenceCfg, TimingCfg};
use crate::conversions::initial_settings;
use crate::device::LaserCore;
use crate::error::{BuildError, Result};
use crate::event::Observer;
use crate::worker::WorkerHandle;

/// Core with a boxed transport and a shared clock.
pub type DynLaser = LaserCore<Box<dyn Transport + Send>, Arc<dyn Clock + Send + Sync>>;

#[derive(Default)]
pub struct LaserBuilder {
    transport: Option<Box<dyn Transport + Send>>,
    clock: Option<Arc<dyn Clock + Send + Sync>>,
    observer: Option<Box<dyn Observer>>,
    port: Option<String>,
    timing: TimingCfg,
    sequence: SequenceCfg,
    poll: PollCfg,
    initial: Vec<Setting>,
}

impl core::fmt::Debug for LaserBuilder {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("LaserBuilder")
            .field("port", &self.port)
            .field("timing", &self.timing)
            .field("sequence", &self.sequence)
            .field("poll", &self.poll)
            .field("initial", &self.initial)
            .finish_non_exhaustive()
    }
}

impl LaserBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Port, timing, sequence policy and poll interval from a validated
    /// config. Initial parameters are taken only when `apply_on_connect` is set.
    pub fn from_config(cfg: &yag_config::Config) -> Result<Self> {
        let apply = cfg.setting.get_bool("apply_on_connect")?.unwrap_or(false);
        let initial = if apply {
            initial_settings(&cfg.setting)?
        } else {
            Vec::new()
        };
        Ok(Self {
            port: Some(cfg.connection.port.clone()),
            timing: TimingCfg::from(&cfg.timing),
            sequence: SequenceCfg::from(&cfg.sequence),
            poll: PollCfg::try_from(&cfg.setting)?,
            initial,
            ..Self::default()
        })
    }

    pub fn with_transport(mut self, transport: impl Transport + Send + 'static) -> Self {
        self.transport = Some(Box::new(transport));
        self
    }

    pub fn with_clock(mut self, clock: impl Clock + Send + Sync + 'static) -> Self {
        self.clock = Some(Arc::new(clock));
        self
    }

    pub fn with_observer(mut self, observer: impl Observer + 'static) -> Self {
        self.observer = Some(Box::new(observer));
        self
    }

    pub fn with_port(mut self, port: impl Into<String>) -> Self {
        self.port = Some(port.into());
        self
    }

    pub fn with_timing(mut self, timing: TimingCfg) -> Self {
        self.timing = timing;
        self
    }

    pub fn with_sequence(mut self, sequence: SequenceCfg) -> Self {
        self.sequence = sequence;
        self
    }

    pub fn with_poll(mut self, poll: PollCfg) -> Self {
        self.poll = poll;
        self
    }

    pub fn with_initial_settings(mut self, initial: Vec<Setting>) -> Self {
        self.initial = initial;
        self
    }

    pub fn poll(&self) -> PollCfg {
        self.poll
    }

    fn assemble(self) -> Result<(DynLaser, String, Vec<Setting>)> {
        let transport = self.transport.ok_or(BuildError::MissingTransport)?;
        let port = self.port.ok_or(BuildError::MissingPort)?;
        if port.trim().is_empty() {
            return Err(BuildError::MissingPort.into());
        }
        if self.timing.idle.is_zero() {
            return Err(BuildError::InvalidConfig("idle interval must be > 0".into()).into());
        }
        let clock: Arc<dyn Clock + Send + Sync> = match self.clock {
            Some(c) => c,
            None => Arc::new(MonotonicClock::new()),
        };
        let mut core = LaserCore::new(transport, clock)
            .with_timing(self.timing)
            .with_sequence(self.sequence);
        if let Some(observer) = self.observer {
            core.observer = observer;
        }
        Ok((core, port, self.initial))
    }

    /// Connect and apply initial settings, without starting a worker.
    pub fn build(self) -> Result<DynLaser> {
        let (mut core, port, initial) = self.assemble()?;
        core.connect(&port).map_err(|e| BuildError::Connect {
            port: port.clone(),
            reason: e.to_string(),
        })?;
        for setting in initial {
            if let Err(e) = core.write(setting) {
                tracing::warn!(field = %setting.field(), error = %e, "initial setting not applied");
            }
        }
        Ok(core)
    }

    /// Connect, apply initial settings and start the worker thread. The
    /// handle keeps the settings so `reconnect` applies them again.
    pub fn spawn(self) -> Result<WorkerHandle> {
        let poll = self.poll;
        let initial = self.initial.clone();
        let core = self.build()?;
        let mut handle = WorkerHandle::spawn(core, poll);
        handle.initial = initial;
        Ok(handle)
    }
}
