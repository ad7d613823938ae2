//! Worker thread that owns a `LaserCore`.
//!
//! Intents arrive over an unbounded crossbeam channel so `submit` never
//! blocks. Each tick drains pending intents, runs a poll cycle when one is
//! due, then waits for the next intent or the idle interval. Only this
//! thread touches the transport, so exchanges never overlap.
//!
//! Dropping the handle signals shutdown, joins the thread and closes the
//! transport. A running sequence is not cancelled; the flag is checked
//! between intents and between poll reads.
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, PoisonError, RwLock};
use std::thread::JoinHandle;
use std::time::Duration;

use crossbeam_channel as xch;
use tracing::{debug, info, trace, warn};
use yag_traits::{Clock, Transport};

use crate::codec::Setting;
use crate::config::PollCfg;
use crate::device::LaserCore;
use crate::dispatch::Intent;
use crate::error::{YagError, YagResult};
use crate::poll::PollScheduler;
use crate::sequence::LaserPhase;
use crate::state::DeviceState;

/// Shortest wait between loop turns, so a zero poll interval still leaves
/// the thread parked and gives queued intents a turn between cycles.
pub const MIN_WAIT: Duration = Duration::from_millis(5);

#[derive(Debug, Default)]
struct Shared {
    state: RwLock<DeviceState>,
    phase: RwLock<LaserPhase>,
}

impl Shared {
    fn publish<T: Transport, C: Clock>(&self, core: &LaserCore<T, C>) {
        *self.state.write().unwrap_or_else(PoisonError::into_inner) = core.snapshot();
        *self.phase.write().unwrap_or_else(PoisonError::into_inner) = core.phase().clone();
    }
}

pub struct WorkerHandle {
    tx: Option<xch::Sender<Intent>>,
    shared: Arc<Shared>,
    shutdown: Arc<AtomicBool>,
    join_handle: Option<JoinHandle<()>>,
    /// Settings written after every (re)connect.
    pub(crate) initial: Vec<Setting>,
}

impl std::fmt::Debug for WorkerHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WorkerHandle")
            .field("phase", &self.phase())
            .field("running", &self.is_running())
            .finish_non_exhaustive()
    }
}

/// Connect `core` to `port`, apply `initial` settings and start the worker.
///
/// Initial settings that fail are logged and skipped; the connection stays up.
pub fn start<T, C>(
    mut core: LaserCore<T, C>,
    port: &str,
    poll: PollCfg,
    initial: &[Setting],
) -> YagResult<WorkerHandle>
where
    T: Transport + Send + 'static,
    C: Clock + Send + 'static,
{
    core.connect(port)?;
    for setting in initial {
        if let Err(e) = core.write(*setting) {
            warn!(field = %setting.field(), error = %e, "initial setting not applied");
        }
    }
    let mut handle = WorkerHandle::spawn(core, poll);
    handle.initial = initial.to_vec();
    Ok(handle)
}

impl WorkerHandle {
    /// Start the worker on an already connected core.
    pub fn spawn<T, C>(mut core: LaserCore<T, C>, poll: PollCfg) -> Self
    where
        T: Transport + Send + 'static,
        C: Clock + Send + 'static,
    {
        let (tx, rx) = xch::unbounded::<Intent>();
        let shared = Arc::new(Shared::default());
        shared.publish(&core);
        let shutdown = Arc::new(AtomicBool::new(false));

        let shared_clone = shared.clone();
        let shutdown_clone = shutdown.clone();
        let join_handle = std::thread::spawn(move || {
            let mut scheduler = PollScheduler::new(poll.interval);
            let idle = core.timing.idle;
            'run: loop {
                while let Ok(intent) = rx.try_recv() {
                    if shutdown_clone.load(Ordering::Relaxed) {
                        break 'run;
                    }
                    run_intent(&mut core, intent, &shared_clone);
                }
                if shutdown_clone.load(Ordering::Relaxed) {
                    break;
                }

                let now = core.clock().now();
                if scheduler.due(now) {
                    scheduler.mark_started(now);
                    core.poll_cycle(&shutdown_clone);
                    shared_clone.publish(&core);
                }
                if shutdown_clone.load(Ordering::Relaxed) {
                    break;
                }

                let wait = scheduler.remaining(core.clock().now()).min(idle).max(MIN_WAIT);
                match rx.recv_timeout(wait) {
                    Ok(intent) => {
                        if shutdown_clone.load(Ordering::Relaxed) {
                            break;
                        }
                        run_intent(&mut core, intent, &shared_clone);
                    }
                    Err(xch::RecvTimeoutError::Timeout) => {}
                    Err(xch::RecvTimeoutError::Disconnected) => {
                        debug!("intent channel closed, worker exiting");
                        break;
                    }
                }
            }
            core.disconnect();
            trace!("laser worker exiting cleanly");
        });

        Self {
            tx: Some(tx),
            shared,
            shutdown,
            join_handle: Some(join_handle),
            initial: Vec::new(),
        }
    }

    /// Queue an intent. `Set` values are bounds-checked here, before queuing.
    pub fn submit(&self, intent: Intent) -> YagResult<()> {
        intent.validate()?;
        let tx = self.tx.as_ref().ok_or(YagError::WorkerStopped)?;
        trace!(kind = ?intent.kind(), "intent queued");
        tx.send(intent).map_err(|_| YagError::WorkerStopped)
    }

    /// Latest state published by the worker.
    pub fn snapshot(&self) -> DeviceState {
        self.shared
            .state
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn phase(&self) -> LaserPhase {
        self.shared
            .phase
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn is_running(&self) -> bool {
        self.join_handle
            .as_ref()
            .is_some_and(|h| !h.is_finished())
    }

    /// Stop the worker and close the transport.
    pub fn stop(mut self) {
        self.shutdown_and_join();
    }

    /// Tear this connection down, then connect `core` to `port` with a
    /// fresh model and re-apply the initial settings.
    pub fn reconnect<T, C>(
        mut self,
        core: LaserCore<T, C>,
        port: &str,
        poll: PollCfg,
    ) -> YagResult<WorkerHandle>
    where
        T: Transport + Send + 'static,
        C: Clock + Send + 'static,
    {
        self.shutdown_and_join();
        let initial = std::mem::take(&mut self.initial);
        info!(port, initial = initial.len(), "reconnecting");
        start(core, port, poll, &initial)
    }

    fn shutdown_and_join(&mut self) {
        self.shutdown.store(true, Ordering::Relaxed);
        drop(self.tx.take());
        if let Some(handle) = self.join_handle.take() {
            match handle.join() {
                Ok(()) => trace!("laser worker joined"),
                Err(e) => warn!(?e, "laser worker panicked during shutdown"),
            }
        }
    }
}

impl Drop for WorkerHandle {
    fn drop(&mut self) {
        self.shutdown_and_join();
    }
}

fn run_intent<T: Transport, C: Clock>(core: &mut LaserCore<T, C>, intent: Intent, shared: &Shared) {
    if let Err(e) = core.handle(intent) {
        debug!(error = %e, "intent failed");
    }
    shared.publish(core);
}
