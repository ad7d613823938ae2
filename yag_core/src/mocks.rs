//! Test and helper transports for yag_core.
use std::error::Error;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use yag_traits::Transport;

type BoxError = Box<dyn Error + Send + Sync>;

/// A transport that accepts open/close and fails every exchange.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopTransport;

impl Transport for NoopTransport {
    fn open(&mut self, _port: &str) -> Result<(), BoxError> {
        Ok(())
    }
    fn close(&mut self) -> Result<(), BoxError> {
        Ok(())
    }
    fn send(&mut self, _command: &str) -> Result<String, BoxError> {
        Err(Box::new(std::io::Error::other("noop transport")))
    }
}

/// Replies computed by a closure, for scripted exchanges in tests.
pub struct FnTransport<F> {
    reply: F,
}

impl<F> FnTransport<F>
where
    F: FnMut(&str) -> Result<String, BoxError>,
{
    pub fn new(reply: F) -> Self {
        Self { reply }
    }
}

impl<F> Transport for FnTransport<F>
where
    F: FnMut(&str) -> Result<String, BoxError>,
{
    fn open(&mut self, _port: &str) -> Result<(), BoxError> {
        Ok(())
    }
    fn close(&mut self) -> Result<(), BoxError> {
        Ok(())
    }
    fn send(&mut self, command: &str) -> Result<String, BoxError> {
        (self.reply)(command)
    }
}

/// Shared, cloneable log of commands sent through a `RecordingTransport`.
#[derive(Debug, Clone, Default)]
pub struct SendLog(Arc<Mutex<Vec<String>>>);

impl SendLog {
    pub fn commands(&self) -> Vec<String> {
        self.0.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }

    pub fn len(&self) -> usize {
        self.0.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn clear(&self) {
        self.0.lock().unwrap_or_else(PoisonError::into_inner).clear();
    }

    fn push(&self, command: &str) {
        self.0
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(command.to_string());
    }
}

/// Wraps a transport and records every command before forwarding it.
pub struct RecordingTransport<T> {
    inner: T,
    log: SendLog,
}

impl<T: Transport> RecordingTransport<T> {
    pub fn new(inner: T) -> Self {
        Self {
            inner,
            log: SendLog::default(),
        }
    }

    pub fn log(&self) -> SendLog {
        self.log.clone()
    }
}

impl<T: Transport> Transport for RecordingTransport<T> {
    fn open(&mut self, port: &str) -> Result<(), BoxError> {
        self.inner.open(port)
    }
    fn close(&mut self) -> Result<(), BoxError> {
        self.inner.close()
    }
    fn send(&mut self, command: &str) -> Result<String, BoxError> {
        self.log.push(command);
        self.inner.send(command)
    }
}

/// Counts exchanges that start while another one is still in flight.
#[derive(Debug, Clone, Default)]
pub struct OverlapProbe {
    in_flight: Arc<AtomicBool>,
    overlaps: Arc<AtomicUsize>,
    exchanges: Arc<AtomicUsize>,
}

impl OverlapProbe {
    pub fn overlaps(&self) -> usize {
        self.overlaps.load(Ordering::SeqCst)
    }

    pub fn exchanges(&self) -> usize {
        self.exchanges.load(Ordering::SeqCst)
    }
}

/// Wraps a transport, holds each exchange open for `hold` and reports any
/// overlapping `send` through an `OverlapProbe`.
pub struct ExclusiveTransport<T> {
    inner: T,
    hold: Duration,
    probe: OverlapProbe,
}

impl<T: Transport> ExclusiveTransport<T> {
    pub fn new(inner: T, hold: Duration) -> Self {
        Self {
            inner,
            hold,
            probe: OverlapProbe::default(),
        }
    }

    pub fn probe(&self) -> OverlapProbe {
        self.probe.clone()
    }
}

impl<T: Transport> Transport for ExclusiveTransport<T> {
    fn open(&mut self, port: &str) -> Result<(), BoxError> {
        self.inner.open(port)
    }
    fn close(&mut self) -> Result<(), BoxError> {
        self.inner.close()
    }
    fn send(&mut self, command: &str) -> Result<String, BoxError> {
        if self.probe.in_flight.swap(true, Ordering::SeqCst) {
            self.probe.overlaps.fetch_add(1, Ordering::SeqCst);
        }
        self.probe.exchanges.fetch_add(1, Ordering::SeqCst);
        std::thread::sleep(self.hold);
        let reply = self.inner.send(command);
        self.probe.in_flight.store(false, Ordering::SeqCst);
        reply
    }
}
